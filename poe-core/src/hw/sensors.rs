//! Temperature sources
//!
//! Two kinds of physical source exist on the HAT:
//!
//! - **Voltage divider**: the HAT's thermistor on ADC channel 0. The raw code
//!   converts as `42 + (960 - raw) * 0.05` °C.
//! - **Thermal zone**: kernel thermal zones (`thermal_zoneN/temp`) in
//!   millidegrees Celsius. Zone 0 is the CPU and zone 1 the GPU on RK3399.
//!
//! Availability is probed once per source: a backing file missing at the first
//! check is treated as absent for the lifetime of the process.

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use tracing::debug;

use crate::constants::{paths, temperature};
use crate::data::TemperatureReading;
use crate::error::{PoeError, Result};
use crate::hw::control::read_raw_integer;

/// Capability shared by every temperature source
pub trait TemperatureSource {
    /// Stable label used for metrics and error attribution
    fn label(&self) -> &str;

    /// Whether the backing file exists (memoized after the first call)
    fn is_available(&self) -> bool;

    /// Take one reading
    fn read(&self) -> Result<TemperatureReading>;
}

/// Existence probe memoized on first use
#[derive(Debug, Default)]
struct AvailabilityProbe {
    available: OnceLock<bool>,
}

impl AvailabilityProbe {
    fn check(&self, path: &Path) -> bool {
        *self.available.get_or_init(|| path.exists())
    }
}

/// HAT thermistor read through the ADC
#[derive(Debug)]
pub struct VoltageDividerSensor {
    path: PathBuf,
    label: String,
    probe: AvailabilityProbe,
}

impl VoltageDividerSensor {
    pub fn new() -> Self {
        Self::with_path(paths::ADC_RAW)
    }

    /// Read the raw code from a custom attribute file
    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            label: temperature::ADC_LABEL.to_string(),
            probe: AvailabilityProbe::default(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Convert a raw ADC code to degrees Celsius
    pub fn code_to_celsius(raw: i64) -> f64 {
        temperature::DIVIDER_OFFSET_CELSIUS
            + (temperature::DIVIDER_REFERENCE_CODE - raw as f64) * temperature::DIVIDER_SLOPE
    }
}

impl Default for VoltageDividerSensor {
    fn default() -> Self {
        Self::new()
    }
}

impl TemperatureSource for VoltageDividerSensor {
    fn label(&self) -> &str {
        &self.label
    }

    fn is_available(&self) -> bool {
        self.probe.check(&self.path)
    }

    fn read(&self) -> Result<TemperatureReading> {
        if !self.is_available() {
            return Err(PoeError::SensorUnavailable {
                sensor: self.label.clone(),
            });
        }

        let raw = read_raw_integer(&self.path, &self.label)?;
        let celsius = Self::code_to_celsius(raw);

        debug!(sensor = %self.label, raw, celsius, "ADC temperature read");
        Ok(TemperatureReading::new(celsius, self.label.as_str()))
    }
}

/// Kernel thermal zone
#[derive(Debug)]
pub struct ThermalZoneSensor {
    zone_id: u32,
    path: PathBuf,
    label: String,
    probe: AvailabilityProbe,
}

impl ThermalZoneSensor {
    /// Thermal zone `zone_id`, labelled `thermal_zone_{name}`
    pub fn new(zone_id: u32, name: &str) -> Self {
        Self::with_path(zone_id, name, paths::thermal_zone(zone_id))
    }

    pub fn with_path(zone_id: u32, name: &str, path: impl Into<PathBuf>) -> Self {
        Self {
            zone_id,
            path: path.into(),
            label: format!("thermal_zone_{}", name),
            probe: AvailabilityProbe::default(),
        }
    }

    pub fn zone_id(&self) -> u32 {
        self.zone_id
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl TemperatureSource for ThermalZoneSensor {
    fn label(&self) -> &str {
        &self.label
    }

    fn is_available(&self) -> bool {
        self.probe.check(&self.path)
    }

    fn read(&self) -> Result<TemperatureReading> {
        if !self.is_available() {
            return Err(PoeError::SensorUnavailable {
                sensor: self.label.clone(),
            });
        }

        let millidegrees = read_raw_integer(&self.path, &self.label)?;
        let celsius = millidegrees as f64 / temperature::MILLIDEGREE_DIVISOR;

        debug!(
            sensor = %self.label,
            zone_id = self.zone_id,
            millidegrees,
            celsius,
            "Thermal zone temperature read"
        );
        Ok(TemperatureReading::new(celsius, self.label.as_str()))
    }
}

/// Closed set of physical sources on the HAT
#[derive(Debug)]
pub enum SensorSource {
    VoltageDivider(VoltageDividerSensor),
    ThermalZone(ThermalZoneSensor),
}

impl SensorSource {
    fn inner(&self) -> &dyn TemperatureSource {
        match self {
            SensorSource::VoltageDivider(sensor) => sensor,
            SensorSource::ThermalZone(sensor) => sensor,
        }
    }
}

impl TemperatureSource for SensorSource {
    fn label(&self) -> &str {
        self.inner().label()
    }

    fn is_available(&self) -> bool {
        self.inner().is_available()
    }

    fn read(&self) -> Result<TemperatureReading> {
        self.inner().read()
    }
}

impl From<VoltageDividerSensor> for SensorSource {
    fn from(sensor: VoltageDividerSensor) -> Self {
        SensorSource::VoltageDivider(sensor)
    }
}

impl From<ThermalZoneSensor> for SensorSource {
    fn from(sensor: ThermalZoneSensor) -> Self {
        SensorSource::ThermalZone(sensor)
    }
}

/// The HAT thermistor plus the CPU and GPU thermal zones
pub fn default_sensor_suite() -> Vec<SensorSource> {
    vec![
        VoltageDividerSensor::new().into(),
        ThermalZoneSensor::new(0, "cpu").into(),
        ThermalZoneSensor::new(1, "gpu").into(),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_voltage_divider_formula() {
        assert!((VoltageDividerSensor::code_to_celsius(960) - 42.0).abs() < 1e-9);
        assert!((VoltageDividerSensor::code_to_celsius(760) - 52.0).abs() < 1e-9);
        assert!((VoltageDividerSensor::code_to_celsius(1000) - 40.0).abs() < 1e-9);
    }

    #[test]
    fn test_voltage_divider_read() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("in_voltage0_raw");
        fs::write(&path, "860\n").unwrap();

        let sensor = VoltageDividerSensor::with_path(&path);
        assert!(sensor.is_available());
        let reading = sensor.read().unwrap();
        assert!((reading.celsius() - 47.0).abs() < 1e-9);
        assert_eq!(reading.sensor(), "adc");
    }

    #[test]
    fn test_voltage_divider_rejects_non_numeric() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("in_voltage0_raw");
        fs::write(&path, "n/a").unwrap();

        let err = VoltageDividerSensor::with_path(&path).read().unwrap_err();
        assert!(matches!(err, PoeError::SensorRead { .. }));
    }

    #[test]
    fn test_thermal_zone_millidegrees() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("temp");
        fs::write(&path, "54321\n").unwrap();

        let sensor = ThermalZoneSensor::with_path(0, "cpu", &path);
        let reading = sensor.read().unwrap();
        assert!((reading.celsius() - 54.321).abs() < 1e-9);
        assert_eq!(reading.sensor(), "thermal_zone_cpu");
        assert_eq!(sensor.zone_id(), 0);
    }

    #[test]
    fn test_availability_is_memoized() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("temp");

        let sensor = ThermalZoneSensor::with_path(1, "gpu", &path);
        assert!(!sensor.is_available());

        // Appearing later does not revive an absent source
        fs::write(&path, "40000").unwrap();
        assert!(!sensor.is_available());
        assert!(matches!(sensor.read(), Err(PoeError::SensorUnavailable { .. })));
    }

    #[test]
    fn test_available_source_that_disappears_fails_read() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("temp");
        fs::write(&path, "40000").unwrap();

        let sensor = ThermalZoneSensor::with_path(0, "cpu", &path);
        assert!(sensor.is_available());
        fs::remove_file(&path).unwrap();

        assert!(sensor.is_available());
        assert!(matches!(sensor.read(), Err(PoeError::SensorRead { .. })));
    }

    #[test]
    fn test_sensor_source_dispatch() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("temp");
        fs::write(&path, "38000").unwrap();

        let source: SensorSource = ThermalZoneSensor::with_path(0, "cpu", &path).into();
        assert_eq!(source.label(), "thermal_zone_cpu");
        assert!((source.read().unwrap().celsius() - 38.0).abs() < 1e-9);
    }

    #[test]
    fn test_default_suite_labels() {
        let labels: Vec<String> = default_sensor_suite()
            .iter()
            .map(|s| s.label().to_string())
            .collect();
        assert_eq!(labels, vec!["adc", "thermal_zone_cpu", "thermal_zone_gpu"]);
    }
}
