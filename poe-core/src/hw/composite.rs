//! Composite temperature sensor
//!
//! Reads every available source and reports the hottest one. Sources that
//! are absent are skipped silently; sources that fail are logged, counted
//! under their own label and left out of the result.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::constants::temperature;
use crate::data::TemperatureReading;
use crate::error::{PoeError, Result};
use crate::hw::sensors::{SensorSource, TemperatureSource};
use crate::metrics::MetricsSink;

pub struct CompositeSensor<S: TemperatureSource = SensorSource> {
    sources: Vec<S>,
    metrics: Arc<dyn MetricsSink>,
}

impl<S: TemperatureSource> CompositeSensor<S> {
    pub fn new(sources: Vec<S>, metrics: Arc<dyn MetricsSink>) -> Self {
        Self { sources, metrics }
    }

    /// Maximum reading across all sources, labelled `composite`
    pub fn read(&self) -> Result<TemperatureReading> {
        let mut hottest: Option<TemperatureReading> = None;

        for source in &self.sources {
            if !source.is_available() {
                continue;
            }

            match source.read() {
                Ok(reading) => {
                    self.metrics.observe_temperature(reading.celsius(), source.label());
                    let hotter = hottest
                        .as_ref()
                        .map_or(true, |current| reading.celsius() > current.celsius());
                    if hotter {
                        hottest = Some(reading);
                    }
                }
                Err(e) => {
                    warn!("Temperature source {} failed: {}", source.label(), e);
                    self.metrics.increment_sensor_error(source.label());
                }
            }
        }

        let Some(hottest) = hottest else {
            self.metrics.increment_sensor_error(temperature::COMPOSITE_LABEL);
            return Err(PoeError::NoSensorsAvailable);
        };

        debug!("Hottest source: {}", hottest);
        let composite = TemperatureReading::new(hottest.celsius(), temperature::COMPOSITE_LABEL);
        self.metrics
            .observe_temperature(composite.celsius(), temperature::COMPOSITE_LABEL);
        Ok(composite)
    }

    /// Labels of the sources whose backing file exists
    pub fn available_sources(&self) -> Vec<&str> {
        self.sources
            .iter()
            .filter(|s| s.is_available())
            .map(|s| s.label())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}
