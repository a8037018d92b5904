//! Prometheus registry
//!
//! Every value is an atomic so the exporter task can render while the control
//! loop updates. Labelled families map a label value to its own atomic cell.

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;

use super::MetricsSink;
use crate::constants::metrics;

// ============================================================================
// Cells
// ============================================================================

/// f64 stored as its bit pattern
#[derive(Debug, Default)]
struct Gauge(AtomicU64);

impl Gauge {
    fn set(&self, value: f64) {
        self.0.store(value.to_bits(), Ordering::Relaxed);
    }

    fn get(&self) -> f64 {
        f64::from_bits(self.0.load(Ordering::Relaxed))
    }
}

#[derive(Debug, Default)]
struct Counter(AtomicU64);

impl Counter {
    fn inc(&self) {
        self.0.fetch_add(1, Ordering::Relaxed);
    }

    fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}

/// Fixed-bucket histogram; bucket counts are non-cumulative until rendered
#[derive(Debug)]
struct Histogram {
    bounds: &'static [f64],
    buckets: Vec<AtomicU64>,
    count: AtomicU64,
    sum: AtomicU64,
}

impl Histogram {
    fn new(bounds: &'static [f64]) -> Self {
        Self {
            bounds,
            buckets: bounds.iter().map(|_| AtomicU64::new(0)).collect(),
            count: AtomicU64::new(0),
            sum: AtomicU64::new(0f64.to_bits()),
        }
    }

    fn observe(&self, value: f64) {
        if let Some(index) = self.bounds.iter().position(|bound| value <= *bound) {
            self.buckets[index].fetch_add(1, Ordering::Relaxed);
        }
        self.count.fetch_add(1, Ordering::Relaxed);

        let mut current = self.sum.load(Ordering::Relaxed);
        loop {
            let next = (f64::from_bits(current) + value).to_bits();
            match self
                .sum
                .compare_exchange_weak(current, next, Ordering::Relaxed, Ordering::Relaxed)
            {
                Ok(_) => break,
                Err(actual) => current = actual,
            }
        }
    }

    fn count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }

    fn sum(&self) -> f64 {
        f64::from_bits(self.sum.load(Ordering::Relaxed))
    }
}

/// Label value -> cell
struct Family<T> {
    cells: RwLock<BTreeMap<String, Arc<T>>>,
    make: fn() -> T,
}

impl<T> Family<T> {
    fn new(make: fn() -> T) -> Self {
        Self {
            cells: RwLock::new(BTreeMap::new()),
            make,
        }
    }

    fn get_or_create(&self, label: &str) -> Arc<T> {
        if let Some(cell) = self.cells.read().get(label) {
            return Arc::clone(cell);
        }
        let mut cells = self.cells.write();
        Arc::clone(
            cells
                .entry(label.to_string())
                .or_insert_with(|| Arc::new((self.make)())),
        )
    }

    fn get(&self, label: &str) -> Option<Arc<T>> {
        self.cells.read().get(label).cloned()
    }

    fn snapshot(&self) -> Vec<(String, Arc<T>)> {
        self.cells
            .read()
            .iter()
            .map(|(label, cell)| (label.clone(), Arc::clone(cell)))
            .collect()
    }
}

// ============================================================================
// Registry
// ============================================================================

/// Prometheus registry of the controller metric families
pub struct Metrics {
    temperature: Family<Gauge>,
    temperature_histogram: Family<Histogram>,
    fan_speed: Gauge,
    fan_enabled: Gauge,
    speed_changes: Counter,
    uptime: Gauge,
    sensor_errors: Family<Counter>,
    actuator_errors: Family<Counter>,
}

fn temperature_histogram() -> Histogram {
    Histogram::new(metrics::TEMPERATURE_BUCKETS)
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            temperature: Family::new(Gauge::default),
            temperature_histogram: Family::new(temperature_histogram),
            fan_speed: Gauge::default(),
            fan_enabled: Gauge::default(),
            speed_changes: Counter::default(),
            uptime: Gauge::default(),
            sensor_errors: Family::new(Counter::default),
            actuator_errors: Family::new(Counter::default),
        }
    }

    // ------------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------------

    /// Last temperature observed for a sensor label
    pub fn temperature(&self, sensor: &str) -> Option<f64> {
        self.temperature.get(sensor).map(|g| g.get())
    }

    /// Number of histogram observations for a sensor label
    pub fn temperature_observations(&self, sensor: &str) -> u64 {
        self.temperature_histogram
            .get(sensor)
            .map(|h| h.count())
            .unwrap_or(0)
    }

    /// Sensor labels with at least one temperature observation
    pub fn observed_sensors(&self) -> Vec<String> {
        self.temperature
            .snapshot()
            .into_iter()
            .map(|(label, _)| label)
            .collect()
    }

    pub fn fan_speed_percent(&self) -> f64 {
        self.fan_speed.get()
    }

    pub fn fan_enabled(&self) -> bool {
        self.fan_enabled.get() > 0.5
    }

    pub fn uptime_seconds(&self) -> f64 {
        self.uptime.get()
    }

    pub fn speed_changes(&self) -> u64 {
        self.speed_changes.get()
    }

    pub fn sensor_errors(&self, sensor: &str) -> u64 {
        self.sensor_errors.get(sensor).map(|c| c.get()).unwrap_or(0)
    }

    /// Sum of sensor errors across every label
    pub fn total_sensor_errors(&self) -> u64 {
        self.sensor_errors
            .snapshot()
            .iter()
            .map(|(_, c)| c.get())
            .sum()
    }

    pub fn actuator_errors(&self, operation: &str) -> u64 {
        self.actuator_errors.get(operation).map(|c| c.get()).unwrap_or(0)
    }

    // ------------------------------------------------------------------------
    // Exposition
    // ------------------------------------------------------------------------

    /// Render all families in the Prometheus text format (0.0.4)
    pub fn render(&self) -> String {
        let mut out = String::with_capacity(2048);

        header(&mut out, "temperature_celsius", "Current temperature in Celsius", "gauge");
        for (sensor, gauge) in self.temperature.snapshot() {
            sample(&mut out, "temperature_celsius", &[("sensor_type", sensor.as_str())], &format_value(gauge.get()));
        }

        header(
            &mut out,
            "temperature_measurements",
            "Distribution of temperature measurements",
            "histogram",
        );
        for (sensor, histogram) in self.temperature_histogram.snapshot() {
            let mut cumulative = 0u64;
            for (bound, bucket) in histogram.bounds.iter().zip(&histogram.buckets) {
                cumulative += bucket.load(Ordering::Relaxed);
                let le = format_value(*bound);
                sample(
                    &mut out,
                    "temperature_measurements_bucket",
                    &[("sensor_type", sensor.as_str()), ("le", le.as_str())],
                    &cumulative.to_string(),
                );
            }
            sample(
                &mut out,
                "temperature_measurements_bucket",
                &[("sensor_type", sensor.as_str()), ("le", "+Inf")],
                &histogram.count().to_string(),
            );
            sample(
                &mut out,
                "temperature_measurements_sum",
                &[("sensor_type", sensor.as_str())],
                &format_value(histogram.sum()),
            );
            sample(
                &mut out,
                "temperature_measurements_count",
                &[("sensor_type", sensor.as_str())],
                &histogram.count().to_string(),
            );
        }

        header(&mut out, "fan_speed_percent", "Current fan speed percentage", "gauge");
        sample(&mut out, "fan_speed_percent", &[], &format_value(self.fan_speed.get()));

        header(&mut out, "fan_enabled", "Whether the fan is enabled (1) or disabled (0)", "gauge");
        sample(&mut out, "fan_enabled", &[], &format_value(self.fan_enabled.get()));

        header(&mut out, "fan_speed_changes_total", "Total number of fan speed changes", "counter");
        sample(&mut out, "fan_speed_changes_total", &[], &self.speed_changes.get().to_string());

        header(&mut out, "controller_uptime_seconds", "Controller uptime in seconds", "gauge");
        sample(&mut out, "controller_uptime_seconds", &[], &format_value(self.uptime.get()));

        header(
            &mut out,
            "temperature_read_errors_total",
            "Total number of temperature read errors",
            "counter",
        );
        for (sensor, counter) in self.sensor_errors.snapshot() {
            sample(
                &mut out,
                "temperature_read_errors_total",
                &[("sensor_type", sensor.as_str())],
                &counter.get().to_string(),
            );
        }

        header(&mut out, "gpio_errors_total", "Total number of fan hardware errors", "counter");
        for (operation, counter) in self.actuator_errors.snapshot() {
            sample(
                &mut out,
                "gpio_errors_total",
                &[("operation", operation.as_str())],
                &counter.get().to_string(),
            );
        }

        out
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricsSink for Metrics {
    fn observe_temperature(&self, celsius: f64, sensor: &str) {
        self.temperature.get_or_create(sensor).set(celsius);
        self.temperature_histogram.get_or_create(sensor).observe(celsius);
    }

    fn observe_fan_speed(&self, percent: f64) {
        self.fan_speed.set(percent);
    }

    fn observe_fan_enabled(&self, enabled: bool) {
        self.fan_enabled.set(if enabled { 1.0 } else { 0.0 });
    }

    fn observe_uptime(&self, seconds: f64) {
        self.uptime.set(seconds);
    }

    fn increment_sensor_error(&self, sensor: &str) {
        self.sensor_errors.get_or_create(sensor).inc();
    }

    fn increment_actuator_error(&self, operation: &str) {
        self.actuator_errors.get_or_create(operation).inc();
    }

    fn increment_speed_change(&self) {
        self.speed_changes.inc();
    }
}

// ============================================================================
// Text format helpers
// ============================================================================

fn header(out: &mut String, name: &str, help: &str, kind: &str) {
    let _ = writeln!(out, "# HELP {}_{} {}", metrics::PREFIX, name, help);
    let _ = writeln!(out, "# TYPE {}_{} {}", metrics::PREFIX, name, kind);
}

fn sample(out: &mut String, name: &str, labels: &[(&str, &str)], value: &str) {
    let _ = write!(out, "{}_{}", metrics::PREFIX, name);
    if !labels.is_empty() {
        out.push('{');
        for (i, (key, val)) in labels.iter().enumerate() {
            if i > 0 {
                out.push(',');
            }
            let _ = write!(out, "{}=\"{}\"", key, escape_label(val));
        }
        out.push('}');
    }
    let _ = writeln!(out, " {}", value);
}

fn escape_label(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n")
}

fn format_value(value: f64) -> String {
    if value.is_nan() {
        "NaN".to_string()
    } else if value.is_infinite() {
        let text = if value > 0.0 { "+Inf" } else { "-Inf" };
        text.to_string()
    } else if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{:.1}", value)
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gauges_and_counters() {
        let m = Metrics::new();
        m.observe_fan_speed(75.0);
        m.observe_fan_enabled(true);
        m.observe_uptime(12.5);
        m.increment_speed_change();
        m.increment_speed_change();

        assert_eq!(m.fan_speed_percent(), 75.0);
        assert!(m.fan_enabled());
        assert_eq!(m.uptime_seconds(), 12.5);
        assert_eq!(m.speed_changes(), 2);

        m.observe_fan_enabled(false);
        assert!(!m.fan_enabled());
    }

    #[test]
    fn test_labelled_families_are_independent() {
        let m = Metrics::new();
        m.increment_sensor_error("adc");
        m.increment_sensor_error("adc");
        m.increment_sensor_error("composite");
        m.increment_actuator_error("set_enable");

        assert_eq!(m.sensor_errors("adc"), 2);
        assert_eq!(m.sensor_errors("composite"), 1);
        assert_eq!(m.sensor_errors("thermal_zone_cpu"), 0);
        assert_eq!(m.total_sensor_errors(), 3);
        assert_eq!(m.actuator_errors("set_enable"), 1);
        assert_eq!(m.actuator_errors("set_duty_cycle"), 0);
    }

    #[test]
    fn test_temperature_tracks_last_value_and_count() {
        let m = Metrics::new();
        m.observe_temperature(41.0, "thermal_zone_cpu");
        m.observe_temperature(43.5, "thermal_zone_cpu");

        assert_eq!(m.temperature("thermal_zone_cpu"), Some(43.5));
        assert_eq!(m.temperature_observations("thermal_zone_cpu"), 2);
        assert_eq!(m.temperature("adc"), None);
        assert_eq!(m.observed_sensors(), vec!["thermal_zone_cpu".to_string()]);
    }

    #[test]
    fn test_render_text_format() {
        let m = Metrics::new();
        m.observe_temperature(47.0, "composite");
        m.observe_fan_speed(50.0);
        m.observe_fan_enabled(true);
        m.increment_actuator_error("set_duty_cycle");

        let text = m.render();
        assert!(text.contains("# TYPE rockpi_poe_temperature_celsius gauge"));
        assert!(text.contains("rockpi_poe_temperature_celsius{sensor_type=\"composite\"} 47.0"));
        assert!(text.contains("rockpi_poe_fan_speed_percent 50.0"));
        assert!(text.contains("rockpi_poe_fan_enabled 1.0"));
        assert!(text.contains("rockpi_poe_fan_speed_changes_total 0"));
        assert!(text.contains("rockpi_poe_gpio_errors_total{operation=\"set_duty_cycle\"} 1"));
        assert!(text.contains("# TYPE rockpi_poe_temperature_measurements histogram"));
    }

    #[test]
    fn test_histogram_buckets_are_cumulative() {
        let m = Metrics::new();
        m.observe_temperature(22.0, "adc");
        m.observe_temperature(47.0, "adc");
        m.observe_temperature(90.0, "adc");

        let text = m.render();
        assert!(text.contains("rockpi_poe_temperature_measurements_bucket{sensor_type=\"adc\",le=\"20.0\"} 0"));
        assert!(text.contains("rockpi_poe_temperature_measurements_bucket{sensor_type=\"adc\",le=\"25.0\"} 1"));
        assert!(text.contains("rockpi_poe_temperature_measurements_bucket{sensor_type=\"adc\",le=\"50.0\"} 2"));
        assert!(text.contains("rockpi_poe_temperature_measurements_bucket{sensor_type=\"adc\",le=\"80.0\"} 2"));
        assert!(text.contains("rockpi_poe_temperature_measurements_bucket{sensor_type=\"adc\",le=\"+Inf\"} 3"));
        assert!(text.contains("rockpi_poe_temperature_measurements_count{sensor_type=\"adc\"} 3"));
        assert!(text.contains("rockpi_poe_temperature_measurements_sum{sensor_type=\"adc\"} 159.0"));
    }

    #[test]
    fn test_label_escaping() {
        assert_eq!(escape_label("a\"b\\c\nd"), "a\\\"b\\\\c\\nd");
    }

    #[test]
    fn test_format_value() {
        assert_eq!(format_value(1.0), "1.0");
        assert_eq!(format_value(47.25), "47.25");
        assert_eq!(format_value(f64::INFINITY), "+Inf");
        assert_eq!(format_value(f64::NAN), "NaN");
    }
}
