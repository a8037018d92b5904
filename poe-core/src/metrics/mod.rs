//! Controller metrics
//!
//! The control loop reports through the [`MetricsSink`] trait. [`Metrics`] is
//! the Prometheus registry and [`NoopMetrics`] discards everything.
//! [`MetricsServer`] exposes a registry over HTTP.

mod registry;
mod server;

pub use registry::Metrics;
pub use server::MetricsServer;

/// Receiver of controller observations
///
/// Every method is infallible. Implementations must be cheap enough to call
/// from inside a control tick.
pub trait MetricsSink: Send + Sync {
    /// Latest temperature of a sensor (or of the composite)
    fn observe_temperature(&self, celsius: f64, sensor: &str);

    /// Current fan speed in percent
    fn observe_fan_speed(&self, percent: f64);

    fn observe_fan_enabled(&self, enabled: bool);

    /// Seconds since the control loop started
    fn observe_uptime(&self, seconds: f64);

    fn increment_sensor_error(&self, sensor: &str);

    /// A failed hardware write, keyed by operation (`set_enable`, `set_duty_cycle`, ...)
    fn increment_actuator_error(&self, operation: &str);

    /// A duty cycle was written to the hardware
    fn increment_speed_change(&self);
}

/// Sink that drops every observation
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopMetrics;

impl MetricsSink for NoopMetrics {
    fn observe_temperature(&self, _celsius: f64, _sensor: &str) {}
    fn observe_fan_speed(&self, _percent: f64) {}
    fn observe_fan_enabled(&self, _enabled: bool) {}
    fn observe_uptime(&self, _seconds: f64) {}
    fn increment_sensor_error(&self, _sensor: &str) {}
    fn increment_actuator_error(&self, _operation: &str) {}
    fn increment_speed_change(&self) {}
}
