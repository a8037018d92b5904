//! Data types and validation modules
//!
//! Contains the values shared by the sensor, policy, and actuator layers.

mod types;
mod validation;

pub use types::{ActuatorState, ApplyOutcome, SpeedTier, TemperatureReading};
pub use validation::{
    validate_duty_cycle, validate_log_format, validate_log_level, validate_metrics_host,
    validate_metrics_port, validate_pwm_period, validate_threshold_level,
    validate_update_interval,
};
