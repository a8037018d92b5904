//! Unified error handling for rockpi-poe
//!
//! This crate provides a single error type used across the controller crates.
//! It uses thiserror for ergonomic error definitions with proper Display and Error trait impls.

use std::io;
use std::path::PathBuf;

/// Result type alias using PoeError
pub type Result<T> = std::result::Result<T, PoeError>;

/// Unified error type for all rockpi-poe operations
#[derive(thiserror::Error, Debug)]
pub enum PoeError {
    // ============================================================================
    // File System Errors
    // ============================================================================
    #[error("Failed to read file {path}: {source}")]
    FileRead {
        path: PathBuf,
        source: io::Error,
    },

    // ============================================================================
    // Sensor Errors
    // ============================================================================
    /// A single source whose backing file does not exist
    #[error("Sensor {sensor} is not available")]
    SensorUnavailable {
        sensor: String,
    },

    /// A single source that exists but could not be read or parsed
    #[error("Failed to read sensor {sensor}: {reason}")]
    SensorRead {
        sensor: String,
        reason: String,
    },

    /// Every source of a composite sensor was absent or failed
    #[error("No temperature sensors are available")]
    NoSensorsAvailable,

    // ============================================================================
    // Actuator Errors
    // ============================================================================
    /// Fan hardware could not be initialized; never retried
    #[error("Fan actuator not available: {0}")]
    ActuatorUnavailable(String),

    #[error("Fan actuator fault during {operation}: {reason}")]
    ActuatorFault {
        operation: String,
        reason: String,
    },

    #[error("Invalid duty cycle: {value} (must be 0.0-1.0)")]
    InvalidDutyCycle {
        value: f64,
    },

    // ============================================================================
    // Controller Errors
    // ============================================================================
    #[error("Fan controller unavailable: {0}")]
    ControllerUnavailable(String),

    #[error("Metrics server error: {0}")]
    MetricsServer(String),

    // ============================================================================
    // Configuration Errors
    // ============================================================================
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid configuration value for {field}: {reason}")]
    InvalidConfig {
        field: String,
        reason: String,
    },

    #[error("Invalid temperature thresholds: {0}")]
    InvalidThresholds(String),
}

impl PoeError {
    /// Create a config error from a string
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an invalid config error for a named field
    pub fn invalid_config(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Create a sensor read error
    pub fn sensor_read(sensor: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::SensorRead {
            sensor: sensor.into(),
            reason: reason.into(),
        }
    }

    /// Create an actuator fault for the named hardware operation
    pub fn actuator_fault(operation: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ActuatorFault {
            operation: operation.into(),
            reason: reason.into(),
        }
    }

    /// True for errors that can only come from a malformed configuration
    pub fn is_configuration_error(&self) -> bool {
        matches!(
            self,
            Self::Config(_) | Self::InvalidConfig { .. } | Self::InvalidThresholds(_)
        )
    }

    /// True for errors local to a single sensor source
    pub fn is_sensor_error(&self) -> bool {
        matches!(self, Self::SensorUnavailable { .. } | Self::SensorRead { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_configuration_errors_are_classified() {
        assert!(PoeError::InvalidThresholds("40 >= 40".into()).is_configuration_error());
        assert!(PoeError::invalid_config("metrics_port", "out of range").is_configuration_error());
        assert!(!PoeError::NoSensorsAvailable.is_configuration_error());
    }

    #[test]
    fn test_sensor_errors_are_classified() {
        assert!(PoeError::sensor_read("thermal_zone_cpu", "bad payload").is_sensor_error());
        assert!(PoeError::SensorUnavailable { sensor: "adc".into() }.is_sensor_error());
        assert!(!PoeError::NoSensorsAvailable.is_sensor_error());
    }

    #[test]
    fn test_display_messages() {
        let err = PoeError::actuator_fault("set_enable", "EIO");
        assert_eq!(err.to_string(), "Fan actuator fault during set_enable: EIO");

        let err = PoeError::InvalidDutyCycle { value: 1.5 };
        assert_eq!(err.to_string(), "Invalid duty cycle: 1.5 (must be 0.0-1.0)");
    }
}
