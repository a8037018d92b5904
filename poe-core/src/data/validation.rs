//! Input validation for rockpi-poe
//!
//! Every configured value and every duty cycle headed for hardware passes
//! through one of these checks. Each returns the validated value.

use crate::constants::{logging, metrics, pwm, thresholds, timing};
use crate::error::{PoeError, Result};

/// Validates that a duty cycle is within 0.0-1.0 (NaN is rejected)
pub fn validate_duty_cycle(value: f64) -> Result<f64> {
    if !(0.0..=1.0).contains(&value) {
        return Err(PoeError::InvalidDutyCycle { value });
    }
    Ok(value)
}

/// Validates a single temperature threshold
pub fn validate_threshold_level(field: &str, value: f64) -> Result<f64> {
    if !value.is_finite() {
        return Err(PoeError::invalid_config(field, "must be a finite number"));
    }
    if !(thresholds::MIN_LEVEL..=thresholds::MAX_LEVEL).contains(&value) {
        return Err(PoeError::invalid_config(
            field,
            format!(
                "{} is outside {}-{}°C",
                value,
                thresholds::MIN_LEVEL,
                thresholds::MAX_LEVEL
            ),
        ));
    }
    Ok(value)
}

/// Validates the tick interval in seconds
pub fn validate_update_interval(seconds: f64) -> Result<f64> {
    if !(timing::MIN_UPDATE_INTERVAL_SECS..=timing::MAX_UPDATE_INTERVAL_SECS).contains(&seconds) {
        return Err(PoeError::invalid_config(
            "update_interval",
            format!(
                "{} is outside {}-{} seconds",
                seconds,
                timing::MIN_UPDATE_INTERVAL_SECS,
                timing::MAX_UPDATE_INTERVAL_SECS
            ),
        ));
    }
    Ok(seconds)
}

/// Validates the metrics listener port
pub fn validate_metrics_port(port: u16) -> Result<u16> {
    if port < metrics::MIN_PORT {
        return Err(PoeError::invalid_config(
            "metrics_port",
            format!("{} is below {}", port, metrics::MIN_PORT),
        ));
    }
    Ok(port)
}

/// Validates the metrics bind host
pub fn validate_metrics_host(host: &str) -> Result<&str> {
    let trimmed = host.trim();
    if trimmed.is_empty() {
        return Err(PoeError::invalid_config("metrics_host", "cannot be empty"));
    }
    if trimmed.chars().any(|c| c.is_whitespace() || c == '/') {
        return Err(PoeError::invalid_config(
            "metrics_host",
            format!("'{}' is not a host name or address", host),
        ));
    }
    Ok(trimmed)
}

/// Validates the PWM period in milliseconds
pub fn validate_pwm_period(period_ms: u32) -> Result<u32> {
    if !(pwm::MIN_PERIOD_MS..=pwm::MAX_PERIOD_MS).contains(&period_ms) {
        return Err(PoeError::invalid_config(
            "pwm_period_ms",
            format!(
                "{} is outside {}-{} ms",
                period_ms,
                pwm::MIN_PERIOD_MS,
                pwm::MAX_PERIOD_MS
            ),
        ));
    }
    Ok(period_ms)
}

/// Validates a log level name (case-insensitive), returning it lowercased
pub fn validate_log_level(level: &str) -> Result<String> {
    let lowered = level.trim().to_ascii_lowercase();
    let lowered = if lowered == "warning" { "warn".to_string() } else { lowered };
    if !logging::LEVELS.contains(&lowered.as_str()) {
        return Err(PoeError::invalid_config(
            "log_level",
            format!("'{}' is not one of {:?}", level, logging::LEVELS),
        ));
    }
    Ok(lowered)
}

/// Validates a log format name, returning it lowercased
pub fn validate_log_format(format: &str) -> Result<String> {
    let lowered = format.trim().to_ascii_lowercase();
    if !logging::FORMATS.contains(&lowered.as_str()) {
        return Err(PoeError::invalid_config(
            "log_format",
            format!("'{}' is not one of {:?}", format, logging::FORMATS),
        ));
    }
    Ok(lowered)
}
