//! Raw sysfs read/write primitives
//!
//! Every sensor and actuator goes through these two functions, so parsing
//! and error mapping live in one place.
//!
//! # Payloads
//!
//! sysfs attribute files hold a single value followed by a newline. Reads
//! trim whitespace and parse a signed integer; anything else is an error.

use std::fs;
use std::path::Path;

use crate::error::{PoeError, Result};

/// Read an integer attribute such as `temp` or `in_voltage0_raw`
///
/// Errors carry the `sensor` label so the failure can be attributed.
pub fn read_raw_integer(path: &Path, sensor: &str) -> Result<i64> {
    let content = fs::read_to_string(path).map_err(|e| {
        PoeError::sensor_read(sensor, format!("failed to read {}: {}", path.display(), e))
    })?;

    let trimmed = content.trim();
    trimmed.parse::<i64>().map_err(|e| {
        PoeError::sensor_read(
            sensor,
            format!("failed to parse '{}' from {}: {}", trimmed, path.display(), e),
        )
    })
}

/// Write a value to a sysfs attribute
///
/// `operation` names the hardware action for error attribution.
pub fn write_attribute(path: &Path, value: &str, operation: &str) -> Result<()> {
    fs::write(path, value).map_err(|e| {
        PoeError::actuator_fault(
            operation,
            format!("failed to write '{}' to {}: {}", value, path.display(), e),
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_read_raw_integer_trims_newline() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("temp");
        fs::write(&path, "54321\n").unwrap();
        assert_eq!(read_raw_integer(&path, "cpu").unwrap(), 54321);
    }

    #[test]
    fn test_read_raw_integer_negative() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("temp");
        fs::write(&path, "-5000").unwrap();
        assert_eq!(read_raw_integer(&path, "cpu").unwrap(), -5000);
    }

    #[test]
    fn test_read_raw_integer_rejects_garbage() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("temp");
        fs::write(&path, "45.5\n").unwrap();
        let err = read_raw_integer(&path, "cpu").unwrap_err();
        assert!(matches!(err, PoeError::SensorRead { ref sensor, .. } if sensor == "cpu"));

        fs::write(&path, "").unwrap();
        assert!(read_raw_integer(&path, "cpu").is_err());
    }

    #[test]
    fn test_read_missing_file_is_read_error() {
        let dir = TempDir::new().unwrap();
        let err = read_raw_integer(&dir.path().join("missing"), "gpu").unwrap_err();
        assert!(err.is_sensor_error());
    }

    #[test]
    fn test_write_attribute() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("value");
        write_attribute(&path, "1", "set_enable").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "1");

        let err = write_attribute(&dir.path().join("no/such/dir"), "1", "set_enable").unwrap_err();
        assert!(matches!(err, PoeError::ActuatorFault { ref operation, .. } if operation == "set_enable"));
    }
}
