//! sysfs GPIO line used as the fan enable signal

use std::path::{Path, PathBuf};
use std::thread;

use tracing::{debug, info};

use crate::constants::{gpio, paths, timing};
use crate::error::Result;
use crate::hw::control::write_attribute;

/// One GPIO line driven through `/sys/class/gpio`
#[derive(Debug, Clone)]
pub struct SysfsGpio {
    base: PathBuf,
    line: u32,
}

impl SysfsGpio {
    pub fn new(line: u32) -> Self {
        Self::with_base(paths::GPIO_BASE, line)
    }

    /// Use a different sysfs root (tests point this at a tempdir)
    pub fn with_base(base: impl Into<PathBuf>, line: u32) -> Self {
        Self {
            base: base.into(),
            line,
        }
    }

    pub fn line(&self) -> u32 {
        self.line
    }

    fn line_dir(&self) -> PathBuf {
        self.base.join(format!("gpio{}", self.line))
    }

    fn attribute(&self, name: &str) -> PathBuf {
        self.line_dir().join(name)
    }

    /// Export the line unless it is already exported
    pub fn export(&self) -> Result<()> {
        if self.line_dir().exists() {
            debug!(line = self.line, "GPIO line already exported");
            return Ok(());
        }

        write_attribute(&self.base.join("export"), &self.line.to_string(), "gpio_export")?;
        // Blocks the calling thread; see ControlLoop::start for the ordering this relies on
        thread::sleep(timing::EXPORT_SETTLE);
        info!(line = self.line, "Exported GPIO line");
        Ok(())
    }

    pub fn set_direction_out(&self) -> Result<()> {
        write_attribute(&self.attribute("direction"), gpio::DIRECTION_OUT, "gpio_direction")
    }

    /// Drive the line high or low
    pub fn write(&self, high: bool) -> Result<()> {
        let value = if high { gpio::HIGH } else { gpio::LOW };
        write_attribute(&self.attribute("value"), value, "set_enable")
    }

    pub fn base(&self) -> &Path {
        &self.base
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_export_skipped_when_line_exists() {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("gpio16")).unwrap();

        let line = SysfsGpio::with_base(dir.path(), 16);
        line.export().unwrap();
        assert!(!dir.path().join("export").exists());
    }

    #[test]
    fn test_export_writes_line_number() {
        let dir = TempDir::new().unwrap();
        let line = SysfsGpio::with_base(dir.path(), 16);
        line.export().unwrap();
        assert_eq!(fs::read_to_string(dir.path().join("export")).unwrap(), "16");
    }

    #[test]
    fn test_direction_and_value() {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("gpio16")).unwrap();

        let line = SysfsGpio::with_base(dir.path(), 16);
        line.set_direction_out().unwrap();
        line.write(true).unwrap();
        assert_eq!(fs::read_to_string(dir.path().join("gpio16/direction")).unwrap(), "out");
        assert_eq!(fs::read_to_string(dir.path().join("gpio16/value")).unwrap(), "1");

        line.write(false).unwrap();
        assert_eq!(fs::read_to_string(dir.path().join("gpio16/value")).unwrap(), "0");
    }

    #[test]
    fn test_write_without_line_is_fault() {
        let dir = TempDir::new().unwrap();
        let err = SysfsGpio::with_base(dir.path(), 7).write(true).unwrap_err();
        assert!(matches!(err, crate::error::PoeError::ActuatorFault { .. }));
    }
}
