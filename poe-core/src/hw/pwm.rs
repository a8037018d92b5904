//! sysfs PWM channel driving the fan
//!
//! The kernel interface takes nanoseconds: `period` is written once at
//! initialization and `duty_cycle` is `duty * period`.

use std::path::PathBuf;
use std::thread;

use tracing::{debug, info};

use crate::constants::{paths, pwm, timing};
use crate::data::validate_duty_cycle;
use crate::error::Result;
use crate::hw::control::write_attribute;

#[derive(Debug, Clone)]
pub struct SysfsPwm {
    base: PathBuf,
    chip: u32,
    channel: u32,
    period_ns: u64,
}

impl SysfsPwm {
    pub fn new(chip: u32, channel: u32, period_ms: u32) -> Self {
        Self::with_base(paths::PWM_BASE, chip, channel, period_ms)
    }

    pub fn with_base(base: impl Into<PathBuf>, chip: u32, channel: u32, period_ms: u32) -> Self {
        Self {
            base: base.into(),
            chip,
            channel,
            period_ns: u64::from(period_ms) * pwm::NANOS_PER_MILLI,
        }
    }

    pub fn period_ns(&self) -> u64 {
        self.period_ns
    }

    fn chip_dir(&self) -> PathBuf {
        self.base.join(format!("pwmchip{}", self.chip))
    }

    fn channel_dir(&self) -> PathBuf {
        self.chip_dir().join(format!("pwm{}", self.channel))
    }

    /// Export the channel, program the period and enable output
    pub fn initialize(&self) -> Result<()> {
        if self.channel_dir().exists() {
            debug!(chip = self.chip, channel = self.channel, "PWM channel already exported");
        } else {
            write_attribute(
                &self.chip_dir().join("export"),
                &self.channel.to_string(),
                "pwm_export",
            )?;
            // Blocks the calling thread; see ControlLoop::start for the ordering this relies on
            thread::sleep(timing::EXPORT_SETTLE);
        }

        write_attribute(
            &self.channel_dir().join("period"),
            &self.period_ns.to_string(),
            "pwm_period",
        )?;
        write_attribute(&self.channel_dir().join("enable"), "1", "pwm_enable")?;

        info!(
            chip = self.chip,
            channel = self.channel,
            period_ns = self.period_ns,
            "PWM channel initialized"
        );
        Ok(())
    }

    /// Write a duty fraction in [0, 1]
    pub fn set_duty_cycle(&self, duty_cycle: f64) -> Result<()> {
        let duty_cycle = validate_duty_cycle(duty_cycle)?;
        let duty_ns = pwm::duty_to_ns(duty_cycle, self.period_ns);
        write_attribute(
            &self.channel_dir().join("duty_cycle"),
            &duty_ns.to_string(),
            "set_duty_cycle",
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PoeError;
    use std::fs;
    use tempfile::TempDir;

    fn exported(dir: &TempDir) -> SysfsPwm {
        fs::create_dir_all(dir.path().join("pwmchip0/pwm0")).unwrap();
        SysfsPwm::with_base(dir.path(), 0, 0, 13)
    }

    #[test]
    fn test_initialize_programs_period_and_enable() {
        let dir = TempDir::new().unwrap();
        let channel = exported(&dir);
        channel.initialize().unwrap();

        assert_eq!(channel.period_ns(), 13_000_000);
        let read = |name: &str| fs::read_to_string(dir.path().join("pwmchip0/pwm0").join(name)).unwrap();
        assert_eq!(read("period"), "13000000");
        assert_eq!(read("enable"), "1");
        assert!(!dir.path().join("pwmchip0/export").exists());
    }

    #[test]
    fn test_duty_cycle_in_nanoseconds() {
        let dir = TempDir::new().unwrap();
        let channel = exported(&dir);
        let duty_path = dir.path().join("pwmchip0/pwm0/duty_cycle");

        channel.set_duty_cycle(0.75).unwrap();
        assert_eq!(fs::read_to_string(&duty_path).unwrap(), "9750000");
        channel.set_duty_cycle(0.0).unwrap();
        assert_eq!(fs::read_to_string(&duty_path).unwrap(), "0");
        channel.set_duty_cycle(1.0).unwrap();
        assert_eq!(fs::read_to_string(&duty_path).unwrap(), "13000000");
    }

    #[test]
    fn test_out_of_range_duty_rejected_before_write() {
        let dir = TempDir::new().unwrap();
        let channel = exported(&dir);

        let err = channel.set_duty_cycle(1.5).unwrap_err();
        assert!(matches!(err, PoeError::InvalidDutyCycle { .. }));
        assert!(!dir.path().join("pwmchip0/pwm0/duty_cycle").exists());
    }

    #[test]
    fn test_missing_chip_fails_export() {
        let dir = TempDir::new().unwrap();
        let err = SysfsPwm::with_base(dir.path(), 3, 0, 13).initialize().unwrap_err();
        assert!(matches!(err, PoeError::ActuatorFault { ref operation, .. } if operation == "pwm_export"));
    }
}
