//! Fan hardware boundary
//!
//! [`FanDriver`] is the seam between the actuator's state machine and the
//! physical lines. [`SysfsFanDriver`] pairs the enable GPIO with the PWM channel.

use tracing::info;

use crate::error::Result;
use crate::hw::gpio::SysfsGpio;
use crate::hw::pwm::SysfsPwm;

/// Raw fan hardware operations
///
/// No state is kept here; the actuator decides what to write and when.
#[cfg_attr(test, mockall::automock)]
pub trait FanDriver: Send {
    /// Claim and configure the lines
    fn initialize(&mut self) -> Result<()>;

    fn set_enable(&mut self, enabled: bool) -> Result<()>;

    /// Duty fraction in [0, 1]; 1.0 is no drive
    fn set_duty_cycle(&mut self, duty_cycle: f64) -> Result<()>;

    /// Give the lines back; they are left in whatever state was last written
    fn release(&mut self) -> Result<()>;
}

/// Enable GPIO plus PWM channel through sysfs
#[derive(Debug, Clone)]
pub struct SysfsFanDriver {
    enable: SysfsGpio,
    pwm: SysfsPwm,
}

impl SysfsFanDriver {
    pub fn new(enable: SysfsGpio, pwm: SysfsPwm) -> Self {
        Self { enable, pwm }
    }
}

impl FanDriver for SysfsFanDriver {
    fn initialize(&mut self) -> Result<()> {
        self.enable.export()?;
        self.enable.set_direction_out()?;
        self.pwm.initialize()?;
        info!(enable_line = self.enable.line(), "Fan hardware initialized");
        Ok(())
    }

    fn set_enable(&mut self, enabled: bool) -> Result<()> {
        self.enable.write(enabled)
    }

    fn set_duty_cycle(&mut self, duty_cycle: f64) -> Result<()> {
        self.pwm.set_duty_cycle(duty_cycle)
    }

    fn release(&mut self) -> Result<()> {
        // sysfs lines stay exported so the fan keeps its off state
        info!(enable_line = self.enable.line(), "Fan hardware released");
        Ok(())
    }
}
