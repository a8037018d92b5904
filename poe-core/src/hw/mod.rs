//! Hardware interaction modules
//!
//! Contains all low-level access to the HAT: temperature sources, the
//! enable GPIO and the PWM channel.

mod actuator;
mod composite;
mod control;
mod driver;
mod gpio;
mod pwm;
mod sensors;

pub use actuator::Actuator;
pub use composite::CompositeSensor;
pub use control::{read_raw_integer, write_attribute};
pub use driver::{FanDriver, SysfsFanDriver};
pub use gpio::SysfsGpio;
pub use pwm::SysfsPwm;
pub use sensors::{
    default_sensor_suite, SensorSource, TemperatureSource, ThermalZoneSensor,
    VoltageDividerSensor,
};

#[cfg(test)]
pub(crate) use driver::MockFanDriver;
