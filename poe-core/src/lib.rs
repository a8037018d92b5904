//! rockpi-poe Core Library
//!
//! Temperature-driven fan control for the ROCK Pi PoE HAT.
//!
//! # Features
//!
//! - **Temperature Sources**: HAT thermistor (ADC) and kernel thermal zones
//! - **Composite Sensing**: hottest available source wins; failing sources are skipped
//! - **Tiered Policy**: four thresholds map temperature to five fan speeds
//! - **Actuation**: enable GPIO plus PWM channel through sysfs, with minimal writes
//! - **Metrics**: Prometheus registry and HTTP exposition
//!
//! # Module Structure
//!
//! - `hw/` - Hardware interaction (sensors, GPIO, PWM, actuator)
//! - `data/` - Data types and validation
//! - `engine/` - Speed policy and control loop
//! - `metrics/` - Metrics sink, registry and exporter
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use poe_core::{default_sensor_suite, Actuator, CompositeSensor, Config, ControlLoop, Metrics};
//!
//! # async fn run() -> poe_core::Result<()> {
//! let config = Config::load(None)?;
//! let metrics = Arc::new(Metrics::new());
//! let mut control = ControlLoop::new(
//!     CompositeSensor::new(default_sensor_suite(), metrics.clone()),
//!     Actuator::new(config.fan_driver()),
//!     config.thresholds()?,
//!     config.update_interval(),
//!     metrics,
//! );
//! control.start().await
//! # }
//! ```

// Grouped modules
pub mod data;
pub mod engine;
pub mod hw;
pub mod metrics;

// Standalone modules
pub mod config;
pub mod constants;
pub mod error;

// Re-export primary types from data/
pub use data::{ActuatorState, ApplyOutcome, SpeedTier, TemperatureReading};

// Re-export validation functions from data/
pub use data::{
    validate_duty_cycle, validate_log_format, validate_log_level, validate_metrics_host,
    validate_metrics_port, validate_pwm_period, validate_threshold_level,
    validate_update_interval,
};

// Re-export error types
pub use error::{PoeError, Result};

// Re-export engine types
pub use engine::{decide, ControlHandle, ControlLoop, LoopState, ThresholdSet, TickReport};

// Re-export hardware types from hw/
pub use hw::{
    default_sensor_suite, Actuator, CompositeSensor, FanDriver, SensorSource, SysfsFanDriver,
    SysfsGpio, SysfsPwm, TemperatureSource, ThermalZoneSensor, VoltageDividerSensor,
};

// Re-export metrics types
pub use metrics::{Metrics, MetricsServer, MetricsSink, NoopMetrics};

pub use config::{default_config_path, Config};
