//! Constants and configuration values for rockpi-poe
//!
//! Centralizes all magic numbers, paths, and configuration defaults.
//! Never use magic numbers in other files - add them here first.

use std::time::Duration;

/// System paths for the PoE HAT sensors and configuration
pub mod paths {
    /// ADC channel wired to the HAT's voltage-divider thermistor
    pub const ADC_RAW: &str = "/sys/bus/iio/devices/iio:device0/in_voltage0_raw";

    /// Base directory of the kernel thermal zones
    pub const THERMAL_BASE: &str = "/sys/class/thermal";

    /// Base directory of the sysfs GPIO interface
    pub const GPIO_BASE: &str = "/sys/class/gpio";

    /// Base directory of the sysfs PWM interface
    pub const PWM_BASE: &str = "/sys/class/pwm";

    /// Configuration directory
    pub const CONFIG_DIR: &str = "/etc/rockpi-poe";

    /// Configuration file inside CONFIG_DIR
    pub const CONFIG_FILE: &str = "config.json";

    /// Default PID file location
    pub const PID_FILE: &str = "/run/rockpi-poe.pid";

    /// Fallback PID file location when /run does not exist
    pub const PID_FILE_FALLBACK: &str = "/var/run/rockpi-poe.pid";

    /// Path of the temperature file for a thermal zone
    pub fn thermal_zone(zone_id: u32) -> std::path::PathBuf {
        std::path::Path::new(THERMAL_BASE).join(format!("thermal_zone{}/temp", zone_id))
    }
}

/// Temperature conversion constants
pub mod temperature {
    /// Kernel thermal zones report millidegrees Celsius
    pub const MILLIDEGREE_DIVISOR: f64 = 1000.0;

    /// Voltage-divider conversion: celsius = OFFSET + (REFERENCE - raw) * SLOPE
    pub const DIVIDER_OFFSET_CELSIUS: f64 = 42.0;
    pub const DIVIDER_REFERENCE_CODE: f64 = 960.0;
    pub const DIVIDER_SLOPE: f64 = 0.05;

    /// Label reported for the aggregate of all sources
    pub const COMPOSITE_LABEL: &str = "composite";

    /// Label reported for the voltage-divider source
    pub const ADC_LABEL: &str = "adc";
}

/// Default temperature thresholds (degrees Celsius)
pub mod thresholds {
    /// Temperature for 25% fan speed
    pub const DEFAULT_LV0: f64 = 40.0;
    /// Temperature for 50% fan speed
    pub const DEFAULT_LV1: f64 = 45.0;
    /// Temperature for 75% fan speed
    pub const DEFAULT_LV2: f64 = 50.0;
    /// Temperature for 100% fan speed
    pub const DEFAULT_LV3: f64 = 55.0;

    /// Allowed range for any configured threshold
    pub const MIN_LEVEL: f64 = 0.0;
    pub const MAX_LEVEL: f64 = 100.0;
}

/// Duty cycle values per speed tier
///
/// The HAT drives the fan through an inverting stage: 1.0 is no drive, 0.0 is full drive.
pub mod duty {
    pub const OFF: f64 = 1.0;
    pub const LOW: f64 = 0.75;
    pub const MEDIUM: f64 = 0.5;
    pub const HIGH: f64 = 0.25;
    pub const FULL: f64 = 0.0;

    /// Duty changes at or below this delta are not written to hardware
    pub const NOISE_THRESHOLD: f64 = 0.01;
}

/// PWM hardware constants
pub mod pwm {
    /// Default PWM period (13 ms)
    pub const DEFAULT_PERIOD_MS: u32 = 13;
    pub const MIN_PERIOD_MS: u32 = 1;
    pub const MAX_PERIOD_MS: u32 = 1000;

    pub const NANOS_PER_MILLI: u64 = 1_000_000;

    /// Default sysfs PWM chip and channel
    pub const DEFAULT_CHIP: u32 = 0;
    pub const DEFAULT_CHANNEL: u32 = 0;

    /// Convert a duty fraction to nanoseconds of a period
    pub fn duty_to_ns(duty_cycle: f64, period_ns: u64) -> u64 {
        (duty_cycle.clamp(0.0, 1.0) * period_ns as f64).round() as u64
    }
}

/// GPIO constants
pub mod gpio {
    /// Default GPIO line of the fan enable signal
    pub const DEFAULT_ENABLE_PIN: u32 = 16;

    pub const DIRECTION_OUT: &str = "out";
    pub const HIGH: &str = "1";
    pub const LOW: &str = "0";
}

/// Timing constants
pub mod timing {
    use super::Duration;

    /// Default tick interval in seconds
    pub const DEFAULT_UPDATE_INTERVAL_SECS: f64 = 10.0;
    pub const MIN_UPDATE_INTERVAL_SECS: f64 = 1.0;
    pub const MAX_UPDATE_INTERVAL_SECS: f64 = 300.0;

    /// Time given to udev to apply permissions after a sysfs export
    pub const EXPORT_SETTLE: Duration = Duration::from_millis(100);
}

/// Metrics exposition constants
pub mod metrics {
    use super::Duration;

    /// Metric name prefix
    pub const PREFIX: &str = "rockpi_poe";

    pub const DEFAULT_HOST: &str = "0.0.0.0";
    pub const DEFAULT_PORT: u16 = 8000;
    pub const MIN_PORT: u16 = 1024;

    /// Temperature histogram buckets (degrees Celsius)
    pub const TEMPERATURE_BUCKETS: &[f64] = &[
        20.0, 25.0, 30.0, 35.0, 40.0, 45.0, 50.0, 55.0, 60.0, 65.0, 70.0, 75.0, 80.0,
    ];

    /// Maximum size of an HTTP request head
    pub const MAX_REQUEST_SIZE: usize = 8 * 1024;

    /// Read timeout per request
    pub const READ_TIMEOUT: Duration = Duration::from_secs(5);

    /// Maximum concurrent scrape connections
    pub const MAX_CONNECTIONS: usize = 16;

    /// Prometheus text exposition content type
    pub const CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";
}

/// Logging defaults
pub mod logging {
    pub const DEFAULT_LEVEL: &str = "info";
    pub const DEFAULT_FORMAT: &str = "text";
    pub const LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];
    pub const FORMATS: &[&str] = &["text", "json"];
}

/// Environment variable names
pub mod env {
    pub const PREFIX: &str = "POE_";
    pub const LOG: &str = "POE_LOG";
}
