//! Controller configuration
//!
//! Values are layered: built-in defaults, then an optional JSON file
//! (`/etc/rockpi-poe/config.json` unless another path is given), then
//! `POE_*` environment variables. The result is validated before use.
//!
//! # Environment
//!
//! Names are matched case-insensitively. Thresholds accept both the short
//! form (`POE_LV0`) and the nested form (`POE_TEMPERATURE_LEVELS__LV0`).

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::{debug, info};

use crate::constants::{env as env_names, gpio, logging, metrics, paths, pwm, thresholds, timing};
use crate::data::{
    validate_log_format, validate_log_level, validate_metrics_host, validate_metrics_port,
    validate_pwm_period, validate_threshold_level, validate_update_interval,
};
use crate::engine::ThresholdSet;
use crate::error::{PoeError, Result};
use crate::hw::{SysfsFanDriver, SysfsGpio, SysfsPwm};

/// Resolved controller configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Temperature for 25% fan speed
    #[serde(default = "default_lv0")]
    pub lv0: f64,

    /// Temperature for 50% fan speed
    #[serde(default = "default_lv1")]
    pub lv1: f64,

    /// Temperature for 75% fan speed
    #[serde(default = "default_lv2")]
    pub lv2: f64,

    /// Temperature for 100% fan speed
    #[serde(default = "default_lv3")]
    pub lv3: f64,

    /// Seconds between control ticks (1-300)
    #[serde(default = "default_update_interval")]
    pub update_interval: f64,

    /// sysfs GPIO line of the fan enable signal
    #[serde(default = "default_enable_pin")]
    pub fan_enable_pin: u32,

    /// sysfs PWM chip number
    #[serde(default = "default_pwm_chip")]
    pub pwm_chip: u32,

    /// PWM channel on the chip
    #[serde(default = "default_pwm_channel")]
    pub fan_pwm_pin: u32,

    #[serde(default = "default_pwm_period")]
    pub pwm_period_ms: u32,

    #[serde(default = "default_metrics_host")]
    pub metrics_host: String,

    #[serde(default = "default_metrics_port")]
    pub metrics_port: u16,

    #[serde(default = "default_true")]
    pub metrics_enabled: bool,

    /// trace, debug, info, warn or error
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// text or json
    #[serde(default = "default_log_format")]
    pub log_format: String,
}

fn default_lv0() -> f64 { thresholds::DEFAULT_LV0 }
fn default_lv1() -> f64 { thresholds::DEFAULT_LV1 }
fn default_lv2() -> f64 { thresholds::DEFAULT_LV2 }
fn default_lv3() -> f64 { thresholds::DEFAULT_LV3 }
fn default_update_interval() -> f64 { timing::DEFAULT_UPDATE_INTERVAL_SECS }
fn default_enable_pin() -> u32 { gpio::DEFAULT_ENABLE_PIN }
fn default_pwm_chip() -> u32 { pwm::DEFAULT_CHIP }
fn default_pwm_channel() -> u32 { pwm::DEFAULT_CHANNEL }
fn default_pwm_period() -> u32 { pwm::DEFAULT_PERIOD_MS }
fn default_metrics_host() -> String { metrics::DEFAULT_HOST.to_string() }
fn default_metrics_port() -> u16 { metrics::DEFAULT_PORT }
fn default_true() -> bool { true }
fn default_log_level() -> String { logging::DEFAULT_LEVEL.to_string() }
fn default_log_format() -> String { logging::DEFAULT_FORMAT.to_string() }

impl Default for Config {
    fn default() -> Self {
        Self {
            lv0: default_lv0(),
            lv1: default_lv1(),
            lv2: default_lv2(),
            lv3: default_lv3(),
            update_interval: default_update_interval(),
            fan_enable_pin: default_enable_pin(),
            pwm_chip: default_pwm_chip(),
            fan_pwm_pin: default_pwm_channel(),
            pwm_period_ms: default_pwm_period(),
            metrics_host: default_metrics_host(),
            metrics_port: default_metrics_port(),
            metrics_enabled: default_true(),
            log_level: default_log_level(),
            log_format: default_log_format(),
        }
    }
}

/// Default configuration file location
pub fn default_config_path() -> PathBuf {
    Path::new(paths::CONFIG_DIR).join(paths::CONFIG_FILE)
}

fn parse_env<T: std::str::FromStr>(field: &str, raw: &str) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    raw.trim()
        .parse::<T>()
        .map_err(|e| PoeError::invalid_config(field, format!("'{}' from environment: {}", raw, e)))
}

fn parse_env_bool(field: &str, raw: &str) -> Result<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(PoeError::invalid_config(
            field,
            format!("'{}' from environment is not a boolean", raw),
        )),
    }
}

impl Config {
    /// Load defaults, the JSON file and the environment, then validate
    ///
    /// An explicit `path` must exist; the default path is optional.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => {
                let default_path = default_config_path();
                if default_path.exists() {
                    Self::from_file(&default_path)?
                } else {
                    debug!("No configuration file at {}, using defaults", default_path.display());
                    Self::default()
                }
            }
        };

        config.apply_env_overrides()?;
        config.normalize()?;
        config.validate()?;
        Ok(config)
    }

    /// Parse a JSON configuration file; missing keys take their defaults
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| PoeError::FileRead {
            path: path.to_path_buf(),
            source: e,
        })?;

        let config: Config = serde_json::from_str(&content).map_err(|e| {
            PoeError::config(format!("Failed to parse {}: {}", path.display(), e))
        })?;

        info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Apply `POE_*` variables from the process environment
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        self.apply_env(std::env::vars())
    }

    /// Apply `POE_*` variables from the given pairs; other names are ignored
    pub fn apply_env<I>(&mut self, vars: I) -> Result<()>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        for (name, value) in vars {
            let upper = name.to_ascii_uppercase();
            let Some(key) = upper.strip_prefix(env_names::PREFIX) else {
                continue;
            };

            match key {
                "LV0" | "TEMPERATURE_LEVELS__LV0" => self.lv0 = parse_env("lv0", &value)?,
                "LV1" | "TEMPERATURE_LEVELS__LV1" => self.lv1 = parse_env("lv1", &value)?,
                "LV2" | "TEMPERATURE_LEVELS__LV2" => self.lv2 = parse_env("lv2", &value)?,
                "LV3" | "TEMPERATURE_LEVELS__LV3" => self.lv3 = parse_env("lv3", &value)?,
                "UPDATE_INTERVAL" => self.update_interval = parse_env("update_interval", &value)?,
                "FAN_ENABLE_PIN" => self.fan_enable_pin = parse_env("fan_enable_pin", &value)?,
                "PWM_CHIP" => self.pwm_chip = parse_env("pwm_chip", &value)?,
                "FAN_PWM_PIN" => self.fan_pwm_pin = parse_env("fan_pwm_pin", &value)?,
                "PWM_PERIOD_MS" => self.pwm_period_ms = parse_env("pwm_period_ms", &value)?,
                "METRICS_HOST" => self.metrics_host = value.trim().to_string(),
                "METRICS_PORT" => self.metrics_port = parse_env("metrics_port", &value)?,
                "METRICS_ENABLED" => self.metrics_enabled = parse_env_bool("metrics_enabled", &value)?,
                "LOG_LEVEL" => self.log_level = value.trim().to_string(),
                "LOG_FORMAT" => self.log_format = value.trim().to_string(),
                _ => continue,
            }
            debug!("Configuration override from {}", name);
        }
        Ok(())
    }

    /// Canonicalize free-form string fields
    fn normalize(&mut self) -> Result<()> {
        self.log_level = validate_log_level(&self.log_level)?;
        self.log_format = validate_log_format(&self.log_format)?;
        self.metrics_host = validate_metrics_host(&self.metrics_host)?.to_string();
        Ok(())
    }

    /// Check every field; the first violation is returned
    pub fn validate(&self) -> Result<()> {
        validate_threshold_level("lv0", self.lv0)?;
        validate_threshold_level("lv1", self.lv1)?;
        validate_threshold_level("lv2", self.lv2)?;
        validate_threshold_level("lv3", self.lv3)?;
        self.thresholds()?;
        validate_update_interval(self.update_interval)?;
        validate_pwm_period(self.pwm_period_ms)?;
        validate_metrics_host(&self.metrics_host)?;
        validate_metrics_port(self.metrics_port)?;
        validate_log_level(&self.log_level)?;
        validate_log_format(&self.log_format)?;
        Ok(())
    }

    pub fn thresholds(&self) -> Result<ThresholdSet> {
        ThresholdSet::new(self.lv0, self.lv1, self.lv2, self.lv3)
    }

    pub fn update_interval(&self) -> Duration {
        Duration::from_secs_f64(self.update_interval)
    }

    /// sysfs driver for the configured enable line and PWM channel
    pub fn fan_driver(&self) -> SysfsFanDriver {
        SysfsFanDriver::new(
            SysfsGpio::new(self.fan_enable_pin),
            SysfsPwm::new(self.pwm_chip, self.fan_pwm_pin, self.pwm_period_ms),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::fs;
    use tempfile::TempDir;

    fn vars(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_defaults_are_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.fan_enable_pin, 16);
        assert_eq!(config.pwm_period_ms, 13);
        assert_eq!(config.metrics_port, 8000);
        assert_eq!(config.update_interval(), Duration::from_secs(10));
        assert_eq!(config.thresholds().unwrap(), ThresholdSet::default());
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{"lv0": 35, "metrics_enabled": false}"#).unwrap();

        let config = Config::from_file(&path).unwrap();
        assert_eq!(config.lv0, 35.0);
        assert_eq!(config.lv1, 45.0);
        assert!(!config.metrics_enabled);
        assert_eq!(config.log_format, "text");
    }

    #[test]
    fn test_malformed_file_is_config_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, "{ not json").unwrap();

        let err = Config::from_file(&path).unwrap_err();
        assert!(err.is_configuration_error());
    }

    #[test]
    fn test_missing_explicit_file_fails() {
        let dir = TempDir::new().unwrap();
        let err = Config::from_file(&dir.path().join("absent.json")).unwrap_err();
        assert!(matches!(err, PoeError::FileRead { .. }));
    }

    #[test]
    fn test_env_overrides_both_threshold_forms() {
        let mut config = Config::default();
        config
            .apply_env(vars(&[
                ("POE_LV0", "30"),
                ("poe_temperature_levels__lv3", "70"),
                ("POE_UPDATE_INTERVAL", "2.5"),
                ("POE_METRICS_ENABLED", "off"),
                ("HOME", "/root"),
            ]))
            .unwrap();

        assert_eq!(config.lv0, 30.0);
        assert_eq!(config.lv3, 70.0);
        assert_eq!(config.update_interval, 2.5);
        assert!(!config.metrics_enabled);
    }

    #[test]
    fn test_env_parse_error_names_field() {
        let mut config = Config::default();
        let err = config
            .apply_env(vars(&[("POE_METRICS_PORT", "eighty")]))
            .unwrap_err();
        assert!(matches!(err, PoeError::InvalidConfig { ref field, .. } if field == "metrics_port"));
    }

    #[test]
    fn test_validate_reports_first_bad_field() {
        let config = Config {
            lv1: 40.0,
            ..Config::default()
        };
        assert!(matches!(config.validate(), Err(PoeError::InvalidThresholds(_))));

        let config = Config {
            update_interval: 0.1,
            ..Config::default()
        };
        assert!(matches!(
            config.validate(),
            Err(PoeError::InvalidConfig { ref field, .. }) if field == "update_interval"
        ));

        let config = Config {
            metrics_port: 443,
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    #[serial]
    fn test_load_layers_file_then_environment() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{"lv2": 52, "log_level": "DEBUG"}"#).unwrap();

        std::env::set_var("POE_LV3", "60");
        std::env::set_var("POE_LOG_FORMAT", "JSON");
        let result = Config::load(Some(&path));
        std::env::remove_var("POE_LV3");
        std::env::remove_var("POE_LOG_FORMAT");

        let config = result.unwrap();
        assert_eq!(config.lv2, 52.0);
        assert_eq!(config.lv3, 60.0);
        assert_eq!(config.log_level, "debug");
        assert_eq!(config.log_format, "json");
    }

    #[test]
    #[serial]
    fn test_load_rejects_invalid_environment() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, "{}").unwrap();

        std::env::set_var("POE_LV0", "50");
        let result = Config::load(Some(&path));
        std::env::remove_var("POE_LV0");

        assert!(result.unwrap_err().is_configuration_error());
    }
}
