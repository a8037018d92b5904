//! Subcommand implementations

use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use tracing::{info, warn};

use poe_core::{
    default_sensor_suite, validate_log_format, validate_log_level, Actuator, CompositeSensor,
    Config, ControlLoop, Metrics, MetricsServer,
};

use crate::cli::{ConfigArgs, PidArgs, StartArgs, StopArgs};
use crate::logging;
use crate::pidfile::{self, InstanceStatus, PidFile};

const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Exit code of `status` when no controller is running (LSB)
pub const STATUS_NOT_RUNNING: i32 = 3;

pub async fn start(args: StartArgs) -> Result<()> {
    let mut config = Config::load(args.config.as_deref()).context("Failed to load configuration")?;
    if let Some(level) = args.log_level.as_deref() {
        config.log_level = validate_log_level(level)?;
    }
    if let Some(format) = args.log_format.as_deref() {
        config.log_format = validate_log_format(format)?;
    }

    let directive = logging::filter_directive(
        args.log_level.as_deref().map(|_| config.log_level.as_str()),
        logging::env_directive(),
        &config.log_level,
    );
    let sink = logging::init(&directive, &config.log_format);

    info!("STARTUP: rockpi-poe {} starting", VERSION);
    info!("STARTUP: Logging to {}", sink.describe());

    let pid_path = args.pid_file.unwrap_or_else(pidfile::default_pid_path);
    let pid_file = PidFile::acquire(&pid_path)
        .with_context(|| format!("Could not write PID file {}", pid_path.display()))?;
    info!("STARTUP: PID {} ({})", std::process::id(), pid_file.path().display());

    let metrics = Arc::new(Metrics::new());
    let mut control = ControlLoop::new(
        CompositeSensor::new(default_sensor_suite(), metrics.clone()),
        Actuator::new(config.fan_driver()),
        config.thresholds()?,
        config.update_interval(),
        metrics.clone(),
    );
    if config.metrics_enabled {
        control = control.with_exporter(MetricsServer::new(
            config.metrics_host.clone(),
            config.metrics_port,
            metrics,
        ));
    }

    let handle = control.handle();
    if let Err(e) = ctrlc::set_handler(move || {
        info!("SIGNAL: Received SIGINT/SIGTERM - stopping fan control");
        handle.cancel();
    }) {
        warn!("Failed to set signal handler: {}. Shutdown via signals may not work cleanly.", e);
    }

    let result = control.start().await;
    drop(pid_file);

    result.context("Fan controller failed to start")?;
    info!("SHUTDOWN: rockpi-poe terminated gracefully");
    Ok(())
}

pub fn stop(args: StopArgs) -> Result<()> {
    let pid_path = args.pid_file.unwrap_or_else(pidfile::default_pid_path);

    match pidfile::instance_status(&pid_path)? {
        InstanceStatus::Running(pid) => {
            // SAFETY: pid is a positive PID read from our own PID file and
            // confirmed alive; SIGTERM asks it to stop through its handler.
            if unsafe { libc::kill(pid, libc::SIGTERM) } != 0 {
                bail!(
                    "Failed to signal PID {}: {}",
                    pid,
                    std::io::Error::last_os_error()
                );
            }
            println!("Sent SIGTERM to rockpi-poe (PID {})", pid);
        }
        InstanceStatus::Stale(pid) => {
            remove_stale(&pid_path, pid);
            force_fan_off(args.config.as_deref())?;
        }
        InstanceStatus::NotRunning => {
            force_fan_off(args.config.as_deref())?;
        }
    }
    Ok(())
}

/// With no controller running, drive the hardware off directly
fn force_fan_off(config_path: Option<&Path>) -> Result<()> {
    let config = Config::load(config_path).context("Failed to load configuration")?;
    let mut actuator = Actuator::new(config.fan_driver());
    actuator
        .ensure_available()
        .context("Fan hardware is not available")?;
    actuator.shutdown();
    println!("rockpi-poe is not running; fan forced off");
    Ok(())
}

fn remove_stale(path: &Path, pid: i32) {
    match std::fs::remove_file(path) {
        Ok(()) => println!("Removed stale PID file {} (PID {})", path.display(), pid),
        Err(e) => eprintln!("Failed to remove stale PID file {}: {}", path.display(), e),
    }
}

/// Print the instance status; returns the process exit code
pub fn status(args: PidArgs) -> Result<i32> {
    let pid_path = args.pid_file.unwrap_or_else(pidfile::default_pid_path);

    Ok(match pidfile::instance_status(&pid_path)? {
        InstanceStatus::Running(pid) => {
            println!("rockpi-poe is running (PID {})", pid);
            0
        }
        InstanceStatus::Stale(pid) => {
            println!("rockpi-poe is not running (stale PID file for {})", pid);
            STATUS_NOT_RUNNING
        }
        InstanceStatus::NotRunning => {
            println!("rockpi-poe is not running");
            STATUS_NOT_RUNNING
        }
    })
}

/// Resolved configuration as pretty JSON
pub fn render_config(args: &ConfigArgs) -> Result<String> {
    let config = Config::load(args.config.as_deref()).context("Failed to load configuration")?;
    Ok(serde_json::to_string_pretty(&config)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    #[serial]
    fn test_render_config_merges_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{"lv0": 38, "metrics_port": 9100}"#).unwrap();

        let json = render_config(&ConfigArgs { config: Some(path) }).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["lv0"], 38.0);
        assert_eq!(value["metrics_port"], 9100);
        assert_eq!(value["fan_enable_pin"], 16);
    }

    #[test]
    #[serial]
    fn test_render_config_rejects_invalid_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{"lv0": 60}"#).unwrap();

        assert!(render_config(&ConfigArgs { config: Some(path) }).is_err());
    }

    #[test]
    fn test_status_of_missing_pid_file() {
        let dir = TempDir::new().unwrap();
        let code = status(PidArgs {
            pid_file: Some(dir.path().join("none.pid")),
        })
        .unwrap();
        assert_eq!(code, STATUS_NOT_RUNNING);
    }

    #[test]
    fn test_status_of_live_pid() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("poe.pid");
        fs::write(&path, format!("{}", std::process::id())).unwrap();

        assert_eq!(status(PidArgs { pid_file: Some(path) }).unwrap(), 0);
    }
}
