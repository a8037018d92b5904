//! Logging setup
//!
//! Text logs go to the systemd journal when it is reachable, otherwise to
//! stdout. JSON logs always go to stdout.

use std::path::Path;

use poe_core::constants::env as env_names;
use tracing_subscriber::EnvFilter;

const JOURNALD_SOCKET: &str = "/run/systemd/journal/socket";

/// Where log output ended up
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogSink {
    Journald,
    Stdout,
}

impl LogSink {
    pub fn describe(self) -> &'static str {
        match self {
            LogSink::Journald => "systemd journal",
            LogSink::Stdout => "stdout",
        }
    }
}

/// Pick the filter directive: CLI flag, then `POE_LOG`, then the configured level
pub fn filter_directive(cli_level: Option<&str>, env_value: Option<String>, config_level: &str) -> String {
    if let Some(level) = cli_level {
        return level.to_string();
    }
    match env_value {
        Some(value) if !value.trim().is_empty() => value,
        _ => config_level.to_string(),
    }
}

/// Install the global subscriber
pub fn init(directive: &str, format: &str) -> LogSink {
    if format == "json" {
        tracing_subscriber::fmt()
            .json()
            .with_target(false)
            .with_env_filter(EnvFilter::new(directive))
            .init();
        return LogSink::Stdout;
    }

    if Path::new(JOURNALD_SOCKET).exists() {
        match tracing_journald::layer() {
            Ok(journald_layer) => {
                use tracing_subscriber::prelude::*;
                tracing_subscriber::registry()
                    .with(journald_layer)
                    .with(EnvFilter::new(directive))
                    .init();
                return LogSink::Journald;
            }
            Err(e) => {
                eprintln!("Failed to create journald layer: {}, falling back to stdout", e);
            }
        }
    }

    tracing_subscriber::fmt()
        .with_target(false)
        .with_level(true)
        .with_env_filter(EnvFilter::new(directive))
        .init();
    LogSink::Stdout
}

/// Value of `POE_LOG`, if set
pub fn env_directive() -> Option<String> {
    std::env::var(env_names::LOG).ok()
}
