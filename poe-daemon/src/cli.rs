//! Command Line Interface

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "rockpi-poe")]
#[command(version)]
#[command(about = "ROCK Pi 23W PoE HAT fan controller")]
#[command(long_about = "ROCK Pi 23W PoE HAT fan controller

Reads the HAT thermistor and the SoC thermal zones, and drives the HAT fan
in five steps based on the hottest reading.

EXAMPLES:
    rockpi-poe start                        Run the controller in the foreground
    rockpi-poe start --log-format json      Run with JSON logs
    rockpi-poe stop                         Stop a running controller
    rockpi-poe status                       Report whether a controller is running
    rockpi-poe config                       Print the resolved configuration

ENVIRONMENT VARIABLES:
    POE_LOG=debug                   Log filter (overrides log_level)
    POE_LV0..POE_LV3                Temperature thresholds in °C
    POE_UPDATE_INTERVAL             Seconds between updates
    POE_METRICS_PORT                Prometheus exporter port

FILES:
    /etc/rockpi-poe/config.json     Configuration
    /run/rockpi-poe.pid             PID of the running controller")]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the fan controller (runs until stopped)
    Start(StartArgs),

    /// Stop a running controller, or force the fan off if none is running
    Stop(StopArgs),

    /// Report whether a controller is running
    Status(PidArgs),

    /// Print the resolved configuration as JSON
    Config(ConfigArgs),
}

#[derive(Args, Debug)]
pub struct StartArgs {
    /// Configuration file (default: /etc/rockpi-poe/config.json)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Log level: trace, debug, info, warn, error
    #[arg(long)]
    pub log_level: Option<String>,

    /// Log format: text or json
    #[arg(long)]
    pub log_format: Option<String>,

    /// PID file location
    #[arg(long)]
    pub pid_file: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct StopArgs {
    /// Configuration file, used when the fan has to be forced off directly
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// PID file location
    #[arg(long)]
    pub pid_file: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct PidArgs {
    /// PID file location
    #[arg(long)]
    pub pid_file: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct ConfigArgs {
    /// Configuration file (default: /etc/rockpi-poe/config.json)
    #[arg(short, long)]
    pub config: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_start_options() {
        let cli = Cli::try_parse_from([
            "rockpi-poe",
            "start",
            "--config",
            "/tmp/poe.json",
            "--log-level",
            "debug",
            "--log-format",
            "json",
        ])
        .unwrap();

        match cli.command {
            Commands::Start(args) => {
                assert_eq!(args.config, Some(PathBuf::from("/tmp/poe.json")));
                assert_eq!(args.log_level.as_deref(), Some("debug"));
                assert_eq!(args.log_format.as_deref(), Some("json"));
                assert!(args.pid_file.is_none());
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_parse_stop_and_status() {
        let cli = Cli::try_parse_from(["rockpi-poe", "stop", "--pid-file", "/tmp/x.pid"]).unwrap();
        assert!(matches!(cli.command, Commands::Stop(ref a) if a.pid_file == Some(PathBuf::from("/tmp/x.pid"))));

        let cli = Cli::try_parse_from(["rockpi-poe", "status"]).unwrap();
        assert!(matches!(cli.command, Commands::Status(_)));
    }

    #[test]
    fn test_subcommand_required() {
        assert!(Cli::try_parse_from(["rockpi-poe"]).is_err());
    }
}
