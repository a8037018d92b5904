//! rockpi-poe daemon
//!
//! Foreground fan controller for the ROCK Pi 23W PoE HAT, plus the `stop`,
//! `status` and `config` helpers.
//!
//! # Runtime
//! - **Scheduling**: single-threaded tokio runtime; the control loop sleeps between ticks
//! - **Signals**: SIGINT/SIGTERM request a stop; the fan is always left off
//! - **Instances**: a PID file prevents two controllers driving the same fan
//! - **Logging**: systemd journal when available, stdout otherwise

mod cli;
mod commands;
mod logging;
mod pidfile;

use clap::Parser;

use crate::cli::{Cli, Commands};

fn install_panic_hook() {
    std::panic::set_hook(Box::new(|panic_info| {
        let location = panic_info
            .location()
            .map(|l| format!("{}:{}:{}", l.file(), l.line(), l.column()))
            .unwrap_or_else(|| "unknown".to_string());
        let message = if let Some(s) = panic_info.payload().downcast_ref::<&str>() {
            s.to_string()
        } else if let Some(s) = panic_info.payload().downcast_ref::<String>() {
            s.clone()
        } else {
            "Unknown panic".to_string()
        };

        // stderr is captured by journald when running as a service
        eprintln!("PANIC at {}: {}", location, message);
    }));
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    install_panic_hook();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Start(args) => commands::start(args).await,
        Commands::Stop(args) => commands::stop(args),
        Commands::Status(args) => match commands::status(args) {
            Ok(code) => std::process::exit(code),
            Err(e) => Err(e),
        },
        Commands::Config(args) => commands::render_config(&args).map(|json| println!("{}", json)),
    };

    if let Err(e) = result {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}
