//! CLI entry point for the insole logger.
//!
//! Loads the configuration, sets up tracing, then runs the startup sequence and the
//! acquisition loop against host peripherals on a single-threaded runtime.
//!
//! # Usage
//!
//! ```bash
//! insole_logger --config config/insole_logger.toml
//! INSOLE_LOGGER_NETWORK__PORT=2323 insole_logger
//! ```
//!
//! A fatal error raises the fault indicator. With `application.halt_on_fatal` set the
//! process then stays parked; otherwise it exits with a failure status.

use anyhow::Result;
use clap::Parser;
use insole_logger::config::DEFAULT_CONFIG_PATH;
use insole_logger::logger::host_transport;
use insole_logger::{run_supervised, tracing_init, LoggerConfig, LoggerContext, Peripherals};
use std::path::PathBuf;
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "insole_logger")]
#[command(about = "Insole FSR data logger", long_about = None)]
struct Cli {
    /// Configuration file (TOML)
    #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = LoggerConfig::load_from(&cli.config)?;
    tracing_init::init_from_config(&config)?;
    info!(
        name = %config.application.name,
        config = %cli.config.display(),
        channels = config.channels.len(),
        "Starting"
    );

    let halt_on_fatal = config.application.halt_on_fatal;
    let transport = host_transport(&config);
    let peripherals = Peripherals::host(&config);
    let context = LoggerContext::new(config, peripherals)?;

    let err = match run_supervised(&context, transport).await {
        Ok(never) => match never {},
        Err(err) => err,
    };
    if halt_on_fatal {
        error!("Halted; restart the logger to resume");
        std::future::pending::<()>().await;
    }
    Err(err.into())
}
