//! ## switchyard-cli
//! **Operational entrypoint**
//!
//! - `config`: print the effective layered configuration
//! - `soak`: drive a listener over the loopback transport and report pool statistics

use anyhow::Context;
use clap::Parser;
use switchyard_telemetry::EventLogger;

mod commands;
mod error;

use commands::{Cli, Commands};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = commands::load_config(cli.config.as_deref()).context("loading configuration")?;
    EventLogger::init(&config.telemetry.log_level).context("installing log subscriber")?;

    match cli.command {
        Commands::Config => println!("{}", config.to_yaml()?),
        Commands::Soak(args) => {
            let report = commands::run_soak(&args, &config).await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
    }
    Ok(())
}
