//! Command-line interface definitions.

pub mod check;
pub mod run;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use rust_decimal::Decimal;

/// Arbwatch - multi-exchange quote ingestion and arbitrage detection.
#[derive(Parser, Debug)]
#[command(name = "arbwatch")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true, default_value = "config.toml")]
    pub config: PathBuf,

    /// Override the log level (e.g. `debug`, `arbwatch=trace`)
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Connect to every enabled exchange and report opportunities
    Run(RunArgs),

    /// Validate the configuration file and each exchange's settings
    CheckConfig,
}

/// Arguments for `arbwatch run`.
#[derive(Parser, Debug, Default)]
pub struct RunArgs {
    /// Emit logs as JSON lines
    #[arg(long)]
    pub json_logs: bool,

    /// Override the minimum net profit, in percent
    #[arg(long)]
    pub min_profit: Option<Decimal>,
}
