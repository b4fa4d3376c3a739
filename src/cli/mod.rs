//! CLI definitions.

pub mod commands;

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "strategy-engine")]
#[command(author, version, about = "Concurrent strategy execution engine")]
pub struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = "config/default.toml")]
    pub config: PathBuf,

    /// Log level, overrides the configuration file
    #[arg(short, long)]
    pub log_level: Option<LogLevel>,

    /// Enable JSON log format
    #[arg(long)]
    pub json_logs: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run strategies against the paper exchange
    Run(RunArgs),
    /// List available strategies
    Strategies,
    /// Validate configuration
    ValidateConfig,
    /// Validate a strategy definition without running it
    ValidateStrategy(ValidateStrategyArgs),
}

#[derive(clap::Args)]
pub struct RunArgs {
    /// JSON file with the strategies to create
    #[arg(short, long, default_value = "config/strategies.json")]
    pub strategies: PathBuf,

    /// Stop after this many seconds instead of waiting for Ctrl-C
    #[arg(long)]
    pub duration: Option<u64>,

    /// Create the strategies without starting them
    #[arg(long)]
    pub no_start: bool,
}

#[derive(clap::Args)]
pub struct ValidateStrategyArgs {
    /// Strategy type (grid, dca, momentum)
    #[arg(short, long)]
    pub kind: String,

    /// Strategy parameters as a JSON object
    #[arg(short, long, default_value = "{}")]
    pub params: String,
}
