// src/cli.rs

//! CLI argument parsing using `clap`.

use clap::{Parser, ValueEnum};

/// Command-line arguments for `updatedag`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "updatedag",
    version,
    about = "Apply a batch of related entity updates in dependency order.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the config file (TOML).
    #[arg(long, value_name = "PATH", default_value = "Updatedag.toml")]
    pub config: String,

    /// Batch of pending entities (`.toml` or `.json`).
    #[arg(long, value_name = "PATH")]
    pub batch: String,

    /// Override `[config].max_concurrency`.
    #[arg(long, value_name = "N")]
    pub max_concurrency: Option<usize>,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `UPDATEDAG_LOG` or `info` is used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Build and order the batch, print the level plan, write nothing.
    #[arg(long)]
    pub dry_run: bool,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

pub fn parse() -> CliArgs {
    CliArgs::parse()
}
