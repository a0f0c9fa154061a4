//! CLI argument parsing structures.

use clap::{Args, Parser};
use std::path::PathBuf;

use super::commands::Commands;

/// Main CLI structure for switchback.
#[derive(Parser, Debug)]
#[command(name = "switchback", version)]
#[command(
    about = "Back up network switch running configurations",
    long_about = None
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Commands,
}

/// Arguments available to all commands.
#[derive(Debug, Default, Args)]
pub struct GlobalArgs {
    /// Config file to use instead of searching the standard locations
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Show debug logging
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    pub verbose: bool,

    /// Only print warnings and errors (for cron jobs)
    #[arg(short, long, global = true)]
    pub quiet: bool,
}
