//! Command-line argument definitions.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Contest log analyzer.
///
/// Labels each contact as Run, S&P or Unknown and traces the cumulative
/// score hour by hour.
#[derive(Debug, Parser)]
#[command(name = "cla", version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to config file.
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Label every contact in a log with its operating style.
    Classify {
        /// Log file (JSON).
        log: PathBuf,

        /// Output as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Score one or more logs against a contest's rules.
    Analyze {
        /// Contest rules file (TOML).
        #[arg(short, long)]
        rules: PathBuf,

        /// Log files (JSON).
        #[arg(required = true)]
        logs: Vec<PathBuf>,

        /// Output as JSON.
        #[arg(long)]
        json: bool,
    },
}
