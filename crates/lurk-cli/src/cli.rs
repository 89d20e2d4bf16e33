//! Command-line argument definitions.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Channel presence statistics from irssi logs.
///
/// Reads channel logs in order, tracks how long each participant stays and
/// how much they say, and keeps the totals across runs in a state file.
#[derive(Debug, Parser)]
#[command(name = "lurk", version, about, long_about = None)]
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
    /// Fold log files into session statistics.
    Ingest {
        /// Log files, processed in the order given.
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Load prior state from this file before processing.
        #[arg(short, long)]
        read: Option<PathBuf>,

        /// Write the resulting state to this file.
        #[arg(short, long)]
        write: Option<PathBuf>,
    },

    /// Rank idlers and talkers from a state file.
    Report {
        /// State file (defaults to the configured `state_path`).
        state: Option<PathBuf>,

        /// Output as JSON.
        #[arg(long)]
        json: bool,
    },
}
