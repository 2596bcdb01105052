//! CLI argument definitions using clap
//!
//! This module contains the clap structs for parsing CLI arguments.
//! The actual command implementations are in the `commands` module.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Accrete - append only what is new
#[derive(Parser)]
#[command(name = "accrete")]
#[command(about = "Incrementally merge new records into append-only datasets", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Pipeline config file (defaults to the data dir override, then built-in defaults)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Directory that relative paths in the config resolve against
    #[arg(long, global = true)]
    pub base_dir: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the full pipeline (initialize destinations, then every merge)
    Run {
        /// Print the run report as JSON
        #[arg(long)]
        json: bool,

        /// Exit with an error if any stage failed
        ///
        /// Useful when a scheduler should retry the whole cycle.
        #[arg(long)]
        strict: bool,
    },

    /// Create missing destinations with their headers
    Init,

    /// Run a single dataset merge
    Merge {
        /// Dataset: identities, events, deposits, withdrawals
        dataset: String,

        /// Print the run report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show destination row counts and content digests
    Status {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the resolved configuration
    Config,
}
