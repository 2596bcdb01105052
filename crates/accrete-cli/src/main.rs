//! Accrete CLI - incremental append-only dataset merging
//!
//! Usage:
//!   accrete run               Initialize destinations and run every merge
//!   accrete merge events      Run a single dataset merge
//!   accrete status            Show destination row counts and digests

mod cli;
mod commands;

#[cfg(test)]
mod tests;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cli::*;

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging
    // Priority: RUST_LOG env var > --verbose flag > default (info)
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).compact())
        .init();

    let config = commands::load_config(cli.config.as_deref(), cli.base_dir.as_deref())?;

    match cli.command {
        Commands::Run { json, strict } => commands::cmd_run(&config, json, strict),
        Commands::Init => commands::cmd_init(&config),
        Commands::Merge { dataset, json } => commands::cmd_merge(&config, &dataset, json),
        Commands::Status { json } => commands::cmd_status(&config, json),
        Commands::Config => commands::cmd_config(&config),
    }
}
