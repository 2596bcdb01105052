//! Status and config command implementations

use accrete_core::{Pipeline, PipelineConfig};
use anyhow::{Context, Result};

use super::short_digest;

pub fn cmd_status(config: &PipelineConfig, json: bool) -> Result<()> {
    let summaries = Pipeline::new(config.clone())
        .summaries()
        .context("Failed to read destinations")?;

    if json {
        println!("{}", serde_json::to_string_pretty(&summaries)?);
        return Ok(());
    }

    println!();
    println!("📊 Accrete Status");
    println!("   ─────────────────────────────────────────────────────────────");

    for summary in &summaries {
        println!("   {}", summary.path.display());
        match summary.digest {
            Some(ref digest) => {
                println!("      Rows: {}", summary.data_rows);
                println!("      SHA-256: {}…", short_digest(digest));
            }
            None => println!("      (not initialized)"),
        }
    }

    println!();
    Ok(())
}

pub fn cmd_config(config: &PipelineConfig) -> Result<()> {
    print!("{}", config.to_toml()?);
    Ok(())
}
