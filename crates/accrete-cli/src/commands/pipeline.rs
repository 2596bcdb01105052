//! Pipeline command implementations (run, init, merge)

use std::path::Path;

use accrete_core::{Outcome, Pipeline, PipelineConfig, RunReport, Stage};
use anyhow::{Context, Result};

/// Resolve configuration, then rebase relative paths if a base dir is given
pub fn load_config(config_path: Option<&Path>, base_dir: Option<&Path>) -> Result<PipelineConfig> {
    let config = PipelineConfig::load(config_path).context("Failed to load pipeline config")?;
    match config_path {
        Some(path) => tracing::debug!("Loaded config from {}", path.display()),
        None => tracing::debug!("Loaded default config"),
    }
    Ok(match base_dir {
        Some(base) => {
            tracing::debug!("Resolving dataset paths against {}", base.display());
            config.with_base_dir(base)
        }
        None => config,
    })
}

pub fn cmd_run(config: &PipelineConfig, json: bool, strict: bool) -> Result<()> {
    let report = Pipeline::new(config.clone()).run();
    finish(&report, json, strict)
}

pub fn cmd_init(config: &PipelineConfig) -> Result<()> {
    println!("🔧 Initializing destinations...");
    let report = Pipeline::new(config.clone()).initialize();
    print_report(&report);
    finish_strict(&report)
}

pub fn cmd_merge(config: &PipelineConfig, dataset: &str, json: bool) -> Result<()> {
    let stage: Stage = dataset.parse().map_err(|e: String| anyhow::anyhow!(e))?;
    tracing::info!("Running {} stage only", stage);
    let report = Pipeline::new(config.clone()).run_stage(stage);
    finish(&report, json, true)
}

fn finish(report: &RunReport, json: bool, strict: bool) -> Result<()> {
    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(report).context("Failed to serialize run report")?
        );
    } else {
        print_report(report);
    }

    if strict {
        finish_strict(report)
    } else {
        Ok(())
    }
}

fn finish_strict(report: &RunReport) -> Result<()> {
    let failed = report.failures().count();
    if failed > 0 {
        for entry in report.failures() {
            tracing::warn!("{} did not complete: {:?}", entry.stage, entry.outcome);
        }
        anyhow::bail!("{} stage(s) failed", failed);
    }
    Ok(())
}

pub fn print_report(report: &RunReport) {
    println!();
    println!("📋 Run started {}", report.started_at.format("%Y-%m-%d %H:%M:%S UTC"));
    println!("   ─────────────────────────────────────────────────────────────");

    for entry in &report.stages {
        match &entry.outcome {
            Outcome::Initialized { result } => {
                println!("   🗂️  {:<18} {:?}", entry.stage.as_str(), result);
            }
            Outcome::Completed { stats } => {
                println!(
                    "   ✅ {:<18} +{} appended ({} read, {} existing)",
                    entry.stage.as_str(),
                    stats.appended,
                    stats.rows_read,
                    stats.skipped_existing
                );
                if stats.skipped_out_of_window > 0 {
                    println!("      Outside window: {}", stats.skipped_out_of_window);
                }
                if stats.dropped_incomplete > 0 {
                    println!("      Dropped incomplete: {}", stats.dropped_incomplete);
                }
                if stats.skipped_blank > 0 {
                    println!("      Blank rows: {}", stats.skipped_blank);
                }
            }
            Outcome::Failed { kind, message } => {
                println!("   ❌ {:<18} {}: {}", entry.stage.as_str(), kind, message);
            }
            Outcome::Skipped { reason } => {
                println!("   ⏭️  {:<18} skipped ({})", entry.stage.as_str(), reason);
            }
        }
    }

    println!();
    let failed = report.failures().count();
    if failed == 0 {
        println!("✅ Done: {} rows appended", report.total_appended());
    } else {
        println!(
            "⚠️  Done with {} failed stage(s): {} rows appended",
            failed,
            report.total_appended()
        );
        println!("   Failed datasets will be retried on the next run");
    }
}
