//! CLI command tests
//!
//! This module contains all tests for the CLI commands.

use std::fs;
use std::path::Path;

use accrete_core::PipelineConfig;
use tempfile::TempDir;

use crate::commands::{self, short_digest};

fn write(dir: &Path, name: &str, contents: &str) {
    let path = dir.join(name);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, contents).unwrap();
}

fn seed_sources(dir: &Path) {
    write(dir, "input_data/user_id_sample_data.csv", "user_id\nu1\nu2\n");
    write(
        dir,
        "input_data/event_sample_data.csv",
        "id,event_timestamp,user_id,event_name\n1,2024-07-12 10:00:00.000000,u1,login\n",
    );
    write(
        dir,
        "input_data/deposit_sample_data.csv",
        "id,event_timestamp,user_id,amount,currency,tx_status\n1,2024-07-13 10:00:00,u1,100,USD,complete\n",
    );
    write(
        dir,
        "input_data/withdrawals_sample_data.csv",
        "id,event_timestamp,user_id,amount,currency,tx_status\n1,2024-07-13 12:00:00,u1,20,USD,complete\n",
    );
}

fn config_for(dir: &Path) -> PipelineConfig {
    PipelineConfig::default().with_base_dir(dir)
}

// ========== Config Tests ==========

#[test]
fn test_load_config_from_explicit_file() {
    let dir = TempDir::new().unwrap();
    write(
        dir.path(),
        "pipeline.toml",
        "[identities]\ndestination = \"out/People.csv\"\n",
    );

    let config =
        commands::load_config(Some(&dir.path().join("pipeline.toml")), Some(dir.path())).unwrap();

    assert_eq!(config.identities.destination, dir.path().join("out/People.csv"));
}

#[test]
fn test_load_config_without_base_dir_keeps_relative_paths() {
    let dir = TempDir::new().unwrap();
    write(
        dir.path(),
        "pipeline.toml",
        "[events]\ndestination = \"out/Events.csv\"\n",
    );

    let config = commands::load_config(Some(&dir.path().join("pipeline.toml")), None).unwrap();

    assert_eq!(config.events.destination, Path::new("out/Events.csv"));
}

#[test]
fn test_load_config_missing_file() {
    let dir = TempDir::new().unwrap();
    let result = commands::load_config(Some(&dir.path().join("nope.toml")), None);
    assert!(result.is_err());
}

#[test]
fn test_cmd_config() {
    assert!(commands::cmd_config(&PipelineConfig::default()).is_ok());
}

// ========== Pipeline Command Tests ==========

#[test]
fn test_cmd_run() {
    let dir = TempDir::new().unwrap();
    seed_sources(dir.path());
    let config = config_for(dir.path());

    commands::cmd_run(&config, false, true).unwrap();

    let users = fs::read_to_string(dir.path().join("output_data/Users.csv")).unwrap();
    assert_eq!(users.lines().count(), 3);
    let transactions =
        fs::read_to_string(dir.path().join("output_data/Transactions.csv")).unwrap();
    assert!(transactions.contains("2,2024-07-13 10:00:00,u1,100,USD,complete,deposit"));
    assert!(transactions.contains("1,2024-07-13 12:00:00,u1,20,USD,complete,withdrawal"));
}

#[test]
fn test_cmd_run_json() {
    let dir = TempDir::new().unwrap();
    seed_sources(dir.path());
    assert!(commands::cmd_run(&config_for(dir.path()), true, false).is_ok());
}

#[test]
fn test_cmd_run_strict_reports_failure() {
    let dir = TempDir::new().unwrap();
    seed_sources(dir.path());
    fs::remove_file(dir.path().join("input_data/deposit_sample_data.csv")).unwrap();
    let config = config_for(dir.path());

    // Without --strict the run still returns normally
    assert!(commands::cmd_run(&config, false, false).is_ok());
    assert!(commands::cmd_run(&config, false, true).is_err());
}

#[test]
fn test_cmd_init() {
    let dir = TempDir::new().unwrap();
    commands::cmd_init(&config_for(dir.path())).unwrap();

    let events = fs::read_to_string(dir.path().join("output_data/Events.csv")).unwrap();
    assert_eq!(events.trim_end(), "id,event_timestamp,user_id,event_name");
}

#[test]
fn test_cmd_merge_single_dataset() {
    let dir = TempDir::new().unwrap();
    seed_sources(dir.path());

    commands::cmd_merge(&config_for(dir.path()), "identities", false).unwrap();

    assert!(dir.path().join("output_data/Users.csv").exists());
    assert!(!dir.path().join("output_data/Events.csv").exists());
}

#[test]
fn test_cmd_merge_missing_source_fails() {
    let dir = TempDir::new().unwrap();
    seed_sources(dir.path());
    fs::remove_file(dir.path().join("input_data/withdrawals_sample_data.csv")).unwrap();

    let err = commands::cmd_merge(&config_for(dir.path()), "withdrawals", true).unwrap_err();

    assert!(err.to_string().contains("1 stage(s) failed"));
}

#[test]
fn test_cmd_merge_unknown_dataset() {
    let dir = TempDir::new().unwrap();
    let result = commands::cmd_merge(&config_for(dir.path()), "ledger", false);
    assert!(result.is_err());
}

// ========== Status Tests ==========

#[test]
fn test_cmd_status() {
    let dir = TempDir::new().unwrap();
    let config = config_for(dir.path());

    // Works before anything exists
    assert!(commands::cmd_status(&config, false).is_ok());

    seed_sources(dir.path());
    commands::cmd_run(&config, false, true).unwrap();
    assert!(commands::cmd_status(&config, false).is_ok());
    assert!(commands::cmd_status(&config, true).is_ok());
}

#[test]
fn test_rerun_leaves_transactions_identical() {
    let dir = TempDir::new().unwrap();
    seed_sources(dir.path());
    let config = config_for(dir.path());
    let path = dir.path().join("output_data/Transactions.csv");

    commands::cmd_run(&config, false, true).unwrap();
    let first = fs::read(&path).unwrap();
    commands::cmd_run(&config, false, true).unwrap();

    assert_eq!(fs::read(&path).unwrap(), first);
}

#[test]
fn test_short_digest() {
    assert_eq!(short_digest("0123456789abcdef"), "0123456789ab");
    assert_eq!(short_digest("abc"), "abc");
}
