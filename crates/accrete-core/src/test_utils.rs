//! Test utilities for accrete-core
//!
//! Fixture helpers for writing source/destination files into temp dirs and
//! reading them back.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDate, Utc};

use crate::clock::FixedClock;

/// Write `contents` to `dir/name` and return the path
pub fn write_file(dir: &Path, name: &str, contents: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, contents).unwrap();
    path
}

/// Non-empty lines of a file, without terminators
pub fn read_lines(path: &Path) -> Vec<String> {
    fs::read_to_string(path)
        .unwrap()
        .lines()
        .map(|l| l.trim_end_matches('\r').to_string())
        .filter(|l| !l.is_empty())
        .collect()
}

/// One column of every data row (header excluded)
pub fn read_column(path: &Path, index: usize) -> Vec<String> {
    let mut rdr = csv::ReaderBuilder::new()
        .flexible(true)
        .from_path(path)
        .unwrap();
    rdr.records()
        .map(|r| r.unwrap().get(index).unwrap_or_default().to_string())
        .collect()
}

pub fn utc(y: i32, m: u32, d: u32, h: u32, min: u32, s: u32) -> DateTime<Utc> {
    NaiveDate::from_ymd_opt(y, m, d)
        .unwrap()
        .and_hms_opt(h, min, s)
        .unwrap()
        .and_utc()
}

/// Clock pinned to 2024-07-14 09:30:00 UTC
pub fn fixed_clock() -> FixedClock {
    FixedClock(utc(2024, 7, 14, 9, 30, 0))
}
