//! Destination initializer
//!
//! Makes sure a destination exists and starts with its header before any merge
//! touches it. Existing content of any kind is left alone.

use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader};
use std::path::Path;

use csv::WriterBuilder;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::dataset::count_lines;
use crate::error::{Error, Result};

/// What the initializer did to a destination
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InitOutcome {
    /// File did not exist; created with header
    Created,
    /// File existed but had no lines; header written
    HeaderWritten,
    /// File already had content; untouched
    AlreadyPresent,
}

/// Ensure `path` exists and its first line is `header`
pub fn ensure_destination(path: &Path, header: &[String], delimiter: u8) -> Result<InitOutcome> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        if !parent.exists() {
            fs::create_dir_all(parent).map_err(|e| Error::file(parent, e))?;
            info!("Created directory: {}", parent.display());
        }
    }

    let outcome = if !path.exists() {
        InitOutcome::Created
    } else if count_lines(path)? == 0 {
        InitOutcome::HeaderWritten
    } else {
        check_existing_header(path, header, delimiter);
        debug!("Destination already initialized: {}", path.display());
        return Ok(InitOutcome::AlreadyPresent);
    };

    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| Error::file(path, e))?;

    let mut wtr = WriterBuilder::new()
        .delimiter(delimiter)
        .has_headers(false)
        .from_writer(file);
    wtr.write_record(header)?;
    wtr.flush().map_err(|e| Error::file(path, e))?;

    info!("Initialized {} with header", path.display());
    Ok(outcome)
}

/// Warn when an existing first line is not the expected header
fn check_existing_header(path: &Path, header: &[String], delimiter: u8) {
    let Ok(file) = File::open(path) else {
        return;
    };
    let mut first = String::new();
    if BufReader::new(file).read_line(&mut first).is_err() {
        return;
    }

    let expected = header.join(&(delimiter as char).to_string());
    if first.trim_end() != expected {
        warn!(
            "First line of {} does not match expected header '{}'; leaving it as is",
            path.display(),
            expected
        );
    }
}
