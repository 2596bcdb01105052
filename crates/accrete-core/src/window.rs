//! Windowed append for append-only event sources
//!
//! On the first run (destination has no data rows) the whole source is
//! copied. Afterwards only rows stamped with the current UTC day are copied.
//!
//! No key-based dedup happens here: the source is trusted to be append-only
//! and deduplicated upstream. This is a weaker guarantee than identity merge.
//! A row from an earlier day that first shows up in a later run is silently
//! dropped, and a day missed because of a failed run is not recovered once
//! the window has moved on.

use std::path::Path;

use chrono::{NaiveDate, NaiveDateTime};
use csv::StringRecord;
use tracing::{debug, info};

use crate::dataset::{column_index, count_data_rows, is_blank, open_append, open_reader};
use crate::error::{Error, Result};
use crate::report::MergeStats;

#[derive(Debug, Clone)]
pub struct WindowOptions {
    pub delimiter: u8,
    pub timestamp_column: String,
    /// chrono format string for the timestamp column
    pub timestamp_format: String,
}

impl Default for WindowOptions {
    fn default() -> Self {
        Self {
            delimiter: b',',
            timestamp_column: "event_timestamp".to_string(),
            timestamp_format: "%Y-%m-%d %H:%M:%S%.f".to_string(),
        }
    }
}

/// The day whose rows are considered new
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessingWindow {
    pub day: NaiveDate,
}

impl ProcessingWindow {
    pub fn for_day(day: NaiveDate) -> Self {
        Self { day }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date == self.day
    }
}

/// Parse the date part of an event timestamp
///
/// Date-only formats are accepted as well as full date-time formats.
pub fn parse_event_date(value: &str, format: &str) -> Result<NaiveDate> {
    let value = value.trim();
    NaiveDateTime::parse_from_str(value, format)
        .map(|dt| dt.date())
        .or_else(|_| NaiveDate::parse_from_str(value, format))
        .map_err(|_| Error::Timestamp {
            value: value.to_string(),
            format: format.to_string(),
        })
}

/// Append source rows that fall inside `window`, or every row on bootstrap
///
/// Every timestamp is validated before anything is written, so a parse
/// failure leaves the destination untouched.
pub fn append_window(
    source: &Path,
    destination: &Path,
    options: &WindowOptions,
    window: ProcessingWindow,
) -> Result<MergeStats> {
    let bootstrap = count_data_rows(destination, options.delimiter)? == 0;
    if bootstrap {
        info!(
            "Events destination {} is empty, copying full backlog",
            destination.display()
        );
    }

    let mut rdr = open_reader(source, options.delimiter, true)?;
    let ts_index = column_index(rdr.headers()?, &options.timestamp_column, source)?;

    let mut stats = MergeStats::default();
    let mut delta: Vec<StringRecord> = Vec::new();

    for result in rdr.records() {
        let record = result?;
        stats.rows_read += 1;

        if is_blank(&record) {
            stats.skipped_blank += 1;
            continue;
        }

        let date = parse_event_date(
            record.get(ts_index).unwrap_or_default(),
            &options.timestamp_format,
        )?;

        if bootstrap || window.contains(date) {
            delta.push(record);
        } else {
            stats.skipped_out_of_window += 1;
        }
    }

    let mut wtr = open_append(destination, options.delimiter)?;
    for record in &delta {
        wtr.write_record(record)?;
    }
    wtr.flush().map_err(|e| Error::file(destination, e))?;
    stats.appended = delta.len();

    debug!("Processing window: {}", window.day);
    info!(
        "Events: {} appended, {} outside window{}",
        stats.appended,
        stats.skipped_out_of_window,
        if bootstrap { " (bootstrap)" } else { "" }
    );
    Ok(stats)
}
