//! Identity merge: dedup by natural key
//!
//! Keys already in the destination are loaded into a [`KeySet`]. Each source
//! row whose key is new is appended with an ingestion timestamp, and its key
//! is added to the set straight away so repeats within the same batch are
//! dropped too. Running the merge twice over the same input appends nothing
//! the second time.

use std::path::Path;

use tracing::{debug, info};

use crate::clock::{format_ingestion_timestamp, Clock};
use crate::dataset::{is_blank, open_append, open_reader};
use crate::error::{Error, Result};
use crate::keyset::KeySet;
use crate::report::MergeStats;

#[derive(Debug, Clone, Copy)]
pub struct IdentityOptions {
    pub delimiter: u8,
    /// Skip the first source row as a header
    pub source_has_header: bool,
}

impl Default for IdentityOptions {
    fn default() -> Self {
        Self {
            delimiter: b',',
            source_has_header: true,
        }
    }
}

/// Load the first column of every destination data row into `keys`
///
/// Returns the number of keys loaded.
pub fn load_existing_keys(
    destination: &Path,
    delimiter: u8,
    keys: &mut dyn KeySet,
) -> Result<usize> {
    let mut rdr = open_reader(destination, delimiter, true)?;
    let mut loaded = 0;
    keys.begin_bulk()?;
    for result in rdr.records() {
        let record = result?;
        if let Some(key) = record.get(0).filter(|k| !k.is_empty()) {
            keys.insert(key)?;
            loaded += 1;
        }
    }
    keys.commit_bulk()?;
    Ok(loaded)
}

/// Append identities from `source` whose key is not yet in `destination`
pub fn merge_identities(
    source: &Path,
    destination: &Path,
    options: &IdentityOptions,
    keys: &mut dyn KeySet,
    clock: &dyn Clock,
) -> Result<MergeStats> {
    let existing = load_existing_keys(destination, options.delimiter, keys)?;
    debug!(
        "Loaded {} existing identity keys into {} key set",
        existing,
        keys.name()
    );

    let mut rdr = open_reader(source, options.delimiter, options.source_has_header)?;
    let mut wtr = open_append(destination, options.delimiter)?;
    let mut stats = MergeStats::default();

    keys.begin_bulk()?;
    for result in rdr.records() {
        let record = result?;
        stats.rows_read += 1;

        let key = match record.get(0) {
            Some(key) if !key.is_empty() && !is_blank(&record) => key,
            _ => {
                stats.skipped_blank += 1;
                continue;
            }
        };

        if keys.contains(key)? {
            stats.skipped_existing += 1;
            continue;
        }

        let created_at = format_ingestion_timestamp(clock.now());
        wtr.write_record([key, created_at.as_str()])?;
        keys.insert(key)?;
        stats.appended += 1;
        debug!("Added identity {}", key);
    }

    wtr.flush().map_err(|e| Error::file(destination, e))?;
    keys.commit_bulk()?;

    info!(
        "Identities: {} appended, {} already present, {} blank",
        stats.appended, stats.skipped_existing, stats.skipped_blank
    );
    Ok(stats)
}
