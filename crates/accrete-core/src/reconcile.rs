//! Keyed reconciliation for deposit and withdrawal streams
//!
//! Both streams number their transactions independently. Before merging into
//! the shared transactions dataset each source id is moved into a global id
//! space by parity:
//!
//! - deposit:    `2 * id`      (always even)
//! - withdrawal: `2 * id - 1`  (always odd)
//!
//! Rows whose global id is already in the destination are dropped (anti-join),
//! then rows with a missing required field are handled per
//! [`IncompletePolicy`]. Survivors are appended in the destination's column
//! order. Rows are never updated in place, so a status change upstream after
//! ingestion is not picked up.

use std::collections::HashSet;
use std::path::Path;

use csv::StringRecord;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::IncompletePolicy;
use crate::dataset::{column_index, is_blank, open_append, open_reader};
use crate::error::{Error, Result};
use crate::report::MergeStats;

/// Columns every deposit/withdrawal source must carry
pub const REQUIRED_COLUMNS: [&str; 6] = [
    "id",
    "event_timestamp",
    "user_id",
    "amount",
    "currency",
    "tx_status",
];

/// Destination column holding the class label
pub const LABEL_COLUMN: &str = "transaction_type";

const ID_POS: usize = 0;
const AMOUNT_POS: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionClass {
    Deposit,
    Withdrawal,
}

impl TransactionClass {
    /// Label written to the `transaction_type` column
    pub fn label(&self) -> &'static str {
        match self {
            Self::Deposit => "deposit",
            Self::Withdrawal => "withdrawal",
        }
    }

    /// Map a source-local id into the shared id space
    ///
    /// Returns None when the result would overflow.
    pub fn global_id(&self, source_id: i64) -> Option<i64> {
        let doubled = source_id.checked_mul(2)?;
        match self {
            Self::Deposit => Some(doubled),
            Self::Withdrawal => doubled.checked_sub(1),
        }
    }

    /// Class a global id belongs to
    pub fn of_global_id(id: i64) -> Self {
        if id % 2 == 0 {
            Self::Deposit
        } else {
            Self::Withdrawal
        }
    }
}

impl std::fmt::Display for TransactionClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ReconcileOptions {
    pub delimiter: u8,
    pub incomplete: IncompletePolicy,
}

impl Default for ReconcileOptions {
    fn default() -> Self {
        Self {
            delimiter: b',',
            incomplete: IncompletePolicy::Drop,
        }
    }
}

/// A source row projected onto the required columns
#[derive(Debug, Clone)]
struct TransactionRow {
    /// Global id, None when the source id is empty
    id: Option<i64>,
    /// Values in `REQUIRED_COLUMNS` order, as read
    values: Vec<String>,
}

impl TransactionRow {
    /// First required column with no value
    fn missing_column(&self) -> Option<&'static str> {
        if self.id.is_none() {
            return Some(REQUIRED_COLUMNS[ID_POS]);
        }
        self.values
            .iter()
            .position(|v| v.trim().is_empty())
            .map(|i| REQUIRED_COLUMNS[i])
    }
}

/// Where each destination column's value comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ColumnSource {
    Id,
    Label,
    Field(usize),
}

fn parse_number<T: std::str::FromStr>(column: &str, value: &str) -> Result<T> {
    value.trim().parse().map_err(|_| Error::Number {
        column: column.to_string(),
        value: value.to_string(),
    })
}

/// Load the required columns of a source and tag them with global ids
fn load_source(
    source: &Path,
    class: TransactionClass,
    delimiter: u8,
    stats: &mut MergeStats,
) -> Result<Vec<TransactionRow>> {
    let mut rdr = open_reader(source, delimiter, true)?;
    let headers = rdr.headers()?.clone();
    let indices = REQUIRED_COLUMNS
        .iter()
        .map(|column| column_index(&headers, column, source))
        .collect::<Result<Vec<_>>>()?;

    let mut rows = Vec::new();
    for result in rdr.records() {
        let record = result?;
        stats.rows_read += 1;

        if is_blank(&record) {
            stats.skipped_blank += 1;
            continue;
        }

        let values: Vec<String> = indices
            .iter()
            .map(|&i| record.get(i).unwrap_or_default().to_string())
            .collect();

        let raw_id = values[ID_POS].trim();
        let id = if raw_id.is_empty() {
            None
        } else {
            let source_id: i64 = parse_number(REQUIRED_COLUMNS[ID_POS], raw_id)?;
            let global = class
                .global_id(source_id)
                .filter(|_| source_id >= 1)
                .ok_or_else(|| Error::Number {
                    column: REQUIRED_COLUMNS[ID_POS].to_string(),
                    value: raw_id.to_string(),
                })?;
            Some(global)
        };

        let amount = values[AMOUNT_POS].trim();
        if !amount.is_empty() {
            parse_number::<f64>(REQUIRED_COLUMNS[AMOUNT_POS], amount)?;
        }

        rows.push(TransactionRow { id, values });
    }

    Ok(rows)
}

/// Read the destination header and the set of ids it already holds
fn load_destination(
    destination: &Path,
    delimiter: u8,
) -> Result<(Vec<ColumnSource>, HashSet<i64>)> {
    let mut rdr = open_reader(destination, delimiter, true)?;
    let headers = rdr.headers()?.clone();
    let id_index = column_index(&headers, REQUIRED_COLUMNS[ID_POS], destination)?;

    let layout = headers
        .iter()
        .map(|name| {
            let name = name.trim();
            if name == REQUIRED_COLUMNS[ID_POS] {
                Ok(ColumnSource::Id)
            } else if name == LABEL_COLUMN {
                Ok(ColumnSource::Label)
            } else {
                REQUIRED_COLUMNS
                    .iter()
                    .position(|c| *c == name)
                    .map(ColumnSource::Field)
                    .ok_or_else(|| Error::SchemaMismatch {
                        path: destination.to_path_buf(),
                        column: name.to_string(),
                    })
            }
        })
        .collect::<Result<Vec<_>>>()?;

    let mut existing = HashSet::new();
    for result in rdr.records() {
        let record = result?;
        if let Some(raw) = record.get(id_index).filter(|v| !v.trim().is_empty()) {
            existing.insert(parse_number::<i64>(REQUIRED_COLUMNS[ID_POS], raw)?);
        }
    }

    Ok((layout, existing))
}

fn render(
    row: &TransactionRow,
    id: i64,
    class: TransactionClass,
    layout: &[ColumnSource],
) -> StringRecord {
    let mut record = StringRecord::new();
    for column in layout {
        match *column {
            ColumnSource::Id => record.push_field(&id.to_string()),
            ColumnSource::Label => record.push_field(class.label()),
            ColumnSource::Field(i) => record.push_field(&row.values[i]),
        }
    }
    record
}

/// Append transactions of one class whose global id is not yet present
///
/// Nothing is written unless the whole source loads, so an error leaves the
/// destination as it was. The sibling class is unaffected.
pub fn reconcile_transactions(
    source: &Path,
    destination: &Path,
    class: TransactionClass,
    options: &ReconcileOptions,
) -> Result<MergeStats> {
    let mut stats = MergeStats::default();

    let rows = load_source(source, class, options.delimiter, &mut stats)?;
    let (layout, mut existing) = load_destination(destination, options.delimiter)?;
    debug!(
        "Reconciling {} {} rows against {} existing ids",
        rows.len(),
        class,
        existing.len()
    );

    let mut delta = Vec::new();
    for row in &rows {
        if row.id.is_some_and(|id| existing.contains(&id)) {
            stats.skipped_existing += 1;
            continue;
        }

        if let Some(column) = row.missing_column() {
            let id = row.values[ID_POS].clone();
            match options.incomplete {
                IncompletePolicy::Drop => {
                    warn!(
                        "Dropping incomplete {} row (id '{}'): missing {}",
                        class, id, column
                    );
                    stats.dropped_incomplete += 1;
                    continue;
                }
                IncompletePolicy::Reject => {
                    return Err(Error::IncompleteRecord {
                        id,
                        column: column.to_string(),
                    });
                }
            }
        }

        let Some(id) = row.id else { continue };
        // Repeats of an id within the same batch
        if !existing.insert(id) {
            stats.skipped_existing += 1;
            continue;
        }

        delta.push(render(row, id, class, &layout));
    }

    let mut wtr = open_append(destination, options.delimiter)?;
    for record in &delta {
        wtr.write_record(record)?;
    }
    wtr.flush().map_err(|e| Error::file(destination, e))?;
    stats.appended = delta.len();

    info!(
        "Transactions ({}): {} appended, {} already present, {} incomplete dropped",
        class, stats.appended, stats.skipped_existing, stats.dropped_incomplete
    );
    Ok(stats)
}
