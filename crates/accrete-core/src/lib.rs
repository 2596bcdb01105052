//! Accrete Core Library
//!
//! Incremental, append-only merging of newly arrived delimited records into
//! three destination datasets without duplicating rows across runs:
//! - Destination initializer (header-first files, never truncated)
//! - Identity merge (dedup by natural key through a pluggable key set)
//! - Windowed append (bootstrap copy, then the current UTC day only)
//! - Keyed reconciliation (parity-encoded ids plus anti-join)
//! - Pipeline runner producing a per-run report

pub mod clock;
pub mod config;
pub mod dataset;
pub mod error;
pub mod identity;
pub mod init;
pub mod keyset;
pub mod pipeline;
pub mod reconcile;
pub mod report;
pub mod window;

/// Fixture helpers for tests
#[cfg(test)]
pub mod test_utils;

pub use clock::{Clock, FixedClock, SystemClock};
pub use config::{IncompletePolicy, KeyIndexBackend, PipelineConfig};
pub use dataset::DatasetSummary;
pub use error::{Error, ErrorKind, Result};
pub use init::InitOutcome;
pub use keyset::{KeySet, MemoryKeySet, SqliteKeySet};
pub use pipeline::{run_pipeline, Pipeline};
pub use reconcile::TransactionClass;
pub use report::{MergeStats, Outcome, RunReport, Stage, StageReport};
pub use window::ProcessingWindow;
