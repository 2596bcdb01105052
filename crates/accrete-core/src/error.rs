//! Error types for accrete

use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("IO error on {path}: {source}")]
    File {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Invalid timestamp '{value}' (expected format {format})")]
    Timestamp { value: String, format: String },

    #[error("Invalid number in column '{column}': '{value}'")]
    Number { column: String, value: String },

    #[error("Column '{column}' not found in {path}")]
    SchemaMismatch { path: PathBuf, column: String },

    #[error("Incomplete record with id {id}: missing '{column}'")]
    IncompleteRecord { id: String, column: String },

    #[error("Key index error: {0}")]
    KeyIndex(#[from] rusqlite::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

/// Coarse classification of failures, used in run reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    IoFailure,
    ParseFailure,
    SchemaMismatch,
    IncompleteRecord,
    Config,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::IoFailure => "io_failure",
            Self::ParseFailure => "parse_failure",
            Self::SchemaMismatch => "schema_mismatch",
            Self::IncompleteRecord => "incomplete_record",
            Self::Config => "config",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Error {
    /// Attach the offending path to an IO error
    pub fn file(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::File {
            path: path.into(),
            source,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Io(_) | Self::File { .. } | Self::KeyIndex(_) => ErrorKind::IoFailure,
            Self::Csv(e) if e.is_io_error() => ErrorKind::IoFailure,
            Self::Csv(_) | Self::Timestamp { .. } | Self::Number { .. } => {
                ErrorKind::ParseFailure
            }
            Self::SchemaMismatch { .. } => ErrorKind::SchemaMismatch,
            Self::IncompleteRecord { .. } => ErrorKind::IncompleteRecord,
            Self::Config(_) => ErrorKind::Config,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
