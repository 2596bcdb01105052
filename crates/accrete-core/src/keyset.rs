//! Membership sets for identity keys
//!
//! `KeySet` is the seam between Identity Merge and the storage of keys already
//! seen. Two implementations:
//! - `MemoryKeySet` holds keys in a hash set
//! - `SqliteKeySet` keeps them in an on-disk SQLite index, for key counts
//!   that should not live in process memory
//!
//! Both are rebuilt from the destination on every run; neither carries state
//! between runs.

use std::collections::HashSet;
use std::path::Path;

use rusqlite::{params, Connection};
use tempfile::NamedTempFile;
use tracing::debug;

use crate::config::KeyIndexBackend;
use crate::error::{Error, Result};

pub trait KeySet {
    /// Human-readable name for this backend
    fn name(&self) -> &str;

    fn contains(&self, key: &str) -> Result<bool>;

    /// Add a key, returning true if it was not already present
    fn insert(&mut self, key: &str) -> Result<bool>;

    fn len(&self) -> Result<usize>;

    fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Start a batch of inserts that is committed as one unit
    fn begin_bulk(&mut self) -> Result<()> {
        Ok(())
    }

    /// Finish a batch started with [`KeySet::begin_bulk`]
    fn commit_bulk(&mut self) -> Result<()> {
        Ok(())
    }
}

/// In-memory hash set
#[derive(Debug, Default)]
pub struct MemoryKeySet {
    keys: HashSet<String>,
}

impl MemoryKeySet {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeySet for MemoryKeySet {
    fn name(&self) -> &str {
        "memory"
    }

    fn contains(&self, key: &str) -> Result<bool> {
        Ok(self.keys.contains(key))
    }

    fn insert(&mut self, key: &str) -> Result<bool> {
        Ok(self.keys.insert(key.to_string()))
    }

    fn len(&self) -> Result<usize> {
        Ok(self.keys.len())
    }
}

/// On-disk index backed by SQLite
pub struct SqliteKeySet {
    conn: Connection,
    /// Keeps a temporary index file alive for as long as the set
    _temp: Option<NamedTempFile>,
}

impl SqliteKeySet {
    /// Open (or create) an index at `path`, discarding any keys it holds
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        Self::init(conn, None)
    }

    /// Index in a temporary file removed when the set is dropped
    pub fn temporary() -> Result<Self> {
        let temp = NamedTempFile::new()?;
        let conn = Connection::open(temp.path())?;
        Self::init(conn, Some(temp))
    }

    fn init(conn: Connection, temp: Option<NamedTempFile>) -> Result<Self> {
        // The index is rebuilt every run, so durability is not needed
        conn.execute_batch(
            r#"
            PRAGMA journal_mode = OFF;
            PRAGMA synchronous = OFF;
            CREATE TABLE IF NOT EXISTS keys (key TEXT PRIMARY KEY) WITHOUT ROWID;
            DELETE FROM keys;
            "#,
        )?;
        debug!("Opened SQLite key index");
        Ok(Self { conn, _temp: temp })
    }
}

impl KeySet for SqliteKeySet {
    fn name(&self) -> &str {
        "sqlite"
    }

    fn contains(&self, key: &str) -> Result<bool> {
        let mut stmt = self
            .conn
            .prepare_cached("SELECT 1 FROM keys WHERE key = ?1")?;
        Ok(stmt.exists(params![key])?)
    }

    fn insert(&mut self, key: &str) -> Result<bool> {
        let mut stmt = self
            .conn
            .prepare_cached("INSERT OR IGNORE INTO keys (key) VALUES (?1)")?;
        Ok(stmt.execute(params![key])? == 1)
    }

    fn len(&self) -> Result<usize> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM keys", [], |row| row.get(0))?;
        usize::try_from(count).map_err(|_| Error::Config(format!("Invalid key count {}", count)))
    }

    fn begin_bulk(&mut self) -> Result<()> {
        if self.conn.is_autocommit() {
            self.conn.execute_batch("BEGIN")?;
        }
        Ok(())
    }

    fn commit_bulk(&mut self) -> Result<()> {
        if !self.conn.is_autocommit() {
            self.conn.execute_batch("COMMIT")?;
        }
        Ok(())
    }
}

/// Build the key set selected in configuration
pub fn open_key_set(
    backend: KeyIndexBackend,
    index_path: Option<&Path>,
) -> Result<Box<dyn KeySet>> {
    Ok(match backend {
        KeyIndexBackend::Memory => Box::new(MemoryKeySet::new()),
        KeyIndexBackend::Sqlite => match index_path {
            Some(path) => Box::new(SqliteKeySet::open(path)?),
            None => Box::new(SqliteKeySet::temporary()?),
        },
    })
}
