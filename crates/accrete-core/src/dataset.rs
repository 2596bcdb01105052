//! Shared delimited-file helpers for sources and destinations
//!
//! Sources are opened read-only. Destinations are only ever opened in append
//! mode once they exist, so nothing here can truncate history.

use std::fs::{File, OpenOptions};
use std::io::{self, BufRead, BufReader, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use csv::{Reader, ReaderBuilder, StringRecord, Writer, WriterBuilder};
use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::error::{Error, Result};

/// Open a source or destination for reading
pub fn open_reader(path: &Path, delimiter: u8, has_headers: bool) -> Result<Reader<File>> {
    let file = File::open(path).map_err(|e| Error::file(path, e))?;
    Ok(ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(has_headers)
        .flexible(true)
        .from_reader(file))
}

/// Open an existing destination for appending records
///
/// The file must already exist (see [`crate::init`]). If the last line lacks a
/// terminator one is added first, so appended rows never fuse with it.
pub fn open_append(path: &Path, delimiter: u8) -> Result<Writer<File>> {
    let mut file = OpenOptions::new()
        .read(true)
        .append(true)
        .open(path)
        .map_err(|e| Error::file(path, e))?;

    if !ends_with_newline(&mut file).map_err(|e| Error::file(path, e))? {
        file.write_all(b"\n").map_err(|e| Error::file(path, e))?;
    }

    Ok(WriterBuilder::new()
        .delimiter(delimiter)
        .has_headers(false)
        .from_writer(file))
}

/// True for empty files and files whose last byte is `\n`
fn ends_with_newline(file: &mut File) -> io::Result<bool> {
    let len = file.metadata()?.len();
    if len == 0 {
        return Ok(true);
    }
    file.seek(SeekFrom::End(-1))?;
    let mut last = [0u8; 1];
    file.read_exact(&mut last)?;
    Ok(last[0] == b'\n')
}

/// Count physical lines in a file
pub fn count_lines(path: &Path) -> Result<usize> {
    let file = File::open(path).map_err(|e| Error::file(path, e))?;
    let mut count = 0;
    for line in BufReader::new(file).lines() {
        line.map_err(|e| Error::file(path, e))?;
        count += 1;
    }
    Ok(count)
}

/// A record with no fields, or only blank ones
pub fn is_blank(record: &StringRecord) -> bool {
    record.iter().all(|field| field.trim().is_empty())
}

/// Count records after the header, ignoring blank rows
pub fn count_data_rows(path: &Path, delimiter: u8) -> Result<usize> {
    let mut rdr = open_reader(path, delimiter, true)?;
    let mut count = 0;
    for result in rdr.records() {
        if !is_blank(&result?) {
            count += 1;
        }
    }
    Ok(count)
}

/// Find a column by name in a header record
pub fn column_index(headers: &StringRecord, column: &str, path: &Path) -> Result<usize> {
    headers
        .iter()
        .position(|h| h.trim() == column)
        .ok_or_else(|| Error::SchemaMismatch {
            path: path.to_path_buf(),
            column: column.to_string(),
        })
}

/// Snapshot of a destination used by status reporting
#[derive(Debug, Clone, Serialize)]
pub struct DatasetSummary {
    pub path: PathBuf,
    pub exists: bool,
    /// Records after the header
    pub data_rows: usize,
    /// Hex SHA-256 of the file contents
    pub digest: Option<String>,
}

/// Summarize a destination: existence, row count and content digest
pub fn summarize(path: &Path, delimiter: u8) -> Result<DatasetSummary> {
    if !path.exists() {
        return Ok(DatasetSummary {
            path: path.to_path_buf(),
            exists: false,
            data_rows: 0,
            digest: None,
        });
    }

    Ok(DatasetSummary {
        path: path.to_path_buf(),
        exists: true,
        data_rows: count_data_rows(path, delimiter)?,
        digest: Some(file_digest(path)?),
    })
}

/// Hex-encoded SHA-256 of a file's bytes
pub fn file_digest(path: &Path) -> Result<String> {
    let file = File::open(path).map_err(|e| Error::file(path, e))?;
    let mut reader = BufReader::new(file);
    let mut hasher = Sha256::new();
    let mut buffer = [0u8; 8192];
    loop {
        let bytes_read = reader.read(&mut buffer).map_err(|e| Error::file(path, e))?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(&buffer[..bytes_read]);
    }
    Ok(hex::encode(hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{read_lines, write_file};
    use tempfile::TempDir;

    #[test]
    fn test_count_lines() {
        let dir = TempDir::new().unwrap();
        let path = write_file(dir.path(), "a.csv", "h1,h2\n1,2\n3,4");
        assert_eq!(count_lines(&path).unwrap(), 3);

        let empty = write_file(dir.path(), "empty.csv", "");
        assert_eq!(count_lines(&empty).unwrap(), 0);
    }

    #[test]
    fn test_count_data_rows_ignores_header() {
        let dir = TempDir::new().unwrap();
        let header_only = write_file(dir.path(), "h.csv", "id,event_timestamp\n");
        assert_eq!(count_data_rows(&header_only, b',').unwrap(), 0);

        let with_rows = write_file(dir.path(), "r.csv", "id,event_timestamp\n1,x\n,\n2,y\n");
        assert_eq!(count_data_rows(&with_rows, b',').unwrap(), 2);
    }

    #[test]
    fn test_is_blank() {
        assert!(is_blank(&StringRecord::new()));
        assert!(is_blank(&StringRecord::from(vec!["", " "])));
        assert!(!is_blank(&StringRecord::from(vec!["", "x"])));
    }

    #[test]
    fn test_open_append_repairs_missing_newline() {
        let dir = TempDir::new().unwrap();
        let path = write_file(dir.path(), "d.csv", "user_id,created_at");

        let mut wtr = open_append(&path, b',').unwrap();
        wtr.write_record(["u1", "t1"]).unwrap();
        wtr.flush().unwrap();

        assert_eq!(read_lines(&path), vec!["user_id,created_at", "u1,t1"]);
    }

    #[test]
    fn test_open_append_missing_file() {
        let dir = TempDir::new().unwrap();
        let result = open_append(&dir.path().join("nope.csv"), b',');
        assert!(matches!(result, Err(Error::File { .. })));
    }

    #[test]
    fn test_column_index() {
        let headers = StringRecord::from(vec!["id", " amount ", "currency"]);
        let path = Path::new("deposits.csv");
        assert_eq!(column_index(&headers, "amount", path).unwrap(), 1);
        assert!(matches!(
            column_index(&headers, "tx_status", path),
            Err(Error::SchemaMismatch { .. })
        ));
    }

    #[test]
    fn test_summarize() {
        let dir = TempDir::new().unwrap();
        let path = write_file(dir.path(), "Users.csv", "user_id,created_at\nu1,t\n");

        let summary = summarize(&path, b',').unwrap();
        assert!(summary.exists);
        assert_eq!(summary.data_rows, 1);
        assert_eq!(summary.digest.as_deref().map(str::len), Some(64));

        let missing = summarize(&dir.path().join("Events.csv"), b',').unwrap();
        assert!(!missing.exists);
        assert!(missing.digest.is_none());
    }

    #[test]
    fn test_digest_changes_with_content() {
        let dir = TempDir::new().unwrap();
        let a = write_file(dir.path(), "a.csv", "id\n1\n");
        let b = write_file(dir.path(), "b.csv", "id\n2\n");
        let c = write_file(dir.path(), "c.csv", "id\n1\n");
        assert_ne!(file_digest(&a).unwrap(), file_digest(&b).unwrap());
        assert_eq!(file_digest(&a).unwrap(), file_digest(&c).unwrap());
    }
}
