//! Pipeline configuration
//!
//! Config is loaded with a three-layer resolution:
//! 1. An explicit path (CLI `--config`)
//! 2. An override in the data dir (~/.local/share/accrete/config/pipeline.toml)
//! 3. Embedded defaults (compiled into binary)
//!
//! Override files may be partial; keys they leave out keep their defaults.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Embedded default config (compiled into binary)
pub const DEFAULT_CONFIG: &str = include_str!("../../../config/pipeline.toml");

/// Backend used for the identity membership set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyIndexBackend {
    #[default]
    Memory,
    Sqlite,
}

/// What reconciliation does with rows that have an empty required field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IncompletePolicy {
    /// Skip the row and keep going
    #[default]
    Drop,
    /// Abort reconciliation for the whole class
    Reject,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdentityConfig {
    pub source: PathBuf,
    pub destination: PathBuf,
    pub header: Vec<String>,
    /// Treat the first source row as a header rather than a key
    pub source_has_header: bool,
    pub key_index: KeyIndexBackend,
    /// Location of the on-disk index (a temp file when unset)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub index_path: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventConfig {
    pub source: PathBuf,
    pub destination: PathBuf,
    pub header: Vec<String>,
    pub timestamp_column: String,
    /// chrono format string for the timestamp column
    pub timestamp_format: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionConfig {
    pub deposit_source: PathBuf,
    pub withdrawal_source: PathBuf,
    pub destination: PathBuf,
    pub header: Vec<String>,
    pub incomplete: IncompletePolicy,
}

/// Complete pipeline configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub delimiter: char,
    pub identities: IdentityConfig,
    pub events: EventConfig,
    pub transactions: TransactionConfig,
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            delimiter: ',',
            identities: IdentityConfig {
                source: PathBuf::from("input_data/user_id_sample_data.csv"),
                destination: PathBuf::from("output_data/Users.csv"),
                header: strings(&["user_id", "created_at"]),
                source_has_header: true,
                key_index: KeyIndexBackend::Memory,
                index_path: None,
            },
            events: EventConfig {
                source: PathBuf::from("input_data/event_sample_data.csv"),
                destination: PathBuf::from("output_data/Events.csv"),
                header: strings(&["id", "event_timestamp", "user_id", "event_name"]),
                timestamp_column: "event_timestamp".to_string(),
                timestamp_format: "%Y-%m-%d %H:%M:%S%.f".to_string(),
            },
            transactions: TransactionConfig {
                deposit_source: PathBuf::from("input_data/deposit_sample_data.csv"),
                withdrawal_source: PathBuf::from("input_data/withdrawals_sample_data.csv"),
                destination: PathBuf::from("output_data/Transactions.csv"),
                header: strings(&[
                    "id",
                    "event_timestamp",
                    "user_id",
                    "amount",
                    "currency",
                    "tx_status",
                    "transaction_type",
                ]),
                incomplete: IncompletePolicy::Drop,
            },
        }
    }
}

impl PipelineConfig {
    /// Load configuration using the default resolution order
    pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
        load_config(explicit_path)
    }

    /// Parse a (possibly partial) TOML document on top of the defaults
    pub fn from_toml(content: &str) -> Result<Self> {
        parse_config(content)
    }

    /// Delimiter as the single byte the csv crate expects
    pub fn delimiter_byte(&self) -> Result<u8> {
        u8::try_from(self.delimiter)
            .ok()
            .filter(|b| b.is_ascii())
            .ok_or_else(|| {
                Error::Config(format!(
                    "Delimiter must be a single ASCII character, got '{}'",
                    self.delimiter
                ))
            })
    }

    /// Resolve relative paths against `base`
    pub fn with_base_dir(mut self, base: &Path) -> Self {
        let rebase = |p: &mut PathBuf| {
            if p.is_relative() {
                *p = base.join(&*p);
            }
        };

        rebase(&mut self.identities.source);
        rebase(&mut self.identities.destination);
        if let Some(ref mut index) = self.identities.index_path {
            rebase(index);
        }
        rebase(&mut self.events.source);
        rebase(&mut self.events.destination);
        rebase(&mut self.transactions.deposit_source);
        rebase(&mut self.transactions.withdrawal_source);
        rebase(&mut self.transactions.destination);
        self
    }

    /// Every destination with its header, in pipeline order
    pub fn destinations(&self) -> Vec<(&Path, &[String])> {
        vec![
            (
                self.identities.destination.as_path(),
                self.identities.header.as_slice(),
            ),
            (
                self.events.destination.as_path(),
                self.events.header.as_slice(),
            ),
            (
                self.transactions.destination.as_path(),
                self.transactions.header.as_slice(),
            ),
        ]
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("Failed to serialize config: {}", e)))
    }
}

/// Default config override path
pub fn default_config_path() -> Option<PathBuf> {
    dirs::data_local_dir().map(|d| d.join("accrete").join("config").join("pipeline.toml"))
}

fn read_config_file(path: &Path) -> Result<String> {
    fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Failed to read {}: {}", path.display(), e)))
}

/// Load configuration (explicit path, then data dir override, then default)
fn load_config(explicit_path: Option<&Path>) -> Result<PipelineConfig> {
    let content = match explicit_path {
        Some(path) => {
            if !path.exists() {
                return Err(Error::Config(format!(
                    "Config file not found: {}",
                    path.display()
                )));
            }
            read_config_file(path)?
        }
        None => match default_config_path() {
            Some(ref path) if path.exists() => read_config_file(path)?,
            _ => DEFAULT_CONFIG.to_string(),
        },
    };

    parse_config(&content)
}

/// Raw config structure for TOML parsing
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawConfig {
    delimiter: Option<char>,
    identities: Option<RawIdentities>,
    events: Option<RawEvents>,
    transactions: Option<RawTransactions>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawIdentities {
    source: Option<PathBuf>,
    destination: Option<PathBuf>,
    header: Option<Vec<String>>,
    source_has_header: Option<bool>,
    key_index: Option<KeyIndexBackend>,
    index_path: Option<PathBuf>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawEvents {
    source: Option<PathBuf>,
    destination: Option<PathBuf>,
    header: Option<Vec<String>>,
    timestamp_column: Option<String>,
    timestamp_format: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawTransactions {
    deposit_source: Option<PathBuf>,
    withdrawal_source: Option<PathBuf>,
    destination: Option<PathBuf>,
    header: Option<Vec<String>>,
    incomplete: Option<IncompletePolicy>,
}

fn apply<T>(slot: &mut T, value: Option<T>) {
    if let Some(value) = value {
        *slot = value;
    }
}

/// Parse config from TOML content
fn parse_config(content: &str) -> Result<PipelineConfig> {
    let raw: RawConfig = toml::from_str(content)
        .map_err(|e| Error::Config(format!("Invalid config TOML: {}", e)))?;

    let mut config = PipelineConfig::default();

    apply(&mut config.delimiter, raw.delimiter);

    if let Some(ids) = raw.identities {
        let target = &mut config.identities;
        apply(&mut target.source, ids.source);
        apply(&mut target.destination, ids.destination);
        apply(&mut target.header, ids.header);
        apply(&mut target.source_has_header, ids.source_has_header);
        apply(&mut target.key_index, ids.key_index);
        if ids.index_path.is_some() {
            target.index_path = ids.index_path;
        }
    }

    if let Some(events) = raw.events {
        let target = &mut config.events;
        apply(&mut target.source, events.source);
        apply(&mut target.destination, events.destination);
        apply(&mut target.header, events.header);
        apply(&mut target.timestamp_column, events.timestamp_column);
        apply(&mut target.timestamp_format, events.timestamp_format);
    }

    if let Some(txs) = raw.transactions {
        let target = &mut config.transactions;
        apply(&mut target.deposit_source, txs.deposit_source);
        apply(&mut target.withdrawal_source, txs.withdrawal_source);
        apply(&mut target.destination, txs.destination);
        apply(&mut target.header, txs.header);
        apply(&mut target.incomplete, txs.incomplete);
    }

    validate(&config)?;
    Ok(config)
}

fn validate(config: &PipelineConfig) -> Result<()> {
    config.delimiter_byte()?;

    for (path, header) in config.destinations() {
        if header.is_empty() {
            return Err(Error::Config(format!(
                "Header for {} must not be empty",
                path.display()
            )));
        }
    }

    if config.identities.header.len() != 2 {
        return Err(Error::Config(
            "Identity header must name exactly two columns (key, ingestion timestamp)".into(),
        ));
    }

    if !config.transactions.header.iter().any(|c| c == "id") {
        return Err(Error::Config(
            "Transaction header must include an 'id' column".into(),
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_default_config() {
        let config = parse_config(DEFAULT_CONFIG).unwrap();
        assert_eq!(config, PipelineConfig::default());
    }

    #[test]
    fn test_partial_override_keeps_defaults() {
        let config = parse_config(
            r#"
            [identities]
            key_index = "sqlite"

            [transactions]
            incomplete = "reject"
            "#,
        )
        .unwrap();

        assert_eq!(config.identities.key_index, KeyIndexBackend::Sqlite);
        assert_eq!(config.transactions.incomplete, IncompletePolicy::Reject);
        assert_eq!(
            config.events.destination,
            PathBuf::from("output_data/Events.csv")
        );
        assert_eq!(config.delimiter, ',');
    }

    #[test]
    fn test_unknown_key_rejected() {
        let result = parse_config("[events]\nwindow = \"week\"\n");
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_invalid_delimiter() {
        let result = parse_config("delimiter = \"é\"\n");
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_identity_header_must_have_two_columns() {
        let result = parse_config("[identities]\nheader = [\"user_id\"]\n");
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_with_base_dir() {
        let config = PipelineConfig {
            transactions: TransactionConfig {
                destination: PathBuf::from("/var/data/Transactions.csv"),
                ..PipelineConfig::default().transactions
            },
            ..Default::default()
        }
        .with_base_dir(Path::new("/srv/etl"));

        assert_eq!(
            config.identities.source,
            PathBuf::from("/srv/etl/input_data/user_id_sample_data.csv")
        );
        // Absolute paths are left alone
        assert_eq!(
            config.transactions.destination,
            PathBuf::from("/var/data/Transactions.csv")
        );
    }

    #[test]
    fn test_missing_explicit_path() {
        let result = load_config(Some(Path::new("/nonexistent/pipeline.toml")));
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_to_toml_round_trips() {
        let config = PipelineConfig::default();
        let rendered = config.to_toml().unwrap();
        assert_eq!(parse_config(&rendered).unwrap(), config);
    }
}
