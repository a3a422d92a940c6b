//! YAML configuration for the `graphsync` binary
//!
//! Every section is optional; missing fields fall back to paths under the
//! platform data directory.

use crate::ingest::{DeleteMode, IngestOptions};
use crate::provenance::SourceIdentity;
use crate::storage::FileStoreOptions;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Provenance path that selects an in-memory SQLite database
pub const IN_MEMORY: &str = ":memory:";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_yaml::Error,
    },
}

/// `<data_dir>/graphsync`, e.g. `~/.local/share/graphsync`
pub fn default_data_dir() -> PathBuf {
    let data_dir = dirs::data_dir()
        .unwrap_or_else(|| dirs::home_dir().unwrap_or_default().join(".local/share"));
    data_dir.join("graphsync")
}

pub fn default_config_path() -> PathBuf {
    default_data_dir().join("config.yaml")
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphConfig {
    pub path: PathBuf,
    /// 0 defers every write to an explicit flush
    pub persist_interval_ms: u64,
    pub backups: bool,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            path: default_data_dir().join("graph.json"),
            persist_interval_ms: 0,
            backups: true,
        }
    }
}

impl GraphConfig {
    pub fn store_options(&self) -> FileStoreOptions {
        FileStoreOptions::default()
            .with_persist_interval_ms(self.persist_interval_ms)
            .with_backups(self.backups)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProvenanceConfig {
    /// SQLite file, or `:memory:`
    pub path: String,
}

impl Default for ProvenanceConfig {
    fn default() -> Self {
        Self {
            path: default_data_dir()
                .join("provenance.db")
                .to_string_lossy()
                .into_owned(),
        }
    }
}

impl ProvenanceConfig {
    pub fn is_in_memory(&self) -> bool {
        self.path == IN_MEMORY
    }
}

/// One configured source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceConfig {
    #[serde(rename = "type")]
    pub source_type: String,
    pub name: String,
    #[serde(default)]
    pub delete_mode: DeleteMode,
    /// Pre-extracted records read by the JSON connector
    #[serde(default)]
    pub records: Option<PathBuf>,
    #[serde(default)]
    pub config: Value,
}

impl SourceConfig {
    pub fn key(&self) -> String {
        format!("{}:{}", self.source_type, self.name)
    }

    pub fn identity(&self) -> SourceIdentity {
        SourceIdentity::new(&self.source_type, &self.name).with_config(self.config.clone())
    }

    /// Run options seeded from this source's settings
    pub fn ingest_options(&self) -> IngestOptions {
        IngestOptions::new(self.identity()).with_delete_mode(self.delete_mode)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub graph: GraphConfig,
    pub provenance: ProvenanceConfig,
    pub sources: Vec<SourceConfig>,
}

impl Config {
    /// Parse a config file. Relative `records` paths resolve against the
    /// file's directory.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config = Self::from_yaml(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;

        if let Some(base) = path.parent() {
            for source in &mut config.sources {
                if let Some(records) = source.records.as_mut() {
                    if records.is_relative() {
                        *records = base.join(&*records);
                    }
                }
            }
        }
        tracing::debug!(path = %path.display(), sources = config.sources.len(), "config loaded");
        Ok(config)
    }

    /// Load the default config file, or built-in defaults if there is none
    pub fn load_default() -> Result<Self, ConfigError> {
        let path = default_config_path();
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn from_yaml(raw: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(raw)
    }

    /// Look a source up by its `type:name` key
    pub fn source(&self, key: &str) -> Option<&SourceConfig> {
        self.sources.iter().find(|s| s.key() == key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
graph:
  path: /tmp/g/graph.json
  persist_interval_ms: 500
provenance:
  path: ":memory:"
sources:
  - type: markdown
    name: docs
    delete_mode: soft
    records: docs.jsonl
    config:
      root: ./docs
  - type: rss
    name: blog
"#;

    #[test]
    fn parses_full_file() {
        let config = Config::from_yaml(SAMPLE).unwrap();
        assert_eq!(config.graph.path, PathBuf::from("/tmp/g/graph.json"));
        assert_eq!(config.graph.persist_interval_ms, 500);
        assert!(config.graph.backups);
        assert!(config.provenance.is_in_memory());

        let docs = config.source("markdown:docs").unwrap();
        assert_eq!(docs.delete_mode, DeleteMode::Soft);
        assert_eq!(docs.identity().config["root"], "./docs");

        let blog = config.source("rss:blog").unwrap();
        assert_eq!(blog.delete_mode, DeleteMode::None);
        assert!(blog.records.is_none());
        assert!(config.source("rss:other").is_none());
    }

    #[test]
    fn empty_file_uses_defaults() {
        let config = Config::from_yaml("{}").unwrap();
        assert_eq!(config, Config::default());
        assert!(config.graph.path.ends_with("graphsync/graph.json"));
        assert!(config.provenance.path.ends_with("provenance.db"));
    }

    #[test]
    fn unknown_delete_mode_is_rejected() {
        let raw = "sources:\n  - type: a\n    name: b\n    delete_mode: purge\n";
        assert!(Config::from_yaml(raw).is_err());
    }

    #[test]
    fn load_resolves_records_relative_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("graphsync.yaml");
        std::fs::write(&path, SAMPLE).unwrap();

        let config = Config::load(&path).unwrap();
        let records = config.source("markdown:docs").unwrap().records.clone();
        assert_eq!(records, Some(dir.path().join("docs.jsonl")));
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = Config::load("/nonexistent/graphsync.yaml").unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
