//! Connector contract and a file-backed reference connector
//!
//! Connectors own fetching and parsing; the engine only sees the records
//! they return. `limit` and `since` are applied here, never re-applied by
//! the engine.

use super::cancel::CancellationToken;
use super::error::ConnectorError;
use super::record::IngestionRecord;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};

/// Fetch-side filters handed to a connector
#[derive(Debug, Clone, Default)]
pub struct ListOptions {
    /// Return at most this many records
    pub limit: Option<usize>,
    /// Best effort: return records updated at or after this instant
    pub since: Option<DateTime<Utc>>,
    pub cancel: Option<CancellationToken>,
}

impl ListOptions {
    fn check_cancelled(&self) -> Result<(), ConnectorError> {
        self.cancel.as_ref().map_or(Ok(()), CancellationToken::check)
    }

    /// Apply `since` then `limit` to an already-fetched list
    pub fn apply(&self, records: Vec<IngestionRecord>) -> Vec<IngestionRecord> {
        let mut records: Vec<IngestionRecord> = match self.since {
            // Records without a timestamp cannot be ruled out
            Some(since) => records
                .into_iter()
                .filter(|r| r.updated_at.map_or(true, |at| at >= since))
                .collect(),
            None => records,
        };
        if let Some(limit) = self.limit {
            records.truncate(limit);
        }
        records
    }
}

/// The contract every source connector implements
#[async_trait]
pub trait Connector: Send + Sync {
    /// Short connector type, e.g. "markdown" or "rss"
    fn kind(&self) -> &str;

    async fn list_records(
        &self,
        options: &ListOptions,
    ) -> Result<Vec<IngestionRecord>, ConnectorError>;
}

/// Reads pre-extracted records from a JSON array or JSON-lines file
#[derive(Debug, Clone)]
pub struct JsonFileConnector {
    path: PathBuf,
}

impl JsonFileConnector {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn parse(&self, raw: &str, options: &ListOptions) -> Result<Vec<IngestionRecord>, ConnectorError> {
        if raw.trim_start().starts_with('[') {
            return serde_json::from_str(raw).map_err(|e| ConnectorError::InvalidRecord {
                location: format!("{}:{}", self.path.display(), e.line()),
                reason: e.to_string(),
            });
        }

        let mut records = Vec::new();
        for (idx, line) in raw.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            options.check_cancelled()?;
            let record = serde_json::from_str(line).map_err(|e| ConnectorError::InvalidRecord {
                location: format!("{}:{}", self.path.display(), idx + 1),
                reason: e.to_string(),
            })?;
            records.push(record);
        }
        Ok(records)
    }
}

#[async_trait]
impl Connector for JsonFileConnector {
    fn kind(&self) -> &str {
        "json"
    }

    async fn list_records(
        &self,
        options: &ListOptions,
    ) -> Result<Vec<IngestionRecord>, ConnectorError> {
        options.check_cancelled()?;
        let raw = tokio::fs::read_to_string(&self.path).await?;
        options.check_cancelled()?;

        let records = self.parse(&raw, options)?;
        tracing::debug!(path = %self.path.display(), count = records.len(), "records read");
        Ok(options.apply(records))
    }
}
