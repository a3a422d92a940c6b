//! Per-run ingestion options

use super::cancel::CancellationToken;
use crate::provenance::SourceIdentity;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// What happens to tracked items missing from a run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeleteMode {
    /// Leave them alone
    #[default]
    None,
    /// Tombstone the provenance row; the node stays in the graph
    Soft,
    /// Remove the node and the provenance row
    Hard,
}

impl FromStr for DeleteMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" => Ok(Self::None),
            "soft" => Ok(Self::Soft),
            "hard" => Ok(Self::Hard),
            other => Err(format!(
                "unknown delete mode '{other}' (expected none, soft or hard)"
            )),
        }
    }
}

impl std::fmt::Display for DeleteMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::None => "none",
            Self::Soft => "soft",
            Self::Hard => "hard",
        })
    }
}

/// Options for one `ingest`/`sync` call
#[derive(Debug, Clone)]
pub struct IngestOptions {
    pub source: SourceIdentity,
    pub delete_mode: DeleteMode,
    /// Compute stats without mutating either store
    pub dry_run: bool,
    /// Passed through to the connector
    pub limit: Option<usize>,
    /// Passed through to the connector
    pub since: Option<DateTime<Utc>>,
    /// Passed through to the connector
    pub cancel: Option<CancellationToken>,
}

impl IngestOptions {
    pub fn new(source: SourceIdentity) -> Self {
        Self {
            source,
            delete_mode: DeleteMode::None,
            dry_run: false,
            limit: None,
            since: None,
            cancel: None,
        }
    }

    pub fn with_delete_mode(mut self, mode: DeleteMode) -> Self {
        self.delete_mode = mode;
        self
    }

    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn with_since(mut self, since: DateTime<Utc>) -> Self {
        self.since = Some(since);
        self
    }

    pub fn with_cancel(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }
}
