//! Sync run report

use crate::provenance::SourceId;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IngestStatus {
    Completed,
    Partial,
    Failed,
}

/// Counters for one run. `total` is the number of input records.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestStats {
    pub total: usize,
    pub created: usize,
    pub updated: usize,
    pub skipped: usize,
    pub deleted: usize,
    pub errors: usize,
}

/// A non-fatal failure tied to one record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordError {
    pub external_id: String,
    pub error: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestResult {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_id: Option<SourceId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sync_run_id: Option<String>,
    pub status: IngestStatus,
    pub stats: IngestStats,
    pub errors: Vec<RecordError>,
}

impl IngestStatus {
    /// `Failed` when every record of a non-empty batch errored,
    /// `Partial` when some did, `Completed` otherwise.
    pub fn from_stats(stats: &IngestStats) -> Self {
        if stats.errors == 0 {
            Self::Completed
        } else if stats.total > 0 && stats.errors >= stats.total {
            Self::Failed
        } else {
            Self::Partial
        }
    }
}
