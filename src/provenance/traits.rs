//! Provenance store contract

use super::types::{SourceId, SourceIdentity, SourceItem};
use chrono::{DateTime, Utc};
use thiserror::Error;

/// Errors that can occur in provenance operations
#[derive(Debug, Error)]
pub enum ProvenanceError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Concurrent write to {source_id}/{external_id}")]
    Conflict {
        source_id: SourceId,
        external_id: String,
    },

    #[error("Provenance store unavailable: {0}")]
    Unavailable(String),

    #[error("Date parsing error: {0}")]
    DateParse(String),
}

/// Result type for provenance operations
pub type ProvenanceResult<T> = Result<T, ProvenanceError>;

/// Durable mapping from `(source, external id)` to graph node and content hash
///
/// At most one [`SourceItem`] exists per `(source_id, external_id)`.
pub trait ProvenanceStore: Send + Sync {
    /// Map a source identity to its stable id, creating one on first use.
    /// A changed `config` is recorded without changing the id.
    fn resolve_source_id(&self, identity: &SourceIdentity) -> ProvenanceResult<SourceId>;

    /// Read-only lookup of a source id; never registers the source
    fn find_source_id(&self, identity: &SourceIdentity) -> ProvenanceResult<Option<SourceId>>;

    fn find_source_item(
        &self,
        source_id: &SourceId,
        external_id: &str,
    ) -> ProvenanceResult<Option<SourceItem>>;

    /// Insert or overwrite by key. The item's `revision` must equal the
    /// stored revision (0 for a new row), otherwise `Conflict`.
    /// Returns the item as stored, with its new revision.
    fn upsert_source_item(&self, item: &SourceItem) -> ProvenanceResult<SourceItem>;

    /// Items for a source ordered by external id
    fn list_items_for_source(
        &self,
        source_id: &SourceId,
        include_deleted: bool,
    ) -> ProvenanceResult<Vec<SourceItem>>;

    /// Set `deleted_at`. Marking an already-deleted or absent item is a no-op.
    fn mark_deleted(
        &self,
        source_id: &SourceId,
        external_id: &str,
        at: DateTime<Utc>,
    ) -> ProvenanceResult<()>;

    /// Hard-remove the row. Returns whether a row existed.
    fn delete_item(&self, source_id: &SourceId, external_id: &str) -> ProvenanceResult<bool>;
}
