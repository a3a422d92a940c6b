//! Ingestion error taxonomy
//!
//! Lower-layer errors are folded into [`IngestError`] so the engine can
//! decide per error whether to record it against one record or abort.

use crate::provenance::ProvenanceError;
use crate::storage::StorageError;
use thiserror::Error;

/// Failures raised by a connector while listing records
#[derive(Debug, Error)]
pub enum ConnectorError {
    #[error("Fetch cancelled")]
    Cancelled,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid record at {location}: {reason}")]
    InvalidRecord { location: String, reason: String },

    #[error("{0}")]
    Other(String),
}

#[derive(Debug, Error)]
pub enum IngestError {
    /// Malformed record; recorded against that record
    #[error("Validation error: {0}")]
    Validation(String),

    /// Slug or provenance key collision; recorded against that record
    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Unsupported snapshot version: {0}")]
    UnsupportedVersion(String),

    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),

    #[error("Connector error: {0}")]
    Connector(#[from] ConnectorError),
}

/// Result type for engine operations
pub type EngineResult<T> = Result<T, IngestError>;

impl IngestError {
    /// Fatal errors abort the run; the rest are itemized in the result.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::Validation(_) | Self::Conflict(_))
    }
}

impl From<StorageError> for IngestError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::Conflict(slug) => Self::Conflict(format!("slug '{slug}' already exists")),
            StorageError::NodeNotFound(_) | StorageError::EdgeNotFound(_) => {
                Self::Conflict(err.to_string())
            }
            StorageError::UnsupportedVersion { .. } => Self::UnsupportedVersion(err.to_string()),
            StorageError::Io(_) | StorageError::Serialization(_) | StorageError::Unavailable(_) => {
                Self::StorageUnavailable(err.to_string())
            }
        }
    }
}

impl From<ProvenanceError> for IngestError {
    fn from(err: ProvenanceError) -> Self {
        match err {
            ProvenanceError::Conflict { .. } => Self::Conflict(err.to_string()),
            _ => Self::StorageUnavailable(err.to_string()),
        }
    }
}
