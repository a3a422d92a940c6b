//! graphsync: provenance-tracked synchronization into a node/edge graph
//!
//! External sources produce records; the ingestion engine maps each record
//! to exactly one graph node and keeps that mapping in a provenance store,
//! so repeated runs are idempotent and only changed content is rewritten.
//!
//! # Core Concepts
//!
//! - **Nodes / Edges**: the graph, persisted as a versioned JSON snapshot
//! - **Provenance**: `(source, externalId) -> node` plus the last content hash
//! - **Sync run**: one pass of create / update / skip / link / delete
//!
//! # Example
//!
//! ```
//! use graphsync::{
//!     IngestEngine, IngestOptions, IngestionRecord, MemoryGraphStore,
//!     MemoryProvenanceStore, SourceIdentity,
//! };
//! use std::sync::Arc;
//!
//! let engine = IngestEngine::new(
//!     Arc::new(MemoryGraphStore::new()),
//!     Arc::new(MemoryProvenanceStore::new()),
//! );
//! let options = IngestOptions::new(SourceIdentity::new("markdown", "docs"));
//! let result = engine
//!     .ingest(&[IngestionRecord::new("readme", "Read me")], &options)
//!     .unwrap();
//! assert_eq!(result.stats.created, 1);
//! ```

pub mod config;
pub mod graph;
pub mod identity;
pub mod ingest;
pub mod provenance;
pub mod storage;

pub use config::{Config, ConfigError, SourceConfig};
pub use graph::{Edge, EdgeId, GraphSnapshot, NewEdge, NewNode, Node, NodeId, NodeUpdate};
pub use identity::{content_hash, source_aware_slug, ContentHash};
pub use ingest::{
    CancellationToken, Connector, ConnectorError, DeleteMode, IngestEngine, IngestError,
    IngestOptions, IngestResult, IngestStats, IngestStatus, IngestionRecord, JsonFileConnector,
};
pub use provenance::{
    MemoryProvenanceStore, ProvenanceError, ProvenanceStore, SourceId, SourceIdentity,
    SourceItem, SqliteProvenanceStore,
};
pub use storage::{
    FileGraphStore, GraphStore, MemoryGraphStore, StorageError, StorageResult,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
