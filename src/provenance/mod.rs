//! Provenance: which external item became which graph node
//!
//! A [`SourceItem`] links `(source_id, external_id)` to a node id and the
//! content hash last applied to it. Backends implement [`ProvenanceStore`].

mod memory;
mod sqlite;
mod traits;
mod types;

pub use memory::MemoryProvenanceStore;
pub use sqlite::SqliteProvenanceStore;
pub use traits::{ProvenanceError, ProvenanceResult, ProvenanceStore};
pub use types::{SourceId, SourceIdentity, SourceItem};
