//! Ingestion: turning connector records into graph nodes
//!
//! Connectors produce [`IngestionRecord`]s; [`IngestEngine`] diffs them
//! against provenance and applies creates, updates, links and deletes.

mod cancel;
mod connector;
mod engine;
mod error;
mod options;
mod record;
mod result;

pub use cancel::CancellationToken;
pub use connector::{Connector, JsonFileConnector, ListOptions};
pub use engine::{EngineConfig, IngestEngine};
pub use error::{ConnectorError, EngineResult, IngestError};
pub use options::{DeleteMode, IngestOptions};
pub use record::IngestionRecord;
pub use result::{IngestResult, IngestStats, IngestStatus, RecordError};
