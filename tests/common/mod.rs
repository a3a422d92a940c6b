//! Shared fixtures for graphsync integration tests

#![allow(dead_code)]

use graphsync::storage::FileStoreOptions;
use graphsync::{
    FileGraphStore, IngestEngine, IngestOptions, IngestionRecord, MemoryGraphStore,
    MemoryProvenanceStore, SourceIdentity, SqliteProvenanceStore,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

pub fn docs_source() -> SourceIdentity {
    SourceIdentity::new("markdown", "docs")
}

pub fn docs_options() -> IngestOptions {
    IngestOptions::new(docs_source())
}

pub fn doc(external_id: &str, title: &str) -> IngestionRecord {
    IngestionRecord::new(external_id, title).with_content(format!("# {title}\n\nBody of {external_id}."))
}

/// Three linked markdown documents
pub fn corpus() -> Vec<IngestionRecord> {
    vec![
        doc("guide/intro.md", "Introduction").with_reference("guide/setup.md"),
        doc("guide/setup.md", "Setup").with_parent("guide/index.md"),
        doc("guide/index.md", "Guide"),
    ]
}

pub fn memory_engine() -> IngestEngine {
    IngestEngine::new(
        Arc::new(MemoryGraphStore::new()),
        Arc::new(MemoryProvenanceStore::new()),
    )
}

/// File graph + SQLite provenance in a temp directory that can be reopened
pub struct DurableFixture {
    pub dir: TempDir,
}

impl DurableFixture {
    pub fn new() -> Self {
        Self {
            dir: tempfile::tempdir().unwrap(),
        }
    }

    pub fn graph_path(&self) -> PathBuf {
        self.dir.path().join("graph.json")
    }

    pub fn provenance_path(&self) -> PathBuf {
        self.dir.path().join("provenance.db")
    }

    pub fn open_graph(&self) -> Arc<FileGraphStore> {
        Arc::new(FileGraphStore::open_with(self.graph_path(), FileStoreOptions::default()).unwrap())
    }

    pub fn open_provenance(&self) -> Arc<SqliteProvenanceStore> {
        Arc::new(SqliteProvenanceStore::open(self.provenance_path()).unwrap())
    }

    /// A fresh engine over the on-disk state
    pub fn engine(&self) -> IngestEngine {
        IngestEngine::new(self.open_graph(), self.open_provenance())
    }

    pub fn write_records(&self, name: &str, records: &[IngestionRecord]) -> PathBuf {
        let path = self.dir.path().join(name);
        write_json_lines(&path, records);
        path
    }
}

pub fn write_json_lines(path: &Path, records: &[IngestionRecord]) {
    let body: String = records
        .iter()
        .map(|r| serde_json::to_string(r).unwrap() + "\n")
        .collect();
    std::fs::write(path, body).unwrap();
}
