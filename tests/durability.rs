//! File-backed graph store durability
//!
//! Run with: `cargo test --test durability`

mod common;

use common::{corpus, docs_options, DurableFixture};
use graphsync::graph::NewNode;
use graphsync::storage::{EdgeFilter, FileStoreOptions, LoadSource, NodeFilter};
use graphsync::{FileGraphStore, GraphStore, IngestError, IngestEngine, NewEdge, StorageError};
use std::sync::Arc;

fn seed(store: &FileGraphStore, nodes: usize) {
    let created = store
        .create_nodes(
            (0..nodes)
                .map(|i| NewNode::new(format!("node-{i}"), format!("Node {i}")))
                .collect(),
        )
        .unwrap();
    let edges = created
        .windows(2)
        .map(|pair| NewEdge::new(pair[0].id.clone(), pair[1].id.clone(), "references"))
        .collect();
    store.create_edges(edges).unwrap();
}

#[test]
fn snapshot_round_trip() {
    let fixture = DurableFixture::new();
    {
        let store = fixture.open_graph();
        seed(&store, 10);
        store.flush().unwrap();
    }

    let reopened = fixture.open_graph();
    assert_eq!(reopened.loaded_from(), LoadSource::Primary);
    assert_eq!(reopened.list_nodes(&NodeFilter::new()).unwrap().len(), 10);
    assert_eq!(reopened.list_edges(&EdgeFilter::new()).unwrap().len(), 9);
}

#[test]
fn unflushed_changes_are_not_persisted() {
    let fixture = DurableFixture::new();
    {
        let store = fixture.open_graph();
        seed(&store, 2);
    }
    assert!(!fixture.graph_path().exists());
    assert!(fixture
        .open_graph()
        .list_nodes(&NodeFilter::new())
        .unwrap()
        .is_empty());
}

#[test]
fn corrupt_primary_recovers_from_backup() {
    let fixture = DurableFixture::new();
    {
        let store = fixture.open_graph();
        seed(&store, 3);
        store.flush().unwrap();
        store.create_nodes(vec![NewNode::new("extra", "Extra")]).unwrap();
        store.flush().unwrap();
    }
    assert!(fixture.open_graph().backup_path().exists());

    std::fs::write(fixture.graph_path(), b"{\"version\": 1, \"nodes\": [tru").unwrap();

    let recovered = fixture.open_graph();
    assert_eq!(recovered.loaded_from(), LoadSource::Backup);
    assert_eq!(recovered.list_nodes(&NodeFilter::new()).unwrap().len(), 3);
}

#[test]
fn unknown_version_is_rejected() {
    let fixture = DurableFixture::new();
    std::fs::write(
        fixture.graph_path(),
        r#"{"version": 99, "updatedAt": "2024-01-01T00:00:00Z", "nodes": [], "edges": []}"#,
    )
    .unwrap();

    let err = FileGraphStore::open_with(fixture.graph_path(), FileStoreOptions::default())
        .err()
        .unwrap();
    assert!(matches!(
        err,
        StorageError::UnsupportedVersion { ref found, .. } if found == "99"
    ));
    assert!(err.to_string().contains("Unsupported snapshot version"));

    let mapped: IngestError = err.into();
    assert!(matches!(mapped, IngestError::UnsupportedVersion(_)));
    assert!(mapped.is_fatal());
}

#[test]
fn engine_flushes_after_each_run() {
    let fixture = DurableFixture::new();
    fixture.engine().ingest(&corpus(), &docs_options()).unwrap();

    let graph = fixture.open_graph();
    assert_eq!(graph.list_nodes(&NodeFilter::new()).unwrap().len(), 3);
    assert_eq!(graph.list_edges(&EdgeFilter::new()).unwrap().len(), 2);
}

#[test]
fn interrupted_run_is_adopted_next_time() {
    let fixture = DurableFixture::new();

    // Graph written and flushed, provenance lost
    {
        let graph = fixture.open_graph();
        let engine = IngestEngine::new(
            graph.clone(),
            Arc::new(graphsync::MemoryProvenanceStore::new()),
        );
        engine.ingest(&corpus(), &docs_options()).unwrap();
    }

    let result = fixture.engine().ingest(&corpus(), &docs_options()).unwrap();
    assert_eq!(result.stats.created, 0);
    assert_eq!(result.stats.updated, 3);
    assert_eq!(
        fixture.open_graph().list_nodes(&NodeFilter::new()).unwrap().len(),
        3
    );
}
