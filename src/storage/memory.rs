//! In-memory [`GraphStore`] for tests and ephemeral runs

use super::index::GraphIndex;
use super::traits::{EdgeFilter, GraphStore, NodeFilter, StorageError, StorageResult};
use crate::graph::{Edge, EdgeId, EdgeUpdate, NewEdge, NewNode, Node, NodeId, NodeUpdate};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Graph store that never touches disk. `flush()` is a no-op.
#[derive(Debug, Default)]
pub struct MemoryGraphStore {
    index: RwLock<GraphIndex>,
}

impl MemoryGraphStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> StorageResult<RwLockReadGuard<'_, GraphIndex>> {
        self.index
            .read()
            .map_err(|_| StorageError::Unavailable("graph index lock poisoned".into()))
    }

    fn write(&self) -> StorageResult<RwLockWriteGuard<'_, GraphIndex>> {
        self.index
            .write()
            .map_err(|_| StorageError::Unavailable("graph index lock poisoned".into()))
    }
}

impl GraphStore for MemoryGraphStore {
    fn create_nodes(&self, nodes: Vec<NewNode>) -> StorageResult<Vec<Node>> {
        self.write()?.create_nodes(nodes)
    }

    fn get_node(&self, id: &NodeId) -> StorageResult<Option<Node>> {
        Ok(self.read()?.get_node(id))
    }

    fn get_node_by_slug(&self, slug: &str) -> StorageResult<Option<Node>> {
        Ok(self.read()?.get_node_by_slug(slug))
    }

    fn list_nodes(&self, filter: &NodeFilter) -> StorageResult<Vec<Node>> {
        Ok(self.read()?.list_nodes(filter))
    }

    fn update_node(&self, id: &NodeId, update: NodeUpdate) -> StorageResult<Node> {
        self.write()?.update_node(id, update)
    }

    fn delete_node(&self, id: &NodeId) -> StorageResult<bool> {
        Ok(self.write()?.delete_node(id))
    }

    fn create_edges(&self, edges: Vec<NewEdge>) -> StorageResult<Vec<Edge>> {
        self.write()?.create_edges(edges)
    }

    fn list_edges(&self, filter: &EdgeFilter) -> StorageResult<Vec<Edge>> {
        Ok(self.read()?.list_edges(filter))
    }

    fn update_edge(&self, id: &EdgeId, update: EdgeUpdate) -> StorageResult<Edge> {
        self.write()?.update_edge(id, update)
    }

    fn delete_edge(&self, id: &EdgeId) -> StorageResult<bool> {
        Ok(self.write()?.delete_edge(id))
    }

    fn flush(&self) -> StorageResult<()> {
        Ok(())
    }
}
