//! In-memory graph index shared by the memory and file-backed stores

use super::traits::{EdgeFilter, NodeFilter, StorageError, StorageResult};
use crate::graph::{
    Edge, EdgeId, EdgeUpdate, GraphSnapshot, NewEdge, NewNode, Node, NodeId, NodeUpdate,
    SNAPSHOT_VERSION,
};
use chrono::Utc;
use serde_json::{Map, Value};
use std::collections::{HashMap, HashSet};

/// Nodes keyed by id with a unique slug index, plus edges in insertion order.
#[derive(Debug, Default)]
pub(crate) struct GraphIndex {
    nodes: HashMap<NodeId, Node>,
    slugs: HashMap<String, NodeId>,
    edges: Vec<Edge>,
    settings: Map<String, Value>,
}

impl GraphIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild the index from a snapshot. Connection counts are recomputed
    /// from the edge list rather than trusted from disk.
    pub fn from_snapshot(snapshot: GraphSnapshot) -> StorageResult<Self> {
        let mut index = Self {
            settings: snapshot.settings,
            ..Self::default()
        };
        for mut node in snapshot.nodes {
            if index.slugs.contains_key(&node.slug) {
                return Err(StorageError::Conflict(format!(
                    "snapshot contains duplicate slug '{}'",
                    node.slug
                )));
            }
            node.connection_count = 0;
            index.slugs.insert(node.slug.clone(), node.id.clone());
            index.nodes.insert(node.id.clone(), node);
        }
        for edge in snapshot.edges {
            if !index.nodes.contains_key(&edge.from_node_id)
                || !index.nodes.contains_key(&edge.to_node_id)
            {
                tracing::warn!(edge = %edge.id, "dropping snapshot edge with missing endpoint");
                continue;
            }
            index.bump_connections(&edge, true);
            index.edges.push(edge);
        }
        Ok(index)
    }

    pub fn to_snapshot(&self) -> GraphSnapshot {
        GraphSnapshot {
            version: SNAPSHOT_VERSION,
            updated_at: Utc::now(),
            nodes: self.sorted_nodes().into_iter().cloned().collect(),
            edges: self.edges.clone(),
            settings: self.settings.clone(),
        }
    }

    pub fn settings(&self) -> &Map<String, Value> {
        &self.settings
    }

    pub fn set_setting(&mut self, key: String, value: Value) {
        self.settings.insert(key, value);
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    fn sorted_nodes(&self) -> Vec<&Node> {
        let mut nodes: Vec<&Node> = self.nodes.values().collect();
        nodes.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        nodes
    }

    fn bump_connections(&mut self, edge: &Edge, add: bool) {
        let mut endpoints = vec![&edge.from_node_id];
        if edge.to_node_id != edge.from_node_id {
            endpoints.push(&edge.to_node_id);
        }
        for id in endpoints {
            if let Some(node) = self.nodes.get_mut(id) {
                node.connection_count = if add {
                    node.connection_count + 1
                } else {
                    node.connection_count.saturating_sub(1)
                };
            }
        }
    }

    // === Nodes ===

    pub fn create_nodes(&mut self, nodes: Vec<NewNode>) -> StorageResult<Vec<Node>> {
        let mut batch_slugs = HashSet::new();
        for node in &nodes {
            if node.slug.is_empty() {
                return Err(StorageError::Conflict("empty slug".into()));
            }
            if self.slugs.contains_key(&node.slug) || !batch_slugs.insert(node.slug.as_str()) {
                return Err(StorageError::Conflict(node.slug.clone()));
            }
        }

        let now = Utc::now();
        let created: Vec<Node> = nodes.into_iter().map(|n| n.into_node(now)).collect();
        for node in &created {
            self.slugs.insert(node.slug.clone(), node.id.clone());
            self.nodes.insert(node.id.clone(), node.clone());
        }
        Ok(created)
    }

    pub fn get_node(&self, id: &NodeId) -> Option<Node> {
        self.nodes.get(id).cloned()
    }

    pub fn get_node_by_slug(&self, slug: &str) -> Option<Node> {
        self.slugs.get(slug).and_then(|id| self.nodes.get(id)).cloned()
    }

    pub fn list_nodes(&self, filter: &NodeFilter) -> Vec<Node> {
        self.sorted_nodes()
            .into_iter()
            .filter(|n| filter.matches(n))
            .take(filter.limit.unwrap_or(usize::MAX))
            .cloned()
            .collect()
    }

    pub fn update_node(&mut self, id: &NodeId, update: NodeUpdate) -> StorageResult<Node> {
        let node = self
            .nodes
            .get_mut(id)
            .ok_or_else(|| StorageError::NodeNotFound(id.to_string()))?;
        update.apply(node, Utc::now());
        Ok(node.clone())
    }

    pub fn delete_node(&mut self, id: &NodeId) -> bool {
        let Some(node) = self.nodes.remove(id) else {
            return false;
        };
        self.slugs.remove(&node.slug);

        let (removed, kept): (Vec<Edge>, Vec<Edge>) =
            std::mem::take(&mut self.edges).into_iter().partition(|e| e.touches(id));
        self.edges = kept;
        for edge in &removed {
            self.bump_connections(edge, false);
        }
        true
    }

    // === Edges ===

    pub fn create_edges(&mut self, edges: Vec<NewEdge>) -> StorageResult<Vec<Edge>> {
        for edge in &edges {
            for endpoint in [&edge.from_node_id, &edge.to_node_id] {
                if !self.nodes.contains_key(endpoint) {
                    return Err(StorageError::NodeNotFound(endpoint.to_string()));
                }
            }
        }

        let created: Vec<Edge> = edges.into_iter().map(NewEdge::into_edge).collect();
        for edge in &created {
            self.bump_connections(edge, true);
            self.edges.push(edge.clone());
        }
        Ok(created)
    }

    pub fn list_edges(&self, filter: &EdgeFilter) -> Vec<Edge> {
        self.edges
            .iter()
            .filter(|e| filter.matches(e))
            .take(filter.limit.unwrap_or(usize::MAX))
            .cloned()
            .collect()
    }

    pub fn update_edge(&mut self, id: &EdgeId, update: EdgeUpdate) -> StorageResult<Edge> {
        let edge = self
            .edges
            .iter_mut()
            .find(|e| &e.id == id)
            .ok_or_else(|| StorageError::EdgeNotFound(id.to_string()))?;
        update.apply(edge);
        Ok(edge.clone())
    }

    pub fn delete_edge(&mut self, id: &EdgeId) -> bool {
        let Some(pos) = self.edges.iter().position(|e| &e.id == id) else {
            return false;
        };
        let edge = self.edges.remove(pos);
        self.bump_connections(&edge, false);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn index_with(slugs: &[&str]) -> (GraphIndex, Vec<Node>) {
        let mut index = GraphIndex::new();
        let nodes = index
            .create_nodes(slugs.iter().map(|s| NewNode::new(*s, *s)).collect())
            .unwrap();
        (index, nodes)
    }

    #[test]
    fn duplicate_slug_in_batch_writes_nothing() {
        let mut index = GraphIndex::new();
        let err = index
            .create_nodes(vec![NewNode::new("a", "A"), NewNode::new("a", "A again")])
            .unwrap_err();
        assert!(matches!(err, StorageError::Conflict(_)));
        assert_eq!(index.node_count(), 0);
    }

    #[test]
    fn connection_counts_follow_edges() {
        let (mut index, nodes) = index_with(&["a", "b"]);
        let edges = index
            .create_edges(vec![NewEdge::new(
                nodes[0].id.clone(),
                nodes[1].id.clone(),
                "references",
            )])
            .unwrap();
        assert_eq!(index.get_node(&nodes[0].id).unwrap().connection_count, 1);
        assert_eq!(index.get_node(&nodes[1].id).unwrap().connection_count, 1);

        assert!(index.delete_edge(&edges[0].id));
        assert_eq!(index.get_node(&nodes[0].id).unwrap().connection_count, 0);
    }

    #[test]
    fn delete_node_cascades_edges() {
        let (mut index, nodes) = index_with(&["a", "b", "c"]);
        index
            .create_edges(vec![
                NewEdge::new(nodes[0].id.clone(), nodes[1].id.clone(), "references"),
                NewEdge::new(nodes[2].id.clone(), nodes[1].id.clone(), "references"),
            ])
            .unwrap();

        assert!(index.delete_node(&nodes[1].id));
        assert_eq!(index.edge_count(), 0);
        assert_eq!(index.get_node(&nodes[0].id).unwrap().connection_count, 0);
        assert!(index.get_node_by_slug("b").is_none());
    }

    #[test]
    fn edge_to_missing_node_is_rejected() {
        let (mut index, nodes) = index_with(&["a"]);
        let err = index
            .create_edges(vec![NewEdge::new(
                nodes[0].id.clone(),
                NodeId::from("ghost"),
                "references",
            )])
            .unwrap_err();
        assert!(matches!(err, StorageError::NodeNotFound(_)));
        assert_eq!(index.edge_count(), 0);
    }

    #[test]
    fn snapshot_rebuild_recomputes_counts() {
        let (mut index, nodes) = index_with(&["a", "b"]);
        index
            .create_edges(vec![NewEdge::new(
                nodes[0].id.clone(),
                nodes[1].id.clone(),
                "child_of",
            )])
            .unwrap();

        let mut snapshot = index.to_snapshot();
        for node in &mut snapshot.nodes {
            node.connection_count = 99;
        }
        let rebuilt = GraphIndex::from_snapshot(snapshot).unwrap();
        assert_eq!(rebuilt.get_node_by_slug("a").unwrap().connection_count, 1);
        assert_eq!(rebuilt.edge_count(), 1);
    }
}
