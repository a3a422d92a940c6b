//! Directed, typed edges between nodes

use super::node::NodeId;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for an edge
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EdgeId(String);

impl EdgeId {
    /// Create a new random EdgeId
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn from_string(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for EdgeId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for EdgeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Well-known relationship types written by ingestion
pub mod relationship {
    /// Record links to another record via `references`
    pub const REFERENCES: &str = "references";
    /// Record names another record as its parent
    pub const CHILD_OF: &str = "child_of";
}

/// A directed edge
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Edge {
    pub id: EdgeId,
    pub from_node_id: NodeId,
    pub to_node_id: NodeId,
    /// Type of relationship (e.g., "references", "child_of")
    pub relationship_type: String,
    /// Relationship strength (0.0 - 1.0)
    pub strength: f32,
}

impl Edge {
    /// True if the edge touches `node_id` at either end
    pub fn touches(&self, node_id: &NodeId) -> bool {
        &self.from_node_id == node_id || &self.to_node_id == node_id
    }
}

/// Fields for an edge that does not exist yet
#[derive(Debug, Clone)]
pub struct NewEdge {
    pub from_node_id: NodeId,
    pub to_node_id: NodeId,
    pub relationship_type: String,
    pub strength: f32,
}

impl NewEdge {
    /// Create a new edge with full strength
    pub fn new(from: NodeId, to: NodeId, relationship_type: impl Into<String>) -> Self {
        Self {
            from_node_id: from,
            to_node_id: to,
            relationship_type: relationship_type.into(),
            strength: 1.0,
        }
    }

    pub fn with_strength(mut self, strength: f32) -> Self {
        self.strength = strength.clamp(0.0, 1.0);
        self
    }

    pub(crate) fn into_edge(self) -> Edge {
        Edge {
            id: EdgeId::new(),
            from_node_id: self.from_node_id,
            to_node_id: self.to_node_id,
            relationship_type: self.relationship_type,
            strength: self.strength,
        }
    }
}

/// Partial update applied to an existing edge
#[derive(Debug, Clone, Default)]
pub struct EdgeUpdate {
    pub relationship_type: Option<String>,
    pub strength: Option<f32>,
}

impl EdgeUpdate {
    pub(crate) fn apply(self, edge: &mut Edge) {
        if let Some(rel) = self.relationship_type {
            edge.relationship_type = rel;
        }
        if let Some(strength) = self.strength {
            edge.strength = strength.clamp(0.0, 1.0);
        }
    }
}
