//! Storage trait definitions

use crate::graph::{Edge, EdgeId, EdgeUpdate, NewEdge, NewNode, Node, NodeId, NodeUpdate};
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Slug conflict: {0}")]
    Conflict(String),

    #[error("Node not found: {0}")]
    NodeNotFound(String),

    #[error("Edge not found: {0}")]
    EdgeNotFound(String),

    #[error("Unsupported snapshot version {found} (supported: {expected})")]
    UnsupportedVersion { found: String, expected: u32 },

    #[error("Storage unavailable: {0}")]
    Unavailable(String),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Filter criteria for listing nodes
#[derive(Debug, Clone, Default)]
pub struct NodeFilter {
    /// Filter by node type (e.g., "document", "issue")
    pub node_type: Option<String>,
    /// Filter by domain
    pub domain: Option<String>,
    /// Maximum number of results
    pub limit: Option<usize>,
}

impl NodeFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_type(mut self, node_type: impl Into<String>) -> Self {
        self.node_type = Some(node_type.into());
        self
    }

    pub fn with_domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = Some(domain.into());
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub(crate) fn matches(&self, node: &Node) -> bool {
        self.node_type.as_deref().map_or(true, |t| node.node_type == t)
            && self.domain.as_deref().map_or(true, |d| node.domain == d)
    }
}

/// Filter criteria for listing edges
#[derive(Debug, Clone, Default)]
pub struct EdgeFilter {
    /// Only edges leaving this node
    pub from: Option<NodeId>,
    /// Only edges entering this node
    pub to: Option<NodeId>,
    /// Filter by relationship type
    pub relationship: Option<String>,
    /// Maximum number of results
    pub limit: Option<usize>,
}

impl EdgeFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_node(mut self, id: NodeId) -> Self {
        self.from = Some(id);
        self
    }

    pub fn to_node(mut self, id: NodeId) -> Self {
        self.to = Some(id);
        self
    }

    pub fn with_relationship(mut self, relationship: impl Into<String>) -> Self {
        self.relationship = Some(relationship.into());
        self
    }

    pub(crate) fn matches(&self, edge: &Edge) -> bool {
        self.from.as_ref().map_or(true, |f| &edge.from_node_id == f)
            && self.to.as_ref().map_or(true, |t| &edge.to_node_id == t)
            && self
                .relationship
                .as_deref()
                .map_or(true, |r| edge.relationship_type == r)
    }
}

/// Trait for graph storage backends
///
/// Implementations must be thread-safe (Send + Sync). Listing order is
/// deterministic: nodes by creation time then id, edges by insertion order.
pub trait GraphStore: Send + Sync {
    // === Node Operations ===

    /// Create nodes atomically. Fails with `Conflict` if any slug is already
    /// taken (in the store or earlier in the same batch); nothing is written then.
    fn create_nodes(&self, nodes: Vec<NewNode>) -> StorageResult<Vec<Node>>;

    /// Load a node by id
    fn get_node(&self, id: &NodeId) -> StorageResult<Option<Node>>;

    /// Load a node by its unique slug
    fn get_node_by_slug(&self, slug: &str) -> StorageResult<Option<Node>>;

    /// List nodes matching filter criteria
    fn list_nodes(&self, filter: &NodeFilter) -> StorageResult<Vec<Node>>;

    /// Apply a partial update to a node
    fn update_node(&self, id: &NodeId, update: NodeUpdate) -> StorageResult<Node>;

    /// Delete a node and every edge touching it
    fn delete_node(&self, id: &NodeId) -> StorageResult<bool>;

    // === Edge Operations ===

    /// Create edges atomically. Both endpoints of every edge must exist.
    fn create_edges(&self, edges: Vec<NewEdge>) -> StorageResult<Vec<Edge>>;

    /// List edges matching filter criteria
    fn list_edges(&self, filter: &EdgeFilter) -> StorageResult<Vec<Edge>>;

    /// Apply a partial update to an edge
    fn update_edge(&self, id: &EdgeId, update: EdgeUpdate) -> StorageResult<Edge>;

    /// Delete an edge
    fn delete_edge(&self, id: &EdgeId) -> StorageResult<bool>;

    // === Durability ===

    /// Persist pending writes. No-op for purely in-memory stores.
    fn flush(&self) -> StorageResult<()>;
}
