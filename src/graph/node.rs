//! Node representation in the synchronized graph

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// Unique identifier for a node, assigned by the graph store
///
/// Serializes as a plain string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(String);

impl NodeId {
    /// Create a new random NodeId
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Create a NodeId from an existing string
    pub fn from_string(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for NodeId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for NodeId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Free-form node metadata
pub type Metadata = Map<String, Value>;

/// A node in the graph
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    /// Store-assigned, stable identifier
    pub id: NodeId,
    /// Unique, human-readable key
    pub slug: String,
    pub label: String,
    pub content: String,
    #[serde(default)]
    pub metadata: Metadata,
    pub domain: String,
    pub node_type: String,
    /// Number of edges incident to this node, maintained by the store
    #[serde(default)]
    pub connection_count: usize,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields for a node that does not exist yet
///
/// The store assigns `id`, timestamps, and `connection_count`.
#[derive(Debug, Clone, Default)]
pub struct NewNode {
    pub slug: String,
    pub label: String,
    pub content: String,
    pub metadata: Metadata,
    pub domain: String,
    pub node_type: String,
}

impl NewNode {
    pub fn new(slug: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            slug: slug.into(),
            label: label.into(),
            ..Default::default()
        }
    }

    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = content.into();
        self
    }

    pub fn with_type(mut self, node_type: impl Into<String>) -> Self {
        self.node_type = node_type.into();
        self
    }

    pub fn with_domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = domain.into();
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    /// Materialize into a stored node with a fresh id
    pub(crate) fn into_node(self, now: DateTime<Utc>) -> Node {
        Node {
            id: NodeId::new(),
            slug: self.slug,
            label: self.label,
            content: self.content,
            metadata: self.metadata,
            domain: self.domain,
            node_type: self.node_type,
            connection_count: 0,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Partial update applied to an existing node. `None` leaves a field untouched.
///
/// The slug is deliberately not updatable: it is the node's external key.
#[derive(Debug, Clone, Default)]
pub struct NodeUpdate {
    pub label: Option<String>,
    pub content: Option<String>,
    pub metadata: Option<Metadata>,
    pub domain: Option<String>,
    pub node_type: Option<String>,
}

impl NodeUpdate {
    pub fn is_empty(&self) -> bool {
        self.label.is_none()
            && self.content.is_none()
            && self.metadata.is_none()
            && self.domain.is_none()
            && self.node_type.is_none()
    }

    pub(crate) fn apply(self, node: &mut Node, now: DateTime<Utc>) {
        if let Some(label) = self.label {
            node.label = label;
        }
        if let Some(content) = self.content {
            node.content = content;
        }
        if let Some(metadata) = self.metadata {
            node.metadata = metadata;
        }
        if let Some(domain) = self.domain {
            node.domain = domain;
        }
        if let Some(node_type) = self.node_type {
            node.node_type = node_type;
        }
        node.updated_at = now;
    }
}
