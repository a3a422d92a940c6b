//! Provenance data types

use crate::graph::NodeId;
use crate::identity::ContentHash;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A configured source instance, e.g. `markdown:docs`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceIdentity {
    #[serde(rename = "type")]
    pub source_type: String,
    pub name: String,
    #[serde(default)]
    pub config: Value,
}

impl SourceIdentity {
    pub fn new(source_type: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            source_type: source_type.into(),
            name: name.into(),
            config: Value::Null,
        }
    }

    pub fn with_config(mut self, config: Value) -> Self {
        self.config = config;
        self
    }

    /// `type:name`, the namespace used for slug generation
    pub fn source_key(&self) -> String {
        format!("{}:{}", self.source_type, self.name)
    }

    /// Parse a `type:name` key. The name may itself contain colons.
    pub fn parse_key(key: &str) -> Option<Self> {
        let (source_type, name) = key.split_once(':')?;
        if source_type.is_empty() || name.is_empty() {
            return None;
        }
        Some(Self::new(source_type, name))
    }
}

/// Stable internal identifier for a source
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SourceId(String);

impl SourceId {
    pub fn from_string(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SourceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Provenance row linking one external item to one graph node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceItem {
    pub source_id: SourceId,
    pub external_id: String,
    pub node_id: NodeId,
    pub content_hash: ContentHash,
    pub last_seen_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
    /// Optimistic-concurrency counter. Zero means "not stored yet"; each
    /// successful upsert stores `revision + 1`.
    #[serde(default)]
    pub revision: u64,
}

impl SourceItem {
    /// A fresh, not-yet-stored row
    pub fn new(
        source_id: SourceId,
        external_id: impl Into<String>,
        node_id: NodeId,
        content_hash: ContentHash,
        seen_at: DateTime<Utc>,
    ) -> Self {
        Self {
            source_id,
            external_id: external_id.into(),
            node_id,
            content_hash,
            last_seen_at: seen_at,
            deleted_at: None,
            revision: 0,
        }
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }
}
