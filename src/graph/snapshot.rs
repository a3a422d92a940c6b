//! Versioned on-disk representation of the whole graph

use super::edge::Edge;
use super::node::Node;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// The only snapshot version this build reads or writes.
pub const SNAPSHOT_VERSION: u32 = 1;

/// Entire graph state at a point in time
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphSnapshot {
    pub version: u32,
    pub updated_at: DateTime<Utc>,
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
    #[serde(default)]
    pub settings: Map<String, Value>,
}
