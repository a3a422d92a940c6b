//! Core graph data structures

mod edge;
mod node;
mod snapshot;

pub use edge::{relationship, Edge, EdgeId, EdgeUpdate, NewEdge};
pub use node::{Metadata, NewNode, Node, NodeId, NodeUpdate};
pub use snapshot::{GraphSnapshot, SNAPSHOT_VERSION};
