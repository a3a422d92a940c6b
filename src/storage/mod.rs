//! Storage backends for the graph
//!
//! All backends implement the `GraphStore` trait. `FileGraphStore` is the
//! durable implementation; `MemoryGraphStore` backs tests and dry tooling.

mod file;
mod index;
mod memory;
mod traits;

pub use file::{FileGraphStore, FileStoreOptions, LoadSource};
pub use memory::MemoryGraphStore;
pub use traits::{EdgeFilter, GraphStore, NodeFilter, StorageError, StorageResult};
