//! Workflow document layer
//!
//! Plain document types, the node schema registry, bundled samples and the
//! durable sink the editor autosaves into.

// Document, node, edge and persisted-record types
pub mod types;

// Key-value persistence sinks (SQLite and in-memory)
pub mod storage;

// Static per-kind schema table with defaults and validation
pub mod registry;

// Sample workflows compiled into the binary
pub mod samples;

pub use storage::{DocumentSink, MemoryDocumentStore, SqliteDocumentStore};
pub use types::{
    NodeData, NodeKind, NodeStatus, PersistedRecord, Position, Viewport, WorkflowDocument,
    WorkflowEdge, WorkflowNode,
};
