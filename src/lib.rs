/// flowdeck: workflow graph editor core
///
/// This library provides an undoable, autosaved document history for workflow
/// graphs and a deterministic step-through execution simulator.

// Core configuration and setup
pub mod config;

// Document model, persistence sinks, node registry and bundled samples
pub mod workflow;

// Undo/redo history, editor session and debounced autosave
pub mod history;

// Graph indexer, action executors and the execution simulator
pub mod runtime;

// HTTP API layer - document editing and simulation control endpoints
pub mod api;

// Server setup and initialization
pub mod server;

// Re-export commonly used types for external consumers
pub use history::{EditorSession, HistoryState};
pub use runtime::{SimulationStep, Simulator, StepObserver};
pub use server::start_server;
pub use workflow::{NodeKind, WorkflowDocument, WorkflowEdge, WorkflowNode};
