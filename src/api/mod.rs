/// HTTP API Layer
///
/// This module provides the REST endpoints around the editor core. It handles:
/// - Document editing with undo/redo and explicit save
/// - Node schema registry lookup
/// - Driving the execution simulator over the current snapshot

// Document, node and edge editing endpoints
pub mod documents;

// Simulation control endpoints
pub mod simulation;

use crate::{
    config::Config,
    history::{EditorSession, SnapshotReader},
    runtime::{PauseHandle, Simulator},
};
use arc_swap::ArcSwapOption;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Application state containing shared resources
#[derive(Clone)]
pub struct AppState {
    /// The single editing session (history, viewport, autosave)
    pub session: Arc<Mutex<EditorSession>>,
    /// Lock-free reads of the current document snapshot
    pub snapshots: SnapshotReader,
    /// Interactive simulator; held for the whole of a step or play request
    pub simulation: Arc<Mutex<Option<Simulator>>>,
    /// Pause handle of the interactive simulator, usable while it is locked
    pub pause: Arc<ArcSwapOption<PauseHandle>>,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(session: EditorSession, config: Config) -> Self {
        let snapshots = session.snapshots();
        Self {
            session: Arc::new(Mutex::new(session)),
            snapshots,
            simulation: Arc::new(Mutex::new(None)),
            pause: Arc::new(ArcSwapOption::empty()),
            config: Arc::new(config),
        }
    }
}

// Re-export router builders
pub use documents::create_document_routes;
pub use simulation::create_simulation_routes;
