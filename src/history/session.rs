//! Editor session for one open workflow document
//!
//! The session is the only path through which the document changes. Every
//! edit is a `commit` on the snapshot history, stamps `updatedAt`, marks the
//! document dirty, publishes the new snapshot for lock-free readers and
//! re-arms the autosave timer.

use crate::{
    config::HistoryConfig,
    history::{autosave::Autosaver, HistoryState},
    workflow::{
        samples,
        storage::DocumentSink,
        types::{PersistedRecord, Viewport, WorkflowDocument, WorkflowEdge, WorkflowNode},
    },
};
use anyhow::Result;
use arc_swap::ArcSwap;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

/// Lock-free read handle on the session's current snapshot
#[derive(Debug, Clone)]
pub struct SnapshotReader {
    published: Arc<ArcSwap<WorkflowDocument>>,
}

impl SnapshotReader {
    /// The snapshot that was current at the time of the call
    pub fn load(&self) -> Arc<WorkflowDocument> {
        self.published.load_full()
    }
}

/// History-backed editing context for a single document
#[derive(Debug)]
pub struct EditorSession {
    history: HistoryState<WorkflowDocument>,
    viewport: Viewport,
    dirty: Arc<AtomicBool>,
    autosaver: Autosaver,
    published: Arc<ArcSwap<WorkflowDocument>>,
}

/// Next `updatedAt` value: now, or one millisecond past `previous` if the clock has not moved
fn next_timestamp(previous: DateTime<Utc>) -> DateTime<Utc> {
    let now = Utc::now();
    if now > previous {
        now
    } else {
        previous + ChronoDuration::milliseconds(1)
    }
}

impl EditorSession {
    /// Start a session over an empty, untitled document
    pub fn new(sink: Arc<dyn DocumentSink>, storage_key: impl Into<String>, config: &HistoryConfig) -> Self {
        Self::with_document(WorkflowDocument::empty(), sink, storage_key, config)
    }

    /// Start a session over an existing document (not marked dirty)
    pub fn with_document(
        document: WorkflowDocument,
        sink: Arc<dyn DocumentSink>,
        storage_key: impl Into<String>,
        config: &HistoryConfig,
    ) -> Self {
        let dirty = Arc::new(AtomicBool::new(false));
        let history = HistoryState::new(document, config.capacity());
        let published = Arc::new(ArcSwap::new(Arc::clone(history.present())));
        let autosaver = Autosaver::new(sink, storage_key, config.autosave_debounce(), Arc::clone(&dirty));

        Self {
            history,
            viewport: Viewport::default(),
            dirty,
            autosaver,
            published,
        }
    }

    /// Seed the session from durable storage
    ///
    /// When `sample` names a bundled sample it is loaded instead of the stored
    /// document; the stored viewport is restored either way. Node statuses of a
    /// stored document are reset to idle. Returns whether anything was loaded.
    /// An unreadable stored record is logged and the empty document kept.
    pub async fn initialize_from_storage(&mut self, sample: Option<&str>) -> Result<bool> {
        let stored = match self.autosaver.sink().load(self.autosaver.key()).await {
            Ok(stored) => stored,
            Err(e) => {
                tracing::error!("❌ Error reading stored document '{}': {}", self.autosaver.key(), e);
                None
            }
        };

        if let Some(viewport) = stored.as_ref().map(|r| r.viewport) {
            self.viewport = viewport;
        }

        let document = match (sample, stored) {
            (Some(name), _) => match samples::load_sample(name) {
                Ok(document) => document,
                Err(e) => {
                    tracing::error!("❌ Error loading sample workflow: {}", e);
                    return Ok(false);
                }
            },
            (None, Some(record)) => {
                let mut document = record.document;
                document.reset_statuses();
                document
            }
            (None, None) => {
                tracing::info!("📭 No stored document under '{}'", self.autosaver.key());
                return Ok(false);
            }
        };

        tracing::info!(
            "📥 Loaded document '{}' ({} nodes, {} edges)",
            document.id,
            document.nodes.len(),
            document.edges.len()
        );
        self.history.replace(document);
        self.publish();
        Ok(true)
    }

    /// The current snapshot
    pub fn document(&self) -> &Arc<WorkflowDocument> {
        self.history.present()
    }

    pub fn history(&self) -> &HistoryState<WorkflowDocument> {
        &self.history
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty.load(Ordering::SeqCst)
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    /// A reader that always sees the latest published snapshot
    pub fn snapshots(&self) -> SnapshotReader {
        SnapshotReader {
            published: Arc::clone(&self.published),
        }
    }

    /// Apply `mutator` to a copy of the current document and make it current
    pub fn commit<F>(&mut self, mutator: F)
    where
        F: FnOnce(&mut WorkflowDocument),
    {
        let previous = self.history.present().updated_at;
        self.history.commit(|draft| {
            mutator(draft);
            draft.updated_at = next_timestamp(previous);
        });
        tracing::debug!(
            "📝 Committed document change (undo depth {})",
            self.history.past_len()
        );
        self.changed();
    }

    /// Step back one edit; no-op when there is nothing to undo
    pub fn undo(&mut self) -> bool {
        if !self.history.undo() {
            return false;
        }
        tracing::debug!("↩️ Undo (undo depth {})", self.history.past_len());
        self.changed();
        true
    }

    /// Re-apply the most recently undone edit; no-op when there is nothing to redo
    pub fn redo(&mut self) -> bool {
        if !self.history.redo() {
            return false;
        }
        tracing::debug!("↪️ Redo (redo depth {})", self.history.future_len());
        self.changed();
        true
    }

    /// Replace the whole document and discard history
    pub fn replace(&mut self, document: WorkflowDocument) {
        tracing::info!("🔄 Replacing document with '{}'", document.id);
        self.history.replace(document);
        self.changed();
    }

    /// Update the canvas viewport; not recorded in history
    pub fn set_viewport(&mut self, viewport: Viewport) {
        self.viewport = viewport;
        self.autosaver.schedule(self.record());
    }

    /// Append a node, generating an id when `node.id` is empty
    pub fn add_node(&mut self, mut node: WorkflowNode) -> String {
        if node.id.is_empty() {
            node.id = uuid::Uuid::new_v4().to_string();
        }
        let id = node.id.clone();
        self.commit(move |draft| draft.nodes.push(node));
        id
    }

    /// Mutate the node with `id` in a new snapshot
    ///
    /// An unknown id still produces a commit with an unchanged node list.
    pub fn update_node<F>(&mut self, id: &str, updater: F)
    where
        F: FnOnce(&mut WorkflowNode),
    {
        self.commit(|draft| {
            if let Some(node) = draft.node_mut(id) {
                updater(node);
            }
        });
    }

    /// Remove a node together with every edge touching it
    pub fn remove_node(&mut self, id: &str) {
        self.commit(|draft| {
            draft.nodes.retain(|n| n.id != id);
            draft.edges.retain(|e| e.source != id && e.target != id);
        });
    }

    /// Append an edge, generating an id when `edge.id` is empty
    pub fn add_edge(&mut self, mut edge: WorkflowEdge) -> String {
        if edge.id.is_empty() {
            edge.id = uuid::Uuid::new_v4().to_string();
        }
        let id = edge.id.clone();
        self.commit(move |draft| draft.edges.push(edge));
        id
    }

    pub fn update_edge<F>(&mut self, id: &str, updater: F)
    where
        F: FnOnce(&mut WorkflowEdge),
    {
        self.commit(|draft| {
            if let Some(edge) = draft.edge_mut(id) {
                updater(edge);
            }
        });
    }

    pub fn remove_edge(&mut self, id: &str) {
        self.commit(|draft| draft.edges.retain(|e| e.id != id));
    }

    /// Persist immediately, cancelling any pending autosave
    pub async fn save_now(&mut self) -> Result<()> {
        let record = self.record();
        self.autosaver.flush(&record).await
    }

    /// The `{document, viewport}` record as it would be persisted now
    pub fn record(&self) -> PersistedRecord {
        PersistedRecord {
            document: WorkflowDocument::clone(self.history.present()),
            viewport: self.viewport,
        }
    }

    fn publish(&self) {
        self.published.store(Arc::clone(self.history.present()));
    }

    fn changed(&mut self) {
        self.dirty.store(true, Ordering::SeqCst);
        self.publish();
        self.autosaver.schedule(self.record());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::{
        storage::MemoryDocumentStore,
        types::{NodeKind, NodeStatus},
    };
    use std::time::Duration;

    fn session(store: Arc<MemoryDocumentStore>) -> EditorSession {
        EditorSession::new(store, "editor", &HistoryConfig::default())
    }

    #[tokio::test(start_paused = true)]
    async fn test_commit_stamps_strictly_increasing_updated_at() {
        let mut session = session(Arc::new(MemoryDocumentStore::new()));
        let original = session.document().updated_at;

        session.commit(|d| d.name = "One".to_string());
        let first = session.document().updated_at;
        session.commit(|d| d.name = "Two".to_string());
        let second = session.document().updated_at;

        assert!(first > original);
        assert!(second > first);
        assert_eq!(session.document().id, session.history().past().next().unwrap().id);
    }

    #[tokio::test(start_paused = true)]
    async fn test_remove_node_drops_touching_edges() {
        let mut session = session(Arc::new(MemoryDocumentStore::new()));
        session.add_node(WorkflowNode::new("a", NodeKind::ManualTrigger, "A"));
        session.add_node(WorkflowNode::new("b", NodeKind::Log, "B"));
        session.add_node(WorkflowNode::new("c", NodeKind::Log, "C"));
        session.add_edge(WorkflowEdge::new("ab", "a", "b"));
        session.add_edge(WorkflowEdge::new("bc", "b", "c"));
        session.add_edge(WorkflowEdge::new("ac", "a", "c"));

        session.remove_node("b");
        let doc = session.document();
        assert_eq!(doc.nodes.len(), 2);
        let edges: Vec<_> = doc.edges.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(edges, vec!["ac"]);

        assert!(session.undo());
        assert_eq!(session.document().edges.len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_generated_ids_and_snapshot_reader() {
        let mut session = session(Arc::new(MemoryDocumentStore::new()));
        let reader = session.snapshots();

        let id = session.add_node(WorkflowNode::new("", NodeKind::Delay, "Wait"));
        assert!(!id.is_empty());
        assert!(reader.load().node(&id).is_some());

        session.undo();
        assert!(reader.load().nodes.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_edits_autosave_once_after_quiet_period() {
        let store = Arc::new(MemoryDocumentStore::new());
        let mut session = session(store.clone());

        session.add_node(WorkflowNode::new("a", NodeKind::ManualTrigger, "A"));
        session.update_node("a", |n| n.data.label = "Start".to_string());
        session.set_viewport(Viewport { x: 1.0, y: 2.0, zoom: 2.0 });
        assert!(session.is_dirty());

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(store.write_count(), 1);
        assert!(!session.is_dirty());

        let saved = store.load("editor").await.unwrap().unwrap();
        assert_eq!(saved.document.nodes[0].data.label, "Start");
        assert_eq!(saved.viewport.zoom, 2.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_initialize_resets_statuses_and_keeps_history_clean() {
        let store = Arc::new(MemoryDocumentStore::new());
        let mut stored = WorkflowDocument::empty();
        let mut node = WorkflowNode::new("a", NodeKind::Log, "A");
        node.data.status = NodeStatus::Error;
        stored.nodes.push(node);
        store
            .save(
                "editor",
                &PersistedRecord {
                    document: stored.clone(),
                    viewport: Viewport { x: 3.0, y: 4.0, zoom: 0.5 },
                },
            )
            .await
            .unwrap();

        let mut session = session(store.clone());
        assert!(session.initialize_from_storage(None).await.unwrap());

        assert_eq!(session.document().id, stored.id);
        assert_eq!(session.document().nodes[0].data.status, NodeStatus::Idle);
        assert_eq!(session.viewport().zoom, 0.5);
        assert!(!session.can_undo());
        assert!(!session.is_dirty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_initialize_prefers_configured_sample() {
        let mut session = session(Arc::new(MemoryDocumentStore::new()));
        assert!(session
            .initialize_from_storage(Some("workflow-cart-recovery"))
            .await
            .unwrap());
        assert_eq!(session.document().id, "sample-cart-recovery");

        assert!(!session
            .initialize_from_storage(Some("workflow-nope"))
            .await
            .unwrap());
    }
}
