//! Debounced autosave
//!
//! Holds at most one pending persistence task. Each `schedule` aborts the
//! previous task and arms a new one, so a burst of edits inside the debounce
//! window results in a single write of the last record.

use crate::workflow::{storage::DocumentSink, types::PersistedRecord};
use anyhow::Result;
use std::{
    sync::{
        atomic::{AtomicBool, AtomicU64, Ordering},
        Arc,
    },
    time::Duration,
};
use tokio::task::JoinHandle;

pub struct Autosaver {
    sink: Arc<dyn DocumentSink>,
    key: String,
    debounce: Duration,
    pending: Option<JoinHandle<()>>,
    /// Bumped on every schedule; a finished save only clears `dirty` if no newer one was armed
    generation: Arc<AtomicU64>,
    dirty: Arc<AtomicBool>,
}

impl Autosaver {
    pub fn new(
        sink: Arc<dyn DocumentSink>,
        key: impl Into<String>,
        debounce: Duration,
        dirty: Arc<AtomicBool>,
    ) -> Self {
        Self {
            sink,
            key: key.into(),
            debounce,
            pending: None,
            generation: Arc::new(AtomicU64::new(0)),
            dirty,
        }
    }

    pub fn sink(&self) -> &Arc<dyn DocumentSink> {
        &self.sink
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Whether a save is armed and has not completed yet
    pub fn is_pending(&self) -> bool {
        self.pending.as_ref().is_some_and(|handle| !handle.is_finished())
    }

    /// (Re)arm the timer to persist `record` after the debounce window
    pub fn schedule(&mut self, record: PersistedRecord) {
        self.cancel();
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;

        let runtime = match tokio::runtime::Handle::try_current() {
            Ok(runtime) => runtime,
            Err(_) => {
                tracing::warn!("⚠️ No async runtime available, autosave skipped");
                return;
            }
        };

        let sink = Arc::clone(&self.sink);
        let key = self.key.clone();
        let debounce = self.debounce;
        let current = Arc::clone(&self.generation);
        let dirty = Arc::clone(&self.dirty);

        tracing::debug!("⏱️ Autosave armed ({:?}) for document '{}'", debounce, record.document.id);
        self.pending = Some(runtime.spawn(async move {
            tokio::time::sleep(debounce).await;
            match sink.save(&key, &record).await {
                Ok(()) => {
                    if current.load(Ordering::SeqCst) == generation {
                        dirty.store(false, Ordering::SeqCst);
                    }
                    tracing::info!("💾 Autosaved document '{}'", record.document.id);
                }
                Err(e) => {
                    tracing::error!("❌ Autosave failed for document '{}': {}", record.document.id, e);
                }
            }
        }));
    }

    /// Abort the pending save, if any
    pub fn cancel(&mut self) {
        if let Some(handle) = self.pending.take() {
            handle.abort();
        }
    }

    /// Cancel the timer and persist `record` right away
    pub async fn flush(&mut self, record: &PersistedRecord) -> Result<()> {
        self.cancel();
        self.generation.fetch_add(1, Ordering::SeqCst);
        self.sink.save(&self.key, record).await?;
        self.dirty.store(false, Ordering::SeqCst);
        tracing::info!("💾 Saved document '{}'", record.document.id);
        Ok(())
    }
}

impl std::fmt::Debug for Autosaver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Autosaver")
            .field("key", &self.key)
            .field("debounce", &self.debounce)
            .field("pending", &self.is_pending())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::{
        storage::MemoryDocumentStore,
        types::{Viewport, WorkflowDocument},
    };

    fn record(name: &str) -> PersistedRecord {
        let mut document = WorkflowDocument::empty();
        document.name = name.to_string();
        PersistedRecord {
            document,
            viewport: Viewport::default(),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_burst_persists_only_last_record() {
        let store = Arc::new(MemoryDocumentStore::new());
        let dirty = Arc::new(AtomicBool::new(true));
        let mut saver = Autosaver::new(
            store.clone(),
            "k",
            Duration::from_millis(500),
            Arc::clone(&dirty),
        );

        saver.schedule(record("first"));
        tokio::time::sleep(Duration::from_millis(200)).await;
        saver.schedule(record("second"));
        tokio::time::sleep(Duration::from_millis(200)).await;
        saver.schedule(record("third"));
        assert_eq!(store.write_count(), 0);

        tokio::time::sleep(Duration::from_millis(600)).await;
        assert_eq!(store.write_count(), 1);
        assert_eq!(store.load("k").await.unwrap().unwrap().document.name, "third");
        assert!(!dirty.load(Ordering::SeqCst));
        assert!(!saver.is_pending());
    }

    #[tokio::test(start_paused = true)]
    async fn test_flush_cancels_pending_timer() {
        let store = Arc::new(MemoryDocumentStore::new());
        let mut saver = Autosaver::new(
            store.clone(),
            "k",
            Duration::from_millis(500),
            Arc::new(AtomicBool::new(true)),
        );

        saver.schedule(record("stale"));
        saver.flush(&record("fresh")).await.unwrap();
        tokio::time::sleep(Duration::from_secs(2)).await;

        assert_eq!(store.write_count(), 1);
        assert_eq!(store.load("k").await.unwrap().unwrap().document.name, "fresh");
    }
}
