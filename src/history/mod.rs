//! Document history
//!
//! Immutable-snapshot undo/redo log plus the editor session that owns it.
//! - `HistoryState`: generic past/present/future stacks with bounded capacity
//! - `EditorSession`: the per-document context object (editing operations,
//!   dirty tracking, snapshot publishing)
//! - `Autosaver`: single cancellable debounced persistence task

// Debounced persistence of the present snapshot
pub mod autosave;

// Editor session: history + viewport + autosave for one open document
pub mod session;

pub use autosave::Autosaver;
pub use session::{EditorSession, SnapshotReader};

use std::{collections::VecDeque, sync::Arc};

/// Past/present/future snapshot log
///
/// Snapshots are shared behind `Arc` and never mutated once they are in the
/// log; `commit` always works on a fresh clone of `present`. When a capacity
/// is set, `past` drops its oldest entry and `future` its farthest entry once
/// they grow beyond it.
#[derive(Debug, Clone)]
pub struct HistoryState<T> {
    /// Oldest first, most recent last
    past: VecDeque<Arc<T>>,
    present: Arc<T>,
    /// Nearest first, farthest last
    future: VecDeque<Arc<T>>,
    capacity: Option<usize>,
}

impl<T: Clone> HistoryState<T> {
    /// Start a history with `initial` as the only snapshot
    pub fn new(initial: T, capacity: Option<usize>) -> Self {
        Self {
            past: VecDeque::new(),
            present: Arc::new(initial),
            future: VecDeque::new(),
            capacity,
        }
    }

    pub fn present(&self) -> &Arc<T> {
        &self.present
    }

    /// Undo stack, oldest first
    pub fn past(&self) -> impl Iterator<Item = &Arc<T>> {
        self.past.iter()
    }

    /// Redo stack, nearest first
    pub fn future(&self) -> impl Iterator<Item = &Arc<T>> {
        self.future.iter()
    }

    pub fn past_len(&self) -> usize {
        self.past.len()
    }

    pub fn future_len(&self) -> usize {
        self.future.len()
    }

    pub fn can_undo(&self) -> bool {
        !self.past.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.future.is_empty()
    }

    pub fn capacity(&self) -> Option<usize> {
        self.capacity
    }

    /// Apply `mutator` to a copy of `present` and make the result current
    ///
    /// The previous present moves onto `past` and the redo branch is discarded.
    pub fn commit<F>(&mut self, mutator: F) -> &Arc<T>
    where
        F: FnOnce(&mut T),
    {
        let mut draft = T::clone(&self.present);
        mutator(&mut draft);

        let previous = std::mem::replace(&mut self.present, Arc::new(draft));
        self.past.push_back(previous);
        self.trim_past();
        self.future.clear();

        &self.present
    }

    /// Step back one snapshot; returns false when there is nothing to undo
    pub fn undo(&mut self) -> bool {
        let Some(previous) = self.past.pop_back() else {
            return false;
        };

        let current = std::mem::replace(&mut self.present, previous);
        self.future.push_front(current);
        if let Some(capacity) = self.capacity {
            self.future.truncate(capacity);
        }
        true
    }

    /// Step forward one snapshot; returns false when there is nothing to redo
    pub fn redo(&mut self) -> bool {
        let Some(next) = self.future.pop_front() else {
            return false;
        };

        let current = std::mem::replace(&mut self.present, next);
        self.past.push_back(current);
        self.trim_past();
        true
    }

    /// Drop all history and start over from `value`
    pub fn replace(&mut self, value: T) {
        self.past.clear();
        self.future.clear();
        self.present = Arc::new(value);
    }

    fn trim_past(&mut self) {
        if let Some(capacity) = self.capacity {
            while self.past.len() > capacity {
                self.past.pop_front();
            }
        }
    }
}
