//! Bounded undo/redo history.
//!
//! Both stacks hold opaque tokens minted by the backend; the engine never
//! interprets them, it only sequences and bounds them. Most recent first,
//! capped at [`MAX_HISTORY`] entries.

use chrono::{DateTime, Utc};

pub const MAX_HISTORY: usize = 50;

/// One reversible server-side operation, identified by its backend token.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryEntry {
    pub id: String,
    pub at: DateTime<Utc>,
}

impl HistoryEntry {
    fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            at: Utc::now(),
        }
    }
}

#[derive(Debug, Default)]
pub struct UndoRedoStacks {
    undo: Vec<HistoryEntry>,
    redo: Vec<HistoryEntry>,
}

impl UndoRedoStacks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a new undoable operation. Any new forward action invalidates
    /// prior redo history, so `clear_redo` is true everywhere except when
    /// recording the counterpart token of a completed redo.
    pub fn push_undo(&mut self, token: impl Into<String>, clear_redo: bool) {
        self.undo.insert(0, HistoryEntry::new(token));
        self.undo.truncate(MAX_HISTORY);
        if clear_redo {
            self.redo.clear();
        }
    }

    pub fn push_redo(&mut self, token: impl Into<String>) {
        self.redo.insert(0, HistoryEntry::new(token));
        self.redo.truncate(MAX_HISTORY);
    }

    /// Drop a token that was consumed outside the stack (e.g. a toast's undo
    /// action used directly).
    pub fn remove_undo(&mut self, token: &str) {
        self.undo.retain(|entry| entry.id != token);
    }

    pub fn pop_undo(&mut self) -> Option<HistoryEntry> {
        if self.undo.is_empty() {
            None
        } else {
            Some(self.undo.remove(0))
        }
    }

    pub fn pop_redo(&mut self) -> Option<HistoryEntry> {
        if self.redo.is_empty() {
            None
        } else {
            Some(self.redo.remove(0))
        }
    }

    /// Put a popped entry back after a failed backend round-trip, so a
    /// failed undo is not lost and can be retried.
    pub fn restore_undo(&mut self, entry: HistoryEntry) {
        self.undo.insert(0, entry);
        self.undo.truncate(MAX_HISTORY);
    }

    pub fn restore_redo(&mut self, entry: HistoryEntry) {
        self.redo.insert(0, entry);
        self.redo.truncate(MAX_HISTORY);
    }

    pub fn can_undo(&self) -> bool {
        !self.undo.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo.is_empty()
    }

    pub fn undo_depth(&self) -> usize {
        self.undo.len()
    }

    pub fn redo_depth(&self) -> usize {
        self.redo.len()
    }
}
