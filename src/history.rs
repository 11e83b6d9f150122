//! Bounded undo/redo over full plaintext snapshots of the collection.

use crate::storage::Note;

/// Default: keep the last N snapshots
pub const DEFAULT_HISTORY_LIMIT: usize = 50;

/// A full copy of the decrypted collection
pub type Snapshot = Vec<Note>;

/// Linear undo history with a cursor.
///
/// Once non-empty the cursor always points at an existing entry. Pushing
/// while the cursor is behind the newest entry discards the redo branch.
#[derive(Debug, Clone)]
pub struct HistoryLog<T = Snapshot> {
    entries: Vec<T>,
    cursor: usize,
    limit: usize,
    restoring: bool,
}

impl<T: Clone> Default for HistoryLog<T> {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_LIMIT)
    }
}

impl<T: Clone> HistoryLog<T> {
    pub fn new(limit: usize) -> Self {
        Self {
            entries: Vec::new(),
            cursor: 0,
            limit: limit.max(1),
            restoring: false,
        }
    }

    /// Record a new state. Ignored while a restore is in progress.
    ///
    /// Returns whether the snapshot was recorded.
    pub fn push(&mut self, snapshot: T) -> bool {
        if self.restoring {
            return false;
        }

        if !self.entries.is_empty() {
            self.entries.truncate(self.cursor + 1);
        }
        self.entries.push(snapshot);

        if self.entries.len() > self.limit {
            let excess = self.entries.len() - self.limit;
            self.entries.drain(..excess);
        }
        self.cursor = self.entries.len() - 1;
        true
    }

    /// Step back, returning the state to restore
    pub fn undo(&mut self) -> Option<T> {
        if !self.can_undo() {
            return None;
        }
        self.cursor -= 1;
        self.entries.get(self.cursor).cloned()
    }

    /// Step forward, returning the state to restore
    pub fn redo(&mut self) -> Option<T> {
        if !self.can_redo() {
            return None;
        }
        self.cursor += 1;
        self.entries.get(self.cursor).cloned()
    }

    pub fn can_undo(&self) -> bool {
        !self.entries.is_empty() && self.cursor > 0
    }

    pub fn can_redo(&self) -> bool {
        self.cursor + 1 < self.entries.len()
    }

    /// Drop everything and start over from `snapshot`
    pub fn reset_with(&mut self, snapshot: T) {
        self.clear();
        self.entries.push(snapshot);
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.cursor = 0;
        self.restoring = false;
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// State at the cursor
    pub fn current(&self) -> Option<&T> {
        self.entries.get(self.cursor)
    }

    pub fn begin_restore(&mut self) {
        self.restoring = true;
    }

    pub fn end_restore(&mut self) {
        self.restoring = false;
    }
}
