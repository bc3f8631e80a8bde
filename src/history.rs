//! Linear undo/redo history of full canvas snapshots.
//!
//! The cursor points at the snapshot currently shown on the canvas, or is
//! `None` when the canvas is in its blank initial state. Recording after an
//! undo discards everything past the cursor.

#[derive(Debug, Clone)]
pub struct HistoryBuffer<T> {
    entries: Vec<T>,
    cursor: Option<usize>,
    limit: Option<usize>,
}

impl<T> Default for HistoryBuffer<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> HistoryBuffer<T> {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            cursor: None,
            limit: None,
        }
    }

    /// History that keeps at most `limit` entries, evicting the oldest.
    pub fn with_limit(limit: usize) -> Self {
        Self {
            limit: Some(limit.max(1)),
            ..Self::new()
        }
    }

    /// Drop the redo branch, append `entry` and point the cursor at it.
    pub fn record(&mut self, entry: T) {
        let keep = self.cursor.map_or(0, |c| c + 1);
        self.entries.truncate(keep);
        self.entries.push(entry);

        if let Some(limit) = self.limit {
            if self.entries.len() > limit {
                let excess = self.entries.len() - limit;
                self.entries.drain(..excess);
            }
        }

        self.cursor = Some(self.entries.len() - 1);
    }

    /// Step back one entry. Returns true if the cursor moved.
    pub fn undo(&mut self) -> bool {
        match self.cursor {
            Some(0) => {
                self.cursor = None;
                true
            }
            Some(c) => {
                self.cursor = Some(c - 1);
                true
            }
            None => false,
        }
    }

    /// Step forward one entry. Returns true if the cursor moved.
    pub fn redo(&mut self) -> bool {
        let next = self.cursor.map_or(0, |c| c + 1);
        if next < self.entries.len() {
            self.cursor = Some(next);
            true
        } else {
            false
        }
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.cursor = None;
    }

    /// The entry the canvas should show, `None` for blank.
    pub fn current(&self) -> Option<&T> {
        self.cursor.and_then(|c| self.entries.get(c))
    }

    pub fn cursor(&self) -> Option<usize> {
        self.cursor
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn can_undo(&self) -> bool {
        self.cursor.is_some()
    }

    pub fn can_redo(&self) -> bool {
        self.cursor.map_or(0, |c| c + 1) < self.entries.len()
    }

    pub fn entries(&self) -> &[T] {
        &self.entries
    }
}
