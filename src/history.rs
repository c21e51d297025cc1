//! Linear undo stack over serialized document snapshots.
//!
//! The stack itself knows nothing about the tree; [`Editor`] serializes the
//! document into a [`Snapshot`] and hands it over, and reads snapshots back
//! on undo/redo.
//!
//! [`Editor`]: crate::editor::Editor

use std::time::{Duration, Instant};

use crate::config::HistoryConfig;
use crate::editor::SelectionSnapshot;

#[derive(Clone, Debug, PartialEq)]
pub struct Snapshot {
    pub markup: String,
    pub selection: Option<SelectionSnapshot>,
    pub timestamp: Instant,
}

pub struct History {
    entries: Vec<Snapshot>,
    index: usize,
    max_size: usize,
    debounce: Duration,
    last_capture: Option<Instant>,
    capturing: bool,
}

impl History {
    pub fn new(config: &HistoryConfig) -> Self {
        Self {
            entries: Vec::new(),
            index: 0,
            max_size: config.max_size.max(1),
            debounce: config.debounce(),
            last_capture: None,
            capturing: true,
        }
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.index = 0;
        self.last_capture = None;
    }

    pub fn is_capturing(&self) -> bool {
        self.capturing
    }

    pub fn set_capturing(&mut self, capturing: bool) {
        self.capturing = capturing;
    }

    /// Whether a capture at `now` would be accepted. Lets callers skip
    /// serializing the document for pushes that would be dropped anyway.
    pub fn should_capture(&self, force: bool, now: Instant) -> bool {
        if !self.capturing {
            return false;
        }
        force
            || self
                .last_capture
                .is_none_or(|last| now.saturating_duration_since(last) >= self.debounce)
    }

    /// Records a snapshot. Entries after the current index are dropped first;
    /// the oldest entry is evicted once the stack is full. A snapshot whose
    /// markup equals the current entry is not stored again.
    pub fn push(&mut self, snapshot: Snapshot, force: bool) -> bool {
        if !self.should_capture(force, snapshot.timestamp) {
            return false;
        }
        self.last_capture = Some(snapshot.timestamp);

        if let Some(current) = self.entries.get_mut(self.index)
            && current.markup == snapshot.markup
        {
            current.selection = snapshot.selection;
            return false;
        }

        if !self.entries.is_empty() {
            self.entries.truncate(self.index + 1);
        }
        self.entries.push(snapshot);
        while self.entries.len() > self.max_size {
            self.entries.remove(0);
        }
        self.index = self.entries.len() - 1;
        true
    }

    pub fn can_undo(&self) -> bool {
        !self.entries.is_empty() && self.index > 0
    }

    pub fn can_redo(&self) -> bool {
        self.index + 1 < self.entries.len()
    }

    pub fn is_at_tip(&self) -> bool {
        self.entries.is_empty() || self.index + 1 == self.entries.len()
    }

    pub fn current(&self) -> Option<&Snapshot> {
        self.entries.get(self.index)
    }

    /// The entry [`History::step_back`] would move to, without moving.
    pub fn peek_back(&self) -> Option<&Snapshot> {
        if !self.can_undo() {
            return None;
        }
        self.entries.get(self.index - 1)
    }

    pub fn peek_forward(&self) -> Option<&Snapshot> {
        if !self.can_redo() {
            return None;
        }
        self.entries.get(self.index + 1)
    }

    pub fn step_back(&mut self) -> Option<&Snapshot> {
        if !self.can_undo() {
            return None;
        }
        self.index -= 1;
        self.entries.get(self.index)
    }

    pub fn step_forward(&mut self) -> Option<&Snapshot> {
        if !self.can_redo() {
            return None;
        }
        self.index += 1;
        self.entries.get(self.index)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn index(&self) -> usize {
        self.index
    }
}
