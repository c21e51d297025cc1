use tracing::{debug, warn};

use super::{DeferredTask, Editor};
use crate::error::{EditError, EditResult};
use crate::history::Snapshot;
use crate::schedule::Delay;
use crate::tree::NodeKind;
use crate::tree::markup;

impl Editor {
    /// Serializes the document onto the undo stack. Unforced captures inside
    /// the debounce window are skipped without serializing.
    pub(crate) fn capture_history(&mut self, force: bool) -> bool {
        let now = self.clock.now();
        if !self.history.should_capture(force, now) {
            return false;
        }
        let snapshot = Snapshot {
            markup: self.to_markup(),
            selection: self.selection_snapshot(),
            timestamp: now,
        };
        self.history.push(snapshot, force)
    }

    /// Starts a fresh stack whose only entry is the current document.
    pub(crate) fn initialize_history(&mut self) {
        self.history.clear();
        self.history.set_capturing(true);
        self.capture_history(true);
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    pub fn undo(&mut self) -> EditResult {
        if self.history.is_at_tip() {
            // Edits inside the debounce window are not on the stack yet.
            self.capture_history(true);
        }
        // The index only moves once the snapshot has been restored.
        let Some(snapshot) = self.history.peek_back().cloned() else {
            return Ok(false);
        };
        let restored = self.restore_snapshot(snapshot)?;
        self.history.step_back();
        debug!(index = self.history.index(), "undo");
        Ok(restored)
    }

    pub fn redo(&mut self) -> EditResult {
        let Some(snapshot) = self.history.peek_forward().cloned() else {
            return Ok(false);
        };
        let restored = self.restore_snapshot(snapshot)?;
        self.history.step_forward();
        debug!(index = self.history.index(), "redo");
        Ok(restored)
    }

    /// Swaps the document for a snapshot. Capture stays off until the
    /// restore has settled, and the snapshot's selection is re-applied once
    /// the host has rendered the new content.
    fn restore_snapshot(&mut self, snapshot: Snapshot) -> EditResult {
        self.history.set_capturing(false);

        let staging = self.tree.create(NodeKind::Root);
        if let Err(err) =
            markup::deserialize_into(&mut self.tree, staging, &snapshot.markup, &self.plugins)
        {
            warn!(%err, "history snapshot does not parse");
            self.tree.remove(staging);
            self.history.set_capturing(true);
            return Err(EditError::Markup(err));
        }
        self.tree.clear();
        let root = self.tree.root();
        self.tree.move_children(staging, root);
        self.tree.remove(staging);
        self.ensure_document_initialized();

        self.focused = true;
        self.selection = None;
        self.ensure_selection();
        if let Some(selection) = snapshot.selection {
            self.schedule(Delay::Medium, DeferredTask::RestoreSelection(selection));
        }
        self.schedule(Delay::Settle, DeferredTask::ResumeCapture);
        self.host.on_content_change();
        Ok(true)
    }
}
