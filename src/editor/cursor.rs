use tracing::{debug, warn};

use super::{Editor, Position, Selection};
use crate::tree::{NodeId, NodeKind, Tree};

/// A live selection copied out of the editor. Restoring it only works while
/// every referenced node is still in the document.
pub type SavedSelection = Selection;

/// One end of a [`SelectionSnapshot`]: child indices from the root plus the
/// offset inside the addressed node.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PathPoint {
    pub path: Vec<usize>,
    pub offset: usize,
}

/// Selection stored by tree position rather than node handle, so it can be
/// resolved against a rebuilt tree.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SelectionSnapshot {
    pub start: PathPoint,
    pub end: PathPoint,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Affinity {
    /// At a boundary between two text nodes, land at the end of the first.
    Backward,
    /// At a boundary between two text nodes, land at the start of the second.
    Forward,
}

// ============================================================================
// Tree-level helpers
// ============================================================================

pub(crate) fn max_offset(tree: &Tree, node: NodeId) -> Option<usize> {
    match tree.kind(node)? {
        NodeKind::Text(text) => Some(text.chars().count()),
        _ => Some(tree.child_count(node)),
    }
}

pub(crate) fn position_is_valid(tree: &Tree, position: Position) -> bool {
    tree.is_connected(position.node)
        && max_offset(tree, position.node).is_some_and(|max| position.offset <= max)
}

pub(crate) fn path_of(tree: &Tree, node: NodeId) -> Option<Vec<usize>> {
    if !tree.is_connected(node) {
        return None;
    }
    let mut path = Vec::new();
    let mut current = node;
    while current != tree.root() {
        path.push(tree.index_in_parent(current)?);
        current = tree.parent(current)?;
    }
    path.reverse();
    Some(path)
}

pub(crate) fn node_at_path(tree: &Tree, path: &[usize]) -> Option<NodeId> {
    let mut current = tree.root();
    for idx in path {
        current = *tree.children(current).get(*idx)?;
    }
    Some(current)
}

/// Nearest ancestor-or-self that directly owns inline content.
pub(crate) fn inline_container(tree: &Tree, node: NodeId) -> Option<NodeId> {
    std::iter::once(node)
        .chain(tree.ancestors(node))
        .find(|id| tree.kind(*id).is_some_and(NodeKind::holds_inline))
}

/// Text nodes of a block's own inline content, in document order. Nested
/// blocks (a list item's sub-list) are not entered.
pub(crate) fn inline_text_nodes(tree: &Tree, container: NodeId) -> Vec<NodeId> {
    let mut result = Vec::new();
    collect_text_nodes(tree, container, &mut result);
    result
}

pub(crate) fn inline_len(tree: &Tree, container: NodeId) -> usize {
    inline_text_nodes(tree, container)
        .into_iter()
        .map(|text| tree.char_len(text))
        .sum()
}

fn collect_text_nodes(tree: &Tree, node: NodeId, out: &mut Vec<NodeId>) {
    for child in tree.children(node) {
        match tree.kind(*child) {
            Some(NodeKind::Text(_)) => out.push(*child),
            Some(kind) if kind.is_inline() => collect_text_nodes(tree, *child, out),
            _ => {}
        }
    }
}

/// Char offset of `target` measured from the start of `container`'s own
/// inline text. `None` when the position is not inside that content.
pub(crate) fn offset_in_container(
    tree: &Tree,
    container: NodeId,
    target: Position,
) -> Option<usize> {
    let mut consumed = 0;
    locate(tree, container, target, &mut consumed).then_some(consumed)
}

fn locate(tree: &Tree, node: NodeId, target: Position, consumed: &mut usize) -> bool {
    for (idx, child) in tree.children(node).iter().enumerate() {
        if node == target.node && idx == target.offset {
            return true;
        }
        match tree.kind(*child) {
            Some(NodeKind::Text(text)) => {
                let len = text.chars().count();
                if *child == target.node {
                    *consumed += target.offset.min(len);
                    return true;
                }
                *consumed += len;
            }
            Some(kind) if kind.is_inline() => {
                if locate(tree, *child, target, consumed) {
                    return true;
                }
            }
            _ => {}
        }
    }
    node == target.node
}

/// Resolves a char offset inside `container` back to a text position,
/// clamping to the end of the content.
pub(crate) fn position_for_offset(
    tree: &Tree,
    container: NodeId,
    offset: usize,
    affinity: Affinity,
) -> Position {
    let mut consumed = 0;
    for text in inline_text_nodes(tree, container) {
        let len = tree.char_len(text);
        let fits = match affinity {
            Affinity::Backward => offset <= consumed + len,
            Affinity::Forward => offset < consumed + len,
        };
        if fits {
            return Position::new(text, offset.saturating_sub(consumed));
        }
        consumed += len;
    }
    end_position(tree, container)
}

pub(crate) fn start_position(tree: &Tree, container: NodeId) -> Position {
    match inline_text_nodes(tree, container).first() {
        Some(text) => Position::new(*text, 0),
        None => Position::new(container, 0),
    }
}

/// Caret position at the end of a node's own content. Container nodes such
/// as lists or the root resolve to their last text-holding descendant.
pub(crate) fn end_position(tree: &Tree, node: NodeId) -> Position {
    match tree.kind(node) {
        Some(NodeKind::Text(text)) => Position::new(node, text.chars().count()),
        Some(kind) if kind.holds_inline() || kind.is_inline() => {
            match inline_text_nodes(tree, node).last() {
                Some(text) => Position::new(*text, tree.char_len(*text)),
                None => Position::new(node, 0),
            }
        }
        Some(_) => {
            let last_holder = tree
                .descendants(node)
                .into_iter()
                .rev()
                .find(|id| tree.kind(*id).is_some_and(NodeKind::holds_inline));
            match last_holder {
                Some(holder) => end_position(tree, holder),
                None => Position::new(node, tree.child_count(node)),
            }
        }
        None => {
            let root = tree.root();
            end_position(tree, root)
        }
    }
}

// ============================================================================
// Selection handling on the editor
// ============================================================================

impl Editor {
    /// The current selection if every end still points into the document.
    pub fn selection(&self) -> Option<Selection> {
        self.selection.filter(|selection| {
            position_is_valid(&self.tree, selection.start)
                && position_is_valid(&self.tree, selection.end)
        })
    }

    pub fn caret(&self) -> Option<Position> {
        self.selection().map(|selection| selection.start)
    }

    pub(crate) fn require_caret(&self) -> Result<Position, crate::error::EditError> {
        self.caret().ok_or_else(|| {
            warn!("no live selection");
            crate::error::EditError::NoSelection
        })
    }

    pub fn set_selection(&mut self, selection: Selection) -> bool {
        if !position_is_valid(&self.tree, selection.start)
            || !position_is_valid(&self.tree, selection.end)
        {
            warn!(?selection, "refusing selection outside the document");
            return false;
        }
        self.selection = Some(selection);
        true
    }

    /// Collapses the selection at `node`, clamping the offset.
    pub fn position_at(&mut self, node: NodeId, offset: usize) -> bool {
        if !self.tree.is_connected(node) {
            warn!(?node, "cannot place caret in a detached node");
            return false;
        }
        let Some(max) = max_offset(&self.tree, node) else {
            return false;
        };
        self.selection = Some(Selection::caret(Position::new(node, offset.min(max))));
        true
    }

    pub fn save_selection(&self) -> Option<SavedSelection> {
        self.selection()
    }

    /// Re-applies a saved selection. When it no longer resolves, the caret
    /// falls back to the end of the nearest surviving ancestor.
    pub fn restore_selection(&mut self, saved: &SavedSelection) -> bool {
        if self.set_selection(*saved) {
            return true;
        }
        self.collapse_near(Some(saved.start.node));
        false
    }

    pub fn selection_snapshot(&self) -> Option<SelectionSnapshot> {
        let selection = self.selection()?;
        Some(SelectionSnapshot {
            start: PathPoint {
                path: path_of(&self.tree, selection.start.node)?,
                offset: selection.start.offset,
            },
            end: PathPoint {
                path: path_of(&self.tree, selection.end.node)?,
                offset: selection.end.offset,
            },
        })
    }

    pub fn restore_selection_snapshot(&mut self, snapshot: &SelectionSnapshot) -> bool {
        let (Some(start), Some(end)) = (
            self.resolve_point(&snapshot.start),
            self.resolve_point(&snapshot.end),
        ) else {
            return false;
        };
        self.selection = Some(Selection { start, end });
        true
    }

    fn resolve_point(&self, point: &PathPoint) -> Option<Position> {
        let node = node_at_path(&self.tree, &point.path)?;
        let max = max_offset(&self.tree, node)?;
        Some(Position::new(node, point.offset.min(max)))
    }

    /// Caret offset within `block`'s own text, or `None` when the caret is
    /// elsewhere.
    pub fn text_offset_in_block(&self, block: NodeId) -> Option<usize> {
        let caret = self.caret()?;
        offset_in_container(&self.tree, block, caret)
    }

    /// Places the caret at a text offset inside `block`, clamped to its
    /// length. Falls back to the end of the block when it has no text.
    pub fn restore_text_offset_in_block(&mut self, block: NodeId, offset: usize) -> bool {
        if !self.tree.is_connected(block) {
            debug!(?block, "offset restore target is gone");
            self.ensure_selection();
            return false;
        }
        let position = position_for_offset(&self.tree, block, offset, Affinity::Backward);
        self.selection = Some(Selection::caret(position));
        true
    }

    /// Selects the text between two char offsets of `block`.
    pub fn select_text_in_block(&mut self, block: NodeId, start: usize, end: usize) -> bool {
        if !self.tree.is_connected(block) {
            return false;
        }
        let (start, end) = if start <= end { (start, end) } else { (end, start) };
        if start == end {
            return self.restore_text_offset_in_block(block, start);
        }
        let start = position_for_offset(&self.tree, block, start, Affinity::Forward);
        let end = position_for_offset(&self.tree, block, end, Affinity::Backward);
        self.selection = Some(Selection { start, end });
        true
    }

    // ========================================================================
    // Markers
    // ========================================================================

    /// Drops a zero-width marker node at the caret. The marker survives
    /// structural moves of the surrounding content.
    pub fn insert_marker(&mut self) -> Option<NodeId> {
        let caret = self.caret()?;
        let marker = self.tree.create(NodeKind::Marker);
        let inserted = match self.tree.kind(caret.node) {
            Some(NodeKind::Text(text)) => {
                let len = text.chars().count();
                if caret.offset == 0 {
                    self.tree.insert_before(caret.node, marker)
                } else if caret.offset >= len {
                    self.tree.insert_after(caret.node, marker)
                } else {
                    self.tree.split_text(caret.node, caret.offset).is_some()
                        && self.tree.insert_after(caret.node, marker)
                }
            }
            Some(_) => self.tree.insert_child(caret.node, caret.offset, marker),
            None => false,
        };
        if !inserted {
            self.tree.remove(marker);
            return None;
        }
        Some(marker)
    }

    /// Removes a marker and collapses the caret where it was, merging the
    /// text on either side.
    pub fn restore_marker(&mut self, marker: NodeId) -> bool {
        if !self.tree.is_connected(marker) {
            warn!(?marker, "marker was lost");
            self.tree.remove(marker);
            self.ensure_selection();
            return false;
        }
        let (Some(parent), Some(index)) =
            (self.tree.parent(marker), self.tree.index_in_parent(marker))
        else {
            return false;
        };
        let previous = self.tree.previous_sibling(marker);
        let next = self.tree.next_sibling(marker);
        self.tree.remove(marker);

        let previous_text = previous.filter(|id| self.tree.text(*id).is_some());
        let next_text = next.filter(|id| self.tree.text(*id).is_some());
        let position = match (previous_text, next_text) {
            (Some(left), Some(right)) => {
                let offset = self.tree.char_len(left);
                let mut merged = self.tree.text(left).unwrap_or_default().to_string();
                merged.push_str(self.tree.text(right).unwrap_or_default());
                self.tree.set_text(left, merged);
                self.tree.remove(right);
                Position::new(left, offset)
            }
            (Some(left), None) => Position::new(left, self.tree.char_len(left)),
            (None, Some(right)) => Position::new(right, 0),
            (None, None) => Position::new(parent, index),
        };
        self.selection = Some(Selection::caret(position));
        true
    }

    // ========================================================================
    // Fallbacks
    // ========================================================================

    /// Makes sure some caret exists, degrading to the end of the nearest
    /// surviving ancestor of the stale selection, or the document end.
    pub(crate) fn ensure_selection(&mut self) {
        if self.selection().is_some() {
            return;
        }
        let anchor = self.selection.take().map(|selection| selection.start.node);
        self.collapse_near(anchor);
    }

    fn collapse_near(&mut self, anchor: Option<NodeId>) {
        let root = self.tree.root();
        let mut candidate = anchor;
        let target = loop {
            match candidate {
                Some(id) if self.tree.is_connected(id) => break id,
                Some(id) if self.tree.contains(id) => candidate = self.tree.parent(id),
                _ => break root,
            }
        };
        let position = end_position(&self.tree, target);
        self.selection = Some(Selection::caret(position));
    }

    pub fn move_to_document_end(&mut self) {
        let root = self.tree.root();
        let position = end_position(&self.tree, root);
        self.selection = Some(Selection::caret(position));
    }

    pub fn move_to_document_start(&mut self) {
        let root = self.tree.root();
        let first_holder = self
            .tree
            .descendants(root)
            .into_iter()
            .find(|id| self.tree.kind(*id).is_some_and(NodeKind::holds_inline));
        let position = match first_holder {
            Some(holder) => start_position(&self.tree, holder),
            None => Position::new(root, 0),
        };
        self.selection = Some(Selection::caret(position));
    }
}
