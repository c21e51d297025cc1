use tracing::{debug, trace};

use super::Editor;
use super::content::{closest_item, closest_text_block, ensure_placeholder, item_sublist};
use super::structure::item_depth;
use crate::error::{EditError, EditResult};
use crate::tree::{NodeId, NodeKind, Progress, Tree};

impl Editor {
    /// Outside a list, creates a one-item checklist. Inside a list, adds a
    /// checkbox to every item at the caret's level, or removes them all when
    /// any item there already has one.
    pub fn toggle_checklist(&mut self) -> EditResult {
        let caret = self.require_caret()?;
        let Some(item) = closest_item(&self.tree, caret.node) else {
            let block = closest_text_block(&self.tree, caret.node);
            let item = self.wrap_in_list(block, caret, false)?;
            if let Some(attrs) = self.tree.attrs_mut(item) {
                attrs.checkbox = Some(false);
            }
            self.normalize_document();
            self.commit();
            return Ok(true);
        };

        let list = self.tree.parent(item).ok_or(EditError::DetachedNode)?;
        let items: Vec<NodeId> = self
            .tree
            .children(list)
            .iter()
            .copied()
            .filter(|child| matches!(self.tree.kind(*child), Some(NodeKind::ListItem)))
            .collect();
        let any_checkbox = items.iter().any(|id| {
            self.tree
                .attrs(*id)
                .is_some_and(|attrs| attrs.checkbox.is_some())
        });
        debug!(items = items.len(), remove = any_checkbox, "toggling checklist");
        for id in items {
            if let Some(attrs) = self.tree.attrs_mut(id) {
                attrs.checkbox = if any_checkbox { None } else { Some(false) };
            }
        }
        self.normalize_document();
        self.commit();
        Ok(true)
    }

    /// Flips the checkbox of the item at the caret. Items without a
    /// checkbox are left alone.
    pub fn toggle_item_checked(&mut self) -> EditResult {
        let caret = self.require_caret()?;
        let item = closest_item(&self.tree, caret.node).ok_or(EditError::NotInList)?;
        let Some(checked) = self.tree.attrs(item).and_then(|attrs| attrs.checkbox) else {
            return Ok(false);
        };
        self.set_item_checked(item, !checked)
    }

    pub fn set_item_checked(&mut self, item: NodeId, checked: bool) -> EditResult {
        if !self.tree.is_connected(item) {
            return Err(EditError::DetachedNode);
        }
        let Some(attrs) = self.tree.attrs_mut(item) else {
            return Err(EditError::DetachedNode);
        };
        match attrs.checkbox {
            Some(current) if current == checked => return Ok(false),
            Some(_) => attrs.checkbox = Some(checked),
            None => return Ok(false),
        }
        self.normalize_document();
        self.commit();
        Ok(true)
    }

    pub fn remove_item_checkbox(&mut self, item: NodeId) -> EditResult {
        if !self.tree.is_connected(item) {
            return Err(EditError::DetachedNode);
        }
        let Some(attrs) = self.tree.attrs_mut(item) else {
            return Err(EditError::DetachedNode);
        };
        if attrs.checkbox.take().is_none() {
            return Ok(false);
        }
        self.normalize_document();
        self.commit();
        Ok(true)
    }

    /// Checked/total counts for the list closest to the caret.
    pub fn caret_list_progress(&self) -> Option<Progress> {
        let caret = self.caret()?;
        let list = std::iter::once(caret.node)
            .chain(self.tree.ancestors(caret.node))
            .find(|id| self.tree.kind(*id).is_some_and(NodeKind::is_list))?;
        self.tree.attrs(list)?.progress
    }

    pub fn current_item_checked(&self) -> Option<bool> {
        let caret = self.caret()?;
        let item = closest_item(&self.tree, caret.node)?;
        self.tree.attrs(item)?.checkbox
    }
}

// ============================================================================
// Normalization
// ============================================================================

/// Brings the tree back to its structural invariants. Running it twice
/// changes nothing the second time.
pub fn normalize_tree(tree: &mut Tree, max_nesting: usize) {
    let root = tree.root();
    wrap_loose_inline(tree, root);
    repair_lists(tree, root);
    clamp_depth(tree, max_nesting.max(1));
    remove_empty_lists(tree, root);
    merge_adjacent_lists(tree, root);
    reconcile_checklists(tree, root);
    stamp_attributes(tree, root, 0);
    for holder in tree
        .descendants(root)
        .into_iter()
        .filter(|id| tree.kind(*id).is_some_and(NodeKind::holds_inline))
        .collect::<Vec<_>>()
    {
        ensure_placeholder(tree, holder);
    }
}

/// Runs of inline nodes directly in the root become paragraphs.
fn wrap_loose_inline(tree: &mut Tree, root: NodeId) {
    let mut idx = 0;
    while let Some(child) = tree.children(root).get(idx).copied() {
        if !tree.kind(child).is_some_and(NodeKind::is_inline) {
            idx += 1;
            continue;
        }
        let paragraph = tree.create(NodeKind::Paragraph);
        while let Some(next) = tree.children(root).get(idx).copied() {
            if !tree.kind(next).is_some_and(NodeKind::is_inline) {
                break;
            }
            tree.detach(next);
            tree.append_child(paragraph, next);
        }
        tree.insert_child(root, idx, paragraph);
        trace!("wrapped loose inline content into a paragraph");
        idx += 1;
    }
}

/// Lists only hold items, and items hold at most one list, as last child.
fn repair_lists(tree: &mut Tree, node: NodeId) {
    for child in tree.children(node).to_vec() {
        repair_lists(tree, child);
    }
    match tree.kind(node) {
        Some(NodeKind::List { .. }) => repair_list_children(tree, node),
        Some(NodeKind::ListItem) => repair_item_children(tree, node),
        _ => {}
    }
}

fn repair_list_children(tree: &mut Tree, list: NodeId) {
    let mut idx = 0;
    while let Some(child) = tree.children(list).get(idx).copied() {
        let kind = tree.kind(child).cloned();
        match kind {
            Some(NodeKind::ListItem) => {}
            Some(NodeKind::List { .. }) => {
                // A list directly inside a list belongs to the item before it.
                let owner = match idx.checked_sub(1).map(|prev| tree.children(list)[prev]) {
                    Some(previous) => previous,
                    None => {
                        let item = tree.create(NodeKind::ListItem);
                        tree.insert_child(list, idx, item);
                        idx += 1;
                        item
                    }
                };
                tree.detach(child);
                match item_sublist(tree, owner) {
                    Some(existing) => {
                        tree.move_children(child, existing);
                        tree.remove(child);
                    }
                    None => {
                        tree.append_child(owner, child);
                    }
                }
                continue;
            }
            Some(kind) if kind.holds_inline() => {
                let item = tree.create(NodeKind::ListItem);
                tree.move_children(child, item);
                tree.replace(child, item);
                tree.remove(child);
            }
            _ => {
                let item = tree.create(NodeKind::ListItem);
                tree.replace(child, item);
                tree.append_child(item, child);
            }
        }
        idx += 1;
    }
}

fn repair_item_children(tree: &mut Tree, item: NodeId) {
    let lists: Vec<NodeId> = tree
        .children(item)
        .iter()
        .copied()
        .filter(|child| tree.kind(*child).is_some_and(NodeKind::is_list))
        .collect();
    let Some((&first, rest)) = lists.split_first() else {
        return;
    };
    for extra in rest {
        tree.move_children(*extra, first);
        tree.remove(*extra);
    }
    if tree.children(item).last() != Some(&first) {
        tree.detach(first);
        tree.append_child(item, first);
    }
}

/// Lifts items nested deeper than `max_nesting` to the level above until the
/// limit holds.
fn clamp_depth(tree: &mut Tree, max_nesting: usize) {
    loop {
        let root = tree.root();
        let too_deep = tree.descendants(root).into_iter().find(|id| {
            matches!(tree.kind(*id), Some(NodeKind::ListItem)) && item_depth(tree, *id) > max_nesting
        });
        let Some(item) = too_deep else {
            return;
        };
        let Some(list) = tree.parent(item) else {
            return;
        };
        let Some(owner) = tree.parent(list) else {
            return;
        };
        debug!(limit = max_nesting, "lifting over-nested list");
        let mut anchor = owner;
        for child in tree.children(list).to_vec() {
            tree.detach(child);
            tree.insert_after(anchor, child);
            anchor = child;
        }
        tree.remove(list);
    }
}

fn remove_empty_lists(tree: &mut Tree, node: NodeId) {
    for child in tree.children(node).to_vec() {
        remove_empty_lists(tree, child);
    }
    if tree.kind(node).is_some_and(NodeKind::is_list) && tree.child_count(node) == 0 {
        tree.remove(node);
    }
}

fn mergeable(tree: &Tree, left: NodeId, right: NodeId) -> bool {
    match (tree.kind(left), tree.kind(right)) {
        (Some(NodeKind::List { ordered: a }), Some(NodeKind::List { ordered: b })) => {
            a == b && has_checkboxes(tree, left) == has_checkboxes(tree, right)
        }
        _ => false,
    }
}

fn has_checkboxes(tree: &Tree, list: NodeId) -> bool {
    list_progress(tree, list).is_some()
}

/// Joins sibling lists of the same type and checklist state.
fn merge_adjacent_lists(tree: &mut Tree, node: NodeId) {
    let mut idx = 1;
    while let Some(child) = tree.children(node).get(idx).copied() {
        let previous = tree.children(node)[idx - 1];
        if mergeable(tree, previous, child) {
            tree.move_children(child, previous);
            tree.remove(child);
            continue;
        }
        idx += 1;
    }
    for child in tree.children(node).to_vec() {
        merge_adjacent_lists(tree, child);
    }
}

/// A list is a checklist when any item below it has a checkbox.
fn reconcile_checklists(tree: &mut Tree, node: NodeId) -> bool {
    let mut found = tree
        .attrs(node)
        .is_some_and(|attrs| attrs.checkbox.is_some());
    for child in tree.children(node).to_vec() {
        found |= reconcile_checklists(tree, child);
    }
    if tree.kind(node).is_some_and(NodeKind::is_list)
        && let Some(attrs) = tree.attrs_mut(node)
    {
        attrs.checklist = found;
    }
    found
}

fn stamp_attributes(tree: &mut Tree, node: NodeId, depth: usize) {
    let kind = tree.kind(node).cloned();
    let child_depth = match kind {
        Some(NodeKind::List { .. }) => {
            let progress = list_progress(tree, node);
            if let Some(attrs) = tree.attrs_mut(node) {
                attrs.progress = progress;
                attrs.depth = None;
            }
            depth + 1
        }
        Some(NodeKind::ListItem) => {
            if let Some(attrs) = tree.attrs_mut(node) {
                attrs.depth = Some(depth);
                attrs.progress = None;
                attrs.checklist = false;
            }
            depth
        }
        _ => {
            if let Some(attrs) = tree.attrs_mut(node) {
                attrs.depth = None;
                attrs.progress = None;
                attrs.checkbox = None;
                attrs.checklist = false;
            }
            depth
        }
    };
    for child in tree.children(node).to_vec() {
        stamp_attributes(tree, child, child_depth);
    }
}

/// Checked and total checkbox counts over every item below `list`. `None`
/// when no item has a checkbox.
pub(crate) fn list_progress(tree: &Tree, list: NodeId) -> Option<Progress> {
    let mut progress = Progress {
        checked: 0,
        total: 0,
    };
    for id in tree.descendants(list) {
        if let Some(checked) = tree.attrs(id).and_then(|attrs| attrs.checkbox) {
            progress.total += 1;
            if checked {
                progress.checked += 1;
            }
        }
    }
    (progress.total > 0).then_some(progress)
}
