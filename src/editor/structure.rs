use tracing::{debug, warn};

use super::content::{
    cleanup_inline, closest_item, closest_text_block, ensure_placeholder, is_inline_empty,
    item_sublist, split_inline_at,
};
use super::cursor::{end_position, start_position};
use super::{Editor, Position, Selection};
use crate::error::{EditError, EditResult};
use crate::tree::{NodeId, NodeKind, Tree};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DropPlacement {
    Before,
    After,
}

// ============================================================================
// Tree helpers
// ============================================================================

/// Number of lists between the item and the root.
pub(crate) fn item_depth(tree: &Tree, item: NodeId) -> usize {
    tree.ancestors(item)
        .filter(|id| tree.kind(*id).is_some_and(NodeKind::is_list))
        .count()
}

/// Levels of nested items below `item`; zero without a sub-list.
pub(crate) fn subtree_height(tree: &Tree, item: NodeId) -> usize {
    let Some(sublist) = item_sublist(tree, item) else {
        return 0;
    };
    1 + tree
        .children(sublist)
        .iter()
        .map(|child| subtree_height(tree, *child))
        .max()
        .unwrap_or(0)
}

fn list_is_ordered(tree: &Tree, list: NodeId) -> Option<bool> {
    match tree.kind(list)? {
        NodeKind::List { ordered } => Some(*ordered),
        _ => None,
    }
}

/// A new empty list with the same type and checklist flag as `list`.
pub(crate) fn list_like(tree: &mut Tree, list: NodeId) -> NodeId {
    let ordered = list_is_ordered(tree, list).unwrap_or(false);
    let checklist = tree.attrs(list).is_some_and(|attrs| attrs.checklist);
    let created = tree.create(NodeKind::List { ordered });
    if let Some(attrs) = tree.attrs_mut(created) {
        attrs.checklist = checklist;
    }
    created
}

fn parent_list(tree: &Tree, item: NodeId) -> Result<NodeId, EditError> {
    let list = tree.parent(item).ok_or(EditError::DetachedNode)?;
    if !tree.kind(list).is_some_and(NodeKind::is_list) {
        return Err(EditError::NotInList);
    }
    Ok(list)
}

/// Moves `item` into the sub-list of its previous sibling.
pub(crate) fn indent_in_tree(tree: &mut Tree, item: NodeId, max_nesting: usize) -> EditResult {
    let list = parent_list(tree, item)?;
    let Some(previous) = tree.previous_sibling(item) else {
        warn!(?item, "cannot indent the first item of a list");
        return Err(EditError::FirstItemIndent);
    };
    let depth = item_depth(tree, item);
    if depth + 1 + subtree_height(tree, item) > max_nesting {
        warn!(depth, limit = max_nesting, "indent would exceed nesting limit");
        return Err(EditError::MaxNesting { limit: max_nesting });
    }
    let sublist = match item_sublist(tree, previous) {
        Some(sublist) => sublist,
        None => {
            let sublist = list_like(tree, list);
            tree.append_child(previous, sublist);
            sublist
        }
    };
    tree.detach(item);
    tree.append_child(sublist, item);
    Ok(true)
}

/// Moves a nested item up one level, right after the item that owned its
/// list. Siblings that followed it become its children. An item holds a
/// single sub-list, so when it already has one the followers are appended
/// to it and take its type; checkboxes stay on the items.
pub(crate) fn outdent_in_tree(tree: &mut Tree, item: NodeId) -> EditResult {
    let list = parent_list(tree, item)?;
    let Some(owner) = tree
        .parent(list)
        .filter(|id| matches!(tree.kind(*id), Some(NodeKind::ListItem)))
    else {
        return Ok(false);
    };
    let index = tree.index_in_parent(item).ok_or(EditError::DetachedNode)?;
    let following = tree.children(list)[index + 1..].to_vec();
    if !following.is_empty() {
        let sublist = match item_sublist(tree, item) {
            Some(sublist) => sublist,
            None => {
                let sublist = list_like(tree, list);
                tree.append_child(item, sublist);
                sublist
            }
        };
        for sibling in following {
            tree.detach(sibling);
            tree.append_child(sublist, sibling);
        }
    }
    tree.detach(item);
    tree.insert_after(owner, item);
    if tree.child_count(list) == 0 {
        tree.remove(list);
    }
    Ok(true)
}

/// Turns a top-level item into a paragraph in place. Items after it move to
/// a new list following the paragraph; its own sub-list is kept in between.
pub(crate) fn unwrap_item_in_tree(tree: &mut Tree, item: NodeId) -> Option<NodeId> {
    let list = tree.parent(item)?;
    let index = tree.index_in_parent(item)?;
    let trailing = tree.children(list)[index + 1..].to_vec();
    let sublist = item_sublist(tree, item);
    if let Some(sublist) = sublist {
        tree.detach(sublist);
    }

    let paragraph = tree.create(NodeKind::Paragraph);
    tree.move_children(item, paragraph);
    ensure_placeholder(tree, paragraph);
    if !tree.insert_after(list, paragraph) {
        tree.remove(paragraph);
        return None;
    }

    let mut anchor = paragraph;
    if let Some(sublist) = sublist {
        tree.insert_after(anchor, sublist);
        anchor = sublist;
    }
    if !trailing.is_empty() {
        let rest = list_like(tree, list);
        for sibling in trailing {
            tree.detach(sibling);
            tree.append_child(rest, sibling);
        }
        tree.insert_after(anchor, rest);
    }
    tree.remove(item);
    if tree.child_count(list) == 0 {
        tree.remove(list);
    }
    Some(paragraph)
}

/// Takes an empty top-level item out of its list and puts a fresh paragraph
/// after the whole list. Items nested under it take its place.
pub(crate) fn exit_list_after(tree: &mut Tree, item: NodeId) -> Option<NodeId> {
    let list = tree.parent(item)?;
    let paragraph = tree.create(NodeKind::Paragraph);
    ensure_placeholder(tree, paragraph);
    if !tree.insert_after(list, paragraph) {
        tree.remove(paragraph);
        return None;
    }

    if let Some(sublist) = item_sublist(tree, item) {
        let mut anchor = item;
        for child in tree.children(sublist).to_vec() {
            tree.detach(child);
            tree.insert_after(anchor, child);
            anchor = child;
        }
    }
    tree.remove(item);
    if tree.child_count(list) == 0 {
        tree.remove(list);
    }
    Some(paragraph)
}

// ============================================================================
// List commands
// ============================================================================

impl Editor {
    /// Toggles the list type at the caret. Inside a list of the same type the
    /// item leaves the list; inside the other type the list is retagged;
    /// outside any list the current block becomes a one-item list.
    pub fn toggle_list(&mut self, ordered: bool) -> EditResult {
        let caret = self.require_caret()?;
        let Some(item) = closest_item(&self.tree, caret.node) else {
            let block = closest_text_block(&self.tree, caret.node);
            self.wrap_in_list(block, caret, ordered)?;
            self.commit();
            return Ok(true);
        };

        let list = parent_list(&self.tree, item)?;
        if list_is_ordered(&self.tree, list) == Some(ordered) {
            let offset = self.text_offset_in_block(item).unwrap_or(0);
            while item_depth(&self.tree, item) > 1 {
                if !outdent_in_tree(&mut self.tree, item)? {
                    break;
                }
            }
            let Some(paragraph) = unwrap_item_in_tree(&mut self.tree, item) else {
                return Ok(false);
            };
            self.normalize_document();
            self.restore_text_offset_in_block(paragraph, offset);
        } else {
            self.tree.retag(list, NodeKind::List { ordered });
            self.normalize_document();
        }
        self.commit();
        Ok(true)
    }

    /// Wraps `block` (or a fresh empty item when there is none) into a new
    /// single-item list and returns the item.
    pub(crate) fn wrap_in_list(
        &mut self,
        block: Option<NodeId>,
        caret: Position,
        ordered: bool,
    ) -> Result<NodeId, EditError> {
        let list = self.tree.create(NodeKind::List { ordered });
        let item = self.tree.create(NodeKind::ListItem);
        self.tree.append_child(list, item);

        match block {
            Some(block) => {
                let offset = self.text_offset_in_block(block).unwrap_or(0);
                self.tree.move_children(block, item);
                if !self.tree.replace(block, list) {
                    self.tree.move_children(item, block);
                    self.tree.remove(list);
                    return Err(EditError::MissingParent);
                }
                self.tree.remove(block);
                self.normalize_document();
                self.restore_text_offset_in_block(item, offset);
            }
            None => {
                let placeholder = self.tree.create(NodeKind::LineBreak);
                self.tree.append_child(item, placeholder);
                if !self.insert_block_near_caret(caret, list) {
                    self.tree.remove(list);
                    return Err(EditError::MissingParent);
                }
                self.normalize_document();
                self.selection = Some(Selection::caret(Position::new(item, 0)));
            }
        }
        Ok(item)
    }

    pub fn indent_item(&mut self) -> EditResult {
        let caret = self.require_caret()?;
        let item = closest_item(&self.tree, caret.node).ok_or(EditError::NotInList)?;
        self.indent_list_item(item)
    }

    pub fn indent_list_item(&mut self, item: NodeId) -> EditResult {
        if !self.tree.is_connected(item) {
            return Err(EditError::DetachedNode);
        }
        let saved = self.save_selection();
        indent_in_tree(&mut self.tree, item, self.config.max_nesting)?;
        self.normalize_document();
        if let Some(saved) = saved {
            self.restore_selection(&saved);
        }
        self.commit();
        Ok(true)
    }

    /// Moves the item at the caret one level up. At the top level the item
    /// leaves the list.
    pub fn outdent_item(&mut self) -> EditResult {
        let caret = self.require_caret()?;
        let item = closest_item(&self.tree, caret.node).ok_or(EditError::NotInList)?;
        self.outdent_list_item(item)
    }

    pub fn outdent_list_item(&mut self, item: NodeId) -> EditResult {
        if !self.tree.is_connected(item) {
            return Err(EditError::DetachedNode);
        }
        if item_depth(&self.tree, item) <= 1 {
            return self.unwrap_list_item(item);
        }
        let saved = self.save_selection();
        if !outdent_in_tree(&mut self.tree, item)? {
            return Ok(false);
        }
        self.normalize_document();
        if let Some(saved) = saved {
            self.restore_selection(&saved);
        }
        self.commit();
        Ok(true)
    }

    /// Converts a top-level item into a paragraph, splitting its list around
    /// it.
    pub fn unwrap_list_item(&mut self, item: NodeId) -> EditResult {
        if !self.tree.is_connected(item) {
            return Err(EditError::DetachedNode);
        }
        let offset = self.text_offset_in_block(item).unwrap_or(0);
        let Some(paragraph) = unwrap_item_in_tree(&mut self.tree, item) else {
            return Ok(false);
        };
        self.normalize_document();
        self.restore_text_offset_in_block(paragraph, offset);
        self.commit();
        Ok(true)
    }

    /// Enter inside a list item. An empty item moves up a level, or at the
    /// top level leaves the list for a paragraph after it; otherwise the item is split at the caret
    /// and the caret moves to the new item. Returns `Ok(false)` outside lists.
    pub fn smart_enter(&mut self) -> EditResult {
        let caret = self.require_caret()?;
        let Some(item) = closest_item(&self.tree, caret.node) else {
            return Ok(false);
        };
        if self.selection().is_some_and(|selection| !selection.is_collapsed()) {
            self.delete_selection_inner();
        }

        if is_inline_empty(&self.tree, item) {
            debug!(depth = item_depth(&self.tree, item), "enter on empty item");
            if item_depth(&self.tree, item) > 1 {
                outdent_in_tree(&mut self.tree, item)?;
                self.normalize_document();
                self.selection = Some(Selection::caret(start_position(&self.tree, item)));
                self.commit();
                return Ok(true);
            }
            let Some(paragraph) = exit_list_after(&mut self.tree, item) else {
                return Ok(false);
            };
            self.normalize_document();
            self.selection = Some(Selection::caret(start_position(&self.tree, paragraph)));
            self.commit();
            return Ok(true);
        }

        let caret = self.require_caret()?;
        let Some(tail) = split_inline_at(&mut self.tree, item, caret) else {
            return Ok(false);
        };
        let next = self.tree.create(NodeKind::ListItem);
        let had_checkbox = self
            .tree
            .attrs(item)
            .is_some_and(|attrs| attrs.checkbox.is_some());
        if had_checkbox && let Some(attrs) = self.tree.attrs_mut(next) {
            attrs.checkbox = Some(false);
        }
        for node in tail {
            self.tree.append_child(next, node);
        }
        if let Some(sublist) = item_sublist(&self.tree, item) {
            self.tree.detach(sublist);
            self.tree.append_child(next, sublist);
        }
        if !self.tree.insert_after(item, next) {
            self.tree.remove(next);
            return Err(EditError::MissingParent);
        }
        cleanup_inline(&mut self.tree, item);
        cleanup_inline(&mut self.tree, next);
        self.normalize_document();
        self.selection = Some(Selection::caret(start_position(&self.tree, next)));
        self.commit();
        Ok(true)
    }

    /// Backspace at the very start of a list item outdents it, or turns it
    /// into a paragraph at the top level. Anywhere else this is a no-op.
    pub fn smart_backspace(&mut self) -> EditResult {
        let Some(selection) = self.selection() else {
            return Err(EditError::NoSelection);
        };
        if !selection.is_collapsed() {
            return Ok(false);
        }
        let Some(item) = closest_item(&self.tree, selection.start.node) else {
            return Ok(false);
        };
        if self.text_offset_in_block(item) != Some(0) {
            return Ok(false);
        }
        if item_depth(&self.tree, item) > 1 {
            return self.outdent_list_item(item);
        }
        self.unwrap_list_item(item)
    }

    /// Deletes an item with everything nested under it.
    pub fn remove_item(&mut self, item: NodeId) -> EditResult {
        if !self.tree.is_connected(item) {
            return Err(EditError::DetachedNode);
        }
        if !matches!(self.tree.kind(item), Some(NodeKind::ListItem)) {
            return Err(EditError::NotInList);
        }
        let neighbor = self
            .tree
            .previous_sibling(item)
            .or_else(|| self.tree.next_sibling(item))
            .or_else(|| self.tree.parent(item).and_then(|list| self.tree.parent(list)));
        self.tree.remove(item);
        self.normalize_document();
        match neighbor.filter(|id| self.tree.is_connected(*id)) {
            Some(neighbor) => {
                let position = end_position(&self.tree, neighbor);
                self.selection = Some(Selection::caret(position));
            }
            None => self.move_to_document_end(),
        }
        self.commit();
        Ok(true)
    }

    /// Drag-and-drop reorder. Both items must share the same parent list.
    pub fn move_item(
        &mut self,
        item: NodeId,
        target: NodeId,
        placement: DropPlacement,
    ) -> EditResult {
        if !self.tree.is_connected(item) || !self.tree.is_connected(target) {
            return Err(EditError::DetachedNode);
        }
        let same_list = self.tree.parent(item) == self.tree.parent(target)
            && self
                .tree
                .parent(item)
                .and_then(|list| self.tree.kind(list))
                .is_some_and(NodeKind::is_list);
        if !same_list {
            warn!(?item, ?target, "refusing drop across lists");
            return Err(EditError::CrossLevelDrop);
        }
        if item == target {
            return Ok(false);
        }
        let saved = self.save_selection();
        self.tree.detach(item);
        let placed = match placement {
            DropPlacement::Before => self.tree.insert_before(target, item),
            DropPlacement::After => self.tree.insert_after(target, item),
        };
        if !placed {
            return Err(EditError::MissingParent);
        }
        self.normalize_document();
        if let Some(saved) = saved {
            self.restore_selection(&saved);
        }
        self.host.on_reorder();
        self.commit();
        Ok(true)
    }

    pub fn can_indent(&self) -> bool {
        let Some(item) = self.caret().and_then(|caret| closest_item(&self.tree, caret.node))
        else {
            return false;
        };
        self.tree.previous_sibling(item).is_some()
            && item_depth(&self.tree, item) + 1 + subtree_height(&self.tree, item)
                <= self.config.max_nesting
    }

    pub fn can_outdent(&self) -> bool {
        self.caret()
            .and_then(|caret| closest_item(&self.tree, caret.node))
            .is_some()
    }
}
