use super::Position;
use super::cursor::inline_text_nodes;
use crate::tree::{InlineStyle, NodeId, NodeKind, Tree, char_to_byte_idx};

pub(crate) fn closest_item(tree: &Tree, node: NodeId) -> Option<NodeId> {
    std::iter::once(node)
        .chain(tree.ancestors(node))
        .find(|id| matches!(tree.kind(*id), Some(NodeKind::ListItem)))
}

pub(crate) fn closest_text_block(tree: &Tree, node: NodeId) -> Option<NodeId> {
    std::iter::once(node)
        .chain(tree.ancestors(node))
        .find(|id| tree.kind(*id).is_some_and(NodeKind::is_text_block))
}

/// The direct child of the root that contains `node`.
pub(crate) fn top_level_block(tree: &Tree, node: NodeId) -> Option<NodeId> {
    let root = tree.root();
    std::iter::once(node)
        .chain(tree.ancestors(node))
        .find(|id| tree.parent(*id) == Some(root))
}

pub(crate) fn item_sublist(tree: &Tree, item: NodeId) -> Option<NodeId> {
    tree.children(item)
        .iter()
        .rev()
        .copied()
        .find(|child| tree.kind(*child).is_some_and(NodeKind::is_list))
}

pub(crate) fn enclosing_style(
    tree: &Tree,
    node: NodeId,
    style: InlineStyle,
    container: NodeId,
) -> Option<NodeId> {
    std::iter::once(node)
        .chain(tree.ancestors(node))
        .take_while(|id| *id != container)
        .find(|id| tree.kind(*id) == Some(&NodeKind::Style(style)))
}

pub(crate) fn is_inline_empty(tree: &Tree, container: NodeId) -> bool {
    inline_text_nodes(tree, container)
        .iter()
        .all(|text| tree.text(*text).is_none_or(str::is_empty))
}

/// Inserts a `LineBreak` placeholder into an empty block so it stays
/// addressable.
pub(crate) fn ensure_placeholder(tree: &mut Tree, container: NodeId) -> bool {
    if !is_inline_empty(tree, container) {
        return false;
    }
    let has_break = tree
        .children(container)
        .iter()
        .any(|child| tree.kind(*child) == Some(&NodeKind::LineBreak));
    if has_break {
        return false;
    }
    let placeholder = tree.create(NodeKind::LineBreak);
    tree.insert_child(container, 0, placeholder)
}

/// Removes placeholders once a block has real text.
pub(crate) fn drop_placeholders(tree: &mut Tree, container: NodeId) {
    if is_inline_empty(tree, container) {
        return;
    }
    let breaks: Vec<NodeId> = tree
        .descendants(container)
        .into_iter()
        .filter(|id| tree.kind(*id) == Some(&NodeKind::LineBreak))
        .filter(|id| {
            tree.ancestors(*id)
                .take_while(|ancestor| *ancestor != container)
                .all(|ancestor| tree.kind(ancestor).is_some_and(NodeKind::is_inline))
        })
        .collect();
    for id in breaks {
        tree.remove(id);
    }
}

/// Merges adjacent text nodes and identical style wrappers, drops empty
/// ones, then fixes up the placeholder. Node handles inside the block may be
/// invalidated.
pub fn cleanup_inline(tree: &mut Tree, container: NodeId) {
    merge_inline(tree, container);
    if is_inline_empty(tree, container) {
        ensure_placeholder(tree, container);
    } else {
        drop_placeholders(tree, container);
    }
}

fn merge_inline(tree: &mut Tree, node: NodeId) {
    for child in tree.children(node).to_vec() {
        if matches!(tree.kind(child), Some(NodeKind::Style(_))) {
            merge_inline(tree, child);
        }
    }

    let mut idx = 0;
    while let Some(child) = tree.children(node).get(idx).copied() {
        let kind = tree.kind(child).cloned();
        let empty = match &kind {
            Some(NodeKind::Text(text)) => text.is_empty(),
            Some(NodeKind::Style(_)) => tree.child_count(child) == 0,
            _ => false,
        };
        if empty {
            tree.remove(child);
            continue;
        }
        if idx > 0 {
            let previous = tree.children(node)[idx - 1];
            match (tree.kind(previous), &kind) {
                (Some(NodeKind::Text(left)), Some(NodeKind::Text(right))) => {
                    let merged = format!("{left}{right}");
                    tree.set_text(previous, merged);
                    tree.remove(child);
                    continue;
                }
                (Some(NodeKind::Style(left)), Some(NodeKind::Style(right))) if left == right => {
                    tree.move_children(child, previous);
                    tree.remove(child);
                    merge_inline(tree, previous);
                    continue;
                }
                _ => {}
            }
        }
        idx += 1;
    }
}

/// Moves a node's children into its place and removes the node.
pub(crate) fn unwrap_node(tree: &mut Tree, node: NodeId) -> bool {
    let (Some(parent), Some(index)) = (tree.parent(node), tree.index_in_parent(node)) else {
        return false;
    };
    let children = tree.children(node).to_vec();
    for (offset, child) in children.into_iter().enumerate() {
        tree.detach(child);
        tree.insert_child(parent, index + offset, child);
    }
    tree.remove(node)
}

// ============================================================================
// Splitting inline content
// ============================================================================

/// Turns a position somewhere inside `container`'s inline content into a
/// child index of `container`, splitting text and style wrappers on the way
/// up. Refuses positions outside the container's own inline content.
pub(crate) fn raise_boundary(tree: &mut Tree, container: NodeId, position: Position) -> Option<usize> {
    let inside = position.node == container
        || tree
            .ancestors(position.node)
            .take_while(|id| *id != container)
            .all(|id| tree.kind(id).is_some_and(NodeKind::is_inline))
            && tree.is_ancestor_of(container, position.node);
    if !inside {
        return None;
    }

    let (mut parent, mut index) = match tree.kind(position.node)? {
        NodeKind::Text(text) => {
            let len = text.chars().count();
            let parent = tree.parent(position.node)?;
            let at = tree.index_in_parent(position.node)?;
            if position.offset == 0 {
                (parent, at)
            } else if position.offset >= len {
                (parent, at + 1)
            } else {
                tree.split_text(position.node, position.offset)?;
                (parent, at + 1)
            }
        }
        _ => (
            position.node,
            position.offset.min(tree.child_count(position.node)),
        ),
    };

    while parent != container {
        let grand = tree.parent(parent)?;
        let at = tree.index_in_parent(parent)?;
        let count = tree.child_count(parent);
        if index == 0 {
            index = at;
        } else if index >= count {
            index = at + 1;
        } else {
            let kind = tree.kind(parent)?.clone();
            let clone = tree.create(kind);
            for node in tree.children(parent)[index..].to_vec() {
                tree.detach(node);
                tree.append_child(clone, node);
            }
            tree.insert_after(parent, clone);
            index = at + 1;
        }
        parent = grand;
    }
    Some(index)
}

/// Detaches everything after `position` in `container`'s inline content and
/// returns it in order. A nested list stays where it is.
pub(crate) fn split_inline_at(
    tree: &mut Tree,
    container: NodeId,
    position: Position,
) -> Option<Vec<NodeId>> {
    let index = raise_boundary(tree, container, position)?;
    let tail: Vec<NodeId> = tree.children(container)[index..]
        .iter()
        .copied()
        .filter(|child| !tree.kind(*child).is_some_and(NodeKind::is_list))
        .collect();
    for node in &tail {
        tree.detach(*node);
    }
    Some(tail)
}

/// Detaches the inline nodes between `start` and `end` (both inside
/// `container`, start first). Returns the index they were taken from.
pub(crate) fn extract_range(
    tree: &mut Tree,
    container: NodeId,
    start: Position,
    end: Position,
) -> Option<(usize, Vec<NodeId>)> {
    let end_index = raise_boundary(tree, container, end)?;
    let before = tree.child_count(container);
    let start_index = raise_boundary(tree, container, start)?;
    let end_index = end_index + (tree.child_count(container) - before);
    if start_index >= end_index {
        return Some((start_index, Vec::new()));
    }
    let nodes = tree.children(container)[start_index..end_index].to_vec();
    for node in &nodes {
        tree.detach(*node);
    }
    Some((start_index, nodes))
}

// ============================================================================
// Text primitives
// ============================================================================

pub(crate) fn insert_str_at(text: &mut String, offset: usize, insert: &str) -> usize {
    let byte_idx = char_to_byte_idx(text, offset.min(text.chars().count()));
    text.insert_str(byte_idx, insert);
    insert.chars().count()
}

pub(crate) fn remove_char_at(text: &mut String, offset: usize) -> bool {
    if offset >= text.chars().count() {
        return false;
    }
    let start = char_to_byte_idx(text, offset);
    let end = char_to_byte_idx(text, offset + 1);
    text.drain(start..end);
    true
}

pub(crate) fn is_word_char(ch: char) -> bool {
    ch.is_alphanumeric() || ch == '_'
}

pub(crate) fn previous_word_boundary(text: &str, offset: usize) -> usize {
    let chars: Vec<char> = text.chars().collect();
    let mut idx = offset.min(chars.len());
    while idx > 0 && chars[idx - 1].is_whitespace() {
        idx -= 1;
    }
    if idx > 0 && !is_word_char(chars[idx - 1]) {
        while idx > 0 && !is_word_char(chars[idx - 1]) && !chars[idx - 1].is_whitespace() {
            idx -= 1;
        }
        return idx;
    }
    while idx > 0 && is_word_char(chars[idx - 1]) {
        idx -= 1;
    }
    idx
}

pub(crate) fn next_word_boundary(text: &str, offset: usize) -> usize {
    let chars: Vec<char> = text.chars().collect();
    let mut idx = offset.min(chars.len());
    if idx < chars.len() && is_word_char(chars[idx]) {
        while idx < chars.len() && is_word_char(chars[idx]) {
            idx += 1;
        }
    } else {
        while idx < chars.len() && !is_word_char(chars[idx]) && !chars[idx].is_whitespace() {
            idx += 1;
        }
    }
    while idx < chars.len() && chars[idx].is_whitespace() {
        idx += 1;
    }
    idx
}
