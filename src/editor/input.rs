use tracing::{debug, trace};

use super::content::{
    cleanup_inline, closest_item, drop_placeholders, extract_range, insert_str_at, item_sublist,
    next_word_boundary, previous_word_boundary, remove_char_at,
};
use super::cursor::{
    Affinity, end_position, inline_container, inline_len, inline_text_nodes, offset_in_container,
    position_for_offset, start_position,
};
use super::{BlockTag, Editor, Position, Selection};
use crate::autoformat::{LinePrefixAction, apply_inline_autoformat, match_line_prefix};
use crate::error::{EditError, EditResult};
use crate::tree::{NodeId, NodeKind};

fn line_action_tag(action: LinePrefixAction) -> Option<BlockTag> {
    match action {
        LinePrefixAction::Heading(level) => BlockTag::from_kind(&NodeKind::Heading(level)),
        LinePrefixAction::Blockquote => Some(BlockTag::Blockquote),
        LinePrefixAction::CodeBlock => Some(BlockTag::CodeBlock),
        _ => None,
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Key {
    Char(char),
    Enter,
    Backspace,
    Tab,
    BackTab,
    Left,
    Right,
    Up,
    Down,
    Home,
    End,
    WordLeft,
    WordRight,
}

impl Editor {
    /// Routes one key press through autoformatting and the list-aware
    /// editing commands.
    pub fn handle_key(&mut self, key: Key) -> EditResult {
        match key {
            Key::Char(ch) => {
                if ch == ' ' {
                    self.autoformat_inline();
                }
                let changed = self.insert_text(&ch.to_string())?;
                if changed {
                    self.autoformat_line()?;
                }
                Ok(changed)
            }
            Key::Enter => {
                self.autoformat_inline();
                if self.smart_enter()? {
                    return Ok(true);
                }
                self.split_block()
            }
            Key::Backspace => self.delete_backward(),
            Key::Tab => {
                if !self.caret_in_list() {
                    return Ok(false);
                }
                self.indent_item()
            }
            Key::BackTab => {
                if !self.caret_in_list() {
                    return Ok(false);
                }
                self.outdent_item()
            }
            Key::Left => Ok(self.move_left()),
            Key::Right => Ok(self.move_right()),
            Key::Up => Ok(self.move_vertical(false)),
            Key::Down => Ok(self.move_vertical(true)),
            Key::Home => Ok(self.move_line_edge(false)),
            Key::End => Ok(self.move_line_edge(true)),
            Key::WordLeft => Ok(self.move_word(false)),
            Key::WordRight => Ok(self.move_word(true)),
        }
    }

    fn caret_in_list(&self) -> bool {
        self.caret()
            .and_then(|caret| closest_item(&self.tree, caret.node))
            .is_some()
    }

    fn caret_in_code_block(&self) -> bool {
        self.caret()
            .and_then(|caret| inline_container(&self.tree, caret.node))
            .is_some_and(|container| self.tree.kind(container) == Some(&NodeKind::CodeBlock))
    }

    // ========================================================================
    // Autoformat glue
    // ========================================================================

    /// Turns a just-closed `**bold**`-style run before the caret into a
    /// styled node and puts the caret after it.
    fn autoformat_inline(&mut self) -> bool {
        let Some(selection) = self.selection() else {
            return false;
        };
        if !selection.is_collapsed() || self.caret_in_code_block() {
            return false;
        }
        let Some(position) = apply_inline_autoformat(&mut self.tree, selection.start) else {
            return false;
        };
        trace!("inline autoformat applied");
        self.selection = Some(Selection::caret(position));
        true
    }

    /// Applies a block shortcut when the text typed so far on the line is
    /// exactly one of the known prefixes.
    fn autoformat_line(&mut self) -> EditResult {
        if self.caret_in_code_block() {
            return Ok(false);
        }
        let Some(caret) = self.caret() else {
            return Ok(false);
        };
        let Some(container) = inline_container(&self.tree, caret.node) else {
            return Ok(false);
        };
        let Some(offset) = offset_in_container(&self.tree, container, caret) else {
            return Ok(false);
        };
        let before: String = inline_text_nodes(&self.tree, container)
            .into_iter()
            .filter_map(|id| self.tree.text(id))
            .collect::<String>()
            .chars()
            .take(offset)
            .collect();
        let Some(action) = match_line_prefix(&before) else {
            return Ok(false);
        };

        let in_item = matches!(self.tree.kind(container), Some(NodeKind::ListItem));
        if in_item && !matches!(action, LinePrefixAction::Checklist { .. }) {
            return Ok(false);
        }
        let target_tag = line_action_tag(action);
        let current_tag = self.tree.kind(container).and_then(BlockTag::from_kind);
        if target_tag.is_some() && target_tag == current_tag {
            return Ok(false);
        }

        debug!(?action, "line shortcut");
        self.remove_leading_chars(container, offset);
        self.apply_line_action(action)
    }

    /// Applies a block shortcut to the block at the caret.
    pub fn apply_line_action(&mut self, action: LinePrefixAction) -> EditResult {
        match action {
            LinePrefixAction::UnorderedList => self.toggle_list(false),
            LinePrefixAction::OrderedList => self.toggle_list(true),
            LinePrefixAction::Checklist { checked } => {
                let caret = self.require_caret()?;
                if let Some(item) = closest_item(&self.tree, caret.node) {
                    if let Some(attrs) = self.tree.attrs_mut(item) {
                        attrs.checkbox = Some(checked);
                    }
                    self.normalize_document();
                    self.commit();
                    return Ok(true);
                }
                self.toggle_checklist()?;
                if checked
                    && let Some(item) = self
                        .caret()
                        .and_then(|caret| closest_item(&self.tree, caret.node))
                {
                    self.set_item_checked(item, true)?;
                }
                Ok(true)
            }
            LinePrefixAction::HorizontalRule => self.insert_horizontal_rule(),
            LinePrefixAction::Heading(_)
            | LinePrefixAction::Blockquote
            | LinePrefixAction::CodeBlock => match line_action_tag(action) {
                Some(tag) => self.apply_block_format(tag),
                None => Ok(false),
            },
        }
    }

    fn remove_leading_chars(&mut self, container: NodeId, count: usize) {
        let mut remaining = count;
        for text in inline_text_nodes(&self.tree, container) {
            if remaining == 0 {
                break;
            }
            let Some(value) = self.tree.text(text) else {
                continue;
            };
            let len = value.chars().count();
            let take = remaining.min(len);
            let rest: String = value.chars().skip(take).collect();
            self.tree.set_text(text, rest);
            remaining -= take;
        }
        cleanup_inline(&mut self.tree, container);
        self.restore_text_offset_in_block(container, 0);
    }

    // ========================================================================
    // Text editing
    // ========================================================================

    /// Inserts text at the caret, replacing a non-empty selection first.
    /// Line breaks are dropped; Enter goes through [`Key::Enter`].
    pub fn insert_text(&mut self, text: &str) -> EditResult {
        let text: String = text.chars().filter(|ch| *ch != '\n' && *ch != '\r').collect();
        if text.is_empty() {
            return Ok(false);
        }
        self.delete_selection_inner();
        let caret = self.require_caret()?;
        let Some(position) = self.insertion_point(caret) else {
            debug!(?caret, "no place to insert text");
            return Ok(false);
        };
        let inserted = text.chars().count();

        let (node, offset) = match self.tree.text(position.node) {
            Some(existing) => {
                let mut value = existing.to_string();
                insert_str_at(&mut value, position.offset, &text);
                self.tree.set_text(position.node, value);
                (position.node, position.offset + inserted)
            }
            None => {
                let children = self.tree.children(position.node).to_vec();
                let previous = position
                    .offset
                    .checked_sub(1)
                    .and_then(|idx| children.get(idx).copied())
                    .filter(|id| self.tree.text(*id).is_some());
                let next = children
                    .get(position.offset)
                    .copied()
                    .filter(|id| self.tree.text(*id).is_some());
                if let Some(previous) = previous {
                    let mut value = self.tree.text(previous).unwrap_or_default().to_string();
                    let len = value.chars().count();
                    value.push_str(&text);
                    self.tree.set_text(previous, value);
                    (previous, len + inserted)
                } else if let Some(next) = next {
                    let mut value = text.clone();
                    value.push_str(self.tree.text(next).unwrap_or_default());
                    self.tree.set_text(next, value);
                    (next, inserted)
                } else {
                    let created = self.tree.create_text(&text);
                    if !self.tree.insert_child(position.node, position.offset, created) {
                        self.tree.remove(created);
                        return Err(EditError::MissingParent);
                    }
                    (created, inserted)
                }
            }
        };

        if let Some(container) = inline_container(&self.tree, node) {
            drop_placeholders(&mut self.tree, container);
        }
        self.selection = Some(Selection::caret(Position::new(node, offset)));
        self.commit();
        Ok(true)
    }

    /// Resolves the caret to a spot where text can live, creating a
    /// paragraph when the caret sits between blocks.
    fn insertion_point(&mut self, caret: Position) -> Option<Position> {
        let kind = self.tree.kind(caret.node)?.clone();
        match kind {
            NodeKind::Text(_) => Some(caret),
            NodeKind::LineBreak | NodeKind::Marker => {
                let parent = self.tree.parent(caret.node)?;
                let index = self.tree.index_in_parent(caret.node)?;
                Some(Position::new(parent, index))
            }
            NodeKind::ListItem => {
                let limit = item_sublist(&self.tree, caret.node)
                    .and_then(|sublist| self.tree.index_in_parent(sublist))
                    .unwrap_or(self.tree.child_count(caret.node));
                Some(Position::new(caret.node, caret.offset.min(limit)))
            }
            kind if kind.holds_inline() || kind.is_inline() => Some(caret),
            NodeKind::List { .. } => {
                let end = end_position(&self.tree, caret.node);
                (end.node != caret.node).then_some(end)
            }
            NodeKind::Root => {
                let paragraph = self.tree.create(NodeKind::Paragraph);
                if !self.tree.insert_child(caret.node, caret.offset, paragraph) {
                    self.tree.remove(paragraph);
                    return None;
                }
                Some(Position::new(paragraph, 0))
            }
            _ => {
                let paragraph = self.tree.create(NodeKind::Paragraph);
                if !self.tree.insert_after(caret.node, paragraph) {
                    self.tree.remove(paragraph);
                    return None;
                }
                Some(Position::new(paragraph, 0))
            }
        }
    }

    /// Backspace: deletes the selection or the char before the caret. At the
    /// start of a block it leaves a list, reverts a heading, or joins the
    /// block with the one before.
    pub fn delete_backward(&mut self) -> EditResult {
        let selection = self.selection().ok_or(EditError::NoSelection)?;
        if !selection.is_collapsed() {
            return self.delete_selection();
        }
        let Some(container) = inline_container(&self.tree, selection.start.node) else {
            return Ok(false);
        };
        let offset = offset_in_container(&self.tree, container, selection.start).unwrap_or(0);
        if offset == 0 {
            if matches!(self.tree.kind(container), Some(NodeKind::ListItem)) {
                return self.smart_backspace();
            }
            if self.tree.parent(container) == Some(self.tree.root()) {
                return self.join_with_previous_block(container);
            }
            return Ok(false);
        }

        let position = position_for_offset(&self.tree, container, offset, Affinity::Backward);
        let Some(existing) = self.tree.text(position.node) else {
            return Ok(false);
        };
        let mut value = existing.to_string();
        if position.offset == 0 || !remove_char_at(&mut value, position.offset - 1) {
            return Ok(false);
        }
        self.tree.set_text(position.node, value);
        cleanup_inline(&mut self.tree, container);
        self.restore_text_offset_in_block(container, offset - 1);
        self.commit();
        Ok(true)
    }

    pub fn delete_selection(&mut self) -> EditResult {
        if !self.delete_selection_inner() {
            return Ok(false);
        }
        if let Some(caret) = self.caret()
            && let Some(container) = inline_container(&self.tree, caret.node)
        {
            let offset = offset_in_container(&self.tree, container, caret).unwrap_or(0);
            cleanup_inline(&mut self.tree, container);
            self.restore_text_offset_in_block(container, offset);
        }
        self.commit();
        Ok(true)
    }

    /// Removes the selected inline content without committing. Ranges that
    /// leave their first block are clamped to it. A range inside one text
    /// node is cut out of that node, which stays in place even when emptied
    /// so typing over a selection keeps its styling.
    pub(crate) fn delete_selection_inner(&mut self) -> bool {
        let Some(selection) = self.selection() else {
            return false;
        };
        if selection.is_collapsed() {
            return false;
        }
        if selection.start.node == selection.end.node
            && let Some(existing) = self.tree.text(selection.start.node)
        {
            let low = selection.start.offset.min(selection.end.offset);
            let high = selection.start.offset.max(selection.end.offset);
            let value: String = existing
                .chars()
                .take(low)
                .chain(existing.chars().skip(high))
                .collect();
            self.tree.set_text(selection.start.node, value);
            self.selection = Some(Selection::caret(Position::new(selection.start.node, low)));
            return true;
        }

        let Some(container) = inline_container(&self.tree, selection.start.node) else {
            return false;
        };
        let end = if inline_container(&self.tree, selection.end.node) == Some(container) {
            selection.end
        } else {
            end_position(&self.tree, container)
        };
        let (Some(from), Some(to)) = (
            offset_in_container(&self.tree, container, selection.start),
            offset_in_container(&self.tree, container, end),
        ) else {
            return false;
        };
        let (start, end, from) = if from <= to {
            (selection.start, end, from)
        } else {
            (end, selection.start, to)
        };
        let Some((_, nodes)) = extract_range(&mut self.tree, container, start, end) else {
            return false;
        };
        let changed = !nodes.is_empty();
        for node in nodes {
            self.tree.remove(node);
        }
        cleanup_inline(&mut self.tree, container);
        self.restore_text_offset_in_block(container, from);
        changed
    }

    // ========================================================================
    // Caret movement
    // ========================================================================

    /// Every block that holds inline content, in document order.
    fn caret_stops(&self) -> Vec<NodeId> {
        let root = self.tree.root();
        self.tree
            .descendants(root)
            .into_iter()
            .filter(|id| self.tree.kind(*id).is_some_and(NodeKind::holds_inline))
            .collect()
    }

    fn caret_container_and_offset(&self) -> Option<(NodeId, usize)> {
        let caret = self.selection()?.end;
        let container = inline_container(&self.tree, caret.node)?;
        let offset = offset_in_container(&self.tree, container, caret)?;
        Some((container, offset))
    }

    fn neighbor_stop(&self, container: NodeId, forward: bool) -> Option<NodeId> {
        let stops = self.caret_stops();
        let idx = stops.iter().position(|stop| *stop == container)?;
        if forward {
            stops.get(idx + 1).copied()
        } else {
            idx.checked_sub(1).and_then(|prev| stops.get(prev).copied())
        }
    }

    pub fn move_left(&mut self) -> bool {
        let Some((container, offset)) = self.caret_container_and_offset() else {
            return false;
        };
        if offset > 0 {
            return self.restore_text_offset_in_block(container, offset - 1);
        }
        let Some(previous) = self.neighbor_stop(container, false) else {
            return false;
        };
        let position = end_position(&self.tree, previous);
        self.selection = Some(Selection::caret(position));
        true
    }

    pub fn move_right(&mut self) -> bool {
        let Some((container, offset)) = self.caret_container_and_offset() else {
            return false;
        };
        if offset < inline_len(&self.tree, container) {
            return self.restore_text_offset_in_block(container, offset + 1);
        }
        let Some(next) = self.neighbor_stop(container, true) else {
            return false;
        };
        let position = start_position(&self.tree, next);
        self.selection = Some(Selection::caret(position));
        true
    }

    fn move_vertical(&mut self, down: bool) -> bool {
        let Some((container, offset)) = self.caret_container_and_offset() else {
            return false;
        };
        let Some(target) = self.neighbor_stop(container, down) else {
            return false;
        };
        self.restore_text_offset_in_block(target, offset)
    }

    fn move_line_edge(&mut self, end: bool) -> bool {
        let Some((container, _)) = self.caret_container_and_offset() else {
            return false;
        };
        let offset = if end {
            inline_len(&self.tree, container)
        } else {
            0
        };
        self.restore_text_offset_in_block(container, offset)
    }

    fn move_word(&mut self, forward: bool) -> bool {
        let Some((container, offset)) = self.caret_container_and_offset() else {
            return false;
        };
        let text: String = inline_text_nodes(&self.tree, container)
            .into_iter()
            .filter_map(|id| self.tree.text(id))
            .collect();
        let target = if forward {
            next_word_boundary(&text, offset)
        } else {
            previous_word_boundary(&text, offset)
        };
        if target == offset {
            return if forward {
                self.move_right()
            } else {
                self.move_left()
            };
        }
        self.restore_text_offset_in_block(container, target)
    }

    /// Moves the focus end of the selection by one char within its block,
    /// keeping the anchor.
    pub fn extend_selection(&mut self, forward: bool) -> bool {
        let Some(selection) = self.selection() else {
            return false;
        };
        let Some((container, offset)) = self.caret_container_and_offset() else {
            return false;
        };
        let target = if forward {
            (offset + 1).min(inline_len(&self.tree, container))
        } else {
            offset.saturating_sub(1)
        };
        if target == offset {
            return false;
        }
        let focus = position_for_offset(&self.tree, container, target, Affinity::Backward);
        self.selection = Some(Selection {
            start: selection.start,
            end: focus,
        });
        true
    }

    /// The moving end of the selection; equal to the caret when collapsed.
    pub fn focus(&self) -> Option<Position> {
        self.selection().map(|selection| selection.end)
    }
}
