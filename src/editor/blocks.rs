use serde_json::Value;
use tracing::{debug, warn};

use super::content::{
    cleanup_inline, closest_text_block, drop_placeholders, ensure_placeholder, is_inline_empty,
    split_inline_at, top_level_block,
};
use super::cursor::{end_position, inline_container, inline_len, start_position};
use super::{BlockTag, Editor, Position, Selection};
use crate::error::{EditError, EditResult};
use crate::tree::{NodeId, NodeKind};

impl Editor {
    /// Retags the block at the caret. Applying the tag a block already has
    /// turns it back into a paragraph. List items are refused.
    pub fn apply_block_format(&mut self, tag: BlockTag) -> EditResult {
        let caret = self.require_caret()?;

        let mut block = None;
        for candidate in std::iter::once(caret.node).chain(self.tree.ancestors(caret.node)) {
            match self.tree.kind(candidate) {
                Some(NodeKind::ListItem) => {
                    warn!(?tag, "block format inside a list item");
                    return Err(EditError::ListItemRetag);
                }
                Some(kind) if kind.is_text_block() => {
                    block = Some(candidate);
                    break;
                }
                _ => {}
            }
        }

        let Some(block) = block else {
            let created = self.tree.create(tag.kind());
            let placeholder = self.tree.create(NodeKind::LineBreak);
            self.tree.append_child(created, placeholder);
            if !self.insert_block_near_caret(caret, created) {
                self.tree.remove(created);
                return Err(EditError::MissingParent);
            }
            self.selection = Some(Selection::caret(Position::new(created, 0)));
            self.commit();
            return Ok(true);
        };

        let current = self.tree.kind(block).and_then(BlockTag::from_kind);
        let target = if current == Some(tag) {
            if tag == BlockTag::Paragraph {
                return Ok(false);
            }
            BlockTag::Paragraph
        } else {
            tag
        };

        if self.tree.parent(block).is_none() {
            warn!(?block, "block has no parent");
            return Err(EditError::MissingParent);
        }
        let offset = self.text_offset_in_block(block).unwrap_or(0);
        let replacement = self.tree.create(target.kind());
        let both_headings = self.tree.kind(block).is_some_and(NodeKind::is_heading)
            && target.kind().is_heading();
        if both_headings {
            let anchor = self.tree.attrs(block).and_then(|attrs| attrs.id.clone());
            if let Some(attrs) = self.tree.attrs_mut(replacement) {
                attrs.id = anchor;
            }
        }
        self.tree.move_children(block, replacement);
        if !self.tree.replace(block, replacement) {
            self.tree.move_children(replacement, block);
            self.tree.remove(replacement);
            return Err(EditError::MissingParent);
        }
        self.tree.remove(block);
        ensure_placeholder(&mut self.tree, replacement);
        self.restore_text_offset_in_block(replacement, offset);
        self.commit();
        Ok(true)
    }

    /// Inserts a block right after the top-level block holding the caret,
    /// or at the caret when it sits directly in the root.
    pub(crate) fn insert_block_near_caret(&mut self, caret: Position, block: NodeId) -> bool {
        let root = self.tree.root();
        if caret.node == root {
            return self.tree.insert_child(root, caret.offset, block);
        }
        match top_level_block(&self.tree, caret.node) {
            Some(top) => self.tree.insert_after(top, block),
            None => self.tree.append_child(root, block),
        }
    }

    /// Splits the text block at the caret. The new block keeps the tag,
    /// except headings, which continue as paragraphs.
    pub fn split_block(&mut self) -> EditResult {
        self.delete_selection_inner();
        let caret = self.require_caret()?;
        let Some(block) = closest_text_block(&self.tree, caret.node) else {
            return Ok(false);
        };
        let Some(tail) = split_inline_at(&mut self.tree, block, caret) else {
            return Ok(false);
        };
        let kind = match self.tree.kind(block) {
            Some(NodeKind::Heading(_)) | None => NodeKind::Paragraph,
            Some(other) => other.clone(),
        };
        let next = self.tree.create(kind);
        for node in tail {
            self.tree.append_child(next, node);
        }
        if !self.tree.insert_after(block, next) {
            self.tree.remove(next);
            return Err(EditError::MissingParent);
        }
        cleanup_inline(&mut self.tree, block);
        cleanup_inline(&mut self.tree, next);
        self.selection = Some(Selection::caret(start_position(&self.tree, next)));
        self.commit();
        Ok(true)
    }

    /// Inserts a divider after the current block, or in its place when the
    /// block is empty, followed by a fresh paragraph holding the caret.
    pub fn insert_horizontal_rule(&mut self) -> EditResult {
        let rule = self.tree.create(NodeKind::HorizontalRule);
        self.insert_atomic_block(rule)
    }

    /// Inserts an opaque plugin block the same way as a divider.
    pub fn insert_custom_block(&mut self, block_type: &str, payload: Option<Value>) -> EditResult {
        if self.plugins.get(block_type).is_none() {
            debug!(block_type, "inserting block without a registered plugin");
        }
        let block = self.tree.create(NodeKind::CustomBlock {
            block_type: block_type.to_string(),
            payload,
        });
        self.insert_atomic_block(block)
    }

    fn insert_atomic_block(&mut self, block: NodeId) -> EditResult {
        let caret = match self.require_caret() {
            Ok(caret) => caret,
            Err(err) => {
                self.tree.remove(block);
                return Err(err);
            }
        };
        let current = inline_container(&self.tree, caret.node)
            .filter(|id| self.tree.kind(*id).is_some_and(NodeKind::is_text_block))
            .filter(|id| self.tree.parent(*id) == Some(self.tree.root()));

        let placed = match current {
            Some(current) if is_inline_empty(&self.tree, current) => {
                let replaced = self.tree.replace(current, block);
                if replaced {
                    self.tree.remove(current);
                }
                replaced
            }
            Some(current) => self.tree.insert_after(current, block),
            None => self.insert_block_near_caret(caret, block),
        };
        if !placed {
            self.tree.remove(block);
            return Err(EditError::MissingParent);
        }

        let paragraph = self.tree.create(NodeKind::Paragraph);
        let placeholder = self.tree.create(NodeKind::LineBreak);
        self.tree.append_child(paragraph, placeholder);
        self.tree.insert_after(block, paragraph);
        self.selection = Some(Selection::caret(Position::new(paragraph, 0)));
        self.commit();
        Ok(true)
    }

    /// Backspace at the very start of a top-level text block: headings,
    /// quotes and code turn into paragraphs, paragraphs join the block
    /// before them.
    pub(crate) fn join_with_previous_block(&mut self, block: NodeId) -> EditResult {
        if !matches!(self.tree.kind(block), Some(NodeKind::Paragraph)) {
            return self.apply_block_format(BlockTag::Paragraph);
        }
        let Some(previous) = self.tree.previous_sibling(block) else {
            return Ok(false);
        };
        let Some(previous_kind) = self.tree.kind(previous).cloned() else {
            return Ok(false);
        };

        if matches!(
            previous_kind,
            NodeKind::HorizontalRule | NodeKind::CustomBlock { .. }
        ) {
            self.tree.remove(previous);
            self.selection = Some(Selection::caret(start_position(&self.tree, block)));
            self.commit();
            return Ok(true);
        }

        let target = if previous_kind.holds_inline() {
            previous
        } else if previous_kind.is_list() {
            let end = end_position(&self.tree, previous);
            match inline_container(&self.tree, end.node) {
                Some(item) => item,
                None => return Ok(false),
            }
        } else {
            return Ok(false);
        };

        let join_at = inline_len(&self.tree, target);
        let inline: Vec<NodeId> = self.tree.children(block).to_vec();
        let insert_at = self
            .tree
            .children(target)
            .iter()
            .position(|child| self.tree.kind(*child).is_some_and(NodeKind::is_list))
            .unwrap_or(self.tree.child_count(target));
        for (offset, node) in inline.into_iter().enumerate() {
            self.tree.detach(node);
            self.tree.insert_child(target, insert_at + offset, node);
        }
        self.tree.remove(block);
        drop_placeholders(&mut self.tree, target);
        cleanup_inline(&mut self.tree, target);
        self.restore_text_offset_in_block(target, join_at);
        self.normalize_document();
        self.commit();
        Ok(true)
    }
}
