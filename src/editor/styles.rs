use tracing::{debug, warn};

use super::content::{cleanup_inline, enclosing_style, extract_range, raise_boundary, unwrap_node};
use super::cursor::{end_position, inline_container, offset_in_container};
use super::{Editor, Position};
use crate::error::{EditError, EditResult};
use crate::tree::{InlineStyle, NodeId, NodeKind};

impl Editor {
    /// Toggles an inline style on the selection.
    ///
    /// A collapsed caret inside a wrapper of that style unwraps it; anywhere
    /// else a wrapper holding the style name is inserted and selected, ready
    /// to be typed over. A range entirely inside one wrapper of the style
    /// unwraps it, any other range gets wrapped. Ranges spanning several
    /// blocks are clamped to the block where they start.
    pub fn apply_inline_style(&mut self, style: InlineStyle) -> EditResult {
        let Some(selection) = self.selection() else {
            warn!(style = style.name(), "inline style without selection");
            return Err(EditError::NoSelection);
        };
        let Some(container) = inline_container(&self.tree, selection.start.node) else {
            debug!("selection is not inside a text block");
            return Ok(false);
        };

        let start_offset = offset_in_container(&self.tree, container, selection.start);
        let end_position_in_block = if inline_container(&self.tree, selection.end.node)
            == Some(container)
        {
            selection.end
        } else {
            debug!("clamping selection to its first block");
            end_position(&self.tree, container)
        };
        let end_offset = offset_in_container(&self.tree, container, end_position_in_block);
        let (Some(start_offset), Some(end_offset)) = (start_offset, end_offset) else {
            return Ok(false);
        };

        let changed = if start_offset == end_offset {
            self.toggle_style_at_caret(container, selection.start, style)
        } else {
            let (start, end, from, to) = if start_offset <= end_offset {
                (selection.start, end_position_in_block, start_offset, end_offset)
            } else {
                (end_position_in_block, selection.start, end_offset, start_offset)
            };
            self.toggle_style_on_range(container, start, end, from, to, style)
        };
        if changed {
            self.commit();
        }
        Ok(changed)
    }

    fn toggle_style_at_caret(&mut self, container: NodeId, caret: Position, style: InlineStyle) -> bool {
        if let Some(wrapper) = enclosing_style(&self.tree, caret.node, style, container) {
            let Some(marker) = self.insert_marker() else {
                return false;
            };
            unwrap_node(&mut self.tree, wrapper);
            self.restore_marker(marker);
            let offset = self.text_offset_in_block(container).unwrap_or(0);
            cleanup_inline(&mut self.tree, container);
            self.restore_text_offset_in_block(container, offset);
            return true;
        }

        let Some(index) = raise_boundary(&mut self.tree, container, caret) else {
            return false;
        };
        let wrapper = self.tree.create(NodeKind::Style(style));
        let text = self.tree.create_text(style.name());
        self.tree.append_child(wrapper, text);
        if !self.tree.insert_child(container, index, wrapper) {
            self.tree.remove(wrapper);
            return false;
        }
        let Some(from) = offset_in_container(&self.tree, container, Position::new(text, 0)) else {
            return false;
        };
        cleanup_inline(&mut self.tree, container);
        self.select_text_in_block(container, from, from + style.name().chars().count())
    }

    fn toggle_style_on_range(
        &mut self,
        container: NodeId,
        start: Position,
        end: Position,
        from: usize,
        to: usize,
        style: InlineStyle,
    ) -> bool {
        let start_wrapper = enclosing_style(&self.tree, start.node, style, container);
        let end_wrapper = enclosing_style(&self.tree, end.node, style, container);
        if let (Some(left), Some(right)) = (start_wrapper, end_wrapper)
            && left == right
        {
            unwrap_node(&mut self.tree, left);
            cleanup_inline(&mut self.tree, container);
            return self.select_text_in_block(container, from, to);
        }

        let Some((index, nodes)) = extract_range(&mut self.tree, container, start, end) else {
            return false;
        };
        if nodes.is_empty() {
            return false;
        }
        let wrapper = self.tree.create(NodeKind::Style(style));
        for node in nodes {
            self.tree.append_child(wrapper, node);
        }
        let nested: Vec<NodeId> = self
            .tree
            .descendants(wrapper)
            .into_iter()
            .filter(|id| self.tree.kind(*id) == Some(&NodeKind::Style(style)))
            .collect();
        for inner in nested {
            unwrap_node(&mut self.tree, inner);
        }
        self.tree.insert_child(container, index, wrapper);
        cleanup_inline(&mut self.tree, container);
        self.select_text_in_block(container, from, to)
    }

    /// Styles active at the caret, outermost first.
    pub fn active_styles(&self) -> Vec<InlineStyle> {
        let Some(caret) = self.caret() else {
            return Vec::new();
        };
        let mut styles: Vec<InlineStyle> = std::iter::once(caret.node)
            .chain(self.tree.ancestors(caret.node))
            .filter_map(|id| match self.tree.kind(id) {
                Some(NodeKind::Style(style)) => Some(*style),
                _ => None,
            })
            .collect();
        styles.reverse();
        styles
    }
}
