use super::Editor;
use super::cursor::inline_text_nodes;
use crate::tree::{NodeId, NodeKind, Tree};

impl Editor {
    /// Labels of the structures around the caret, outermost first.
    pub fn breadcrumbs(&self) -> Option<Vec<String>> {
        let caret = self.caret()?;
        breadcrumbs_for_node(&self.tree, caret.node)
    }

    /// Word and char counts over the whole document.
    pub fn document_stats(&self) -> DocumentStats {
        let mut stats = DocumentStats::default();
        for node in self.tree.descendants(self.tree.root()) {
            if !self.tree.kind(node).is_some_and(NodeKind::holds_inline) {
                continue;
            }
            let text: String = inline_text_nodes(&self.tree, node)
                .into_iter()
                .filter_map(|text| self.tree.text(text))
                .collect();
            stats.words += text.split_whitespace().count();
            stats.chars += text.chars().count();
        }
        stats
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DocumentStats {
    pub words: usize,
    pub chars: usize,
}

pub fn breadcrumbs_for_node(tree: &Tree, node: NodeId) -> Option<Vec<String>> {
    if !tree.is_connected(node) {
        return None;
    }
    let root = tree.root();
    let mut chain: Vec<NodeId> = std::iter::once(node)
        .chain(tree.ancestors(node))
        .take_while(|id| *id != root)
        .collect();
    chain.reverse();

    let mut labels = Vec::new();
    for id in chain {
        let Some(kind) = tree.kind(id) else {
            continue;
        };
        match kind {
            NodeKind::ListItem | NodeKind::Text(_) | NodeKind::LineBreak | NodeKind::Marker => {}
            // Plain paragraphs only show up at the top level.
            NodeKind::Paragraph => {
                if tree.parent(id) == Some(root) {
                    labels.push(kind.label().to_string());
                }
            }
            NodeKind::List { .. } if tree.attrs(id).is_some_and(|attrs| attrs.checklist) => {
                labels.push("Checklist".to_string());
            }
            NodeKind::CustomBlock { block_type, .. } => labels.push(block_type.clone()),
            other => labels.push(other.label().to_string()),
        }
    }
    Some(labels)
}
