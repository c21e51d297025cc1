//! Markdown boundary.
//!
//! Files on disk are read and written through `tdoc`; this module maps between
//! its `Document` model and the editor tree. Anything tdoc has no block for is
//! flattened into text paragraphs.

use std::io::Cursor;

use anyhow::{Context, Result, anyhow};
use tdoc::{ChecklistItem, Document, InlineStyle as DocStyle, Paragraph, Span};
use tracing::debug;

use crate::tree::{HeadingLevel, InlineStyle, NodeId, NodeKind, Tree};

const RULE_TEXT: &str = "---";

pub fn import_markdown(source: &str) -> Result<Tree> {
    let document = tdoc::markdown::parse(Cursor::new(source))
        .map_err(|err| anyhow!("failed to parse Markdown: {err}"))?;
    Ok(tree_from_document(&document))
}

pub fn export_markdown(tree: &Tree) -> Result<String> {
    let document = document_from_tree(tree);
    let mut contents = Vec::new();
    tdoc::markdown::write(&mut contents, &document).context("failed to render Markdown")?;
    String::from_utf8(contents).context("rendered Markdown is not valid UTF-8")
}

// ============================================================================
// Document -> tree
// ============================================================================

/// Builds an unnormalized tree. Load it through
/// [`Editor::load_tree`](crate::editor::Editor::load_tree) to get depth and
/// progress attributes and placeholders.
pub fn tree_from_document(document: &Document) -> Tree {
    let mut tree = Tree::new();
    let root = tree.root();
    for paragraph in &document.paragraphs {
        for block in import_paragraph(&mut tree, paragraph) {
            tree.append_child(root, block);
        }
    }
    debug!(blocks = tree.child_count(root), "imported document");
    tree
}

fn import_paragraph(tree: &mut Tree, paragraph: &Paragraph) -> Vec<NodeId> {
    match paragraph {
        Paragraph::Text { content } if is_rule(content) => {
            vec![tree.create(NodeKind::HorizontalRule)]
        }
        Paragraph::Text { content } => vec![text_block(tree, NodeKind::Paragraph, content)],
        Paragraph::Header1 { content } => {
            vec![text_block(tree, NodeKind::Heading(HeadingLevel::One), content)]
        }
        Paragraph::Header2 { content } => {
            vec![text_block(tree, NodeKind::Heading(HeadingLevel::Two), content)]
        }
        Paragraph::Header3 { content } => {
            vec![text_block(tree, NodeKind::Heading(HeadingLevel::Three), content)]
        }
        Paragraph::CodeBlock { content } => vec![text_block(tree, NodeKind::CodeBlock, content)],
        Paragraph::Quote { children } => children
            .iter()
            .flat_map(|child| match child {
                Paragraph::Text { content } => {
                    vec![text_block(tree, NodeKind::Blockquote, content)]
                }
                other => import_paragraph(tree, other),
            })
            .collect(),
        Paragraph::OrderedList { entries } => vec![import_list(tree, true, entries)],
        Paragraph::UnorderedList { entries } => vec![import_list(tree, false, entries)],
        Paragraph::Checklist { items } => vec![import_checklist(tree, items)],
    }
}

fn is_rule(content: &[Span]) -> bool {
    let text: String = content.iter().map(span_text).collect();
    matches!(text.trim(), "---" | "***" | "___")
}

fn span_text(span: &Span) -> String {
    let mut text = span.text.clone();
    for child in &span.children {
        text.push_str(&span_text(child));
    }
    text
}

fn text_block(tree: &mut Tree, kind: NodeKind, content: &[Span]) -> NodeId {
    let block = tree.create(kind);
    append_spans(tree, block, content);
    block
}

fn append_spans(tree: &mut Tree, parent: NodeId, spans: &[Span]) {
    for span in spans {
        let target = match import_style(span.style) {
            Some(style) => {
                let wrapper = tree.create(NodeKind::Style(style));
                tree.append_child(parent, wrapper);
                wrapper
            }
            None => parent,
        };
        if !span.text.is_empty() {
            let text = tree.create_text(&span.text);
            tree.append_child(target, text);
        }
        append_spans(tree, target, &span.children);
    }
}

fn import_style(style: DocStyle) -> Option<InlineStyle> {
    match style {
        DocStyle::Bold => Some(InlineStyle::Bold),
        DocStyle::Italic => Some(InlineStyle::Italic),
        DocStyle::Underline => Some(InlineStyle::Underline),
        DocStyle::Strike => Some(InlineStyle::Strikethrough),
        DocStyle::Code => Some(InlineStyle::Code),
        DocStyle::None | DocStyle::Highlight | DocStyle::Link => None,
    }
}

fn import_list(tree: &mut Tree, ordered: bool, entries: &[Vec<Paragraph>]) -> NodeId {
    let list = tree.create(NodeKind::List { ordered });
    for entry in entries {
        let item = tree.create(NodeKind::ListItem);
        let mut has_text = false;
        for paragraph in entry {
            match paragraph {
                Paragraph::OrderedList { .. }
                | Paragraph::UnorderedList { .. }
                | Paragraph::Checklist { .. } => {
                    for nested in import_paragraph(tree, paragraph) {
                        tree.append_child(item, nested);
                    }
                }
                Paragraph::Text { content }
                | Paragraph::Header1 { content }
                | Paragraph::Header2 { content }
                | Paragraph::Header3 { content }
                | Paragraph::CodeBlock { content } => {
                    if has_text {
                        let gap = tree.create_text(" ");
                        tree.append_child(item, gap);
                    }
                    append_spans(tree, item, content);
                    has_text = true;
                }
                Paragraph::Quote { children } => {
                    for child in children {
                        if let Paragraph::Text { content } = child {
                            append_spans(tree, item, content);
                            has_text = true;
                        }
                    }
                }
            }
        }
        tree.append_child(list, item);
    }
    list
}

fn import_checklist(tree: &mut Tree, items: &[ChecklistItem]) -> NodeId {
    let list = tree.create(NodeKind::List { ordered: false });
    for checklist_item in items {
        let item = tree.create(NodeKind::ListItem);
        if let Some(attrs) = tree.attrs_mut(item) {
            attrs.checkbox = Some(checklist_item.checked);
        }
        append_spans(tree, item, &checklist_item.content);
        if !checklist_item.children.is_empty() {
            let nested = import_checklist(tree, &checklist_item.children);
            tree.append_child(item, nested);
        }
        tree.append_child(list, item);
    }
    list
}

// ============================================================================
// Tree -> document
// ============================================================================

pub fn document_from_tree(tree: &Tree) -> Document {
    let paragraphs = tree
        .children(tree.root())
        .iter()
        .filter_map(|block| export_block(tree, *block))
        .collect();
    Document::new().with_paragraphs(paragraphs)
}

fn export_block(tree: &Tree, block: NodeId) -> Option<Paragraph> {
    let content = || export_inline(tree, block);
    let paragraph = match tree.kind(block)? {
        NodeKind::Paragraph => Paragraph::Text { content: content() },
        NodeKind::Heading(HeadingLevel::One) => Paragraph::Header1 { content: content() },
        NodeKind::Heading(HeadingLevel::Two) => Paragraph::Header2 { content: content() },
        NodeKind::Heading(HeadingLevel::Three) => Paragraph::Header3 { content: content() },
        NodeKind::CodeBlock => Paragraph::CodeBlock { content: content() },
        NodeKind::Blockquote => Paragraph::Quote {
            children: vec![Paragraph::Text { content: content() }],
        },
        NodeKind::List { ordered } => export_list(tree, block, *ordered),
        NodeKind::HorizontalRule => Paragraph::Text {
            content: vec![Span::new_text(RULE_TEXT)],
        },
        NodeKind::CustomBlock { block_type, .. } => Paragraph::Text {
            content: vec![Span::new_text(&format!("[{block_type}]"))],
        },
        NodeKind::Root
        | NodeKind::ListItem
        | NodeKind::Text(_)
        | NodeKind::Style(_)
        | NodeKind::LineBreak
        | NodeKind::Marker => return None,
    };
    Some(paragraph)
}

fn is_checklist(tree: &Tree, list: NodeId) -> bool {
    tree.attrs(list).is_some_and(|attrs| attrs.checklist)
        || tree
            .children(list)
            .iter()
            .any(|item| tree.attrs(*item).is_some_and(|attrs| attrs.checkbox.is_some()))
}

fn export_list(tree: &Tree, list: NodeId, ordered: bool) -> Paragraph {
    if is_checklist(tree, list) {
        return Paragraph::Checklist {
            items: export_checklist_items(tree, list),
        };
    }
    let entries = tree
        .children(list)
        .iter()
        .map(|item| {
            let mut entry = vec![Paragraph::Text {
                content: export_inline(tree, *item),
            }];
            for child in tree.children(*item) {
                if let Some(NodeKind::List { ordered }) = tree.kind(*child) {
                    entry.push(export_list(tree, *child, *ordered));
                }
            }
            entry
        })
        .collect();
    if ordered {
        Paragraph::OrderedList { entries }
    } else {
        Paragraph::UnorderedList { entries }
    }
}

fn export_checklist_items(tree: &Tree, list: NodeId) -> Vec<ChecklistItem> {
    tree.children(list)
        .iter()
        .map(|item| {
            let checked = tree
                .attrs(*item)
                .and_then(|attrs| attrs.checkbox)
                .unwrap_or(false);
            let children = tree
                .children(*item)
                .iter()
                .filter(|child| tree.kind(**child).is_some_and(NodeKind::is_list))
                .flat_map(|nested| export_checklist_items(tree, *nested))
                .collect();
            ChecklistItem::new(checked)
                .with_content(export_inline(tree, *item))
                .with_children(children)
        })
        .collect()
}

fn export_inline(tree: &Tree, container: NodeId) -> Vec<Span> {
    tree.children(container)
        .iter()
        .filter_map(|child| export_span(tree, *child))
        .collect()
}

fn export_span(tree: &Tree, node: NodeId) -> Option<Span> {
    match tree.kind(node)? {
        NodeKind::Text(text) => Some(Span::new_text(text.as_str())),
        NodeKind::Style(style) => {
            let mut span = Span::new_text("");
            span.style = export_style(*style);
            span.children = export_inline(tree, node);
            Some(span)
        }
        _ => None,
    }
}

fn export_style(style: InlineStyle) -> DocStyle {
    match style {
        InlineStyle::Bold => DocStyle::Bold,
        InlineStyle::Italic => DocStyle::Italic,
        InlineStyle::Underline => DocStyle::Underline,
        InlineStyle::Strikethrough => DocStyle::Strike,
        InlineStyle::Code => DocStyle::Code,
    }
}
