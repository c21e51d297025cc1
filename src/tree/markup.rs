//! Markup form of the document tree.
//!
//! The writer emits a small HTML subset; the parser reads the same subset
//! back. History snapshots and the native file format both go through here,
//! so `serialize(deserialize(s)) == s` must hold for anything the writer
//! produced.

use html_escape::{decode_html_entities, encode_double_quoted_attribute, encode_text};
use serde_json::Value;

use super::{Attributes, HeadingLevel, InlineStyle, NodeId, NodeKind, Progress, Tree};
use crate::error::MarkupError;
use crate::plugin::PluginRegistry;

const VOID_TAGS: [&str; 4] = ["br", "hr", "img", "input"];

#[derive(Clone, Debug, PartialEq)]
pub enum MarkupNode {
    Element(MarkupElement),
    Text(String),
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct MarkupElement {
    pub tag: String,
    pub attributes: Vec<(String, String)>,
    pub children: Vec<MarkupNode>,
}

impl MarkupElement {
    pub fn new(tag: &str) -> Self {
        Self {
            tag: tag.to_string(),
            ..Self::default()
        }
    }

    pub fn with_attr(mut self, name: &str, value: &str) -> Self {
        self.attributes.push((name.to_string(), value.to_string()));
        self
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn text_content(&self) -> String {
        let mut result = String::new();
        for child in &self.children {
            match child {
                MarkupNode::Text(text) => result.push_str(text),
                MarkupNode::Element(element) => result.push_str(&element.text_content()),
            }
        }
        result
    }
}

// ============================================================================
// Writer
// ============================================================================

pub fn serialize(tree: &Tree, plugins: &PluginRegistry) -> String {
    let mut out = String::new();
    for child in tree.children(tree.root()) {
        write_node(tree, *child, plugins, &mut out);
        out.push('\n');
    }
    out
}

pub fn serialize_node(tree: &Tree, id: NodeId, plugins: &PluginRegistry) -> String {
    let mut out = String::new();
    write_node(tree, id, plugins, &mut out);
    out
}

fn write_node(tree: &Tree, id: NodeId, plugins: &PluginRegistry, out: &mut String) {
    let Some(node) = tree.get(id) else {
        return;
    };
    match &node.kind {
        NodeKind::Root => write_children(tree, id, plugins, out),
        NodeKind::Paragraph => write_element(tree, id, "p", &[], plugins, out),
        NodeKind::Heading(level) => {
            let tag = format!("h{}", level.number());
            let mut attrs = Vec::new();
            if let Some(anchor) = &node.attrs.id {
                attrs.push(("id", anchor.clone()));
            }
            write_element(tree, id, &tag, &attrs, plugins, out);
        }
        NodeKind::Blockquote => write_element(tree, id, "blockquote", &[], plugins, out),
        NodeKind::CodeBlock => write_element(tree, id, "pre", &[], plugins, out),
        NodeKind::List { ordered } => {
            let tag = if *ordered { "ol" } else { "ul" };
            let mut attrs = Vec::new();
            if node.attrs.checklist {
                attrs.push(("data-checklist", "true".to_string()));
            }
            if let Some(progress) = node.attrs.progress {
                attrs.push((
                    "data-progress",
                    format!("{}/{}", progress.checked, progress.total),
                ));
            }
            write_element(tree, id, tag, &attrs, plugins, out);
        }
        NodeKind::ListItem => {
            let mut attrs = Vec::new();
            if let Some(depth) = node.attrs.depth {
                attrs.push(("data-depth", depth.to_string()));
            }
            if let Some(checked) = node.attrs.checkbox {
                attrs.push(("data-checked", checked.to_string()));
            }
            write_element(tree, id, "li", &attrs, plugins, out);
        }
        NodeKind::HorizontalRule => out.push_str("<hr>"),
        NodeKind::CustomBlock {
            block_type,
            payload,
        } => match plugins.get(block_type) {
            Some(plugin) => out.push_str(&plugin.render(payload.as_ref())),
            None => {
                let json = payload
                    .as_ref()
                    .map(Value::to_string)
                    .unwrap_or_default();
                out.push_str("<div data-block=\"");
                out.push_str(&encode_double_quoted_attribute(block_type));
                out.push_str("\" data-payload=\"");
                out.push_str(&encode_double_quoted_attribute(&json));
                out.push_str("\"></div>");
            }
        },
        NodeKind::Text(text) => out.push_str(&encode_text(text)),
        NodeKind::Style(style) => write_element(tree, id, style.tag(), &[], plugins, out),
        NodeKind::LineBreak => out.push_str("<br>"),
        NodeKind::Marker => {}
    }
}

fn write_element(
    tree: &Tree,
    id: NodeId,
    tag: &str,
    attrs: &[(&str, String)],
    plugins: &PluginRegistry,
    out: &mut String,
) {
    out.push('<');
    out.push_str(tag);
    for (name, value) in attrs {
        out.push(' ');
        out.push_str(name);
        out.push_str("=\"");
        out.push_str(&encode_double_quoted_attribute(value));
        out.push('"');
    }
    out.push('>');
    write_children(tree, id, plugins, out);
    out.push_str("</");
    out.push_str(tag);
    out.push('>');
}

fn write_children(tree: &Tree, id: NodeId, plugins: &PluginRegistry, out: &mut String) {
    for child in tree.children(id) {
        write_node(tree, *child, plugins, out);
    }
}

// ============================================================================
// Parser
// ============================================================================

pub fn parse(source: &str) -> Result<Vec<MarkupNode>, MarkupError> {
    let mut parser = Parser {
        source,
        position: 0,
    };
    let mut stack: Vec<MarkupElement> = Vec::new();
    let mut top: Vec<MarkupNode> = Vec::new();

    while parser.position < source.len() {
        let rest = parser.rest();
        if rest.starts_with("<!--") {
            let Some(end) = rest.find("-->") else {
                return Err(MarkupError::UnexpectedEof {
                    position: parser.position,
                });
            };
            parser.position += end + 3;
        } else if rest.starts_with("</") {
            let start = parser.position;
            let tag = parser.closing_tag()?;
            let Some(element) = stack.pop() else {
                return Err(MarkupError::UnmatchedClose {
                    tag,
                    position: start,
                });
            };
            if element.tag != tag {
                return Err(MarkupError::MismatchedTag {
                    expected: element.tag,
                    found: tag,
                    position: start,
                });
            }
            push_node(&mut stack, &mut top, MarkupNode::Element(element));
        } else if rest.starts_with('<') {
            let (element, self_closing) = parser.opening_tag()?;
            if self_closing || VOID_TAGS.contains(&element.tag.as_str()) {
                push_node(&mut stack, &mut top, MarkupNode::Element(element));
            } else {
                stack.push(element);
            }
        } else {
            let end = rest.find('<').unwrap_or(rest.len());
            let raw = &rest[..end];
            parser.position += end;
            let text = decode_html_entities(raw).into_owned();
            push_node(&mut stack, &mut top, MarkupNode::Text(text));
        }
    }

    if let Some(open) = stack.pop() {
        return Err(MarkupError::UnclosedTag {
            tag: open.tag,
            position: source.len(),
        });
    }
    Ok(top)
}

fn push_node(stack: &mut [MarkupElement], top: &mut Vec<MarkupNode>, node: MarkupNode) {
    match stack.last_mut() {
        Some(parent) => parent.children.push(node),
        None => top.push(node),
    }
}

struct Parser<'a> {
    source: &'a str,
    position: usize,
}

impl<'a> Parser<'a> {
    fn rest(&self) -> &'a str {
        &self.source[self.position..]
    }

    fn malformed(&self) -> MarkupError {
        MarkupError::MalformedTag {
            position: self.position,
        }
    }

    fn closing_tag(&mut self) -> Result<String, MarkupError> {
        let rest = self.rest();
        let Some(end) = rest.find('>') else {
            return Err(MarkupError::UnexpectedEof {
                position: self.position,
            });
        };
        let name = rest[2..end].trim().to_ascii_lowercase();
        if name.is_empty() {
            return Err(self.malformed());
        }
        self.position += end + 1;
        Ok(name)
    }

    fn opening_tag(&mut self) -> Result<(MarkupElement, bool), MarkupError> {
        let start = self.position;
        self.position += 1;
        let name = self.take_while(|ch| ch.is_ascii_alphanumeric() || ch == '-');
        if name.is_empty() {
            self.position = start;
            return Err(self.malformed());
        }
        let mut element = MarkupElement::new(&name.to_ascii_lowercase());

        loop {
            self.skip_whitespace();
            let rest = self.rest();
            if rest.is_empty() {
                return Err(MarkupError::UnexpectedEof {
                    position: self.position,
                });
            }
            if rest.starts_with("/>") {
                self.position += 2;
                return Ok((element, true));
            }
            if rest.starts_with('>') {
                self.position += 1;
                return Ok((element, false));
            }

            let attr_name =
                self.take_while(|ch| !ch.is_whitespace() && ch != '=' && ch != '>' && ch != '/');
            if attr_name.is_empty() {
                return Err(self.malformed());
            }
            self.skip_whitespace();
            let value = if self.rest().starts_with('=') {
                self.position += 1;
                self.skip_whitespace();
                self.attribute_value()?
            } else {
                String::new()
            };
            element
                .attributes
                .push((attr_name.to_ascii_lowercase(), value));
        }
    }

    fn attribute_value(&mut self) -> Result<String, MarkupError> {
        let rest = self.rest();
        let quote = match rest.chars().next() {
            Some(ch @ ('"' | '\'')) => ch,
            Some(_) => {
                let raw = self.take_while(|ch| !ch.is_whitespace() && ch != '>');
                return Ok(decode_html_entities(&raw).into_owned());
            }
            None => {
                return Err(MarkupError::UnexpectedEof {
                    position: self.position,
                });
            }
        };
        let Some(end) = rest[1..].find(quote) else {
            return Err(MarkupError::UnexpectedEof {
                position: self.position,
            });
        };
        let raw = &rest[1..1 + end];
        self.position += end + 2;
        Ok(decode_html_entities(raw).into_owned())
    }

    fn take_while(&mut self, predicate: impl Fn(char) -> bool) -> String {
        let rest = self.rest();
        let len = rest
            .char_indices()
            .find(|(_, ch)| !predicate(*ch))
            .map(|(idx, _)| idx)
            .unwrap_or(rest.len());
        self.position += len;
        rest[..len].to_string()
    }

    fn skip_whitespace(&mut self) {
        self.take_while(char::is_whitespace);
    }
}

// ============================================================================
// Building tree nodes from parsed markup
// ============================================================================

/// Parses `source` and appends the resulting nodes to `parent`. The tree is
/// untouched when parsing fails.
pub fn deserialize_into(
    tree: &mut Tree,
    parent: NodeId,
    source: &str,
    plugins: &PluginRegistry,
) -> Result<Vec<NodeId>, MarkupError> {
    let nodes = parse(source)?;
    let block_level = tree
        .kind(parent)
        .is_some_and(|kind| matches!(kind, NodeKind::Root | NodeKind::List { .. }));
    let mut created = Vec::new();
    for node in &nodes {
        if block_level && is_whitespace_text(node) {
            continue;
        }
        created.extend(build(tree, node, plugins));
    }
    for id in &created {
        tree.append_child(parent, *id);
    }
    Ok(created)
}

fn is_whitespace_text(node: &MarkupNode) -> bool {
    matches!(node, MarkupNode::Text(text) if text.trim().is_empty())
}

fn build(tree: &mut Tree, node: &MarkupNode, plugins: &PluginRegistry) -> Vec<NodeId> {
    let element = match node {
        MarkupNode::Text(text) => {
            if text.is_empty() {
                return Vec::new();
            }
            return vec![tree.create_text(text)];
        }
        MarkupNode::Element(element) => element,
    };

    if let Some(block_type) = element.attr("data-block") {
        let payload = match plugins.get(block_type) {
            Some(plugin) => plugin.parse(element),
            None => element
                .attr("data-payload")
                .and_then(|raw| serde_json::from_str(raw).ok()),
        };
        return vec![tree.create(NodeKind::CustomBlock {
            block_type: block_type.to_string(),
            payload,
        })];
    }

    let tag = element.tag.as_str();
    let kind = match tag {
        "p" => NodeKind::Paragraph,
        "h1" => NodeKind::Heading(HeadingLevel::One),
        "h2" => NodeKind::Heading(HeadingLevel::Two),
        "h3" => NodeKind::Heading(HeadingLevel::Three),
        "blockquote" => NodeKind::Blockquote,
        "pre" => NodeKind::CodeBlock,
        "ul" => NodeKind::List { ordered: false },
        "ol" => NodeKind::List { ordered: true },
        "li" => NodeKind::ListItem,
        "hr" => NodeKind::HorizontalRule,
        "br" => NodeKind::LineBreak,
        other => match InlineStyle::from_tag(other) {
            Some(style) => NodeKind::Style(style),
            None => {
                // Unknown wrappers are transparent.
                return element
                    .children
                    .iter()
                    .flat_map(|child| build(tree, child, plugins))
                    .collect();
            }
        },
    };

    let skip_whitespace = matches!(kind, NodeKind::List { .. });
    let id = tree.create(kind);
    if let Some(attrs) = tree.attrs_mut(id) {
        *attrs = element_attributes(element);
    }
    for child in &element.children {
        if skip_whitespace && is_whitespace_text(child) {
            continue;
        }
        for built in build(tree, child, plugins) {
            tree.append_child(id, built);
        }
    }
    vec![id]
}

fn element_attributes(element: &MarkupElement) -> Attributes {
    let mut attrs = Attributes::default();
    if element.tag.starts_with('h') {
        attrs.id = element.attr("id").map(str::to_string);
    }
    attrs.checklist = element.attr("data-checklist") == Some("true");
    attrs.progress = element.attr("data-progress").and_then(parse_progress);
    attrs.depth = element
        .attr("data-depth")
        .and_then(|raw| raw.parse::<usize>().ok());
    attrs.checkbox = match element.attr("data-checked") {
        Some("true") => Some(true),
        Some(_) => Some(false),
        None => None,
    };
    attrs
}

fn parse_progress(raw: &str) -> Option<Progress> {
    let (checked, total) = raw.split_once('/')?;
    Some(Progress {
        checked: checked.trim().parse().ok()?,
        total: total.trim().parse().ok()?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn roundtrip(source: &str) -> String {
        let plugins = PluginRegistry::with_builtins();
        let mut tree = Tree::new();
        let root = tree.root();
        deserialize_into(&mut tree, root, source, &plugins).unwrap();
        serialize(&tree, &plugins)
    }

    #[test]
    fn writer_output_reads_back_identically() {
        let source = concat!(
            "<h1 id=\"intro\">Hello <strong>big</strong> world</h1>\n",
            "<ul data-checklist=\"true\" data-progress=\"1/2\"><li data-depth=\"1\" data-checked=\"true\">Done</li>",
            "<li data-depth=\"1\" data-checked=\"false\">Open<ol><li data-depth=\"2\">Sub</li></ol></li></ul>\n",
            "<p>a &lt; b &amp; c<br></p>\n",
            "<hr>\n",
        );
        assert_eq!(roundtrip(source), source);
    }

    #[test]
    fn unknown_custom_blocks_keep_their_payload() {
        let source = "<div data-block=\"chart\" data-payload=\"{&quot;kind&quot;:&quot;bar&quot;}\"></div>\n";
        assert_eq!(roundtrip(source), source);
    }

    #[test]
    fn unknown_inline_wrappers_are_transparent() {
        assert_eq!(
            roundtrip("<p><span class=\"x\">plain</span> text</p>"),
            "<p>plain text</p>\n"
        );
    }

    #[test]
    fn mismatched_tags_report_position() {
        let err = parse("<p><strong>x</em></p>").unwrap_err();
        assert!(matches!(err, MarkupError::MismatchedTag { position: 12, .. }));
    }

    #[test]
    fn failed_parse_leaves_tree_untouched() {
        let plugins = PluginRegistry::default();
        let mut tree = Tree::new();
        let root = tree.root();
        deserialize_into(&mut tree, root, "<p>kept</p>", &plugins).unwrap();
        let before = serialize(&tree, &plugins);
        assert!(deserialize_into(&mut tree, root, "<p>broken", &plugins).is_err());
        assert_eq!(serialize(&tree, &plugins), before);
    }

    #[test]
    fn attribute_values_accept_single_quotes_and_bare_words() {
        let nodes = parse("<li data-depth='2' data-checked=true></li>").unwrap();
        let MarkupNode::Element(element) = &nodes[0] else {
            panic!("expected element");
        };
        assert_eq!(element.attr("data-depth"), Some("2"));
        assert_eq!(element.attr("data-checked"), Some("true"));
    }
}
