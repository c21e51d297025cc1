//! Markdown-style shortcuts typed into the editor.
//!
//! Everything here is stateless: the matchers look at text, and
//! [`apply_inline_autoformat`] rewrites one text node of a tree.

use std::sync::LazyLock;

use regex::Regex;

use crate::editor::Position;
use crate::tree::{HeadingLevel, InlineStyle, NodeKind, Tree, split_at_char};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InlineMatch {
    pub style: InlineStyle,
    /// Char index where the opening delimiter starts.
    pub start: usize,
    pub inner: String,
}

struct InlinePattern {
    style: InlineStyle,
    regex: Regex,
    delimiter: usize,
}

// Longer delimiters come first so `**x**` is never read as italic.
static INLINE_PATTERNS: LazyLock<Vec<InlinePattern>> = LazyLock::new(|| {
    let pattern = |style, source: &str, delimiter| InlinePattern {
        style,
        regex: Regex::new(source).expect("inline autoformat pattern"),
        delimiter,
    };
    vec![
        pattern(InlineStyle::Bold, r"\*\*([^*\s](?:[^*]*[^*\s])?)\*\*$", 2),
        pattern(InlineStyle::Underline, r"__([^_\s](?:[^_]*[^_\s])?)__$", 2),
        pattern(InlineStyle::Strikethrough, r"~~([^~\s](?:[^~]*[^~\s])?)~~$", 2),
        pattern(InlineStyle::Code, r"`([^`]+)`$", 1),
        pattern(InlineStyle::Italic, r"(?:^|[^*])\*([^*\s](?:[^*]*[^*\s])?)\*$", 1),
    ]
});

static ORDERED_PREFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d+\. $").expect("ordered list prefix pattern"));

/// Finds a delimited run that ends exactly at the end of `text_before`.
pub fn match_inline(text_before: &str) -> Option<InlineMatch> {
    INLINE_PATTERNS.iter().find_map(|pattern| {
        let captures = pattern.regex.captures(text_before)?;
        let inner = captures.get(1)?;
        let start_byte = inner.start() - pattern.delimiter;
        Some(InlineMatch {
            style: pattern.style,
            start: text_before[..start_byte].chars().count(),
            inner: inner.as_str().to_string(),
        })
    })
}

/// Replaces a delimited run just before `at` with a styled node. Returns the
/// position right after the inserted node, or `None` when nothing matched.
pub fn apply_inline_autoformat(tree: &mut Tree, at: Position) -> Option<Position> {
    let text = tree.text(at.node)?.to_string();
    let parent = tree.parent(at.node)?;
    let (before, after) = split_at_char(&text, at.offset);
    let found = match_inline(&before)?;
    let (left, _) = split_at_char(&before, found.start);

    // Inside a wrapper of the same style only the delimiters go.
    let already_styled = tree
        .ancestors(at.node)
        .take_while(|id| tree.kind(*id).is_some_and(NodeKind::is_inline))
        .any(|id| tree.kind(id) == Some(&NodeKind::Style(found.style)));
    if already_styled {
        let caret = left.chars().count() + found.inner.chars().count();
        tree.set_text(at.node, format!("{left}{}{after}", found.inner));
        return Some(Position::new(at.node, caret));
    }

    let wrapper = tree.create(NodeKind::Style(found.style));
    let inner = tree.create_text(&found.inner);
    tree.append_child(wrapper, inner);
    if !tree.insert_after(at.node, wrapper) {
        tree.remove(wrapper);
        return None;
    }
    if !after.is_empty() {
        let rest = tree.create_text(&after);
        tree.insert_after(wrapper, rest);
    }
    if left.is_empty() {
        tree.remove(at.node);
    } else {
        tree.set_text(at.node, left);
    }
    let index = tree.index_in_parent(wrapper)?;
    Some(Position::new(parent, index + 1))
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LinePrefixAction {
    UnorderedList,
    OrderedList,
    Checklist { checked: bool },
    Heading(HeadingLevel),
    Blockquote,
    CodeBlock,
    HorizontalRule,
}

/// Matches the whole text typed so far on a line against the block
/// shortcuts.
pub fn match_line_prefix(line: &str) -> Option<LinePrefixAction> {
    let action = match line {
        "- " | "* " | "+ " => LinePrefixAction::UnorderedList,
        "[ ] " | "[] " => LinePrefixAction::Checklist { checked: false },
        "[x] " | "[X] " => LinePrefixAction::Checklist { checked: true },
        "# " => LinePrefixAction::Heading(HeadingLevel::One),
        "## " => LinePrefixAction::Heading(HeadingLevel::Two),
        "### " => LinePrefixAction::Heading(HeadingLevel::Three),
        "> " => LinePrefixAction::Blockquote,
        "```" => LinePrefixAction::CodeBlock,
        "---" => LinePrefixAction::HorizontalRule,
        other if ORDERED_PREFIX.is_match(other) => LinePrefixAction::OrderedList,
        _ => return None,
    };
    Some(action)
}
