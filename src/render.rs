use std::collections::HashMap;

use ratatui::{
    style::{Color, Modifier, Style},
    text::{Line, Span},
};
use serde_json::Value;
use unicode_width::UnicodeWidthChar;

use crate::editor::{Position, Selection};
use crate::tree::{HeadingLevel, InlineStyle, NodeId, NodeKind, Tree};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CursorVisualPosition {
    pub line: usize,
    pub column: u16,
}

#[derive(Debug)]
pub struct RenderResult {
    pub lines: Vec<Line<'static>>,
    pub cursor: Option<CursorVisualPosition>,
    pub total_lines: usize,
}

/// Lays the document out for a terminal `width` columns wide. The caret is
/// the focus end of `selection`; a non-collapsed selection is drawn reversed.
pub fn render_tree(tree: &Tree, width: usize, selection: Option<Selection>) -> RenderResult {
    let mut renderer = Renderer::new(tree, width.max(1), selection);
    renderer.render_root();
    renderer.finish()
}

struct Renderer<'a> {
    tree: &'a Tree,
    wrap_width: usize,
    caret: Option<Position>,
    highlights: HashMap<NodeId, (usize, usize)>,
    cursor: Option<CursorVisualPosition>,
    lines: Vec<Line<'static>>,
}

impl<'a> Renderer<'a> {
    fn new(tree: &'a Tree, wrap_width: usize, selection: Option<Selection>) -> Self {
        Self {
            tree,
            wrap_width,
            caret: selection.map(|selection| selection.end),
            highlights: selection
                .map(|selection| selected_ranges(tree, selection))
                .unwrap_or_default(),
            cursor: None,
            lines: Vec::new(),
        }
    }

    fn render_root(&mut self) {
        let tree = self.tree;
        for (idx, block) in tree.children(tree.root()).iter().enumerate() {
            if idx > 0 {
                self.push_blank_line();
            }
            self.render_block(*block, "");
        }
    }

    fn render_block(&mut self, block: NodeId, prefix: &str) {
        let tree = self.tree;
        let Some(kind) = tree.kind(block) else {
            return;
        };
        match kind {
            NodeKind::Paragraph => self.render_text_block(block, prefix, prefix, Style::default()),
            NodeKind::Heading(level) => self.render_heading(block, prefix, *level),
            NodeKind::Blockquote => {
                let quote_prefix = format!("{prefix}| ");
                let style = Style::default().add_modifier(Modifier::ITALIC);
                self.render_text_block(block, &quote_prefix, &quote_prefix, style);
            }
            NodeKind::CodeBlock => self.render_code_block(block, prefix),
            NodeKind::List { ordered } => self.render_list(block, prefix, *ordered),
            NodeKind::HorizontalRule => {
                let available = self.wrap_width.saturating_sub(visible_width(prefix));
                self.push_plain_line(&format!("{prefix}{}", "─".repeat(available.max(3))));
            }
            NodeKind::CustomBlock {
                block_type,
                payload,
            } => {
                let label = custom_block_label(block_type, payload.as_ref());
                let style = Style::default().fg(Color::Cyan);
                self.lines.push(Line::from(vec![
                    Span::raw(prefix.to_string()),
                    Span::styled(label, style),
                ]));
            }
            _ => {}
        }
    }

    fn render_text_block(
        &mut self,
        block: NodeId,
        first_prefix: &str,
        continuation_prefix: &str,
        style: Style,
    ) {
        let mut fragments = Vec::new();
        self.collect_inline(block, style, &mut fragments);
        let lines = wrap_fragments(
            &fragments,
            first_prefix,
            continuation_prefix,
            self.wrap_width,
        );
        self.consume_lines(lines);
    }

    fn render_heading(&mut self, block: NodeId, prefix: &str, level: HeadingLevel) {
        let style = Style::default().add_modifier(Modifier::BOLD);
        self.render_text_block(block, prefix, prefix, style);

        let underline_char = match level {
            HeadingLevel::One => '=',
            HeadingLevel::Two => '-',
            HeadingLevel::Three => return,
        };
        let width = self
            .lines
            .last()
            .map(|line| line_width(line).saturating_sub(visible_width(prefix)))
            .unwrap_or(0);
        let underline = underline_string(width, underline_char);
        self.push_plain_line(&format!("{prefix}{underline}"));
    }

    fn render_code_block(&mut self, block: NodeId, prefix: &str) {
        let fence = self.code_block_fence(prefix);
        self.push_plain_line(&fence);

        let mut fragments = Vec::new();
        self.collect_inline(block, Style::default(), &mut fragments);
        let lines = wrap_fragments(&fragments, prefix, prefix, usize::MAX / 4);
        self.consume_lines(lines);

        self.push_plain_line(&fence);
    }

    fn render_list(&mut self, list: NodeId, prefix: &str, ordered: bool) {
        let tree = self.tree;
        for (idx, item) in tree.children(list).iter().enumerate() {
            let checkbox = tree.attrs(*item).and_then(|attrs| attrs.checkbox);
            let marker = match checkbox {
                Some(true) => "[✓] ".to_string(),
                Some(false) => "[ ] ".to_string(),
                None if ordered => format!("{}. ", idx + 1),
                None => "• ".to_string(),
            };
            let first_prefix = format!("{prefix}{marker}");
            let continuation_prefix = format!("{prefix}{}", " ".repeat(visible_width(&marker)));
            let style = if checkbox == Some(true) {
                Style::default().add_modifier(Modifier::DIM)
            } else {
                Style::default()
            };
            self.render_text_block(*item, &first_prefix, &continuation_prefix, style);

            for child in tree.children(*item) {
                if tree.kind(*child).is_some_and(NodeKind::is_list) {
                    self.render_block(*child, &continuation_prefix);
                }
            }
        }
    }

    /// Flattens the inline children of `container` into fragments. Nested
    /// lists are skipped; a caret pointing at them lands after the text.
    fn collect_inline(&self, container: NodeId, style: Style, fragments: &mut Vec<FragmentItem>) {
        let children = self.tree.children(container);
        let mut placed = false;
        let mut inline_count = 0;
        for (idx, child) in children.iter().enumerate() {
            let Some(kind) = self.tree.kind(*child) else {
                continue;
            };
            if kind.is_block() {
                continue;
            }
            if self.caret == Some(Position::new(container, idx)) {
                push_cursor(fragments, style);
                placed = true;
            }
            self.collect_node(*child, kind, style, fragments);
            inline_count = idx + 1;
        }
        if !placed
            && self
                .caret
                .is_some_and(|caret| caret.node == container && caret.offset >= inline_count)
        {
            push_cursor(fragments, style);
        }
    }

    fn collect_node(
        &self,
        node: NodeId,
        kind: &NodeKind,
        style: Style,
        fragments: &mut Vec<FragmentItem>,
    ) {
        match kind {
            NodeKind::Text(text) => {
                let cursor = self
                    .caret
                    .filter(|caret| caret.node == node)
                    .map(|caret| caret.offset);
                match self.highlights.get(&node) {
                    Some(&(start, end)) => {
                        let chars: Vec<char> = text.chars().collect();
                        let selected = style.add_modifier(Modifier::REVERSED);
                        let pieces = [
                            (0, start, style),
                            (start, end, selected),
                            (end, chars.len(), style),
                        ];
                        let mut cursor = cursor;
                        for (from, to, piece_style) in pieces {
                            let piece_cursor = match cursor {
                                Some(offset) if offset >= from && offset <= to => {
                                    cursor = None;
                                    Some(offset - from)
                                }
                                _ => None,
                            };
                            if from >= to && piece_cursor.is_none() {
                                continue;
                            }
                            let piece: String = chars[from..to].iter().collect();
                            tokenize_text(&piece, piece_style, piece_cursor, fragments);
                        }
                    }
                    None => tokenize_text(text, style, cursor, fragments),
                }
            }
            NodeKind::Style(inline) => {
                self.collect_inline(node, merge_style(style, *inline), fragments);
            }
            _ => {}
        }
    }

    fn push_blank_line(&mut self) {
        self.lines.push(Line::from(""));
    }

    fn push_plain_line(&mut self, content: &str) {
        let span = Span::raw(content.to_string());
        self.lines.push(Line::from(vec![span]));
    }

    fn code_block_fence(&self, prefix: &str) -> String {
        const MIN_FENCE_WIDTH: usize = 4;
        let available_width = self.wrap_width.saturating_sub(visible_width(prefix));
        let dash_count = available_width.max(MIN_FENCE_WIDTH);
        format!("{}{}", prefix, "-".repeat(dash_count))
    }

    fn consume_lines(&mut self, outputs: Vec<LineOutput>) {
        for output in outputs {
            let spans: Vec<Span<'static>> = output
                .spans
                .into_iter()
                .map(|segment| Span::styled(segment.text, segment.style))
                .collect();
            if let Some(column) = output.cursor {
                self.cursor = Some(CursorVisualPosition {
                    line: self.lines.len(),
                    column,
                });
            }
            self.lines.push(Line::from(spans));
        }
    }

    fn finish(mut self) -> RenderResult {
        if self.lines.is_empty() {
            self.lines.push(Line::from(""));
        }
        let total_lines = self.lines.len();
        RenderResult {
            lines: self.lines,
            cursor: self.cursor,
            total_lines,
        }
    }
}

fn custom_block_label(block_type: &str, payload: Option<&Value>) -> String {
    let detail = payload.and_then(|value| {
        ["title", "alt", "src"]
            .iter()
            .find_map(|key| value.get(*key).and_then(Value::as_str))
            .filter(|detail| !detail.is_empty())
    });
    match detail {
        Some(detail) => format!("[{block_type}: {detail}]"),
        None => format!("[{block_type}]"),
    }
}

/// Char ranges of every text node covered by `selection`, in document order.
fn selected_ranges(tree: &Tree, selection: Selection) -> HashMap<NodeId, (usize, usize)> {
    let mut ranges = HashMap::new();
    if selection.is_collapsed() {
        return ranges;
    }
    let texts: Vec<NodeId> = tree
        .descendants(tree.root())
        .into_iter()
        .filter(|node| matches!(tree.kind(*node), Some(NodeKind::Text(_))))
        .collect();
    let index_of = |position: Position| texts.iter().position(|node| *node == position.node);
    let (Some(a), Some(b)) = (index_of(selection.start), index_of(selection.end)) else {
        return ranges;
    };
    let ((low, first), (high, last)) = if (a, selection.start.offset) <= (b, selection.end.offset)
    {
        ((a, selection.start), (b, selection.end))
    } else {
        ((b, selection.end), (a, selection.start))
    };
    for (idx, node) in texts.iter().enumerate().take(high + 1).skip(low) {
        let len = tree.char_len(*node);
        let start = if idx == low { first.offset.min(len) } else { 0 };
        let end = if idx == high { last.offset.min(len) } else { len };
        if start < end {
            ranges.insert(*node, (start, end));
        }
    }
    ranges
}

#[derive(Clone)]
struct LineSegment {
    text: String,
    style: Style,
}

#[derive(Clone)]
struct LineOutput {
    spans: Vec<LineSegment>,
    cursor: Option<u16>,
}

#[derive(Clone)]
struct Fragment {
    text: String,
    style: Style,
    kind: FragmentKind,
    width: usize,
    /// Cursor columns relative to the fragment start.
    events: Vec<usize>,
}

#[derive(Clone, Copy)]
enum FragmentKind {
    Word,
    Whitespace,
}

#[derive(Clone)]
enum FragmentItem {
    Token(Fragment),
    LineBreak,
}

fn push_cursor(fragments: &mut Vec<FragmentItem>, style: Style) {
    fragments.push(FragmentItem::Token(Fragment {
        text: String::new(),
        style,
        kind: FragmentKind::Word,
        width: 0,
        events: vec![0],
    }));
}

fn merge_style(base: Style, inline: InlineStyle) -> Style {
    match inline {
        InlineStyle::Bold => base.add_modifier(Modifier::BOLD),
        InlineStyle::Italic => base.add_modifier(Modifier::ITALIC),
        InlineStyle::Underline => base.add_modifier(Modifier::UNDERLINED),
        InlineStyle::Strikethrough => base.add_modifier(Modifier::CROSSED_OUT),
        InlineStyle::Code => base.fg(Color::Yellow),
    }
}

fn tokenize_text(
    text: &str,
    style: Style,
    cursor: Option<usize>,
    fragments: &mut Vec<FragmentItem>,
) {
    let mut builder: Option<TokenBuilder> = None;
    let mut pending_events = 0usize;
    let mut char_count = 0;
    for (idx, ch) in text.chars().enumerate() {
        char_count = idx + 1;
        if cursor == Some(idx) {
            pending_events += 1;
        }
        if ch == '\r' {
            continue;
        }
        if ch == '\n' {
            if let Some(mut token) = builder.take() {
                token.add_events(&mut pending_events);
                fragments.push(FragmentItem::Token(token.finish()));
            } else if pending_events > 0 {
                pending_events = 0;
                push_cursor(fragments, style);
            }
            fragments.push(FragmentItem::LineBreak);
            continue;
        }

        let tab = [' '; 4];
        let single = [ch];
        let expanded: &[char] = if ch == '\t' { &tab } else { &single };
        for actual in expanded {
            let is_whitespace = actual.is_whitespace();
            match builder.as_mut() {
                Some(current) if current.kind_matches(is_whitespace) => {
                    current.add_events(&mut pending_events);
                    current.push_char(*actual);
                }
                _ => {
                    if let Some(existing) = builder.take() {
                        fragments.push(FragmentItem::Token(existing.finish()));
                    }
                    let mut new_builder = TokenBuilder::new(style, is_whitespace);
                    new_builder.add_events(&mut pending_events);
                    new_builder.push_char(*actual);
                    builder = Some(new_builder);
                }
            }
        }
    }
    if cursor == Some(char_count) {
        pending_events += 1;
    }

    if let Some(mut token) = builder {
        token.add_events(&mut pending_events);
        fragments.push(FragmentItem::Token(token.finish()));
    } else if pending_events > 0 {
        push_cursor(fragments, style);
    }
}

struct TokenBuilder {
    text: String,
    style: Style,
    kind: FragmentKind,
    width: usize,
    events: Vec<usize>,
}

impl TokenBuilder {
    fn new(style: Style, is_whitespace: bool) -> Self {
        Self {
            text: String::new(),
            style,
            kind: if is_whitespace {
                FragmentKind::Whitespace
            } else {
                FragmentKind::Word
            },
            width: 0,
            events: Vec::new(),
        }
    }

    fn kind_matches(&self, is_whitespace: bool) -> bool {
        matches!(
            (self.kind, is_whitespace),
            (FragmentKind::Whitespace, true) | (FragmentKind::Word, false)
        )
    }

    fn add_events(&mut self, pending: &mut usize) {
        for _ in 0..*pending {
            self.events.push(self.width);
        }
        *pending = 0;
    }

    fn push_char(&mut self, ch: char) {
        self.text.push(ch);
        self.width += UnicodeWidthChar::width(ch).unwrap_or(0);
    }

    fn finish(self) -> Fragment {
        Fragment {
            text: self.text,
            style: self.style,
            kind: self.kind,
            width: self.width,
            events: self.events,
        }
    }
}

fn wrap_fragments(
    fragments: &[FragmentItem],
    first_prefix: &str,
    continuation_prefix: &str,
    width: usize,
) -> Vec<LineOutput> {
    let mut outputs = Vec::new();
    let mut builder = LineBuilder::new(first_prefix);
    let mut pending_whitespace: Vec<Fragment> = Vec::new();

    for fragment in fragments {
        match fragment {
            FragmentItem::LineBreak => {
                builder.consume_pending(&mut pending_whitespace);
                outputs.push(builder.build_line());
                builder = LineBuilder::new(continuation_prefix);
            }
            FragmentItem::Token(token) => match token.kind {
                FragmentKind::Whitespace => {
                    pending_whitespace.push(token.clone());
                }
                FragmentKind::Word => {
                    let whitespace_width: usize =
                        pending_whitespace.iter().map(|item| item.width).sum();
                    if token.width > 0
                        && builder.width > builder.prefix_width
                        && builder.width + whitespace_width + token.width > width
                    {
                        builder.settle_pending_at_wrap(&mut pending_whitespace);
                        outputs.push(builder.build_line());
                        builder = LineBuilder::new(continuation_prefix);
                    }

                    builder.consume_pending(&mut pending_whitespace);
                    builder.append_token(token.clone());
                }
            },
        }
    }

    builder.consume_pending(&mut pending_whitespace);
    outputs.push(builder.build_line());
    outputs
}

struct LineBuilder {
    segments: Vec<LineSegment>,
    cursor: Option<u16>,
    width: usize,
    prefix_width: usize,
}

impl LineBuilder {
    fn new(prefix: &str) -> Self {
        let prefix_width = visible_width(prefix);
        let mut segments = Vec::new();
        if !prefix.is_empty() {
            segments.push(LineSegment {
                text: prefix.to_string(),
                style: Style::default(),
            });
        }
        Self {
            segments,
            cursor: None,
            width: prefix_width,
            prefix_width,
        }
    }

    fn consume_pending(&mut self, pending_whitespace: &mut Vec<Fragment>) {
        for fragment in pending_whitespace.drain(..) {
            self.append_token(fragment);
        }
    }

    /// Whitespace at a soft wrap is dropped unless the cursor sits in it.
    fn settle_pending_at_wrap(&mut self, pending_whitespace: &mut Vec<Fragment>) {
        if pending_whitespace
            .iter()
            .any(|fragment| !fragment.events.is_empty())
        {
            self.consume_pending(pending_whitespace);
        } else {
            pending_whitespace.clear();
        }
    }

    fn append_token(&mut self, fragment: Fragment) {
        let start = self.width;
        if !fragment.text.is_empty() {
            self.segments.push(LineSegment {
                text: fragment.text,
                style: fragment.style,
            });
            self.width += fragment.width;
        }
        if let Some(offset) = fragment.events.first() {
            self.cursor = Some((start + offset) as u16);
        }
    }

    fn build_line(mut self) -> LineOutput {
        if self.segments.is_empty() {
            self.segments.push(LineSegment {
                text: String::new(),
                style: Style::default(),
            });
        }
        LineOutput {
            spans: self.segments,
            cursor: self.cursor,
        }
    }
}

fn visible_width(text: &str) -> usize {
    text.chars()
        .map(|ch| UnicodeWidthChar::width(ch).unwrap_or(0))
        .sum()
}

fn line_width(line: &Line<'_>) -> usize {
    line.spans
        .iter()
        .map(|span| visible_width(span.content.as_ref()))
        .sum()
}

fn underline_string(width: usize, ch: char) -> String {
    std::iter::repeat_n(ch, width.max(1)).collect()
}
