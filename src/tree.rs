use serde_json::Value;

pub mod markup;

pub const MAX_NESTING: usize = 6;

/// Stable handle into a [`Tree`]. A handle outlives its node: once the node is
/// removed the slot generation moves on and every lookup through the old
/// handle returns `None`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId {
    index: u32,
    generation: u32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum HeadingLevel {
    One,
    Two,
    Three,
}

impl HeadingLevel {
    pub fn number(self) -> u8 {
        match self {
            HeadingLevel::One => 1,
            HeadingLevel::Two => 2,
            HeadingLevel::Three => 3,
        }
    }

    pub fn from_number(level: u8) -> Option<Self> {
        match level {
            1 => Some(HeadingLevel::One),
            2 => Some(HeadingLevel::Two),
            3 => Some(HeadingLevel::Three),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum InlineStyle {
    Bold,
    Italic,
    Underline,
    Strikethrough,
    Code,
}

impl InlineStyle {
    pub const ALL: [InlineStyle; 5] = [
        InlineStyle::Bold,
        InlineStyle::Italic,
        InlineStyle::Underline,
        InlineStyle::Strikethrough,
        InlineStyle::Code,
    ];

    /// Lowercase name, also used as placeholder text for collapsed toggles.
    pub fn name(self) -> &'static str {
        match self {
            InlineStyle::Bold => "bold",
            InlineStyle::Italic => "italic",
            InlineStyle::Underline => "underline",
            InlineStyle::Strikethrough => "strikethrough",
            InlineStyle::Code => "code",
        }
    }

    pub fn tag(self) -> &'static str {
        match self {
            InlineStyle::Bold => "strong",
            InlineStyle::Italic => "em",
            InlineStyle::Underline => "u",
            InlineStyle::Strikethrough => "s",
            InlineStyle::Code => "code",
        }
    }

    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "strong" | "b" => Some(InlineStyle::Bold),
            "em" | "i" => Some(InlineStyle::Italic),
            "u" => Some(InlineStyle::Underline),
            "s" | "del" | "strike" => Some(InlineStyle::Strikethrough),
            "code" => Some(InlineStyle::Code),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum NodeKind {
    Root,
    Paragraph,
    Heading(HeadingLevel),
    Blockquote,
    CodeBlock,
    List { ordered: bool },
    ListItem,
    HorizontalRule,
    CustomBlock {
        block_type: String,
        payload: Option<Value>,
    },
    Text(String),
    Style(InlineStyle),
    LineBreak,
    Marker,
}

impl NodeKind {
    pub fn is_block(&self) -> bool {
        matches!(
            self,
            NodeKind::Paragraph
                | NodeKind::Heading(_)
                | NodeKind::Blockquote
                | NodeKind::CodeBlock
                | NodeKind::List { .. }
                | NodeKind::ListItem
                | NodeKind::HorizontalRule
                | NodeKind::CustomBlock { .. }
        )
    }

    pub fn is_inline(&self) -> bool {
        matches!(
            self,
            NodeKind::Text(_) | NodeKind::Style(_) | NodeKind::LineBreak | NodeKind::Marker
        )
    }

    /// Blocks whose tag can be swapped by block formatting.
    pub fn is_text_block(&self) -> bool {
        matches!(
            self,
            NodeKind::Paragraph | NodeKind::Heading(_) | NodeKind::Blockquote | NodeKind::CodeBlock
        )
    }

    /// Blocks that directly own inline content.
    pub fn holds_inline(&self) -> bool {
        self.is_text_block() || matches!(self, NodeKind::ListItem)
    }

    pub fn is_list(&self) -> bool {
        matches!(self, NodeKind::List { .. })
    }

    pub fn is_heading(&self) -> bool {
        matches!(self, NodeKind::Heading(_))
    }

    pub fn label(&self) -> &'static str {
        match self {
            NodeKind::Root => "Document",
            NodeKind::Paragraph => "Text",
            NodeKind::Heading(HeadingLevel::One) => "Heading 1",
            NodeKind::Heading(HeadingLevel::Two) => "Heading 2",
            NodeKind::Heading(HeadingLevel::Three) => "Heading 3",
            NodeKind::Blockquote => "Quote",
            NodeKind::CodeBlock => "Code",
            NodeKind::List { ordered: true } => "Ordered List",
            NodeKind::List { ordered: false } => "Unordered List",
            NodeKind::ListItem => "Item",
            NodeKind::HorizontalRule => "Rule",
            NodeKind::CustomBlock { .. } => "Block",
            NodeKind::Text(_) => "Text",
            NodeKind::Style(InlineStyle::Bold) => "Bold",
            NodeKind::Style(InlineStyle::Italic) => "Italic",
            NodeKind::Style(InlineStyle::Underline) => "Underline",
            NodeKind::Style(InlineStyle::Strikethrough) => "Strikethrough",
            NodeKind::Style(InlineStyle::Code) => "Code",
            NodeKind::LineBreak => "Break",
            NodeKind::Marker => "Marker",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Progress {
    pub checked: usize,
    pub total: usize,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Attributes {
    pub id: Option<String>,
    /// Present on checklist items; the value is the checked state.
    pub checkbox: Option<bool>,
    pub depth: Option<usize>,
    pub checklist: bool,
    pub progress: Option<Progress>,
}

#[derive(Clone, Debug)]
pub struct Node {
    pub kind: NodeKind,
    pub attrs: Attributes,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

impl Node {
    fn new(kind: NodeKind) -> Self {
        Self {
            kind,
            attrs: Attributes::default(),
            parent: None,
            children: Vec::new(),
        }
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }
}

struct Slot {
    generation: u32,
    node: Option<Node>,
}

pub struct Tree {
    slots: Vec<Slot>,
    free: Vec<u32>,
    root: NodeId,
}

impl Default for Tree {
    fn default() -> Self {
        Self::new()
    }
}

impl Tree {
    pub fn new() -> Self {
        let mut tree = Self {
            slots: Vec::new(),
            free: Vec::new(),
            root: NodeId {
                index: 0,
                generation: 0,
            },
        };
        tree.root = tree.create(NodeKind::Root);
        tree
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn get(&self, id: NodeId) -> Option<&Node> {
        let slot = self.slots.get(id.index as usize)?;
        if slot.generation != id.generation {
            return None;
        }
        slot.node.as_ref()
    }

    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        let slot = self.slots.get_mut(id.index as usize)?;
        if slot.generation != id.generation {
            return None;
        }
        slot.node.as_mut()
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.get(id).is_some()
    }

    pub fn kind(&self, id: NodeId) -> Option<&NodeKind> {
        self.get(id).map(|node| &node.kind)
    }

    pub fn attrs(&self, id: NodeId) -> Option<&Attributes> {
        self.get(id).map(|node| &node.attrs)
    }

    pub fn attrs_mut(&mut self, id: NodeId) -> Option<&mut Attributes> {
        self.get_mut(id).map(|node| &mut node.attrs)
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.get(id)?.parent
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        match self.get(id) {
            Some(node) => &node.children,
            None => &[],
        }
    }

    pub fn child_count(&self, id: NodeId) -> usize {
        self.children(id).len()
    }

    pub fn index_in_parent(&self, id: NodeId) -> Option<usize> {
        let parent = self.parent(id)?;
        self.children(parent).iter().position(|child| *child == id)
    }

    pub fn previous_sibling(&self, id: NodeId) -> Option<NodeId> {
        let parent = self.parent(id)?;
        let index = self.index_in_parent(id)?;
        if index == 0 {
            return None;
        }
        self.children(parent).get(index - 1).copied()
    }

    pub fn next_sibling(&self, id: NodeId) -> Option<NodeId> {
        let parent = self.parent(id)?;
        let index = self.index_in_parent(id)?;
        self.children(parent).get(index + 1).copied()
    }

    /// True when the node is reachable from the root.
    pub fn is_connected(&self, id: NodeId) -> bool {
        let mut current = id;
        loop {
            if current == self.root {
                return self.contains(current);
            }
            match self.parent(current) {
                Some(parent) => current = parent,
                None => return false,
            }
        }
    }

    pub fn ancestors(&self, id: NodeId) -> Ancestors<'_> {
        Ancestors {
            tree: self,
            next: self.parent(id),
        }
    }

    pub fn is_ancestor_of(&self, ancestor: NodeId, node: NodeId) -> bool {
        self.ancestors(node).any(|candidate| candidate == ancestor)
    }

    /// Pre-order descendants, excluding `id` itself.
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut result = Vec::new();
        let mut stack: Vec<NodeId> = self.children(id).iter().rev().copied().collect();
        while let Some(current) = stack.pop() {
            result.push(current);
            stack.extend(self.children(current).iter().rev().copied());
        }
        result
    }

    pub fn create(&mut self, kind: NodeKind) -> NodeId {
        let node = Node::new(kind);
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.node = Some(node);
            NodeId {
                index,
                generation: slot.generation,
            }
        } else {
            let index = self.slots.len() as u32;
            self.slots.push(Slot {
                generation: 0,
                node: Some(node),
            });
            NodeId {
                index,
                generation: 0,
            }
        }
    }

    pub fn create_text(&mut self, text: &str) -> NodeId {
        self.create(NodeKind::Text(text.to_string()))
    }

    /// Inserts a detached node under `parent`. The index is clamped to the
    /// child count. Refuses attached nodes, the root and cycles.
    pub fn insert_child(&mut self, parent: NodeId, index: usize, child: NodeId) -> bool {
        if child == self.root || child == parent || !self.contains(parent) {
            return false;
        }
        match self.get(child) {
            Some(node) if node.parent.is_none() => {}
            _ => return false,
        }
        if self.is_ancestor_of(child, parent) {
            return false;
        }
        let Some(parent_node) = self.get_mut(parent) else {
            return false;
        };
        let index = index.min(parent_node.children.len());
        parent_node.children.insert(index, child);
        if let Some(child_node) = self.get_mut(child) {
            child_node.parent = Some(parent);
        }
        true
    }

    pub fn append_child(&mut self, parent: NodeId, child: NodeId) -> bool {
        let index = self.child_count(parent);
        self.insert_child(parent, index, child)
    }

    pub fn insert_before(&mut self, reference: NodeId, node: NodeId) -> bool {
        let (Some(parent), Some(index)) = (self.parent(reference), self.index_in_parent(reference))
        else {
            return false;
        };
        self.insert_child(parent, index, node)
    }

    pub fn insert_after(&mut self, reference: NodeId, node: NodeId) -> bool {
        let (Some(parent), Some(index)) = (self.parent(reference), self.index_in_parent(reference))
        else {
            return false;
        };
        self.insert_child(parent, index + 1, node)
    }

    /// Unlinks a node from its parent; the node and its subtree stay alive.
    pub fn detach(&mut self, id: NodeId) -> bool {
        let Some(parent) = self.parent(id) else {
            return false;
        };
        if let Some(parent_node) = self.get_mut(parent) {
            parent_node.children.retain(|child| *child != id);
        }
        if let Some(node) = self.get_mut(id) {
            node.parent = None;
        }
        true
    }

    /// Detaches and frees a node together with its subtree.
    pub fn remove(&mut self, id: NodeId) -> bool {
        if id == self.root || !self.contains(id) {
            return false;
        }
        self.detach(id);
        let mut doomed = self.descendants(id);
        doomed.push(id);
        for node in doomed {
            self.free_slot(node);
        }
        true
    }

    fn free_slot(&mut self, id: NodeId) {
        let Some(slot) = self.slots.get_mut(id.index as usize) else {
            return;
        };
        if slot.generation != id.generation || slot.node.is_none() {
            return;
        }
        slot.node = None;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(id.index);
    }

    /// Puts `new` where `old` was. `old` ends up detached but alive. Nothing
    /// changes when either side is unusable.
    pub fn replace(&mut self, old: NodeId, new: NodeId) -> bool {
        let (Some(parent), Some(index)) = (self.parent(old), self.index_in_parent(old)) else {
            return false;
        };
        match self.get(new) {
            Some(node) if node.parent.is_none() => {}
            _ => return false,
        }
        if self.is_ancestor_of(new, old) || new == self.root {
            return false;
        }
        self.detach(old);
        if self.insert_child(parent, index, new) {
            true
        } else {
            self.insert_child(parent, index, old);
            false
        }
    }

    /// Moves every child of `from` to the end of `to`, preserving order.
    pub fn move_children(&mut self, from: NodeId, to: NodeId) -> usize {
        let children = self.children(from).to_vec();
        let mut moved = 0;
        for child in children {
            self.detach(child);
            if self.append_child(to, child) {
                moved += 1;
            }
        }
        moved
    }

    pub fn retag(&mut self, id: NodeId, kind: NodeKind) -> bool {
        match self.get_mut(id) {
            Some(node) if node.kind != NodeKind::Root => {
                node.kind = kind;
                true
            }
            _ => false,
        }
    }

    pub fn text(&self, id: NodeId) -> Option<&str> {
        match self.kind(id)? {
            NodeKind::Text(text) => Some(text.as_str()),
            _ => None,
        }
    }

    pub fn set_text(&mut self, id: NodeId, value: String) -> bool {
        match self.get_mut(id) {
            Some(Node {
                kind: NodeKind::Text(text),
                ..
            }) => {
                *text = value;
                true
            }
            _ => false,
        }
    }

    pub fn text_content(&self, id: NodeId) -> String {
        if let Some(text) = self.text(id) {
            return text.to_string();
        }
        let mut result = String::new();
        for node in self.descendants(id) {
            if let Some(text) = self.text(node) {
                result.push_str(text);
            }
        }
        result
    }

    pub fn char_len(&self, id: NodeId) -> usize {
        match self.text(id) {
            Some(text) => text.chars().count(),
            None => self.text_content(id).chars().count(),
        }
    }

    /// Splits a text node at a char offset, returning the new right-hand node
    /// that now follows it. The right node may be empty.
    pub fn split_text(&mut self, id: NodeId, offset: usize) -> Option<NodeId> {
        let text = self.text(id)?.to_string();
        self.parent(id)?;
        let (left, right) = split_at_char(&text, offset);
        let right_node = self.create_text(&right);
        self.set_text(id, left);
        if self.insert_after(id, right_node) {
            Some(right_node)
        } else {
            self.set_text(id, text);
            self.remove(right_node);
            None
        }
    }

    /// Frees every node below the root.
    pub fn clear(&mut self) {
        for child in self.children(self.root).to_vec() {
            self.remove(child);
        }
    }

    pub fn live_count(&self) -> usize {
        self.slots.iter().filter(|slot| slot.node.is_some()).count()
    }
}

pub struct Ancestors<'a> {
    tree: &'a Tree,
    next: Option<NodeId>,
}

impl Iterator for Ancestors<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let current = self.next?;
        self.next = self.tree.parent(current);
        Some(current)
    }
}

pub fn char_to_byte_idx(text: &str, char_idx: usize) -> usize {
    if char_idx == 0 {
        return 0;
    }
    for (count, (byte_idx, _)) in text.char_indices().enumerate() {
        if count == char_idx {
            return byte_idx;
        }
    }
    text.len()
}

pub fn split_at_char(text: &str, offset: usize) -> (String, String) {
    let byte_idx = char_to_byte_idx(text, offset);
    (text[..byte_idx].to_string(), text[byte_idx..].to_string())
}
