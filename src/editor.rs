use tracing::{debug, warn};

use crate::config::EditorConfig;
use crate::error::MarkupError;
use crate::history::History;
use crate::plugin::{CommandRegistry, PluginRegistry};
use crate::schedule::{Clock, Delay, Scheduler, SystemClock};
use crate::tree::markup;
use crate::tree::{HeadingLevel, NodeId, NodeKind, Tree};

mod blocks;
mod checklist;
mod content;
mod cursor;
mod input;
mod inspect;
mod structure;
mod styles;
mod undo;

pub use cursor::{PathPoint, SavedSelection, SelectionSnapshot};
pub use input::Key;
pub use inspect::{DocumentStats, breadcrumbs_for_node};
pub use structure::DropPlacement;

pub(crate) use checklist::normalize_tree;
pub(crate) use content::{cleanup_inline, ensure_placeholder, is_inline_empty};

/// A point in the tree. For text nodes `offset` counts chars; for elements it
/// is a child index.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Position {
    pub node: NodeId,
    pub offset: usize,
}

impl Position {
    pub fn new(node: NodeId, offset: usize) -> Self {
        Self { node, offset }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Selection {
    pub start: Position,
    pub end: Position,
}

impl Selection {
    pub fn caret(position: Position) -> Self {
        Self {
            start: position,
            end: position,
        }
    }

    pub fn is_collapsed(&self) -> bool {
        self.start == self.end
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BlockTag {
    Paragraph,
    Heading1,
    Heading2,
    Heading3,
    Blockquote,
    CodeBlock,
}

impl BlockTag {
    pub fn kind(self) -> NodeKind {
        match self {
            BlockTag::Paragraph => NodeKind::Paragraph,
            BlockTag::Heading1 => NodeKind::Heading(HeadingLevel::One),
            BlockTag::Heading2 => NodeKind::Heading(HeadingLevel::Two),
            BlockTag::Heading3 => NodeKind::Heading(HeadingLevel::Three),
            BlockTag::Blockquote => NodeKind::Blockquote,
            BlockTag::CodeBlock => NodeKind::CodeBlock,
        }
    }

    pub fn from_kind(kind: &NodeKind) -> Option<Self> {
        match kind {
            NodeKind::Paragraph => Some(BlockTag::Paragraph),
            NodeKind::Heading(HeadingLevel::One) => Some(BlockTag::Heading1),
            NodeKind::Heading(HeadingLevel::Two) => Some(BlockTag::Heading2),
            NodeKind::Heading(HeadingLevel::Three) => Some(BlockTag::Heading3),
            NodeKind::Blockquote => Some(BlockTag::Blockquote),
            NodeKind::CodeBlock => Some(BlockTag::CodeBlock),
            _ => None,
        }
    }
}

/// Callbacks into whatever embeds the editor.
pub trait EditorHost {
    fn on_content_change(&mut self) {}
    fn on_reorder(&mut self) {}
}

pub struct NoopHost;

impl EditorHost for NoopHost {}

#[derive(Clone, Debug, PartialEq)]
enum DeferredTask {
    RestoreSelection(SelectionSnapshot),
    ResumeCapture,
}

pub struct Editor {
    tree: Tree,
    selection: Option<Selection>,
    focused: bool,
    config: EditorConfig,
    plugins: PluginRegistry,
    commands: CommandRegistry,
    history: History,
    scheduler: Scheduler<DeferredTask>,
    clock: Box<dyn Clock>,
    host: Box<dyn EditorHost>,
}

impl Editor {
    /// An editor holding a single empty paragraph.
    pub fn new(config: EditorConfig) -> Self {
        let history = History::new(&config.history);
        let mut editor = Self {
            tree: Tree::new(),
            selection: None,
            focused: true,
            config,
            plugins: PluginRegistry::with_builtins(),
            commands: CommandRegistry::with_builtins(),
            history,
            scheduler: Scheduler::default(),
            clock: Box::new(SystemClock),
            host: Box::new(NoopHost),
        };
        editor.ensure_document_initialized();
        editor.ensure_selection();
        editor.initialize_history();
        editor
    }

    pub fn with_plugins(mut self, plugins: PluginRegistry) -> Self {
        self.plugins = plugins;
        self
    }

    pub fn with_commands(mut self, commands: CommandRegistry) -> Self {
        self.commands = commands;
        self
    }

    pub fn with_host(mut self, host: Box<dyn EditorHost>) -> Self {
        self.host = host;
        self
    }

    /// Swaps the time source and starts history over, so debounce windows
    /// are measured against the new clock.
    pub fn with_clock(mut self, clock: Box<dyn Clock>) -> Self {
        self.clock = clock;
        self.initialize_history();
        self
    }

    /// Replaces the whole document with parsed markup. On a parse error the
    /// current document is kept.
    pub fn load_markup(&mut self, source: &str) -> Result<(), MarkupError> {
        let staging = self.tree.create(NodeKind::Root);
        if let Err(err) = markup::deserialize_into(&mut self.tree, staging, source, &self.plugins) {
            self.tree.remove(staging);
            return Err(err);
        }
        self.tree.clear();
        let root = self.tree.root();
        self.tree.move_children(staging, root);
        self.tree.remove(staging);
        self.finish_load();
        Ok(())
    }

    /// Replaces the document with an already built tree.
    pub fn load_tree(&mut self, tree: Tree) {
        self.tree = tree;
        self.finish_load();
    }

    fn finish_load(&mut self) {
        self.selection = None;
        self.scheduler = Scheduler::default();
        self.normalize_document();
        self.ensure_document_initialized();
        self.ensure_selection();
        self.initialize_history();
        debug!(nodes = self.tree.live_count(), "document loaded");
    }

    pub fn tree(&self) -> &Tree {
        &self.tree
    }

    /// Raw tree access for hosts that build content themselves. Call
    /// [`Editor::normalize`] afterwards.
    pub fn tree_mut(&mut self) -> &mut Tree {
        &mut self.tree
    }

    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    pub fn plugins(&self) -> &PluginRegistry {
        &self.plugins
    }

    pub fn plugins_mut(&mut self) -> &mut PluginRegistry {
        &mut self.plugins
    }

    pub fn commands(&self) -> &CommandRegistry {
        &self.commands
    }

    pub fn commands_mut(&mut self) -> &mut CommandRegistry {
        &mut self.commands
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn is_focused(&self) -> bool {
        self.focused
    }

    pub fn set_focused(&mut self, focused: bool) {
        self.focused = focused;
    }

    pub fn to_markup(&self) -> String {
        markup::serialize(&self.tree, &self.plugins)
    }

    /// Runs a registered slash command by id. Unknown ids are a no-op.
    pub fn run_command(&mut self, id: &str) -> crate::error::EditResult {
        let Some(command) = self.commands.get(id) else {
            warn!(id, "unknown command");
            return Ok(false);
        };
        let action = command.action;
        action(self)
    }

    /// Reconciles list structure, checklist state and placeholders.
    pub fn normalize(&mut self) {
        self.normalize_document();
        self.ensure_selection();
    }

    fn normalize_document(&mut self) {
        let max_nesting = self.config.max_nesting;
        normalize_tree(&mut self.tree, max_nesting);
    }

    /// Puts an empty paragraph into a document without blocks.
    fn ensure_document_initialized(&mut self) {
        let root = self.tree.root();
        if self.tree.child_count(root) > 0 {
            return;
        }
        let paragraph = self.tree.create(NodeKind::Paragraph);
        let placeholder = self.tree.create(NodeKind::LineBreak);
        self.tree.append_child(paragraph, placeholder);
        self.tree.append_child(root, paragraph);
    }

    /// Called after every successful mutation.
    fn commit(&mut self) {
        self.ensure_document_initialized();
        self.ensure_selection();
        self.host.on_content_change();
        self.capture_history(false);
    }

    // ========================================================================
    // Deferred work
    // ========================================================================

    fn schedule(&mut self, delay: Delay, task: DeferredTask) {
        let now = self.clock.now();
        let duration = delay.duration(&self.config.delays);
        self.scheduler.schedule(now, duration, task);
    }

    /// Runs every deferred task that is due. Hosts call this from their tick
    /// loop.
    pub fn run_deferred(&mut self) -> usize {
        let now = self.clock.now();
        let tasks = self.scheduler.take_due(now);
        let count = tasks.len();
        for task in tasks {
            self.run_task(task);
        }
        count
    }

    /// Runs every pending task regardless of its due time.
    pub fn flush_deferred(&mut self) -> usize {
        let tasks = self.scheduler.drain_all();
        let count = tasks.len();
        for task in tasks {
            self.run_task(task);
        }
        count
    }

    pub fn next_deferred_due(&self) -> Option<std::time::Instant> {
        self.scheduler.next_due()
    }

    fn run_task(&mut self, task: DeferredTask) {
        match task {
            DeferredTask::RestoreSelection(snapshot) => {
                if !self.restore_selection_snapshot(&snapshot) {
                    debug!("snapshot selection no longer resolves; keeping fallback caret");
                }
            }
            DeferredTask::ResumeCapture => self.history.set_capturing(true),
        }
    }
}

#[cfg(test)]
#[path = "editor/test_support.rs"]
mod test_support;

#[cfg(test)]
#[path = "editor_tests.rs"]
mod editor_tests;



#[cfg(test)]
#[path = "editor/style_tests.rs"]
mod style_tests;

#[cfg(test)]
#[path = "editor/structure_tests.rs"]
mod structure_tests;


#[cfg(test)]
#[path = "editor/input_tests.rs"]
mod input_tests;

#[cfg(test)]
#[path = "editor/undo_tests.rs"]
mod undo_tests;
