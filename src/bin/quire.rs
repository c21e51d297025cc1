use std::{
    cell::Cell,
    env, fs, io,
    path::{Path, PathBuf},
    rc::Rc,
    time::{Duration, Instant},
};

use anyhow::{Context, Result, bail};
use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{
    Frame, Terminal,
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Position, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph},
};
use tracing::{debug, info, warn};

use quire::config::EditorConfig;
use quire::convert::{export_markdown, import_markdown};
use quire::editor::{Editor, EditorHost, Key};
use quire::error::EditResult;
use quire::logging;
use quire::render::{RenderResult, render_tree};
use quire::tree::{InlineStyle, NodeKind};

const STATUS_TIMEOUT: Duration = Duration::from_secs(4);
const TICK_RATE: Duration = Duration::from_millis(250);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum DocumentFormat {
    Native,
    Markdown,
}

impl DocumentFormat {
    fn from_path(path: &Path) -> Self {
        let ext = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_ascii_lowercase());
        match ext.as_deref() {
            Some("md") | Some("markdown") | Some("mkd") | Some("mdown") | Some("mdtxt") => {
                DocumentFormat::Markdown
            }
            _ => DocumentFormat::Native,
        }
    }
}

struct CliArgs {
    path: PathBuf,
    config_path: Option<PathBuf>,
    log_file: Option<PathBuf>,
}

fn parse_args() -> Result<Option<CliArgs>> {
    let mut path = None;
    let mut config_path = None;
    let mut log_file = None;
    let mut args = env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--config" => {
                let value = args.next().context("--config needs a path")?;
                config_path = Some(PathBuf::from(value));
            }
            "--log-file" => {
                let value = args.next().context("--log-file needs a path")?;
                log_file = Some(PathBuf::from(value));
            }
            flag if flag.starts_with("--") => bail!("unknown option {flag}"),
            _ => path = Some(PathBuf::from(arg)),
        }
    }
    Ok(path.map(|path| CliArgs {
        path,
        config_path,
        log_file,
    }))
}

fn main() -> Result<()> {
    run()
}

fn editor_wrap_configuration(width: usize) -> (usize, usize) {
    if width == 0 {
        return (1, 0);
    }
    if width < 60 {
        let wrap_width = width.saturating_sub(1).max(1);
        return (wrap_width, 0);
    }
    if width < 100 {
        let padding = 2.min(width / 2);
        let wrap_width = width.saturating_sub(padding.saturating_mul(2)).max(1);
        return (wrap_width, padding);
    }
    let mut left_padding = width.saturating_sub(100) / 2 + 4;
    let max_padding = width.saturating_sub(1) / 2;
    if left_padding > max_padding {
        left_padding = max_padding;
    }
    let wrap_width = width.saturating_sub(left_padding.saturating_mul(2)).max(1);
    (wrap_width, left_padding)
}

fn run() -> Result<()> {
    let Some(args) = parse_args()? else {
        eprintln!("Usage: quire [--config <path>] [--log-file <path>] <file>");
        return Ok(());
    };

    let log_guard = logging::init(args.log_file.clone())?;
    info!(log_file = %log_guard.log_file.display(), "quire starting");

    let config = load_config(args.config_path.as_deref())?;
    let dirty = Rc::new(Cell::new(false));
    let (editor, format, initial_status) = load_document(&args.path, config, dirty.clone())?;
    let mut app = App::new(editor, dirty, args.path, format, initial_status);

    enable_raw_mode().context("failed to enable raw mode")?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen).context("failed to initialize terminal")?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend).context("failed to create terminal backend")?;
    terminal.clear().ok();

    let res = run_app(&mut terminal, &mut app).context("application error");

    disable_raw_mode().ok();
    execute!(terminal.backend_mut(), LeaveAlternateScreen).ok();
    terminal.show_cursor().ok();

    if let Err(err) = &res {
        warn!("exiting with error: {err:#}");
    }
    res
}

fn load_config(explicit: Option<&Path>) -> Result<EditorConfig> {
    let path = match explicit {
        Some(path) => path.to_path_buf(),
        None => match EditorConfig::default_path() {
            Some(path) => path,
            None => return Ok(EditorConfig::default()),
        },
    };
    let config = EditorConfig::load_from_path(&path)?;
    debug!(path = %path.display(), found = config.is_some(), "configuration loaded");
    Ok(config.unwrap_or_default())
}

/// Marks the document dirty whenever the editor commits a change.
struct DirtyTracker {
    dirty: Rc<Cell<bool>>,
}

impl EditorHost for DirtyTracker {
    fn on_content_change(&mut self) {
        self.dirty.set(true);
    }

    fn on_reorder(&mut self) {
        debug!("list items reordered");
    }
}

fn load_document(
    path: &Path,
    config: EditorConfig,
    dirty: Rc<Cell<bool>>,
) -> Result<(Editor, DocumentFormat, Option<String>)> {
    let format = DocumentFormat::from_path(path);
    let mut editor = Editor::new(config).with_host(Box::new(DirtyTracker { dirty }));
    if !path.exists() {
        return Ok((editor, format, Some("New document".to_string())));
    }

    let content =
        fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    let loaded = match format {
        DocumentFormat::Native => editor.load_markup(&content).map_err(anyhow::Error::from),
        DocumentFormat::Markdown => import_markdown(&content).map(|tree| editor.load_tree(tree)),
    };
    match loaded {
        Ok(()) => {
            info!(path = %path.display(), ?format, "document opened");
            Ok((editor, format, None))
        }
        Err(err) => {
            warn!(path = %path.display(), "parse error: {err:#}");
            let message = format!("Parse error: {err}. Starting with empty document.");
            Ok((editor, format, Some(message)))
        }
    }
}

fn run_app<B: ratatui::backend::Backend>(terminal: &mut Terminal<B>, app: &mut App) -> Result<()> {
    let mut last_tick = Instant::now();
    let mut needs_redraw = true;

    while !app.should_quit {
        if needs_redraw {
            terminal
                .draw(|frame| app.draw(frame))
                .context("failed to draw frame")?;
            needs_redraw = false;
        }

        let mut timeout = TICK_RATE
            .checked_sub(last_tick.elapsed())
            .unwrap_or_else(|| Duration::from_secs(0));
        if let Some(due) = app.editor.next_deferred_due() {
            timeout = timeout.min(due.saturating_duration_since(Instant::now()));
        }

        if event::poll(timeout).context("event poll failed")? {
            let evt = event::read().context("failed to read event")?;
            app.handle_event(evt)?;
            needs_redraw = true;
        }

        if app.editor.run_deferred() > 0 {
            needs_redraw = true;
        }

        if last_tick.elapsed() >= TICK_RATE {
            let had_message_before = app.status_message.is_some();
            app.prune_status_message();
            last_tick = Instant::now();
            if had_message_before && app.status_message.is_none() {
                needs_redraw = true;
            }
        }
    }

    Ok(())
}

fn is_palette_shortcut(code: KeyCode, modifiers: KeyModifiers) -> bool {
    matches!(code, KeyCode::Char(' ')) && modifiers.contains(KeyModifiers::CONTROL)
}

/// Slash-command palette state. The query filters the editor's command
/// registry by prefix.
struct PaletteState {
    query: String,
    selected_index: usize,
}

impl PaletteState {
    fn new() -> Self {
        Self {
            query: String::new(),
            selected_index: 0,
        }
    }

    fn move_selection(&mut self, delta: i32, len: usize) {
        if len == 0 {
            self.selected_index = 0;
            return;
        }
        let idx = (self.selected_index as i32 + delta).rem_euclid(len as i32);
        self.selected_index = idx as usize;
    }
}

struct App {
    editor: Editor,
    dirty: Rc<Cell<bool>>,
    file_path: PathBuf,
    document_format: DocumentFormat,
    scroll_top: usize,
    should_quit: bool,
    status_message: Option<(String, Instant)>,
    palette: Option<PaletteState>,
    last_viewport_height: usize,
    last_cursor: Option<(usize, u16)>,
}

impl App {
    fn new(
        editor: Editor,
        dirty: Rc<Cell<bool>>,
        path: PathBuf,
        format: DocumentFormat,
        initial_status: Option<String>,
    ) -> Self {
        Self {
            editor,
            dirty,
            file_path: path,
            document_format: format,
            scroll_top: 0,
            should_quit: false,
            status_message: initial_status.map(|msg| (msg, Instant::now())),
            palette: None,
            last_viewport_height: 0,
            last_cursor: None,
        }
    }

    fn set_status(&mut self, message: impl Into<String>) {
        self.status_message = Some((message.into(), Instant::now()));
    }

    /// Shows refused edits in the status bar.
    fn report(&mut self, result: EditResult) {
        if let Err(err) = result {
            self.set_status(err.to_string());
        }
    }

    fn draw(&mut self, frame: &mut Frame) {
        let area = frame.area();
        if area.height == 0 || area.width == 0 {
            return;
        }

        let vertical = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Min(1), Constraint::Length(1)])
            .split(area);
        let editor_area = vertical[0];
        let status_area = vertical[1];

        let (wrap_width, left_padding) = editor_wrap_configuration(editor_area.width as usize);
        let text_area = Rect::new(
            editor_area.x + left_padding as u16,
            editor_area.y,
            editor_area.width.saturating_sub(left_padding as u16),
            editor_area.height,
        );

        let render = render_tree(self.editor.tree(), wrap_width, self.editor.selection());
        let viewport_height = text_area.height as usize;
        self.adjust_scroll(&render, viewport_height);
        self.last_viewport_height = viewport_height;
        self.last_cursor = render.cursor.map(|cursor| (cursor.line, cursor.column));

        let paragraph = Paragraph::new(Text::from(render.lines.clone()))
            .block(Block::default().borders(Borders::NONE))
            .scroll((self.scroll_top as u16, 0));
        frame.render_widget(paragraph, text_area);

        if let Some(cursor) = render.cursor
            && self.palette.is_none()
            && cursor.line >= self.scroll_top
            && cursor.line < self.scroll_top + viewport_height
            && text_area.width > 0
        {
            let cursor_y = text_area.y + (cursor.line - self.scroll_top) as u16;
            let cursor_x = text_area.x + cursor.column.min(text_area.width - 1);
            frame.set_cursor_position(Position::new(cursor_x, cursor_y));
        }

        let status_line = self.status_line(status_area.width as usize);
        let status_widget = Paragraph::new(status_line)
            .block(Block::default().borders(Borders::NONE))
            .style(Style::default().bg(Color::Blue).fg(Color::White));
        frame.render_widget(status_widget, status_area);

        if self.palette.is_some() {
            self.render_palette(frame, area);
        }
    }

    fn render_palette(&self, frame: &mut Frame, area: Rect) {
        let Some(palette) = &self.palette else {
            return;
        };
        if area.width < 3 || area.height < 3 {
            return;
        }

        let commands = self.editor.commands().filter(&palette.query);
        let label_width = commands
            .iter()
            .map(|command| command.label.chars().count() + command.id.len() + 3)
            .max()
            .unwrap_or(0)
            .max(palette.query.chars().count() + 2)
            .max(16);
        let width = (label_width as u16 + 4).min(area.width);
        let height = (commands.len() as u16 + 3).min(area.height).max(3);
        let popup_area = Rect::new(
            area.x + (area.width.saturating_sub(width)) / 2,
            area.y + (area.height.saturating_sub(height)) / 2,
            width,
            height,
        );
        frame.render_widget(Clear, popup_area);

        let popup_style = Style::default().bg(Color::Black).fg(Color::White);
        let mut items = vec![ListItem::new(Line::from(Span::styled(
            format!("/{}", palette.query),
            popup_style.add_modifier(Modifier::BOLD),
        )))];
        for command in &commands {
            items.push(ListItem::new(Line::from(vec![
                Span::raw(command.label),
                Span::styled(
                    format!("  /{}", command.id),
                    Style::default().fg(Color::DarkGray),
                ),
            ])));
        }

        let mut state = ListState::default();
        if !commands.is_empty() {
            state.select(Some(palette.selected_index.min(commands.len() - 1) + 1));
        }

        let list = List::new(items)
            .highlight_style(Style::default().bg(Color::White).fg(Color::Black))
            .style(popup_style)
            .block(
                Block::default()
                    .title("Commands")
                    .borders(Borders::ALL)
                    .style(popup_style)
                    .border_style(Style::default().fg(Color::Gray)),
            );
        frame.render_stateful_widget(list, popup_area, &mut state);
    }

    fn open_palette(&mut self) {
        self.palette = Some(PaletteState::new());
    }

    fn close_palette(&mut self) {
        self.palette = None;
    }

    fn handle_palette_key(&mut self, code: KeyCode, modifiers: KeyModifiers) {
        let Some(palette) = self.palette.as_mut() else {
            return;
        };
        let matches = self.editor.commands().filter(&palette.query).len();
        match code {
            KeyCode::Esc => self.close_palette(),
            KeyCode::Char(' ') if modifiers.contains(KeyModifiers::CONTROL) => self.close_palette(),
            KeyCode::Up => palette.move_selection(-1, matches),
            KeyCode::Down => palette.move_selection(1, matches),
            KeyCode::Backspace => {
                if palette.query.pop().is_none() {
                    self.close_palette();
                } else {
                    palette.selected_index = 0;
                }
            }
            KeyCode::Enter => {
                let id = self
                    .editor
                    .commands()
                    .filter(&palette.query)
                    .get(palette.selected_index)
                    .map(|command| command.id);
                self.close_palette();
                if let Some(id) = id {
                    let result = self.editor.run_command(id);
                    self.report(result);
                }
            }
            KeyCode::Char(ch) if !modifiers.contains(KeyModifiers::CONTROL) => {
                palette.query.push(ch);
                palette.selected_index = 0;
            }
            _ => {}
        }
    }

    fn status_line(&mut self, terminal_width: usize) -> Line<'static> {
        self.prune_status_message();

        let position = self.cursor_position_text();
        if let Some((message, _)) = &self.status_message {
            return Line::from(vec![
                Span::raw(format!("{} ", position)),
                Span::raw(message.clone()),
            ]);
        }

        let filename = self.file_path.display().to_string();
        let marker = if self.dirty.get() { "*" } else { "" };
        let breadcrumbs = self.breadcrumbs_text();
        let stats = self.editor.document_stats();

        let all_shortcuts = vec!["^Z:Undo", "^ :Cmds", "^S:Save", "^Q:Quit"];

        let mut spans = Vec::new();
        spans.push(Span::styled(position, Style::default().fg(Color::White)));
        spans.push(Span::raw(" "));
        spans.push(Span::styled(
            format!("{}{}", filename, marker),
            Style::default().fg(Color::Yellow),
        ));
        if !breadcrumbs.is_empty() {
            spans.push(Span::raw(" "));
            spans.push(Span::styled(breadcrumbs, Style::default().fg(Color::White)));
        }
        if let Some(progress) = self.editor.caret_list_progress() {
            spans.push(Span::raw(format!(" [{}/{}]", progress.checked, progress.total)));
        }
        spans.push(Span::raw(format!(
            ", {} words, {} chars",
            stats.words, stats.chars
        )));

        let left_width: usize = spans.iter().map(|span| span.content.chars().count()).sum();

        // Most important shortcuts are kept when space runs out.
        let min_padding = 1;
        let mut shortcuts_to_show = Vec::new();
        let mut shortcuts_width = 0;
        for shortcut in all_shortcuts.iter().rev() {
            let test_width = if shortcuts_to_show.is_empty() {
                shortcut.chars().count()
            } else {
                shortcuts_width + 1 + shortcut.chars().count()
            };
            if left_width + min_padding + test_width <= terminal_width {
                shortcuts_to_show.insert(0, *shortcut);
                shortcuts_width = test_width;
            } else {
                break;
            }
        }

        let shortcuts_text = shortcuts_to_show.join(" ");
        if !shortcuts_text.is_empty() {
            let padding_needed = terminal_width
                .saturating_sub(left_width)
                .saturating_sub(shortcuts_width)
                .max(min_padding);
            spans.push(Span::raw(" ".repeat(padding_needed)));
            spans.push(Span::styled(
                shortcuts_text,
                Style::default().fg(Color::White),
            ));
        }

        Line::from(spans)
    }

    fn prune_status_message(&mut self) {
        if let Some((_, instant)) = &self.status_message
            && instant.elapsed() > STATUS_TIMEOUT
        {
            self.status_message = None;
        }
    }

    fn adjust_scroll(&mut self, render: &RenderResult, viewport_height: usize) {
        let viewport = viewport_height.max(1);
        let max_scroll = render.total_lines.saturating_sub(viewport);
        if self.scroll_top > max_scroll {
            self.scroll_top = max_scroll;
        }
        if let Some(cursor) = render.cursor {
            self.scroll_top = self.scroll_top_for_cursor(cursor.line, viewport, max_scroll);
        }
    }

    fn scroll_top_for_cursor(
        &self,
        cursor_line: usize,
        viewport: usize,
        max_scroll: usize,
    ) -> usize {
        let mut scroll = self.scroll_top.min(max_scroll);
        if viewport == 0 {
            return scroll;
        }

        let margin = if viewport >= 3 { 1 } else { 0 };
        let top_limit = scroll.saturating_add(margin);
        let bottom_offset = viewport.saturating_sub(1).saturating_sub(margin);
        let bottom_limit = scroll.saturating_add(bottom_offset);
        if cursor_line < top_limit {
            scroll = cursor_line.saturating_sub(margin);
        } else if cursor_line > bottom_limit {
            scroll = cursor_line.saturating_sub(bottom_offset);
        }

        scroll.min(max_scroll)
    }

    fn caret_block_is_empty(&self) -> bool {
        let Some(caret) = self.editor.caret() else {
            return false;
        };
        let tree = self.editor.tree();
        let container = std::iter::once(caret.node)
            .chain(tree.ancestors(caret.node))
            .find(|id| tree.kind(*id).is_some_and(NodeKind::holds_inline));
        container.is_some_and(|container| {
            tree.children(container)
                .iter()
                .all(|child| match tree.kind(*child) {
                    Some(NodeKind::Text(text)) => text.is_empty(),
                    Some(NodeKind::LineBreak | NodeKind::Marker) => true,
                    Some(kind) => kind.is_list(),
                    None => true,
                })
        })
    }

    fn handle_event(&mut self, event: Event) -> Result<()> {
        let Event::Key(KeyEvent {
            code,
            modifiers,
            kind: KeyEventKind::Press,
            ..
        }) = event
        else {
            return Ok(());
        };

        if self.palette.is_some() {
            self.handle_palette_key(code, modifiers);
            return Ok(());
        }

        if is_palette_shortcut(code, modifiers) {
            self.open_palette();
            return Ok(());
        }

        let ctrl = modifiers.contains(KeyModifiers::CONTROL);
        let shift = modifiers.contains(KeyModifiers::SHIFT);
        let alt = modifiers.contains(KeyModifiers::ALT);

        match code {
            KeyCode::Char('q') | KeyCode::Char('c') if ctrl => self.should_quit = true,
            KeyCode::Char('s') if ctrl => self.save()?,
            KeyCode::Char('z') if ctrl => {
                let result = self.editor.undo();
                self.report(result);
            }
            KeyCode::Char('y') if ctrl => {
                let result = self.editor.redo();
                self.report(result);
            }
            KeyCode::Char('b') if ctrl => self.apply_style(InlineStyle::Bold),
            KeyCode::Char('i') if alt => self.apply_style(InlineStyle::Italic),
            KeyCode::Char('u') if ctrl => self.apply_style(InlineStyle::Underline),
            KeyCode::Char('k') if ctrl => self.apply_style(InlineStyle::Code),
            KeyCode::Char('x') if alt => self.apply_style(InlineStyle::Strikethrough),
            KeyCode::Char('x') if ctrl => {
                let result = self.editor.toggle_item_checked();
                self.report(result);
            }
            KeyCode::Char(']') if ctrl => {
                let result = self.editor.indent_item();
                self.report(result);
            }
            KeyCode::Char('[') if ctrl => {
                let result = self.editor.outdent_item();
                self.report(result);
            }
            KeyCode::Char('/') if !ctrl && !alt && self.caret_block_is_empty() => {
                self.open_palette();
            }
            KeyCode::Left if shift => {
                self.editor.extend_selection(false);
            }
            KeyCode::Right if shift => {
                self.editor.extend_selection(true);
            }
            KeyCode::Left if ctrl => self.send_key(Key::WordLeft),
            KeyCode::Right if ctrl => self.send_key(Key::WordRight),
            KeyCode::Left => self.send_key(Key::Left),
            KeyCode::Right => self.send_key(Key::Right),
            KeyCode::Up => self.send_key(Key::Up),
            KeyCode::Down => self.send_key(Key::Down),
            KeyCode::Home => self.send_key(Key::Home),
            KeyCode::End => self.send_key(Key::End),
            KeyCode::PageUp => {
                self.scroll_top = self.scroll_top.saturating_sub(self.last_viewport_height);
            }
            KeyCode::PageDown => {
                self.scroll_top += self.last_viewport_height;
            }
            KeyCode::Enter => self.send_key(Key::Enter),
            KeyCode::Backspace => self.send_key(Key::Backspace),
            KeyCode::Delete => {
                if self.editor.move_right() {
                    self.send_key(Key::Backspace);
                }
            }
            KeyCode::Tab => self.send_key(Key::Tab),
            KeyCode::BackTab => self.send_key(Key::BackTab),
            KeyCode::Char(ch) if !ctrl && !alt => self.send_key(Key::Char(ch)),
            _ => {}
        }
        Ok(())
    }

    fn send_key(&mut self, key: Key) {
        let result = self.editor.handle_key(key);
        self.report(result);
    }

    fn apply_style(&mut self, style: InlineStyle) {
        let result = self.editor.apply_inline_style(style);
        self.report(result);
    }

    fn save(&mut self) -> Result<()> {
        let contents = match self.document_format {
            DocumentFormat::Native => self.editor.to_markup(),
            DocumentFormat::Markdown => export_markdown(self.editor.tree())?,
        };
        fs::write(&self.file_path, contents)
            .with_context(|| format!("failed to write {}", self.file_path.display()))?;

        self.dirty.set(false);
        info!(path = %self.file_path.display(), "document saved");
        self.set_status("Saved");
        Ok(())
    }

    fn cursor_position_text(&self) -> String {
        match self.last_cursor {
            Some((line, column)) => format!("{}:{}", line + 1, usize::from(column) + 1),
            None => "?:?".to_string(),
        }
    }

    fn breadcrumbs_text(&self) -> String {
        match self.editor.breadcrumbs() {
            Some(labels) if !labels.is_empty() => labels.join(" > "),
            _ => String::new(),
        }
    }
}
