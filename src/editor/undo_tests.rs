use std::time::Duration;

use pretty_assertions::assert_eq;

use super::test_support::{caret_in, clocked_editor, find_text, markup, type_text};
use super::*;

#[test]
fn captures_inside_the_debounce_window_are_skipped() {
    let (mut editor, clock) = clocked_editor("<p><br></p>");
    clock.advance(Duration::from_secs(1));
    type_text(&mut editor, "abc");
    assert_eq!(editor.history().len(), 2);

    clock.advance(Duration::from_secs(1));
    type_text(&mut editor, "d");
    assert_eq!(editor.history().len(), 3);

    assert!(editor.undo().unwrap());
    assert_eq!(markup(&editor), "<p>a</p>");
    assert!(editor.undo().unwrap());
    assert_eq!(markup(&editor), "<p><br></p>");
}

#[test]
fn undo_records_edits_still_inside_the_debounce_window() {
    let (mut editor, clock) = clocked_editor("<p>x</p>");
    caret_in(&mut editor, "x", 1);
    clock.advance(Duration::from_secs(1));
    editor.insert_text("1").unwrap();
    editor.insert_text("2").unwrap();
    assert_eq!(markup(&editor), "<p>x12</p>");

    assert!(editor.undo().unwrap());
    assert_eq!(markup(&editor), "<p>x1</p>");
    assert!(editor.redo().unwrap());
    assert_eq!(markup(&editor), "<p>x12</p>");
}

#[test]
fn undo_at_the_bottom_is_a_no_op() {
    let (mut editor, _clock) = clocked_editor("<p>only</p>");
    assert!(!editor.can_undo());
    assert_eq!(editor.undo(), Ok(false));
    assert_eq!(editor.redo(), Ok(false));
    assert_eq!(markup(&editor), "<p>only</p>");
}

#[test]
fn restore_puts_the_selection_back_once_settled() {
    let (mut editor, clock) = clocked_editor("<p>abc</p>");
    caret_in(&mut editor, "abc", 1);
    clock.advance(Duration::from_secs(1));
    editor.insert_text("Z").unwrap();
    clock.advance(Duration::from_secs(1));
    editor.insert_text("Y").unwrap();

    assert!(editor.undo().unwrap());
    assert_eq!(markup(&editor), "<p>aZbc</p>");
    assert!(editor.is_focused());
    editor.flush_deferred();
    assert_eq!(editor.caret(), Some(Position::new(find_text(&editor, "aZbc"), 2)));
    assert!(editor.history().is_capturing());
}

#[test]
fn edits_after_undo_drop_the_redo_branch() {
    let (mut editor, clock) = clocked_editor("<p>a</p>");
    caret_in(&mut editor, "a", 1);
    clock.advance(Duration::from_secs(1));
    editor.insert_text("b").unwrap();
    editor.undo().unwrap();
    editor.flush_deferred();

    clock.advance(Duration::from_secs(1));
    editor.insert_text("c").unwrap();
    assert!(!editor.can_redo());
    assert_eq!(markup(&editor), "<p>ac</p>");
    assert!(editor.undo().unwrap());
    assert_eq!(markup(&editor), "<p>a</p>");
}

#[test]
fn structural_edits_are_undoable() {
    let (mut editor, clock) = clocked_editor("<ul><li>a</li><li>b</li></ul>");
    let before = editor.to_markup();
    caret_in(&mut editor, "b", 0);
    clock.advance(Duration::from_secs(1));
    editor.indent_item().unwrap();
    assert_ne!(editor.to_markup(), before);
    assert!(editor.undo().unwrap());
    assert_eq!(editor.to_markup(), before);
}

#[test]
fn history_is_bounded() {
    let clock = crate::schedule::ManualClock::new();
    let mut config = EditorConfig::default();
    config.history.max_size = 3;
    let mut editor = Editor::new(config).with_clock(Box::new(clock.clone()));
    for ch in ['a', 'b', 'c', 'd', 'e'] {
        clock.advance(Duration::from_secs(1));
        editor.insert_text(&ch.to_string()).unwrap();
    }
    assert_eq!(editor.history().len(), 3);
    while editor.undo().unwrap() {}
    assert_eq!(markup(&editor), "<p>abc</p>");
}

/// Serializes to markup that can never be read back.
struct UnclosedBlock;

impl crate::plugin::BlockPlugin for UnclosedBlock {
    fn block_type(&self) -> &str {
        "unclosed"
    }

    fn render(&self, _payload: Option<&serde_json::Value>) -> String {
        "<div data-block=\"unclosed\">".to_string()
    }

    fn parse(&self, _element: &crate::tree::markup::MarkupElement) -> Option<serde_json::Value> {
        Some(serde_json::Value::Null)
    }
}

fn editor_with_unclosed_plugin(markup_source: &str) -> (Editor, crate::schedule::ManualClock) {
    let clock = crate::schedule::ManualClock::new();
    let mut plugins = crate::plugin::PluginRegistry::default();
    plugins.register(Box::new(UnclosedBlock));
    let mut editor = Editor::new(EditorConfig::default())
        .with_plugins(plugins)
        .with_clock(Box::new(clock.clone()));
    editor.load_markup(markup_source).unwrap();
    (editor, clock)
}

#[test]
fn failed_redo_keeps_index_and_document() {
    let (mut editor, clock) = editor_with_unclosed_plugin("<p>a</p>");
    caret_in(&mut editor, "a", 1);
    clock.advance(Duration::from_secs(1));
    editor.insert_custom_block("unclosed", None).unwrap();
    assert_eq!(editor.history().index(), 1);

    clock.advance(Duration::from_secs(1));
    assert!(editor.undo().unwrap());
    editor.flush_deferred();
    assert_eq!(markup(&editor), "<p>a</p>");
    assert_eq!(editor.history().index(), 0);

    assert!(matches!(
        editor.redo(),
        Err(crate::error::EditError::Markup(_))
    ));
    assert_eq!(editor.history().index(), 0);
    assert!(editor.can_redo());
    assert!(editor.history().is_capturing());
    assert_eq!(markup(&editor), "<p>a</p>");
}

#[test]
fn failed_undo_keeps_index_and_document() {
    let (mut editor, clock) =
        editor_with_unclosed_plugin("<div data-block=\"unclosed\"></div><p>a</p>");
    caret_in(&mut editor, "a", 1);
    clock.advance(Duration::from_secs(1));
    editor.insert_text("b").unwrap();
    let edited = editor.to_markup();
    let index = editor.history().index();
    assert_eq!(index, 1);

    assert!(matches!(
        editor.undo(),
        Err(crate::error::EditError::Markup(_))
    ));
    assert_eq!(editor.history().index(), index);
    assert!(editor.can_undo());
    assert_eq!(editor.to_markup(), edited);
}
