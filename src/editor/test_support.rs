use super::*;
use crate::schedule::ManualClock;

pub(crate) fn editor_from(markup: &str) -> Editor {
    let mut editor = Editor::new(EditorConfig::default());
    editor.load_markup(markup).unwrap();
    editor
}

/// Editor on a manual clock, for tests that care about debounce windows.
pub(crate) fn clocked_editor(markup: &str) -> (Editor, ManualClock) {
    let clock = ManualClock::new();
    let mut editor = Editor::new(EditorConfig::default()).with_clock(Box::new(clock.clone()));
    editor.load_markup(markup).unwrap();
    (editor, clock)
}

/// First text node containing `needle`.
pub(crate) fn find_text(editor: &Editor, needle: &str) -> NodeId {
    let root = editor.tree().root();
    editor
        .tree()
        .descendants(root)
        .into_iter()
        .find(|id| editor.tree().text(*id).is_some_and(|text| text.contains(needle)))
        .unwrap_or_else(|| panic!("no text node containing {needle:?}"))
}

/// Puts the caret `offset` chars into the text node containing `needle`.
pub(crate) fn caret_in(editor: &mut Editor, needle: &str, offset: usize) {
    let node = find_text(editor, needle);
    assert!(editor.set_selection(Selection::caret(Position::new(node, offset))));
}

pub(crate) fn select_in(editor: &mut Editor, needle: &str, start: usize, end: usize) {
    let node = find_text(editor, needle);
    assert!(editor.set_selection(Selection {
        start: Position::new(node, start),
        end: Position::new(node, end),
    }));
}

pub(crate) fn type_text(editor: &mut Editor, text: &str) {
    for ch in text.chars() {
        editor.handle_key(Key::Char(ch)).unwrap();
    }
}

/// Serialized document without the trailing newline of each block.
pub(crate) fn markup(editor: &Editor) -> String {
    editor.to_markup().replace('\n', "")
}
