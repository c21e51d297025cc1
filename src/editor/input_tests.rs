use pretty_assertions::assert_eq;
use rstest::rstest;

use super::test_support::{caret_in, editor_from, find_text, markup, select_in, type_text};
use super::*;

#[test]
fn insert_text_drops_newlines_and_placeholders() {
    let mut editor = Editor::new(EditorConfig::default());
    assert!(editor.insert_text("a\nb").unwrap());
    assert_eq!(markup(&editor), "<p>ab</p>");
    assert_eq!(editor.insert_text("\n"), Ok(false));
}

#[test]
fn insert_text_replaces_selection() {
    let mut editor = editor_from("<p>hello world</p>");
    select_in(&mut editor, "hello", 0, 5);
    editor.insert_text("goodbye").unwrap();
    assert_eq!(markup(&editor), "<p>goodbye world</p>");
    assert_eq!(editor.caret(), Some(Position::new(find_text(&editor, "goodbye"), 7)));
}

#[test]
fn insert_after_a_wrapper_extends_following_text() {
    let mut editor = editor_from("<p><strong>a</strong>b</p>");
    let root = editor.tree().root();
    let block = editor.tree().children(root)[0];
    assert!(editor.position_at(block, 1));
    editor.insert_text("x").unwrap();
    assert_eq!(markup(&editor), "<p><strong>a</strong>xb</p>");
}

#[test]
fn backspace_deletes_one_char_across_wrappers() {
    let mut editor = editor_from("<p>ab<em>c</em>d</p>");
    caret_in(&mut editor, "d", 0);
    assert!(editor.delete_backward().unwrap());
    assert_eq!(markup(&editor), "<p>abd</p>");
    assert!(editor.delete_backward().unwrap());
    assert_eq!(markup(&editor), "<p>ad</p>");
}

#[test]
fn backspace_at_paragraph_start_joins_previous_block() {
    let mut editor = editor_from("<h2>title</h2><p>body</p>");
    caret_in(&mut editor, "body", 0);
    assert!(editor.delete_backward().unwrap());
    assert_eq!(markup(&editor), "<h2>titlebody</h2>");
    assert_eq!(editor.caret(), Some(Position::new(find_text(&editor, "titlebody"), 5)));
}

#[test]
fn backspace_at_heading_start_reverts_to_paragraph() {
    let mut editor = editor_from("<p>a</p><h1>big</h1>");
    caret_in(&mut editor, "big", 0);
    assert!(editor.delete_backward().unwrap());
    assert_eq!(markup(&editor), "<p>a</p><p>big</p>");
}

#[test]
fn backspace_after_rule_removes_it() {
    let mut editor = editor_from("<p>a</p><hr><p>b</p>");
    caret_in(&mut editor, "b", 0);
    assert!(editor.delete_backward().unwrap());
    assert_eq!(markup(&editor), "<p>a</p><p>b</p>");
}

#[test]
fn paragraph_joins_last_item_of_previous_list() {
    let mut editor = editor_from("<ul><li>a<ul><li>deep</li></ul></li></ul><p>tail</p>");
    caret_in(&mut editor, "tail", 0);
    assert!(editor.delete_backward().unwrap());
    assert_eq!(
        markup(&editor),
        r#"<ul><li data-depth="1">a<ul><li data-depth="2">deeptail</li></ul></li></ul>"#
    );
}

#[test]
fn enter_splits_paragraphs_and_ends_headings() {
    let mut editor = editor_from("<h1>headline</h1>");
    caret_in(&mut editor, "headline", 4);
    assert!(editor.handle_key(Key::Enter).unwrap());
    assert_eq!(markup(&editor), "<h1>head</h1><p>line</p>");
    assert_eq!(editor.caret(), Some(Position::new(find_text(&editor, "line"), 0)));

    caret_in(&mut editor, "line", 4);
    assert!(editor.handle_key(Key::Enter).unwrap());
    assert_eq!(markup(&editor), "<h1>head</h1><p>line</p><p><br></p>");
}

#[test]
fn tab_outside_lists_is_ignored() {
    let mut editor = editor_from("<p>text</p>");
    caret_in(&mut editor, "text", 0);
    assert_eq!(editor.handle_key(Key::Tab), Ok(false));
    assert_eq!(editor.handle_key(Key::BackTab), Ok(false));
}

#[test]
fn tab_and_shift_tab_nest_items() {
    let mut editor = editor_from("<ul><li>a</li><li>b</li></ul>");
    caret_in(&mut editor, "b", 1);
    assert!(editor.handle_key(Key::Tab).unwrap());
    assert_eq!(
        markup(&editor),
        r#"<ul><li data-depth="1">a<ul><li data-depth="2">b</li></ul></li></ul>"#
    );
    assert!(editor.handle_key(Key::BackTab).unwrap());
    assert_eq!(
        markup(&editor),
        r#"<ul><li data-depth="1">a</li><li data-depth="1">b</li></ul>"#
    );
}

#[rstest]
#[case("- ", r#"<ul><li data-depth="1"><br></li></ul>"#)]
#[case("1. ", r#"<ol><li data-depth="1"><br></li></ol>"#)]
#[case(
    "[ ] ",
    r#"<ul data-checklist="true" data-progress="0/1"><li data-depth="1" data-checked="false"><br></li></ul>"#
)]
#[case(
    "[x] ",
    r#"<ul data-checklist="true" data-progress="1/1"><li data-depth="1" data-checked="true"><br></li></ul>"#
)]
#[case("## ", "<h2><br></h2>")]
#[case("> ", "<blockquote><br></blockquote>")]
#[case("```", "<pre><br></pre>")]
#[case("---", "<hr><p><br></p>")]
fn line_prefixes_become_blocks(#[case] typed: &str, #[case] expected: &str) {
    let mut editor = Editor::new(EditorConfig::default());
    type_text(&mut editor, typed);
    assert_eq!(markup(&editor), expected);
}

#[test]
fn checklist_prefix_inside_item_adds_checkbox() {
    let mut editor = editor_from("<ul><li>a</li></ul>");
    caret_in(&mut editor, "a", 1);
    editor.handle_key(Key::Enter).unwrap();
    type_text(&mut editor, "[ ] task");
    assert_eq!(
        markup(&editor),
        concat!(
            r#"<ul data-checklist="true" data-progress="0/1"><li data-depth="1">a</li>"#,
            r#"<li data-depth="1" data-checked="false">task</li></ul>"#
        )
    );
}

#[test]
fn list_prefix_inside_item_stays_text() {
    let mut editor = editor_from("<ul><li>a</li></ul>");
    caret_in(&mut editor, "a", 1);
    editor.handle_key(Key::Enter).unwrap();
    type_text(&mut editor, "- x");
    assert_eq!(
        markup(&editor),
        r#"<ul><li data-depth="1">a</li><li data-depth="1">- x</li></ul>"#
    );
}

#[test]
fn no_autoformat_inside_code_blocks() {
    let mut editor = editor_from("<pre><br></pre>");
    type_text(&mut editor, "**x** # ");
    assert_eq!(markup(&editor), "<pre>**x** # </pre>");
}

#[test]
fn autoformat_inside_same_style_only_drops_delimiters() {
    let mut editor = editor_from("<p><strong>x **y**</strong></p>");
    caret_in(&mut editor, "**y**", 7);
    editor.handle_key(Key::Char(' ')).unwrap();
    assert_eq!(markup(&editor), "<p><strong>x y </strong></p>");
}

#[test]
fn autoformat_inside_other_style_still_wraps() {
    let mut editor = editor_from("<p><strong>x *y*</strong></p>");
    caret_in(&mut editor, "*y*", 5);
    editor.handle_key(Key::Char(' ')).unwrap();
    assert_eq!(markup(&editor), "<p><strong>x <em>y</em> </strong></p>");
}

#[test]
fn enter_closes_inline_markdown_before_splitting() {
    let mut editor = Editor::new(EditorConfig::default());
    type_text(&mut editor, "a `b`");
    editor.handle_key(Key::Enter).unwrap();
    assert_eq!(markup(&editor), "<p>a <code>b</code></p><p><br></p>");
}

#[test]
fn arrows_cross_block_boundaries() {
    let mut editor = editor_from("<p>ab</p><p>cd</p>");
    caret_in(&mut editor, "ab", 2);
    assert!(editor.handle_key(Key::Right).unwrap());
    assert_eq!(editor.caret(), Some(Position::new(find_text(&editor, "cd"), 0)));
    assert!(editor.handle_key(Key::Left).unwrap());
    assert_eq!(editor.caret(), Some(Position::new(find_text(&editor, "ab"), 2)));
    assert!(editor.handle_key(Key::Home).unwrap());
    assert_eq!(editor.caret(), Some(Position::new(find_text(&editor, "ab"), 0)));
    assert!(!editor.handle_key(Key::Left).unwrap());
    assert!(editor.handle_key(Key::Down).unwrap());
    assert_eq!(editor.caret(), Some(Position::new(find_text(&editor, "cd"), 0)));
    assert!(editor.handle_key(Key::End).unwrap());
    assert_eq!(editor.caret(), Some(Position::new(find_text(&editor, "cd"), 2)));
}

#[test]
fn word_moves_skip_whitespace() {
    let mut editor = editor_from("<p>one two three</p>");
    caret_in(&mut editor, "one", 0);
    editor.handle_key(Key::WordRight).unwrap();
    assert_eq!(editor.text_offset_in_block(editor.tree().children(editor.tree().root())[0]), Some(4));
    editor.handle_key(Key::End).unwrap();
    editor.handle_key(Key::WordLeft).unwrap();
    assert_eq!(editor.text_offset_in_block(editor.tree().children(editor.tree().root())[0]), Some(8));
}

#[test]
fn extending_selection_keeps_the_anchor() {
    let mut editor = editor_from("<p>abc</p>");
    caret_in(&mut editor, "abc", 1);
    assert!(editor.extend_selection(true));
    assert!(editor.extend_selection(true));
    let text = find_text(&editor, "abc");
    assert_eq!(
        editor.selection(),
        Some(Selection {
            start: Position::new(text, 1),
            end: Position::new(text, 3),
        })
    );
    assert_eq!(editor.focus(), Some(Position::new(text, 3)));
    assert!(!editor.extend_selection(true));
    assert!(editor.delete_selection().unwrap());
    assert_eq!(markup(&editor), "<p>a</p>");
}
