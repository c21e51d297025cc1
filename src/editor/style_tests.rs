use pretty_assertions::assert_eq;

use super::test_support::{caret_in, editor_from, find_text, markup, select_in};
use super::*;
use crate::error::EditError;
use crate::tree::InlineStyle;

#[test]
fn collapsed_caret_inserts_selected_placeholder() {
    let mut editor = editor_from("<p>ab</p>");
    caret_in(&mut editor, "ab", 1);
    assert!(editor.apply_inline_style(InlineStyle::Italic).unwrap());
    assert_eq!(markup(&editor), "<p>a<em>italic</em>b</p>");

    let placeholder = find_text(&editor, "italic");
    let selection = editor.selection().unwrap();
    assert_eq!(selection.start, Position::new(placeholder, 0));
    assert_eq!(selection.end, Position::new(placeholder, 6));
}

#[test]
fn typing_over_the_placeholder_keeps_the_style() {
    let mut editor = editor_from("<p><br></p>");
    let root = editor.tree().root();
    let block = editor.tree().children(root)[0];
    assert!(editor.position_at(block, 0));
    editor.apply_inline_style(InlineStyle::Bold).unwrap();
    editor.insert_text("x").unwrap();
    assert_eq!(markup(&editor), "<p><strong>x</strong></p>");
}

#[test]
fn collapsed_caret_inside_wrapper_unwraps_it() {
    let mut editor = editor_from("<p>a<strong>bold</strong>c</p>");
    caret_in(&mut editor, "bold", 2);
    assert!(editor.apply_inline_style(InlineStyle::Bold).unwrap());
    assert_eq!(markup(&editor), "<p>aboldc</p>");
    let text = find_text(&editor, "aboldc");
    assert_eq!(editor.caret(), Some(Position::new(text, 3)));
}

#[test]
fn range_across_wrapper_boundary_is_wrapped_whole() {
    let mut editor = editor_from("<p>one <strong>two</strong> three</p>");
    let one = find_text(&editor, "one");
    let three = find_text(&editor, "three");
    assert!(editor.set_selection(Selection {
        start: Position::new(one, 0),
        end: Position::new(three, 3),
    }));
    assert!(editor.apply_inline_style(InlineStyle::Bold).unwrap());
    assert_eq!(markup(&editor), "<p><strong>one two th</strong>ree</p>");
}

#[test]
fn range_inside_wrapper_of_other_style_nests() {
    let mut editor = editor_from("<p><em>slanted</em></p>");
    select_in(&mut editor, "slanted", 0, 4);
    assert!(editor.apply_inline_style(InlineStyle::Code).unwrap());
    assert_eq!(
        markup(&editor),
        "<p><code><em>slan</em></code><em>ted</em></p>"
    );
}

#[test]
fn backwards_range_is_handled_like_forward() {
    let mut editor = editor_from("<p>abcdef</p>");
    let text = find_text(&editor, "abcdef");
    assert!(editor.set_selection(Selection {
        start: Position::new(text, 4),
        end: Position::new(text, 1),
    }));
    assert!(editor.apply_inline_style(InlineStyle::Underline).unwrap());
    assert_eq!(markup(&editor), "<p>a<u>bcd</u>ef</p>");
}

#[test]
fn active_styles_report_nesting() {
    let mut editor = editor_from("<p><strong>a<s>b</s></strong></p>");
    caret_in(&mut editor, "b", 0);
    assert_eq!(
        editor.active_styles(),
        vec![InlineStyle::Bold, InlineStyle::Strikethrough]
    );
}

#[test]
fn style_without_selection_is_refused() {
    let mut editor = editor_from("<p>a</p>");
    let text = find_text(&editor, "a");
    editor.tree_mut().remove(text);
    assert_eq!(
        editor.apply_inline_style(InlineStyle::Bold),
        Err(EditError::NoSelection)
    );
}
