use pretty_assertions::assert_eq;

use super::test_support::{caret_in, editor_from, find_text, markup};
use super::*;
use crate::error::EditError;

fn item_of(editor: &Editor, needle: &str) -> NodeId {
    editor.tree().parent(find_text(editor, needle)).unwrap()
}

#[test]
fn toggle_list_wraps_paragraph_and_keeps_caret() {
    let mut editor = editor_from("<p>hello</p>");
    caret_in(&mut editor, "hello", 3);
    assert!(editor.toggle_list(false).unwrap());
    assert_eq!(markup(&editor), r#"<ul><li data-depth="1">hello</li></ul>"#);
    assert_eq!(editor.caret(), Some(Position::new(find_text(&editor, "hello"), 3)));
}

#[test]
fn toggle_list_of_other_type_retags_whole_list() {
    let mut editor = editor_from(r#"<ul><li>a</li><li data-checked="true">b</li></ul>"#);
    caret_in(&mut editor, "a", 0);
    assert!(editor.toggle_list(true).unwrap());
    assert_eq!(
        markup(&editor),
        concat!(
            r#"<ol data-checklist="true" data-progress="1/1"><li data-depth="1">a</li>"#,
            r#"<li data-depth="1" data-checked="true">b</li></ol>"#
        )
    );
}

#[test]
fn toggle_list_of_same_type_unwraps_item_and_splits_list() {
    let mut editor = editor_from("<ol><li>a</li><li>b</li><li>c</li></ol>");
    caret_in(&mut editor, "b", 1);
    assert!(editor.toggle_list(true).unwrap());
    assert_eq!(
        markup(&editor),
        r#"<ol><li data-depth="1">a</li></ol><p>b</p><ol><li data-depth="1">c</li></ol>"#
    );
    assert_eq!(editor.caret(), Some(Position::new(find_text(&editor, "b"), 1)));
}

#[test]
fn first_item_cannot_indent() {
    let mut editor = editor_from("<ul><li>a</li><li>b</li></ul>");
    let before = editor.to_markup();
    caret_in(&mut editor, "a", 0);
    assert!(!editor.can_indent());
    assert_eq!(editor.indent_item(), Err(EditError::FirstItemIndent));
    assert_eq!(editor.to_markup(), before);
}

#[test]
fn indent_past_the_limit_is_refused() {
    let config = EditorConfig {
        max_nesting: 2,
        ..EditorConfig::default()
    };
    let mut editor = Editor::new(config);
    editor
        .load_markup("<ul><li>a<ul><li>b</li><li>c</li></ul></li></ul>")
        .unwrap();
    caret_in(&mut editor, "c", 0);
    assert_eq!(editor.indent_item(), Err(EditError::MaxNesting { limit: 2 }));
}

#[test]
fn indent_joins_existing_sublist_and_inherits_checklist() {
    let mut editor = editor_from(concat!(
        r#"<ul><li data-checked="false">a<ul><li data-checked="true">a1</li></ul></li>"#,
        r#"<li data-checked="false">b</li></ul>"#
    ));
    caret_in(&mut editor, "b", 0);
    assert!(editor.indent_item().unwrap());
    assert_eq!(
        markup(&editor),
        concat!(
            r#"<ul data-checklist="true" data-progress="1/3">"#,
            r#"<li data-depth="1" data-checked="false">a"#,
            r#"<ul data-checklist="true" data-progress="1/2">"#,
            r#"<li data-depth="2" data-checked="true">a1</li>"#,
            r#"<li data-depth="2" data-checked="false">b</li></ul></li></ul>"#
        )
    );
}

#[test]
fn outdent_adopts_following_siblings() {
    let mut editor = editor_from("<ul><li>a<ul><li>b</li><li>c</li><li>d</li></ul></li></ul>");
    caret_in(&mut editor, "b", 0);
    assert!(editor.outdent_item().unwrap());
    assert_eq!(
        markup(&editor),
        concat!(
            r#"<ul><li data-depth="1">a</li><li data-depth="1">b<ul>"#,
            r#"<li data-depth="2">c</li><li data-depth="2">d</li></ul></li></ul>"#
        )
    );
}

#[test]
fn outdent_at_top_level_unwraps() {
    let mut editor = editor_from("<ul><li>a</li></ul>");
    caret_in(&mut editor, "a", 0);
    assert!(editor.outdent_item().unwrap());
    assert_eq!(markup(&editor), "<p>a</p>");
}

#[test]
fn enter_on_empty_nested_item_outdents() {
    let mut editor = editor_from("<ul><li>a<ul><li>b</li><li></li></ul></li></ul>");
    let root = editor.tree().root();
    let outer = editor.tree().children(root)[0];
    let a = editor.tree().children(outer)[0];
    let sublist = editor.tree().children(a)[1];
    let empty = editor.tree().children(sublist)[1];
    assert!(editor.position_at(empty, 0));
    assert!(editor.smart_enter().unwrap());
    assert_eq!(
        markup(&editor),
        concat!(
            r#"<ul><li data-depth="1">a<ul><li data-depth="2">b</li></ul></li>"#,
            r#"<li data-depth="1"><br></li></ul>"#
        )
    );
}

#[test]
fn enter_on_empty_top_level_item_leaves_the_list() {
    let mut editor = editor_from("<ul><li>a</li><li></li></ul>");
    let root = editor.tree().root();
    let list = editor.tree().children(root)[0];
    let empty = editor.tree().children(list)[1];
    assert!(editor.position_at(empty, 0));
    assert!(editor.smart_enter().unwrap());
    assert_eq!(markup(&editor), r#"<ul><li data-depth="1">a</li></ul><p><br></p>"#);
    let paragraph = editor.tree().children(root)[1];
    assert_eq!(editor.text_offset_in_block(paragraph), Some(0));
}

#[test]
fn enter_on_empty_middle_item_puts_paragraph_after_list() {
    let mut editor = editor_from("<ul><li>a</li><li></li><li>c</li></ul>");
    let root = editor.tree().root();
    let list = editor.tree().children(root)[0];
    let empty = editor.tree().children(list)[1];
    assert!(editor.position_at(empty, 0));
    assert!(editor.smart_enter().unwrap());
    assert_eq!(
        markup(&editor),
        r#"<ul><li data-depth="1">a</li><li data-depth="1">c</li></ul><p><br></p>"#
    );
    let paragraph = editor.tree().children(root)[1];
    assert_eq!(editor.caret(), Some(Position::new(paragraph, 0)));
}

#[test]
fn enter_on_empty_item_keeps_its_nested_items_in_the_list() {
    let mut editor = editor_from("<ol><li>a</li><li><ol><li>kid</li></ol></li><li>c</li></ol>");
    let root = editor.tree().root();
    let list = editor.tree().children(root)[0];
    let empty = editor.tree().children(list)[1];
    assert!(editor.position_at(empty, 0));
    assert!(editor.smart_enter().unwrap());
    assert_eq!(
        markup(&editor),
        concat!(
            r#"<ol><li data-depth="1">a</li><li data-depth="1">kid</li>"#,
            r#"<li data-depth="1">c</li></ol><p><br></p>"#
        )
    );
}

#[test]
fn enter_mid_item_moves_tail_and_sublist_and_checkbox() {
    let mut editor =
        editor_from(r#"<ul><li data-checked="true">headtail<ul><li>kid</li></ul></li></ul>"#);
    caret_in(&mut editor, "headtail", 4);
    assert!(editor.smart_enter().unwrap());
    assert_eq!(
        markup(&editor),
        concat!(
            r#"<ul data-checklist="true" data-progress="1/2">"#,
            r#"<li data-depth="1" data-checked="true">head</li>"#,
            r#"<li data-depth="1" data-checked="false">tail<ul><li data-depth="2">kid</li></ul></li></ul>"#
        )
    );
    assert_eq!(editor.caret(), Some(Position::new(find_text(&editor, "tail"), 0)));
}

#[test]
fn smart_enter_outside_lists_does_nothing() {
    let mut editor = editor_from("<p>text</p>");
    caret_in(&mut editor, "text", 2);
    assert_eq!(editor.smart_enter(), Ok(false));
}

#[test]
fn backspace_at_start_of_nested_item_outdents() {
    let mut editor = editor_from("<ul><li>a<ul><li>b</li></ul></li></ul>");
    caret_in(&mut editor, "b", 0);
    assert!(editor.smart_backspace().unwrap());
    assert_eq!(
        markup(&editor),
        r#"<ul><li data-depth="1">a</li><li data-depth="1">b</li></ul>"#
    );
}

#[test]
fn backspace_inside_item_text_is_not_structural() {
    let mut editor = editor_from("<ul><li>abc</li></ul>");
    caret_in(&mut editor, "abc", 2);
    assert_eq!(editor.smart_backspace(), Ok(false));
}

#[test]
fn remove_item_drops_its_subtree() {
    let mut editor = editor_from("<ul><li>a</li><li>b<ul><li>b1</li></ul></li><li>c</li></ul>");
    let b = item_of(&editor, "b");
    assert!(editor.remove_item(b).unwrap());
    assert_eq!(
        markup(&editor),
        r#"<ul><li data-depth="1">a</li><li data-depth="1">c</li></ul>"#
    );
    assert_eq!(editor.caret(), Some(Position::new(find_text(&editor, "a"), 1)));
    assert_eq!(editor.remove_item(b), Err(EditError::DetachedNode));
}

#[test]
fn drops_across_levels_are_refused() {
    let mut editor = editor_from("<ul><li>a<ul><li>a1</li></ul></li><li>b</li></ul>");
    let before = editor.to_markup();
    let nested = item_of(&editor, "a1");
    let b = item_of(&editor, "b");
    assert_eq!(
        editor.move_item(nested, b, DropPlacement::After),
        Err(EditError::CrossLevelDrop)
    );
    assert_eq!(editor.to_markup(), before);
}

#[test]
fn drop_after_reorders_siblings() {
    let mut editor = editor_from("<ol><li>a</li><li>b</li><li>c</li></ol>");
    let a = item_of(&editor, "a");
    let c = item_of(&editor, "c");
    assert!(editor.move_item(a, c, DropPlacement::After).unwrap());
    assert_eq!(
        markup(&editor),
        r#"<ol><li data-depth="1">b</li><li data-depth="1">c</li><li data-depth="1">a</li></ol>"#
    );
    assert_eq!(editor.move_item(a, a, DropPlacement::Before), Ok(false));
}

#[test]
fn outdent_appends_followers_to_the_existing_sublist() {
    let mut editor = editor_from(
        r#"<ul><li>a<ul><li>b<ol><li>kid</li></ol></li><li data-checked="true">c</li></ul></li></ul>"#,
    );
    caret_in(&mut editor, "b", 0);
    assert!(editor.outdent_item().unwrap());
    assert_eq!(
        markup(&editor),
        concat!(
            r#"<ul data-checklist="true" data-progress="1/1">"#,
            r#"<li data-depth="1">a</li><li data-depth="1">b"#,
            r#"<ol data-checklist="true" data-progress="1/1"><li data-depth="2">kid</li>"#,
            r#"<li data-depth="2" data-checked="true">c</li></ol></li></ul>"#
        )
    );
}
