use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MarkupError {
    #[error("unexpected end of markup at byte {position}")]
    UnexpectedEof { position: usize },

    #[error("malformed tag at byte {position}")]
    MalformedTag { position: usize },

    #[error("closing tag </{found}> at byte {position} does not match <{expected}>")]
    MismatchedTag {
        expected: String,
        found: String,
        position: usize,
    },

    #[error("closing tag </{tag}> at byte {position} has no opening tag")]
    UnmatchedClose { tag: String, position: usize },

    #[error("tag <{tag}> is never closed (end of input at byte {position})")]
    UnclosedTag { tag: String, position: usize },
}

/// Reasons an editing operation was refused. None of these leave the tree
/// partially modified.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EditError {
    #[error("no live selection")]
    NoSelection,

    #[error("referenced node is no longer part of the document")]
    DetachedNode,

    #[error("list items cannot be retagged; leave the list first")]
    ListItemRetag,

    #[error("the first item of a list cannot be indented")]
    FirstItemIndent,

    #[error("nesting is limited to {limit} levels")]
    MaxNesting { limit: usize },

    #[error("items can only be reordered within their own list")]
    CrossLevelDrop,

    #[error("the caret is not inside a list")]
    NotInList,

    #[error("node has no parent to attach to")]
    MissingParent,

    #[error("snapshot could not be restored: {0}")]
    Markup(#[from] MarkupError),
}

pub type EditResult = Result<bool, EditError>;
