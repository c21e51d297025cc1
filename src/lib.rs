pub mod autoformat;
pub mod config;
pub mod convert;
pub mod editor;
pub mod error;
pub mod history;
pub mod logging;
pub mod plugin;
pub mod render;
pub mod schedule;
pub mod tree;

pub use config::EditorConfig;
pub use editor::{Editor, EditorHost, Key, Position, Selection};
pub use error::{EditError, EditResult, MarkupError};
