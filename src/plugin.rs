//! Custom block plugins and slash commands.
//!
//! Both registries are owned by an [`Editor`](crate::editor::Editor) instance;
//! nothing here is process-global.

use std::collections::HashMap;

use html_escape::{encode_double_quoted_attribute, encode_text};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::editor::{BlockTag, Editor};
use crate::error::EditResult;
use crate::tree::InlineStyle;
use crate::tree::markup::MarkupElement;

/// Render/parse contract for an opaque custom block.
///
/// `render` must escape every untrusted field and must not fail on a missing
/// payload. `parse` returns `None` when required attributes are absent.
pub trait BlockPlugin {
    fn block_type(&self) -> &str;
    fn render(&self, payload: Option<&Value>) -> String;
    fn parse(&self, element: &MarkupElement) -> Option<Value>;
}

#[derive(Default)]
pub struct PluginRegistry {
    plugins: HashMap<String, Box<dyn BlockPlugin>>,
}

impl PluginRegistry {
    pub fn with_builtins() -> Self {
        let mut registry = Self::default();
        registry.register(Box::new(ImagePlugin));
        registry.register(Box::new(NoteLinkPlugin));
        registry
    }

    /// Registers a plugin, replacing any previous plugin of the same type.
    pub fn register(&mut self, plugin: Box<dyn BlockPlugin>) -> Option<Box<dyn BlockPlugin>> {
        self.plugins
            .insert(plugin.block_type().to_string(), plugin)
    }

    pub fn get(&self, block_type: &str) -> Option<&dyn BlockPlugin> {
        self.plugins.get(block_type).map(|plugin| plugin.as_ref())
    }

    pub fn types(&self) -> Vec<&str> {
        let mut types: Vec<&str> = self.plugins.keys().map(String::as_str).collect();
        types.sort_unstable();
        types
    }
}

fn invalid_block(block_type: &str) -> String {
    format!(
        "<div data-block=\"{}\" data-invalid=\"true\">Invalid {} block</div>",
        encode_double_quoted_attribute(block_type),
        encode_text(block_type)
    )
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ImagePayload {
    pub src: String,
    #[serde(default)]
    pub alt: String,
}

pub struct ImagePlugin;

impl BlockPlugin for ImagePlugin {
    fn block_type(&self) -> &str {
        "image"
    }

    fn render(&self, payload: Option<&Value>) -> String {
        let Some(image) = payload.and_then(|value| ImagePayload::deserialize(value).ok()) else {
            return invalid_block(self.block_type());
        };
        let src = encode_double_quoted_attribute(&image.src);
        let alt = encode_double_quoted_attribute(&image.alt);
        format!(
            "<div data-block=\"image\" data-src=\"{src}\" data-alt=\"{alt}\"><img src=\"{src}\" alt=\"{alt}\"></div>"
        )
    }

    fn parse(&self, element: &MarkupElement) -> Option<Value> {
        let src = element.attr("data-src")?;
        let alt = element.attr("data-alt").unwrap_or_default();
        serde_json::to_value(ImagePayload {
            src: src.to_string(),
            alt: alt.to_string(),
        })
        .ok()
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NoteLinkPayload {
    pub note_id: String,
    pub title: String,
}

pub struct NoteLinkPlugin;

impl BlockPlugin for NoteLinkPlugin {
    fn block_type(&self) -> &str {
        "note-link"
    }

    fn render(&self, payload: Option<&Value>) -> String {
        let Some(link) = payload.and_then(|value| NoteLinkPayload::deserialize(value).ok())
        else {
            return invalid_block(self.block_type());
        };
        format!(
            "<div data-block=\"note-link\" data-note-id=\"{}\" data-title=\"{}\">{}</div>",
            encode_double_quoted_attribute(&link.note_id),
            encode_double_quoted_attribute(&link.title),
            encode_text(&link.title)
        )
    }

    fn parse(&self, element: &MarkupElement) -> Option<Value> {
        let note_id = element.attr("data-note-id")?;
        let title = element
            .attr("data-title")
            .map(str::to_string)
            .unwrap_or_else(|| element.text_content());
        serde_json::to_value(NoteLinkPayload {
            note_id: note_id.to_string(),
            title,
        })
        .ok()
    }
}

// ============================================================================
// Slash commands
// ============================================================================

pub type CommandAction = fn(&mut Editor) -> EditResult;

#[derive(Clone)]
pub struct SlashCommand {
    pub id: &'static str,
    pub label: &'static str,
    pub action: CommandAction,
}

#[derive(Clone, Default)]
pub struct CommandRegistry {
    commands: Vec<SlashCommand>,
}

impl CommandRegistry {
    pub fn with_builtins() -> Self {
        let mut registry = Self::default();
        let builtins: [SlashCommand; 12] = [
            SlashCommand {
                id: "text",
                label: "Text",
                action: |editor| editor.apply_block_format(BlockTag::Paragraph),
            },
            SlashCommand {
                id: "h1",
                label: "Heading 1",
                action: |editor| editor.apply_block_format(BlockTag::Heading1),
            },
            SlashCommand {
                id: "h2",
                label: "Heading 2",
                action: |editor| editor.apply_block_format(BlockTag::Heading2),
            },
            SlashCommand {
                id: "h3",
                label: "Heading 3",
                action: |editor| editor.apply_block_format(BlockTag::Heading3),
            },
            SlashCommand {
                id: "quote",
                label: "Quote",
                action: |editor| editor.apply_block_format(BlockTag::Blockquote),
            },
            SlashCommand {
                id: "code",
                label: "Code Block",
                action: |editor| editor.apply_block_format(BlockTag::CodeBlock),
            },
            SlashCommand {
                id: "bullet",
                label: "Bulleted List",
                action: |editor| editor.toggle_list(false),
            },
            SlashCommand {
                id: "numbered",
                label: "Numbered List",
                action: |editor| editor.toggle_list(true),
            },
            SlashCommand {
                id: "todo",
                label: "Checklist",
                action: |editor| editor.toggle_checklist(),
            },
            SlashCommand {
                id: "divider",
                label: "Divider",
                action: |editor| editor.insert_horizontal_rule(),
            },
            SlashCommand {
                id: "bold",
                label: "Bold",
                action: |editor| editor.apply_inline_style(InlineStyle::Bold),
            },
            SlashCommand {
                id: "italic",
                label: "Italic",
                action: |editor| editor.apply_inline_style(InlineStyle::Italic),
            },
        ];
        for command in builtins {
            registry.register(command);
        }
        registry
    }

    /// Adds a command. A command with the same id is replaced in place.
    pub fn register(&mut self, command: SlashCommand) {
        if let Some(existing) = self
            .commands
            .iter_mut()
            .find(|existing| existing.id == command.id)
        {
            *existing = command;
        } else {
            self.commands.push(command);
        }
    }

    pub fn get(&self, id: &str) -> Option<&SlashCommand> {
        self.commands.iter().find(|command| command.id == id)
    }

    pub fn all(&self) -> &[SlashCommand] {
        &self.commands
    }

    /// Commands whose id or label starts with `query`, ignoring ASCII case.
    pub fn filter(&self, query: &str) -> Vec<&SlashCommand> {
        let query = query.trim().to_ascii_lowercase();
        self.commands
            .iter()
            .filter(|command| {
                query.is_empty()
                    || command.id.starts_with(&query)
                    || command.label.to_ascii_lowercase().starts_with(&query)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::markup::{MarkupNode, parse};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn first_element(source: &str) -> MarkupElement {
        match parse(source).unwrap().into_iter().next() {
            Some(MarkupNode::Element(element)) => element,
            other => panic!("expected element, got {other:?}"),
        }
    }

    #[test]
    fn image_render_escapes_untrusted_fields() {
        let markup = ImagePlugin.render(Some(&json!({
            "src": "a.png\" onerror=\"x",
            "alt": "<script>",
        })));
        assert!(!markup.contains("onerror=\"x"));
        assert!(!markup.contains("<script>"));
    }

    #[test]
    fn image_render_and_parse_agree() {
        let payload = json!({"src": "cat.png", "alt": "A cat"});
        let element = first_element(&ImagePlugin.render(Some(&payload)));
        assert_eq!(ImagePlugin.parse(&element), Some(payload));
    }

    #[test]
    fn missing_payload_renders_placeholder() {
        let markup = NoteLinkPlugin.render(None);
        assert!(markup.contains("data-invalid=\"true\""));
        let element = first_element(&markup);
        assert_eq!(NoteLinkPlugin.parse(&element), None);
    }

    #[test]
    fn parse_without_required_attribute_returns_none() {
        let element = first_element("<div data-block=\"image\" data-alt=\"x\"></div>");
        assert_eq!(ImagePlugin.parse(&element), None);
    }

    #[test]
    fn command_filter_matches_id_and_label_prefixes() {
        let registry = CommandRegistry::with_builtins();
        let ids: Vec<&str> = registry.filter("head").iter().map(|c| c.id).collect();
        assert_eq!(ids, vec!["h1", "h2", "h3"]);
        let ids: Vec<&str> = registry.filter("TO").iter().map(|c| c.id).collect();
        assert_eq!(ids, vec!["todo"]);
        assert_eq!(registry.filter("").len(), registry.all().len());
    }

    #[test]
    fn registering_same_type_replaces_plugin() {
        let mut registry = PluginRegistry::with_builtins();
        assert!(registry.register(Box::new(ImagePlugin)).is_some());
        assert_eq!(registry.types(), vec!["image", "note-link"]);
    }
}
