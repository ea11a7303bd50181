use crate::parse::{render_attributes, Attributes};

pub struct ScriptInput<'a> {
    pub attributes: &'a Attributes,
    pub content: &'a str,
    pub id: &'a str,
}

pub trait ScriptRenderer {
    fn render(&self, input: &ScriptInput<'_>) -> String;
}

/// Emits a plain `<script>` tag. Empty content without an external `src`
/// renders nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScriptTag;

impl ScriptRenderer for ScriptTag {
    fn render(&self, input: &ScriptInput<'_>) -> String {
        let content = input.content.trim();
        if content.is_empty() && !input.attributes.contains_key("src") {
            return String::new();
        }
        format!(
            "<script{}>{}</script>",
            render_attributes(input.attributes),
            content
        )
    }
}
