//! Style Module for Rain Compiler
//!
//! Scopes component styles by prefixing every selector with the component's
//! class (or id, for standalone style blocks), then renders the result as a
//! `<style>` tag or as a script that injects one.

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::css::Stylesheet;
use crate::error::Result;
use crate::parse::{is_remote_reference, render_attributes, Attributes};
use crate::script::{ScriptInput, ScriptRenderer, ScriptTag};

lazy_static! {
    static ref WHITESPACE_RE: Regex = Regex::new(r"\s+").unwrap();
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeMode {
    /// `.id selector`, used for component-local rendering.
    Class,
    /// `#id selector`, used when rendering a single style block on its own.
    Id,
}

impl ScopeMode {
    pub fn token(self, id: &str) -> String {
        match self {
            ScopeMode::Class => format!(".{}", id),
            ScopeMode::Id => format!("#{}", id),
        }
    }
}

pub fn collapse_whitespace(text: &str) -> String {
    WHITESPACE_RE.replace_all(text, " ").trim().to_string()
}

/// Prefix every selector of `css` with the scope token for `id`, joined by
/// a descendant combinator. Empty input scopes to empty output.
pub fn scope(css: &str, id: &str, mode: ScopeMode) -> Result<String> {
    if css.trim().is_empty() {
        return Ok(String::new());
    }

    let token = mode.token(id);
    let mut sheet = Stylesheet::parse(css)?;
    for block in sheet.declaration_blocks_mut() {
        for selector in block.selectors_mut() {
            let scoped = format!("{} {}", token, selector.text());
            selector.set_text(scoped);
        }
    }

    Ok(collapse_whitespace(&sheet.render()))
}

/// Standalone rendering of a single style block, scoped to an element id.
pub fn scope_standalone(css: &str, id: &str) -> Result<String> {
    scope(css, id, ScopeMode::Id)
}

/// Normalize without scoping.
pub fn normalize(css: &str) -> Result<String> {
    if css.trim().is_empty() {
        return Ok(String::new());
    }
    Ok(collapse_whitespace(&Stylesheet::parse(css)?.render()))
}

// ═══════════════════════════════════════════════════════════════════════════════
// STYLE RENDERING
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StyleOutput {
    /// A `<style>` tag.
    #[default]
    Tag,
    /// A script that appends the style (or a stylesheet link) to the document.
    Script,
}

pub struct StyleInput<'a> {
    pub attributes: &'a Attributes,
    pub content: &'a str,
    pub id: &'a str,
    pub scoped: bool,
}

pub trait StyleRenderer {
    fn render(&self, input: &StyleInput<'_>) -> String;
}

#[derive(Debug, Clone, Default)]
pub struct StyleTag {
    output: StyleOutput,
    base_path: String,
}

impl StyleTag {
    pub fn new(output: StyleOutput) -> Self {
        Self {
            output,
            base_path: String::new(),
        }
    }

    /// Prefix for external stylesheet references that are not full URLs.
    pub fn with_base_path(mut self, base_path: impl Into<String>) -> Self {
        self.base_path = base_path.into();
        self
    }

    fn css(&self, input: &StyleInput<'_>) -> String {
        let result = if input.scoped {
            scope(input.content, input.id, ScopeMode::Class)
        } else {
            normalize(input.content)
        };
        result.unwrap_or_else(|e| {
            log::warn!("[Rain] style of {} left unscoped: {}", input.id, e);
            collapse_whitespace(input.content)
        })
    }

    fn attributes(&self, input: &StyleInput<'_>) -> Attributes {
        let mut attributes = input.attributes.clone();
        attributes.shift_remove("scoped");
        if let Some(src) = attributes.get_mut("src") {
            if !self.base_path.is_empty() && !is_remote_reference(src) {
                *src = format!(
                    "{}/{}",
                    self.base_path.trim_end_matches('/'),
                    src.trim_start_matches('/')
                );
            }
        }
        if attributes.get("type").map_or(true, |t| t.is_empty()) {
            attributes.insert("type".to_string(), "text/css".to_string());
        }
        if input.scoped && !attributes.contains_key("data-rain-class") {
            attributes.insert("data-rain-class".to_string(), input.id.to_string());
        }
        attributes
    }

    fn render_script(&self, input: &StyleInput<'_>, css: &str) -> String {
        let external = input.attributes.contains_key("src");
        if css.is_empty() && !external {
            return String::new();
        }

        let tag = if external { "link" } else { "style" };
        let mut attributes = self.attributes(input);
        if external {
            if let Some(src) = attributes.shift_remove("src") {
                attributes.insert("href".to_string(), src);
            }
            attributes
                .entry("rel".to_string())
                .or_insert_with(|| "stylesheet".to_string());
        }

        let mut setters = String::new();
        for (key, value) in &attributes {
            setters.push_str(&format!(
                "elm.setAttribute({}, {});",
                js_string(key),
                js_string(value)
            ));
        }

        let fill = if external {
            String::new()
        } else {
            format!(
                "var styles = {};if (elm.styleSheet) {{ elm.styleSheet.cssText = styles; }} else {{ elm.appendChild(document.createTextNode(styles)); }}",
                js_string(css)
            )
        };

        let content = format!(
            "(function() {{ var elm = document.createElement(\"{tag}\");{setters}{fill}var s = document.getElementsByTagName(\"{tag}\");if (s.length) {{ s[0].parentNode.appendChild(elm); }} else {{ var head = document.getElementsByTagName(\"head\"); head.length && head[0].appendChild(elm); }} }}());",
            tag = tag,
            setters = setters,
            fill = fill,
        );

        let no_attributes = Attributes::new();
        ScriptTag.render(&ScriptInput {
            attributes: &no_attributes,
            content: &content,
            id: input.id,
        })
    }
}

impl StyleRenderer for StyleTag {
    fn render(&self, input: &StyleInput<'_>) -> String {
        let css = self.css(input);
        let external = input.attributes.contains_key("src");

        if self.output == StyleOutput::Script || external {
            return self.render_script(input, &css);
        }
        if css.is_empty() {
            return String::new();
        }
        format!("<style{}>{}</style>", render_attributes(&self.attributes(input)), css)
    }
}

fn js_string(text: &str) -> String {
    // A JSON string literal is a valid JS string literal; `</` is split so
    // the payload cannot close the surrounding script tag.
    serde_json::to_string(text)
        .unwrap_or_else(|_| "\"\"".to_string())
        .replace("</", "<\\/")
}
