//! Template rendering.
//!
//! The engine only depends on [`TemplateRenderer`]. [`MustacheRenderer`] is
//! the default: `{{ expr }}` inserts an HTML-escaped value, `{{{ expr }}}`
//! the raw value, where `expr` is a dotted data path or a method call,
//! optionally piped through filters: `{{ title | upper | truncate(10) }}`.

use lazy_static::lazy_static;
use regex::{Captures, Regex};
use serde_json::Value;

use crate::model::{Data, Model};
use crate::parse::{render_attributes, Attributes};

lazy_static! {
    static ref BINDING_RE: Regex =
        Regex::new(r"(?s)\{\{\{\s*(.+?)\s*\}\}\}|\{\{\s*(.+?)\s*\}\}").unwrap();
    static ref CALL_RE: Regex = Regex::new(r"(?s)^([A-Za-z_$][\w$]*)\s*\((.*)\)$").unwrap();
}

pub struct TemplateInput<'a> {
    pub attributes: &'a Attributes,
    pub content: &'a str,
    /// Stable component id, also the scoping class.
    pub id: &'a str,
    pub scoped: bool,
}

pub trait TemplateRenderer {
    /// Substitute bindings in `input.content` using the model's data and
    /// methods. Methods may mutate `model.data`.
    fn render(&self, input: &TemplateInput<'_>, model: &mut Model) -> String;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct MustacheRenderer;

impl TemplateRenderer for MustacheRenderer {
    fn render(&self, input: &TemplateInput<'_>, model: &mut Model) -> String {
        let html = BINDING_RE
            .replace_all(input.content, |caps: &Captures| {
                if let Some(raw) = caps.get(1) {
                    display(&evaluate(raw.as_str(), model))
                } else {
                    escape_html(&display(&evaluate(&caps[2], model)))
                }
            })
            .into_owned();

        if !input.scoped {
            return html;
        }

        // Tag the component root so descendant selectors scoped to the id
        // match the component's own top-level elements.
        let mut attributes = input.attributes.clone();
        let class = match attributes.shift_remove("class") {
            Some(existing) if !existing.trim().is_empty() => {
                format!("{} {}", input.id, existing.trim())
            }
            _ => input.id.to_string(),
        };
        attributes.insert("class".to_string(), class);
        format!("<div{}>{}</div>", render_attributes(&attributes), html)
    }
}

fn evaluate(expr: &str, model: &mut Model) -> Value {
    let mut stages = split_top_level(expr, '|').into_iter();
    let mut value = match stages.next() {
        Some(head) => call_or_operand(head, model),
        None => Value::Null,
    };

    for stage in stages {
        let stage = stage.trim();
        let (name, args) = match CALL_RE.captures(stage) {
            Some(caps) => (
                caps.get(1).map_or("", |m| m.as_str()),
                arguments(&caps[2], &model.data),
            ),
            None => (stage, Vec::new()),
        };
        value = match model.filter(name, value.clone(), &args) {
            Some(filtered) => filtered,
            None => {
                log::debug!("[Rain] template uses unknown filter '{}'", name);
                value
            }
        };
    }
    value
}

fn arguments(text: &str, data: &Data) -> Vec<Value> {
    split_top_level(text, ',')
        .into_iter()
        .map(|arg| operand(arg, data))
        .collect()
}

fn call_or_operand(expr: &str, model: &mut Model) -> Value {
    let expr = expr.trim();
    if let Some(caps) = CALL_RE.captures(expr) {
        let args = arguments(&caps[2], &model.data);
        return match model.call(&caps[1], &args) {
            Some(value) => value,
            None => {
                log::debug!("[Rain] template calls unknown method '{}'", &caps[1]);
                Value::Null
            }
        };
    }
    operand(expr, &model.data)
}

/// A literal (`'str'`, `"str"`, number, `true`, `false`, `null`) or a data path.
fn operand(token: &str, data: &Data) -> Value {
    let token = token.trim();
    let quoted = token.len() >= 2
        && ((token.starts_with('\'') && token.ends_with('\''))
            || (token.starts_with('"') && token.ends_with('"')));
    if quoted {
        return Value::String(token[1..token.len() - 1].to_string());
    }
    let literal = matches!(token, "true" | "false" | "null")
        || token.starts_with(|c: char| c.is_ascii_digit() || c == '-');
    if literal {
        if let Ok(value) = serde_json::from_str(token) {
            return value;
        }
    }
    lookup(data, token).cloned().unwrap_or(Value::Null)
}

/// Resolve `a.b.0` against nested objects and arrays.
pub fn lookup<'d>(data: &'d Data, path: &str) -> Option<&'d Value> {
    let mut segments = path.split('.').map(str::trim);
    let mut current = data.get(segments.next()?)?;
    for segment in segments {
        current = match current {
            Value::Object(map) => map.get(segment)?,
            Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}

/// Split on `separator` outside quotes and parentheses.
fn split_top_level(text: &str, separator: char) -> Vec<&str> {
    let mut args = Vec::new();
    let mut quote: Option<char> = None;
    let mut depth = 0usize;
    let mut start = 0;

    for (i, c) in text.char_indices() {
        match quote {
            Some(q) if c == q => quote = None,
            Some(_) => {}
            None if c == '\'' || c == '"' => quote = Some(c),
            None if c == '(' => depth += 1,
            None if c == ')' => depth = depth.saturating_sub(1),
            None if c == separator && depth == 0 => {
                args.push(&text[start..i]);
                start = i + 1;
            }
            None => {}
        }
    }
    if !text[start..].trim().is_empty() || !args.is_empty() {
        args.push(&text[start..]);
    }
    args
}

pub fn display(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        other => other.to_string(),
    }
}

pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            c => escaped.push(c),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::data_from;
    use serde_json::json;
    use std::rc::Rc;

    fn render(content: &str, model: &mut Model, scoped: bool) -> String {
        let attributes = Attributes::new();
        let input = TemplateInput {
            attributes: &attributes,
            content,
            id: "rain-abc",
            scoped,
        };
        MustacheRenderer.render(&input, model)
    }

    #[test]
    fn test_binding_and_escape() {
        let mut model = Model {
            data: data_from(json!({"title": "Welcome", "html": "<b>x</b>", "n": 3})),
            ..Model::default()
        };
        assert_eq!(render("<h1>{{title}}</h1>", &mut model, false), "<h1>Welcome</h1>");
        assert_eq!(render("{{ html }}|{{{ html }}}", &mut model, false), "&lt;b&gt;x&lt;/b&gt;|<b>x</b>");
        assert_eq!(render("{{ n }}{{ missing }}", &mut model, false), "3");
    }

    #[test]
    fn test_nested_paths() {
        let mut model = Model {
            data: data_from(json!({"user": {"name": "Ada", "tags": ["a", "b"]}})),
            ..Model::default()
        };
        assert_eq!(render("{{ user.name }}-{{ user.tags.1 }}", &mut model, false), "Ada-b");
    }

    #[test]
    fn test_method_calls_mutate_data() {
        let mut model = Model {
            data: data_from(json!({"count": 0})),
            ..Model::default()
        };
        model.methods.insert(
            "add".into(),
            Rc::new(|data: &mut Data, args: &[Value]| {
                let step = args.first().and_then(Value::as_i64).unwrap_or(1);
                let next = data.get("count").and_then(Value::as_i64).unwrap_or(0) + step;
                data.insert("count".into(), json!(next));
                json!(next)
            }),
        );
        model.methods.insert(
            "greet".into(),
            Rc::new(|_: &mut Data, args: &[Value]| json!(format!("hi {}", display(&args[0])))),
        );

        let html = render("{{ add(2) }},{{ add() }},{{ count }},{{ greet('a, b') }}", &mut model, false);
        assert_eq!(html, "2,3,3,hi a, b");
    }

    #[test]
    fn test_scoped_wraps_root() {
        let mut model = Model::default();
        assert_eq!(
            render("<p>x</p>", &mut model, true),
            r#"<div class="rain-abc"><p>x</p></div>"#
        );
    }

    #[test]
    fn test_split_top_level() {
        assert!(split_top_level("", ',').is_empty());
        assert_eq!(split_top_level("a, 'b,c', 3", ','), vec!["a", " 'b,c'", " 3"]);
        assert_eq!(
            split_top_level("f(a | b) | g('|')", '|'),
            vec!["f(a | b) ", " g('|')"]
        );
    }

    #[test]
    fn test_filters() {
        let mut model = Model {
            data: data_from(json!({"name": "ada lovelace", "limit": 3})),
            ..Model::default()
        };
        model.filters.insert(
            "upper".into(),
            Rc::new(|_: &mut Data, args: &[Value]| json!(display(&args[0]).to_uppercase())),
        );
        model.filters.insert(
            "truncate".into(),
            Rc::new(|_: &mut Data, args: &[Value]| {
                let limit = args.get(1).and_then(Value::as_u64).unwrap_or(0) as usize;
                json!(display(&args[0]).chars().take(limit).collect::<String>())
            }),
        );

        let html = render(
            "{{ name | upper }}|{{ name | truncate(limit) | upper }}|{{ name | nope }}",
            &mut model,
            false,
        );
        assert_eq!(html, "ADA LOVELACE|ADA|ada lovelace");
    }
}
