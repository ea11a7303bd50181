//! Parse Module for Rain Compiler
//!
//! Extracts the `template`, `script` and `style` segments of a component
//! file together with their tag attributes.

use indexmap::IndexMap;
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::error::{RainError, Result};
use crate::scan::{find_tag, TagScanner};

/// Attribute name to value, in source order.
pub type Attributes = IndexMap<String, String>;

lazy_static! {
    /// `name`, optionally followed by `=` and a quoted or bare value.
    static ref ATTR_REGEX: Regex =
        Regex::new(r#"([^\s="'/]+)(?:\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s"'>]+)))?"#).unwrap();
    static ref REMOTE_REGEX: Regex = Regex::new(r"^(?:[A-Za-z][A-Za-z0-9+.-]*:|//)").unwrap();
}

// ═══════════════════════════════════════════════════════════════════════════════
// SEGMENT TYPES
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SegmentKind {
    Template,
    Script,
    Style,
}

impl SegmentKind {
    pub const ALL: [SegmentKind; 3] = [SegmentKind::Template, SegmentKind::Script, SegmentKind::Style];

    pub fn tag_name(self) -> &'static str {
        match self {
            SegmentKind::Template => "template",
            SegmentKind::Script => "script",
            SegmentKind::Style => "style",
        }
    }
}

impl fmt::Display for SegmentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag_name())
    }
}

impl FromStr for SegmentKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        SegmentKind::ALL
            .into_iter()
            .find(|kind| kind.tag_name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown segment kind '{}'", s))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Segment {
    pub content: String,
    pub attributes: Attributes,
    /// Only set for style segments carrying a bare `scoped` attribute.
    pub scoped: bool,
    /// File the content was loaded from through a `src` attribute.
    pub source: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Segments {
    pub template: Segment,
    pub script: Segment,
    pub style: Segment,
}

impl Segments {
    pub fn get(&self, kind: SegmentKind) -> &Segment {
        match kind {
            SegmentKind::Template => &self.template,
            SegmentKind::Script => &self.script,
            SegmentKind::Style => &self.style,
        }
    }

    /// Files read on behalf of the segments.
    pub fn sources(&self) -> impl Iterator<Item = &Path> {
        SegmentKind::ALL
            .into_iter()
            .filter_map(move |kind| self.get(kind).source.as_deref())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// ATTRIBUTES
// ═══════════════════════════════════════════════════════════════════════════════

/// Tokenize raw attribute text. A bare name yields an empty value and later
/// duplicates overwrite earlier ones. A stray self-closing `/` is skipped.
pub fn parse_attributes(text: &str) -> Attributes {
    let mut attributes = Attributes::new();

    for caps in ATTR_REGEX.captures_iter(text.trim()) {
        let Some(name) = caps.get(1) else { continue };
        let value = caps
            .get(2)
            .or_else(|| caps.get(3))
            .or_else(|| caps.get(4))
            .map(|m| m.as_str().to_string())
            .unwrap_or_default();
        attributes.insert(name.as_str().to_string(), value);
    }

    attributes
}

/// Attributes of the first opening tag literally named `tag` in `markup`.
pub fn extract_attributes(tag: &str, markup: &str) -> Attributes {
    find_tag(markup, tag)
        .map(|m| parse_attributes(m.attribute_text(markup)))
        .unwrap_or_default()
}

/// Render attributes back into tag text, each preceded by a space.
/// Empty values render as bare names.
pub fn render_attributes(attributes: &Attributes) -> String {
    let mut html = String::new();
    for (key, value) in attributes {
        if value.is_empty() {
            html.push_str(&format!(" {}", key));
        } else {
            html.push_str(&format!(" {}=\"{}\"", key, value.replace('"', "&quot;")));
        }
    }
    html
}

// ═══════════════════════════════════════════════════════════════════════════════
// SEGMENTS
// ═══════════════════════════════════════════════════════════════════════════════

/// Resolve a file reference written inside a component against the
/// component's directory. A leading `/` is relative to `dir` unless the
/// reference is an existing absolute path.
pub fn resolve_reference(dir: &Path, reference: &Path) -> PathBuf {
    if reference.is_absolute() {
        if reference.exists() {
            return reference.to_path_buf();
        }
        if let Ok(stripped) = reference.strip_prefix("/") {
            return dir.join(stripped);
        }
    }
    dir.join(reference)
}

/// A reference with a URL scheme (`https:`, `data:`) or a protocol-relative
/// `//` prefix. Anything else is a path on disk.
pub fn is_remote_reference(reference: &str) -> bool {
    REMOTE_REGEX.is_match(reference.trim())
}

pub fn read_source(path: &Path) -> Result<String> {
    fs::read_to_string(path).map_err(|e| RainError::io(path, e))
}

/// Extract the three segments of a component file. `dir` is the directory
/// `src` references are resolved against.
pub fn extract_segments(source: &str, dir: &Path) -> Segments {
    Segments {
        template: extract_segment(SegmentKind::Template, source, dir),
        script: extract_segment(SegmentKind::Script, source, dir),
        style: extract_segment(SegmentKind::Style, source, dir),
    }
}

fn extract_segment(kind: SegmentKind, source: &str, dir: &Path) -> Segment {
    let Some(found) = TagScanner::new(source, kind.tag_name())
        .case_insensitive()
        .next()
    else {
        return Segment::default();
    };

    let mut segment = Segment {
        attributes: parse_attributes(found.attribute_text(source)),
        ..Segment::default()
    };
    let inner = found.inner_text(source);

    if !inner.is_empty() {
        segment.content = inner.to_string();
    } else if let Some(src) = segment.attributes.get("src").cloned() {
        if is_remote_reference(&src) {
            // Left for the renderer to reference.
            log::debug!("[Rain] {} src '{}' is remote", kind, src);
        } else {
            segment.attributes.shift_remove("src");
            let path = resolve_reference(dir, Path::new(&src));
            match read_source(&path) {
                Ok(content) => segment.content = content,
                Err(e) => log::warn!("[Rain] {} segment source unreadable: {}", kind, e),
            }
            // Tracked even when missing, so creating it later is noticed.
            segment.source = Some(path);
        }
    }

    if kind == SegmentKind::Style && segment.attributes.shift_remove("scoped").is_some() {
        segment.scoped = true;
    }

    log::trace!(
        "[Rain] extracted {} segment ({} bytes, {} attributes)",
        kind,
        segment.content.len(),
        segment.attributes.len()
    );

    segment
}

// ═══════════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════════
