use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::cache::EvictionPolicy;
use crate::error::Result;
use crate::parse::SegmentKind;
use crate::style::StyleOutput;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SegmentOptions {
    pub enabled: bool,
}

impl Default for SegmentOptions {
    fn default() -> Self {
        Self { enabled: true }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CacheOptions {
    pub max_entries: Option<usize>,
    pub max_age_secs: Option<u64>,
}

impl CacheOptions {
    pub fn policy(&self) -> EvictionPolicy {
        match (self.max_entries, self.max_age_secs) {
            (Some(max), _) => EvictionPolicy::MaxEntries(max),
            (None, Some(secs)) => EvictionPolicy::MaxAge(Duration::from_secs(secs)),
            (None, None) => EvictionPolicy::Unbounded,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UrlOptions {
    /// Prefix for external stylesheet links that are not full URLs.
    pub base_path: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RainOptions {
    /// Component file extension, also used for `index.<extension>`.
    pub extension: String,
    /// Scope every component's styles, not only `<style scoped>`.
    pub scoped: bool,
    /// Wrap templates in their scope class even when styles are unscoped.
    pub template_scoped: bool,
    pub template: SegmentOptions,
    pub script: SegmentOptions,
    pub style: SegmentOptions,
    pub style_output: StyleOutput,
    pub cache: CacheOptions,
    pub url: UrlOptions,
    /// Deepest allowed component nesting.
    pub max_depth: usize,
}

impl Default for RainOptions {
    fn default() -> Self {
        Self {
            extension: "rain".to_string(),
            scoped: false,
            template_scoped: false,
            template: SegmentOptions::default(),
            script: SegmentOptions::default(),
            style: SegmentOptions::default(),
            style_output: StyleOutput::Tag,
            cache: CacheOptions::default(),
            url: UrlOptions::default(),
            max_depth: 64,
        }
    }
}

impl RainOptions {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn is_enabled(&self, kind: SegmentKind) -> bool {
        match kind {
            SegmentKind::Template => self.template.enabled,
            SegmentKind::Script => self.script.enabled,
            SegmentKind::Style => self.style.enabled,
        }
    }

    /// Copy with every segment kind but `kind` disabled.
    pub fn only(&self, kind: SegmentKind) -> Self {
        let mut options = self.clone();
        for other in SegmentKind::ALL {
            let enabled = other == kind;
            match other {
                SegmentKind::Template => options.template.enabled = enabled,
                SegmentKind::Script => options.script.enabled = enabled,
                SegmentKind::Style => options.style.enabled = enabled,
            }
        }
        options
    }
}
