//! # Rain Component Compiler
//!
//! Compiles single-file components (`<template>`, `<script>`, `<style>`) into
//! rendered HTML, composing child components declared in each component's
//! model.
//!
//! ## Rendering Invariants
//!
//! 1. **Silent Absence**: a missing component file, tag or model renders as
//!    empty content. Rendering never returns an error.
//!
//! 2. **Threaded Directories**: child references resolve against the
//!    directory of the component that declares them. Nothing about the
//!    active directory is stored on the engine.
//!
//! 3. **Per-Occurrence Inputs**: every child tag occurrence is rendered from
//!    its own attributes and inner markup. Siblings never share state.
//!
//! 4. **Scoped Styles**: a scoped component's selectors are prefixed with
//!    `.rain-<id> `, and its template is wrapped in an element with that class.
//!
//! 5. **Cache Validity**: a cached render is reused only while the component
//!    file, every file read for it (model, `src`, children) and the render
//!    inputs are unchanged.

#[cfg(feature = "napi")]
use napi_derive::napi;

use std::path::{Path, PathBuf};
use std::rc::Rc;

pub mod cache;
pub mod component;
pub mod css;
pub mod discovery;
pub mod error;
pub mod model;
pub mod options;
pub mod parse;
pub mod scan;
pub mod script;
pub mod style;
pub mod template;


pub use cache::{EvictionPolicy, RenderCache};
pub use component::{component_id, Collaborators, Compiler};
pub use error::{RainError, Result};
pub use model::{data_from, Data, ModelDefinition, ModelHost, ModelRegistry};
pub use options::RainOptions;
pub use parse::{extract_attributes, extract_segments, Attributes, Segment, SegmentKind};
pub use script::ScriptRenderer;
pub use style::{scope, ScopeMode, StyleOutput, StyleRenderer};
pub use template::TemplateRenderer;

/// One component path or a list of them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderTarget {
    One(PathBuf),
    Many(Vec<PathBuf>),
}

impl From<&str> for RenderTarget {
    fn from(path: &str) -> Self {
        RenderTarget::One(PathBuf::from(path))
    }
}

impl From<String> for RenderTarget {
    fn from(path: String) -> Self {
        RenderTarget::One(PathBuf::from(path))
    }
}

impl From<&Path> for RenderTarget {
    fn from(path: &Path) -> Self {
        RenderTarget::One(path.to_path_buf())
    }
}

impl From<PathBuf> for RenderTarget {
    fn from(path: PathBuf) -> Self {
        RenderTarget::One(path)
    }
}

impl<T: Into<PathBuf>> From<Vec<T>> for RenderTarget {
    fn from(paths: Vec<T>) -> Self {
        RenderTarget::Many(paths.into_iter().map(Into::into).collect())
    }
}

/// Entry point: owns the options, collaborators and render cache for a
/// component root directory.
pub struct Rain {
    root: PathBuf,
    options: RainOptions,
    collaborators: Collaborators,
    cache: RenderCache,
}

impl Rain {
    pub fn new(root: impl Into<PathBuf>, options: RainOptions) -> Self {
        let collaborators = Collaborators::defaults(&options);
        let cache = RenderCache::with_policy(options.cache.policy());
        Self {
            root: root.into(),
            options,
            collaborators,
            cache,
        }
    }

    pub fn with_template_renderer(mut self, renderer: impl TemplateRenderer + 'static) -> Self {
        self.collaborators.template = Rc::new(renderer);
        self
    }

    pub fn with_script_renderer(mut self, renderer: impl ScriptRenderer + 'static) -> Self {
        self.collaborators.script = Rc::new(renderer);
        self
    }

    pub fn with_style_renderer(mut self, renderer: impl StyleRenderer + 'static) -> Self {
        self.collaborators.style = Rc::new(renderer);
        self
    }

    pub fn with_model_host(mut self, host: impl ModelHost + 'static) -> Self {
        self.collaborators.models = Rc::new(host);
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn options(&self) -> &RainOptions {
        &self.options
    }

    pub fn cache(&self) -> &RenderCache {
        &self.cache
    }

    pub fn cache_mut(&mut self) -> &mut RenderCache {
        &mut self.cache
    }

    /// Render one component with `data`, or each of a list followed by a
    /// line break. List entries render with their own model data only.
    pub fn render(&mut self, target: impl Into<RenderTarget>, data: &Data) -> String {
        let mut compiler = Compiler::new(&self.options, &self.collaborators, &mut self.cache);
        match target.into() {
            RenderTarget::One(path) => compiler.render(&path, &self.root, data),
            RenderTarget::Many(paths) => {
                let empty = Data::new();
                let mut output = String::new();
                for path in paths {
                    output.push_str(&compiler.render(&path, &self.root, &empty));
                    output.push('\n');
                }
                output
            }
        }
    }

    /// A renderer that only emits `kind` segments. It shares collaborators
    /// but has its own cache.
    pub fn render_only(&self, kind: SegmentKind) -> Rain {
        let options = self.options.only(kind);
        let cache = RenderCache::with_policy(options.cache.policy());
        Rain {
            root: self.root.clone(),
            options,
            collaborators: self.collaborators.clone(),
            cache,
        }
    }

    /// Render every component under the root once to fill the cache.
    /// Returns how many rendered to non-empty output.
    pub fn warm(&mut self) -> usize {
        let files = discovery::discover_components(&self.root, &self.options.extension);
        log::debug!("[Rain] warming cache with {} components", files.len());

        let data = Data::new();
        let mut rendered = 0;
        for file in &files {
            let relative = file.strip_prefix(&self.root).unwrap_or(file);
            if !self.render(relative, &data).is_empty() {
                rendered += 1;
            }
        }
        rendered
    }
}

#[cfg(feature = "napi")]
#[napi]
pub fn render_native(dir: String, file: String, data: Option<serde_json::Value>) -> String {
    let data = data.map(data_from).unwrap_or_default();
    Rain::new(dir, RainOptions::default()).render(file, &data)
}
