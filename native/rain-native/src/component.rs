//! Component Module for Rain Compiler
//!
//! Renders a component file end to end: segments, model, template, child
//! components, script and style. Children are rendered depth first and
//! substituted back into the parent's markup.
//!
//! ## Child input data
//!
//! Each child tag occurrence is rendered with its own input, later wins:
//! 1. the parent's own invocation attributes, for the child's declared props
//! 2. parent data, for the child's declared props
//! 3. every attribute written on the occurrence
//! 4. `children`: the occurrence's inner markup

use indexmap::IndexMap;
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use crate::cache::{modified_stamp, CacheEntry, Dependency, RenderCache};
use crate::model::{load_model, Data, FsModelHost, Model, ModelHost};
use crate::options::RainOptions;
use crate::parse::{
    extract_segments, parse_attributes, read_source, resolve_reference, Attributes, SegmentKind,
};
use crate::scan::TagScanner;
use crate::script::{ScriptInput, ScriptRenderer, ScriptTag};
use crate::style::{StyleInput, StyleRenderer, StyleTag};
use crate::template::{MustacheRenderer, TemplateInput, TemplateRenderer};

/// The pluggable renderers and model host used by the engine.
#[derive(Clone)]
pub struct Collaborators {
    pub template: Rc<dyn TemplateRenderer>,
    pub script: Rc<dyn ScriptRenderer>,
    pub style: Rc<dyn StyleRenderer>,
    pub models: Rc<dyn ModelHost>,
}

impl Collaborators {
    pub fn defaults(options: &RainOptions) -> Self {
        Self {
            template: Rc::new(MustacheRenderer),
            script: Rc::new(ScriptTag),
            style: Rc::new(
                StyleTag::new(options.style_output).with_base_path(options.url.base_path.clone()),
            ),
            models: Rc::new(FsModelHost::default()),
        }
    }
}

/// Stable id for a component file: `rain-` and 12 hex digits of the
/// SHA-256 of its path.
pub fn component_id(path: &Path) -> String {
    let mut hasher = Sha256::new();
    hasher.update(path.to_string_lossy().as_bytes());
    let hash = format!("{:x}", hasher.finalize());
    format!("rain-{}", &hash[..12])
}

#[derive(Debug, Default)]
struct Rendered {
    output: String,
    dependencies: Vec<Dependency>,
}

#[derive(Debug, Default)]
struct Children {
    /// Occurrence text to rendered output, in discovery order.
    replacements: IndexMap<String, String>,
    dependencies: Vec<Dependency>,
}

pub struct Compiler<'a> {
    options: &'a RainOptions,
    collaborators: &'a Collaborators,
    cache: &'a mut RenderCache,
}

impl<'a> Compiler<'a> {
    pub fn new(
        options: &'a RainOptions,
        collaborators: &'a Collaborators,
        cache: &'a mut RenderCache,
    ) -> Self {
        Self {
            options,
            collaborators,
            cache,
        }
    }

    /// Render the component at `reference`, resolved against `dir`.
    /// A missing component renders as the empty string.
    pub fn render(&mut self, reference: &Path, dir: &Path, data: &Data) -> String {
        self.render_component(reference, dir, data, &Attributes::new(), 0)
            .output
    }

    /// Resolve a component reference to an existing file. Directories resolve
    /// to their `index` component.
    pub fn resolve(&self, dir: &Path, reference: &Path) -> Option<PathBuf> {
        let mut path = resolve_reference(dir, reference);
        if path.is_dir() {
            path = path.join(format!("index.{}", self.options.extension));
        }
        if !path.is_file() {
            return None;
        }
        Some(fs::canonicalize(&path).unwrap_or(path))
    }

    fn render_component(
        &mut self,
        reference: &Path,
        dir: &Path,
        data: &Data,
        invocation: &Attributes,
        depth: usize,
    ) -> Rendered {
        let Some(path) = self.resolve(dir, reference) else {
            log::debug!("[Rain] component {} not found", reference.display());
            return Rendered::default();
        };

        let modified = modified_stamp(&path);
        let fingerprint = RenderCache::compute_fingerprint(data, invocation);
        if let Some(entry) = self.cache.get(&path, modified, &fingerprint) {
            log::debug!("[Rain] cache hit for {}", path.display());
            let mut dependencies = entry.dependencies.clone();
            let output = entry.output.clone();
            dependencies.push(Dependency { path, modified });
            return Rendered {
                output,
                dependencies,
            };
        }
        log::debug!("[Rain] rendering {}", path.display());

        let source = match read_source(&path) {
            Ok(source) => source,
            Err(e) => {
                log::warn!("[Rain] {}", e);
                return Rendered::default();
            }
        };

        let component_dir = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| dir.to_path_buf());
        let segments = extract_segments(&source, &component_dir);
        let mut model = load_model(self.collaborators.models.as_ref(), &path, data);

        let scoped = segments.style.scoped || self.options.scoped;
        let id = component_id(&path);

        let mut dependencies: Vec<Dependency> = self
            .collaborators
            .models
            .dependencies(&path)
            .iter()
            .map(|p| Dependency::of(p))
            .collect();
        dependencies.extend(segments.sources().map(Dependency::of));

        let template = self.collaborators.template.render(
            &TemplateInput {
                attributes: &segments.template.attributes,
                content: &segments.template.content,
                id: &id,
                scoped: scoped || self.options.template_scoped,
            },
            &mut model,
        );

        let children = self.render_children(&template, &model, &component_dir, invocation, depth);
        dependencies.extend(children.dependencies);

        let mut output = if self.options.is_enabled(SegmentKind::Template) {
            substitute(&template, &children.replacements)
        } else {
            // Keep what the children contribute (their scripts and styles).
            children.replacements.values().cloned().collect()
        };

        if self.options.is_enabled(SegmentKind::Script) {
            output.push_str(&self.collaborators.script.render(&ScriptInput {
                attributes: &segments.script.attributes,
                content: &segments.script.content,
                id: &id,
            }));
        }

        if self.options.is_enabled(SegmentKind::Style) {
            // Style bodies take data bindings like the template does.
            let content = if segments.style.content.trim().is_empty() {
                String::new()
            } else {
                self.collaborators.template.render(
                    &TemplateInput {
                        attributes: &Attributes::new(),
                        content: &segments.style.content,
                        id: &id,
                        scoped: false,
                    },
                    &mut model,
                )
            };
            output.push_str(&self.collaborators.style.render(&StyleInput {
                attributes: &segments.style.attributes,
                content: &content,
                id: &id,
                scoped,
            }));
        }

        let output = output.trim().to_string();
        self.cache.set(
            path.clone(),
            CacheEntry::new(modified, fingerprint, dependencies.clone(), output.clone()),
        );

        dependencies.push(Dependency { path, modified });
        Rendered {
            output,
            dependencies,
        }
    }

    fn render_children(
        &mut self,
        html: &str,
        model: &Model,
        dir: &Path,
        invocation: &Attributes,
        depth: usize,
    ) -> Children {
        let mut children = Children::default();

        for (tag, file) in &model.components {
            for occurrence in TagScanner::new(html, tag).case_insensitive() {
                let text = occurrence.text(html);
                // Identical occurrences have identical inputs.
                if children.replacements.contains_key(text) {
                    continue;
                }

                let attributes = parse_attributes(occurrence.attribute_text(html));
                let rendered = match self.resolve(dir, Path::new(file)) {
                    None => {
                        log::debug!("[Rain] <{}> references missing component {}", tag, file);
                        Rendered {
                            output: String::new(),
                            dependencies: vec![Dependency::of(&resolve_reference(
                                dir,
                                Path::new(file),
                            ))],
                        }
                    }
                    Some(child) if depth + 1 > self.options.max_depth => {
                        log::error!(
                            "[Rain] <{}> exceeds the maximum component depth of {} at {}",
                            tag,
                            self.options.max_depth,
                            child.display()
                        );
                        Rendered::default()
                    }
                    Some(child) => {
                        let props = self
                            .collaborators
                            .models
                            .load(&child)
                            .and_then(|definition| definition.props)
                            .unwrap_or_default();
                        let input = child_input(
                            &props,
                            invocation,
                            &model.data,
                            &attributes,
                            occurrence.inner_text(html),
                        );
                        self.render_component(&child, dir, &input, &attributes, depth + 1)
                    }
                };

                children.dependencies.extend(rendered.dependencies);
                children
                    .replacements
                    .insert(text.to_string(), rendered.output);
            }
        }

        children
    }
}

fn child_input(
    props: &[String],
    invocation: &Attributes,
    parent: &Data,
    attributes: &Attributes,
    children: &str,
) -> Data {
    let mut input = Data::new();
    for prop in props {
        if let Some(value) = invocation.get(prop) {
            input.insert(prop.clone(), Value::String(value.clone()));
        }
    }
    for prop in props {
        if let Some(value) = parent.get(prop) {
            input.insert(prop.clone(), value.clone());
        }
    }
    for (key, value) in attributes {
        input.insert(key.clone(), Value::String(value.clone()));
    }
    input.insert("children".to_string(), Value::String(children.to_string()));
    input
}

/// Replace every recorded occurrence text, outermost first. Later
/// replacements also apply inside earlier outputs, so a component passed as
/// another component's children is expanded. Identical text elsewhere in the
/// markup is replaced too.
fn substitute(html: &str, replacements: &IndexMap<String, String>) -> String {
    let mut ordered: Vec<(&String, &String)> = replacements.iter().collect();
    // Stable: equal lengths keep discovery order.
    ordered.sort_by(|a, b| b.0.len().cmp(&a.0.len()));
    ordered
        .into_iter()
        .fold(html.to_string(), |acc, (from, to)| acc.replace(from.as_str(), to))
}
