//! Model Module for Rain Compiler
//!
//! A component's model is `{ data, methods, filters, created, components,
//! props }`. Static
//! declarations come from a JSON sidecar next to the component file
//! (`card.rain` → `card.json`); closures (data producers and methods) are
//! registered from Rust through [`ModelRegistry`].

use indexmap::IndexMap;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use crate::error::{RainError, Result};

pub type Data = serde_json::Map<String, Value>;

/// A component method. The data map is passed as an explicit receiver, so
/// writes are visible to later calls and to the template.
pub type Method = Rc<dyn Fn(&mut Data, &[Value]) -> Value>;
pub type Methods = IndexMap<String, Method>;

/// Runs once against the bound data, before the template renders.
pub type Hook = Rc<dyn Fn(&mut Data)>;

/// Tag name to component file reference.
pub type ComponentMap = IndexMap<String, String>;

/// Convert a JSON value into a data map. Anything but an object is empty.
pub fn data_from(value: Value) -> Data {
    match value {
        Value::Object(map) => map,
        _ => Data::new(),
    }
}

/// Tag name used for a component declared without one: the file stem.
pub fn component_tag(reference: &str) -> String {
    Path::new(reference)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(reference)
        .to_string()
}

// ═══════════════════════════════════════════════════════════════════════════════
// MODEL DEFINITION
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Clone)]
pub enum DataSource {
    Static(Data),
    /// Invoked once per render. A non-object result is treated as empty.
    Producer(Rc<dyn Fn() -> Value>),
}

impl DataSource {
    pub fn resolve(&self) -> Data {
        match self {
            DataSource::Static(data) => data.clone(),
            DataSource::Producer(produce) => match produce() {
                Value::Object(map) => map,
                Value::Null => Data::new(),
                other => {
                    log::debug!("[Rain] data producer returned non-object {}", other);
                    Data::new()
                }
            },
        }
    }
}

impl fmt::Debug for DataSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataSource::Static(data) => f.debug_tuple("Static").field(data).finish(),
            DataSource::Producer(_) => f.write_str("Producer(..)"),
        }
    }
}

/// What a component file declares. Unset keys fall back to the layer below
/// (registry over sidecar over built-in defaults).
#[derive(Clone, Default)]
pub struct ModelDefinition {
    pub data: Option<DataSource>,
    pub methods: Option<Methods>,
    /// Value transforms for `{{ value | name }}`. A filter receives the
    /// piped value as its first argument.
    pub filters: Option<Methods>,
    pub created: Option<Hook>,
    pub components: Option<ComponentMap>,
    pub props: Option<Vec<String>>,
}

impl fmt::Debug for ModelDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelDefinition")
            .field("data", &self.data)
            .field(
                "methods",
                &self.methods.as_ref().map(|m| m.keys().collect::<Vec<_>>()),
            )
            .field(
                "filters",
                &self.filters.as_ref().map(|m| m.keys().collect::<Vec<_>>()),
            )
            .field("created", &self.created.is_some())
            .field("components", &self.components)
            .field("props", &self.props)
            .finish()
    }
}

impl ModelDefinition {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn data(mut self, value: Value) -> Self {
        self.data = Some(DataSource::Static(data_from(value)));
        self
    }

    pub fn data_fn(mut self, produce: impl Fn() -> Value + 'static) -> Self {
        self.data = Some(DataSource::Producer(Rc::new(produce)));
        self
    }

    pub fn method(
        mut self,
        name: &str,
        method: impl Fn(&mut Data, &[Value]) -> Value + 'static,
    ) -> Self {
        self.methods
            .get_or_insert_with(Methods::new)
            .insert(name.to_string(), Rc::new(method));
        self
    }

    pub fn filter(
        mut self,
        name: &str,
        filter: impl Fn(&mut Data, &[Value]) -> Value + 'static,
    ) -> Self {
        self.filters
            .get_or_insert_with(Methods::new)
            .insert(name.to_string(), Rc::new(filter));
        self
    }

    pub fn created(mut self, hook: impl Fn(&mut Data) + 'static) -> Self {
        self.created = Some(Rc::new(hook));
        self
    }

    pub fn component(mut self, tag: &str, file: &str) -> Self {
        self.components
            .get_or_insert_with(ComponentMap::new)
            .insert(tag.to_string(), file.to_string());
        self
    }

    pub fn prop(mut self, name: &str) -> Self {
        self.props.get_or_insert_with(Vec::new).push(name.to_string());
        self
    }

    /// Parse a JSON model. A top level that is not an object, and any key
    /// holding the wrong shape, normalize to the empty default.
    pub fn from_json(path: &Path, text: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(text).map_err(|e| RainError::Model {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        let Value::Object(mut root) = value else {
            return Ok(Self::default());
        };

        let data = root.remove("data").map(|v| DataSource::Static(data_from(v)));
        let components = root.remove("components").map(parse_components);
        let props = root.remove("props").map(|v| match v {
            Value::Array(items) => items
                .into_iter()
                .filter_map(|item| item.as_str().map(str::to_string))
                .collect(),
            _ => Vec::new(),
        });

        Ok(Self {
            data,
            components,
            props,
            ..Self::default()
        })
    }

    /// Layer `other` over `self`; keys set in `other` win.
    pub fn overlay(self, other: ModelDefinition) -> Self {
        Self {
            data: other.data.or(self.data),
            methods: other.methods.or(self.methods),
            filters: other.filters.or(self.filters),
            created: other.created.or(self.created),
            components: other.components.or(self.components),
            props: other.props.or(self.props),
        }
    }
}

fn parse_components(value: Value) -> ComponentMap {
    match value {
        Value::Object(map) => map
            .into_iter()
            .filter_map(|(tag, file)| file.as_str().map(|f| (tag, f.to_string())))
            .collect(),
        Value::Array(files) => files
            .into_iter()
            .filter_map(|file| file.as_str().map(|f| (component_tag(f), f.to_string())))
            .collect(),
        _ => ComponentMap::new(),
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// MODEL HOSTS
// ═══════════════════════════════════════════════════════════════════════════════

/// Loads the model definition co-located with a component file.
pub trait ModelHost {
    fn load(&self, component: &Path) -> Option<ModelDefinition>;

    /// Files whose modification invalidates renders of `component`.
    fn dependencies(&self, _component: &Path) -> Vec<PathBuf> {
        Vec::new()
    }
}

/// Reads `<stem>.<extension>` JSON sidecars.
#[derive(Debug, Clone)]
pub struct FsModelHost {
    extension: String,
}

impl Default for FsModelHost {
    fn default() -> Self {
        Self {
            extension: "json".to_string(),
        }
    }
}

impl FsModelHost {
    pub fn new(extension: &str) -> Self {
        Self {
            extension: extension.to_string(),
        }
    }

    pub fn sidecar(&self, component: &Path) -> PathBuf {
        component.with_extension(&self.extension)
    }
}

impl ModelHost for FsModelHost {
    fn load(&self, component: &Path) -> Option<ModelDefinition> {
        let path = self.sidecar(component);
        if path == component || !path.is_file() {
            return None;
        }

        let parsed = fs::read_to_string(&path)
            .map_err(|e| RainError::io(&path, e))
            .and_then(|text| ModelDefinition::from_json(&path, &text));

        match parsed {
            Ok(definition) => Some(definition),
            Err(e) => {
                log::warn!("[Rain] {}", e);
                None
            }
        }
    }

    fn dependencies(&self, component: &Path) -> Vec<PathBuf> {
        vec![self.sidecar(component)]
    }
}

/// Rust-registered models layered over the JSON sidecars.
#[derive(Default)]
pub struct ModelRegistry {
    definitions: HashMap<PathBuf, ModelDefinition>,
    fallback: FsModelHost,
}

impl ModelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_fallback(fallback: FsModelHost) -> Self {
        Self {
            definitions: HashMap::new(),
            fallback,
        }
    }

    pub fn register(&mut self, component: impl AsRef<Path>, definition: ModelDefinition) {
        self.definitions
            .insert(normalize(component.as_ref()), definition);
    }
}

impl ModelHost for ModelRegistry {
    fn load(&self, component: &Path) -> Option<ModelDefinition> {
        let registered = self.definitions.get(&normalize(component)).cloned();
        match (self.fallback.load(component), registered) {
            (Some(base), Some(registered)) => Some(base.overlay(registered)),
            (base, registered) => registered.or(base),
        }
    }

    fn dependencies(&self, component: &Path) -> Vec<PathBuf> {
        self.fallback.dependencies(component)
    }
}

fn normalize(path: &Path) -> PathBuf {
    fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}

// ═══════════════════════════════════════════════════════════════════════════════
// MODEL
// ═══════════════════════════════════════════════════════════════════════════════

/// A component's normalized model for one render.
#[derive(Clone, Default)]
pub struct Model {
    pub data: Data,
    pub methods: Methods,
    pub filters: Methods,
    pub components: ComponentMap,
    pub props: Vec<String>,
}

impl fmt::Debug for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Model")
            .field("data", &self.data)
            .field("methods", &self.methods.keys().collect::<Vec<_>>())
            .field("filters", &self.filters.keys().collect::<Vec<_>>())
            .field("components", &self.components)
            .field("props", &self.props)
            .finish()
    }
}

impl Model {
    /// Call a method with the model's data as receiver.
    pub fn call(&mut self, name: &str, args: &[Value]) -> Option<Value> {
        let method = self.methods.get(name).cloned()?;
        Some(method(&mut self.data, args))
    }

    /// Pipe `value` through a filter, or `None` when no filter is named so.
    pub fn filter(&mut self, name: &str, value: Value, args: &[Value]) -> Option<Value> {
        let filter = self.filters.get(name).cloned()?;
        let mut piped = Vec::with_capacity(args.len() + 1);
        piped.push(value);
        piped.extend_from_slice(args);
        Some(filter(&mut self.data, &piped))
    }
}

/// Load the model for `component`, merge `overrides` into its data and run
/// the `created` hook. Only `data` is overridable by the caller.
pub fn load_model(host: &dyn ModelHost, component: &Path, overrides: &Data) -> Model {
    let definition = host.load(component).unwrap_or_default();

    let mut data = definition
        .data
        .as_ref()
        .map(DataSource::resolve)
        .unwrap_or_default();
    for (key, value) in overrides {
        data.insert(key.clone(), value.clone());
    }
    if let Some(created) = &definition.created {
        created(&mut data);
    }

    Model {
        data,
        methods: definition.methods.unwrap_or_default(),
        filters: definition.filters.unwrap_or_default(),
        components: definition.components.unwrap_or_default(),
        props: definition.props.unwrap_or_default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_json_sidecar() {
        let def = ModelDefinition::from_json(
            Path::new("card.json"),
            r#"{"data":{"title":"Hi"},"components":["parts/badge.rain"],"props":["title",3]}"#,
        )
        .unwrap();
        let components = def.components.unwrap();
        assert_eq!(components.get("badge").map(String::as_str), Some("parts/badge.rain"));
        assert_eq!(def.props.unwrap(), vec!["title".to_string()]);
        match def.data.unwrap() {
            DataSource::Static(data) => assert_eq!(data.get("title"), Some(&json!("Hi"))),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_non_object_model_is_empty() {
        let def = ModelDefinition::from_json(Path::new("x.json"), "[1, 2]").unwrap();
        assert!(def.data.is_none() && def.components.is_none() && def.props.is_none());

        let def = ModelDefinition::from_json(Path::new("x.json"), r#"{"data": 5, "props": "a"}"#)
            .unwrap();
        assert_eq!(def.data.unwrap().resolve(), Data::new());
        assert!(def.props.unwrap().is_empty());
    }

    #[test]
    fn test_invalid_json_is_an_error() {
        let err = ModelDefinition::from_json(Path::new("x.json"), "{").unwrap_err();
        assert!(matches!(err, RainError::Model { .. }));
    }

    #[test]
    fn test_producer_non_object_is_empty() {
        let source = DataSource::Producer(Rc::new(|| json!("nope")));
        assert!(source.resolve().is_empty());
        let source = DataSource::Producer(Rc::new(|| json!({"n": 1})));
        assert_eq!(source.resolve().get("n"), Some(&json!(1)));
    }

    #[test]
    fn test_overrides_merge_into_data_only() {
        let dir = tempfile::tempdir().unwrap();
        let component = dir.path().join("card.rain");
        fs::write(&component, "").unwrap();

        let mut registry = ModelRegistry::new();
        registry.register(
            &component,
            ModelDefinition::new()
                .data_fn(|| json!({"title": "Default", "count": 1}))
                .prop("title"),
        );

        let overrides = data_from(json!({"title": "Override", "props": ["x"]}));
        let model = load_model(&registry, &component, &overrides);
        assert_eq!(model.data.get("title"), Some(&json!("Override")));
        assert_eq!(model.data.get("count"), Some(&json!(1)));
        assert_eq!(model.props, vec!["title".to_string()]);
    }

    #[test]
    fn test_registry_layers_over_sidecar() {
        let dir = tempfile::tempdir().unwrap();
        let component = dir.path().join("page.rain");
        fs::write(&component, "").unwrap();
        fs::write(
            dir.path().join("page.json"),
            r#"{"data":{"a":1},"components":{"card":"card.rain"}}"#,
        )
        .unwrap();

        let mut registry = ModelRegistry::new();
        registry.register(&component, ModelDefinition::new().data(json!({"b": 2})));

        let model = load_model(&registry, &component, &Data::new());
        assert_eq!(model.data.get("b"), Some(&json!(2)));
        assert_eq!(model.data.get("a"), None);
        assert_eq!(model.components.get("card").map(String::as_str), Some("card.rain"));
    }

    #[test]
    fn test_created_hook_sees_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let component = dir.path().join("list.rain");
        fs::write(&component, "").unwrap();

        let mut registry = ModelRegistry::new();
        registry.register(
            &component,
            ModelDefinition::new()
                .data(json!({"items": ["a", "b"]}))
                .created(|data: &mut Data| {
                    let count = data.get("items").and_then(Value::as_array).map_or(0, Vec::len);
                    data.insert("count".into(), json!(count));
                }),
        );

        let model = load_model(&registry, &component, &data_from(json!({"items": ["x"]})));
        assert_eq!(model.data.get("count"), Some(&json!(1)));
    }

    #[test]
    fn test_filters_receive_piped_value() {
        let mut model = Model {
            data: data_from(json!({"suffix": "!"})),
            ..Model::default()
        };
        model.filters.insert(
            "shout".into(),
            Rc::new(|data: &mut Data, args: &[Value]| {
                let text = args.first().and_then(Value::as_str).unwrap_or("").to_uppercase();
                let suffix = data.get("suffix").and_then(Value::as_str).unwrap_or("");
                json!(format!("{}{}", text, suffix))
            }),
        );

        assert_eq!(model.filter("shout", json!("hi"), &[]), Some(json!("HI!")));
        assert_eq!(model.filter("missing", json!("hi"), &[]), None);
    }

    #[test]
    fn test_methods_share_data() {
        let mut model = Model {
            data: data_from(json!({"count": 1})),
            ..Model::default()
        };
        model.methods.insert(
            "increment".into(),
            Rc::new(|data: &mut Data, _args: &[Value]| {
                let next = data.get("count").and_then(Value::as_i64).unwrap_or(0) + 1;
                data.insert("count".into(), json!(next));
                json!(next)
            }),
        );

        assert_eq!(model.call("increment", &[]), Some(json!(2)));
        assert_eq!(model.call("increment", &[]), Some(json!(3)));
        assert_eq!(model.data.get("count"), Some(&json!(3)));
        assert_eq!(model.call("missing", &[]), None);
    }
}
