//! Schema Context
//!
//! Per-build state passed explicitly through the compile steps:
//! - the nested settings tree, addressed by dot paths or segment arrays
//! - the model cache (each source class is modeled at most once)
//! - the resolver-decision cache keyed by `(type, field)`

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::error::{Result, SchemaError};
use crate::model::{ModelCreator, SchemaModel};
use crate::resolver::{ConventionStrategy, ResolverRef};

// =============================================================================
// Paths
// =============================================================================

/// Anything that addresses a node in the settings tree.
///
/// Strings split on `.`; arrays are taken segment by segment, so keys that
/// contain dots (class identifiers) stay addressable.
pub trait SettingsPath {
    fn segments(&self) -> Result<Vec<String>>;
}

fn check_segments(display: String, segments: Vec<String>) -> Result<Vec<String>> {
    if segments.is_empty() || segments.iter().any(|s| s.is_empty()) {
        return Err(SchemaError::MalformedPath(display));
    }
    Ok(segments)
}

impl SettingsPath for str {
    fn segments(&self) -> Result<Vec<String>> {
        check_segments(self.to_string(), self.split('.').map(str::to_string).collect())
    }
}

impl SettingsPath for String {
    fn segments(&self) -> Result<Vec<String>> {
        self.as_str().segments()
    }
}

impl SettingsPath for [&str] {
    fn segments(&self) -> Result<Vec<String>> {
        check_segments(format!("{:?}", self), self.iter().map(|s| s.to_string()).collect())
    }
}

impl<const N: usize> SettingsPath for [&str; N] {
    fn segments(&self) -> Result<Vec<String>> {
        self.as_slice().segments()
    }
}

impl SettingsPath for [String] {
    fn segments(&self) -> Result<Vec<String>> {
        check_segments(format!("{:?}", self), self.to_vec())
    }
}

impl SettingsPath for Vec<String> {
    fn segments(&self) -> Result<Vec<String>> {
        self.as_slice().segments()
    }
}

// =============================================================================
// Context
// =============================================================================

/// Settings plus per-run caches for one schema build
pub struct SchemaContext {
    name: String,
    settings: Map<String, Value>,
    models: BTreeMap<String, Arc<dyn SchemaModel>>,
    resolver_decisions: BTreeMap<(String, String), ResolverRef>,
}

impl std::fmt::Debug for SchemaContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SchemaContext")
            .field("name", &self.name)
            .field("settings", &self.settings)
            .field("models", &self.models.keys().collect::<Vec<_>>())
            .field("resolver_decisions", &self.resolver_decisions.len())
            .finish()
    }
}

impl SchemaContext {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            settings: Map::new(),
            models: BTreeMap::new(),
            resolver_decisions: BTreeMap::new(),
        }
    }

    pub fn with_settings(name: impl Into<String>, settings: Map<String, Value>) -> Self {
        Self {
            settings,
            ..Self::new(name)
        }
    }

    /// Schema name
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn settings(&self) -> &Map<String, Value> {
        &self.settings
    }

    /// Value at `path`, if every segment exists
    pub fn get<P: SettingsPath + ?Sized>(&self, path: &P) -> Result<Option<&Value>> {
        let segments = path.segments()?;
        let mut current = &self.settings;
        let (last, parents) = segments.split_last().ok_or_else(|| SchemaError::MalformedPath(String::new()))?;
        for segment in parents {
            match current.get(segment) {
                Some(Value::Object(map)) => current = map,
                _ => return Ok(None),
            }
        }
        Ok(current.get(last))
    }

    pub fn has<P: SettingsPath + ?Sized>(&self, path: &P) -> Result<bool> {
        Ok(self.get(path)?.is_some())
    }

    /// Deserialize the value at `path`; a missing value is `None`
    pub fn get_as<T, P>(&self, path: &P) -> Result<Option<T>>
    where
        T: DeserializeOwned,
        P: SettingsPath + ?Sized,
    {
        match self.get(path)? {
            None => Ok(None),
            Some(value) => serde_json::from_value(value.clone())
                .map(Some)
                .map_err(|e| SchemaError::config(path.segments().map(|s| s.join(".")).unwrap_or_default(), e.to_string())),
        }
    }

    /// Set `path`, creating intermediate maps as needed.
    ///
    /// Fails if an existing intermediate value is not a map.
    pub fn set<P: SettingsPath + ?Sized>(&mut self, path: &P, value: Value) -> Result<()> {
        let segments = path.segments()?;
        let joined = segments.join(".");
        let (last, parents) = segments
            .split_last()
            .ok_or_else(|| SchemaError::MalformedPath(joined.clone()))?;

        let mut current = &mut self.settings;
        for segment in parents {
            let entry = current
                .entry(segment.clone())
                .or_insert_with(|| Value::Object(Map::new()));
            current = match entry {
                Value::Object(map) => map,
                _ => {
                    return Err(SchemaError::PathConflict {
                        path: joined,
                        segment: segment.clone(),
                    })
                }
            };
        }
        current.insert(last.clone(), value);
        Ok(())
    }

    /// Deep-merge `value` at `path`; maps merge key by key, everything else replaces
    pub fn merge<P: SettingsPath + ?Sized>(&mut self, path: &P, value: Value) -> Result<()> {
        let merged = match self.get(path)? {
            Some(existing) => {
                let mut existing = existing.clone();
                deep_merge(&mut existing, value);
                existing
            }
            None => value,
        };
        self.set(path, merged)
    }

    /// Deep-merge a whole settings map at the root
    pub fn apply(&mut self, settings: Map<String, Value>) {
        let mut root = Value::Object(std::mem::take(&mut self.settings));
        deep_merge(&mut root, Value::Object(settings));
        if let Value::Object(map) = root {
            self.settings = map;
        }
    }

    // === Well-known settings ===

    /// `modelConfig.<id>`; falls back to a case-insensitive key match
    pub fn model_config(&self, model_id: &str) -> Option<&Map<String, Value>> {
        let configs = self.settings.get("modelConfig")?.as_object()?;
        configs
            .get(model_id)
            .or_else(|| {
                configs
                    .iter()
                    .find(|(k, _)| k.eq_ignore_ascii_case(model_id))
                    .map(|(_, v)| v)
            })
            .and_then(Value::as_object)
    }

    /// Provider names from `resolvers`, in configured order
    pub fn resolver_providers(&self) -> Result<Vec<String>> {
        Ok(self.get_as::<Vec<String>, _>("resolvers")?.unwrap_or_default())
    }

    /// `defaultResolver`, if configured
    pub fn default_resolver(&self) -> Result<Option<ResolverRef>> {
        match self.settings.get("defaultResolver") {
            None | Some(Value::Null) => Ok(None),
            Some(value) => ResolverRef::from_value(value).map(Some),
        }
    }

    /// `resolverStrategy`, `convention` unless configured
    pub fn resolver_strategy(&self) -> Result<String> {
        Ok(self
            .get_as::<String, _>("resolverStrategy")?
            .unwrap_or_else(|| ConventionStrategy::NAME.to_string()))
    }

    // === Caches ===

    /// Model for `class`, created on first request and cached for the run
    pub fn model(&mut self, class: &str, creators: &[Arc<dyn ModelCreator>]) -> Result<Arc<dyn SchemaModel>> {
        if let Some(model) = self.models.get(class) {
            return Ok(Arc::clone(model));
        }

        let creator = creators
            .iter()
            .find(|c| c.applies_to(class))
            .ok_or_else(|| SchemaError::config(format!("models.{}", class), "no model creator applies to this class"))?;
        let model = creator.create(class, self)?;
        self.models.insert(class.to_string(), Arc::clone(&model));
        Ok(model)
    }

    pub fn cached_model(&self, class: &str) -> Option<&Arc<dyn SchemaModel>> {
        self.models.get(class)
    }

    pub fn models(&self) -> impl Iterator<Item = (&str, &Arc<dyn SchemaModel>)> {
        self.models.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn resolver_decision(&self, type_name: &str, field: &str) -> Option<&ResolverRef> {
        self.resolver_decisions
            .get(&(type_name.to_string(), field.to_string()))
    }

    pub fn record_resolver_decision(&mut self, type_name: &str, field: &str, reference: ResolverRef) {
        self.resolver_decisions
            .insert((type_name.to_string(), field.to_string()), reference);
    }
}

fn deep_merge(target: &mut Value, incoming: Value) {
    match (target, incoming) {
        (Value::Object(existing), Value::Object(incoming)) => {
            for (key, value) in incoming {
                match existing.get_mut(&key) {
                    Some(slot) => deep_merge(slot, value),
                    None => {
                        existing.insert(key, value);
                    }
                }
            }
        }
        (slot, value) => *slot = value,
    }
}
