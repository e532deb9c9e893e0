//! Typed views over the schema settings tree

use serde::Deserialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;

use crate::error::{Result, SchemaError};
use crate::loader::LoaderConfig;
use crate::resolver::{EncodedResolver, ResolverRef};

/// Selects every model field
pub const ALL_FIELDS: &str = "*";

/// `bulkLoad.<block>`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BulkLoadBlock {
    #[serde(default)]
    pub load: Vec<LoaderConfig>,
    /// Model settings applied to every selected class
    #[serde(default)]
    pub apply: Map<String, Value>,
}

/// `models.<class>` (and `bulkLoad.<block>.apply`)
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ModelSettings {
    #[serde(default)]
    pub fields: FieldSelection,
    #[serde(default)]
    pub exclude_fields: Vec<String>,
    #[serde(default)]
    pub operations: Vec<Operation>,
    #[serde(default)]
    pub type_name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub interfaces: Vec<String>,
}

/// Which model fields become schema fields
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum FieldSelection {
    /// Only `"*"` is meaningful
    Wildcard(String),
    Names(Vec<String>),
    /// Per-field settings; a `"*"` key also pulls in every other model field
    Configured(BTreeMap<String, FieldSettings>),
}

impl Default for FieldSelection {
    fn default() -> Self {
        Self::Wildcard(ALL_FIELDS.to_string())
    }
}

impl FieldSelection {
    /// Resolve against the model's fields: `(name, settings)` in name order
    pub fn resolve(&self, model_fields: &[&str], key: &str) -> Result<BTreeMap<String, FieldSettings>> {
        let all = || {
            model_fields
                .iter()
                .map(|f| (f.to_string(), FieldSettings::default()))
                .collect::<BTreeMap<_, _>>()
        };
        match self {
            Self::Wildcard(w) if w == ALL_FIELDS => Ok(all()),
            Self::Wildcard(other) => Err(SchemaError::config(
                key,
                format!("expected \"*\", a list of names, or a map; found \"{}\"", other),
            )),
            Self::Names(names) => Ok(names
                .iter()
                .map(|n| (n.clone(), FieldSettings::default()))
                .collect()),
            Self::Configured(map) => {
                let mut selected = if map.contains_key(ALL_FIELDS) {
                    all()
                } else {
                    BTreeMap::new()
                };
                for (name, settings) in map {
                    if name != ALL_FIELDS {
                        selected.insert(name.clone(), settings.clone());
                    }
                }
                Ok(selected)
            }
        }
    }
}

/// Generated root operations
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Deserialize)]
pub enum Operation {
    /// `read<Plural>`: paginated, filterable list
    #[serde(rename = "read")]
    Read,
    /// `readOne<Type>`: single item by argument match
    #[serde(rename = "readOne")]
    ReadOne,
}

/// Settings of one output field
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FieldSettings {
    #[serde(default, rename = "type")]
    pub type_ref: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub args: BTreeMap<String, String>,
    /// `Owner::method` or `[owner, method]`
    #[serde(default)]
    pub resolver: Option<Value>,
    #[serde(default)]
    pub middleware: Vec<Value>,
    #[serde(default)]
    pub afterware: Vec<Value>,
    /// Static resolver context
    #[serde(default)]
    pub context: Map<String, Value>,
}

impl FieldSettings {
    pub fn explicit_resolver(&self) -> Result<Option<ResolverRef>> {
        self.resolver.as_ref().map(ResolverRef::from_value).transpose()
    }

    /// Wrap `primary` in the configured chain and context
    pub fn encode(&self, primary: ResolverRef) -> Result<EncodedResolver> {
        let mut encoded = EncodedResolver::new(primary).with_context_map(self.context.clone())?;
        for step in &self.middleware {
            encoded = encoded.with_middleware(chain_step(step)?);
        }
        for step in &self.afterware {
            encoded = encoded.with_afterware(chain_step(step)?);
        }
        Ok(encoded)
    }
}

/// A chain entry: a bare reference, or a full encoded resolver table
fn chain_step(value: &Value) -> Result<EncodedResolver> {
    match value {
        Value::Object(_) => {
            let step: EncodedResolver = serde_json::from_value(value.clone())?;
            let context = step.context.clone();
            step.with_context_map(context)
        }
        other => Ok(EncodedResolver::new(ResolverRef::from_value(other)?)),
    }
}

/// `types.<Name>`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TypeSettings {
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub interfaces: Vec<String>,
    #[serde(default)]
    pub fields: BTreeMap<String, FieldSettings>,
}

/// `interfaces.<Name>`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct InterfaceSettings {
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub fields: BTreeMap<String, FieldSettings>,
}

/// `inputs.<Name>`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct InputSettings {
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub fields: BTreeMap<String, InputFieldSettings>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InputFieldSettings {
    #[serde(rename = "type")]
    pub type_ref: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub default: Option<Value>,
}

/// `unions.<Name>`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UnionSettings {
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub types: Vec<String>,
}

/// `enums.<Name>`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EnumSettings {
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub values: EnumValues,
}

/// Either plain names or `name → description`
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum EnumValues {
    Names(Vec<String>),
    Described(BTreeMap<String, String>),
}

impl Default for EnumValues {
    fn default() -> Self {
        Self::Names(Vec::new())
    }
}

/// `scalars.<Name>`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ScalarSettings {
    #[serde(default)]
    pub description: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_field_selection_forms() {
        let model_fields = ["id", "title", "body"];

        let all: ModelSettings = serde_json::from_value(json!({})).unwrap();
        let selected = all.fields.resolve(&model_fields, "fields").unwrap();
        assert_eq!(selected.keys().collect::<Vec<_>>(), vec!["body", "id", "title"]);

        let listed: ModelSettings = serde_json::from_value(json!({"fields": ["title"]})).unwrap();
        let selected = listed.fields.resolve(&model_fields, "fields").unwrap();
        assert_eq!(selected.keys().collect::<Vec<_>>(), vec!["title"]);

        let mapped: ModelSettings = serde_json::from_value(json!({
            "fields": {"*": {}, "title": {"resolver": "App::resolveTitle"}}
        }))
        .unwrap();
        let selected = mapped.fields.resolve(&model_fields, "fields").unwrap();
        assert_eq!(selected.len(), 3);
        assert!(selected["title"].resolver.is_some());

        let bad: ModelSettings = serde_json::from_value(json!({"fields": "all"})).unwrap();
        assert!(bad.fields.resolve(&model_fields, "fields").is_err());
    }

    #[test]
    fn test_operations_parse() {
        let settings: ModelSettings =
            serde_json::from_value(json!({"operations": ["read", "readOne"]})).unwrap();
        assert_eq!(settings.operations, vec![Operation::Read, Operation::ReadOne]);
    }

    #[test]
    fn test_field_settings_encode_chain() {
        let settings: FieldSettings = serde_json::from_value(json!({
            "middleware": ["Builtin::requireSource"],
            "afterware": [["Builtin", "nullGuard"], {"ref": "Builtin::paginate", "context": {"max": 10}}],
            "context": {"property": "name"},
        }))
        .unwrap();

        let encoded = settings.encode(ResolverRef::new("Builtin", "resolve")).unwrap();
        assert_eq!(encoded.middleware.len(), 1);
        assert_eq!(encoded.afterware.len(), 2);
        assert_eq!(encoded.afterware[1].context["max"], json!(10));
        assert_eq!(encoded.context["property"], json!("name"));
    }

    #[test]
    fn test_field_settings_reject_map_context() {
        let settings: FieldSettings =
            serde_json::from_value(json!({"context": {"nested": {"a": 1}}})).unwrap();
        assert!(settings.encode(ResolverRef::new("Builtin", "resolve")).is_err());
    }
}
