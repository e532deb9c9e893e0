//! Entity models, backed by class descriptors

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::Value;

use crate::classes::{ClassIndex, Reflection};
use crate::error::Result;
use crate::names::short_name;
use crate::resolver::ResolverRef;
use crate::schema::{base_type, check_name, rebase, SchemaContext};

use super::{ModelCreator, ModelField, SchemaModel};

pub const IDENTIFIER: &str = "Entity";

#[derive(Debug, Clone)]
pub struct EntityModel {
    class: String,
    type_name: String,
    description: Option<String>,
    fields: BTreeMap<String, ModelField>,
    default_resolver: Option<ResolverRef>,
}

impl SchemaModel for EntityModel {
    fn source_class(&self) -> &str {
        &self.class
    }

    fn identifier(&self) -> &str {
        IDENTIFIER
    }

    fn type_name(&self) -> &str {
        &self.type_name
    }

    fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    fn field(&self, name: &str) -> Option<&ModelField> {
        self.fields.get(name)
    }

    fn field_names(&self) -> Vec<&str> {
        self.fields.keys().map(String::as_str).collect()
    }

    fn default_resolver(&self, _field: &str) -> Option<ResolverRef> {
        self.default_resolver.clone()
    }
}

/// Models every class in the index
#[derive(Debug, Clone)]
pub struct EntityModelCreator {
    index: Arc<ClassIndex>,
}

impl EntityModelCreator {
    pub fn new(index: Arc<ClassIndex>) -> Self {
        Self { index }
    }

    /// Type name for `class`: `models.<class>.type_name`, else prefix + short name
    pub fn type_name_of(class: &str, context: &SchemaContext) -> Result<String> {
        if let Some(name) = context.get_as::<String, _>(&["models", class, "type_name"])? {
            check_name(&format!("models.{}.type_name", class), &name)?;
            return Ok(name);
        }
        let prefix = context
            .model_config(IDENTIFIER)
            .and_then(|c| c.get("type_prefix"))
            .and_then(Value::as_str)
            .unwrap_or("");
        let name = format!("{}{}", prefix, short_name(class));
        check_name(&format!("models.{}", class), &name)?;
        Ok(name)
    }
}

impl ModelCreator for EntityModelCreator {
    fn applies_to(&self, class: &str) -> bool {
        self.index.class_exists(class)
    }

    fn create(&self, class: &str, context: &SchemaContext) -> Result<Arc<dyn SchemaModel>> {
        let descriptor = self.index.descriptor(class);

        let mut fields = BTreeMap::new();
        for (name, spec) in self.index.fields_of(class) {
            let declared = spec.type_ref();
            let base = base_type(declared);
            let (type_ref, target_class) = if self.index.class_exists(base) {
                (rebase(declared, &Self::type_name_of(base, context)?), Some(base.to_string()))
            } else {
                (declared.trim().to_string(), None)
            };

            let resolver = spec.resolver().map(ResolverRef::parse).transpose()?;
            fields.insert(
                name.clone(),
                ModelField {
                    name,
                    type_ref,
                    target_class,
                    description: spec.description().map(str::to_string),
                    args: spec.args().cloned().unwrap_or_default(),
                    resolver,
                },
            );
        }

        let default_resolver = context
            .model_config(IDENTIFIER)
            .and_then(|c| c.get("default_resolver"))
            .map(ResolverRef::from_value)
            .transpose()?;

        Ok(Arc::new(EntityModel {
            class: class.to_string(),
            type_name: Self::type_name_of(class, context)?,
            description: descriptor.and_then(|d| d.description.clone()),
            fields,
            default_resolver,
        }))
    }
}
