//! Schema graph
//!
//! The compiled output of one build: named definitions of every kind, keyed by
//! type name. Each definition becomes one generated artifact.

pub mod builder;
pub mod context;
pub mod settings;
pub mod types;

pub use builder::SchemaBuilder;
pub use context::{SchemaContext, SettingsPath};
pub use types::{
    base_type, rebase, Argument, ArtifactKind, Definition, EnumType, EnumValue, Field, InputField,
    InputType, InterfaceType, ObjectType, ScalarType, UnionType, BUILTIN_SCALARS,
};

use std::collections::BTreeMap;

use crate::error::{Result, SchemaError};

/// Root operation types
pub const QUERY_TYPE: &str = "Query";
pub const MUTATION_TYPE: &str = "Mutation";

/// GraphQL name syntax: `[_A-Za-z][_0-9A-Za-z]*`
pub fn is_valid_name(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c == '_' || c.is_ascii_alphabetic())
        && chars.all(|c| c == '_' || c.is_ascii_alphanumeric())
}

/// Reject a type name configured at `key` unless it is a GraphQL name
pub fn check_name(key: &str, name: &str) -> Result<()> {
    if is_valid_name(name) {
        return Ok(());
    }
    Err(SchemaError::config(
        key,
        format!("'{}' is not a valid GraphQL name", name),
    ))
}

fn settings_key(definition: &Definition) -> &'static str {
    match definition {
        Definition::Object(_) => "types",
        Definition::Input(_) => "inputs",
        Definition::Interface(_) => "interfaces",
        Definition::Union(_) => "unions",
        Definition::Enum(_) => "enums",
        Definition::Scalar(_) => "scalars",
    }
}

/// A compiled schema
#[derive(Debug, Clone, Default)]
pub struct Schema {
    name: String,
    definitions: BTreeMap<String, Definition>,
}

impl Schema {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            definitions: BTreeMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Add a definition; type names are unique across all kinds
    pub fn add(&mut self, definition: Definition) -> Result<()> {
        let name = definition.name().to_string();
        check_name(&format!("{}.{}", settings_key(&definition), name), &name)?;
        if self.definitions.contains_key(&name) || BUILTIN_SCALARS.contains(&name.as_str()) {
            return Err(SchemaError::DuplicateType { name });
        }
        self.definitions.insert(name, definition);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Definition> {
        self.definitions.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.definitions.contains_key(name)
    }

    pub fn object(&self, name: &str) -> Option<&ObjectType> {
        match self.definitions.get(name) {
            Some(Definition::Object(o)) => Some(o),
            _ => None,
        }
    }

    /// Existing object type, or a fresh one (used for root operation types)
    pub fn object_mut_or_insert(&mut self, name: &str) -> Result<&mut ObjectType> {
        let entry = self
            .definitions
            .entry(name.to_string())
            .or_insert_with(|| Definition::Object(ObjectType::new(name)));
        match entry {
            Definition::Object(o) => Ok(o),
            _ => Err(SchemaError::DuplicateType {
                name: name.to_string(),
            }),
        }
    }

    /// Definitions in name order
    pub fn definitions(&self) -> impl Iterator<Item = &Definition> {
        self.definitions.values()
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    /// Check every type reference points at a defined type of a fitting kind
    pub fn validate(&self) -> Result<()> {
        for definition in self.definitions.values() {
            match definition {
                Definition::Object(o) => {
                    self.check_fields(&o.name, o.fields.values())?;
                    for interface in &o.interfaces {
                        if !matches!(self.get(interface), Some(Definition::Interface(_))) {
                            return Err(SchemaError::UnknownType {
                                type_name: o.name.clone(),
                                field: "implements".to_string(),
                                target: interface.clone(),
                            });
                        }
                    }
                }
                Definition::Interface(i) => self.check_fields(&i.name, i.fields.values())?,
                Definition::Input(i) => {
                    for field in i.fields.values() {
                        let target = base_type(&field.type_ref);
                        let valid = self.is_scalar_like(target)
                            || matches!(self.get(target), Some(Definition::Input(_)));
                        if !valid {
                            return Err(SchemaError::UnknownType {
                                type_name: i.name.clone(),
                                field: field.name.clone(),
                                target: target.to_string(),
                            });
                        }
                    }
                }
                Definition::Union(u) => {
                    for member in &u.members {
                        if self.object(member).is_none() {
                            return Err(SchemaError::UnknownType {
                                type_name: u.name.clone(),
                                field: "members".to_string(),
                                target: member.clone(),
                            });
                        }
                    }
                }
                Definition::Enum(_) | Definition::Scalar(_) => {}
            }
        }
        Ok(())
    }

    fn check_fields<'a>(&self, type_name: &str, fields: impl Iterator<Item = &'a Field>) -> Result<()> {
        for field in fields {
            let target = base_type(&field.type_ref);
            if !self.is_known(target) {
                return Err(SchemaError::UnknownType {
                    type_name: type_name.to_string(),
                    field: field.name.clone(),
                    target: target.to_string(),
                });
            }
            for arg in &field.args {
                let target = base_type(&arg.type_ref);
                let valid =
                    self.is_scalar_like(target) || matches!(self.get(target), Some(Definition::Input(_)));
                if !valid {
                    return Err(SchemaError::UnknownType {
                        type_name: type_name.to_string(),
                        field: format!("{}({})", field.name, arg.name),
                        target: target.to_string(),
                    });
                }
            }
        }
        Ok(())
    }

    fn is_known(&self, name: &str) -> bool {
        BUILTIN_SCALARS.contains(&name) || self.definitions.contains_key(name)
    }

    fn is_scalar_like(&self, name: &str) -> bool {
        BUILTIN_SCALARS.contains(&name)
            || matches!(self.get(name), Some(Definition::Scalar(_) | Definition::Enum(_)))
    }
}
