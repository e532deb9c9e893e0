//! Schema definitions
//!
//! Plain data; every definition serializes deterministically so its
//! signature only changes when the definition does.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

use crate::resolver::EncodedResolver;

/// Scalars every GraphQL engine provides
pub const BUILTIN_SCALARS: [&str; 5] = ["String", "Int", "Float", "Boolean", "ID"];

/// Named type inside a type reference (`[Page!]!` → `Page`)
pub fn base_type(type_ref: &str) -> &str {
    type_ref.trim().trim_start_matches('[').trim_end_matches(|c: char| c == ']' || c == '!')
}

/// Swap the named type inside a reference, keeping list/non-null wrappers
pub fn rebase(type_ref: &str, new_base: &str) -> String {
    let trimmed = type_ref.trim();
    let base = base_type(trimmed);
    match trimmed.find(base) {
        Some(start) => format!("{}{}{}", &trimmed[..start], new_base, &trimmed[start + base.len()..]),
        None => new_base.to_string(),
    }
}

// =============================================================================
// Definitions
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Argument {
    pub name: String,
    #[serde(rename = "type")]
    pub type_ref: String,
}

/// An output field, optionally bound to a resolver chain
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    #[serde(rename = "type")]
    pub type_ref: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<Argument>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolver: Option<EncodedResolver>,
}

impl Field {
    pub fn new(name: impl Into<String>, type_ref: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_ref: type_ref.into(),
            description: None,
            args: Vec::new(),
            resolver: None,
        }
    }

    pub fn with_arg(mut self, name: impl Into<String>, type_ref: impl Into<String>) -> Self {
        self.args.push(Argument {
            name: name.into(),
            type_ref: type_ref.into(),
        });
        self
    }

    pub fn with_resolver(mut self, resolver: EncodedResolver) -> Self {
        self.resolver = Some(resolver);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectType {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub interfaces: Vec<String>,
    pub fields: BTreeMap<String, Field>,
}

impl ObjectType {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            interfaces: Vec::new(),
            fields: BTreeMap::new(),
        }
    }

    pub fn add_field(&mut self, field: Field) {
        self.fields.insert(field.name.clone(), field);
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputField {
    pub name: String,
    #[serde(rename = "type")]
    pub type_ref: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputType {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub fields: BTreeMap<String, InputField>,
}

/// Interface fields are never resolved directly
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterfaceType {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub fields: BTreeMap<String, Field>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnionType {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub members: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnumValue {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnumType {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub values: Vec<EnumValue>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScalarType {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

// =============================================================================
// Artifacts
// =============================================================================

/// What a generated artifact contains; also selects its template
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactKind {
    Type,
    Input,
    Interface,
    Union,
    Enum,
    Scalar,
}

impl ArtifactKind {
    pub const ALL: [ArtifactKind; 6] = [
        Self::Type,
        Self::Input,
        Self::Interface,
        Self::Union,
        Self::Enum,
        Self::Scalar,
    ];

    /// Template name for this kind
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Type => "type",
            Self::Input => "input",
            Self::Interface => "interface",
            Self::Union => "union",
            Self::Enum => "enum",
            Self::Scalar => "scalar",
        }
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One named definition of any kind
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Definition {
    Object(ObjectType),
    Input(InputType),
    Interface(InterfaceType),
    Union(UnionType),
    Enum(EnumType),
    Scalar(ScalarType),
}

impl Definition {
    pub fn name(&self) -> &str {
        match self {
            Self::Object(d) => &d.name,
            Self::Input(d) => &d.name,
            Self::Interface(d) => &d.name,
            Self::Union(d) => &d.name,
            Self::Enum(d) => &d.name,
            Self::Scalar(d) => &d.name,
        }
    }

    pub fn kind(&self) -> ArtifactKind {
        match self {
            Self::Object(_) => ArtifactKind::Type,
            Self::Input(_) => ArtifactKind::Input,
            Self::Interface(_) => ArtifactKind::Interface,
            Self::Union(_) => ArtifactKind::Union,
            Self::Enum(_) => ArtifactKind::Enum,
            Self::Scalar(_) => ArtifactKind::Scalar,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_type() {
        assert_eq!(base_type("Page"), "Page");
        assert_eq!(base_type("[Page!]!"), "Page");
        assert_eq!(base_type("[[Tag]]"), "Tag");
    }

    #[test]
    fn test_rebase_keeps_wrappers() {
        assert_eq!(rebase("[App.Models.Tag!]!", "Tag"), "[Tag!]!");
        assert_eq!(rebase("App.Models.Member", "Member"), "Member");
    }

    #[test]
    fn test_kind_names() {
        assert_eq!(ArtifactKind::Type.to_string(), "type");
        assert_eq!(serde_json::to_string(&ArtifactKind::Enum).unwrap(), "\"enum\"");
    }
}
