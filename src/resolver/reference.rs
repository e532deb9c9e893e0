//! Resolver references: serializable `(owner, method)` pointers

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

use crate::error::{Result, SchemaError};

const SEPARATOR: &str = "::";

/// Names a method on a registered resolver provider.
///
/// Written as `Owner::method` or `["Owner", "method"]`; serializes as the
/// string form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ResolverRef {
    owner: String,
    method: String,
}

impl ResolverRef {
    pub fn new(owner: impl Into<String>, method: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            method: method.into(),
        }
    }

    /// Parse `Owner::method`
    pub fn parse(s: &str) -> Result<Self> {
        let invalid = || SchemaError::InvalidResolverRef(s.to_string());
        let (owner, method) = s.trim().split_once(SEPARATOR).ok_or_else(invalid)?;
        Self::from_pair(owner, method).map_err(|_| invalid())
    }

    /// Build from two explicit parts
    pub fn from_pair(owner: &str, method: &str) -> Result<Self> {
        let owner = owner.trim();
        let method = method.trim();
        let well_formed = |part: &str| {
            !part.is_empty() && !part.contains(':') && !part.chars().any(char::is_whitespace)
        };
        if !well_formed(owner) || !well_formed(method) {
            return Err(SchemaError::InvalidResolverRef(format!("{}{}{}", owner, SEPARATOR, method)));
        }
        Ok(Self::new(owner, method))
    }

    /// Accepts either settings form: a string or a two-element array
    pub fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::String(s) => Self::parse(s),
            Value::Array(parts) => match parts.as_slice() {
                [Value::String(owner), Value::String(method)] => Self::from_pair(owner, method),
                _ => Err(SchemaError::InvalidResolverRef(value.to_string())),
            },
            other => Err(SchemaError::InvalidResolverRef(other.to_string())),
        }
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn method(&self) -> &str {
        &self.method
    }
}

impl fmt::Display for ResolverRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.owner, SEPARATOR, self.method)
    }
}

impl FromStr for ResolverRef {
    type Err = SchemaError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for ResolverRef {
    type Error = SchemaError;

    fn try_from(s: String) -> Result<Self> {
        Self::parse(&s)
    }
}

impl From<ResolverRef> for String {
    fn from(r: ResolverRef) -> Self {
        r.to_string()
    }
}
