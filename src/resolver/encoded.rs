//! Encoded resolvers: the compile-time, serializable form of a resolver chain

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{Result, SchemaError};

use super::composed::{BoundPrimary, BoundStep, ComposedResolver};
use super::{ResolverRef, ResolverRegistry};

/// A resolver reference plus the chain around it.
///
/// Middleware and afterware are themselves encoded resolvers; their own
/// middleware/afterware are flattened in place when composing. Static context
/// holds scalars and arrays only, so it always survives a round trip through
/// generated source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EncodedResolver {
    #[serde(rename = "ref")]
    pub reference: ResolverRef,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub middleware: Vec<EncodedResolver>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub afterware: Vec<EncodedResolver>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub context: Map<String, Value>,
}

impl EncodedResolver {
    pub fn new(reference: ResolverRef) -> Self {
        Self {
            reference,
            middleware: Vec::new(),
            afterware: Vec::new(),
            context: Map::new(),
        }
    }

    pub fn with_middleware(mut self, step: EncodedResolver) -> Self {
        self.middleware.push(step);
        self
    }

    pub fn with_afterware(mut self, step: EncodedResolver) -> Self {
        self.afterware.push(step);
        self
    }

    /// Add one static context entry; maps are rejected
    pub fn with_context(mut self, key: impl Into<String>, value: Value) -> Result<Self> {
        let key = key.into();
        check_context_value(&key, &value)?;
        self.context.insert(key, value);
        Ok(self)
    }

    /// Replace the static context wholesale
    pub fn with_context_map(mut self, context: Map<String, Value>) -> Result<Self> {
        for (key, value) in &context {
            check_context_value(key, value)?;
        }
        self.context = context;
        Ok(self)
    }

    /// Source-text form embedded in generated artifacts
    pub fn encode(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn decode(source: &str) -> Result<Self> {
        Ok(serde_json::from_str(source)?)
    }

    /// Bind every reference against the registry
    pub fn compose(&self, registry: &ResolverRegistry) -> Result<ComposedResolver> {
        let mut middleware = Vec::new();
        for step in &self.middleware {
            flatten(step, &self.context, registry, &mut middleware)?;
        }

        let primary = BoundPrimary {
            reference: self.reference.clone(),
            func: registry.resolver_fn(&self.reference)?,
            context: self.context.clone(),
        };

        let mut afterware = Vec::new();
        for step in &self.afterware {
            flatten(step, &self.context, registry, &mut afterware)?;
        }

        Ok(ComposedResolver::new(middleware, primary, afterware))
    }
}

/// Splice `node`'s own chain around it, in place
fn flatten(
    node: &EncodedResolver,
    root_context: &Map<String, Value>,
    registry: &ResolverRegistry,
    out: &mut Vec<BoundStep>,
) -> Result<()> {
    for inner in &node.middleware {
        flatten(inner, root_context, registry, out)?;
    }

    let mut context = root_context.clone();
    context.extend(node.context.clone());
    out.push(BoundStep {
        reference: node.reference.clone(),
        func: registry.chain_fn(&node.reference)?,
        context,
    });

    for inner in &node.afterware {
        flatten(inner, root_context, registry, out)?;
    }
    Ok(())
}

fn check_context_value(key: &str, value: &Value) -> Result<()> {
    match value {
        Value::Object(_) => Err(SchemaError::config(
            format!("context.{}", key),
            "static resolver context accepts scalars and arrays only",
        )),
        Value::Array(items) => items.iter().try_for_each(|item| check_context_value(key, item)),
        _ => Ok(()),
    }
}
