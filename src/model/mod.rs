//! Models
//!
//! A model is the schema-facing view of one source class: its type name, its
//! fields, and the resolver to fall back on when discovery finds nothing.
//! Creators decide which classes they can model.

pub mod entity;

pub use entity::{EntityModel, EntityModelCreator};

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::error::Result;
use crate::resolver::ResolverRef;
use crate::schema::SchemaContext;

/// A field as a model exposes it
#[derive(Debug, Clone, PartialEq)]
pub struct ModelField {
    pub name: String,
    /// GraphQL type reference, class references already mapped to type names
    pub type_ref: String,
    /// Source class the type points at, when it is a class reference
    pub target_class: Option<String>,
    pub description: Option<String>,
    pub args: BTreeMap<String, String>,
    /// Resolver declared by the class itself
    pub resolver: Option<ResolverRef>,
}

/// Schema-facing view of one source class
pub trait SchemaModel: fmt::Debug + Send + Sync {
    fn source_class(&self) -> &str;

    /// Model identifier used in discovery, e.g. `Entity`
    fn identifier(&self) -> &str;

    fn type_name(&self) -> &str;

    fn description(&self) -> Option<&str>;

    fn has_field(&self, name: &str) -> bool {
        self.field(name).is_some()
    }

    fn field(&self, name: &str) -> Option<&ModelField>;

    /// Field names in declaration-independent, sorted order
    fn field_names(&self) -> Vec<&str>;

    /// Resolver used when discovery finds nothing for `field`
    fn default_resolver(&self, field: &str) -> Option<ResolverRef>;
}

/// Builds models for the classes it applies to
pub trait ModelCreator: Send + Sync {
    fn applies_to(&self, class: &str) -> bool;

    fn create(&self, class: &str, context: &SchemaContext) -> Result<Arc<dyn SchemaModel>>;
}
