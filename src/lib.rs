//! Schema Compiler
//!
//! Compiles domain-model class descriptors into GraphQL schema artifacts,
//! persisted per schema and rebuilt incrementally.
//!
//! ## Pipeline
//!
//! - **Bulk loading**: loader sets narrow the known classes by inheritance,
//!   marker, namespace glob, or file path
//! - **Resolver discovery**: every exposed field gets a resolver reference,
//!   found by convention across ordered providers, then model and global defaults
//! - **Resolver composition**: middleware → primary → afterware chains are
//!   encoded as data and bound to functions only at request time
//! - **Code generation**: artifacts are rendered into a staging directory,
//!   diffed by signature, and swapped into place atomically
//!
//! ## Architecture
//!
//! ```text
//! generated/graphql/
//! ├── default/
//! │   ├── __registry.json
//! │   ├── Page.graphql
//! │   ├── Query.graphql
//! │   ├── _manifest_exclude
//! │   └── .gitattributes
//! └── admin/
//! ```

pub mod classes;
pub mod codegen;
pub mod compiler;
pub mod config;
pub mod error;
pub mod loader;
pub mod model;
pub mod names;
pub mod resolver;
pub mod runtime;
pub mod schema;
pub mod signature;

pub use classes::{ClassDescriptor, ClassIndex, Collection, Reflection};
pub use codegen::{
    CacheStore, CodeGenerationStore, FileCacheStore, HandlebarsEncoder, MemoryCacheStore,
    PersistReport, TemplateEncoder,
};
pub use compiler::SchemaCompiler;
pub use config::CompilerConfig;
pub use error::{Result, SchemaError};
pub use loader::{BulkLoader, LoaderConfig, LoaderRegistry, LoaderSet, PatternSet};
pub use model::{ModelCreator, SchemaModel};
pub use resolver::{
    ComposedResolver, EncodedResolver, ResolveError, ResolverProvider, ResolverRef,
    ResolverRegistry, Step,
};
pub use runtime::{GeneratedSchema, SchemaRuntime};
pub use schema::{Schema, SchemaContext};
pub use signature::Signature;
