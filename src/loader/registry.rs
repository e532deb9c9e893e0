//! Loader Registry
//!
//! Maps configuration identifiers to loader factories so loader sets can be
//! materialized from plain settings.

use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::error::{suggest, Result, SchemaError};

use super::{
    file_path, inheritance, marker, namespace, BulkLoader, FilePathLoader, InheritanceLoader,
    MarkerLoader, NamespaceLoader, PatternSet,
};

/// Everything a factory needs to build one loader
#[derive(Debug, Clone, Default)]
pub struct LoaderOptions {
    pub patterns: PatternSet,
    /// Anchor for relative file-path globs
    pub base_dir: PathBuf,
}

/// Builds a loader from options; validation against classes happens later
pub type LoaderFactory = fn(&LoaderOptions) -> Result<Box<dyn BulkLoader>>;

/// Identifier → factory lookup
#[derive(Debug, Clone)]
pub struct LoaderRegistry {
    factories: BTreeMap<String, LoaderFactory>,
}

impl Default for LoaderRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

impl LoaderRegistry {
    /// Registry without any loaders
    pub fn empty() -> Self {
        Self {
            factories: BTreeMap::new(),
        }
    }

    /// Registry with the four built-in loaders
    pub fn with_builtins() -> Self {
        let mut registry = Self::empty();
        registry.register(inheritance::IDENTIFIER, |o| {
            Ok(Box::new(InheritanceLoader::new(o.patterns.clone())))
        });
        registry.register(marker::IDENTIFIER, |o| {
            Ok(Box::new(MarkerLoader::new(o.patterns.clone())))
        });
        registry.register(namespace::IDENTIFIER, |o| {
            Ok(Box::new(NamespaceLoader::new(o.patterns.clone())?))
        });
        registry.register(file_path::IDENTIFIER, |o| {
            Ok(Box::new(FilePathLoader::new(o.patterns.clone(), o.base_dir.clone())?))
        });
        registry
    }

    /// Register (or replace) a factory
    pub fn register(&mut self, id: impl Into<String>, factory: LoaderFactory) {
        self.factories.insert(id.into(), factory);
    }

    pub fn contains(&self, id: &str) -> bool {
        self.factories.contains_key(id)
    }

    pub fn identifiers(&self) -> impl Iterator<Item = &str> {
        self.factories.keys().map(String::as_str)
    }

    /// Materialize the loader registered under `id`
    pub fn create(&self, id: &str, options: &LoaderOptions) -> Result<Box<dyn BulkLoader>> {
        let factory = self.factories.get(id).ok_or_else(|| SchemaError::UnknownLoader {
            id: id.to_string(),
            suggestion: suggest(id, self.identifiers()),
        })?;
        factory(options)
    }
}
