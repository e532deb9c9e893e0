//! Loader Set
//!
//! Applies an ordered list of loaders to an initial collection. Each stage
//! only ever removes classes; the first failing loader aborts the run.

use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info, warn};

use crate::classes::{Collection, Reflection};
use crate::error::Result;

use super::{BulkLoader, LoaderOptions, LoaderRegistry, PatternSet};

/// One loader entry as written in settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoaderConfig {
    /// Registry identifier
    pub loader: String,
    #[serde(default)]
    pub include: Vec<String>,
    #[serde(default)]
    pub exclude: Vec<String>,
}

impl LoaderConfig {
    pub fn new(loader: impl Into<String>, include: &[&str], exclude: &[&str]) -> Self {
        Self {
            loader: loader.into(),
            include: include.iter().map(|s| s.to_string()).collect(),
            exclude: exclude.iter().map(|s| s.to_string()).collect(),
        }
    }
}

/// Ordered loader pipeline over one initial collection
#[derive(Debug)]
pub struct LoaderSet {
    initial: Collection,
    loaders: Vec<Box<dyn BulkLoader>>,
}

impl LoaderSet {
    pub fn new(initial: Collection, loaders: Vec<Box<dyn BulkLoader>>) -> Self {
        Self { initial, loaders }
    }

    /// Materialize loaders from settings, in order
    pub fn from_config(
        initial: Collection,
        configs: &[LoaderConfig],
        registry: &LoaderRegistry,
        base_dir: &Path,
    ) -> Result<Self> {
        let mut loaders = Vec::with_capacity(configs.len());
        for config in configs {
            let options = LoaderOptions {
                patterns: PatternSet::new(config.include.clone(), config.exclude.clone()),
                base_dir: base_dir.to_path_buf(),
            };
            let loader = registry.create(&config.loader, &options)?;
            if loader.patterns().is_empty() {
                warn!(loader = %config.loader, "loader has no include or exclude patterns");
            }
            loaders.push(loader);
        }
        Ok(Self::new(initial, loaders))
    }

    pub fn initial(&self) -> &Collection {
        &self.initial
    }

    pub fn loaders(&self) -> &[Box<dyn BulkLoader>] {
        &self.loaders
    }

    /// Validate every loader's targets before anything runs
    pub fn validate(&self, reflection: &dyn Reflection) -> Result<()> {
        for loader in &self.loaders {
            loader.validate(reflection)?;
        }
        Ok(())
    }

    /// Run loaders strictly in order
    pub fn process(&self, reflection: &dyn Reflection) -> Result<Collection> {
        let mut current = self.initial.clone();
        debug!(size = current.len(), "bulk load start");

        for (stage, loader) in self.loaders.iter().enumerate() {
            let next = loader.collect(&current, reflection)?;

            // Loaders never add classes; drop anything that was not an input.
            let next = if next.is_subset_of(&current) {
                next
            } else {
                warn!(
                    loader = loader.identifier(),
                    "loader returned classes outside its input; ignoring them"
                );
                next.intersect(&current)
            };

            info!(
                stage,
                loader = loader.identifier(),
                before = current.len(),
                after = next.len(),
                "bulk load stage"
            );
            current = next;
        }

        Ok(current)
    }
}
