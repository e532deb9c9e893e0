//! Compiler facade
//!
//! Owns everything a build needs (class index, loader and resolver
//! registries, model creators, the code generation store) and runs
//! `context → compile → persist` per schema name.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde_json::{json, Value};
use tracing::{debug, info};
use walkdir::WalkDir;

use crate::classes::{ClassIndex, Collection};
use crate::codegen::{
    CodeGenerationStore, FileCacheStore, HandlebarsEncoder, PersistReport, TemplateEncoder,
};
use crate::config::CompilerConfig;
use crate::error::{suggest, Result, SchemaError};
use crate::loader::LoaderRegistry;
use crate::model::{EntityModelCreator, ModelCreator};
use crate::resolver::ResolverRegistry;
use crate::runtime::SchemaRuntime;
use crate::schema::{Schema, SchemaBuilder, SchemaContext};

/// Fragment file merged at the settings root instead of under its stem
const ROOT_FRAGMENT: &str = "schema";

pub struct SchemaCompiler {
    config: CompilerConfig,
    root: PathBuf,
    index: Arc<ClassIndex>,
    loaders: LoaderRegistry,
    resolvers: Arc<ResolverRegistry>,
    creators: Vec<Arc<dyn ModelCreator>>,
    store: CodeGenerationStore,
}

impl std::fmt::Debug for SchemaCompiler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SchemaCompiler")
            .field("classes", &self.index.len())
            .field("store", &self.store)
            .finish_non_exhaustive()
    }
}

impl SchemaCompiler {
    /// Compiler with the built-in loaders, resolvers and entity models
    pub fn new(config: CompilerConfig) -> Result<Self> {
        Self::with_resolvers(config, ResolverRegistry::with_builtins())
    }

    /// Same as [`SchemaCompiler::new`] with a caller-populated resolver registry
    pub fn with_resolvers(config: CompilerConfig, resolvers: ResolverRegistry) -> Result<Self> {
        let index = Arc::new(ClassIndex::load(&config.class_paths())?);
        let creators: Vec<Arc<dyn ModelCreator>> =
            vec![Arc::new(EntityModelCreator::new(Arc::clone(&index)))];

        let encoder: Arc<dyn TemplateEncoder> = match config.templates_path() {
            Some(dir) => Arc::new(HandlebarsEncoder::with_overrides(&dir)?),
            None => Arc::new(HandlebarsEncoder::new()?),
        };
        let store = CodeGenerationStore::new(
            config.output_path(),
            Arc::new(FileCacheStore::open(config.cache_path())?),
            encoder,
        );

        Ok(Self::with_parts(
            config,
            index,
            LoaderRegistry::with_builtins(),
            Arc::new(resolvers),
            creators,
            store,
        ))
    }

    pub fn with_parts(
        config: CompilerConfig,
        index: Arc<ClassIndex>,
        loaders: LoaderRegistry,
        resolvers: Arc<ResolverRegistry>,
        creators: Vec<Arc<dyn ModelCreator>>,
        store: CodeGenerationStore,
    ) -> Self {
        Self {
            root: config.project_root(),
            config,
            index,
            loaders,
            resolvers,
            creators,
            store,
        }
    }

    pub fn config(&self) -> &CompilerConfig {
        &self.config
    }

    pub fn index(&self) -> &ClassIndex {
        &self.index
    }

    pub fn resolvers(&self) -> &Arc<ResolverRegistry> {
        &self.resolvers
    }

    pub fn store(&self) -> &CodeGenerationStore {
        &self.store
    }

    /// Settings for one schema: global defaults, then its fragments
    pub fn context(&self, name: &str) -> Result<SchemaContext> {
        let sources = self.config.schema_sources(name).ok_or_else(|| {
            let message = match suggest(name, self.config.schema_names()) {
                Some(s) => format!("unknown schema (did you mean '{}'?)", s),
                None => "unknown schema".to_string(),
            };
            SchemaError::config(format!("schemas.{}", name), message)
        })?;

        let mut ctx = SchemaContext::new(name);
        ctx.set("resolvers", json!(self.config.resolvers))?;
        ctx.set("resolverStrategy", json!(self.config.resolver_strategy))?;
        ctx.set("defaultResolver", json!(self.config.default_resolver))?;
        ctx.set("modelConfig", serde_json::to_value(&self.config.model_config)?)?;

        for dir in sources {
            if !dir.is_dir() {
                return Err(SchemaError::config(
                    format!("schemas.{}.src", name),
                    format!("{} is not a directory", dir.display()),
                ));
            }
            for (stem, value) in read_fragments(&dir)? {
                debug!(schema = name, fragment = %stem, "merging settings fragment");
                if stem == ROOT_FRAGMENT {
                    if let Value::Object(map) = value {
                        ctx.apply(map);
                    }
                } else {
                    ctx.merge(stem.as_str(), value)?;
                }
            }
        }
        Ok(ctx)
    }

    fn builder(&self) -> SchemaBuilder<'_> {
        SchemaBuilder::new(
            &self.index,
            &self.loaders,
            &self.resolvers,
            &self.creators,
            &self.root,
        )
    }

    /// Classes each bulk-load block of `name` selects
    pub fn select_classes(&self, name: &str) -> Result<BTreeMap<String, Collection>> {
        let ctx = self.context(name)?;
        self.builder().select_classes(&ctx)
    }

    /// Compile without persisting
    pub fn compile(&self, name: &str) -> Result<Schema> {
        let mut ctx = self.context(name)?;
        self.builder().build(&mut ctx)
    }

    /// Compile and persist one schema
    pub fn build(&self, name: &str) -> Result<PersistReport> {
        let schema = self.compile(name)?;
        self.store.persist(&schema)
    }

    /// Build every configured schema, in name order
    pub fn build_all(&self) -> Result<Vec<(String, PersistReport)>> {
        let names: Vec<String> = self.config.schema_names().map(str::to_string).collect();
        info!(schemas = names.len(), "building all schemas");
        names
            .into_iter()
            .map(|name| {
                let report = self.build(&name)?;
                Ok((name, report))
            })
            .collect()
    }

    pub fn clear(&self, name: &str) -> Result<()> {
        self.store.clear(name)
    }

    /// Runtime over the generated output; rebuilds on demand when `auto_build` is set
    pub fn runtime(self: &Arc<Self>, name: &str) -> SchemaRuntime {
        let runtime = SchemaRuntime::new(self.store.root(), name, Arc::clone(&self.resolvers));
        if !self.config.output.auto_build {
            return runtime;
        }
        let compiler = Arc::clone(self);
        runtime.with_rebuild(move |schema| compiler.build(schema).map(|_| ()))
    }
}

/// `*.toml` and `*.json` files directly under `dir`, as `(stem, value)` in file name order
fn read_fragments(dir: &Path) -> Result<Vec<(String, Value)>> {
    let mut fragments = Vec::new();
    for entry in WalkDir::new(dir).min_depth(1).max_depth(1).sort_by_file_name() {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
            continue;
        };
        let content = fs::read_to_string(path)?;
        let value: Value = match path.extension().and_then(|e| e.to_str()) {
            Some("toml") => toml::from_str(&content)?,
            Some("json") => serde_json::from_str(&content)?,
            _ => continue,
        };
        fragments.push((stem.to_string(), value));
    }
    // Keep `schema` first so stem fragments refine it
    fragments.sort_by_key(|(stem, _)| stem != ROOT_FRAGMENT);
    Ok(fragments)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_read_fragments_puts_schema_first() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("bulkLoad.toml"), "[content]\n").unwrap();
        fs::write(dir.path().join("schema.json"), r#"{"defaultResolver": "Builtin::resolve"}"#).unwrap();
        fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let fragments = read_fragments(dir.path()).unwrap();
        let stems: Vec<&str> = fragments.iter().map(|(stem, _)| stem.as_str()).collect();
        assert_eq!(stems, vec!["schema", "bulkLoad"]);
    }

    #[test]
    fn test_read_fragments_reports_walk_errors() {
        let dir = tempdir().unwrap();
        let err = read_fragments(&dir.path().join("missing")).unwrap_err();
        assert!(matches!(err, SchemaError::Walk(_)));
    }
}
