//! Generated schema runtime
//!
//! Reads a persisted schema directory back: the registry first, then
//! artifacts lazily by name. Resolvers come back as [`EncodedResolver`] data
//! and are bound against a [`ResolverRegistry`] on request.
//!
//! A missing schema or artifact is treated as stale output. With a rebuild
//! hook installed the runtime rebuilds once and retries; a second failure is
//! returned as is.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use regex::Regex;
use tracing::{debug, info, warn};

use crate::codegen::{ArtifactRegistry, REGISTRY_FILE, RESOLVER_DIRECTIVE};
use crate::error::{Result, SchemaError};
use crate::resolver::{ComposedResolver, EncodedResolver, ResolverRegistry};
use crate::schema::ArtifactKind;

/// One generated artifact, parsed
#[derive(Debug, Clone)]
pub struct Artifact {
    pub name: String,
    pub kind: ArtifactKind,
    pub source: String,
    resolvers: BTreeMap<String, EncodedResolver>,
}

impl Artifact {
    /// Encoded resolvers by field name
    pub fn resolvers(&self) -> &BTreeMap<String, EncodedResolver> {
        &self.resolvers
    }

    pub fn resolver(&self, field: &str) -> Option<&EncodedResolver> {
        self.resolvers.get(field)
    }
}

/// Pull `field → encoded resolver` out of generated SDL
fn parse_resolvers(source: &str) -> Result<BTreeMap<String, EncodedResolver>> {
    let pattern = format!(
        r#"(?m)^\s*(\w+)(?:\([^)]*\))?\s*:\s*[^@\n]*@{}\(encoded:\s*("(?:[^"\\]|\\.)*")\)"#,
        RESOLVER_DIRECTIVE
    );
    let re = Regex::new(&pattern)?;

    let mut resolvers = BTreeMap::new();
    for caps in re.captures_iter(source) {
        let literal: String = serde_json::from_str(&caps[2])?;
        resolvers.insert(caps[1].to_string(), EncodedResolver::decode(&literal)?);
    }
    Ok(resolvers)
}

// =============================================================================
// GeneratedSchema
// =============================================================================

/// A persisted schema, opened from its registry
#[derive(Debug)]
pub struct GeneratedSchema {
    name: String,
    directory: PathBuf,
    registry: ArtifactRegistry,
    artifacts: RwLock<HashMap<String, Arc<Artifact>>>,
}

impl GeneratedSchema {
    pub fn open(root: &Path, name: &str) -> Result<Self> {
        let directory = root.join(name);
        let registry_path = directory.join(REGISTRY_FILE);
        if !registry_path.is_file() {
            return Err(SchemaError::SchemaNotBuilt(name.to_string()));
        }
        let registry: ArtifactRegistry = serde_json::from_str(&fs::read_to_string(&registry_path)?)?;
        if registry.schema != name {
            warn!(schema = name, found = %registry.schema, "registry belongs to another schema");
            return Err(SchemaError::SchemaNotBuilt(name.to_string()));
        }
        debug!(schema = name, artifacts = registry.artifacts.len(), "opened generated schema");
        Ok(Self {
            name: name.to_string(),
            directory,
            registry,
            artifacts: RwLock::new(HashMap::new()),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    pub fn registry(&self) -> &ArtifactRegistry {
        &self.registry
    }

    pub fn artifact_names(&self) -> impl Iterator<Item = &str> {
        self.registry.artifacts.keys().map(String::as_str)
    }

    /// Load an artifact on first use
    pub fn artifact(&self, name: &str) -> Result<Arc<Artifact>> {
        if let Some(artifact) = self
            .artifacts
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(name)
        {
            return Ok(Arc::clone(artifact));
        }

        let not_found = || SchemaError::ArtifactNotFound {
            schema: self.name.clone(),
            name: name.to_string(),
        };
        let entry = self.registry.artifacts.get(name).ok_or_else(not_found)?;
        let path = self.directory.join(&entry.file);
        if !path.is_file() {
            return Err(not_found());
        }

        let source = fs::read_to_string(&path)?;
        let artifact = Arc::new(Artifact {
            name: name.to_string(),
            kind: entry.kind,
            resolvers: parse_resolvers(&source)?,
            source,
        });
        self.artifacts
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(name.to_string(), Arc::clone(&artifact));
        Ok(artifact)
    }

    /// Bind the resolver of `type_name.field`
    pub fn resolver(&self, type_name: &str, field: &str, registry: &ResolverRegistry) -> Result<ComposedResolver> {
        let artifact = self.artifact(type_name)?;
        let encoded = artifact
            .resolver(field)
            .ok_or_else(|| SchemaError::UnresolvedField {
                type_name: type_name.to_string(),
                field: field.to_string(),
            })?;
        encoded.compose(registry)
    }
}

// =============================================================================
// SchemaRuntime
// =============================================================================

/// Rebuilds one schema by name
pub type RebuildFn = Box<dyn Fn(&str) -> Result<()> + Send + Sync>;

/// Serves one generated schema, rebuilding it once when it is stale
pub struct SchemaRuntime {
    root: PathBuf,
    name: String,
    resolvers: Arc<ResolverRegistry>,
    loaded: RwLock<Option<Arc<GeneratedSchema>>>,
    rebuild: Option<RebuildFn>,
}

impl std::fmt::Debug for SchemaRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SchemaRuntime")
            .field("root", &self.root)
            .field("name", &self.name)
            .field("self_healing", &self.rebuild.is_some())
            .finish_non_exhaustive()
    }
}

impl SchemaRuntime {
    pub fn new(root: impl Into<PathBuf>, name: impl Into<String>, resolvers: Arc<ResolverRegistry>) -> Self {
        Self {
            root: root.into(),
            name: name.into(),
            resolvers,
            loaded: RwLock::new(None),
            rebuild: None,
        }
    }

    /// Install the hook used to heal a stale schema
    pub fn with_rebuild<F>(mut self, rebuild: F) -> Self
    where
        F: Fn(&str) -> Result<()> + Send + Sync + 'static,
    {
        self.rebuild = Some(Box::new(rebuild));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn schema(&self) -> Result<Arc<GeneratedSchema>> {
        self.with_retry(|schema| Ok(Arc::clone(schema)))
    }

    pub fn artifact(&self, name: &str) -> Result<Arc<Artifact>> {
        self.with_retry(|schema| schema.artifact(name))
    }

    pub fn resolver(&self, type_name: &str, field: &str) -> Result<ComposedResolver> {
        self.with_retry(|schema| schema.resolver(type_name, field, &self.resolvers))
    }

    /// Forget the loaded schema; the next request reopens it
    pub fn invalidate(&self) {
        *self.loaded.write().unwrap_or_else(|e| e.into_inner()) = None;
    }

    fn load(&self) -> Result<Arc<GeneratedSchema>> {
        if let Some(schema) = self.loaded.read().unwrap_or_else(|e| e.into_inner()).as_ref() {
            return Ok(Arc::clone(schema));
        }
        let schema = Arc::new(GeneratedSchema::open(&self.root, &self.name)?);
        *self.loaded.write().unwrap_or_else(|e| e.into_inner()) = Some(Arc::clone(&schema));
        Ok(schema)
    }

    fn with_retry<T, F>(&self, op: F) -> Result<T>
    where
        F: Fn(&Arc<GeneratedSchema>) -> Result<T>,
    {
        let first = self.load().and_then(|schema| op(&schema));
        match (first, &self.rebuild) {
            (Err(e), Some(rebuild)) if e.is_stale_schema() => {
                info!(schema = %self.name, reason = %e, "schema is stale, rebuilding");
                self.invalidate();
                rebuild(&self.name)?;
                let schema = self.load()?;
                op(&schema)
            }
            (result, _) => result,
        }
    }
}
