//! Code Generation Store
//!
//! Persists a compiled [`Schema`] as one directory of generated artifacts.
//!
//! A run goes `STAGE → DIFF → SWAP → RECONCILE`:
//! - STAGE: copy the live directory into a private temp directory next to it
//!   (or seed sentinel files for a first build)
//! - DIFF: re-render only artifacts whose signature differs from the cache
//! - SWAP: move the staged tree into place; the only live mutation
//! - RECONCILE: delete artifacts the schema no longer has
//!
//! Nothing under the live directory changes unless every artifact staged.

pub mod artifact;
pub mod cache;
pub mod template;

pub use artifact::{
    artifact_file, ArtifactRegistry, RegistryEntry, ARTIFACT_EXTENSION, REGISTRY_FILE,
    RESOLVER_DIRECTIVE,
};
pub use cache::{cache_key, CacheStore, FileCacheStore, MemoryCacheStore};
pub use template::{HandlebarsEncoder, TemplateEncoder};

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use tempfile::TempDir;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::error::{Result, SchemaError};
use crate::schema::Schema;
use crate::signature::Signature;

/// Outcome of one persist run
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PersistReport {
    /// Artifacts rendered this run
    pub written: Vec<String>,
    /// Artifacts kept from the previous run
    pub unchanged: Vec<String>,
    /// Artifacts removed because the schema no longer has them
    pub deleted: Vec<String>,
    pub directory: PathBuf,
}

/// Writes schemas under `root/<schema>/`
pub struct CodeGenerationStore {
    root: PathBuf,
    cache: Arc<dyn CacheStore>,
    encoder: Arc<dyn TemplateEncoder>,
}

impl std::fmt::Debug for CodeGenerationStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CodeGenerationStore")
            .field("root", &self.root)
            .finish_non_exhaustive()
    }
}

impl CodeGenerationStore {
    pub fn new(
        root: impl Into<PathBuf>,
        cache: Arc<dyn CacheStore>,
        encoder: Arc<dyn TemplateEncoder>,
    ) -> Self {
        Self {
            root: root.into(),
            cache,
            encoder,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn cache(&self) -> &Arc<dyn CacheStore> {
        &self.cache
    }

    /// Live directory of one schema
    pub fn schema_dir(&self, schema: &str) -> PathBuf {
        self.root.join(schema)
    }

    pub fn persist(&self, schema: &Schema) -> Result<PersistReport> {
        let name = schema.name();
        let live = self.schema_dir(name);
        fs::create_dir_all(&self.root)?;

        // STAGE
        let staging = tempfile::Builder::new()
            .prefix(&format!(".{}-staging-", name))
            .tempdir_in(&self.root)?;
        if live.is_dir() {
            copy_tree(&live, staging.path())?;
            debug!(schema = name, from = %live.display(), "staged live directory");
        }
        for (file, content) in artifact::SENTINELS {
            let path = staging.path().join(file);
            if !path.exists() {
                fs::write(path, content)?;
            }
        }

        // DIFF
        let mut report = PersistReport {
            directory: live.clone(),
            ..Default::default()
        };
        let mut registry = ArtifactRegistry::new(name);
        let mut touched = BTreeSet::new();
        let mut pending: Vec<(String, Signature)> = Vec::new();

        for definition in schema.definitions() {
            let artifact_name = definition.name();
            let file = artifact_file(artifact_name);
            let staged = staging.path().join(&file);
            let signature = artifact::signature(definition)?;
            let key = cache_key(name, artifact_name);

            if signature.matches(self.cache.get(&key)?.as_deref()) && staged.is_file() {
                debug!(schema = name, artifact = artifact_name, "unchanged");
                report.unchanged.push(artifact_name.to_string());
            } else {
                let scope = artifact::scope(definition, schema)?;
                let text = self.encoder.render(definition.kind().as_str(), &scope)?;
                fs::write(&staged, text)?;
                debug!(schema = name, artifact = artifact_name, kind = %definition.kind(), "rendered");
                report.written.push(artifact_name.to_string());
                pending.push((key, signature.clone()));
            }

            touched.insert(file);
            registry.insert(artifact_name, definition.kind(), signature);
        }

        let registry_text = registry.to_json()?;
        let registry_path = staging.path().join(REGISTRY_FILE);
        if fs::read_to_string(&registry_path).ok().as_deref() != Some(registry_text.as_str()) {
            fs::write(&registry_path, registry_text)?;
        }

        // SWAP
        self.swap(name, staging, &live)?;
        for (key, signature) in pending {
            self.cache.set(&key, signature.as_str())?;
        }

        // RECONCILE
        for entry in fs::read_dir(&live)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some(ARTIFACT_EXTENSION) {
                continue;
            }
            let Some(file) = path.file_name().and_then(|f| f.to_str()) else {
                continue;
            };
            if touched.contains(file) {
                continue;
            }
            let artifact_name = file.trim_end_matches(&format!(".{}", ARTIFACT_EXTENSION));
            fs::remove_file(&path)?;
            self.cache.delete(&cache_key(name, artifact_name))?;
            debug!(schema = name, artifact = artifact_name, "deleted stale artifact");
            report.deleted.push(artifact_name.to_string());
        }
        report.deleted.sort();

        info!(
            schema = name,
            written = report.written.len(),
            unchanged = report.unchanged.len(),
            deleted = report.deleted.len(),
            "schema persisted"
        );
        Ok(report)
    }

    /// Remove a schema's live directory and cache entries
    pub fn clear(&self, schema: &str) -> Result<()> {
        let live = self.schema_dir(schema);
        if live.is_dir() {
            fs::remove_dir_all(&live)?;
        }
        let prefix = cache_key(schema, "");
        let mut removed = 0;
        for key in self.cache.keys()? {
            if key.starts_with(&prefix) {
                self.cache.delete(&key)?;
                removed += 1;
            }
        }
        info!(schema, cache_entries = removed, "schema cleared");
        Ok(())
    }

    fn swap(&self, schema: &str, staging: TempDir, live: &Path) -> Result<()> {
        let backup = self.root.join(format!(".{}-previous", schema));
        if backup.exists() {
            fs::remove_dir_all(&backup)?;
        }

        let had_live = live.exists();
        if had_live {
            fs::rename(live, &backup).map_err(|e| SchemaError::Staging {
                schema: schema.to_string(),
                message: format!("could not move {} aside: {}", live.display(), e),
            })?;
        }

        if let Err(e) = fs::rename(staging.path(), live) {
            if had_live {
                if let Err(restore) = fs::rename(&backup, live) {
                    warn!(schema, error = %restore, "could not restore previous schema directory");
                }
            }
            return Err(SchemaError::Staging {
                schema: schema.to_string(),
                message: format!("could not move staged schema into place: {}", e),
            });
        }
        // The staged tree now lives at `live`; dropping the handle finds nothing left to remove.
        drop(staging);

        if had_live {
            fs::remove_dir_all(&backup)?;
        }
        Ok(())
    }
}

/// Copy every file under `from` into `to`, keeping relative paths
fn copy_tree(from: &Path, to: &Path) -> Result<()> {
    for entry in WalkDir::new(from).min_depth(1) {
        let entry = entry.map_err(|e| SchemaError::Staging {
            schema: from.display().to_string(),
            message: e.to_string(),
        })?;
        let Ok(relative) = entry.path().strip_prefix(from) else {
            continue;
        };
        let target = to.join(relative);
        if entry.file_type().is_dir() {
            fs::create_dir_all(&target)?;
        } else if entry.file_type().is_file() {
            fs::copy(entry.path(), &target)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::{EncodedResolver, ResolverRef};
    use crate::schema::{Definition, Field, ObjectType, ScalarType};
    use serde_json::Value;
    use tempfile::tempdir;

    fn schema(titles: bool) -> Schema {
        let mut schema = Schema::new("default");
        let mut page = ObjectType::new("Page");
        page.add_field(Field::new("id", "ID!"));
        if titles {
            page.add_field(
                Field::new("title", "String")
                    .with_resolver(EncodedResolver::new(ResolverRef::new("Builtin", "resolve"))),
            );
        }
        schema.add(Definition::Object(page)).unwrap();
        schema
            .add(Definition::Scalar(ScalarType {
                name: "DateTime".to_string(),
                description: None,
            }))
            .unwrap();
        schema
    }

    fn store(root: &Path) -> (CodeGenerationStore, Arc<MemoryCacheStore>) {
        let cache = Arc::new(MemoryCacheStore::new());
        let store = CodeGenerationStore::new(
            root,
            cache.clone(),
            Arc::new(HandlebarsEncoder::new().unwrap()),
        );
        (store, cache)
    }

    fn entries(dir: &Path) -> Vec<String> {
        let mut names: Vec<_> = fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn test_first_build_writes_everything() {
        let dir = tempdir().unwrap();
        let (store, cache) = store(dir.path());

        let report = store.persist(&schema(true)).unwrap();
        assert_eq!(report.written, vec!["DateTime", "Page"]);
        assert!(report.unchanged.is_empty());
        assert_eq!(
            entries(&report.directory),
            vec![
                ".gitattributes",
                "DateTime.graphql",
                "Page.graphql",
                "__registry.json",
                "_manifest_exclude"
            ]
        );
        assert_eq!(cache.snapshot().len(), 2);

        let page = fs::read_to_string(report.directory.join("Page.graphql")).unwrap();
        assert!(page.contains("type Page {"));
        assert!(page.contains(r#"title: String @resolver(encoded: "{\"ref\":\"Builtin::resolve\"}")"#));

        let registry: Value =
            serde_json::from_str(&fs::read_to_string(report.directory.join(REGISTRY_FILE)).unwrap())
                .unwrap();
        assert_eq!(registry["artifacts"]["DateTime"]["kind"], "scalar");
    }

    #[test]
    fn test_second_build_is_idempotent() {
        let dir = tempdir().unwrap();
        let (store, cache) = store(dir.path());
        store.persist(&schema(true)).unwrap();
        let cache_before = cache.snapshot();
        let page_before = fs::read_to_string(store.schema_dir("default").join("Page.graphql")).unwrap();

        let report = store.persist(&schema(true)).unwrap();
        assert!(report.written.is_empty());
        assert_eq!(report.unchanged, vec!["DateTime", "Page"]);
        assert_eq!(cache.snapshot(), cache_before);
        assert_eq!(
            fs::read_to_string(store.schema_dir("default").join("Page.graphql")).unwrap(),
            page_before
        );
    }

    #[test]
    fn test_changed_definition_is_rewritten() {
        let dir = tempdir().unwrap();
        let (store, _) = store(dir.path());
        store.persist(&schema(false)).unwrap();

        let report = store.persist(&schema(true)).unwrap();
        assert_eq!(report.written, vec!["Page"]);
        assert_eq!(report.unchanged, vec!["DateTime"]);
    }

    #[test]
    fn test_removed_artifacts_are_reconciled() {
        let dir = tempdir().unwrap();
        let (store, cache) = store(dir.path());
        store.persist(&schema(true)).unwrap();

        let mut smaller = Schema::new("default");
        smaller.add(Definition::Object(ObjectType::new("Page"))).unwrap();
        let report = store.persist(&smaller).unwrap();

        assert_eq!(report.deleted, vec!["DateTime"]);
        assert!(!store.schema_dir("default").join("DateTime.graphql").exists());
        assert!(!cache.snapshot().contains_key("default:DateTime"));
    }

    #[test]
    fn test_no_staging_directories_left_behind() {
        let dir = tempdir().unwrap();
        let (store, _) = store(dir.path());
        store.persist(&schema(true)).unwrap();
        store.persist(&schema(false)).unwrap();
        assert_eq!(entries(dir.path()), vec!["default"]);
    }

    #[test]
    fn test_clear_removes_directory_and_cache() {
        let dir = tempdir().unwrap();
        let (store, cache) = store(dir.path());
        store.persist(&schema(true)).unwrap();
        cache.set("other:Page", "x").unwrap();

        store.clear("default").unwrap();
        assert!(!store.schema_dir("default").exists());
        assert_eq!(cache.keys().unwrap(), vec!["other:Page"]);
    }
}
