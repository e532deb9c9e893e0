//! Configuration management for the schema compiler
//!
//! Supports loading configuration from:
//! - Default values
//! - Config file (schema-compiler.toml)
//! - Environment variables (SCHEMA_COMPILER__*)
//!
//! ## Example config file (schema-compiler.toml):
//! ```toml
//! resolvers = ["App"]
//! resolver_strategy = "convention"
//! default_resolver = "Builtin::resolve"
//!
//! [project]
//! root = "."
//! class_paths = ["models"]
//!
//! [output]
//! path = "generated/graphql"
//! cache = ".graphql-cache/signatures.json"
//! auto_build = true
//!
//! [model_config.Entity]
//! type_prefix = ""
//!
//! [schemas.default]
//! src = ["graphql/default"]
//! ```
//!
//! Relative paths resolve against `project.root`, which itself resolves
//! against the working directory.

use config_crate::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Main configuration for the schema compiler
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompilerConfig {
    /// Project settings
    #[serde(default)]
    pub project: ProjectConfig,

    /// Generated output settings
    #[serde(default)]
    pub output: OutputConfig,

    /// Resolver providers, searched in order
    #[serde(default)]
    pub resolvers: Vec<String>,

    /// Discovery strategy name
    #[serde(default = "default_resolver_strategy")]
    pub resolver_strategy: String,

    /// Global fallback resolver, `Owner::method`
    #[serde(default = "default_resolver")]
    pub default_resolver: String,

    /// Per-model-kind settings, e.g. `model_config.Entity.type_prefix`
    #[serde(default)]
    pub model_config: BTreeMap<String, Map<String, Value>>,

    /// Schemas by name
    #[serde(default)]
    pub schemas: BTreeMap<String, SchemaSource>,
}

/// Project configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectConfig {
    /// Project root
    #[serde(default = "default_root")]
    pub root: PathBuf,

    /// Directories holding class descriptors
    #[serde(default = "default_class_paths")]
    pub class_paths: Vec<PathBuf>,
}

/// Output configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Root of generated schema directories
    #[serde(default = "default_output_path")]
    pub path: PathBuf,

    /// Signature cache file
    #[serde(default = "default_cache_path")]
    pub cache: PathBuf,

    /// Template override directory
    #[serde(default)]
    pub templates: Option<PathBuf>,

    /// Rebuild a missing or stale schema on first use
    #[serde(default = "default_true")]
    pub auto_build: bool,
}

/// Where one schema's settings fragments live
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SchemaSource {
    #[serde(default)]
    pub src: Vec<PathBuf>,
}

// Default value functions
fn default_root() -> PathBuf {
    PathBuf::from(".")
}

fn default_class_paths() -> Vec<PathBuf> {
    vec![PathBuf::from("models")]
}

fn default_output_path() -> PathBuf {
    PathBuf::from("generated/graphql")
}

fn default_cache_path() -> PathBuf {
    PathBuf::from(".graphql-cache/signatures.json")
}

fn default_resolver_strategy() -> String {
    "convention".to_string()
}

fn default_resolver() -> String {
    "Builtin::resolve".to_string()
}

fn default_true() -> bool {
    true
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            root: default_root(),
            class_paths: default_class_paths(),
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            path: default_output_path(),
            cache: default_cache_path(),
            templates: None,
            auto_build: true,
        }
    }
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            project: ProjectConfig::default(),
            output: OutputConfig::default(),
            resolvers: Vec::new(),
            resolver_strategy: default_resolver_strategy(),
            default_resolver: default_resolver(),
            model_config: BTreeMap::new(),
            schemas: BTreeMap::new(),
        }
    }
}

impl CompilerConfig {
    /// Load configuration from a specific file
    pub fn load_from(config_path: Option<&str>) -> Result<Self, ConfigError> {
        let mut builder = Config::builder();

        // Load from default locations
        let config_locations = [
            "schema-compiler.toml",
            ".schema-compiler.toml",
            "config/schema-compiler.toml",
        ];

        for location in config_locations {
            builder = builder.add_source(File::with_name(location).required(false));
        }

        // Load from XDG config directory
        if let Some(config_dir) = directories::ProjectDirs::from("dev", "schema-compiler", "schema-compiler") {
            let xdg_config = config_dir.config_dir().join("schema-compiler.toml");
            if xdg_config.exists() {
                builder = builder.add_source(File::from(xdg_config).required(false));
            }
        }

        // Load from specified path
        if let Some(path) = config_path {
            builder = builder.add_source(File::with_name(path).required(true));
        }

        // Load from environment variables (SCHEMA_COMPILER__*)
        builder = builder.add_source(
            Environment::with_prefix("SCHEMA_COMPILER")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build()?;
        config.try_deserialize()
    }

    /// Get the project root (resolves relative paths)
    pub fn project_root(&self) -> PathBuf {
        if self.project.root.is_absolute() {
            self.project.root.clone()
        } else {
            std::env::current_dir()
                .unwrap_or_default()
                .join(&self.project.root)
        }
    }

    /// Resolve a path against the project root
    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.project_root().join(path)
        }
    }

    pub fn class_paths(&self) -> Vec<PathBuf> {
        self.project.class_paths.iter().map(|p| self.resolve(p)).collect()
    }

    pub fn output_path(&self) -> PathBuf {
        self.resolve(&self.output.path)
    }

    pub fn cache_path(&self) -> PathBuf {
        self.resolve(&self.output.cache)
    }

    pub fn templates_path(&self) -> Option<PathBuf> {
        self.output.templates.as_deref().map(|p| self.resolve(p))
    }

    pub fn schema_names(&self) -> impl Iterator<Item = &str> {
        self.schemas.keys().map(String::as_str)
    }

    /// Fragment directories of one schema, resolved
    pub fn schema_sources(&self, name: &str) -> Option<Vec<PathBuf>> {
        self.schemas
            .get(name)
            .map(|s| s.src.iter().map(|p| self.resolve(p)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_default_config() {
        let config = CompilerConfig::default();
        assert!(config.output.auto_build);
        assert_eq!(config.resolver_strategy, "convention");
        assert_eq!(config.default_resolver, "Builtin::resolve");
        assert_eq!(config.project.class_paths, vec![PathBuf::from("models")]);
    }

    #[test]
    fn test_serialize_config() {
        let config = CompilerConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        assert!(toml_str.contains("[project]"));
        assert!(toml_str.contains("[output]"));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("compiler.toml");
        std::fs::write(
            &path,
            r#"
resolvers = ["App"]

[project]
root = "/srv/site"

[output]
auto_build = false

[schemas.default]
src = ["graphql/default"]
"#,
        )
        .unwrap();

        let config = CompilerConfig::load_from(path.to_str()).unwrap();
        assert_eq!(config.resolvers, vec!["App"]);
        assert!(!config.output.auto_build);
        assert_eq!(
            config.schema_sources("default"),
            Some(vec![PathBuf::from("/srv/site/graphql/default")])
        );
        assert_eq!(config.output_path(), PathBuf::from("/srv/site/generated/graphql"));
        assert!(config.schema_sources("admin").is_none());
    }
}
