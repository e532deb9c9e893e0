//! Class Index
//!
//! Loads class descriptor files from the configured class paths, builds the
//! inheritance graph, and answers the reflection questions bulk loaders ask
//! (existence, subclassing, marker membership).
//!
//! One descriptor per file; TOML and JSON are both accepted:
//!
//! ```toml
//! class = "App.Models.Page"
//! extends = "App.Models.Record"
//! markers = ["App.Roles.Versioned"]
//!
//! [fields]
//! title = "String"
//! author = "App.Models.Member"
//! ```

pub mod collection;

pub use collection::Collection;

use petgraph::algo::{has_path_connecting, toposort};
use petgraph::graph::{DiGraph, NodeIndex};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

use crate::error::{Result, SchemaError};

// =============================================================================
// Reflection
// =============================================================================

/// Runtime class facts consumed by bulk loaders.
///
/// Loaders never inspect descriptors directly; they only ask these questions,
/// so any class source can back them.
pub trait Reflection: Send + Sync {
    /// Whether `class` names a known class (not a marker)
    fn class_exists(&self, class: &str) -> bool;

    /// Whether `marker` names a known marker
    fn marker_exists(&self, marker: &str) -> bool;

    /// Whether `class` strictly descends from `ancestor`
    fn is_subclass_of(&self, class: &str, ancestor: &str) -> bool;

    /// Whether `class`, or any ancestor, carries `marker`
    fn has_marker(&self, class: &str, marker: &str) -> bool;

    /// Every known class and marker name, used for suggestions
    fn known_names(&self) -> Vec<&str> {
        Vec::new()
    }
}

// =============================================================================
// Descriptors
// =============================================================================

/// What a descriptor declares
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClassKind {
    #[default]
    Class,
    /// A role/capability classes can carry
    Marker,
}

/// A field as written in a descriptor: either just a type, or a full table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldSpec {
    Short(String),
    Full(FieldDescriptor),
}

/// Full field declaration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDescriptor {
    #[serde(rename = "type")]
    pub type_ref: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub args: BTreeMap<String, String>,
    /// Explicit resolver reference, `Owner::method`
    #[serde(default)]
    pub resolver: Option<String>,
}

impl FieldSpec {
    pub fn type_ref(&self) -> &str {
        match self {
            Self::Short(t) => t,
            Self::Full(f) => &f.type_ref,
        }
    }

    pub fn description(&self) -> Option<&str> {
        match self {
            Self::Short(_) => None,
            Self::Full(f) => f.description.as_deref(),
        }
    }

    pub fn args(&self) -> Option<&BTreeMap<String, String>> {
        match self {
            Self::Short(_) => None,
            Self::Full(f) => Some(&f.args),
        }
    }

    pub fn resolver(&self) -> Option<&str> {
        match self {
            Self::Short(_) => None,
            Self::Full(f) => f.resolver.as_deref(),
        }
    }
}

/// A class (or marker) declaration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassDescriptor {
    pub class: String,
    #[serde(default)]
    pub kind: ClassKind,
    #[serde(default)]
    pub extends: Option<String>,
    #[serde(default)]
    pub markers: Vec<String>,
    #[serde(default, rename = "abstract")]
    pub is_abstract: bool,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub fields: BTreeMap<String, FieldSpec>,
    /// Declaring file; filled in by the loader
    #[serde(skip)]
    pub path: PathBuf,
}

impl ClassDescriptor {
    /// In-memory descriptor, mostly for tests and programmatic setups
    pub fn new(class: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            class: class.into(),
            kind: ClassKind::Class,
            extends: None,
            markers: Vec::new(),
            is_abstract: false,
            description: None,
            fields: BTreeMap::new(),
            path: path.into(),
        }
    }

    pub fn marker(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            kind: ClassKind::Marker,
            ..Self::new(name, path)
        }
    }

    pub fn extends(mut self, parent: impl Into<String>) -> Self {
        self.extends = Some(parent.into());
        self
    }

    pub fn with_marker(mut self, marker: impl Into<String>) -> Self {
        self.markers.push(marker.into());
        self
    }

    pub fn with_field(mut self, name: impl Into<String>, type_ref: impl Into<String>) -> Self {
        self.fields.insert(name.into(), FieldSpec::Short(type_ref.into()));
        self
    }

    /// Parse a descriptor file (`.toml` or `.json`)
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let invalid = |message: String| SchemaError::InvalidDescriptor {
            path: path.display().to_string(),
            message,
        };

        let mut descriptor: ClassDescriptor = match path.extension().and_then(|e| e.to_str()) {
            Some("json") => serde_json::from_str(&content).map_err(|e| invalid(e.to_string()))?,
            Some("toml") => toml::from_str(&content).map_err(|e| invalid(e.to_string()))?,
            other => return Err(invalid(format!("unsupported extension {:?}", other))),
        };

        if descriptor.class.trim().is_empty() {
            return Err(invalid("'class' must not be empty".to_string()));
        }

        descriptor.path = fs::canonicalize(path)?;
        Ok(descriptor)
    }
}

// =============================================================================
// Class Index
// =============================================================================

/// All known classes and markers, with their inheritance graph
#[derive(Debug)]
pub struct ClassIndex {
    descriptors: BTreeMap<String, ClassDescriptor>,
    /// Markers referenced by classes without their own descriptor
    implicit_markers: BTreeSet<String>,
    /// Edges point from child to parent
    graph: DiGraph<String, ()>,
    node_indices: HashMap<String, NodeIndex>,
}

impl ClassIndex {
    /// Load every descriptor under the given class paths
    pub fn load(class_paths: &[PathBuf]) -> Result<Self> {
        let mut descriptors = Vec::new();

        for root in class_paths {
            if !root.is_dir() {
                return Err(SchemaError::config(
                    "project.class_paths",
                    format!("{} is not a directory", root.display()),
                ));
            }

            for entry in WalkDir::new(root).sort_by_file_name() {
                let entry = entry?;
                let path = entry.path();
                if !path.is_file() {
                    continue;
                }
                let is_descriptor = path
                    .extension()
                    .map(|ext| ext == "toml" || ext == "json")
                    .unwrap_or(false);
                if !is_descriptor {
                    continue;
                }

                descriptors.push(ClassDescriptor::from_file(path)?);
            }
        }

        debug!(count = descriptors.len(), "loaded class descriptors");
        Self::from_descriptors(descriptors)
    }

    /// Build an index from descriptors, validating parents and cycles
    pub fn from_descriptors(descriptors: Vec<ClassDescriptor>) -> Result<Self> {
        let mut by_name: BTreeMap<String, ClassDescriptor> = BTreeMap::new();
        for descriptor in descriptors {
            if let Some(existing) = by_name.get(&descriptor.class) {
                return Err(SchemaError::DuplicateClass {
                    class: descriptor.class.clone(),
                    first: existing.path.display().to_string(),
                    second: descriptor.path.display().to_string(),
                });
            }
            by_name.insert(descriptor.class.clone(), descriptor);
        }

        let mut graph = DiGraph::with_capacity(by_name.len(), by_name.len());
        let mut node_indices = HashMap::with_capacity(by_name.len());
        for name in by_name.keys() {
            node_indices.insert(name.clone(), graph.add_node(name.clone()));
        }

        let mut implicit_markers = BTreeSet::new();
        for descriptor in by_name.values() {
            if let Some(parent) = &descriptor.extends {
                let parent_kind = by_name.get(parent).map(|p| p.kind);
                if parent_kind != Some(descriptor.kind) {
                    return Err(SchemaError::InvalidDescriptor {
                        path: descriptor.path.display().to_string(),
                        message: format!("parent '{}' is not a known {:?}", parent, descriptor.kind),
                    });
                }
                graph.add_edge(node_indices[&descriptor.class], node_indices[parent], ());
            }

            for marker in &descriptor.markers {
                match by_name.get(marker).map(|m| m.kind) {
                    Some(ClassKind::Marker) => {}
                    Some(ClassKind::Class) => {
                        return Err(SchemaError::InvalidDescriptor {
                            path: descriptor.path.display().to_string(),
                            message: format!("'{}' is a class, not a marker", marker),
                        });
                    }
                    None => {
                        implicit_markers.insert(marker.clone());
                    }
                }
            }
        }

        if let Err(cycle) = toposort(&graph, None) {
            let class = graph[cycle.node_id()].clone();
            let path = by_name
                .get(&class)
                .map(|d| d.path.display().to_string())
                .unwrap_or_default();
            return Err(SchemaError::InvalidDescriptor {
                path,
                message: format!("inheritance cycle through '{}'", class),
            });
        }

        Ok(Self {
            descriptors: by_name,
            implicit_markers,
            graph,
            node_indices,
        })
    }

    /// The initial collection: every concrete-or-abstract class, no markers
    pub fn collection(&self) -> Collection {
        self.descriptors
            .values()
            .filter(|d| d.kind == ClassKind::Class)
            .map(|d| (d.class.clone(), d.path.clone()))
            .collect()
    }

    pub fn descriptor(&self, class: &str) -> Option<&ClassDescriptor> {
        self.descriptors.get(class)
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    /// Ancestors of `class`, nearest first
    pub fn ancestors(&self, class: &str) -> Vec<&ClassDescriptor> {
        let mut result = Vec::new();
        let mut current = self.descriptors.get(class).and_then(|d| d.extends.as_deref());
        while let Some(name) = current {
            match self.descriptors.get(name) {
                Some(parent) => {
                    result.push(parent);
                    current = parent.extends.as_deref();
                }
                None => break,
            }
        }
        result
    }

    /// Fields of `class` including inherited ones; the nearest declaration wins
    pub fn fields_of(&self, class: &str) -> BTreeMap<String, FieldSpec> {
        let mut fields = BTreeMap::new();
        let Some(descriptor) = self.descriptors.get(class) else {
            return fields;
        };

        for ancestor in self.ancestors(class).into_iter().rev() {
            fields.extend(ancestor.fields.clone());
        }
        fields.extend(descriptor.fields.clone());
        fields
    }

    fn is_kind(&self, name: &str, kind: ClassKind) -> bool {
        self.descriptors.get(name).map(|d| d.kind) == Some(kind)
    }
}

impl Reflection for ClassIndex {
    fn class_exists(&self, class: &str) -> bool {
        self.is_kind(class, ClassKind::Class)
    }

    fn marker_exists(&self, marker: &str) -> bool {
        self.is_kind(marker, ClassKind::Marker) || self.implicit_markers.contains(marker)
    }

    fn is_subclass_of(&self, class: &str, ancestor: &str) -> bool {
        if class == ancestor {
            return false;
        }
        match (self.node_indices.get(class), self.node_indices.get(ancestor)) {
            (Some(&from), Some(&to)) => has_path_connecting(&self.graph, from, to, None),
            _ => false,
        }
    }

    fn has_marker(&self, class: &str, marker: &str) -> bool {
        let Some(descriptor) = self.descriptors.get(class) else {
            return false;
        };
        std::iter::once(descriptor)
            .chain(self.ancestors(class))
            .any(|d| d.markers.iter().any(|m| m == marker))
    }

    fn known_names(&self) -> Vec<&str> {
        self.descriptors
            .keys()
            .map(String::as_str)
            .chain(self.implicit_markers.iter().map(String::as_str))
            .collect()
    }
}
