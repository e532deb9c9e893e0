//! Collection
//!
//! An immutable snapshot of class identifiers and the files that declare them.
//! Loaders narrow a collection by returning a new one; nothing mutates in place.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Immutable `class_id → file path` map
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Collection {
    classes: BTreeMap<String, PathBuf>,
}

impl Collection {
    /// Create a collection from `(class, path)` pairs
    pub fn new<I, K, P>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, P)>,
        K: Into<String>,
        P: Into<PathBuf>,
    {
        Self {
            classes: entries
                .into_iter()
                .map(|(k, p)| (k.into(), p.into()))
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    pub fn contains(&self, class: &str) -> bool {
        self.classes.contains_key(class)
    }

    /// File that declares `class`
    pub fn path_of(&self, class: &str) -> Option<&Path> {
        self.classes.get(class).map(PathBuf::as_path)
    }

    /// Class identifiers in sorted order
    pub fn classes(&self) -> impl Iterator<Item = &str> {
        self.classes.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Path)> {
        self.classes.iter().map(|(k, v)| (k.as_str(), v.as_path()))
    }

    /// New collection holding only the entries that satisfy `keep`
    pub fn filter<F>(&self, mut keep: F) -> Self
    where
        F: FnMut(&str, &Path) -> bool,
    {
        Self {
            classes: self
                .classes
                .iter()
                .filter(|(k, v)| keep(k, v))
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        }
    }

    /// New collection restricted to classes also present in `other`
    pub fn intersect(&self, other: &Collection) -> Self {
        self.filter(|class, _| other.contains(class))
    }

    /// Whether every class in `self` is also in `other`
    pub fn is_subset_of(&self, other: &Collection) -> bool {
        self.classes.keys().all(|k| other.contains(k))
    }
}

impl FromIterator<(String, PathBuf)> for Collection {
    fn from_iter<T: IntoIterator<Item = (String, PathBuf)>>(iter: T) -> Self {
        Self {
            classes: iter.into_iter().collect(),
        }
    }
}
