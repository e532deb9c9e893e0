//! Bulk Loading
//!
//! Composable filters that narrow a [`Collection`] of candidate classes.
//!
//! Every loader evaluates include/exclude patterns the same way:
//! - an empty include list is not evaluated, so every class passes it
//! - otherwise a class passes if ANY include pattern matches
//! - a class is dropped if ANY exclude pattern matches, whatever the include result

pub mod file_path;
pub mod inheritance;
pub mod marker;
pub mod namespace;
pub mod registry;
pub mod set;

pub use file_path::FilePathLoader;
pub use inheritance::InheritanceLoader;
pub use marker::MarkerLoader;
pub use namespace::NamespaceLoader;
pub use registry::{LoaderFactory, LoaderOptions, LoaderRegistry};
pub use set::{LoaderConfig, LoaderSet};

use std::fmt;

use crate::classes::{Collection, Reflection};
use crate::error::Result;

/// A filter stage over a collection of classes
pub trait BulkLoader: fmt::Debug + Send + Sync {
    /// Registry identifier, e.g. `inheritanceLoader`
    fn identifier(&self) -> &str;

    fn patterns(&self) -> &PatternSet;

    /// Reject include/exclude targets that do not exist or have the wrong kind
    fn validate(&self, reflection: &dyn Reflection) -> Result<()>;

    /// Return the subset of `collection` this loader keeps
    fn collect(&self, collection: &Collection, reflection: &dyn Reflection) -> Result<Collection>;
}

/// Include/exclude pattern lists shared by all loaders
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PatternSet {
    include: Vec<String>,
    exclude: Vec<String>,
}

impl PatternSet {
    pub fn new(include: Vec<String>, exclude: Vec<String>) -> Self {
        Self { include, exclude }
    }

    pub fn include(&self) -> &[String] {
        &self.include
    }

    pub fn exclude(&self) -> &[String] {
        &self.exclude
    }

    pub fn is_empty(&self) -> bool {
        self.include.is_empty() && self.exclude.is_empty()
    }

    /// Every pattern, includes first
    pub fn all(&self) -> impl Iterator<Item = &str> {
        self.include.iter().chain(self.exclude.iter()).map(String::as_str)
    }

    /// Apply the include-then-exclude rule with a per-pattern predicate
    pub fn evaluate<F>(&self, mut matches: F) -> bool
    where
        F: FnMut(&str) -> bool,
    {
        let included = self.include.is_empty() || self.include.iter().any(|p| matches(p));
        if !included {
            return false;
        }
        !self.exclude.iter().any(|p| matches(p))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(include: &[&str], exclude: &[&str]) -> PatternSet {
        PatternSet::new(
            include.iter().map(|s| s.to_string()).collect(),
            exclude.iter().map(|s| s.to_string()).collect(),
        )
    }

    #[test]
    fn test_exclude_beats_include() {
        let patterns = set(&["A"], &["A"]);
        assert!(!patterns.evaluate(|p| p == "A"));
    }

    #[test]
    fn test_any_include_matches() {
        let patterns = set(&["A", "B"], &[]);
        assert!(patterns.evaluate(|p| p == "B"));
        assert!(!patterns.evaluate(|p| p == "C"));
    }

    #[test]
    fn test_empty_include_passes_everything() {
        let patterns = set(&[], &["C"]);
        assert!(patterns.evaluate(|p| p == "A"));
        assert!(!patterns.evaluate(|p| p == "C"));
    }
}
