//! File-path loader
//!
//! Expands include/exclude globs to concrete file sets first, then keeps the
//! classes whose declaring file is in the resulting set. Class names are never
//! matched against the patterns, so file layout and naming stay independent.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};

use glob::Pattern;
use tracing::debug;

use crate::classes::{Collection, Reflection};
use crate::error::{Result, SchemaError};

use super::{BulkLoader, PatternSet};

pub const IDENTIFIER: &str = "filepathLoader";

#[derive(Debug, Clone)]
pub struct FilePathLoader {
    patterns: PatternSet,
    base_dir: PathBuf,
}

impl FilePathLoader {
    /// Relative patterns are anchored at `base_dir`
    pub fn new(patterns: PatternSet, base_dir: impl Into<PathBuf>) -> Result<Self> {
        let loader = Self {
            patterns,
            base_dir: base_dir.into(),
        };
        for pattern in loader.patterns.all() {
            let anchored = loader.anchor(pattern);
            Pattern::new(&anchored).map_err(|e| SchemaError::InvalidPattern {
                pattern: pattern.to_string(),
                message: e.msg.to_string(),
            })?;
        }
        Ok(loader)
    }

    fn anchor(&self, pattern: &str) -> String {
        if Path::new(pattern).is_absolute() {
            pattern.to_string()
        } else {
            self.base_dir.join(pattern).to_string_lossy().into_owned()
        }
    }

    /// Absolute, canonical files matched by `pattern`
    fn resolve(&self, pattern: &str) -> Result<BTreeSet<PathBuf>> {
        let anchored = self.anchor(pattern);
        let entries = glob::glob(&anchored).map_err(|e| SchemaError::InvalidPattern {
            pattern: pattern.to_string(),
            message: e.msg.to_string(),
        })?;
        let mut files = BTreeSet::new();
        for entry in entries {
            let path = entry.map_err(|e| SchemaError::Io(e.into()))?;
            if path.is_file() {
                files.insert(fs::canonicalize(&path)?);
            }
        }
        Ok(files)
    }

    /// Every pattern with the files it matches
    fn resolve_all(&self) -> Result<BTreeMap<&str, BTreeSet<PathBuf>>> {
        self.patterns
            .all()
            .map(|pattern| Ok::<_, SchemaError>((pattern, self.resolve(pattern)?)))
            .collect()
    }
}

impl BulkLoader for FilePathLoader {
    fn identifier(&self) -> &str {
        IDENTIFIER
    }

    fn patterns(&self) -> &PatternSet {
        &self.patterns
    }

    /// A pattern that matches no file is a typo, not an empty selection
    fn validate(&self, _reflection: &dyn Reflection) -> Result<()> {
        for (pattern, files) in self.resolve_all()? {
            if files.is_empty() {
                return Err(SchemaError::InvalidLoaderTarget {
                    loader: IDENTIFIER.to_string(),
                    target: pattern.to_string(),
                    reason: format!("matches no files under {}", self.base_dir.display()),
                });
            }
        }
        Ok(())
    }

    fn collect(&self, collection: &Collection, _reflection: &dyn Reflection) -> Result<Collection> {
        let resolved = self.resolve_all()?;
        debug!(
            patterns = resolved.len(),
            files = resolved.values().map(BTreeSet::len).sum::<usize>(),
            "resolved file-path globs"
        );

        Ok(collection.filter(|_, path| {
            self.patterns
                .evaluate(|pattern| resolved.get(pattern).is_some_and(|files| files.contains(path)))
        }))
    }
}
