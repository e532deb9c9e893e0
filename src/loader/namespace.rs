//! Namespace loader: case-sensitive shell glob (`*`, `?`) over class identifiers

use std::collections::HashMap;

use glob::{MatchOptions, Pattern};

use crate::classes::{Collection, Reflection};
use crate::error::{Result, SchemaError};

use super::{BulkLoader, PatternSet};

pub const IDENTIFIER: &str = "namespaceLoader";

const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: false,
    require_literal_leading_dot: false,
};

#[derive(Debug, Clone)]
pub struct NamespaceLoader {
    patterns: PatternSet,
    compiled: HashMap<String, Pattern>,
}

impl NamespaceLoader {
    /// Compiles every pattern up front; a bad pattern fails construction
    pub fn new(patterns: PatternSet) -> Result<Self> {
        let mut compiled = HashMap::new();
        for p in patterns.all() {
            let pattern = Pattern::new(p).map_err(|e| SchemaError::InvalidPattern {
                pattern: p.to_string(),
                message: e.msg.to_string(),
            })?;
            compiled.insert(p.to_string(), pattern);
        }
        Ok(Self { patterns, compiled })
    }

    fn keeps(&self, class: &str) -> bool {
        self.patterns.evaluate(|p| {
            self.compiled
                .get(p)
                .is_some_and(|pattern| pattern.matches_with(class, MATCH_OPTIONS))
        })
    }
}

impl BulkLoader for NamespaceLoader {
    fn identifier(&self) -> &str {
        IDENTIFIER
    }

    fn patterns(&self) -> &PatternSet {
        &self.patterns
    }

    fn validate(&self, _reflection: &dyn Reflection) -> Result<()> {
        // Patterns are compiled in `new`; nothing else can be wrong.
        Ok(())
    }

    fn collect(&self, collection: &Collection, _reflection: &dyn Reflection) -> Result<Collection> {
        Ok(collection.filter(|class, _| self.keeps(class)))
    }
}
