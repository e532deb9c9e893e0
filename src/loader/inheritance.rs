//! Inheritance loader: keeps classes equal to, or descending from, a listed ancestor

use crate::classes::{Collection, Reflection};
use crate::error::{suggest, Result, SchemaError};

use super::{BulkLoader, PatternSet};

pub const IDENTIFIER: &str = "inheritanceLoader";

#[derive(Debug, Clone)]
pub struct InheritanceLoader {
    patterns: PatternSet,
}

impl InheritanceLoader {
    pub fn new(patterns: PatternSet) -> Self {
        Self { patterns }
    }

    fn matches(reflection: &dyn Reflection, class: &str, ancestor: &str) -> bool {
        class == ancestor || reflection.is_subclass_of(class, ancestor)
    }
}

impl BulkLoader for InheritanceLoader {
    fn identifier(&self) -> &str {
        IDENTIFIER
    }

    fn patterns(&self) -> &PatternSet {
        &self.patterns
    }

    fn validate(&self, reflection: &dyn Reflection) -> Result<()> {
        for target in self.patterns.all() {
            if reflection.class_exists(target) {
                continue;
            }
            if reflection.marker_exists(target) {
                return Err(SchemaError::InvalidLoaderTarget {
                    loader: IDENTIFIER.to_string(),
                    target: target.to_string(),
                    reason: "is a marker, not a class".to_string(),
                });
            }
            return Err(SchemaError::UnknownClass {
                class: target.to_string(),
                suggestion: suggest(target, reflection.known_names()),
            });
        }
        Ok(())
    }

    fn collect(&self, collection: &Collection, reflection: &dyn Reflection) -> Result<Collection> {
        Ok(collection.filter(|class, _| {
            self.patterns
                .evaluate(|ancestor| Self::matches(reflection, class, ancestor))
        }))
    }
}
