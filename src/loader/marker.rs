//! Marker loader: keeps classes that carry a listed marker (role or capability)

use crate::classes::{Collection, Reflection};
use crate::error::{suggest, Result, SchemaError};

use super::{BulkLoader, PatternSet};

pub const IDENTIFIER: &str = "markerLoader";

#[derive(Debug, Clone)]
pub struct MarkerLoader {
    patterns: PatternSet,
}

impl MarkerLoader {
    pub fn new(patterns: PatternSet) -> Self {
        Self { patterns }
    }
}

impl BulkLoader for MarkerLoader {
    fn identifier(&self) -> &str {
        IDENTIFIER
    }

    fn patterns(&self) -> &PatternSet {
        &self.patterns
    }

    fn validate(&self, reflection: &dyn Reflection) -> Result<()> {
        for target in self.patterns.all() {
            if reflection.marker_exists(target) {
                continue;
            }
            let reason = if reflection.class_exists(target) {
                "is a class, not a marker".to_string()
            } else {
                match suggest(target, reflection.known_names()) {
                    Some(s) => format!("no such marker (did you mean '{}'?)", s),
                    None => "no such marker".to_string(),
                }
            };
            return Err(SchemaError::InvalidLoaderTarget {
                loader: IDENTIFIER.to_string(),
                target: target.to_string(),
                reason,
            });
        }
        Ok(())
    }

    fn collect(&self, collection: &Collection, reflection: &dyn Reflection) -> Result<Collection> {
        Ok(collection.filter(|class, _| {
            self.patterns
                .evaluate(|marker| reflection.has_marker(class, marker))
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classes::{ClassDescriptor, ClassIndex};

    fn index() -> ClassIndex {
        ClassIndex::from_descriptors(vec![
            ClassDescriptor::marker("Versioned", "versioned.toml"),
            ClassDescriptor::marker("Hidden", "hidden.toml"),
            ClassDescriptor::new("Page", "page.toml").with_marker("Versioned"),
            ClassDescriptor::new("ErrorPage", "error.toml")
                .extends("Page")
                .with_marker("Hidden"),
            ClassDescriptor::new("Member", "member.toml"),
        ])
        .unwrap()
    }

    fn loader(include: &[&str], exclude: &[&str]) -> MarkerLoader {
        MarkerLoader::new(PatternSet::new(
            include.iter().map(|s| s.to_string()).collect(),
            exclude.iter().map(|s| s.to_string()).collect(),
        ))
    }

    #[test]
    fn test_marker_membership_is_inherited() {
        let index = index();
        let result = loader(&["Versioned"], &[]).collect(&index.collection(), &index).unwrap();
        assert_eq!(result.classes().collect::<Vec<_>>(), vec!["ErrorPage", "Page"]);
    }

    #[test]
    fn test_exclude_marker() {
        let index = index();
        let result = loader(&["Versioned"], &["Hidden"])
            .collect(&index.collection(), &index)
            .unwrap();
        assert_eq!(result.classes().collect::<Vec<_>>(), vec!["Page"]);
    }

    #[test]
    fn test_validate_rejects_class_target() {
        let index = index();
        assert!(loader(&["Member"], &[]).validate(&index).is_err());
        assert!(loader(&["Nope"], &[]).validate(&index).is_err());
        assert!(loader(&["Versioned"], &["Hidden"]).validate(&index).is_ok());
    }
}
