//! Error types for the schema compiler

use thiserror::Error;

/// Result type for compile-time operations
pub type Result<T> = std::result::Result<T, SchemaError>;

/// Schema compilation errors
///
/// Everything here is fatal for the current compilation run. Request-time
/// failures inside composed resolvers use [`crate::resolver::ResolveError`].
#[derive(Error, Debug)]
pub enum SchemaError {
    // === Configuration ===
    #[error("Invalid configuration at '{key}': {message}")]
    Config { key: String, message: String },

    #[error("Unknown class '{class}'{}", suggestion_suffix(.suggestion))]
    UnknownClass {
        class: String,
        suggestion: Option<String>,
    },

    #[error("Loader '{loader}' rejected target '{target}': {reason}")]
    InvalidLoaderTarget {
        loader: String,
        target: String,
        reason: String,
    },

    #[error("Unknown bulk loader '{id}'{}", suggestion_suffix(.suggestion))]
    UnknownLoader {
        id: String,
        suggestion: Option<String>,
    },

    #[error("Invalid glob pattern '{pattern}': {message}")]
    InvalidPattern { pattern: String, message: String },

    #[error("Invalid resolver reference '{0}': expected 'Owner::method' or [owner, method]")]
    InvalidResolverRef(String),

    #[error("Resolver '{reference}' is not callable: {reason}")]
    NotCallable { reference: String, reason: String },

    #[error("Invalid settings path '{0}'")]
    MalformedPath(String),

    #[error("Cannot set '{path}': segment '{segment}' is not a map")]
    PathConflict { path: String, segment: String },

    // === Class descriptors ===
    #[error("Invalid class descriptor {path}: {message}")]
    InvalidDescriptor { path: String, message: String },

    #[error("Class '{class}' declared twice: {first} and {second}")]
    DuplicateClass {
        class: String,
        first: String,
        second: String,
    },

    // === Discovery / graph ===
    #[error("No resolver found for field '{field}' on type '{type_name}'")]
    UnresolvedField { type_name: String, field: String },

    #[error("Field '{field}' on type '{type_name}' references unknown type '{target}'")]
    UnknownType {
        type_name: String,
        field: String,
        target: String,
    },

    #[error("Type name '{name}' is defined more than once")]
    DuplicateType { name: String },

    // === Persistence ===
    #[error("Failed to stage schema '{schema}': {message}")]
    Staging { schema: String, message: String },

    #[error("Template '{template}' failed: {message}")]
    Template { template: String, message: String },

    #[error("Schema '{0}' has not been built")]
    SchemaNotBuilt(String),

    #[error("Artifact '{name}' not found in schema '{schema}'")]
    ArtifactNotFound { schema: String, name: String },

    // === Wrapped ===
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Directory walk error: {0}")]
    Walk(#[from] walkdir::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Configuration source error: {0}")]
    ConfigSource(#[from] config_crate::ConfigError),

    #[error("Regex error: {0}")]
    Regex(#[from] regex::Error),
}

impl SchemaError {
    /// Shorthand for a configuration error at `key`
    pub fn config(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Config {
            key: key.into(),
            message: message.into(),
        }
    }

    /// Whether a runtime lookup failure may be healed by rebuilding the schema
    pub fn is_stale_schema(&self) -> bool {
        matches!(self, Self::SchemaNotBuilt(_) | Self::ArtifactNotFound { .. })
    }
}

fn suggestion_suffix(suggestion: &Option<String>) -> String {
    match suggestion {
        Some(s) => format!(" (did you mean '{}'?)", s),
        None => String::new(),
    }
}

/// Pick the closest candidate for a misspelled name
pub(crate) fn suggest<'a, I>(query: &str, candidates: I) -> Option<String>
where
    I: IntoIterator<Item = &'a str>,
{
    use fuzzy_matcher::skim::SkimMatcherV2;
    use fuzzy_matcher::FuzzyMatcher;

    let matcher = SkimMatcherV2::default();
    candidates
        .into_iter()
        .filter_map(|c| matcher.fuzzy_match(c, query).map(|score| (score, c)))
        .max_by_key(|(score, _)| *score)
        .map(|(_, c)| c.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_suggestion_in_message() {
        let err = SchemaError::UnknownLoader {
            id: "inheritanceLoadr".to_string(),
            suggestion: suggest("inheritanceLoadr", ["inheritanceLoader", "namespaceLoader"]),
        };
        assert_eq!(
            err.to_string(),
            "Unknown bulk loader 'inheritanceLoadr' (did you mean 'inheritanceLoader'?)"
        );
    }

    #[test]
    fn test_no_suggestion() {
        let err = SchemaError::UnknownClass {
            class: "Zzz".to_string(),
            suggestion: None,
        };
        assert_eq!(err.to_string(), "Unknown class 'Zzz'");
    }
}
