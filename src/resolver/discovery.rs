//! Resolver discovery
//!
//! Finds the primary resolver of a field when none is given explicitly.
//! The convention strategy tries candidate method names, most specific first:
//!
//! 1. `resolve<Type><Field>`
//! 2. `resolve<Type>`
//! 3. `resolve<ModelIdentifier><Field>`
//! 4. `resolve<Field>`
//! 5. `resolve`
//!
//! For each name, providers are checked in configured order; the first hit
//! wins. Only primary resolvers are candidates, never chain steps.

use tracing::debug;

use crate::error::{Result, SchemaError};
use crate::names::to_pascal_case;

use super::{ResolverProvider, ResolverRef};

const PREFIX: &str = "resolve";

/// The field a resolver is being discovered for
#[derive(Debug, Clone, Copy)]
pub struct FieldSite<'a> {
    pub type_name: &'a str,
    pub field: &'a str,
    /// Identifier of the model behind the type, if any
    pub model: Option<&'a str>,
}

/// Pluggable discovery, selected by `resolverStrategy`
pub trait ResolverStrategy: Send + Sync {
    fn discover(&self, providers: &[&ResolverProvider], site: &FieldSite<'_>) -> Option<ResolverRef>;
}

/// Name-based lookup across providers
#[derive(Debug, Clone, Copy, Default)]
pub struct ConventionStrategy;

impl ConventionStrategy {
    pub const NAME: &'static str = "convention";

    /// Candidate method names, most specific first, without duplicates
    pub fn candidates(site: &FieldSite<'_>) -> Vec<String> {
        let type_name = to_pascal_case(site.type_name);
        let field = to_pascal_case(site.field);

        let mut names = vec![
            format!("{}{}{}", PREFIX, type_name, field),
            format!("{}{}", PREFIX, type_name),
        ];
        if let Some(model) = site.model {
            names.push(format!("{}{}{}", PREFIX, to_pascal_case(model), field));
        }
        names.push(format!("{}{}", PREFIX, field));
        names.push(PREFIX.to_string());

        let mut seen = std::collections::HashSet::new();
        names.retain(|n| seen.insert(n.clone()));
        names
    }
}

impl ResolverStrategy for ConventionStrategy {
    fn discover(&self, providers: &[&ResolverProvider], site: &FieldSite<'_>) -> Option<ResolverRef> {
        for name in Self::candidates(site) {
            for provider in providers {
                if provider.has_resolver(&name) {
                    return Some(provider.reference(&name));
                }
            }
        }
        None
    }
}

/// Strategy first, then the model's default, then the global default
pub fn discover(
    strategy: &dyn ResolverStrategy,
    providers: &[&ResolverProvider],
    site: &FieldSite<'_>,
    model_default: Option<ResolverRef>,
    global_default: Option<&ResolverRef>,
) -> Result<ResolverRef> {
    if let Some(found) = strategy.discover(providers, site) {
        debug!(type_name = site.type_name, field = site.field, resolver = %found, "discovered resolver");
        return Ok(found);
    }
    if let Some(default) = model_default {
        debug!(type_name = site.type_name, field = site.field, resolver = %default, "using model default resolver");
        return Ok(default);
    }
    if let Some(default) = global_default {
        debug!(type_name = site.type_name, field = site.field, resolver = %default, "using global default resolver");
        return Ok(default.clone());
    }
    Err(SchemaError::UnresolvedField {
        type_name: site.type_name.to_string(),
        field: site.field.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::{ResolveArgs, ResolveResult, Step};
    use serde_json::Value;

    fn noop(_: &Value, _: &ResolveArgs<'_>) -> ResolveResult<Value> {
        Ok(Value::Null)
    }

    fn chain_noop(v: Value, _: &ResolveArgs<'_>) -> ResolveResult<Step> {
        Ok(Step::Continue(v))
    }

    fn site<'a>(type_name: &'a str, field: &'a str) -> FieldSite<'a> {
        FieldSite {
            type_name,
            field,
            model: Some("Entity"),
        }
    }

    #[test]
    fn test_candidate_order() {
        assert_eq!(
            ConventionStrategy::candidates(&site("Page", "title")),
            vec![
                "resolvePageTitle",
                "resolvePage",
                "resolveEntityTitle",
                "resolveTitle",
                "resolve"
            ]
        );
    }

    #[test]
    fn test_specific_name_on_later_provider_wins() {
        let first = ResolverProvider::new("First").resolver("resolve", noop);
        let second = ResolverProvider::new("Second").resolver("resolveFoo", noop);

        let found = ConventionStrategy
            .discover(&[&first, &second], &site("Page", "foo"))
            .unwrap();
        assert_eq!(found, ResolverRef::new("Second", "resolveFoo"));
    }

    #[test]
    fn test_provider_order_breaks_ties() {
        let first = ResolverProvider::new("First").resolver("resolveTitle", noop);
        let second = ResolverProvider::new("Second").resolver("resolveTitle", noop);

        let found = ConventionStrategy
            .discover(&[&first, &second], &site("Page", "title"))
            .unwrap();
        assert_eq!(found.owner(), "First");
    }

    #[test]
    fn test_chain_steps_are_not_candidates() {
        let provider = ResolverProvider::new("P").chain("resolveTitle", chain_noop);
        assert!(ConventionStrategy
            .discover(&[&provider], &site("Page", "title"))
            .is_none());
    }

    #[test]
    fn test_fallbacks() {
        let empty: Vec<&ResolverProvider> = Vec::new();
        let global = ResolverRef::new("Builtin", "resolve");
        let model = ResolverRef::new("Builtin", "read");

        let r = discover(&ConventionStrategy, &empty, &site("Page", "t"), Some(model.clone()), Some(&global)).unwrap();
        assert_eq!(r, model);

        let r = discover(&ConventionStrategy, &empty, &site("Page", "t"), None, Some(&global)).unwrap();
        assert_eq!(r, global);

        let err = discover(&ConventionStrategy, &empty, &site("Page", "t"), None, None).unwrap_err();
        assert_eq!(err.to_string(), "No resolver found for field 't' on type 'Page'");
    }
}
