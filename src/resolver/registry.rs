//! Resolver registration tables
//!
//! Providers are explicit method tables built once at startup. Nothing is
//! looked up reflectively: a reference is callable exactly when its provider
//! registered a function under that method name.

use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::error::{suggest, Result, SchemaError};

use super::composed::{ResolveError, Step};
use super::discovery::{ConventionStrategy, ResolverStrategy};
use super::{builtin, ResolverRef};

/// Outcome of a single resolver function
pub type ResolveResult<T> = std::result::Result<T, ResolveError>;

/// Primary resolver: produces a field value from the (possibly threaded) source
pub type ResolverFn = fn(&Value, &ResolveArgs<'_>) -> ResolveResult<Value>;

/// Middleware / afterware: threads a value and may stop the chain
pub type ChainFn = fn(Value, &ResolveArgs<'_>) -> ResolveResult<Step>;

/// Everything a resolver function receives besides the threaded value
#[derive(Debug, Clone, Copy)]
pub struct ResolveArgs<'a> {
    /// Field being resolved
    pub field: &'a str,
    /// Query arguments of the field
    pub args: &'a Map<String, Value>,
    /// Static context of the step, merged over the root context
    pub context: &'a Map<String, Value>,
    /// Opaque per-request data supplied by the engine
    pub request: &'a Value,
}

/// A registered function
#[derive(Clone, Copy)]
pub enum Callable {
    Resolver(ResolverFn),
    Chain(ChainFn),
}

impl Callable {
    fn kind(&self) -> &'static str {
        match self {
            Self::Resolver(_) => "resolver",
            Self::Chain(_) => "chain step",
        }
    }
}

impl fmt::Debug for Callable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Callable::{}", self.kind())
    }
}

// =============================================================================
// Provider
// =============================================================================

/// A named table of resolver functions
#[derive(Debug, Clone)]
pub struct ResolverProvider {
    name: String,
    methods: BTreeMap<String, Callable>,
}

impl ResolverProvider {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            methods: BTreeMap::new(),
        }
    }

    /// Register a primary resolver
    pub fn resolver(mut self, method: impl Into<String>, f: ResolverFn) -> Self {
        self.methods.insert(method.into(), Callable::Resolver(f));
        self
    }

    /// Register a middleware/afterware step
    pub fn chain(mut self, method: impl Into<String>, f: ChainFn) -> Self {
        self.methods.insert(method.into(), Callable::Chain(f));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn get(&self, method: &str) -> Option<Callable> {
        self.methods.get(method).copied()
    }

    /// Whether `method` is registered as a primary resolver
    pub fn has_resolver(&self, method: &str) -> bool {
        matches!(self.get(method), Some(Callable::Resolver(_)))
    }

    pub fn methods(&self) -> impl Iterator<Item = &str> {
        self.methods.keys().map(String::as_str)
    }

    pub fn reference(&self, method: &str) -> ResolverRef {
        ResolverRef::new(self.name.clone(), method)
    }
}

// =============================================================================
// Registry
// =============================================================================

/// All providers and discovery strategies known to a compiler
#[derive(Clone)]
pub struct ResolverRegistry {
    providers: BTreeMap<String, ResolverProvider>,
    strategies: BTreeMap<String, Arc<dyn ResolverStrategy>>,
}

impl fmt::Debug for ResolverRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolverRegistry")
            .field("providers", &self.providers.keys().collect::<Vec<_>>())
            .field("strategies", &self.strategies.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl Default for ResolverRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

impl ResolverRegistry {
    pub fn empty() -> Self {
        Self {
            providers: BTreeMap::new(),
            strategies: BTreeMap::new(),
        }
    }

    /// The `Builtin` provider plus the `convention` strategy
    pub fn with_builtins() -> Self {
        let mut registry = Self::empty();
        registry.register(builtin::provider());
        registry.register_strategy(ConventionStrategy::NAME, Arc::new(ConventionStrategy));
        registry
    }

    /// Register (or replace) a provider under its own name
    pub fn register(&mut self, provider: ResolverProvider) {
        self.providers.insert(provider.name.clone(), provider);
    }

    pub fn register_strategy(&mut self, name: impl Into<String>, strategy: Arc<dyn ResolverStrategy>) {
        self.strategies.insert(name.into(), strategy);
    }

    pub fn provider(&self, name: &str) -> Option<&ResolverProvider> {
        self.providers.get(name)
    }

    /// Providers in the configured order; unknown names are config errors
    pub fn providers_in_order(&self, names: &[String]) -> Result<Vec<&ResolverProvider>> {
        names
            .iter()
            .map(|name| {
                self.providers.get(name).ok_or_else(|| {
                    let hint = suggest(name, self.providers.keys().map(String::as_str))
                        .map(|s| format!(" (did you mean '{}'?)", s))
                        .unwrap_or_default();
                    SchemaError::config("resolvers", format!("unknown resolver provider '{}'{}", name, hint))
                })
            })
            .collect()
    }

    pub fn strategy(&self, name: &str) -> Result<Arc<dyn ResolverStrategy>> {
        self.strategies.get(name).cloned().ok_or_else(|| {
            SchemaError::config("resolverStrategy", format!("unknown discovery strategy '{}'", name))
        })
    }

    /// Look up the function behind a reference
    pub fn callable(&self, reference: &ResolverRef) -> Result<Callable> {
        let provider = self.providers.get(reference.owner()).ok_or_else(|| SchemaError::NotCallable {
            reference: reference.to_string(),
            reason: format!("no provider named '{}'", reference.owner()),
        })?;
        provider.get(reference.method()).ok_or_else(|| {
            let reason = match suggest(reference.method(), provider.methods()) {
                Some(s) => format!("no method '{}' (did you mean '{}'?)", reference.method(), s),
                None => format!("no method '{}'", reference.method()),
            };
            SchemaError::NotCallable {
                reference: reference.to_string(),
                reason,
            }
        })
    }

    /// Function for a primary position
    pub fn resolver_fn(&self, reference: &ResolverRef) -> Result<ResolverFn> {
        match self.callable(reference)? {
            Callable::Resolver(f) => Ok(f),
            other => Err(wrong_kind(reference, other, "resolver")),
        }
    }

    /// Function for a middleware/afterware position
    pub fn chain_fn(&self, reference: &ResolverRef) -> Result<ChainFn> {
        match self.callable(reference)? {
            Callable::Chain(f) => Ok(f),
            other => Err(wrong_kind(reference, other, "chain step")),
        }
    }

    /// Parse a settings value and check it names a primary resolver
    pub fn reference(&self, value: &Value) -> Result<ResolverRef> {
        let reference = ResolverRef::from_value(value)?;
        self.resolver_fn(&reference)?;
        Ok(reference)
    }
}

fn wrong_kind(reference: &ResolverRef, found: Callable, expected: &str) -> SchemaError {
    SchemaError::NotCallable {
        reference: reference.to_string(),
        reason: format!("registered as a {}, expected a {}", found.kind(), expected),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn constant(_source: &Value, _args: &ResolveArgs<'_>) -> ResolveResult<Value> {
        Ok(json!("constant"))
    }

    #[test]
    fn test_registered_reference_is_callable() {
        let mut registry = ResolverRegistry::with_builtins();
        registry.register(ResolverProvider::new("App").resolver("resolveTitle", constant));

        let r = registry.reference(&json!("App::resolveTitle")).unwrap();
        assert_eq!(r, ResolverRef::new("App", "resolveTitle"));
        assert!(registry.resolver_fn(&r).is_ok());
    }

    #[test]
    fn test_unregistered_reference_fails_binding() {
        let registry = ResolverRegistry::with_builtins();
        let err = registry.reference(&json!("Builtin::resolv")).unwrap_err();
        assert!(matches!(err, SchemaError::NotCallable { .. }));
        assert!(err.to_string().contains("did you mean 'resolve'"));

        let err = registry.reference(&json!("Nope::resolve")).unwrap_err();
        assert!(matches!(err, SchemaError::NotCallable { .. }));
    }

    #[test]
    fn test_chain_step_is_not_a_primary() {
        let registry = ResolverRegistry::with_builtins();
        let chain = ResolverRef::new("Builtin", "paginate");
        assert!(registry.resolver_fn(&chain).is_err());
        assert!(registry.chain_fn(&chain).is_ok());
    }

    #[test]
    fn test_providers_in_order() {
        let mut registry = ResolverRegistry::with_builtins();
        registry.register(ResolverProvider::new("App"));
        let providers = registry
            .providers_in_order(&["App".to_string(), "Builtin".to_string()])
            .unwrap();
        let names: Vec<_> = providers.iter().map(|p| p.name()).collect();
        assert_eq!(names, vec!["App", "Builtin"]);

        assert!(registry.providers_in_order(&["Missing".to_string()]).is_err());
    }
}
