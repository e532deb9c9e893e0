//! Composed resolvers
//!
//! A composed resolver runs `[middleware…, primary, afterware…]`:
//! - middleware thread the source value and may stop with a final value
//! - the primary turns the source into the initial result
//! - afterware thread the result in declared order and may stop early
//!
//! A failing step is wrapped with its reference and the arguments it received.

use serde_json::{Map, Value};
use std::fmt;
use thiserror::Error;

use super::registry::{ChainFn, ResolveArgs, ResolveResult, ResolverFn};
use super::ResolverRef;

/// What a middleware/afterware step hands back to the driver
#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    /// Pass the value on to the next step
    Continue(Value),
    /// Stop the chain; this is the field's value
    Done(Value),
}

/// Request-time resolver failure
#[derive(Error, Debug)]
pub enum ResolveError {
    #[error("{0}")]
    Failed(String),

    #[error("Resolver step '{step}' failed (args: {args}): {cause}")]
    Step {
        step: String,
        args: Value,
        #[source]
        cause: Box<ResolveError>,
    },
}

impl ResolveError {
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }

    /// The innermost failure, skipping step wrappers
    pub fn root_cause(&self) -> &ResolveError {
        match self {
            Self::Step { cause, .. } => cause.root_cause(),
            other => other,
        }
    }
}

#[derive(Clone)]
pub(crate) struct BoundStep {
    pub(crate) reference: ResolverRef,
    pub(crate) func: ChainFn,
    pub(crate) context: Map<String, Value>,
}

#[derive(Clone)]
pub(crate) struct BoundPrimary {
    pub(crate) reference: ResolverRef,
    pub(crate) func: ResolverFn,
    pub(crate) context: Map<String, Value>,
}

impl fmt::Debug for BoundStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.reference)
    }
}

impl fmt::Debug for BoundPrimary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.reference)
    }
}

/// A bound, immutable resolver chain
#[derive(Debug, Clone)]
pub struct ComposedResolver {
    middleware: Vec<BoundStep>,
    primary: BoundPrimary,
    afterware: Vec<BoundStep>,
}

impl ComposedResolver {
    pub(crate) fn new(middleware: Vec<BoundStep>, primary: BoundPrimary, afterware: Vec<BoundStep>) -> Self {
        Self {
            middleware,
            primary,
            afterware,
        }
    }

    pub fn primary(&self) -> &ResolverRef {
        &self.primary.reference
    }

    /// Step references in execution order
    pub fn steps(&self) -> Vec<&ResolverRef> {
        self.middleware
            .iter()
            .map(|s| &s.reference)
            .chain(std::iter::once(&self.primary.reference))
            .chain(self.afterware.iter().map(|s| &s.reference))
            .collect()
    }

    /// Resolve `field` against `source`
    pub fn resolve(
        &self,
        source: &Value,
        field: &str,
        args: &Map<String, Value>,
        request: &Value,
    ) -> ResolveResult<Value> {
        let mut current = source.clone();
        for step in &self.middleware {
            match run_step(step, current, field, args, request)? {
                Step::Continue(value) => current = value,
                Step::Done(value) => return Ok(value),
            }
        }

        let primary_args = ResolveArgs {
            field,
            args,
            context: &self.primary.context,
            request,
        };
        let mut result = (self.primary.func)(&current, &primary_args)
            .map_err(|e| wrap(&self.primary.reference, args, e))?;

        for step in &self.afterware {
            match run_step(step, result, field, args, request)? {
                Step::Continue(value) => result = value,
                Step::Done(value) => return Ok(value),
            }
        }
        Ok(result)
    }
}

fn run_step(
    step: &BoundStep,
    value: Value,
    field: &str,
    args: &Map<String, Value>,
    request: &Value,
) -> ResolveResult<Step> {
    let step_args = ResolveArgs {
        field,
        args,
        context: &step.context,
        request,
    };
    (step.func)(value, &step_args).map_err(|e| wrap(&step.reference, args, e))
}

fn wrap(reference: &ResolverRef, args: &Map<String, Value>, cause: ResolveError) -> ResolveError {
    ResolveError::Step {
        step: reference.to_string(),
        args: Value::Object(args.clone()),
        cause: Box::new(cause),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::{EncodedResolver, ResolverProvider, ResolverRegistry};
    use serde_json::json;

    fn append(tag: &str, value: Value) -> Value {
        let mut trail = value.as_array().cloned().unwrap_or_default();
        trail.push(json!(tag));
        Value::Array(trail)
    }

    fn m1(value: Value, _: &ResolveArgs<'_>) -> ResolveResult<Step> {
        Ok(Step::Continue(append("M1", value)))
    }

    fn primary(source: &Value, _: &ResolveArgs<'_>) -> ResolveResult<Value> {
        Ok(append("P", source.clone()))
    }

    fn a1_done(value: Value, _: &ResolveArgs<'_>) -> ResolveResult<Step> {
        Ok(Step::Done(append("A1", value)))
    }

    fn a2(_value: Value, _: &ResolveArgs<'_>) -> ResolveResult<Step> {
        Err(ResolveError::failed("A2 must never run"))
    }

    fn a_append(value: Value, args: &ResolveArgs<'_>) -> ResolveResult<Step> {
        let tag = args.context.get("tag").and_then(Value::as_str).unwrap_or("A");
        Ok(Step::Continue(append(tag, value)))
    }

    fn boom(_source: &Value, _: &ResolveArgs<'_>) -> ResolveResult<Value> {
        Err(ResolveError::failed("boom"))
    }

    fn registry() -> ResolverRegistry {
        let mut registry = ResolverRegistry::empty();
        registry.register(
            ResolverProvider::new("T")
                .chain("m1", m1)
                .resolver("primary", primary)
                .chain("a1", a1_done)
                .chain("a2", a2)
                .chain("tagged", a_append)
                .resolver("boom", boom),
        );
        registry
    }

    fn r(s: &str) -> ResolverRef {
        ResolverRef::parse(s).unwrap()
    }

    #[test]
    fn test_short_circuit_skips_remaining_afterware() {
        let encoded = EncodedResolver::new(r("T::primary"))
            .with_middleware(EncodedResolver::new(r("T::m1")))
            .with_afterware(EncodedResolver::new(r("T::a1")))
            .with_afterware(EncodedResolver::new(r("T::a2")));
        let composed = encoded.compose(&registry()).unwrap();

        let value = composed
            .resolve(&json!([]), "title", &Map::new(), &Value::Null)
            .unwrap();
        assert_eq!(value, json!(["M1", "P", "A1"]));
    }

    #[test]
    fn test_afterware_run_in_declared_order_with_own_context() {
        let encoded = EncodedResolver::new(r("T::primary"))
            .with_afterware(EncodedResolver::new(r("T::tagged")).with_context("tag", json!("first")).unwrap())
            .with_afterware(EncodedResolver::new(r("T::tagged")).with_context("tag", json!("second")).unwrap());
        let composed = encoded.compose(&registry()).unwrap();

        let value = composed
            .resolve(&json!([]), "title", &Map::new(), &Value::Null)
            .unwrap();
        assert_eq!(value, json!(["P", "first", "second"]));
    }

    #[test]
    fn test_failure_is_wrapped_with_step_and_args() {
        let composed = EncodedResolver::new(r("T::boom")).compose(&registry()).unwrap();
        let mut args = Map::new();
        args.insert("limit".to_string(), json!(5));

        let err = composed
            .resolve(&Value::Null, "title", &args, &Value::Null)
            .unwrap_err();
        match &err {
            ResolveError::Step { step, args, .. } => {
                assert_eq!(step, "T::boom");
                assert_eq!(args, &json!({"limit": 5}));
            }
            other => panic!("Expected Step error, got {:?}", other),
        }
        assert_eq!(err.root_cause().to_string(), "boom");
    }

    #[test]
    fn test_concurrent_readers() {
        use std::sync::Arc;
        use std::thread;

        let composed = Arc::new(
            EncodedResolver::new(r("T::primary"))
                .with_middleware(EncodedResolver::new(r("T::m1")))
                .compose(&registry())
                .unwrap(),
        );
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let composed = Arc::clone(&composed);
                thread::spawn(move || {
                    composed
                        .resolve(&json!([]), "title", &Map::new(), &Value::Null)
                        .unwrap()
                })
            })
            .collect();
        for handle in handles {
            assert_eq!(handle.join().unwrap(), json!(["M1", "P"]));
        }
    }
}
