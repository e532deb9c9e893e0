//! The `Builtin` provider: generic resolvers over JSON sources

use serde_json::{Map, Value};

use super::registry::{ResolveArgs, ResolveResult};
use super::{ResolveError, ResolverProvider, Step};

pub const PROVIDER: &str = "Builtin";

/// Arguments consumed by `paginate`, ignored by `filterByArgs`
const PAGING_ARGS: [&str; 2] = ["offset", "limit"];

pub fn provider() -> ResolverProvider {
    ResolverProvider::new(PROVIDER)
        .resolver("resolve", resolve)
        .resolver("read", read)
        .chain("requireSource", require_source)
        .chain("nullGuard", null_guard)
        .chain("filterByArgs", filter_by_args)
        .chain("paginate", paginate)
        .chain("first", first)
}

/// `source[context.property]`, or `source[field]`
fn resolve(source: &Value, args: &ResolveArgs<'_>) -> ResolveResult<Value> {
    let key = args
        .context
        .get("property")
        .and_then(Value::as_str)
        .unwrap_or(args.field);
    Ok(source.get(key).cloned().unwrap_or(Value::Null))
}

/// `source[context.collection]` as a list
fn read(source: &Value, args: &ResolveArgs<'_>) -> ResolveResult<Value> {
    let key = args
        .context
        .get("collection")
        .and_then(Value::as_str)
        .unwrap_or(args.field);
    match source.get(key) {
        None | Some(Value::Null) => Ok(Value::Array(Vec::new())),
        Some(Value::Array(items)) => Ok(Value::Array(items.clone())),
        Some(other) => Err(ResolveError::failed(format!(
            "collection '{}' is not a list (found {})",
            key,
            type_label(other)
        ))),
    }
}

fn require_source(source: Value, _args: &ResolveArgs<'_>) -> ResolveResult<Step> {
    Ok(match source {
        Value::Null => Step::Done(Value::Null),
        other => Step::Continue(other),
    })
}

fn null_guard(value: Value, _args: &ResolveArgs<'_>) -> ResolveResult<Step> {
    Ok(match value {
        Value::Null => Step::Done(Value::Null),
        other => Step::Continue(other),
    })
}

fn filter_by_args(value: Value, args: &ResolveArgs<'_>) -> ResolveResult<Step> {
    let criteria: Map<String, Value> = args
        .args
        .iter()
        .filter(|(k, v)| !PAGING_ARGS.contains(&k.as_str()) && !v.is_null())
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();

    match value {
        Value::Array(items) if !criteria.is_empty() => {
            let kept = items
                .into_iter()
                .filter(|item| criteria.iter().all(|(k, v)| item.get(k) == Some(v)))
                .collect();
            Ok(Step::Continue(Value::Array(kept)))
        }
        other => Ok(Step::Continue(other)),
    }
}

fn paginate(value: Value, args: &ResolveArgs<'_>) -> ResolveResult<Step> {
    let offset = count_arg(args, "offset")?.unwrap_or(0);
    let limit = count_arg(args, "limit")?;

    match value {
        Value::Array(items) => {
            let page = items.into_iter().skip(offset);
            let page: Vec<Value> = match limit {
                Some(limit) => page.take(limit).collect(),
                None => page.collect(),
            };
            Ok(Step::Continue(Value::Array(page)))
        }
        other => Ok(Step::Continue(other)),
    }
}

fn first(value: Value, _args: &ResolveArgs<'_>) -> ResolveResult<Step> {
    match value {
        Value::Array(items) => Ok(Step::Continue(items.into_iter().next().unwrap_or(Value::Null))),
        other => Ok(Step::Continue(other)),
    }
}

fn count_arg(args: &ResolveArgs<'_>, name: &str) -> ResolveResult<Option<usize>> {
    match args.args.get(name) {
        None | Some(Value::Null) => Ok(None),
        Some(v) => {
            let n = v.as_u64().ok_or_else(|| {
                ResolveError::failed(format!("argument '{}' must be a non-negative integer", name))
            })?;
            usize::try_from(n)
                .map(Some)
                .map_err(|_| ResolveError::failed(format!("argument '{}' is out of range: {}", name, n)))
        }
    }
}

fn type_label(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "list",
        Value::Object(_) => "object",
    }
}
