//! Dotted attribute paths
//!
//! A path such as `sample.method_id.name` or `result{2,"ppm"}.value` is
//! walked segment by segment from a root value. Segments with a `{…}` suffix
//! invoke a method with literal arguments. Lists broadcast the rest of the
//! path over their elements; a null anywhere along the way ends the walk
//! with null.

use crate::error::FormulaResult;
use lazy_regex::regex_captures;
use lims_core::{Attribute, ObjectStore, Record, Value};
use log::{trace, warn};
use std::rc::Rc;

/// Walks dotted paths from a value
pub trait AttributePathResolver {
    /// Resolve `path` starting at `root`; unresolvable paths yield `Null`
    fn resolve(&self, root: &Value, path: &str) -> FormulaResult<Value>;
}

/// One parsed path segment
#[derive(Debug, Clone, PartialEq)]
pub struct PathSegment {
    /// Attribute or method name
    pub name: String,
    /// Literal call arguments, when the segment carries a `{…}` suffix
    pub args: Option<Vec<Value>>,
}

/// Split a path on dots outside of braces and quotes
pub fn split_path(path: &str) -> Vec<&str> {
    let mut segments = Vec::new();
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut start = 0;

    for (i, c) in path.char_indices() {
        match (c, quote) {
            ('"' | '\'', None) if depth > 0 => quote = Some(c),
            (c, Some(q)) if c == q => quote = None,
            (_, Some(_)) => {}
            ('{', None) => depth += 1,
            ('}', None) => depth = depth.saturating_sub(1),
            ('.', None) if depth == 0 => {
                segments.push(&path[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    segments.push(&path[start..]);
    segments
}

/// Parse `name` or `name{arg1,arg2}`
pub fn parse_segment(segment: &str) -> Option<PathSegment> {
    let (_, name, braced, inner) =
        regex_captures!(r"^([A-Za-z_][A-Za-z0-9_]*)(\{(.*)\})?$", segment.trim())?;
    let args = if braced.is_empty() {
        None
    } else {
        Some(split_args(inner).into_iter().map(parse_literal).collect())
    };
    Some(PathSegment {
        name: name.to_string(),
        args,
    })
}

/// Split call arguments on commas outside quotes; `{}` has no arguments
fn split_args(inner: &str) -> Vec<&str> {
    if inner.trim().is_empty() {
        return Vec::new();
    }
    let mut args = Vec::new();
    let mut quote: Option<char> = None;
    let mut start = 0;
    for (i, c) in inner.char_indices() {
        match (c, quote) {
            ('"' | '\'', None) => quote = Some(c),
            (c, Some(q)) if c == q => quote = None,
            (',', None) => {
                args.push(&inner[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    args.push(&inner[start..]);
    args
}

/// Literal argument: integer, float, quoted text, boolean, null, or bare text
fn parse_literal(raw: &str) -> Value {
    let raw = raw.trim();
    if let Ok(i) = raw.parse::<i64>() {
        return Value::Integer(i);
    }
    if let Ok(f) = raw.parse::<f64>() {
        return Value::Float(f);
    }
    for q in ['"', '\''] {
        if raw.len() >= 2 && raw.starts_with(q) && raw.ends_with(q) {
            let doubled = format!("{q}{q}");
            return Value::text(raw[1..raw.len() - 1].replace(&doubled, &q.to_string()));
        }
    }
    match raw.to_ascii_lowercase().as_str() {
        "true" => Value::Boolean(true),
        "false" => Value::Boolean(false),
        "null" | "none" => Value::Null,
        _ => Value::text(raw),
    }
}

/// Read one segment from a record: fields are returned, methods invoked
pub fn access(record: &dyn Record, segment: &PathSegment) -> FormulaResult<Value> {
    match record.attribute(&segment.name) {
        Attribute::Field(value) => {
            if segment.args.is_some() {
                warn!(
                    "{}.{} is a field; ignoring call arguments",
                    record.reference().model,
                    segment.name
                );
            }
            Ok(value)
        }
        Attribute::Method => {
            let args = segment.args.as_deref().unwrap_or_default();
            Ok(record.call(&segment.name, args)?)
        }
        Attribute::Missing => {
            trace!("{} has no attribute {}", record.reference(), segment.name);
            Ok(Value::Null)
        }
    }
}

/// Default resolver, browsing referenced records through an [`ObjectStore`]
pub struct RecordPathResolver {
    store: Rc<dyn ObjectStore>,
}

impl RecordPathResolver {
    /// Create a resolver over `store`
    pub fn new(store: Rc<dyn ObjectStore>) -> Self {
        Self { store }
    }

    fn walk(&self, current: &Value, segments: &[PathSegment]) -> FormulaResult<Value> {
        let (segment, rest) = match segments.split_first() {
            Some(split) => split,
            None => return Ok(current.clone()),
        };

        match current {
            Value::Null => Ok(Value::Null),
            // Broadcast: every element walks the same remaining path
            Value::List(items) => items
                .iter()
                .map(|item| self.walk(item, segments))
                .collect::<FormulaResult<Vec<_>>>()
                .map(Value::List),
            Value::Map(entries) => {
                let next = entries.get(&segment.name).cloned().unwrap_or_default();
                self.walk(&next, rest)
            }
            Value::Record(reference) => match self.store.browse(reference) {
                Some(record) => {
                    let next = access(record.as_ref(), segment)?;
                    self.walk(&next, rest)
                }
                None => {
                    trace!("{} cannot be browsed", reference);
                    Ok(Value::Null)
                }
            },
            other => {
                trace!("{} value has no attribute {}", other.type_name(), segment.name);
                Ok(Value::Null)
            }
        }
    }
}

impl AttributePathResolver for RecordPathResolver {
    fn resolve(&self, root: &Value, path: &str) -> FormulaResult<Value> {
        let mut segments = Vec::new();
        for raw in split_path(path) {
            match parse_segment(raw) {
                Some(segment) => segments.push(segment),
                None => {
                    warn!("invalid path segment '{}' in '{}'", raw, path);
                    return Ok(Value::Null);
                }
            }
        }
        self.walk(root, &segments)
    }
}
