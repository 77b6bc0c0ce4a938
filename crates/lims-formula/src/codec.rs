//! Reference codec
//!
//! Serializes argument lists that may contain record references to a JSON
//! tagged union, and rehydrates them through an [`ObjectStore`]. The text is
//! only ever parsed as data.
//!
//! ```json
//! [{"kind":"integer","value":1},{"kind":"ref","model":"lims.sample","id":5}]
//! ```

use crate::error::{FormulaError, FormulaResult};
use chrono::{NaiveDate, NaiveDateTime};
use lims_core::{ObjectStore, RecordRef, Value};
use log::warn;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
enum Encoded {
    Null,
    Boolean {
        value: bool,
    },
    Integer {
        value: i64,
    },
    Float {
        value: f64,
    },
    Text {
        value: String,
    },
    Date {
        value: NaiveDate,
    },
    DateTime {
        value: NaiveDateTime,
    },
    Ref {
        model: String,
        /// Kept loose so a corrupted id degrades to null instead of failing the payload
        id: serde_json::Value,
    },
    List {
        items: Vec<Encoded>,
    },
    Map {
        entries: BTreeMap<String, Encoded>,
    },
}

impl Encoded {
    fn from_value(value: &Value) -> FormulaResult<Self> {
        Ok(match value {
            Value::Null => Encoded::Null,
            Value::Boolean(b) => Encoded::Boolean { value: *b },
            Value::Integer(i) => Encoded::Integer { value: *i },
            Value::Float(f) if f.is_finite() => Encoded::Float { value: *f },
            Value::Float(f) => {
                return Err(FormulaError::Encode(format!("non-finite float {}", f)));
            }
            Value::Text(s) => Encoded::Text { value: s.clone() },
            Value::Date(d) => Encoded::Date { value: *d },
            Value::DateTime(dt) => Encoded::DateTime { value: *dt },
            Value::Record(r) => Encoded::Ref {
                model: r.model.clone(),
                id: r.id.into(),
            },
            Value::List(items) => Encoded::List {
                items: items
                    .iter()
                    .map(Encoded::from_value)
                    .collect::<FormulaResult<_>>()?,
            },
            Value::Map(entries) => Encoded::Map {
                entries: entries
                    .iter()
                    .map(|(k, v)| Ok((k.clone(), Encoded::from_value(v)?)))
                    .collect::<FormulaResult<_>>()?,
            },
        })
    }

    fn into_value(self, store: &dyn ObjectStore) -> Value {
        match self {
            Encoded::Null => Value::Null,
            Encoded::Boolean { value } => Value::Boolean(value),
            Encoded::Integer { value } => Value::Integer(value),
            Encoded::Float { value } => Value::Float(value),
            Encoded::Text { value } => Value::Text(value),
            Encoded::Date { value } => Value::Date(value),
            Encoded::DateTime { value } => Value::DateTime(value),
            Encoded::Ref { model, id } => rehydrate(store, model, &id),
            Encoded::List { items } => {
                Value::List(items.into_iter().map(|e| e.into_value(store)).collect())
            }
            Encoded::Map { entries } => Value::Map(
                entries
                    .into_iter()
                    .map(|(k, e)| (k, e.into_value(store)))
                    .collect(),
            ),
        }
    }
}

fn rehydrate(store: &dyn ObjectStore, model: String, id: &serde_json::Value) -> Value {
    let id = match id.as_i64() {
        Some(id) => id,
        None => {
            warn!("reference to {} has invalid id {}", model, id);
            return Value::Null;
        }
    };
    let reference = RecordRef::new(model, id);
    match store.browse(&reference) {
        Some(record) => Value::Record(record.reference()),
        None => {
            warn!("referenced record {} does not exist", reference);
            Value::Null
        }
    }
}

/// Encode an argument list to text
pub fn encode(args: &[Value]) -> FormulaResult<String> {
    let encoded = args
        .iter()
        .map(Encoded::from_value)
        .collect::<FormulaResult<Vec<_>>>()?;
    serde_json::to_string(&encoded).map_err(|e| FormulaError::Encode(e.to_string()))
}

/// Decode text produced by [`encode`], rehydrating references through `store`
///
/// Malformed text decodes to an empty list.
pub fn decode(text: &str, store: &dyn ObjectStore) -> Vec<Value> {
    match serde_json::from_str::<Vec<Encoded>>(text) {
        Ok(items) => items.into_iter().map(|e| e.into_value(store)).collect(),
        Err(e) => {
            warn!("discarding malformed reference payload: {}", e);
            Vec::new()
        }
    }
}

/// A method call scheduled by `RUN_LATER`, carried as encoded text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeferredCall {
    payload: String,
}

/// A decoded [`DeferredCall`]
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedCall {
    /// Target record, or `Null` when it could not be rehydrated
    pub target: Value,
    /// Method name
    pub method: String,
    /// Positional arguments
    pub args: Vec<Value>,
}

impl DeferredCall {
    /// Encode `target.method(args…)`
    pub fn new(target: &Value, method: &str, args: &[Value]) -> FormulaResult<Self> {
        let payload = encode(&[
            target.clone(),
            Value::text(method),
            Value::List(args.to_vec()),
        ])?;
        Ok(Self { payload })
    }

    /// Wrap an already-encoded payload
    pub fn from_payload(payload: impl Into<String>) -> Self {
        Self {
            payload: payload.into(),
        }
    }

    /// Encoded text
    pub fn payload(&self) -> &str {
        &self.payload
    }

    /// Decode the call; `None` if the payload does not describe one
    pub fn decode(&self, store: &dyn ObjectStore) -> Option<DecodedCall> {
        let mut items = decode(&self.payload, store).into_iter();
        match (items.next(), items.next(), items.next(), items.next()) {
            (Some(target), Some(Value::Text(method)), Some(Value::List(args)), None) => {
                Some(DecodedCall {
                    target,
                    method,
                    args,
                })
            }
            _ => {
                warn!("deferred call payload has an unexpected shape: {}", self.payload);
                None
            }
        }
    }
}
