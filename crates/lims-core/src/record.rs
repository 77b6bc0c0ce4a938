//! Record capability interface
//!
//! The engine never reflects over host objects. A host exposes its records
//! through [`Record`] and hands out live records through an [`ObjectStore`].

use crate::error::{Error, Result};
use crate::value::{RecordRef, Value};
use std::collections::BTreeMap;
use std::rc::Rc;

/// Field values keyed by field name, as passed to a write
pub type Values = BTreeMap<String, Value>;

/// Result of looking up a name on a record
#[derive(Debug, Clone, PartialEq)]
pub enum Attribute {
    /// A stored or computed field
    Field(Value),
    /// A method that can be invoked through [`Record::call`]
    Method,
    /// The record exposes nothing under this name
    Missing,
}

/// A live record handed out by the host
pub trait Record {
    /// Model and identity of this record
    fn reference(&self) -> RecordRef;

    /// Canonical display name, if the model defines one
    fn display_name(&self) -> Option<String> {
        None
    }

    /// Look up a field or method by name
    fn attribute(&self, name: &str) -> Attribute;

    /// Invoke a method with positional arguments
    fn call(&self, method: &str, args: &[Value]) -> Result<Value>;

    /// Write field values to the record
    fn write(&self, values: &Values) -> Result<()> {
        let _ = values;
        Err(Error::ReadOnly(self.reference().to_string()))
    }
}

/// Accessor returning live records by reference
///
/// Implementations must be idempotent: browsing the same reference twice
/// yields records denoting the same row.
pub trait ObjectStore {
    /// Return the record for `reference`, or `None` if it does not exist
    fn browse(&self, reference: &RecordRef) -> Option<Rc<dyn Record>>;
}

/// Read `name` from `record`, invoking it when it is a zero-argument method
pub fn read_attribute(record: &dyn Record, name: &str) -> Result<Option<Value>> {
    match record.attribute(name) {
        Attribute::Field(value) => Ok(Some(value)),
        Attribute::Method => record.call(name, &[]).map(Some),
        Attribute::Missing => Ok(None),
    }
}
