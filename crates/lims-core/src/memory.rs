//! In-memory host implementations
//!
//! Useful for embedding the engine without an ORM, and for tests.

use crate::error::{Error, Result};
use crate::record::{Attribute, ObjectStore, Record, Values};
use crate::schema::{FieldDef, Schema};
use crate::value::{RecordRef, Value};
use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

/// Method implementation attached to a [`MemoryRecord`]
pub type MethodImpl = Rc<dyn Fn(&MemoryRecord, &[Value]) -> Result<Value>>;

/// A record whose fields live in a map
pub struct MemoryRecord {
    reference: RecordRef,
    fields: RefCell<Values>,
    methods: BTreeMap<String, MethodImpl>,
    calls: RefCell<Vec<(String, Vec<Value>)>>,
    reject_writes: Cell<bool>,
}

impl MemoryRecord {
    /// Create an empty record
    pub fn new(model: impl Into<String>, id: i64) -> Self {
        Self {
            reference: RecordRef::new(model, id),
            fields: RefCell::new(Values::new()),
            methods: BTreeMap::new(),
            calls: RefCell::new(Vec::new()),
            reject_writes: Cell::new(false),
        }
    }

    /// Set a field (builder style)
    pub fn with_field(self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.borrow_mut().insert(name.into(), value.into());
        self
    }

    /// Attach a method (builder style)
    pub fn with_method<F>(mut self, name: impl Into<String>, method: F) -> Self
    where
        F: Fn(&MemoryRecord, &[Value]) -> Result<Value> + 'static,
    {
        self.methods.insert(name.into(), Rc::new(method));
        self
    }

    /// Read a field
    pub fn get(&self, name: &str) -> Option<Value> {
        self.fields.borrow().get(name).cloned()
    }

    /// Set a field
    pub fn set(&self, name: impl Into<String>, value: impl Into<Value>) {
        self.fields.borrow_mut().insert(name.into(), value.into());
    }

    /// Every method invocation so far, in order
    pub fn calls(&self) -> Vec<(String, Vec<Value>)> {
        self.calls.borrow().clone()
    }

    /// Number of times `method` has been invoked
    pub fn call_count(&self, method: &str) -> usize {
        self.calls.borrow().iter().filter(|(m, _)| m == method).count()
    }

    /// Make subsequent writes fail
    pub fn reject_writes(&self, reject: bool) {
        self.reject_writes.set(reject);
    }
}

impl fmt::Debug for MemoryRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryRecord")
            .field("reference", &self.reference)
            .field("fields", &self.fields.borrow())
            .field("methods", &self.methods.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl Record for MemoryRecord {
    fn reference(&self) -> RecordRef {
        self.reference.clone()
    }

    fn display_name(&self) -> Option<String> {
        let fields = self.fields.borrow();
        ["display_name", "name"]
            .iter()
            .find_map(|key| match fields.get(*key) {
                Some(Value::Text(s)) if !s.is_empty() => Some(s.clone()),
                _ => None,
            })
    }

    fn attribute(&self, name: &str) -> Attribute {
        if let Some(value) = self.fields.borrow().get(name) {
            return Attribute::Field(value.clone());
        }
        if self.methods.contains_key(name) {
            return Attribute::Method;
        }
        Attribute::Missing
    }

    fn call(&self, method: &str, args: &[Value]) -> Result<Value> {
        let implementation = self
            .methods
            .get(method)
            .cloned()
            .ok_or_else(|| Error::MethodNotFound {
                model: self.reference.model.clone(),
                method: method.to_string(),
            })?;
        self.calls
            .borrow_mut()
            .push((method.to_string(), args.to_vec()));
        implementation(self, args)
    }

    fn write(&self, values: &Values) -> Result<()> {
        if self.reject_writes.get() {
            return Err(Error::WriteFailed {
                record: self.reference.to_string(),
                reason: "writes rejected".to_string(),
            });
        }
        let mut fields = self.fields.borrow_mut();
        for (name, value) in values {
            fields.insert(name.clone(), value.clone());
        }
        Ok(())
    }
}

/// Object store backed by a map of [`MemoryRecord`]s
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: RefCell<BTreeMap<RecordRef, Rc<MemoryRecord>>>,
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a record, returning a shared handle to it
    pub fn insert(&self, record: MemoryRecord) -> Rc<MemoryRecord> {
        let record = Rc::new(record);
        self.records
            .borrow_mut()
            .insert(record.reference(), Rc::clone(&record));
        record
    }

    /// Get the concrete record for `reference`
    pub fn get(&self, reference: &RecordRef) -> Option<Rc<MemoryRecord>> {
        self.records.borrow().get(reference).cloned()
    }

    /// Number of stored records
    pub fn len(&self) -> usize {
        self.records.borrow().len()
    }

    /// Check if the store is empty
    pub fn is_empty(&self) -> bool {
        self.records.borrow().is_empty()
    }
}

impl ObjectStore for MemoryStore {
    fn browse(&self, reference: &RecordRef) -> Option<Rc<dyn Record>> {
        self.get(reference).map(|r| r as Rc<dyn Record>)
    }
}

/// Schema backed by explicit field definitions and translations
#[derive(Debug, Default)]
pub struct MemorySchema {
    fields: BTreeMap<(String, String), FieldDef>,
    translations: BTreeMap<(String, String), String>,
}

impl MemorySchema {
    /// Create an empty schema
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a field (builder style)
    pub fn with_field(mut self, field: FieldDef) -> Self {
        self.fields
            .insert((field.model.clone(), field.name.clone()), field);
        self
    }

    /// Register a translation (builder style)
    pub fn with_translation(
        mut self,
        lang: impl Into<String>,
        source: impl Into<String>,
        translated: impl Into<String>,
    ) -> Self {
        self.translations
            .insert((lang.into(), source.into()), translated.into());
        self
    }
}

impl Schema for MemorySchema {
    fn field(&self, model: &str, name: &str) -> Option<FieldDef> {
        self.fields
            .get(&(model.to_string(), name.to_string()))
            .cloned()
    }

    fn translate(&self, lang: &str, source: &str) -> Option<String> {
        self.translations
            .get(&(lang.to_string(), source.to_string()))
            .cloned()
    }
}
