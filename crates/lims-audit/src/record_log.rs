//! Audit log rows and their storage

use crate::error::{AuditError, AuditResult};
use chrono::NaiveDateTime;
use lims_core::{FieldDef, ObjectStore, Record, RecordRef};
use serde::{Deserialize, Serialize};
use std::cell::{Cell, RefCell};
use std::collections::BTreeSet;
use std::fmt;
use std::rc::Rc;

/// Identifier of a [`RecordLog`]
pub type LogId = u64;

/// Record a log row refers back to
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Origin {
    pub model: String,
    pub id: i64,
}

impl Origin {
    /// Create a new origin
    pub fn new(model: impl Into<String>, id: i64) -> Self {
        Self {
            model: model.into(),
            id,
        }
    }

    /// Reference to the originating record
    pub fn reference(&self) -> RecordRef {
        RecordRef::new(self.model.clone(), self.id)
    }
}

impl From<RecordRef> for Origin {
    fn from(reference: RecordRef) -> Self {
        Self {
            model: reference.model,
            id: reference.id,
        }
    }
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.model, self.id)
    }
}

/// Models whose records may appear as a log origin
///
/// Configured once at startup.
#[derive(Debug, Clone, Default)]
pub struct OriginRegistry {
    models: BTreeSet<String>,
}

impl OriginRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Allow `model` (builder style)
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.register(model);
        self
    }

    /// Allow `model`
    pub fn register(&mut self, model: impl Into<String>) {
        self.models.insert(model.into());
    }

    /// Check if `model` is allowed
    pub fn contains(&self, model: &str) -> bool {
        self.models.contains(model)
    }

    /// Fail unless the origin's model is allowed
    pub fn check(&self, origin: &Origin) -> AuditResult<()> {
        if self.contains(&origin.model) {
            Ok(())
        } else {
            Err(AuditError::UnknownOrigin(origin.model.clone()))
        }
    }

    /// Load the originating record
    pub fn resolve(&self, origin: &Origin, store: &dyn ObjectStore) -> AuditResult<Option<Rc<dyn Record>>> {
        self.check(origin)?;
        Ok(store.browse(&origin.reference()))
    }

    /// Allowed models, sorted
    pub fn models(&self) -> impl Iterator<Item = &str> {
        self.models.iter().map(String::as_str)
    }
}

/// Field a log row describes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggedField {
    pub model: String,
    pub name: String,
    pub label: String,
}

impl From<&FieldDef> for LoggedField {
    fn from(def: &FieldDef) -> Self {
        Self {
            model: def.model.clone(),
            name: def.name.clone(),
            label: def.label.clone(),
        }
    }
}

/// One captured change of one field on one record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordLog {
    pub id: LogId,
    /// Summary, `old → new`
    pub name: String,
    pub origin: Origin,
    /// Acting user
    pub user: RecordRef,
    pub field: LoggedField,
    pub old_value: String,
    pub new_value: String,
    /// UTC
    pub date: NaiveDateTime,
    /// The field is the model's workflow state
    pub is_transition: bool,
}

/// Summary shown for a change
pub fn summary(old_value: &str, new_value: &str) -> String {
    format!("{} → {}", old_value, new_value)
}

/// Input of [`crate::AuditTrail::register_log`]; unset values take defaults
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogValues {
    pub origin: Origin,
    pub field: LoggedField,
    pub old_value: String,
    pub new_value: String,
    pub is_transition: bool,
    pub name: Option<String>,
    pub user: Option<RecordRef>,
    pub date: Option<NaiveDateTime>,
}

impl LogValues {
    /// Create log values for a change of `field` on `origin`
    pub fn new(
        origin: Origin,
        field: LoggedField,
        old_value: impl Into<String>,
        new_value: impl Into<String>,
    ) -> Self {
        Self {
            origin,
            field,
            old_value: old_value.into(),
            new_value: new_value.into(),
            is_transition: false,
            name: None,
            user: None,
            date: None,
        }
    }

    /// Mark as a workflow transition
    pub fn transition(mut self, is_transition: bool) -> Self {
        self.is_transition = is_transition;
        self
    }

    /// Override the acting user
    pub fn by(mut self, user: RecordRef) -> Self {
        self.user = Some(user);
        self
    }

    /// Override the timestamp
    pub fn at(mut self, date: NaiveDateTime) -> Self {
        self.date = Some(date);
        self
    }

    /// Override the summary
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

/// Append-only storage of log rows
pub trait LogStore {
    /// Persist `log`, assigning its id
    fn create(&self, log: RecordLog) -> RecordLog;

    /// Rows of `origin`, oldest first
    fn logs_for(&self, origin: &Origin) -> Vec<RecordLog>;
}

/// Log store kept in memory
#[derive(Debug, Default)]
pub struct MemoryLogStore {
    logs: RefCell<Vec<RecordLog>>,
    next_id: Cell<LogId>,
}

impl MemoryLogStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Every row, oldest first
    pub fn logs(&self) -> Vec<RecordLog> {
        self.logs.borrow().clone()
    }

    /// Number of rows
    pub fn len(&self) -> usize {
        self.logs.borrow().len()
    }

    /// Check if nothing was logged
    pub fn is_empty(&self) -> bool {
        self.logs.borrow().is_empty()
    }
}

impl LogStore for MemoryLogStore {
    fn create(&self, mut log: RecordLog) -> RecordLog {
        let id = self.next_id.get() + 1;
        self.next_id.set(id);
        log.id = id;
        self.logs.borrow_mut().push(log.clone());
        log
    }

    fn logs_for(&self, origin: &Origin) -> Vec<RecordLog> {
        self.logs
            .borrow()
            .iter()
            .filter(|log| &log.origin == origin)
            .cloned()
            .collect()
    }
}
