//! # lims-audit
//!
//! Field-level change audit for lims-tools.
//!
//! This crate provides:
//! - [`ValueFormatter`] - renders raw field values the way users read them
//! - [`RecordLog`] rows, the [`OriginRegistry`] and [`LogStore`] storage
//! - [`AuditTrail`] - writes that log every change of a tracked field
//!
//! ## Example
//!
//! ```rust
//! use lims_audit::{AuditTrail, MemoryLogStore, OriginRegistry, TrackingPolicy};
//! use lims_core::{
//!     Environment, FieldDef, FieldType, MemoryRecord, MemorySchema, MemoryStore, Record,
//!     RecordRef, SelectionOption, Value, Values,
//! };
//! use std::rc::Rc;
//!
//! let schema = MemorySchema::new().with_field(FieldDef::new(
//!     "lims.sample",
//!     "state",
//!     FieldType::Selection(vec![
//!         SelectionOption::new("pending", "Pending"),
//!         SelectionOption::new("done", "Done"),
//!     ]),
//! ));
//! let store = Rc::new(MemoryStore::new());
//! let sample: Rc<dyn Record> =
//!     store.insert(MemoryRecord::new("lims.sample", 1).with_field("state", "pending"));
//!
//! let env = Environment::new(store, Rc::new(schema), RecordRef::new("res.users", 1));
//! let trail = AuditTrail::new(
//!     env,
//!     OriginRegistry::new().with_model("lims.sample"),
//!     Rc::new(MemoryLogStore::new()),
//! )
//! .with_policy(TrackingPolicy::new("lims.sample").transition("state"));
//!
//! let mut values = Values::new();
//! values.insert("state".to_string(), Value::text("done"));
//! let rows = trail.write(&[sample], &values).unwrap();
//! assert_eq!(rows[0].name, "Pending → Done");
//! assert!(rows[0].is_transition);
//! ```

pub mod error;
pub mod formatter;
pub mod record_log;
pub mod trail;

pub use error::{AuditError, AuditResult};
pub use formatter::ValueFormatter;
pub use record_log::{
    LogId, LogStore, LogValues, LoggedField, MemoryLogStore, Origin, OriginRegistry, RecordLog,
};
pub use trail::{AuditTrail, TrackingPolicy};
