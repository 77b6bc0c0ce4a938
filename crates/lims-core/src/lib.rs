//! # lims-core
//!
//! Core data structures shared by the lims-tools crates.
//!
//! This crate provides:
//! - [`Value`] and [`RecordRef`] - host-neutral values and record references
//! - [`Record`] and [`ObjectStore`] - the capability interface a host ORM exposes
//! - [`Schema`] and [`FieldDef`] - field reflection used for value formatting
//! - [`Environment`] - acting user, language, company and clock
//! - In-memory hosts ([`MemoryStore`], [`MemoryRecord`], [`MemorySchema`])
//!
//! ## Example
//!
//! ```rust
//! use lims_core::{MemoryRecord, MemoryStore, ObjectStore, Record, RecordRef, Value};
//!
//! let store = MemoryStore::new();
//! store.insert(MemoryRecord::new("lims.sample", 7).with_field("state", "draft"));
//!
//! let sample = store.browse(&RecordRef::new("lims.sample", 7)).unwrap();
//! assert_eq!(sample.reference().id, 7);
//! assert_eq!(
//!     lims_core::read_attribute(sample.as_ref(), "state").unwrap(),
//!     Some(Value::text("draft"))
//! );
//! ```

pub mod env;
pub mod error;
pub mod memory;
pub mod record;
pub mod schema;
pub mod value;

pub use env::{Clock, Company, Environment, FixedClock, Language, SystemClock};
pub use error::{Error, Result};
pub use memory::{MemoryRecord, MemorySchema, MemoryStore};
pub use record::{read_attribute, Attribute, ObjectStore, Record, Values};
pub use schema::{FieldDef, FieldType, Schema, SelectionOption};
pub use value::{RecordRef, Value};
