//! # lims-tools
//!
//! Formula evaluation and change audit for laboratory information systems.
//!
//! ## Features
//!
//! - Spreadsheet-style formulas with laboratory functions
//! - Keyed formula templates validated at edit time
//! - Formula inputs resolved from live records through dotted paths
//! - Deferred record method calls (`RUN_LATER`)
//! - Field-level change audit with type-aware value rendering
//!
//! ## Example
//!
//! ```rust
//! use lims_tools::prelude::*;
//! use std::collections::BTreeMap;
//! use std::rc::Rc;
//!
//! let templates = Rc::new(vec![FormulaTemplate::new("Tax", "tax_rate", "=A1*0.21")]);
//! let engine = FormulaEngine::new(Rc::new(MemoryStore::new()), templates);
//!
//! let mut values = BTreeMap::new();
//! values.insert("A1".to_string(), Value::Integer(100));
//! let solution = engine.solve_formula(None, "tax_rate", &values).unwrap();
//! assert_eq!(solution.value(), Some(&FormulaValue::Number(21.0)));
//! ```

pub mod entity;
pub mod prelude;

pub use entity::FormulaEntity;

// Re-export core types
pub use lims_core::{
    read_attribute, Attribute, Clock, Company, Environment, Error, FieldDef, FieldType,
    FixedClock, Language, MemoryRecord, MemorySchema, MemoryStore, ObjectStore, Record,
    RecordRef, Result, Schema, SelectionOption, SystemClock, Value, Values,
};

// Re-export formula types
pub use lims_formula::{
    decode, encode, evaluate, parse_formula, Compiled, DeferredCall, EngineOptions,
    EvaluationContext, FormulaCatalog, FormulaCategory, FormulaEngine, FormulaError,
    FormulaExpr, FormulaResult, FormulaTemplate, FormulaValue, FunctionRegistry,
    InputExtension, RecordValues, Solution, StatusIcon, TemplateSource, TemplateStatus,
    ValueBag,
};

// Re-export audit types
pub use lims_audit::{
    AuditError, AuditResult, AuditTrail, LogStore, LogValues, LoggedField, MemoryLogStore,
    Origin, OriginRegistry, RecordLog, TrackingPolicy, ValueFormatter,
};
