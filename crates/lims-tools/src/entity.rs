//! Records bound to a formula engine
//!
//! Entities do not inherit formula support; they are paired with a shared
//! [`FormulaEngine`] through [`FormulaEntity`], which makes the record the
//! caller of every formula it solves.
//!
//! # Example
//!
//! ```rust
//! use lims_tools::prelude::*;
//! use std::cell::RefCell;
//! use std::rc::Rc;
//!
//! let catalog = Rc::new(RefCell::new(FormulaCatalog::new()));
//! catalog
//!     .borrow_mut()
//!     .create(FormulaTemplate::new("Dilution", "dilution", "=volume / aliquot"))
//!     .unwrap();
//! let engine = FormulaEngine::new(Rc::new(MemoryStore::new()), catalog);
//!
//! let sample = MemoryRecord::new("lims.sample", 1)
//!     .with_field("volume", 50)
//!     .with_field("aliquot", 5);
//! let entity = FormulaEntity::new(&engine, &sample);
//! assert_eq!(
//!     entity.solve("dilution").unwrap().value(),
//!     Some(&FormulaValue::Number(10.0))
//! );
//! ```

use lims_core::{Record, Value};
use lims_formula::{
    FormulaEngine, FormulaResult, FormulaTemplate, Solution, TemplateStatus, ValueBag,
};

/// A record acting as the caller of formulas
pub struct FormulaEntity<'a> {
    engine: &'a FormulaEngine,
    record: &'a dyn Record,
}

impl<'a> FormulaEntity<'a> {
    /// Pair `record` with `engine`
    pub fn new(engine: &'a FormulaEngine, record: &'a dyn Record) -> Self {
        Self { engine, record }
    }

    /// The bound record
    pub fn record(&self) -> &'a dyn Record {
        self.record
    }

    /// Solve `key` from the record's own attributes
    pub fn solve(&self, key: &str) -> FormulaResult<Solution> {
        self.solve_with(key, &())
    }

    /// Solve `key`, falling back to `values` for inputs the record lacks
    pub fn solve_with(&self, key: &str, values: &dyn ValueBag) -> FormulaResult<Solution> {
        self.engine.solve_formula(Some(self.record), key, values)
    }

    /// Resolve a single formula input
    pub fn input(&self, name: &str) -> FormulaResult<Value> {
        self.engine.get_input_value(Some(self.record), name, &())
    }

    /// Status of `template` as seen from this record
    pub fn status(&self, template: &FormulaTemplate) -> TemplateStatus {
        self.engine.check_template(template, Some(self.record))
    }
}
