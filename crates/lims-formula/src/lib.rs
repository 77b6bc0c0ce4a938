//! # lims-formula
//!
//! Formula templates and evaluation engine for lims-tools.
//!
//! This crate provides:
//! - Formula parsing (text → AST) and evaluation (AST → value)
//! - A spreadsheet function library plus laboratory functions
//!   (`FLOAT`, `STR_INCLUDES`, `IS_NUMBER`, `RUN`, `RUN_LATER`)
//! - Keyed formula templates with edit-time validation
//! - [`FormulaEngine`], which resolves formula inputs from live records
//! - The argument codec used by deferred calls
//!
//! ## Example
//!
//! ```rust
//! use lims_core::{MemoryStore, Value};
//! use lims_formula::{FormulaCatalog, FormulaEngine, FormulaTemplate, FormulaValue};
//! use std::cell::RefCell;
//! use std::collections::BTreeMap;
//! use std::rc::Rc;
//!
//! let catalog = Rc::new(RefCell::new(FormulaCatalog::new()));
//! catalog
//!     .borrow_mut()
//!     .create(FormulaTemplate::new("Tax", "tax_rate", "=A1*0.21"))
//!     .unwrap();
//!
//! let engine = FormulaEngine::new(Rc::new(MemoryStore::new()), catalog);
//! let mut values = BTreeMap::new();
//! values.insert("A1".to_string(), Value::Integer(100));
//!
//! let solution = engine.solve_formula(None, "tax_rate", &values).unwrap();
//! assert_eq!(solution.value(), Some(&FormulaValue::Number(21.0)));
//! ```

pub mod ast;
pub mod codec;
pub mod compile;
pub mod engine;
pub mod error;
pub mod evaluator;
pub mod functions;
pub mod parser;
pub mod resolver;
pub mod template;

pub use ast::{BinaryOperator, FormulaExpr, UnaryOperator};
pub use codec::{decode, encode, DecodedCall, DeferredCall};
pub use compile::{check_template, compile, Compiled, CompiledFormula, StatusIcon, TemplateStatus};
pub use engine::{EngineOptions, FormulaEngine, InputExtension, RecordValues, Solution, ValueBag};
pub use error::{ErrorValue, FormulaError, FormulaResult};
pub use evaluator::{evaluate, EvaluationContext, FormulaValue};
pub use functions::{FunctionDef, FunctionRegistry};
pub use parser::parse_formula;
pub use resolver::{AttributePathResolver, PathSegment, RecordPathResolver};
pub use template::{CategoryId, FormulaCatalog, FormulaCategory, FormulaTemplate, TemplateId, TemplateSource};
