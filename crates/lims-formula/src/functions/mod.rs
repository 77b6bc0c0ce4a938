//! Built-in formula functions
//!
//! The [`FunctionRegistry`] is an explicit value: build it once, then pass it
//! to the compiler and the engine.

pub mod info;
pub mod lims;
pub mod logical;
pub mod math;
pub mod text;

use crate::error::FormulaResult;
use crate::evaluator::{EvaluationContext, FormulaValue};
use ahash::AHashMap;

/// Function implementation signature
///
/// Functions receive already-evaluated arguments and may consult the
/// evaluation context (record access for `RUN`).
pub type FunctionImpl = fn(&[FormulaValue], &EvaluationContext) -> FormulaResult<FormulaValue>;

/// Function definition
#[derive(Clone)]
pub struct FunctionDef {
    /// Function name (uppercase)
    pub name: &'static str,
    /// Minimum arguments
    pub min_args: usize,
    /// Maximum arguments (None = unlimited)
    pub max_args: Option<usize>,
    /// Implementation
    pub implementation: FunctionImpl,
}

impl FunctionDef {
    /// Create a function definition
    pub fn new(
        name: &'static str,
        min_args: usize,
        max_args: Option<usize>,
        implementation: FunctionImpl,
    ) -> Self {
        Self {
            name,
            min_args,
            max_args,
            implementation,
        }
    }
}

impl std::fmt::Debug for FunctionDef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FunctionDef")
            .field("name", &self.name)
            .field("min_args", &self.min_args)
            .field("max_args", &self.max_args)
            .finish()
    }
}

/// Function registry
#[derive(Debug, Clone)]
pub struct FunctionRegistry {
    functions: AHashMap<String, FunctionDef>,
}

impl FunctionRegistry {
    /// Create a registry with the base spreadsheet library
    pub fn new() -> Self {
        let mut registry = Self {
            functions: AHashMap::new(),
        };

        registry.register_math_functions();
        registry.register_logical_functions();
        registry.register_text_functions();
        registry.register_info_functions();

        registry
    }

    /// Create a registry with the base library and the laboratory functions
    pub fn with_lims_functions() -> Self {
        let mut registry = Self::new();
        registry.register_lims_functions();
        registry
    }

    /// Look up a function by name
    pub fn get(&self, name: &str) -> Option<&FunctionDef> {
        self.functions.get(&name.to_uppercase())
    }

    /// Check whether a function is registered
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Register a function, replacing any previous definition with the same name
    pub fn register(&mut self, def: FunctionDef) {
        self.functions.insert(def.name.to_uppercase(), def);
    }

    /// Registered names, sorted
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.functions.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Register `FLOAT`, `STR_INCLUDES`, `IS_NUMBER`, `RUN` and `RUN_LATER`
    pub fn register_lims_functions(&mut self) {
        self.register(FunctionDef::new("FLOAT", 1, Some(1), lims::fn_float));
        self.register(FunctionDef::new("STR_INCLUDES", 2, Some(2), lims::fn_str_includes));
        self.register(FunctionDef::new("IS_NUMBER", 1, Some(1), lims::fn_is_number));
        self.register(FunctionDef::new("RUN", 2, None, lims::fn_run));
        self.register(FunctionDef::new("RUN_LATER", 2, None, lims::fn_run_later));
    }

    fn register_math_functions(&mut self) {
        self.register(FunctionDef::new("SUM", 1, None, math::fn_sum));
        self.register(FunctionDef::new("AVERAGE", 1, None, math::fn_average));
        self.register(FunctionDef::new("MIN", 1, None, math::fn_min));
        self.register(FunctionDef::new("MAX", 1, None, math::fn_max));
        self.register(FunctionDef::new("COUNT", 1, None, math::fn_count));
        self.register(FunctionDef::new("ABS", 1, Some(1), math::fn_abs));
        self.register(FunctionDef::new("ROUND", 1, Some(2), math::fn_round));
        self.register(FunctionDef::new("INT", 1, Some(1), math::fn_int));
        self.register(FunctionDef::new("MOD", 2, Some(2), math::fn_mod));
        self.register(FunctionDef::new("POWER", 2, Some(2), math::fn_power));
        self.register(FunctionDef::new("SQRT", 1, Some(1), math::fn_sqrt));
        self.register(FunctionDef::new("RAND", 0, Some(0), math::fn_rand));
        self.register(FunctionDef::new("RANDBETWEEN", 2, Some(2), math::fn_randbetween));
    }

    fn register_logical_functions(&mut self) {
        self.register(FunctionDef::new("IF", 2, Some(3), logical::fn_if));
        self.register(FunctionDef::new("AND", 1, None, logical::fn_and));
        self.register(FunctionDef::new("OR", 1, None, logical::fn_or));
        self.register(FunctionDef::new("NOT", 1, Some(1), logical::fn_not));
        self.register(FunctionDef::new("IFERROR", 2, Some(2), logical::fn_iferror));
        self.register(FunctionDef::new("TRUE", 0, Some(0), logical::fn_true));
        self.register(FunctionDef::new("FALSE", 0, Some(0), logical::fn_false));
    }

    fn register_text_functions(&mut self) {
        self.register(FunctionDef::new("LEN", 1, Some(1), text::fn_len));
        self.register(FunctionDef::new("LEFT", 1, Some(2), text::fn_left));
        self.register(FunctionDef::new("RIGHT", 1, Some(2), text::fn_right));
        self.register(FunctionDef::new("UPPER", 1, Some(1), text::fn_upper));
        self.register(FunctionDef::new("LOWER", 1, Some(1), text::fn_lower));
        self.register(FunctionDef::new("TRIM", 1, Some(1), text::fn_trim));
        self.register(FunctionDef::new("CONCAT", 1, None, text::fn_concat));
        self.register(FunctionDef::new("CONCATENATE", 1, None, text::fn_concat));
    }

    fn register_info_functions(&mut self) {
        self.register(FunctionDef::new("ISBLANK", 1, Some(1), info::fn_isblank));
        self.register(FunctionDef::new("ISNUMBER", 1, Some(1), info::fn_isnumber));
        self.register(FunctionDef::new("ISTEXT", 1, Some(1), info::fn_istext));
        self.register(FunctionDef::new("ISERROR", 1, Some(1), info::fn_iserror));
        self.register(FunctionDef::new("ISNA", 1, Some(1), info::fn_isna));
        self.register(FunctionDef::new("NA", 0, Some(0), info::fn_na));
    }
}

impl Default for FunctionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

static EMPTY: FormulaValue = FormulaValue::Empty;

/// Argument `index`, or empty when it was omitted
pub(crate) fn arg(args: &[FormulaValue], index: usize) -> &FormulaValue {
    args.get(index).unwrap_or(&EMPTY)
}

/// Every scalar in `args`, with arrays flattened row by row
pub(crate) fn flatten(args: &[FormulaValue]) -> Vec<&FormulaValue> {
    let mut out = Vec::with_capacity(args.len());
    for arg in args {
        match arg {
            FormulaValue::Array(rows) => {
                for row in rows {
                    out.extend(flatten(row));
                }
            }
            other => out.push(other),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_contents() {
        let base = FunctionRegistry::new();
        assert!(base.contains("sum"));
        assert!(base.contains("IF"));
        assert!(!base.contains("RUN_LATER"));

        let lims = FunctionRegistry::with_lims_functions();
        for name in ["FLOAT", "STR_INCLUDES", "IS_NUMBER", "RUN", "RUN_LATER"] {
            assert!(lims.contains(name), "{} missing", name);
        }
        assert_eq!(lims.get("RUN").map(|def| (def.min_args, def.max_args)), Some((2, None)));
        assert!(lims.names().windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_register_replaces() {
        fn always_one(_: &[FormulaValue], _: &EvaluationContext) -> FormulaResult<FormulaValue> {
            Ok(FormulaValue::Number(1.0))
        }

        let mut registry = FunctionRegistry::new();
        let before = registry.names().len();
        registry.register(FunctionDef::new("abs", 0, None, always_one));
        assert_eq!(registry.names().len(), before);
        assert_eq!(registry.get("ABS").map(|d| d.min_args), Some(0));
    }

    #[test]
    fn test_flatten_nested_arrays() {
        let args = vec![
            FormulaValue::Number(1.0),
            FormulaValue::Array(vec![vec![
                FormulaValue::Number(2.0),
                FormulaValue::Array(vec![vec![FormulaValue::Number(3.0)]]),
            ]]),
        ];
        let flat: Vec<_> = flatten(&args).into_iter().cloned().collect();
        assert_eq!(
            flat,
            vec![
                FormulaValue::Number(1.0),
                FormulaValue::Number(2.0),
                FormulaValue::Number(3.0)
            ]
        );
    }
}
