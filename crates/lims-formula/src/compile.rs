//! Template compilation and validation
//!
//! Expression problems are data here, never errors: a broken template
//! compiles to [`Compiled::Invalid`] carrying an `Invalid Formula: …` message.

use crate::ast::FormulaExpr;
use crate::error::{FormulaError, FormulaResult};
use crate::evaluator::{evaluate, EvaluationContext, FormulaValue};
use crate::functions::FunctionRegistry;
use crate::parser::parse_formula;
use crate::resolver::{parse_segment, split_path};
use lims_core::ObjectStore;
use std::collections::BTreeSet;
use std::fmt;

/// Outcome of compiling a template expression
#[derive(Debug, Clone, PartialEq)]
pub enum Compiled {
    /// A live formula
    Formula(CompiledFormula),
    /// A constant (expression without a leading `=`)
    Static(FormulaValue),
    /// The expression cannot be evaluated; carries the message to show
    Invalid(String),
}

impl Compiled {
    /// Check if compilation failed
    pub fn is_invalid(&self) -> bool {
        matches!(self, Compiled::Invalid(_))
    }
}

/// A parsed formula and the inputs it reads
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledFormula {
    expr: FormulaExpr,
    inputs: Vec<String>,
}

impl CompiledFormula {
    /// Input names in order of first use, deduplicated ignoring case
    pub fn inputs(&self) -> &[String] {
        &self.inputs
    }

    /// The parsed expression
    pub fn expr(&self) -> &FormulaExpr {
        &self.expr
    }

    /// Evaluate with positional input values; missing trailing values are empty
    pub fn call(
        &self,
        registry: &FunctionRegistry,
        store: Option<&dyn ObjectStore>,
        args: &[FormulaValue],
    ) -> FormulaResult<FormulaValue> {
        if args.len() > self.inputs.len() {
            return Err(FormulaError::ArgumentCount {
                function: "formula".to_string(),
                expected: format!("at most {}", self.inputs.len()),
                actual: args.len(),
            });
        }
        let inputs = self.inputs.iter().enumerate().map(|(i, name)| {
            (name.clone(), args.get(i).cloned().unwrap_or(FormulaValue::Empty))
        });
        let ctx = EvaluationContext::new(registry, inputs, store);
        evaluate(&self.expr, &ctx)
    }
}

/// Compile a template expression against `registry`
pub fn compile(expression: &str, registry: &FunctionRegistry) -> Compiled {
    let trimmed = expression.trim();
    if !trimmed.starts_with('=') {
        return Compiled::Static(static_value(trimmed));
    }

    let expr = match parse_formula(trimmed) {
        Ok(expr) => expr,
        Err(FormulaError::Parse(message)) => {
            return Compiled::Invalid(format!("Invalid Formula: {}", message))
        }
        Err(other) => return Compiled::Invalid(format!("Invalid Formula: {}", other)),
    };

    let mut unknown = BTreeSet::new();
    let mut inputs: Vec<String> = Vec::new();
    expr.walk(&mut |node| match node {
        FormulaExpr::Function { name, .. } if !registry.contains(name) => {
            unknown.insert(name.clone());
        }
        FormulaExpr::Input(name) => {
            if !inputs.iter().any(|seen| seen.eq_ignore_ascii_case(name)) {
                inputs.push(name.clone());
            }
        }
        _ => {}
    });

    if !unknown.is_empty() {
        let names: Vec<String> = unknown.into_iter().collect();
        return Compiled::Invalid(format!(
            "Invalid Formula: unknown method(s): {}",
            names.join(", ")
        ));
    }

    Compiled::Formula(CompiledFormula { expr, inputs })
}

/// Value of a constant expression: number, TRUE/FALSE, empty, or text
fn static_value(text: &str) -> FormulaValue {
    if text.is_empty() {
        return FormulaValue::Empty;
    }
    if let Ok(n) = text.parse::<f64>() {
        if n.is_finite() {
            return FormulaValue::Number(n);
        }
    }
    if text.eq_ignore_ascii_case("TRUE") {
        return FormulaValue::Boolean(true);
    }
    if text.eq_ignore_ascii_case("FALSE") {
        return FormulaValue::Boolean(false);
    }
    FormulaValue::String(text.to_string())
}

/// First segment name of an input path (`sample` for `sample.qty{2}.x`)
pub fn input_head(input: &str) -> String {
    split_path(input)
        .first()
        .and_then(|segment| parse_segment(segment))
        .map(|segment| segment.name)
        .unwrap_or_else(|| input.to_string())
}

/// Edit-time state of a template
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemplateStatus {
    /// Compiles and every input is known
    Valid,
    /// Compiles, but these inputs can only be resolved at solve time
    Unresolved(Vec<String>),
    /// Does not compile
    Invalid(String),
}

/// Traffic-light rendering of a [`TemplateStatus`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatusIcon {
    /// Ready to solve
    Green,
    /// Solvable once the missing inputs are supplied
    Yellow,
    /// Broken expression
    Red,
}

impl StatusIcon {
    /// Lowercase color name
    pub fn as_str(&self) -> &'static str {
        match self {
            StatusIcon::Green => "green",
            StatusIcon::Yellow => "yellow",
            StatusIcon::Red => "red",
        }
    }
}

impl fmt::Display for StatusIcon {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TemplateStatus {
    /// Icon shown next to the template
    pub fn icon(&self) -> StatusIcon {
        match self {
            TemplateStatus::Valid => StatusIcon::Green,
            TemplateStatus::Unresolved(_) => StatusIcon::Yellow,
            TemplateStatus::Invalid(_) => StatusIcon::Red,
        }
    }

    /// Check if the template can be solved
    pub fn is_valid(&self) -> bool {
        !matches!(self, TemplateStatus::Invalid(_))
    }
}

/// Validate a compiled template; `known` tells whether an input head is available at edit time
pub fn check_template(compiled: &Compiled, known: impl Fn(&str) -> bool) -> TemplateStatus {
    match compiled {
        Compiled::Invalid(message) => TemplateStatus::Invalid(message.clone()),
        Compiled::Static(_) => TemplateStatus::Valid,
        Compiled::Formula(formula) => {
            let unresolved: Vec<String> = formula
                .inputs()
                .iter()
                .filter(|input| !known(&input_head(input)))
                .cloned()
                .collect();
            if unresolved.is_empty() {
                TemplateStatus::Valid
            } else {
                TemplateStatus::Unresolved(unresolved)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn registry() -> FunctionRegistry {
        FunctionRegistry::with_lims_functions()
    }

    #[test]
    fn test_compile_collects_inputs() {
        let compiled = compile("=A1*rate + a1 + SUM(sample.qty, Rate)", &registry());
        match compiled {
            Compiled::Formula(formula) => {
                assert_eq!(formula.inputs(), &["A1", "rate", "sample.qty"]);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_static_expressions() {
        let registry = registry();
        assert_eq!(compile("0.21", &registry), Compiled::Static(FormulaValue::Number(0.21)));
        assert_eq!(compile("true", &registry), Compiled::Static(FormulaValue::Boolean(true)));
        assert_eq!(compile("  ", &registry), Compiled::Static(FormulaValue::Empty));
        assert_eq!(
            compile("ppm", &registry),
            Compiled::Static(FormulaValue::String("ppm".into()))
        );
    }

    #[test]
    fn test_syntax_error_is_data() {
        match compile("=1+", &registry()) {
            Compiled::Invalid(message) => assert!(message.starts_with("Invalid Formula: ")),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_unknown_functions_are_named() {
        assert_eq!(
            compile("=ZETA(1) + ALPHA(2) + ZETA(3) + SUM(1)", &registry()),
            Compiled::Invalid("Invalid Formula: unknown method(s): ALPHA, ZETA".into())
        );
        // the base registry does not know the laboratory functions
        assert!(compile("=FLOAT(1)", &FunctionRegistry::new()).is_invalid());
    }

    #[test]
    fn test_call_is_positional() {
        let registry = registry();
        let formula = match compile("=a - b", &registry) {
            Compiled::Formula(formula) => formula,
            other => panic!("unexpected {:?}", other),
        };
        let result = formula
            .call(&registry, None, &[FormulaValue::Number(10.0), FormulaValue::Number(4.0)])
            .unwrap();
        assert_eq!(result, FormulaValue::Number(6.0));

        // missing values are empty
        let result = formula.call(&registry, None, &[FormulaValue::Number(10.0)]).unwrap();
        assert_eq!(result, FormulaValue::Number(10.0));

        assert!(formula
            .call(&registry, None, &[FormulaValue::Empty, FormulaValue::Empty, FormulaValue::Empty])
            .is_err());
    }

    #[test]
    fn test_input_head() {
        assert_eq!(input_head("sample.qty"), "sample");
        assert_eq!(input_head("label{\"a.b\"}.x"), "label");
        assert_eq!(input_head("A1"), "A1");
    }

    #[test]
    fn test_check_template() {
        let registry = registry();
        let known = |name: &str| name == "sample";

        let status = check_template(&compile("=sample.qty * 2", &registry), known);
        assert_eq!(status, TemplateStatus::Valid);
        assert_eq!(status.icon(), StatusIcon::Green);

        let status = check_template(&compile("=sample.qty * factor", &registry), known);
        assert_eq!(status, TemplateStatus::Unresolved(vec!["factor".into()]));
        assert_eq!(status.icon(), StatusIcon::Yellow);
        assert!(status.is_valid());

        let status = check_template(&compile("=NOPE()", &registry), known);
        assert_eq!(status.icon(), StatusIcon::Red);
        assert!(!status.is_valid());

        assert_eq!(
            check_template(&compile("42", &registry), known),
            TemplateStatus::Valid
        );
    }
}
