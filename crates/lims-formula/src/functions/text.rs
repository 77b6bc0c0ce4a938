//! Text functions

use super::{arg, flatten};
use crate::error::{ErrorValue, FormulaResult};
use crate::evaluator::{EvaluationContext, FormulaValue};

/// The argument as text; errors pass through and arrays are rejected
fn text_arg(args: &[FormulaValue], index: usize) -> Result<String, ErrorValue> {
    match arg(args, index) {
        FormulaValue::Error(e) => Err(*e),
        FormulaValue::Array(_) | FormulaValue::Deferred(_) => Err(ErrorValue::Value),
        other => Ok(other.as_string()),
    }
}

/// Character count argument, defaulting to 1 when omitted
fn count_arg(args: &[FormulaValue], index: usize) -> Result<usize, ErrorValue> {
    match args.get(index) {
        None => Ok(1),
        Some(FormulaValue::Error(e)) => Err(*e),
        Some(v) => match v.as_number().map(f64::trunc) {
            Some(n) if n >= 0.0 => Ok(n as usize),
            _ => Err(ErrorValue::Value),
        },
    }
}

fn text_result(result: Result<String, ErrorValue>) -> FormulaResult<FormulaValue> {
    Ok(result.map_or_else(FormulaValue::Error, FormulaValue::String))
}

/// LEN(text) - length in characters
pub fn fn_len(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    Ok(match text_arg(args, 0) {
        Ok(s) => FormulaValue::Number(s.chars().count() as f64),
        Err(e) => FormulaValue::Error(e),
    })
}

/// LEFT(text, [num_chars])
pub fn fn_left(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    text_result(text_arg(args, 0).and_then(|s| {
        let n = count_arg(args, 1)?;
        Ok(s.chars().take(n).collect())
    }))
}

/// RIGHT(text, [num_chars])
pub fn fn_right(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    text_result(text_arg(args, 0).and_then(|s| {
        let n = count_arg(args, 1)?;
        let len = s.chars().count();
        Ok(s.chars().skip(len.saturating_sub(n)).collect())
    }))
}

/// UPPER(text)
pub fn fn_upper(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    text_result(text_arg(args, 0).map(|s| s.to_uppercase()))
}

/// LOWER(text)
pub fn fn_lower(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    text_result(text_arg(args, 0).map(|s| s.to_lowercase()))
}

/// TRIM(text) - strips the ends and collapses inner runs of spaces
pub fn fn_trim(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    text_result(text_arg(args, 0).map(|s| s.split_whitespace().collect::<Vec<_>>().join(" ")))
}

/// CONCAT(values…) / CONCATENATE(values…)
pub fn fn_concat(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    let mut out = String::new();
    for value in flatten(args) {
        if let FormulaValue::Error(e) = value {
            return Ok(FormulaValue::Error(*e));
        }
        out.push_str(&value.as_string());
    }
    Ok(FormulaValue::String(out))
}

#[cfg(test)]
mod tests {
    use crate::error::ErrorValue;
    use crate::evaluator::{evaluate, EvaluationContext, FormulaValue};
    use crate::functions::FunctionRegistry;
    use crate::parser::parse_formula;

    fn eval(formula: &str) -> FormulaValue {
        let registry = FunctionRegistry::new();
        let ast = parse_formula(formula).unwrap();
        evaluate(&ast, &EvaluationContext::simple(&registry)).unwrap()
    }

    fn s(v: &str) -> FormulaValue {
        FormulaValue::String(v.into())
    }

    #[test]
    fn test_len_left_right() {
        assert_eq!(eval("=LEN(\"Añejo\")"), FormulaValue::Number(5.0));
        assert_eq!(eval("=LEFT(\"Sample\",3)"), s("Sam"));
        assert_eq!(eval("=LEFT(\"Sample\")"), s("S"));
        assert_eq!(eval("=RIGHT(\"Sample\",2)"), s("le"));
        assert_eq!(eval("=RIGHT(\"ab\",10)"), s("ab"));
        assert_eq!(
            eval("=LEFT(\"ab\",-1)"),
            FormulaValue::Error(ErrorValue::Value)
        );
    }

    #[test]
    fn test_case_and_trim() {
        assert_eq!(eval("=UPPER(\"ppm\")"), s("PPM"));
        assert_eq!(eval("=LOWER(\"PPM\")"), s("ppm"));
        assert_eq!(eval("=TRIM(\"  lot   42 \")"), s("lot 42"));
    }

    #[test]
    fn test_concat() {
        assert_eq!(eval("=CONCAT(\"A\",1,TRUE)"), s("A1TRUE"));
        assert_eq!(eval("=CONCATENATE({\"x\",\"y\"},\"z\")"), s("xyz"));
        assert_eq!(
            eval("=CONCAT(\"a\",#N/A)"),
            FormulaValue::Error(ErrorValue::Na)
        );
    }
}
