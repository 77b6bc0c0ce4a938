//! Information functions

use super::arg;
use crate::error::{ErrorValue, FormulaResult};
use crate::evaluator::{EvaluationContext, FormulaValue};

fn probe(args: &[FormulaValue], test: fn(&FormulaValue) -> bool) -> FormulaResult<FormulaValue> {
    let value = arg(args, 0);
    if matches!(value, FormulaValue::Array(_)) {
        return Ok(FormulaValue::Error(ErrorValue::Value));
    }
    Ok(FormulaValue::Boolean(test(value)))
}

/// ISBLANK(value)
pub fn fn_isblank(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    probe(args, |v| matches!(v, FormulaValue::Empty))
}

/// ISNUMBER(value) - true only for numbers, unlike the coercing IS_NUMBER
pub fn fn_isnumber(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    probe(args, |v| matches!(v, FormulaValue::Number(_)))
}

/// ISTEXT(value)
pub fn fn_istext(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    probe(args, |v| matches!(v, FormulaValue::String(_)))
}

/// ISERROR(value)
pub fn fn_iserror(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    probe(args, FormulaValue::is_error)
}

/// ISNA(value)
pub fn fn_isna(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    probe(args, |v| matches!(v, FormulaValue::Error(ErrorValue::Na)))
}

/// NA()
pub fn fn_na(_args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    Ok(FormulaValue::Error(ErrorValue::Na))
}
