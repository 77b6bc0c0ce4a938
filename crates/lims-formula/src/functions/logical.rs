//! Logical functions

use super::{arg, flatten};
use crate::error::{ErrorValue, FormulaResult};
use crate::evaluator::{EvaluationContext, FormulaValue};

/// IF(condition, if_true, [if_false])
///
/// The evaluator only evaluates the taken branch; the other one arrives empty.
pub fn fn_if(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    let condition = match arg(args, 0) {
        FormulaValue::Error(e) => return Ok(FormulaValue::Error(*e)),
        other => other.as_bool(),
    };

    Ok(match condition {
        Some(true) => arg(args, 1).clone(),
        Some(false) if args.len() > 2 => arg(args, 2).clone(),
        Some(false) => FormulaValue::Boolean(false),
        None => FormulaValue::Error(ErrorValue::Value),
    })
}

/// Fold booleans out of the arguments; text and empties are ignored
fn fold_bools(args: &[FormulaValue], short_circuit: bool) -> FormulaValue {
    let mut seen = false;
    for value in flatten(args) {
        let b = match value {
            FormulaValue::Error(e) => return FormulaValue::Error(*e),
            FormulaValue::Boolean(b) => *b,
            FormulaValue::Number(n) => *n != 0.0,
            _ => continue,
        };
        if b == short_circuit {
            return FormulaValue::Boolean(short_circuit);
        }
        seen = true;
    }
    if seen {
        FormulaValue::Boolean(!short_circuit)
    } else {
        FormulaValue::Error(ErrorValue::Value)
    }
}

/// AND(values…)
pub fn fn_and(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    Ok(fold_bools(args, false))
}

/// OR(values…)
pub fn fn_or(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    Ok(fold_bools(args, true))
}

/// NOT(value)
pub fn fn_not(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    Ok(match arg(args, 0) {
        FormulaValue::Error(e) => FormulaValue::Error(*e),
        other => other
            .as_bool()
            .map_or(FormulaValue::Error(ErrorValue::Value), |b| {
                FormulaValue::Boolean(!b)
            }),
    })
}

/// IFERROR(value, value_if_error)
pub fn fn_iferror(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    let value = arg(args, 0);
    Ok(if value.is_error() {
        arg(args, 1).clone()
    } else {
        value.clone()
    })
}

/// TRUE()
pub fn fn_true(_args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    Ok(FormulaValue::Boolean(true))
}

/// FALSE()
pub fn fn_false(_args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    Ok(FormulaValue::Boolean(false))
}
