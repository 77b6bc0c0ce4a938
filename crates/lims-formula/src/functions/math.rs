//! Math functions

use super::{arg, flatten};
use crate::error::{ErrorValue, FormulaResult};
use crate::evaluator::{EvaluationContext, FormulaValue};
use rand::Rng;

/// Numbers among the arguments, arrays flattened; non-numeric values are skipped
fn numbers(args: &[FormulaValue]) -> Result<Vec<f64>, ErrorValue> {
    let mut out = Vec::new();
    for value in flatten(args) {
        match value {
            FormulaValue::Number(n) => out.push(*n),
            FormulaValue::Error(e) => return Err(*e),
            _ => {}
        }
    }
    Ok(out)
}

/// A single numeric argument; empty counts as zero
fn number_arg(args: &[FormulaValue], index: usize) -> Result<f64, ErrorValue> {
    match arg(args, index) {
        FormulaValue::Number(n) => Ok(*n),
        FormulaValue::Empty => Ok(0.0),
        FormulaValue::Error(e) => Err(*e),
        other => other.as_number().ok_or(ErrorValue::Value),
    }
}

fn numeric(result: Result<f64, ErrorValue>) -> FormulaResult<FormulaValue> {
    Ok(match result {
        Ok(n) if n.is_finite() => FormulaValue::Number(n),
        Ok(_) => FormulaValue::Error(ErrorValue::Num),
        Err(e) => FormulaValue::Error(e),
    })
}

/// SUM(values…)
pub fn fn_sum(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    numeric(numbers(args).map(|ns| ns.iter().sum()))
}

/// AVERAGE(values…) - #DIV/0! when nothing is numeric
pub fn fn_average(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    numeric(numbers(args).and_then(|ns| {
        if ns.is_empty() {
            Err(ErrorValue::Div0)
        } else {
            Ok(ns.iter().sum::<f64>() / ns.len() as f64)
        }
    }))
}

/// MIN(values…) - 0 when nothing is numeric
pub fn fn_min(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    numeric(numbers(args).map(|ns| ns.into_iter().reduce(f64::min).unwrap_or(0.0)))
}

/// MAX(values…) - 0 when nothing is numeric
pub fn fn_max(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    numeric(numbers(args).map(|ns| ns.into_iter().reduce(f64::max).unwrap_or(0.0)))
}

/// COUNT(values…) - counts numbers, errors are not counted
pub fn fn_count(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    let count = flatten(args)
        .into_iter()
        .filter(|v| matches!(v, FormulaValue::Number(_)))
        .count();
    Ok(FormulaValue::Number(count as f64))
}

/// ABS(number)
pub fn fn_abs(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    numeric(number_arg(args, 0).map(f64::abs))
}

/// ROUND(number, [digits]) - rounds half away from zero; negative digits round left of the point
pub fn fn_round(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    numeric(number_arg(args, 0).and_then(|number| {
        let digits = number_arg(args, 1)? as i32;
        let multiplier = 10_f64.powi(digits);
        Ok((number * multiplier).round() / multiplier)
    }))
}

/// INT(number) - rounds toward negative infinity
pub fn fn_int(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    numeric(number_arg(args, 0).map(f64::floor))
}

/// MOD(number, divisor) - the result takes the sign of the divisor
pub fn fn_mod(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    numeric(number_arg(args, 0).and_then(|number| {
        let divisor = number_arg(args, 1)?;
        if divisor == 0.0 {
            return Err(ErrorValue::Div0);
        }
        Ok(number - divisor * (number / divisor).floor())
    }))
}

/// POWER(base, exponent)
pub fn fn_power(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    numeric(number_arg(args, 0).and_then(|base| Ok(base.powf(number_arg(args, 1)?))))
}

/// SQRT(number) - #NUM! for negative numbers
pub fn fn_sqrt(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    numeric(number_arg(args, 0).and_then(|n| {
        if n < 0.0 {
            Err(ErrorValue::Num)
        } else {
            Ok(n.sqrt())
        }
    }))
}

/// RAND() - uniform in [0, 1)
pub fn fn_rand(_args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    Ok(FormulaValue::Number(rand::thread_rng().gen::<f64>()))
}

/// RANDBETWEEN(bottom, top) - integer in [bottom, top]
pub fn fn_randbetween(
    args: &[FormulaValue],
    _ctx: &EvaluationContext,
) -> FormulaResult<FormulaValue> {
    numeric(number_arg(args, 0).and_then(|bottom| {
        let bottom = bottom.ceil() as i64;
        let top = number_arg(args, 1)?.floor() as i64;
        if bottom > top {
            return Err(ErrorValue::Num);
        }
        Ok(rand::thread_rng().gen_range(bottom..=top) as f64)
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::functions::FunctionRegistry;

    fn call(
        f: fn(&[FormulaValue], &EvaluationContext) -> FormulaResult<FormulaValue>,
        args: &[FormulaValue],
    ) -> FormulaValue {
        let registry = FunctionRegistry::new();
        f(args, &EvaluationContext::simple(&registry)).unwrap()
    }

    fn n(v: f64) -> FormulaValue {
        FormulaValue::Number(v)
    }

    #[test]
    fn test_aggregates_skip_text() {
        let args = [n(1.0), FormulaValue::String("x".into()), n(5.0), FormulaValue::Empty];
        assert_eq!(call(fn_sum, &args), n(6.0));
        assert_eq!(call(fn_average, &args), n(3.0));
        assert_eq!(call(fn_min, &args), n(1.0));
        assert_eq!(call(fn_max, &args), n(5.0));
        assert_eq!(call(fn_count, &args), n(2.0));
    }

    #[test]
    fn test_aggregates_propagate_errors() {
        let args = [n(1.0), FormulaValue::Error(ErrorValue::Na)];
        assert_eq!(call(fn_sum, &args), FormulaValue::Error(ErrorValue::Na));
        assert_eq!(call(fn_count, &args), n(1.0));
        assert_eq!(
            call(fn_average, &[FormulaValue::String("x".into())]),
            FormulaValue::Error(ErrorValue::Div0)
        );
    }

    #[test]
    fn test_round() {
        assert_eq!(call(fn_round, &[n(2.5)]), n(3.0));
        assert_eq!(call(fn_round, &[n(-2.5)]), n(-3.0));
        assert_eq!(call(fn_round, &[n(3.14159), n(2.0)]), n(3.14));
        assert_eq!(call(fn_round, &[n(1234.0), n(-2.0)]), n(1200.0));
    }

    #[test]
    fn test_mod_int_abs() {
        assert_eq!(call(fn_mod, &[n(10.0), n(3.0)]), n(1.0));
        assert_eq!(call(fn_mod, &[n(-10.0), n(3.0)]), n(2.0));
        assert_eq!(
            call(fn_mod, &[n(1.0), n(0.0)]),
            FormulaValue::Error(ErrorValue::Div0)
        );
        assert_eq!(call(fn_int, &[n(-1.5)]), n(-2.0));
        assert_eq!(call(fn_abs, &[n(-4.0)]), n(4.0));
        assert_eq!(
            call(fn_abs, &[FormulaValue::String("abc".into())]),
            FormulaValue::Error(ErrorValue::Value)
        );
    }

    #[test]
    fn test_power_and_sqrt() {
        assert_eq!(call(fn_power, &[n(2.0), n(3.0)]), n(8.0));
        assert_eq!(call(fn_sqrt, &[n(16.0)]), n(4.0));
        assert_eq!(call(fn_sqrt, &[n(-1.0)]), FormulaValue::Error(ErrorValue::Num));
    }

    #[test]
    fn test_random() {
        for _ in 0..20 {
            match call(fn_rand, &[]) {
                FormulaValue::Number(v) => assert!((0.0..1.0).contains(&v)),
                other => panic!("unexpected {:?}", other),
            }
            match call(fn_randbetween, &[n(1.0), n(3.0)]) {
                FormulaValue::Number(v) => assert!([1.0, 2.0, 3.0].contains(&v)),
                other => panic!("unexpected {:?}", other),
            }
        }
        assert_eq!(
            call(fn_randbetween, &[n(5.0), n(1.0)]),
            FormulaValue::Error(ErrorValue::Num)
        );
    }
}
