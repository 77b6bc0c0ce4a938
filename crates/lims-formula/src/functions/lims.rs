//! Laboratory functions: coercion probes and record method dispatch

use super::arg;
use crate::codec::DeferredCall;
use crate::error::{FormulaError, FormulaResult};
use crate::evaluator::{EvaluationContext, FormulaValue};
use lims_core::{Attribute, ObjectStore, RecordRef, Value};

/// Float coercion: numbers, booleans and numeric text
fn coerce_float(value: &FormulaValue) -> Option<f64> {
    match value {
        FormulaValue::Number(n) => Some(*n),
        FormulaValue::Boolean(b) => Some(if *b { 1.0 } else { 0.0 }),
        FormulaValue::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// FLOAT(x) - fails the evaluation when `x` is not numeric
pub fn fn_float(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    let value = arg(args, 0);
    if let FormulaValue::Error(e) = value {
        return Ok(FormulaValue::Error(*e));
    }
    coerce_float(value)
        .map(FormulaValue::Number)
        .ok_or_else(|| {
            FormulaError::Evaluation(format!("could not convert {} to float", value.as_string()))
        })
}

/// IS_NUMBER(x) - true when FLOAT(x) would succeed
pub fn fn_is_number(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    Ok(FormulaValue::Boolean(coerce_float(arg(args, 0)).is_some()))
}

/// STR_INCLUDES(delimited, value) - membership in a `;`-separated list
pub fn fn_str_includes(
    args: &[FormulaValue],
    _ctx: &EvaluationContext,
) -> FormulaResult<FormulaValue> {
    let haystack = arg(args, 0).as_string();
    let needle = arg(args, 1).as_string();
    let needle = needle.trim();
    Ok(FormulaValue::Boolean(
        haystack.split(';').any(|item| item.trim() == needle),
    ))
}

/// Target, method name and arguments of a `RUN`/`RUN_LATER` call
fn call_parts(args: &[FormulaValue]) -> FormulaResult<(&FormulaValue, String, Vec<Value>)> {
    let method = match arg(args, 1) {
        FormulaValue::String(name) if !name.trim().is_empty() => name.trim().to_string(),
        other => {
            return Err(FormulaError::FormulaFailed(format!(
                "method name must be text, got {}",
                other.as_string()
            )))
        }
    };
    let rest = args.iter().skip(2).map(FormulaValue::to_value).collect();
    Ok((arg(args, 0), method, rest))
}

/// Invoke `method` on the record behind `target`
///
/// A missing record or method is a user-facing [`FormulaError::FormulaFailed`].
pub(crate) fn dispatch(
    store: &dyn ObjectStore,
    target: &RecordRef,
    method: &str,
    args: &[Value],
) -> FormulaResult<Value> {
    let record = store
        .browse(target)
        .ok_or_else(|| FormulaError::FormulaFailed(format!("record {} does not exist", target)))?;

    if record.attribute(method) != Attribute::Method {
        return Err(FormulaError::FormulaFailed(format!(
            "{} has no method {}",
            target.model, method
        )));
    }

    record.call(method, args).map_err(|e| match e {
        lims_core::Error::MethodNotFound { model, method } => {
            FormulaError::FormulaFailed(format!("{} has no method {}", model, method))
        }
        other => FormulaError::Core(other),
    })
}

/// RUN(object, method, args…) - call now; a null target yields empty without calling
pub fn fn_run(args: &[FormulaValue], ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    let (target, method, rest) = call_parts(args)?;
    if !target.is_truthy() {
        return Ok(FormulaValue::Empty);
    }

    let reference = match target {
        FormulaValue::Record(r) => r,
        other => {
            return Err(FormulaError::FormulaFailed(format!(
                "cannot run {} on {}",
                method,
                other.as_string()
            )))
        }
    };
    let store = ctx.store.ok_or_else(|| {
        FormulaError::FormulaFailed(format!("no record access to run {}", method))
    })?;

    dispatch(store, reference, &method, &rest).map(FormulaValue::from)
}

/// RUN_LATER(object, method, args…) - schedule the call for after evaluation
pub fn fn_run_later(
    args: &[FormulaValue],
    _ctx: &EvaluationContext,
) -> FormulaResult<FormulaValue> {
    let (target, method, rest) = call_parts(args)?;
    DeferredCall::new(&target.to_value(), &method, &rest).map(FormulaValue::Deferred)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluator::evaluate;
    use crate::functions::FunctionRegistry;
    use crate::parser::parse_formula;
    use lims_core::{MemoryRecord, MemoryStore};
    use pretty_assertions::assert_eq;

    fn eval_in(
        formula: &str,
        store: Option<&dyn ObjectStore>,
        inputs: Vec<(&str, FormulaValue)>,
    ) -> FormulaResult<FormulaValue> {
        let registry = FunctionRegistry::with_lims_functions();
        let ast = parse_formula(formula)?;
        let ctx = EvaluationContext::new(
            &registry,
            inputs.into_iter().map(|(k, v)| (k.to_string(), v)),
            store,
        );
        evaluate(&ast, &ctx)
    }

    fn eval(formula: &str) -> FormulaResult<FormulaValue> {
        eval_in(formula, None, Vec::new())
    }

    fn store() -> MemoryStore {
        let store = MemoryStore::new();
        store.insert(
            MemoryRecord::new("lims.sample", 1)
                .with_field("qty", 2)
                .with_method("scale", |rec, args| {
                    let qty = rec.get("qty").and_then(|v| v.as_f64()).unwrap_or(0.0);
                    let factor = args.first().and_then(Value::as_f64).unwrap_or(1.0);
                    Ok(Value::Float(qty * factor))
                }),
        );
        store
    }

    #[test]
    fn test_float() {
        assert_eq!(eval("=FLOAT(\" 3.5 \")").unwrap(), FormulaValue::Number(3.5));
        assert_eq!(eval("=FLOAT(2)").unwrap(), FormulaValue::Number(2.0));
        assert_eq!(eval("=FLOAT(TRUE)").unwrap(), FormulaValue::Number(1.0));
        assert!(matches!(
            eval("=FLOAT(\"abc\")"),
            Err(FormulaError::Evaluation(_))
        ));
        assert!(eval("=FLOAT(missing)").is_err());
    }

    #[test]
    fn test_is_number() {
        assert_eq!(eval("=IS_NUMBER(\"abc\")").unwrap(), FormulaValue::Boolean(false));
        assert_eq!(eval("=IS_NUMBER(\"3.5\")").unwrap(), FormulaValue::Boolean(true));
        assert_eq!(eval("=IS_NUMBER(missing)").unwrap(), FormulaValue::Boolean(false));
        assert_eq!(eval("=IS_NUMBER(1/0)").unwrap(), FormulaValue::Boolean(false));
    }

    #[test]
    fn test_str_includes() {
        assert_eq!(
            eval("=STR_INCLUDES(\"Cu; Fe ;Zn\", \"Fe\")").unwrap(),
            FormulaValue::Boolean(true)
        );
        assert_eq!(
            eval("=STR_INCLUDES(\"Cu;Fe\", \"F\")").unwrap(),
            FormulaValue::Boolean(false)
        );
        assert_eq!(
            eval("=STR_INCLUDES(\"1;2;3\", 2)").unwrap(),
            FormulaValue::Boolean(true)
        );
    }

    #[test]
    fn test_run_calls_method_immediately() {
        let store = store();
        let result = eval_in(
            "=RUN(sample, \"scale\", 3)",
            Some(&store),
            vec![("sample", FormulaValue::Record(RecordRef::new("lims.sample", 1)))],
        )
        .unwrap();
        assert_eq!(result, FormulaValue::Number(6.0));
        let record = store.get(&RecordRef::new("lims.sample", 1)).unwrap();
        assert_eq!(record.calls(), vec![("scale".to_string(), vec![Value::Float(3.0)])]);
    }

    #[test]
    fn test_run_with_null_target_does_nothing() {
        let store = store();
        let result = eval_in("=RUN(missing, \"scale\")", Some(&store), Vec::new()).unwrap();
        assert_eq!(result, FormulaValue::Empty);
    }

    #[test]
    fn test_run_unknown_method_fails() {
        let store = store();
        let sample = vec![("sample", FormulaValue::Record(RecordRef::new("lims.sample", 1)))];
        assert!(matches!(
            eval_in("=RUN(sample, \"explode\")", Some(&store), sample.clone()),
            Err(FormulaError::FormulaFailed(_))
        ));
        // a field is not a method
        assert!(matches!(
            eval_in("=RUN(sample, \"qty\")", Some(&store), sample),
            Err(FormulaError::FormulaFailed(_))
        ));
        assert!(matches!(
            eval_in("=RUN(5, \"scale\")", Some(&store), Vec::new()),
            Err(FormulaError::FormulaFailed(_))
        ));
    }

    #[test]
    fn test_run_later_does_not_call() {
        let store = store();
        let result = eval_in(
            "=RUN_LATER(sample, \"scale\", 3)",
            Some(&store),
            vec![("sample", FormulaValue::Record(RecordRef::new("lims.sample", 1)))],
        )
        .unwrap();

        let call = result.as_deferred().cloned().unwrap();
        let record = store.get(&RecordRef::new("lims.sample", 1)).unwrap();
        assert!(record.calls().is_empty());

        let decoded = call.decode(&store).unwrap();
        assert_eq!(decoded.target, Value::record("lims.sample", 1));
        assert_eq!(decoded.method, "scale");
        assert_eq!(decoded.args, vec![Value::Float(3.0)]);
    }
}
