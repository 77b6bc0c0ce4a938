//! Formula evaluator
//!
//! Evaluates formula ASTs against a set of resolved inputs.

use crate::ast::{BinaryOperator, FormulaExpr, UnaryOperator};
use crate::codec::DeferredCall;
use crate::error::{ErrorValue, FormulaError, FormulaResult};
use crate::functions::FunctionRegistry;
use ahash::AHashMap;
use lims_core::{ObjectStore, RecordRef, Value};
use std::cmp::Ordering;

/// Value types during formula evaluation
#[derive(Debug, Clone, PartialEq)]
pub enum FormulaValue {
    Number(f64),
    String(String),
    Boolean(bool),
    Error(ErrorValue),
    Array(Vec<Vec<FormulaValue>>),
    Empty,
    /// Reference to a live record, usable as a `RUN` target or argument
    Record(RecordRef),
    /// Host value with no formula operators (dates, mappings), passed through unchanged
    Opaque(Value),
    /// Method call scheduled by `RUN_LATER`
    Deferred(DeferredCall),
}

impl FormulaValue {
    /// Convert to number, if possible
    pub fn as_number(&self) -> Option<f64> {
        match self {
            FormulaValue::Number(n) => Some(*n),
            FormulaValue::Boolean(true) => Some(1.0),
            FormulaValue::Boolean(false) => Some(0.0),
            FormulaValue::String(s) => s.trim().parse().ok(),
            FormulaValue::Empty => Some(0.0),
            _ => None,
        }
    }

    /// Force conversion to number
    pub fn to_number(&self) -> FormulaResult<f64> {
        self.as_number()
            .ok_or_else(|| FormulaError::Evaluation(format!("Cannot convert {} to number", self.describe())))
    }

    /// Convert to boolean
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            FormulaValue::Boolean(b) => Some(*b),
            FormulaValue::Number(n) => Some(*n != 0.0),
            FormulaValue::Empty => Some(false),
            FormulaValue::String(s) if s.eq_ignore_ascii_case("TRUE") => Some(true),
            FormulaValue::String(s) if s.eq_ignore_ascii_case("FALSE") => Some(false),
            _ => None,
        }
    }

    /// Convert to string
    pub fn as_string(&self) -> String {
        match self {
            FormulaValue::Number(n) => {
                if n.fract() == 0.0 && n.abs() < 1e15 {
                    format!("{}", *n as i64)
                } else {
                    format!("{}", n)
                }
            }
            FormulaValue::String(s) => s.clone(),
            FormulaValue::Boolean(true) => "TRUE".to_string(),
            FormulaValue::Boolean(false) => "FALSE".to_string(),
            FormulaValue::Error(e) => e.to_string(),
            FormulaValue::Empty => String::new(),
            FormulaValue::Record(r) => r.to_string(),
            FormulaValue::Opaque(v) => v.to_string(),
            FormulaValue::Array(_) | FormulaValue::Deferred(_) => ErrorValue::Value.to_string(),
        }
    }

    /// Check if this is an error
    pub fn is_error(&self) -> bool {
        matches!(self, FormulaValue::Error(_))
    }

    /// Get the error if this is one
    pub fn get_error(&self) -> Option<ErrorValue> {
        match self {
            FormulaValue::Error(e) => Some(*e),
            _ => None,
        }
    }

    /// Host truthiness, used for `RUN` targets
    pub fn is_truthy(&self) -> bool {
        match self {
            FormulaValue::Empty | FormulaValue::Error(_) => false,
            FormulaValue::Number(n) => *n != 0.0,
            FormulaValue::String(s) => !s.is_empty(),
            FormulaValue::Boolean(b) => *b,
            FormulaValue::Array(rows) => rows.iter().any(|row| !row.is_empty()),
            FormulaValue::Record(_) | FormulaValue::Deferred(_) => true,
            FormulaValue::Opaque(v) => v.is_truthy(),
        }
    }

    /// The deferred call carried by this value, directly or as the single cell of an array
    pub fn as_deferred(&self) -> Option<&DeferredCall> {
        match self {
            FormulaValue::Deferred(call) => Some(call),
            FormulaValue::Array(rows) => match rows.as_slice() {
                [row] => match row.as_slice() {
                    [FormulaValue::Deferred(call)] => Some(call),
                    _ => None,
                },
                _ => None,
            },
            _ => None,
        }
    }

    /// Convert into a host value
    pub fn to_value(&self) -> Value {
        match self {
            FormulaValue::Empty => Value::Null,
            FormulaValue::Number(n) => Value::Float(*n),
            FormulaValue::String(s) => Value::Text(s.clone()),
            FormulaValue::Boolean(b) => Value::Boolean(*b),
            FormulaValue::Error(e) => Value::Text(e.to_string()),
            FormulaValue::Record(r) => Value::Record(r.clone()),
            FormulaValue::Opaque(v) => v.clone(),
            FormulaValue::Deferred(call) => Value::Text(call.payload().to_string()),
            FormulaValue::Array(rows) => match rows.as_slice() {
                [row] => Value::List(row.iter().map(FormulaValue::to_value).collect()),
                _ => Value::List(
                    rows.iter()
                        .map(|row| Value::List(row.iter().map(FormulaValue::to_value).collect()))
                        .collect(),
                ),
            },
        }
    }

    fn describe(&self) -> String {
        match self {
            FormulaValue::String(s) => format!("\"{}\"", s),
            FormulaValue::Array(_) => "array".to_string(),
            FormulaValue::Record(r) => format!("record {}", r),
            FormulaValue::Opaque(v) => v.type_name().to_string(),
            FormulaValue::Deferred(_) => "deferred call".to_string(),
            other => other.as_string(),
        }
    }
}

impl From<Value> for FormulaValue {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => FormulaValue::Empty,
            Value::Boolean(b) => FormulaValue::Boolean(b),
            Value::Integer(i) => FormulaValue::Number(i as f64),
            Value::Float(f) => FormulaValue::Number(f),
            Value::Text(s) => FormulaValue::String(s),
            Value::Record(r) => FormulaValue::Record(r),
            // Lists become a single row; nested lists stay nested
            Value::List(items) => {
                FormulaValue::Array(vec![items.into_iter().map(FormulaValue::from).collect()])
            }
            other @ (Value::Date(_) | Value::DateTime(_) | Value::Map(_)) => {
                FormulaValue::Opaque(other)
            }
        }
    }
}

impl From<FormulaValue> for Value {
    fn from(value: FormulaValue) -> Self {
        value.to_value()
    }
}

/// Context for formula evaluation
pub struct EvaluationContext<'a> {
    /// Functions callable from the formula
    pub registry: &'a FunctionRegistry,
    /// Resolved inputs, keyed by lowercased name
    inputs: AHashMap<String, FormulaValue>,
    /// Live record accessor, used by `RUN`
    pub store: Option<&'a dyn ObjectStore>,
}

impl<'a> EvaluationContext<'a> {
    /// Create a context with resolved inputs and a record accessor
    pub fn new(
        registry: &'a FunctionRegistry,
        inputs: impl IntoIterator<Item = (String, FormulaValue)>,
        store: Option<&'a dyn ObjectStore>,
    ) -> Self {
        let inputs = inputs
            .into_iter()
            .map(|(name, value)| (name.to_lowercase(), value))
            .collect();
        Self {
            registry,
            inputs,
            store,
        }
    }

    /// Create a context with no inputs and no record access
    pub fn simple(registry: &'a FunctionRegistry) -> Self {
        Self {
            registry,
            inputs: AHashMap::new(),
            store: None,
        }
    }

    /// Value of a named input; unknown names evaluate to empty
    pub fn input(&self, name: &str) -> FormulaValue {
        self.inputs
            .get(&name.to_lowercase())
            .cloned()
            .unwrap_or(FormulaValue::Empty)
    }
}

/// Evaluate a formula expression
pub fn evaluate(expr: &FormulaExpr, ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    match expr {
        FormulaExpr::Number(n) => Ok(FormulaValue::Number(*n)),
        FormulaExpr::String(s) => Ok(FormulaValue::String(s.clone())),
        FormulaExpr::Boolean(b) => Ok(FormulaValue::Boolean(*b)),
        FormulaExpr::Error(e) => Ok(FormulaValue::Error(*e)),

        FormulaExpr::Input(name) => Ok(ctx.input(name)),

        FormulaExpr::BinaryOp { op, left, right } => evaluate_binary_op(*op, left, right, ctx),
        FormulaExpr::UnaryOp { op, operand } => evaluate_unary_op(*op, operand, ctx),

        FormulaExpr::Function { name, args } => evaluate_function(name, args, ctx),

        FormulaExpr::Array(rows) => rows
            .iter()
            .map(|row| row.iter().map(|expr| evaluate(expr, ctx)).collect())
            .collect::<FormulaResult<Vec<_>>>()
            .map(FormulaValue::Array),
    }
}

fn evaluate_binary_op(
    op: BinaryOperator,
    left: &FormulaExpr,
    right: &FormulaExpr,
    ctx: &EvaluationContext,
) -> FormulaResult<FormulaValue> {
    let left_val = evaluate(left, ctx)?;
    let right_val = evaluate(right, ctx)?;

    if let Some(e) = left_val.get_error().or_else(|| right_val.get_error()) {
        return Ok(FormulaValue::Error(e));
    }

    let arithmetic = |f: fn(f64, f64) -> FormulaValue| match (left_val.as_number(), right_val.as_number()) {
        (Some(l), Some(r)) => f(l, r),
        _ => FormulaValue::Error(ErrorValue::Value),
    };

    let value = match op {
        BinaryOperator::Add => arithmetic(|l, r| FormulaValue::Number(l + r)),
        BinaryOperator::Subtract => arithmetic(|l, r| FormulaValue::Number(l - r)),
        BinaryOperator::Multiply => arithmetic(|l, r| FormulaValue::Number(l * r)),
        BinaryOperator::Divide => arithmetic(|l, r| {
            if r == 0.0 {
                FormulaValue::Error(ErrorValue::Div0)
            } else {
                FormulaValue::Number(l / r)
            }
        }),
        BinaryOperator::Power => arithmetic(|l, r| {
            let result = l.powf(r);
            if result.is_finite() {
                FormulaValue::Number(result)
            } else {
                FormulaValue::Error(ErrorValue::Num)
            }
        }),

        BinaryOperator::Equal => {
            FormulaValue::Boolean(compare_values(&left_val, &right_val) == Ordering::Equal)
        }
        BinaryOperator::NotEqual => {
            FormulaValue::Boolean(compare_values(&left_val, &right_val) != Ordering::Equal)
        }
        BinaryOperator::LessThan => {
            FormulaValue::Boolean(compare_values(&left_val, &right_val) == Ordering::Less)
        }
        BinaryOperator::LessEqual => {
            FormulaValue::Boolean(compare_values(&left_val, &right_val) != Ordering::Greater)
        }
        BinaryOperator::GreaterThan => {
            FormulaValue::Boolean(compare_values(&left_val, &right_val) == Ordering::Greater)
        }
        BinaryOperator::GreaterEqual => {
            FormulaValue::Boolean(compare_values(&left_val, &right_val) != Ordering::Less)
        }

        BinaryOperator::Concat => {
            FormulaValue::String(left_val.as_string() + &right_val.as_string())
        }
    };

    Ok(value)
}

/// Spreadsheet ordering: numbers < text < booleans; text compares case-insensitively
fn compare_values(left: &FormulaValue, right: &FormulaValue) -> Ordering {
    let zero = FormulaValue::Number(0.0);
    let left = if matches!(left, FormulaValue::Empty) { &zero } else { left };
    let right = if matches!(right, FormulaValue::Empty) { &zero } else { right };

    fn rank(v: &FormulaValue) -> u8 {
        match v {
            FormulaValue::Number(_) => 0,
            FormulaValue::String(_) => 1,
            FormulaValue::Boolean(_) => 2,
            _ => 3,
        }
    }

    match (left, right) {
        (FormulaValue::Number(l), FormulaValue::Number(r)) => {
            l.partial_cmp(r).unwrap_or(Ordering::Equal)
        }
        (FormulaValue::String(l), FormulaValue::String(r)) => {
            l.to_lowercase().cmp(&r.to_lowercase())
        }
        (FormulaValue::Boolean(l), FormulaValue::Boolean(r)) => l.cmp(r),
        (FormulaValue::Error(l), FormulaValue::Error(r)) => l.code().cmp(&r.code()),
        (FormulaValue::Record(l), FormulaValue::Record(r)) => l.cmp(r),
        (l, r) if rank(l) != rank(r) => rank(l).cmp(&rank(r)),
        (l, r) => {
            if l == r {
                Ordering::Equal
            } else {
                l.as_string().cmp(&r.as_string())
            }
        }
    }
}

fn evaluate_unary_op(
    op: UnaryOperator,
    operand: &FormulaExpr,
    ctx: &EvaluationContext,
) -> FormulaResult<FormulaValue> {
    let val = evaluate(operand, ctx)?;

    if let Some(e) = val.get_error() {
        return Ok(FormulaValue::Error(e));
    }

    let n = match val.as_number() {
        Some(n) => n,
        None => return Ok(FormulaValue::Error(ErrorValue::Value)),
    };

    Ok(match op {
        UnaryOperator::Negate => FormulaValue::Number(-n),
        UnaryOperator::Percent => FormulaValue::Number(n / 100.0),
    })
}

fn evaluate_function(
    name: &str,
    args: &[FormulaExpr],
    ctx: &EvaluationContext,
) -> FormulaResult<FormulaValue> {
    let func = ctx
        .registry
        .get(name)
        .ok_or_else(|| FormulaError::UnknownFunction(name.to_string()))?;

    if args.len() < func.min_args {
        return Err(FormulaError::ArgumentCount {
            function: name.to_string(),
            expected: format!("at least {}", func.min_args),
            actual: args.len(),
        });
    }

    if let Some(max) = func.max_args {
        if args.len() > max {
            return Err(FormulaError::ArgumentCount {
                function: name.to_string(),
                expected: format!("at most {}", max),
                actual: args.len(),
            });
        }
    }

    // IF only evaluates the branch it takes, so a RUN in the other branch never fires
    let evaluated_args = if func.name == "IF" {
        let condition = evaluate(&args[0], ctx)?;
        let take_then = condition.as_bool();
        let mut evaluated = vec![condition];
        for (index, branch) in args.iter().enumerate().skip(1) {
            let taken = match take_then {
                Some(true) => index == 1,
                Some(false) => index == 2,
                None => false,
            };
            evaluated.push(if taken {
                evaluate(branch, ctx)?
            } else {
                FormulaValue::Empty
            });
        }
        evaluated
    } else {
        args.iter()
            .map(|arg| evaluate(arg, ctx))
            .collect::<FormulaResult<Vec<_>>>()?
    };

    (func.implementation)(&evaluated_args, ctx)
}
