//! Formula error types

use std::fmt;
use thiserror::Error;

/// Result type for formula operations
pub type FormulaResult<T> = std::result::Result<T, FormulaError>;

/// Errors that can occur while parsing, evaluating or solving formulas
#[derive(Debug, Error)]
pub enum FormulaError {
    /// Formula parse error
    #[error("Parse error: {0}")]
    Parse(String),

    /// Formula evaluation error
    #[error("Evaluation error: {0}")]
    Evaluation(String),

    /// Invalid argument
    #[error("Invalid argument: {0}")]
    Argument(String),

    /// Unknown function
    #[error("Unknown function: {0}")]
    UnknownFunction(String),

    /// Wrong number of arguments
    #[error("Wrong number of arguments for {function}: expected {expected}, got {actual}")]
    ArgumentCount {
        function: String,
        expected: String,
        actual: usize,
    },

    /// No template is registered under the key
    #[error("Missing formula: {0}")]
    MissingFormula(String),

    /// More than one template is registered under the key
    #[error("Ambiguous formula key {key}: {count} templates match")]
    AmbiguousFormula { key: String, count: usize },

    /// A template with the same key already exists
    #[error("Formula key already in use: {0}")]
    DuplicateKey(String),

    /// A method dispatched from a formula could not be run
    #[error("Formula Failed: {0}")]
    FormulaFailed(String),

    /// Deferred-call payload could not be encoded
    #[error("Encode error: {0}")]
    Encode(String),

    /// Error raised by the host
    #[error(transparent)]
    Core(#[from] lims_core::Error),
}

/// Spreadsheet error values produced during evaluation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorValue {
    /// #NULL! - Empty intersection
    Null,
    /// #DIV/0! - Division by zero
    Div0,
    /// #VALUE! - Wrong type of argument or operand
    Value,
    /// #REF! - Invalid reference
    Ref,
    /// #NAME? - Unrecognized name
    Name,
    /// #NUM! - Invalid numeric value
    Num,
    /// #N/A - Value not available
    Na,
}

impl ErrorValue {
    /// Get the display string for this error
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorValue::Null => "#NULL!",
            ErrorValue::Div0 => "#DIV/0!",
            ErrorValue::Value => "#VALUE!",
            ErrorValue::Ref => "#REF!",
            ErrorValue::Name => "#NAME?",
            ErrorValue::Num => "#NUM!",
            ErrorValue::Na => "#N/A",
        }
    }

    /// Parse an error literal
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "#NULL!" => Some(ErrorValue::Null),
            "#DIV/0!" => Some(ErrorValue::Div0),
            "#VALUE!" => Some(ErrorValue::Value),
            "#REF!" => Some(ErrorValue::Ref),
            "#NAME?" => Some(ErrorValue::Name),
            "#NUM!" => Some(ErrorValue::Num),
            "#N/A" => Some(ErrorValue::Na),
            _ => None,
        }
    }

    /// Ordering code used when comparing error values
    pub fn code(&self) -> u8 {
        match self {
            ErrorValue::Null => 0x00,
            ErrorValue::Div0 => 0x07,
            ErrorValue::Value => 0x0F,
            ErrorValue::Ref => 0x17,
            ErrorValue::Name => 0x1D,
            ErrorValue::Num => 0x24,
            ErrorValue::Na => 0x2A,
        }
    }
}

impl fmt::Display for ErrorValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
