//! Error types for lims-core

use thiserror::Error;

/// Result type alias using [`Error`]
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by host records, stores and schemas
#[derive(Debug, Error)]
pub enum Error {
    /// Field is not declared on the model
    #[error("Unknown field {model}.{field}")]
    UnknownField { model: String, field: String },

    /// Method is not exposed by the record
    #[error("Method not found: {model}.{method}")]
    MethodNotFound { model: String, method: String },

    /// Record does not accept writes
    #[error("Record {0} is read-only")]
    ReadOnly(String),

    /// Underlying write was rejected by the host
    #[error("Write failed on {record}: {reason}")]
    WriteFailed { record: String, reason: String },

    /// Invalid value type for operation
    #[error("Invalid value type: expected {expected}, got {actual}")]
    InvalidValue {
        expected: &'static str,
        actual: &'static str,
    },

    /// Generic error with message
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create a new "other" error with a message
    pub fn other<S: Into<String>>(msg: S) -> Self {
        Error::Other(msg.into())
    }
}
