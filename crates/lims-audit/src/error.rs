//! Error types for lims-audit

use thiserror::Error;

/// Result type alias using [`AuditError`]
pub type AuditResult<T> = std::result::Result<T, AuditError>;

/// Errors raised while recording changes
#[derive(Debug, Error)]
pub enum AuditError {
    /// Model is not registered as a log origin
    #[error("Model {0} is not a registered log origin")]
    UnknownOrigin(String),

    /// Error from the host record, store or schema
    #[error(transparent)]
    Core(#[from] lims_core::Error),
}
