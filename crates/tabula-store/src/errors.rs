//! Error handling for tabula-store
//!
//! Store operations return the structured `ExError`; core errors convert
//! through `From<TabulaError>`.

use tabula_core::errors::{ExError, ExErrorKind};

/// Result type alias using ExError
pub type Result<T> = std::result::Result<T, ExError>;

/// Create a database error from rusqlite::Error
pub fn from_rusqlite(err: rusqlite::Error) -> ExError {
    ExError::new(ExErrorKind::Execution)
        .with_op("sqlite")
        .with_message(err.to_string())
}

/// Create an execution error for a failed store step
pub fn execution_error(op: &str, message: impl Into<String>) -> ExError {
    ExError::new(ExErrorKind::Execution)
        .with_op(op.to_string())
        .with_message(message)
}

/// Create a migration error wrapping the failure that aborted the step
pub fn migration_error(version: i64, cause: ExError) -> ExError {
    ExError::new(ExErrorKind::Migration)
        .with_op("migrate")
        .with_message(format!("Migration to version {} failed", version))
        .with_source(cause)
}

/// Create a configuration error
pub fn config_error(message: impl Into<String>) -> ExError {
    ExError::new(ExErrorKind::Configuration)
        .with_op("config")
        .with_message(message)
}

/// Create a serialization error for persisted schema state
pub fn serialization_error(op: &str, err: serde_json::Error) -> ExError {
    ExError::new(ExErrorKind::Serialization)
        .with_op(op.to_string())
        .with_message(err.to_string())
}
