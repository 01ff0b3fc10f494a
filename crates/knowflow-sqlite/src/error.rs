//! Error types for SQLite storage

use knowflow_core::KnowflowError;
use thiserror::Error;

/// SQLite storage error type
#[derive(Error, Debug)]
pub enum SqliteError {
    /// Database connection error
    #[error("Connection error: {0}")]
    Connection(String),

    /// Schema/migration error
    #[error("Schema error: {0}")]
    Schema(String),

    /// Row not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid operation
    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Underlying rusqlite error
    #[error("SQLite error: {0}")]
    Rusqlite(#[from] rusqlite::Error),
}

/// Result type for SQLite operations
pub type SqliteResult<T> = Result<T, SqliteError>;

/// Service name reported for storage failures
pub const SQLITE_SERVICE: &str = "sqlite";

impl From<serde_json::Error> for SqliteError {
    fn from(err: serde_json::Error) -> Self {
        SqliteError::Serialization(err.to_string())
    }
}

impl From<SqliteError> for KnowflowError {
    fn from(err: SqliteError) -> Self {
        match err {
            SqliteError::NotFound(msg) => KnowflowError::NotFound(msg),
            SqliteError::InvalidOperation(msg) => KnowflowError::Validation(msg),
            other => KnowflowError::external(SQLITE_SERVICE, other),
        }
    }
}
