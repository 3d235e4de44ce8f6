//! Schema error types.

use thiserror::Error;

use crate::storage::StorageError;

/// Errors raised while managing sheet schemas.
#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("duplicate column in expected headers: {0}")]
    DuplicateColumn(String),

    #[error("expected headers are empty for sheet {0}")]
    EmptyHeaders(String),
}

impl SchemaError {
    /// Check if this error is recoverable by retry.
    pub fn is_retriable(&self) -> bool {
        matches!(self, SchemaError::Storage(e) if e.is_retriable())
    }
}

/// Result type for schema operations.
pub type SchemaResult<T> = Result<T, SchemaError>;
