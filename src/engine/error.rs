//! Record engine errors.

use thiserror::Error;

use crate::catalog::SchemaError;
use crate::storage::StorageError;

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

/// Record engine errors.
///
/// A record that does not exist is not an error: lookups return `None` and
/// patches return `PatchOutcome::NotFound`.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("schema error: {0}")]
    Schema(#[from] SchemaError),

    #[error("column {column} not found in sheet {sheet}")]
    UnknownColumn { sheet: String, column: String },

    #[error("no free identifier with prefix {prefix} in {sheet} after {attempts} attempts")]
    IdentifierExhausted {
        sheet: String,
        prefix: String,
        attempts: usize,
    },

    #[error("sequence for prefix {prefix} in {sheet} has no {width}-digit value left")]
    SequenceExhausted {
        sheet: String,
        prefix: String,
        width: usize,
    },
}

impl EngineError {
    /// Check if error is retryable.
    pub fn is_retryable(&self) -> bool {
        match self {
            EngineError::Storage(e) => e.is_retriable(),
            EngineError::Schema(e) => e.is_retriable(),
            EngineError::IdentifierExhausted { .. } => true,
            EngineError::UnknownColumn { .. } | EngineError::SequenceExhausted { .. } => false,
        }
    }
}
