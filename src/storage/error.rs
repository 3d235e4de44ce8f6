//! Storage layer error types
//!
//! All errors that can occur while talking to the backing tabular service
//! are defined here. We use `thiserror` for ergonomic error definition.

use std::path::PathBuf;

use thiserror::Error;

use crate::storage::types::{CellRange, InvalidNameError, SheetName};

/// the main error type for backend operations
#[derive(Debug, Error)]
pub enum StorageError {
    /// the requested sheet does not exist
    #[error("sheet not found: {0}")]
    SheetNotFound(SheetName),

    /// a sheet with this name already exists
    #[error("sheet already exists: {0}")]
    SheetExists(SheetName),

    /// coordinates are zero, inverted, or outside the grid
    #[error("invalid range {range}: {reason}")]
    InvalidRange { range: String, reason: String },

    /// invalid sheet name
    #[error("invalid sheet name: {0}")]
    InvalidSheetName(#[from] InvalidNameError),

    /// the remote call failed; the caller owns the retry decision
    #[error("transport error: {0}")]
    Transport(String),

    /// JSON serialization or deserialization failed
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// I/O error (snapshot files)
    #[error("io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl StorageError {
    /// build an InvalidRange error for a range
    pub fn invalid_range(range: &CellRange, reason: impl Into<String>) -> Self {
        StorageError::InvalidRange {
            range: range.to_a1(),
            reason: reason.into(),
        }
    }

    /// check if this error indicates the resource doesn't exist
    pub fn is_not_found(&self) -> bool {
        matches!(self, StorageError::SheetNotFound(_))
    }

    /// check if this error is recoverable by retry
    pub fn is_retriable(&self) -> bool {
        matches!(self, StorageError::Transport(_))
    }
}

/// result type alias for storage operations
pub type StorageResult<T> = Result<T, StorageError>;
