//! The contract of the remote tabular service.
//!
//! Everything above the storage layer talks to the service through this
//! trait only. The service offers no transactions, no uniqueness checks and
//! no foreign keys, and calls are at-least-once: an append retried by the
//! transport may land twice.

use async_trait::async_trait;

use crate::storage::error::StorageResult;
use crate::storage::types::{CellFormat, CellRange, RowValues, SheetName};

/// A remote row/column store addressed by sheet name and 1-based coordinates.
#[async_trait]
pub trait TabularBackend: Send + Sync {
    /// Names of all sheets, in tab order.
    async fn list_sheets(&self) -> StorageResult<Vec<SheetName>>;

    /// Whether a sheet with this name exists.
    async fn sheet_exists(&self, sheet: &SheetName) -> StorageResult<bool> {
        Ok(self.list_sheets().await?.iter().any(|s| s == sheet))
    }

    /// Create an empty sheet.
    async fn add_sheet(&self, sheet: &SheetName) -> StorageResult<()>;

    /// Read a rectangular range.
    ///
    /// Trailing empty rows and trailing empty cells within a row may be
    /// omitted, the way the hosted service omits them.
    async fn get_range(&self, range: &CellRange) -> StorageResult<Vec<RowValues>>;

    /// Overwrite a range starting at its top-left corner.
    async fn update_range(&self, range: &CellRange, rows: Vec<RowValues>) -> StorageResult<()>;

    /// Append a row after the last populated row; returns its 1-based row number.
    async fn append_row(&self, sheet: &SheetName, row: RowValues) -> StorageResult<usize>;

    /// Read several ranges in one call.
    async fn batch_get(&self, ranges: &[CellRange]) -> StorageResult<Vec<Vec<RowValues>>>;

    /// Write several ranges in one call.
    async fn batch_update(&self, updates: Vec<(CellRange, Vec<RowValues>)>) -> StorageResult<()>;

    /// Insert `count` blank rows before 1-based row `at`.
    async fn insert_rows(&self, sheet: &SheetName, at: usize, count: usize) -> StorageResult<()>;

    /// Delete `count` rows starting at 1-based row `at`; later rows move up.
    async fn delete_rows(&self, sheet: &SheetName, at: usize, count: usize) -> StorageResult<()>;

    /// Apply cosmetic formatting.
    async fn format_range(&self, range: &CellRange, format: &CellFormat) -> StorageResult<()>;
}
