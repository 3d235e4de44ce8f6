//! storage layer for the referral store
//!
//! this module is the only place that knows about the backing tabular
//! service. The upper layers (schema catalog, record engine) use this API and
//! never build range strings or raw service calls themselves.
//!
//!  # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     TabularBackend                          │
//! │  (sheets, ranges, appends, row structure, formatting)       │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!              ┌───────────────┴───────────────┐
//!              ▼                               ▼
//!       ┌─────────────┐                 ┌─────────────┐
//!       │   hosted    │                 │  in-memory  │
//!       │  service    │                 │ (snapshot)  │
//!       └─────────────┘                 └─────────────┘
//!  ```
//!
//! # Usage
//!
//! ```ignore
//! use referral_store::storage::{CellRange, InMemoryBackend, SheetName, TabularBackend};
//!
//! let backend = InMemoryBackend::new();
//! let sheet = SheetName::new("Applicants")?;
//! backend.add_sheet(&sheet).await?;
//! backend.append_row(&sheet, vec![json!("APL0000000001")]).await?;
//! let rows = backend.get_range(&CellRange::rows_from(sheet, 2)).await?;
//! ```

mod backend;
mod error;
mod memory;
mod types;

// Re-export public API
pub use backend::TabularBackend;
pub use error::{StorageError, StorageResult};
pub use memory::InMemoryBackend;
pub use types::{column_letter, CellFormat, CellRange, InvalidNameError, RowValues, SheetName};
