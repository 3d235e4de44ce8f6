//! Catalog module for schema management.
//!
//! Row 1 of each sheet is the schema. The catalog keeps a per-store cache of
//! header maps and grows header rows as new columns are needed, so optional
//! columns can ship without a separate migration step.

mod error;
mod header;
mod manager;

pub use error::{SchemaError, SchemaResult};
pub use header::{HeaderCache, HeaderMap};
pub use manager::{Migration, SchemaManager, SheetStatus};
