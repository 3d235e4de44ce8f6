//! Record encoding.
//!
//! Turns positional cell arrays into field-named records and back: the cell
//! codec guarding against expression injection, the name-scoped `Patch`, and
//! the JSON logs kept inside single cells.

mod codec;
mod log;
mod record;

pub use codec::{
    sanitize_for_write, sanitize_str, unescape_on_read, ESCAPE_MARKER, FORMULA_TRIGGERS,
};
pub use log::JsonLog;
pub use record::{is_truthy, FieldMap, Patch, Record, ARCHIVED, ARCHIVED_AT, ARCHIVED_BY};
