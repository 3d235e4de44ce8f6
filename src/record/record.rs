//! Field-named records over positional rows.

use std::collections::BTreeMap;

use serde_json::Value;

use crate::catalog::HeaderMap;
use crate::record::codec::unescape_on_read;

/// Field values keyed by column name, as handed to create and upsert paths.
pub type FieldMap = BTreeMap<String, Value>;

/// Column holding the soft-delete flag.
pub const ARCHIVED: &str = "Archived";
/// Column holding the soft-delete timestamp.
pub const ARCHIVED_AT: &str = "Archived At";
/// Column holding who archived the row.
pub const ARCHIVED_BY: &str = "Archived By";

/// Interpret a yes/no style cell.
pub fn is_truthy(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "yes" | "y" | "true" | "1"
    )
}

/// A decoded data row.
///
/// Values are addressed by column name; the row's physical position is kept
/// only as a hint and goes stale as soon as an earlier row is deleted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    /// 1-based sheet row this record was read from
    row: usize,
    /// decoded cell text by column name
    fields: BTreeMap<String, String>,
}

impl Record {
    /// Decode a positional row through a header map.
    ///
    /// A name repeated in the header resolves to its first cell, the same
    /// cell patches write to.
    pub fn from_row(header: &HeaderMap, row: usize, cells: &[Value]) -> Self {
        let fields = header
            .columns()
            .iter()
            .enumerate()
            .filter(|(i, name)| !name.is_empty() && header.position(name) == Some(*i))
            .map(|(i, name)| (name.clone(), unescape_on_read(cells.get(i))))
            .collect();
        Self { row, fields }
    }

    /// Build a record directly from decoded fields.
    pub fn new(row: usize, fields: BTreeMap<String, String>) -> Self {
        Self { row, fields }
    }

    /// the sheet row this was read from
    pub fn row(&self) -> usize {
        self.row
    }

    /// get a field, empty when the column is absent
    pub fn get(&self, column: &str) -> &str {
        self.fields.get(column).map(String::as_str).unwrap_or("")
    }

    /// get a field only if the column exists
    pub fn field(&self, column: &str) -> Option<&str> {
        self.fields.get(column).map(String::as_str)
    }

    /// check if the record has a column
    pub fn has_column(&self, column: &str) -> bool {
        self.fields.contains_key(column)
    }

    /// check if a field is missing or blank
    pub fn is_blank(&self, column: &str) -> bool {
        self.get(column).is_empty()
    }

    /// whether the soft-delete flag is set
    pub fn is_archived(&self) -> bool {
        is_truthy(self.get(ARCHIVED))
    }

    pub fn fields(&self) -> &BTreeMap<String, String> {
        &self.fields
    }

    pub fn into_fields(self) -> BTreeMap<String, String> {
        self.fields
    }
}

/// A name-scoped partial update.
///
/// Only columns given a value are written. A column recorded as absent
/// (`maybe(col, None)`) is skipped, mirroring an undefined field in a form
/// submission.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Patch {
    entries: Vec<(String, Option<Value>)>,
}

impl Patch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a column.
    pub fn set(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.entries.push((column.into(), Some(value.into())));
        self
    }

    /// Set a column only when a value is present.
    pub fn maybe<V: Into<Value>>(mut self, column: impl Into<String>, value: Option<V>) -> Self {
        self.entries.push((column.into(), value.map(Into::into)));
        self
    }

    /// Blank a column.
    pub fn clear(self, column: impl Into<String>) -> Self {
        self.set(column, "")
    }

    /// Build from a field map; every entry counts as present.
    pub fn from_fields(fields: FieldMap) -> Self {
        Self {
            entries: fields.into_iter().map(|(k, v)| (k, Some(v))).collect(),
        }
    }

    /// Merge another patch in; later values win.
    pub fn merge(mut self, other: Patch) -> Self {
        self.entries.extend(other.entries);
        self
    }

    /// True when no column carries a value.
    pub fn is_empty(&self) -> bool {
        self.entries.iter().all(|(_, v)| v.is_none())
    }

    /// Columns that carry a value, last write wins for repeated columns.
    pub fn present(&self) -> Vec<(&str, &Value)> {
        let mut out: Vec<(&str, &Value)> = Vec::new();
        for (column, value) in &self.entries {
            let Some(value) = value else { continue };
            match out.iter_mut().find(|(c, _)| *c == column.as_str()) {
                Some(slot) => slot.1 = value,
                None => out.push((column.as_str(), value)),
            }
        }
        out
    }

    /// Names of columns that carry a value.
    pub fn columns(&self) -> Vec<String> {
        self.present().into_iter().map(|(c, _)| c.to_string()).collect()
    }
}
