//! Outcome types returned by the record engine.

/// Result of a name-scoped patch.
///
/// `NoChanges` is kept apart from `Updated` so callers can skip side effects
/// (notifications, audit entries) when nothing was written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PatchOutcome {
    /// no row carries the identifier
    NotFound,
    /// the row exists but no present field matched a column or changed its value
    NoChanges,
    /// these columns were written on this row
    Updated { row: usize, columns: Vec<String> },
}

impl PatchOutcome {
    pub fn is_updated(&self) -> bool {
        matches!(self, PatchOutcome::Updated { .. })
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, PatchOutcome::NotFound)
    }

    /// Columns written, empty unless updated.
    pub fn columns(&self) -> &[String] {
        match self {
            PatchOutcome::Updated { columns, .. } => columns,
            _ => &[],
        }
    }
}

/// Result of an upsert by natural key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpsertOutcome {
    /// true when an existing row was patched, false when a row was appended
    pub updated: bool,
    /// the record's identifier after the upsert
    pub id: String,
    /// a non-canonical identifier that was replaced, if any
    pub replaced_id: Option<String>,
}
