//! Row locator: key lookups and fuzzy identity matching.
//!
//! Row positions returned here are valid only until the next hard delete on
//! the same sheet. Callers resolve a row right before writing to it and never
//! hold a position across another await on unrelated work.

use std::sync::Arc;

use crate::catalog::{HeaderMap, SchemaManager};
use crate::engine::error::EngineResult;
use crate::record::{unescape_on_read, Record};
use crate::storage::{CellRange, SheetName, StorageError};

/// Normalise a lookup key: trimmed, case-folded.
pub fn normalize_key(value: &str) -> String {
    value.trim().to_lowercase()
}

/// Digits only, with a leading country code `1` dropped from 11-digit numbers.
pub fn normalize_phone(value: &str) -> String {
    let digits: String = value.chars().filter(char::is_ascii_digit).collect();
    if digits.len() == 11 && digits.starts_with('1') {
        digits[1..].to_string()
    } else {
        digits
    }
}

/// Lowercased with internal whitespace collapsed.
pub fn normalize_name(value: &str) -> String {
    value
        .split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Identity fields of a submission, as typed by the submitter.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Identity {
    pub full_name: String,
    pub email: String,
    pub phone: String,
}

impl Identity {
    pub fn new(
        full_name: impl Into<String>,
        email: impl Into<String>,
        phone: impl Into<String>,
    ) -> Self {
        Self {
            full_name: full_name.into(),
            email: email.into(),
            phone: phone.into(),
        }
    }
}

/// Where the identity fields live on a sheet.
#[derive(Debug, Clone, Copy)]
pub struct IdentityColumns {
    /// name parts joined with spaces to form the full name
    pub name_parts: &'static [&'static str],
    pub email: &'static str,
    pub phone: &'static str,
}

impl IdentityColumns {
    fn identity_of(&self, record: &Record) -> Identity {
        let full_name = self
            .name_parts
            .iter()
            .map(|c| record.get(c))
            .filter(|p| !p.is_empty())
            .collect::<Vec<_>>()
            .join(" ");
        Identity::new(full_name, record.get(self.email), record.get(self.phone))
    }
}

/// Number of identity fields two submissions agree on. Blank fields never agree.
pub fn identity_agreement(a: &Identity, b: &Identity) -> usize {
    let pairs = [
        (normalize_name(&a.full_name), normalize_name(&b.full_name)),
        (normalize_key(&a.email), normalize_key(&b.email)),
        (normalize_phone(&a.phone), normalize_phone(&b.phone)),
    ];
    pairs
        .iter()
        .filter(|(x, y)| !x.is_empty() && x == y)
        .count()
}

/// Finds rows by column value.
#[derive(Clone)]
pub struct RowLocator {
    schema: Arc<SchemaManager>,
}

impl RowLocator {
    pub fn new(schema: Arc<SchemaManager>) -> Self {
        Self { schema }
    }

    /// Decode every non-blank data row of a sheet.
    pub async fn scan(&self, sheet: &SheetName) -> EngineResult<Vec<Record>> {
        let header = self.schema.headers(sheet).await?;
        if header.is_blank() {
            return Ok(Vec::new());
        }

        let rows = match self
            .schema
            .backend()
            .get_range(&CellRange::rows_from(sheet.clone(), 2))
            .await
        {
            Ok(rows) => rows,
            Err(StorageError::SheetNotFound(_)) => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        tracing::debug!("scanned {} rows of {}", rows.len(), sheet);

        Ok(rows
            .iter()
            .enumerate()
            .filter(|(_, cells)| !cells.is_empty())
            .map(|(i, cells)| Record::from_row(&header, i + 2, cells))
            .collect())
    }

    /// Decoded values of one column, paired with their 1-based row numbers.
    pub async fn column_values(
        &self,
        sheet: &SheetName,
        column: &str,
    ) -> EngineResult<Vec<(usize, String)>> {
        let header = self.schema.headers(sheet).await?;
        let Some(col) = header.column_number(column) else {
            return Ok(Vec::new());
        };

        let rows = self
            .schema
            .backend()
            .get_range(&CellRange::column_from(sheet.clone(), col, 2))
            .await?;
        Ok(rows
            .iter()
            .enumerate()
            .map(|(i, cells)| (i + 2, unescape_on_read(cells.first())))
            .collect())
    }

    /// First row whose `key_column` equals `key_value`, trimmed and case-insensitive.
    pub async fn find_row(
        &self,
        sheet: &SheetName,
        key_column: &str,
        key_value: &str,
    ) -> EngineResult<Option<Record>> {
        let wanted = normalize_key(key_value);
        if wanted.is_empty() {
            return Ok(None);
        }

        let header = self.schema.headers(sheet).await?;
        if !header.contains(key_column) {
            tracing::debug!("{} has no column {}; nothing to find", sheet, key_column);
            return Ok(None);
        }

        let hit = self
            .column_values(sheet, key_column)
            .await?
            .into_iter()
            .find(|(_, value)| normalize_key(value) == wanted);
        let Some((row, _)) = hit else {
            return Ok(None);
        };

        // a delete between the two reads shifts a neighbour into `row`
        let record = self.read_row(sheet, &header, row).await?;
        Ok(record.filter(|r| {
            let same = normalize_key(r.get(key_column)) == wanted;
            if !same {
                tracing::debug!("row {} of {} moved before it was read", row, sheet);
            }
            same
        }))
    }

    /// Every row whose `key_column` equals `key_value`.
    pub async fn find_all(
        &self,
        sheet: &SheetName,
        key_column: &str,
        key_value: &str,
    ) -> EngineResult<Vec<Record>> {
        let wanted = normalize_key(key_value);
        if wanted.is_empty() {
            return Ok(Vec::new());
        }
        Ok(self
            .scan(sheet)
            .await?
            .into_iter()
            .filter(|r| normalize_key(r.get(key_column)) == wanted)
            .collect())
    }

    /// First row agreeing with `candidate` on at least two of name, email and phone.
    ///
    /// One coincidental match (a shared family phone, a common name) is not
    /// enough to merge two people; two agreeing fields tolerate drift in the third.
    pub async fn find_by_two_of_three(
        &self,
        sheet: &SheetName,
        columns: &IdentityColumns,
        candidate: &Identity,
    ) -> EngineResult<Option<Record>> {
        Ok(self
            .scan(sheet)
            .await?
            .into_iter()
            .find(|r| identity_agreement(&columns.identity_of(r), candidate) >= 2))
    }

    async fn read_row(
        &self,
        sheet: &SheetName,
        header: &HeaderMap,
        row: usize,
    ) -> EngineResult<Option<Record>> {
        let rows = self
            .schema
            .backend()
            .get_range(&CellRange::row(sheet.clone(), row))
            .await?;
        Ok(rows.first().map(|cells| Record::from_row(header, row, cells)))
    }
}
