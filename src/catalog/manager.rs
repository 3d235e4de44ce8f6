//! Schema manager: sheet creation, header growth and legacy-layout repair.
//!
//! Row 1 of every sheet is its schema. Columns are only ever appended at the
//! end of that row; existing names are never moved, renamed or removed, so a
//! column's meaning is fixed once assigned.

use std::sync::{Arc, OnceLock};

use regex::Regex;
use serde_json::Value;

use super::error::{SchemaError, SchemaResult};
use super::header::{HeaderCache, HeaderMap};
use crate::record::unescape_on_read;
use crate::storage::{CellFormat, CellRange, SheetName, StorageError, TabularBackend};

/// What `ensure_sheet` had to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SheetStatus {
    /// the sheet did not exist and was created with the expected headers
    Created,
    /// the sheet existed with a blank header row, now filled in
    Initialized,
    /// a known legacy layout was repaired
    Migrated(Migration),
    /// the header row was left as found
    Unchanged,
}

/// Legacy layouts `ensure_sheet` knows how to repair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Migration {
    /// a lone leftover header cell was cleared and the full header written
    StaleHeaderRewritten,
    /// row 1 held a record, so a header row was inserted above it
    HeaderRowInserted,
}

fn record_like_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(
            r"^(?:[A-Za-z]{2,6}[0-9]{4,}|[A-Z]{2,6}-[0-9A-Z]{4,}|[^@\s]+@[^@\s]+\.[^@\s]+|\d{4}-\d{2}-\d{2}T.*)$",
        )
        .expect("static pattern compiles")
    })
}

/// A header row that shares no names with the expected schema but carries
/// values shaped like identifiers, emails or timestamps is a data row.
fn looks_like_record(cells: &[String]) -> bool {
    let filled: Vec<&String> = cells.iter().filter(|c| !c.is_empty()).collect();
    filled.len() >= 2 && filled.iter().any(|c| record_like_pattern().is_match(c))
}

fn decode_row(row: Option<&Vec<Value>>) -> Vec<String> {
    row.map(|cells| cells.iter().map(|v| unescape_on_read(Some(v))).collect())
        .unwrap_or_default()
}

fn validate_expected(sheet: &SheetName, expected: &[&str]) -> SchemaResult<()> {
    if expected.iter().all(|c| c.trim().is_empty()) {
        return Err(SchemaError::EmptyHeaders(sheet.to_string()));
    }
    let mut seen = std::collections::HashSet::new();
    for col in expected {
        if !seen.insert(col.trim()) {
            return Err(SchemaError::DuplicateColumn(col.to_string()));
        }
    }
    Ok(())
}

/// Keeps sheets and their header rows in the shape callers need.
pub struct SchemaManager {
    backend: Arc<dyn TabularBackend>,
    cache: HeaderCache,
    format_headers: bool,
}

impl SchemaManager {
    /// Create a manager with an empty header cache.
    pub fn new(backend: Arc<dyn TabularBackend>) -> Self {
        Self {
            backend,
            cache: HeaderCache::new(),
            format_headers: true,
        }
    }

    /// Enable or disable cosmetic header formatting.
    pub fn with_header_formatting(mut self, enabled: bool) -> Self {
        self.format_headers = enabled;
        self
    }

    pub fn backend(&self) -> &Arc<dyn TabularBackend> {
        &self.backend
    }

    pub fn cache(&self) -> &HeaderCache {
        &self.cache
    }

    /// Header map for a sheet, from the cache when possible.
    ///
    /// A sheet that does not exist yet has an empty map, which is not cached.
    pub async fn headers(&self, sheet: &SheetName) -> SchemaResult<Arc<HeaderMap>> {
        if let Some(map) = self.cache.get(sheet) {
            return Ok(map);
        }
        tracing::debug!("header cache miss for {}", sheet);
        self.refresh(sheet).await
    }

    /// Re-read a sheet's header row and replace its cache entry.
    pub async fn refresh(&self, sheet: &SheetName) -> SchemaResult<Arc<HeaderMap>> {
        match self.backend.get_range(&CellRange::row(sheet.clone(), 1)).await {
            Ok(rows) => {
                let map = HeaderMap::new(decode_row(rows.first()));
                Ok(self.cache.insert(sheet, map))
            }
            Err(StorageError::SheetNotFound(_)) => {
                self.cache.invalidate(sheet);
                Ok(Arc::new(HeaderMap::default()))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Make sure a sheet exists with a usable header row.
    ///
    /// Existing headers are left untouched unless they match a known broken
    /// layout; when a layout looks wrong but cannot be repaired confidently it
    /// is preserved and a warning is logged.
    pub async fn ensure_sheet(
        &self,
        sheet: &SheetName,
        expected: &[&str],
    ) -> SchemaResult<SheetStatus> {
        validate_expected(sheet, expected)?;

        if !self.backend.sheet_exists(sheet).await? {
            tracing::info!("creating sheet {}", sheet);
            self.backend.add_sheet(sheet).await?;
            self.write_header(sheet, expected, 0).await?;
            return Ok(SheetStatus::Created);
        }

        let top = self
            .backend
            .get_range(&CellRange {
                sheet: sheet.clone(),
                start_row: 1,
                start_col: 1,
                end_row: Some(2),
                end_col: None,
            })
            .await?;
        let header = decode_row(top.first());
        let first_data = decode_row(top.get(1));
        let filled: Vec<(usize, &String)> =
            header.iter().enumerate().filter(|(_, c)| !c.is_empty()).collect();

        if filled.is_empty() {
            tracing::info!("initializing blank header row of {}", sheet);
            self.write_header(sheet, expected, header.len()).await?;
            return Ok(SheetStatus::Initialized);
        }

        let overlap = filled
            .iter()
            .filter(|(_, name)| expected.iter().any(|e| e.trim() == name.as_str()))
            .count();

        if filled.len() == 1 && expected.len() > 1 {
            let (position, name) = filled[0];
            let no_data = first_data.iter().all(|c| c.is_empty());
            let keeps_meaning = position == 0 && expected[0].trim() == name.as_str();
            if no_data || keeps_meaning {
                tracing::info!("rewriting stale single-column header '{}' of {}", name, sheet);
                self.write_header(sheet, expected, header.len()).await?;
                return Ok(SheetStatus::Migrated(Migration::StaleHeaderRewritten));
            }
            if overlap == 0 {
                tracing::warn!(
                    "sheet {} has a single unknown header '{}' above data; leaving it untouched",
                    sheet,
                    name
                );
                self.refresh(sheet).await?;
                return Ok(SheetStatus::Unchanged);
            }
        }

        if overlap == 0 {
            if looks_like_record(&header) {
                tracing::info!("row 1 of {} holds a record; inserting a header row above it", sheet);
                self.backend.insert_rows(sheet, 1, 1).await?;
                self.write_header(sheet, expected, 0).await?;
                return Ok(SheetStatus::Migrated(Migration::HeaderRowInserted));
            }
            tracing::warn!(
                "header row of {} shares no columns with the expected schema; leaving it untouched",
                sheet
            );
        }

        self.refresh(sheet).await?;
        Ok(SheetStatus::Unchanged)
    }

    /// Append any required columns the header row lacks.
    ///
    /// Missing columns go at the end in the order given; existing columns are
    /// never reordered or removed. Returns the names that were added. Calling
    /// this twice with the same input adds nothing the second time.
    pub async fn ensure_columns(
        &self,
        sheet: &SheetName,
        required: &[&str],
    ) -> SchemaResult<Vec<String>> {
        let cached = self.headers(sheet).await?;
        if cached.missing(required).is_empty() {
            return Ok(Vec::new());
        }

        // confirm against the service before growing the header row
        let current = self.refresh(sheet).await?;
        if current.is_blank() {
            // a missing or blank sheet takes the required columns as its header
            let columns = current.missing(required);
            self.ensure_sheet(sheet, &columns).await?;
            return Ok(columns.iter().map(|c| c.to_string()).collect());
        }

        let missing = current.missing(required);
        if missing.is_empty() {
            return Ok(Vec::new());
        }

        let start_col = current.width() + 1;
        let row: Vec<Value> = missing.iter().map(|c| Value::String(c.to_string())).collect();
        let range = CellRange::cell(sheet.clone(), 1, start_col).to_col(start_col + missing.len() - 1);
        self.backend.update_range(&range, vec![row]).await?;
        self.cache.insert(sheet, current.extended(&missing));
        tracing::info!("added columns {:?} to {}", missing, sheet);

        self.format_header(sheet).await;
        Ok(missing.iter().map(|c| c.to_string()).collect())
    }

    /// Write `columns` over row 1, blanking any leftover cells up to `old_width`.
    async fn write_header(
        &self,
        sheet: &SheetName,
        columns: &[&str],
        old_width: usize,
    ) -> SchemaResult<Arc<HeaderMap>> {
        let width = columns.len().max(old_width);
        let mut row: Vec<Value> = columns.iter().map(|c| Value::String(c.to_string())).collect();
        row.resize(width, Value::String(String::new()));

        self.backend
            .update_range(&CellRange::row(sheet.clone(), 1).to_col(width), vec![row])
            .await?;
        let map = self
            .cache
            .insert(sheet, HeaderMap::new(columns.iter().map(|c| c.to_string()).collect()));

        self.format_header(sheet).await;
        Ok(map)
    }

    /// Cosmetic only; failures are logged and swallowed.
    async fn format_header(&self, sheet: &SheetName) {
        if !self.format_headers {
            return;
        }
        let range = CellRange::row(sheet.clone(), 1);
        if let Err(e) = self.backend.format_range(&range, &CellFormat::header()).await {
            tracing::warn!("could not format header row of {}: {}", sheet, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::InMemoryBackend;
    use serde_json::json;

    const EXPECTED: &[&str] = &["Timestamp", "Applicant ID", "Email", "Status"];

    fn sheet() -> SheetName {
        SheetName::new("Applicants").unwrap()
    }

    fn setup() -> (InMemoryBackend, SchemaManager) {
        let backend = InMemoryBackend::new();
        let manager = SchemaManager::new(Arc::new(backend.clone()));
        (backend, manager)
    }

    async fn header_row(backend: &InMemoryBackend) -> Vec<Value> {
        backend
            .get_range(&CellRange::row(sheet(), 1))
            .await
            .unwrap()
            .into_iter()
            .next()
            .unwrap_or_default()
    }

    #[tokio::test]
    async fn test_ensure_sheet_creates() {
        let (backend, manager) = setup();
        let status = manager.ensure_sheet(&sheet(), EXPECTED).await.unwrap();
        assert_eq!(status, SheetStatus::Created);
        assert_eq!(
            header_row(&backend).await,
            vec![json!("Timestamp"), json!("Applicant ID"), json!("Email"), json!("Status")]
        );
        assert_eq!(backend.header_format(&sheet()), Some(CellFormat::header()));
        assert_eq!(
            manager.cache().get(&sheet()).unwrap().position("Email"),
            Some(2)
        );
    }

    #[tokio::test]
    async fn test_ensure_sheet_leaves_existing_headers() {
        let (backend, manager) = setup();
        backend.add_sheet(&sheet()).await.unwrap();
        backend
            .update_range(
                &CellRange::row(sheet(), 1),
                vec![vec![json!("Email"), json!("Applicant ID"), json!("Custom")]],
            )
            .await
            .unwrap();

        let status = manager.ensure_sheet(&sheet(), EXPECTED).await.unwrap();
        assert_eq!(status, SheetStatus::Unchanged);
        assert_eq!(
            header_row(&backend).await,
            vec![json!("Email"), json!("Applicant ID"), json!("Custom")]
        );
    }

    #[tokio::test]
    async fn test_ensure_sheet_fills_blank_header() {
        let (backend, manager) = setup();
        backend.add_sheet(&sheet()).await.unwrap();
        let status = manager.ensure_sheet(&sheet(), EXPECTED).await.unwrap();
        assert_eq!(status, SheetStatus::Initialized);
        assert_eq!(header_row(&backend).await.len(), EXPECTED.len());
    }

    #[tokio::test]
    async fn test_stale_single_header_is_rewritten() {
        let (backend, manager) = setup();
        backend.add_sheet(&sheet()).await.unwrap();
        backend
            .update_range(&CellRange::cell(sheet(), 1, 3), vec![vec![json!("Old Column")]])
            .await
            .unwrap();

        let status = manager.ensure_sheet(&sheet(), EXPECTED).await.unwrap();
        assert_eq!(status, SheetStatus::Migrated(Migration::StaleHeaderRewritten));
        assert_eq!(header_row(&backend).await.len(), EXPECTED.len());
        assert!(!manager.cache().get(&sheet()).unwrap().contains("Old Column"));
    }

    #[tokio::test]
    async fn test_single_unknown_header_above_data_is_preserved() {
        let (backend, manager) = setup();
        backend.add_sheet(&sheet()).await.unwrap();
        backend.append_row(&sheet(), vec![json!("Mystery")]).await.unwrap();
        backend.append_row(&sheet(), vec![json!("value")]).await.unwrap();

        let status = manager.ensure_sheet(&sheet(), EXPECTED).await.unwrap();
        assert_eq!(status, SheetStatus::Unchanged);
        assert_eq!(header_row(&backend).await, vec![json!("Mystery")]);
    }

    #[tokio::test]
    async fn test_row_offset_inserts_header() {
        let (backend, manager) = setup();
        backend.add_sheet(&sheet()).await.unwrap();
        backend
            .append_row(
                &sheet(),
                vec![
                    json!("2024-03-01T10:00:00Z"),
                    json!("APL0000000001"),
                    json!("ada@example.com"),
                    json!("new"),
                ],
            )
            .await
            .unwrap();

        let status = manager.ensure_sheet(&sheet(), EXPECTED).await.unwrap();
        assert_eq!(status, SheetStatus::Migrated(Migration::HeaderRowInserted));

        let rows = backend.get_range(&CellRange::rows_from(sheet(), 1)).await.unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0][1], json!("Applicant ID"));
        assert_eq!(rows[1][1], json!("APL0000000001"));
    }

    #[tokio::test]
    async fn test_unrecognised_header_is_preserved() {
        let (backend, manager) = setup();
        backend.add_sheet(&sheet()).await.unwrap();
        backend
            .append_row(&sheet(), vec![json!("Foo"), json!("Bar")])
            .await
            .unwrap();

        let status = manager.ensure_sheet(&sheet(), EXPECTED).await.unwrap();
        assert_eq!(status, SheetStatus::Unchanged);
        assert_eq!(header_row(&backend).await, vec![json!("Foo"), json!("Bar")]);
    }

    #[tokio::test]
    async fn test_ensure_columns_is_idempotent() {
        let (backend, manager) = setup();
        manager.ensure_sheet(&sheet(), EXPECTED).await.unwrap();

        let added = manager.ensure_columns(&sheet(), &["X"]).await.unwrap();
        assert_eq!(added, vec!["X"]);
        let added = manager.ensure_columns(&sheet(), &["X"]).await.unwrap();
        assert!(added.is_empty());

        let header = header_row(&backend).await;
        assert_eq!(header.iter().filter(|v| *v == &json!("X")).count(), 1);
        assert_eq!(header.last(), Some(&json!("X")));
    }

    #[tokio::test]
    async fn test_ensure_columns_appends_without_reordering() {
        let (backend, manager) = setup();
        manager.ensure_sheet(&sheet(), EXPECTED).await.unwrap();
        backend
            .append_row(&sheet(), vec![json!("t"), json!("APL0000000001"), json!("a@b.co")])
            .await
            .unwrap();

        manager
            .ensure_columns(&sheet(), &["Email", "Secret Hash", "Pending Update Token Hash"])
            .await
            .unwrap();

        let header = header_row(&backend).await;
        assert_eq!(header[..4], [json!("Timestamp"), json!("Applicant ID"), json!("Email"), json!("Status")]);
        assert_eq!(header[4], json!("Secret Hash"));
        assert_eq!(header[5], json!("Pending Update Token Hash"));

        let map = manager.cache().get(&sheet()).unwrap();
        assert_eq!(map.position("Secret Hash"), Some(4));
    }

    #[tokio::test]
    async fn test_ensure_columns_on_missing_sheet() {
        let (backend, manager) = setup();
        let added = manager.ensure_columns(&sheet(), &["A", "B"]).await.unwrap();
        assert_eq!(added, vec!["A", "B"]);
        assert_eq!(header_row(&backend).await, vec![json!("A"), json!("B")]);
    }

    #[tokio::test]
    async fn test_ensure_columns_uses_cache() {
        let (backend, manager) = setup();
        manager.ensure_sheet(&sheet(), EXPECTED).await.unwrap();
        let reads = backend.read_calls();
        manager.ensure_columns(&sheet(), &["Email"]).await.unwrap();
        assert_eq!(backend.read_calls(), reads);
    }

    #[tokio::test]
    async fn test_format_failure_is_swallowed() {
        let (backend, manager) = setup();
        backend.set_fail_formatting(true);
        let status = manager.ensure_sheet(&sheet(), EXPECTED).await.unwrap();
        assert_eq!(status, SheetStatus::Created);
        assert!(backend.header_format(&sheet()).is_none());
    }

    #[tokio::test]
    async fn test_duplicate_expected_headers_rejected() {
        let (_backend, manager) = setup();
        let result = manager.ensure_sheet(&sheet(), &["A", "A"]).await;
        assert!(matches!(result, Err(SchemaError::DuplicateColumn(_))));
    }

    #[test]
    fn test_looks_like_record() {
        let cells = |v: &[&str]| v.iter().map(|s| s.to_string()).collect::<Vec<_>>();
        assert!(looks_like_record(&cells(&["APL0000000001", "Ada"])));
        assert!(looks_like_record(&cells(&["Ada", "ada@example.com"])));
        assert!(!looks_like_record(&cells(&["Foo", "Bar"])));
        assert!(!looks_like_record(&cells(&["APL0000000001"])));
    }
}
