//! In-process implementation of the tabular backend.
//!
//! Behaves like the hosted service as far as the upper layers can tell:
//! 1-based addressing, trailing blanks trimmed on read, appends land after
//! the last populated row, row deletes shift everything below. Workbooks can
//! be saved to and loaded from a JSON snapshot file.

use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::storage::backend::TabularBackend;
use crate::storage::error::{StorageError, StorageResult};
use crate::storage::types::{CellFormat, CellRange, RowValues, SheetName};

/// An in-memory workbook.
///
/// Clone this to share across tasks - it uses Arc internally.
#[derive(Clone, Default)]
pub struct InMemoryBackend {
    inner: Arc<InMemoryInner>,
}

#[derive(Default)]
struct InMemoryInner {
    sheets: RwLock<Vec<MemSheet>>,
    read_calls: AtomicUsize,
    write_calls: AtomicUsize,
    offline: AtomicBool,
    fail_formatting: AtomicBool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct MemSheet {
    name: SheetName,
    rows: Vec<RowValues>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    header_format: Option<CellFormat>,
}

#[derive(Serialize, Deserialize)]
struct Snapshot {
    sheets: Vec<MemSheet>,
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        _ => false,
    }
}

fn trim_row(mut row: RowValues) -> RowValues {
    while row.last().is_some_and(is_blank) {
        row.pop();
    }
    row
}

impl MemSheet {
    fn last_populated_row(&self) -> usize {
        self.rows
            .iter()
            .rposition(|r| r.iter().any(|v| !is_blank(v)))
            .map_or(0, |i| i + 1)
    }

    fn write_at(&mut self, row: usize, col: usize, values: RowValues) {
        if self.rows.len() < row {
            self.rows.resize(row, Vec::new());
        }
        let target = &mut self.rows[row - 1];
        let needed = col - 1 + values.len();
        if target.len() < needed {
            target.resize(needed, Value::String(String::new()));
        }
        for (offset, value) in values.into_iter().enumerate() {
            target[col - 1 + offset] = match value {
                Value::Null => Value::String(String::new()),
                other => other,
            };
        }
    }
}

impl InMemoryBackend {
    /// Create an empty workbook.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a workbook from a JSON snapshot file.
    pub fn load_snapshot(path: impl AsRef<Path>) -> StorageResult<Self> {
        let path = path.as_ref();
        let bytes = std::fs::read(path).map_err(|source| StorageError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let snapshot: Snapshot = serde_json::from_slice(&bytes)?;

        let backend = Self::new();
        *backend.inner.sheets.write() = snapshot.sheets;
        Ok(backend)
    }

    /// Load a snapshot if the file exists, otherwise start empty.
    pub fn open_or_empty(path: impl AsRef<Path>) -> StorageResult<Self> {
        let path = path.as_ref();
        if path.exists() {
            Self::load_snapshot(path)
        } else {
            Ok(Self::new())
        }
    }

    /// Write the workbook to a JSON snapshot file.
    pub fn save_snapshot(&self, path: impl AsRef<Path>) -> StorageResult<()> {
        let path = path.as_ref();
        let snapshot = Snapshot {
            sheets: self.inner.sheets.read().clone(),
        };
        let bytes = serde_json::to_vec_pretty(&snapshot)?;
        std::fs::write(path, bytes).map_err(|source| StorageError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Number of read calls served so far.
    pub fn read_calls(&self) -> usize {
        self.inner.read_calls.load(Ordering::SeqCst)
    }

    /// Number of write calls served so far (structural calls included).
    pub fn write_calls(&self) -> usize {
        self.inner.write_calls.load(Ordering::SeqCst)
    }

    /// Make every call fail with a transport error until switched back.
    pub fn set_offline(&self, offline: bool) {
        self.inner.offline.store(offline, Ordering::SeqCst);
    }

    /// Make formatting calls fail.
    pub fn set_fail_formatting(&self, fail: bool) {
        self.inner.fail_formatting.store(fail, Ordering::SeqCst);
    }

    /// Number of rows in a sheet including the header row, ignoring trailing blanks.
    pub fn row_count(&self, sheet: &SheetName) -> Option<usize> {
        self.inner
            .sheets
            .read()
            .iter()
            .find(|s| &s.name == sheet)
            .map(MemSheet::last_populated_row)
    }

    /// Header formatting last applied to a sheet, if any.
    pub fn header_format(&self, sheet: &SheetName) -> Option<CellFormat> {
        self.inner
            .sheets
            .read()
            .iter()
            .find(|s| &s.name == sheet)
            .and_then(|s| s.header_format.clone())
    }

    fn check_online(&self) -> StorageResult<()> {
        if self.inner.offline.load(Ordering::SeqCst) {
            return Err(StorageError::Transport("backend unreachable".into()));
        }
        Ok(())
    }

    fn begin_read(&self) -> StorageResult<()> {
        self.check_online()?;
        self.inner.read_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn begin_write(&self) -> StorageResult<()> {
        self.check_online()?;
        self.inner.write_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn read_range(&self, range: &CellRange) -> StorageResult<Vec<RowValues>> {
        if !range.is_valid() {
            return Err(StorageError::invalid_range(range, "coordinates are 1-based"));
        }

        let sheets = self.inner.sheets.read();
        let sheet = sheets
            .iter()
            .find(|s| s.name == range.sheet)
            .ok_or_else(|| StorageError::SheetNotFound(range.sheet.clone()))?;

        let last = sheet.last_populated_row();
        let end_row = range.end_row.unwrap_or(last).min(last);

        let mut out = Vec::new();
        for row_no in range.start_row..=end_row {
            let row = &sheet.rows[row_no - 1];
            let end_col = range.end_col.unwrap_or(row.len()).min(row.len());
            let cells = if range.start_col <= end_col {
                row[range.start_col - 1..end_col].to_vec()
            } else {
                Vec::new()
            };
            out.push(trim_row(cells));
        }

        while out.last().is_some_and(|r| r.is_empty()) {
            out.pop();
        }
        Ok(out)
    }

    fn write_range(&self, range: &CellRange, rows: Vec<RowValues>) -> StorageResult<()> {
        if !range.is_valid() {
            return Err(StorageError::invalid_range(range, "coordinates are 1-based"));
        }

        let mut sheets = self.inner.sheets.write();
        let sheet = sheets
            .iter_mut()
            .find(|s| s.name == range.sheet)
            .ok_or_else(|| StorageError::SheetNotFound(range.sheet.clone()))?;

        for (offset, row) in rows.into_iter().enumerate() {
            sheet.write_at(range.start_row + offset, range.start_col, row);
        }
        Ok(())
    }
}

#[async_trait]
impl TabularBackend for InMemoryBackend {
    async fn list_sheets(&self) -> StorageResult<Vec<SheetName>> {
        self.begin_read()?;
        Ok(self.inner.sheets.read().iter().map(|s| s.name.clone()).collect())
    }

    async fn add_sheet(&self, sheet: &SheetName) -> StorageResult<()> {
        self.begin_write()?;
        let mut sheets = self.inner.sheets.write();
        if sheets.iter().any(|s| &s.name == sheet) {
            return Err(StorageError::SheetExists(sheet.clone()));
        }
        sheets.push(MemSheet {
            name: sheet.clone(),
            rows: Vec::new(),
            header_format: None,
        });
        Ok(())
    }

    async fn get_range(&self, range: &CellRange) -> StorageResult<Vec<RowValues>> {
        self.begin_read()?;
        self.read_range(range)
    }

    async fn update_range(&self, range: &CellRange, rows: Vec<RowValues>) -> StorageResult<()> {
        self.begin_write()?;
        self.write_range(range, rows)
    }

    async fn append_row(&self, sheet: &SheetName, row: RowValues) -> StorageResult<usize> {
        self.begin_write()?;
        let mut sheets = self.inner.sheets.write();
        let target = sheets
            .iter_mut()
            .find(|s| &s.name == sheet)
            .ok_or_else(|| StorageError::SheetNotFound(sheet.clone()))?;

        let row_no = target.last_populated_row() + 1;
        target.write_at(row_no, 1, row);
        Ok(row_no)
    }

    async fn batch_get(&self, ranges: &[CellRange]) -> StorageResult<Vec<Vec<RowValues>>> {
        self.begin_read()?;
        ranges.iter().map(|r| self.read_range(r)).collect()
    }

    async fn batch_update(&self, updates: Vec<(CellRange, Vec<RowValues>)>) -> StorageResult<()> {
        self.begin_write()?;
        for (range, rows) in updates {
            self.write_range(&range, rows)?;
        }
        Ok(())
    }

    async fn insert_rows(&self, sheet: &SheetName, at: usize, count: usize) -> StorageResult<()> {
        self.begin_write()?;
        if at == 0 {
            return Err(StorageError::invalid_range(
                &CellRange::row(sheet.clone(), 1),
                "row numbers are 1-based",
            ));
        }

        let mut sheets = self.inner.sheets.write();
        let target = sheets
            .iter_mut()
            .find(|s| &s.name == sheet)
            .ok_or_else(|| StorageError::SheetNotFound(sheet.clone()))?;

        let index = (at - 1).min(target.rows.len());
        for _ in 0..count {
            target.rows.insert(index, Vec::new());
        }
        Ok(())
    }

    async fn delete_rows(&self, sheet: &SheetName, at: usize, count: usize) -> StorageResult<()> {
        self.begin_write()?;
        let mut sheets = self.inner.sheets.write();
        let target = sheets
            .iter_mut()
            .find(|s| &s.name == sheet)
            .ok_or_else(|| StorageError::SheetNotFound(sheet.clone()))?;

        if at == 0 || at > target.rows.len() {
            return Err(StorageError::invalid_range(
                &CellRange::row(sheet.clone(), at.max(1)),
                "row outside the grid",
            ));
        }

        let end = (at - 1 + count).min(target.rows.len());
        target.rows.drain(at - 1..end);
        Ok(())
    }

    async fn format_range(&self, range: &CellRange, format: &CellFormat) -> StorageResult<()> {
        self.begin_write()?;
        if self.inner.fail_formatting.load(Ordering::SeqCst) {
            return Err(StorageError::Transport("formatting rejected".into()));
        }

        let mut sheets = self.inner.sheets.write();
        let target = sheets
            .iter_mut()
            .find(|s| s.name == range.sheet)
            .ok_or_else(|| StorageError::SheetNotFound(range.sheet.clone()))?;
        if range.start_row == 1 {
            target.header_format = Some(format.clone());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn sheet(name: &str) -> SheetName {
        SheetName::new(name).unwrap()
    }

    async fn setup() -> (InMemoryBackend, SheetName) {
        let backend = InMemoryBackend::new();
        let name = sheet("People");
        backend.add_sheet(&name).await.unwrap();
        (backend, name)
    }

    #[tokio::test]
    async fn test_add_sheet_twice_fails() {
        let (backend, name) = setup().await;
        let result = backend.add_sheet(&name).await;
        assert!(matches!(result, Err(StorageError::SheetExists(_))));
        assert!(backend.sheet_exists(&name).await.unwrap());
    }

    #[tokio::test]
    async fn test_append_and_read_back() {
        let (backend, name) = setup().await;
        backend
            .update_range(&CellRange::row(name.clone(), 1), vec![vec![json!("id"), json!("name")]])
            .await
            .unwrap();

        let row_no = backend
            .append_row(&name, vec![json!("P1"), json!("Ada")])
            .await
            .unwrap();
        assert_eq!(row_no, 2);

        let rows = backend.get_range(&CellRange::rows_from(name, 2)).await.unwrap();
        assert_eq!(rows, vec![vec![json!("P1"), json!("Ada")]]);
    }

    #[tokio::test]
    async fn test_trailing_blanks_are_trimmed() {
        let (backend, name) = setup().await;
        backend
            .update_range(
                &CellRange::row(name.clone(), 1),
                vec![vec![json!("a"), json!(""), Value::Null]],
            )
            .await
            .unwrap();

        let rows = backend.get_range(&CellRange::row(name, 1)).await.unwrap();
        assert_eq!(rows, vec![vec![json!("a")]]);
    }

    #[tokio::test]
    async fn test_column_read() {
        let (backend, name) = setup().await;
        for i in 0..3 {
            backend
                .append_row(&name, vec![json!(format!("P{}", i)), json!(i)])
                .await
                .unwrap();
        }

        let col = backend
            .get_range(&CellRange::column_from(name, 2, 1))
            .await
            .unwrap();
        assert_eq!(col, vec![vec![json!(0)], vec![json!(1)], vec![json!(2)]]);
    }

    #[tokio::test]
    async fn test_delete_rows_shifts_up() {
        let (backend, name) = setup().await;
        for id in ["A", "B", "C"] {
            backend.append_row(&name, vec![json!(id)]).await.unwrap();
        }

        backend.delete_rows(&name, 2, 1).await.unwrap();
        let rows = backend.get_range(&CellRange::rows_from(name.clone(), 1)).await.unwrap();
        assert_eq!(rows, vec![vec![json!("A")], vec![json!("C")]]);
        assert_eq!(backend.row_count(&name), Some(2));
    }

    #[tokio::test]
    async fn test_insert_rows_shifts_down() {
        let (backend, name) = setup().await;
        backend.append_row(&name, vec![json!("A")]).await.unwrap();
        backend.insert_rows(&name, 1, 1).await.unwrap();

        let rows = backend.get_range(&CellRange::rows_from(name, 1)).await.unwrap();
        assert_eq!(rows, vec![vec![], vec![json!("A")]]);
    }

    #[tokio::test]
    async fn test_offline_fails_with_transport() {
        let (backend, name) = setup().await;
        backend.set_offline(true);
        let result = backend.append_row(&name, vec![json!("A")]).await;
        assert!(matches!(result, Err(ref e) if e.is_retriable()));
    }

    #[tokio::test]
    async fn test_missing_sheet() {
        let backend = InMemoryBackend::new();
        let result = backend.get_range(&CellRange::row(sheet("Nope"), 1)).await;
        assert!(matches!(result, Err(ref e) if e.is_not_found()));
    }

    #[tokio::test]
    async fn test_snapshot_roundtrip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("workbook.json");

        let (backend, name) = setup().await;
        backend.append_row(&name, vec![json!("A"), json!(7)]).await.unwrap();
        backend.save_snapshot(&path).unwrap();

        let restored = InMemoryBackend::open_or_empty(&path).unwrap();
        let rows = restored.get_range(&CellRange::rows_from(name, 1)).await.unwrap();
        assert_eq!(rows, vec![vec![json!("A"), json!(7)]]);
    }

    #[tokio::test]
    async fn test_batch_calls_count_once() {
        let (backend, name) = setup().await;
        let reads = backend.read_calls();
        let writes = backend.write_calls();

        backend
            .batch_update(vec![
                (CellRange::cell(name.clone(), 1, 1), vec![vec![json!("id")]]),
                (CellRange::cell(name.clone(), 2, 2), vec![vec![json!("x")]]),
            ])
            .await
            .unwrap();
        let result = backend
            .batch_get(&[CellRange::row(name.clone(), 1), CellRange::row(name, 2)])
            .await
            .unwrap();

        assert_eq!(result, vec![vec![vec![json!("id")]], vec![vec![json!(""), json!("x")]]]);
        assert_eq!(backend.write_calls(), writes + 1);
        assert_eq!(backend.read_calls(), reads + 1);
    }

    #[tokio::test]
    async fn test_call_counters() {
        let (backend, name) = setup().await;
        let writes = backend.write_calls();
        backend.get_range(&CellRange::row(name, 1)).await.unwrap();
        assert_eq!(backend.write_calls(), writes);
        assert!(backend.read_calls() >= 1);
    }
}
