//! Header row maps and the per-store header cache.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::storage::SheetName;

/// Column name to position lookup for one sheet's header row.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderMap {
    /// header cells in sheet order, trimmed; blank cells are kept as ""
    columns: Vec<String>,
    /// 0-based position of the first cell carrying each name
    positions: HashMap<String, usize>,
}

impl HeaderMap {
    pub fn new(columns: Vec<String>) -> Self {
        let columns: Vec<String> = columns.into_iter().map(|c| c.trim().to_string()).collect();
        let mut positions = HashMap::with_capacity(columns.len());
        for (i, name) in columns.iter().enumerate() {
            if !name.is_empty() {
                positions.entry(name.clone()).or_insert(i);
            }
        }
        Self { columns, positions }
    }

    /// 0-based position of a column.
    pub fn position(&self, column: &str) -> Option<usize> {
        self.positions.get(column).copied()
    }

    /// 1-based column number, as used in ranges.
    pub fn column_number(&self, column: &str) -> Option<usize> {
        self.position(column).map(|i| i + 1)
    }

    pub fn contains(&self, column: &str) -> bool {
        self.positions.contains_key(column)
    }

    /// Header cells in sheet order.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Width of the header row, blank cells included.
    pub fn width(&self) -> usize {
        self.columns.len()
    }

    /// Number of named columns.
    pub fn named_count(&self) -> usize {
        self.positions.len()
    }

    /// True when the header row carries no names at all.
    pub fn is_blank(&self) -> bool {
        self.positions.is_empty()
    }

    /// Required columns not present, in the order given, without repeats.
    pub fn missing<'a>(&self, required: &[&'a str]) -> Vec<&'a str> {
        let mut out: Vec<&'a str> = Vec::new();
        for &name in required {
            let name_trimmed = name.trim();
            if name_trimmed.is_empty() || self.contains(name_trimmed) || out.contains(&name) {
                continue;
            }
            out.push(name);
        }
        out
    }

    /// A copy with extra columns appended at the end.
    pub fn extended(&self, extra: &[&str]) -> Self {
        let mut columns = self.columns.clone();
        columns.extend(extra.iter().map(|c| c.to_string()));
        Self::new(columns)
    }
}

/// Cached header maps, scoped to one store instance.
///
/// Every local header write replaces the sheet's entry right away, so a store
/// sees its own schema changes immediately. Changes made by other processes
/// become visible only after `invalidate` or a miss.
#[derive(Debug, Default)]
pub struct HeaderCache {
    maps: RwLock<HashMap<SheetName, Arc<HeaderMap>>>,
}

impl HeaderCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, sheet: &SheetName) -> Option<Arc<HeaderMap>> {
        self.maps.read().get(sheet).cloned()
    }

    /// Store a fresh map for a sheet, returning the shared handle.
    pub fn insert(&self, sheet: &SheetName, map: HeaderMap) -> Arc<HeaderMap> {
        let map = Arc::new(map);
        self.maps.write().insert(sheet.clone(), map.clone());
        map
    }

    pub fn invalidate(&self, sheet: &SheetName) {
        self.maps.write().remove(sheet);
    }

    pub fn clear(&self) {
        self.maps.write().clear();
    }

    pub fn len(&self) -> usize {
        self.maps.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.maps.read().is_empty()
    }
}
