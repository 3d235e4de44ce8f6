//! Append-only logs stored as JSON text inside a single cell.
//!
//! One malformed cell must not make its record unreadable, so decoding never
//! fails: blank or unparsable content yields an empty log.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// An ordered list of entries encoded as a JSON array.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JsonLog<T> {
    entries: Vec<T>,
}

impl<T> Default for JsonLog<T> {
    fn default() -> Self {
        Self { entries: Vec::new() }
    }
}

impl<T: Serialize + DeserializeOwned> JsonLog<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode a cell's text.
    pub fn decode(cell: &str) -> Self {
        let cell = cell.trim();
        if cell.is_empty() {
            return Self::default();
        }

        match serde_json::from_str::<Vec<T>>(cell) {
            Ok(entries) => Self { entries },
            Err(e) => {
                tracing::warn!("discarding unparsable log cell ({} bytes): {}", cell.len(), e);
                Self::default()
            }
        }
    }

    /// Encode as compact JSON; an empty log encodes as an empty cell.
    pub fn encode(&self) -> String {
        if self.entries.is_empty() {
            return String::new();
        }
        serde_json::to_string(&self.entries).unwrap_or_default()
    }

    /// Append an entry.
    pub fn push(&mut self, entry: T) {
        self.entries.push(entry);
    }

    pub fn entries(&self) -> &[T] {
        &self.entries
    }

    pub fn last(&self) -> Option<&T> {
        self.entries.last()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Entry {
        action: String,
    }

    fn entry(action: &str) -> Entry {
        Entry { action: action.into() }
    }

    #[test]
    fn test_append_and_reload() {
        let mut log = JsonLog::new();
        log.push(entry("created"));
        log.push(entry("scheduled"));

        let reloaded: JsonLog<Entry> = JsonLog::decode(&log.encode());
        assert_eq!(reloaded.len(), 2);
        assert_eq!(reloaded.last(), Some(&entry("scheduled")));
    }

    #[test]
    fn test_corrupt_cell_is_empty() {
        let log: JsonLog<Entry> = JsonLog::decode("{not json");
        assert!(log.is_empty());

        let log: JsonLog<Entry> = JsonLog::decode("{\"action\": \"x\"}");
        assert!(log.is_empty());
    }

    #[test]
    fn test_blank_cell() {
        let log: JsonLog<Entry> = JsonLog::decode("   ");
        assert!(log.is_empty());
        assert_eq!(log.encode(), "");
    }
}
