//! Business identifier generation.
//!
//! Neither scheme is atomic. The service has no uniqueness constraint, so two
//! requests creating records at the same moment can mint the same sequential
//! id. Callers that create at volume re-check with [`IdGenerator::count_matches`]
//! after writing and repair duplicates themselves.

use std::collections::HashSet;
use std::sync::Arc;

use rand::Rng;

use crate::catalog::SchemaManager;
use crate::engine::error::{EngineError, EngineResult};
use crate::engine::locator::{normalize_key, RowLocator};
use crate::storage::SheetName;

/// Characters used for random identifiers; look-alikes (0/O, 1/I) are left out.
const RANDOM_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

/// How an entity's identifiers are minted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdScheme {
    /// prefix followed by a zero-padded counter, e.g. `APL0000000042`
    Sequential { prefix: &'static str, width: usize },
    /// prefix followed by random characters, e.g. `APP-7K2M9QXA4T`
    Random { prefix: &'static str, length: usize },
}

impl IdScheme {
    pub fn prefix(&self) -> &'static str {
        match self {
            IdScheme::Sequential { prefix, .. } | IdScheme::Random { prefix, .. } => prefix,
        }
    }

    /// Whether a value has exactly the shape this scheme produces.
    pub fn is_canonical(&self, value: &str) -> bool {
        let value = value.trim();
        match *self {
            IdScheme::Sequential { prefix, width } => {
                value.starts_with(prefix)
                    && value.len() == prefix.len() + width
                    && value[prefix.len()..].bytes().all(|b| b.is_ascii_digit())
            }
            IdScheme::Random { prefix, length } => {
                value.starts_with(prefix)
                    && value.len() == prefix.len() + length
                    && value[prefix.len()..].bytes().all(|b| RANDOM_ALPHABET.contains(&b))
            }
        }
    }

    /// Format a sequence number for a sequential scheme.
    pub fn format_sequence(prefix: &str, width: usize, n: u64) -> String {
        format!("{}{:0width$}", prefix, n, width = width)
    }
}

/// Numeric suffix of a value shaped `prefix` + exactly `width` digits; the
/// prefix match ignores case. Values of any other length are not ours to count.
pub fn parse_sequence(prefix: &str, width: usize, value: &str) -> Option<u64> {
    let value = value.trim();
    let head = value.get(..prefix.len())?;
    if !head.eq_ignore_ascii_case(prefix) {
        return None;
    }
    let digits = &value[prefix.len()..];
    if digits.len() != width || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

/// Random candidate of `length` characters after `prefix`.
pub fn random_candidate(prefix: &str, length: usize) -> String {
    let mut rng = rand::thread_rng();
    let mut out = String::with_capacity(prefix.len() + length);
    out.push_str(prefix);
    for _ in 0..length {
        let i = rng.gen_range(0..RANDOM_ALPHABET.len());
        out.push(RANDOM_ALPHABET[i] as char);
    }
    out
}

/// Mints identifiers against the current contents of an id column.
#[derive(Clone)]
pub struct IdGenerator {
    locator: RowLocator,
    max_attempts: usize,
}

impl IdGenerator {
    pub fn new(schema: Arc<SchemaManager>, max_attempts: usize) -> Self {
        Self {
            locator: RowLocator::new(schema),
            max_attempts: max_attempts.max(1),
        }
    }

    /// Mint a fresh identifier under `scheme`.
    pub async fn generate(
        &self,
        sheet: &SheetName,
        column: &str,
        scheme: IdScheme,
    ) -> EngineResult<String> {
        match scheme {
            IdScheme::Sequential { prefix, width } => {
                self.next_sequential(sheet, column, prefix, width).await
            }
            IdScheme::Random { prefix, length } => {
                self.random_unique(sheet, column, prefix, length).await
            }
        }
    }

    /// One past the largest numeric suffix in the column, zero-padded.
    ///
    /// The whole column is read on every call; the maximum is never cached,
    /// so rows written by other processes are always taken into account.
    pub async fn next_sequential(
        &self,
        sheet: &SheetName,
        column: &str,
        prefix: &str,
        width: usize,
    ) -> EngineResult<String> {
        let max = self
            .locator
            .column_values(sheet, column)
            .await?
            .iter()
            .filter_map(|(_, v)| parse_sequence(prefix, width, v))
            .max()
            .unwrap_or(0);
        let next = IdScheme::format_sequence(prefix, width, max.saturating_add(1));
        if max == u64::MAX || next.len() != prefix.len() + width {
            return Err(EngineError::SequenceExhausted {
                sheet: sheet.to_string(),
                prefix: prefix.to_string(),
                width,
            });
        }
        Ok(next)
    }

    /// A random identifier not present in the column.
    pub async fn random_unique(
        &self,
        sheet: &SheetName,
        column: &str,
        prefix: &str,
        length: usize,
    ) -> EngineResult<String> {
        let existing: HashSet<String> = self
            .locator
            .column_values(sheet, column)
            .await?
            .into_iter()
            .map(|(_, v)| normalize_key(&v))
            .collect();

        for attempt in 1..=self.max_attempts {
            let candidate = random_candidate(prefix, length);
            if !existing.contains(&normalize_key(&candidate)) {
                return Ok(candidate);
            }
            tracing::debug!("identifier collision on attempt {} in {}", attempt, sheet);
        }

        Err(EngineError::IdentifierExhausted {
            sheet: sheet.to_string(),
            prefix: prefix.to_string(),
            attempts: self.max_attempts,
        })
    }

    /// How many rows carry `value` in `column`; anything above 1 is a duplicate.
    pub async fn count_matches(
        &self,
        sheet: &SheetName,
        column: &str,
        value: &str,
    ) -> EngineResult<usize> {
        let wanted = normalize_key(value);
        Ok(self
            .locator
            .column_values(sheet, column)
            .await?
            .iter()
            .filter(|(_, v)| normalize_key(v) == wanted)
            .count())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{InMemoryBackend, TabularBackend};
    use serde_json::json;

    fn sheet() -> SheetName {
        SheetName::new("Things").unwrap()
    }

    async fn setup(ids: &[&str], attempts: usize) -> IdGenerator {
        let backend = InMemoryBackend::new();
        let schema = Arc::new(SchemaManager::new(Arc::new(backend.clone())));
        schema.ensure_sheet(&sheet(), &["Name", "ID"]).await.unwrap();
        for id in ids {
            backend
                .append_row(&sheet(), vec![json!("x"), json!(id)])
                .await
                .unwrap();
        }
        IdGenerator::new(schema, attempts)
    }

    #[test]
    fn test_parse_sequence() {
        assert_eq!(parse_sequence("PFX", 10, "PFX0000000009"), Some(9));
        assert_eq!(parse_sequence("PFX", 10, " pfx0000000012 "), Some(12));
        assert_eq!(parse_sequence("PFX", 10, "PFX"), None);
        assert_eq!(parse_sequence("PFX", 10, "PFX12a"), None);
        assert_eq!(parse_sequence("PFX", 10, "OTHER0001"), None);
        assert_eq!(parse_sequence("PFX", 10, "P"), None);
        assert_eq!(parse_sequence("PFX", 10, "PFX12"), None);
        assert_eq!(parse_sequence("PFX", 10, "PFX12345678901"), None);
        assert_eq!(parse_sequence("PFX", 10, "PFX18446744073709551615"), None);
    }

    #[test]
    fn test_canonical_shapes() {
        let seq = IdScheme::Sequential { prefix: "APL", width: 10 };
        assert!(seq.is_canonical("APL0000000001"));
        assert!(!seq.is_canonical("APL1"));
        assert!(!seq.is_canonical("apl0000000001"));
        assert!(!seq.is_canonical("legacy-17"));

        let random = IdScheme::Random { prefix: "APP-", length: 10 };
        assert!(random.is_canonical(&random_candidate("APP-", 10)));
        assert!(!random.is_canonical("APP-0000000000"));
    }

    #[tokio::test]
    async fn test_next_sequential_takes_max_plus_one() {
        let ids = setup(&["PFX0000000005", "legacy-44", "PFX0000000009", ""], 5).await;
        let next = ids.next_sequential(&sheet(), "ID", "PFX", 10).await.unwrap();
        assert_eq!(next, "PFX0000000010");
    }

    #[tokio::test]
    async fn test_next_sequential_ignores_off_width_values() {
        let ids = setup(
            &["PFX0000000003", "PFX12345678901", "PFX18446744073709551615", "PFX42"],
            5,
        )
        .await;
        let next = ids.next_sequential(&sheet(), "ID", "PFX", 10).await.unwrap();
        assert_eq!(next, "PFX0000000004");
        assert!(IdScheme::Sequential { prefix: "PFX", width: 10 }.is_canonical(&next));
    }

    #[tokio::test]
    async fn test_next_sequential_full_width_is_exhausted() {
        let ids = setup(&["PFX9999"], 5).await;
        let result = ids.next_sequential(&sheet(), "ID", "PFX", 4).await;
        assert!(matches!(
            result,
            Err(EngineError::SequenceExhausted { width: 4, .. })
        ));

        let ids = setup(&["PFX18446744073709551615"], 5).await;
        let result = ids.next_sequential(&sheet(), "ID", "PFX", 20).await;
        assert!(matches!(result, Err(EngineError::SequenceExhausted { .. })));
    }

    #[tokio::test]
    async fn test_next_sequential_on_empty_sheet() {
        let ids = setup(&[], 5).await;
        let next = ids.next_sequential(&sheet(), "ID", "PFX", 10).await.unwrap();
        assert_eq!(next, "PFX0000000001");
    }

    #[tokio::test]
    async fn test_next_sequential_never_caches() {
        let backend = InMemoryBackend::new();
        let schema = Arc::new(SchemaManager::new(Arc::new(backend.clone())));
        schema.ensure_sheet(&sheet(), &["Name", "ID"]).await.unwrap();
        let ids = IdGenerator::new(schema, 5);

        assert_eq!(ids.next_sequential(&sheet(), "ID", "PFX", 4).await.unwrap(), "PFX0001");
        backend
            .append_row(&sheet(), vec![json!("x"), json!("PFX0007")])
            .await
            .unwrap();
        assert_eq!(ids.next_sequential(&sheet(), "ID", "PFX", 4).await.unwrap(), "PFX0008");
    }

    #[tokio::test]
    async fn test_random_unique_shape() {
        let ids = setup(&["APP-AAAA"], 5).await;
        let id = ids.random_unique(&sheet(), "ID", "APP-", 8).await.unwrap();
        assert!(id.starts_with("APP-"));
        assert_eq!(id.len(), 12);
    }

    #[tokio::test]
    async fn test_random_unique_exhausts() {
        // a one-character alphabet space fully taken forces every attempt to collide
        let taken: Vec<String> = RANDOM_ALPHABET
            .iter()
            .map(|b| format!("X-{}", *b as char))
            .collect();
        let taken: Vec<&str> = taken.iter().map(String::as_str).collect();
        let ids = setup(&taken, 3).await;

        let result = ids.random_unique(&sheet(), "ID", "X-", 1).await;
        assert!(matches!(
            result,
            Err(EngineError::IdentifierExhausted { attempts: 3, .. })
        ));
    }

    #[tokio::test]
    async fn test_count_matches() {
        let ids = setup(&["PFX0000000001", "pfx0000000001", "PFX0000000002"], 5).await;
        assert_eq!(ids.count_matches(&sheet(), "ID", "PFX0000000001").await.unwrap(), 2);
        assert_eq!(ids.count_matches(&sheet(), "ID", "PFX0000000003").await.unwrap(), 0);
    }
}
