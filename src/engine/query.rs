//! Filtered, searched, paginated list views.

use std::cmp::Reverse;
use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

use crate::engine::error::EngineResult;
use crate::engine::locator::{normalize_key, RowLocator};
use crate::record::{is_truthy, Record};
use crate::storage::SheetName;

/// Page size used when a caller leaves the limit unset.
pub const DEFAULT_PAGE_SIZE: usize = 50;

/// Caller-side list parameters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListOptions {
    pub search: Option<String>,
    pub status: Option<String>,
    /// equality filters by column name; only the entity's filter fields apply
    pub filters: BTreeMap<String, String>,
    /// `Some(0)` means unbounded, `None` means the default page size
    pub limit: Option<usize>,
    pub offset: usize,
    pub include_archived: bool,
}

impl ListOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn search(mut self, text: impl Into<String>) -> Self {
        self.search = Some(text.into());
        self
    }

    pub fn status(mut self, status: impl Into<String>) -> Self {
        self.status = Some(status.into());
        self
    }

    pub fn filter(mut self, column: impl Into<String>, value: impl Into<String>) -> Self {
        self.filters.insert(column.into(), value.into());
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }

    pub fn include_archived(mut self, include: bool) -> Self {
        self.include_archived = include;
        self
    }
}

/// Why a record counts as eligible.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EligibilityReason {
    LocatedInRegion,
    EligibleToRelocate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Eligibility {
    pub eligible: bool,
    pub reason: Option<EligibilityReason>,
}

/// Columns that decide eligibility.
#[derive(Debug, Clone, Copy)]
pub struct EligibilityRule {
    pub located_column: &'static str,
    pub relocate_column: &'static str,
}

impl EligibilityRule {
    /// Eligible when either column is yes; being located already wins as the reason.
    pub fn evaluate(&self, record: &Record) -> Eligibility {
        let reason = if is_truthy(record.get(self.located_column)) {
            Some(EligibilityReason::LocatedInRegion)
        } else if is_truthy(record.get(self.relocate_column)) {
            Some(EligibilityReason::EligibleToRelocate)
        } else {
            None
        };
        Eligibility {
            eligible: reason.is_some(),
            reason,
        }
    }
}

/// Per-entity list behaviour.
#[derive(Debug, Clone, Copy)]
pub struct ListProfile {
    /// fields scanned by the substring search
    pub search_fields: &'static [&'static str],
    /// fields accepting equality filters
    pub filter_fields: &'static [&'static str],
    /// fields reported when blank
    pub required_fields: &'static [&'static str],
    pub status_column: &'static str,
    pub created_column: &'static str,
    /// records for which this returns true sort ahead of the rest
    pub priority: Option<fn(&Record) -> bool>,
    pub eligibility: Option<EligibilityRule>,
}

/// One listed record with its derived fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListItem {
    pub record: Record,
    pub missing_fields: Vec<&'static str>,
    pub eligibility: Option<Eligibility>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListResult {
    /// matches before pagination
    pub total: usize,
    pub items: Vec<ListItem>,
}

fn created_at(record: &Record, column: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(record.get(column))
        .ok()
        .map(|t| t.with_timezone(&Utc))
}

fn matches_search(record: &Record, fields: &[&str], needle: &str) -> bool {
    fields
        .iter()
        .any(|f| record.get(f).to_lowercase().contains(needle))
}

/// Read-side list views over one sheet at a time.
#[derive(Clone)]
pub struct QueryEngine {
    locator: RowLocator,
    default_limit: usize,
}

impl QueryEngine {
    pub fn new(locator: RowLocator, default_limit: usize) -> Self {
        Self {
            locator,
            default_limit,
        }
    }

    pub fn default_limit(&self) -> usize {
        self.default_limit
    }

    /// List a sheet under `profile`.
    ///
    /// Archived rows are dropped unless asked for. `total` counts every
    /// match before the page is cut.
    pub async fn list(
        &self,
        sheet: &SheetName,
        profile: &ListProfile,
        options: &ListOptions,
    ) -> EngineResult<ListResult> {
        let records = self.locator.scan(sheet).await?;
        let scanned = records.len();

        let needle = options
            .search
            .as_deref()
            .map(normalize_key)
            .filter(|s| !s.is_empty());
        let status = options
            .status
            .as_deref()
            .map(normalize_key)
            .filter(|s| !s.is_empty());
        let filters: Vec<(&str, String)> = options
            .filters
            .iter()
            .filter_map(|(column, value)| {
                let value = normalize_key(value);
                if value.is_empty() {
                    return None;
                }
                match profile.filter_fields.iter().find(|f| **f == column.as_str()) {
                    Some(f) => Some((*f, value)),
                    None => {
                        tracing::debug!("ignoring filter on {} for {}", column, sheet);
                        None
                    }
                }
            })
            .collect();

        let mut matched: Vec<Record> = records
            .into_iter()
            .filter(|r| options.include_archived || !r.is_archived())
            .filter(|r| match &status {
                Some(s) => normalize_key(r.get(profile.status_column)) == *s,
                None => true,
            })
            .filter(|r| {
                filters
                    .iter()
                    .all(|(column, value)| normalize_key(r.get(column)) == *value)
            })
            .filter(|r| match &needle {
                Some(n) => matches_search(r, profile.search_fields, n),
                None => true,
            })
            .collect();

        matched.sort_by_cached_key(|r| sort_key(profile, r));

        let total = matched.len();
        let limit = match options.limit {
            Some(0) => usize::MAX,
            Some(n) => n,
            None => self.default_limit,
        };
        let items = matched
            .into_iter()
            .skip(options.offset)
            .take(limit)
            .map(|record| ListItem {
                missing_fields: profile
                    .required_fields
                    .iter()
                    .copied()
                    .filter(|f| record.is_blank(f))
                    .collect(),
                eligibility: profile.eligibility.map(|rule| rule.evaluate(&record)),
                record,
            })
            .collect::<Vec<_>>();

        tracing::debug!(
            "listed {} of {} matches ({} rows) from {}",
            items.len(),
            total,
            scanned,
            sheet
        );
        Ok(ListResult { total, items })
    }
}

/// Priority records first, then newest by creation time, then latest row.
///
/// Computed once per record: priority checks may decode JSON cells.
fn sort_key(
    profile: &ListProfile,
    record: &Record,
) -> (bool, Reverse<Option<DateTime<Utc>>>, Reverse<usize>) {
    let flagged = profile.priority.map_or(false, |priority| priority(record));
    (
        !flagged,
        Reverse(created_at(record, profile.created_column)),
        Reverse(record.row()),
    )
}
