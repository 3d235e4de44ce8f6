//! Entity descriptors.
//!
//! Each entity kind lives on its own sheet. A descriptor names the sheet, the
//! base header row written on creation, the columns added lazily to older
//! sheets, how identifiers are minted and how listings behave.

pub mod applicant;
pub mod application;
pub mod company;
pub mod referrer;

use crate::engine::{IdPolicy, IdScheme, ListProfile};
use crate::storage::{InvalidNameError, SheetName};

pub use applicant::APPLICANTS;
pub use application::{ActionEntry, Meeting, TokenKind, APPLICATIONS};
pub use company::{Approval, COMPANIES};
pub use referrer::{PendingEdit, REFERRERS};

/// Column holding the creation timestamp on every sheet.
pub const TIMESTAMP: &str = "Timestamp";
/// Column holding the workflow status on most sheets.
pub const STATUS: &str = "Status";

/// Static description of one entity kind.
#[derive(Debug)]
pub struct EntityKind {
    /// short name used on the command line
    pub name: &'static str,
    pub sheet: &'static str,
    pub id_column: &'static str,
    pub id_scheme: IdScheme,
    pub legacy_id_column: Option<&'static str>,
    /// header row written when the sheet is created
    pub headers: &'static [&'static str],
    /// columns added on first use, never assumed present
    pub lazy_columns: &'static [&'static str],
    pub list: ListProfile,
}

impl EntityKind {
    pub fn sheet_name(&self) -> Result<SheetName, InvalidNameError> {
        SheetName::new(self.sheet)
    }

    pub fn id_policy(&self) -> IdPolicy {
        IdPolicy {
            column: self.id_column,
            scheme: self.id_scheme,
            legacy_column: self.legacy_id_column,
        }
    }

    /// Base headers followed by lazy columns.
    pub fn all_columns(&self) -> Vec<&'static str> {
        self.headers
            .iter()
            .chain(self.lazy_columns.iter())
            .copied()
            .collect()
    }

    /// Look up a kind by its command-line name, singular or plural.
    pub fn parse(name: &str) -> Option<&'static EntityKind> {
        let name = name.trim().to_ascii_lowercase();
        ALL.iter()
            .copied()
            .find(|kind| kind.name == name || singular(kind.name) == name)
    }
}

fn singular(name: &str) -> String {
    match name.strip_suffix("ies") {
        Some(stem) => format!("{}y", stem),
        None => name.strip_suffix('s').unwrap_or(name).to_string(),
    }
}

/// Every entity kind, in bootstrap order.
pub const ALL: [&EntityKind; 4] = [&APPLICANTS, &REFERRERS, &COMPANIES, &APPLICATIONS];
