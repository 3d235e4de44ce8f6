//! Referrer companies: one row per company a referrer is linked to, each
//! approved independently.

use std::fmt;

use crate::engine::{IdScheme, ListProfile};
use crate::record::{ARCHIVED, ARCHIVED_AT, ARCHIVED_BY};

use super::{EntityKind, TIMESTAMP};

pub const COMPANY_ID: &str = "Company ID";
pub const REFERRER_ID: &str = "Referrer ID";
pub const COMPANY: &str = "Company";
pub const COMPANY_DOMAIN: &str = "Company Domain";
pub const COMPANY_INDUSTRY: &str = "Company Industry";
pub const APPROVAL: &str = "Approval";
pub const APPROVED_AT: &str = "Approved At";
pub const APPROVED_BY: &str = "Approved By";

/// Review state of a company link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Approval {
    #[default]
    Pending,
    Approved,
    Denied,
}

impl Approval {
    /// Parse a cell; anything unrecognised is still pending.
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "approved" => Approval::Approved,
            "denied" | "rejected" => Approval::Denied,
            _ => Approval::Pending,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Approval::Pending => "pending",
            Approval::Approved => "approved",
            Approval::Denied => "denied",
        }
    }

    pub fn is_resolved(&self) -> bool {
        !matches!(self, Approval::Pending)
    }
}

impl fmt::Display for Approval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub const COMPANIES: EntityKind = EntityKind {
    name: "companies",
    sheet: "Referrer Companies",
    id_column: COMPANY_ID,
    id_scheme: IdScheme::Random {
        prefix: "RCO-",
        length: 8,
    },
    legacy_id_column: None,
    headers: &[
        TIMESTAMP,
        COMPANY_ID,
        REFERRER_ID,
        COMPANY,
        COMPANY_DOMAIN,
        COMPANY_INDUSTRY,
        APPROVAL,
        APPROVED_AT,
        APPROVED_BY,
    ],
    lazy_columns: &[ARCHIVED, ARCHIVED_AT, ARCHIVED_BY],
    list: ListProfile {
        search_fields: &[COMPANY_ID, REFERRER_ID, COMPANY, COMPANY_DOMAIN],
        filter_fields: &[REFERRER_ID, APPROVAL],
        required_fields: &[REFERRER_ID, COMPANY],
        status_column: APPROVAL,
        created_column: TIMESTAMP,
        priority: None,
        eligibility: None,
    },
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_approval_parse() {
        assert_eq!(Approval::parse(" Approved "), Approval::Approved);
        assert_eq!(Approval::parse("rejected"), Approval::Denied);
        assert_eq!(Approval::parse(""), Approval::Pending);
        assert_eq!(Approval::parse("maybe"), Approval::Pending);
        assert_eq!(Approval::Denied.to_string(), "denied");
    }
}
