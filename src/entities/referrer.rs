//! Referrers: people offering referrals at their company.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ulid::Ulid;

use crate::engine::{IdScheme, ListProfile, LAST_UPDATED};
use crate::record::{JsonLog, Record, ARCHIVED, ARCHIVED_AT, ARCHIVED_BY};

use super::company::Approval;
use super::{EntityKind, STATUS, TIMESTAMP};

pub const REFERRER_ID: &str = "Referrer ID";
pub const NAME: &str = "Name";
pub const EMAIL: &str = "Email";
pub const PHONE: &str = "Phone";
pub const COMPANY: &str = "Company";
pub const COMPANY_INDUSTRY: &str = "Company Industry";
pub const POSITION: &str = "Position";
pub const LINKEDIN: &str = "LinkedIn";
pub const COMPANY_APPROVAL: &str = "Company Approval";
pub const NOTES: &str = "Notes";

pub const PORTAL_TOKEN_VERSION: &str = "Portal Token Version";
pub const PENDING_UPDATES: &str = "Pending Updates";
pub const LEGACY_REFERRER_ID: &str = "Legacy Referrer ID";

/// A proposed change to a referrer's profile awaiting review.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingEdit {
    pub id: String,
    pub submitted_at: DateTime<Utc>,
    pub fields: BTreeMap<String, String>,
}

impl PendingEdit {
    pub fn new(fields: BTreeMap<String, String>, submitted_at: DateTime<Utc>) -> Self {
        Self {
            id: Ulid::new().to_string(),
            submitted_at,
            fields,
        }
    }
}

/// Unresolved company approval or an open edit proposal.
pub fn needs_review(record: &Record) -> bool {
    let approval = Approval::parse(record.get(COMPANY_APPROVAL));
    !approval.is_resolved()
        || !JsonLog::<PendingEdit>::decode(record.get(PENDING_UPDATES)).is_empty()
}

pub const REFERRERS: EntityKind = EntityKind {
    name: "referrers",
    sheet: "Referrers",
    id_column: REFERRER_ID,
    id_scheme: IdScheme::Sequential {
        prefix: "REF",
        width: 10,
    },
    legacy_id_column: Some(LEGACY_REFERRER_ID),
    headers: &[
        TIMESTAMP,
        REFERRER_ID,
        NAME,
        EMAIL,
        PHONE,
        COMPANY,
        COMPANY_INDUSTRY,
        POSITION,
        LINKEDIN,
        COMPANY_APPROVAL,
        STATUS,
        NOTES,
    ],
    lazy_columns: &[
        PORTAL_TOKEN_VERSION,
        PENDING_UPDATES,
        LEGACY_REFERRER_ID,
        LAST_UPDATED,
        ARCHIVED,
        ARCHIVED_AT,
        ARCHIVED_BY,
    ],
    list: ListProfile {
        search_fields: &[REFERRER_ID, NAME, EMAIL, COMPANY, POSITION],
        filter_fields: &[STATUS, COMPANY_APPROVAL, COMPANY_INDUSTRY],
        required_fields: &[NAME, EMAIL, COMPANY],
        status_column: STATUS,
        created_column: TIMESTAMP,
        priority: Some(needs_review),
        eligibility: None,
    },
};
