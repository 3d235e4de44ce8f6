//! Applications: an applicant asking a referrer for a referral to one position.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::engine::{IdScheme, ListProfile, LAST_UPDATED};
use crate::record::{ARCHIVED, ARCHIVED_AT, ARCHIVED_BY};

use super::{EntityKind, STATUS, TIMESTAMP};

pub const APPLICATION_ID: &str = "Application ID";
pub const APPLICANT_ID: &str = "Applicant ID";
pub const REFERRER_ID: &str = "Referrer ID";
pub const COMPANY: &str = "Company";
pub const POSITION: &str = "Position";
pub const REFERENCE_NUMBER: &str = "Reference Number";
pub const MEETING_DATE: &str = "Meeting Date";
pub const MEETING_TIME: &str = "Meeting Time";
pub const MEETING_TIMEZONE: &str = "Meeting Timezone";
pub const MEETING_URL: &str = "Meeting URL";
pub const ACTION_HISTORY: &str = "Action History";

pub const SCHEDULE_TOKEN_HASH: &str = "Schedule Token Hash";
pub const SCHEDULE_TOKEN_EXPIRY: &str = "Schedule Token Expiry";
pub const RESCHEDULE_TOKEN_HASH: &str = "Reschedule Token Hash";
pub const RESCHEDULE_TOKEN_EXPIRY: &str = "Reschedule Token Expiry";
pub const FEEDBACK_TOKEN_HASH: &str = "Feedback Token Hash";
pub const FEEDBACK_TOKEN_EXPIRY: &str = "Feedback Token Expiry";

/// One entry of an application's action history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionEntry {
    pub action: String,
    pub actor: String,
    pub at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl ActionEntry {
    pub fn new(action: impl Into<String>, actor: impl Into<String>, at: DateTime<Utc>) -> Self {
        Self {
            action: action.into(),
            actor: actor.into(),
            at,
            note: None,
        }
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }
}

/// A scheduled meeting between applicant and referrer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Meeting {
    /// `YYYY-MM-DD`
    pub date: String,
    /// `HH:MM`
    pub time: String,
    pub timezone: String,
    pub url: String,
}

/// Single-use links issued for an application.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Schedule,
    Reschedule,
    Feedback,
}

impl TokenKind {
    pub fn hash_column(&self) -> &'static str {
        match self {
            TokenKind::Schedule => SCHEDULE_TOKEN_HASH,
            TokenKind::Reschedule => RESCHEDULE_TOKEN_HASH,
            TokenKind::Feedback => FEEDBACK_TOKEN_HASH,
        }
    }

    pub fn expiry_column(&self) -> &'static str {
        match self {
            TokenKind::Schedule => SCHEDULE_TOKEN_EXPIRY,
            TokenKind::Reschedule => RESCHEDULE_TOKEN_EXPIRY,
            TokenKind::Feedback => FEEDBACK_TOKEN_EXPIRY,
        }
    }

    pub fn columns(&self) -> [&'static str; 2] {
        [self.hash_column(), self.expiry_column()]
    }
}

pub const APPLICATIONS: EntityKind = EntityKind {
    name: "applications",
    sheet: "Applications",
    id_column: APPLICATION_ID,
    id_scheme: IdScheme::Random {
        prefix: "APP-",
        length: 10,
    },
    legacy_id_column: None,
    headers: &[
        TIMESTAMP,
        APPLICATION_ID,
        APPLICANT_ID,
        REFERRER_ID,
        COMPANY,
        POSITION,
        REFERENCE_NUMBER,
        STATUS,
        MEETING_DATE,
        MEETING_TIME,
        MEETING_TIMEZONE,
        MEETING_URL,
        ACTION_HISTORY,
    ],
    lazy_columns: &[
        SCHEDULE_TOKEN_HASH,
        SCHEDULE_TOKEN_EXPIRY,
        RESCHEDULE_TOKEN_HASH,
        RESCHEDULE_TOKEN_EXPIRY,
        FEEDBACK_TOKEN_HASH,
        FEEDBACK_TOKEN_EXPIRY,
        LAST_UPDATED,
        ARCHIVED,
        ARCHIVED_AT,
        ARCHIVED_BY,
    ],
    list: ListProfile {
        search_fields: &[
            APPLICATION_ID,
            APPLICANT_ID,
            REFERRER_ID,
            COMPANY,
            POSITION,
            REFERENCE_NUMBER,
        ],
        filter_fields: &[STATUS, APPLICANT_ID, REFERRER_ID],
        required_fields: &[APPLICANT_ID, COMPANY, POSITION],
        status_column: STATUS,
        created_column: TIMESTAMP,
        priority: None,
        eligibility: None,
    },
};
