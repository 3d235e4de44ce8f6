//! Applicants: people looking for a referral.

use crate::engine::{EligibilityRule, IdScheme, IdentityColumns, ListProfile, LAST_UPDATED};
use crate::record::{ARCHIVED, ARCHIVED_AT, ARCHIVED_BY};

use super::{EntityKind, STATUS, TIMESTAMP};

pub const APPLICANT_ID: &str = "Applicant ID";
pub const FIRST_NAME: &str = "First Name";
pub const MIDDLE_NAME: &str = "Middle Name";
pub const FAMILY_NAME: &str = "Family Name";
pub const EMAIL: &str = "Email";
pub const PHONE: &str = "Phone";
pub const LOCATED_IN_CANADA: &str = "Located in Canada";
pub const PROVINCE: &str = "Province";
pub const ELIGIBLE_TO_MOVE: &str = "Eligible to Move (Canada)";
pub const AUTHORIZED_TO_WORK: &str = "Authorized to Work";
pub const INDUSTRY: &str = "Industry";
pub const EMPLOYMENT_STATUS: &str = "Employment Status";
pub const RESUME_FILE: &str = "Resume File";
pub const NOTES: &str = "Notes";

// security columns, added lazily
pub const SECRET_HASH: &str = "Secret Hash";
pub const PENDING_UPDATE_TOKEN_HASH: &str = "Pending Update Token Hash";
pub const PENDING_UPDATE_EXPIRY: &str = "Pending Update Expiry";
pub const PENDING_UPDATE_PAYLOAD: &str = "Pending Update Payload";
pub const REGISTRATION_STATUS: &str = "Registration Status";
pub const LEGACY_APPLICANT_ID: &str = "Legacy Applicant ID";

/// Columns holding a staged self-service update.
pub const PENDING_UPDATE_COLUMNS: [&str; 3] = [
    PENDING_UPDATE_TOKEN_HASH,
    PENDING_UPDATE_EXPIRY,
    PENDING_UPDATE_PAYLOAD,
];

pub const IDENTITY: IdentityColumns = IdentityColumns {
    name_parts: &[FIRST_NAME, MIDDLE_NAME, FAMILY_NAME],
    email: EMAIL,
    phone: PHONE,
};

pub const ELIGIBILITY: EligibilityRule = EligibilityRule {
    located_column: LOCATED_IN_CANADA,
    relocate_column: ELIGIBLE_TO_MOVE,
};

pub const APPLICANTS: EntityKind = EntityKind {
    name: "applicants",
    sheet: "Applicants",
    id_column: APPLICANT_ID,
    id_scheme: IdScheme::Sequential {
        prefix: "APL",
        width: 10,
    },
    legacy_id_column: Some(LEGACY_APPLICANT_ID),
    headers: &[
        TIMESTAMP,
        APPLICANT_ID,
        FIRST_NAME,
        MIDDLE_NAME,
        FAMILY_NAME,
        EMAIL,
        PHONE,
        LOCATED_IN_CANADA,
        PROVINCE,
        ELIGIBLE_TO_MOVE,
        AUTHORIZED_TO_WORK,
        INDUSTRY,
        EMPLOYMENT_STATUS,
        RESUME_FILE,
        STATUS,
        NOTES,
    ],
    lazy_columns: &[
        SECRET_HASH,
        PENDING_UPDATE_TOKEN_HASH,
        PENDING_UPDATE_EXPIRY,
        PENDING_UPDATE_PAYLOAD,
        REGISTRATION_STATUS,
        LEGACY_APPLICANT_ID,
        LAST_UPDATED,
        ARCHIVED,
        ARCHIVED_AT,
        ARCHIVED_BY,
    ],
    list: ListProfile {
        search_fields: &[APPLICANT_ID, FIRST_NAME, FAMILY_NAME, EMAIL, PHONE, INDUSTRY],
        filter_fields: &[
            STATUS,
            PROVINCE,
            LOCATED_IN_CANADA,
            ELIGIBLE_TO_MOVE,
            REGISTRATION_STATUS,
        ],
        required_fields: &[
            FIRST_NAME,
            FAMILY_NAME,
            EMAIL,
            PHONE,
            LOCATED_IN_CANADA,
            AUTHORIZED_TO_WORK,
        ],
        status_column: STATUS,
        created_column: TIMESTAMP,
        priority: None,
        eligibility: Some(ELIGIBILITY),
    },
};
