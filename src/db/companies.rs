//! Referrer company links.

use std::ops::Deref;

use chrono::Utc;
use serde_json::json;

use super::api::{EntityHandle, StoreResult};
use crate::engine::{normalize_key, PatchOutcome};
use crate::entities::company::{
    Approval, APPROVAL, APPROVED_AT, APPROVED_BY, COMPANY, COMPANY_DOMAIN, COMPANY_INDUSTRY,
    COMPANY_ID, REFERRER_ID,
};
use crate::record::{FieldMap, Patch, Record};

/// Referrer company handle.
#[derive(Clone, Copy)]
pub struct Companies<'a> {
    base: EntityHandle<'a>,
}

impl<'a> Deref for Companies<'a> {
    type Target = EntityHandle<'a>;

    fn deref(&self) -> &Self::Target {
        &self.base
    }
}

impl<'a> Companies<'a> {
    pub(crate) fn new(base: EntityHandle<'a>) -> Self {
        Self { base }
    }

    /// Link a referrer to a company, pending approval.
    ///
    /// Linking the same company to the same referrer again returns the
    /// existing link's id instead of adding a row.
    pub async fn link(
        &self,
        referrer_id: &str,
        company: &str,
        domain: &str,
        industry: &str,
    ) -> StoreResult<String> {
        let wanted = normalize_key(company);
        let existing = self
            .for_referrer(referrer_id)
            .await?
            .into_iter()
            .find(|r| normalize_key(r.get(COMPANY)) == wanted);
        if let Some(record) = existing {
            return Ok(record.get(COMPANY_ID).to_string());
        }

        let mut fields = FieldMap::new();
        fields.insert(REFERRER_ID.to_string(), json!(referrer_id.trim()));
        fields.insert(COMPANY.to_string(), json!(company.trim()));
        fields.insert(COMPANY_DOMAIN.to_string(), json!(domain.trim()));
        fields.insert(COMPANY_INDUSTRY.to_string(), json!(industry.trim()));
        fields.insert(APPROVAL.to_string(), json!(Approval::Pending.as_str()));
        self.create(fields).await
    }

    /// Active links of one referrer, oldest first.
    pub async fn for_referrer(&self, referrer_id: &str) -> StoreResult<Vec<Record>> {
        let sheet = self.kind().sheet_name()?;
        Ok(self
            .locator()
            .find_all(&sheet, REFERRER_ID, referrer_id)
            .await?
            .into_iter()
            .filter(|r| !r.is_archived())
            .collect())
    }

    /// Record a review decision. Moving back to pending clears who decided.
    pub async fn set_approval(
        &self,
        id: &str,
        approval: Approval,
        actor: &str,
    ) -> StoreResult<PatchOutcome> {
        let patch = Patch::new().set(APPROVAL, approval.as_str());
        let patch = if approval.is_resolved() {
            patch
                .set(APPROVED_AT, Utc::now().to_rfc3339())
                .set(APPROVED_BY, actor)
        } else {
            patch.clear(APPROVED_AT).clear(APPROVED_BY)
        };
        self.patch(id, &patch).await
    }
}
