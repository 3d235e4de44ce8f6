//! Referrer operations.

use std::collections::BTreeMap;
use std::ops::Deref;

use chrono::Utc;
use serde_json::Value;

use super::api::{EntityHandle, StoreError, StoreResult};
use crate::engine::{PatchOutcome, UpsertOutcome};
use crate::entities::referrer::{
    PendingEdit, EMAIL, PENDING_UPDATES, PORTAL_TOKEN_VERSION, REFERRER_ID,
};
use crate::entities::TIMESTAMP;
use crate::record::{FieldMap, JsonLog, Patch};

/// Referrer handle.
#[derive(Clone, Copy)]
pub struct Referrers<'a> {
    base: EntityHandle<'a>,
}

impl<'a> Deref for Referrers<'a> {
    type Target = EntityHandle<'a>;

    fn deref(&self) -> &Self::Target {
        &self.base
    }
}

impl<'a> Referrers<'a> {
    pub(crate) fn new(base: EntityHandle<'a>) -> Self {
        Self { base }
    }

    /// Create or update the referrer registered under the submitted email.
    pub async fn upsert_by_email(&self, fields: FieldMap) -> StoreResult<UpsertOutcome> {
        let email = fields
            .get(EMAIL)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|e| !e.is_empty())
            .ok_or(StoreError::MissingField(EMAIL))?
            .to_string();

        let sheet = self.prepare().await?;
        let policy = self.kind().id_policy();
        Ok(self
            .crud()
            .upsert_by_key(&sheet, EMAIL, &email, fields, Some(&policy))
            .await?)
    }

    /// Queue a profile change for review. Returns the proposal's id, or
    /// `None` when no referrer carries `id`.
    pub async fn propose_edit(
        &self,
        id: &str,
        fields: BTreeMap<String, String>,
    ) -> StoreResult<Option<String>> {
        self.prepare_with(&[PENDING_UPDATES]).await?;
        let Some(record) = self.get(id).await? else {
            return Ok(None);
        };

        let mut log = JsonLog::<PendingEdit>::decode(record.get(PENDING_UPDATES));
        let edit = PendingEdit::new(fields, Utc::now());
        let edit_id = edit.id.clone();
        log.push(edit);

        self.patch(id, &Patch::new().set(PENDING_UPDATES, log.encode()))
            .await?;
        tracing::debug!("queued edit {} for referrer {}", edit_id, id);
        Ok(Some(edit_id))
    }

    /// Close out pending proposals.
    ///
    /// With `apply`, the latest proposal's fields are written to the record
    /// first; identity and bookkeeping columns in a proposal are ignored.
    /// Either way the log is cleared.
    pub async fn resolve_edits(&self, id: &str, apply: bool) -> StoreResult<PatchOutcome> {
        let Some(record) = self.get(id).await? else {
            return Ok(PatchOutcome::NotFound);
        };
        let log = JsonLog::<PendingEdit>::decode(record.get(PENDING_UPDATES));
        if log.is_empty() && record.is_blank(PENDING_UPDATES) {
            return Ok(PatchOutcome::NoChanges);
        }

        let mut patch = Patch::new();
        if apply {
            if let Some(latest) = log.last() {
                for (column, value) in &latest.fields {
                    if [REFERRER_ID, PENDING_UPDATES, TIMESTAMP].contains(&column.as_str()) {
                        continue;
                    }
                    patch = patch.set(column.as_str(), value.as_str());
                }
            }
        }
        let patch = patch.clear(PENDING_UPDATES);
        self.patch(id, &patch).await
    }

    /// Increment the portal token version, invalidating every portal link
    /// issued before. Returns the new version.
    pub async fn bump_portal_token_version(&self, id: &str) -> StoreResult<Option<u64>> {
        self.prepare_with(&[PORTAL_TOKEN_VERSION]).await?;
        let Some(record) = self.get(id).await? else {
            return Ok(None);
        };

        let current = record.get(PORTAL_TOKEN_VERSION);
        let version = current.parse::<u64>().unwrap_or_else(|_| {
            if !current.is_empty() {
                tracing::warn!("resetting unreadable token version {:?} of {}", current, id);
            }
            0
        }) + 1;

        self.patch(id, &Patch::new().set(PORTAL_TOKEN_VERSION, version))
            .await?;
        Ok(Some(version))
    }
}
