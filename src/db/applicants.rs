//! Applicant operations.

use std::ops::Deref;

use chrono::{DateTime, Utc};
use serde_json::Value;

use super::api::{EntityHandle, StoreError, StoreResult};
use crate::engine::{Eligibility, Identity, PatchOutcome, UpsertOutcome};
use crate::entities::applicant::{
    self, EMAIL, ELIGIBILITY, IDENTITY, PENDING_UPDATE_COLUMNS, PENDING_UPDATE_EXPIRY,
    PENDING_UPDATE_PAYLOAD, PENDING_UPDATE_TOKEN_HASH, SECRET_HASH,
};
use crate::record::{FieldMap, Patch, Record};
use crate::storage::StorageError;

/// A staged update claimed with its token.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingUpdate {
    pub applicant_id: String,
    pub fields: FieldMap,
}

/// Applicant handle.
#[derive(Clone, Copy)]
pub struct Applicants<'a> {
    base: EntityHandle<'a>,
}

impl<'a> Deref for Applicants<'a> {
    type Target = EntityHandle<'a>;

    fn deref(&self) -> &Self::Target {
        &self.base
    }
}

impl<'a> Applicants<'a> {
    pub(crate) fn new(base: EntityHandle<'a>) -> Self {
        Self { base }
    }

    /// Create or update the applicant registered under the submitted email.
    ///
    /// A stored identifier that predates the canonical format is replaced
    /// and kept in the legacy column.
    pub async fn upsert_by_email(&self, fields: FieldMap) -> StoreResult<UpsertOutcome> {
        let email = fields
            .get(EMAIL)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|e| !e.is_empty())
            .ok_or(StoreError::MissingField(EMAIL))?
            .to_string();

        let kind = self.kind();
        let sheet = self.prepare().await?;
        let policy = kind.id_policy();
        Ok(self
            .crud()
            .upsert_by_key(&sheet, EMAIL, &email, fields, Some(&policy))
            .await?)
    }

    /// Existing applicant agreeing on at least two of name, email and phone.
    pub async fn find_by_two_of_three(
        &self,
        full_name: &str,
        email: &str,
        phone: &str,
    ) -> StoreResult<Option<Record>> {
        let sheet = self.kind().sheet_name()?;
        let candidate = Identity::new(full_name, email, phone);
        Ok(self
            .locator()
            .find_by_two_of_three(&sheet, &IDENTITY, &candidate)
            .await?)
    }

    pub async fn set_secret_hash(&self, id: &str, hash: &str) -> StoreResult<PatchOutcome> {
        self.prepare_with(&[SECRET_HASH]).await?;
        self.patch(id, &Patch::new().set(SECRET_HASH, hash)).await
    }

    /// Stage an update to apply once the applicant confirms it.
    ///
    /// Staging again replaces whatever was staged before.
    pub async fn stage_pending_update(
        &self,
        id: &str,
        token_hash: &str,
        expires_at: DateTime<Utc>,
        payload: &FieldMap,
    ) -> StoreResult<PatchOutcome> {
        self.prepare_with(&PENDING_UPDATE_COLUMNS).await?;
        let payload = serde_json::to_string(payload).map_err(StorageError::from)?;
        let patch = Patch::new()
            .set(PENDING_UPDATE_TOKEN_HASH, token_hash)
            .set(PENDING_UPDATE_EXPIRY, expires_at.to_rfc3339())
            .set(PENDING_UPDATE_PAYLOAD, payload);
        self.patch(id, &patch).await
    }

    /// Claim a staged update by token hash.
    ///
    /// The staged columns are cleared whether or not the token has expired,
    /// so a token works at most once. Returns `None` for unknown, expired or
    /// unreadable updates.
    pub async fn take_pending_update(
        &self,
        token_hash: &str,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<PendingUpdate>> {
        if token_hash.trim().is_empty() {
            return Ok(None);
        }
        let sheet = self.prepare_with(&PENDING_UPDATE_COLUMNS).await?;
        let Some(record) = self
            .locator()
            .find_row(&sheet, PENDING_UPDATE_TOKEN_HASH, token_hash)
            .await?
        else {
            return Ok(None);
        };
        let applicant_id = record.get(applicant::APPLICANT_ID).to_string();

        // keyed on the hash, not the id: legacy rows may have a blank or shared id
        let clear = PENDING_UPDATE_COLUMNS
            .iter()
            .fold(Patch::new(), |patch, column| patch.clear(*column));
        self.crud()
            .patch_by_identifier(&sheet, PENDING_UPDATE_TOKEN_HASH, token_hash, &clear)
            .await?;

        let expired = DateTime::parse_from_rfc3339(record.get(PENDING_UPDATE_EXPIRY))
            .map(|t| t.with_timezone(&Utc) <= now)
            .unwrap_or(true);
        if expired {
            tracing::debug!("pending update for {} expired", applicant_id);
            return Ok(None);
        }

        match serde_json::from_str::<FieldMap>(record.get(PENDING_UPDATE_PAYLOAD)) {
            Ok(fields) => Ok(Some(PendingUpdate {
                applicant_id,
                fields,
            })),
            Err(e) => {
                tracing::warn!("unreadable pending update for {}: {}", applicant_id, e);
                Ok(None)
            }
        }
    }

    pub fn eligibility(&self, record: &Record) -> Eligibility {
        ELIGIBILITY.evaluate(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{ReferralStore, StoreConfig};
    use crate::engine::{EligibilityReason, ListOptions};
    use crate::entities::applicant::{
        FAMILY_NAME, FIRST_NAME, LEGACY_APPLICANT_ID, LOCATED_IN_CANADA, PHONE,
    };
    use crate::storage::{InMemoryBackend, SheetName, TabularBackend};
    use chrono::Duration;
    use serde_json::json;
    use std::sync::Arc;

    fn store() -> (InMemoryBackend, ReferralStore) {
        let backend = InMemoryBackend::new();
        let store = ReferralStore::new(Arc::new(backend.clone()), StoreConfig::new("test")).unwrap();
        (backend, store)
    }

    fn fields(pairs: &[(&str, &str)]) -> FieldMap {
        pairs.iter().map(|(k, v)| (k.to_string(), json!(v))).collect()
    }

    #[tokio::test]
    async fn test_upsert_by_email() {
        let (_backend, store) = store();
        let applicants = store.applicants();

        let created = applicants
            .upsert_by_email(fields(&[(EMAIL, "ada@example.com"), (FIRST_NAME, "Ada")]))
            .await
            .unwrap();
        assert!(!created.updated);
        assert_eq!(created.id, "APL0000000001");

        let updated = applicants
            .upsert_by_email(fields(&[(EMAIL, " ADA@example.com "), (FAMILY_NAME, "Lovelace")]))
            .await
            .unwrap();
        assert!(updated.updated);
        assert_eq!(updated.id, created.id);

        let record = applicants.get(&created.id).await.unwrap().unwrap();
        assert_eq!(record.get(FIRST_NAME), "Ada");
        assert_eq!(record.get(FAMILY_NAME), "Lovelace");
        assert_eq!(applicants.list(&ListOptions::new()).await.unwrap().total, 1);
    }

    #[tokio::test]
    async fn test_upsert_requires_email() {
        let (_backend, store) = store();
        let result = store.applicants().upsert_by_email(fields(&[(FIRST_NAME, "Ada")])).await;
        assert!(matches!(result, Err(StoreError::MissingField(EMAIL))));
    }

    #[tokio::test]
    async fn test_upsert_replaces_legacy_id() {
        let (backend, store) = store();
        store.bootstrap().await.unwrap();
        let sheet = SheetName::new("Applicants").unwrap();
        let header = store.schema().headers(&sheet).await.unwrap();
        let mut row = vec![json!(""); header.width()];
        row[header.position(applicant::APPLICANT_ID).unwrap()] = json!("A-17");
        row[header.position(EMAIL).unwrap()] = json!("old@example.com");
        backend.append_row(&sheet, row).await.unwrap();

        let outcome = store
            .applicants()
            .upsert_by_email(fields(&[(EMAIL, "old@example.com")]))
            .await
            .unwrap();
        assert!(outcome.updated);
        assert_eq!(outcome.id, "APL0000000001");
        assert_eq!(outcome.replaced_id.as_deref(), Some("A-17"));

        let record = store.applicants().get("APL0000000001").await.unwrap().unwrap();
        assert_eq!(record.get(LEGACY_APPLICANT_ID), "A-17");
    }

    #[tokio::test]
    async fn test_find_by_two_of_three() {
        let (_backend, store) = store();
        let applicants = store.applicants();
        applicants
            .create(fields(&[
                (FIRST_NAME, "Ada"),
                (FAMILY_NAME, "Lovelace"),
                (EMAIL, "ada@example.com"),
                (PHONE, "555-010-0001"),
            ]))
            .await
            .unwrap();

        let hit = applicants
            .find_by_two_of_three("Ada Lovelace", "ada@example.com", "555-999-0000")
            .await
            .unwrap();
        assert!(hit.is_some());

        let miss = applicants
            .find_by_two_of_three("Someone Else", "else@example.com", "+1 555 010 0001")
            .await
            .unwrap();
        assert!(miss.is_none());
    }

    #[tokio::test]
    async fn test_pending_update_is_single_use() {
        let (_backend, store) = store();
        let applicants = store.applicants();
        let id = applicants.create(fields(&[(FIRST_NAME, "Ada")])).await.unwrap();
        let now = Utc::now();

        let payload = fields(&[(PHONE, "555-010-0002")]);
        assert!(applicants
            .stage_pending_update(&id, "h1", now + Duration::hours(1), &payload)
            .await
            .unwrap()
            .is_updated());

        let taken = applicants.take_pending_update("h1", now).await.unwrap().unwrap();
        assert_eq!(taken.applicant_id, id);
        assert_eq!(taken.fields, payload);
        assert!(applicants.take_pending_update("h1", now).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_pending_update_single_use_without_unique_id() {
        let (_backend, store) = store();
        let applicants = store.applicants();
        let now = Utc::now();
        let sheet = applicants.prepare_with(&PENDING_UPDATE_COLUMNS).await.unwrap();

        let id = applicants
            .create(fields(&[(FIRST_NAME, "Ada"), (EMAIL, "ada@example.com")]))
            .await
            .unwrap();
        applicants
            .create(fields(&[
                (applicant::APPLICANT_ID, id.as_str()),
                (EMAIL, "dup@example.com"),
            ]))
            .await
            .unwrap();
        applicants
            .crud()
            .append(&sheet, &fields(&[(EMAIL, "legacy@example.com")]))
            .await
            .unwrap();

        let payload = serde_json::to_string(&fields(&[(PHONE, "555")])).unwrap();
        for (email, hash) in [("dup@example.com", "h-dup"), ("legacy@example.com", "h-blank")] {
            let staged = Patch::new()
                .set(PENDING_UPDATE_TOKEN_HASH, hash)
                .set(PENDING_UPDATE_EXPIRY, (now + Duration::hours(1)).to_rfc3339())
                .set(PENDING_UPDATE_PAYLOAD, payload.as_str());
            applicants
                .crud()
                .patch_by_identifier(&sheet, EMAIL, email, &staged)
                .await
                .unwrap();
        }

        let taken = applicants.take_pending_update("h-dup", now).await.unwrap().unwrap();
        assert_eq!(taken.applicant_id, id);
        assert!(applicants.take_pending_update("h-dup", now).await.unwrap().is_none());

        let taken = applicants.take_pending_update("h-blank", now).await.unwrap().unwrap();
        assert_eq!(taken.applicant_id, "");
        assert!(applicants.take_pending_update("h-blank", now).await.unwrap().is_none());

        let legacy = applicants.find_by(EMAIL, "legacy@example.com").await.unwrap().unwrap();
        assert!(legacy.is_blank(PENDING_UPDATE_PAYLOAD));
    }

    #[tokio::test]
    async fn test_expired_pending_update() {
        let (_backend, store) = store();
        let applicants = store.applicants();
        let id = applicants.create(fields(&[(FIRST_NAME, "Ada")])).await.unwrap();
        let now = Utc::now();

        applicants
            .stage_pending_update(&id, "h2", now - Duration::minutes(1), &FieldMap::new())
            .await
            .unwrap();
        assert!(applicants.take_pending_update("h2", now).await.unwrap().is_none());

        let record = applicants.get(&id).await.unwrap().unwrap();
        assert!(record.is_blank(PENDING_UPDATE_TOKEN_HASH));
    }

    #[tokio::test]
    async fn test_secret_hash_and_eligibility() {
        let (_backend, store) = store();
        let applicants = store.applicants();
        let id = applicants
            .create(fields(&[(FIRST_NAME, "Ada"), (LOCATED_IN_CANADA, "Yes")]))
            .await
            .unwrap();

        assert!(applicants.set_secret_hash(&id, "abc").await.unwrap().is_updated());
        let record = applicants.get(&id).await.unwrap().unwrap();
        assert_eq!(record.get(SECRET_HASH), "abc");
        assert_eq!(
            applicants.eligibility(&record).reason,
            Some(EligibilityReason::LocatedInRegion)
        );
    }
}
