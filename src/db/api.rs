//! Store API - high-level interface for the referral store.

use std::sync::Arc;

use serde_json::Value;
use sha2::{Digest, Sha256};
use thiserror::Error;

use super::config::{ConfigError, StoreConfig};
use crate::catalog::{SchemaError, SchemaManager, SheetStatus};
use crate::engine::{
    CrudEngine, EngineError, IdGenerator, ListOptions, ListResult, PatchOutcome, QueryEngine,
    RowLocator,
};
use crate::entities::{self, EntityKind, TIMESTAMP};
use crate::record::{FieldMap, Patch, Record};
use crate::storage::{InvalidNameError, SheetName, StorageError, TabularBackend};

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Store errors.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("engine error: {0}")]
    Engine(#[from] EngineError),

    #[error("schema error: {0}")]
    Schema(#[from] SchemaError),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("invalid sheet name: {0}")]
    InvalidSheetName(#[from] InvalidNameError),

    #[error("missing required field: {0}")]
    MissingField(&'static str),
}

impl StoreError {
    /// Check if the caller may retry the operation.
    pub fn is_retryable(&self) -> bool {
        match self {
            StoreError::Engine(e) => e.is_retryable(),
            StoreError::Schema(e) => e.is_retriable(),
            StoreError::Storage(e) => e.is_retriable(),
            StoreError::Config(_) | StoreError::InvalidSheetName(_) | StoreError::MissingField(_) => {
                false
            }
        }
    }
}

/// SHA-256 of a raw token, hex encoded. Only hashes are ever stored.
pub fn hash_token(raw: &str) -> String {
    let digest = Sha256::digest(raw.trim().as_bytes());
    format!("{:x}", digest)
}

/// What bootstrap did for one entity sheet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BootstrapReport {
    pub entity: &'static str,
    pub status: SheetStatus,
    pub added_columns: Vec<String>,
}

/// The referral store handle.
///
/// One store owns one header cache; two stores over the same backend do
/// not see each other's schema writes until they refresh.
pub struct ReferralStore {
    config: StoreConfig,
    schema: Arc<SchemaManager>,
    crud: CrudEngine,
    query: QueryEngine,
}

impl ReferralStore {
    /// Create a store over a backend. Fails fast on unusable configuration.
    pub fn new(backend: Arc<dyn TabularBackend>, config: StoreConfig) -> StoreResult<Self> {
        config.validate()?;

        let schema = Arc::new(
            SchemaManager::new(backend).with_header_formatting(config.format_headers),
        );
        let ids = IdGenerator::new(schema.clone(), config.random_id_attempts);
        let crud = CrudEngine::new(schema.clone(), ids).with_created_column(TIMESTAMP);
        let query = QueryEngine::new(RowLocator::new(schema.clone()), config.default_page_size);
        tracing::debug!("opened referral store for {}", config.target);

        Ok(Self {
            config,
            schema,
            crud,
            query,
        })
    }

    /// Create every entity sheet and column. Safe to run any number of times.
    pub async fn bootstrap(&self) -> StoreResult<Vec<BootstrapReport>> {
        let mut reports = Vec::with_capacity(entities::ALL.len());
        for kind in entities::ALL {
            let sheet = kind.sheet_name()?;
            let status = self.schema.ensure_sheet(&sheet, kind.headers).await?;
            let added_columns = self.schema.ensure_columns(&sheet, &kind.all_columns()).await?;
            if status != SheetStatus::Unchanged || !added_columns.is_empty() {
                tracing::info!("bootstrapped {}: {:?}, added {:?}", kind.sheet, status, added_columns);
            }
            reports.push(BootstrapReport {
                entity: kind.name,
                status,
                added_columns,
            });
        }
        Ok(reports)
    }

    /// Get the configuration.
    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub fn schema(&self) -> &SchemaManager {
        &self.schema
    }

    /// Generic handle for any entity kind.
    pub fn entity(&self, kind: &'static EntityKind) -> EntityHandle<'_> {
        EntityHandle { store: self, kind }
    }

    pub fn applicants(&self) -> super::Applicants<'_> {
        super::Applicants::new(self.entity(&entities::APPLICANTS))
    }

    pub fn referrers(&self) -> super::Referrers<'_> {
        super::Referrers::new(self.entity(&entities::REFERRERS))
    }

    pub fn companies(&self) -> super::Companies<'_> {
        super::Companies::new(self.entity(&entities::COMPANIES))
    }

    pub fn applications(&self) -> super::Applications<'_> {
        super::Applications::new(self.entity(&entities::APPLICATIONS))
    }
}

/// Record operations shared by every entity kind.
#[derive(Clone, Copy)]
pub struct EntityHandle<'a> {
    store: &'a ReferralStore,
    kind: &'static EntityKind,
}

impl<'a> EntityHandle<'a> {
    pub fn kind(&self) -> &'static EntityKind {
        self.kind
    }

    pub(crate) fn crud(&self) -> &'a CrudEngine {
        &self.store.crud
    }

    pub(crate) fn locator(&self) -> &'a RowLocator {
        self.store.crud.locator()
    }

    /// The entity's sheet with its base header row in place.
    pub(crate) async fn prepare(&self) -> StoreResult<SheetName> {
        let sheet = self.kind.sheet_name()?;
        self.store.schema.ensure_columns(&sheet, self.kind.headers).await?;
        Ok(sheet)
    }

    /// Like `prepare`, also adding optional columns a feature needs.
    pub(crate) async fn prepare_with(&self, extra: &[&str]) -> StoreResult<SheetName> {
        let sheet = self.prepare().await?;
        self.store.schema.ensure_columns(&sheet, extra).await?;
        Ok(sheet)
    }

    /// Append a record and return its identifier.
    ///
    /// A canonical identifier in `fields` is kept; otherwise one is minted.
    /// The new identifier is re-checked after the write and a duplicate is
    /// logged, since concurrent creators can race to the same value.
    pub async fn create(&self, mut fields: FieldMap) -> StoreResult<String> {
        let sheet = self.prepare().await?;
        let provided = fields
            .get(self.kind.id_column)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|id| self.kind.id_scheme.is_canonical(id))
            .map(str::to_string);
        let id = match provided {
            Some(id) => id,
            None => {
                self.crud()
                    .ids()
                    .generate(&sheet, self.kind.id_column, self.kind.id_scheme)
                    .await?
            }
        };
        fields.insert(self.kind.id_column.to_string(), Value::String(id.clone()));

        self.crud().append(&sheet, &fields).await?;
        if !self.is_unique(&id).await? {
            tracing::warn!("duplicate identifier {} in {}", id, self.kind.sheet);
        }
        Ok(id)
    }

    /// Record by identifier, archived or not.
    pub async fn get(&self, id: &str) -> StoreResult<Option<Record>> {
        self.find_by(self.kind.id_column, id).await
    }

    /// First record whose `column` matches `value`.
    ///
    /// A column the entity does not define and the sheet does not have is
    /// an error rather than a silent miss.
    pub async fn find_by(&self, column: &str, value: &str) -> StoreResult<Option<Record>> {
        let sheet = self.kind.sheet_name()?;
        if !self.kind.all_columns().contains(&column) {
            let header = self.store.schema.headers(&sheet).await?;
            if !header.is_blank() && !header.contains(column) {
                return Err(EngineError::UnknownColumn {
                    sheet: sheet.to_string(),
                    column: column.to_string(),
                }
                .into());
            }
        }
        Ok(self.locator().find_row(&sheet, column, value).await?)
    }

    pub async fn patch(&self, id: &str, patch: &Patch) -> StoreResult<PatchOutcome> {
        let sheet = self.kind.sheet_name()?;
        Ok(self
            .crud()
            .patch_by_identifier(&sheet, self.kind.id_column, id, patch)
            .await?)
    }

    pub async fn archive(&self, id: &str, actor: &str) -> StoreResult<PatchOutcome> {
        let sheet = self.prepare().await?;
        Ok(self.crud().archive(&sheet, self.kind.id_column, id, actor).await?)
    }

    pub async fn restore(&self, id: &str) -> StoreResult<PatchOutcome> {
        let sheet = self.kind.sheet_name()?;
        Ok(self.crud().restore(&sheet, self.kind.id_column, id).await?)
    }

    /// Physically remove a record.
    pub async fn delete(&self, id: &str) -> StoreResult<bool> {
        let sheet = self.kind.sheet_name()?;
        Ok(self.crud().hard_delete(&sheet, self.kind.id_column, id).await?)
    }

    pub async fn list(&self, options: &ListOptions) -> StoreResult<ListResult> {
        let sheet = self.kind.sheet_name()?;
        Ok(self.store.query.list(&sheet, &self.kind.list, options).await?)
    }

    /// A fresh canonical identifier; nothing is written.
    pub async fn next_id(&self) -> StoreResult<String> {
        let sheet = self.kind.sheet_name()?;
        Ok(self
            .crud()
            .ids()
            .generate(&sheet, self.kind.id_column, self.kind.id_scheme)
            .await?)
    }

    /// Whether at most one record carries `id`.
    pub async fn is_unique(&self, id: &str) -> StoreResult<bool> {
        let sheet = self.kind.sheet_name()?;
        let count = self
            .crud()
            .ids()
            .count_matches(&sheet, self.kind.id_column, id)
            .await?;
        Ok(count <= 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::applicant;
    use crate::storage::InMemoryBackend;
    use serde_json::json;

    fn store() -> (InMemoryBackend, ReferralStore) {
        let backend = InMemoryBackend::new();
        let store = ReferralStore::new(Arc::new(backend.clone()), StoreConfig::new("test")).unwrap();
        (backend, store)
    }

    fn fields(pairs: &[(&str, &str)]) -> FieldMap {
        pairs.iter().map(|(k, v)| (k.to_string(), json!(v))).collect()
    }

    #[test]
    fn test_new_rejects_blank_target() {
        let result = ReferralStore::new(Arc::new(InMemoryBackend::new()), StoreConfig::default());
        assert!(matches!(result, Err(StoreError::Config(ConfigError::Missing(_)))));
    }

    #[test]
    fn test_hash_token() {
        assert_eq!(
            hash_token("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
        assert_eq!(hash_token(" abc "), hash_token("abc"));
    }

    #[tokio::test]
    async fn test_bootstrap_is_idempotent() {
        let (backend, store) = store();
        let first = store.bootstrap().await.unwrap();
        assert_eq!(first.len(), 4);
        assert!(first.iter().all(|r| r.status == SheetStatus::Created));

        let writes = backend.write_calls();
        let second = store.bootstrap().await.unwrap();
        assert!(second
            .iter()
            .all(|r| r.status == SheetStatus::Unchanged && r.added_columns.is_empty()));
        assert_eq!(backend.write_calls(), writes);

        let sheet = entities::APPLICANTS.sheet_name().unwrap();
        let header = store.schema().headers(&sheet).await.unwrap();
        assert_eq!(header.width(), entities::APPLICANTS.all_columns().len());
    }

    #[tokio::test]
    async fn test_create_get_delete() {
        let (backend, store) = store();
        let applicants = store.entity(&entities::APPLICANTS);

        let first = applicants
            .create(fields(&[(applicant::FIRST_NAME, "Ada"), (applicant::EMAIL, "ada@example.com")]))
            .await
            .unwrap();
        let second = applicants
            .create(fields(&[(applicant::FIRST_NAME, "Alan")]))
            .await
            .unwrap();
        assert_eq!(first, "APL0000000001");
        assert_eq!(second, "APL0000000002");
        assert!(applicants.is_unique(&first).await.unwrap());

        let record = applicants.get(&first).await.unwrap().unwrap();
        assert_eq!(record.get(applicant::FIRST_NAME), "Ada");
        assert!(!record.get(TIMESTAMP).is_empty());

        let sheet = entities::APPLICANTS.sheet_name().unwrap();
        assert_eq!(backend.row_count(&sheet), Some(3));
        assert!(applicants.delete(&first).await.unwrap());
        assert_eq!(backend.row_count(&sheet), Some(2));
        assert!(applicants.get(&first).await.unwrap().is_none());
        assert_eq!(applicants.next_id().await.unwrap(), "APL0000000003");
    }

    #[tokio::test]
    async fn test_create_keeps_canonical_id() {
        let (_backend, store) = store();
        let applicants = store.entity(&entities::APPLICANTS);
        let id = applicants
            .create(fields(&[(applicant::APPLICANT_ID, "APL0000000040")]))
            .await
            .unwrap();
        assert_eq!(id, "APL0000000040");
        assert_eq!(applicants.next_id().await.unwrap(), "APL0000000041");
    }

    #[tokio::test]
    async fn test_archive_hides_from_list() {
        let (_backend, store) = store();
        let applicants = store.entity(&entities::APPLICANTS);
        let id = applicants.create(fields(&[(applicant::FIRST_NAME, "Ada")])).await.unwrap();
        applicants.create(fields(&[(applicant::FIRST_NAME, "Alan")])).await.unwrap();

        assert!(applicants.archive(&id, "admin").await.unwrap().is_updated());
        let listed = applicants.list(&ListOptions::new()).await.unwrap();
        assert_eq!(listed.total, 1);

        let listed = applicants.list(&ListOptions::new().include_archived(true)).await.unwrap();
        assert_eq!(listed.total, 2);

        applicants.restore(&id).await.unwrap();
        assert_eq!(applicants.list(&ListOptions::new()).await.unwrap().total, 2);
    }

    #[tokio::test]
    async fn test_patch_missing_id() {
        let (backend, store) = store();
        store.bootstrap().await.unwrap();
        let writes = backend.write_calls();

        let outcome = store
            .entity(&entities::REFERRERS)
            .patch("REF0000000001", &Patch::new().set("Status", "x"))
            .await
            .unwrap();
        assert!(outcome.is_not_found());
        assert_eq!(backend.write_calls(), writes);
    }

    #[tokio::test]
    async fn test_find_by_unknown_column() {
        let (_backend, store) = store();
        store.bootstrap().await.unwrap();
        let applicants = store.entity(&entities::APPLICANTS);

        let result = applicants.find_by("Favourite Colour", "blue").await;
        assert!(matches!(
            result,
            Err(StoreError::Engine(EngineError::UnknownColumn { .. }))
        ));
        assert!(applicants
            .find_by(applicant::PENDING_UPDATE_TOKEN_HASH, "abc")
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_offline_backend_is_retryable() {
        let (backend, store) = store();
        backend.set_offline(true);
        let err = store.entity(&entities::APPLICANTS).next_id().await.unwrap_err();
        assert!(err.is_retryable());
    }
}
