//! Create, patch, archive and delete.
//!
//! After creation a row is only ever touched through name-scoped patches that
//! write the columns a caller explicitly provided. Two concurrent requests can
//! still race on the same row, but each only overwrites the cells it meant to.

use std::sync::Arc;

use serde_json::Value;

use crate::catalog::SchemaManager;
use crate::engine::error::EngineResult;
use crate::engine::ident::{IdGenerator, IdScheme};
use crate::engine::locator::RowLocator;
use crate::engine::outcome::{PatchOutcome, UpsertOutcome};
use crate::record::{
    sanitize_for_write, unescape_on_read, FieldMap, Patch, Record, ARCHIVED, ARCHIVED_AT,
    ARCHIVED_BY,
};
use crate::storage::{CellRange, SheetName};

/// Column stamped with the time of the last patch, when a sheet has it.
pub const LAST_UPDATED: &str = "Last Updated";

/// Identifier handling for upserts.
#[derive(Debug, Clone, Copy)]
pub struct IdPolicy {
    pub column: &'static str,
    pub scheme: IdScheme,
    /// where a replaced non-canonical identifier is kept
    pub legacy_column: Option<&'static str>,
}

fn now_rfc3339() -> String {
    chrono::Utc::now().to_rfc3339()
}

/// Record-level writes against one backing service.
#[derive(Clone)]
pub struct CrudEngine {
    schema: Arc<SchemaManager>,
    locator: RowLocator,
    ids: IdGenerator,
    created_column: Option<&'static str>,
}

impl CrudEngine {
    pub fn new(schema: Arc<SchemaManager>, ids: IdGenerator) -> Self {
        Self {
            locator: RowLocator::new(schema.clone()),
            schema,
            ids,
            created_column: None,
        }
    }

    /// Stamp appended rows with the current time in `column`, when the sheet
    /// has it and the caller did not provide a value.
    pub fn with_created_column(mut self, column: &'static str) -> Self {
        self.created_column = Some(column);
        self
    }

    pub fn locator(&self) -> &RowLocator {
        &self.locator
    }

    pub fn ids(&self) -> &IdGenerator {
        &self.ids
    }

    /// Append a record as a new trailing row; returns the row number it landed on.
    ///
    /// Every field name becomes a column if it is not one already. Retried
    /// appends can land twice; the service does not deduplicate them.
    pub async fn append(&self, sheet: &SheetName, fields: &FieldMap) -> EngineResult<usize> {
        let names: Vec<&str> = fields.keys().map(String::as_str).collect();
        self.schema.ensure_columns(sheet, &names).await?;
        let header = self.schema.headers(sheet).await?;

        let mut row = vec![Value::String(String::new()); header.width()];
        for (name, value) in fields {
            if let Some(pos) = header.position(name) {
                row[pos] = sanitize_for_write(value);
            }
        }
        if let Some(column) = self.created_column.filter(|c| !fields.contains_key(*c)) {
            if let Some(pos) = header.position(column) {
                row[pos] = Value::String(now_rfc3339());
            }
        }

        let row_no = self.schema.backend().append_row(sheet, row).await?;
        tracing::debug!("appended row {} to {}", row_no, sheet);
        Ok(row_no)
    }

    /// Update the row whose `key_column` matches, or append a new one.
    ///
    /// An existing identifier is preserved unless it is not in canonical form,
    /// in which case a canonical one is minted and the old value is kept in
    /// the policy's legacy column.
    pub async fn upsert_by_key(
        &self,
        sheet: &SheetName,
        key_column: &str,
        key_value: &str,
        fields: FieldMap,
        id_policy: Option<&IdPolicy>,
    ) -> EngineResult<UpsertOutcome> {
        if let Some(policy) = id_policy {
            let mut columns = vec![policy.column, key_column];
            columns.extend(policy.legacy_column);
            self.schema.ensure_columns(sheet, &columns).await?;
        }

        let existing = self.locator.find_row(sheet, key_column, key_value).await?;
        match existing {
            Some(record) => {
                self.update_existing(sheet, record, fields, id_policy).await
            }
            None => {
                let mut fields = fields;
                fields.insert(key_column.to_string(), Value::String(key_value.trim().to_string()));

                let mut id = String::new();
                if let Some(policy) = id_policy {
                    let provided = fields
                        .get(policy.column)
                        .map(|v| unescape_on_read(Some(v)))
                        .unwrap_or_default();
                    id = if policy.scheme.is_canonical(&provided) {
                        provided
                    } else {
                        self.ids.generate(sheet, policy.column, policy.scheme).await?
                    };
                    fields.insert(policy.column.to_string(), Value::String(id.clone()));
                }

                self.append(sheet, &fields).await?;
                Ok(UpsertOutcome {
                    updated: false,
                    id,
                    replaced_id: None,
                })
            }
        }
    }

    async fn update_existing(
        &self,
        sheet: &SheetName,
        record: Record,
        mut fields: FieldMap,
        id_policy: Option<&IdPolicy>,
    ) -> EngineResult<UpsertOutcome> {
        let mut id = String::new();
        let mut replaced_id = None;

        if let Some(policy) = id_policy {
            // the stored identifier wins over anything in the submission
            fields.remove(policy.column);
            let current = record.get(policy.column).to_string();
            if policy.scheme.is_canonical(&current) {
                id = current;
            } else {
                id = self.ids.generate(sheet, policy.column, policy.scheme).await?;
                fields.insert(policy.column.to_string(), Value::String(id.clone()));
                if !current.is_empty() {
                    if let Some(legacy) = policy.legacy_column {
                        fields.insert(legacy.to_string(), Value::String(current.clone()));
                    }
                    tracing::info!("replacing non-canonical id {} with {} in {}", current, id, sheet);
                    replaced_id = Some(current);
                }
            }
        }

        let names: Vec<&str> = fields.keys().map(String::as_str).collect();
        self.schema.ensure_columns(sheet, &names).await?;
        self.write_patch(sheet, &record, &Patch::from_fields(fields)).await?;

        Ok(UpsertOutcome {
            updated: true,
            id,
            replaced_id,
        })
    }

    /// Write the present fields of `patch` to the row carrying `id_value`.
    ///
    /// Fields are matched to columns by name, whatever order the header row
    /// is in. Fields without a column, and fields whose value is unchanged,
    /// are skipped. The row is located immediately before the write.
    pub async fn patch_by_identifier(
        &self,
        sheet: &SheetName,
        id_column: &str,
        id_value: &str,
        patch: &Patch,
    ) -> EngineResult<PatchOutcome> {
        let Some(record) = self.locator.find_row(sheet, id_column, id_value).await? else {
            return Ok(PatchOutcome::NotFound);
        };
        self.write_patch(sheet, &record, patch).await
    }

    async fn write_patch(
        &self,
        sheet: &SheetName,
        record: &Record,
        patch: &Patch,
    ) -> EngineResult<PatchOutcome> {
        if patch.is_empty() {
            return Ok(PatchOutcome::NoChanges);
        }

        let header = self.schema.headers(sheet).await?;
        let mut updates = Vec::new();
        let mut columns = Vec::new();

        for (name, value) in patch.present() {
            let Some(col) = header.column_number(name) else {
                tracing::debug!("patch field {} has no column in {}", name, sheet);
                continue;
            };
            let encoded = sanitize_for_write(value);
            if unescape_on_read(Some(&encoded)) == record.get(name) {
                continue;
            }
            updates.push((CellRange::cell(sheet.clone(), record.row(), col), vec![vec![encoded]]));
            columns.push(name.to_string());
        }

        if updates.is_empty() {
            return Ok(PatchOutcome::NoChanges);
        }

        let touched = patch.present().iter().any(|(name, _)| *name == LAST_UPDATED);
        if !touched {
            if let Some(col) = header.column_number(LAST_UPDATED) {
                updates.push((
                    CellRange::cell(sheet.clone(), record.row(), col),
                    vec![vec![Value::String(now_rfc3339())]],
                ));
                columns.push(LAST_UPDATED.to_string());
            }
        }

        self.schema.backend().batch_update(updates).await?;
        tracing::debug!("patched {:?} on row {} of {}", columns, record.row(), sheet);
        Ok(PatchOutcome::Updated {
            row: record.row(),
            columns,
        })
    }

    /// Soft-delete: flag the row archived and stamp when and by whom.
    ///
    /// The row stays in place, so the sheet's row count does not change.
    pub async fn archive(
        &self,
        sheet: &SheetName,
        id_column: &str,
        id_value: &str,
        actor: &str,
    ) -> EngineResult<PatchOutcome> {
        self.schema
            .ensure_columns(sheet, &[ARCHIVED, ARCHIVED_AT, ARCHIVED_BY])
            .await?;
        let patch = Patch::new()
            .set(ARCHIVED, "yes")
            .set(ARCHIVED_AT, now_rfc3339())
            .set(ARCHIVED_BY, actor);
        self.patch_by_identifier(sheet, id_column, id_value, &patch).await
    }

    /// Undo an archive.
    pub async fn restore(
        &self,
        sheet: &SheetName,
        id_column: &str,
        id_value: &str,
    ) -> EngineResult<PatchOutcome> {
        let patch = Patch::new()
            .clear(ARCHIVED)
            .clear(ARCHIVED_AT)
            .clear(ARCHIVED_BY);
        self.patch_by_identifier(sheet, id_column, id_value, &patch).await
    }

    /// Physically remove the row; returns false when no row carries the id.
    ///
    /// Every later row moves up by one, so any row number captured before
    /// this call is stale afterwards.
    pub async fn hard_delete(
        &self,
        sheet: &SheetName,
        id_column: &str,
        id_value: &str,
    ) -> EngineResult<bool> {
        let Some(record) = self.locator.find_row(sheet, id_column, id_value).await? else {
            return Ok(false);
        };
        self.schema
            .backend()
            .delete_rows(sheet, record.row(), 1)
            .await?;
        tracing::info!("deleted row {} ({}) from {}", record.row(), id_value, sheet);
        Ok(true)
    }
}
