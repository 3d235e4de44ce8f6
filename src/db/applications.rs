//! Application operations: action history, meetings and single-use tokens.

use std::ops::Deref;

use chrono::{DateTime, Utc};

use super::api::{hash_token, EntityHandle, StoreResult};
use crate::engine::PatchOutcome;
use crate::entities::application::{
    ActionEntry, Meeting, TokenKind, ACTION_HISTORY, MEETING_DATE, MEETING_TIME,
    MEETING_TIMEZONE, MEETING_URL,
};
use crate::record::{JsonLog, Patch, Record};

/// Application handle.
#[derive(Clone, Copy)]
pub struct Applications<'a> {
    base: EntityHandle<'a>,
}

impl<'a> Deref for Applications<'a> {
    type Target = EntityHandle<'a>;

    fn deref(&self) -> &Self::Target {
        &self.base
    }
}

impl<'a> Applications<'a> {
    pub(crate) fn new(base: EntityHandle<'a>) -> Self {
        Self { base }
    }

    /// Append an entry to the application's action history.
    ///
    /// Earlier entries are never rewritten; an unreadable history cell is
    /// replaced by a log starting with this entry.
    pub async fn record_action(&self, id: &str, entry: ActionEntry) -> StoreResult<PatchOutcome> {
        let Some(record) = self.get(id).await? else {
            return Ok(PatchOutcome::NotFound);
        };
        let mut log = JsonLog::<ActionEntry>::decode(record.get(ACTION_HISTORY));
        log.push(entry);
        self.patch(id, &Patch::new().set(ACTION_HISTORY, log.encode()))
            .await
    }

    /// Decoded action history, oldest first.
    pub fn history(&self, record: &Record) -> Vec<ActionEntry> {
        JsonLog::<ActionEntry>::decode(record.get(ACTION_HISTORY))
            .entries()
            .to_vec()
    }

    pub async fn schedule_meeting(&self, id: &str, meeting: &Meeting) -> StoreResult<PatchOutcome> {
        let patch = Patch::new()
            .set(MEETING_DATE, meeting.date.as_str())
            .set(MEETING_TIME, meeting.time.as_str())
            .set(MEETING_TIMEZONE, meeting.timezone.as_str())
            .set(MEETING_URL, meeting.url.as_str());
        self.patch(id, &patch).await
    }

    /// Store the hash of a freshly issued token, replacing any earlier one
    /// of the same kind.
    pub async fn store_token(
        &self,
        id: &str,
        kind: TokenKind,
        token_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> StoreResult<PatchOutcome> {
        self.prepare_with(&kind.columns()).await?;
        let patch = Patch::new()
            .set(kind.hash_column(), token_hash)
            .set(kind.expiry_column(), expires_at.to_rfc3339());
        self.patch(id, &patch).await
    }

    /// Application holding an unexpired token of `kind`.
    ///
    /// Only the hash of `raw_token` is compared; raw tokens are never stored.
    pub async fn find_by_token(
        &self,
        kind: TokenKind,
        raw_token: &str,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<Record>> {
        if raw_token.trim().is_empty() {
            return Ok(None);
        }
        let Some(record) = self.find_by(kind.hash_column(), &hash_token(raw_token)).await? else {
            return Ok(None);
        };

        let live = DateTime::parse_from_rfc3339(record.get(kind.expiry_column()))
            .map(|t| t.with_timezone(&Utc) > now)
            .unwrap_or(false);
        if !live {
            tracing::debug!("{:?} token for row {} has expired", kind, record.row());
            return Ok(None);
        }
        Ok(Some(record))
    }

    /// Clear a token pair so the token cannot be used again.
    ///
    /// The row is located by the token hash itself, so rows with a blank or
    /// duplicated application id are cleared all the same.
    pub async fn consume_token(&self, kind: TokenKind, raw_token: &str) -> StoreResult<PatchOutcome> {
        if raw_token.trim().is_empty() {
            return Ok(PatchOutcome::NotFound);
        }
        let sheet = self.prepare_with(&kind.columns()).await?;
        let patch = Patch::new()
            .clear(kind.hash_column())
            .clear(kind.expiry_column());
        Ok(self
            .crud()
            .patch_by_identifier(&sheet, kind.hash_column(), &hash_token(raw_token), &patch)
            .await?)
    }
}
