// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Campus Portal

//! Persisted refresh-token records and the rotation state machine.
//!
//! A record is either *active* (`revoked_at == None` and not expired) or
//! terminal. Terminal states are never left:
//!
//! - `Active → Rotated`: revoked with a successor (`replaced_by`)
//! - `Active → LoggedOut`: revoked without a successor
//! - `Active → Expired`: lifetime elapsed, never revoked
//!
//! [`RefreshTokenStore::rotate`] performs the `Active → Rotated` transition
//! as a single write transaction: check-and-revoke is one atomic step, so of
//! two concurrent rotations on the same token exactly one commits and the
//! other observes `AlreadyRevoked`. That is what makes reuse detection
//! reliable under concurrency instead of racy.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use redb::{ReadableDatabase, ReadableTable};
use serde::{Deserialize, Serialize};

use crate::auth::Role;

use super::database::{
    composite_key, composite_prefix_end, AuthDatabase, StoreResult, REFRESH_TOKENS, USER_TOKENS,
};

/// A persisted refresh token.
///
/// Only the SHA-256 digest of the signed token is stored; the raw token
/// exists solely in the client's cookie.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RefreshTokenRecord {
    /// Unique token id (the JWT `jti`).
    pub token_id: String,
    /// SHA-256 digest of the signed token.
    pub token_hash: String,
    /// Owning user.
    pub user_id: String,
    /// Role at issuance.
    pub role: Role,
    /// Issuance time.
    pub issued_at: DateTime<Utc>,
    /// Expiry time.
    pub expires_at: DateTime<Utc>,
    /// Revocation time; `None` while active.
    pub revoked_at: Option<DateTime<Utc>>,
    /// Successor token id when rotated; `None` for logout revocations.
    pub replaced_by: Option<String>,
    /// Client IP observed at issuance.
    pub client_ip: String,
    /// Client user agent observed at issuance.
    pub user_agent: Option<String>,
}

impl RefreshTokenRecord {
    /// Whether the record is still active at `now`.
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        self.revoked_at.is_none() && now < self.expires_at
    }
}

/// Outcome of a rotation attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RotateOutcome {
    /// The old record was active and has been revoked; the successor is
    /// persisted.
    Rotated,
    /// No record with that token id (or digest mismatch) - suspicious.
    Unknown,
    /// The record was already revoked: reuse of a rotated token.
    AlreadyRevoked,
    /// The record outlived its expiry; normal rejection, no theft signal.
    Expired,
}

/// Store for refresh-token records.
#[derive(Clone)]
pub struct RefreshTokenStore {
    db: Arc<AuthDatabase>,
}

impl RefreshTokenStore {
    pub fn new(db: Arc<AuthDatabase>) -> Self {
        Self { db }
    }

    /// Persist a freshly issued record.
    pub fn insert(&self, record: &RefreshTokenRecord) -> StoreResult<()> {
        let json = serde_json::to_vec(record)?;
        let write_txn = self.db.raw().begin_write()?;
        {
            let mut tokens = write_txn.open_table(REFRESH_TOKENS)?;
            tokens.insert(record.token_id.as_str(), json.as_slice())?;

            let mut index = write_txn.open_table(USER_TOKENS)?;
            index.insert(composite_key(&record.user_id, &record.token_id).as_str(), ())?;
        }
        write_txn.commit()?;
        Ok(())
    }

    /// Look up a record by token id.
    pub fn get(&self, token_id: &str) -> StoreResult<Option<RefreshTokenRecord>> {
        let read_txn = self.db.raw().begin_read()?;
        let table = read_txn.open_table(REFRESH_TOKENS)?;
        match table.get(token_id)? {
            Some(value) => {
                let record: RefreshTokenRecord = serde_json::from_slice(value.value())?;
                Ok(Some(record))
            }
            None => Ok(None),
        }
    }

    /// Atomically rotate `old_token_id` into `new_record`.
    ///
    /// One write transaction performs the lookup, the digest check, the state
    /// checks, the `Active → Rotated` transition and the successor insert.
    /// Any non-`Rotated` outcome leaves the store untouched.
    pub fn rotate(
        &self,
        old_token_id: &str,
        presented_hash: &str,
        now: DateTime<Utc>,
        new_record: &RefreshTokenRecord,
    ) -> StoreResult<RotateOutcome> {
        let new_json = serde_json::to_vec(new_record)?;
        let write_txn = self.db.raw().begin_write()?;
        let outcome = {
            let mut tokens = write_txn.open_table(REFRESH_TOKENS)?;

            let old_bytes = match tokens.get(old_token_id)? {
                Some(value) => value.value().to_vec(),
                None => {
                    // Nothing to revoke; abort the transaction untouched.
                    return Ok(RotateOutcome::Unknown);
                }
            };
            let mut old: RefreshTokenRecord = serde_json::from_slice(&old_bytes)?;

            if old.token_hash != presented_hash {
                return Ok(RotateOutcome::Unknown);
            }
            if old.revoked_at.is_some() {
                return Ok(RotateOutcome::AlreadyRevoked);
            }
            if now >= old.expires_at {
                return Ok(RotateOutcome::Expired);
            }

            old.revoked_at = Some(now);
            old.replaced_by = Some(new_record.token_id.clone());
            let old_json = serde_json::to_vec(&old)?;
            tokens.insert(old_token_id, old_json.as_slice())?;
            tokens.insert(new_record.token_id.as_str(), new_json.as_slice())?;

            let mut index = write_txn.open_table(USER_TOKENS)?;
            index.insert(
                composite_key(&new_record.user_id, &new_record.token_id).as_str(),
                (),
            )?;

            RotateOutcome::Rotated
        };
        write_txn.commit()?;
        Ok(outcome)
    }

    /// Revoke a single record without a successor (logout).
    ///
    /// Returns `true` if the record was active and is now revoked.
    pub fn revoke(&self, token_id: &str, now: DateTime<Utc>) -> StoreResult<bool> {
        let write_txn = self.db.raw().begin_write()?;
        let revoked = {
            let mut tokens = write_txn.open_table(REFRESH_TOKENS)?;

            let bytes = match tokens.get(token_id)? {
                Some(value) => value.value().to_vec(),
                None => return Ok(false),
            };
            let mut record: RefreshTokenRecord = serde_json::from_slice(&bytes)?;
            if record.revoked_at.is_some() {
                false
            } else {
                record.revoked_at = Some(now);
                let json = serde_json::to_vec(&record)?;
                tokens.insert(token_id, json.as_slice())?;
                true
            }
        };
        write_txn.commit()?;
        Ok(revoked)
    }

    /// Revoke every active record belonging to `user_id`.
    ///
    /// The theft response after reuse detection. Returns the number of
    /// records transitioned out of `Active`.
    pub fn revoke_all_for_user(&self, user_id: &str, now: DateTime<Utc>) -> StoreResult<usize> {
        let token_ids = self.token_ids_for_user(user_id)?;

        let mut revoked = 0usize;
        let write_txn = self.db.raw().begin_write()?;
        {
            let mut tokens = write_txn.open_table(REFRESH_TOKENS)?;
            for token_id in &token_ids {
                let bytes = match tokens.get(token_id.as_str())? {
                    Some(value) => value.value().to_vec(),
                    None => continue,
                };
                let mut record: RefreshTokenRecord = serde_json::from_slice(&bytes)?;
                if record.revoked_at.is_none() {
                    record.revoked_at = Some(now);
                    let json = serde_json::to_vec(&record)?;
                    tokens.insert(token_id.as_str(), json.as_slice())?;
                    revoked += 1;
                }
            }
        }
        write_txn.commit()?;
        Ok(revoked)
    }

    /// Delete records whose expiry has passed. Periodic GC, not a hot path.
    pub fn sweep_expired(&self, now: DateTime<Utc>) -> StoreResult<usize> {
        // Collect first; redb tables can't be mutated mid-iteration.
        let mut expired: Vec<(String, String)> = Vec::new();
        {
            let read_txn = self.db.raw().begin_read()?;
            let tokens = read_txn.open_table(REFRESH_TOKENS)?;
            for entry in tokens.iter()? {
                let entry = entry?;
                let record: RefreshTokenRecord = serde_json::from_slice(entry.1.value())?;
                if now >= record.expires_at {
                    expired.push((record.token_id, record.user_id));
                }
            }
        }

        if expired.is_empty() {
            return Ok(0);
        }

        let write_txn = self.db.raw().begin_write()?;
        {
            let mut tokens = write_txn.open_table(REFRESH_TOKENS)?;
            let mut index = write_txn.open_table(USER_TOKENS)?;
            for (token_id, user_id) in &expired {
                tokens.remove(token_id.as_str())?;
                index.remove(composite_key(user_id, token_id).as_str())?;
            }
        }
        write_txn.commit()?;
        Ok(expired.len())
    }

    fn token_ids_for_user(&self, user_id: &str) -> StoreResult<Vec<String>> {
        let start = composite_key(user_id, "");
        let end = composite_prefix_end(user_id);

        let read_txn = self.db.raw().begin_read()?;
        let index = read_txn.open_table(USER_TOKENS)?;

        let mut token_ids = Vec::new();
        for entry in index.range(start.as_str()..end.as_str())? {
            let entry = entry?;
            let key = entry.0.value().to_string();
            if let Some((_, token_id)) = key.split_once('|') {
                token_ids.push(token_id.to_string());
            }
        }
        Ok(token_ids)
    }
}
