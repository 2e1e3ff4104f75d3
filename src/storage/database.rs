// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Campus Portal

//! Embedded auth database backed by redb.

use std::path::Path;

use redb::{Database, TableDefinition};

// =============================================================================
// Table Definitions
// =============================================================================

/// Identity stores, one table per source. Key: user_id → JSON record.
pub(crate) const IDENTITIES_ADMIN: TableDefinition<&str, &[u8]> =
    TableDefinition::new("identities_admin");
pub(crate) const IDENTITIES_TEACHER: TableDefinition<&str, &[u8]> =
    TableDefinition::new("identities_teacher");
pub(crate) const IDENTITIES_STUDENT: TableDefinition<&str, &[u8]> =
    TableDefinition::new("identities_student");
pub(crate) const IDENTITIES_PARENT: TableDefinition<&str, &[u8]> =
    TableDefinition::new("identities_parent");
pub(crate) const IDENTITIES_STAFF: TableDefinition<&str, &[u8]> =
    TableDefinition::new("identities_staff");

/// Index: `source|phone` → user_id. Keeps identifier lookups per-store.
pub(crate) const PHONE_INDEX: TableDefinition<&str, &str> = TableDefinition::new("phone_index");

/// Primary refresh-token table: token_id → serialized RefreshTokenRecord.
pub(crate) const REFRESH_TOKENS: TableDefinition<&str, &[u8]> =
    TableDefinition::new("refresh_tokens");

/// Index: composite key `user_id|token_id` → (). Supports revoke-all and sweep.
pub(crate) const USER_TOKENS: TableDefinition<&str, ()> = TableDefinition::new("user_tokens");

/// Append-only security events: time-ordered key → serialized SecurityEvent.
pub(crate) const SECURITY_EVENTS: TableDefinition<&str, &[u8]> =
    TableDefinition::new("security_events");

// =============================================================================
// Error Type
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("redb error: {0}")]
    Redb(#[from] redb::Error),

    #[error("redb database error: {0}")]
    RedbDatabase(#[from] redb::DatabaseError),

    #[error("redb transaction error: {0}")]
    RedbTransaction(#[from] redb::TransactionError),

    #[error("redb table error: {0}")]
    RedbTable(#[from] redb::TableError),

    #[error("redb storage error: {0}")]
    RedbStorage(#[from] redb::StorageError),

    #[error("redb commit error: {0}")]
    RedbCommit(#[from] redb::CommitError),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid seed entry: {0}")]
    InvalidSeed(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

// =============================================================================
// AuthDatabase
// =============================================================================

/// Embedded ACID database holding identities, refresh tokens and events.
pub struct AuthDatabase {
    db: Database,
}

impl AuthDatabase {
    /// Open (or create) the database at the given path.
    pub fn open(path: &Path) -> StoreResult<Self> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).ok();
        }
        let db = Database::create(path)?;

        // Pre-create all tables so later read transactions don't fail
        let write_txn = db.begin_write()?;
        {
            let _ = write_txn.open_table(IDENTITIES_ADMIN)?;
            let _ = write_txn.open_table(IDENTITIES_TEACHER)?;
            let _ = write_txn.open_table(IDENTITIES_STUDENT)?;
            let _ = write_txn.open_table(IDENTITIES_PARENT)?;
            let _ = write_txn.open_table(IDENTITIES_STAFF)?;
            let _ = write_txn.open_table(PHONE_INDEX)?;
            let _ = write_txn.open_table(REFRESH_TOKENS)?;
            let _ = write_txn.open_table(USER_TOKENS)?;
            let _ = write_txn.open_table(SECURITY_EVENTS)?;
        }
        write_txn.commit()?;

        Ok(Self { db })
    }

    /// Raw handle for store implementations in this crate.
    pub(crate) fn raw(&self) -> &Database {
        &self.db
    }
}

// =============================================================================
// Composite Key Helpers
// =============================================================================

/// Build a `prefix|suffix` composite key.
pub(crate) fn composite_key(prefix: &str, suffix: &str) -> String {
    format!("{prefix}|{suffix}")
}

/// Upper bound for range-scanning every key starting with `prefix|`.
///
/// `}` sorts after `|` in ASCII, so `prefix}` is past any valid composite.
pub(crate) fn composite_prefix_end(prefix: &str) -> String {
    format!("{prefix}}}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_creates_all_tables() {
        let dir = tempfile::tempdir().unwrap();
        let db = AuthDatabase::open(&dir.path().join("auth.redb")).unwrap();

        // A read transaction on a fresh database must find every table.
        use redb::ReadableDatabase;
        let read_txn = db.raw().begin_read().unwrap();
        assert!(read_txn.open_table(IDENTITIES_TEACHER).is_ok());
        assert!(read_txn.open_table(REFRESH_TOKENS).is_ok());
        assert!(read_txn.open_table(SECURITY_EVENTS).is_ok());
    }

    #[test]
    fn composite_bounds_cover_prefix_range() {
        let key = composite_key("user-1", "tok-9");
        let end = composite_prefix_end("user-1");
        assert!(key.as_str() < end.as_str());
        // A different user's keys fall outside the range.
        assert!(composite_key("user-2", "tok-0").as_str() > end.as_str());
    }
}
