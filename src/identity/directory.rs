// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Campus Portal

//! redb-backed identity stores.
//!
//! One table per [`IdentitySource`], keyed by user id, with a shared
//! `source|phone` index so identifier lookups stay per-store. Provisioning
//! of identity rows is owned by the wider portal; this service only mutates
//! `token_version` and the reset-token fields.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use redb::{ReadableDatabase, ReadableTable, TableDefinition};
use serde::Deserialize;

use crate::auth::{password, Role};
use crate::storage::database::{
    composite_key, AuthDatabase, IDENTITIES_ADMIN, IDENTITIES_PARENT, IDENTITIES_STAFF,
    IDENTITIES_STUDENT, IDENTITIES_TEACHER, PHONE_INDEX,
};
use crate::storage::{StoreError, StoreResult};

use super::{IdentityRecord, IdentitySource};

fn table_for(source: IdentitySource) -> TableDefinition<'static, &'static str, &'static [u8]> {
    match source {
        IdentitySource::Admins => IDENTITIES_ADMIN,
        IdentitySource::Teachers => IDENTITIES_TEACHER,
        IdentitySource::Students => IDENTITIES_STUDENT,
        IdentitySource::Parents => IDENTITIES_PARENT,
        IdentitySource::Staff => IDENTITIES_STAFF,
    }
}

/// Typed access to the per-source identity tables.
#[derive(Clone)]
pub struct IdentityDirectory {
    db: Arc<AuthDatabase>,
}

impl IdentityDirectory {
    pub fn new(db: Arc<AuthDatabase>) -> Self {
        Self { db }
    }

    /// Insert (or replace) an identity row in the store its role belongs to.
    ///
    /// Used by seeding and tests; production provisioning is out of scope.
    pub fn insert(&self, record: &IdentityRecord) -> StoreResult<()> {
        let source = IdentitySource::for_role(record.role);
        let json = serde_json::to_vec(record)?;

        let write_txn = self.db.raw().begin_write()?;
        {
            let mut table = write_txn.open_table(table_for(source))?;
            table.insert(record.user_id.as_str(), json.as_slice())?;

            let mut index = write_txn.open_table(PHONE_INDEX)?;
            index.insert(
                composite_key(source.tag(), &record.phone).as_str(),
                record.user_id.as_str(),
            )?;
        }
        write_txn.commit()?;
        Ok(())
    }

    /// Look up an identity in a single store by its login identifier.
    pub fn find_by_phone(
        &self,
        source: IdentitySource,
        phone: &str,
    ) -> StoreResult<Option<IdentityRecord>> {
        let read_txn = self.db.raw().begin_read()?;
        let index = read_txn.open_table(PHONE_INDEX)?;

        let user_id = match index.get(composite_key(source.tag(), phone).as_str())? {
            Some(value) => value.value().to_string(),
            None => return Ok(None),
        };

        let table = read_txn.open_table(table_for(source))?;
        match table.get(user_id.as_str())? {
            Some(value) => {
                let record: IdentityRecord = serde_json::from_slice(value.value())?;
                Ok(Some(record))
            }
            None => Ok(None),
        }
    }

    /// Look up an identity by user id and role.
    pub fn get(&self, user_id: &str, role: Role) -> StoreResult<Option<IdentityRecord>> {
        let source = IdentitySource::for_role(role);
        let read_txn = self.db.raw().begin_read()?;
        let table = read_txn.open_table(table_for(source))?;
        match table.get(user_id)? {
            Some(value) => {
                let record: IdentityRecord = serde_json::from_slice(value.value())?;
                Ok(Some(record))
            }
            None => Ok(None),
        }
    }

    /// Read the current token version for a user.
    pub fn read_token_version(&self, user_id: &str, role: Role) -> StoreResult<Option<u32>> {
        Ok(self.get(user_id, role)?.map(|r| r.token_version))
    }

    /// Increment the user's token version, invalidating every previously
    /// issued token on its next refresh. Returns the new version.
    pub fn bump_token_version(&self, user_id: &str, role: Role) -> StoreResult<u32> {
        self.update(user_id, role, |record| {
            record.token_version += 1;
        })
        .map(|record| record.token_version)
    }

    /// Persist a password-reset token digest with its expiry.
    ///
    /// Replaces any outstanding reset token; the tokens are single-use.
    pub fn store_reset_token(
        &self,
        user_id: &str,
        role: Role,
        token_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> StoreResult<()> {
        self.update(user_id, role, |record| {
            record.reset_token_hash = Some(token_hash.to_string());
            record.reset_token_expires_at = Some(expires_at);
        })
        .map(|_| ())
    }

    /// Read-modify-write an identity row in one write transaction.
    fn update(
        &self,
        user_id: &str,
        role: Role,
        mutate: impl FnOnce(&mut IdentityRecord),
    ) -> StoreResult<IdentityRecord> {
        let source = IdentitySource::for_role(role);
        let write_txn = self.db.raw().begin_write()?;
        let record = {
            let mut table = write_txn.open_table(table_for(source))?;

            let bytes = {
                let existing = table
                    .get(user_id)?
                    .ok_or_else(|| StoreError::NotFound(format!("identity {user_id}")))?;
                existing.value().to_vec()
            };

            let mut record: IdentityRecord = serde_json::from_slice(&bytes)?;
            mutate(&mut record);
            let json = serde_json::to_vec(&record)?;
            table.insert(user_id, json.as_slice())?;
            record
        };
        write_txn.commit()?;
        Ok(record)
    }

    /// Provision identities from a seed list (development/demo bootstrap).
    ///
    /// Skips entries whose phone already resolves in the target store, so
    /// restarts are idempotent. Returns the number inserted.
    pub fn seed(&self, entries: &[SeedIdentity]) -> StoreResult<usize> {
        let mut inserted = 0usize;
        for entry in entries {
            let source = IdentitySource::for_role(entry.role);
            if self.find_by_phone(source, &entry.phone)?.is_some() {
                continue;
            }
            let password_hash = password::hash_password(&entry.password)
                .map_err(|e| StoreError::InvalidSeed(format!("{}: {e}", entry.phone)))?;
            let record = IdentityRecord {
                user_id: uuid::Uuid::new_v4().to_string(),
                phone: entry.phone.clone(),
                name: entry.name.clone(),
                password_hash,
                role: entry.role,
                token_version: 0,
                reset_token_hash: None,
                reset_token_expires_at: None,
            };
            self.insert(&record)?;
            inserted += 1;
        }
        Ok(inserted)
    }
}

/// One entry of the `SEED_IDENTITIES` JSON file.
///
/// Roles are hand-typed in seed files, so any casing is accepted.
#[derive(Debug, Clone, Deserialize)]
pub struct SeedIdentity {
    pub phone: String,
    pub name: String,
    #[serde(deserialize_with = "role_from_str")]
    pub role: Role,
    pub password: String,
}

fn role_from_str<'de, D>(deserializer: D) -> Result<Role, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    Role::parse(&s).ok_or_else(|| serde::de::Error::custom(format!("unknown role: {s}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_directory() -> (IdentityDirectory, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let db = Arc::new(AuthDatabase::open(&dir.path().join("auth.redb")).unwrap());
        (IdentityDirectory::new(db), dir)
    }

    fn record(user_id: &str, phone: &str, role: Role) -> IdentityRecord {
        IdentityRecord {
            user_id: user_id.to_string(),
            phone: phone.to_string(),
            name: "Someone".to_string(),
            password_hash: "$argon2id$stub".to_string(),
            role,
            token_version: 0,
            reset_token_hash: None,
            reset_token_expires_at: None,
        }
    }

    #[test]
    fn insert_and_find_by_phone() {
        let (directory, _dir) = temp_directory();
        directory.insert(&record("u-1", "+15550001", Role::Nurse)).unwrap();

        let found = directory
            .find_by_phone(IdentitySource::Staff, "+15550001")
            .unwrap()
            .unwrap();
        assert_eq!(found.user_id, "u-1");
        assert_eq!(found.role, Role::Nurse);

        // The same phone is absent from every other store.
        assert!(directory
            .find_by_phone(IdentitySource::Teachers, "+15550001")
            .unwrap()
            .is_none());
    }

    #[test]
    fn bump_token_version_increments() {
        let (directory, _dir) = temp_directory();
        directory.insert(&record("u-1", "+15550001", Role::Parent)).unwrap();

        assert_eq!(directory.read_token_version("u-1", Role::Parent).unwrap(), Some(0));
        assert_eq!(directory.bump_token_version("u-1", Role::Parent).unwrap(), 1);
        assert_eq!(directory.bump_token_version("u-1", Role::Parent).unwrap(), 2);
        assert_eq!(directory.read_token_version("u-1", Role::Parent).unwrap(), Some(2));
    }

    #[test]
    fn bump_unknown_user_is_not_found() {
        let (directory, _dir) = temp_directory();
        let err = directory.bump_token_version("u-missing", Role::Admin).unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[test]
    fn store_reset_token_replaces_outstanding() {
        let (directory, _dir) = temp_directory();
        directory.insert(&record("u-1", "+15550001", Role::Student)).unwrap();

        let expires = Utc::now() + chrono::Duration::hours(1);
        directory
            .store_reset_token("u-1", Role::Student, "digest-a", expires)
            .unwrap();
        directory
            .store_reset_token("u-1", Role::Student, "digest-b", expires)
            .unwrap();

        let row = directory.get("u-1", Role::Student).unwrap().unwrap();
        assert_eq!(row.reset_token_hash.as_deref(), Some("digest-b"));
        assert_eq!(row.reset_token_expires_at, Some(expires));
    }

    #[test]
    fn seed_entries_accept_any_role_casing() {
        let entry: SeedIdentity = serde_json::from_str(
            r#"{"phone":"+15550009","name":"Head","role":"Principal","password":"pw"}"#,
        )
        .unwrap();
        assert_eq!(entry.role, Role::Principal);

        let err = serde_json::from_str::<SeedIdentity>(
            r#"{"phone":"+15550010","name":"X","role":"janitor","password":"pw"}"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("unknown role"));
    }

    #[test]
    fn seed_is_idempotent() {
        let (directory, _dir) = temp_directory();
        let entries = vec![SeedIdentity {
            phone: "+10000000001".to_string(),
            name: "Demo Teacher".to_string(),
            role: Role::Teacher,
            password: "demo-password".to_string(),
        }];

        assert_eq!(directory.seed(&entries).unwrap(), 1);
        assert_eq!(directory.seed(&entries).unwrap(), 0);

        let found = directory
            .find_by_phone(IdentitySource::Teachers, "+10000000001")
            .unwrap()
            .unwrap();
        assert!(password::verify_password("demo-password", &found.password_hash).unwrap());
    }
}
