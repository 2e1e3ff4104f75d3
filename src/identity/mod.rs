// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Campus Portal

//! # Identity Module
//!
//! The portal keeps each user category in its own identity store: admins,
//! teachers, students, parents, and a shared store for the non-teaching
//! staff positions. A login identifier (phone) must be matched against all
//! of them.
//!
//! Rather than hand-writing N sequential lookups, the stores form a closed
//! [`IdentitySource`] list and the [`CredentialResolver`] probes them in one
//! fixed priority order, returning the first hit. Identifiers are disjoint
//! across stores under correct provisioning, so the order is a policy
//! decision, not a security one.

pub mod directory;

pub use directory::{IdentityDirectory, SeedIdentity};

use serde::{Deserialize, Serialize};

use crate::auth::Role;
use crate::storage::StoreError;

/// The closed set of identity stores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdentitySource {
    Admins,
    Teachers,
    Students,
    Parents,
    /// Shared store for every non-teaching staff position.
    Staff,
}

impl IdentitySource {
    /// Probe order for credential resolution. First hit wins.
    pub const ALL: [IdentitySource; 5] = [
        IdentitySource::Admins,
        IdentitySource::Teachers,
        IdentitySource::Students,
        IdentitySource::Parents,
        IdentitySource::Staff,
    ];

    /// Short tag used in index keys and logs.
    pub fn tag(&self) -> &'static str {
        match self {
            IdentitySource::Admins => "admin",
            IdentitySource::Teachers => "teacher",
            IdentitySource::Students => "student",
            IdentitySource::Parents => "parent",
            IdentitySource::Staff => "staff",
        }
    }

    /// The store a given role is persisted in.
    pub fn for_role(role: Role) -> IdentitySource {
        match role {
            Role::Admin => IdentitySource::Admins,
            Role::Teacher => IdentitySource::Teachers,
            Role::Student => IdentitySource::Students,
            Role::Parent => IdentitySource::Parents,
            staff => {
                debug_assert!(staff.is_staff_position());
                IdentitySource::Staff
            }
        }
    }
}

/// An identity row as persisted in its store.
///
/// `token_version` starts at 0 and is incremented only to force global
/// logout (password change, admin revoke-all). The token layer reads and
/// compares it; this module owns the mutation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IdentityRecord {
    pub user_id: String,
    pub phone: String,
    pub name: String,
    pub password_hash: String,
    pub role: Role,
    pub token_version: u32,
    /// SHA-256 digest of an outstanding password-reset token, if any.
    pub reset_token_hash: Option<String>,
    /// Expiry of the outstanding reset token.
    pub reset_token_expires_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// A credential match: everything the session layer needs to finish login.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedIdentity {
    pub user_id: String,
    pub phone: String,
    pub name: String,
    pub role: Role,
    pub password_hash: String,
    pub token_version: u32,
    pub source: IdentitySource,
}

impl ResolvedIdentity {
    fn from_record(record: IdentityRecord, source: IdentitySource) -> Self {
        Self {
            user_id: record.user_id,
            phone: record.phone,
            name: record.name,
            role: record.role,
            password_hash: record.password_hash,
            token_version: record.token_version,
            source,
        }
    }
}

/// Resolves a login identifier against the ordered identity stores.
///
/// No side effects; "not found" is a normal outcome (`Ok(None)`), distinct
/// from store failure (`Err`).
#[derive(Clone)]
pub struct CredentialResolver {
    directory: std::sync::Arc<IdentityDirectory>,
}

impl CredentialResolver {
    pub fn new(directory: std::sync::Arc<IdentityDirectory>) -> Self {
        Self { directory }
    }

    /// Probe the stores in [`IdentitySource::ALL`] order; first hit wins.
    ///
    /// If an identifier were ever provisioned into two stores the earlier
    /// store wins deterministically; the remaining stores are not scanned.
    pub fn resolve(&self, identifier: &str) -> Result<Option<ResolvedIdentity>, StoreError> {
        if identifier.is_empty() {
            return Ok(None);
        }
        for source in IdentitySource::ALL {
            if let Some(record) = self.directory.find_by_phone(source, identifier)? {
                return Ok(Some(ResolvedIdentity::from_record(record, source)));
            }
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::AuthDatabase;
    use std::sync::Arc;

    fn temp_resolver() -> (CredentialResolver, Arc<IdentityDirectory>, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let db = Arc::new(AuthDatabase::open(&dir.path().join("auth.redb")).unwrap());
        let directory = Arc::new(IdentityDirectory::new(db));
        (CredentialResolver::new(directory.clone()), directory, dir)
    }

    fn record(user_id: &str, phone: &str, role: Role) -> IdentityRecord {
        IdentityRecord {
            user_id: user_id.to_string(),
            phone: phone.to_string(),
            name: "Test User".to_string(),
            password_hash: "$argon2id$stub".to_string(),
            role,
            token_version: 0,
            reset_token_hash: None,
            reset_token_expires_at: None,
        }
    }

    #[test]
    fn source_for_role_maps_staff_positions_to_shared_store() {
        assert_eq!(IdentitySource::for_role(Role::Teacher), IdentitySource::Teachers);
        assert_eq!(IdentitySource::for_role(Role::Nurse), IdentitySource::Staff);
        assert_eq!(IdentitySource::for_role(Role::Registrar), IdentitySource::Staff);
    }

    #[test]
    fn resolve_finds_identity_in_its_store() {
        let (resolver, directory, _dir) = temp_resolver();
        directory
            .insert(&record("u-t1", "+10000000001", Role::Teacher))
            .unwrap();

        let resolved = resolver.resolve("+10000000001").unwrap().unwrap();
        assert_eq!(resolved.user_id, "u-t1");
        assert_eq!(resolved.role, Role::Teacher);
        assert_eq!(resolved.source, IdentitySource::Teachers);
    }

    #[test]
    fn resolve_not_found_is_ok_none() {
        let (resolver, _directory, _dir) = temp_resolver();
        assert_eq!(resolver.resolve("+19999999999").unwrap(), None);
        assert_eq!(resolver.resolve("").unwrap(), None);
    }

    #[test]
    fn resolve_prefers_earlier_store_deterministically() {
        let (resolver, directory, _dir) = temp_resolver();
        // Mis-provisioned duplicate identifier across two stores.
        directory
            .insert(&record("u-admin", "+10000000042", Role::Admin))
            .unwrap();
        directory
            .insert(&record("u-student", "+10000000042", Role::Student))
            .unwrap();

        let resolved = resolver.resolve("+10000000042").unwrap().unwrap();
        assert_eq!(resolved.user_id, "u-admin");
        assert_eq!(resolved.source, IdentitySource::Admins);
    }
}
