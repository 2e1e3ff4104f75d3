// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Campus Portal

use std::path::Path;
use std::sync::Arc;

use crate::audit::SecurityLog;
use crate::auth::TokenService;
use crate::identity::{CredentialResolver, IdentityDirectory};
use crate::ratelimit::{CounterStore, InMemoryCounterStore, RateLimiter};
use crate::session::{LogResetDelivery, ResetDelivery, SessionService};
use crate::storage::{AuthDatabase, RefreshTokenStore, StoreResult};

/// Shared application state handed to every handler.
///
/// Cheap to clone; every field is `Arc`-backed.
#[derive(Clone)]
pub struct AppState {
    pub tokens: Arc<TokenService>,
    pub sessions: SessionService,
    pub directory: Arc<IdentityDirectory>,
    pub refresh_store: RefreshTokenStore,
    pub security_log: SecurityLog,
    pub limiter: RateLimiter,
    /// Whether auth cookies carry the `Secure` attribute.
    pub cookie_secure: bool,
}

impl AppState {
    /// Wire the full service graph on top of an open database.
    pub fn new(
        db: Arc<AuthDatabase>,
        signing_key: &[u8],
        counters: Arc<dyn CounterStore>,
        reset_delivery: Arc<dyn ResetDelivery>,
        cookie_secure: bool,
    ) -> Self {
        let tokens = Arc::new(TokenService::new(signing_key));
        let directory = Arc::new(IdentityDirectory::new(db.clone()));
        let refresh_store = RefreshTokenStore::new(db.clone());
        let security_log = SecurityLog::new(db);
        let limiter = RateLimiter::new(counters);

        let sessions = SessionService::new(
            tokens.clone(),
            CredentialResolver::new(directory.clone()),
            directory.clone(),
            refresh_store.clone(),
            limiter.clone(),
            security_log.clone(),
            reset_delivery,
        );

        Self {
            tokens,
            sessions,
            directory,
            refresh_store,
            security_log,
            limiter,
            cookie_secure,
        }
    }

    /// Open the database at `path` and wire the default stack.
    pub fn open(path: &Path, signing_key: &[u8], cookie_secure: bool) -> StoreResult<Self> {
        let db = Arc::new(AuthDatabase::open(path)?);
        Ok(Self::new(
            db,
            signing_key,
            Arc::new(InMemoryCounterStore::new()),
            Arc::new(LogResetDelivery),
            cookie_secure,
        ))
    }

    /// State over a temporary database, insecure cookies.
    #[cfg(test)]
    pub fn for_tests(dir: &Path, signing_key: &[u8]) -> Self {
        Self::open(&dir.join("auth.redb"), signing_key, false)
            .expect("Failed to open test database")
    }
}
