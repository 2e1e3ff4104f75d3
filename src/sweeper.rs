// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Campus Portal

//! # Refresh Token Sweeper
//!
//! Background task that periodically deletes expired refresh-token records.
//! Expired records are already unusable; sweeping only keeps the store from
//! growing without bound.
//!
//! ## Shutdown
//!
//! Uses `tokio_util::sync::CancellationToken` for graceful shutdown, so an
//! in-flight sweep finishes before the process exits.

use std::time::Duration;

use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::storage::RefreshTokenStore;

/// Default interval between sweeps.
const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(3600);

/// Periodic garbage collector for expired refresh-token records.
pub struct TokenSweeper {
    store: RefreshTokenStore,
    sweep_interval: Duration,
}

impl TokenSweeper {
    pub fn new(store: RefreshTokenStore) -> Self {
        Self {
            store,
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
        }
    }

    #[cfg(test)]
    fn with_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval = interval;
        self
    }

    /// Run the sweep loop until the cancellation token is triggered.
    ///
    /// Should be spawned as a background task:
    /// ```rust,ignore
    /// tokio::spawn(sweeper.run(shutdown.clone()));
    /// ```
    pub async fn run(self, shutdown: CancellationToken) {
        info!(
            interval_secs = self.sweep_interval.as_secs(),
            "Refresh token sweeper starting"
        );

        loop {
            if shutdown.is_cancelled() {
                info!("Refresh token sweeper shutting down");
                return;
            }

            self.sweep_step();

            tokio::select! {
                _ = tokio::time::sleep(self.sweep_interval) => {},
                _ = shutdown.cancelled() => {
                    info!("Refresh token sweeper shutting down");
                    return;
                }
            }
        }
    }

    /// Execute one sweep: delete every record past its expiry.
    fn sweep_step(&self) {
        match self.store.sweep_expired(Utc::now()) {
            Ok(0) => {}
            Ok(removed) => {
                info!(removed, "Swept expired refresh tokens");
            }
            Err(e) => {
                warn!(error = %e, "Refresh token sweep failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::Role;
    use crate::storage::{AuthDatabase, RefreshTokenRecord};
    use std::sync::Arc;

    fn expired_record(token_id: &str) -> RefreshTokenRecord {
        let now = Utc::now();
        RefreshTokenRecord {
            token_id: token_id.to_string(),
            token_hash: format!("hash-{token_id}"),
            user_id: "u-1".to_string(),
            role: Role::Student,
            issued_at: now - chrono::Duration::days(30),
            expires_at: now - chrono::Duration::days(23),
            revoked_at: None,
            replaced_by: None,
            client_ip: "203.0.113.7".to_string(),
            user_agent: None,
        }
    }

    #[tokio::test]
    async fn sweeper_removes_expired_records_then_stops_on_cancel() {
        let dir = tempfile::tempdir().unwrap();
        let db = Arc::new(AuthDatabase::open(&dir.path().join("auth.redb")).unwrap());
        let store = RefreshTokenStore::new(db);
        store.insert(&expired_record("tok-stale")).unwrap();

        let shutdown = CancellationToken::new();
        let sweeper =
            TokenSweeper::new(store.clone()).with_interval(Duration::from_millis(10));
        let handle = tokio::spawn(sweeper.run(shutdown.clone()));

        tokio::time::sleep(Duration::from_millis(50)).await;
        shutdown.cancel();
        handle.await.unwrap();

        assert!(store.get("tok-stale").unwrap().is_none());
    }
}
