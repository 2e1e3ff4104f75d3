// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Campus Portal

//! Windowed request throttling keyed by `(action, client)`.
//!
//! Pure counting; the limiter knows nothing about auth semantics. The
//! backing counter store is an injected trait so the default in-memory
//! implementation can be swapped for a shared store in horizontally scaled
//! deployments - process-local counters are only correct for a single
//! instance.
//!
//! ## Failure policy
//!
//! If the counter store is unavailable the limiter degrades per preset:
//! fail **closed** for login and password-reset (credential-guessing paths
//! must not open up when the limiter breaks), fail **open** for refresh and
//! generic API traffic (a broken limiter must not take down all
//! authenticated traffic). This bounds damage either way; it is policy, not
//! a hard security guarantee.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, Utc};
use tracing::warn;

/// Action classes with distinct budgets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimitAction {
    Login,
    PasswordReset,
    Refresh,
    Api,
}

impl RateLimitAction {
    /// Short tag used in counter keys and logs.
    pub fn tag(&self) -> &'static str {
        match self {
            RateLimitAction::Login => "login",
            RateLimitAction::PasswordReset => "password_reset",
            RateLimitAction::Refresh => "refresh",
            RateLimitAction::Api => "api",
        }
    }

    /// Budget and failure policy for this action class.
    pub fn preset(&self) -> Preset {
        match self {
            RateLimitAction::Login => Preset {
                max_requests: 5,
                window: Duration::minutes(15),
                fail_open: false,
            },
            RateLimitAction::PasswordReset => Preset {
                max_requests: 3,
                window: Duration::hours(1),
                fail_open: false,
            },
            RateLimitAction::Refresh => Preset {
                max_requests: 30,
                window: Duration::minutes(1),
                fail_open: true,
            },
            RateLimitAction::Api => Preset {
                max_requests: 120,
                window: Duration::minutes(1),
                fail_open: true,
            },
        }
    }
}

/// `(window, budget, failure policy)` for one action class.
#[derive(Debug, Clone, Copy)]
pub struct Preset {
    pub max_requests: u32,
    pub window: Duration,
    pub fail_open: bool,
}

/// Limiter verdict for one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allowed,
    Limited {
        /// Seconds until the window resets.
        retry_after: u64,
    },
}

/// Count within the current window after incrementing.
#[derive(Debug, Clone, Copy)]
pub struct WindowCount {
    pub count: u32,
    /// Seconds until the window resets.
    pub resets_in: u64,
}

#[derive(Debug, thiserror::Error)]
#[error("counter store unavailable: {0}")]
pub struct CounterError(pub String);

/// Backing store for rate-limit buckets.
pub trait CounterStore: Send + Sync {
    /// Increment the bucket for `key`, resetting it first if its window
    /// has elapsed, and return the new count.
    fn incr(
        &self,
        key: &str,
        window: Duration,
        now: DateTime<Utc>,
    ) -> Result<WindowCount, CounterError>;
}

/// Fixed-window in-process counter store.
///
/// Suitable for tests and single-instance deployments only; counters are
/// not shared across processes.
#[derive(Default)]
pub struct InMemoryCounterStore {
    buckets: Mutex<HashMap<String, Bucket>>,
}

#[derive(Debug, Clone, Copy)]
struct Bucket {
    window_start: DateTime<Utc>,
    count: u32,
}

impl InMemoryCounterStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CounterStore for InMemoryCounterStore {
    fn incr(
        &self,
        key: &str,
        window: Duration,
        now: DateTime<Utc>,
    ) -> Result<WindowCount, CounterError> {
        let mut buckets = self
            .buckets
            .lock()
            .map_err(|_| CounterError("poisoned counter lock".to_string()))?;

        let bucket = buckets.entry(key.to_string()).or_insert(Bucket {
            window_start: now,
            count: 0,
        });

        if now - bucket.window_start >= window {
            bucket.window_start = now;
            bucket.count = 0;
        }
        bucket.count += 1;

        let resets_at = bucket.window_start + window;
        let resets_in = (resets_at - now).num_seconds().max(1) as u64;

        Ok(WindowCount {
            count: bucket.count,
            resets_in,
        })
    }
}

/// Throttles requests per `(action, client)` key.
#[derive(Clone)]
pub struct RateLimiter {
    store: Arc<dyn CounterStore>,
}

impl RateLimiter {
    pub fn new(store: Arc<dyn CounterStore>) -> Self {
        Self { store }
    }

    /// Count this request and decide whether it may proceed.
    pub fn check(&self, action: RateLimitAction, client_key: &str, now: DateTime<Utc>) -> Decision {
        let preset = action.preset();
        let key = format!("{}:{}", action.tag(), client_key);

        match self.store.incr(&key, preset.window, now) {
            Ok(window) if window.count <= preset.max_requests => Decision::Allowed,
            Ok(window) => Decision::Limited {
                retry_after: window.resets_in,
            },
            Err(e) => {
                warn!(
                    action = action.tag(),
                    error = %e,
                    fail_open = preset.fail_open,
                    "Rate-limit counter store unavailable"
                );
                if preset.fail_open {
                    Decision::Allowed
                } else {
                    Decision::Limited {
                        retry_after: preset.window.num_seconds().max(1) as u64,
                    }
                }
            }
        }
    }
}
