// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Campus Portal

//! # Persistent Storage Module
//!
//! All durable state lives in a single embedded redb database (pure Rust,
//! ACID). Request handling is stateless; nothing here is cached in process
//! memory, so any number of handlers can run against the same file.
//!
//! ## Table Layout
//!
//! - `identities_*`: one table per identity store, user_id → record
//! - `phone_index`: `source|phone` → user_id
//! - `refresh_tokens`: token_id → serialized RefreshTokenRecord
//! - `user_tokens`: composite key (user_id|token_id) → ()
//! - `security_events`: time-ordered key → serialized SecurityEvent
//!
//! redb serializes write transactions, which is what makes the refresh
//! rotation compare-and-set in [`refresh_tokens`] genuinely atomic.

pub mod database;
pub mod refresh_tokens;

pub use database::{AuthDatabase, StoreError, StoreResult};
pub use refresh_tokens::{RefreshTokenRecord, RefreshTokenStore, RotateOutcome};
