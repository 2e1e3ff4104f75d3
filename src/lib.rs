// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Campus Portal

//! Campus Auth - Portal Session & Credential Authentication Service
//!
//! This crate authenticates portal users against role-segregated identity
//! stores and manages their sessions: short-lived access tokens, rotating
//! refresh tokens with reuse detection, rate limiting and security-event
//! auditing.
//!
//! ## Modules
//!
//! - `api` - HTTP API handlers (Axum)
//! - `auth` - Tokens, password hashing, the `Auth` extractor
//! - `identity` - Identity stores and credential resolution
//! - `session` - Login / refresh / logout / password-reset orchestration
//! - `storage` - Embedded database (redb) and refresh-token records
//! - `audit` - Append-only security-event log
//! - `ratelimit` - Windowed request throttling
//! - `sweeper` - Background GC for expired refresh tokens

pub mod api;
pub mod audit;
pub mod auth;
pub mod config;
pub mod identity;
pub mod models;
pub mod ratelimit;
pub mod session;
pub mod state;
pub mod storage;
pub mod sweeper;
