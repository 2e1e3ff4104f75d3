// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Campus Portal

//! # Authentication Module
//!
//! Token issuance, verification and password hashing for the campus portal.
//!
//! ## Session Flow
//!
//! 1. Client logs in with identifier + password at `/v1/auth/login`
//! 2. Service resolves the identifier across the identity stores and
//!    verifies the password (argon2id)
//! 3. On success it issues:
//!    - a short-lived HS256 access token (`auth_token` cookie, also in the
//!      response body for `Authorization: Bearer` clients)
//!    - a rotating refresh token (`refresh_token` cookie scoped to the
//!      refresh endpoint)
//! 4. Subsequent requests authenticate with the access token only; no
//!    store lookup on the hot path
//!
//! ## Security
//!
//! - Access tokens embed a `tv` (token version) claim; bumping the stored
//!   version invalidates every outstanding token at its next refresh
//! - Refresh tokens are single-use; reuse of a revoked token revokes all
//!   of the user's sessions
//! - Clock skew tolerance is 60 seconds

pub mod claims;
pub mod error;
pub mod extractor;
pub mod password;
pub mod roles;
pub mod tokens;

pub use claims::AuthenticatedUser;
pub use error::AuthError;
pub use extractor::Auth;
pub use roles::Role;
pub use tokens::TokenService;
