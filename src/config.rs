// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Campus Portal

//! # Runtime Configuration Constants
//!
//! This module defines environment variable names, default values and the
//! token/rate-limit policy constants used throughout the service.
//! Configuration is loaded from the environment at startup.
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `DATA_DIR` | Directory holding the embedded auth database | `/data` |
//! | `HOST` | Server bind address | `0.0.0.0` |
//! | `PORT` | Server bind port | `8080` |
//! | `TOKEN_SIGNING_KEY` | HS256 secret for access/refresh tokens | Required |
//! | `COOKIE_SECURE` | Set the `Secure` attribute on auth cookies | `true` |
//! | `SEED_IDENTITIES` | Path to a JSON seed file of demo identities | Unset |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter | `info,tower_http=debug` |

use chrono::Duration;

/// Environment variable name for the data directory path.
///
/// The embedded redb database (`auth.redb`) lives here. Identity records,
/// refresh-token records and security events are all stored in it.
pub const DATA_DIR_ENV: &str = "DATA_DIR";

/// Default data directory when `DATA_DIR` is unset.
pub const DEFAULT_DATA_DIR: &str = "/data";

/// Environment variable name for the HS256 token signing key.
pub const TOKEN_SIGNING_KEY_ENV: &str = "TOKEN_SIGNING_KEY";

/// Environment variable controlling the `Secure` cookie attribute.
///
/// Set to `false` only for local development over plain HTTP.
pub const COOKIE_SECURE_ENV: &str = "COOKIE_SECURE";

/// Environment variable pointing at a JSON seed file of identities.
///
/// Provisioning is owned by the wider portal; the seed file exists so the
/// service is bootable on its own in development and demos.
pub const SEED_IDENTITIES_ENV: &str = "SEED_IDENTITIES";

/// Access token lifetime.
pub fn access_token_ttl() -> Duration {
    Duration::minutes(15)
}

/// Refresh token lifetime.
pub fn refresh_token_ttl() -> Duration {
    Duration::days(7)
}

/// Password-reset token lifetime.
pub fn reset_token_ttl() -> Duration {
    Duration::hours(1)
}

/// Clock skew tolerance applied when verifying token expiry (seconds).
pub const CLOCK_SKEW_LEEWAY: u64 = 60;

/// Name of the short-lived access token cookie (path `/`).
pub const ACCESS_COOKIE: &str = "auth_token";

/// Name of the refresh token cookie, scoped to the refresh endpoint.
pub const REFRESH_COOKIE: &str = "refresh_token";

/// Path restriction for the refresh cookie. The browser only sends the
/// refresh token to the endpoint that rotates it.
pub const REFRESH_COOKIE_PATH: &str = "/v1/auth/refresh";
