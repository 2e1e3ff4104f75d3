// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Campus Portal

//! Token claims and the authenticated user representation.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::roles::Role;

/// Claims carried by a short-lived access token.
///
/// Access tokens are never persisted server-side. They become invalid at
/// expiry, or implicitly on the next refresh once the user's token version
/// has been bumped.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessClaims {
    /// Subject - the portal user id.
    pub sub: String,

    /// Resolved role, embedded so request handling never re-queries it.
    pub role: Role,

    /// Login identifier (phone) of the subject.
    pub phone: String,

    /// Per-user token version at issuance time.
    pub tv: u32,

    /// Issued at (Unix timestamp).
    pub iat: i64,

    /// Expiration (Unix timestamp).
    pub exp: i64,

    /// Token class discriminator, always `"access"`.
    pub typ: String,
}

/// Claims carried by a refresh token.
///
/// The `jti` correlates the signed token with its persisted
/// [`RefreshTokenRecord`](crate::storage::RefreshTokenRecord).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshClaims {
    /// Subject - the portal user id.
    pub sub: String,

    /// Resolved role at issuance time.
    pub role: Role,

    /// Per-user token version at issuance time.
    pub tv: u32,

    /// Unique token id, the key of the persisted record.
    pub jti: String,

    /// Issued at (Unix timestamp).
    pub iat: i64,

    /// Expiration (Unix timestamp).
    pub exp: i64,

    /// Token class discriminator, always `"refresh"`.
    pub typ: String,
}

/// Authenticated user information extracted from a verified access token.
///
/// This is the primary type handed to the rest of the portal per request:
/// a verified identity plus role, nothing more.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AuthenticatedUser {
    /// Portal user id.
    pub user_id: String,

    /// Resolved role.
    pub role: Role,

    /// Login identifier (phone).
    pub phone: String,

    /// Token version at issuance (used for validation, not serialized).
    #[serde(skip)]
    pub token_version: u32,

    /// Token expiration (Unix timestamp, used for validation, not serialized).
    #[serde(skip)]
    pub expires_at: i64,
}

impl From<AccessClaims> for AuthenticatedUser {
    fn from(claims: AccessClaims) -> Self {
        Self {
            user_id: claims.sub,
            role: claims.role,
            phone: claims.phone,
            token_version: claims.tv,
            expires_at: claims.exp,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn authenticated_user_from_access_claims() {
        let claims = AccessClaims {
            sub: "u-1".to_string(),
            role: Role::Teacher,
            phone: "+10000000001".to_string(),
            tv: 3,
            iat: 1700000000,
            exp: 1700000900,
            typ: "access".to_string(),
        };

        let user = AuthenticatedUser::from(claims);
        assert_eq!(user.user_id, "u-1");
        assert_eq!(user.role, Role::Teacher);
        assert_eq!(user.token_version, 3);
        assert_eq!(user.expires_at, 1700000900);
    }
}
