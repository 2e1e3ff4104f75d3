// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Campus Portal

//! # API Data Models
//!
//! Request and response structures for the REST API. All types derive
//! `Serialize`, `Deserialize`, and `ToSchema` for automatic JSON handling
//! and OpenAPI documentation.
//!
//! ## Model Categories
//!
//! - **Login**: identifier/password submission and the session response
//! - **Password Reset**: enumeration-safe reset request/response
//! - **User**: the public identity summary handed to the rest of the portal

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::auth::Role;
use crate::session::SessionTokens;

// =============================================================================
// Login Models
// =============================================================================

/// Login submission.
///
/// `identifier` is the phone number the identity was provisioned with. The
/// service resolves it across every identity store; clients do not say which
/// category they belong to.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct LoginRequest {
    /// Login identifier (phone number).
    pub identifier: String,
    /// Plaintext password, verified against the stored argon2id hash.
    pub secret: String,
}

/// Successful login or refresh response body.
///
/// The access token is duplicated in the body for non-browser clients; the
/// cookies carry the same pair for browsers.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SessionResponse {
    /// The authenticated identity.
    pub user: UserSummary,
    /// Short-lived access token for `Authorization: Bearer` use.
    pub access_token: String,
}

impl SessionResponse {
    pub fn from_tokens(tokens: &SessionTokens) -> Self {
        Self {
            user: UserSummary {
                user_id: tokens.user_id.clone(),
                name: tokens.name.clone(),
                phone: tokens.phone.clone(),
                role: tokens.role,
            },
            access_token: tokens.access_token.clone(),
        }
    }
}

/// Public identity summary.
///
/// Deliberately excludes password hashes, token versions and reset state.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct UserSummary {
    /// Portal user id.
    pub user_id: String,
    /// Display name.
    pub name: String,
    /// Login identifier (phone number).
    pub phone: String,
    /// Resolved role.
    pub role: Role,
}

// =============================================================================
// Logout Models
// =============================================================================

/// Logout acknowledgement.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct LogoutResponse {
    pub success: bool,
}

// =============================================================================
// Password Reset Models
// =============================================================================

/// Password-reset request.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PasswordResetRequest {
    /// Login identifier (phone number).
    pub identifier: String,
}

/// Password-reset acknowledgement.
///
/// Identical whether or not the identifier resolved, so the endpoint cannot
/// be used to enumerate registered identifiers. The raw token is present
/// only in `dev` builds; production delivery is out-of-band.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PasswordResetResponse {
    pub success: bool,
    pub message: String,
    #[cfg(feature = "dev")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reset_token: Option<String>,
}

impl PasswordResetResponse {
    pub fn acknowledged() -> Self {
        Self {
            success: true,
            message: "If the identifier is registered, a reset link has been sent".to_string(),
            #[cfg(feature = "dev")]
            reset_token: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_response_copies_identity_without_secrets() {
        let tokens = SessionTokens {
            access_token: "access".to_string(),
            refresh_token: "refresh".to_string(),
            user_id: "u-1".to_string(),
            name: "Demo Teacher".to_string(),
            phone: "+10000000001".to_string(),
            role: Role::Teacher,
        };

        let response = SessionResponse::from_tokens(&tokens);
        assert_eq!(response.user.user_id, "u-1");
        assert_eq!(response.access_token, "access");

        // The refresh token must never appear in a response body.
        let json = serde_json::to_string(&response).unwrap();
        assert!(!json.contains("refresh"));
    }

    #[test]
    fn reset_acknowledgement_is_constant() {
        let a = PasswordResetResponse::acknowledged();
        let b = PasswordResetResponse::acknowledged();
        assert_eq!(
            serde_json::to_string(&a).unwrap(),
            serde_json::to_string(&b).unwrap()
        );
    }
}
