// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Campus Portal

//! Authentication and session errors.

use axum::{
    http::{header::RETRY_AFTER, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// Error type for login, refresh and token verification.
///
/// `InvalidCredentials` is deliberately generic: a missing identifier and a
/// wrong password produce the same variant, so responses never reveal
/// whether an identifier is registered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// No access token in cookie or Authorization header
    MissingToken,
    /// Invalid authorization header format
    InvalidAuthHeader,
    /// Token is malformed, mis-typed or carries a bad signature
    TokenInvalid,
    /// Token has expired
    TokenExpired,
    /// A revoked refresh token was presented again (theft signal)
    TokenReuseDetected,
    /// The user's token version was bumped after issuance
    TokenVersionStale,
    /// Unknown identifier or wrong secret (never distinguished)
    InvalidCredentials,
    /// Too many requests for this action from this client
    RateLimited {
        /// Seconds until the window resets
        retry_after: u64,
    },
    /// Malformed request shape
    Validation(String),
    /// Backing store failure (retryable, never a security rejection)
    StoreUnavailable(String),
}

#[derive(Serialize)]
struct AuthErrorBody {
    error: String,
    error_code: String,
}

impl AuthError {
    /// Get the error code for this error.
    pub fn error_code(&self) -> &'static str {
        match self {
            AuthError::MissingToken => "missing_token",
            AuthError::InvalidAuthHeader => "invalid_auth_header",
            AuthError::TokenInvalid => "token_invalid",
            AuthError::TokenExpired => "token_expired",
            AuthError::TokenReuseDetected => "token_reuse_detected",
            AuthError::TokenVersionStale => "token_version_stale",
            AuthError::InvalidCredentials => "invalid_credentials",
            AuthError::RateLimited { .. } => "rate_limited",
            AuthError::Validation(_) => "validation_error",
            AuthError::StoreUnavailable(_) => "store_unavailable",
        }
    }

    /// Get the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            AuthError::MissingToken
            | AuthError::InvalidAuthHeader
            | AuthError::TokenInvalid
            | AuthError::TokenExpired
            | AuthError::TokenReuseDetected
            | AuthError::TokenVersionStale
            | AuthError::InvalidCredentials => StatusCode::UNAUTHORIZED,
            AuthError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            AuthError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AuthError::StoreUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    /// Whether the caller may retry the same request unchanged.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            AuthError::StoreUnavailable(_) | AuthError::RateLimited { .. }
        )
    }
}

impl std::fmt::Display for AuthError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuthError::MissingToken => write!(f, "Authentication required"),
            AuthError::InvalidAuthHeader => {
                write!(f, "Invalid authorization header format (expected 'Bearer <token>')")
            }
            AuthError::TokenInvalid => write!(f, "Token is invalid"),
            AuthError::TokenExpired => write!(f, "Token has expired"),
            AuthError::TokenReuseDetected => write!(f, "Session is no longer valid"),
            AuthError::TokenVersionStale => write!(f, "Session is no longer valid"),
            AuthError::InvalidCredentials => write!(f, "Invalid identifier or password"),
            AuthError::RateLimited { retry_after } => {
                write!(f, "Too many attempts, retry after {retry_after} seconds")
            }
            AuthError::Validation(msg) => write!(f, "Invalid request: {msg}"),
            AuthError::StoreUnavailable(msg) => write!(f, "Service temporarily unavailable: {msg}"),
        }
    }
}

impl std::error::Error for AuthError {}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = Json(AuthErrorBody {
            error: self.to_string(),
            error_code: self.error_code().to_string(),
        });

        match self {
            AuthError::RateLimited { retry_after } => {
                (status, [(RETRY_AFTER, retry_after.to_string())], body).into_response()
            }
            _ => (status, body).into_response(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    #[tokio::test]
    async fn invalid_credentials_returns_401() {
        let response = AuthError::InvalidCredentials.into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let body_bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&body_bytes).unwrap();
        assert_eq!(body["error_code"], "invalid_credentials");
    }

    #[tokio::test]
    async fn rate_limited_sets_retry_after_header() {
        let response = AuthError::RateLimited { retry_after: 42 }.into_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers().get(RETRY_AFTER).unwrap(), "42");
    }

    #[tokio::test]
    async fn store_unavailable_returns_503() {
        let response = AuthError::StoreUnavailable("db down".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn reuse_and_stale_share_a_generic_message() {
        // Refresh rejections force re-login either way; the body must not
        // hint at which internal state tripped.
        assert_eq!(
            AuthError::TokenReuseDetected.to_string(),
            AuthError::TokenVersionStale.to_string()
        );
    }
}
