// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Campus Portal

//! Axum extractor for authenticated users.
//!
//! Use the `Auth` extractor in handlers to require authentication:
//!
//! ```rust,ignore
//! async fn my_handler(Auth(user): Auth) -> impl IntoResponse {
//!     // user is AuthenticatedUser
//! }
//! ```
//!
//! The access token is read from the `auth_token` cookie (browser clients)
//! or from `Authorization: Bearer <token>` (API clients). Verification is
//! stateless; revocation takes effect at the next refresh.

use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};
use axum_extra::extract::cookie::CookieJar;

use super::{AuthenticatedUser, AuthError};
use crate::config::ACCESS_COOKIE;
use crate::state::AppState;

/// Extractor for authenticated users.
///
/// # Example
///
/// ```rust,ignore
/// async fn me(
///     Auth(user): Auth,
///     State(state): State<AppState>,
/// ) -> Result<Json<UserSummary>, AuthError> {
///     // user.user_id and user.role are verified
/// }
/// ```
pub struct Auth(pub AuthenticatedUser);

impl FromRequestParts<AppState> for Auth {
    type Rejection = AuthError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        // First check if an earlier layer already authenticated the request
        if let Some(user) = parts.extensions.get::<AuthenticatedUser>().cloned() {
            return Ok(Auth(user));
        }

        let token = extract_token(parts)?;
        let claims = state.tokens.verify_access_token(&token)?;
        Ok(Auth(AuthenticatedUser::from(claims)))
    }
}

/// Pull the raw access token from the cookie or the Authorization header.
fn extract_token(parts: &Parts) -> Result<String, AuthError> {
    let jar = CookieJar::from_headers(&parts.headers);
    if let Some(cookie) = jar.get(ACCESS_COOKIE) {
        return Ok(cookie.value().to_string());
    }

    let auth_header = match parts.headers.get(AUTHORIZATION) {
        Some(value) => value.to_str().map_err(|_| AuthError::InvalidAuthHeader)?,
        None => return Err(AuthError::MissingToken),
    };
    auth_header
        .strip_prefix("Bearer ")
        .map(str::to_string)
        .ok_or(AuthError::InvalidAuthHeader)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::Role;
    use crate::state::AppState;
    use axum::http::Request;
    use chrono::Utc;
    use tempfile::TempDir;

    fn test_state() -> (AppState, TempDir) {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let state = AppState::for_tests(dir.path(), b"test-signing-secret");
        (state, dir)
    }

    fn issue_token(state: &AppState) -> String {
        state
            .tokens
            .issue_access_token("user_123", Role::Teacher, "+10000000001", 0, Utc::now())
            .unwrap()
    }

    #[tokio::test]
    async fn extractor_rejects_anonymous_requests() {
        let (state, _dir) = test_state();
        let mut parts = Request::builder()
            .uri("/test")
            .body(())
            .unwrap()
            .into_parts()
            .0;

        let result = Auth::from_request_parts(&mut parts, &state).await;
        assert!(matches!(result, Err(AuthError::MissingToken)));
    }

    #[tokio::test]
    async fn extractor_accepts_bearer_header() {
        let (state, _dir) = test_state();
        let token = issue_token(&state);
        let mut parts = Request::builder()
            .uri("/test")
            .header("Authorization", format!("Bearer {token}"))
            .body(())
            .unwrap()
            .into_parts()
            .0;

        let user = Auth::from_request_parts(&mut parts, &state).await.unwrap().0;
        assert_eq!(user.user_id, "user_123");
        assert_eq!(user.role, Role::Teacher);
    }

    #[tokio::test]
    async fn extractor_accepts_auth_cookie() {
        let (state, _dir) = test_state();
        let token = issue_token(&state);
        let mut parts = Request::builder()
            .uri("/test")
            .header("Cookie", format!("{ACCESS_COOKIE}={token}"))
            .body(())
            .unwrap()
            .into_parts()
            .0;

        let user = Auth::from_request_parts(&mut parts, &state).await.unwrap().0;
        assert_eq!(user.user_id, "user_123");
    }

    #[tokio::test]
    async fn extractor_rejects_non_bearer_schemes() {
        let (state, _dir) = test_state();
        let mut parts = Request::builder()
            .uri("/test")
            .header("Authorization", "Basic dXNlcjpwYXNz")
            .body(())
            .unwrap()
            .into_parts()
            .0;

        let result = Auth::from_request_parts(&mut parts, &state).await;
        assert!(matches!(result, Err(AuthError::InvalidAuthHeader)));
    }

    #[tokio::test]
    async fn extractor_prefers_extensions() {
        let (state, _dir) = test_state();
        let mut parts = Request::builder()
            .uri("/test")
            .body(())
            .unwrap()
            .into_parts()
            .0;

        let user = AuthenticatedUser {
            user_id: "user_from_middleware".to_string(),
            role: Role::Admin,
            phone: "+1".to_string(),
            token_version: 0,
            expires_at: 0,
        };
        parts.extensions.insert(user);

        let result = Auth::from_request_parts(&mut parts, &state).await.unwrap();
        assert_eq!(result.0.user_id, "user_from_middleware");
    }

    #[tokio::test]
    async fn extractor_rejects_foreign_tokens() {
        let (state, _dir) = test_state();
        let foreign = crate::auth::TokenService::new(b"someone-elses-secret")
            .issue_access_token("user_123", Role::Teacher, "+1", 0, Utc::now())
            .unwrap();
        let mut parts = Request::builder()
            .uri("/test")
            .header("Authorization", format!("Bearer {foreign}"))
            .body(())
            .unwrap()
            .into_parts()
            .0;

        let result = Auth::from_request_parts(&mut parts, &state).await;
        assert!(matches!(result, Err(AuthError::TokenInvalid)));
    }
}
