// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Campus Portal

//! Authentication endpoints: login, refresh, logout, password reset.
//!
//! Cookie policy:
//!
//! - `auth_token`: access token, path `/`, HttpOnly, SameSite=Strict
//! - `refresh_token`: refresh token, path-scoped to `/v1/auth/refresh` so
//!   the browser only ever sends it to the endpoint that rotates it
//!
//! Both carry `Secure` unless `COOKIE_SECURE=false` (local development).
//! A refresh rejection that judged the token clears both cookies so a
//! browser client falls back to the login page instead of retrying a dead
//! token; retryable rejections (429, 503) leave the cookies in place.

use axum::{
    extract::State,
    http::{
        header::{HeaderMap, HeaderValue, SET_COOKIE, USER_AGENT},
        StatusCode,
    },
    response::{IntoResponse, Response},
    Json,
};
use axum_extra::extract::cookie::CookieJar;

use crate::auth::AuthError;
use crate::config::{self, ACCESS_COOKIE, REFRESH_COOKIE, REFRESH_COOKIE_PATH};
use crate::models::{
    LoginRequest, LogoutResponse, PasswordResetRequest, PasswordResetResponse, SessionResponse,
};
use crate::session::{ClientInfo, SessionTokens};
use crate::state::AppState;

// =============================================================================
// Cookie Helpers
// =============================================================================

fn build_cookie(name: &str, value: &str, path: &str, max_age: i64, secure: bool) -> HeaderValue {
    let mut cookie =
        format!("{name}={value}; Path={path}; HttpOnly; SameSite=Strict; Max-Age={max_age}");
    if secure {
        cookie.push_str("; Secure");
    }
    // Token and path values are ASCII by construction.
    HeaderValue::from_str(&cookie).unwrap_or_else(|_| HeaderValue::from_static(""))
}

/// `Set-Cookie` pair installing a fresh session.
fn session_cookies(state: &AppState, tokens: &SessionTokens) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.append(
        SET_COOKIE,
        build_cookie(
            ACCESS_COOKIE,
            &tokens.access_token,
            "/",
            config::access_token_ttl().num_seconds(),
            state.cookie_secure,
        ),
    );
    headers.append(
        SET_COOKIE,
        build_cookie(
            REFRESH_COOKIE,
            &tokens.refresh_token,
            REFRESH_COOKIE_PATH,
            config::refresh_token_ttl().num_seconds(),
            state.cookie_secure,
        ),
    );
    headers
}

/// `Set-Cookie` pair expiring both session cookies.
fn clear_cookies(state: &AppState) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.append(
        SET_COOKIE,
        build_cookie(ACCESS_COOKIE, "", "/", 0, state.cookie_secure),
    );
    headers.append(
        SET_COOKIE,
        build_cookie(REFRESH_COOKIE, "", REFRESH_COOKIE_PATH, 0, state.cookie_secure),
    );
    headers
}

/// Client attribution for records and audit events.
///
/// Honors the first `X-Forwarded-For` hop when present (the service sits
/// behind the portal's reverse proxy).
fn client_info(headers: &HeaderMap) -> ClientInfo {
    let ip = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|v| v.trim().to_string())
        .unwrap_or_else(|| "unknown".to_string());
    let user_agent = headers
        .get(USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    ClientInfo::new(ip, user_agent)
}

// =============================================================================
// Handlers
// =============================================================================

/// Authenticate with identifier + password and open a session.
#[utoipa::path(
    post,
    path = "/v1/auth/login",
    tag = "Auth",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Session opened, cookies set", body = SessionResponse),
        (status = 401, description = "Invalid identifier or password"),
        (status = 429, description = "Too many attempts"),
    )
)]
pub async fn login(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<LoginRequest>,
) -> Result<Response, AuthError> {
    let client = client_info(&headers);
    let tokens = state
        .sessions
        .login(&request.identifier, &request.secret, &client)?;

    let response = SessionResponse::from_tokens(&tokens);
    Ok((session_cookies(&state, &tokens), Json(response)).into_response())
}

/// Rotate the refresh cookie into a new session token pair.
///
/// Cookie-only: the refresh token is never accepted from a header or body.
#[utoipa::path(
    post,
    path = "/v1/auth/refresh",
    tag = "Auth",
    responses(
        (status = 200, description = "Session renewed, cookies rewritten", body = SessionResponse),
        (status = 401, description = "Refresh rejected, cookies cleared"),
        (status = 429, description = "Too many attempts"),
    )
)]
pub async fn refresh(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let client = client_info(&headers);
    let jar = CookieJar::from_headers(&headers);
    let Some(cookie) = jar.get(REFRESH_COOKIE) else {
        return rejected(&state, AuthError::MissingToken);
    };

    match state.sessions.refresh(cookie.value(), &client) {
        Ok(tokens) => {
            let response = SessionResponse::from_tokens(&tokens);
            (session_cookies(&state, &tokens), Json(response)).into_response()
        }
        Err(e) => rejected(&state, e),
    }
}

/// A refresh rejection clears both cookies, unless the error is retryable
/// (rate limit, store outage) and never judged the token itself.
fn rejected(state: &AppState, error: AuthError) -> Response {
    if error.is_retryable() {
        return error.into_response();
    }
    let headers = clear_cookies(state);
    let mut response = error.into_response();
    response.headers_mut().extend(headers);
    response
}

/// Close the current session and clear both cookies.
#[utoipa::path(
    post,
    path = "/v1/auth/logout",
    tag = "Auth",
    responses(
        (status = 200, description = "Session closed, cookies cleared", body = LogoutResponse),
    )
)]
pub async fn logout(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let client = client_info(&headers);
    let jar = CookieJar::from_headers(&headers);
    let refresh_token = jar.get(REFRESH_COOKIE).map(|c| c.value().to_string());

    state.sessions.logout(refresh_token.as_deref(), &client);

    (
        clear_cookies(&state),
        Json(LogoutResponse { success: true }),
    )
        .into_response()
}

/// Request a password-reset token for an identifier.
///
/// The response is identical whether or not the identifier is registered.
#[utoipa::path(
    post,
    path = "/v1/auth/password-reset",
    tag = "Auth",
    request_body = PasswordResetRequest,
    responses(
        (status = 200, description = "Acknowledged", body = PasswordResetResponse),
        (status = 429, description = "Too many attempts"),
    )
)]
pub async fn password_reset(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<PasswordResetRequest>,
) -> Result<(StatusCode, Json<PasswordResetResponse>), AuthError> {
    let client = client_info(&headers);
    let outcome = state
        .sessions
        .password_reset_request(&request.identifier, &client)?;

    #[cfg(not(feature = "dev"))]
    let _ = outcome;
    #[allow(unused_mut)]
    let mut response = PasswordResetResponse::acknowledged();
    #[cfg(feature = "dev")]
    {
        response.reset_token = outcome.reset_token;
    }
    Ok((StatusCode::OK, Json(response)))
}
