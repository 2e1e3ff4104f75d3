// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Campus Portal

//! User endpoints.

use axum::{extract::State, http::header::HeaderMap, Json};
use chrono::Utc;

use crate::auth::{Auth, AuthError};
use crate::models::UserSummary;
use crate::ratelimit::{Decision, RateLimitAction};
use crate::state::AppState;

/// Get the current authenticated user's information.
///
/// The echo endpoint the rest of the portal uses to bootstrap a page load:
/// a verified identity with role, nothing more.
#[utoipa::path(
    get,
    path = "/v1/users/me",
    tag = "Users",
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Verified identity", body = UserSummary),
        (status = 401, description = "Unauthorized - invalid or missing token"),
        (status = 429, description = "Too many requests"),
    )
)]
pub async fn get_current_user(
    State(state): State<AppState>,
    headers: HeaderMap,
    Auth(user): Auth,
) -> Result<Json<UserSummary>, AuthError> {
    let client_ip = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|v| v.trim().to_string())
        .unwrap_or_else(|| "unknown".to_string());

    if let Decision::Limited { retry_after } =
        state
            .limiter
            .check(RateLimitAction::Api, &client_ip, Utc::now())
    {
        return Err(AuthError::RateLimited { retry_after });
    }

    // Name is not embedded in the access token; fetch the current row.
    let name = state
        .directory
        .get(&user.user_id, user.role)
        .map_err(|e| AuthError::StoreUnavailable(e.to_string()))?
        .map(|record| record.name)
        .ok_or(AuthError::TokenInvalid)?;

    Ok(Json(UserSummary {
        user_id: user.user_id,
        name,
        phone: user.phone,
        role: user.role,
    }))
}
