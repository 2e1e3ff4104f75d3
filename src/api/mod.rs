// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Campus Portal

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::CorsLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::{
    models::{
        LoginRequest, LogoutResponse, PasswordResetRequest, PasswordResetResponse,
        SessionResponse, UserSummary,
    },
    state::AppState,
};

pub mod auth;
pub mod health;
pub mod users;

pub fn router(state: AppState) -> Router {
    let v1_routes = Router::new()
        .route("/auth/login", post(auth::login))
        .route("/auth/refresh", post(auth::refresh))
        .route("/auth/logout", post(auth::logout))
        .route("/auth/password-reset", post(auth::password_reset))
        .route("/users/me", get(users::get_current_user))
        .with_state(state.clone());

    let health_routes = Router::new()
        .route("/health", get(health::health))
        .route("/health/live", get(health::liveness))
        .route("/health/ready", get(health::readiness))
        .with_state(state);

    Router::new()
        .nest("/v1", v1_routes)
        .merge(health_routes)
        .merge(SwaggerUi::new("/docs").url("/api-doc/openapi.json", ApiDoc::openapi()))
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .layer(TraceLayer::new_for_http())
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(CorsLayer::permissive())
}

#[derive(OpenApi)]
#[openapi(
    paths(
        auth::login,
        auth::refresh,
        auth::logout,
        auth::password_reset,
        users::get_current_user,
        health::health,
        health::liveness,
        health::readiness
    ),
    components(
        schemas(
            LoginRequest,
            SessionResponse,
            UserSummary,
            LogoutResponse,
            PasswordResetRequest,
            PasswordResetResponse,
            crate::auth::Role,
            health::HealthResponse,
            health::ReadyResponse,
            health::HealthChecks
        )
    ),
    tags(
        (name = "Auth", description = "Session and credential authentication"),
        (name = "Users", description = "Authenticated user information"),
        (name = "Health", description = "Service health probes")
    )
)]
struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::Role;
    use crate::config::{ACCESS_COOKIE, REFRESH_COOKIE};
    use crate::identity::SeedIdentity;
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Request, StatusCode};
    use tempfile::TempDir;
    use tower::ServiceExt;

    fn test_app() -> (Router, TempDir) {
        let dir = TempDir::new().unwrap();
        let state = AppState::for_tests(dir.path(), b"test-signing-secret");
        state
            .directory
            .seed(&[SeedIdentity {
                phone: "+10000000001".to_string(),
                name: "Demo Teacher".to_string(),
                role: Role::Teacher,
                password: "teacher-password".to_string(),
            }])
            .unwrap();
        (router(state), dir)
    }

    fn login_request(identifier: &str, secret: &str) -> Request<Body> {
        let body = serde_json::json!({ "identifier": identifier, "secret": secret });
        Request::builder()
            .method("POST")
            .uri("/v1/auth/login")
            .header(header::CONTENT_TYPE, "application/json")
            .header("x-forwarded-for", "203.0.113.7")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    /// Value of the named cookie from the response's Set-Cookie headers.
    fn cookie_value(response: &axum::response::Response, name: &str) -> Option<String> {
        response
            .headers()
            .get_all(header::SET_COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .find_map(|cookie| {
                let (pair, _) = cookie.split_once(';')?;
                let (key, value) = pair.split_once('=')?;
                (key == name).then(|| value.to_string())
            })
    }

    #[tokio::test]
    async fn health_endpoints_respond_ok() {
        let (app, _dir) = test_app();
        for uri in ["/health", "/health/live", "/health/ready"] {
            let response = app
                .clone()
                .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::OK, "{uri}");
        }
    }

    #[tokio::test]
    async fn login_sets_both_cookies_and_returns_identity() {
        let (app, _dir) = test_app();
        let response = app
            .oneshot(login_request("+10000000001", "teacher-password"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let access = cookie_value(&response, ACCESS_COOKIE).unwrap();
        let refresh = cookie_value(&response, REFRESH_COOKIE).unwrap();
        assert!(!access.is_empty());
        assert!(!refresh.is_empty());
        assert_ne!(access, refresh);

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["user"]["role"], "teacher");
        assert_eq!(json["user"]["phone"], "+10000000001");
        assert!(json["access_token"].is_string());
        assert!(json.get("refresh_token").is_none());
    }

    #[tokio::test]
    async fn failed_login_has_uniform_401_body() {
        let (app, _dir) = test_app();

        let wrong = app
            .clone()
            .oneshot(login_request("+10000000001", "bad-password"))
            .await
            .unwrap();
        let unknown = app
            .oneshot(login_request("+19999999999", "bad-password"))
            .await
            .unwrap();

        assert_eq!(wrong.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(unknown.status(), StatusCode::UNAUTHORIZED);

        let wrong_body = to_bytes(wrong.into_body(), usize::MAX).await.unwrap();
        let unknown_body = to_bytes(unknown.into_body(), usize::MAX).await.unwrap();
        assert_eq!(wrong_body, unknown_body);
    }

    #[tokio::test]
    async fn refresh_rotates_cookies_and_rejects_the_old_one() {
        let (app, _dir) = test_app();
        let login = app
            .clone()
            .oneshot(login_request("+10000000001", "teacher-password"))
            .await
            .unwrap();
        let first_refresh_token = cookie_value(&login, REFRESH_COOKIE).unwrap();

        let refresh_request = |token: &str| {
            Request::builder()
                .method("POST")
                .uri("/v1/auth/refresh")
                .header(header::COOKIE, format!("{REFRESH_COOKIE}={token}"))
                .header("x-forwarded-for", "203.0.113.7")
                .body(Body::empty())
                .unwrap()
        };

        let renewed = app
            .clone()
            .oneshot(refresh_request(&first_refresh_token))
            .await
            .unwrap();
        assert_eq!(renewed.status(), StatusCode::OK);
        let second_refresh_token = cookie_value(&renewed, REFRESH_COOKIE).unwrap();
        assert_ne!(second_refresh_token, first_refresh_token);

        // Replaying the rotated cookie fails and clears both cookies.
        let replayed = app
            .oneshot(refresh_request(&first_refresh_token))
            .await
            .unwrap();
        assert_eq!(replayed.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(cookie_value(&replayed, ACCESS_COOKIE).unwrap(), "");
        assert_eq!(cookie_value(&replayed, REFRESH_COOKIE).unwrap(), "");
    }

    #[tokio::test]
    async fn refresh_without_cookie_is_401_with_cleared_cookies() {
        let (app, _dir) = test_app();
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/v1/auth/refresh")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(cookie_value(&response, REFRESH_COOKIE).unwrap(), "");
    }

    #[tokio::test]
    async fn rate_limited_refresh_keeps_cookies_and_sets_retry_after() {
        let (app, _dir) = test_app();
        let refresh_request = || {
            Request::builder()
                .method("POST")
                .uri("/v1/auth/refresh")
                .header(header::COOKIE, format!("{REFRESH_COOKIE}=not-a-token"))
                .header("x-forwarded-for", "203.0.113.7")
                .body(Body::empty())
                .unwrap()
        };

        for _ in 0..30 {
            let response = app.clone().oneshot(refresh_request()).await.unwrap();
            assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        }

        let limited = app.oneshot(refresh_request()).await.unwrap();
        assert_eq!(limited.status(), StatusCode::TOO_MANY_REQUESTS);
        assert!(limited.headers().contains_key(header::RETRY_AFTER));
        // The cookies were not judged, so they survive the rejection.
        assert!(cookie_value(&limited, ACCESS_COOKIE).is_none());
        assert!(cookie_value(&limited, REFRESH_COOKIE).is_none());
    }

    #[tokio::test]
    async fn me_requires_and_honors_the_access_token() {
        let (app, _dir) = test_app();
        let login = app
            .clone()
            .oneshot(login_request("+10000000001", "teacher-password"))
            .await
            .unwrap();
        let body = to_bytes(login.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        let access_token = json["access_token"].as_str().unwrap();

        let me = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/v1/users/me")
                    .header(header::AUTHORIZATION, format!("Bearer {access_token}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(me.status(), StatusCode::OK);
        let me_body = to_bytes(me.into_body(), usize::MAX).await.unwrap();
        let me_json: serde_json::Value = serde_json::from_slice(&me_body).unwrap();
        assert_eq!(me_json["name"], "Demo Teacher");
        assert_eq!(me_json["role"], "teacher");

        let anonymous = app
            .oneshot(
                Request::builder()
                    .uri("/v1/users/me")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(anonymous.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn logout_clears_cookies_and_kills_the_session() {
        let (app, _dir) = test_app();
        let login = app
            .clone()
            .oneshot(login_request("+10000000001", "teacher-password"))
            .await
            .unwrap();
        let refresh_token = cookie_value(&login, REFRESH_COOKIE).unwrap();

        let logout = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/v1/auth/logout")
                    .header(header::COOKIE, format!("{REFRESH_COOKIE}={refresh_token}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(logout.status(), StatusCode::OK);
        assert_eq!(cookie_value(&logout, ACCESS_COOKIE).unwrap(), "");

        let replayed = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/v1/auth/refresh")
                    .header(header::COOKIE, format!("{REFRESH_COOKIE}={refresh_token}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(replayed.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn password_reset_acknowledges_unknown_identifiers() {
        let (app, _dir) = test_app();
        let body = serde_json::json!({ "identifier": "+19999999999" });
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/v1/auth/password-reset")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(json["success"], true);
    }
}
