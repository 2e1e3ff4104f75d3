// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Campus Portal

use std::{env, net::SocketAddr, path::Path};

use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::EnvFilter;

use campus_auth::api::router;
use campus_auth::config::{
    COOKIE_SECURE_ENV, DATA_DIR_ENV, DEFAULT_DATA_DIR, SEED_IDENTITIES_ENV, TOKEN_SIGNING_KEY_ENV,
};
use campus_auth::identity::SeedIdentity;
use campus_auth::state::AppState;
use campus_auth::sweeper::TokenSweeper;

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,tower_http=debug"));

    if env::var("LOG_FORMAT").as_deref() == Ok("json") {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

/// Provision identities from the `SEED_IDENTITIES` JSON file, if configured.
fn seed_identities(state: &AppState) {
    let Ok(path) = env::var(SEED_IDENTITIES_ENV) else {
        return;
    };
    let contents = match std::fs::read_to_string(&path) {
        Ok(contents) => contents,
        Err(e) => {
            tracing::warn!(path = %path, error = %e, "Failed to read seed file");
            return;
        }
    };
    let entries: Vec<SeedIdentity> = match serde_json::from_str(&contents) {
        Ok(entries) => entries,
        Err(e) => {
            tracing::warn!(path = %path, error = %e, "Failed to parse seed file");
            return;
        }
    };
    match state.directory.seed(&entries) {
        Ok(inserted) => info!(inserted, total = entries.len(), "Seeded identities"),
        Err(e) => tracing::warn!(error = %e, "Identity seeding failed"),
    }
}

/// Resolve to cancellation once SIGINT or SIGTERM arrives.
async fn shutdown_signal(shutdown: CancellationToken) {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
    shutdown.cancel();
}

#[tokio::main]
async fn main() {
    init_tracing();

    let signing_key =
        env::var(TOKEN_SIGNING_KEY_ENV).expect("TOKEN_SIGNING_KEY must be set");
    let cookie_secure = env::var(COOKIE_SECURE_ENV)
        .map(|v| v != "false")
        .unwrap_or(true);
    let data_dir = env::var(DATA_DIR_ENV).unwrap_or_else(|_| DEFAULT_DATA_DIR.to_string());
    let db_path = Path::new(&data_dir).join("auth.redb");

    let state = AppState::open(&db_path, signing_key.as_bytes(), cookie_secure)
        .expect("Failed to open auth database");

    seed_identities(&state);

    let shutdown = CancellationToken::new();
    let sweeper = TokenSweeper::new(state.refresh_store.clone());
    tokio::spawn(sweeper.run(shutdown.clone()));

    let app = router(state);

    let host = env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
    let port: u16 = env::var("PORT")
        .unwrap_or_else(|_| "8080".to_string())
        .parse()
        .unwrap_or(8080);
    let addr: SocketAddr = format!("{host}:{port}")
        .parse()
        .expect("Failed to parse bind address");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind server address");
    info!(%addr, "Campus auth service listening (docs at /docs)");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown))
        .await
        .expect("Server failed");
}
