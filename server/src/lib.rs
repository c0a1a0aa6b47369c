//! Documentation of a leader/follower walk-tracking backend.
//!
//! # General Infrastructure
//! - A leader device POSTs its GPS position every few seconds
//! - Follower devices poll a read endpoint to render the leader on a map
//! - One JSON document per tracking session holds every active leader
//! - The document lives in Redis so it survives restarts and is visible
//!   to every request, which process memory and `/tmp` files are not
//!
//!
//!
//! # Notes
//!
//! ## Why a single document
//! All leaders of a session fit comfortably in one small JSON blob, and a
//! follower poll wants all of them at once anyway. One key per session
//! keeps a read to a single round trip and makes the write path a plain
//! read-merge-write.
//!
//! The merge is not atomic against the store, so updates are serialized
//! behind an in-process lock. At a handful of leaders per session the
//! lock is never contended; a multi-instance deployment would move the
//! merge into per-field store operations instead.
//!
//! ## Read path never fails
//! Followers poll continuously. A backend outage is served as the empty
//! "no leader" document with a diagnostic `source` field, while leader
//! devices see real errors on their updates so they can retry.
use std::{sync::Arc, time::Duration};

use axum::{
    Router,
    http::{
        Method,
        header::{AUTHORIZATION, CONTENT_TYPE},
    },
    routing::{get, post},
};

use signal::{
    ctrl_c,
    unix::{SignalKind, signal},
};
use tokio::{net::TcpListener, signal};
use tower_http::cors::{Any, CorsLayer};
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt};

pub mod config;
pub mod database;
pub mod error;
pub mod leader;
pub mod routes;
pub mod state;
pub mod store;

use routes::{
    leader_data_handler, method_not_allowed_handler, preflight_handler, remove_leader_handler,
    update_leader_handler,
};
use state::AppState;

pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE, AUTHORIZATION])
        .max_age(Duration::from_secs(60 * 60));

    Router::new()
        .route(
            "/leader",
            post(update_leader_handler)
                .options(preflight_handler)
                .fallback(method_not_allowed_handler),
        )
        .route(
            "/leader-data",
            get(leader_data_handler)
                .options(preflight_handler)
                .fallback(method_not_allowed_handler),
        )
        .route(
            "/leader/remove",
            post(remove_leader_handler)
                .options(preflight_handler)
                .fallback(method_not_allowed_handler),
        )
        .layer(cors)
        .with_state(state)
}

pub async fn start_server() {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    info!("Initializing state...");
    let state = AppState::new().await;

    info!("Starting server...");
    let address = format!("0.0.0.0:{}", state.config.port);
    let app = build_router(state);

    info!("Binding to {address}");
    let listener = TcpListener::bind(&address).await.unwrap();
    info!("Server running on {address}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .unwrap();

    println!("Server shutting down...");
}

async fn shutdown_signal() {
    let ctrl_c = async {
        ctrl_c().await.expect("Failed to install Ctrl+C handler");

        info!("Received Ctrl+C, shutting down");
    };

    #[cfg(unix)]
    let terminate = async {
        signal(SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;

        info!("Received terminate signal, shutting down");
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
