// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use axum::{
    extract::DefaultBodyLimit,
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use super::detect::detect_handler;
use crate::vision::ObjectDetector;

/// Request body cap; generous enough for a batch of images, each of
/// which is individually bounded by the per-file size guard.
const MAX_BODY_SIZE: usize = 50 * 1024 * 1024;

/// Shared state handed to every request handler.
///
/// The detector is injected rather than held as a global so tests can
/// substitute a stub implementation.
#[derive(Clone)]
pub struct AppState {
    pub detector: Arc<dyn ObjectDetector>,
}

impl AppState {
    pub fn new(detector: Arc<dyn ObjectDetector>) -> Self {
        Self { detector }
    }
}

/// Builds the application router.
///
/// Exposed separately from [`start_server`] so tests can drive the
/// router directly with `tower::ServiceExt::oneshot`.
pub fn create_app(state: AppState) -> Router {
    Router::new()
        // Liveness check; never depends on detector state
        .route("/", get(ping_handler))
        // Detection endpoint
        .route("/detect", post(detect_handler))
        .layer(DefaultBodyLimit::max(MAX_BODY_SIZE))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

/// Binds the listener and serves requests until the process exits.
pub async fn start_server(
    listen_addr: &str,
    detector: Arc<dyn ObjectDetector>,
) -> Result<(), Box<dyn std::error::Error>> {
    let state = AppState::new(detector);
    let app = create_app(state);

    let addr = listen_addr.parse::<SocketAddr>()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;

    tracing::info!("Detection API server listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}

/// GET / - fixed acknowledgement payload used for health checks.
async fn ping_handler() -> impl IntoResponse {
    axum::response::Json(json!({ "message": "pong" }))
}
