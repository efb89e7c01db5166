// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! Liveness endpoint and route registration tests
//!
//! These tests verify that:
//! - GET / returns the fixed acknowledgement payload
//! - The liveness check never depends on detector behavior
//! - /detect only accepts POST

use axum::{
    body::Body,
    http::{Method, Request, StatusCode},
};
use fabstir_detect_node::{
    api::http_server::{create_app, AppState},
    vision::{DetectError, ObjectDetector, ObjectPrediction},
};
use image::DynamicImage;
use std::sync::Arc;
use tower::util::ServiceExt; // for `oneshot`

/// Detector that fails on every call; the liveness check must not care.
struct BrokenDetector;

impl ObjectDetector for BrokenDetector {
    fn detect(&self, _image: &DynamicImage) -> Result<Vec<ObjectPrediction>, DetectError> {
        Err(DetectError::Inference("always broken".to_string()))
    }
}

fn app() -> axum::Router {
    create_app(AppState::new(Arc::new(BrokenDetector)))
}

async fn response_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_ping_returns_pong() {
    let response = app()
        .oneshot(
            Request::builder()
                .method(Method::GET)
                .uri("/")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response_json(response).await,
        serde_json::json!({ "message": "pong" })
    );
}

#[tokio::test]
async fn test_ping_independent_of_detector_state() {
    // Even with a detector that fails every inference, liveness holds
    let app = app();
    for _ in 0..3 {
        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method(Method::GET)
                    .uri("/")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}

#[tokio::test]
async fn test_detect_route_rejects_get() {
    let response = app()
        .oneshot(
            Request::builder()
                .method(Method::GET)
                .uri("/detect")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
}

#[tokio::test]
async fn test_root_rejects_post() {
    let response = app()
        .oneshot(
            Request::builder()
                .method(Method::POST)
                .uri("/")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
}

#[tokio::test]
async fn test_unknown_route_returns_404() {
    let response = app()
        .oneshot(
            Request::builder()
                .method(Method::GET)
                .uri("/status")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
