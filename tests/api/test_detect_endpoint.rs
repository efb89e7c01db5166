// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! POST /detect endpoint tests
//!
//! These tests verify:
//! - One response element per uploaded image, in upload order
//! - Empty uploads yield `200 []`
//! - The detection JSON shape (bbox, category, score, image dimensions)
//! - Whole-request rejection for undecodable uploads
//! - 500 propagation for inference failures

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
};
use fabstir_detect_node::{
    api::http_server::{create_app, AppState},
    vision::{BoundingBox, DetectError, ObjectDetector, ObjectPrediction},
};
use image::DynamicImage;
use std::sync::Arc;
use tower::util::ServiceExt; // for `oneshot`

const BOUNDARY: &str = "X-FABSTIR-TEST-BOUNDARY";

/// Stub detector: one fixed prediction for images at least 100px wide,
/// nothing for smaller ones.
struct StubDetector;

impl ObjectDetector for StubDetector {
    fn detect(&self, image: &DynamicImage) -> Result<Vec<ObjectPrediction>, DetectError> {
        if image.width() < 100 {
            return Ok(vec![]);
        }
        Ok(vec![ObjectPrediction {
            bbox: BoundingBox {
                minx: 10.5,
                miny: 20.5,
                maxx: 50.5,
                maxy: 60.5,
            },
            category_id: 16,
            category_name: "dog".to_string(),
            score: 0.875,
        }])
    }
}

/// Stub detector whose inference always fails.
struct FailingDetector;

impl ObjectDetector for FailingDetector {
    fn detect(&self, _image: &DynamicImage) -> Result<Vec<ObjectPrediction>, DetectError> {
        Err(DetectError::Inference("tile execution failed".to_string()))
    }
}

fn app_with_stub() -> axum::Router {
    create_app(AppState::new(Arc::new(StubDetector)))
}

fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = DynamicImage::ImageRgb8(image::RgbImage::from_pixel(
        width,
        height,
        image::Rgb([40, 80, 120]),
    ));
    let mut buf = Vec::new();
    img.write_to(&mut std::io::Cursor::new(&mut buf), image::ImageFormat::Png)
        .expect("PNG encoding failed");
    buf
}

/// Builds a multipart/form-data body from (field name, file bytes) parts.
fn multipart_body(parts: &[(&str, &[u8])]) -> Vec<u8> {
    let mut body = Vec::new();
    for (name, bytes) in parts {
        body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
        body.extend_from_slice(
            format!(
                "Content-Disposition: form-data; name=\"{}\"; filename=\"upload.png\"\r\n\
                 Content-Type: application/octet-stream\r\n\r\n",
                name
            )
            .as_bytes(),
        );
        body.extend_from_slice(bytes);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
    body
}

fn detect_request(body: Vec<u8>) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri("/detect")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .body(Body::from(body))
        .unwrap()
}

async fn response_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_empty_upload_returns_empty_array() {
    let app = app_with_stub();
    let response = app
        .oneshot(detect_request(multipart_body(&[])))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response_json(response).await, serde_json::json!([]));
}

#[tokio::test]
async fn test_single_image_detection_shape() {
    let app = app_with_stub();
    let image = png_bytes(640, 480);
    let response = app
        .oneshot(detect_request(multipart_body(&[("images", &image)])))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let payload = response_json(response).await;

    let batches = payload.as_array().unwrap();
    assert_eq!(batches.len(), 1);
    let detections = batches[0].as_array().unwrap();
    assert_eq!(detections.len(), 1);

    let det = &detections[0];
    assert_eq!(det["bbox"], serde_json::json!([10.5, 20.5, 50.5, 60.5]));
    assert_eq!(det["category"], "dog");
    assert_eq!(det["score"], 0.875);
    assert_eq!(det["imageWidth"], 640);
    assert_eq!(det["imageHeight"], 480);
}

#[tokio::test]
async fn test_upload_order_is_preserved() {
    // First image produces one detection, second (below the stub's
    // size threshold) produces none
    let app = app_with_stub();
    let with_object = png_bytes(640, 480);
    let without_object = png_bytes(80, 60);
    let response = app
        .oneshot(detect_request(multipart_body(&[
            ("images", &with_object),
            ("images", &without_object),
        ])))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let payload = response_json(response).await;

    let batches = payload.as_array().unwrap();
    assert_eq!(batches.len(), 2);
    assert_eq!(batches[0].as_array().unwrap().len(), 1);
    assert_eq!(batches[1].as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn test_image_dimensions_follow_each_upload() {
    let app = app_with_stub();
    let first = png_bytes(640, 480);
    let second = png_bytes(200, 150);
    let response = app
        .oneshot(detect_request(multipart_body(&[
            ("images", &first),
            ("images", &second),
        ])))
        .await
        .unwrap();

    let payload = response_json(response).await;
    assert_eq!(payload[0][0]["imageWidth"], 640);
    assert_eq!(payload[0][0]["imageHeight"], 480);
    assert_eq!(payload[1][0]["imageWidth"], 200);
    assert_eq!(payload[1][0]["imageHeight"], 150);
}

#[tokio::test]
async fn test_unrelated_fields_are_ignored() {
    let app = app_with_stub();
    let response = app
        .oneshot(detect_request(multipart_body(&[(
            "attachments",
            b"not an image".as_slice(),
        )])))
        .await
        .unwrap();

    // Absent `images` field means an empty file list, not an error
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response_json(response).await, serde_json::json!([]));
}

#[tokio::test]
async fn test_non_image_blob_rejects_whole_request() {
    let app = app_with_stub();
    let valid = png_bytes(640, 480);
    let garbage = vec![0xDEu8, 0xAD, 0xBE, 0xEF, 0x00, 0x01];
    let response = app
        .oneshot(detect_request(multipart_body(&[
            ("images", &valid),
            ("images", &garbage),
        ])))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = response_json(response).await;
    assert_eq!(body["error_type"], "invalid_request");
}

#[tokio::test]
async fn test_oversized_upload_is_rejected() {
    let app = app_with_stub();
    let huge = vec![0u8; 10 * 1024 * 1024 + 1];
    let response = app
        .oneshot(detect_request(multipart_body(&[("images", &huge)])))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = response_json(response).await;
    assert_eq!(body["error_type"], "validation_error");
}

#[tokio::test]
async fn test_inference_failure_returns_500() {
    let app = create_app(AppState::new(Arc::new(FailingDetector)));
    let image = png_bytes(640, 480);
    let response = app
        .oneshot(detect_request(multipart_body(&[("images", &image)])))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = response_json(response).await;
    assert_eq!(body["error_type"], "internal_error");
}

#[tokio::test]
async fn test_identical_uploads_yield_identical_payloads() {
    let image = png_bytes(640, 480);
    let body = multipart_body(&[("images", &image)]);

    let first = app_with_stub()
        .oneshot(detect_request(body.clone()))
        .await
        .unwrap();
    let second = app_with_stub()
        .oneshot(detect_request(body))
        .await
        .unwrap();

    assert_eq!(first.status(), StatusCode::OK);
    assert_eq!(second.status(), StatusCode::OK);
    assert_eq!(response_json(first).await, response_json(second).await);
}
