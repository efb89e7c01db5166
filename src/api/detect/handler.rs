// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Detect endpoint handler

use axum::{extract::State, Json};
use axum_extra::extract::Multipart;
use tracing::{debug, info, warn};

use super::response::{Detection, DetectionBatch};
use crate::api::errors::ApiError;
use crate::api::http_server::AppState;
use crate::vision::{decode_image_bytes, ImageError};

/// POST /detect - Run sliced object detection over uploaded images
///
/// Accepts a multipart form whose `images` field carries zero or more
/// image files and returns one detection array per file, in upload
/// order. An empty upload is a valid request and yields `[]`.
///
/// # Response
/// JSON array; element *i* is the detection array for upload *i*, each
/// detection carrying `bbox`, `category`, `score`, `imageWidth` and
/// `imageHeight`.
///
/// # Errors
/// - 400 Bad Request: malformed multipart body, undecodable or
///   oversized image. The whole request is rejected; partial results
///   would silently break the upload-order correspondence.
/// - 500 Internal Server Error: model inference failed.
pub async fn detect_handler(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<Vec<DetectionBatch>>, ApiError> {
    let mut all_detections: Vec<DetectionBatch> = Vec::new();

    while let Some(field) = multipart.next_field().await.map_err(|e| {
        warn!("Malformed multipart body: {}", e);
        ApiError::InvalidRequest(format!("Malformed multipart body: {}", e))
    })? {
        // Fields other than `images` are ignored, matching the
        // framework-default behavior clients already rely on.
        if field.name() != Some("images") {
            continue;
        }

        let position = all_detections.len();
        let bytes = field.bytes().await.map_err(|e| {
            warn!("Failed to read upload {}: {}", position, e);
            ApiError::InvalidRequest(format!("Failed to read uploaded file {}: {}", position, e))
        })?;

        let (image, image_info) = decode_image_bytes(&bytes).map_err(|e| match e {
            ImageError::TooLarge(size, max) => {
                warn!("Upload {} too large: {} bytes", position, size);
                ApiError::ValidationError {
                    field: "images".to_string(),
                    message: format!("file {} exceeds maximum size of {} bytes", size, max),
                }
            }
            other => {
                warn!("Failed to decode upload {}: {}", position, other);
                ApiError::InvalidRequest(format!("Invalid image at position {}: {}", position, other))
            }
        })?;

        debug!(
            "Decoded image {}: {}x{}, {} bytes",
            position, image_info.width, image_info.height, image_info.size_bytes
        );

        let predictions = state.detector.detect(&image).map_err(|e| {
            warn!("Detection failed for image {}: {}", position, e);
            ApiError::InternalError(format!("Detection failed for image {}: {}", position, e))
        })?;

        info!(
            "Image {} prediction complete: {} detections ({}x{})",
            position + 1,
            predictions.len(),
            image_info.width,
            image_info.height
        );

        let batch: DetectionBatch = predictions
            .iter()
            .map(|p| Detection::from_prediction(p, image_info.width, image_info.height))
            .collect();
        all_detections.push(batch);
    }

    info!("Made predictions for {} images", all_detections.len());

    Ok(Json(all_detections))
}
