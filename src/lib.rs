// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
pub mod api;
pub mod config;
pub mod version;
pub mod vision;

// Re-export main types
pub use api::{create_app, detect_handler, ApiError, AppState, Detection, DetectionBatch};
pub use config::NodeConfig;
pub use vision::{
    BoundingBox, DetectError, DetectorConfig, Device, ObjectDetector, ObjectPrediction,
    YoloDetector,
};
