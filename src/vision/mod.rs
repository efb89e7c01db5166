// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Vision processing module for sliced object detection
//!
//! This module provides:
//! - Image decoding for multipart uploads
//! - Slice (tile) geometry derived per image
//! - YOLO ONNX inference with cross-tile merge

pub mod detector;
pub mod image_utils;
pub mod labels;
pub mod postprocess;
pub mod slicing;

pub use detector::{
    BoundingBox, DetectError, DetectorConfig, Device, ObjectDetector, ObjectPrediction,
    YoloDetector,
};
pub use image_utils::{decode_image_bytes, detect_format, ImageError, ImageInfo};
pub use labels::{default_labels, load_labels};
pub use slicing::{slice_regions, SliceParams, SliceRegion};
