// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Sliced object detection over a YOLO ONNX model
//!
//! The detector owns a single ONNX Runtime session, loaded once at
//! startup and shared across all requests. `detect` tiles the image
//! into half-height by half-width slices with 20% overlap, runs the
//! model per tile, maps tile-local boxes back into full-image
//! coordinates and merges duplicates found by neighbouring tiles.
//!
//! # Thread Safety
//! `Session::run` is not assumed safe for concurrent invocation, so the
//! session sits behind a `Mutex`; all model calls are serialized.

use anyhow::{Context, Result};
use image::{imageops::FilterType, DynamicImage, GenericImageView};
use ndarray::Array4;
use ort::execution_providers::{CPUExecutionProvider, CUDAExecutionProvider};
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::Value;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Mutex;
use thiserror::Error;
use tracing::{debug, info, warn};

use super::postprocess::{decode_output, merge_detections, LetterboxTransform, RawDetection};
use super::slicing::{slice_regions, SliceParams, SliceRegion};

/// Default confidence threshold; candidates scoring below it are
/// discarded inside the detector, before merging.
pub const DEFAULT_CONFIDENCE_THRESHOLD: f32 = 0.2;

/// Default square model input edge (standard YOLO export).
pub const DEFAULT_INPUT_SIZE: u32 = 640;

/// IoU above which two same-class boxes from different tiles are
/// treated as one object during the cross-tile merge.
const MERGE_IOU_THRESHOLD: f32 = 0.5;

/// Letterbox padding fill (114 gray, the YOLO training convention).
const PAD_FILL: f32 = 114.0 / 255.0;

/// Errors raised while running detection on one image
#[derive(Debug, Error)]
pub enum DetectError {
    #[error("Model inference failed: {0}")]
    Inference(String),

    #[error("Invalid model output: {0}")]
    InvalidOutput(String),
}

impl From<ort::Error> for DetectError {
    fn from(e: ort::Error) -> Self {
        DetectError::Inference(e.to_string())
    }
}

/// Compute device for model execution
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Device {
    Cpu,
    Cuda,
}

impl FromStr for Device {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "cpu" => Ok(Device::Cpu),
            "cuda" | "gpu" => Ok(Device::Cuda),
            other => Err(format!("unknown device '{}', expected cpu or cuda", other)),
        }
    }
}

/// Axis-aligned box in full-image pixel coordinates
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub minx: f32,
    pub miny: f32,
    pub maxx: f32,
    pub maxy: f32,
}

/// One predicted object instance for a single image
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectPrediction {
    pub bbox: BoundingBox,
    pub category_id: usize,
    pub category_name: String,
    pub score: f32,
}

/// Uniform detection interface, object-safe so request handlers can be
/// tested against a stub.
pub trait ObjectDetector: Send + Sync {
    /// Runs sliced detection on one decoded image.
    ///
    /// Output order is whatever the merge produces; callers must not
    /// rely on any sorting.
    fn detect(&self, image: &DynamicImage) -> Result<Vec<ObjectPrediction>, DetectError>;
}

/// Configuration for loading the detection model
#[derive(Debug, Clone)]
pub struct DetectorConfig {
    /// Path to the ONNX model file
    pub model_path: PathBuf,
    /// Minimum score for a candidate detection to be retained
    pub confidence_threshold: f32,
    /// Compute device (CUDA falls back to CPU when unavailable)
    pub device: Device,
    /// Square model input edge in pixels
    pub input_size: u32,
    /// Category names, in class id order
    pub labels: Vec<String>,
}

impl DetectorConfig {
    pub fn new(model_path: impl Into<PathBuf>) -> Self {
        Self {
            model_path: model_path.into(),
            confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
            device: Device::Cpu,
            input_size: DEFAULT_INPUT_SIZE,
            labels: super::labels::default_labels(),
        }
    }
}

/// YOLO ONNX detector with sliced inference
pub struct YoloDetector {
    /// ONNX Runtime session (behind a Mutex for serialized access)
    session: Mutex<Session>,
    input_name: String,
    confidence_threshold: f32,
    input_size: u32,
    labels: Vec<String>,
}

impl std::fmt::Debug for YoloDetector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("YoloDetector")
            .field("input_name", &self.input_name)
            .field("confidence_threshold", &self.confidence_threshold)
            .field("input_size", &self.input_size)
            .field("num_labels", &self.labels.len())
            .finish_non_exhaustive()
    }
}

impl YoloDetector {
    /// Loads the detection model from disk.
    ///
    /// # Errors
    /// Returns an error when the model file is missing or the ONNX
    /// session cannot be created; callers treat this as fatal at
    /// startup.
    pub fn new(config: DetectorConfig) -> Result<Self> {
        if !config.model_path.exists() {
            anyhow::bail!(
                "Detection model file not found: {}",
                config.model_path.display()
            );
        }

        let session = match config.device {
            Device::Cuda => {
                // Try CUDA first, fall back to CPU if unavailable
                info!("   Attempting CUDA execution provider...");
                let cuda_result = Session::builder()
                    .context("Failed to create session builder")?
                    .with_execution_providers([CUDAExecutionProvider::default().build()])
                    .context("Failed to set CUDA execution provider")?
                    .with_optimization_level(GraphOptimizationLevel::Level3)
                    .context("Failed to set optimization level")?
                    .commit_from_file(&config.model_path);

                match cuda_result {
                    Ok(s) => {
                        info!("✅ CUDA execution provider initialized successfully!");
                        s
                    }
                    Err(e) => {
                        warn!("⚠️  CUDA execution provider failed: {}", e);
                        warn!("   Falling back to CPU execution provider");
                        Self::cpu_session(&config)?
                    }
                }
            }
            Device::Cpu => Self::cpu_session(&config)?,
        };

        let input_name = session
            .inputs
            .first()
            .map(|i| i.name.clone())
            .context("Detection model has no inputs")?;

        info!(
            "✅ Detection model loaded from {} (input '{}', {} labels)",
            config.model_path.display(),
            input_name,
            config.labels.len()
        );

        Ok(Self {
            session: Mutex::new(session),
            input_name,
            confidence_threshold: config.confidence_threshold,
            input_size: config.input_size,
            labels: config.labels,
        })
    }

    fn cpu_session(config: &DetectorConfig) -> Result<Session> {
        Session::builder()
            .context("Failed to create session builder")?
            .with_execution_providers([CPUExecutionProvider::default().build()])
            .context("Failed to set CPU execution provider")?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .context("Failed to set optimization level")?
            .commit_from_file(&config.model_path)
            .with_context(|| {
                format!(
                    "Failed to load ONNX model from {}",
                    config.model_path.display()
                )
            })
    }

    /// Runs the model on one tile and returns candidates in full-image
    /// coordinates.
    fn run_tile(
        &self,
        image: &DynamicImage,
        region: &SliceRegion,
    ) -> Result<Vec<RawDetection>, DetectError> {
        let tile = image.crop_imm(region.x, region.y, region.width, region.height);
        let (tensor, transform) = preprocess_tile(&tile, self.input_size);

        // Lock session for thread-safe access
        let mut session = self.session.lock().unwrap();
        let outputs = session.run(ort::inputs![
            self.input_name.as_str() => Value::from_array(tensor)?
        ])?;

        let output = outputs[0]
            .try_extract_array::<f32>()
            .map_err(|e| DetectError::InvalidOutput(e.to_string()))?;

        let decoded = decode_output(&output, self.confidence_threshold)?;

        Ok(decoded
            .into_iter()
            .map(|d| {
                let (x1, y1) = transform.to_tile(d.x1, d.y1, region.width, region.height);
                let (x2, y2) = transform.to_tile(d.x2, d.y2, region.width, region.height);
                RawDetection {
                    x1: x1 + region.x as f32,
                    y1: y1 + region.y as f32,
                    x2: x2 + region.x as f32,
                    y2: y2 + region.y as f32,
                    ..d
                }
            })
            .collect())
    }

    fn category_name(&self, class_id: usize) -> String {
        self.labels
            .get(class_id)
            .cloned()
            .unwrap_or_else(|| format!("class_{}", class_id))
    }
}

impl ObjectDetector for YoloDetector {
    fn detect(&self, image: &DynamicImage) -> Result<Vec<ObjectPrediction>, DetectError> {
        let (width, height) = image.dimensions();
        let params = SliceParams::for_image(width, height);
        let regions = slice_regions(width, height, &params);

        debug!(
            "Sliced {}x{} image into {} tiles of {}x{}",
            width,
            height,
            regions.len(),
            params.slice_width,
            params.slice_height
        );

        let mut candidates = Vec::new();
        for region in &regions {
            candidates.extend(self.run_tile(image, region)?);
        }

        let merged = merge_detections(candidates, MERGE_IOU_THRESHOLD);
        debug!("Merged tile candidates into {} detections", merged.len());

        Ok(merged
            .into_iter()
            .map(|d| ObjectPrediction {
                bbox: BoundingBox {
                    minx: d.x1,
                    miny: d.y1,
                    maxx: d.x2,
                    maxy: d.y2,
                },
                category_id: d.class_id,
                category_name: self.category_name(d.class_id),
                score: d.score,
            })
            .collect())
    }
}

/// Letterboxes a tile into a square `[1, 3, size, size]` tensor,
/// normalized to `[0, 1]` with gray padding.
fn preprocess_tile(tile: &DynamicImage, input_size: u32) -> (Array4<f32>, LetterboxTransform) {
    let (w, h) = tile.dimensions();
    let size = input_size as f32;
    let scale = (size / w as f32).min(size / h as f32);
    let new_w = ((w as f32 * scale).round() as u32).clamp(1, input_size);
    let new_h = ((h as f32 * scale).round() as u32).clamp(1, input_size);

    let resized = tile
        .resize_exact(new_w, new_h, FilterType::Triangle)
        .to_rgb8();

    let pad_x = (input_size - new_w) / 2;
    let pad_y = (input_size - new_h) / 2;

    let mut tensor = Array4::from_elem(
        (1, 3, input_size as usize, input_size as usize),
        PAD_FILL,
    );
    for (x, y, pixel) in resized.enumerate_pixels() {
        let tx = (x + pad_x) as usize;
        let ty = (y + pad_y) as usize;
        for c in 0..3 {
            tensor[[0, c, ty, tx]] = pixel[c] as f32 / 255.0;
        }
    }

    let transform = LetterboxTransform {
        scale,
        pad_x: pad_x as f32,
        pad_y: pad_y as f32,
    };
    (tensor, transform)
}
