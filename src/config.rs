// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Node configuration from environment variables

use std::env;
use std::path::PathBuf;
use tracing::warn;

use crate::vision::detector::DEFAULT_CONFIDENCE_THRESHOLD;
use crate::vision::Device;

/// Deployment configuration for the detection node.
#[derive(Debug, Clone)]
pub struct NodeConfig {
    /// Bind address, `host:port`
    pub listen_addr: String,
    /// Path to the ONNX detection model
    pub model_path: PathBuf,
    /// Compute device for model execution
    pub device: Device,
    /// Minimum score for a detection to be retained
    pub confidence_threshold: f32,
    /// Optional newline-delimited labels file for custom weights
    pub labels_path: Option<PathBuf>,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:5000".to_string(),
            model_path: PathBuf::from("./models/scratch100.onnx"),
            device: Device::Cpu,
            confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
            labels_path: None,
        }
    }
}

impl NodeConfig {
    /// Reads configuration from environment variables, falling back to
    /// defaults for anything unset or unparseable.
    ///
    /// Recognized variables: `API_HOST`, `API_PORT`, `MODEL_PATH`,
    /// `DETECTION_DEVICE`, `CONFIDENCE_THRESHOLD`, `LABELS_PATH`.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let host = env::var("API_HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
        let port = env::var("API_PORT").unwrap_or_else(|_| "5000".to_string());

        let model_path = env::var("MODEL_PATH")
            .map(PathBuf::from)
            .unwrap_or(defaults.model_path);

        let device = match env::var("DETECTION_DEVICE") {
            Ok(value) => value.parse::<Device>().unwrap_or_else(|e| {
                warn!("{}; using cpu", e);
                Device::Cpu
            }),
            Err(_) => defaults.device,
        };

        let confidence_threshold = env::var("CONFIDENCE_THRESHOLD")
            .ok()
            .and_then(|v| v.parse::<f32>().ok())
            .unwrap_or(DEFAULT_CONFIDENCE_THRESHOLD);

        let labels_path = env::var("LABELS_PATH").ok().map(PathBuf::from);

        Self {
            listen_addr: format!("{}:{}", host, port),
            model_path,
            device,
            confidence_threshold,
            labels_path,
        }
    }
}
