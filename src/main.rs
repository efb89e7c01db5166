// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use anyhow::{Context, Result};
use fabstir_detect_node::{
    api::start_server,
    config::NodeConfig,
    vision::{default_labels, load_labels, DetectorConfig, YoloDetector},
};
use std::{env, sync::Arc};

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();

    // Initialize tracing subscriber for logging
    if env::var("RUST_LOG").is_err() {
        env::set_var("RUST_LOG", "info");
    }
    tracing_subscriber::fmt::init();

    println!("🚀 Starting Fabstir Detect Node...\n");
    println!(
        "📦 BUILD VERSION: {}",
        fabstir_detect_node::version::VERSION
    );
    println!(
        "📅 Build Date: {}",
        fabstir_detect_node::version::BUILD_DATE
    );
    println!();

    let config = NodeConfig::from_env();

    let labels = match &config.labels_path {
        Some(path) => load_labels(path).context("Failed to load labels file")?,
        None => default_labels(),
    };

    // Model load failure is fatal; the node must not start serving
    // without a working detector.
    println!("🧠 Loading detection model...");
    let detector = YoloDetector::new(DetectorConfig {
        model_path: config.model_path.clone(),
        confidence_threshold: config.confidence_threshold,
        device: config.device,
        input_size: fabstir_detect_node::vision::detector::DEFAULT_INPUT_SIZE,
        labels,
    })
    .context("Failed to initialize detection model")?;
    println!("✅ Detection model loaded");

    start_server(&config.listen_addr, Arc::new(detector))
        .await
        .map_err(|e| anyhow::anyhow!("API server error: {}", e))?;

    Ok(())
}
