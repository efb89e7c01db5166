// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Category label tables for detection models
//!
//! Custom-trained weights ship their own class list; a newline-delimited
//! labels file can be pointed at via `LABELS_PATH`. Without one, the
//! standard COCO-80 names are used.

use anyhow::{Context, Result};
use std::path::Path;

/// COCO class names, in model output order.
const COCO_CLASSES: [&str; 80] = [
    "person",
    "bicycle",
    "car",
    "motorcycle",
    "airplane",
    "bus",
    "train",
    "truck",
    "boat",
    "traffic light",
    "fire hydrant",
    "stop sign",
    "parking meter",
    "bench",
    "bird",
    "cat",
    "dog",
    "horse",
    "sheep",
    "cow",
    "elephant",
    "bear",
    "zebra",
    "giraffe",
    "backpack",
    "umbrella",
    "handbag",
    "tie",
    "suitcase",
    "frisbee",
    "skis",
    "snowboard",
    "sports ball",
    "kite",
    "baseball bat",
    "baseball glove",
    "skateboard",
    "surfboard",
    "tennis racket",
    "bottle",
    "wine glass",
    "cup",
    "fork",
    "knife",
    "spoon",
    "bowl",
    "banana",
    "apple",
    "sandwich",
    "orange",
    "broccoli",
    "carrot",
    "hot dog",
    "pizza",
    "donut",
    "cake",
    "chair",
    "couch",
    "potted plant",
    "bed",
    "dining table",
    "toilet",
    "tv",
    "laptop",
    "mouse",
    "remote",
    "keyboard",
    "cell phone",
    "microwave",
    "oven",
    "toaster",
    "sink",
    "refrigerator",
    "book",
    "clock",
    "vase",
    "scissors",
    "teddy bear",
    "hair drier",
    "toothbrush",
];

/// Default COCO-80 label table.
pub fn default_labels() -> Vec<String> {
    COCO_CLASSES.iter().map(|s| s.to_string()).collect()
}

/// Loads a label table from a newline-delimited file.
///
/// Blank lines are skipped; line order maps to class id order.
pub fn load_labels<P: AsRef<Path>>(path: P) -> Result<Vec<String>> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read labels file {}", path.display()))?;

    let labels: Vec<String> = content
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect();

    if labels.is_empty() {
        anyhow::bail!("Labels file {} contains no labels", path.display());
    }

    Ok(labels)
}
