// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Detection response types

use serde::{Deserialize, Serialize};

use crate::vision::ObjectPrediction;

/// One predicted object instance, as serialized to clients.
///
/// All numeric model outputs are widened to f64 here regardless of the
/// numeric width the model produced, so the wire format never depends
/// on the runtime's internal tensor type.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Detection {
    /// `[minX, minY, maxX, maxY]` in image pixel coordinates
    pub bbox: [f64; 4],
    /// Category label name
    pub category: String,
    /// Confidence score (0.0-1.0)
    pub score: f64,
    /// Source image width in pixels
    pub image_width: u32,
    /// Source image height in pixels
    pub image_height: u32,
}

/// Ordered detections for one image, in model output order.
pub type DetectionBatch = Vec<Detection>;

impl Detection {
    /// Converts one raw prediction, attaching the source image
    /// dimensions. No filtering or re-sorting happens here.
    pub fn from_prediction(pred: &ObjectPrediction, image_width: u32, image_height: u32) -> Self {
        Self {
            bbox: [
                f64::from(pred.bbox.minx),
                f64::from(pred.bbox.miny),
                f64::from(pred.bbox.maxx),
                f64::from(pred.bbox.maxy),
            ],
            category: pred.category_name.clone(),
            score: f64::from(pred.score),
            image_width,
            image_height,
        }
    }
}
