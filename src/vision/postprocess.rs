// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Raw model output decoding and cross-tile merging
//!
//! The detection model is a YOLO-family ONNX export producing a
//! `[1, 4 + num_classes, num_anchors]` tensor: center-format box
//! coordinates followed by per-class scores. Decoding applies the
//! confidence threshold; merging deduplicates boxes that were found by
//! more than one overlapping tile via class-aware greedy NMS.

use ndarray::{ArrayViewD, Axis, Ix3};

use super::detector::DetectError;

/// One decoded candidate box, corner format.
///
/// Coordinates are in whatever space the producer used: model-input
/// space straight after [`decode_output`], full-image space once the
/// tile transform and offset have been applied.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RawDetection {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
    pub class_id: usize,
    pub score: f32,
}

/// Letterbox mapping between a tile and the square model input.
#[derive(Debug, Clone, Copy)]
pub struct LetterboxTransform {
    pub scale: f32,
    pub pad_x: f32,
    pub pad_y: f32,
}

impl LetterboxTransform {
    /// Maps a model-input coordinate back into tile pixel space,
    /// clamped to the tile bounds.
    pub fn to_tile(&self, x: f32, y: f32, tile_width: u32, tile_height: u32) -> (f32, f32) {
        let tx = ((x - self.pad_x) / self.scale).clamp(0.0, tile_width as f32);
        let ty = ((y - self.pad_y) / self.scale).clamp(0.0, tile_height as f32);
        (tx, ty)
    }
}

/// Decodes a raw model output tensor into candidate detections.
///
/// Candidates below `confidence_threshold` are discarded here, before
/// any merging, matching the threshold the model was configured with.
pub fn decode_output(
    output: &ArrayViewD<'_, f32>,
    confidence_threshold: f32,
) -> Result<Vec<RawDetection>, DetectError> {
    let view = output.view().into_dimensionality::<Ix3>().map_err(|_| {
        DetectError::InvalidOutput(format!(
            "expected [batch, attrs, anchors] output, got shape {:?}",
            output.shape()
        ))
    })?;

    let attrs = view.shape()[1];
    if view.shape()[0] != 1 || attrs < 5 {
        return Err(DetectError::InvalidOutput(format!(
            "unexpected output shape {:?}",
            view.shape()
        )));
    }
    let num_classes = attrs - 4;

    let batch = view.index_axis(Axis(0), 0); // [attrs, anchors]
    let anchors = batch.shape()[1];

    let mut detections = Vec::new();
    for a in 0..anchors {
        let mut class_id = 0usize;
        let mut score = f32::NEG_INFINITY;
        for c in 0..num_classes {
            let s = batch[[4 + c, a]];
            if s > score {
                score = s;
                class_id = c;
            }
        }
        if score < confidence_threshold {
            continue;
        }

        let cx = batch[[0, a]];
        let cy = batch[[1, a]];
        let w = batch[[2, a]];
        let h = batch[[3, a]];

        detections.push(RawDetection {
            x1: cx - w / 2.0,
            y1: cy - h / 2.0,
            x2: cx + w / 2.0,
            y2: cy + h / 2.0,
            class_id,
            score,
        });
    }

    Ok(detections)
}

/// Intersection over union of two corner-format boxes.
pub fn iou(a: &RawDetection, b: &RawDetection) -> f32 {
    let inter_x1 = a.x1.max(b.x1);
    let inter_y1 = a.y1.max(b.y1);
    let inter_x2 = a.x2.min(b.x2);
    let inter_y2 = a.y2.min(b.y2);

    let inter_area = (inter_x2 - inter_x1).max(0.0) * (inter_y2 - inter_y1).max(0.0);
    let area_a = (a.x2 - a.x1).max(0.0) * (a.y2 - a.y1).max(0.0);
    let area_b = (b.x2 - b.x1).max(0.0) * (b.y2 - b.y1).max(0.0);

    let union = area_a + area_b - inter_area;
    if union <= 0.0 {
        return 0.0;
    }
    inter_area / union
}

/// Merges candidates gathered from all tiles of one image.
///
/// Greedy class-aware NMS: candidates are visited in descending score
/// order and dropped when they overlap an already-kept box of the same
/// class above `iou_threshold`. The surviving order (score-descending)
/// is the order the detector reports.
pub fn merge_detections(
    mut candidates: Vec<RawDetection>,
    iou_threshold: f32,
) -> Vec<RawDetection> {
    candidates.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut kept: Vec<RawDetection> = Vec::new();
    'candidates: for cand in candidates {
        for k in &kept {
            if k.class_id == cand.class_id && iou(k, &cand) > iou_threshold {
                continue 'candidates;
            }
        }
        kept.push(cand);
    }
    kept
}
