// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Slice (tile) geometry for sliced inference
//!
//! Slice dimensions are derived from the image itself: half the image
//! height and half the image width, with a fixed 20% overlap between
//! adjacent tiles in both axes. Integer division truncates for odd
//! image dimensions; this is deliberate and kept for output
//! compatibility with the deployed model pipeline (the last partial
//! pixel row/column may be under-covered by tiling).

/// Overlap ratio between adjacent tiles, applied to both axes.
pub const OVERLAP_RATIO: f32 = 0.2;

/// Per-image tiling parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SliceParams {
    pub slice_width: u32,
    pub slice_height: u32,
    pub overlap_width_ratio: f32,
    pub overlap_height_ratio: f32,
}

impl SliceParams {
    /// Derives tiling parameters from image dimensions.
    ///
    /// Slice size is `width / 2` by `height / 2` (truncating division),
    /// clamped to at least one pixel so degenerate 1px-wide inputs
    /// still produce a usable region.
    pub fn for_image(width: u32, height: u32) -> Self {
        Self {
            slice_width: (width / 2).max(1),
            slice_height: (height / 2).max(1),
            overlap_width_ratio: OVERLAP_RATIO,
            overlap_height_ratio: OVERLAP_RATIO,
        }
    }
}

/// One tile within the full image, in full-image pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SliceRegion {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// Computes the tile regions covering an image.
///
/// Tiles advance by `slice - overlap` in each axis; the final tile of
/// each row/column is shifted back so it ends exactly at the image
/// border, so tiles never read out of bounds.
pub fn slice_regions(width: u32, height: u32, params: &SliceParams) -> Vec<SliceRegion> {
    let slice_w = params.slice_width.min(width).max(1);
    let slice_h = params.slice_height.min(height).max(1);

    let overlap_w = (slice_w as f32 * params.overlap_width_ratio) as u32;
    let overlap_h = (slice_h as f32 * params.overlap_height_ratio) as u32;
    let step_x = (slice_w - overlap_w).max(1);
    let step_y = (slice_h - overlap_h).max(1);

    let mut regions = Vec::new();
    let mut y = 0u32;
    loop {
        let last_row = y + slice_h >= height;
        let y0 = if last_row { height - slice_h } else { y };

        let mut x = 0u32;
        loop {
            let last_col = x + slice_w >= width;
            let x0 = if last_col { width - slice_w } else { x };
            regions.push(SliceRegion {
                x: x0,
                y: y0,
                width: slice_w,
                height: slice_h,
            });
            if last_col {
                break;
            }
            x += step_x;
        }

        if last_row {
            break;
        }
        y += step_y;
    }

    regions
}
