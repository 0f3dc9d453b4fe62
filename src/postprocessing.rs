// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Post-processing of raw model outputs.
//!
//! Detector output is decoded into boxes in original image pixels. Pose model
//! output is decoded from per-joint heatmaps into 17 image-space keypoints per
//! person.

use ndarray::{Array2, ArrayView2, ArrayView4, s};
use rayon::prelude::*;

use crate::error::{PoseError, Result};
use crate::geometry::{BoundingBox, CenterScale, get_affine_transform};
use crate::preprocessing::{PreprocessResult, clip_coords, scale_coords};
use crate::results::{Keypoint, KeypointSet};
use crate::utils::nms;

/// Sub-pixel shift applied toward the higher neighbor of a heatmap peak.
const PEAK_SHIFT: f32 = 0.25;

/// One detector box in original image pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Detection {
    /// Box corners.
    pub bbox: BoundingBox,
    /// Best class score.
    pub score: f32,
    /// Index of the best class in the detector's class list.
    pub class_id: usize,
}

/// Parameters for [`decode_detections`].
#[derive(Debug, Clone, Copy)]
pub struct DetectOptions {
    /// Number of classes from the model metadata, 0 if unknown.
    pub num_classes: usize,
    /// Keep only this class, if set.
    pub class_filter: Option<usize>,
    /// Candidates must score strictly above this.
    pub score_threshold: f32,
    /// `IoU` above which overlapping boxes are suppressed.
    pub iou_threshold: f32,
}

/// Decode YOLO detection output into boxes.
///
/// The output is either `[1, 4 + nc, N]` or `[1, N, 4 + nc]`, each prediction
/// holding `cx, cy, w, h` followed by class scores. Surviving boxes are mapped
/// back through the letterbox, clipped to the image and passed through NMS.
#[must_use]
pub fn decode_detections(
    output: &[f32],
    output_shape: &[usize],
    preprocess: &PreprocessResult,
    options: &DetectOptions,
) -> Vec<Detection> {
    let (num_classes, num_predictions, is_transposed) =
        parse_detect_shape(output_shape, options.num_classes);
    if output.is_empty() || num_predictions == 0 {
        return Vec::new();
    }

    let features = 4 + num_classes;
    if output.len() < features * num_predictions {
        return Vec::new();
    }
    let data = output[..features * num_predictions].to_vec();
    let predictions = if is_transposed {
        Array2::from_shape_vec((num_predictions, features), data).ok()
    } else {
        Array2::from_shape_vec((features, num_predictions), data)
            .ok()
            .map(|arr| arr.t().to_owned())
    };
    let Some(predictions) = predictions else {
        return Vec::new();
    };

    let candidates = extract_candidates(predictions.view(), preprocess, options);
    let scored: Vec<([f32; 4], f32)> = candidates
        .iter()
        .map(|d| ([d.bbox.p1.0, d.bbox.p1.1, d.bbox.p2.0, d.bbox.p2.1], d.score))
        .collect();

    nms(&scored, options.iou_threshold)
        .into_iter()
        .map(|i| candidates[i])
        .collect()
}

/// Work out `(num_classes, num_predictions, is_transposed)` from the output shape.
///
/// Without metadata the smaller axis is taken as the feature axis.
fn parse_detect_shape(shape: &[usize], expected_classes: usize) -> (usize, usize, bool) {
    let (a, b) = match shape {
        [a, b] | [1, a, b] => (*a, *b),
        _ => return (expected_classes.max(1), 0, false),
    };
    if a.max(b) < 5 {
        return (expected_classes.max(1), 0, false);
    }

    if expected_classes > 0 {
        if a == 4 + expected_classes {
            return (expected_classes, b, false);
        }
        if b == 4 + expected_classes {
            return (expected_classes, a, true);
        }
    }

    if a <= b {
        (a.saturating_sub(4).max(1), b, false)
    } else {
        (b.saturating_sub(4).max(1), a, true)
    }
}

fn extract_candidates(
    predictions: ArrayView2<f32>,
    preprocess: &PreprocessResult,
    options: &DetectOptions,
) -> Vec<Detection> {
    let mut candidates = Vec::new();

    for row in predictions.rows() {
        let scores = row.slice(s![4..]);
        let best = match options.class_filter {
            Some(class_id) => scores.get(class_id).map(|score| (class_id, *score)),
            None => scores
                .iter()
                .copied()
                .enumerate()
                .filter(|(_, score)| !score.is_nan())
                .max_by(|(_, a), (_, b)| a.total_cmp(b)),
        };
        let Some((class_id, score)) = best else {
            continue;
        };
        if score.is_nan() || score <= options.score_threshold {
            continue;
        }

        let (cx, cy, w, h) = (row[0], row[1], row[2], row[3]);
        let xyxy = [cx - w / 2.0, cy - h / 2.0, cx + w / 2.0, cy + h / 2.0];
        let scaled = scale_coords(&xyxy, preprocess.scale, preprocess.padding);
        let [x1, y1, x2, y2] = clip_coords(&scaled, preprocess.orig_shape);

        candidates.push(Detection {
            bbox: BoundingBox::new((x1, y1), (x2, y2)),
            score,
            class_id,
        });
    }

    candidates
}

/// `np.sign`: zero stays zero.
fn sign(v: f32) -> f32 {
    if v > 0.0 {
        1.0
    } else if v < 0.0 {
        -1.0
    } else {
        0.0
    }
}

/// Peak of one heatmap as `(x, y, maxval)`; coordinates are zeroed when the
/// peak is not positive. Ties resolve to the first index in row-major order.
#[allow(clippy::cast_precision_loss)]
fn heatmap_peak(heatmap: ArrayView2<f32>) -> (f32, f32, f32) {
    let width = heatmap.ncols();
    let mut best_idx = 0;
    let mut best_val = f32::NEG_INFINITY;
    for (idx, &v) in heatmap.iter().enumerate() {
        if v > best_val {
            best_val = v;
            best_idx = idx;
        }
    }

    if best_val > 0.0 {
        ((best_idx % width) as f32, (best_idx / width) as f32, best_val)
    } else {
        (0.0, 0.0, best_val)
    }
}

/// Nudge a peak a quarter pixel toward its higher neighbor on each axis.
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_possible_wrap
)]
fn refine_peak(heatmap: ArrayView2<f32>, x: f32, y: f32) -> (f32, f32) {
    let (height, width) = heatmap.dim();
    let px = (x + 0.5).floor() as i64;
    let py = (y + 0.5).floor() as i64;

    if 1 < px && px < width as i64 - 1 && 1 < py && py < height as i64 - 1 {
        let (px, py) = (px as usize, py as usize);
        let dx = heatmap[[py, px + 1]] - heatmap[[py, px - 1]];
        let dy = heatmap[[py + 1, px]] - heatmap[[py - 1, px]];
        (x + sign(dx) * PEAK_SHIFT, y + sign(dy) * PEAK_SHIFT)
    } else {
        (x, y)
    }
}

/// Decode pose heatmaps into image-space keypoints, one set per region.
///
/// # Arguments
///
/// * `output` - Flat heatmap data.
/// * `output_shape` - `[N, 17, H, W]`.
/// * `regions` - The `N` center/scale regions the crops were warped from.
/// * `post_process` - Apply the quarter-pixel peak refinement.
///
/// # Errors
///
/// Returns [`PoseError::InferenceError`] if the shape does not match the data
/// or the number of regions, or if there are not 17 joints.
pub fn decode_heatmaps(
    output: &[f32],
    output_shape: &[usize],
    regions: &[CenterScale],
    post_process: bool,
) -> Result<Vec<KeypointSet>> {
    let &[batch, joints, height, width] = output_shape else {
        return Err(PoseError::InferenceError(format!(
            "expected 4D heatmap output, got shape {output_shape:?}"
        )));
    };
    if batch != regions.len() {
        return Err(PoseError::InferenceError(format!(
            "heatmap batch of {batch} does not match {} person regions",
            regions.len()
        )));
    }
    if height == 0 || width == 0 {
        return Err(PoseError::InferenceError("empty heatmaps".to_string()));
    }

    let heatmaps = ArrayView4::from_shape((batch, joints, height, width), output)
        .map_err(|e| PoseError::InferenceError(format!("Invalid heatmap output: {e}")))?;

    regions
        .par_iter()
        .enumerate()
        .map(|(n, region)| {
            let to_image = get_affine_transform(region, 0.0, (width, height), true)
                .ok_or_else(|| {
                    PoseError::InferenceError(format!("degenerate person region {region:?}"))
                })?;

            let points = (0..joints)
                .map(|j| {
                    let heatmap = heatmaps.slice(s![n, j, .., ..]);
                    let (x, y, maxval) = heatmap_peak(heatmap);
                    let (x, y) = if post_process {
                        refine_peak(heatmap, x, y)
                    } else {
                        (x, y)
                    };
                    let (ix, iy) = to_image.transform_point(x, y);
                    Keypoint::new(ix, iy, maxval)
                })
                .collect();

            KeypointSet::new(points)
        })
        .collect()
}
