// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Per-person keypoints and per-frame timing results.

use crate::error::{PoseError, Result};
use crate::visualizer::skeleton::{COCO_KEYPOINT_INDEXES, NUM_KEYPOINTS};

/// One decoded keypoint in image pixels.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Keypoint {
    /// Horizontal position.
    pub x: f32,
    /// Vertical position.
    pub y: f32,
    /// Heatmap peak value. Not used for drawing.
    pub confidence: f32,
}

impl Keypoint {
    /// Create a keypoint.
    #[must_use]
    pub const fn new(x: f32, y: f32, confidence: f32) -> Self {
        Self { x, y, confidence }
    }

    /// Integer pixel position, truncated toward zero.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn pixel(&self) -> (i32, i32) {
        (self.x as i32, self.y as i32)
    }
}

/// The 17 COCO keypoints of one person, index `i` named by
/// [`COCO_KEYPOINT_INDEXES`]`[i]`.
#[derive(Debug, Clone, PartialEq)]
pub struct KeypointSet {
    points: [Keypoint; NUM_KEYPOINTS],
}

impl KeypointSet {
    /// Build a keypoint set.
    ///
    /// # Errors
    ///
    /// Returns [`PoseError::InferenceError`] unless exactly 17 points are given.
    pub fn new(points: Vec<Keypoint>) -> Result<Self> {
        let count = points.len();
        let points = <[Keypoint; NUM_KEYPOINTS]>::try_from(points).map_err(|_| {
            PoseError::InferenceError(format!(
                "expected {NUM_KEYPOINTS} keypoints per person, got {count}"
            ))
        })?;
        Ok(Self { points })
    }

    /// Build a keypoint set from plain coordinates with zero confidence.
    ///
    /// # Errors
    ///
    /// Returns an error unless exactly 17 coordinates are given.
    pub fn from_xy(coords: &[(f32, f32)]) -> Result<Self> {
        Self::new(
            coords
                .iter()
                .map(|&(x, y)| Keypoint::new(x, y, 0.0))
                .collect(),
        )
    }

    /// All keypoints in COCO order.
    #[must_use]
    pub const fn points(&self) -> &[Keypoint; NUM_KEYPOINTS] {
        &self.points
    }

    /// Keypoint by index.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&Keypoint> {
        self.points.get(index)
    }

    /// Keypoint by COCO name, e.g. `"left_wrist"`.
    #[must_use]
    pub fn by_name(&self, name: &str) -> Option<&Keypoint> {
        COCO_KEYPOINT_INDEXES
            .iter()
            .position(|n| *n == name)
            .map(|i| &self.points[i])
    }
}

/// Stage timings of one frame, in seconds.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FrameTimings {
    /// Person detection, `None` when boxes were supplied with the frame.
    pub bbox: Option<f64>,
    /// Pose estimation, `None` when no person was found.
    pub pose: Option<f64>,
    /// Whole frame, `None` when no person was found.
    pub total: Option<f64>,
}

/// Running timing lists for the end-of-run summary.
#[derive(Debug, Clone, Default)]
pub struct TimingStats {
    bbox: Vec<f64>,
    pose: Vec<f64>,
    total: Vec<f64>,
}

#[allow(clippy::cast_precision_loss)]
fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

impl TimingStats {
    /// Create empty statistics.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add the timings of one frame.
    pub fn record(&mut self, timings: &FrameTimings) {
        self.bbox.extend(timings.bbox);
        self.pose.extend(timings.pose);
        self.total.extend(timings.total);
    }

    /// Mean detection time.
    #[must_use]
    pub fn average_bbox(&self) -> Option<f64> {
        mean(&self.bbox)
    }

    /// Mean pose estimation time.
    #[must_use]
    pub fn average_pose(&self) -> Option<f64> {
        mean(&self.pose)
    }

    /// Mean total time of annotated frames.
    #[must_use]
    pub fn average_total(&self) -> Option<f64> {
        mean(&self.total)
    }

    /// Number of frames that went through pose estimation.
    #[must_use]
    pub fn annotated_frames(&self) -> usize {
        self.pose.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[allow(clippy::cast_precision_loss)]
    fn grid() -> Vec<(f32, f32)> {
        (0..NUM_KEYPOINTS)
            .map(|i| (i as f32 * 10.5, i as f32 * -2.7))
            .collect()
    }

    #[test]
    fn test_keypoint_set_requires_17_points() {
        assert!(KeypointSet::from_xy(&grid()).is_ok());
        assert!(KeypointSet::from_xy(&grid()[..16]).is_err());
        let mut too_many = grid();
        too_many.push((0.0, 0.0));
        assert!(KeypointSet::from_xy(&too_many).is_err());
    }

    #[test]
    fn test_lookup_by_name() {
        let set = KeypointSet::from_xy(&grid()).unwrap();
        assert_eq!(set.by_name("nose"), set.get(0));
        assert_eq!(set.by_name("right_ankle"), set.get(16));
        assert!(set.by_name("tail").is_none());
    }

    #[test]
    fn test_pixel_truncates_toward_zero() {
        assert_eq!(Keypoint::new(10.9, -2.7, 0.0).pixel(), (10, -2));
    }

    #[test]
    fn test_timing_stats() {
        let mut stats = TimingStats::new();
        assert!(stats.average_bbox().is_none());

        stats.record(&FrameTimings {
            bbox: Some(0.2),
            pose: None,
            total: None,
        });
        stats.record(&FrameTimings {
            bbox: Some(0.4),
            pose: Some(0.1),
            total: Some(0.6),
        });

        assert!((stats.average_bbox().unwrap() - 0.3).abs() < 1e-9);
        assert!((stats.average_pose().unwrap() - 0.1).abs() < 1e-9);
        assert!((stats.average_total().unwrap() - 0.6).abs() < 1e-9);
        assert_eq!(stats.annotated_frames(), 1);
    }
}
