// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Per-frame orchestration.
//!
//! ```text
//! DETECT (or supplied boxes) -> no boxes: frame unchanged
//!                            -> center/scale -> batched pose -> render
//! ```
//!
//! Frames without people pass through untouched so every input still
//! produces an output frame.

use std::time::Instant;

use ab_glyph::FontVec;
use image::RgbImage;

use crate::annotate::{draw_person_boxes, draw_timer_text, render_skeleton};
use crate::config::PoseConfig;
use crate::detector::PersonDetector;
use crate::error::{PoseError, Result};
use crate::estimator::PoseEstimator;
use crate::geometry::{BoundingBox, CenterScale, box_to_center_scale};
use crate::results::{FrameTimings, KeypointSet};
use crate::source::Frame;
use crate::verbose;
use crate::visualizer::ColorStyle;

/// Settings of a [`FramePipeline`] that do not change between frames.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PipelineOptions {
    /// Pose model input (width, height).
    pub image_size: (usize, usize),
    /// Person confidence threshold handed to the detector.
    pub detection_threshold: f32,
    /// Draw detected person boxes.
    pub write_box_frames: bool,
}

impl PipelineOptions {
    /// Options taken from `config`.
    #[must_use]
    pub const fn from_config(config: &PoseConfig, write_box_frames: bool) -> Self {
        Self {
            image_size: config.image_size,
            detection_threshold: config.detection_threshold,
            write_box_frames,
        }
    }
}

/// Result of one pass through the pipeline.
#[derive(Debug, Clone)]
pub struct ProcessedFrame {
    /// Frame to write, annotated when people were found.
    pub image: RgbImage,
    /// Person boxes used for pose estimation.
    pub boxes: Vec<BoundingBox>,
    /// One keypoint set per box.
    pub poses: Vec<KeypointSet>,
    /// Stage timings.
    pub timings: FrameTimings,
}

impl ProcessedFrame {
    /// Whether any person was annotated.
    #[must_use]
    pub fn has_people(&self) -> bool {
        !self.poses.is_empty()
    }
}

/// Detector, pose estimator and renderer wired together.
pub struct FramePipeline {
    detector: Option<Box<dyn PersonDetector>>,
    estimator: Box<dyn PoseEstimator>,
    style: ColorStyle,
    options: PipelineOptions,
    timer_font: Option<FontVec>,
}

impl FramePipeline {
    /// Create a pipeline.
    ///
    /// `detector` may be `None` when every frame brings its own boxes.
    #[must_use]
    pub fn new(
        detector: Option<Box<dyn PersonDetector>>,
        estimator: Box<dyn PoseEstimator>,
        style: ColorStyle,
        options: PipelineOptions,
    ) -> Self {
        Self {
            detector,
            estimator,
            style,
            options,
            timer_font: None,
        }
    }

    /// Font for the per-frame timer; without one the timer is not drawn.
    #[must_use]
    pub fn with_timer_font(mut self, font: Option<FontVec>) -> Self {
        self.timer_font = font;
        self
    }

    /// Active skeleton style.
    #[must_use]
    pub const fn style(&self) -> &ColorStyle {
        &self.style
    }

    /// Annotate one frame.
    ///
    /// The total time runs from `frame.meta.started` and feeds the timer
    /// overlay.
    ///
    /// # Errors
    ///
    /// Returns an error if a collaborator fails, or if the frame needs the
    /// detector and none was loaded.
    pub fn process(&mut self, frame: &Frame) -> Result<ProcessedFrame> {
        let mut image = frame.image.to_rgb8();
        let mut timings = FrameTimings::default();

        let (boxes, detected) = match &frame.boxes {
            Some(boxes) => (boxes.clone(), false),
            None => {
                let detector = self.detector.as_mut().ok_or_else(|| {
                    PoseError::InferenceError("No person detector loaded".to_string())
                })?;
                let now = Instant::now();
                let boxes = detector.detect(&frame.image, self.options.detection_threshold)?;
                let elapsed = now.elapsed().as_secs_f64();
                verbose!("Find person bbox in: {elapsed:.4} sec");
                timings.bbox = Some(elapsed);
                (boxes, true)
            }
        };

        if boxes.is_empty() {
            return Ok(ProcessedFrame {
                image,
                boxes,
                poses: Vec::new(),
                timings,
            });
        }

        if detected && self.options.write_box_frames {
            draw_person_boxes(&mut image, &boxes);
        }

        let (width, height) = self.options.image_size;
        let regions: Vec<CenterScale> = boxes
            .iter()
            .map(|bbox| box_to_center_scale(bbox, width, height))
            .collect();

        let now = Instant::now();
        let poses = self.estimator.estimate(&frame.image, &regions)?;
        let elapsed = now.elapsed().as_secs_f64();
        verbose!("Find person pose in: {elapsed:.4} sec");
        timings.pose = Some(elapsed);

        if poses.len() != boxes.len() {
            return Err(PoseError::InferenceError(format!(
                "pose estimator returned {} poses for {} persons",
                poses.len(),
                boxes.len()
            )));
        }

        for (pose, bbox) in poses.iter().zip(&boxes) {
            render_skeleton(&mut image, pose, bbox.reference_size(), &self.style);
        }

        let total = frame.meta.started.elapsed().as_secs_f64();
        timings.total = Some(total);
        if detected && let Some(font) = &self.timer_font {
            draw_timer_text(&mut image, total, font);
        }

        Ok(ProcessedFrame {
            image,
            boxes,
            poses,
            timings,
        })
    }
}

impl std::fmt::Debug for FramePipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FramePipeline")
            .field("detector", &self.detector.is_some())
            .field("style", &self.style.name())
            .field("options", &self.options)
            .field("timer_font", &self.timer_font.is_some())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::SourceMeta;
    use crate::visualizer::StyleName;
    use image::{DynamicImage, Rgb};
    use std::path::PathBuf;

    struct FixedDetector(Vec<BoundingBox>);

    impl PersonDetector for FixedDetector {
        fn detect(&mut self, _image: &DynamicImage, _threshold: f32) -> Result<Vec<BoundingBox>> {
            Ok(self.0.clone())
        }
    }

    /// Places every keypoint on a vertical line through the region center.
    struct LineEstimator;

    impl PoseEstimator for LineEstimator {
        #[allow(clippy::cast_precision_loss)]
        fn estimate(
            &mut self,
            _image: &DynamicImage,
            regions: &[CenterScale],
        ) -> Result<Vec<KeypointSet>> {
            regions
                .iter()
                .map(|r| {
                    let coords: Vec<(f32, f32)> = (0..17)
                        .map(|i| (r.center.0, r.center.1 - 40.0 + i as f32 * 5.0))
                        .collect();
                    KeypointSet::from_xy(&coords)
                })
                .collect()
        }
    }

    fn frame(boxes: Option<Vec<BoundingBox>>) -> Frame {
        Frame {
            image: DynamicImage::ImageRgb8(RgbImage::from_pixel(200, 240, Rgb([255, 255, 255]))),
            meta: SourceMeta {
                frame_idx: 1,
                total_frames: None,
                path: PathBuf::from("frame.jpg"),
                label: "frame.jpg".to_string(),
                fps: None,
                started: Instant::now(),
            },
            boxes,
        }
    }

    fn pipeline(detector: Option<Vec<BoundingBox>>, write_box_frames: bool) -> FramePipeline {
        FramePipeline::new(
            detector.map(|boxes| Box::new(FixedDetector(boxes)) as Box<dyn PersonDetector>),
            Box::new(LineEstimator),
            StyleName::Chunhua.color_style(),
            PipelineOptions {
                image_size: (192, 256),
                detection_threshold: 0.9,
                write_box_frames,
            },
        )
    }

    #[test]
    fn test_no_person_leaves_frame_untouched() {
        let mut pipeline = pipeline(Some(Vec::new()), true);
        let input = frame(None);
        let out = pipeline.process(&input).unwrap();

        assert!(!out.has_people());
        assert_eq!(out.image, input.image.to_rgb8());
        assert!(out.timings.bbox.is_some());
        assert!(out.timings.pose.is_none());
        assert!(out.timings.total.is_none());
    }

    #[test]
    fn test_detected_person_is_rendered() {
        let bbox = BoundingBox::new((10.0, 10.0), (110.0, 210.0));
        let mut pipeline = pipeline(Some(vec![bbox]), false);
        let out = pipeline.process(&frame(None)).unwrap();

        assert_eq!(out.boxes, vec![bbox]);
        assert_eq!(out.poses.len(), 1);
        assert!(out.timings.total.is_some());
        // Ring of the first keypoint at (60, 70); the background is white.
        assert_eq!(out.image.get_pixel(59, 70), &Rgb([0, 0, 0]));
        // Box corner untouched without --writeBoxFrames.
        assert_eq!(out.image.get_pixel(10, 10), &Rgb([255, 255, 255]));
    }

    #[test]
    fn test_box_frames_are_green() {
        let bbox = BoundingBox::new((10.0, 10.0), (110.0, 210.0));
        let mut pipeline = pipeline(Some(vec![bbox]), true);
        let out = pipeline.process(&frame(None)).unwrap();
        assert_eq!(out.image.get_pixel(10, 10), &Rgb([0, 255, 0]));
        assert_eq!(out.image.get_pixel(12, 100), &Rgb([0, 255, 0]));
    }

    #[test]
    fn test_supplied_boxes_skip_detector() {
        let bbox = BoundingBox::new((20.0, 20.0), (120.0, 220.0));
        let mut pipeline = pipeline(None, true);
        let out = pipeline.process(&frame(Some(vec![bbox]))).unwrap();

        assert_eq!(out.poses.len(), 1);
        assert!(out.timings.bbox.is_none());
        // Supplied boxes are never drawn.
        assert_eq!(out.image.get_pixel(20, 20), &Rgb([255, 255, 255]));
    }

    fn timer_font() -> FontVec {
        let bytes = include_bytes!(concat!(
            env!("CARGO_MANIFEST_DIR"),
            "/tests/fonts/DejaVuSansMono.ttf"
        ));
        FontVec::try_from_vec(bytes.to_vec()).unwrap()
    }

    /// Whether anything was drawn where the timer text goes.
    fn timer_drawn(image: &RgbImage) -> bool {
        (100..200).any(|x| (20..60).any(|y| *image.get_pixel(x, y) != Rgb([255, 255, 255])))
    }

    #[test]
    fn test_timer_only_on_detected_people() {
        let bbox = BoundingBox::new((10.0, 10.0), (110.0, 210.0));

        let mut detected = pipeline(Some(vec![bbox]), false).with_timer_font(Some(timer_font()));
        let out = detected.process(&frame(None)).unwrap();
        assert!(timer_drawn(&out.image));

        let mut empty = pipeline(Some(Vec::new()), false).with_timer_font(Some(timer_font()));
        let out = empty.process(&frame(None)).unwrap();
        assert!(!timer_drawn(&out.image));

        let mut supplied = pipeline(None, false).with_timer_font(Some(timer_font()));
        let out = supplied.process(&frame(Some(vec![bbox]))).unwrap();
        assert_eq!(out.poses.len(), 1);
        assert!(!timer_drawn(&out.image));
    }

    #[test]
    fn test_total_time_runs_from_frame_start() {
        let bbox = BoundingBox::new((10.0, 10.0), (110.0, 210.0));
        let mut pipeline = pipeline(Some(vec![bbox]), false);
        let mut input = frame(None);
        input.meta.started = Instant::now()
            .checked_sub(std::time::Duration::from_millis(250))
            .unwrap();

        let out = pipeline.process(&input).unwrap();
        assert!(out.timings.total.unwrap() >= 0.25);
    }

    #[test]
    fn test_missing_detector_is_an_error() {
        let mut pipeline = pipeline(None, false);
        let result = pipeline.process(&frame(None));
        assert!(matches!(result, Err(PoseError::InferenceError(_))));
    }

    #[test]
    fn test_processing_is_deterministic() {
        let boxes = vec![
            BoundingBox::new((10.0, 10.0), (90.0, 200.0)),
            BoundingBox::new((100.0, 30.0), (190.0, 230.0)),
        ];
        let mut pipeline = pipeline(Some(boxes), true);
        let a = pipeline.process(&frame(None)).unwrap();
        let b = pipeline.process(&frame(None)).unwrap();
        assert_eq!(a.image, b.image);
        assert_eq!(a.poses, b.poses);
    }
}
