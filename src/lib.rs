// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

#![allow(clippy::multiple_crate_versions)]
#![cfg_attr(docsrs, feature(doc_cfg))]

//! # Pose Demo
//!
//! Multi-person pose visualization on top of ONNX Runtime. A YOLO detector
//! finds people, a heatmap pose model (HRNet and alike) estimates their 17
//! COCO keypoints in one batch per frame, and the skeletons are drawn back
//! onto the frame.
//!
//! ## Inputs
//!
//! - **Video** - sampled down to `--inferenceFps`, written as numbered JPEGs
//!   and an H.264 video
//! - **Image directory** - walked recursively, one `<name>_pose.jpg` per file
//! - **Scene graph** - a JSON file whose person objects replace the detector
//!
//! ## CLI Usage
//!
//! ```bash
//! pose-demo --cfg inference-config.yaml --fileType vid --videoFile walk.mp4 --writeBoxFrames
//! pose-demo --cfg inference-config.yaml --fileType img --imagesDirectory frames/
//! pose-demo --cfg inference-config.yaml --fileType img --jsonDir scenes/2.json
//! ```
//!
//! Everything lands in `<outputDir>/pose/`, which is recreated on every run.
//! Trailing `KEY VALUE` pairs override the cfg file, e.g.
//! `TEST.MODEL_FILE pose_hrnet_w32_256x192.onnx DEVICE cuda:0`.
//!
//! ## Library Usage
//!
//! The pipeline talks to its models through [`PersonDetector`] and
//! [`PoseEstimator`], so either side can be replaced:
//!
//! ```no_run
//! use pose_demo::{
//!     FramePipeline, HeatmapPoseEstimator, PipelineOptions, PoseConfig, Source,
//!     SourceIterator, YoloPersonDetector,
//! };
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = PoseConfig::new().with_model_file("pose_hrnet_w32_256x192.onnx");
//!     let detector = YoloPersonDetector::load(&config)?;
//!     let estimator = HeatmapPoseEstimator::load(&config)?;
//!     let mut pipeline = FramePipeline::new(
//!         Some(Box::new(detector)),
//!         Box::new(estimator),
//!         config.style.color_style(),
//!         PipelineOptions::from_config(&config, false),
//!     );
//!
//!     for frame in SourceIterator::new(Source::ImageDirectory("frames".into()), 20)? {
//!         let frame = frame?;
//!         let processed = pipeline.process(&frame)?;
//!         println!("{}: {} people", frame.meta.label, processed.poses.len());
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - `visualize` (default) - `--showImages` preview window
//! - `video` (default) - video decoding and encoding through FFmpeg
//! - `cuda`, `tensorrt`, `coreml`, `openvino` - ONNX Runtime execution providers

// Modules
pub mod annotate;
pub mod category;
pub mod cli;
pub mod config;
pub mod detector;
pub mod device;
pub mod download;
pub mod error;
pub mod estimator;
pub mod geometry;
pub mod io;
pub mod metadata;
pub mod model;
pub mod pipeline;
pub mod postprocessing;
pub mod preprocessing;
pub mod results;
pub mod scene_graph;
pub mod source;
pub mod utils;
pub mod visualizer;

// Re-export main types for convenience
pub use category::Category;
pub use config::PoseConfig;
pub use detector::{PersonDetector, YoloPersonDetector};
pub use device::Device;
pub use error::{PoseError, Result};
pub use estimator::{HeatmapPoseEstimator, PoseEstimator};
pub use geometry::{BoundingBox, CenterScale, box_to_center_scale};
pub use io::{FrameSink, PoseSink, prepare_output_dirs};
pub use pipeline::{FramePipeline, PipelineOptions, ProcessedFrame};
pub use results::{FrameTimings, Keypoint, KeypointSet, TimingStats};
pub use scene_graph::SceneGraph;
pub use source::{Frame, FrameSampler, Source, SourceIterator, SourceMeta};
pub use visualizer::{ColorStyle, StyleName};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name.
pub const NAME: &str = env!("CARGO_PKG_NAME");
