// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Skeleton styles and the live preview window.

/// Color definitions and skeleton styles.
pub mod color;

/// COCO keypoint layout.
pub mod skeleton;

#[cfg(feature = "visualize")]
pub mod viewer;

pub use color::{Color, ColorStyle, LinkPair, StyleName};
pub use skeleton::{COCO_KEYPOINT_INDEXES, NUM_KEYPOINTS, THIN_LINK_RANGE};

#[cfg(feature = "visualize")]
pub use viewer::Viewer;
