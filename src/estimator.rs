// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Top-down pose estimation.
//!
//! Each person region is warped to the model input size, all crops of a frame
//! go through the model as one batch and the resulting joint heatmaps are
//! decoded back into image coordinates.

use image::{DynamicImage, RgbImage};

use crate::config::PoseConfig;
use crate::error::{PoseError, Result};
use crate::geometry::{CenterScale, get_affine_transform};
use crate::model::OnnxModel;
use crate::postprocessing::decode_heatmaps;
use crate::preprocessing::{crops_to_tensor, warp_affine};
use crate::results::KeypointSet;
use crate::{verbose, warn};

/// Estimates the 17 COCO keypoints of people in a frame.
pub trait PoseEstimator {
    /// One keypoint set per region, in the same order.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying model fails.
    fn estimate(
        &mut self,
        image: &DynamicImage,
        regions: &[CenterScale],
    ) -> Result<Vec<KeypointSet>>;
}

/// Heatmap-regression pose model (HRNet and alike) exported to ONNX.
#[derive(Debug)]
pub struct HeatmapPoseEstimator {
    model: OnnxModel,
    /// Model input (width, height).
    input_size: (usize, usize),
    /// Configured heatmap (width, height), reported when the model disagrees.
    heatmap_size: (usize, usize),
    heatmap_checked: bool,
    color_rgb: bool,
    post_process: bool,
    /// Cleared after the first failed batched run.
    batching: bool,
}

impl HeatmapPoseEstimator {
    /// Load `TEST.MODEL_FILE` onto the configured device.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the model cannot be loaded.
    pub fn load(config: &PoseConfig) -> Result<Self> {
        config.validate()?;
        let model = OnnxModel::load(&config.model_file, &config.device)?;
        verbose!(
            "Pose model {} ({}) ready, input {}x{}",
            config.model_file,
            config.model_name,
            config.image_size.0,
            config.image_size.1
        );

        Ok(Self {
            model,
            input_size: config.image_size,
            heatmap_size: config.heatmap_size,
            heatmap_checked: false,
            color_rgb: config.color_rgb,
            post_process: config.post_process,
            batching: true,
        })
    }

    /// Warp every region of `image` into a model-sized crop.
    fn crops(&self, image: &RgbImage, regions: &[CenterScale]) -> Result<Vec<RgbImage>> {
        regions
            .iter()
            .map(|region| {
                let matrix = get_affine_transform(region, 0.0, self.input_size, false)
                    .ok_or_else(|| {
                        PoseError::InferenceError(format!("degenerate person region {region:?}"))
                    })?;
                warp_affine(image, &matrix, self.input_size)
            })
            .collect()
    }

    fn run_batch(
        &mut self,
        crops: &[RgbImage],
        regions: &[CenterScale],
    ) -> Result<Vec<KeypointSet>> {
        let tensor = crops_to_tensor(crops, self.color_rgb)?;
        let (output, shape) = self.model.run(&tensor)?;
        if !self.heatmap_checked {
            self.heatmap_checked = true;
            if let &[_, _, height, width] = shape.as_slice()
                && (width, height) != self.heatmap_size
            {
                warn!(
                    "Model heatmaps are {width}x{height}, MODEL.HEATMAP_SIZE says {}x{}",
                    self.heatmap_size.0, self.heatmap_size.1
                );
            }
        }
        decode_heatmaps(&output, &shape, regions, self.post_process)
    }
}

impl PoseEstimator for HeatmapPoseEstimator {
    fn estimate(
        &mut self,
        image: &DynamicImage,
        regions: &[CenterScale],
    ) -> Result<Vec<KeypointSet>> {
        if regions.is_empty() {
            return Ok(Vec::new());
        }

        let rgb = image.to_rgb8();
        let crops = self.crops(&rgb, regions)?;

        if self.batching || regions.len() == 1 {
            match self.run_batch(&crops, regions) {
                Ok(poses) => return Ok(poses),
                Err(e) if regions.len() > 1 => {
                    warn!("Batched pose inference failed ({e}), running one person at a time");
                    self.batching = false;
                }
                Err(e) => return Err(e),
            }
        }

        let mut poses = Vec::with_capacity(regions.len());
        for (crop, region) in crops.iter().zip(regions) {
            let single = self.run_batch(std::slice::from_ref(crop), std::slice::from_ref(region))?;
            poses.extend(single);
        }
        Ok(poses)
    }
}
