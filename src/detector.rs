// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Person detection.
//!
//! [`PersonDetector`] is the seam the frame pipeline talks to;
//! [`YoloPersonDetector`] implements it with an Ultralytics YOLO detection
//! model exported to ONNX.

use std::path::Path;

use image::DynamicImage;

use crate::config::PoseConfig;
use crate::download::{DEFAULT_DETECTOR, try_download_detector};
use crate::error::Result;
use crate::geometry::BoundingBox;
use crate::model::OnnxModel;
use crate::postprocessing::{DetectOptions, decode_detections};
use crate::preprocessing::letterbox;
use crate::{verbose, warn};

/// Finds people in a frame.
pub trait PersonDetector {
    /// Person boxes whose confidence is strictly greater than `threshold`.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying model fails.
    fn detect(&mut self, image: &DynamicImage, threshold: f32) -> Result<Vec<BoundingBox>>;
}

/// YOLO detection model restricted to the person class.
#[derive(Debug)]
pub struct YoloPersonDetector {
    model: OnnxModel,
    person_class: usize,
    iou_threshold: f32,
}

impl YoloPersonDetector {
    /// Load `DETECTOR.MODEL_FILE` onto the configured device.
    ///
    /// The default detector is downloaded when it is not on disk.
    ///
    /// # Errors
    ///
    /// Returns an error if the model is missing and cannot be downloaded, or
    /// cannot be loaded.
    pub fn load(config: &PoseConfig) -> Result<Self> {
        let path = Path::new(&config.detector_model);
        if !path.exists() {
            if path.file_name().and_then(|n| n.to_str()) == Some(DEFAULT_DETECTOR) {
                warn!("{} not found, downloading", path.display());
            }
            try_download_detector(path)?;
        }

        let model = OnnxModel::load(path, &config.device)?;
        let person_class = match model.metadata().person_class() {
            Some(class_id) => class_id,
            None => {
                if model.metadata().num_classes() > 0 {
                    warn!(
                        "{} names no 'person' class, using class 0",
                        path.display()
                    );
                }
                0
            }
        };
        verbose!(
            "Person detector {} ready (person class {person_class}, input {:?})",
            path.display(),
            model.metadata().imgsz
        );

        Ok(Self {
            model,
            person_class,
            iou_threshold: config.iou_threshold,
        })
    }

    /// Class index treated as person.
    #[must_use]
    pub const fn person_class(&self) -> usize {
        self.person_class
    }
}

impl PersonDetector for YoloPersonDetector {
    fn detect(&mut self, image: &DynamicImage, threshold: f32) -> Result<Vec<BoundingBox>> {
        let preprocess = letterbox(image, self.model.metadata().imgsz)?;
        let (output, shape) = self.model.run(&preprocess.tensor)?;

        let options = DetectOptions {
            num_classes: self.model.metadata().num_classes(),
            class_filter: Some(self.person_class),
            score_threshold: threshold,
            iou_threshold: self.iou_threshold,
        };
        Ok(decode_detections(&output, &shape, &preprocess, &options)
            .into_iter()
            .map(|det| det.bbox)
            .collect())
    }
}
