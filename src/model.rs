// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! ONNX Runtime session wrapper shared by the detector and the pose estimator.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use ndarray::Array4;
#[cfg(feature = "coreml")]
use ort::execution_providers::CoreMLExecutionProvider;
#[cfg(feature = "cuda")]
use ort::execution_providers::CUDAExecutionProvider;
#[cfg(feature = "openvino")]
use ort::execution_providers::OpenVINOExecutionProvider;
#[cfg(feature = "tensorrt")]
use ort::execution_providers::TensorRTExecutionProvider;
use ort::session::Session;
use ort::session::builder::{GraphOptimizationLevel, SessionBuilder};
use ort::value::TensorRef;

use crate::device::Device;
use crate::error::{PoseError, Result};
use crate::metadata::{METADATA_KEYS, ModelMetadata};
use crate::{verbose, warn};

/// One loaded ONNX model with a single image input and a primary output.
pub struct OnnxModel {
    session: Session,
    input_name: String,
    output_name: String,
    metadata: ModelMetadata,
    path: PathBuf,
}

impl OnnxModel {
    /// Load a model onto `device`.
    ///
    /// Devices whose execution provider is not compiled in run on the CPU with
    /// a warning.
    ///
    /// # Errors
    ///
    /// Returns [`PoseError::ModelLoadError`] if the file is missing or ONNX
    /// Runtime rejects it.
    pub fn load<P: AsRef<Path>>(path: P, device: &Device) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(PoseError::ModelLoadError(format!(
                "Model file not found: {}",
                path.display()
            )));
        }

        let builder = Session::builder().map_err(|e| {
            PoseError::ModelLoadError(format!("Failed to create session builder: {e}"))
        })?;
        let builder = register_device(builder, device)?;

        let num_threads = std::thread::available_parallelism().map_or(4, usize::from);
        let session = builder
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(|e| {
                PoseError::ModelLoadError(format!("Failed to set optimization level: {e}"))
            })?
            .with_intra_threads(num_threads)
            .map_err(|e| {
                PoseError::ModelLoadError(format!("Failed to set intra-thread count: {e}"))
            })?
            .commit_from_file(path)
            .map_err(|e| {
                PoseError::ModelLoadError(format!("Failed to load {}: {e}", path.display()))
            })?;

        let metadata = extract_metadata(&session)?;
        let input_name = session
            .inputs
            .first()
            .map_or_else(|| "images".to_string(), |i| i.name.clone());
        let output_name = session
            .outputs
            .first()
            .map(|o| o.name.clone())
            .ok_or_else(|| {
                PoseError::ModelLoadError(format!("{} has no outputs", path.display()))
            })?;

        verbose!(
            "Loaded {} on {device} (input '{input_name}', output '{output_name}')",
            path.display()
        );

        Ok(Self {
            session,
            input_name,
            output_name,
            metadata,
            path: path.to_path_buf(),
        })
    }

    /// Run the model on an NCHW tensor and return the primary output as
    /// flat data plus shape.
    ///
    /// # Errors
    ///
    /// Returns [`PoseError::InferenceError`] if ONNX Runtime fails.
    pub fn run(&mut self, input: &Array4<f32>) -> Result<(Vec<f32>, Vec<usize>)> {
        let input_contiguous = input.as_standard_layout();
        let input_tensor = TensorRef::from_array_view(&input_contiguous).map_err(|e| {
            PoseError::InferenceError(format!("Failed to create input tensor: {e}"))
        })?;

        let inputs = ort::inputs![&self.input_name => input_tensor];
        let outputs = self
            .session
            .run(inputs)
            .map_err(|e| PoseError::InferenceError(format!("Inference failed: {e}")))?;

        let output = outputs.get(self.output_name.as_str()).ok_or_else(|| {
            PoseError::InferenceError(format!("Output '{}' not found", self.output_name))
        })?;
        let (shape, data) = output
            .try_extract_tensor::<f32>()
            .map_err(|e| PoseError::InferenceError(format!("Failed to extract output: {e}")))?;

        #[allow(clippy::cast_sign_loss, clippy::cast_possible_truncation)]
        let shape_vec: Vec<usize> = shape.iter().map(|&d| d.max(0) as usize).collect();
        Ok((data.to_vec(), shape_vec))
    }

    /// Metadata found in the model file.
    #[must_use]
    pub const fn metadata(&self) -> &ModelMetadata {
        &self.metadata
    }

    /// Path the model was loaded from.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl std::fmt::Debug for OnnxModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OnnxModel")
            .field("path", &self.path)
            .field("input", &self.input_name)
            .field("output", &self.output_name)
            .field("imgsz", &self.metadata.imgsz)
            .finish_non_exhaustive()
    }
}

/// Read the Ultralytics custom metadata properties, if any.
fn extract_metadata(session: &Session) -> Result<ModelMetadata> {
    let model_metadata = session
        .metadata()
        .map_err(|e| PoseError::ModelLoadError(format!("Failed to get model metadata: {e}")))?;

    let mut properties = HashMap::new();
    for key in METADATA_KEYS {
        if let Ok(Some(value)) = model_metadata.custom(key) {
            properties.insert(key.to_string(), value);
        }
    }
    ModelMetadata::from_properties(&properties)
}

#[cfg(any(feature = "cuda", feature = "tensorrt"))]
fn device_id(index: usize) -> Result<i32> {
    i32::try_from(index)
        .map_err(|_| PoseError::ConfigError(format!("Device index {index} is out of range")))
}

/// Register the execution provider for `device` on the session builder.
fn register_device(builder: SessionBuilder, device: &Device) -> Result<SessionBuilder> {
    match device {
        Device::Cpu => Ok(builder),
        #[cfg(feature = "cuda")]
        Device::Cuda(index) => builder
            .with_execution_providers([CUDAExecutionProvider::default()
                .with_device_id(device_id(*index)?)
                .build()])
            .map_err(|e| PoseError::ModelLoadError(format!("Failed to register {device}: {e}"))),
        #[cfg(feature = "tensorrt")]
        Device::TensorRt(index) => builder
            .with_execution_providers([TensorRTExecutionProvider::default()
                .with_device_id(device_id(*index)?)
                .build()])
            .map_err(|e| PoseError::ModelLoadError(format!("Failed to register {device}: {e}"))),
        #[cfg(feature = "coreml")]
        Device::CoreMl => builder
            .with_execution_providers([CoreMLExecutionProvider::default()
                .with_subgraphs(true)
                .build()])
            .map_err(|e| PoseError::ModelLoadError(format!("Failed to register {device}: {e}"))),
        #[cfg(feature = "openvino")]
        Device::OpenVino => builder
            .with_execution_providers([OpenVINOExecutionProvider::default().build()])
            .map_err(|e| PoseError::ModelLoadError(format!("Failed to register {device}: {e}"))),
        #[allow(unreachable_patterns)]
        other => {
            warn!(
                "{} is not enabled in this build, running on CPU",
                other.provider_name()
            );
            Ok(builder)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_not_found() {
        let result = OnnxModel::load("nonexistent.onnx", &Device::Cpu);
        assert!(matches!(result, Err(PoseError::ModelLoadError(_))));
    }
}
