// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Error types for the pose demo.

use std::fmt;

/// Result type alias for pose demo operations.
pub type Result<T> = std::result::Result<T, PoseError>;

/// Main error type for the pose demo.
#[derive(Debug)]
pub enum PoseError {
    /// Error loading an ONNX model.
    ModelLoadError(String),
    /// Error while running a model.
    InferenceError(String),
    /// Error decoding, encoding or transforming images.
    ImageError(String),
    /// Invalid configuration file, override or argument.
    ConfigError(String),
    /// Wrapped `std::io::Error`.
    Io(std::io::Error),
    /// Malformed scene graph JSON.
    SceneGraphError(String),
    /// Video decoding or encoding error.
    VideoError(String),
    /// Preview window error.
    VisualizerError(String),
    /// Feature not enabled.
    FeatureNotEnabled(String),
    /// The video cannot be sampled at the requested rate.
    FrameRateError {
        /// Requested inference frame rate.
        desired: u32,
        /// Native frame rate of the video.
        actual: f64,
    },
}

impl fmt::Display for PoseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ModelLoadError(msg) => write!(f, "Model load error: {msg}"),
            Self::InferenceError(msg) => write!(f, "Inference error: {msg}"),
            Self::ImageError(msg) => write!(f, "Image error: {msg}"),
            Self::ConfigError(msg) => write!(f, "Config error: {msg}"),
            Self::Io(err) => write!(f, "IO error: {err}"),
            Self::SceneGraphError(msg) => write!(f, "Scene graph error: {msg}"),
            Self::VideoError(msg) => write!(f, "Video error: {msg}"),
            Self::VisualizerError(msg) => write!(f, "Visualizer error: {msg}"),
            Self::FeatureNotEnabled(msg) => write!(f, "Feature not enabled: {msg}"),
            Self::FrameRateError { desired, actual } => write!(
                f,
                "desired inference fps is {desired} but video fps is {actual}"
            ),
        }
    }
}

impl std::error::Error for PoseError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for PoseError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<image::ImageError> for PoseError {
    fn from(err: image::ImageError) -> Self {
        Self::ImageError(err.to_string())
    }
}

impl From<serde_json::Error> for PoseError {
    fn from(err: serde_json::Error) -> Self {
        Self::SceneGraphError(err.to_string())
    }
}

impl From<ort::Error> for PoseError {
    fn from(err: ort::Error) -> Self {
        Self::InferenceError(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = PoseError::ModelLoadError("test".to_string());
        assert_eq!(err.to_string(), "Model load error: test");

        let err = PoseError::ConfigError("test".to_string());
        assert_eq!(err.to_string(), "Config error: test");
    }

    #[test]
    fn test_frame_rate_message() {
        let err = PoseError::FrameRateError {
            desired: 20,
            actual: 15.0,
        };
        assert_eq!(
            err.to_string(),
            "desired inference fps is 20 but video fps is 15"
        );
    }

    #[test]
    fn test_io_source_is_kept() {
        use std::error::Error;

        let err = PoseError::from(std::io::Error::new(std::io::ErrorKind::NotFound, "gone"));
        assert!(err.source().is_some());
        assert!(err.to_string().contains("gone"));
    }

    #[test]
    fn test_json_error_maps_to_scene_graph() {
        let err: PoseError = serde_json::from_str::<serde_json::Value>("{")
            .unwrap_err()
            .into();
        assert!(matches!(err, PoseError::SceneGraphError(_)));
    }
}
