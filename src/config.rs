// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Demo configuration.
//!
//! The pose model configuration is a YAML file in the layout used by top-down
//! HRNet-style experiments (`MODEL`, `TEST`, `DATASET` sections), parsed into a
//! flat map of dotted keys (`MODEL.IMAGE_SIZE`). Trailing `KEY VALUE` pairs
//! from the command line are merged on top.

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::Path;

use crate::device::Device;
use crate::error::{PoseError, Result};
use crate::visualizer::StyleName;
use crate::warn;

/// A single value of the flattened configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigValue {
    /// Plain scalar, quotes removed.
    Scalar(String),
    /// Block (`- item`) or inline (`[a, b]`) list.
    List(Vec<String>),
}

impl ConfigValue {
    /// Parse a raw value the way it appears after `key:` or in an override.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        if let Some(inner) = raw.strip_prefix('[').and_then(|r| r.strip_suffix(']')) {
            let items = inner
                .split(',')
                .map(unquote)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect();
            return Self::List(items);
        }
        Self::Scalar(unquote(raw).to_string())
    }
}

impl fmt::Display for ConfigValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Scalar(s) => write!(f, "{s}"),
            Self::List(items) => write!(f, "[{}]", items.join(", ")),
        }
    }
}

fn unquote(s: &str) -> &str {
    s.trim().trim_matches('\'').trim_matches('"')
}

/// Strip a trailing `# comment` that is not inside quotes.
fn strip_comment(line: &str) -> &str {
    let mut in_single = false;
    let mut in_double = false;
    for (i, c) in line.char_indices() {
        match c {
            '\'' if !in_double => in_single = !in_single,
            '"' if !in_single => in_double = !in_double,
            '#' if !in_single && !in_double => return &line[..i],
            _ => {}
        }
    }
    line
}

/// Parse a YAML-subset document into dotted keys.
///
/// Supports nested mappings by indentation, block lists (`- item`, also at the
/// same indentation as their key), inline lists and `#` comments.
///
/// # Errors
///
/// Returns [`PoseError::ConfigError`] for lines that are neither `key: value`
/// nor list items.
pub fn parse_config_str(text: &str) -> Result<BTreeMap<String, ConfigValue>> {
    let mut entries: BTreeMap<String, ConfigValue> = BTreeMap::new();
    let mut stack: Vec<(usize, String)> = Vec::new();

    for (line_no, raw_line) in text.lines().enumerate() {
        let line = strip_comment(raw_line).trim_end();
        let trimmed = line.trim_start();
        if trimmed.is_empty() {
            continue;
        }
        let indent = line.len() - trimmed.len();

        if let Some(item) = trimmed.strip_prefix('-') {
            while stack.last().is_some_and(|(i, _)| *i > indent) {
                stack.pop();
            }
            let path = join_path(&stack, None);
            if path.is_empty() {
                return Err(PoseError::ConfigError(format!(
                    "line {}: list item without a key",
                    line_no + 1
                )));
            }
            let item = unquote(item).to_string();
            match entries.get_mut(&path) {
                Some(ConfigValue::List(items)) => items.push(item),
                _ => {
                    entries.insert(path, ConfigValue::List(vec![item]));
                }
            }
            continue;
        }

        let Some((key, value)) = trimmed.split_once(':') else {
            return Err(PoseError::ConfigError(format!(
                "line {}: expected `key: value`, got `{trimmed}`",
                line_no + 1
            )));
        };
        while stack.last().is_some_and(|(i, _)| *i >= indent) {
            stack.pop();
        }
        let key = unquote(key).to_string();
        if value.trim().is_empty() {
            stack.push((indent, key));
        } else {
            entries.insert(join_path(&stack, Some(&key)), ConfigValue::parse(value));
        }
    }

    Ok(entries)
}

fn join_path(stack: &[(usize, String)], leaf: Option<&str>) -> String {
    stack
        .iter()
        .map(|(_, k)| k.as_str())
        .chain(leaf)
        .collect::<Vec<_>>()
        .join(".")
}

/// Runtime configuration of the demo.
///
/// Built from defaults, then the cfg file, then command-line overrides.
///
/// # Example
///
/// ```rust
/// use pose_demo::PoseConfig;
///
/// let config = PoseConfig::new()
///     .with_model_file("pose_hrnet_w32_256x192.onnx")
///     .with_image_size(192, 256)
///     .with_detection_threshold(0.8);
/// assert_eq!(config.image_size, (192, 256));
/// ```
#[derive(Debug, Clone)]
pub struct PoseConfig {
    /// Pose network name, informational only (`MODEL.NAME`).
    pub model_name: String,
    /// Pose model input as (width, height) (`MODEL.IMAGE_SIZE`).
    pub image_size: (usize, usize),
    /// Heatmap size as (width, height) (`MODEL.HEATMAP_SIZE`).
    pub heatmap_size: (usize, usize),
    /// Number of joints predicted by the pose model (`MODEL.NUM_JOINTS`).
    pub num_joints: usize,
    /// Pose ONNX model path (`TEST.MODEL_FILE`).
    pub model_file: String,
    /// Quarter-pixel refinement of heatmap peaks (`TEST.POST_PROCESS`).
    pub post_process: bool,
    /// Feed the pose model RGB instead of BGR (`DATASET.COLOR_RGB`).
    pub color_rgb: bool,
    /// Person detector ONNX model path (`DETECTOR.MODEL_FILE`).
    pub detector_model: String,
    /// Persons are kept when their score is strictly above this (`DETECTOR.THRESHOLD`).
    pub detection_threshold: f32,
    /// `IoU` threshold for detector NMS (`DETECTOR.IOU_THRESHOLD`).
    pub iou_threshold: f32,
    /// Execution device (`DEVICE`).
    pub device: Device,
    /// Skeleton color style (`DEMO.STYLE`).
    pub style: StyleName,
    /// Verbose console output (`DEMO.VERBOSE`).
    pub verbose: bool,
}

impl Default for PoseConfig {
    fn default() -> Self {
        Self {
            model_name: "pose_hrnet".to_string(),
            image_size: (192, 256),
            heatmap_size: (48, 64),
            num_joints: 17,
            model_file: String::new(),
            post_process: true,
            color_rgb: true,
            detector_model: crate::download::DEFAULT_DETECTOR.to_string(),
            detection_threshold: 0.9,
            iou_threshold: 0.45,
            device: Device::Cpu,
            style: StyleName::Chunhua,
            verbose: true,
        }
    }
}

impl PoseConfig {
    /// Create a configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a configuration file on top of the defaults.
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the YAML cfg file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or a recognized key has an
    /// invalid value.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|e| {
            PoseError::ConfigError(format!("Failed to read cfg {}: {e}", path.display()))
        })?;
        Self::from_yaml_str(&text)
    }

    /// Parse a configuration from YAML text on top of the defaults.
    ///
    /// Keys the demo does not use (training schedules, dataset paths) are ignored.
    ///
    /// # Errors
    ///
    /// Returns an error if the text is malformed or a recognized key has an
    /// invalid value.
    pub fn from_yaml_str(text: &str) -> Result<Self> {
        let mut config = Self::default();
        for (key, value) in parse_config_str(text)? {
            config.set(&key, &value)?;
        }
        Ok(config)
    }

    /// Merge trailing `KEY VALUE` command-line pairs.
    ///
    /// Unknown keys are reported with a warning and skipped.
    ///
    /// # Errors
    ///
    /// Returns an error for an odd number of items or an invalid value.
    pub fn apply_overrides(&mut self, opts: &[String]) -> Result<()> {
        if opts.len() % 2 != 0 {
            return Err(PoseError::ConfigError(format!(
                "Override list must contain KEY VALUE pairs, got {} items",
                opts.len()
            )));
        }
        for pair in opts.chunks_exact(2) {
            let value = ConfigValue::parse(&pair[1]);
            if !self.set(&pair[0], &value)? {
                warn!("Ignoring unknown config override '{}'", pair[0]);
            }
        }
        Ok(())
    }

    /// Set one dotted key. Returns `false` when the key is not used by the demo.
    ///
    /// # Errors
    ///
    /// Returns an error if the value does not parse for a recognized key.
    pub fn set(&mut self, key: &str, value: &ConfigValue) -> Result<bool> {
        match key {
            "MODEL.NAME" => self.model_name = scalar(key, value)?.to_string(),
            "MODEL.IMAGE_SIZE" => self.image_size = size_pair(key, value)?,
            "MODEL.HEATMAP_SIZE" => self.heatmap_size = size_pair(key, value)?,
            "MODEL.NUM_JOINTS" => self.num_joints = parse_scalar(key, value)?,
            "TEST.MODEL_FILE" => self.model_file = scalar(key, value)?.to_string(),
            "TEST.POST_PROCESS" => self.post_process = parse_bool(key, value)?,
            "DATASET.COLOR_RGB" => self.color_rgb = parse_bool(key, value)?,
            "DETECTOR.MODEL_FILE" => self.detector_model = scalar(key, value)?.to_string(),
            "DETECTOR.THRESHOLD" => self.detection_threshold = parse_scalar(key, value)?,
            "DETECTOR.IOU_THRESHOLD" => self.iou_threshold = parse_scalar(key, value)?,
            "DEVICE" => {
                self.device = scalar(key, value)?
                    .parse()
                    .map_err(|e| PoseError::ConfigError(format!("{key}: {e}")))?;
            }
            "DEMO.STYLE" => {
                self.style = scalar(key, value)?
                    .parse()
                    .map_err(|e| PoseError::ConfigError(format!("{key}: {e}")))?;
            }
            "DEMO.VERBOSE" => self.verbose = parse_bool(key, value)?,
            _ => return Ok(false),
        }
        Ok(true)
    }

    /// Check the values the pipeline relies on.
    ///
    /// # Errors
    ///
    /// Returns [`PoseError::ConfigError`] describing the first problem found.
    pub fn validate(&self) -> Result<()> {
        if self.model_file.is_empty() {
            return Err(PoseError::ConfigError(
                "expected model defined in config at TEST.MODEL_FILE".to_string(),
            ));
        }
        if self.num_joints != crate::visualizer::NUM_KEYPOINTS {
            return Err(PoseError::ConfigError(format!(
                "MODEL.NUM_JOINTS must be {}, got {}",
                crate::visualizer::NUM_KEYPOINTS,
                self.num_joints
            )));
        }
        if self.image_size.0 == 0 || self.image_size.1 == 0 {
            return Err(PoseError::ConfigError(format!(
                "MODEL.IMAGE_SIZE must be positive, got {:?}",
                self.image_size
            )));
        }
        Ok(())
    }

    /// Set the pose model path.
    #[must_use]
    pub fn with_model_file(mut self, path: &str) -> Self {
        self.model_file = path.to_string();
        self
    }

    /// Set the pose model input size as (width, height).
    #[must_use]
    pub const fn with_image_size(mut self, width: usize, height: usize) -> Self {
        self.image_size = (width, height);
        self
    }

    /// Set the heatmap size as (width, height).
    #[must_use]
    pub const fn with_heatmap_size(mut self, width: usize, height: usize) -> Self {
        self.heatmap_size = (width, height);
        self
    }

    /// Set the person detection threshold.
    #[must_use]
    pub const fn with_detection_threshold(mut self, threshold: f32) -> Self {
        self.detection_threshold = threshold;
        self
    }

    /// Set the skeleton color style.
    #[must_use]
    pub const fn with_style(mut self, style: StyleName) -> Self {
        self.style = style;
        self
    }

    /// Set the execution device.
    #[must_use]
    pub fn with_device(mut self, device: Device) -> Self {
        self.device = device;
        self
    }

    /// Enable or disable quarter-pixel heatmap refinement.
    #[must_use]
    pub const fn with_post_process(mut self, enabled: bool) -> Self {
        self.post_process = enabled;
        self
    }
}

fn scalar<'a>(key: &str, value: &'a ConfigValue) -> Result<&'a str> {
    match value {
        ConfigValue::Scalar(s) => Ok(s),
        ConfigValue::List(_) => Err(PoseError::ConfigError(format!(
            "{key} expects a single value, got {value}"
        ))),
    }
}

fn parse_scalar<T: std::str::FromStr>(key: &str, value: &ConfigValue) -> Result<T> {
    let raw = scalar(key, value)?;
    raw.parse()
        .map_err(|_| PoseError::ConfigError(format!("Invalid value for {key}: {raw}")))
}

fn parse_bool(key: &str, value: &ConfigValue) -> Result<bool> {
    match scalar(key, value)?.to_lowercase().as_str() {
        "true" | "yes" | "on" => Ok(true),
        "false" | "no" | "off" => Ok(false),
        other => Err(PoseError::ConfigError(format!(
            "Invalid boolean for {key}: {other}"
        ))),
    }
}

fn size_pair(key: &str, value: &ConfigValue) -> Result<(usize, usize)> {
    let ConfigValue::List(items) = value else {
        return Err(PoseError::ConfigError(format!(
            "{key} expects [width, height], got {value}"
        )));
    };
    let parsed: Vec<usize> = items
        .iter()
        .map(|s| s.parse::<usize>())
        .collect::<std::result::Result<_, _>>()
        .map_err(|_| PoseError::ConfigError(format!("Invalid size for {key}: {value}")))?;
    match parsed.as_slice() {
        [w, h] => Ok((*w, *h)),
        _ => Err(PoseError::ConfigError(format!(
            "{key} expects exactly two values, got {value}"
        ))),
    }
}
