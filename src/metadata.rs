// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! ONNX model metadata parsing.
//!
//! Ultralytics exports store `imgsz`, `stride` and the class `names` as
//! custom metadata properties. Pose models exported from other toolchains
//! usually carry none of this; every field then falls back to a default.

use std::collections::HashMap;

use crate::category::Category;
use crate::error::{PoseError, Result};

/// Metadata keys read from the ONNX model.
pub const METADATA_KEYS: [&str; 5] = ["description", "stride", "imgsz", "names", "task"];

/// Metadata extracted from an ONNX model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelMetadata {
    /// Model description.
    pub description: String,
    /// Task the model was exported for, e.g. `detect`.
    pub task: String,
    /// Model stride (typically 32 for YOLO).
    pub stride: u32,
    /// Input image size as (height, width).
    pub imgsz: (usize, usize),
    /// Class ID to class name mapping.
    pub names: HashMap<usize, String>,
}

impl Default for ModelMetadata {
    fn default() -> Self {
        Self {
            description: String::new(),
            task: "detect".to_string(),
            stride: 32,
            imgsz: (640, 640),
            names: HashMap::new(),
        }
    }
}

impl ModelMetadata {
    /// Build metadata from `key -> value` custom properties.
    ///
    /// # Errors
    ///
    /// Returns [`PoseError::ModelLoadError`] if `stride` or `imgsz` is malformed.
    pub fn from_properties(properties: &HashMap<String, String>) -> Result<Self> {
        let yaml: Vec<String> = METADATA_KEYS
            .iter()
            .filter_map(|key| properties.get(*key).map(|value| format!("{key}: {value}")))
            .collect();
        Self::from_yaml_str(&yaml.join("\n"))
    }

    /// Parse the flat YAML form Ultralytics writes.
    ///
    /// # Errors
    ///
    /// Returns [`PoseError::ModelLoadError`] if `stride` or `imgsz` is malformed.
    pub fn from_yaml_str(yaml_str: &str) -> Result<Self> {
        let mut metadata = Self::default();
        let mut in_names = false;
        let mut imgsz_items = Vec::new();
        let mut in_imgsz = false;

        for raw in yaml_str.lines() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let indented = raw.starts_with(' ') || raw.starts_with('\t');

            if in_imgsz {
                if let Some(item) = line.strip_prefix('-') {
                    imgsz_items.push(parse_usize("imgsz", item)?);
                    continue;
                }
                in_imgsz = false;
            }
            if in_names && indented {
                if let Some((id, name)) = parse_name_entry(line) {
                    metadata.names.insert(id, name);
                }
                continue;
            }
            in_names = false;

            let Some((key, value)) = line.split_once(':') else {
                continue;
            };
            let value = unquote(value);
            match key.trim() {
                "description" => metadata.description = value.to_string(),
                "task" => metadata.task = value.to_string(),
                "stride" => {
                    let stride = parse_usize("stride", value)?;
                    metadata.stride = u32::try_from(stride).map_err(|_| {
                        PoseError::ModelLoadError(format!("Invalid stride value: {value}"))
                    })?;
                }
                "imgsz" if value.is_empty() => in_imgsz = true,
                "imgsz" => imgsz_items = parse_list(value)?,
                "names" if value.is_empty() => in_names = true,
                "names" => metadata.names = parse_python_dict(value),
                _ => {}
            }
        }

        match imgsz_items.as_slice() {
            [] => {}
            [size] => metadata.imgsz = (*size, *size),
            [h, w, ..] => metadata.imgsz = (*h, *w),
        }
        Ok(metadata)
    }

    /// Index of the `person` class, if the model names one.
    #[must_use]
    pub fn person_class(&self) -> Option<usize> {
        let mut ids: Vec<usize> = self
            .names
            .iter()
            .filter(|(_, name)| Category::from_name(name).is_person())
            .map(|(id, _)| *id)
            .collect();
        ids.sort_unstable();
        ids.first().copied()
    }

    /// Number of classes in this model.
    #[must_use]
    pub fn num_classes(&self) -> usize {
        self.names.len()
    }
}

fn unquote(value: &str) -> &str {
    value.trim().trim_matches('\'').trim_matches('"')
}

fn parse_usize(key: &str, value: &str) -> Result<usize> {
    unquote(value)
        .parse()
        .map_err(|_| PoseError::ModelLoadError(format!("Invalid {key} value: {}", value.trim())))
}

/// Parse `[640, 640]` or a bare `640`.
fn parse_list(value: &str) -> Result<Vec<usize>> {
    value
        .trim_start_matches('[')
        .trim_end_matches(']')
        .split(',')
        .filter(|s| !s.trim().is_empty())
        .map(|s| parse_usize("imgsz", s))
        .collect()
}

/// Parse `0: person`.
fn parse_name_entry(entry: &str) -> Option<(usize, String)> {
    let (id, name) = entry.split_once(':')?;
    let id = id.trim().parse().ok()?;
    Some((id, unquote(name).to_string()))
}

/// Parse a Python dict string like `{0: 'person', 1: 'bicycle'}`.
fn parse_python_dict(dict_str: &str) -> HashMap<usize, String> {
    dict_str
        .trim()
        .trim_start_matches('{')
        .trim_end_matches('}')
        .split(',')
        .filter_map(parse_name_entry)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_METADATA: &str = r"
description: Ultralytics YOLO11n model trained on coco.yaml
stride: 32
task: detect
imgsz:
- 480
- 640
names:
  0: person
  1: bicycle
  2: car
";

    #[test]
    fn test_parse_block_metadata() {
        let metadata = ModelMetadata::from_yaml_str(SAMPLE_METADATA).unwrap();
        assert_eq!(metadata.stride, 32);
        assert_eq!(metadata.imgsz, (480, 640));
        assert_eq!(metadata.num_classes(), 3);
        assert_eq!(metadata.names.get(&2).map(String::as_str), Some("car"));
        assert_eq!(metadata.person_class(), Some(0));
    }

    #[test]
    fn test_parse_properties() {
        let mut props = HashMap::new();
        props.insert("imgsz".to_string(), "[640, 640]".to_string());
        props.insert("names".to_string(), "{0: 'cat', 1: 'person'}".to_string());
        props.insert("stride".to_string(), "32".to_string());
        let metadata = ModelMetadata::from_properties(&props).unwrap();
        assert_eq!(metadata.imgsz, (640, 640));
        assert_eq!(metadata.person_class(), Some(1));
    }

    #[test]
    fn test_missing_metadata_uses_defaults() {
        let metadata = ModelMetadata::from_properties(&HashMap::new()).unwrap();
        assert_eq!(metadata, ModelMetadata::default());
        assert_eq!(metadata.person_class(), None);
    }

    #[test]
    fn test_bad_stride_is_an_error() {
        assert!(ModelMetadata::from_yaml_str("stride: wide").is_err());
    }
}
