// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Scene-graph JSON input.
//!
//! A scene graph annotates one image (the `.jpg` next to the `.json` file)
//! with objects and their boxes. Person objects replace the detector: their
//! boxes go straight to pose estimation.
//!
//! ```json
//! {
//!   "image_id": 2,
//!   "objects": [
//!     { "class_id": 1, "object_bbox": { "x": 10, "y": 20, "width": 80, "height": 200 } }
//!   ]
//! }
//! ```

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::category::Category;
use crate::error::{PoseError, Result};
use crate::geometry::BoundingBox;

/// Image identifier, numeric or textual.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum ImageId {
    /// Numeric id.
    Number(i64),
    /// Free-form id.
    Text(String),
}

impl fmt::Display for ImageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{n}"),
            Self::Text(s) => write!(f, "{s}"),
        }
    }
}

/// Axis-aligned object box, top-left corner plus size.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct ObjectBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

/// One annotated object.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SceneObject {
    /// COCO category id.
    pub class_id: i64,
    /// Object extent in image pixels.
    pub object_bbox: ObjectBox,
}

impl SceneObject {
    /// Category of this object.
    #[must_use]
    pub const fn category(&self) -> Category {
        Category::from_coco_id(self.class_id)
    }
}

/// Parsed scene graph.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SceneGraph {
    /// Used to name the output image.
    pub image_id: ImageId,
    /// Annotated objects; missing means none.
    #[serde(default)]
    pub objects: Vec<SceneObject>,
}

impl SceneGraph {
    /// Parse a scene graph from JSON text.
    ///
    /// # Errors
    ///
    /// Returns [`PoseError::SceneGraphError`] on malformed JSON or missing fields.
    pub fn from_json_str(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// Read a scene graph file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|e| {
            PoseError::SceneGraphError(format!("Failed to read {}: {e}", path.display()))
        })?;
        serde_json::from_str(&text)
            .map_err(|e| PoseError::SceneGraphError(format!("{}: {e}", path.display())))
    }

    /// Boxes of all person objects, in file order.
    #[must_use]
    pub fn person_boxes(&self) -> Vec<BoundingBox> {
        self.objects
            .iter()
            .filter(|object| object.category().is_person())
            .map(|object| {
                let b = object.object_bbox;
                BoundingBox::from_xywh(b.x, b.y, b.width, b.height)
            })
            .collect()
    }
}

/// The image annotated by the scene graph at `json_path`.
#[must_use]
pub fn image_path_for(json_path: &Path) -> PathBuf {
    json_path.with_extension("jpg")
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "image_id": 2,
        "objects": [
            {"class_id": 1, "object_bbox": {"x": 10, "y": 20, "width": 80, "height": 200}},
            {"class_id": 3, "object_bbox": {"x": 0, "y": 0, "width": 50, "height": 50}},
            {"class_id": 1, "object_bbox": {"x": 300.5, "y": 40, "width": 60, "height": 120}, "score": 0.8}
        ],
        "relations": []
    }"#;

    #[test]
    fn test_person_boxes_only() {
        let graph = SceneGraph::from_json_str(SAMPLE).unwrap();
        assert_eq!(graph.image_id, ImageId::Number(2));
        let boxes = graph.person_boxes();
        assert_eq!(boxes.len(), 2);
        assert_eq!(boxes[0], BoundingBox::new((10.0, 20.0), (90.0, 220.0)));
        assert_eq!(boxes[1], BoundingBox::new((300.5, 40.0), (360.5, 160.0)));
    }

    #[test]
    fn test_text_id_and_no_objects() {
        let graph = SceneGraph::from_json_str(r#"{"image_id": "street_07"}"#).unwrap();
        assert_eq!(graph.image_id.to_string(), "street_07");
        assert!(graph.person_boxes().is_empty());
    }

    #[test]
    fn test_malformed_json() {
        let err = SceneGraph::from_json_str(r#"{"objects": []}"#).unwrap_err();
        assert!(matches!(err, PoseError::SceneGraphError(_)));
    }

    #[test]
    fn test_image_path_for() {
        assert_eq!(image_path_for(Path::new("in/2.json")), PathBuf::from("in/2.jpg"));
    }
}
