// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! COCO instance categories.
//!
//! Both the person detector (class names) and the scene-graph reader (numeric
//! COCO ids) decide "is this a person" through [`Category`].

use std::fmt;
use std::str::FromStr;

/// COCO instance category names indexed by category id (id 0 is background).
///
/// Ids left unused by the COCO annotations are `"N/A"`.
pub const COCO_INSTANCE_CATEGORY_NAMES: [&str; 91] = [
    "__background__", "person", "bicycle", "car", "motorcycle", "airplane", "bus",
    "train", "truck", "boat", "traffic light", "fire hydrant", "N/A", "stop sign",
    "parking meter", "bench", "bird", "cat", "dog", "horse", "sheep", "cow",
    "elephant", "bear", "zebra", "giraffe", "N/A", "backpack", "umbrella", "N/A", "N/A",
    "handbag", "tie", "suitcase", "frisbee", "skis", "snowboard", "sports ball",
    "kite", "baseball bat", "baseball glove", "skateboard", "surfboard", "tennis racket",
    "bottle", "N/A", "wine glass", "cup", "fork", "knife", "spoon", "bowl",
    "banana", "apple", "sandwich", "orange", "broccoli", "carrot", "hot dog", "pizza",
    "donut", "cake", "chair", "couch", "potted plant", "bed", "N/A", "dining table",
    "N/A", "N/A", "toilet", "N/A", "tv", "laptop", "mouse", "remote", "keyboard", "cell phone",
    "microwave", "oven", "toaster", "sink", "refrigerator", "N/A", "book",
    "clock", "vase", "scissors", "teddy bear", "hair drier", "toothbrush",
];

/// COCO category id of a person.
pub const PERSON_CATEGORY_ID: i64 = 1;

/// Object category as far as the demo cares.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    /// Id 0, no object.
    Background,
    /// Id 1, the only category that gets a pose.
    Person,
    /// Any other COCO id, or an id outside the table.
    Other(i64),
}

impl Category {
    /// Map a numeric COCO category id.
    #[must_use]
    pub const fn from_coco_id(id: i64) -> Self {
        match id {
            0 => Self::Background,
            PERSON_CATEGORY_ID => Self::Person,
            other => Self::Other(other),
        }
    }

    /// Numeric COCO category id.
    #[must_use]
    pub const fn coco_id(&self) -> i64 {
        match self {
            Self::Background => 0,
            Self::Person => PERSON_CATEGORY_ID,
            Self::Other(id) => *id,
        }
    }

    /// Map a class name as reported by a detector.
    ///
    /// Names outside the COCO table become `Other(-1)`.
    #[must_use]
    #[allow(clippy::cast_possible_wrap)]
    pub fn from_name(name: &str) -> Self {
        let name = name.trim();
        COCO_INSTANCE_CATEGORY_NAMES
            .iter()
            .position(|candidate| *candidate != "N/A" && candidate.eq_ignore_ascii_case(name))
            .map_or(Self::Other(-1), |id| Self::from_coco_id(id as i64))
    }

    /// Human-readable name, `"N/A"` for unknown ids.
    #[must_use]
    pub fn name(&self) -> &'static str {
        usize::try_from(self.coco_id())
            .ok()
            .and_then(|id| COCO_INSTANCE_CATEGORY_NAMES.get(id))
            .copied()
            .unwrap_or("N/A")
    }

    /// Whether this category receives pose estimation.
    #[must_use]
    pub const fn is_person(&self) -> bool {
        matches!(self, Self::Person)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for Category {
    type Err = CategoryParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match Self::from_name(s) {
            Self::Other(-1) => Err(CategoryParseError(s.to_string())),
            category => Ok(category),
        }
    }
}

/// Error returned when a class name is not a COCO category.
#[derive(Debug, Clone)]
pub struct CategoryParseError(String);

impl fmt::Display for CategoryParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown COCO category '{}'", self.0)
    }
}

impl std::error::Error for CategoryParseError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_layout() {
        assert_eq!(COCO_INSTANCE_CATEGORY_NAMES.len(), 91);
        assert_eq!(COCO_INSTANCE_CATEGORY_NAMES[1], "person");
        assert_eq!(COCO_INSTANCE_CATEGORY_NAMES[90], "toothbrush");
    }

    #[test]
    fn test_person_by_id_and_name() {
        assert_eq!(Category::from_coco_id(1), Category::Person);
        assert_eq!(Category::from_name("person"), Category::Person);
        assert_eq!(Category::from_name("Person"), Category::Person);
        assert!(Category::Person.is_person());
        assert_eq!(Category::Person.coco_id(), 1);
    }

    #[test]
    fn test_other_categories() {
        assert_eq!(Category::from_coco_id(0), Category::Background);
        assert_eq!(Category::from_coco_id(3), Category::Other(3));
        assert_eq!(Category::from_name("car"), Category::Other(3));
        assert!(!Category::from_coco_id(18).is_person());
        assert_eq!(Category::from_coco_id(18).name(), "dog");
        assert_eq!(Category::from_coco_id(500).name(), "N/A");
        assert_eq!(Category::from_coco_id(-4).name(), "N/A");
    }

    #[test]
    fn test_parse() {
        assert_eq!("person".parse::<Category>().unwrap(), Category::Person);
        assert!("N/A".parse::<Category>().is_err());
        assert!("unicorn".parse::<Category>().is_err());
    }
}
