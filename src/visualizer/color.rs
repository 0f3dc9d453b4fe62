// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Colors and skeleton color styles.

use std::fmt;
use std::str::FromStr;

use crate::visualizer::skeleton::{LINK_INDEX_PAIRS, NUM_LINKS};

/// RGB color for visualization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Color(pub u8, pub u8, pub u8);

impl Color {
    /// Red color.
    pub const RED: Self = Self(255, 0, 0);
    /// Green color.
    pub const GREEN: Self = Self(0, 255, 0);
    /// Blue color.
    pub const BLUE: Self = Self(0, 0, 255);
    /// White color.
    pub const WHITE: Self = Self(255, 255, 255);
    /// Black color.
    pub const BLACK: Self = Self(0, 0, 0);

    /// Create a new color from RGB values.
    #[must_use]
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self(r, g, b)
    }

    /// Convert to an `image` pixel.
    #[must_use]
    pub const fn to_rgb(self) -> image::Rgb<u8> {
        image::Rgb([self.0, self.1, self.2])
    }
}

/// One skeleton edge: two keypoint indices and the color of the line between them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkPair {
    /// Start keypoint index.
    pub a: usize,
    /// End keypoint index.
    pub b: usize,
    /// Line color.
    pub color: Color,
}

/// Named skeleton style.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StyleName {
    /// Red/green limbs, magenta face.
    Xiaochu,
    /// Pink/cyan arms, yellow/green legs, magenta face.
    #[default]
    Chunhua,
}

impl StyleName {
    /// Build the color style for this name.
    #[must_use]
    pub fn color_style(self) -> ColorStyle {
        match self {
            Self::Xiaochu => ColorStyle::xiaochu(),
            Self::Chunhua => ColorStyle::chunhua(),
        }
    }

    /// Config spelling of the style.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Xiaochu => "xiaochu",
            Self::Chunhua => "chunhua",
        }
    }
}

impl fmt::Display for StyleName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for StyleName {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "xiaochu" => Ok(Self::Xiaochu),
            "chunhua" => Ok(Self::Chunhua),
            _ => Err(format!(
                "invalid style '{s}', expected one of: xiaochu, chunhua"
            )),
        }
    }
}

const MAGENTA: Color = Color(240, 2, 127);
const PINK: Color = Color(252, 176, 243);
const CYAN: Color = Color(0, 176, 240);
const YELLOW: Color = Color(255, 255, 0);
const SAGE: Color = Color(169, 209, 142);
const LEMON: Color = Color(255, 255, 51);

const XIAOCHU_LINK_COLORS: [Color; NUM_LINKS] = [
    Color(179, 0, 0),
    Color(228, 26, 28),
    LEMON,
    Color(49, 163, 84),
    Color(0, 109, 45),
    LEMON,
    MAGENTA,
    MAGENTA,
    MAGENTA,
    MAGENTA,
    MAGENTA,
    Color(217, 95, 14),
    Color(254, 153, 41),
    LEMON,
    Color(44, 127, 184),
    Color(0, 0, 255),
];

const XIAOCHU_POINT_COLORS: [Color; 23] = [
    MAGENTA,
    MAGENTA,
    MAGENTA,
    MAGENTA,
    MAGENTA,
    LEMON,
    LEMON,
    Color(254, 153, 41),
    Color(44, 127, 184),
    Color(217, 95, 14),
    Color(0, 0, 255),
    LEMON,
    LEMON,
    Color(228, 26, 28),
    Color(49, 163, 84),
    PINK,
    CYAN,
    YELLOW,
    SAGE,
    YELLOW,
    SAGE,
    YELLOW,
    SAGE,
];

const CHUNHUA_LINK_COLORS: [Color; NUM_LINKS] = [
    PINK, PINK, PINK, CYAN, CYAN, CYAN, MAGENTA, MAGENTA, MAGENTA, MAGENTA, MAGENTA, YELLOW,
    YELLOW, SAGE, SAGE, SAGE,
];

const CHUNHUA_POINT_COLORS: [Color; 23] = [
    MAGENTA, MAGENTA, MAGENTA, MAGENTA, MAGENTA, YELLOW, SAGE, YELLOW, SAGE, YELLOW, SAGE, PINK,
    CYAN, PINK, CYAN, PINK, CYAN, YELLOW, SAGE, YELLOW, SAGE, YELLOW, SAGE,
];

/// Immutable bundle of skeleton link colors and keypoint colors.
///
/// Built once at start-up and handed to the renderer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColorStyle {
    name: StyleName,
    link_pairs: Vec<LinkPair>,
    point_colors: Vec<Color>,
}

impl ColorStyle {
    fn from_tables(name: StyleName, link_colors: &[Color; NUM_LINKS], point_colors: &[Color]) -> Self {
        let link_pairs = LINK_INDEX_PAIRS
            .iter()
            .zip(link_colors)
            .map(|(&[a, b], &color)| LinkPair { a, b, color })
            .collect();
        Self {
            name,
            link_pairs,
            point_colors: point_colors.to_vec(),
        }
    }

    /// The "xiaochu" style.
    #[must_use]
    pub fn xiaochu() -> Self {
        Self::from_tables(StyleName::Xiaochu, &XIAOCHU_LINK_COLORS, &XIAOCHU_POINT_COLORS)
    }

    /// The "chunhua" style.
    #[must_use]
    pub fn chunhua() -> Self {
        Self::from_tables(StyleName::Chunhua, &CHUNHUA_LINK_COLORS, &CHUNHUA_POINT_COLORS)
    }

    /// Style name.
    #[must_use]
    pub const fn name(&self) -> StyleName {
        self.name
    }

    /// Skeleton edges in drawing order.
    #[must_use]
    pub fn link_pairs(&self) -> &[LinkPair] {
        &self.link_pairs
    }

    /// Per-keypoint fill colors.
    #[must_use]
    pub fn point_colors(&self) -> &[Color] {
        &self.point_colors
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::visualizer::skeleton::NUM_KEYPOINTS;

    #[test]
    fn test_link_indices_in_range() {
        for style in [ColorStyle::xiaochu(), ColorStyle::chunhua()] {
            assert_eq!(style.link_pairs().len(), NUM_LINKS);
            for pair in style.link_pairs() {
                assert!(pair.a < NUM_KEYPOINTS, "{} link start {}", style.name(), pair.a);
                assert!(pair.b < NUM_KEYPOINTS, "{} link end {}", style.name(), pair.b);
            }
        }
    }

    #[test]
    fn test_point_tables_cover_all_keypoints() {
        for style in [ColorStyle::xiaochu(), ColorStyle::chunhua()] {
            assert!(style.point_colors().len() >= NUM_KEYPOINTS);
        }
    }

    #[test]
    fn test_chunhua_colors() {
        let style = ColorStyle::chunhua();
        let first = style.link_pairs()[0];
        assert_eq!((first.a, first.b, first.color), (15, 13, Color(252, 176, 243)));
        let last = style.link_pairs()[15];
        assert_eq!((last.a, last.b, last.color), (8, 10, Color(169, 209, 142)));
    }

    #[test]
    fn test_style_names() {
        assert_eq!("xiaochu".parse::<StyleName>().unwrap(), StyleName::Xiaochu);
        assert_eq!("CHUNHUA".parse::<StyleName>().unwrap(), StyleName::Chunhua);
        assert!("plain".parse::<StyleName>().is_err());
        assert_eq!(StyleName::default().color_style(), ColorStyle::chunhua());
        assert_eq!(StyleName::Xiaochu.to_string(), "xiaochu");
    }
}
