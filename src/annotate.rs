// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Skeleton rendering and frame overlays.
//!
//! Every person is drawn as the link lines of a [`ColorStyle`] followed by a
//! black ring on each keypoint, so rings always sit on top of line ends.
//! Stroke sizes follow the subject size (`min(box width, box height)`).

use std::fs;
use std::path::PathBuf;

use ab_glyph::{FontVec, PxScale};
use image::RgbImage;
use imageproc::drawing::{
    draw_filled_circle_mut, draw_hollow_circle_mut, draw_hollow_rect_mut, draw_line_segment_mut,
    draw_text_mut,
};
use imageproc::rect::Rect;

use crate::download::download_font;
use crate::geometry::BoundingBox;
use crate::results::{Keypoint, KeypointSet};
use crate::visualizer::skeleton::{FACE_KEYPOINT_COUNT, THIN_LINK_RANGE};
use crate::visualizer::{Color, ColorStyle};
use crate::warn;

/// Font used for the timer overlay.
pub const TIMER_FONT: &str = "Arial.ttf";

/// Baseline-left position of the timer text.
pub const TIMER_POSITION: (i32, i32) = (100, 50);

/// Timer text color.
pub const TIMER_COLOR: Color = Color::BLUE;

/// Timer glyph height in pixels.
const TIMER_SCALE: f32 = 32.0;

/// Keypoint ring stroke in pixels.
pub const RING_THICKNESS: i32 = 2;

/// Person box stroke in pixels.
pub const BOX_THICKNESS: i32 = 3;

/// Box color for `--writeBoxFrames`.
pub const BOX_COLOR: Color = Color::GREEN;

/// Size-dependent stroke: `max(ceil(reference_size / 100), 1)`.
#[allow(clippy::cast_possible_truncation)]
fn scaled_stroke(reference_size: f32) -> i32 {
    ((reference_size / 100.0).ceil() as i32).max(1)
}

/// Line width of link `link_index` for a subject of `reference_size` pixels.
///
/// Links in [`THIN_LINK_RANGE`] (the face) are always one pixel wide.
#[must_use]
pub fn link_width(link_index: usize, reference_size: f32) -> i32 {
    if THIN_LINK_RANGE.contains(&link_index) {
        1
    } else {
        scaled_stroke(reference_size)
    }
}

/// Ring radius of keypoint `keypoint_index`; face keypoints get radius 1.
#[must_use]
pub fn keypoint_radius(keypoint_index: usize, reference_size: f32) -> i32 {
    if keypoint_index < FACE_KEYPOINT_COUNT {
        1
    } else {
        scaled_stroke(reference_size)
    }
}

/// Draw a line `width` pixels wide with round ends.
#[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
pub fn draw_thick_line(
    img: &mut RgbImage,
    start: (i32, i32),
    end: (i32, i32),
    width: i32,
    color: Color,
) {
    let pixel = color.to_rgb();
    if width <= 1 {
        draw_line_segment_mut(
            img,
            (start.0 as f32, start.1 as f32),
            (end.0 as f32, end.1 as f32),
            pixel,
        );
        return;
    }

    let radius = width / 2;
    let (dx, dy) = ((end.0 - start.0) as f32, (end.1 - start.1) as f32);
    let steps = dx.abs().max(dy.abs()).ceil() as i32;
    for step in 0..=steps {
        let t = if steps == 0 {
            0.0
        } else {
            step as f32 / steps as f32
        };
        let x = (start.0 as f32 + dx * t).round() as i32;
        let y = (start.1 as f32 + dy * t).round() as i32;
        draw_filled_circle_mut(img, (x, y), radius, pixel);
    }
}

/// Draw a hollow ring of [`RING_THICKNESS`] pixels.
pub fn draw_ring(img: &mut RgbImage, center: (i32, i32), radius: i32, color: Color) {
    let pixel = color.to_rgb();
    for offset in 0..RING_THICKNESS {
        draw_hollow_circle_mut(img, center, radius + offset, pixel);
    }
}

/// Draw one person's skeleton in place.
///
/// # Arguments
///
/// * `img` - Frame to draw on.
/// * `keypoints` - The person's 17 keypoints in image pixels.
/// * `reference_size` - `min(box width, box height)` of the person box.
/// * `style` - Link table and colors.
pub fn render_skeleton(
    img: &mut RgbImage,
    keypoints: &KeypointSet,
    reference_size: f32,
    style: &ColorStyle,
) {
    let joints: Vec<(i32, i32)> = keypoints.points().iter().map(Keypoint::pixel).collect();

    for (k, link) in style.link_pairs().iter().enumerate() {
        draw_thick_line(
            img,
            joints[link.a],
            joints[link.b],
            link_width(k, reference_size),
            link.color,
        );
    }

    for (idx, joint) in joints.iter().enumerate() {
        draw_ring(img, *joint, keypoint_radius(idx, reference_size), Color::BLACK);
    }
}

/// Draw person boxes as [`BOX_THICKNESS`] pixel rectangles, stroke growing inward.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn draw_person_boxes(img: &mut RgbImage, boxes: &[BoundingBox]) {
    let pixel = BOX_COLOR.to_rgb();
    for bbox in boxes {
        let (mut x1, mut y1) = (bbox.p1.0 as i32, bbox.p1.1 as i32);
        let (mut x2, mut y2) = (bbox.p2.0 as i32, bbox.p2.1 as i32);
        if x1 > x2 {
            std::mem::swap(&mut x1, &mut x2);
        }
        if y1 > y2 {
            std::mem::swap(&mut y1, &mut y2);
        }

        for t in 0..BOX_THICKNESS {
            let (tx1, ty1) = (x1 + t, y1 + t);
            let (tx2, ty2) = (x2 - t, y2 - t);
            if tx2 > tx1 && ty2 > ty1 {
                let rect = Rect::at(tx1, ty1).of_size((tx2 - tx1) as u32, (ty2 - ty1) as u32);
                draw_hollow_rect_mut(img, rect, pixel);
            }
        }
    }
}

/// Draw the per-frame processing time as `"{seconds:.2} sec"`.
#[allow(clippy::cast_possible_truncation)]
pub fn draw_timer_text(img: &mut RgbImage, seconds: f64, font: &FontVec) {
    let text = format!("{seconds:.2} sec");
    let ascent = (TIMER_SCALE * 0.75) as i32;
    draw_text_mut(
        img,
        TIMER_COLOR.to_rgb(),
        TIMER_POSITION.0,
        TIMER_POSITION.1 - ascent,
        PxScale::from(TIMER_SCALE),
        font,
        &text,
    );
}

/// Locate `font` in the user config directory, downloading it on first use.
#[must_use]
pub fn check_font(font: &str) -> Option<PathBuf> {
    let font_dir = dirs::config_dir()?.join(crate::NAME);
    let font_path = font_dir.join(font);
    if font_path.exists() {
        return Some(font_path);
    }

    match download_font(font, &font_path) {
        Ok(()) => Some(font_path),
        Err(e) => {
            warn!("Timer overlay disabled, font unavailable: {e}");
            None
        }
    }
}

/// Load the timer font, `None` when it cannot be found or parsed.
#[must_use]
pub fn load_timer_font() -> Option<FontVec> {
    let path = check_font(TIMER_FONT)?;
    let data = fs::read(&path).ok()?;
    match FontVec::try_from_vec(data) {
        Ok(font) => Some(font),
        Err(e) => {
            warn!("Invalid font {}: {e}", path.display());
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn test_link_width_rules() {
        for k in 0..16 {
            assert_eq!(link_width(k, 100.0), 1);
        }
        assert_eq!(link_width(0, 250.0), 3);
        assert_eq!(link_width(6, 250.0), 1);
        assert_eq!(link_width(10, 250.0), 1);
        assert_eq!(link_width(11, 250.0), 3);
        assert_eq!(link_width(0, 0.5), 1);
        assert_eq!(link_width(0, -20.0), 1);
    }

    #[test]
    fn test_keypoint_radius_rules() {
        assert_eq!(keypoint_radius(0, 450.0), 1);
        assert_eq!(keypoint_radius(4, 450.0), 1);
        assert_eq!(keypoint_radius(5, 450.0), 5);
        assert_eq!(keypoint_radius(16, 100.0), 1);
        assert_eq!(keypoint_radius(16, 101.0), 2);
    }

    #[test]
    fn test_render_draws_lines_and_black_rings() {
        let mut img = RgbImage::from_pixel(120, 120, Rgb([255, 255, 255]));
        let mut coords: Vec<(f32, f32)> = vec![(60.0, 60.0); 17];
        // left ankle far from left knee so link 0 is visible
        coords[15] = (10.0, 100.0);
        coords[13] = (100.0, 100.0);
        let keypoints = KeypointSet::from_xy(&coords).unwrap();

        render_skeleton(&mut img, &keypoints, 100.0, &ColorStyle::chunhua());

        // middle of link 0 carries the first chunhua color
        assert_eq!(*img.get_pixel(55, 100), Rgb([252, 176, 243]));
        // ring around a keypoint is black
        assert_eq!(*img.get_pixel(61, 60), Rgb([0, 0, 0]));
        // far corner untouched
        assert_eq!(*img.get_pixel(0, 0), Rgb([255, 255, 255]));
    }

    #[test]
    fn test_thick_line_covers_width() {
        let mut img = RgbImage::new(50, 50);
        draw_thick_line(&mut img, (10, 25), (40, 25), 3, Color::RED);
        assert_eq!(*img.get_pixel(25, 24), Rgb([255, 0, 0]));
        assert_eq!(*img.get_pixel(25, 26), Rgb([255, 0, 0]));
        assert_eq!(*img.get_pixel(25, 30), Rgb([0, 0, 0]));
    }

    #[test]
    fn test_timer_text_starts_at_timer_position() {
        let bytes = include_bytes!(concat!(
            env!("CARGO_MANIFEST_DIR"),
            "/tests/fonts/DejaVuSansMono.ttf"
        ));
        let font = FontVec::try_from_vec(bytes.to_vec()).unwrap();
        let mut img = RgbImage::from_pixel(260, 80, Rgb([255, 255, 255]));

        draw_timer_text(&mut img, 1.234, &font);

        let inked = |x: u32, y: u32| {
            let p = img.get_pixel(x, y);
            p[0] < 128 && p[1] < 128 && p[2] == 255
        };
        assert!((100..260).any(|x| (20..60).any(|y| inked(x, y))));
        assert!((0..98).all(|x| (0..80).all(|y| *img.get_pixel(x, y) == Rgb([255, 255, 255]))));
        assert!((0..260).all(|x| *img.get_pixel(x, 70) == Rgb([255, 255, 255])));
    }

    #[test]
    fn test_person_boxes_are_green() {
        let mut img = RgbImage::new(100, 100);
        draw_person_boxes(&mut img, &[BoundingBox::new((10.0, 10.0), (90.0, 90.0))]);
        assert_eq!(*img.get_pixel(10, 50), Rgb([0, 255, 0]));
        assert_eq!(*img.get_pixel(12, 50), Rgb([0, 255, 0]));
        assert_eq!(*img.get_pixel(13, 50), Rgb([0, 0, 0]));
        assert_eq!(*img.get_pixel(50, 50), Rgb([0, 0, 0]));
    }
}
