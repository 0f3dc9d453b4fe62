// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Image preprocessing for the person detector and the pose model.
//!
//! The detector sees the whole frame letterboxed to its square input. The pose
//! model sees one affine-warped crop per person, normalized with the ImageNet
//! mean and standard deviation.

use fast_image_resize::images::Image;
use fast_image_resize::{FilterType, PixelType, ResizeAlg, ResizeOptions, Resizer};
use image::{DynamicImage, GenericImageView, RgbImage};
use ndarray::{Array4, s};
use rayon::prelude::*;

use crate::error::{PoseError, Result};
use crate::geometry::AffineMatrix;

/// Default letterbox padding color (gray).
pub const LETTERBOX_COLOR: [u8; 3] = [114, 114, 114];

/// ImageNet channel means in RGB order.
pub const IMAGENET_MEAN: [f32; 3] = [0.485, 0.456, 0.406];

/// ImageNet channel standard deviations in RGB order.
pub const IMAGENET_STD: [f32; 3] = [0.229, 0.224, 0.225];

/// Reciprocal of 255 for normalization.
const INV_255: f32 = 1.0 / 255.0;

/// Result of letterboxing a frame for the detector.
#[derive(Debug, Clone)]
pub struct PreprocessResult {
    /// Letterboxed tensor in NCHW format, normalized to [0, 1].
    pub tensor: Array4<f32>,
    /// Original image dimensions (height, width).
    pub orig_shape: (u32, u32),
    /// Scale factors applied (`scale_y`, `scale_x`).
    pub scale: (f32, f32),
    /// Padding applied (`pad_top`, `pad_left`).
    pub padding: (f32, f32),
}

/// Letterbox an image into a `target_size` (height, width) detector tensor.
///
/// The image is resized with bilinear filtering, keeping its aspect ratio,
/// and centered on a [`LETTERBOX_COLOR`] canvas.
///
/// # Errors
///
/// Returns [`PoseError::ImageError`] if the image is empty or resizing fails.
#[allow(clippy::cast_precision_loss)]
pub fn letterbox(image: &DynamicImage, target_size: (usize, usize)) -> Result<PreprocessResult> {
    let (orig_width, orig_height) = image.dimensions();
    if orig_width == 0 || orig_height == 0 {
        return Err(PoseError::ImageError("cannot preprocess an empty image".to_string()));
    }

    let (new_width, new_height, pad_left, pad_top, scale) =
        calculate_letterbox_params(orig_width, orig_height, target_size);

    let src_rgb = image.to_rgb8();
    let resized = resize_rgb(&src_rgb, new_width, new_height)?;

    let (dst_h, dst_w) = target_size;
    let mut tensor = Array4::<f32>::zeros((1, 3, dst_h, dst_w));
    for (c, fill) in LETTERBOX_COLOR.iter().enumerate() {
        tensor
            .slice_mut(s![0, c, .., ..])
            .fill(f32::from(*fill) * INV_255);
    }

    let (pad_top, pad_left) = (pad_top as usize, pad_left as usize);
    for (i, px) in resized.chunks_exact(3).enumerate() {
        let y = pad_top + i / new_width as usize;
        let x = pad_left + i % new_width as usize;
        if y >= dst_h || x >= dst_w {
            continue;
        }
        for c in 0..3 {
            tensor[[0, c, y, x]] = f32::from(px[c]) * INV_255;
        }
    }

    Ok(PreprocessResult {
        tensor,
        orig_shape: (orig_height, orig_width),
        scale,
        padding: (pad_top as f32, pad_left as f32),
    })
}

/// Bilinear resize of a packed RGB buffer.
fn resize_rgb(src: &RgbImage, width: u32, height: u32) -> Result<Vec<u8>> {
    if src.dimensions() == (width, height) {
        return Ok(src.as_raw().clone());
    }

    let src_image =
        Image::from_vec_u8(src.width(), src.height(), src.as_raw().clone(), PixelType::U8x3)
            .map_err(|e| PoseError::ImageError(format!("Failed to wrap image for resize: {e}")))?;
    let mut dst_image = Image::new(width.max(1), height.max(1), PixelType::U8x3);

    let options = ResizeOptions::new().resize_alg(ResizeAlg::Convolution(FilterType::Bilinear));
    Resizer::new()
        .resize(&src_image, &mut dst_image, &options)
        .map_err(|e| PoseError::ImageError(format!("Failed to resize image: {e}")))?;

    Ok(dst_image.into_vec())
}

/// Letterbox geometry: `(new_width, new_height, pad_left, pad_top, (scale_y, scale_x))`.
fn calculate_letterbox_params(
    orig_width: u32,
    orig_height: u32,
    target_size: (usize, usize),
) -> (u32, u32, u32, u32, (f32, f32)) {
    #[allow(clippy::cast_precision_loss)]
    let (target_h, target_w) = (target_size.0 as f32, target_size.1 as f32);
    #[allow(clippy::cast_precision_loss)]
    let (orig_h, orig_w) = (orig_height as f32, orig_width as f32);

    let scale = (target_h / orig_h).min(target_w / orig_w);

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let new_w = ((orig_w * scale).round() as u32).max(1);
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let new_h = ((orig_h * scale).round() as u32).max(1);

    #[allow(clippy::cast_possible_truncation)]
    let pad_left = (target_size.1 as u32).saturating_sub(new_w) / 2;
    #[allow(clippy::cast_possible_truncation)]
    let pad_top = (target_size.0 as u32).saturating_sub(new_h) / 2;

    #[allow(clippy::cast_precision_loss)]
    let scale_x = new_w as f32 / orig_w;
    #[allow(clippy::cast_precision_loss)]
    let scale_y = new_h as f32 / orig_h;

    (new_w, new_h, pad_left, pad_top, (scale_y, scale_x))
}

/// Map `[x1, y1, x2, y2]` from letterboxed model space back to the original image.
#[must_use]
pub fn scale_coords(coords: &[f32; 4], scale: (f32, f32), padding: (f32, f32)) -> [f32; 4] {
    let (scale_y, scale_x) = scale;
    let (pad_top, pad_left) = padding;
    [
        (coords[0] - pad_left) / scale_x,
        (coords[1] - pad_top) / scale_y,
        (coords[2] - pad_left) / scale_x,
        (coords[3] - pad_top) / scale_y,
    ]
}

/// Clip `[x1, y1, x2, y2]` to an image of `shape` (height, width).
#[must_use]
pub const fn clip_coords(coords: &[f32; 4], shape: (u32, u32)) -> [f32; 4] {
    #[allow(clippy::cast_precision_loss)]
    let (h, w) = (shape.0 as f32, shape.1 as f32);
    [
        coords[0].clamp(0.0, w),
        coords[1].clamp(0.0, h),
        coords[2].clamp(0.0, w),
        coords[3].clamp(0.0, h),
    ]
}

/// Warp `image` into an `output_size` (width, height) crop.
///
/// `matrix` maps image coordinates to crop coordinates. Every crop pixel is
/// sampled bilinearly at its preimage; source pixels outside the image count
/// as black, so regions hanging off the frame get a zero border.
///
/// # Errors
///
/// Returns [`PoseError::ImageError`] if `matrix` is not invertible or the
/// output size is empty.
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_possible_wrap,
    clippy::cast_precision_loss,
    clippy::cast_sign_loss
)]
pub fn warp_affine(
    image: &RgbImage,
    matrix: &AffineMatrix,
    output_size: (usize, usize),
) -> Result<RgbImage> {
    let inverse = matrix
        .inverse()
        .ok_or_else(|| PoseError::ImageError("affine transform is not invertible".to_string()))?;

    let (out_w, out_h) = output_size;
    if out_w == 0 || out_h == 0 {
        return Err(PoseError::ImageError("warp output size must be positive".to_string()));
    }
    let (src_w, src_h) = (image.width() as i64, image.height() as i64);
    let src = image.as_raw();
    let mut out = vec![0u8; out_w * out_h * 3];

    let sample = |x: i64, y: i64, c: usize| -> f32 {
        if x < 0 || y < 0 || x >= src_w || y >= src_h {
            0.0
        } else {
            f32::from(src[((y * src_w + x) * 3) as usize + c])
        }
    };

    out.par_chunks_mut(out_w * 3)
        .enumerate()
        .for_each(|(dy, row)| {
            for dx in 0..out_w {
                let (sx, sy) = inverse.transform_point(dx as f32, dy as f32);
                let x0 = sx.floor();
                let y0 = sy.floor();
                let (fx, fy) = (sx - x0, sy - y0);
                let (x0, y0) = (x0 as i64, y0 as i64);

                for c in 0..3 {
                    let top = sample(x0, y0, c) * (1.0 - fx) + sample(x0 + 1, y0, c) * fx;
                    let bottom =
                        sample(x0, y0 + 1, c) * (1.0 - fx) + sample(x0 + 1, y0 + 1, c) * fx;
                    let value = top * (1.0 - fy) + bottom * fy;
                    row[dx * 3 + c] = value.round().clamp(0.0, 255.0) as u8;
                }
            }
        });

    RgbImage::from_raw(out_w as u32, out_h as u32, out)
        .ok_or_else(|| PoseError::ImageError("Failed to build warped crop".to_string()))
}

/// Stack pose crops into one NCHW tensor normalized with the ImageNet statistics.
///
/// With `color_rgb` false the channels are fed in BGR order, for pose models
/// trained on BGR input.
///
/// # Errors
///
/// Returns [`PoseError::ImageError`] if the crops differ in size.
pub fn crops_to_tensor(crops: &[RgbImage], color_rgb: bool) -> Result<Array4<f32>> {
    let Some(first) = crops.first() else {
        return Ok(Array4::zeros((0, 3, 0, 0)));
    };
    let (w, h) = (first.width() as usize, first.height() as usize);
    let mut tensor = Array4::<f32>::zeros((crops.len(), 3, h, w));

    for (n, crop) in crops.iter().enumerate() {
        if (crop.width() as usize, crop.height() as usize) != (w, h) {
            return Err(PoseError::ImageError(format!(
                "pose crops must share one size, got {}x{} and {w}x{h}",
                crop.width(),
                crop.height()
            )));
        }
        for (i, px) in crop.as_raw().chunks_exact(3).enumerate() {
            let (y, x) = (i / w, i % w);
            for c in 0..3 {
                let src_c = if color_rgb { c } else { 2 - c };
                let value = f32::from(px[src_c]) * INV_255;
                tensor[[n, c, y, x]] = (value - IMAGENET_MEAN[c]) / IMAGENET_STD[c];
            }
        }
    }

    Ok(tensor)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn test_letterbox_params_wide_image() {
        let (new_w, new_h, pad_left, pad_top, scale) =
            calculate_letterbox_params(1280, 720, (640, 640));
        assert_eq!((new_w, new_h), (640, 360));
        assert_eq!((pad_left, pad_top), (0, 140));
        assert!((scale.0 - 0.5).abs() < 1e-6);
        assert!((scale.1 - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_letterbox_fills_padding_gray() {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(64, 32, Rgb([255, 0, 0])));
        let result = letterbox(&img, (64, 64)).unwrap();
        assert_eq!(result.tensor.shape(), &[1, 3, 64, 64]);
        assert_eq!(result.padding, (16.0, 0.0));
        let gray = 114.0 / 255.0;
        assert!((result.tensor[[0, 0, 0, 0]] - gray).abs() < 1e-6);
        assert!((result.tensor[[0, 0, 32, 32]] - 1.0).abs() < 1e-6);
        assert!(result.tensor[[0, 1, 32, 32]].abs() < 1e-6);
    }

    #[test]
    fn test_scale_and_clip_coords() {
        let scaled = scale_coords(&[10.0, 150.0, 110.0, 250.0], (0.5, 0.5), (140.0, 0.0));
        assert_eq!(scaled, [20.0, 20.0, 220.0, 220.0]);
        assert_eq!(clip_coords(&[-5.0, 5.0, 700.0, 50.0], (40, 640)), [0.0, 5.0, 640.0, 40.0]);
    }

    #[test]
    fn test_warp_identity_copies_and_pads_black() {
        let mut img = RgbImage::from_pixel(4, 4, Rgb([10, 20, 30]));
        img.put_pixel(1, 2, Rgb([200, 100, 50]));
        let crop = warp_affine(&img, &AffineMatrix::identity(), (6, 6)).unwrap();
        assert_eq!(crop.dimensions(), (6, 6));
        assert_eq!(*crop.get_pixel(1, 2), Rgb([200, 100, 50]));
        assert_eq!(*crop.get_pixel(0, 0), Rgb([10, 20, 30]));
        assert_eq!(*crop.get_pixel(5, 5), Rgb([0, 0, 0]));
    }

    #[test]
    fn test_crops_to_tensor_normalizes() {
        let crop = RgbImage::from_pixel(2, 3, Rgb([255, 0, 0]));
        let tensor = crops_to_tensor(&[crop.clone(), crop.clone()], true).unwrap();
        assert_eq!(tensor.shape(), &[2, 3, 3, 2]);
        assert!((tensor[[1, 0, 2, 1]] - (1.0 - 0.485) / 0.229).abs() < 1e-5);
        assert!((tensor[[0, 1, 0, 0]] - (-0.456 / 0.224)).abs() < 1e-5);

        let bgr = crops_to_tensor(&[crop], false).unwrap();
        assert!((bgr[[0, 2, 0, 0]] - (1.0 - 0.406) / 0.225).abs() < 1e-5);
    }

    #[test]
    fn test_crops_must_match() {
        let a = RgbImage::new(2, 2);
        let b = RgbImage::new(3, 2);
        assert!(crops_to_tensor(&[a, b], true).is_err());
        assert_eq!(crops_to_tensor(&[], true).unwrap().shape(), &[0, 3, 0, 0]);
    }
}
