// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Box geometry and affine transforms for top-down pose estimation.
//!
//! A person box is turned into a [`CenterScale`] with the aspect ratio of the
//! pose model input, and [`get_affine_transform`] maps that region onto the
//! model input (or, inverted, maps heatmap coordinates back to the image).

/// Pixel extent of one scale unit.
pub const PIXEL_STD: f32 = 200.0;

/// Padding applied around every person region.
pub const SCALE_PADDING: f32 = 1.25;

/// Axis-aligned person box given by two opposite corners, in image pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    /// First corner (x1, y1).
    pub p1: (f32, f32),
    /// Opposite corner (x2, y2).
    pub p2: (f32, f32),
}

impl BoundingBox {
    /// Box from two corners.
    #[must_use]
    pub const fn new(p1: (f32, f32), p2: (f32, f32)) -> Self {
        Self { p1, p2 }
    }

    /// Box from its top-left corner and size.
    #[must_use]
    pub fn from_xywh(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self::new((x, y), (x + width, y + height))
    }

    /// Horizontal extent `x2 - x1`.
    #[must_use]
    pub fn width(&self) -> f32 {
        self.p2.0 - self.p1.0
    }

    /// Vertical extent `y2 - y1`.
    #[must_use]
    pub fn height(&self) -> f32 {
        self.p2.1 - self.p1.1
    }

    /// Subject size used to scale stroke widths: the smaller box side.
    #[must_use]
    pub fn reference_size(&self) -> f32 {
        self.width().min(self.height())
    }

    /// Box midpoint.
    #[must_use]
    pub fn center(&self) -> (f32, f32) {
        (
            self.p1.0 + self.width() * 0.5,
            self.p1.1 + self.height() * 0.5,
        )
    }
}

/// Region center and extent in units of [`PIXEL_STD`] pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CenterScale {
    /// Region center in image pixels.
    pub center: (f32, f32),
    /// Region (width, height) divided by [`PIXEL_STD`].
    pub scale: (f32, f32),
}

/// Convert a box to the center/scale the pose model expects.
///
/// The shorter side is grown until the box has the aspect ratio
/// `target_width / target_height`; the box is never cropped. The scale is
/// padded by [`SCALE_PADDING`] unless `center.x == -1`, which marks an invalid
/// region.
///
/// # Arguments
///
/// * `bbox` - Person box.
/// * `target_width` - Pose model input width, must be positive.
/// * `target_height` - Pose model input height, must be positive.
#[must_use]
#[allow(clippy::cast_precision_loss, clippy::float_cmp)]
pub fn box_to_center_scale(
    bbox: &BoundingBox,
    target_width: usize,
    target_height: usize,
) -> CenterScale {
    let center = bbox.center();
    let mut box_width = bbox.width();
    let mut box_height = bbox.height();

    let aspect_ratio = target_width as f32 / target_height as f32;
    if box_width > aspect_ratio * box_height {
        box_height = box_width / aspect_ratio;
    } else if box_width < aspect_ratio * box_height {
        box_width = box_height * aspect_ratio;
    }

    let mut scale = (box_width / PIXEL_STD, box_height / PIXEL_STD);
    if center.0 != -1.0 {
        scale = (scale.0 * SCALE_PADDING, scale.1 * SCALE_PADDING);
    }

    CenterScale { center, scale }
}

/// 2x3 affine matrix.
///
/// ```text
/// | a11 a12 b1 |
/// | a21 a22 b2 |
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AffineMatrix {
    pub a11: f32,
    pub a12: f32,
    pub b1: f32,
    pub a21: f32,
    pub a22: f32,
    pub b2: f32,
}

impl AffineMatrix {
    /// Identity transform.
    #[must_use]
    pub const fn identity() -> Self {
        Self {
            a11: 1.0,
            a12: 0.0,
            b1: 0.0,
            a21: 0.0,
            a22: 1.0,
            b2: 0.0,
        }
    }

    /// Solve the affine transform mapping three source points onto three
    /// destination points.
    ///
    /// Returns `None` when the source points are collinear.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn from_triangles(src: [(f32, f32); 3], dst: [(f32, f32); 3]) -> Option<Self> {
        let [(x0, y0), (x1, y1), (x2, y2)] = src.map(|(x, y)| (f64::from(x), f64::from(y)));
        let det = x0 * (y1 - y2) - y0 * (x1 - x2) + (x1 * y2 - x2 * y1);
        if det.abs() < 1e-12 {
            return None;
        }

        // Cramer's rule on [x y 1] * [a; b; c] = u, once per output coordinate.
        let solve = |u: [f64; 3]| -> (f32, f32, f32) {
            let [u0, u1, u2] = u;
            let a = u0 * (y1 - y2) - y0 * (u1 - u2) + (u1 * y2 - u2 * y1);
            let b = x0 * (u1 - u2) - u0 * (x1 - x2) + (x1 * u2 - x2 * u1);
            let c = x0 * (y1 * u2 - y2 * u1) - y0 * (x1 * u2 - x2 * u1) + u0 * (x1 * y2 - x2 * y1);
            ((a / det) as f32, (b / det) as f32, (c / det) as f32)
        };

        let (a11, a12, b1) = solve(dst.map(|(x, _)| f64::from(x)));
        let (a21, a22, b2) = solve(dst.map(|(_, y)| f64::from(y)));
        Some(Self {
            a11,
            a12,
            b1,
            a21,
            a22,
            b2,
        })
    }

    /// Apply the transform to a point.
    #[must_use]
    pub fn transform_point(&self, x: f32, y: f32) -> (f32, f32) {
        (
            self.a11 * x + self.a12 * y + self.b1,
            self.a21 * x + self.a22 * y + self.b2,
        )
    }

    /// Inverse transform, `None` when the matrix is singular.
    #[must_use]
    pub fn inverse(&self) -> Option<Self> {
        let det = self.a11 * self.a22 - self.a12 * self.a21;
        if det.abs() < 1e-10 {
            return None;
        }

        let inv_det = 1.0 / det;
        Some(Self {
            a11: self.a22 * inv_det,
            a12: -self.a12 * inv_det,
            b1: (self.a12 * self.b2 - self.a22 * self.b1) * inv_det,
            a21: -self.a21 * inv_det,
            a22: self.a11 * inv_det,
            b2: (self.a21 * self.b1 - self.a11 * self.b2) * inv_det,
        })
    }
}

fn rotate_point(p: (f32, f32), rot_rad: f32) -> (f32, f32) {
    let (sn, cs) = rot_rad.sin_cos();
    (p.0 * cs - p.1 * sn, p.0 * sn + p.1 * cs)
}

/// Third point completing a right angle at `b`.
fn third_point(a: (f32, f32), b: (f32, f32)) -> (f32, f32) {
    let direct = (a.0 - b.0, a.1 - b.1);
    (b.0 - direct.1, b.1 + direct.0)
}

/// Affine transform from a center/scale region to an output of `output_size`
/// (width, height) pixels.
///
/// The region center lands on the output center and the region width spans the
/// output width. With `inverse` set, the transform maps output coordinates back
/// into the image.
///
/// # Arguments
///
/// * `region` - Region center and scale.
/// * `rotation_deg` - Rotation of the region in degrees.
/// * `output_size` - Output (width, height) in pixels.
/// * `inverse` - Return the output-to-image transform instead.
///
/// Returns `None` only for a degenerate (zero-width) region.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn get_affine_transform(
    region: &CenterScale,
    rotation_deg: f32,
    output_size: (usize, usize),
    inverse: bool,
) -> Option<AffineMatrix> {
    let src_w = region.scale.0 * PIXEL_STD;
    let dst_w = output_size.0 as f32;
    let dst_h = output_size.1 as f32;

    let src_dir = rotate_point((0.0, src_w * -0.5), rotation_deg.to_radians());
    let dst_dir = (0.0, dst_w * -0.5);

    let src0 = region.center;
    let src1 = (src0.0 + src_dir.0, src0.1 + src_dir.1);
    let dst0 = (dst_w * 0.5, dst_h * 0.5);
    let dst1 = (dst0.0 + dst_dir.0, dst0.1 + dst_dir.1);

    let src = [src0, src1, third_point(src0, src1)];
    let dst = [dst0, dst1, third_point(dst0, dst1)];

    if inverse {
        AffineMatrix::from_triangles(dst, src)
    } else {
        AffineMatrix::from_triangles(src, dst)
    }
}
