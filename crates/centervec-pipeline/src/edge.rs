//! Gradient-based line band estimation.
//!
//! Runs Canny edge detection to find stroke boundaries, then grows the
//! edge map back into a band wide enough to cover whole strokes.
//! Intersecting that band with the foreground keeps thin strokes intact
//! while leaving the interiors of large filled areas out.
//!
//! Blur and Sobel filtering come from `imageproc`. Non-maximum suppression
//! and hysteresis are local: `imageproc 0.26`'s hysteresis underflows at
//! the image border and never follows the north or north-east neighbour
//! (<https://github.com/image-rs/imageproc/issues/705>).

use image::{GrayImage, ImageBuffer, Luma};
use imageproc::distance_transform::Norm;
use imageproc::filter::{filter_clamped, gaussian_blur_f32};
use imageproc::kernel;
use imageproc::morphology::dilate;

use crate::mask::{self, Mask};
use crate::types::PipelineError;

/// Minimum allowed Canny threshold.
///
/// A low threshold of zero treats every pixel with any gradient as a
/// potential edge, which floods the band with noise.
pub const MIN_THRESHOLD: f32 = 1.0;
const _: () = assert!(MIN_THRESHOLD > 0.0);

/// Canny hysteresis thresholds used by the `edge` line method.
pub const CANNY_LOW: f32 = 50.0;
/// See [`CANNY_LOW`].
pub const CANNY_HIGH: f32 = 150.0;

/// Gaussian sigma applied before the gradient.
const CANNY_SIGMA: f32 = 1.4;

/// Per-pixel gradient strength.
type Strength = ImageBuffer<Luma<f32>, Vec<f32>>;

/// Sobel response.
type Gradient = ImageBuffer<Luma<i16>, Vec<i16>>;

/// 8-connected neighbour offsets.
const NEIGHBOURS: [(i32, i32); 8] = [
    (-1, -1),
    (0, -1),
    (1, -1),
    (-1, 0),
    (1, 0),
    (-1, 1),
    (0, 1),
    (1, 1),
];

/// Detect edges using the Canny algorithm.
///
/// Returns a binary image: 255 for edge pixels, 0 for non-edge.
///
/// Both thresholds are clamped to a minimum of [`MIN_THRESHOLD`] and
/// `low_threshold` is clamped to be at most `high_threshold`.
#[must_use = "returns the binary edge map"]
pub fn canny(image: &GrayImage, low_threshold: f32, high_threshold: f32) -> GrayImage {
    let high = high_threshold.max(MIN_THRESHOLD);
    let low = low_threshold.max(MIN_THRESHOLD).min(high);
    let (width, height) = image.dimensions();
    if width < 3 || height < 3 {
        return GrayImage::new(width, height);
    }

    let blurred = gaussian_blur_f32(image, CANNY_SIGMA);
    let gx: Gradient = filter_clamped(&blurred, kernel::SOBEL_HORIZONTAL_3X3);
    let gy: Gradient = filter_clamped(&blurred, kernel::SOBEL_VERTICAL_3X3);
    let magnitude = Strength::from_fn(width, height, |x, y| {
        let h = f32::from(gx.get_pixel(x, y).0[0]);
        let v = f32::from(gy.get_pixel(x, y).0[0]);
        Luma([h.hypot(v)])
    });

    let thinned = suppress_non_maxima(&magnitude, &gx, &gy);
    hysteresis(&thinned, low, high)
}

/// Keep only pixels that are maximal along their gradient direction.
///
/// The one-pixel border is always zero.
fn suppress_non_maxima(magnitude: &Strength, gx: &Gradient, gy: &Gradient) -> Strength {
    let (width, height) = magnitude.dimensions();
    let mut out = Strength::new(width, height);
    for y in 1..height - 1 {
        for x in 1..width - 1 {
            let dx = f32::from(gx.get_pixel(x, y).0[0]);
            let dy = f32::from(gy.get_pixel(x, y).0[0]);
            let mut angle = dy.atan2(dx).to_degrees();
            if angle < 0.0 {
                angle += 180.0;
            }

            let (a, b) = if !(22.5..157.5).contains(&angle) {
                ((x - 1, y), (x + 1, y))
            } else if angle < 67.5 {
                ((x + 1, y + 1), (x - 1, y - 1))
            } else if angle < 112.5 {
                ((x, y - 1), (x, y + 1))
            } else {
                ((x - 1, y + 1), (x + 1, y - 1))
            };

            let m = magnitude.get_pixel(x, y).0[0];
            let (ma, mb) = (magnitude.get_pixel(a.0, a.1).0[0], magnitude.get_pixel(b.0, b.1).0[0]);
            if m >= ma && m >= mb {
                out.put_pixel(x, y, Luma([m]));
            }
        }
    }
    out
}

/// In-bounds 8-connected neighbours of `(x, y)`.
fn neighbours(x: u32, y: u32, width: u32, height: u32) -> impl Iterator<Item = (u32, u32)> {
    NEIGHBOURS.into_iter().filter_map(move |(dx, dy)| {
        let nx = x.checked_add_signed(dx)?;
        let ny = y.checked_add_signed(dy)?;
        (nx < width && ny < height).then_some((nx, ny))
    })
}

/// Seed edges at `high` and follow them through pixels at or above `low`.
///
/// Seeds are taken from the interior; tracing may reach the border.
fn hysteresis(strength: &Strength, low: f32, high: f32) -> GrayImage {
    let (width, height) = strength.dimensions();
    let mut out = GrayImage::new(width, height);
    if width < 3 || height < 3 {
        return out;
    }

    let mut stack = Vec::new();
    for y in 1..height - 1 {
        for x in 1..width - 1 {
            if strength.get_pixel(x, y).0[0] < high || mask::is_on(&out, x, y) {
                continue;
            }
            out.put_pixel(x, y, Luma([mask::ON]));
            stack.push((x, y));
            while let Some((cx, cy)) = stack.pop() {
                for (nx, ny) in neighbours(cx, cy, width, height) {
                    if strength.get_pixel(nx, ny).0[0] >= low && !mask::is_on(&out, nx, ny) {
                        out.put_pixel(nx, ny, Luma([mask::ON]));
                        stack.push((nx, ny));
                    }
                }
            }
        }
    }
    out
}

/// Foreground pixels within `reach` (chessboard) pixels of a Canny edge.
///
/// # Errors
///
/// Returns [`PipelineError::DimensionMismatch`] if `foreground` and
/// `gray` differ in size.
pub fn edge_band(gray: &GrayImage, foreground: &Mask, reach: u8) -> Result<Mask, PipelineError> {
    let edges = canny(gray, CANNY_LOW, CANNY_HIGH);
    let grown = if reach == 0 {
        edges
    } else {
        dilate(&edges, Norm::LInf, reach)
    };
    mask::intersection(&grown, foreground)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    /// 20x20 image with a sharp vertical boundary at x = 10.
    fn sharp_edge_image() -> GrayImage {
        GrayImage::from_fn(20, 20, |x, _y| {
            if x < 10 {
                image::Luma([0])
            } else {
                image::Luma([255])
            }
        })
    }

    #[test]
    fn blank_image_produces_no_edges() {
        let img = GrayImage::from_fn(20, 20, |_, _| image::Luma([128]));
        let edges = canny(&img, CANNY_LOW, CANNY_HIGH);
        assert!(mask::is_blank(&edges));
    }

    #[test]
    fn sharp_boundary_detected() {
        let edges = canny(&sharp_edge_image(), CANNY_LOW, CANNY_HIGH);
        let near_boundary = (0..20).any(|y| (8..12).any(|x| mask::is_on(&edges, x, y)));
        assert!(near_boundary, "expected edges near x = 10");
    }

    #[test]
    fn zero_thresholds_are_clamped() {
        let img = GrayImage::from_fn(20, 20, |_, _| image::Luma([128]));
        let edges = canny(&img, 0.0, 0.0);
        assert!(mask::is_blank(&edges));
    }

    #[test]
    fn tiny_image_produces_no_edges() {
        let img = GrayImage::from_fn(2, 5, |x, _| image::Luma([if x == 0 { 0 } else { 255 }]));
        let edges = canny(&img, CANNY_LOW, CANNY_HIGH);
        assert_eq!(edges.dimensions(), (2, 5));
        assert!(mask::is_blank(&edges));
    }

    #[test]
    fn border_edge_does_not_underflow() {
        let img = GrayImage::from_fn(10, 10, |x, _| image::Luma([if x == 1 { 255 } else { 0 }]));
        let edges = canny(&img, 1.0, 2.0);
        assert_eq!(edges.dimensions(), (10, 10));
    }

    // --- hysteresis tests ---

    /// Strength map with a strong seed at (5, 5) and `weak` pixels elsewhere.
    fn strength_with(weak: &[(u32, u32)]) -> Strength {
        let mut strength = Strength::new(11, 11);
        strength.put_pixel(5, 5, Luma([200.0]));
        for &(x, y) in weak {
            strength.put_pixel(x, y, Luma([80.0]));
        }
        strength
    }

    #[test]
    fn hysteresis_follows_north_neighbour() {
        // A vertical weak run reachable from the seed only by stepping north.
        let strength = strength_with(&[(5, 4), (5, 3), (5, 2)]);
        let edges = hysteresis(&strength, CANNY_LOW, CANNY_HIGH);
        for y in 2..=5 {
            assert!(mask::is_on(&edges, 5, y), "(5, {y}) should be traced");
        }
        assert_eq!(mask::count(&edges), 4);
    }

    #[test]
    fn hysteresis_follows_north_east_neighbour() {
        let strength = strength_with(&[(6, 4), (7, 3)]);
        let edges = hysteresis(&strength, CANNY_LOW, CANNY_HIGH);
        assert!(mask::is_on(&edges, 6, 4));
        assert!(mask::is_on(&edges, 7, 3));
    }

    #[test]
    fn hysteresis_drops_unconnected_weak_pixels() {
        let strength = strength_with(&[(5, 4), (9, 9)]);
        let edges = hysteresis(&strength, CANNY_LOW, CANNY_HIGH);
        assert!(mask::is_on(&edges, 5, 4));
        assert!(!mask::is_on(&edges, 9, 9));
    }

    #[test]
    fn hysteresis_traces_onto_the_border() {
        let mut strength = Strength::new(6, 6);
        strength.put_pixel(1, 1, Luma([200.0]));
        strength.put_pixel(0, 0, Luma([80.0]));
        strength.put_pixel(1, 0, Luma([80.0]));
        let edges = hysteresis(&strength, CANNY_LOW, CANNY_HIGH);
        assert!(mask::is_on(&edges, 0, 0));
        assert!(mask::is_on(&edges, 1, 0));
    }

    #[test]
    fn band_covers_thin_stroke_but_not_fill_interior() {
        // A dark 3-px stroke at rows 5..=7 and a 30x30 dark block.
        let gray = GrayImage::from_fn(60, 60, |x, y| {
            let stroke = (5..=7).contains(&y) && (5..55).contains(&x);
            let block = (20..50).contains(&x) && (20..50).contains(&y);
            image::Luma([if stroke || block { 0 } else { 255 }])
        });
        let foreground = mask::from_predicate(60, 60, |x, y| gray.get_pixel(x, y).0[0] == 0);
        let band = edge_band(&gray, &foreground, 4).unwrap();

        assert!(mask::is_on(&band, 30, 6), "stroke center should be covered");
        assert!(!mask::is_on(&band, 35, 35), "block interior should be excluded");
        assert!(mask::is_on(&band, 21, 35), "block rim should be covered");
    }
}
