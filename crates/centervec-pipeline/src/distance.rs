//! Euclidean distance field of a mask.
//!
//! Wraps [`imageproc::distance_transform::euclidean_squared_distance_transform`],
//! which measures the distance to the nearest *non-zero* pixel. The mask is
//! inverted and padded by one background pixel on every side so that the
//! image border counts as background and foreground pixels touching it
//! get a distance of `1.0` rather than growing unbounded.

use image::{GrayImage, Luma};
use imageproc::distance_transform::euclidean_squared_distance_transform;

use crate::mask::{self, Mask};
use crate::types::DistanceField;

/// Compute the distance from every foreground pixel to the nearest
/// background pixel (center to center).
///
/// Background pixels map to `0.0`; a foreground pixel with a background
/// 4-neighbor maps to `1.0`.
#[must_use = "returns the distance field"]
pub fn distance_field(mask: &Mask) -> DistanceField {
    let (w, h) = mask.dimensions();
    let seeds = GrayImage::from_fn(w + 2, h + 2, |x, y| {
        let inside = x >= 1 && y >= 1 && x <= w && y <= h;
        let background = !inside || !mask::is_on(mask, x - 1, y - 1);
        Luma([if background { mask::ON } else { 0 }])
    });
    let squared = euclidean_squared_distance_transform(&seeds);
    DistanceField::from_fn(w, h, |x, y| Luma([squared.get_pixel(x + 1, y + 1).0[0].sqrt()]))
}

/// Largest value in a distance field, or `0.0` when empty.
#[must_use]
pub fn max_distance(field: &DistanceField) -> f64 {
    field.pixels().map(|p| p.0[0]).fold(0.0, f64::max)
}

/// Value at integer coordinates, or `0.0` outside the field.
#[must_use]
#[inline]
pub fn sample(field: &DistanceField, x: i64, y: i64) -> f64 {
    match (u32::try_from(x), u32::try_from(y)) {
        (Ok(x), Ok(y)) if x < field.width() && y < field.height() => field.get_pixel(x, y).0[0],
        _ => 0.0,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn empty_mask_is_all_zero() {
        let field = distance_field(&GrayImage::new(5, 5));
        assert!(field.pixels().all(|p| p.0[0] == 0.0));
    }

    #[test]
    fn horizontal_band_peaks_on_center_row() {
        // Rows 4..=6 set: the center row is two steps from the background.
        let band = mask::from_predicate(20, 11, |_, y| (4..=6).contains(&y));
        let field = distance_field(&band);
        assert!((field.get_pixel(10, 5).0[0] - 2.0).abs() < 1e-9);
        assert!((field.get_pixel(10, 4).0[0] - 1.0).abs() < 1e-9);
        assert!(field.get_pixel(10, 3).0[0].abs() < 1e-9);
    }

    #[test]
    fn image_border_counts_as_background() {
        let full = mask::from_predicate(3, 3, |_, _| true);
        let field = distance_field(&full);
        assert!((field.get_pixel(0, 0).0[0] - 1.0).abs() < 1e-9);
        assert!((field.get_pixel(1, 1).0[0] - 2.0).abs() < 1e-9);
        assert!((max_distance(&field) - 2.0).abs() < 1e-9);
    }

    #[test]
    fn sample_outside_is_zero() {
        let field = distance_field(&mask::from_predicate(2, 2, |_, _| true));
        assert!(sample(&field, -1, 0).abs() < f64::EPSILON);
        assert!(sample(&field, 0, 2).abs() < f64::EPSILON);
        assert!((sample(&field, 1, 1) - 1.0).abs() < f64::EPSILON);
    }
}
