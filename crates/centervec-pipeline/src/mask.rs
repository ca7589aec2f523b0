//! Binary masks: set operations and connected-component bookkeeping.
//!
//! A mask is a [`GrayImage`] where `0` is background and any non-zero
//! value is foreground. Every mask produced by this crate stores exactly
//! `0` or [`ON`], which is what the `imageproc` morphology operators
//! expect.

use image::{GrayImage, Luma};
use imageproc::region_labelling::{Connectivity, connected_components};

use crate::types::{Dimensions, PipelineError, ensure_same_dimensions};

/// Alias documenting that an image is used as a boolean grid.
pub type Mask = GrayImage;

/// Foreground value stored in masks.
pub const ON: u8 = 255;

/// Whether the pixel at `(x, y)` is foreground.
#[must_use]
#[inline]
pub fn is_on(mask: &Mask, x: u32, y: u32) -> bool {
    mask.get_pixel(x, y).0[0] != 0
}

/// Build a mask from a per-pixel predicate.
#[must_use = "returns the new mask"]
pub fn from_predicate(width: u32, height: u32, f: impl Fn(u32, u32) -> bool) -> Mask {
    GrayImage::from_fn(width, height, |x, y| Luma([if f(x, y) { ON } else { 0 }]))
}

/// An all-background mask of the given size.
#[must_use = "returns the new mask"]
pub fn empty(dimensions: Dimensions) -> Mask {
    GrayImage::new(dimensions.width, dimensions.height)
}

/// Number of foreground pixels.
#[must_use]
pub fn count(mask: &Mask) -> u64 {
    mask.pixels().map(|p| u64::from(p.0[0] != 0)).sum()
}

/// Whether the mask has no foreground pixels.
#[must_use]
pub fn is_blank(mask: &Mask) -> bool {
    mask.pixels().all(|p| p.0[0] == 0)
}

fn combine(a: &Mask, b: &Mask, op: impl Fn(bool, bool) -> bool) -> Result<Mask, PipelineError> {
    ensure_same_dimensions(Dimensions::of(a), Dimensions::of(b))?;
    Ok(from_predicate(a.width(), a.height(), |x, y| {
        op(is_on(a, x, y), is_on(b, x, y))
    }))
}

/// Pixels set in either mask.
///
/// # Errors
///
/// Returns [`PipelineError::DimensionMismatch`] if the masks differ in size.
pub fn union(a: &Mask, b: &Mask) -> Result<Mask, PipelineError> {
    combine(a, b, |p, q| p || q)
}

/// Pixels set in both masks.
///
/// # Errors
///
/// Returns [`PipelineError::DimensionMismatch`] if the masks differ in size.
pub fn intersection(a: &Mask, b: &Mask) -> Result<Mask, PipelineError> {
    combine(a, b, |p, q| p && q)
}

/// Pixels set in `a` but not in `b`.
///
/// # Errors
///
/// Returns [`PipelineError::DimensionMismatch`] if the masks differ in size.
pub fn difference(a: &Mask, b: &Mask) -> Result<Mask, PipelineError> {
    combine(a, b, |p, q| p && !q)
}

/// Label 8-connected foreground components.
///
/// Returns the label image (`0` = background, `1..=n` = components)
/// and the component count `n`.
#[must_use]
pub fn label_components(mask: &Mask) -> (image::ImageBuffer<Luma<u32>, Vec<u32>>, u32) {
    let labels = connected_components(mask, Connectivity::Eight, Luma([0u8]));
    let n = labels.pixels().map(|p| p.0[0]).max().unwrap_or(0);
    (labels, n)
}

/// Keep only the components for which `keep(label)` returns true.
#[must_use = "returns the filtered mask"]
pub fn retain_components(
    labels: &image::ImageBuffer<Luma<u32>, Vec<u32>>,
    keep: impl Fn(u32) -> bool,
) -> Mask {
    from_predicate(labels.width(), labels.height(), |x, y| {
        let label = labels.get_pixel(x, y).0[0];
        label != 0 && keep(label)
    })
}

/// Remove components with fewer than `min_area` pixels.
#[must_use = "returns the filtered mask"]
pub fn remove_small_components(mask: &Mask, min_area: u64) -> Mask {
    let (labels, n) = label_components(mask);
    let mut areas = vec![0u64; n as usize + 1];
    for p in labels.pixels() {
        areas[p.0[0] as usize] += 1;
    }
    retain_components(&labels, |label| areas[label as usize] >= min_area)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn square(size: u32, x0: u32, y0: u32, side: u32) -> Mask {
        from_predicate(size, size, |x, y| {
            (x0..x0 + side).contains(&x) && (y0..y0 + side).contains(&y)
        })
    }

    #[test]
    fn set_operations() {
        let a = square(10, 0, 0, 4);
        let b = square(10, 2, 2, 4);
        assert_eq!(count(&union(&a, &b).unwrap()), 16 + 16 - 4);
        assert_eq!(count(&intersection(&a, &b).unwrap()), 4);
        assert_eq!(count(&difference(&a, &b).unwrap()), 12);
    }

    #[test]
    fn mismatched_sizes_rejected() {
        let a = GrayImage::new(4, 4);
        let b = GrayImage::new(4, 5);
        assert!(matches!(
            union(&a, &b),
            Err(PipelineError::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn blank_detection() {
        assert!(is_blank(&GrayImage::new(3, 3)));
        assert!(!is_blank(&square(3, 1, 1, 1)));
    }

    #[test]
    fn components_are_eight_connected() {
        // Two pixels touching only diagonally form one component.
        let mask = from_predicate(4, 4, |x, y| (x, y) == (0, 0) || (x, y) == (1, 1));
        let (_, n) = label_components(&mask);
        assert_eq!(n, 1);
    }

    #[test]
    fn small_components_removed() {
        let big = square(20, 0, 0, 10);
        let speck = square(20, 15, 15, 2);
        let both = union(&big, &speck).unwrap();
        let cleaned = remove_small_components(&both, 100);
        assert_eq!(cleaned, big);
    }
}
