//! Pixel-budget fallback: downsample oversized rasters once.
//!
//! A raster with more pixels than `max_pixels` is resized (aspect ratio
//! preserved) so its pixel count fits the budget, processed at that
//! working size, and its traced coordinates are scaled back onto the
//! original canvas. If the resized raster still exceeds the budget the
//! run fails with [`PipelineError::ResourceExhausted`].

use std::fmt;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::raster::Raster;
use crate::types::{Dimensions, PipelineError, Point, Polyline, TracedPath};

/// Resampling filter used when downsampling.
///
/// Ordered from fastest/lowest-quality to slowest/highest-quality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DownsampleFilter {
    /// Nearest-neighbor: fastest, blocky artifacts.
    Nearest,
    /// Bilinear interpolation: area-preserving enough for line art.
    #[default]
    Triangle,
    /// Bicubic (Catmull-Rom): moderate speed, good quality.
    CatmullRom,
    /// Gaussian: moderate speed, smooth output.
    Gaussian,
    /// Lanczos with 3 lobes: slowest, sharpest.
    Lanczos3,
}

impl DownsampleFilter {
    /// Convert to the `image` crate's `FilterType`.
    const fn to_image_filter(self) -> image::imageops::FilterType {
        match self {
            Self::Nearest => image::imageops::FilterType::Nearest,
            Self::Triangle => image::imageops::FilterType::Triangle,
            Self::CatmullRom => image::imageops::FilterType::CatmullRom,
            Self::Gaussian => image::imageops::FilterType::Gaussian,
            Self::Lanczos3 => image::imageops::FilterType::Lanczos3,
        }
    }
}

impl fmt::Display for DownsampleFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Nearest => f.write_str("nearest"),
            Self::Triangle => f.write_str("triangle"),
            Self::CatmullRom => f.write_str("catmull_rom"),
            Self::Gaussian => f.write_str("gaussian"),
            Self::Lanczos3 => f.write_str("lanczos3"),
        }
    }
}

/// The mapping between the working raster and the original canvas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Downsample {
    /// Canvas of the source raster.
    pub original: Dimensions,
    /// Size actually processed.
    pub working: Dimensions,
}

impl Downsample {
    /// Horizontal factor from working to original coordinates.
    #[must_use]
    pub fn scale_x(&self) -> f64 {
        f64::from(self.original.width) / f64::from(self.working.width)
    }

    /// Vertical factor from working to original coordinates.
    #[must_use]
    pub fn scale_y(&self) -> f64 {
        f64::from(self.original.height) / f64::from(self.working.height)
    }

    /// Mean of both axis factors, used for lengths and widths.
    #[must_use]
    pub fn mean_scale(&self) -> f64 {
        f64::midpoint(self.scale_x(), self.scale_y())
    }

    /// Map a working-raster point onto the original canvas.
    #[must_use]
    pub fn to_original(&self, point: Point) -> Point {
        Point::new(point.x * self.scale_x(), point.y * self.scale_y())
    }

    /// Map a traced path onto the original canvas.
    #[must_use]
    pub fn rescale_path(&self, path: &TracedPath) -> TracedPath {
        let scale = self.mean_scale();
        TracedPath {
            polyline: Polyline::new(
                path.polyline
                    .points()
                    .iter()
                    .map(|&p| self.to_original(p))
                    .collect(),
            ),
            widths: path.widths.iter().map(|w| w * scale).collect(),
            closed: path.closed,
        }
    }
}

/// Largest aspect-preserving size whose pixel count fits `max_pixels`.
///
/// Returns `None` when `dimensions` already fits. Each side is at least
/// one pixel, so very elongated images may still be over budget.
#[must_use]
pub fn working_dimensions(dimensions: Dimensions, max_pixels: u64) -> Option<Dimensions> {
    let pixels = dimensions.pixel_count();
    if pixels <= max_pixels {
        return None;
    }

    #[allow(clippy::cast_precision_loss)]
    let factor = (max_pixels as f64 / pixels as f64).sqrt();
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let side = |length: u32| ((f64::from(length) * factor).floor() as u32).clamp(1, length);
    Some(Dimensions {
        width: side(dimensions.width),
        height: side(dimensions.height),
    })
}

/// Downsample `raster` to fit `max_pixels`, if needed.
///
/// Returns `None` when the raster already fits.
///
/// # Errors
///
/// Returns [`PipelineError::ResourceExhausted`] if the downsampled raster
/// still exceeds the budget.
pub fn fit_to_budget(
    raster: &Raster,
    max_pixels: u64,
    filter: DownsampleFilter,
) -> Result<Option<(Raster, Downsample)>, PipelineError> {
    let original = raster.dimensions();
    let Some(working) = working_dimensions(original, max_pixels) else {
        return Ok(None);
    };

    if working.pixel_count() > max_pixels {
        return Err(PipelineError::ResourceExhausted {
            pixels: working.pixel_count(),
            budget: max_pixels,
        });
    }

    debug!(
        "downsample: {original} raster exceeds {max_pixels} pixels, retrying at {working} ({filter})"
    );
    let resized = raster.resized(working.width, working.height, filter.to_image_filter());
    Ok(Some((resized, Downsample { original, working })))
}
