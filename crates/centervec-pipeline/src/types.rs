//! Shared types for the centervec vectorization pipeline.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::downsample::DownsampleFilter;
use crate::segment::SegmentConfig;
use crate::skeleton::SkeletonAlgorithm;
use crate::smooth::CurveKind;

/// Re-export `GrayImage` so downstream crates can reference
/// intermediate raster data without depending on `image` directly.
pub use image::GrayImage;

/// Re-export `RgbImage` so downstream crates can reference the
/// optional color plane without depending on `image` directly.
pub use image::RgbImage;

/// Per-pixel distance to the nearest background pixel.
///
/// Same dimensions as the mask it was computed from. Background pixels
/// hold `0.0`.
pub type DistanceField = image::ImageBuffer<image::Luma<f64>, Vec<f64>>;

/// A 2D point in image coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    /// Horizontal position (pixels from left edge).
    pub x: f64,
    /// Vertical position (pixels from top edge).
    pub y: f64,
}

impl Point {
    /// Create a new point.
    #[must_use]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Squared Euclidean distance to another point.
    ///
    /// Avoids the square root for comparison purposes.
    #[must_use]
    pub fn distance_squared(self, other: Self) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        dx.mul_add(dx, dy * dy)
    }

    /// Euclidean distance to another point.
    #[must_use]
    pub fn distance(self, other: Self) -> f64 {
        self.distance_squared(other).sqrt()
    }

    /// Linear interpolation towards `other` (`t = 0` is `self`).
    #[must_use]
    pub fn lerp(self, other: Self, t: f64) -> Self {
        Self::new(
            t.mul_add(other.x - self.x, self.x),
            t.mul_add(other.y - self.y, self.y),
        )
    }

    /// Uniformly scale both coordinates.
    #[must_use]
    pub fn scaled(self, factor: f64) -> Self {
        Self::new(self.x * factor, self.y * factor)
    }

    /// Whether both coordinates are finite.
    #[must_use]
    pub const fn is_finite(self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

/// A sequence of connected points forming a path segment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Polyline(Vec<Point>);

impl Polyline {
    /// Create a new polyline from a vector of points.
    #[must_use]
    pub const fn new(points: Vec<Point>) -> Self {
        Self(points)
    }

    /// Returns `true` if the polyline has no points.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns the number of points in the polyline.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns the first point, if any.
    #[must_use]
    pub fn first(&self) -> Option<&Point> {
        self.0.first()
    }

    /// Returns the last point, if any.
    #[must_use]
    pub fn last(&self) -> Option<&Point> {
        self.0.last()
    }

    /// Returns a slice of all points.
    #[must_use]
    pub fn points(&self) -> &[Point] {
        &self.0
    }

    /// Consumes the polyline and returns the underlying vector of points.
    #[must_use]
    pub fn into_points(self) -> Vec<Point> {
        self.0
    }

    /// Total length of the open polyline (sum of segment lengths).
    #[must_use]
    pub fn arc_length(&self) -> f64 {
        self.0.windows(2).map(|w| w[0].distance(w[1])).sum()
    }
}

/// A traced centerline: the ordered skeleton points of one path and the
/// stroke half-width sampled from the distance field at each point.
///
/// Closed paths do not repeat their first point at the end; the closing
/// segment is implied by [`closed`](Self::closed).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TracedPath {
    /// Ordered centerline points.
    pub polyline: Polyline,
    /// Distance-field value at each point (same length as `polyline`).
    pub widths: Vec<f64>,
    /// Whether the path forms a loop.
    pub closed: bool,
}

impl TracedPath {
    /// Arc length including the closing segment for closed paths.
    #[must_use]
    pub fn arc_length(&self) -> f64 {
        let open = self.polyline.arc_length();
        if !self.closed {
            return open;
        }
        match (self.polyline.first(), self.polyline.last()) {
            (Some(first), Some(last)) => open + last.distance(*first),
            _ => open,
        }
    }

    /// Mean sampled stroke half-width, or `0.0` when no samples exist.
    #[must_use]
    pub fn mean_width(&self) -> f64 {
        if self.widths.is_empty() {
            return 0.0;
        }
        #[allow(clippy::cast_precision_loss)]
        let n = self.widths.len() as f64;
        self.widths.iter().sum::<f64>() / n
    }

    /// Point halfway along the sequence (by index), used for color sampling.
    #[must_use]
    pub fn middle_point(&self) -> Option<Point> {
        let points = self.polyline.points();
        points.get(points.len() / 2).copied()
    }
}

/// One drawing command in absolute coordinates.
///
/// This is the exact representation persisted in a document path.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum PathCommand {
    /// Start a new subpath (`M`).
    MoveTo(Point),
    /// Straight line (`L`).
    LineTo(Point),
    /// Horizontal line to the given x (`H`).
    HorizontalTo(f64),
    /// Vertical line to the given y (`V`).
    VerticalTo(f64),
    /// Quadratic Bezier with one control point (`Q`).
    QuadTo {
        /// Control point.
        ctrl: Point,
        /// End point.
        to: Point,
    },
    /// Cubic Bezier with two control points (`C`).
    CubicTo {
        /// First control point.
        ctrl1: Point,
        /// Second control point.
        ctrl2: Point,
        /// End point.
        to: Point,
    },
    /// Close the current subpath (`Z`).
    Close,
}

/// A smoothed path ready for document assembly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurvePathData {
    /// Flat command sequence (move-to once, then line/curve commands).
    pub commands: Vec<PathCommand>,
    /// The simplified centerline the commands were fitted through.
    pub source: TracedPath,
}

/// Image dimensions in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl Dimensions {
    /// Dimensions of an image buffer.
    #[must_use]
    pub fn of<P: image::Pixel, C: std::ops::Deref<Target = [P::Subpixel]>>(
        image: &image::ImageBuffer<P, C>,
    ) -> Self {
        Self {
            width: image.width(),
            height: image.height(),
        }
    }

    /// Total pixel count.
    #[must_use]
    pub fn pixel_count(self) -> u64 {
        u64::from(self.width) * u64::from(self.height)
    }
}

impl fmt::Display for Dimensions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Configuration for the vectorization pipeline.
///
/// All parameters have sensible defaults. Call [`validate`](Self::validate)
/// before running when the values come from an untrusted source; the
/// pipeline entry points validate as their first step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VectorizeConfig {
    /// Region segmentation parameters.
    pub segment: SegmentConfig,

    /// Which centerline extraction algorithm to try first.
    pub algorithm: SkeletonAlgorithm,

    /// Minimum negative curvature (Hessian eigenvalue magnitude) for a
    /// pixel to count as a ridge point.
    pub ridge_threshold: f64,

    /// Traced paths shorter than this arc length (pixels) are discarded.
    pub min_path_length: f64,

    /// Douglas-Peucker tolerance in pixels. `0.0` keeps every point.
    pub simplify_tolerance: f64,

    /// Fit curves through the simplified points instead of straight lines.
    pub bezier_smoothing: bool,

    /// Curve strength. `0.0` produces straight segments; `2.0` is a
    /// classic Catmull-Rom spline; values are capped at `4.0`.
    pub smoothing: f64,

    /// Which curve family to fit when smoothing.
    pub curve_kind: CurveKind,

    /// Largest raster (in pixels) processed without downsampling.
    pub max_pixels: u64,

    /// Resampling filter for the over-budget retry.
    pub downsample_filter: DownsampleFilter,
}

impl VectorizeConfig {
    /// Default Douglas-Peucker tolerance.
    pub const DEFAULT_SIMPLIFY_TOLERANCE: f64 = 1.0;
    /// Default minimum path length.
    pub const DEFAULT_MIN_PATH_LENGTH: f64 = 10.0;
    /// Default smoothing strength.
    pub const DEFAULT_SMOOTHING: f64 = 2.0;
    /// Default ridge curvature threshold.
    pub const DEFAULT_RIDGE_THRESHOLD: f64 = 0.5;
    /// Default pixel budget (4096 x 4096).
    pub const DEFAULT_MAX_PIXELS: u64 = 4096 * 4096;

    /// Check parameter ranges.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidConfig`] naming the first
    /// offending parameter.
    pub fn validate(&self) -> Result<(), PipelineError> {
        self.segment.validate()?;
        let non_negative = [
            ("ridge_threshold", self.ridge_threshold),
            ("min_path_length", self.min_path_length),
            ("simplify_tolerance", self.simplify_tolerance),
            ("smoothing", self.smoothing),
        ];
        for (name, value) in non_negative {
            if !value.is_finite() || value < 0.0 {
                return Err(PipelineError::InvalidConfig(format!(
                    "{name} must be finite and non-negative, got {value}"
                )));
            }
        }
        if self.max_pixels == 0 {
            return Err(PipelineError::InvalidConfig(
                "max_pixels must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for VectorizeConfig {
    fn default() -> Self {
        Self {
            segment: SegmentConfig::default(),
            algorithm: SkeletonAlgorithm::default(),
            ridge_threshold: Self::DEFAULT_RIDGE_THRESHOLD,
            min_path_length: Self::DEFAULT_MIN_PATH_LENGTH,
            simplify_tolerance: Self::DEFAULT_SIMPLIFY_TOLERANCE,
            bezier_smoothing: true,
            smoothing: Self::DEFAULT_SMOOTHING,
            curve_kind: CurveKind::default(),
            max_pixels: Self::DEFAULT_MAX_PIXELS,
            downsample_filter: DownsampleFilter::default(),
        }
    }
}

/// Errors that can occur during pipeline processing.
///
/// Only malformed input and exhausted retries are errors; empty results
/// and algorithm fallbacks are reported through diagnostics instead.
///
/// Uses custom `Serialize`/`Deserialize` because `image::ImageError`
/// does not implement serde traits. The `ImageDecode` variant is
/// serialized as its `Display` string.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// Failed to decode the input image.
    #[error("failed to decode image: {0}")]
    ImageDecode(#[from] image::ImageError),

    /// The input image bytes were empty.
    #[error("input image data is empty")]
    EmptyInput,

    /// Pipeline configuration is invalid.
    #[error("invalid pipeline configuration: {0}")]
    InvalidConfig(String),

    /// A mask or field does not match the dimensions of its source.
    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// Dimensions of the source raster.
        expected: Dimensions,
        /// Dimensions that were supplied.
        actual: Dimensions,
    },

    /// The raster is still over the pixel budget after downsampling.
    #[error("image of {pixels} pixels exceeds the budget of {budget} pixels")]
    ResourceExhausted {
        /// Pixel count of the raster that could not be processed.
        pixels: u64,
        /// Configured pixel budget.
        budget: u64,
    },
}

/// Serde-compatible proxy for `PipelineError`.
///
/// `image::ImageError` does not implement serde, so the `ImageDecode`
/// variant stores its `Display` string instead. A deserialized
/// `ImageDecode` comes back as `InvalidConfig` carrying the message,
/// since the original typed error cannot be reconstructed.
#[derive(Serialize, Deserialize)]
enum PipelineErrorProxy {
    ImageDecode(String),
    EmptyInput,
    InvalidConfig(String),
    DimensionMismatch {
        expected: Dimensions,
        actual: Dimensions,
    },
    ResourceExhausted {
        pixels: u64,
        budget: u64,
    },
}

impl Serialize for PipelineError {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let proxy = match self {
            Self::ImageDecode(e) => PipelineErrorProxy::ImageDecode(e.to_string()),
            Self::EmptyInput => PipelineErrorProxy::EmptyInput,
            Self::InvalidConfig(s) => PipelineErrorProxy::InvalidConfig(s.clone()),
            Self::DimensionMismatch { expected, actual } => PipelineErrorProxy::DimensionMismatch {
                expected: *expected,
                actual: *actual,
            },
            Self::ResourceExhausted { pixels, budget } => PipelineErrorProxy::ResourceExhausted {
                pixels: *pixels,
                budget: *budget,
            },
        };
        proxy.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for PipelineError {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let proxy = PipelineErrorProxy::deserialize(deserializer)?;
        Ok(match proxy {
            PipelineErrorProxy::ImageDecode(msg) => {
                Self::InvalidConfig(format!("image decode error: {msg}"))
            }
            PipelineErrorProxy::EmptyInput => Self::EmptyInput,
            PipelineErrorProxy::InvalidConfig(s) => Self::InvalidConfig(s),
            PipelineErrorProxy::DimensionMismatch { expected, actual } => {
                Self::DimensionMismatch { expected, actual }
            }
            PipelineErrorProxy::ResourceExhausted { pixels, budget } => {
                Self::ResourceExhausted { pixels, budget }
            }
        })
    }
}

/// Fail with [`PipelineError::DimensionMismatch`] unless both images
/// have identical dimensions.
///
/// # Errors
///
/// Returns [`PipelineError::DimensionMismatch`] when they differ.
pub fn ensure_same_dimensions(
    expected: Dimensions,
    actual: Dimensions,
) -> Result<(), PipelineError> {
    if expected == actual {
        Ok(())
    } else {
        Err(PipelineError::DimensionMismatch { expected, actual })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    // --- Point tests ---

    #[test]
    fn point_distance() {
        let a = Point::new(0.0, 0.0);
        let b = Point::new(3.0, 4.0);
        assert!((a.distance(b) - 5.0).abs() < f64::EPSILON);
        assert!((a.distance_squared(b) - 25.0).abs() < f64::EPSILON);
    }

    #[test]
    fn point_lerp_midpoint() {
        let m = Point::new(0.0, 0.0).lerp(Point::new(4.0, -2.0), 0.5);
        assert_eq!(m, Point::new(2.0, -1.0));
    }

    #[test]
    fn point_non_finite_detected() {
        assert!(Point::new(1.0, 2.0).is_finite());
        assert!(!Point::new(f64::NAN, 2.0).is_finite());
    }

    // --- Polyline tests ---

    #[test]
    fn polyline_empty() {
        let pl = Polyline::new(vec![]);
        assert!(pl.is_empty());
        assert!(pl.first().is_none());
        assert!((pl.arc_length()).abs() < f64::EPSILON);
    }

    #[test]
    fn polyline_arc_length_sums_segments() {
        let pl = Polyline::new(vec![
            Point::new(0.0, 0.0),
            Point::new(3.0, 4.0),
            Point::new(3.0, 10.0),
        ]);
        assert!((pl.arc_length() - 11.0).abs() < 1e-12);
    }

    // --- TracedPath tests ---

    #[test]
    fn closed_path_length_includes_closing_segment() {
        let square = TracedPath {
            polyline: Polyline::new(vec![
                Point::new(0.0, 0.0),
                Point::new(2.0, 0.0),
                Point::new(2.0, 2.0),
                Point::new(0.0, 2.0),
            ]),
            widths: vec![1.0; 4],
            closed: true,
        };
        assert!((square.arc_length() - 8.0).abs() < 1e-12);
        assert!((square.mean_width() - 1.0).abs() < 1e-12);
        assert_eq!(square.middle_point(), Some(Point::new(2.0, 2.0)));
    }

    // --- Dimensions tests ---

    #[test]
    fn dimensions_display_and_count() {
        let d = Dimensions {
            width: 640,
            height: 480,
        };
        assert_eq!(d.to_string(), "640x480");
        assert_eq!(d.pixel_count(), 307_200);
    }

    // --- VectorizeConfig tests ---

    #[test]
    fn config_defaults_validate() {
        let config = VectorizeConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.algorithm, SkeletonAlgorithm::Ridge);
        assert!((config.simplify_tolerance - 1.0).abs() < f64::EPSILON);
        assert!((config.min_path_length - 10.0).abs() < f64::EPSILON);
        assert!(config.bezier_smoothing);
    }

    #[test]
    fn negative_tolerance_rejected() {
        let config = VectorizeConfig {
            simplify_tolerance: -1.0,
            ..VectorizeConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(PipelineError::InvalidConfig(ref msg)) if msg.contains("simplify_tolerance")
        ));
    }

    #[test]
    fn zero_pixel_budget_rejected() {
        let config = VectorizeConfig {
            max_pixels: 0,
            ..VectorizeConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn partial_config_json_fills_defaults() {
        let config: VectorizeConfig =
            serde_json::from_str(r#"{"simplify_tolerance": 2.5}"#).unwrap();
        assert!((config.simplify_tolerance - 2.5).abs() < f64::EPSILON);
        assert_eq!(config.segment, SegmentConfig::default());
    }

    #[test]
    fn config_serde_round_trip() {
        let config = VectorizeConfig {
            algorithm: SkeletonAlgorithm::MedialAxis,
            smoothing: 0.0,
            curve_kind: CurveKind::Quadratic,
            ..VectorizeConfig::default()
        };
        let json = serde_json::to_string(&config).unwrap();
        let back: VectorizeConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(config, back);
    }

    // --- PipelineError tests ---

    #[test]
    fn dimension_mismatch_display() {
        let err = ensure_same_dimensions(
            Dimensions {
                width: 10,
                height: 10,
            },
            Dimensions {
                width: 10,
                height: 9,
            },
        )
        .unwrap_err();
        assert_eq!(err.to_string(), "dimension mismatch: expected 10x10, got 10x9");
    }

    #[test]
    fn pipeline_error_serde_round_trip() {
        let err = PipelineError::ResourceExhausted {
            pixels: 100,
            budget: 10,
        };
        let json = serde_json::to_string(&err).unwrap();
        let back: PipelineError = serde_json::from_str(&json).unwrap();
        assert!(matches!(
            back,
            PipelineError::ResourceExhausted {
                pixels: 100,
                budget: 10
            }
        ));
    }
}
