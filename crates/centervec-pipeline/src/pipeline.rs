//! Incremental pipeline: advance stage-by-stage, inspecting each
//! intermediate result before continuing.
//!
//! Unlike [`crate::process`] which runs the entire pipeline in one call,
//! [`Pipeline`] lets the caller drive execution one step at a time:
//!
//! ```rust
//! # use centervec_pipeline::{Pipeline, PipelineError, Raster, VectorizeConfig};
//! # fn run(png: &[u8]) -> Result<(), PipelineError> {
//! let raster = Raster::from_bytes(png)?;
//! let result = Pipeline::new(raster, VectorizeConfig::default())
//!     .downsample()?
//!     .segment()?
//!     .skeletonize()
//!     .trace()?
//!     .simplify()
//!     .smooth()
//!     .into_result();
//! # let _ = result;
//! # Ok(())
//! # }
//! ```
//!
//! Each stage method consumes `self` and returns the next pipeline state
//! (or `Result` for fallible stages), carrying all previously computed
//! intermediates. Stopping between two stages is the supported way to
//! cancel a run.
//!
//! # Memory
//!
//! Every stage retains the source raster (and the downsampled working
//! raster, if any) until [`Smoothed::into_result`] consumes the final
//! stage, so that color sampling and visualization can still reach them.

use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::diagnostics::Warning;
use crate::downsample::{self, Downsample};
use crate::mask::{self, Mask};
use crate::raster::Raster;
use crate::segment::{self, ColorInfo, SegmentStatus, Segmentation};
use crate::simplify::simplify_paths;
use crate::skeleton::{self, Fallback, SkeletonAlgorithm, Skeletonization};
use crate::smooth::{CurveFallback, SmoothParams, Smoothing, smooth_paths};
use crate::trace;
use crate::types::{CurvePathData, Dimensions, DistanceField, PipelineError, TracedPath, VectorizeConfig};

/// Final output of a pipeline run.
///
/// Coordinates are in the source raster's canvas even when the run was
/// downsampled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorizeResult {
    /// Fitted paths in tracing order.
    pub paths: Vec<CurvePathData>,
    /// Canvas size of the source raster.
    pub canvas: Dimensions,
    /// Set when the raster was downsampled to fit the pixel budget.
    pub downsample: Option<Downsample>,
    /// Dominant line colors (empty unless requested).
    pub color_info: ColorInfo,
    /// The skeleton algorithm whose output was used.
    pub algorithm: SkeletonAlgorithm,
    /// Skeleton algorithms abandoned before `algorithm`.
    pub skeleton_fallbacks: Vec<Fallback>,
    /// Paths fitted with a simpler curve shape than requested.
    pub curve_fallbacks: Vec<CurveFallback>,
    /// Recoverable conditions met along the way.
    pub warnings: Vec<Warning>,
}

/// State shared by every stage after [`Pending`].
struct Context {
    config: VectorizeConfig,
    source: Raster,
    working: Option<(Raster, Downsample)>,
    warnings: Vec<Warning>,
}

impl Context {
    fn working_raster(&self) -> &Raster {
        self.working.as_ref().map_or(&self.source, |(raster, _)| raster)
    }

    fn downsample(&self) -> Option<Downsample> {
        self.working.as_ref().map(|(_, d)| *d)
    }

    fn warn(&mut self, warning: Warning) {
        warn!("pipeline: {warning}");
        self.warnings.push(warning);
    }
}

// ───────────────────────── Stage 0: Pending ──────────────────────────

/// Pipeline state before any processing has occurred.
///
/// Call [`downsample`](Self::downsample) to advance to the next stage.
#[must_use = "pipeline stages are consumed by advancing; call .downsample() to continue"]
pub struct Pending {
    config: VectorizeConfig,
    raster: Raster,
}

impl Pending {
    /// The source raster.
    #[must_use]
    pub const fn raster(&self) -> &Raster {
        &self.raster
    }

    /// The configuration the run will use.
    #[must_use]
    pub const fn config(&self) -> &VectorizeConfig {
        &self.config
    }

    /// Validate the configuration and fit the raster to the pixel budget.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidConfig`] for out-of-range
    /// parameters and [`PipelineError::ResourceExhausted`] if the raster
    /// cannot be downsampled under `max_pixels`.
    pub fn downsample(self) -> Result<Prepared, PipelineError> {
        self.config.validate()?;
        let working = downsample::fit_to_budget(
            &self.raster,
            self.config.max_pixels,
            self.config.downsample_filter,
        )?;
        let mut context = Context {
            config: self.config,
            source: self.raster,
            working,
            warnings: Vec::new(),
        };
        if let Some(d) = context.downsample() {
            context.warn(Warning::Downsampled {
                original: d.original,
                working: d.working,
            });
        }
        Ok(Prepared { context })
    }
}

// ───────────────────────── Stage 1: Prepared ─────────────────────────

/// Pipeline state after fitting the raster to the pixel budget.
///
/// Call [`segment`](Self::segment) to advance to the next stage.
#[must_use = "pipeline stages are consumed by advancing; call .segment() to continue"]
pub struct Prepared {
    context: Context,
}

impl Prepared {
    /// The raster that will be processed (downsampled or the source).
    #[must_use]
    pub fn working_raster(&self) -> &Raster {
        self.context.working_raster()
    }

    /// The downsampling applied, if any.
    #[must_use]
    pub fn downsample(&self) -> Option<Downsample> {
        self.context.downsample()
    }

    /// Split the working raster into line and fill masks.
    ///
    /// # Errors
    ///
    /// Propagates [`segment::segment`] errors.
    pub fn segment(mut self) -> Result<Segmented, PipelineError> {
        let segmentation =
            segment::segment(self.context.working_raster(), &self.context.config.segment)?;
        if segmentation.status == SegmentStatus::NoContent {
            self.context.warn(Warning::NoContent);
        }
        Ok(Segmented {
            context: self.context,
            segmentation,
        })
    }
}

// ───────────────────────── Stage 2: Segmented ────────────────────────

/// Pipeline state after region segmentation.
///
/// Call [`skeletonize`](Self::skeletonize) to advance to the next stage.
#[must_use = "pipeline stages are consumed by advancing; call .skeletonize() to continue"]
pub struct Segmented {
    context: Context,
    segmentation: Segmentation,
}

impl Segmented {
    /// Line and fill masks plus color information.
    #[must_use]
    pub const fn segmentation(&self) -> &Segmentation {
        &self.segmentation
    }

    /// Extract the centerline of the line mask.
    pub fn skeletonize(mut self) -> Skeletonized {
        let line = &self.segmentation.line_mask;
        let skeletonization = skeleton::extract(
            line,
            self.context.config.algorithm,
            self.context.config.ridge_threshold,
        );
        if mask::is_blank(&skeletonization.skeleton) && !mask::is_blank(line) {
            self.context.warn(Warning::EmptySkeleton);
        }
        Skeletonized {
            context: self.context,
            segmentation: self.segmentation,
            skeletonization,
        }
    }
}

// ───────────────────────── Stage 3: Skeletonized ─────────────────────

/// Pipeline state after centerline extraction.
///
/// Call [`trace`](Self::trace) to advance to the next stage.
#[must_use = "pipeline stages are consumed by advancing; call .trace() to continue"]
pub struct Skeletonized {
    context: Context,
    segmentation: Segmentation,
    skeletonization: Skeletonization,
}

impl Skeletonized {
    /// One-pixel-wide centerline mask.
    #[must_use]
    pub const fn skeleton(&self) -> &Mask {
        &self.skeletonization.skeleton
    }

    /// Distance field of the line mask.
    #[must_use]
    pub const fn distance(&self) -> &DistanceField {
        &self.skeletonization.distance
    }

    /// Which algorithm produced the skeleton, and what was abandoned.
    #[must_use]
    pub const fn skeletonization(&self) -> &Skeletonization {
        &self.skeletonization
    }

    /// Trace the skeleton into paths on the source canvas.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::DimensionMismatch`] if the skeleton and
    /// its distance field disagree in size.
    pub fn trace(mut self) -> Result<Traced, PipelineError> {
        let downsample = self.context.downsample();
        let scale = downsample.map_or(1.0, |d| d.mean_scale());
        let min_path_length = self.context.config.min_path_length / scale;

        let mut traced = trace::trace(
            &self.skeletonization.skeleton,
            &self.skeletonization.distance,
            min_path_length,
        )?;
        if let Some(d) = downsample {
            traced = traced.iter().map(|p| d.rescale_path(p)).collect();
        }

        if traced.is_empty() && !mask::is_blank(&self.skeletonization.skeleton) {
            let min_path_length = self.context.config.min_path_length;
            self.context.warn(Warning::NoPaths { min_path_length });
        }
        Ok(Traced {
            context: self.context,
            segmentation: self.segmentation,
            skeletonization: self.skeletonization,
            traced,
        })
    }
}

// ───────────────────────── Stage 4: Traced ───────────────────────────

/// Pipeline state after skeleton tracing.
///
/// Call [`simplify`](Self::simplify) to advance to the next stage.
#[must_use = "pipeline stages are consumed by advancing; call .simplify() to continue"]
pub struct Traced {
    context: Context,
    segmentation: Segmentation,
    skeletonization: Skeletonization,
    traced: Vec<TracedPath>,
}

impl Traced {
    /// The traced paths, in source-canvas coordinates.
    #[must_use]
    pub fn traced(&self) -> &[TracedPath] {
        &self.traced
    }

    /// Advance to the simplification stage.
    pub fn simplify(self) -> Simplified {
        let simplified = simplify_paths(&self.traced, self.context.config.simplify_tolerance);
        Simplified {
            context: self.context,
            segmentation: self.segmentation,
            skeletonization: self.skeletonization,
            traced: self.traced,
            simplified,
        }
    }
}

// ───────────────────────── Stage 5: Simplified ───────────────────────

/// Pipeline state after Douglas-Peucker simplification.
///
/// Call [`smooth`](Self::smooth) to advance to the next stage.
#[must_use = "pipeline stages are consumed by advancing; call .smooth() to continue"]
pub struct Simplified {
    context: Context,
    segmentation: Segmentation,
    skeletonization: Skeletonization,
    traced: Vec<TracedPath>,
    simplified: Vec<TracedPath>,
}

impl Simplified {
    /// The paths before simplification.
    #[must_use]
    pub fn traced(&self) -> &[TracedPath] {
        &self.traced
    }

    /// The simplified paths.
    #[must_use]
    pub fn simplified(&self) -> &[TracedPath] {
        &self.simplified
    }

    /// Advance to the curve fitting stage.
    pub fn smooth(self) -> Smoothed {
        let config = &self.context.config;
        let smoothing = smooth_paths(
            &self.simplified,
            SmoothParams {
                bezier: config.bezier_smoothing,
                level: config.smoothing,
                kind: config.curve_kind,
            },
        );
        Smoothed {
            context: self.context,
            segmentation: self.segmentation,
            skeletonization: self.skeletonization,
            simplified: self.simplified,
            smoothing,
        }
    }
}

// ───────────────────────── Stage 6: Smoothed ─────────────────────────

/// Final pipeline state.
///
/// Call [`into_result`](Self::into_result) to extract the output.
#[must_use = "call .into_result() to extract the output"]
pub struct Smoothed {
    context: Context,
    segmentation: Segmentation,
    skeletonization: Skeletonization,
    simplified: Vec<TracedPath>,
    smoothing: Smoothing,
}

impl Smoothed {
    /// The simplified paths the curves were fitted through.
    #[must_use]
    pub fn simplified(&self) -> &[TracedPath] {
        &self.simplified
    }

    /// Fitted command sequences and curve fallbacks.
    #[must_use]
    pub const fn smoothing(&self) -> &Smoothing {
        &self.smoothing
    }

    /// The source raster, for color sampling.
    #[must_use]
    pub const fn source(&self) -> &Raster {
        &self.context.source
    }

    /// Consume the pipeline and return the final result.
    pub fn into_result(self) -> VectorizeResult {
        debug!(
            "pipeline: {} paths from {} raster ({})",
            self.smoothing.paths.len(),
            self.context.source.dimensions(),
            self.skeletonization.algorithm,
        );
        VectorizeResult {
            paths: self.smoothing.paths,
            canvas: self.context.source.dimensions(),
            downsample: self.context.working.map(|(_, d)| d),
            color_info: self.segmentation.color_info,
            algorithm: self.skeletonization.algorithm,
            skeleton_fallbacks: self.skeletonization.fallbacks,
            curve_fallbacks: self.smoothing.fallbacks,
            warnings: self.context.warnings,
        }
    }
}

// ───────────────────── Pipeline entry point ──────────────────────────

/// Entry point for the incremental pipeline.
///
/// ```rust
/// # use centervec_pipeline::{Pipeline, Raster, VectorizeConfig};
/// let raster = Raster::from_gray(image::GrayImage::from_pixel(8, 8, image::Luma([255])));
/// let pending = Pipeline::new(raster, VectorizeConfig::default());
/// assert_eq!(pending.raster().dimensions().width, 8);
/// ```
pub struct Pipeline;

impl Pipeline {
    /// Create a new pipeline in the [`Pending`] state.
    ///
    /// No processing is performed; the raster and config are stored.
    pub const fn new(raster: Raster, config: VectorizeConfig) -> Pending {
        Pending { config, raster }
    }
}
