//! Pipeline diagnostics: timing, counts, and other metrics for each stage.
//!
//! This is the statistics side-channel of a run. It is never needed for
//! the correctness of the path data, but it reports which skeleton
//! algorithm was used, which fallbacks fired, the detected line colors,
//! and where the time went.
//!
//! Duration measurements use [`std::time::Duration`] (platform-agnostic).
//! Timestamps come from a caller-supplied [`Clock`]; [`SystemClock`] uses
//! the `web-time` crate, which uses `performance.now()` on WASM and
//! `std::time::Instant` on native.
//!
//! Durations are serialized as fractional seconds (`f64`) for JSON
//! compatibility, since `std::time::Duration` does not implement serde
//! traits.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::downsample::DownsampleFilter;
use crate::mask;
use crate::pipeline::{Pipeline, VectorizeResult};
use crate::raster::Raster;
use crate::segment::{BackgroundMode, ColorInfo, LineMethod, SegmentStatus};
use crate::skeleton::{Fallback, SkeletonAlgorithm};
use crate::smooth::{CurveFallback, CurveShape};
use crate::types::{Dimensions, PathCommand, PipelineError, TracedPath, VectorizeConfig};

/// Serde support for `std::time::Duration` as fractional seconds.
mod duration_serde {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    /// Serialize a `Duration` as fractional seconds (`f64`).
    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        duration.as_secs_f64().serialize(serializer)
    }

    /// Deserialize a `Duration` from fractional seconds (`f64`).
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(|_| {
            serde::de::Error::custom(
                "duration seconds must be finite, non-negative, and representable as a Duration",
            )
        })
    }
}

/// Source of monotonic timestamps for stage timing.
pub trait Clock {
    /// Opaque point in time.
    type Instant;

    /// The current time.
    fn now(&self) -> Self::Instant;

    /// Time elapsed since an earlier [`now`](Self::now).
    fn elapsed(&self, since: &Self::Instant) -> Duration;
}

/// [`Clock`] backed by [`web_time::Instant`].
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    type Instant = web_time::Instant;

    fn now(&self) -> Self::Instant {
        web_time::Instant::now()
    }

    fn elapsed(&self, since: &Self::Instant) -> Duration {
        since.elapsed()
    }
}

/// A recoverable condition met during a run.
///
/// None of these abort processing; the run still returns a valid
/// (possibly empty) result.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Warning {
    /// The raster exceeded the pixel budget and was processed smaller.
    Downsampled {
        /// Source canvas.
        original: Dimensions,
        /// Size actually processed.
        working: Dimensions,
    },
    /// Segmentation found no foreground.
    NoContent,
    /// Every skeleton algorithm came back empty for a non-empty line mask.
    EmptySkeleton,
    /// The skeleton was non-empty but every traced path was too short.
    NoPaths {
        /// The configured minimum arc length.
        min_path_length: f64,
    },
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Downsampled { original, working } => {
                write!(f, "downsampled {original} to {working} to fit the pixel budget")
            }
            Self::NoContent => f.write_str("no foreground content"),
            Self::EmptySkeleton => f.write_str("no skeleton could be extracted"),
            Self::NoPaths { min_path_length } => {
                write!(f, "every traced path was shorter than {min_path_length} px")
            }
        }
    }
}

/// Diagnostics collected from a single pipeline run.
///
/// Each field captures metrics for one logical stage of the pipeline.
/// The downsampling stage is `None` when the raster fit the budget.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineDiagnostics {
    /// Stage 1: fitting to the pixel budget (only when downsampled).
    pub downsample: Option<StageDiagnostics>,
    /// Stage 2: region segmentation.
    pub segment: StageDiagnostics,
    /// Stage 3: centerline extraction.
    pub skeleton: StageDiagnostics,
    /// Stage 4: skeleton tracing.
    pub trace: StageDiagnostics,
    /// Stage 5: Douglas-Peucker simplification.
    pub simplification: StageDiagnostics,
    /// Stage 6: curve fitting.
    pub smooth: StageDiagnostics,
    /// Total wall-clock duration of the entire pipeline (seconds).
    #[serde(with = "duration_serde")]
    pub total_duration: Duration,
    /// Summary counts across all stages.
    pub summary: PipelineSummary,
    /// Recoverable conditions, in the order they occurred.
    pub warnings: Vec<Warning>,
}

/// Diagnostics for a single pipeline stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageDiagnostics {
    /// Wall-clock duration of this stage (seconds).
    #[serde(with = "duration_serde")]
    pub duration: Duration,
    /// Stage-specific metrics (counts, sizes, etc.).
    pub metrics: StageMetrics,
}

/// Stage-specific metrics that vary by pipeline stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum StageMetrics {
    /// Pixel-budget downsampling metrics.
    Downsample {
        /// Source canvas.
        original: Dimensions,
        /// Size actually processed.
        working: Dimensions,
        /// Resampling filter used.
        filter: DownsampleFilter,
    },
    /// Region segmentation metrics.
    Segment {
        /// Background mode used.
        background: BackgroundMode,
        /// Line extraction method used.
        method: LineMethod,
        /// Whether any foreground was found.
        status: SegmentStatus,
        /// Pixels in the line mask.
        line_pixel_count: u64,
        /// Pixels in the fill mask.
        fill_pixel_count: u64,
        /// Dominant line colors.
        color_info: ColorInfo,
    },
    /// Centerline extraction metrics.
    Skeleton {
        /// Algorithm requested by the configuration.
        requested: SkeletonAlgorithm,
        /// Algorithm whose output was kept.
        used: SkeletonAlgorithm,
        /// Abandoned attempts.
        fallbacks: Vec<Fallback>,
        /// Pixels in the skeleton.
        skeleton_pixel_count: u64,
    },
    /// Skeleton tracing metrics.
    Trace {
        /// Minimum arc length for a path to be kept.
        min_path_length: f64,
        /// Paths kept.
        path_count: usize,
        /// Kept paths that are closed loops.
        closed_count: usize,
        /// Points across all kept paths.
        point_count: usize,
    },
    /// Path simplification metrics.
    Simplification {
        /// Douglas-Peucker tolerance in pixels.
        tolerance: f64,
        /// Number of paths simplified.
        path_count: usize,
        /// Total points before simplification.
        points_before: usize,
        /// Total points after simplification.
        points_after: usize,
        /// Reduction ratio: `1.0 - (after / before)`.
        reduction_ratio: f64,
    },
    /// Curve fitting metrics.
    Smooth {
        /// Shape asked for by the configuration.
        requested: CurveShape,
        /// Drawing commands emitted.
        command_count: usize,
        /// Of which curve commands.
        curve_count: usize,
        /// Paths fitted with a simpler shape.
        fallbacks: Vec<CurveFallback>,
    },
}

/// High-level summary counts for the entire pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineSummary {
    /// Source image width in pixels.
    pub image_width: u32,
    /// Source image height in pixels.
    pub image_height: u32,
    /// Total pixel count.
    pub pixel_count: u64,
    /// Skeleton algorithm whose output was used.
    pub algorithm: SkeletonAlgorithm,
    /// Paths in the result.
    pub path_count: usize,
    /// Drawing commands across all paths.
    pub command_count: usize,
}

impl PipelineDiagnostics {
    /// Format diagnostics as a human-readable report.
    #[must_use]
    pub fn report(&self) -> String {
        let mut lines = Vec::new();

        lines.push(format!("Pipeline Diagnostics Report\n{}", "=".repeat(60)));
        lines.push(format!(
            "Image: {}x{} ({} pixels)",
            self.summary.image_width, self.summary.image_height, self.summary.pixel_count,
        ));
        lines.push(format!(
            "Total duration: {:.3}ms",
            duration_ms(self.total_duration),
        ));
        lines.push(String::new());

        lines.push(format!(
            "{:<24} {:>10} {:>10}  {}",
            "Stage", "Duration", "% Total", "Details"
        ));
        lines.push("-".repeat(80));

        let total_ms = duration_ms(self.total_duration);

        let mut stages: Vec<(&str, &StageDiagnostics)> = Vec::new();
        if let Some(ref d) = self.downsample {
            stages.push(("Downsample", d));
        }
        stages.push(("Segment", &self.segment));
        stages.push(("Skeleton", &self.skeleton));
        stages.push(("Trace", &self.trace));
        stages.push(("Simplification", &self.simplification));
        stages.push(("Smooth", &self.smooth));

        for (name, diag) in &stages {
            let ms = duration_ms(diag.duration);
            let pct = if total_ms > 0.0 {
                ms / total_ms * 100.0
            } else {
                0.0
            };
            let details = format_metrics(&diag.metrics);
            lines.push(format!("{name:<24} {ms:>8.3}ms {pct:>9.1}%  {details}"));
        }

        lines.push(String::new());
        lines.push(format!(
            "Algorithm: {}  |  Paths: {}  |  Commands: {}",
            self.summary.algorithm, self.summary.path_count, self.summary.command_count,
        ));
        for warning in &self.warnings {
            lines.push(format!("Warning: {warning}"));
        }

        lines.join("\n")
    }
}

/// Convert a `Duration` to milliseconds as `f64`.
fn duration_ms(d: Duration) -> f64 {
    d.as_secs_f64() * 1000.0
}

/// Format stage metrics into a compact detail string.
fn format_metrics(metrics: &StageMetrics) -> String {
    match metrics {
        StageMetrics::Downsample {
            original,
            working,
            filter,
        } => format!("{original} -> {working} ({filter})"),
        StageMetrics::Segment {
            background,
            method,
            line_pixel_count,
            fill_pixel_count,
            color_info,
            ..
        } => {
            let colors = color_info
                .colors
                .iter()
                .map(|c| c.hex.as_str())
                .collect::<Vec<_>>()
                .join(",");
            format!(
                "{background}/{method} line={line_pixel_count} fill={fill_pixel_count} colors=[{colors}]"
            )
        }
        StageMetrics::Skeleton {
            used,
            fallbacks,
            skeleton_pixel_count,
            ..
        } => {
            let abandoned = fallbacks
                .iter()
                .map(|f| format!("{}: {}", f.algorithm, f.reason))
                .collect::<Vec<_>>();
            if abandoned.is_empty() {
                format!("{used} pixels={skeleton_pixel_count}")
            } else {
                format!(
                    "{used} pixels={skeleton_pixel_count} (fallback from {})",
                    abandoned.join("; ")
                )
            }
        }
        StageMetrics::Trace {
            min_path_length,
            path_count,
            closed_count,
            point_count,
        } => format!(
            "{path_count} paths ({closed_count} closed), {point_count} pts, min_len={min_path_length:.1}"
        ),
        StageMetrics::Simplification {
            tolerance,
            points_before,
            points_after,
            reduction_ratio,
            ..
        } => {
            format!(
                "tol={tolerance:.2} {points_before}->{points_after} pts ({:.1}% reduction)",
                reduction_ratio * 100.0,
            )
        }
        StageMetrics::Smooth {
            requested,
            command_count,
            curve_count,
            fallbacks,
        } => format!(
            "{requested} {command_count} cmds ({curve_count} curves), {} fallbacks",
            fallbacks.len()
        ),
    }
}

/// Total points across a slice of traced paths.
fn total_points(paths: &[TracedPath]) -> usize {
    paths.iter().map(|p| p.polyline.len()).sum()
}

/// Run the full pipeline, timing every stage.
///
/// # Errors
///
/// Propagates every [`Pipeline`] stage error.
pub fn process_with_diagnostics<C: Clock>(
    raster: Raster,
    config: &VectorizeConfig,
    clock: &C,
) -> Result<(VectorizeResult, PipelineDiagnostics), PipelineError> {
    let dimensions = raster.dimensions();
    let total_start = clock.now();

    let start = clock.now();
    let prepared = Pipeline::new(raster, config.clone()).downsample()?;
    let downsample = prepared.downsample().map(|d| StageDiagnostics {
        duration: clock.elapsed(&start),
        metrics: StageMetrics::Downsample {
            original: d.original,
            working: d.working,
            filter: config.downsample_filter,
        },
    });

    let start = clock.now();
    let segmented = prepared.segment()?;
    let segmentation = segmented.segmentation();
    let segment = StageDiagnostics {
        duration: clock.elapsed(&start),
        metrics: StageMetrics::Segment {
            background: config.segment.background,
            method: config.segment.method,
            status: segmentation.status,
            line_pixel_count: mask::count(&segmentation.line_mask),
            fill_pixel_count: mask::count(&segmentation.fill_mask),
            color_info: segmentation.color_info.clone(),
        },
    };

    let start = clock.now();
    let skeletonized = segmented.skeletonize();
    let skeletonization = skeletonized.skeletonization();
    let skeleton = StageDiagnostics {
        duration: clock.elapsed(&start),
        metrics: StageMetrics::Skeleton {
            requested: config.algorithm,
            used: skeletonization.algorithm,
            fallbacks: skeletonization.fallbacks.clone(),
            skeleton_pixel_count: mask::count(&skeletonization.skeleton),
        },
    };

    let start = clock.now();
    let traced = skeletonized.trace()?;
    let trace = StageDiagnostics {
        duration: clock.elapsed(&start),
        metrics: StageMetrics::Trace {
            min_path_length: config.min_path_length,
            path_count: traced.traced().len(),
            closed_count: traced.traced().iter().filter(|p| p.closed).count(),
            point_count: total_points(traced.traced()),
        },
    };

    let start = clock.now();
    let simplified = traced.simplify();
    let points_before = total_points(simplified.traced());
    let points_after = total_points(simplified.simplified());
    #[allow(clippy::cast_precision_loss)]
    let reduction_ratio = if points_before > 0 {
        1.0 - (points_after as f64 / points_before as f64)
    } else {
        0.0
    };
    let simplification = StageDiagnostics {
        duration: clock.elapsed(&start),
        metrics: StageMetrics::Simplification {
            tolerance: config.simplify_tolerance,
            path_count: simplified.simplified().len(),
            points_before,
            points_after,
            reduction_ratio,
        },
    };

    let start = clock.now();
    let smoothed = simplified.smooth();
    let commands = || smoothed.smoothing().paths.iter().flat_map(|p| &p.commands);
    let command_count = commands().count();
    let smooth = StageDiagnostics {
        duration: clock.elapsed(&start),
        metrics: StageMetrics::Smooth {
            requested: crate::smooth::SmoothParams {
                bezier: config.bezier_smoothing,
                level: config.smoothing,
                kind: config.curve_kind,
            }
            .requested_shape(),
            command_count,
            curve_count: commands()
                .filter(|c| matches!(c, PathCommand::CubicTo { .. } | PathCommand::QuadTo { .. }))
                .count(),
            fallbacks: smoothed.smoothing().fallbacks.clone(),
        },
    };

    let result = smoothed.into_result();
    let diagnostics = PipelineDiagnostics {
        downsample,
        segment,
        skeleton,
        trace,
        simplification,
        smooth,
        total_duration: clock.elapsed(&total_start),
        summary: PipelineSummary {
            image_width: dimensions.width,
            image_height: dimensions.height,
            pixel_count: dimensions.pixel_count(),
            algorithm: result.algorithm,
            path_count: result.paths.len(),
            command_count,
        },
        warnings: result.warnings.clone(),
    };

    Ok((result, diagnostics))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::cell::Cell;

    use super::*;

    /// Clock that advances one millisecond per reading.
    #[derive(Default)]
    struct StepClock {
        ticks: Cell<u64>,
    }

    impl Clock for StepClock {
        type Instant = u64;

        fn now(&self) -> u64 {
            let t = self.ticks.get();
            self.ticks.set(t + 1);
            t
        }

        fn elapsed(&self, since: &u64) -> Duration {
            Duration::from_millis(self.now() - since)
        }
    }

    fn stroke_raster() -> Raster {
        Raster::from_gray(image::GrayImage::from_fn(60, 40, |x, y| {
            if (10..=50).contains(&x) && y.abs_diff(20) <= 1 {
                image::Luma([0])
            } else {
                image::Luma([255])
            }
        }))
    }

    #[test]
    fn duration_ms_converts_correctly() {
        let d = Duration::from_millis(1234);
        let ms = duration_ms(d);
        assert!((ms - 1234.0).abs() < 0.01);
    }

    #[test]
    fn system_clock_is_monotonic() {
        let clock = SystemClock;
        let start = clock.now();
        assert!(clock.elapsed(&start) >= Duration::ZERO);
    }

    #[test]
    fn every_stage_is_timed_with_injected_clock() {
        let (result, diag) =
            process_with_diagnostics(stroke_raster(), &VectorizeConfig::default(), &StepClock::default())
                .unwrap();
        assert_eq!(result.paths.len(), 1);
        assert!(diag.downsample.is_none());
        // Each stage spans exactly one tick of the step clock.
        for stage in [&diag.segment, &diag.skeleton, &diag.trace, &diag.simplification, &diag.smooth] {
            assert_eq!(stage.duration, Duration::from_millis(1));
        }
        assert!(diag.total_duration > Duration::from_millis(5));
        assert_eq!(diag.summary.path_count, 1);
        assert_eq!(diag.summary.algorithm, SkeletonAlgorithm::Ridge);
        assert!(diag.warnings.is_empty());
    }

    #[test]
    fn fallback_reported_in_skeleton_metrics() {
        let config = VectorizeConfig {
            ridge_threshold: 1000.0,
            ..VectorizeConfig::default()
        };
        let (result, diag) = process_with_diagnostics(stroke_raster(), &config, &SystemClock).unwrap();
        assert_eq!(result.algorithm, SkeletonAlgorithm::Skeleton);
        let StageMetrics::Skeleton { used, fallbacks, .. } = &diag.skeleton.metrics else {
            unreachable!("skeleton stage reports skeleton metrics");
        };
        assert_eq!(*used, SkeletonAlgorithm::Skeleton);
        assert_eq!(fallbacks.len(), 1);
        assert!(diag.report().contains("fallback from ridge"));
    }

    #[test]
    fn diagnostics_serialize_durations_as_seconds() {
        let (_, diag) =
            process_with_diagnostics(stroke_raster(), &VectorizeConfig::default(), &StepClock::default())
                .unwrap();
        let json = serde_json::to_value(&diag).unwrap();
        assert!((json["segment"]["duration"].as_f64().unwrap() - 0.001).abs() < 1e-12);
        let back: PipelineDiagnostics = serde_json::from_value(json).unwrap();
        assert_eq!(back.segment.duration, Duration::from_millis(1));
    }

    #[test]
    fn report_lists_stages_and_warnings() {
        let blank = Raster::from_gray(image::GrayImage::from_pixel(20, 20, image::Luma([255])));
        let (_, diag) =
            process_with_diagnostics(blank, &VectorizeConfig::default(), &StepClock::default()).unwrap();
        let report = diag.report();
        assert!(report.contains("Pipeline Diagnostics Report"));
        assert!(report.contains("Segment"));
        assert!(report.contains("Smooth"));
        assert!(report.contains("Warning: no foreground content"));
    }
}
