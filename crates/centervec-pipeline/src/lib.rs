//! centervec-pipeline: Pure centerline vectorization pipeline (sans-IO).
//!
//! Converts raster line art into centerline curve paths through:
//! pixel-budget fit -> region segmentation -> skeleton extraction ->
//! graph tracing -> simplification -> curve fitting.
//!
//! This crate has **no I/O dependencies** -- it operates on in-memory
//! images and returns structured data. Document assembly and SVG
//! serialization live in `centervec-document`; file access lives in the
//! `centervec` binary.

pub mod diagnostics;
pub mod distance;
pub mod downsample;
pub mod edge;
pub mod graph;
pub mod mask;
pub mod pipeline;
pub mod raster;
pub mod segment;
pub mod simplify;
pub mod skeleton;
pub mod smooth;
pub mod trace;
pub mod types;

pub use diagnostics::{Clock, PipelineDiagnostics, SystemClock, Warning, process_with_diagnostics};
pub use downsample::{Downsample, DownsampleFilter};
pub use pipeline::{Pipeline, VectorizeResult};
pub use raster::Raster;
pub use segment::{
    BackgroundMode, ColorInfo, ColorSample, FillHandling, LineMethod, SegmentConfig,
    SegmentStatus,
};
pub use skeleton::{CenterlineExtractor, Fallback, FallbackReason, SkeletonAlgorithm};
pub use smooth::{CurveFallback, CurveKind, CurveShape};
pub use types::{
    CurvePathData, Dimensions, PathCommand, PipelineError, Point, Polyline, TracedPath,
    VectorizeConfig,
};

/// Run the full vectorization pipeline.
///
/// Empty results are not errors: an image without line content yields a
/// [`VectorizeResult`] with no paths and a [`Warning`] explaining why.
///
/// # Pipeline steps
///
/// 1. Validate the configuration and fit the raster to `max_pixels`
/// 2. Segment into line and fill masks
/// 3. Extract the centerline (with algorithm fallback)
/// 4. Trace the skeleton graph into paths
/// 5. Douglas-Peucker simplification
/// 6. Curve fitting
///
/// # Errors
///
/// Returns [`PipelineError::InvalidConfig`] for out-of-range parameters
/// and [`PipelineError::ResourceExhausted`] if the raster cannot be
/// brought under the pixel budget.
pub fn process(raster: Raster, config: &VectorizeConfig) -> Result<VectorizeResult, PipelineError> {
    Ok(Pipeline::new(raster, config.clone())
        .downsample()?
        .segment()?
        .skeletonize()
        .trace()?
        .simplify()
        .smooth()
        .into_result())
}

/// Decode `image_bytes` and run [`process`].
///
/// # Errors
///
/// Returns [`PipelineError::EmptyInput`] if `image_bytes` is empty and
/// [`PipelineError::ImageDecode`] if the format is unrecognized, plus
/// every [`process`] error.
pub fn process_bytes(
    image_bytes: &[u8],
    config: &VectorizeConfig,
) -> Result<VectorizeResult, PipelineError> {
    process(Raster::from_bytes(image_bytes)?, config)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn encode_png(img: &image::GrayImage) -> Vec<u8> {
        let mut buf = Vec::new();
        let encoder = image::codecs::png::PngEncoder::new(&mut buf);
        image::ImageEncoder::write_image(
            encoder,
            img.as_raw(),
            img.width(),
            img.height(),
            image::ExtendedColorType::L8,
        )
        .unwrap();
        buf
    }

    /// Black-on-white 100x100 image drawn by `on`.
    fn drawing(on: impl Fn(u32, u32) -> bool) -> image::GrayImage {
        image::GrayImage::from_fn(100, 100, |x, y| {
            if on(x, y) {
                image::Luma([0])
            } else {
                image::Luma([255])
            }
        })
    }

    fn horizontal_stroke(width: u32) -> image::GrayImage {
        let half = width / 2;
        drawing(|x, y| (10..=90).contains(&x) && y.abs_diff(50) <= half)
    }

    #[test]
    fn process_empty_input() {
        let result = process_bytes(&[], &VectorizeConfig::default());
        assert!(matches!(result, Err(PipelineError::EmptyInput)));
    }

    #[test]
    fn process_corrupt_input() {
        let result = process_bytes(&[0xFF, 0x00], &VectorizeConfig::default());
        assert!(matches!(result, Err(PipelineError::ImageDecode(_))));
    }

    #[test]
    fn process_uniform_image_is_empty_not_error() {
        let png = encode_png(&image::GrayImage::from_pixel(20, 20, image::Luma([128])));
        let result = process_bytes(&png, &VectorizeConfig::default()).unwrap();
        assert!(result.paths.is_empty());
        assert_eq!(result.warnings, vec![Warning::NoContent]);
    }

    #[test]
    fn horizontal_stroke_end_to_end() {
        let config = VectorizeConfig {
            algorithm: SkeletonAlgorithm::Ridge,
            min_path_length: 10.0,
            simplify_tolerance: 1.0,
            ..VectorizeConfig::default()
        };
        let png = encode_png(&horizontal_stroke(3));
        let result = process_bytes(&png, &config).unwrap();

        assert_eq!(result.paths.len(), 1);
        let path = &result.paths[0].source;
        assert!(!path.closed);
        let first = *path.polyline.first().unwrap();
        let last = *path.polyline.last().unwrap();
        assert!(first.distance(Point::new(10.0, 50.0)) <= 1.5, "start {first:?}");
        assert!(last.distance(Point::new(90.0, 50.0)) <= 1.5, "end {last:?}");
        let middle = path.middle_point().unwrap();
        assert!((middle.y - 50.0).abs() < 1.0, "middle {middle:?}");
    }

    #[test]
    fn stroke_width_does_not_move_centerline() {
        for width in [1, 3, 5] {
            let result = process(
                Raster::from_gray(horizontal_stroke(width)),
                &VectorizeConfig::default(),
            )
            .unwrap();
            assert_eq!(result.paths.len(), 1, "width {width}");
            for p in result.paths[0].source.polyline.points() {
                assert!((p.y - 50.0).abs() < f64::EPSILON, "width {width}: {p:?}");
            }
        }
    }

    #[test]
    fn ring_becomes_one_closed_path() {
        let ring = drawing(|x, y| {
            let r = (f64::from(x) - 50.0).hypot(f64::from(y) - 50.0);
            (20.0..=23.0).contains(&r)
        });
        let result = process(Raster::from_gray(ring), &VectorizeConfig::default()).unwrap();
        assert_eq!(result.paths.len(), 1);
        assert!(result.paths[0].source.closed);
        assert_eq!(result.paths[0].commands.last(), Some(&PathCommand::Close));
    }

    #[test]
    fn t_junction_keeps_crossbar_straight() {
        let tee = drawing(|x, y| {
            ((10..=90).contains(&x) && (29..=31).contains(&y))
                || ((49..=51).contains(&x) && (30..=80).contains(&y))
        });
        let result = process(Raster::from_gray(tee), &VectorizeConfig::default()).unwrap();
        assert_eq!(result.paths.len(), 2);

        let bar = &result.paths[0].source;
        assert_eq!(bar.polyline.first(), Some(&Point::new(11.0, 30.0)));
        assert_eq!(bar.polyline.last(), Some(&Point::new(89.0, 30.0)));

        let stem = &result.paths[1].source;
        assert!(stem.polyline.points().iter().all(|p| (p.x - 50.0).abs() < f64::EPSILON));
    }

    #[test]
    fn every_algorithm_vectorizes_a_stroke() {
        for algorithm in SkeletonAlgorithm::PRECEDENCE {
            let config = VectorizeConfig {
                algorithm,
                ..VectorizeConfig::default()
            };
            let result = process(Raster::from_gray(horizontal_stroke(5)), &config).unwrap();
            assert!(!result.paths.is_empty(), "{algorithm} produced nothing");
        }
    }

    #[test]
    fn result_serializes_to_json() {
        let result = process(
            Raster::from_gray(horizontal_stroke(3)),
            &VectorizeConfig::default(),
        )
        .unwrap();
        let json = serde_json::to_string(&result).unwrap();
        let back: VectorizeResult = serde_json::from_str(&json).unwrap();
        assert_eq!(result, back);
    }
}
