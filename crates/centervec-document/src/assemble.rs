//! Turn pipeline output into a [`VectorDocument`].

use log::debug;
use serde::{Deserialize, Serialize};

use centervec_pipeline::{CurvePathData, Dimensions, Raster, VectorizeResult};

use crate::document::{
    CurvePath, DocumentMetadata, LineCap, LineJoin, Paint, PathStyle, Rgba, VectorDocument,
    path_id,
};

/// Generator tag written into document metadata.
pub const GENERATOR: &str = concat!("centervec ", env!("CARGO_PKG_VERSION"));

/// Style applied to every assembled path unless overridden per path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StyleDefaults {
    /// Stroke color.
    pub stroke: Rgba,
    /// Stroke width in canvas units.
    pub stroke_width: f64,
    /// Fill paint.
    pub fill: Paint,
    /// End cap shape.
    pub stroke_linecap: LineCap,
    /// Corner join shape.
    pub stroke_linejoin: LineJoin,
}

impl StyleDefaults {
    /// Default stroke width.
    pub const DEFAULT_STROKE_WIDTH: f64 = 2.0;
}

impl Default for StyleDefaults {
    fn default() -> Self {
        Self {
            stroke: Rgba::BLACK,
            stroke_width: Self::DEFAULT_STROKE_WIDTH,
            fill: Paint::None,
            stroke_linecap: LineCap::Round,
            stroke_linejoin: LineJoin::Round,
        }
    }
}

/// How pipeline paths become document paths.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssembleOptions {
    /// Base style.
    pub style: StyleDefaults,
    /// Stroke each path with the source color under its middle point.
    pub preserve_colors: bool,
    /// Stroke width = twice the mean traced half-width.
    pub width_from_distance: bool,
    /// Class names given to every path.
    pub classes: Vec<String>,
    /// Creation timestamp to record. Left to the caller so assembly
    /// stays deterministic.
    pub created: Option<String>,
    /// Creation parameters to echo into the metadata.
    pub parameters: Option<serde_json::Value>,
}

/// Build a document from fitted paths.
///
/// Paths get ids `path0`, `path1`, … in input order. `source` is only
/// consulted when [`AssembleOptions::preserve_colors`] is set; without it
/// every path uses the default stroke.
#[must_use]
pub fn assemble(
    paths: &[CurvePathData],
    canvas: Dimensions,
    options: &AssembleOptions,
    source: Option<&Raster>,
) -> VectorDocument {
    if options.preserve_colors && source.is_none() {
        debug!("assemble: preserve_colors set without a source raster, using default stroke");
    }

    let mut doc = VectorDocument::new(canvas);
    doc.metadata = DocumentMetadata {
        created: options.created.clone(),
        generator: Some(GENERATOR.to_string()),
        parameters: options.parameters.clone(),
    };
    doc.paths = paths
        .iter()
        .enumerate()
        .map(|(index, data)| CurvePath {
            classes: options.classes.clone(),
            style: path_style(data, options, source),
            ..CurvePath::new(path_id(index), data.commands.clone())
        })
        .collect();
    doc
}

/// Build a document from a whole pipeline result.
#[must_use]
pub fn assemble_result(
    result: &VectorizeResult,
    options: &AssembleOptions,
    source: Option<&Raster>,
) -> VectorDocument {
    assemble(&result.paths, result.canvas, options, source)
}

fn path_style(data: &CurvePathData, options: &AssembleOptions, source: Option<&Raster>) -> PathStyle {
    let defaults = &options.style;

    let stroke = source
        .filter(|_| options.preserve_colors)
        .and_then(|raster| data.source.middle_point().and_then(|p| raster.sample_rgb(p)))
        .map_or(defaults.stroke, Rgba::opaque);

    let traced_width = 2.0 * data.source.mean_width();
    let stroke_width = if options.width_from_distance && traced_width > 0.0 {
        traced_width
    } else {
        defaults.stroke_width
    };

    PathStyle {
        stroke: Some(Paint::Color(stroke)),
        stroke_width: Some(stroke_width),
        fill: Some(defaults.fill),
        fill_rule: None,
        opacity: None,
        stroke_linecap: Some(defaults.stroke_linecap),
        stroke_linejoin: Some(defaults.stroke_linejoin),
    }
}
