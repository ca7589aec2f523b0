//! centervec-document: Vector path documents (sans-IO)
//!
//! Holds centerline output as an ordered, styled, identified set of
//! paths. Covers assembly from pipeline results, canonical SVG
//! serialization and tolerant parsing, selector-based style patches, and
//! post-processing (duplicate removal and geometric reordering) that can
//! run on any loaded document.

pub mod assemble;
pub mod dedupe;
pub mod document;
pub mod path_data;
pub mod reorder;
pub mod select;
pub mod svg;

pub use assemble::{AssembleOptions, GENERATOR, StyleDefaults, assemble, assemble_result};
pub use dedupe::{DedupeOptions, DedupeReport, dedupe};
pub use document::{
    CurvePath, DocumentError, DocumentMetadata, FillRule, LineCap, LineJoin, Paint, PathStyle,
    Rgba, VectorDocument,
};
pub use reorder::{
    AreaMeasure, ReorderEntry, ReorderOptions, ReorderReport, SortMode, path_stats, reorder,
};
pub use select::{Selector, StylePatch, apply_patch, restyle, select};
pub use self::svg::{from_svg, to_svg};
