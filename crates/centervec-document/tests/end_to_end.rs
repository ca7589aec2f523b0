//! Integration tests: raster → pipeline → document → SVG → post-processing.

#![allow(clippy::unwrap_used, clippy::panic)]

use centervec_document::{
    AssembleOptions, DedupeOptions, Paint, ReorderOptions, Rgba, SortMode, assemble_result,
    dedupe, from_svg, reorder, to_svg,
};
use centervec_pipeline::{PathCommand, Raster, VectorizeConfig, process};

/// Black strokes on white: a horizontal bar, a ring, and a short vertical bar.
fn drawing() -> image::GrayImage {
    image::GrayImage::from_fn(160, 120, |x, y| {
        let bar = (10..=90).contains(&x) && y.abs_diff(20) <= 1;
        let r = (f64::from(x) - 110.0).hypot(f64::from(y) - 70.0);
        let ring = (20.0..=23.0).contains(&r);
        let post = x.abs_diff(30) <= 1 && (50..=110).contains(&y);
        if bar || ring || post {
            image::Luma([0])
        } else {
            image::Luma([255])
        }
    })
}

fn vectorize() -> (centervec_pipeline::VectorizeResult, Raster) {
    let raster = Raster::from_gray(drawing());
    let result = process(raster.clone(), &VectorizeConfig::default()).unwrap();
    (result, raster)
}

fn endpoint(command: &PathCommand) -> Option<(f64, f64)> {
    match *command {
        PathCommand::MoveTo(p) | PathCommand::LineTo(p) => Some((p.x, p.y)),
        PathCommand::QuadTo { to, .. } | PathCommand::CubicTo { to, .. } => Some((to.x, to.y)),
        PathCommand::HorizontalTo(x) => Some((x, f64::NAN)),
        PathCommand::VerticalTo(y) => Some((f64::NAN, y)),
        PathCommand::Close => None,
    }
}

fn close_enough(a: f64, b: f64) -> bool {
    (a.is_nan() && b.is_nan()) || (a - b).abs() <= 0.005
}

#[test]
fn pipeline_output_survives_svg_round_trip() {
    let (result, raster) = vectorize();
    assert_eq!(result.paths.len(), 3, "{:?}", result.warnings);

    let options = AssembleOptions {
        created: Some("2026-10-16T12:00:00Z".into()),
        parameters: Some(serde_json::to_value(VectorizeConfig::default()).unwrap()),
        ..AssembleOptions::default()
    };
    let doc = assemble_result(&result, &options, Some(&raster));
    let text = to_svg(&doc);
    let parsed = from_svg(&text).unwrap();

    assert_eq!(parsed.canvas, doc.canvas);
    assert_eq!(parsed.metadata, doc.metadata);
    assert_eq!(parsed.len(), doc.len());
    for (a, b) in doc.paths().iter().zip(parsed.paths()) {
        assert_eq!(a.id, b.id);
        assert_eq!(a.style, b.style);
        assert_eq!(a.commands.len(), b.commands.len());
        for (ca, cb) in a.commands.iter().zip(&b.commands) {
            assert_eq!(std::mem::discriminant(ca), std::mem::discriminant(cb));
            match (endpoint(ca), endpoint(cb)) {
                (Some((ax, ay)), Some((bx, by))) => {
                    assert!(close_enough(ax, bx) && close_enough(ay, by), "{ca:?} vs {cb:?}");
                }
                (None, None) => {}
                other => panic!("endpoint mismatch {other:?}"),
            }
        }
    }

    // Canonical: a parsed document re-serializes to the same bytes.
    assert_eq!(to_svg(&parsed), text);
}

#[test]
fn ring_is_closed_in_document() {
    let (result, _) = vectorize();
    let doc = assemble_result(&result, &AssembleOptions::default(), None);
    let closed = doc
        .paths()
        .iter()
        .filter(|p| p.commands.last() == Some(&PathCommand::Close))
        .count();
    assert_eq!(closed, 1);
}

#[test]
fn preserved_colors_come_from_source() {
    let raster = Raster::from_rgb(image::RgbImage::from_fn(100, 100, |x, y| {
        if (10..=90).contains(&x) && y.abs_diff(50) <= 1 {
            image::Rgb([180, 20, 20])
        } else {
            image::Rgb([255, 255, 255])
        }
    }));
    let result = process(raster.clone(), &VectorizeConfig::default()).unwrap();
    let options = AssembleOptions {
        preserve_colors: true,
        ..AssembleOptions::default()
    };
    let doc = assemble_result(&result, &options, Some(&raster));
    assert_eq!(doc.len(), 1);
    assert_eq!(
        doc.paths()[0].style.stroke,
        Some(Paint::Color(Rgba::opaque([180, 20, 20])))
    );
}

#[test]
fn duplicated_document_dedupes_back() {
    let (result, _) = vectorize();
    let doubled: Vec<_> = result.paths.iter().chain(&result.paths).cloned().collect();
    let mut doc = centervec_document::assemble(
        &doubled,
        result.canvas,
        &AssembleOptions::default(),
        None,
    );
    let report = dedupe(&mut doc, &DedupeOptions::default());
    assert_eq!(report.exact_removed, 3);
    assert_eq!(report.removed_ids, vec!["path3", "path4", "path5"]);
    assert_eq!(doc.len(), 3);

    let again = dedupe(&mut doc, &DedupeOptions::default());
    assert!(again.removed_ids.is_empty());
}

#[test]
fn reorder_loaded_document() {
    let (result, _) = vectorize();
    let doc = assemble_result(&result, &AssembleOptions::default(), None);
    let mut loaded = from_svg(&to_svg(&doc)).unwrap();

    let report = reorder(
        &mut loaded,
        &ReorderOptions {
            mode: SortMode::AreaDesc,
            ..ReorderOptions::default()
        },
    );
    assert_eq!(report.total_paths, 3);
    // The ring encloses by far the largest area.
    let ring_id = doc
        .paths()
        .iter()
        .find(|p| p.commands.last() == Some(&PathCommand::Close))
        .map(|p| p.id.clone())
        .unwrap();
    assert_eq!(report.paths[0].old_id, ring_id);
    let ids: Vec<&str> = loaded.paths().iter().map(|p| p.id.as_str()).collect();
    assert_eq!(ids, ["path0", "path1", "path2"]);
}
