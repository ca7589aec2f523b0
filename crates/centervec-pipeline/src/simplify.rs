//! Path simplification using the Douglas-Peucker algorithm.
//!
//! Reduces point count in polylines by removing points that are within
//! a given tolerance of the chord between the kept points around them.
//! Distances are measured to the chord *segment*, so every removed point
//! lies within `tolerance` of the simplified polyline.
//!
//! The split point is the first point of maximal distance, which makes
//! simplification idempotent: the points kept on the first pass are
//! exactly the ones a second pass would pick again.

use crate::types::{Point, Polyline, TracedPath};

/// Simplify a single polyline using the Douglas-Peucker algorithm.
///
/// Points within `tolerance` pixels of the chord between their kept
/// neighbors are removed. Endpoints are always kept. A tolerance of `0.0`
/// (or less) preserves all points.
#[must_use = "returns the simplified polyline"]
pub fn simplify(polyline: &Polyline, tolerance: f64) -> Polyline {
    let points = polyline.points();
    let kept = kept_indices(points, tolerance);
    Polyline::new(kept.iter().map(|&i| points[i]).collect())
}

/// Simplify a traced path, keeping the width samples of surviving points.
///
/// Closed paths are simplified as a loop through their first point, which
/// is always kept.
#[must_use = "returns the simplified path"]
pub fn simplify_path(path: &TracedPath, tolerance: f64) -> TracedPath {
    let points = path.polyline.points();
    let kept = if path.closed && !points.is_empty() {
        let mut looped = points.to_vec();
        looped.push(points[0]);
        let mut kept = kept_indices(&looped, tolerance);
        kept.pop();
        kept
    } else {
        kept_indices(points, tolerance)
    };

    TracedPath {
        polyline: Polyline::new(kept.iter().map(|&i| points[i]).collect()),
        widths: kept
            .iter()
            .filter_map(|&i| path.widths.get(i).copied())
            .collect(),
        closed: path.closed,
    }
}

/// Simplify multiple paths, applying Douglas-Peucker to each independently.
#[must_use = "returns the simplified paths"]
pub fn simplify_paths(paths: &[TracedPath], tolerance: f64) -> Vec<TracedPath> {
    paths.iter().map(|p| simplify_path(p, tolerance)).collect()
}

/// Indices of the points Douglas-Peucker keeps, in order.
fn kept_indices(points: &[Point], tolerance: f64) -> Vec<usize> {
    if points.len() < 3 || tolerance <= 0.0 {
        return (0..points.len()).collect();
    }

    let mut kept = vec![false; points.len()];
    kept[0] = true;
    kept[points.len() - 1] = true;

    dp_recurse(points, 0, points.len() - 1, tolerance, &mut kept);

    kept.iter()
        .enumerate()
        .filter_map(|(i, &k)| k.then_some(i))
        .collect()
}

/// Recursive step of the Douglas-Peucker algorithm.
///
/// Finds the point between `start` and `end` that is farthest from the
/// segment between them. If that distance exceeds `tolerance`, the point
/// is kept and both sub-segments are processed recursively.
fn dp_recurse(points: &[Point], start: usize, end: usize, tolerance: f64, kept: &mut [bool]) {
    if end <= start + 1 {
        return;
    }

    let mut max_dist = 0.0;
    let mut max_idx = start;

    for i in (start + 1)..end {
        let d = segment_distance(points[i], points[start], points[end]);
        if d > max_dist {
            max_dist = d;
            max_idx = i;
        }
    }

    if max_dist > tolerance {
        kept[max_idx] = true;
        dp_recurse(points, start, max_idx, tolerance, kept);
        dp_recurse(points, max_idx, end, tolerance, kept);
    }
}

/// Distance from point `p` to the segment from `a` to `b`.
///
/// When `a` and `b` coincide, returns the distance from `p` to `a`.
#[must_use]
pub fn segment_distance(p: Point, a: Point, b: Point) -> f64 {
    let dx = b.x - a.x;
    let dy = b.y - a.y;
    let length_sq = dx.mul_add(dx, dy * dy);

    if length_sq <= 0.0 {
        return p.distance(a);
    }

    let t = ((p.x - a.x).mul_add(dx, (p.y - a.y) * dy) / length_sq).clamp(0.0, 1.0);
    p.distance(a.lerp(b, t))
}
