//! Skeleton tracing: turn the skeleton graph into ordered polylines.
//!
//! Paths start from endpoints in raster order, then from junctions that
//! still have untraced branches, then from node-free loops. When a path
//! reaches a junction it continues along the untraced branch that bends
//! least relative to the incoming direction, as long as the bend is at
//! most 90 degrees. Equal bends are broken by the branch's first step in
//! [`NEIGHBOR_OFFSETS`](crate::graph::NEIGHBOR_OFFSETS) order.
//!
//! Every branch is traced exactly once, so cyclic skeletons terminate.

use std::collections::{HashMap, HashSet};
use std::f64::consts::FRAC_PI_2;

use log::debug;
use petgraph::graph::{EdgeIndex, NodeIndex};

use crate::graph::{NodeKind, Pixel, SkeletonGraph, offset_index};
use crate::mask::Mask;
use crate::types::{
    Dimensions, DistanceField, PipelineError, Point, Polyline, TracedPath, ensure_same_dimensions,
};

/// Pixels used to estimate a local tangent.
const TANGENT_SPAN: usize = 5;

/// Largest bend (radians) a path may take through a junction.
const MAX_TURN: f64 = FRAC_PI_2;

/// Angle comparisons closer than this are ties.
const ANGLE_EPSILON: f64 = 1e-9;

/// Trace a skeleton into polylines tagged with per-point distance values.
///
/// Paths whose arc length is below `min_path_length` are discarded.
///
/// # Errors
///
/// Returns [`PipelineError::DimensionMismatch`] if `field` and `skeleton`
/// differ in size.
pub fn trace(
    skeleton: &Mask,
    field: &DistanceField,
    min_path_length: f64,
) -> Result<Vec<TracedPath>, PipelineError> {
    ensure_same_dimensions(Dimensions::of(skeleton), Dimensions::of(field))?;

    let graph = SkeletonGraph::build(skeleton);
    let mut tracer = Tracer::new(&graph);

    let starts = graph
        .nodes_of_kind(NodeKind::Endpoint)
        .into_iter()
        .chain(graph.nodes_of_kind(NodeKind::Junction));
    let mut chains: Vec<Vec<Pixel>> = Vec::new();
    for start in starts {
        while let Some(chain) = tracer.trace_from(start) {
            chains.push(chain);
        }
    }
    chains.extend(graph.loops().iter().map(|cycle| {
        let mut closed = cycle.clone();
        if let Some(&first) = cycle.first() {
            closed.push(first);
        }
        closed
    }));

    let total = chains.len();
    let paths: Vec<TracedPath> = chains
        .into_iter()
        .filter_map(|chain| to_traced_path(chain, field))
        .filter(|path| path.arc_length() >= min_path_length)
        .collect();
    debug!(
        "trace: {} of {total} paths at least {min_path_length} px long",
        paths.len()
    );
    Ok(paths)
}

struct Tracer<'a> {
    graph: &'a SkeletonGraph,
    node_at: HashMap<Pixel, NodeIndex>,
    used: HashSet<EdgeIndex>,
}

impl<'a> Tracer<'a> {
    fn new(graph: &'a SkeletonGraph) -> Self {
        let node_at = graph
            .graph()
            .node_indices()
            .map(|n| (graph.graph()[n].pixel, n))
            .collect();
        Self {
            graph,
            node_at,
            used: HashSet::new(),
        }
    }

    /// Untraced branches leaving `node`.
    fn open_branches(&self, node: NodeIndex) -> Vec<(EdgeIndex, Vec<Pixel>)> {
        self.graph
            .outgoing(node)
            .into_iter()
            .filter(|(edge, _)| !self.used.contains(edge))
            .collect()
    }

    /// Trace one path from `start`, or `None` once all its branches are done.
    fn trace_from(&mut self, start: NodeIndex) -> Option<Vec<Pixel>> {
        let (edge, first) = self
            .open_branches(start)
            .into_iter()
            .min_by_key(|(_, chain)| first_step(chain))?;
        self.used.insert(edge);
        let mut pixels = first;

        loop {
            let Some(&end) = pixels.last() else { break };
            let Some(&at) = self.node_at.get(&end) else { break };
            if self.graph.graph()[at].kind != NodeKind::Junction {
                break;
            }
            let incoming = tangent_back(&pixels);
            let Some((edge, chain)) = self.best_continuation(at, incoming) else {
                break;
            };
            self.used.insert(edge);
            pixels.extend_from_slice(&chain[1..]);
        }
        Some(pixels)
    }

    /// The untraced branch at `junction` with the smallest bend from
    /// `incoming`, if that bend is at most [`MAX_TURN`].
    fn best_continuation(
        &self,
        junction: NodeIndex,
        incoming: (f64, f64),
    ) -> Option<(EdgeIndex, Vec<Pixel>)> {
        let mut best: Option<(f64, usize, EdgeIndex, Vec<Pixel>)> = None;
        for (edge, chain) in self.open_branches(junction) {
            let turn = angle_between(incoming, tangent_forward(&chain));
            let step = first_step(&chain);
            let better = best.as_ref().is_none_or(|(best_turn, best_step, _, _)| {
                turn < best_turn - ANGLE_EPSILON
                    || ((turn - best_turn).abs() <= ANGLE_EPSILON && step < *best_step)
            });
            if better {
                best = Some((turn, step, edge, chain));
            }
        }
        best.filter(|(turn, ..)| *turn <= MAX_TURN + ANGLE_EPSILON)
            .map(|(_, _, edge, chain)| (edge, chain))
    }
}

fn first_step(chain: &[Pixel]) -> usize {
    match chain {
        [a, b, ..] => offset_index(*a, *b),
        _ => usize::MAX,
    }
}

fn delta(from: Pixel, to: Pixel) -> (f64, f64) {
    (
        f64::from(to.0) - f64::from(from.0),
        f64::from(to.1) - f64::from(from.1),
    )
}

/// Direction of travel over the last few pixels of `pixels`.
fn tangent_back(pixels: &[Pixel]) -> (f64, f64) {
    let n = pixels.len();
    if n < 2 {
        return (0.0, 0.0);
    }
    let span = TANGENT_SPAN.min(n - 1);
    delta(pixels[n - 1 - span], pixels[n - 1])
}

/// Direction of departure over the first few pixels of `chain`.
fn tangent_forward(chain: &[Pixel]) -> (f64, f64) {
    if chain.len() < 2 {
        return (0.0, 0.0);
    }
    let span = TANGENT_SPAN.min(chain.len() - 1);
    delta(chain[0], chain[span])
}

/// Unsigned angle between two vectors; `PI` when either is zero.
fn angle_between(a: (f64, f64), b: (f64, f64)) -> f64 {
    let norms = a.0.hypot(a.1) * b.0.hypot(b.1);
    if norms <= f64::EPSILON {
        return std::f64::consts::PI;
    }
    (a.0.mul_add(b.0, a.1 * b.1) / norms).clamp(-1.0, 1.0).acos()
}

/// Convert a pixel chain into a [`TracedPath`].
///
/// A chain that returns to its first pixel is closed; the repeated pixel
/// is dropped. Chains with fewer than two distinct pixels yield `None`.
fn to_traced_path(mut chain: Vec<Pixel>, field: &DistanceField) -> Option<TracedPath> {
    let closed = chain.len() > 3 && chain.first() == chain.last();
    if closed {
        chain.pop();
    }
    if chain.len() < 2 {
        return None;
    }
    let widths = chain
        .iter()
        .map(|&(x, y)| field.get_pixel(x, y).0[0])
        .collect();
    let points = chain
        .iter()
        .map(|&(x, y)| Point::new(f64::from(x), f64::from(y)))
        .collect();
    Some(TracedPath {
        polyline: Polyline::new(points),
        widths,
        closed,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::mask;

    fn unit_field(skeleton: &Mask) -> DistanceField {
        DistanceField::from_fn(skeleton.width(), skeleton.height(), |x, y| {
            image::Luma([if mask::is_on(skeleton, x, y) { 1.0 } else { 0.0 }])
        })
    }

    fn trace_mask(skeleton: &Mask, min_len: f64) -> Vec<TracedPath> {
        trace(skeleton, &unit_field(skeleton), min_len).unwrap()
    }

    fn endpoints(path: &TracedPath) -> (Point, Point) {
        (*path.polyline.first().unwrap(), *path.polyline.last().unwrap())
    }

    #[test]
    fn straight_line_yields_one_open_path() {
        let length = 50;
        let m = mask::from_predicate(80, 20, |x, y| y == 10 && (10..10 + length).contains(&x));
        let paths = trace_mask(&m, 10.0);
        assert_eq!(paths.len(), 1);
        let path = &paths[0];
        assert!(!path.closed);
        assert!((path.arc_length() - f64::from(length)).abs() <= 1.0);
        assert_eq!(
            endpoints(path),
            (Point::new(10.0, 10.0), Point::new(59.0, 10.0))
        );
    }

    #[test]
    fn isolated_loop_yields_one_closed_path() {
        let m = mask::from_predicate(30, 20, |x, y| {
            let on_rows = (y == 3 || y == 12) && (5..=20).contains(&x);
            let on_cols = (x == 5 || x == 20) && (3..=12).contains(&y);
            on_rows || on_cols
        });
        let paths = trace_mask(&m, 10.0);
        assert_eq!(paths.len(), 1);
        let path = &paths[0];
        assert!(path.closed);
        assert_eq!(path.polyline.len(), usize::try_from(mask::count(&m)).unwrap());
        assert_ne!(path.polyline.first(), path.polyline.last());
        assert!((path.arc_length() - 48.0).abs() < 1e-9);
    }

    #[test]
    fn straight_through_junction() {
        // Horizontal line with a vertical branch hanging from x = 20.
        let m = mask::from_predicate(50, 40, |x, y| {
            (y == 10 && x <= 40) || (x == 20 && (11..=30).contains(&y))
        });
        let paths = trace_mask(&m, 5.0);
        assert_eq!(paths.len(), 2);
        assert_eq!(
            endpoints(&paths[0]),
            (Point::new(0.0, 10.0), Point::new(40.0, 10.0))
        );
        assert_eq!(
            endpoints(&paths[1]),
            (Point::new(20.0, 30.0), Point::new(20.0, 10.0))
        );
    }

    #[test]
    fn right_angle_turn_allowed_and_tie_goes_to_lower_offset() {
        // A stem coming down onto a horizontal bar: both arms bend 90
        // degrees, and west precedes east in neighbor order.
        let m = mask::from_predicate(50, 40, |x, y| {
            (x == 20 && (5..30).contains(&y)) || (y == 30 && x <= 40)
        });
        let paths = trace_mask(&m, 5.0);
        assert_eq!(paths.len(), 2);
        assert_eq!(
            endpoints(&paths[0]),
            (Point::new(20.0, 5.0), Point::new(0.0, 30.0))
        );
        assert_eq!(
            endpoints(&paths[1]),
            (Point::new(40.0, 30.0), Point::new(20.0, 30.0))
        );
    }

    #[test]
    fn crossing_lines_stay_straight() {
        let m = mask::from_predicate(41, 41, |x, y| x == 20 || y == 20);
        let paths = trace_mask(&m, 5.0);
        assert_eq!(paths.len(), 2);
        for path in &paths {
            let (a, b) = endpoints(path);
            assert!(
                (a.x - b.x).abs() < f64::EPSILON || (a.y - b.y).abs() < f64::EPSILON,
                "path bent through the crossing: {a:?} -> {b:?}"
            );
            assert!((path.arc_length() - 40.0).abs() < 1e-9);
        }
    }

    #[test]
    fn short_paths_discarded() {
        let m = mask::from_predicate(40, 10, |x, y| {
            (y == 2 && (1..30).contains(&x)) || (y == 7 && (1..4).contains(&x))
        });
        let paths = trace_mask(&m, 10.0);
        assert_eq!(paths.len(), 1);
        assert_eq!(paths[0].polyline.first(), Some(&Point::new(1.0, 2.0)));
    }

    #[test]
    fn widths_sampled_from_field() {
        let m = mask::from_predicate(20, 5, |x, y| y == 2 && (2..18).contains(&x));
        let field = DistanceField::from_fn(20, 5, |x, _| image::Luma([f64::from(x) / 10.0]));
        let paths = trace(&m, &field, 1.0).unwrap();
        assert_eq!(paths[0].widths.len(), paths[0].polyline.len());
        assert!((paths[0].widths[0] - 0.2).abs() < 1e-12);
    }

    #[test]
    fn tracing_is_deterministic() {
        let m = mask::from_predicate(60, 60, |x, y| {
            x == 30 || y == 30 || x + y == 60 || (x == 10 && y > 40)
        });
        assert_eq!(trace_mask(&m, 2.0), trace_mask(&m, 2.0));
    }

    #[test]
    fn mismatched_field_rejected() {
        let m = Mask::new(10, 10);
        let field = DistanceField::new(10, 11);
        assert!(matches!(
            trace(&m, &field, 1.0),
            Err(PipelineError::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn empty_skeleton_yields_nothing() {
        assert!(trace_mask(&Mask::new(10, 10), 0.0).is_empty());
    }
}
