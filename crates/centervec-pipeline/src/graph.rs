//! Skeleton graph: endpoints, junctions, and the pixel chains between them.
//!
//! Skeleton pixels are linked with *m-adjacency* (mixed adjacency): all
//! 4-neighbors, plus diagonal neighbors that do not already share a
//! 4-neighbor with the pixel. This drops the redundant diagonal links of
//! staircase corners, so a one-pixel-wide curve has degree 2 throughout
//! and only true branch points reach degree 3 or more.
//!
//! Pixels of degree != 2 become graph nodes; maximal runs of degree-2
//! pixels between them become edges. Cycles made only of degree-2 pixels
//! have no node to hang on and are kept separately as loops.

use std::collections::{HashMap, HashSet};

use petgraph::graph::{EdgeIndex, NodeIndex, UnGraph};
use petgraph::visit::EdgeRef;
use serde::{Deserialize, Serialize};

use crate::mask::{self, Mask};

/// Pixel coordinate `(x, y)`.
pub type Pixel = (u32, u32);

/// Neighbor offsets in raster order: the row above left to right, then
/// west, east, then the row below. The index of an offset in this table
/// is the deterministic tie-breaker used when choosing between branches.
pub const NEIGHBOR_OFFSETS: [(i64, i64); 8] = [
    (-1, -1),
    (0, -1),
    (1, -1),
    (-1, 0),
    (1, 0),
    (-1, 1),
    (0, 1),
    (1, 1),
];

/// Classification of a graph node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeKind {
    /// Degree 0: a lone pixel.
    Isolated,
    /// Degree 1: the free end of a stroke.
    Endpoint,
    /// Degree 3 or more: a branch point.
    Junction,
}

/// A skeleton pixel of degree != 2.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SkeletonNode {
    /// Location of the node pixel.
    pub pixel: Pixel,
    /// Degree class.
    pub kind: NodeKind,
}

/// An ordered pixel chain between two nodes.
///
/// `pixels` starts at the edge's source node pixel and ends at its target
/// node pixel (both included).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkeletonEdge {
    /// Chain pixels, node to node.
    pub pixels: Vec<Pixel>,
}

/// Skeleton topology built once from a skeleton mask.
#[derive(Debug, Clone)]
pub struct SkeletonGraph {
    graph: UnGraph<SkeletonNode, SkeletonEdge>,
    loops: Vec<Vec<Pixel>>,
}

/// m-adjacent skeleton neighbors of `(x, y)` in [`NEIGHBOR_OFFSETS`] order.
#[must_use]
pub fn neighbors(skeleton: &Mask, (x, y): Pixel) -> Vec<Pixel> {
    let on = |dx: i64, dy: i64| -> Option<Pixel> {
        let nx = u32::try_from(i64::from(x) + dx).ok()?;
        let ny = u32::try_from(i64::from(y) + dy).ok()?;
        (nx < skeleton.width() && ny < skeleton.height() && mask::is_on(skeleton, nx, ny))
            .then_some((nx, ny))
    };
    NEIGHBOR_OFFSETS
        .iter()
        .filter_map(|&(dx, dy)| {
            let q = on(dx, dy)?;
            let diagonal = dx != 0 && dy != 0;
            // A diagonal link is redundant when a shared 4-neighbor
            // already connects the two pixels.
            (!diagonal || (on(dx, 0).is_none() && on(0, dy).is_none())).then_some(q)
        })
        .collect()
}

/// Index of the step `from -> to` in [`NEIGHBOR_OFFSETS`].
#[must_use]
pub fn offset_index(from: Pixel, to: Pixel) -> usize {
    let step = (
        i64::from(to.0) - i64::from(from.0),
        i64::from(to.1) - i64::from(from.1),
    );
    NEIGHBOR_OFFSETS
        .iter()
        .position(|&o| o == step)
        .unwrap_or(NEIGHBOR_OFFSETS.len())
}

fn link(a: Pixel, b: Pixel) -> (Pixel, Pixel) {
    if a <= b { (a, b) } else { (b, a) }
}

impl SkeletonGraph {
    /// Build the graph from a one-pixel-wide skeleton mask.
    #[must_use]
    pub fn build(skeleton: &Mask) -> Self {
        let mut graph = UnGraph::new_undirected();
        let mut index_of: HashMap<Pixel, NodeIndex> = HashMap::new();
        let mut adjacency: HashMap<Pixel, Vec<Pixel>> = HashMap::new();

        // Raster order keeps node indices deterministic.
        for y in 0..skeleton.height() {
            for x in 0..skeleton.width() {
                if !mask::is_on(skeleton, x, y) {
                    continue;
                }
                let near = neighbors(skeleton, (x, y));
                let kind = match near.len() {
                    0 => Some(NodeKind::Isolated),
                    1 => Some(NodeKind::Endpoint),
                    2 => None,
                    _ => Some(NodeKind::Junction),
                };
                if let Some(kind) = kind {
                    let node = graph.add_node(SkeletonNode {
                        pixel: (x, y),
                        kind,
                    });
                    index_of.insert((x, y), node);
                }
                adjacency.insert((x, y), near);
            }
        }

        let mut used: HashSet<(Pixel, Pixel)> = HashSet::new();
        let mut chained: HashSet<Pixel> = HashSet::new();
        let nodes: Vec<NodeIndex> = graph.node_indices().collect();
        for start in nodes {
            let origin = graph[start].pixel;
            for &first in adjacency.get(&origin).map_or(&[][..], Vec::as_slice) {
                if used.contains(&link(origin, first)) {
                    continue;
                }
                let pixels = walk_chain(origin, first, &adjacency, &index_of, &mut used);
                chained.extend(pixels.iter().copied());
                if let Some(&end) = pixels.last()
                    && let Some(&target) = index_of.get(&end)
                {
                    graph.add_edge(start, target, SkeletonEdge { pixels });
                }
            }
        }

        let mut loops = Vec::new();
        for y in 0..skeleton.height() {
            for x in 0..skeleton.width() {
                let p = (x, y);
                if !adjacency.contains_key(&p) || index_of.contains_key(&p) || chained.contains(&p) {
                    continue;
                }
                let cycle = walk_loop(p, &adjacency, &mut used);
                chained.extend(cycle.iter().copied());
                loops.push(cycle);
            }
        }

        Self { graph, loops }
    }

    /// The underlying petgraph graph.
    #[must_use]
    pub const fn graph(&self) -> &UnGraph<SkeletonNode, SkeletonEdge> {
        &self.graph
    }

    /// Cycles without any node, each starting at its first pixel in
    /// raster order and not repeating it at the end.
    #[must_use]
    pub fn loops(&self) -> &[Vec<Pixel>] {
        &self.loops
    }

    /// Node indices of the given kind, in raster order of their pixels.
    #[must_use]
    pub fn nodes_of_kind(&self, kind: NodeKind) -> Vec<NodeIndex> {
        self.graph
            .node_indices()
            .filter(|&n| self.graph[n].kind == kind)
            .collect()
    }

    /// Edges incident to `node`, each with the chain oriented away from it.
    ///
    /// Self-loop edges appear twice, once per direction.
    #[must_use]
    pub fn outgoing(&self, node: NodeIndex) -> Vec<(EdgeIndex, Vec<Pixel>)> {
        let here = self.graph[node].pixel;
        let mut out = Vec::new();
        for edge in self.graph.edges(node) {
            let pixels = &edge.weight().pixels;
            if pixels.first() == Some(&here) {
                out.push((edge.id(), pixels.clone()));
            }
            if pixels.last() == Some(&here) {
                out.push((edge.id(), pixels.iter().rev().copied().collect()));
            }
        }
        // A self-loop may be reported once per endpoint.
        out.sort_by_key(|(id, pixels)| (id.index(), pixels.get(1).copied()));
        out.dedup();
        out
    }

    /// Total number of pixels covered by nodes, edges, and loops.
    #[must_use]
    pub fn pixel_count(&self) -> usize {
        let mut all: HashSet<Pixel> = self.graph.node_weights().map(|n| n.pixel).collect();
        for edge in self.graph.edge_weights() {
            all.extend(edge.pixels.iter().copied());
        }
        for cycle in &self.loops {
            all.extend(cycle.iter().copied());
        }
        all.len()
    }
}

/// Follow degree-2 pixels from `origin` through `first` to the next node.
fn walk_chain(
    origin: Pixel,
    first: Pixel,
    adjacency: &HashMap<Pixel, Vec<Pixel>>,
    nodes: &HashMap<Pixel, NodeIndex>,
    used: &mut HashSet<(Pixel, Pixel)>,
) -> Vec<Pixel> {
    let mut pixels = vec![origin, first];
    used.insert(link(origin, first));
    let (mut prev, mut cur) = (origin, first);
    while !nodes.contains_key(&cur) {
        let next = adjacency
            .get(&cur)
            .and_then(|near| near.iter().copied().find(|&q| q != prev && !used.contains(&link(cur, q))));
        let Some(next) = next else { break };
        used.insert(link(cur, next));
        pixels.push(next);
        (prev, cur) = (cur, next);
    }
    pixels
}

/// Walk a node-free cycle starting at `start`.
fn walk_loop(
    start: Pixel,
    adjacency: &HashMap<Pixel, Vec<Pixel>>,
    used: &mut HashSet<(Pixel, Pixel)>,
) -> Vec<Pixel> {
    let mut cycle = vec![start];
    let mut cur = start;
    loop {
        let next = adjacency
            .get(&cur)
            .and_then(|near| near.iter().copied().find(|&q| !used.contains(&link(cur, q))));
        let Some(next) = next else { break };
        used.insert(link(cur, next));
        if next == start {
            break;
        }
        cycle.push(next);
        cur = next;
    }
    cycle
}
