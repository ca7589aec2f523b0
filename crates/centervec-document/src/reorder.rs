//! Geometric reordering of document paths.
//!
//! Paths are ranked by area, toured by centroid proximity, or both
//! (area tiers toured one at a time). Only document order and,
//! optionally, ids change; drawing commands and styles are untouched.

use std::fmt;

use geo::{Area, BoundingRect, Centroid, Coord, LineString, MultiPoint, Polygon};
use log::debug;
use serde::{Deserialize, Serialize};

use centervec_pipeline::Point;

use crate::document::{CurvePath, VectorDocument};

/// Ordering strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortMode {
    /// Largest area first (backgrounds before details).
    AreaDesc,
    /// Smallest area first.
    AreaAsc,
    /// Greedy nearest-centroid tour from the first path.
    Proximity,
    /// Area-ranked tiers, each toured by proximity.
    #[default]
    AreaThenProximity,
}

impl fmt::Display for SortMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AreaDesc => f.write_str("area_desc"),
            Self::AreaAsc => f.write_str("area_asc"),
            Self::Proximity => f.write_str("proximity"),
            Self::AreaThenProximity => f.write_str("area_then_proximity"),
        }
    }
}

/// How a path's area is measured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AreaMeasure {
    /// Shoelace area of the on-curve vertices, closed back to the start.
    #[default]
    Polygon,
    /// Area of the axis-aligned bounding box of the vertices.
    BoundingBox,
}

/// Reordering parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReorderOptions {
    /// Ordering strategy.
    pub mode: SortMode,
    /// Number of equal-count area tiers for [`SortMode::AreaThenProximity`].
    pub area_tiers: usize,
    /// Flip the final order.
    pub reverse: bool,
    /// Reassign ids `path0..path(N-1)` to match the new order.
    pub renumber_ids: bool,
    /// Area measure used for ranking.
    pub area_measure: AreaMeasure,
}

impl ReorderOptions {
    /// Default tier count.
    pub const DEFAULT_AREA_TIERS: usize = 3;
}

impl Default for ReorderOptions {
    fn default() -> Self {
        Self {
            mode: SortMode::default(),
            area_tiers: Self::DEFAULT_AREA_TIERS,
            reverse: false,
            renumber_ids: true,
            area_measure: AreaMeasure::default(),
        }
    }
}

/// Area and representative point of one path.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PathStats {
    /// Area under the chosen measure.
    pub area: f64,
    /// Mean of the on-curve vertices.
    pub centroid: Point,
}

/// Where one path ended up.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReorderEntry {
    /// Position in the reordered document.
    pub new_index: usize,
    /// Id before reordering.
    pub old_id: String,
    /// Id after reordering.
    pub new_id: String,
    /// Area used for ranking.
    pub area: f64,
    /// Centroid used for the proximity tour.
    pub centroid: Point,
}

/// Summary of a reorder run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReorderReport {
    /// Strategy applied.
    pub mode: SortMode,
    /// Whether ids were reassigned.
    pub renumber_ids: bool,
    /// Number of paths.
    pub total_paths: usize,
    /// One entry per path, in new order.
    pub paths: Vec<ReorderEntry>,
}

/// Area and centroid of a path's on-curve vertices.
///
/// Paths with fewer than three vertices have zero polygon area.
#[must_use]
pub fn path_stats(path: &CurvePath, measure: AreaMeasure) -> PathStats {
    let coords: Vec<Coord<f64>> = path
        .vertices()
        .iter()
        .map(|p| Coord { x: p.x, y: p.y })
        .collect();

    let centroid = MultiPoint::from(coords.clone())
        .centroid()
        .map_or(Point::new(0.0, 0.0), |c| Point::new(c.x(), c.y()));

    let area = match measure {
        AreaMeasure::Polygon if coords.len() >= 3 => {
            Polygon::new(LineString::new(coords), Vec::new()).unsigned_area()
        }
        AreaMeasure::Polygon => 0.0,
        AreaMeasure::BoundingBox => LineString::new(coords)
            .bounding_rect()
            .map_or(0.0, |rect| rect.width() * rect.height()),
    };

    PathStats { area, centroid }
}

/// Reorder `doc` in place and report where each path went.
pub fn reorder(doc: &mut VectorDocument, options: &ReorderOptions) -> ReorderReport {
    let stats: Vec<PathStats> = doc
        .paths()
        .iter()
        .map(|path| path_stats(path, options.area_measure))
        .collect();
    let all: Vec<usize> = (0..stats.len()).collect();

    let mut order = match options.mode {
        SortMode::AreaDesc => by_area(&all, &stats, true),
        SortMode::AreaAsc => by_area(&all, &stats, false),
        SortMode::Proximity => proximity_tour(&all, &stats),
        SortMode::AreaThenProximity => area_tiers(&stats, options.area_tiers),
    };
    if options.reverse {
        order.reverse();
    }

    let old_ids: Vec<String> = order.iter().map(|&i| doc.paths[i].id.clone()).collect();
    let mut slots: Vec<Option<CurvePath>> =
        std::mem::take(&mut doc.paths).into_iter().map(Some).collect();
    doc.paths = order.iter().filter_map(|&i| slots[i].take()).collect();
    if options.renumber_ids {
        doc.renumber_ids();
    }

    debug!("reorder: {} paths by {}", doc.len(), options.mode);
    let paths = order
        .iter()
        .zip(old_ids)
        .zip(doc.paths())
        .enumerate()
        .map(|(new_index, ((&old_index, old_id), path))| ReorderEntry {
            new_index,
            old_id,
            new_id: path.id.clone(),
            area: stats[old_index].area,
            centroid: stats[old_index].centroid,
        })
        .collect();

    ReorderReport {
        mode: options.mode,
        renumber_ids: options.renumber_ids,
        total_paths: doc.len(),
        paths,
    }
}

/// Stable sort of `members` by area; equal areas keep their order.
fn by_area(members: &[usize], stats: &[PathStats], descending: bool) -> Vec<usize> {
    let mut sorted = members.to_vec();
    sorted.sort_by(|&a, &b| {
        let ordering = stats[a].area.total_cmp(&stats[b].area);
        if descending { ordering.reverse() } else { ordering }
    });
    sorted
}

/// Greedy nearest-centroid tour starting at the first member.
///
/// Ties go to the member listed first.
fn proximity_tour(members: &[usize], stats: &[PathStats]) -> Vec<usize> {
    let mut remaining = members.to_vec();
    let mut tour = Vec::with_capacity(remaining.len());
    if remaining.is_empty() {
        return tour;
    }
    let mut current = remaining.remove(0);
    tour.push(current);
    while !remaining.is_empty() {
        let here = stats[current].centroid;
        let mut best = 0;
        let mut best_distance = f64::INFINITY;
        for (slot, &candidate) in remaining.iter().enumerate() {
            let d = here.distance_squared(stats[candidate].centroid);
            if d < best_distance {
                best = slot;
                best_distance = d;
            }
        }
        current = remaining.remove(best);
        tour.push(current);
    }
    tour
}

/// Split paths into `tiers` equal-count buckets by descending area (the
/// last bucket takes the remainder) and tour each bucket by proximity,
/// starting from its member earliest in document order.
fn area_tiers(stats: &[PathStats], tiers: usize) -> Vec<usize> {
    let all: Vec<usize> = (0..stats.len()).collect();
    let ranked = by_area(&all, stats, true);
    let tiers = tiers.max(1);
    let size = (ranked.len() / tiers).max(1);

    let mut order = Vec::with_capacity(ranked.len());
    for tier in 0..tiers {
        let start = (tier * size).min(ranked.len());
        let end = if tier + 1 == tiers {
            ranked.len()
        } else {
            (start + size).min(ranked.len())
        };
        let mut members = ranked[start..end].to_vec();
        members.sort_unstable();
        order.extend(proximity_tour(&members, stats));
    }
    order
}
