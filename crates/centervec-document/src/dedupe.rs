//! Removal of short, identical, and near-identical paths, then joining
//! of open paths whose ends touch.
//!
//! Near-duplicate detection compares every surviving pair, so cost grows
//! as O(P² · L) for P paths of resampled length L. Bounding boxes further
//! apart than the threshold are skipped before any sampling work, which
//! keeps documents of a few hundred paths fast; documents with many
//! thousands of overlapping paths will be slow.

use std::collections::HashMap;
use std::hash::Hasher;

use log::debug;
use rstar::{PointDistance, RTree};
use rstar::primitives::Line;
use serde::{Deserialize, Serialize};
use siphasher::sip::SipHasher13;

use centervec_pipeline::{PathCommand, Point};

use crate::document::{CurvePath, VectorDocument};
use crate::path_data;

/// Which cleanup passes run, and their thresholds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DedupeOptions {
    /// Drop paths whose drawing commands exactly repeat an earlier path.
    pub remove_exact: bool,
    /// Drop paths drawn shorter than this (`0.0` keeps all).
    pub min_length: f64,
    /// Mean nearest-neighbor distance below which two paths are near
    /// duplicates (`0.0` disables the pass).
    pub threshold: f64,
    /// A near duplicate must also have no sample further than
    /// `threshold * max_distance_ratio` from the other path.
    pub max_distance_ratio: f64,
    /// Open paths whose ends lie within this distance are joined into
    /// one (`0.0` disables the pass).
    pub merge_distance: f64,
}

impl DedupeOptions {
    /// Default near-duplicate threshold in canvas units.
    pub const DEFAULT_THRESHOLD: f64 = 1.5;
    /// Default cap on the worst-case sample distance, relative to the threshold.
    pub const DEFAULT_MAX_DISTANCE_RATIO: f64 = 2.5;
    /// Default endpoint gap bridged by the merge pass.
    pub const DEFAULT_MERGE_DISTANCE: f64 = 2.0;
}

impl Default for DedupeOptions {
    fn default() -> Self {
        Self {
            remove_exact: true,
            min_length: 0.0,
            threshold: Self::DEFAULT_THRESHOLD,
            max_distance_ratio: Self::DEFAULT_MAX_DISTANCE_RATIO,
            merge_distance: Self::DEFAULT_MERGE_DISTANCE,
        }
    }
}

/// What a cleanup run removed or joined.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DedupeReport {
    /// Paths before cleanup.
    pub original_count: usize,
    /// Paths after cleanup.
    pub remaining_count: usize,
    /// Removed for being shorter than `min_length`.
    pub short_removed: usize,
    /// Removed as exact repeats.
    pub exact_removed: usize,
    /// Removed as near duplicates.
    pub near_removed: usize,
    /// Ids of paths dropped by the short, exact, and near passes, in
    /// original document order.
    pub removed_ids: Vec<String>,
    /// Ids of paths appended onto an earlier path, in original document
    /// order. The earlier path keeps its id.
    pub merged_ids: Vec<String>,
}

/// Samples per path for the near-duplicate metric, bounded by this range.
const MIN_SAMPLES: usize = 10;
const MAX_SAMPLES: usize = 80;

/// Remove short paths, exact repeats, and near duplicates, in that order,
/// then join open paths end to end.
///
/// Whenever two paths are duplicates the earlier one is kept. The
/// distance metric is symmetric. Merging grows each surviving open path
/// from its end: the first later path with either end within
/// `merge_distance` is appended, reversed if its far end is the close
/// one, until nothing is in reach. The duplicate and merge passes repeat
/// until a merge round joins nothing, so a second run with the same
/// options removes and joins nothing more.
pub fn dedupe(doc: &mut VectorDocument, options: &DedupeOptions) -> DedupeReport {
    let original_count = doc.len();
    let mut removed = vec![false; original_count];

    let short_removed = if options.min_length > 0.0 {
        mark(&mut removed, doc.paths(), |_, path| path.length() < options.min_length)
    } else {
        0
    };

    let mut exact_removed = 0;
    let mut near_removed = 0;
    let mut merged = vec![false; original_count];
    loop {
        if options.remove_exact {
            exact_removed += remove_exact(doc.paths(), &mut removed);
        }
        if options.threshold > 0.0 {
            near_removed += remove_near(doc.paths(), &mut removed, options);
        }
        if options.merge_distance <= 0.0
            || merge_close(&mut doc.paths, &mut removed, &mut merged, options.merge_distance) == 0
        {
            break;
        }
    }

    let mut removed_ids = Vec::new();
    let mut merged_ids = Vec::new();
    let mut flags = removed.iter().copied().zip(merged.iter().copied());
    doc.paths.retain(|path| match flags.next() {
        Some((_, true)) => {
            merged_ids.push(path.id.clone());
            false
        }
        Some((true, false)) => {
            removed_ids.push(path.id.clone());
            false
        }
        _ => true,
    });

    debug!(
        "dedupe: {original_count} -> {} paths ({short_removed} short, {exact_removed} exact, {near_removed} near, {} merged)",
        doc.len(),
        merged_ids.len()
    );
    DedupeReport {
        original_count,
        remaining_count: doc.len(),
        short_removed,
        exact_removed,
        near_removed,
        removed_ids,
        merged_ids,
    }
}

fn mark(
    removed: &mut [bool],
    paths: &[CurvePath],
    mut predicate: impl FnMut(usize, &CurvePath) -> bool,
) -> usize {
    let mut count = 0;
    for (index, path) in paths.iter().enumerate() {
        if !removed[index] && predicate(index, path) {
            removed[index] = true;
            count += 1;
        }
    }
    count
}

fn fingerprint(data: &str) -> u64 {
    let mut hasher = SipHasher13::new();
    hasher.write(data.as_bytes());
    hasher.finish()
}

fn remove_exact(paths: &[CurvePath], removed: &mut [bool]) -> usize {
    let encoded: Vec<String> = paths.iter().map(|p| path_data::encode(&p.commands)).collect();
    let mut seen: HashMap<u64, Vec<usize>> = HashMap::new();
    mark(removed, paths, |index, _| {
        let bucket = seen.entry(fingerprint(&encoded[index])).or_default();
        let repeat = bucket.iter().any(|&earlier| encoded[earlier] == encoded[index]);
        if !repeat {
            bucket.push(index);
        }
        repeat
    })
}

/// Flattened geometry prepared for distance queries.
struct Shape {
    samples: Vec<[f64; 2]>,
    segments: RTree<Line<[f64; 2]>>,
    min: [f64; 2],
    max: [f64; 2],
}

impl Shape {
    /// `None` for paths with no drawn extent.
    fn new(path: &CurvePath) -> Option<Self> {
        let flat = path.flatten();
        let vertices: Vec<Point> = flat.iter().flatten().copied().collect();
        let first = *vertices.first()?;
        let (min, max) = vertices.iter().fold(([first.x, first.y], [first.x, first.y]), |(lo, hi), p| {
            ([lo[0].min(p.x), lo[1].min(p.y)], [hi[0].max(p.x), hi[1].max(p.y)])
        });

        let segments: Vec<Line<[f64; 2]>> = flat
            .iter()
            .flat_map(|points| points.windows(2))
            .filter(|w| w[0] != w[1])
            .map(|w| Line::new([w[0].x, w[0].y], [w[1].x, w[1].y]))
            .collect();
        if segments.is_empty() {
            return None;
        }

        let count = vertices.len().clamp(MIN_SAMPLES, MAX_SAMPLES);
        let samples = flat
            .iter()
            .flat_map(|points| resample(points, count))
            .map(|p| [p.x, p.y])
            .collect();

        Some(Self {
            samples,
            segments: RTree::bulk_load(segments),
            min,
            max,
        })
    }

    /// Gap between the two bounding boxes (0 when they overlap).
    fn box_gap(&self, other: &Self) -> f64 {
        let dx = (other.min[0] - self.max[0]).max(self.min[0] - other.max[0]).max(0.0);
        let dy = (other.min[1] - self.max[1]).max(self.min[1] - other.max[1]).max(0.0);
        dx.hypot(dy)
    }

    /// Mean and maximum distance from this shape's samples to `other`.
    fn one_way(&self, other: &Self) -> (f64, f64) {
        let mut sum = 0.0;
        let mut worst = 0.0_f64;
        for sample in &self.samples {
            let d = other
                .segments
                .nearest_neighbor_iter(sample)
                .next()
                .map_or(f64::INFINITY, |line| line.distance_2(sample).sqrt());
            sum += d;
            worst = worst.max(d);
        }
        #[allow(clippy::cast_precision_loss)]
        let mean = sum / self.samples.len().max(1) as f64;
        (mean, worst)
    }
}

/// Bidirectional mean nearest-neighbor distance and worst sample distance.
fn shape_distance(a: &Shape, b: &Shape) -> (f64, f64) {
    let (mean_ab, max_ab) = a.one_way(b);
    let (mean_ba, max_ba) = b.one_way(a);
    (f64::midpoint(mean_ab, mean_ba), max_ab.max(max_ba))
}

fn remove_near(paths: &[CurvePath], removed: &mut [bool], options: &DedupeOptions) -> usize {
    let shapes: Vec<Option<Shape>> = paths.iter().map(Shape::new).collect();
    let max_allowed = options.threshold * options.max_distance_ratio;
    let mut kept: Vec<usize> = Vec::new();
    mark(removed, paths, |index, _| {
        let Some(shape) = &shapes[index] else {
            return false;
        };
        let duplicate = kept.iter().any(|&earlier| {
            let Some(other) = &shapes[earlier] else {
                return false;
            };
            if shape.box_gap(other) >= options.threshold {
                return false;
            }
            let (mean, worst) = shape_distance(shape, other);
            mean < options.threshold && worst <= max_allowed
        });
        if !duplicate {
            kept.push(index);
        }
        duplicate
    })
}

/// Join open paths end to end. Absorbed paths are flagged in both
/// `removed` and `merged`; returns how many were absorbed.
fn merge_close(
    paths: &mut [CurvePath],
    removed: &mut [bool],
    merged: &mut [bool],
    max_distance: f64,
) -> usize {
    let ends: Vec<Option<(Point, Point)>> = paths
        .iter()
        .zip(removed.iter())
        .map(|(path, &gone)| if gone { None } else { path.open_ends() })
        .collect();
    let mut used: Vec<bool> = ends.iter().map(Option::is_none).collect();
    let mut absorbed = 0;

    for i in 0..paths.len() {
        let Some((_, mut tail)) = ends[i].filter(|_| !used[i]) else {
            continue;
        };
        used[i] = true;
        loop {
            let next = (0..paths.len()).find_map(|j| {
                let (start, end) = ends[j].filter(|_| !used[j])?;
                if tail.distance(start) <= max_distance {
                    Some((j, false, end))
                } else if tail.distance(end) <= max_distance {
                    Some((j, true, start))
                } else {
                    None
                }
            });
            let Some((j, reverse, new_tail)) = next else {
                break;
            };
            let appended = if reverse {
                paths[j].reversed_commands()
            } else {
                paths[j].commands.clone()
            };
            append_at(&mut paths[i].commands, tail, &appended);
            debug!("merged {} onto {}", paths[j].id, paths[i].id);
            used[j] = true;
            removed[j] = true;
            merged[j] = true;
            absorbed += 1;
            tail = new_tail;
        }
    }
    absorbed
}

/// Continue `commands` (currently ending at `tail`) with another subpath,
/// bridging any gap with a straight line.
fn append_at(commands: &mut Vec<PathCommand>, tail: Point, next: &[PathCommand]) {
    let Some((&PathCommand::MoveTo(start), rest)) = next.split_first() else {
        return;
    };
    if start != tail {
        commands.push(PathCommand::LineTo(start));
    }
    commands.extend_from_slice(rest);
}

/// `count` points evenly spaced by arc length along `points`.
fn resample(points: &[Point], count: usize) -> Vec<Point> {
    let Some(&first) = points.first() else {
        return Vec::new();
    };
    let lengths: Vec<f64> = points.windows(2).map(|w| w[0].distance(w[1])).collect();
    let total: f64 = lengths.iter().sum();
    if total <= 0.0 || count < 2 {
        return vec![first; count.max(1)];
    }

    let mut out = Vec::with_capacity(count);
    let mut segment = 0;
    let mut walked = 0.0;
    for i in 0..count {
        #[allow(clippy::cast_precision_loss)]
        let target = total * i as f64 / (count - 1) as f64;
        while segment < lengths.len() - 1 && walked + lengths[segment] < target {
            walked += lengths[segment];
            segment += 1;
        }
        let len = lengths[segment];
        let t = if len > 0.0 {
            ((target - walked) / len).clamp(0.0, 1.0)
        } else {
            0.0
        };
        out.push(points[segment].lerp(points[segment + 1], t));
    }
    out
}
