//! Skeleton extraction: reduce the line mask to a one-pixel centerline.
//!
//! This module defines the [`CenterlineExtractor`] trait for pluggable
//! extraction algorithms and the [`SkeletonAlgorithm`] enum for selecting
//! which one to try first.
//!
//! # Fallback chain
//!
//! Extraction can fail without being an error: thinning may not converge
//! within its iteration budget, or an algorithm may produce nothing from a
//! non-empty mask. [`extract`] then walks the fixed precedence
//! `Ridge -> Skeleton -> MedialAxis`, starting at the requested algorithm,
//! and records every abandoned attempt in [`Skeletonization::fallbacks`].

use std::f64::consts::FRAC_PI_4;
use std::fmt;

use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::distance::{self, distance_field};
use crate::graph::{NodeKind, SkeletonGraph};
use crate::mask::{self, Mask};
use crate::types::{DistanceField, Point};

/// Selects which centerline extraction algorithm to try first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SkeletonAlgorithm {
    /// Ridge detection on the distance field via Hessian eigenvalues,
    /// thinned to one pixel. Smooth centerlines, stable near T-junctions.
    #[default]
    Ridge,
    /// Iterative topology-preserving thinning (Zhang-Suen).
    Skeleton,
    /// Local maxima of the distance field along its gradient. Exact but
    /// noisy, so low-distance pixels are filtered out.
    MedialAxis,
}

impl SkeletonAlgorithm {
    /// Every algorithm in fallback precedence order.
    pub const PRECEDENCE: [Self; 3] = [Self::Ridge, Self::Skeleton, Self::MedialAxis];

    /// This algorithm followed by every simpler one.
    #[must_use]
    pub fn fallback_chain(self) -> &'static [Self] {
        let start = Self::PRECEDENCE
            .iter()
            .position(|&a| a == self)
            .unwrap_or(0);
        &Self::PRECEDENCE[start..]
    }
}

impl fmt::Display for SkeletonAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ridge => f.write_str("ridge"),
            Self::Skeleton => f.write_str("skeleton"),
            Self::MedialAxis => f.write_str("medial_axis"),
        }
    }
}

/// Why an extraction attempt was abandoned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FallbackReason {
    /// Thinning still removed pixels after its iteration budget.
    NotConverged,
    /// No skeleton pixels from a non-empty mask.
    EmptyOutput,
}

impl fmt::Display for FallbackReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotConverged => f.write_str("did not converge"),
            Self::EmptyOutput => f.write_str("produced no skeleton"),
        }
    }
}

/// One abandoned extraction attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fallback {
    /// The algorithm that failed.
    pub algorithm: SkeletonAlgorithm,
    /// What went wrong.
    pub reason: FallbackReason,
}

/// Tunables shared by the extraction algorithms.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExtractParams {
    /// Minimum magnitude of the negative Hessian eigenvalue for a ridge.
    pub ridge_threshold: f64,
    /// Thinning passes allowed before giving up.
    pub max_thinning_iterations: usize,
}

impl ExtractParams {
    /// Parameters for a mask of the given size.
    ///
    /// Each thinning pass peels at least one boundary layer, so half the
    /// larger side (plus slack) bounds a converging run.
    #[must_use]
    pub fn for_mask(mask: &Mask, ridge_threshold: f64) -> Self {
        let (w, h) = mask.dimensions();
        Self {
            ridge_threshold,
            max_thinning_iterations: (w.max(h) as usize) / 2 + 2,
        }
    }
}

/// Trait for centerline extraction strategies.
///
/// Input: a line mask and its distance field. Output: a skeleton mask of
/// the same dimensions. Implementations never mutate the input.
pub trait CenterlineExtractor {
    /// Extract a skeleton, or report why none could be produced.
    ///
    /// # Errors
    ///
    /// Returns the [`FallbackReason`] when the attempt should be abandoned.
    fn extract(
        &self,
        line: &Mask,
        field: &DistanceField,
        params: &ExtractParams,
    ) -> Result<Mask, FallbackReason>;
}

impl CenterlineExtractor for SkeletonAlgorithm {
    fn extract(
        &self,
        line: &Mask,
        field: &DistanceField,
        params: &ExtractParams,
    ) -> Result<Mask, FallbackReason> {
        let thinned = match *self {
            Self::Ridge => {
                let ridges = ridge_points(line, field, params.ridge_threshold);
                thin(&ridges, params.max_thinning_iterations)?
            }
            Self::Skeleton => thin(line, params.max_thinning_iterations)?,
            Self::MedialAxis => {
                let axis = filter_low_distance(&medial_axis_points(line, field), field);
                thin(&axis, params.max_thinning_iterations)?
            }
        };
        let skeleton = prune_spurs(&thinned, field);
        if mask::is_blank(&skeleton) && !mask::is_blank(line) {
            return Err(FallbackReason::EmptyOutput);
        }
        Ok(skeleton)
    }
}

/// Output of [`extract`].
#[derive(Debug, Clone)]
pub struct Skeletonization {
    /// One-pixel-wide centerline pixels.
    pub skeleton: Mask,
    /// Distance from each line pixel to the background.
    pub distance: DistanceField,
    /// The algorithm whose output was kept.
    pub algorithm: SkeletonAlgorithm,
    /// Attempts abandoned before `algorithm` succeeded.
    pub fallbacks: Vec<Fallback>,
}

/// Reduce `line` to a centerline, walking the fallback chain from
/// `algorithm`.
///
/// When every algorithm in the chain fails, the result is a blank
/// skeleton attributed to the last algorithm tried.
#[must_use = "returns the skeleton and distance field"]
pub fn extract(line: &Mask, algorithm: SkeletonAlgorithm, ridge_threshold: f64) -> Skeletonization {
    let field = distance_field(line);
    let params = ExtractParams::for_mask(line, ridge_threshold);
    let mut fallbacks = Vec::new();

    for &candidate in algorithm.fallback_chain() {
        match candidate.extract(line, &field, &params) {
            Ok(skeleton) => {
                debug!(
                    "skeleton: {candidate} kept {} of {} pixels",
                    mask::count(&skeleton),
                    mask::count(line)
                );
                return Skeletonization {
                    skeleton,
                    distance: field,
                    algorithm: candidate,
                    fallbacks,
                };
            }
            Err(reason) => {
                warn!("skeleton: {candidate} {reason}, falling back");
                fallbacks.push(Fallback {
                    algorithm: candidate,
                    reason,
                });
            }
        }
    }

    Skeletonization {
        skeleton: mask::empty(crate::types::Dimensions::of(line)),
        distance: field,
        algorithm: SkeletonAlgorithm::MedialAxis,
        fallbacks,
    }
}

// --- Pixel grid helpers ---

/// Dense boolean grid with out-of-bounds reads returning `false`.
struct Bits {
    width: i64,
    height: i64,
    on: Vec<bool>,
}

impl Bits {
    fn from_mask(mask: &Mask) -> Self {
        Self {
            width: i64::from(mask.width()),
            height: i64::from(mask.height()),
            on: mask.pixels().map(|p| p.0[0] != 0).collect(),
        }
    }

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    const fn index(&self, x: i64, y: i64) -> Option<usize> {
        if x < 0 || y < 0 || x >= self.width || y >= self.height {
            None
        } else {
            Some((y * self.width + x) as usize)
        }
    }

    fn get(&self, x: i64, y: i64) -> bool {
        self.index(x, y).is_some_and(|i| self.on[i])
    }

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    fn to_mask(&self) -> Mask {
        mask::from_predicate(self.width as u32, self.height as u32, |x, y| {
            self.get(i64::from(x), i64::from(y))
        })
    }
}

/// Zhang-Suen neighbor order: P2 (north) clockwise to P9 (north-west).
const RING: [(i64, i64); 8] = [
    (0, -1),
    (1, -1),
    (1, 0),
    (1, 1),
    (0, 1),
    (-1, 1),
    (-1, 0),
    (-1, -1),
];

/// Topology-preserving thinning (Zhang-Suen) down to one-pixel width.
///
/// # Errors
///
/// Returns [`FallbackReason::NotConverged`] if pixels were still being
/// removed after `max_iterations` passes.
pub fn thin(line: &Mask, max_iterations: usize) -> Result<Mask, FallbackReason> {
    let mut bits = Bits::from_mask(line);
    let mut doomed = Vec::new();

    for _ in 0..max_iterations {
        let mut changed = false;
        for step in 0..2 {
            doomed.clear();
            for y in 0..bits.height {
                for x in 0..bits.width {
                    if bits.get(x, y) && removable(&bits, x, y, step) {
                        doomed.push((x, y));
                    }
                }
            }
            for &(x, y) in &doomed {
                if let Some(i) = bits.index(x, y) {
                    bits.on[i] = false;
                }
            }
            changed |= !doomed.is_empty();
        }
        if !changed {
            return Ok(bits.to_mask());
        }
    }
    Err(FallbackReason::NotConverged)
}

fn removable(bits: &Bits, x: i64, y: i64, step: usize) -> bool {
    let p = RING.map(|(dx, dy)| bits.get(x + dx, y + dy));
    let neighbors = p.iter().filter(|&&b| b).count();
    if !(2..=6).contains(&neighbors) {
        return false;
    }
    let transitions = (0..8).filter(|&i| !p[i] && p[(i + 1) % 8]).count();
    if transitions != 1 {
        return false;
    }
    // p[0]=P2 north, p[2]=P4 east, p[4]=P6 south, p[6]=P8 west.
    if step == 0 {
        !(p[0] && p[2] && p[4]) && !(p[2] && p[4] && p[6])
    } else {
        !(p[0] && p[2] && p[6]) && !(p[0] && p[4] && p[6])
    }
}

// --- Distance-field analysis ---

/// Second-order finite differences of the distance field at `(x, y)`.
fn hessian(field: &DistanceField, x: i64, y: i64) -> (f64, f64, f64) {
    let d = |dx: i64, dy: i64| distance::sample(field, x + dx, y + dy);
    let center = d(0, 0);
    let dxx = 2.0f64.mul_add(-center, d(1, 0) + d(-1, 0));
    let dyy = 2.0f64.mul_add(-center, d(0, 1) + d(0, -1));
    let dxy = (d(1, 1) - d(1, -1) - d(-1, 1) + d(-1, -1)) / 4.0;
    (dxx, dyy, dxy)
}

/// Round a direction vector to the nearest 8-neighbor offset.
#[allow(clippy::cast_possible_truncation)]
fn snap_direction(vx: f64, vy: f64) -> (i64, i64) {
    let octant = (vy.atan2(vx) / FRAC_PI_4).round() as i64;
    RING_BY_ANGLE[octant.rem_euclid(8) as usize]
}

/// 8-neighbor offsets by angle, counter-clockwise from +x in steps of 45
/// degrees (image y grows downward).
const RING_BY_ANGLE: [(i64, i64); 8] = [
    (1, 0),
    (1, 1),
    (0, 1),
    (-1, 1),
    (-1, 0),
    (-1, -1),
    (0, -1),
    (1, -1),
];

fn is_peak_along(field: &DistanceField, x: i64, y: i64, (ox, oy): (i64, i64)) -> bool {
    let here = distance::sample(field, x, y);
    here >= distance::sample(field, x + ox, y + oy) && here >= distance::sample(field, x - ox, y - oy)
}

/// Line pixels on a ridge of the distance field.
///
/// A pixel qualifies when the smaller Hessian eigenvalue is below
/// `-threshold` and the pixel is a local maximum along that eigenvalue's
/// eigenvector (the direction across the stroke).
#[must_use = "returns the ridge mask"]
pub fn ridge_points(line: &Mask, field: &DistanceField, threshold: f64) -> Mask {
    mask::from_predicate(line.width(), line.height(), |x, y| {
        if !mask::is_on(line, x, y) {
            return false;
        }
        let (x, y) = (i64::from(x), i64::from(y));
        let (dxx, dyy, dxy) = hessian(field, x, y);
        let half_trace = (dxx + dyy) / 2.0;
        let spread = ((dxx - dyy) / 2.0).hypot(dxy);
        let lambda = half_trace - spread;
        if lambda >= -threshold {
            return false;
        }
        // Eigenvector of `lambda`; pick the better-conditioned form.
        let a = (dxy, lambda - dxx);
        let b = (lambda - dyy, dxy);
        let (vx, vy) = if a.0.hypot(a.1) >= b.0.hypot(b.1) { a } else { b };
        if vx.hypot(vy) <= f64::EPSILON {
            // Isotropic peak: a maximum in every direction counts.
            return RING_BY_ANGLE[..4]
                .iter()
                .all(|&o| is_peak_along(field, x, y, o));
        }
        is_peak_along(field, x, y, snap_direction(vx, vy))
    })
}

/// Line pixels that are local maxima of the distance field along its
/// gradient direction.
///
/// Where the gradient vanishes (the exact center of a symmetric stroke),
/// a maximum along any of the four principal directions qualifies.
#[must_use = "returns the medial axis mask"]
pub fn medial_axis_points(line: &Mask, field: &DistanceField) -> Mask {
    mask::from_predicate(line.width(), line.height(), |x, y| {
        if !mask::is_on(line, x, y) {
            return false;
        }
        let (x, y) = (i64::from(x), i64::from(y));
        let d = |dx: i64, dy: i64| distance::sample(field, x + dx, y + dy);
        let gx = (d(1, 0) - d(-1, 0)) / 2.0;
        let gy = (d(0, 1) - d(0, -1)) / 2.0;
        if gx.hypot(gy) < 0.25 {
            let here = d(0, 0);
            return RING_BY_ANGLE[..4].iter().any(|&(ox, oy)| {
                let (fwd, back) = (d(ox, oy), d(-ox, -oy));
                here >= fwd && here >= back && (here > fwd || here > back)
            });
        }
        is_peak_along(field, x, y, snap_direction(gx, gy))
    })
}

/// Remove end branches no longer than the stroke radius at their junction.
///
/// Such branches run from the centerline into a corner of the stroke
/// outline rather than along a drawn line. A junction whose branches would
/// all be removed is left untouched, so small marks keep their skeleton.
#[must_use = "returns the pruned skeleton"]
pub fn prune_spurs(skeleton: &Mask, field: &DistanceField) -> Mask {
    let graph = SkeletonGraph::build(skeleton);
    let g = graph.graph();
    let mut pruned = skeleton.clone();

    for junction in graph.nodes_of_kind(NodeKind::Junction) {
        let (jx, jy) = g[junction].pixel;
        let radius = field.get_pixel(jx, jy).0[0];
        let (spurs, kept): (Vec<_>, Vec<_>) =
            graph.outgoing(junction).into_iter().partition(|(edge, chain)| {
                let ends_free = g.edge_endpoints(*edge).is_some_and(|(a, b)| {
                    let other = if a == junction { b } else { a };
                    g[other].kind == NodeKind::Endpoint
                });
                ends_free && chain_length(chain) <= radius
            });
        if kept.is_empty() {
            continue;
        }
        for (_, chain) in spurs {
            for &(x, y) in &chain[1..] {
                pruned.put_pixel(x, y, image::Luma([0]));
            }
        }
    }
    pruned
}

fn chain_length(chain: &[crate::graph::Pixel]) -> f64 {
    chain
        .windows(2)
        .map(|w| {
            Point::new(f64::from(w[0].0), f64::from(w[0].1))
                .distance(Point::new(f64::from(w[1].0), f64::from(w[1].1)))
        })
        .sum()
}

/// Share of positive distances below which medial-axis pixels are noise.
const MEDIAL_AXIS_PERCENTILE: f64 = 0.10;

/// Drop skeleton pixels whose distance is below the 10th percentile of
/// all positive distances in the field.
#[must_use = "returns the filtered mask"]
pub fn filter_low_distance(skeleton: &Mask, field: &DistanceField) -> Mask {
    let mut positive: Vec<f64> = field.pixels().map(|p| p.0[0]).filter(|&d| d > 0.0).collect();
    if positive.is_empty() {
        return skeleton.clone();
    }
    positive.sort_by(f64::total_cmp);
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    let rank = ((positive.len() - 1) as f64 * MEDIAL_AXIS_PERCENTILE).floor() as usize;
    let cutoff = positive[rank];
    mask::from_predicate(skeleton.width(), skeleton.height(), |x, y| {
        mask::is_on(skeleton, x, y) && field.get_pixel(x, y).0[0] >= cutoff
    })
}
