//! Curve fitting: turn simplified centerlines into drawing commands.
//!
//! With smoothing enabled, each segment between consecutive points becomes
//! a Bezier curve whose control points follow the Catmull-Rom tangents of
//! the neighboring points. The `smoothing` level scales those tangents:
//! `0` yields straight segments, `2` is the classic Catmull-Rom spline and
//! the scale stops growing at `4`.
//!
//! Straight output uses `H`/`V` for axis-aligned segments and `L`
//! otherwise. Closed paths end with `Z`.
//!
//! If a fitted curve has non-finite coordinates the path is refitted with
//! the next simpler shape (`Cubic -> Quadratic -> Linear`) and the
//! substitution is reported.

use std::fmt;

use log::warn;
use serde::{Deserialize, Serialize};

use crate::types::{CurvePathData, PathCommand, Point, TracedPath};

/// Which Bezier family to fit when smoothing is enabled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CurveKind {
    /// Cubic Bezier segments (`C`) with Catmull-Rom control points.
    #[default]
    Cubic,
    /// Quadratic Bezier segments (`Q`) approximating the cubic ones.
    Quadratic,
}

/// The geometry actually emitted for a path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CurveShape {
    /// Cubic Bezier segments.
    Cubic,
    /// Quadratic Bezier segments.
    Quadratic,
    /// Straight segments.
    Linear,
}

impl CurveShape {
    /// Every shape in fallback precedence order.
    pub const PRECEDENCE: [Self; 3] = [Self::Cubic, Self::Quadratic, Self::Linear];

    /// This shape followed by every simpler one.
    #[must_use]
    pub fn fallback_chain(self) -> &'static [Self] {
        let start = Self::PRECEDENCE
            .iter()
            .position(|&s| s == self)
            .unwrap_or(0);
        &Self::PRECEDENCE[start..]
    }
}

impl From<CurveKind> for CurveShape {
    fn from(kind: CurveKind) -> Self {
        match kind {
            CurveKind::Cubic => Self::Cubic,
            CurveKind::Quadratic => Self::Quadratic,
        }
    }
}

impl fmt::Display for CurveShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cubic => f.write_str("cubic"),
            Self::Quadratic => f.write_str("quadratic"),
            Self::Linear => f.write_str("linear"),
        }
    }
}

/// Curve fitting parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SmoothParams {
    /// Fit curves at all; `false` emits straight segments.
    pub bezier: bool,
    /// Curve strength (`0` = straight).
    pub level: f64,
    /// Bezier family to fit.
    pub kind: CurveKind,
}

impl SmoothParams {
    /// Tangent scale above which `level` has no further effect.
    pub const MAX_LEVEL: f64 = 4.0;

    /// The shape requested by these parameters.
    #[must_use]
    pub fn requested_shape(self) -> CurveShape {
        if self.bezier && self.level > 0.0 {
            CurveShape::from(self.kind)
        } else {
            CurveShape::Linear
        }
    }

    /// Fraction of the neighbor chord used as the control-point offset.
    fn tangent_factor(self) -> f64 {
        self.level.clamp(0.0, Self::MAX_LEVEL) / 12.0
    }
}

/// A path whose fitted shape differs from the requested one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurveFallback {
    /// Index of the path in the smoothed sequence.
    pub path: usize,
    /// Shape that was asked for.
    pub requested: CurveShape,
    /// Shape that was emitted.
    pub used: CurveShape,
}

/// Output of [`smooth_paths`].
#[derive(Debug, Clone, PartialEq)]
pub struct Smoothing {
    /// Command sequences, one per input path.
    pub paths: Vec<CurvePathData>,
    /// Paths that needed a simpler shape.
    pub fallbacks: Vec<CurveFallback>,
}

/// Fit drawing commands through one path.
///
/// Returns the commands and the shape that was finally emitted.
#[must_use = "returns the fitted commands"]
pub fn smooth(path: &TracedPath, params: SmoothParams) -> (CurvePathData, CurveShape) {
    let requested = params.requested_shape();
    let mut last = requested;
    for &shape in requested.fallback_chain() {
        last = shape;
        let commands = commands_for(path, shape, params.tangent_factor());
        if shape == CurveShape::Linear || commands.iter().all(command_is_finite) {
            return (
                CurvePathData {
                    commands,
                    source: path.clone(),
                },
                shape,
            );
        }
    }
    (
        CurvePathData {
            commands: commands_for(path, last, 0.0),
            source: path.clone(),
        },
        last,
    )
}

/// Fit drawing commands through every path, recording fallbacks.
#[must_use = "returns the fitted paths"]
pub fn smooth_paths(paths: &[TracedPath], params: SmoothParams) -> Smoothing {
    let requested = params.requested_shape();
    let mut fallbacks = Vec::new();
    let paths = paths
        .iter()
        .enumerate()
        .map(|(i, path)| {
            let (data, used) = smooth(path, params);
            if used != requested {
                warn!("smooth: path {i} fell back from {requested} to {used}");
                fallbacks.push(CurveFallback {
                    path: i,
                    requested,
                    used,
                });
            }
            data
        })
        .collect();
    Smoothing { paths, fallbacks }
}

fn commands_for(path: &TracedPath, shape: CurveShape, factor: f64) -> Vec<PathCommand> {
    let points = path.polyline.points();
    let Some(&start) = points.first() else {
        return Vec::new();
    };

    let mut commands = vec![PathCommand::MoveTo(start)];
    let n = points.len();
    let closed = path.closed && n > 2;
    let segments = if closed { n } else { n - 1 };

    for i in 0..segments {
        let p1 = points[i];
        let p2 = points[(i + 1) % n];

        if shape == CurveShape::Linear {
            // Z draws the closing segment.
            if !(closed && i + 1 == n) {
                commands.push(line_command(p1, p2));
            }
            continue;
        }

        let p0 = if i > 0 || closed {
            points[(i + n - 1) % n]
        } else {
            p1
        };
        let p3 = if i + 2 < n || closed {
            points[(i + 2) % n]
        } else {
            p2
        };
        let ctrl1 = Point::new(
            factor.mul_add(p2.x - p0.x, p1.x),
            factor.mul_add(p2.y - p0.y, p1.y),
        );
        let ctrl2 = Point::new(
            factor.mul_add(-(p3.x - p1.x), p2.x),
            factor.mul_add(-(p3.y - p1.y), p2.y),
        );

        if on_chord(ctrl1, p1, p2) && on_chord(ctrl2, p1, p2) {
            commands.push(line_command(p1, p2));
        } else if shape == CurveShape::Cubic {
            commands.push(PathCommand::CubicTo { ctrl1, ctrl2, to: p2 });
        } else {
            // Midpoint of the two single-control approximations of the cubic.
            let ctrl = Point::new(
                (3.0f64.mul_add(ctrl1.x, -p1.x) + 3.0f64.mul_add(ctrl2.x, -p2.x)) / 4.0,
                (3.0f64.mul_add(ctrl1.y, -p1.y) + 3.0f64.mul_add(ctrl2.y, -p2.y)) / 4.0,
            );
            commands.push(PathCommand::QuadTo { ctrl, to: p2 });
        }
    }

    if closed {
        commands.push(PathCommand::Close);
    }
    commands
}

fn line_command(from: Point, to: Point) -> PathCommand {
    if to.y == from.y && to.x != from.x {
        PathCommand::HorizontalTo(to.x)
    } else if to.x == from.x && to.y != from.y {
        PathCommand::VerticalTo(to.y)
    } else {
        PathCommand::LineTo(to)
    }
}

/// Whether `c` lies on the segment `a`-`b` (within rounding).
fn on_chord(c: Point, a: Point, b: Point) -> bool {
    let (dx, dy) = (b.x - a.x, b.y - a.y);
    let cross = dx.mul_add(c.y - a.y, -(dy * (c.x - a.x)));
    let len = dx.hypot(dy);
    if len <= f64::EPSILON {
        return c.distance(a) <= 1e-9;
    }
    let along = dx.mul_add(c.x - a.x, dy * (c.y - a.y)) / (len * len);
    (cross / len).abs() <= 1e-9 && (-1e-9..=1.0 + 1e-9).contains(&along)
}

const fn command_is_finite(command: &PathCommand) -> bool {
    match *command {
        PathCommand::MoveTo(p) | PathCommand::LineTo(p) => p.is_finite(),
        PathCommand::HorizontalTo(v) | PathCommand::VerticalTo(v) => v.is_finite(),
        PathCommand::QuadTo { ctrl, to } => ctrl.is_finite() && to.is_finite(),
        PathCommand::CubicTo { ctrl1, ctrl2, to } => {
            ctrl1.is_finite() && ctrl2.is_finite() && to.is_finite()
        }
        PathCommand::Close => true,
    }
}
