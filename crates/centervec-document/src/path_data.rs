//! Drawing-command strings (the SVG `d` attribute).
//!
//! [`encode`] writes the canonical form: absolute commands, numbers with
//! at most two decimals, `x,y` pairs, single spaces. [`decode`] accepts
//! the full SVG path grammar via the [`svg`] crate's parser and lowers it
//! to the command subset of [`PathCommand`]: relative commands become
//! absolute, smooth curves (`S`/`T`) get their reflected control point
//! spelled out, and elliptical arcs become straight lines to their
//! endpoint.
//!
//! The parser reads numbers as `f32`. Canonical output therefore
//! round-trips exactly only while every coordinate stays below
//! [`EXACT_LIMIT`] in magnitude; beyond it the second decimal can drift.

use std::fmt::Write;

use svg::node::element::path::{Command, Data, Parameters, Position};

use centervec_pipeline::{PathCommand, Point};

/// Decimal places kept by [`format_number`].
pub const PRECISION: usize = 2;

/// Largest coordinate magnitude whose two-decimal form survives [`decode`].
///
/// Half an `f32` step stays below `0.005` up to `2^16`.
pub const EXACT_LIMIT: f64 = 65_536.0;

/// Errors from [`decode`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PathDataError {
    /// The string is not valid path-data syntax.
    #[error("{0}")]
    Syntax(String),

    /// A command's parameter count is not a multiple of its group size.
    #[error("`{command}` takes parameters in groups of {group}, got {count}")]
    Arity {
        /// Command letter.
        command: char,
        /// Parameters per group.
        group: usize,
        /// Parameters supplied.
        count: usize,
    },

    /// Drawing commands appear before the first move-to.
    #[error("path data must start with a move-to")]
    MissingMoveTo,
}

/// Format one coordinate: fixed precision, trailing zeros trimmed,
/// negative zero written as `0`.
#[must_use]
pub fn format_number(value: f64) -> String {
    let mut s = format!("{value:.PRECISION$}");
    if s.contains('.') {
        let trimmed = s.trim_end_matches('0').trim_end_matches('.').len();
        s.truncate(trimmed);
    }
    if s == "-0" {
        s = "0".to_string();
    }
    s
}

fn write_point(out: &mut String, p: Point) {
    let _ = write!(out, "{},{}", format_number(p.x), format_number(p.y));
}

/// Serialize commands to a canonical path-data string.
///
/// # Examples
///
/// ```
/// use centervec_document::path_data::encode;
/// use centervec_pipeline::{PathCommand, Point};
///
/// let d = encode(&[
///     PathCommand::MoveTo(Point::new(10.0, 20.5)),
///     PathCommand::HorizontalTo(30.0),
///     PathCommand::Close,
/// ]);
/// assert_eq!(d, "M10,20.5 H30 Z");
/// ```
#[must_use]
pub fn encode(commands: &[PathCommand]) -> String {
    let mut out = String::new();
    for (i, command) in commands.iter().enumerate() {
        if i > 0 {
            out.push(' ');
        }
        match *command {
            PathCommand::MoveTo(p) => {
                out.push('M');
                write_point(&mut out, p);
            }
            PathCommand::LineTo(p) => {
                out.push('L');
                write_point(&mut out, p);
            }
            PathCommand::HorizontalTo(x) => {
                let _ = write!(out, "H{}", format_number(x));
            }
            PathCommand::VerticalTo(y) => {
                let _ = write!(out, "V{}", format_number(y));
            }
            PathCommand::QuadTo { ctrl, to } => {
                out.push('Q');
                write_point(&mut out, ctrl);
                out.push(' ');
                write_point(&mut out, to);
            }
            PathCommand::CubicTo { ctrl1, ctrl2, to } => {
                out.push('C');
                write_point(&mut out, ctrl1);
                out.push(' ');
                write_point(&mut out, ctrl2);
                out.push(' ');
                write_point(&mut out, to);
            }
            PathCommand::Close => out.push('Z'),
        }
    }
    out
}

/// Parse a path-data string into absolute commands.
///
/// # Errors
///
/// Returns [`PathDataError`] for malformed syntax, wrong parameter
/// counts, or drawing before the first move-to.
///
/// Coordinates at or above [`EXACT_LIMIT`] lose precision.
pub fn decode(d: &str) -> Result<Vec<PathCommand>, PathDataError> {
    let data = Data::parse(d).map_err(|e| PathDataError::Syntax(e.to_string()))?;
    let mut lowering = Lowering::new();
    for command in data.iter() {
        lowering.apply(command)?;
    }
    match lowering.out.first() {
        None | Some(PathCommand::MoveTo(_)) => Ok(lowering.out),
        Some(_) => Err(PathDataError::MissingMoveTo),
    }
}

/// Pen state while lowering parsed commands.
struct Lowering {
    out: Vec<PathCommand>,
    current: Point,
    start: Point,
    /// Second control point of the previous `C`/`S`, for `S` reflection.
    cubic_ctrl: Option<Point>,
    /// Control point of the previous `Q`/`T`, for `T` reflection.
    quad_ctrl: Option<Point>,
}

impl Lowering {
    const fn new() -> Self {
        let origin = Point::new(0.0, 0.0);
        Self {
            out: Vec::new(),
            current: origin,
            start: origin,
            cubic_ctrl: None,
            quad_ctrl: None,
        }
    }

    fn point(&self, relative: bool, x: f32, y: f32) -> Point {
        let p = Point::new(f64::from(x), f64::from(y));
        if relative {
            Point::new(self.current.x + p.x, self.current.y + p.y)
        } else {
            p
        }
    }

    fn reflect(&self, ctrl: Option<Point>) -> Point {
        ctrl.map_or(self.current, |c| {
            Point::new(2.0f64.mul_add(self.current.x, -c.x), 2.0f64.mul_add(self.current.y, -c.y))
        })
    }

    fn emit(&mut self, command: PathCommand, to: Point) {
        self.cubic_ctrl = match command {
            PathCommand::CubicTo { ctrl2, .. } => Some(ctrl2),
            _ => None,
        };
        self.quad_ctrl = match command {
            PathCommand::QuadTo { ctrl, .. } => Some(ctrl),
            _ => None,
        };
        self.out.push(command);
        self.current = to;
    }

    fn apply(&mut self, command: &Command) -> Result<(), PathDataError> {
        match command {
            Command::Move(position, params) => {
                let relative = is_relative(position);
                for (i, g) in groups(params, 2, 'M')?.enumerate() {
                    let p = self.point(relative, g[0], g[1]);
                    if i == 0 {
                        self.start = p;
                        self.emit(PathCommand::MoveTo(p), p);
                    } else {
                        self.emit(PathCommand::LineTo(p), p);
                    }
                }
            }
            Command::Line(position, params) => {
                let relative = is_relative(position);
                for g in groups(params, 2, 'L')? {
                    let p = self.point(relative, g[0], g[1]);
                    self.emit(PathCommand::LineTo(p), p);
                }
            }
            Command::HorizontalLine(position, params) => {
                let relative = is_relative(position);
                for g in groups(params, 1, 'H')? {
                    let x = f64::from(g[0]) + if relative { self.current.x } else { 0.0 };
                    self.emit(PathCommand::HorizontalTo(x), Point::new(x, self.current.y));
                }
            }
            Command::VerticalLine(position, params) => {
                let relative = is_relative(position);
                for g in groups(params, 1, 'V')? {
                    let y = f64::from(g[0]) + if relative { self.current.y } else { 0.0 };
                    self.emit(PathCommand::VerticalTo(y), Point::new(self.current.x, y));
                }
            }
            Command::QuadraticCurve(position, params) => {
                let relative = is_relative(position);
                for g in groups(params, 4, 'Q')? {
                    let ctrl = self.point(relative, g[0], g[1]);
                    let to = self.point(relative, g[2], g[3]);
                    self.emit(PathCommand::QuadTo { ctrl, to }, to);
                }
            }
            Command::SmoothQuadraticCurve(position, params) => {
                let relative = is_relative(position);
                for g in groups(params, 2, 'T')? {
                    let ctrl = self.reflect(self.quad_ctrl);
                    let to = self.point(relative, g[0], g[1]);
                    self.emit(PathCommand::QuadTo { ctrl, to }, to);
                }
            }
            Command::CubicCurve(position, params) => {
                let relative = is_relative(position);
                for g in groups(params, 6, 'C')? {
                    let ctrl1 = self.point(relative, g[0], g[1]);
                    let ctrl2 = self.point(relative, g[2], g[3]);
                    let to = self.point(relative, g[4], g[5]);
                    self.emit(PathCommand::CubicTo { ctrl1, ctrl2, to }, to);
                }
            }
            Command::SmoothCubicCurve(position, params) => {
                let relative = is_relative(position);
                for g in groups(params, 4, 'S')? {
                    let ctrl1 = self.reflect(self.cubic_ctrl);
                    let ctrl2 = self.point(relative, g[0], g[1]);
                    let to = self.point(relative, g[2], g[3]);
                    self.emit(PathCommand::CubicTo { ctrl1, ctrl2, to }, to);
                }
            }
            Command::EllipticalArc(position, params) => {
                let relative = is_relative(position);
                for g in groups(params, 7, 'A')? {
                    let to = self.point(relative, g[5], g[6]);
                    self.emit(PathCommand::LineTo(to), to);
                }
            }
            Command::Close => {
                let start = self.start;
                self.emit(PathCommand::Close, start);
            }
        }
        Ok(())
    }
}

const fn is_relative(position: &Position) -> bool {
    matches!(position, Position::Relative)
}

fn groups<'a>(
    params: &'a Parameters,
    group: usize,
    command: char,
) -> Result<std::slice::ChunksExact<'a, f32>, PathDataError> {
    let count = params.len();
    if count == 0 || !count.is_multiple_of(group) {
        return Err(PathDataError::Arity {
            command,
            group,
            count,
        });
    }
    Ok(params.chunks_exact(group))
}
