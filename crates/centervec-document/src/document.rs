//! The in-memory vector document: ordered curve paths, their styles, and
//! the canvas they are drawn on.

use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use centervec_pipeline::{Dimensions, PathCommand, Point};

/// Errors raised while building, parsing, or editing a document.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, Serialize, Deserialize)]
pub enum DocumentError {
    /// The document text is not well-formed.
    #[error("failed to parse document: {0}")]
    Parse(String),

    /// A path's drawing-command string could not be decoded.
    #[error("invalid path data in `{id}`: {message}")]
    PathData {
        /// Identifier of the offending path.
        id: String,
        /// What was wrong with it.
        message: String,
    },

    /// A color attribute is not a recognized hex color.
    #[error("invalid color `{0}`")]
    InvalidColor(String),

    /// Two paths share an identifier.
    #[error("duplicate path id `{0}`")]
    DuplicateId(String),
}

// ─── Colors ──────────────────────────────────────────────────────────

/// An sRGB color with alpha, serialized as `#RRGGBBAA`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Rgba {
    /// Red channel.
    pub r: u8,
    /// Green channel.
    pub g: u8,
    /// Blue channel.
    pub b: u8,
    /// Alpha channel (`255` is opaque).
    pub a: u8,
}

impl Rgba {
    /// Opaque black.
    pub const BLACK: Self = Self::new(0, 0, 0, 255);

    /// Create a color from its four channels.
    #[must_use]
    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    /// Opaque color from an RGB triple.
    #[must_use]
    pub const fn opaque([r, g, b]: [u8; 3]) -> Self {
        Self::new(r, g, b, 255)
    }
}

impl fmt::Display for Rgba {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02X}{:02X}{:02X}{:02X}", self.r, self.g, self.b, self.a)
    }
}

/// Accepts `#RGB`, `#RRGGBB`, and `#RRGGBBAA` (case-insensitive).
impl FromStr for Rgba {
    type Err = DocumentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || DocumentError::InvalidColor(s.to_string());
        let hex = s.trim().strip_prefix('#').ok_or_else(invalid)?;
        if !hex.is_ascii() {
            return Err(invalid());
        }
        let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).map_err(|_| invalid());
        match hex.len() {
            3 => {
                let digit = |i: usize| {
                    u8::from_str_radix(&hex[i..=i], 16)
                        .map(|v| v * 17)
                        .map_err(|_| invalid())
                };
                Ok(Self::new(digit(0)?, digit(1)?, digit(2)?, 255))
            }
            6 => Ok(Self::new(channel(0)?, channel(2)?, channel(4)?, 255)),
            8 => Ok(Self::new(channel(0)?, channel(2)?, channel(4)?, channel(6)?)),
            _ => Err(invalid()),
        }
    }
}

impl TryFrom<String> for Rgba {
    type Error = DocumentError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Rgba> for String {
    fn from(value: Rgba) -> Self {
        value.to_string()
    }
}

/// A stroke or fill paint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Paint {
    /// Nothing is painted (`none`).
    None,
    /// A solid color.
    Color(Rgba),
}

impl fmt::Display for Paint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => f.write_str("none"),
            Self::Color(color) => color.fmt(f),
        }
    }
}

impl FromStr for Paint {
    type Err = DocumentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "none" => Ok(Self::None),
            "black" => Ok(Self::Color(Rgba::BLACK)),
            "white" => Ok(Self::Color(Rgba::opaque([255, 255, 255]))),
            other => other.parse().map(Self::Color),
        }
    }
}

// ─── Style ───────────────────────────────────────────────────────────

/// Shape at the ends of open strokes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LineCap {
    /// Flat, flush with the endpoint.
    Butt,
    /// Semicircular.
    #[default]
    Round,
    /// Flat, extended by half the stroke width.
    Square,
}

/// Shape at stroke corners.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LineJoin {
    /// Sharp corner.
    Miter,
    /// Rounded corner.
    #[default]
    Round,
    /// Clipped corner.
    Bevel,
}

/// Interior test for filled paths.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FillRule {
    /// Non-zero winding.
    #[default]
    NonZero,
    /// Even-odd.
    EvenOdd,
}

/// Keyword form shared by the style enums.
pub trait Keyword: Sized + Copy + PartialEq + 'static {
    /// Every variant paired with its SVG keyword.
    const KEYWORDS: &'static [(Self, &'static str)];

    /// The SVG keyword.
    #[must_use]
    fn keyword(self) -> &'static str {
        Self::KEYWORDS
            .iter()
            .find(|(value, _)| *value == self)
            .map_or("", |(_, word)| *word)
    }

    /// Parse an SVG keyword.
    #[must_use]
    fn from_keyword(word: &str) -> Option<Self> {
        Self::KEYWORDS
            .iter()
            .find(|(_, w)| *w == word.trim())
            .map(|(value, _)| *value)
    }
}

impl Keyword for LineCap {
    const KEYWORDS: &'static [(Self, &'static str)] = &[
        (Self::Butt, "butt"),
        (Self::Round, "round"),
        (Self::Square, "square"),
    ];
}

impl Keyword for LineJoin {
    const KEYWORDS: &'static [(Self, &'static str)] = &[
        (Self::Miter, "miter"),
        (Self::Round, "round"),
        (Self::Bevel, "bevel"),
    ];
}

impl Keyword for FillRule {
    const KEYWORDS: &'static [(Self, &'static str)] =
        &[(Self::NonZero, "nonzero"), (Self::EvenOdd, "evenodd")];
}

/// Presentation attributes of one path.
///
/// Every field is optional: `None` means the attribute is absent and the
/// renderer's inherited value applies.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathStyle {
    /// Stroke paint.
    pub stroke: Option<Paint>,
    /// Stroke width in canvas units.
    pub stroke_width: Option<f64>,
    /// Fill paint.
    pub fill: Option<Paint>,
    /// Fill rule.
    pub fill_rule: Option<FillRule>,
    /// Whole-element opacity in `0.0..=1.0`.
    pub opacity: Option<f64>,
    /// End cap shape.
    pub stroke_linecap: Option<LineCap>,
    /// Corner join shape.
    pub stroke_linejoin: Option<LineJoin>,
}

// ─── Paths ───────────────────────────────────────────────────────────

/// One path of a document: identity, drawing commands, and style.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurvePath {
    /// Identifier, unique within the document.
    pub id: String,
    /// Class names, in document order.
    pub classes: Vec<String>,
    /// Absolute drawing commands.
    pub commands: Vec<PathCommand>,
    /// Presentation attributes.
    pub style: PathStyle,
    /// Attributes this crate does not interpret, kept verbatim.
    pub extra: BTreeMap<String, String>,
}

/// Subdivisions used when flattening one curve segment.
pub const CURVE_STEPS: u32 = 8;

impl CurvePath {
    /// A path with the given id and commands and an empty style.
    #[must_use]
    pub fn new(id: impl Into<String>, commands: Vec<PathCommand>) -> Self {
        Self {
            id: id.into(),
            classes: Vec::new(),
            commands,
            style: PathStyle::default(),
            extra: BTreeMap::new(),
        }
    }

    /// On-curve points in drawing order (command endpoints, with `H`/`V`
    /// resolved against the current point; `Z` adds nothing).
    #[must_use]
    pub fn vertices(&self) -> Vec<Point> {
        let mut out = Vec::with_capacity(self.commands.len());
        let mut current = Point::new(0.0, 0.0);
        for command in &self.commands {
            let next = match *command {
                PathCommand::MoveTo(p) | PathCommand::LineTo(p) => p,
                PathCommand::HorizontalTo(x) => Point::new(x, current.y),
                PathCommand::VerticalTo(y) => Point::new(current.x, y),
                PathCommand::QuadTo { to, .. } | PathCommand::CubicTo { to, .. } => to,
                PathCommand::Close => continue,
            };
            out.push(next);
            current = next;
        }
        out
    }

    /// Approximate the path as polylines, one per subpath.
    ///
    /// Curves are evaluated at [`CURVE_STEPS`] uniform parameter steps.
    /// A closed subpath repeats its start point at the end.
    #[must_use]
    pub fn flatten(&self) -> Vec<Vec<Point>> {
        let mut subpaths: Vec<Vec<Point>> = Vec::new();
        let mut current = Point::new(0.0, 0.0);
        let mut start = current;
        for command in &self.commands {
            match *command {
                PathCommand::MoveTo(p) => {
                    subpaths.push(vec![p]);
                    current = p;
                    start = p;
                    continue;
                }
                PathCommand::Close => {
                    if current != start {
                        push_point(&mut subpaths, current, start);
                    }
                    current = start;
                    continue;
                }
                PathCommand::LineTo(p) => push_point(&mut subpaths, current, p),
                PathCommand::HorizontalTo(x) => {
                    push_point(&mut subpaths, current, Point::new(x, current.y));
                }
                PathCommand::VerticalTo(y) => {
                    push_point(&mut subpaths, current, Point::new(current.x, y));
                }
                PathCommand::QuadTo { ctrl, to } => {
                    for step in 1..=CURVE_STEPS {
                        let t = f64::from(step) / f64::from(CURVE_STEPS);
                        let a = current.lerp(ctrl, t);
                        let b = ctrl.lerp(to, t);
                        push_point(&mut subpaths, current, a.lerp(b, t));
                    }
                }
                PathCommand::CubicTo { ctrl1, ctrl2, to } => {
                    for step in 1..=CURVE_STEPS {
                        let t = f64::from(step) / f64::from(CURVE_STEPS);
                        let ab = current.lerp(ctrl1, t);
                        let bc = ctrl1.lerp(ctrl2, t);
                        let cd = ctrl2.lerp(to, t);
                        let abc = ab.lerp(bc, t);
                        let bcd = bc.lerp(cd, t);
                        push_point(&mut subpaths, current, abc.lerp(bcd, t));
                    }
                }
            }
            current = command_end(*command, current);
        }
        subpaths
    }

    /// Drawn length of the flattened path.
    #[must_use]
    pub fn length(&self) -> f64 {
        self.flatten()
            .iter()
            .flat_map(|points| points.windows(2).map(|w| w[0].distance(w[1])))
            .sum()
    }

    /// Axis-aligned bounds of the flattened path as `(min, max)`.
    #[must_use]
    pub fn bounds(&self) -> Option<(Point, Point)> {
        let flat = self.flatten();
        let mut points = flat.iter().flatten();
        let first = *points.next()?;
        Some(points.fold((first, first), |(lo, hi), p| {
            (
                Point::new(lo.x.min(p.x), lo.y.min(p.y)),
                Point::new(hi.x.max(p.x), hi.y.max(p.y)),
            )
        }))
    }

    /// Start and end of a path made of one unclosed subpath whose ends differ.
    #[must_use]
    pub fn open_ends(&self) -> Option<(Point, Point)> {
        let (first, rest) = self.commands.split_first()?;
        let single = matches!(first, PathCommand::MoveTo(_))
            && !rest
                .iter()
                .any(|c| matches!(c, PathCommand::MoveTo(_) | PathCommand::Close));
        if !single {
            return None;
        }
        let vertices = self.vertices();
        let (&start, &end) = (vertices.first()?, vertices.last()?);
        (start != end).then_some((start, end))
    }

    /// The same drawing traversed end to start.
    ///
    /// Only meaningful for a single unclosed subpath (see [`Self::open_ends`]);
    /// `Z` and inner `M` commands are dropped. Curves keep their shape with
    /// control points swapped.
    #[must_use]
    pub fn reversed_commands(&self) -> Vec<PathCommand> {
        let mut current = Point::new(0.0, 0.0);
        let mut segments = Vec::with_capacity(self.commands.len());
        for &command in &self.commands {
            segments.push((current, command));
            current = command_end(command, current);
        }

        let mut out = Vec::with_capacity(segments.len());
        out.push(PathCommand::MoveTo(current));
        for &(start, command) in segments.iter().rev() {
            out.push(match command {
                PathCommand::MoveTo(_) | PathCommand::Close => continue,
                PathCommand::LineTo(_) => PathCommand::LineTo(start),
                PathCommand::HorizontalTo(_) => PathCommand::HorizontalTo(start.x),
                PathCommand::VerticalTo(_) => PathCommand::VerticalTo(start.y),
                PathCommand::QuadTo { ctrl, .. } => PathCommand::QuadTo { ctrl, to: start },
                PathCommand::CubicTo { ctrl1, ctrl2, .. } => PathCommand::CubicTo {
                    ctrl1: ctrl2,
                    ctrl2: ctrl1,
                    to: start,
                },
            });
        }
        out
    }

    /// Value of a named attribute as it would be serialized.
    ///
    /// Covers `id`, `class`, the style attributes, and pass-through
    /// attributes; `d` is not exposed here.
    #[must_use]
    pub fn attribute(&self, name: &str) -> Option<String> {
        let style = &self.style;
        let typed = match name {
            "id" => Some(self.id.clone()),
            "class" => (!self.classes.is_empty()).then(|| self.classes.join(" ")),
            "stroke" => style.stroke.map(|p| p.to_string()),
            "stroke-width" => style.stroke_width.map(crate::path_data::format_number),
            "fill" => style.fill.map(|p| p.to_string()),
            "fill-rule" => style.fill_rule.map(|r| r.keyword().to_string()),
            "opacity" => style.opacity.map(crate::path_data::format_number),
            "stroke-linecap" => style.stroke_linecap.map(|c| c.keyword().to_string()),
            "stroke-linejoin" => style.stroke_linejoin.map(|j| j.keyword().to_string()),
            _ => None,
        };
        typed.or_else(|| self.extra.get(name).cloned())
    }
}

fn push_point(subpaths: &mut Vec<Vec<Point>>, current: Point, point: Point) {
    match subpaths.last_mut() {
        Some(last) => last.push(point),
        None => subpaths.push(vec![current, point]),
    }
}

fn command_end(command: PathCommand, current: Point) -> Point {
    match command {
        PathCommand::MoveTo(p) | PathCommand::LineTo(p) => p,
        PathCommand::HorizontalTo(x) => Point::new(x, current.y),
        PathCommand::VerticalTo(y) => Point::new(current.x, y),
        PathCommand::QuadTo { to, .. } | PathCommand::CubicTo { to, .. } => to,
        PathCommand::Close => current,
    }
}

// ─── Document ────────────────────────────────────────────────────────

/// Free-form creation metadata carried in the document header.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DocumentMetadata {
    /// Creation timestamp, as supplied by the caller (RFC 3339 by convention).
    pub created: Option<String>,
    /// Name and version of the producing tool.
    pub generator: Option<String>,
    /// Echoed creation parameters.
    pub parameters: Option<serde_json::Value>,
}

/// An ordered collection of paths on a canvas.
///
/// Path order is paint order. Identifiers are unique; every mutation
/// offered here preserves that.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "DocumentFields")]
pub struct VectorDocument {
    /// Canvas size in pixels.
    pub canvas: Dimensions,
    /// Creation metadata.
    pub metadata: DocumentMetadata,
    pub(crate) paths: Vec<CurvePath>,
}

/// Unchecked deserialized form; goes through [`VectorDocument::from_paths`].
#[derive(Deserialize)]
struct DocumentFields {
    canvas: Dimensions,
    #[serde(default)]
    metadata: DocumentMetadata,
    #[serde(default)]
    paths: Vec<CurvePath>,
}

impl TryFrom<DocumentFields> for VectorDocument {
    type Error = DocumentError;

    fn try_from(fields: DocumentFields) -> Result<Self, Self::Error> {
        Self::from_paths(fields.canvas, fields.metadata, fields.paths)
    }
}

impl VectorDocument {
    /// An empty document.
    #[must_use]
    pub fn new(canvas: Dimensions) -> Self {
        Self {
            canvas,
            metadata: DocumentMetadata::default(),
            paths: Vec::new(),
        }
    }

    /// Build a document from existing paths.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentError::DuplicateId`] if two paths share an id.
    pub fn from_paths(
        canvas: Dimensions,
        metadata: DocumentMetadata,
        paths: Vec<CurvePath>,
    ) -> Result<Self, DocumentError> {
        let mut seen = HashSet::with_capacity(paths.len());
        for path in &paths {
            if !seen.insert(path.id.as_str()) {
                return Err(DocumentError::DuplicateId(path.id.clone()));
            }
        }
        Ok(Self {
            canvas,
            metadata,
            paths,
        })
    }

    /// Paths in document order.
    #[must_use]
    pub fn paths(&self) -> &[CurvePath] {
        &self.paths
    }

    /// Number of paths.
    #[must_use]
    pub fn len(&self) -> usize {
        self.paths.len()
    }

    /// Whether the document has no paths.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    /// Look up a path by id.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&CurvePath> {
        self.paths.iter().find(|p| p.id == id)
    }

    /// Append a path.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentError::DuplicateId`] if the id is taken.
    pub fn push(&mut self, path: CurvePath) -> Result<(), DocumentError> {
        if self.get(&path.id).is_some() {
            return Err(DocumentError::DuplicateId(path.id));
        }
        self.paths.push(path);
        Ok(())
    }

    /// Smallest `path<N>` identifier not in use.
    #[must_use]
    pub fn next_free_id(&self) -> String {
        let taken: HashSet<&str> = self.paths.iter().map(|p| p.id.as_str()).collect();
        (0..)
            .map(path_id)
            .find(|id| !taken.contains(id.as_str()))
            .unwrap_or_default()
    }

    /// Reassign ids `path0..path(N-1)` in document order.
    pub fn renumber_ids(&mut self) {
        for (index, path) in self.paths.iter_mut().enumerate() {
            path.id = path_id(index);
        }
    }
}

/// The canonical identifier of the path at `index`.
#[must_use]
pub fn path_id(index: usize) -> String {
    format!("path{index}")
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn line(id: &str, from: (f64, f64), to: (f64, f64)) -> CurvePath {
        CurvePath::new(
            id,
            vec![
                PathCommand::MoveTo(Point::new(from.0, from.1)),
                PathCommand::LineTo(Point::new(to.0, to.1)),
            ],
        )
    }

    fn canvas() -> Dimensions {
        Dimensions {
            width: 100,
            height: 100,
        }
    }

    // --- Color tests ---

    #[test]
    fn color_formats_as_eight_hex_digits() {
        assert_eq!(Rgba::new(255, 0, 16, 128).to_string(), "#FF001080");
        assert_eq!(Rgba::BLACK.to_string(), "#000000FF");
    }

    #[test]
    fn color_parses_short_and_long_forms() {
        assert_eq!("#fff".parse::<Rgba>().unwrap(), Rgba::new(255, 255, 255, 255));
        assert_eq!("#102030".parse::<Rgba>().unwrap(), Rgba::new(16, 32, 48, 255));
        assert_eq!("#10203040".parse::<Rgba>().unwrap(), Rgba::new(16, 32, 48, 64));
    }

    #[test]
    fn color_rejects_garbage() {
        for bad in ["", "red", "#12", "#12345", "#GGGGGG", "#ééé"] {
            assert!(
                matches!(bad.parse::<Rgba>(), Err(DocumentError::InvalidColor(_))),
                "{bad}"
            );
        }
    }

    #[test]
    fn paint_none_and_named() {
        assert_eq!("none".parse::<Paint>().unwrap(), Paint::None);
        assert_eq!("black".parse::<Paint>().unwrap(), Paint::Color(Rgba::BLACK));
        assert_eq!(Paint::None.to_string(), "none");
    }

    #[test]
    fn color_serializes_as_string() {
        let json = serde_json::to_string(&Rgba::new(1, 2, 3, 4)).unwrap();
        assert_eq!(json, "\"#01020304\"");
        let back: Rgba = serde_json::from_str(&json).unwrap();
        assert_eq!(back, Rgba::new(1, 2, 3, 4));
    }

    // --- Keyword tests ---

    #[test]
    fn keywords_round_trip() {
        for (cap, word) in LineCap::KEYWORDS {
            assert_eq!(cap.keyword(), *word);
            assert_eq!(LineCap::from_keyword(word), Some(*cap));
        }
        assert_eq!(FillRule::from_keyword("evenodd"), Some(FillRule::EvenOdd));
        assert_eq!(LineJoin::from_keyword("wobbly"), None);
    }

    // --- Geometry tests ---

    #[test]
    fn vertices_resolve_axis_lines() {
        let path = CurvePath::new(
            "p",
            vec![
                PathCommand::MoveTo(Point::new(1.0, 2.0)),
                PathCommand::HorizontalTo(5.0),
                PathCommand::VerticalTo(7.0),
                PathCommand::Close,
            ],
        );
        assert_eq!(
            path.vertices(),
            vec![Point::new(1.0, 2.0), Point::new(5.0, 2.0), Point::new(5.0, 7.0)]
        );
    }

    #[test]
    fn flatten_closes_subpath() {
        let path = CurvePath::new(
            "p",
            vec![
                PathCommand::MoveTo(Point::new(0.0, 0.0)),
                PathCommand::HorizontalTo(10.0),
                PathCommand::VerticalTo(10.0),
                PathCommand::Close,
            ],
        );
        let flat = path.flatten();
        assert_eq!(flat.len(), 1);
        assert_eq!(flat[0].last(), Some(&Point::new(0.0, 0.0)));
        let expected = 20.0 + 200.0_f64.sqrt();
        assert!((path.length() - expected).abs() < 1e-9);
    }

    #[test]
    fn flatten_cubic_ends_on_endpoint() {
        let path = CurvePath::new(
            "p",
            vec![
                PathCommand::MoveTo(Point::new(0.0, 0.0)),
                PathCommand::CubicTo {
                    ctrl1: Point::new(0.0, 10.0),
                    ctrl2: Point::new(10.0, 10.0),
                    to: Point::new(10.0, 0.0),
                },
            ],
        );
        let flat = path.flatten();
        assert_eq!(flat[0].len(), 1 + CURVE_STEPS as usize);
        assert_eq!(flat[0].last(), Some(&Point::new(10.0, 0.0)));
        let (lo, hi) = path.bounds().unwrap();
        assert!((hi.y - 7.5).abs() < 1e-9, "peak {hi:?}");
        assert_eq!(lo, Point::new(0.0, 0.0));
    }

    #[test]
    fn open_ends_only_for_single_open_subpath() {
        let open = line("a", (0.0, 0.0), (5.0, 0.0));
        assert_eq!(
            open.open_ends(),
            Some((Point::new(0.0, 0.0), Point::new(5.0, 0.0)))
        );

        let mut closed = open.clone();
        closed.commands.push(PathCommand::Close);
        assert_eq!(closed.open_ends(), None);

        let mut two = open.clone();
        two.commands.push(PathCommand::MoveTo(Point::new(9.0, 9.0)));
        two.commands.push(PathCommand::LineTo(Point::new(9.0, 1.0)));
        assert_eq!(two.open_ends(), None);

        let mut returning = open;
        returning.commands.push(PathCommand::LineTo(Point::new(0.0, 0.0)));
        assert_eq!(returning.open_ends(), None);
    }

    #[test]
    fn reversed_commands_retrace_the_path() {
        let path = CurvePath::new(
            "p",
            vec![
                PathCommand::MoveTo(Point::new(0.0, 0.0)),
                PathCommand::HorizontalTo(4.0),
                PathCommand::CubicTo {
                    ctrl1: Point::new(5.0, 0.0),
                    ctrl2: Point::new(6.0, 1.0),
                    to: Point::new(6.0, 2.0),
                },
                PathCommand::VerticalTo(7.0),
            ],
        );
        assert_eq!(
            path.reversed_commands(),
            vec![
                PathCommand::MoveTo(Point::new(6.0, 7.0)),
                PathCommand::VerticalTo(2.0),
                PathCommand::CubicTo {
                    ctrl1: Point::new(6.0, 1.0),
                    ctrl2: Point::new(5.0, 0.0),
                    to: Point::new(4.0, 0.0),
                },
                PathCommand::HorizontalTo(0.0),
            ]
        );
        let mut flat = path.flatten().remove(0);
        flat.reverse();
        let back = CurvePath::new("q", path.reversed_commands()).flatten().remove(0);
        assert_eq!(back.len(), flat.len());
        for (a, b) in back.iter().zip(&flat) {
            assert!(a.distance(*b) < 1e-9, "{a:?} vs {b:?}");
        }
    }

    #[test]
    fn attribute_lookup_covers_style_and_extras() {
        let mut path = line("a", (0.0, 0.0), (1.0, 1.0));
        path.classes = vec!["x".into(), "y".into()];
        path.style.stroke = Some(Paint::Color(Rgba::BLACK));
        path.style.stroke_width = Some(2.5);
        path.extra.insert("data-layer".into(), "ink".into());
        assert_eq!(path.attribute("class").as_deref(), Some("x y"));
        assert_eq!(path.attribute("stroke").as_deref(), Some("#000000FF"));
        assert_eq!(path.attribute("stroke-width").as_deref(), Some("2.5"));
        assert_eq!(path.attribute("data-layer").as_deref(), Some("ink"));
        assert_eq!(path.attribute("fill"), None);
    }

    // --- Document tests ---

    #[test]
    fn push_rejects_duplicate_id() {
        let mut doc = VectorDocument::new(canvas());
        doc.push(line("a", (0.0, 0.0), (1.0, 0.0))).unwrap();
        let err = doc.push(line("a", (5.0, 5.0), (6.0, 5.0))).unwrap_err();
        assert_eq!(err, DocumentError::DuplicateId("a".into()));
        assert_eq!(doc.len(), 1);
    }

    #[test]
    fn from_paths_rejects_duplicate_id() {
        let paths = vec![line("x", (0.0, 0.0), (1.0, 0.0)), line("x", (0.0, 1.0), (1.0, 1.0))];
        let result = VectorDocument::from_paths(canvas(), DocumentMetadata::default(), paths);
        assert!(matches!(result, Err(DocumentError::DuplicateId(id)) if id == "x"));
    }

    #[test]
    fn next_free_id_skips_taken() {
        let mut doc = VectorDocument::new(canvas());
        doc.push(line("path0", (0.0, 0.0), (1.0, 0.0))).unwrap();
        doc.push(line("path2", (0.0, 0.0), (1.0, 0.0))).unwrap();
        assert_eq!(doc.next_free_id(), "path1");
    }

    #[test]
    fn renumber_follows_document_order() {
        let paths = vec![line("b", (0.0, 0.0), (1.0, 0.0)), line("a", (0.0, 1.0), (1.0, 1.0))];
        let mut doc =
            VectorDocument::from_paths(canvas(), DocumentMetadata::default(), paths).unwrap();
        doc.renumber_ids();
        let ids: Vec<&str> = doc.paths().iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, ["path0", "path1"]);
    }

    #[test]
    fn deserialize_checks_unique_ids() {
        let mut doc = VectorDocument::new(canvas());
        doc.push(line("x", (0.0, 0.0), (1.0, 0.0))).unwrap();
        doc.push(line("y", (0.0, 1.0), (1.0, 1.0))).unwrap();
        let json = serde_json::to_string(&doc).unwrap();
        let back: VectorDocument = serde_json::from_str(&json).unwrap();
        assert_eq!(back, doc);

        let clash = json.replace(r#""id":"y""#, r#""id":"x""#);
        assert_ne!(clash, json);
        let err = serde_json::from_str::<VectorDocument>(&clash).unwrap_err();
        assert!(err.to_string().contains("x"), "{err}");
    }
}
