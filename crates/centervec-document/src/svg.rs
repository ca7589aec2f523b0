//! Canonical SVG serialization and tolerant parsing.
//!
//! [`to_svg`] writes one fixed layout: the XML declaration, an `<svg>`
//! root sized to the canvas, an optional `<metadata>` block, and a single
//! `<g id="centerlines">` holding every path in document order. Path
//! attributes always appear in the same order (`id`, `class`, `d`, the
//! style attributes, then pass-through attributes sorted by name), so
//! identical documents serialize to identical bytes.
//!
//! [`from_svg`] reads back our own output and externally authored files:
//! every `<path>` is collected regardless of nesting, and attributes it
//! does not understand are kept verbatim for the next serialization.
//!
//! This is a pure function pair with no I/O.

use std::collections::{BTreeMap, HashSet};
use std::fmt::Write;

use log::debug;
use svg::node::element::tag::Type;
use svg::node::{Attributes, Value};
use svg::parser::Event;

use centervec_pipeline::Dimensions;

use crate::document::{
    CurvePath, DocumentError, DocumentMetadata, FillRule, Keyword, LineCap, LineJoin, Paint,
    PathStyle, VectorDocument, path_id,
};
use crate::path_data::{self, format_number};

/// `id` of the group that holds every path.
pub const GROUP_ID: &str = "centerlines";

/// Element carrying creation metadata inside `<metadata>`.
const METADATA_TAG: &str = "centervec:document";

/// Namespace of [`METADATA_TAG`].
const METADATA_NS: &str = "https://centervec.dev/ns/1";

/// Escape the five XML special characters for safe embedding in element
/// text content and attribute values.
///
/// Handles `&` (must be first), `<`, `>`, `"`, and `'`.
fn xml_escape(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for ch in input.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            other => out.push(other),
        }
    }
    out
}

/// Inverse of [`xml_escape`], plus numeric character references.
///
/// Unknown entities are left as written.
fn xml_unescape(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        rest = &rest[amp..];
        let Some(semi) = rest.find(';') else {
            break;
        };
        let entity = &rest[1..semi];
        let decoded = match entity {
            "amp" => Some('&'),
            "lt" => Some('<'),
            "gt" => Some('>'),
            "quot" => Some('"'),
            "apos" => Some('\''),
            _ => entity
                .strip_prefix("#x")
                .map(|hex| u32::from_str_radix(hex, 16))
                .or_else(|| entity.strip_prefix('#').map(str::parse))
                .and_then(Result::ok)
                .and_then(char::from_u32),
        };
        if let Some(ch) = decoded {
            out.push(ch);
            rest = &rest[semi + 1..];
        } else {
            out.push('&');
            rest = &rest[1..];
        }
    }
    out.push_str(rest);
    out
}

// ─── Serialization ───────────────────────────────────────────────────

/// Serialize a document to canonical SVG text.
///
/// # Examples
///
/// ```
/// use centervec_document::{CurvePath, VectorDocument, to_svg};
/// use centervec_pipeline::{Dimensions, PathCommand, Point};
///
/// let mut doc = VectorDocument::new(Dimensions { width: 100, height: 50 });
/// doc.push(CurvePath::new(
///     "path0",
///     vec![
///         PathCommand::MoveTo(Point::new(10.0, 20.0)),
///         PathCommand::LineTo(Point::new(30.0, 40.0)),
///     ],
/// ))
/// .unwrap();
/// let svg = to_svg(&doc);
/// assert!(svg.contains(r#"<g id="centerlines">"#));
/// assert!(svg.contains(r#"<path id="path0" d="M10,20 L30,40"/>"#));
/// ```
#[must_use]
pub fn to_svg(doc: &VectorDocument) -> String {
    let mut out = String::new();
    let Dimensions { width, height } = doc.canvas;

    let _ = writeln!(out, r#"<?xml version="1.0" encoding="UTF-8"?>"#);
    let _ = writeln!(
        out,
        r#"<svg xmlns="http://www.w3.org/2000/svg" width="{width}" height="{height}" viewBox="0 0 {width} {height}">"#,
    );
    write_metadata(&mut out, &doc.metadata);

    let _ = writeln!(out, r#"  <g id="{GROUP_ID}">"#);
    for path in doc.paths() {
        let _ = writeln!(out, "    <path{}/>", path_attributes(path));
    }
    let _ = writeln!(out, "  </g>");
    let _ = writeln!(out, "</svg>");
    out
}

fn write_metadata(out: &mut String, metadata: &DocumentMetadata) {
    if metadata == &DocumentMetadata::default() {
        return;
    }
    let mut attrs = format!(r#" xmlns:centervec="{METADATA_NS}""#);
    if let Some(created) = &metadata.created {
        let _ = write!(attrs, r#" created="{}""#, xml_escape(created));
    }
    if let Some(generator) = &metadata.generator {
        let _ = write!(attrs, r#" generator="{}""#, xml_escape(generator));
    }

    let _ = writeln!(out, "  <metadata>");
    match &metadata.parameters {
        Some(parameters) => {
            let _ = writeln!(
                out,
                "    <{METADATA_TAG}{attrs}>{}</{METADATA_TAG}>",
                xml_escape(&parameters.to_string()),
            );
        }
        None => {
            let _ = writeln!(out, "    <{METADATA_TAG}{attrs}/>");
        }
    }
    let _ = writeln!(out, "  </metadata>");
}

/// The attribute list of one `<path>`, with a leading space per attribute.
fn path_attributes(path: &CurvePath) -> String {
    let mut attrs = Vec::new();
    attrs.push(("id", path.id.clone()));
    if !path.classes.is_empty() {
        attrs.push(("class", path.classes.join(" ")));
    }
    attrs.push(("d", path_data::encode(&path.commands)));

    let style = &path.style;
    if let Some(fill) = style.fill {
        attrs.push(("fill", fill.to_string()));
    }
    if let Some(rule) = style.fill_rule {
        attrs.push(("fill-rule", rule.keyword().to_string()));
    }
    if let Some(stroke) = style.stroke {
        attrs.push(("stroke", stroke.to_string()));
    }
    if let Some(width) = style.stroke_width {
        attrs.push(("stroke-width", format_number(width)));
    }
    if let Some(cap) = style.stroke_linecap {
        attrs.push(("stroke-linecap", cap.keyword().to_string()));
    }
    if let Some(join) = style.stroke_linejoin {
        attrs.push(("stroke-linejoin", join.keyword().to_string()));
    }
    if let Some(opacity) = style.opacity {
        attrs.push(("opacity", format_number(opacity)));
    }

    let mut out = String::new();
    for (name, value) in &attrs {
        let _ = write!(out, r#" {name}="{}""#, xml_escape(value));
    }
    // A typed value wins over a verbatim one of the same name.
    for (name, value) in &path.extra {
        if attrs.iter().any(|(typed, _)| typed == name) {
            continue;
        }
        let _ = write!(out, r#" {name}="{}""#, xml_escape(value));
    }
    out
}

// ─── Parsing ─────────────────────────────────────────────────────────

/// Parse SVG text into a document.
///
/// Paths without an `id` get the smallest free `path<N>` after all
/// explicit ids are known. The canvas comes from `width`/`height` on the
/// root, falling back to the `viewBox` size.
///
/// # Errors
///
/// - [`DocumentError::Parse`] for malformed XML or a root without a size
/// - [`DocumentError::PathData`] for an undecodable `d` attribute
/// - [`DocumentError::DuplicateId`] if two paths share an `id`
pub fn from_svg(text: &str) -> Result<VectorDocument, DocumentError> {
    let parser = svg::read(text).map_err(|e| DocumentError::Parse(e.to_string()))?;

    let mut canvas = None;
    let mut metadata = DocumentMetadata::default();
    let mut parameters_text: Option<String> = None;
    let mut paths: Vec<(Option<String>, CurvePath)> = Vec::new();

    for event in parser {
        match event {
            Event::Error(error) => return Err(DocumentError::Parse(error.to_string())),
            Event::Tag("svg", Type::Start | Type::Empty, attributes) if canvas.is_none() => {
                canvas = Some(parse_canvas(&attributes)?);
            }
            Event::Tag("path", Type::Start | Type::Empty, attributes) => {
                let index = paths.len();
                paths.push(parse_path(index, &attributes)?);
            }
            Event::Tag(METADATA_TAG, kind @ (Type::Start | Type::Empty), attributes) => {
                metadata.created = attribute(&attributes, "created");
                metadata.generator = attribute(&attributes, "generator");
                if matches!(kind, Type::Start) {
                    parameters_text = Some(String::new());
                }
            }
            Event::Tag(METADATA_TAG, Type::End, _) => {
                if let Some(text) = parameters_text.take() {
                    metadata.parameters = parse_parameters(&text);
                }
            }
            Event::Text(content) => {
                if let Some(text) = parameters_text.as_mut() {
                    text.push_str(content);
                }
            }
            _ => {}
        }
    }

    let canvas = canvas.ok_or_else(|| DocumentError::Parse("no <svg> root element".into()))?;

    let mut taken: HashSet<String> = paths.iter().filter_map(|(id, _)| id.clone()).collect();
    let mut resolved = Vec::with_capacity(paths.len());
    for (explicit_id, mut path) in paths {
        if explicit_id.is_none() {
            let fresh = (0..)
                .map(path_id)
                .find(|candidate| !taken.contains(candidate))
                .unwrap_or_default();
            taken.insert(fresh.clone());
            path.id = fresh;
        }
        resolved.push(path);
    }
    VectorDocument::from_paths(canvas, metadata, resolved)
}

fn attribute(attributes: &Attributes, name: &str) -> Option<String> {
    attributes
        .get(name)
        .map(|value: &Value| xml_unescape(&value.to_string()))
}

/// Parse a length such as `100`, `100.5px`, or `100px`.
fn parse_length(value: &str) -> Option<f64> {
    let trimmed = value.trim().trim_end_matches("px");
    trimmed.parse::<f64>().ok().filter(|v| v.is_finite() && *v >= 0.0)
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn parse_canvas(attributes: &Attributes) -> Result<Dimensions, DocumentError> {
    let view_box: Option<Vec<f64>> = attribute(attributes, "viewBox").map(|vb| {
        vb.split(|c: char| c == ',' || c.is_whitespace())
            .filter(|s| !s.is_empty())
            .filter_map(|s| s.parse().ok())
            .collect()
    });
    let from_view_box = |i: usize| view_box.as_ref().and_then(|v| v.get(i).copied());

    let width = attribute(attributes, "width")
        .as_deref()
        .and_then(parse_length)
        .or_else(|| from_view_box(2));
    let height = attribute(attributes, "height")
        .as_deref()
        .and_then(parse_length)
        .or_else(|| from_view_box(3));

    match (width, height) {
        (Some(w), Some(h)) => Ok(Dimensions {
            width: w.round() as u32,
            height: h.round() as u32,
        }),
        _ => Err(DocumentError::Parse(
            "<svg> root has neither width/height nor viewBox".into(),
        )),
    }
}

/// Returns the explicit id (if any) alongside the parsed path.
fn parse_path(
    index: usize,
    attributes: &Attributes,
) -> Result<(Option<String>, CurvePath), DocumentError> {
    let explicit_id = attribute(attributes, "id");
    let id = explicit_id.clone().unwrap_or_else(|| path_id(index));

    let mut path = CurvePath::new(id.clone(), Vec::new());
    let mut extra = BTreeMap::new();
    let mut style = PathStyle::default();

    // The svg crate's attribute map is unordered; sort for stable output.
    let mut names: Vec<&String> = attributes.keys().collect();
    names.sort();
    for name in names {
        let Some(value) = attribute(attributes, name) else {
            continue;
        };
        let known = match name.as_str() {
            "id" => true,
            "class" => {
                path.classes = value.split_whitespace().map(str::to_string).collect();
                true
            }
            "d" => {
                path.commands = path_data::decode(&value).map_err(|e| DocumentError::PathData {
                    id: id.clone(),
                    message: e.to_string(),
                })?;
                true
            }
            "stroke" => set(&mut style.stroke, value.parse::<Paint>().ok()),
            "fill" => set(&mut style.fill, value.parse::<Paint>().ok()),
            "stroke-width" => set(&mut style.stroke_width, parse_number(&value)),
            "opacity" => set(&mut style.opacity, parse_number(&value)),
            "fill-rule" => set(&mut style.fill_rule, FillRule::from_keyword(&value)),
            "stroke-linecap" => set(&mut style.stroke_linecap, LineCap::from_keyword(&value)),
            "stroke-linejoin" => set(&mut style.stroke_linejoin, LineJoin::from_keyword(&value)),
            _ => false,
        };
        if !known {
            debug!("path {id}: keeping attribute {name}={value:?} verbatim");
            extra.insert(name.clone(), value);
        }
    }

    path.style = style;
    path.extra = extra;
    Ok((explicit_id, path))
}

/// Store a parsed value; report whether parsing succeeded.
fn set<T>(slot: &mut Option<T>, parsed: Option<T>) -> bool {
    let ok = parsed.is_some();
    if ok {
        *slot = parsed;
    }
    ok
}

fn parse_number(value: &str) -> Option<f64> {
    value.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

fn parse_parameters(text: &str) -> Option<serde_json::Value> {
    let text = xml_unescape(text.trim());
    if text.is_empty() {
        return None;
    }
    Some(serde_json::from_str(&text).unwrap_or(serde_json::Value::String(text)))
}
