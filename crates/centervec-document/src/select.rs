//! Path selection and in-place style patches.
//!
//! Selection is a pure query returning path indices in document order;
//! [`apply_patch`] is the only mutation and never touches ids or
//! drawing commands.

use std::ops::Range;

use serde::{Deserialize, Serialize};

use crate::document::{FillRule, Paint, PathStyle, VectorDocument};

/// Which paths an edit applies to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Selector {
    /// Every path.
    All,
    /// The path with this id.
    Id(String),
    /// Paths carrying this class name.
    Class(String),
    /// Paths whose attribute equals the value exactly.
    AttributeEquals {
        /// Attribute name as serialized (`stroke`, `data-layer`, …).
        name: String,
        /// Expected value.
        value: String,
    },
    /// Paths whose attribute contains the value as a substring.
    AttributeContains {
        /// Attribute name as serialized.
        name: String,
        /// Substring to look for.
        value: String,
    },
    /// Paths at positions `start..end` (clamped to the document).
    IndexRange {
        /// First index, inclusive.
        start: usize,
        /// Last index, exclusive.
        end: usize,
    },
}

impl From<Range<usize>> for Selector {
    fn from(range: Range<usize>) -> Self {
        Self::IndexRange {
            start: range.start,
            end: range.end,
        }
    }
}

/// Indices of the paths `selector` matches, ascending.
#[must_use]
pub fn select(doc: &VectorDocument, selector: &Selector) -> Vec<usize> {
    let paths = doc.paths();
    if let Selector::IndexRange { start, end } = *selector {
        let end = end.min(paths.len());
        return (start.min(end)..end).collect();
    }
    paths
        .iter()
        .enumerate()
        .filter(|(_, path)| match selector {
            Selector::All => true,
            Selector::Id(id) => &path.id == id,
            Selector::Class(class) => path.classes.iter().any(|c| c == class),
            Selector::AttributeEquals { name, value } => {
                path.attribute(name).is_some_and(|v| &v == value)
            }
            Selector::AttributeContains { name, value } => {
                path.attribute(name).is_some_and(|v| v.contains(value.as_str()))
            }
            Selector::IndexRange { .. } => false,
        })
        .map(|(index, _)| index)
        .collect()
}

/// Style fields to overwrite; `None` leaves a field as it is.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StylePatch {
    /// New stroke paint.
    pub stroke: Option<Paint>,
    /// New fill paint.
    pub fill: Option<Paint>,
    /// New fill rule.
    pub fill_rule: Option<FillRule>,
    /// New stroke width.
    pub stroke_width: Option<f64>,
    /// New opacity.
    pub opacity: Option<f64>,
}

impl StylePatch {
    /// Overwrite the fields this patch sets.
    pub fn apply(&self, style: &mut PathStyle) {
        if let Some(stroke) = self.stroke {
            style.stroke = Some(stroke);
        }
        if let Some(fill) = self.fill {
            style.fill = Some(fill);
        }
        if let Some(rule) = self.fill_rule {
            style.fill_rule = Some(rule);
        }
        if let Some(width) = self.stroke_width {
            style.stroke_width = Some(width);
        }
        if let Some(opacity) = self.opacity {
            style.opacity = Some(opacity.clamp(0.0, 1.0));
        }
    }

    /// Serialized names of the attributes this patch sets.
    fn attribute_names(&self) -> impl Iterator<Item = &'static str> {
        [
            ("stroke", self.stroke.is_some()),
            ("fill", self.fill.is_some()),
            ("fill-rule", self.fill_rule.is_some()),
            ("stroke-width", self.stroke_width.is_some()),
            ("opacity", self.opacity.is_some()),
        ]
        .into_iter()
        .filter_map(|(name, set)| set.then_some(name))
    }
}

/// Apply `patch` to the paths at `indices`; returns how many changed.
///
/// Out-of-range indices are ignored. A verbatim attribute kept from a
/// parsed document is dropped once the patch sets its typed counterpart.
pub fn apply_patch(doc: &mut VectorDocument, indices: &[usize], patch: &StylePatch) -> usize {
    let mut changed = 0;
    for &index in indices {
        if let Some(path) = doc.paths.get_mut(index) {
            let before = path.style.clone();
            patch.apply(&mut path.style);
            let mut dropped = false;
            for name in patch.attribute_names() {
                dropped |= path.extra.remove(name).is_some();
            }
            if dropped || path.style != before {
                changed += 1;
            }
        }
    }
    changed
}

/// Select and patch in one step; returns how many paths changed.
pub fn restyle(doc: &mut VectorDocument, selector: &Selector, patch: &StylePatch) -> usize {
    let indices = select(doc, selector);
    apply_patch(doc, &indices, patch)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use centervec_pipeline::{Dimensions, PathCommand, Point};

    use super::*;
    use crate::document::{CurvePath, Rgba};

    fn doc() -> VectorDocument {
        let mut doc = VectorDocument::new(Dimensions {
            width: 50,
            height: 50,
        });
        for i in 0..4_u32 {
            let y = f64::from(i) * 10.0;
            let mut path = CurvePath::new(
                format!("path{i}"),
                vec![
                    PathCommand::MoveTo(Point::new(0.0, y)),
                    PathCommand::LineTo(Point::new(40.0, y)),
                ],
            );
            if i % 2 == 0 {
                path.classes.push("even".into());
            }
            path.extra.insert("data-layer".into(), format!("layer-{i}"));
            path.style.stroke = Some(Paint::Color(Rgba::BLACK));
            doc.push(path).unwrap();
        }
        doc
    }

    // --- select tests ---

    #[test]
    fn select_all() {
        assert_eq!(select(&doc(), &Selector::All), vec![0, 1, 2, 3]);
    }

    #[test]
    fn select_by_id_and_class() {
        let doc = doc();
        assert_eq!(select(&doc, &Selector::Id("path2".into())), vec![2]);
        assert_eq!(select(&doc, &Selector::Id("nope".into())), Vec::<usize>::new());
        assert_eq!(select(&doc, &Selector::Class("even".into())), vec![0, 2]);
    }

    #[test]
    fn select_by_attribute() {
        let doc = doc();
        let equals = Selector::AttributeEquals {
            name: "data-layer".into(),
            value: "layer-3".into(),
        };
        assert_eq!(select(&doc, &equals), vec![3]);
        let contains = Selector::AttributeContains {
            name: "stroke".into(),
            value: "#000000".into(),
        };
        assert_eq!(select(&doc, &contains), vec![0, 1, 2, 3]);
    }

    #[test]
    fn index_range_is_clamped() {
        let doc = doc();
        assert_eq!(select(&doc, &(1..3).into()), vec![1, 2]);
        assert_eq!(select(&doc, &(2..99).into()), vec![2, 3]);
        assert_eq!(select(&doc, &(7..9).into()), Vec::<usize>::new());
    }

    // --- patch tests ---

    #[test]
    fn patch_changes_style_only() {
        let mut doc = doc();
        let before = doc.clone();
        let patch = StylePatch {
            stroke: Some(Paint::Color(Rgba::new(255, 0, 0, 255))),
            stroke_width: Some(4.0),
            ..StylePatch::default()
        };
        let changed = restyle(&mut doc, &Selector::Class("even".into()), &patch);
        assert_eq!(changed, 2);
        for (i, (after, orig)) in doc.paths().iter().zip(before.paths()).enumerate() {
            assert_eq!(after.id, orig.id);
            assert_eq!(after.commands, orig.commands);
            if i % 2 == 0 {
                assert_eq!(after.style.stroke_width, Some(4.0));
                assert_eq!(after.style.stroke, patch.stroke);
            } else {
                assert_eq!(after.style, orig.style);
            }
        }
    }

    #[test]
    fn empty_patch_changes_nothing() {
        let mut doc = doc();
        assert_eq!(restyle(&mut doc, &Selector::All, &StylePatch::default()), 0);
    }

    #[test]
    fn opacity_is_clamped() {
        let mut style = PathStyle::default();
        StylePatch {
            opacity: Some(1.7),
            ..StylePatch::default()
        }
        .apply(&mut style);
        assert_eq!(style.opacity, Some(1.0));
    }

    #[test]
    fn fill_rule_is_patchable() {
        let mut doc = doc();
        let patch = StylePatch {
            fill_rule: Some(FillRule::EvenOdd),
            ..StylePatch::default()
        };
        assert_eq!(restyle(&mut doc, &Selector::Id("path1".into()), &patch), 1);
        assert_eq!(doc.paths()[1].style.fill_rule, Some(FillRule::EvenOdd));
        assert_eq!(doc.paths()[1].attribute("fill-rule").as_deref(), Some("evenodd"));
        assert_eq!(doc.paths()[0].style.fill_rule, None);
    }

    #[test]
    fn patch_replaces_verbatim_attribute() {
        let mut doc = doc();
        doc.paths[0].style.stroke = None;
        doc.paths[0].extra.insert("stroke".into(), "currentColor".into());
        assert_eq!(doc.paths()[0].attribute("stroke").as_deref(), Some("currentColor"));

        let patch = StylePatch {
            stroke: Some(Paint::Color(Rgba::new(0, 0, 255, 255))),
            ..StylePatch::default()
        };
        assert_eq!(apply_patch(&mut doc, &[0], &patch), 1);
        assert!(!doc.paths()[0].extra.contains_key("stroke"));
        assert_eq!(doc.paths()[0].attribute("stroke").as_deref(), Some("#0000FFFF"));
        assert_eq!(
            doc.paths()[0].attribute("data-layer").as_deref(),
            Some("layer-0")
        );
    }

    #[test]
    fn out_of_range_indices_ignored() {
        let mut doc = doc();
        let patch = StylePatch {
            opacity: Some(0.5),
            ..StylePatch::default()
        };
        assert_eq!(apply_patch(&mut doc, &[1, 10], &patch), 1);
    }
}
