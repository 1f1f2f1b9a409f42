use crate::color::Color;
use crate::spline::Spline;

/// Splines traced from one colour plane.
#[derive(Debug, Clone, PartialEq)]
pub struct ColorGroup {
    pub color: Color,
    pub splines: Vec<Spline>,
}

impl ColorGroup {
    /// True when the group holds open centre-lines (stroked, not filled).
    pub fn has_open(&self) -> bool {
        self.splines.iter().any(|s| !s.closed)
    }
}

/// The finished, format-agnostic drawing.
///
/// Coordinates are in pixels with the origin at the top-left corner of
/// the source image and y pointing down. Groups are stacked in palette
/// order: the first group is drawn first.
#[derive(Debug, Clone, PartialEq)]
pub struct CurveDocument {
    pub width: u32,
    pub height: u32,
    pub groups: Vec<ColorGroup>,
}

impl CurveDocument {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            groups: Vec::new(),
        }
    }

    pub fn outline_count(&self) -> usize {
        self.groups.iter().map(|g| g.splines.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.outline_count() == 0
    }

    pub fn splines(&self) -> impl Iterator<Item = (&Color, &Spline)> {
        self.groups
            .iter()
            .flat_map(|g| g.splines.iter().map(move |s| (&g.color, s)))
    }

    /// (lines, cubics) across every spline.
    pub fn segment_counts(&self) -> (usize, usize) {
        self.splines()
            .fold((0, 0), |(l, c), (_, s)| (l + s.line_count(), c + s.cubic_count()))
    }
}
