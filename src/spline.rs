//! Fitted outline geometry.

use kurbo::{BezPath, CubicBez, Line, Point, Vec2};

/// Winding of a closed outline in image coordinates (y down).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Turn {
    /// Outer boundary of a filled region.
    Clockwise,
    /// Boundary of a hole.
    CounterClockwise,
}

/// One piece of a spline.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Segment {
    Line(Line),
    Cubic(CubicBez),
}

impl Segment {
    pub fn start(&self) -> Point {
        match self {
            Segment::Line(l) => l.p0,
            Segment::Cubic(c) => c.p0,
        }
    }

    pub fn end(&self) -> Point {
        match self {
            Segment::Line(l) => l.p1,
            Segment::Cubic(c) => c.p3,
        }
    }

    pub fn is_line(&self) -> bool {
        matches!(self, Segment::Line(_))
    }

    pub fn is_cubic(&self) -> bool {
        matches!(self, Segment::Cubic(_))
    }

    /// Unit direction leaving the start point, if the segment has length.
    pub fn start_tangent(&self) -> Option<Vec2> {
        match self {
            Segment::Line(l) => unit(l.p1 - l.p0),
            Segment::Cubic(c) => unit(c.p1 - c.p0)
                .or_else(|| unit(c.p2 - c.p0))
                .or_else(|| unit(c.p3 - c.p0)),
        }
    }

    /// Unit direction arriving at the end point, if the segment has length.
    pub fn end_tangent(&self) -> Option<Vec2> {
        match self {
            Segment::Line(l) => unit(l.p1 - l.p0),
            Segment::Cubic(c) => unit(c.p3 - c.p2)
                .or_else(|| unit(c.p3 - c.p1))
                .or_else(|| unit(c.p3 - c.p0)),
        }
    }
}

fn unit(v: Vec2) -> Option<Vec2> {
    let len = v.hypot();
    (len > 1e-12).then(|| v / len)
}

/// A knot between two segments.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CurvePoint {
    pub position: Point,
    pub tangent_in: Option<Vec2>,
    pub tangent_out: Option<Vec2>,
    /// Adjacent segments are only joined positionally (G0).
    pub is_corner: bool,
}

/// The fitted curve for one outline or centre-line.
#[derive(Debug, Clone, PartialEq)]
pub struct Spline {
    pub segments: Vec<Segment>,
    /// Knots at every segment start, plus the final end point when open.
    pub points: Vec<CurvePoint>,
    pub closed: bool,
    /// Index of the source outline within its colour plane.
    pub outline: usize,
    /// Winding of the source outline; `None` for centre-lines.
    pub turn: Option<Turn>,
    /// Index (within the same group) of the enclosing spline.
    pub parent: Option<usize>,
    /// Stroke width carried over from centre-line tracing.
    pub width: Option<f64>,
}

impl Spline {
    pub fn corner_count(&self) -> usize {
        self.points.iter().filter(|p| p.is_corner).count()
    }

    pub fn line_count(&self) -> usize {
        self.segments.iter().filter(|s| s.is_line()).count()
    }

    pub fn cubic_count(&self) -> usize {
        self.segments.iter().filter(|s| s.is_cubic()).count()
    }

    pub fn is_hole(&self) -> bool {
        self.turn == Some(Turn::CounterClockwise)
    }

    pub fn to_bez_path(&self) -> BezPath {
        let mut path = BezPath::new();
        let Some(first) = self.segments.first() else {
            return path;
        };
        path.move_to(first.start());
        for segment in &self.segments {
            match *segment {
                Segment::Line(l) => path.line_to(l.p1),
                Segment::Cubic(c) => path.curve_to(c.p1, c.p2, c.p3),
            }
        }
        if self.closed {
            path.close_path();
        }
        path
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cubic_tangents_skip_degenerate_handles() {
        let c = CubicBez::new((0.0, 0.0), (0.0, 0.0), (10.0, 0.0), (10.0, 10.0));
        let seg = Segment::Cubic(c);
        assert_eq!(seg.start_tangent(), Some(Vec2::new(1.0, 0.0)));
        assert_eq!(seg.end_tangent(), Some(Vec2::new(0.0, 1.0)));
    }

    #[test]
    fn bez_path_closes_closed_splines() {
        let spline = Spline {
            segments: vec![
                Segment::Line(Line::new((0.0, 0.0), (1.0, 0.0))),
                Segment::Line(Line::new((1.0, 0.0), (0.0, 1.0))),
                Segment::Line(Line::new((0.0, 1.0), (0.0, 0.0))),
            ],
            points: vec![],
            closed: true,
            outline: 0,
            turn: Some(Turn::Clockwise),
            parent: None,
            width: None,
        };
        let path = spline.to_bez_path();
        assert_eq!(path.elements().len(), 5);
        assert_eq!(path.elements().last(), Some(&kurbo::PathEl::ClosePath));
    }
}
