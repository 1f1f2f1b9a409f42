//! XFig 3.2 drawings (`.fig`).
//!
//! Each colour group gets a user colour (numbers from 32 up). Closed
//! splines become filled polygons and open splines become polylines. FIG
//! has no even-odd fill, so holes are drawn as white polygons one depth
//! level in front of the outline they cut, and every nesting level moves
//! one step further forward. Later groups sit in front of earlier ones.

use std::collections::HashMap;
use std::io::Write;

use kurbo::Point;

use crate::diagnostics::Diagnostics;
use crate::document::{ColorGroup, CurveDocument};
use crate::error::TraceError;

use super::{polylines, Capabilities, Lowering, OutputWriter};

/// FIG units per pixel, with 1200 units per inch and 80 pixels per inch.
pub const UNITS_PER_PIXEL: f64 = 15.0;

const FIRST_USER_COLOR: usize = 32;
const LAST_USER_COLOR: usize = 543;
const WHITE: usize = 7;
const BACK_DEPTH: usize = 999;
const DEPTHS_PER_GROUP: usize = 10;

pub struct FigWriter;

/// Nesting level of every spline in a group: 0 for top-level outlines,
/// 1 for their holes, 2 for islands inside those holes, and so on.
fn nesting_levels(group: &ColorGroup) -> Vec<usize> {
    let index: HashMap<usize, usize> = group
        .splines
        .iter()
        .enumerate()
        .map(|(i, s)| (s.outline, i))
        .collect();
    group
        .splines
        .iter()
        .map(|spline| {
            let mut level = 0;
            let mut parent = spline.parent;
            while let Some(i) = parent.and_then(|p| index.get(&p)) {
                level += 1;
                if level > group.splines.len() {
                    break;
                }
                parent = group.splines[*i].parent;
            }
            level
        })
        .collect()
}

impl OutputWriter for FigWriter {
    fn name(&self) -> &'static str {
        "fig"
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["fig", "xfig"]
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::POLYLINE
    }

    fn write(
        &self,
        doc: &CurveDocument,
        out: &mut dyn Write,
        diagnostics: &mut Diagnostics,
    ) -> Result<(), TraceError> {
        let mut lowering = Lowering::new(self.capabilities());
        let unit = |p: Point| {
            format!(
                "{} {}",
                (p.x * UNITS_PER_PIXEL).round() as i64,
                (p.y * UNITS_PER_PIXEL).round() as i64
            )
        };

        writeln!(out, "#FIG 3.2  Produced by img2spline")?;
        writeln!(out, "Landscape")?;
        writeln!(out, "Center")?;
        writeln!(out, "Inches")?;
        writeln!(out, "Letter")?;
        writeln!(out, "100.00")?;
        writeln!(out, "Single")?;
        writeln!(out, "-2")?;
        writeln!(out, "1200 2")?;

        let colors: Vec<usize> = (0..doc.groups.len())
            .map(|i| (FIRST_USER_COLOR + i).min(LAST_USER_COLOR))
            .collect();
        for (group, &color) in doc.groups.iter().zip(&colors).take(LAST_USER_COLOR - FIRST_USER_COLOR + 1) {
            writeln!(out, "0 {} {}", color, group.color.to_hex())?;
        }

        for (g, (group, &color)) in doc.groups.iter().zip(&colors).enumerate() {
            let levels = nesting_levels(group);
            for (spline, level) in group.splines.iter().zip(levels) {
                let step = g * DEPTHS_PER_GROUP + level.min(DEPTHS_PER_GROUP - 1);
                let depth = BACK_DEPTH.saturating_sub(step);
                for (mut points, closed) in polylines(&lowering.path(spline)) {
                    let Some(&first) = points.first() else {
                        continue;
                    };
                    let object = if spline.closed {
                        if closed && points.last() != Some(&first) {
                            points.push(first);
                        }
                        let fill = if level % 2 == 1 { WHITE } else { color };
                        format!("2 3 0 0 {} {} {} -1 20 0.000 0 0 -1 0 0", color, fill, depth)
                    } else {
                        let thickness = spline.width.unwrap_or(1.0).round().max(1.0) as i64;
                        format!("2 1 0 {} {} 7 {} -1 -1 0.000 1 1 -1 0 0", thickness, color, depth)
                    };
                    let coords: Vec<String> = points.iter().map(|&p| unit(p)).collect();
                    writeln!(out, "{} {}", object, points.len())?;
                    writeln!(out, "\t {}", coords.join(" "))?;
                }
            }
        }

        lowering.finish(self.name(), diagnostics);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::Color;
    use crate::output::tests::sample_document;
    use crate::output::{to_bytes, Format};
    use crate::spline::{Segment, Spline, Turn};
    use kurbo::Line;

    fn render(doc: &CurveDocument) -> String {
        let mut diag = Diagnostics::new();
        String::from_utf8(to_bytes(doc, Format::Fig, &mut diag).unwrap()).unwrap()
    }

    fn square(outline: usize, lo: f64, hi: f64, turn: Turn, parent: Option<usize>) -> Spline {
        let corners = match turn {
            Turn::Clockwise => [(lo, lo), (hi, lo), (hi, hi), (lo, hi)],
            Turn::CounterClockwise => [(lo, lo), (lo, hi), (hi, hi), (hi, lo)],
        };
        Spline {
            segments: (0..4)
                .map(|i| Segment::Line(Line::new(corners[i], corners[(i + 1) % 4])))
                .collect(),
            points: vec![],
            closed: true,
            outline,
            turn: Some(turn),
            parent,
            width: None,
        }
    }

    #[test]
    fn header_and_user_colour() {
        let text = render(&sample_document());
        assert!(text.starts_with("#FIG 3.2"));
        assert!(text.contains("\n1200 2\n"));
        assert!(text.contains("\n0 32 #c81e1e\n"));
    }

    #[test]
    fn point_counts_match_coordinates() {
        let text = render(&sample_document());
        let lines: Vec<&str> = text.lines().collect();
        let objects: Vec<usize> = (0..lines.len()).filter(|&i| lines[i].starts_with("2 ")).collect();
        assert_eq!(objects.len(), 2);
        for i in objects {
            let n: usize = lines[i].rsplit(' ').next().unwrap().parse().unwrap();
            let coords = lines[i + 1].split_whitespace().count();
            assert_eq!(coords, 2 * n);
        }
        // Closed polygon repeats its first point; (1, 1) is 15 15.
        assert!(text.contains("\t 15 15 "));
        let polygon = text.lines().find(|l| l.starts_with("2 3 ")).unwrap();
        assert!(polygon.starts_with("2 3 0 0 32 32 999 "));
        let stroke = text.lines().find(|l| l.starts_with("2 1 ")).unwrap();
        assert!(stroke.starts_with("2 1 0 2 32 7 999 "));
    }

    #[test]
    fn holes_are_white_and_in_front() {
        let mut doc = CurveDocument::new(10, 10);
        doc.groups.push(ColorGroup {
            color: Color::BLACK,
            splines: vec![
                square(0, 1.0, 9.0, Turn::Clockwise, None),
                square(1, 3.0, 7.0, Turn::CounterClockwise, Some(0)),
                square(2, 4.0, 6.0, Turn::Clockwise, Some(1)),
            ],
        });
        let text = render(&doc);
        let polygons: Vec<&str> = text.lines().filter(|l| l.starts_with("2 3 ")).collect();
        assert_eq!(
            polygons,
            vec![
                "2 3 0 0 32 32 999 -1 20 0.000 0 0 -1 0 0 5",
                "2 3 0 0 32 7 998 -1 20 0.000 0 0 -1 0 0 5",
                "2 3 0 0 32 32 997 -1 20 0.000 0 0 -1 0 0 5",
            ]
        );
    }

    #[test]
    fn later_groups_are_drawn_in_front() {
        let mut doc = CurveDocument::new(10, 10);
        for (i, color) in [Color::BLACK, Color::rgb(0, 0, 255)].into_iter().enumerate() {
            doc.groups.push(ColorGroup {
                color,
                splines: vec![square(i, 1.0, 9.0, Turn::Clockwise, None)],
            });
        }
        let text = render(&doc);
        assert!(text.contains("\n0 33 #0000ff\n"));
        assert!(text.contains("2 3 0 0 33 33 989 "));
    }
}
