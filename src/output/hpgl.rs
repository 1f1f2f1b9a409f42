//! HP-GL plotter output (`.plt`).
//!
//! Plotter units are 1/1016 inch; one pixel is taken as 1/72 inch. Each
//! colour group gets its own pen, in palette order, starting at pen 1.

use std::io::Write;

use kurbo::Point;

use crate::diagnostics::Diagnostics;
use crate::document::CurveDocument;
use crate::error::TraceError;

use super::{polylines, Capabilities, Lowering, OutputWriter};

/// Plotter units per pixel.
pub const UNITS_PER_PIXEL: f64 = 1016.0 / 72.0;

pub struct HpglWriter;

impl OutputWriter for HpglWriter {
    fn name(&self) -> &'static str {
        "plt"
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["plt", "hpgl", "hgl"]
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
        let height = doc.height as f64;
        let unit = |p: Point| {
            format!(
                "{},{}",
                (p.x * UNITS_PER_PIXEL).round() as i64,
                ((height - p.y) * UNITS_PER_PIXEL).round() as i64
            )
        };

        writeln!(out, "IN;")?;
        for (pen, group) in doc.groups.iter().enumerate() {
            writeln!(out, "SP{};", pen + 1)?;
            for spline in &group.splines {
                for (points, closed) in polylines(&lowering.path(spline)) {
                    let Some((&first, rest)) = points.split_first() else {
                        continue;
                    };
                    let mut coords: Vec<String> = rest.iter().map(|&p| unit(p)).collect();
                    if closed && points.last() != Some(&first) {
                        coords.push(unit(first));
                    }
                    writeln!(out, "PU{};", unit(first))?;
                    if !coords.is_empty() {
                        writeln!(out, "PD{};", coords.join(","))?;
                    }
                }
            }
        }
        writeln!(out, "PU;SP0;")?;
        lowering.finish(self.name(), diagnostics);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::tests::sample_document;
    use crate::output::{to_bytes, Format};

    #[test]
    fn pen_moves_in_plotter_units() {
        let mut diag = Diagnostics::new();
        let text = String::from_utf8(to_bytes(&sample_document(), Format::Plt, &mut diag).unwrap()).unwrap();
        assert!(text.starts_with("IN;\nSP1;\n"));
        // (1, 1) → (14, 7·14.11) after the y flip.
        assert!(text.contains("PU14,99;"));
        assert!(text.contains("PD"));
        assert!(text.trim_end().ends_with("SP0;"));
    }

    #[test]
    fn empty_document_initialises_and_parks() {
        let mut diag = Diagnostics::new();
        let text = String::from_utf8(to_bytes(&CurveDocument::new(4, 4), Format::Plt, &mut diag).unwrap()).unwrap();
        assert_eq!(text, "IN;\nPU;SP0;\n");
    }
}
