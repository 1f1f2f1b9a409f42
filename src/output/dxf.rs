//! Minimal ASCII DXF (R12-style ENTITIES section).
//!
//! Every segment becomes a `LINE` entity on layer `0`, coloured with a
//! group 420 true-colour value. Curves are flattened first.

use std::io::Write;

use kurbo::Point;

use crate::diagnostics::Diagnostics;
use crate::document::CurveDocument;
use crate::error::TraceError;

use super::{num, polylines, Capabilities, Lowering, OutputWriter};

pub struct DxfWriter;

fn pair(out: &mut dyn Write, code: u32, value: &str) -> std::io::Result<()> {
    writeln!(out, "{:>3}\n{}", code, value)
}

impl OutputWriter for DxfWriter {
    fn name(&self) -> &'static str {
        "dxf"
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["dxf"]
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

        pair(out, 0, "SECTION")?;
        pair(out, 2, "HEADER")?;
        pair(out, 9, "$EXTMAX")?;
        pair(out, 10, &doc.width.to_string())?;
        pair(out, 20, &doc.height.to_string())?;
        pair(out, 0, "ENDSEC")?;
        pair(out, 0, "SECTION")?;
        pair(out, 2, "ENTITIES")?;

        for group in &doc.groups {
            let c = group.color;
            let true_color = ((c.r as u32) << 16 | (c.g as u32) << 8 | c.b as u32).to_string();
            for spline in &group.splines {
                for (points, closed) in polylines(&lowering.path(spline)) {
                    let mut edges: Vec<(Point, Point)> =
                        points.windows(2).map(|w| (w[0], w[1])).collect();
                    let (first, last) = (points[0], points[points.len() - 1]);
                    if closed && first != last {
                        edges.push((last, first));
                    }
                    for (a, b) in edges {
                        pair(out, 0, "LINE")?;
                        pair(out, 8, "0")?;
                        pair(out, 420, &true_color)?;
                        pair(out, 10, &num(a.x))?;
                        pair(out, 20, &num(height - a.y))?;
                        pair(out, 11, &num(b.x))?;
                        pair(out, 21, &num(height - b.y))?;
                    }
                }
            }
        }

        pair(out, 0, "ENDSEC")?;
        pair(out, 0, "EOF")?;
        lowering.finish(self.name(), diagnostics);
        Ok(())
    }
}
