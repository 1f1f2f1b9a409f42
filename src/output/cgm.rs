//! Clear-text Computer Graphics Metafile (ISO 8632-4).
//!
//! Filled outlines of a colour group become one `POLYGONSET` so holes are
//! cut out; centre-lines become `LINE` elements.

use std::io::Write;

use kurbo::Point;

use crate::diagnostics::Diagnostics;
use crate::document::CurveDocument;
use crate::error::TraceError;

use super::{num, polylines, Capabilities, Lowering, OutputWriter};

pub struct CgmWriter;

impl OutputWriter for CgmWriter {
    fn name(&self) -> &'static str {
        "cgm"
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["cgm"]
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
        let pt = |p: Point| format!("({},{})", num(p.x), num(height - p.y));

        writeln!(out, "BEGMF 'img2spline';")?;
        writeln!(out, "MFVERSION 1;")?;
        writeln!(out, "MFELEMLIST 'DRAWINGPLUS';")?;
        writeln!(out, "BEGPIC 'page';")?;
        writeln!(out, "COLRMODE DIRECT;")?;
        writeln!(out, "VDCEXT (0,0) ({},{});", doc.width, doc.height)?;
        writeln!(out, "BEGPICBODY;")?;

        for group in &doc.groups {
            let c = group.color;
            let rgb = format!("{} {} {}", c.r, c.g, c.b);

            let fill = lowering.fill_path(&group.splines);
            let rings = polylines(&fill);
            if !rings.is_empty() {
                writeln!(out, "INTSTYLE SOLID;")?;
                writeln!(out, "FILLCOLR {};", rgb)?;
                let mut set = Vec::new();
                for (mut points, _) in rings {
                    if points.len() > 1 && points.first() == points.last() {
                        points.pop();
                    }
                    let last = points.len().saturating_sub(1);
                    for (i, &p) in points.iter().enumerate() {
                        let flag = if i == last { "CLOSEVIS" } else { "VIS" };
                        set.push(format!("{} {}", pt(p), flag));
                    }
                }
                writeln!(out, "POLYGONSET {};", set.join(" "))?;
            }

            for spline in group.splines.iter().filter(|s| !s.closed) {
                writeln!(out, "LINECOLR {};", rgb)?;
                writeln!(out, "LINEWIDTH {};", num(spline.width.unwrap_or(1.0)))?;
                for (points, _) in polylines(&lowering.path(spline)) {
                    let coords: Vec<String> = points.iter().map(|&p| pt(p)).collect();
                    writeln!(out, "LINE {};", coords.join(" "))?;
                }
            }
        }

        writeln!(out, "ENDPIC;")?;
        writeln!(out, "ENDMF;")?;
        lowering.finish(self.name(), diagnostics);
        Ok(())
    }
}
