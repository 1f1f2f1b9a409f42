//! SVG 1.1 writer.
//!
//! Closed splines of a colour group share one `evenodd` filled path so holes
//! cut through their outer outline. Open centre-lines are stroked one path
//! each, at their recorded width.

use std::io::Write;

use crate::diagnostics::Diagnostics;
use crate::document::CurveDocument;
use crate::error::TraceError;

use super::{num, Capabilities, Lowering, OutputWriter};

pub struct SvgWriter;

impl OutputWriter for SvgWriter {
    fn name(&self) -> &'static str {
        "svg"
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["svg"]
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::CUBIC
    }

    fn write(
        &self,
        doc: &CurveDocument,
        out: &mut dyn Write,
        diagnostics: &mut Diagnostics,
    ) -> Result<(), TraceError> {
        let mut lowering = Lowering::new(self.capabilities());
        writeln!(out, r#"<?xml version="1.0" encoding="UTF-8"?>"#)?;
        writeln!(
            out,
            r#"<svg xmlns="http://www.w3.org/2000/svg" version="1.1" width="{w}" height="{h}" viewBox="0 0 {w} {h}">"#,
            w = doc.width,
            h = doc.height
        )?;

        for group in &doc.groups {
            let color = group.color.to_hex();
            let opacity = if group.color.a == 255 {
                String::new()
            } else {
                format!(r#" opacity="{}""#, num(group.color.a as f64 / 255.0))
            };

            let fill = lowering.fill_path(&group.splines);
            if !fill.elements().is_empty() {
                writeln!(
                    out,
                    r#"  <path fill="{}" fill-rule="evenodd"{} d="{}"/>"#,
                    color,
                    opacity,
                    fill.to_svg()
                )?;
            }

            for spline in group.splines.iter().filter(|s| !s.closed) {
                let path = lowering.path(spline);
                if path.elements().is_empty() {
                    continue;
                }
                writeln!(
                    out,
                    r#"  <path fill="none" stroke="{}" stroke-width="{}" stroke-linecap="round" stroke-linejoin="round"{} d="{}"/>"#,
                    color,
                    num(spline.width.unwrap_or(1.0)),
                    opacity,
                    path.to_svg()
                )?;
            }
        }

        writeln!(out, "</svg>")?;
        lowering.finish(self.name(), diagnostics);
        Ok(())
    }
}
