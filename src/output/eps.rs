//! PostScript writers: Encapsulated PostScript and plain PostScript.
//!
//! One pixel maps to one PostScript point. PostScript's y axis points up,
//! so every y is flipped against the document height.

use std::io::Write;

use kurbo::Point;

use crate::diagnostics::Diagnostics;
use crate::document::CurveDocument;
use crate::error::TraceError;
use crate::spline::{Segment, Spline};

use super::{num, Capabilities, OutputWriter};

pub struct EpsWriter {
    encapsulated: bool,
}

impl EpsWriter {
    /// `%!PS-Adobe-3.0 EPSF-3.0`, for embedding.
    pub fn encapsulated() -> Self {
        Self { encapsulated: true }
    }

    /// A printable one-page PostScript program.
    pub fn document() -> Self {
        Self {
            encapsulated: false,
        }
    }
}

/// Append one spline as PostScript path operators.
pub(crate) fn ps_spline(buf: &mut String, spline: &Spline, height: f64) {
    let pt = |p: Point| format!("{} {}", num(p.x), num(height - p.y));
    let Some(first) = spline.segments.first() else {
        return;
    };
    buf.push_str(&format!("{} moveto\n", pt(first.start())));
    for segment in &spline.segments {
        let line = match segment {
            Segment::Line(l) => format!("{} lineto\n", pt(l.p1)),
            Segment::Cubic(c) => format!("{} {} {} curveto\n", pt(c.p1), pt(c.p2), pt(c.p3)),
        };
        buf.push_str(&line);
    }
    if spline.closed {
        buf.push_str("closepath\n");
    }
}

impl OutputWriter for EpsWriter {
    fn name(&self) -> &'static str {
        if self.encapsulated {
            "eps"
        } else {
            "ps"
        }
    }

    fn extensions(&self) -> &'static [&'static str] {
        if self.encapsulated {
            &["eps", "epsf"]
        } else {
            &["ps"]
        }
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::CUBIC
    }

    fn write(
        &self,
        doc: &CurveDocument,
        out: &mut dyn Write,
        _diagnostics: &mut Diagnostics,
    ) -> Result<(), TraceError> {
        let height = doc.height as f64;

        if self.encapsulated {
            writeln!(out, "%!PS-Adobe-3.0 EPSF-3.0")?;
        } else {
            writeln!(out, "%!PS-Adobe-3.0")?;
        }
        writeln!(out, "%%Creator: img2spline")?;
        writeln!(out, "%%BoundingBox: 0 0 {} {}", doc.width, doc.height)?;
        if !self.encapsulated {
            writeln!(out, "%%Pages: 1")?;
        }
        writeln!(out, "%%EndComments")?;
        if !self.encapsulated {
            writeln!(out, "%%Page: 1 1")?;
        }
        writeln!(out, "1 setlinejoin 1 setlinecap")?;

        let mut body = String::new();
        for group in &doc.groups {
            let (r, g, b) = group.color.unit_rgb();
            body.push_str(&format!("{} {} {} setrgbcolor\n", num(r), num(g), num(b)));

            if group.splines.iter().any(|s| s.closed) {
                body.push_str("newpath\n");
                for spline in group.splines.iter().filter(|s| s.closed) {
                    ps_spline(&mut body, spline, height);
                }
                body.push_str("eofill\n");
            }
            for spline in group.splines.iter().filter(|s| !s.closed) {
                body.push_str(&format!("{} setlinewidth\nnewpath\n", num(spline.width.unwrap_or(1.0))));
                ps_spline(&mut body, spline, height);
                body.push_str("stroke\n");
            }
        }
        out.write_all(body.as_bytes())?;

        if !self.encapsulated {
            writeln!(out, "showpage")?;
        }
        writeln!(out, "%%EOF")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::tests::sample_document;
    use crate::output::{to_bytes, Format};

    fn render(doc: &CurveDocument, format: Format) -> String {
        let mut diag = Diagnostics::new();
        String::from_utf8(to_bytes(doc, format, &mut diag).unwrap()).unwrap()
    }

    #[test]
    fn eps_header_and_flipped_coordinates() {
        let text = render(&sample_document(), Format::Eps);
        assert!(text.starts_with("%!PS-Adobe-3.0 EPSF-3.0"));
        assert!(text.contains("%%BoundingBox: 0 0 8 8"));
        // (1, 1) in image space is (1, 7) in PostScript space.
        assert!(text.contains("1 7 moveto"));
        assert!(text.contains("curveto"));
        assert!(text.contains("eofill"));
        assert!(text.contains("2 setlinewidth"));
        assert!(!text.contains("showpage"));
    }

    #[test]
    fn ps_has_a_page() {
        let text = render(&CurveDocument::new(3, 3), Format::Ps);
        assert!(text.starts_with("%!PS-Adobe-3.0\n"));
        assert!(text.contains("showpage"));
        assert!(text.trim_end().ends_with("%%EOF"));
    }
}
