//! Single-page PDF 1.4 writer.
//!
//! The page content is one uncompressed stream using the path operators
//! `m l c h`, filled with `f*` (even-odd) or stroked with `S`. The cross
//! reference table records real byte offsets.

use std::io::Write;

use kurbo::Point;

use crate::diagnostics::Diagnostics;
use crate::document::CurveDocument;
use crate::error::TraceError;
use crate::spline::{Segment, Spline};

use super::{num, Capabilities, OutputWriter};

pub struct PdfWriter;

fn pdf_spline(buf: &mut String, spline: &Spline, height: f64) {
    let pt = |p: Point| format!("{} {}", num(p.x), num(height - p.y));
    let Some(first) = spline.segments.first() else {
        return;
    };
    buf.push_str(&format!("{} m\n", pt(first.start())));
    for segment in &spline.segments {
        match segment {
            Segment::Line(l) => buf.push_str(&format!("{} l\n", pt(l.p1))),
            Segment::Cubic(c) => {
                buf.push_str(&format!("{} {} {} c\n", pt(c.p1), pt(c.p2), pt(c.p3)))
            }
        }
    }
    if spline.closed {
        buf.push_str("h\n");
    }
}

impl PdfWriter {
    fn content(&self, doc: &CurveDocument) -> String {
        let height = doc.height as f64;
        let mut buf = String::from("1 j 1 J\n");
        for group in &doc.groups {
            let (r, g, b) = group.color.unit_rgb();
            let rgb = format!("{} {} {}", num(r), num(g), num(b));

            if group.splines.iter().any(|s| s.closed) {
                buf.push_str(&format!("{} rg\n", rgb));
                for spline in group.splines.iter().filter(|s| s.closed) {
                    pdf_spline(&mut buf, spline, height);
                }
                buf.push_str("f*\n");
            }
            for spline in group.splines.iter().filter(|s| !s.closed) {
                buf.push_str(&format!("{} RG {} w\n", rgb, num(spline.width.unwrap_or(1.0))));
                pdf_spline(&mut buf, spline, height);
                buf.push_str("S\n");
            }
        }
        buf
    }
}

impl OutputWriter for PdfWriter {
    fn name(&self) -> &'static str {
        "pdf"
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["pdf"]
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
        let content = self.content(doc);

        let objects = [
            "<< /Type /Catalog /Pages 2 0 R >>".to_string(),
            "<< /Type /Pages /Kids [3 0 R] /Count 1 >>".to_string(),
            format!(
                "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 {} {}] /Contents 4 0 R /Resources << >> >>",
                doc.width, doc.height
            ),
            format!(
                "<< /Length {} >>\nstream\n{}endstream",
                content.len(),
                content
            ),
        ];

        let mut file: Vec<u8> = Vec::new();
        file.extend_from_slice(b"%PDF-1.4\n");
        let mut offsets = Vec::with_capacity(objects.len());
        for (i, body) in objects.iter().enumerate() {
            offsets.push(file.len());
            file.extend_from_slice(format!("{} 0 obj\n{}\nendobj\n", i + 1, body).as_bytes());
        }

        let xref = file.len();
        file.extend_from_slice(format!("xref\n0 {}\n", objects.len() + 1).as_bytes());
        file.extend_from_slice(b"0000000000 65535 f \n");
        for offset in offsets {
            file.extend_from_slice(format!("{:010} 00000 n \n", offset).as_bytes());
        }
        file.extend_from_slice(
            format!(
                "trailer\n<< /Size {} /Root 1 0 R >>\nstartxref\n{}\n%%EOF\n",
                objects.len() + 1,
                xref
            )
            .as_bytes(),
        );

        out.write_all(&file)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::tests::sample_document;
    use crate::output::{to_bytes, Format};

    fn render(doc: &CurveDocument) -> String {
        let mut diag = Diagnostics::new();
        String::from_utf8(to_bytes(doc, Format::Pdf, &mut diag).unwrap()).unwrap()
    }

    #[test]
    fn xref_offsets_point_at_objects() {
        let text = render(&sample_document());
        let xref_at: usize = text
            .lines()
            .skip_while(|l| *l != "startxref")
            .nth(1)
            .unwrap()
            .parse()
            .unwrap();
        assert!(text[xref_at..].starts_with("xref"));
        for (i, line) in text[xref_at..].lines().skip(3).take(4).enumerate() {
            let offset: usize = line[..10].parse().unwrap();
            assert!(text[offset..].starts_with(&format!("{} 0 obj", i + 1)));
        }
    }

    #[test]
    fn content_uses_fill_and_stroke_operators() {
        let text = render(&sample_document());
        assert!(text.starts_with("%PDF-1.4"));
        assert!(text.contains("/MediaBox [0 0 8 8]"));
        assert!(text.contains(" c\n"));
        assert!(text.contains("f*\n"));
        assert!(text.contains("2 w\n"));
        assert!(text.contains("S\n"));
    }

    #[test]
    fn empty_document_still_has_a_page() {
        let text = render(&CurveDocument::new(5, 5));
        assert!(text.contains("/Type /Page "));
        assert!(text.trim_end().ends_with("%%EOF"));
    }
}
