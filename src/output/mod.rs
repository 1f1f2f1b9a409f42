//! Output formatters for a finished [`CurveDocument`].
//!
//! Every format implements [`OutputWriter`]. A writer declares whether it
//! can store cubic beziers; formats that cannot get flattened polylines
//! from [`Lowering`], and the loss is reported once per document as
//! [`Diagnostic::UnsupportedFeature`].
//!
//! Formats are chosen by name or file extension, never by content.

pub mod cgm;
pub mod dxf;
pub mod emf;
pub mod eps;
pub mod fig;
pub mod hpgl;
pub mod ilda;
pub mod pdf;
pub mod svg;

use std::fmt;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::str::FromStr;

use kurbo::{BezPath, PathEl, Point};

use crate::diagnostics::{Diagnostic, Diagnostics};
use crate::document::CurveDocument;
use crate::error::TraceError;
use crate::spline::Spline;

/// Tolerance (pixels) for flattening cubics into polylines.
pub const FLATTEN_TOLERANCE: f64 = 0.25;

/// Curve primitives a format can store natively.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    pub cubic: bool,
}

impl Capabilities {
    pub const CUBIC: Capabilities = Capabilities { cubic: true };
    pub const POLYLINE: Capabilities = Capabilities { cubic: false };
}

/// A vector format backend.
///
/// Writers only read the document. Paths handed out by [`Lowering`] are
/// already reduced to the writer's capabilities.
pub trait OutputWriter: Send + Sync {
    fn name(&self) -> &'static str;
    fn extensions(&self) -> &'static [&'static str];
    fn capabilities(&self) -> Capabilities;
    fn write(
        &self,
        doc: &CurveDocument,
        out: &mut dyn Write,
        diagnostics: &mut Diagnostics,
    ) -> Result<(), TraceError>;
}

/// The built-in formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Format {
    Svg,
    Eps,
    Ps,
    Pdf,
    Dxf,
    Plt,
    Cgm,
    Emf,
    Fig,
    Ild,
}

impl Format {
    pub const ALL: [Format; 10] = [
        Format::Svg,
        Format::Eps,
        Format::Ps,
        Format::Pdf,
        Format::Dxf,
        Format::Plt,
        Format::Cgm,
        Format::Emf,
        Format::Fig,
        Format::Ild,
    ];

    pub fn writer(self) -> Box<dyn OutputWriter> {
        match self {
            Format::Svg => Box::new(svg::SvgWriter),
            Format::Eps => Box::new(eps::EpsWriter::encapsulated()),
            Format::Ps => Box::new(eps::EpsWriter::document()),
            Format::Pdf => Box::new(pdf::PdfWriter),
            Format::Dxf => Box::new(dxf::DxfWriter),
            Format::Plt => Box::new(hpgl::HpglWriter),
            Format::Cgm => Box::new(cgm::CgmWriter),
            Format::Emf => Box::new(emf::EmfWriter),
            Format::Fig => Box::new(fig::FigWriter),
            Format::Ild => Box::new(ilda::IldaWriter),
        }
    }

    /// Look up a format by name or extension, case-insensitively.
    pub fn from_name(name: &str) -> Result<Format, TraceError> {
        let wanted = name.trim().trim_start_matches('.').to_ascii_lowercase();
        Format::ALL
            .into_iter()
            .find(|f| {
                let w = f.writer();
                w.name() == wanted || w.extensions().contains(&wanted.as_str())
            })
            .ok_or_else(|| TraceError::UnknownFormat(name.to_string()))
    }

    /// Format implied by a file's extension.
    pub fn from_path(path: &Path) -> Result<Format, TraceError> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .ok_or_else(|| TraceError::UnknownFormat(path.display().to_string()))?;
        Format::from_name(ext)
    }
}

impl FromStr for Format {
    type Err = TraceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Format::from_name(s)
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.writer().name())
    }
}

/// Serialize `doc` in `format` to any sink.
pub fn write_document(
    doc: &CurveDocument,
    format: Format,
    out: &mut dyn Write,
    diagnostics: &mut Diagnostics,
) -> Result<(), TraceError> {
    format.writer().write(doc, out, diagnostics)?;
    out.flush()?;
    Ok(())
}

/// Serialize `doc` in `format` to a byte vector.
pub fn to_bytes(
    doc: &CurveDocument,
    format: Format,
    diagnostics: &mut Diagnostics,
) -> Result<Vec<u8>, TraceError> {
    let mut buf = Vec::new();
    write_document(doc, format, &mut buf, diagnostics)?;
    Ok(buf)
}

/// Write `doc` to `path`, choosing the format from the extension.
pub fn write_file(
    doc: &CurveDocument,
    path: &Path,
    diagnostics: &mut Diagnostics,
) -> Result<Format, TraceError> {
    let format = Format::from_path(path)?;
    let mut out = BufWriter::new(File::create(path)?);
    write_document(doc, format, &mut out, diagnostics)?;
    log::info!("wrote {} ({})", path.display(), format);
    Ok(format)
}

// ── Lowering ─────────────────────────────────────────────

/// Reduces spline paths to what a writer can draw and counts the cubics
/// it had to approximate.
#[derive(Debug)]
pub struct Lowering {
    caps: Capabilities,
    lowered: usize,
}

impl Lowering {
    pub fn new(caps: Capabilities) -> Self {
        Self { caps, lowered: 0 }
    }

    /// The spline as a path using only supported primitives.
    pub fn path(&mut self, spline: &Spline) -> BezPath {
        let path = spline.to_bez_path();
        if self.caps.cubic {
            return path;
        }
        let cubics = spline.cubic_count();
        if cubics == 0 {
            return path;
        }
        self.lowered += cubics;
        to_polyline(&path)
    }

    /// Combined path of every closed spline in a slice.
    pub fn fill_path(&mut self, splines: &[Spline]) -> BezPath {
        let mut path = BezPath::new();
        for spline in splines.iter().filter(|s| s.closed) {
            for el in self.path(spline).elements() {
                path.push(*el);
            }
        }
        path
    }

    /// Record the lossy fallback, if any, against `format`.
    pub fn finish(self, format: &'static str, diagnostics: &mut Diagnostics) {
        if self.lowered > 0 {
            diagnostics.push(Diagnostic::UnsupportedFeature {
                format,
                count: self.lowered,
            });
        }
    }
}

fn to_polyline(path: &BezPath) -> BezPath {
    let mut out = BezPath::new();
    kurbo::flatten(path.elements().iter().copied(), FLATTEN_TOLERANCE, |el| {
        out.push(el)
    });
    out
}

/// Split a path into subpaths of points, with a closed flag each.
/// Only valid for paths made of MoveTo / LineTo / ClosePath.
pub(crate) fn polylines(path: &BezPath) -> Vec<(Vec<Point>, bool)> {
    let mut out: Vec<(Vec<Point>, bool)> = Vec::new();
    for el in path.elements() {
        match *el {
            PathEl::MoveTo(p) => out.push((vec![p], false)),
            PathEl::LineTo(p) | PathEl::QuadTo(_, p) | PathEl::CurveTo(_, _, p) => {
                if let Some((pts, _)) = out.last_mut() {
                    pts.push(p);
                }
            }
            PathEl::ClosePath => {
                if let Some((_, closed)) = out.last_mut() {
                    *closed = true;
                }
            }
        }
    }
    out
}

/// Compact decimal: at most three places, no trailing zeros, no `-0`.
pub(crate) fn num(v: f64) -> String {
    let s = format!("{:.3}", v);
    let s = s.trim_end_matches('0').trim_end_matches('.');
    if s == "-0" || s.is_empty() {
        "0".to_string()
    } else {
        s.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::Color;
    use crate::document::ColorGroup;
    use crate::spline::{Segment, Turn};
    use kurbo::{CubicBez, Line};
    use proptest::prelude::*;

    pub(crate) fn sample_document() -> CurveDocument {
        let square = Spline {
            segments: vec![
                Segment::Line(Line::new((1.0, 1.0), (5.0, 1.0))),
                Segment::Cubic(CubicBez::new((5.0, 1.0), (6.0, 2.0), (6.0, 4.0), (5.0, 5.0))),
                Segment::Line(Line::new((5.0, 5.0), (1.0, 5.0))),
                Segment::Line(Line::new((1.0, 5.0), (1.0, 1.0))),
            ],
            points: vec![],
            closed: true,
            outline: 0,
            turn: Some(Turn::Clockwise),
            parent: None,
            width: None,
        };
        let stroke = Spline {
            segments: vec![Segment::Line(Line::new((0.5, 7.5), (7.5, 7.5)))],
            points: vec![],
            closed: false,
            outline: 1,
            turn: None,
            parent: None,
            width: Some(2.0),
        };
        let mut doc = CurveDocument::new(8, 8);
        doc.groups.push(ColorGroup {
            color: Color::rgb(200, 30, 30),
            splines: vec![square, stroke],
        });
        doc
    }

    #[test]
    fn format_lookup_by_name_and_extension() {
        assert_eq!(Format::from_name("SVG").unwrap(), Format::Svg);
        assert_eq!(Format::from_name(".hpgl").unwrap(), Format::Plt);
        assert_eq!(Format::from_path(Path::new("out/drawing.eps")).unwrap(), Format::Eps);
        assert_eq!(Format::from_name("EMF").unwrap(), Format::Emf);
        assert_eq!(Format::from_path(Path::new("plot.xfig")).unwrap(), Format::Fig);
        assert_eq!(Format::from_name("ilda").unwrap(), Format::Ild);
        assert!(matches!(Format::from_name("wmf"), Err(TraceError::UnknownFormat(_))));
        assert!(Format::from_path(Path::new("noext")).is_err());
    }

    #[test]
    fn cubic_formats_report_nothing() {
        let doc = sample_document();
        for format in [Format::Svg, Format::Eps, Format::Ps, Format::Pdf, Format::Emf] {
            let mut diag = Diagnostics::new();
            to_bytes(&doc, format, &mut diag).unwrap();
            assert!(diag.is_empty(), "{} reported {:?}", format, diag.events());
        }
    }

    #[test]
    fn polyline_formats_report_one_fallback() {
        let doc = sample_document();
        for format in [Format::Dxf, Format::Plt, Format::Cgm, Format::Fig, Format::Ild] {
            let mut diag = Diagnostics::new();
            to_bytes(&doc, format, &mut diag).unwrap();
            assert_eq!(diag.len(), 1, "{}", format);
            assert!(matches!(
                diag.events()[0],
                Diagnostic::UnsupportedFeature { count: 1, .. }
            ));
        }
    }

    #[test]
    fn polyline_lowering_flattens_only_cubic_splines() {
        let doc = sample_document();
        let mut lowering = Lowering::new(Capabilities::POLYLINE);
        let square = lowering.path(&doc.groups[0].splines[0]);
        assert!(square.elements().iter().all(|el| !matches!(el, PathEl::CurveTo(..))));
        assert!(square.elements().len() > 6);
        let stroke = lowering.path(&doc.groups[0].splines[1]);
        assert_eq!(stroke, doc.groups[0].splines[1].to_bez_path());
        let mut diag = Diagnostics::new();
        lowering.finish("test", &mut diag);
        assert_eq!(diag.events(), &[Diagnostic::UnsupportedFeature { format: "test", count: 1 }]);
    }

    #[test]
    fn cubic_lowering_passes_paths_through() {
        let doc = sample_document();
        let mut lowering = Lowering::new(Capabilities::CUBIC);
        let square = &doc.groups[0].splines[0];
        assert_eq!(lowering.path(square), square.to_bez_path());
        let mut diag = Diagnostics::new();
        lowering.finish("test", &mut diag);
        assert!(diag.is_empty());
    }

    #[test]
    fn writes_file_by_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("drawing.svg");
        let mut diag = Diagnostics::new();
        let format = write_file(&sample_document(), &path, &mut diag).unwrap();
        assert_eq!(format, Format::Svg);
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("<?xml"));
    }

    #[test]
    fn numbers_are_compact() {
        assert_eq!(num(1.0), "1");
        assert_eq!(num(2.5), "2.5");
        assert_eq!(num(-0.0001), "0");
        assert_eq!(num(1.23456), "1.235");
    }

    #[test]
    fn empty_document_is_non_empty_in_every_format() {
        let doc = CurveDocument::new(4, 3);
        for format in Format::ALL {
            let mut diag = Diagnostics::new();
            let bytes = to_bytes(&doc, format, &mut diag).unwrap();
            assert!(!bytes.is_empty(), "{}", format);
            assert!(diag.is_empty());
        }
    }

    proptest! {
        #[test]
        fn every_writer_emits_bytes(w in 1u32..64, h in 1u32..64, x in 0.0f64..50.0, y in 0.0f64..50.0) {
            let mut doc = sample_document();
            doc.width = w;
            doc.height = h;
            doc.groups[0].splines[1].segments = vec![Segment::Line(Line::new((x, y), (y, x)))];
            for format in Format::ALL {
                let mut diag = Diagnostics::new();
                let bytes = to_bytes(&doc, format, &mut diag).unwrap();
                prop_assert!(!bytes.is_empty());
            }
        }
    }
}
