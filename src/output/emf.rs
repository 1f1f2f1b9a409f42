//! Windows Enhanced Metafile (`.emf`) writer.
//!
//! The file is a little-endian record stream. Each colour group selects a
//! solid brush and fills one path holding all of its closed splines with
//! the alternate (even-odd) rule; open splines are stroked one path each
//! with their own pen. Points use the 16-bit records, in logical units
//! that are a power-of-two fraction of a pixel, and an anisotropic mapping
//! scales them back to one device unit per pixel.

use std::io::Write;

use kurbo::Point;

use crate::color::Color;
use crate::diagnostics::Diagnostics;
use crate::document::CurveDocument;
use crate::error::TraceError;
use crate::spline::{Segment, Spline};

use super::{Capabilities, OutputWriter};

const EMR_HEADER: u32 = 1;
const EMR_SETWINDOWEXTEX: u32 = 9;
const EMR_SETVIEWPORTEXTEX: u32 = 11;
const EMR_EOF: u32 = 14;
const EMR_SETMAPMODE: u32 = 17;
const EMR_SETPOLYFILLMODE: u32 = 19;
const EMR_MOVETOEX: u32 = 27;
const EMR_SELECTOBJECT: u32 = 37;
const EMR_CREATEPEN: u32 = 38;
const EMR_CREATEBRUSHINDIRECT: u32 = 39;
const EMR_DELETEOBJECT: u32 = 40;
const EMR_BEGINPATH: u32 = 59;
const EMR_ENDPATH: u32 = 60;
const EMR_CLOSEFIGURE: u32 = 61;
const EMR_FILLPATH: u32 = 62;
const EMR_STROKEPATH: u32 = 64;
const EMR_POLYBEZIERTO16: u32 = 88;
const EMR_POLYLINETO16: u32 = 89;

/// `" EMF"` read as a little-endian word.
const SIGNATURE: u32 = 0x464D_4520;
const MM_ANISOTROPIC: u32 = 8;
const ALTERNATE: u32 = 1;
const BS_SOLID: u32 = 0;
const PS_SOLID: u32 = 0;
const WHITE_BRUSH: u32 = 0x8000_0000;
const BLACK_PEN: u32 = 0x8000_0007;

/// Object table slots; slot 0 is reserved by the format.
const BRUSH_SLOT: u32 = 1;
const PEN_SLOT: u32 = 2;

/// Reference device: 96 dpi.
const DEVICE_PX: (u32, u32) = (1920, 1080);
const DEVICE_MM: (u32, u32) = (508, 286);

/// Logical units per pixel, the largest that keeps the page in `i16`.
pub fn units_per_pixel(width: u32, height: u32) -> u32 {
    let side = width.max(height).max(1);
    [16, 8, 4, 2]
        .into_iter()
        .find(|s| side.checked_mul(*s).is_some_and(|v| v <= i16::MAX as u32))
        .unwrap_or(1)
}

pub struct EmfWriter;

/// Record stream under construction.
struct Records {
    bytes: Vec<u8>,
    count: u32,
    scale: f64,
}

fn words(values: &[u32]) -> Vec<u8> {
    values.iter().flat_map(|v| v.to_le_bytes()).collect()
}

fn colorref(c: Color) -> u32 {
    c.r as u32 | (c.g as u32) << 8 | (c.b as u32) << 16
}

impl Records {
    fn push(&mut self, kind: u32, fields: &[u8]) {
        self.bytes.extend_from_slice(&kind.to_le_bytes());
        self.bytes.extend_from_slice(&(8 + fields.len() as u32).to_le_bytes());
        self.bytes.extend_from_slice(fields);
        self.count += 1;
    }

    fn push_words(&mut self, kind: u32, values: &[u32]) {
        self.push(kind, &words(values));
    }

    fn logical(&self, p: Point) -> (i16, i16) {
        let clamp = |v: f64| (v * self.scale).round().clamp(i16::MIN as f64, i16::MAX as f64) as i16;
        (clamp(p.x), clamp(p.y))
    }

    /// `EMR_POLYBEZIERTO16` or `EMR_POLYLINETO16` with device-unit bounds.
    fn poly16(&mut self, kind: u32, points: &[(i16, i16)]) {
        let scale = self.scale as i32;
        let (mut x0, mut y0, mut x1, mut y1) = (i32::MAX, i32::MAX, i32::MIN, i32::MIN);
        for &(x, y) in points {
            x0 = x0.min(x as i32 / scale);
            y0 = y0.min(y as i32 / scale);
            x1 = x1.max(x as i32 / scale);
            y1 = y1.max(y as i32 / scale);
        }
        let mut fields = words(&[x0 as u32, y0 as u32, x1 as u32, y1 as u32, points.len() as u32]);
        for &(x, y) in points {
            fields.extend_from_slice(&x.to_le_bytes());
            fields.extend_from_slice(&y.to_le_bytes());
        }
        self.push(kind, &fields);
    }

    /// One figure: a move, then runs of lines and of cubics.
    fn figure(&mut self, spline: &Spline) {
        let Some(first) = spline.segments.first() else {
            return;
        };
        let (x, y) = self.logical(first.start());
        self.push_words(EMR_MOVETOEX, &[x as i32 as u32, y as i32 as u32]);

        let mut run: Vec<(i16, i16)> = Vec::new();
        let mut run_kind = EMR_POLYLINETO16;
        for segment in &spline.segments {
            let (kind, points) = match segment {
                Segment::Line(l) => (EMR_POLYLINETO16, vec![l.p1]),
                Segment::Cubic(c) => (EMR_POLYBEZIERTO16, vec![c.p1, c.p2, c.p3]),
            };
            if kind != run_kind && !run.is_empty() {
                self.poly16(run_kind, &run);
                run.clear();
            }
            run_kind = kind;
            run.extend(points.into_iter().map(|p| self.logical(p)));
        }
        if !run.is_empty() {
            self.poly16(run_kind, &run);
        }
        if spline.closed {
            self.push(EMR_CLOSEFIGURE, &[]);
        }
    }
}

impl OutputWriter for EmfWriter {
    fn name(&self) -> &'static str {
        "emf"
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["emf"]
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
        let scale = units_per_pixel(doc.width, doc.height);
        let mut records = Records {
            bytes: Vec::new(),
            count: 0,
            scale: scale as f64,
        };
        let page = [
            0,
            0,
            doc.width.saturating_sub(1),
            doc.height.saturating_sub(1),
        ];

        records.push_words(EMR_SETMAPMODE, &[MM_ANISOTROPIC]);
        records.push_words(EMR_SETWINDOWEXTEX, &[doc.width * scale, doc.height * scale]);
        records.push_words(EMR_SETVIEWPORTEXTEX, &[doc.width, doc.height]);
        records.push_words(EMR_SETPOLYFILLMODE, &[ALTERNATE]);

        for group in &doc.groups {
            let color = colorref(group.color);
            if group.splines.iter().any(|s| s.closed) {
                records.push_words(EMR_CREATEBRUSHINDIRECT, &[BRUSH_SLOT, BS_SOLID, color, 0]);
                records.push_words(EMR_SELECTOBJECT, &[BRUSH_SLOT]);
                records.push(EMR_BEGINPATH, &[]);
                for spline in group.splines.iter().filter(|s| s.closed) {
                    records.figure(spline);
                }
                records.push(EMR_ENDPATH, &[]);
                records.push_words(EMR_FILLPATH, &page);
                records.push_words(EMR_SELECTOBJECT, &[WHITE_BRUSH]);
                records.push_words(EMR_DELETEOBJECT, &[BRUSH_SLOT]);
            }
            for spline in group.splines.iter().filter(|s| !s.closed) {
                let width = (spline.width.unwrap_or(1.0) * scale as f64).round().max(1.0) as u32;
                records.push_words(EMR_CREATEPEN, &[PEN_SLOT, PS_SOLID, width, 0, color]);
                records.push_words(EMR_SELECTOBJECT, &[PEN_SLOT]);
                records.push(EMR_BEGINPATH, &[]);
                records.figure(spline);
                records.push(EMR_ENDPATH, &[]);
                records.push_words(EMR_STROKEPATH, &page);
                records.push_words(EMR_SELECTOBJECT, &[BLACK_PEN]);
                records.push_words(EMR_DELETEOBJECT, &[PEN_SLOT]);
            }
        }

        // nPalEntries, offPalEntries, nSizeLast
        records.push_words(EMR_EOF, &[0, 16, 20]);

        let header_size = 88u32;
        let total = header_size + records.bytes.len() as u32;
        let frame = |px: u32| (px as f64 * 2540.0 / 96.0).round() as u32;
        let mut header = words(&[EMR_HEADER, header_size]);
        header.extend(words(&page));
        header.extend(words(&[0, 0, frame(doc.width), frame(doc.height)]));
        header.extend(words(&[SIGNATURE, 0x0001_0000, total, records.count + 1]));
        // Object slots in use, counting the reserved slot 0; then a reserved u16.
        header.extend_from_slice(&3u16.to_le_bytes());
        header.extend_from_slice(&0u16.to_le_bytes());
        // No description, no palette.
        header.extend(words(&[0, 0, 0]));
        header.extend(words(&[DEVICE_PX.0, DEVICE_PX.1, DEVICE_MM.0, DEVICE_MM.1]));

        out.write_all(&header)?;
        out.write_all(&records.bytes)?;
        Ok(())
    }
}
