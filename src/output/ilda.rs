//! ILDA laser show frames (`.ild`), format 5: 2D points with true colour.
//!
//! The drawing is one frame. Curves are flattened to points; the beam is
//! blanked while it travels to the start of each polyline. The image is
//! centred and scaled so its longer side spans the full signed 16-bit
//! range, with y pointing up. A header with zero records ends the file.

use std::io::Write;

use kurbo::Point;

use crate::color::Color;
use crate::diagnostics::Diagnostics;
use crate::document::CurveDocument;
use crate::error::TraceError;

use super::{polylines, Capabilities, Lowering, OutputWriter};

const FORMAT_2D_TRUE_COLOR: u8 = 5;
const LAST_POINT: u8 = 0x80;
const BLANKED: u8 = 0x40;
/// Records are counted in a `u16`.
pub const MAX_POINTS: usize = u16::MAX as usize;

pub struct IldaWriter;

struct LaserPoint {
    x: i16,
    y: i16,
    blanked: bool,
    color: Color,
}

fn header(records: u16, frame: u16, frames: u16) -> [u8; 32] {
    let mut h = [0u8; 32];
    h[..4].copy_from_slice(b"ILDA");
    h[7] = FORMAT_2D_TRUE_COLOR;
    h[8..16].copy_from_slice(b"outline\0");
    h[16..24].copy_from_slice(b"img2spln");
    h[24..26].copy_from_slice(&records.to_be_bytes());
    h[26..28].copy_from_slice(&frame.to_be_bytes());
    h[28..30].copy_from_slice(&frames.to_be_bytes());
    h
}

impl OutputWriter for IldaWriter {
    fn name(&self) -> &'static str {
        "ild"
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["ild", "ilda"]
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
        let (w, h) = (doc.width as f64, doc.height as f64);
        let scale = 2.0 * i16::MAX as f64 / w.max(h).max(1.0);
        let to_i16 = |v: f64| v.round().clamp(i16::MIN as f64, i16::MAX as f64) as i16;
        let project = |p: Point| (to_i16((p.x - w / 2.0) * scale), to_i16((h / 2.0 - p.y) * scale));

        let mut points = Vec::new();
        for group in &doc.groups {
            for spline in &group.splines {
                for (mut polyline, closed) in polylines(&lowering.path(spline)) {
                    let Some(&first) = polyline.first() else {
                        continue;
                    };
                    if closed && polyline.last() != Some(&first) {
                        polyline.push(first);
                    }
                    for (i, &p) in polyline.iter().enumerate() {
                        let (x, y) = project(p);
                        points.push(LaserPoint {
                            x,
                            y,
                            blanked: i == 0,
                            color: group.color,
                        });
                    }
                }
            }
        }
        if points.len() > MAX_POINTS {
            log::warn!(
                "ild: {} points exceed one frame, keeping the first {}",
                points.len(),
                MAX_POINTS
            );
            points.truncate(MAX_POINTS);
        }

        if !points.is_empty() {
            let mut frame = Vec::with_capacity(32 + 8 * points.len());
            frame.extend_from_slice(&header(points.len() as u16, 0, 1));
            let last = points.len() - 1;
            for (i, p) in points.iter().enumerate() {
                let mut status = 0;
                if p.blanked {
                    status |= BLANKED;
                }
                if i == last {
                    status |= LAST_POINT;
                }
                frame.extend_from_slice(&p.x.to_be_bytes());
                frame.extend_from_slice(&p.y.to_be_bytes());
                frame.extend_from_slice(&[status, p.color.b, p.color.g, p.color.r]);
            }
            out.write_all(&frame)?;
        }
        out.write_all(&header(0, 0, 0))?;

        lowering.finish(self.name(), diagnostics);
        Ok(())
    }
}
