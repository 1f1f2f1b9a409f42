//! img2spline: raster images → line and cubic bezier outlines.
//!
//! Traces the regions of a bitmap into closed outlines (or, in centre-line
//! mode, open strokes) built from straight lines and cubic beziers, grouped
//! by colour, and writes them to SVG, EPS, PostScript, PDF, EMF, DXF,
//! HP-GL, CGM, XFig or ILDA.
//!
//! # Example
//!
//! ```no_run
//! use img2spline::{output, trace, Bitmap, FittingOptions, Format};
//!
//! let img = image::open("drawing.png")?;
//! let bitmap = Bitmap::from_dynamic_image(&img)?;
//! let doc = trace(&bitmap, &FittingOptions::default())?;
//!
//! let mut diagnostics = img2spline::Diagnostics::new();
//! let svg = output::to_bytes(&doc, Format::Svg, &mut diagnostics)?;
//! # let _ = svg;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

#![forbid(unsafe_code)]

pub mod bitmap;
pub mod cleanup;
pub mod color;
pub mod config;
pub mod diagnostics;
pub mod document;
pub mod error;
pub mod output;
pub mod separate;
pub mod spline;
pub mod vectorize;

// Re-export kurbo so downstream users get the same version
// used by the segment and path types.
pub use kurbo;

pub use bitmap::{Bitmap, PixelFormat};
pub use color::Color;
pub use config::FittingOptions;
pub use diagnostics::{CancelToken, Diagnostic, Diagnostics, TraceContext};
pub use document::{ColorGroup, CurveDocument};
pub use error::TraceError;
pub use output::{Format, OutputWriter};
pub use spline::{CurvePoint, Segment, Spline, Turn};

use std::path::Path;
use std::time::Instant;

use rayon::prelude::*;

/// Full pipeline with a fresh context; diagnostics are logged and dropped.
pub fn trace(bitmap: &Bitmap, options: &FittingOptions) -> Result<CurveDocument, TraceError> {
    trace_with(bitmap, options, &mut TraceContext::new())
}

/// Full pipeline: bitmap → colour planes → outlines → fitted splines.
///
/// Planes are traced in parallel, each into its own diagnostics sink; the
/// groups and their diagnostics are merged back in palette order, so the
/// result does not depend on scheduling.
pub fn trace_with(
    bitmap: &Bitmap,
    options: &FittingOptions,
    ctx: &mut TraceContext,
) -> Result<CurveDocument, TraceError> {
    let t_start = Instant::now();
    let (w, h) = bitmap.dimensions();
    log::info!(
        "load {}x{} px, {:?}, {}",
        w,
        h,
        bitmap.format(),
        if options.is_monochrome() {
            "monochrome".to_string()
        } else {
            format!("{} colours", options.effective_color_count())
        }
    );

    // ── Separate & clean ──────────────────────────────────
    let planes = separate::separate(bitmap, options);
    log::info!(
        "clean {} plane(s), despeckle level {}",
        planes.len(),
        options.effective_despeckle_level()
    );

    // ── Vectorize ─────────────────────────────────────────
    let traced: Vec<Result<(ColorGroup, Diagnostics), TraceError>> = planes
        .par_iter()
        .map(|plane| {
            log::debug!(
                "plane {}: {} foreground px",
                plane.color,
                cleanup::foreground_count(&plane.mask)
            );
            let mut plane_ctx = ctx.child();
            let splines = vectorize::trace_plane(&plane.mask, options, &mut plane_ctx)?;
            Ok((
                ColorGroup {
                    color: plane.color,
                    splines,
                },
                plane_ctx.diagnostics,
            ))
        })
        .collect();

    let mut doc = CurveDocument::new(w, h);
    for result in traced {
        let (group, diagnostics) = result?;
        ctx.diagnostics.extend(diagnostics);
        if !group.splines.is_empty() {
            doc.groups.push(group);
        }
    }

    if doc.is_empty() {
        ctx.diagnostics.push(Diagnostic::DegenerateGeometry {
            detail: "no foreground left to trace".to_string(),
        });
    }

    let (lines, cubics) = doc.segment_counts();
    log::info!(
        "result {} outline(s) in {} group(s): {} cubics + {} lines ({}ms)",
        doc.outline_count(),
        doc.groups.len(),
        cubics,
        lines,
        t_start.elapsed().as_millis()
    );
    Ok(doc)
}

/// Convenience: decode an image file and trace it.
pub fn trace_file(
    path: &Path,
    options: &FittingOptions,
    ctx: &mut TraceContext,
) -> Result<CurveDocument, TraceError> {
    let img = image::open(path)?;
    let bitmap = Bitmap::from_dynamic_image(&img)?;
    trace_with(&bitmap, options, ctx)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gray(w: u32, h: u32, f: impl Fn(u32, u32) -> u8) -> Bitmap {
        let data = (0..h).flat_map(|y| (0..w).map(move |x| (x, y))).map(|(x, y)| f(x, y)).collect();
        Bitmap::new(w, h, PixelFormat::Gray8, data).unwrap()
    }

    #[test]
    fn blank_image_is_empty_with_diagnostic() {
        let mut ctx = TraceContext::new();
        let doc = trace_with(&gray(8, 8, |_, _| 255), &FittingOptions::default(), &mut ctx).unwrap();
        assert!(doc.is_empty());
        assert_eq!((doc.width, doc.height), (8, 8));
        assert!(matches!(ctx.diagnostics.events()[0], Diagnostic::DegenerateGeometry { .. }));
    }

    #[test]
    fn black_square_is_one_black_group() {
        let bitmap = gray(12, 12, |x, y| if (3..9).contains(&x) && (3..9).contains(&y) { 0 } else { 255 });
        let doc = trace(&bitmap, &FittingOptions::default()).unwrap();
        assert_eq!(doc.groups.len(), 1);
        assert_eq!(doc.groups[0].color, Color::BLACK);
        assert_eq!(doc.outline_count(), 1);
        assert_eq!(doc.segment_counts(), (4, 0));
    }

    #[test]
    fn cancellation_aborts_the_run() {
        let cancel = CancelToken::new();
        cancel.cancel();
        let mut ctx = TraceContext::with_cancel(cancel);
        let bitmap = gray(6, 6, |x, _| if x < 3 { 0 } else { 255 });
        let result = trace_with(&bitmap, &FittingOptions::default(), &mut ctx);
        assert!(matches!(result, Err(TraceError::Cancelled)));
    }

    #[test]
    fn missing_file_is_an_image_load_error() {
        let mut ctx = TraceContext::new();
        let result = trace_file(Path::new("does/not/exist.png"), &FittingOptions::default(), &mut ctx);
        assert!(matches!(result, Err(TraceError::ImageLoad(_))));
    }
}
