//! Vectorization of one colour plane: binary mask → splines.
//!
//! Filled mode:
//! 1. Pixel-edge outline extraction (pixel-corner grid)
//! 2. RDP polygon + corner detection on the dense outline
//! 3. Line / cubic fitting between corners
//!
//! Centre-line mode thins the mask first and fits the skeleton chains
//! instead of the outlines.

pub mod centerline;
pub mod corners;
pub mod curve;
pub mod outline;

use image::GrayImage;
use kurbo::Point;

use crate::cleanup::thin;
use crate::config::FittingOptions;
use crate::diagnostics::{Diagnostic, TraceContext};
use crate::error::TraceError;
use crate::spline::Spline;

use corners::CornerParams;
use curve::FitParams;

/// Trace one plane mask (foreground = non-zero).
///
/// Cancellation is checked between outlines (or chains).
pub fn trace_plane(
    mask: &GrayImage,
    options: &FittingOptions,
    ctx: &mut TraceContext,
) -> Result<Vec<Spline>, TraceError> {
    if options.centerline {
        trace_centerlines(mask, options, ctx)
    } else {
        trace_outlines(mask, options, ctx)
    }
}

fn trace_outlines(
    mask: &GrayImage,
    options: &FittingOptions,
    ctx: &mut TraceContext,
) -> Result<Vec<Spline>, TraceError> {
    let corner_params = CornerParams::from(options);
    let fit_params = FitParams::from(options);
    let arena = outline::extract_outlines(mask);

    let mut splines = Vec::with_capacity(arena.len());
    for (id, pixel_outline) in arena.iter() {
        ctx.cancel.check()?;
        let points: Vec<Point> = pixel_outline
            .points
            .iter()
            .map(|&(x, y)| Point::new(x as f64, y as f64))
            .collect();
        let vertices = corners::simplify_polygon(&points, true);
        let corner_idx = corners::find_corners(&points, &vertices, true, &corner_params);
        let fitted = curve::fit_outline(&points, &corner_idx, true, &fit_params, &mut ctx.diagnostics);
        splines.push(Spline {
            segments: fitted.segments,
            points: fitted.points,
            closed: true,
            outline: id.0,
            turn: Some(pixel_outline.turn),
            parent: pixel_outline.parent.map(|p| p.0),
            width: None,
        });
    }
    Ok(splines)
}

fn trace_centerlines(
    mask: &GrayImage,
    options: &FittingOptions,
    ctx: &mut TraceContext,
) -> Result<Vec<Spline>, TraceError> {
    let corner_params = CornerParams::from(options);
    let fit_params = FitParams::from(options);

    let mut skeleton = mask.clone();
    thin(&mut skeleton);
    let chains = centerline::extract_chains(&skeleton, &mut ctx.diagnostics);
    let depth = options.preserve_width.then(|| centerline::depth_map(mask));

    let mut splines = Vec::with_capacity(chains.len());
    for (i, chain) in chains.iter().enumerate() {
        ctx.cancel.check()?;
        let points = chain.points();
        if points.len() < 2 {
            ctx.diagnostics.push(Diagnostic::DegenerateGeometry {
                detail: format!("chain {} has a single point", i),
            });
            continue;
        }
        let vertices = corners::simplify_polygon(&points, chain.closed);
        let corner_idx = corners::find_corners(&points, &vertices, chain.closed, &corner_params);
        let fitted =
            curve::fit_outline(&points, &corner_idx, chain.closed, &fit_params, &mut ctx.diagnostics);
        splines.push(Spline {
            segments: fitted.segments,
            points: fitted.points,
            closed: chain.closed,
            outline: i,
            turn: None,
            parent: None,
            width: depth.as_ref().map(|d| centerline::chain_width(d, chain)),
        });
    }
    Ok(splines)
}
