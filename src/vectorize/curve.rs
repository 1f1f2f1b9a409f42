//! Line and cubic fitting between corners.
//!
//! Outline points are smoothed (corners pinned), cut at corners into
//! chains, and each chain is fit independently. Closed outlines without
//! corners are cut at their four axis extrema instead, with one shared
//! tangent at each cut so the pieces join smoothly.
//!
//! A chain becomes a Line when it stays within `line_threshold` of its
//! chord. Otherwise a cubic with fixed end tangents is fit by least
//! squares; if the worst point is further than `error_threshold` the
//! chain is split there and both halves go back on the worklist.

use kurbo::{CubicBez, Line, ParamCurve, ParamCurveDeriv, Point, Vec2};

use crate::config::FittingOptions;
use crate::diagnostics::{Diagnostic, Diagnostics};
use crate::spline::{CurvePoint, Segment};

/// Subdivision depth at which a fit is accepted regardless of error.
pub const MAX_DEPTH: u32 = 12;
/// Spans shorter than this are not split further.
const MIN_SPLIT_POINTS: usize = 5;
/// Newton reparametrisation passes per cubic fit.
const REPARAM_PASSES: usize = 4;
const EPSILON: f64 = 1e-12;

/// Fitting settings, derived from [`FittingOptions`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FitParams {
    pub line_threshold: f64,
    pub line_reversion_threshold: f64,
    pub error_threshold: f64,
    pub filter_iterations: usize,
    pub tangent_surround: usize,
}

impl From<&FittingOptions> for FitParams {
    fn from(options: &FittingOptions) -> Self {
        Self {
            line_threshold: options.line_threshold.max(0.0),
            line_reversion_threshold: options.line_reversion_threshold.max(0.0),
            error_threshold: options.error_threshold.max(0.0),
            filter_iterations: options.filter_iterations,
            tangent_surround: options.tangent_surround.max(1),
        }
    }
}

/// Segments and knots for one outline or centre-line.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FittedPath {
    pub segments: Vec<Segment>,
    pub points: Vec<CurvePoint>,
}

/// Fit an outline given its dense points and corner indices (ascending).
///
/// For open chains, `corners` must include both endpoints.
pub fn fit_outline(
    points: &[Point],
    corners: &[usize],
    closed: bool,
    params: &FitParams,
    diagnostics: &mut Diagnostics,
) -> FittedPath {
    let n = points.len();
    if n < 2 {
        return FittedPath::default();
    }

    let mut pinned = vec![false; n];
    for &c in corners {
        pinned[c] = true;
    }
    if !closed {
        pinned[0] = true;
        pinned[n - 1] = true;
    }
    let smoothed = smooth_pinned(points, &pinned, closed, params.filter_iterations);

    let smooth_joins = closed && corners.is_empty();
    let splits: Vec<usize> = if smooth_joins {
        extremum_splits(points)
    } else if closed {
        corners.to_vec()
    } else {
        let mut s = corners.to_vec();
        s.push(0);
        s.push(n - 1);
        s.sort_unstable();
        s.dedup();
        s
    };

    let m = splits.len();
    let chain_count = if closed { m } else { m - 1 };
    let mut segments = Vec::new();
    let mut corner_starts = Vec::new();

    for c in 0..chain_count {
        let start = splits[c];
        let end = if closed {
            let next = splits[(c + 1) % m];
            if next > start {
                next
            } else {
                next + n
            }
        } else {
            splits[c + 1]
        };
        let chain: Vec<Point> = (start..=end).map(|i| smoothed[i % n]).collect();

        let (t0, t1) = if smooth_joins {
            let k = params.tangent_surround.min((n - 1) / 2).max(1);
            (
                ring_tangent(&smoothed, start, k),
                ring_tangent(&smoothed, end % n, k),
            )
        } else {
            end_tangents(&chain, params.tangent_surround)
        };
        let (t0, t1) = fallback_tangents(&chain, t0, t1);

        let fitted = fit_chain(&chain, t0, t1, params, diagnostics);
        corner_starts.push(!smooth_joins);
        corner_starts.extend(std::iter::repeat(false).take(fitted.len() - 1));
        segments.extend(fitted);
    }

    let points = knots(&segments, &corner_starts, closed);
    FittedPath { segments, points }
}

/// Knot at every segment start (plus the final end when open), with
/// tangents taken from the adjoining segments.
fn knots(segments: &[Segment], corner_starts: &[bool], closed: bool) -> Vec<CurvePoint> {
    let mut points: Vec<CurvePoint> = segments
        .iter()
        .enumerate()
        .map(|(i, seg)| {
            let before = if i > 0 {
                Some(&segments[i - 1])
            } else if closed {
                segments.last()
            } else {
                None
            };
            CurvePoint {
                position: seg.start(),
                tangent_in: before.and_then(Segment::end_tangent),
                tangent_out: seg.start_tangent(),
                is_corner: corner_starts[i],
            }
        })
        .collect();
    if !closed {
        if let Some(last) = segments.last() {
            points.push(CurvePoint {
                position: last.end(),
                tangent_in: last.end_tangent(),
                tangent_out: None,
                is_corner: true,
            });
        }
    }
    points
}

// ── Worklist fitting ─────────────────────────────────────

/// A pending piece of a chain: inclusive index range plus end tangents.
#[derive(Debug, Clone, Copy)]
struct Span {
    start: usize,
    end: usize,
    t0: Vec2,
    t1: Vec2,
    depth: u32,
}

/// Fit one corner-free chain. Segments come back in chain order.
fn fit_chain(
    chain: &[Point],
    t0: Vec2,
    t1: Vec2,
    params: &FitParams,
    diagnostics: &mut Diagnostics,
) -> Vec<Segment> {
    let mut out = Vec::new();
    let mut stack = vec![Span {
        start: 0,
        end: chain.len() - 1,
        t0,
        t1,
        depth: 0,
    }];

    while let Some(span) = stack.pop() {
        let pts = &chain[span.start..=span.end];
        let line = Segment::Line(Line::new(pts[0], pts[pts.len() - 1]));
        if pts.len() <= 2 || collinear_deviation(pts) <= params.line_threshold {
            out.push(line);
            continue;
        }

        let Some(fit) = fit_cubic(pts, span.t0, span.t1) else {
            diagnostics.push(Diagnostic::LinearFallback { points: pts.len() });
            out.push(line);
            continue;
        };

        if fit.max_error <= params.error_threshold {
            out.push(revert_to_line(fit.curve, params.line_reversion_threshold));
            continue;
        }
        if span.depth >= MAX_DEPTH || pts.len() < MIN_SPLIT_POINTS {
            diagnostics.push(Diagnostic::FittingNonConvergence {
                points: pts.len(),
                error: fit.max_error,
                depth: span.depth,
            });
            out.push(revert_to_line(fit.curve, params.line_reversion_threshold));
            continue;
        }

        let mid = span.start + fit.split;
        let tangent = split_tangent(chain, mid, span.start, span.end, params.tangent_surround)
            .unwrap_or_else(|| fallback_tangents(pts, None, None).0);
        // Right half first so the left half is popped next.
        stack.push(Span {
            start: mid,
            end: span.end,
            t0: tangent,
            t1: span.t1,
            depth: span.depth + 1,
        });
        stack.push(Span {
            start: span.start,
            end: mid,
            t0: span.t0,
            t1: tangent,
            depth: span.depth + 1,
        });
    }
    out
}

/// A cubic whose handles hug the chord is written as a Line.
fn revert_to_line(curve: CubicBez, threshold: f64) -> Segment {
    let chord = curve.p3 - curve.p0;
    let len = chord.hypot();
    if len > EPSILON {
        let d1 = (curve.p1 - curve.p0).cross(chord).abs() / len;
        let d2 = (curve.p2 - curve.p0).cross(chord).abs() / len;
        if d1 <= threshold * len && d2 <= threshold * len {
            return Segment::Line(Line::new(curve.p0, curve.p3));
        }
    }
    Segment::Cubic(curve)
}

// ── Least-squares cubic ──────────────────────────────────

struct CubicFit {
    curve: CubicBez,
    max_error: f64,
    /// Index (within the span) of the worst interior point.
    split: usize,
}

/// Fit a cubic through `pts` with unit end tangents `t0` (leaving the
/// start) and `t1` (arriving at the end). `None` if the handle-length
/// system is singular.
fn fit_cubic(pts: &[Point], t0: Vec2, t1: Vec2) -> Option<CubicFit> {
    let mut params = chord_length_params(pts);
    let mut curve = solve_handles(pts, &params, t0, t1)?;
    let (mut max_error, mut split) = fit_error(pts, &params, &curve);
    let mut best = CubicFit {
        curve,
        max_error,
        split,
    };

    for _ in 0..REPARAM_PASSES {
        reparametrize(pts, &mut params, &curve);
        let Some(next) = solve_handles(pts, &params, t0, t1) else {
            break;
        };
        curve = next;
        (max_error, split) = fit_error(pts, &params, &curve);
        if max_error < best.max_error {
            best = CubicFit {
                curve,
                max_error,
                split,
            };
        }
    }
    Some(best)
}

fn chord_length_params(pts: &[Point]) -> Vec<f64> {
    let mut acc = vec![0.0; pts.len()];
    for i in 1..pts.len() {
        acc[i] = acc[i - 1] + pts[i].distance(pts[i - 1]);
    }
    let total = acc[pts.len() - 1];
    if total <= EPSILON {
        let last = (pts.len() - 1) as f64;
        return (0..pts.len()).map(|i| i as f64 / last).collect();
    }
    acc.iter().map(|d| d / total).collect()
}

/// Solve the 2x2 normal equations for handle lengths `a` and `b` with
/// `P1 = P0 + a·t0`, `P2 = P3 - b·t1`.
fn solve_handles(pts: &[Point], params: &[f64], t0: Vec2, t1: Vec2) -> Option<CubicBez> {
    let p0 = pts[0];
    let p3 = pts[pts.len() - 1];
    let (mut c11, mut c12, mut c22, mut x1, mut x2) = (0.0, 0.0, 0.0, 0.0, 0.0);

    for (d, &t) in pts.iter().zip(params) {
        let mt = 1.0 - t;
        let b0 = mt * mt * mt;
        let b1 = 3.0 * mt * mt * t;
        let b2 = 3.0 * mt * t * t;
        let b3 = t * t * t;
        let a1 = t0 * b1;
        let a2 = t1 * -b2;
        let r = d.to_vec2() - p0.to_vec2() * (b0 + b1) - p3.to_vec2() * (b2 + b3);
        c11 += a1.dot(a1);
        c12 += a1.dot(a2);
        c22 += a2.dot(a2);
        x1 += r.dot(a1);
        x2 += r.dot(a2);
    }

    let det = c11 * c22 - c12 * c12;
    if !(det.abs() > EPSILON * c11 * c22) || c11 * c22 <= EPSILON {
        return None;
    }
    let mut a = (x1 * c22 - x2 * c12) / det;
    let mut b = (c11 * x2 - c12 * x1) / det;

    let chord = p0.distance(p3);
    if a <= 1e-6 * chord || b <= 1e-6 * chord {
        a = chord / 3.0;
        b = chord / 3.0;
    }
    Some(CubicBez::new(p0, p0 + t0 * a, p3 - t1 * b, p3))
}

/// Max distance from each point to the curve at its parameter, and the
/// interior index where it occurs.
fn fit_error(pts: &[Point], params: &[f64], curve: &CubicBez) -> (f64, usize) {
    let mut worst = (0.0, pts.len() / 2);
    for i in 1..pts.len() - 1 {
        let d = curve.eval(params[i]).distance(pts[i]);
        if d > worst.0 {
            worst = (d, i);
        }
    }
    worst
}

/// One Newton step per point towards its closest curve parameter.
fn reparametrize(pts: &[Point], params: &mut [f64], curve: &CubicBez) {
    let d1 = curve.deriv();
    let d2 = d1.deriv();
    for (p, t) in pts.iter().zip(params.iter_mut()) {
        let diff = curve.eval(*t) - *p;
        let q1 = d1.eval(*t).to_vec2();
        let q2 = d2.eval(*t).to_vec2();
        let denom = q1.dot(q1) + diff.dot(q2);
        if denom.abs() > EPSILON {
            *t = (*t - diff.dot(q1) / denom).clamp(0.0, 1.0);
        }
    }
}

// ── Tangents ─────────────────────────────────────────────

fn unit(v: Vec2) -> Option<Vec2> {
    let len = v.hypot();
    (len > EPSILON).then(|| v / len)
}

/// Central tangent at index `j` of a closed ring.
fn ring_tangent(ring: &[Point], j: usize, k: usize) -> Option<Vec2> {
    let n = ring.len();
    unit(ring[(j + k) % n] - ring[(j + n - k % n) % n])
}

/// One-sided tangents at both ends of a chain bounded by corners.
fn end_tangents(chain: &[Point], surround: usize) -> (Option<Vec2>, Option<Vec2>) {
    let last = chain.len() - 1;
    let k = surround.min(last).max(1);
    (
        unit(chain[k] - chain[0]),
        unit(chain[last] - chain[last - k]),
    )
}

/// Central tangent at a subdivision point, kept inside the span.
fn split_tangent(chain: &[Point], mid: usize, start: usize, end: usize, surround: usize) -> Option<Vec2> {
    let k = surround.min(mid - start).min(end - mid).max(1);
    unit(chain[mid + k] - chain[mid - k])
}

/// Replace missing tangents with the chord direction (or +x).
fn fallback_tangents(chain: &[Point], t0: Option<Vec2>, t1: Option<Vec2>) -> (Vec2, Vec2) {
    let chord = unit(chain[chain.len() - 1] - chain[0])
        .or_else(|| unit(chain[1] - chain[0]))
        .unwrap_or(Vec2::new(1.0, 0.0));
    (t0.unwrap_or(chord), t1.unwrap_or(chord))
}

// ── Splitting and smoothing ──────────────────────────────

/// Split points of a corner-free closed ring: the middle of the longest
/// run of points at each axis extreme (min/max x, min/y max y).
fn extremum_splits(points: &[Point]) -> Vec<usize> {
    let n = points.len();
    let keys: [fn(&Point) -> f64; 4] = [|p| -p.x, |p| p.x, |p| -p.y, |p| p.y];
    let mut splits = Vec::new();

    for key in keys {
        let best = points.iter().map(key).fold(f64::NEG_INFINITY, f64::max);
        let on_extreme: Vec<bool> = points.iter().map(|p| key(p) == best).collect();
        let Some(first_off) = on_extreme.iter().position(|&e| !e) else {
            continue;
        };
        // Walk once around the ring starting off-extreme so no run wraps.
        let mut longest = (0usize, 0usize);
        let mut i = 0;
        while i < n {
            let j = (first_off + i) % n;
            if on_extreme[j] {
                let run_start = j;
                let mut len = 0;
                while i < n && on_extreme[(first_off + i) % n] {
                    len += 1;
                    i += 1;
                }
                if len > longest.1 {
                    longest = (run_start, len);
                }
            } else {
                i += 1;
            }
        }
        splits.push((longest.0 + (longest.1 - 1) / 2) % n);
    }

    splits.sort_unstable();
    splits.dedup();
    if splits.len() < 2 {
        return vec![0, n / 2];
    }
    splits
}

/// Laplacian smoothing: each unpinned point becomes the mean of itself and
/// its two neighbours, `iterations` times. Open chains never move their
/// endpoints.
pub fn smooth_pinned(points: &[Point], pinned: &[bool], closed: bool, iterations: usize) -> Vec<Point> {
    let n = points.len();
    if iterations == 0 || n < 3 {
        return points.to_vec();
    }
    let mut pts = points.to_vec();
    for _ in 0..iterations {
        let prev = pts.clone();
        for i in 0..n {
            if pinned[i] || (!closed && (i == 0 || i == n - 1)) {
                continue;
            }
            let a = prev[(i + n - 1) % n];
            let b = prev[(i + 1) % n];
            pts[i] = Point::new(
                (a.x + prev[i].x + b.x) / 3.0,
                (a.y + prev[i].y + b.y) / 3.0,
            );
        }
    }
    pts
}

/// Maximum distance of interior points from the first-to-last chord.
/// Falls back to distance from the first point when the chord is empty.
pub fn collinear_deviation(points: &[Point]) -> f64 {
    let n = points.len();
    if n <= 2 {
        return 0.0;
    }
    let a = points[0];
    let chord = points[n - 1] - a;
    let len = chord.hypot();
    if len <= EPSILON {
        return points.iter().map(|p| p.distance(a)).fold(0.0, f64::max);
    }
    points[1..n - 1]
        .iter()
        .map(|&p| (p - a).cross(chord).abs() / len)
        .fold(0.0, f64::max)
}
