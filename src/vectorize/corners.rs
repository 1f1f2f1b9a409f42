//! Polygon simplification and corner detection on dense outline points.
//!
//! The dense outline (one point per pixel edge, or per skeleton pixel) is
//! first reduced to a polygon with Ramer-Douglas-Peucker. Each polygon
//! vertex is then measured on the dense points around it: the turn between
//! the incoming and outgoing directions, each taken over up to
//! `corner_surround` points but never past the neighbouring vertex. Sharp
//! enough turns are corners, and the fitter never smooths across them.

use geo::{LineString, SimplifyIdx};
use kurbo::Point;

use crate::config::FittingOptions;

/// RDP tolerance in pixels. One pixel removes the staircase of a
/// rasterized edge but keeps every real direction change.
pub const POLYGON_TOLERANCE: f64 = 1.0;

/// Corner detection settings, angles in radians.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CornerParams {
    pub threshold: f64,
    pub always_threshold: f64,
    pub surround: usize,
    pub remove_adjacent: bool,
}

impl From<&FittingOptions> for CornerParams {
    fn from(options: &FittingOptions) -> Self {
        Self {
            threshold: options.corner_threshold.to_radians(),
            always_threshold: options.corner_always_threshold.to_radians(),
            surround: options.corner_surround.max(1),
            remove_adjacent: options.remove_adjacent_corners,
        }
    }
}

/// Indices of the simplified polygon's vertices, ascending.
///
/// Closed rings are split at the point farthest from the start so both
/// halves have a well-defined chord; open chains keep both endpoints.
pub fn simplify_polygon(points: &[Point], closed: bool) -> Vec<usize> {
    let n = points.len();
    if n < 3 {
        return (0..n).collect();
    }
    if !closed {
        return rdp(points, 0);
    }

    let start = points[0];
    let mut far = 0;
    let mut far_dist = 0.0;
    for (i, p) in points.iter().enumerate() {
        let d = p.distance(start);
        if d > far_dist {
            far = i;
            far_dist = d;
        }
    }
    if far == 0 {
        return vec![0];
    }

    let mut indices = rdp(&points[..=far], 0);
    let mut tail: Vec<Point> = points[far..].to_vec();
    tail.push(start);
    indices.extend(rdp(&tail, far).into_iter().filter(|&i| i < n));
    indices.sort_unstable();
    indices.dedup();
    indices
}

fn rdp(points: &[Point], offset: usize) -> Vec<usize> {
    let line: LineString<f64> = points.iter().map(|p| (p.x, p.y)).collect();
    line.simplify_idx(&POLYGON_TOLERANCE)
        .into_iter()
        .map(|i| i + offset)
        .collect()
}

/// Absolute turn (radians, 0..=π) at dense index `j`, measured between
/// `points[j - k_in] → points[j]` and `points[j] → points[j + k_out]`.
pub fn turn_angle(points: &[Point], j: usize, k_in: usize, k_out: usize, closed: bool) -> f64 {
    let n = points.len();
    let (prev, next) = if closed {
        (points[(j + n - k_in % n) % n], points[(j + k_out) % n])
    } else {
        (points[j.saturating_sub(k_in)], points[(j + k_out).min(n - 1)])
    };
    let incoming = points[j] - prev;
    let outgoing = next - points[j];
    incoming.cross(outgoing).atan2(incoming.dot(outgoing)).abs()
}

/// Dense indices of corners among the polygon `vertices`, ascending.
///
/// For open chains both endpoints are always included.
pub fn find_corners(
    points: &[Point],
    vertices: &[usize],
    closed: bool,
    params: &CornerParams,
) -> Vec<usize> {
    let n = points.len();
    let m = vertices.len();
    if n < 2 || m == 0 {
        return Vec::new();
    }

    // (dense index, turn angle) for every candidate.
    let mut candidates: Vec<(usize, f64)> = Vec::new();
    for (vi, &j) in vertices.iter().enumerate() {
        let interior = closed || (j != 0 && j != n - 1);
        if !interior {
            continue;
        }
        let (gap_in, gap_out) = if closed {
            let prev = vertices[(vi + m - 1) % m];
            let next = vertices[(vi + 1) % m];
            let gap_in = match (j + n - prev) % n {
                0 => n,
                g => g,
            };
            let gap_out = match (next + n - j) % n {
                0 => n,
                g => g,
            };
            (gap_in, gap_out)
        } else {
            (j - vertices[vi - 1], vertices[vi + 1] - j)
        };
        let k_in = params.surround.min(gap_in).max(1);
        let k_out = params.surround.min(gap_out).max(1);
        let angle = turn_angle(points, j, k_in, k_out, closed);
        if angle >= params.threshold {
            candidates.push((j, angle));
        }
    }

    if params.remove_adjacent {
        candidates = suppress_adjacent(&candidates, n, closed, params);
    }

    let mut corners: Vec<usize> = candidates.into_iter().map(|(j, _)| j).collect();
    if !closed {
        corners.push(0);
        corners.push(n - 1);
        corners.sort_unstable();
        corners.dedup();
    }
    corners
}

/// Drop candidates with a sharper candidate within `surround` points,
/// unless they reach `always_threshold`.
fn suppress_adjacent(
    candidates: &[(usize, f64)],
    n: usize,
    closed: bool,
    params: &CornerParams,
) -> Vec<(usize, f64)> {
    candidates
        .iter()
        .filter(|&&(j, angle)| {
            angle >= params.always_threshold
                || !candidates.iter().any(|&(other, other_angle)| {
                    let d = j.abs_diff(other);
                    let d = if closed { d.min(n - d) } else { d };
                    other != j && d <= params.surround && other_angle > angle
                })
        })
        .copied()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Dense pixel-edge ring of an axis-aligned square.
    fn square(side: i32) -> Vec<Point> {
        let mut pts = Vec::new();
        for x in 0..side {
            pts.push(Point::new(x as f64, 0.0));
        }
        for y in 0..side {
            pts.push(Point::new(side as f64, y as f64));
        }
        for x in (1..=side).rev() {
            pts.push(Point::new(x as f64, side as f64));
        }
        for y in (1..=side).rev() {
            pts.push(Point::new(0.0, y as f64));
        }
        pts
    }

    fn params(threshold_deg: f64) -> CornerParams {
        CornerParams {
            threshold: threshold_deg.to_radians(),
            ..CornerParams::from(&FittingOptions::default())
        }
    }

    #[test]
    fn square_simplifies_to_four_vertices() {
        assert_eq!(simplify_polygon(&square(4), true), vec![0, 4, 8, 12]);
    }

    #[test]
    fn square_has_four_right_angle_corners() {
        let pts = square(4);
        let vertices = simplify_polygon(&pts, true);
        assert_eq!(find_corners(&pts, &vertices, true, &params(80.0)), vec![0, 4, 8, 12]);
        for &j in &vertices {
            let angle = turn_angle(&pts, j, 4, 4, true);
            assert!((angle - std::f64::consts::FRAC_PI_2).abs() < 1e-9);
        }
    }

    #[test]
    fn threshold_extremes() {
        let pts = square(6);
        let vertices = simplify_polygon(&pts, true);
        assert!(find_corners(&pts, &vertices, true, &params(f64::INFINITY)).is_empty());
        assert_eq!(find_corners(&pts, &vertices, true, &params(0.0)), vertices);
    }

    #[test]
    fn single_pixel_ring_is_two_vertices() {
        let pts = square(1);
        let vertices = simplify_polygon(&pts, true);
        assert_eq!(vertices, vec![0, 2]);
        assert_eq!(find_corners(&pts, &vertices, true, &params(80.0)), vec![0, 2]);
    }

    #[test]
    fn open_chain_keeps_endpoints() {
        let pts: Vec<Point> = (0..10).map(|i| Point::new(i as f64, 0.0)).collect();
        let vertices = simplify_polygon(&pts, false);
        assert_eq!(vertices, vec![0, 9]);
        assert_eq!(find_corners(&pts, &vertices, false, &params(80.0)), vec![0, 9]);
    }

    #[test]
    fn open_chain_finds_elbow() {
        let mut pts: Vec<Point> = (0..6).map(|i| Point::new(i as f64, 0.0)).collect();
        pts.extend((1..6).map(|i| Point::new(5.0, i as f64)));
        let vertices = simplify_polygon(&pts, false);
        assert_eq!(vertices, vec![0, 5, 10]);
        assert_eq!(find_corners(&pts, &vertices, false, &params(80.0)), vec![0, 5, 10]);
    }

    #[test]
    fn adjacent_suppression_keeps_the_sharpest() {
        let candidates = [(10, 1.6), (12, 2.0), (30, 1.5)];
        let p = CornerParams {
            remove_adjacent: true,
            always_threshold: 2.5,
            ..params(80.0)
        };
        let kept = suppress_adjacent(&candidates, 40, true, &p);
        assert_eq!(kept, vec![(12, 2.0), (30, 1.5)]);

        let always = CornerParams {
            always_threshold: 1.55,
            ..p
        };
        assert_eq!(suppress_adjacent(&candidates, 40, true, &always).len(), 3);
    }
}
