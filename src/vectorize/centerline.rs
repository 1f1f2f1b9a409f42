//! Skeleton pixels → centre-line chains.
//!
//! Skeleton pixels are linked with mixed adjacency: 4-neighbours always,
//! diagonal neighbours only when neither shared 4-neighbour is set. That
//! removes the short-cut triangles 8-adjacency would create at every
//! staircase step, so ordinary stroke pixels have exactly two neighbours.
//!
//! Pixels with any other neighbour count are nodes (endpoints and
//! junctions). Each run between nodes becomes an open chain; whatever is
//! left afterwards is a pure loop and becomes a closed chain.

use std::collections::HashSet;

use image::{GrayImage, Luma};
use imageproc::distance_transform::{distance_transform, Norm};
use kurbo::Point;

use crate::diagnostics::{Diagnostic, Diagnostics};

type Pixel = (i32, i32);

/// A run of skeleton pixels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chain {
    pub pixels: Vec<Pixel>,
    pub closed: bool,
}

impl Chain {
    /// Pixel centres.
    pub fn points(&self) -> Vec<Point> {
        self.pixels
            .iter()
            .map(|&(x, y)| Point::new(x as f64 + 0.5, y as f64 + 0.5))
            .collect()
    }
}

struct Skeleton<'a> {
    mask: &'a GrayImage,
    width: i32,
    height: i32,
}

impl Skeleton<'_> {
    fn get(&self, x: i32, y: i32) -> bool {
        x >= 0
            && y >= 0
            && x < self.width
            && y < self.height
            && self.mask.get_pixel(x as u32, y as u32).0[0] > 0
    }

    /// m-adjacent neighbours in a fixed clockwise order from north.
    fn neighbours(&self, (x, y): Pixel) -> Vec<Pixel> {
        const ORDER: [(i32, i32); 8] = [
            (0, -1),
            (1, -1),
            (1, 0),
            (1, 1),
            (0, 1),
            (-1, 1),
            (-1, 0),
            (-1, -1),
        ];
        ORDER
            .iter()
            .filter(|&&(dx, dy)| {
                self.get(x + dx, y + dy)
                    && (dx == 0 || dy == 0 || (!self.get(x + dx, y) && !self.get(x, y + dy)))
            })
            .map(|&(dx, dy)| (x + dx, y + dy))
            .collect()
    }
}

fn edge(a: Pixel, b: Pixel) -> (Pixel, Pixel) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

/// Link a one-pixel-wide skeleton into chains.
///
/// Isolated pixels carry no direction; each is reported as
/// `DegenerateGeometry` and skipped.
pub fn extract_chains(skeleton: &GrayImage, diagnostics: &mut Diagnostics) -> Vec<Chain> {
    let (w, h) = skeleton.dimensions();
    let sk = Skeleton {
        mask: skeleton,
        width: w as i32,
        height: h as i32,
    };
    let pixels: Vec<Pixel> = (0..sk.height)
        .flat_map(|y| (0..sk.width).map(move |x| (x, y)))
        .filter(|&(x, y)| sk.get(x, y))
        .collect();

    let mut visited: HashSet<(Pixel, Pixel)> = HashSet::new();
    let mut chains = Vec::new();

    for &p in &pixels {
        let nbrs = sk.neighbours(p);
        if nbrs.is_empty() {
            diagnostics.push(Diagnostic::DegenerateGeometry {
                detail: format!("isolated skeleton pixel at ({}, {})", p.0, p.1),
            });
            continue;
        }
        if nbrs.len() == 2 {
            continue;
        }
        for next in nbrs {
            if visited.contains(&edge(p, next)) {
                continue;
            }
            chains.push(walk(&sk, &mut visited, p, next, false));
        }
    }

    // Anything left unvisited is a loop of degree-2 pixels.
    for &p in &pixels {
        let nbrs = sk.neighbours(p);
        if nbrs.len() != 2 || nbrs.iter().all(|&q| visited.contains(&edge(p, q))) {
            continue;
        }
        chains.push(walk(&sk, &mut visited, p, nbrs[0], true));
    }

    log::debug!(
        "linked {} skeleton pixels into {} chains",
        pixels.len(),
        chains.len()
    );
    chains
}

/// Follow degree-2 pixels from `start` through `first` until a node, a
/// dead end, or (for loops) the start pixel again.
fn walk(
    sk: &Skeleton<'_>,
    visited: &mut HashSet<(Pixel, Pixel)>,
    start: Pixel,
    first: Pixel,
    closed: bool,
) -> Chain {
    visited.insert(edge(start, first));
    let mut pixels = vec![start, first];
    let mut current = first;
    loop {
        let nbrs = sk.neighbours(current);
        if !closed && nbrs.len() != 2 {
            break;
        }
        let Some(next) = nbrs
            .into_iter()
            .find(|&q| !visited.contains(&edge(current, q)))
        else {
            break;
        };
        visited.insert(edge(current, next));
        if closed && next == start {
            break;
        }
        pixels.push(next);
        current = next;
    }
    Chain { pixels, closed }
}

/// Chessboard distance from every pixel to the nearest background pixel,
/// treating everything outside the image as background.
pub fn depth_map(mask: &GrayImage) -> GrayImage {
    let (w, h) = mask.dimensions();
    let inverted = GrayImage::from_fn(w + 2, h + 2, |x, y| {
        let inside = x >= 1 && y >= 1 && x <= w && y <= h;
        if inside && mask.get_pixel(x - 1, y - 1).0[0] > 0 {
            Luma([0])
        } else {
            Luma([255])
        }
    });
    distance_transform(&inverted, Norm::LInf)
}

/// Stroke width along a chain: `2·mean(depth) − 1`, at least one pixel.
pub fn chain_width(depth: &GrayImage, chain: &Chain) -> f64 {
    if chain.pixels.is_empty() {
        return 1.0;
    }
    let total: f64 = chain
        .pixels
        .iter()
        .map(|&(x, y)| depth.get_pixel(x as u32 + 1, y as u32 + 1).0[0] as f64)
        .sum();
    let mean = total / chain.pixels.len() as f64;
    (2.0 * mean - 1.0).max(1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cleanup::mask_from_bits;

    fn mask(rows: &[&str]) -> GrayImage {
        let w = rows[0].len() as u32;
        let bits: Vec<bool> = rows.iter().flat_map(|r| r.chars().map(|c| c == '#')).collect();
        mask_from_bits(w, rows.len() as u32, &bits)
    }

    #[test]
    fn straight_stroke_is_one_open_chain() {
        let mut diag = Diagnostics::new();
        let chains = extract_chains(&mask(&[".....", ".###.", "....."]), &mut diag);
        assert_eq!(chains.len(), 1);
        assert!(!chains[0].closed);
        assert_eq!(chains[0].pixels, vec![(1, 1), (2, 1), (3, 1)]);
        assert!(diag.is_empty());
    }

    #[test]
    fn staircase_uses_mixed_adjacency() {
        let mut diag = Diagnostics::new();
        let chains = extract_chains(&mask(&["##..", ".##.", "..##"]), &mut diag);
        assert_eq!(chains.len(), 1);
        assert_eq!(chains[0].pixels.len(), 6);
    }

    #[test]
    fn junction_splits_into_three_chains() {
        let mut diag = Diagnostics::new();
        let chains = extract_chains(
            &mask(&["..#..", "..#..", "#####", ".....", "....."]),
            &mut diag,
        );
        assert_eq!(chains.len(), 3);
        assert!(chains.iter().all(|c| !c.closed && c.pixels.contains(&(2, 2))));
    }

    #[test]
    fn ring_is_one_closed_chain() {
        let mut diag = Diagnostics::new();
        let chains = extract_chains(&mask(&[".###.", "#...#", "#...#", ".###."]), &mut diag);
        assert_eq!(chains.len(), 1);
        assert!(chains[0].closed);
        assert_eq!(chains[0].pixels.len(), 10);
    }

    #[test]
    fn isolated_pixel_is_reported_and_skipped() {
        let mut diag = Diagnostics::new();
        let chains = extract_chains(&mask(&["...", ".#.", "..."]), &mut diag);
        assert!(chains.is_empty());
        assert!(matches!(diag.events()[0], Diagnostic::DegenerateGeometry { .. }));
    }

    #[test]
    fn width_of_three_pixel_bar() {
        let bar = mask(&[
            "............",
            "............",
            "############",
            "############",
            "############",
            "............",
            "............",
        ]);
        let chain = Chain {
            pixels: (2..10).map(|x| (x, 3)).collect(),
            closed: false,
        };
        assert_eq!(chain_width(&depth_map(&bar), &chain), 3.0);
    }
}
