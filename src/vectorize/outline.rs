//! Pixel-edge outline extraction on the pixel-corner grid.
//!
//! Outlines run along pixel edges rather than through pixel centres, with
//! the origin at the top-left image corner and y pointing down. Each walk
//! keeps foreground on its right, so outer boundaries come out clockwise
//! (positive shoelace area) and holes counter-clockwise.
//!
//! Every boundary contains at least one "top edge" (a foreground pixel
//! whose upper neighbour is background). Walks start from the first
//! unvisited top edge in raster order and mark the top edges they cross,
//! so each boundary is traced exactly once.
//!
//! Every boundary separates one foreground component from one background
//! component. Nesting follows from that pairing: a hole belongs to the
//! outer boundary of its foreground component, and an outer boundary
//! belongs to the hole that encloses its background component.

use image::{GrayImage, Luma};
use imageproc::region_labelling::{connected_components, Connectivity};

use crate::spline::Turn;

/// Handle to an outline in an [`OutlineArena`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OutlineId(pub usize);

/// One closed boundary on the pixel-corner grid.
#[derive(Debug, Clone, PartialEq)]
pub struct PixelOutline {
    /// Corner coordinates, one per unit edge. The closing edge back to
    /// `points[0]` is implicit.
    pub points: Vec<(i32, i32)>,
    pub turn: Turn,
    /// Innermost outline enclosing this one.
    pub parent: Option<OutlineId>,
}

impl PixelOutline {
    /// Twice the signed area (positive = clockwise in image coordinates).
    pub fn area2(&self) -> i64 {
        let n = self.points.len();
        (0..n)
            .map(|i| {
                let (x0, y0) = self.points[i];
                let (x1, y1) = self.points[(i + 1) % n];
                x0 as i64 * y1 as i64 - x1 as i64 * y0 as i64
            })
            .sum()
    }

    pub fn is_hole(&self) -> bool {
        self.turn == Turn::CounterClockwise
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Pixel whose top edge starts the walk.
    fn start_pixel(&self) -> (i32, i32) {
        self.points[0]
    }
}

/// Outlines of one binary mask, addressed by [`OutlineId`].
///
/// Nesting is stored as parent indices, so holes and islands never own
/// each other.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OutlineArena {
    outlines: Vec<PixelOutline>,
}

impl OutlineArena {
    pub fn get(&self, id: OutlineId) -> Option<&PixelOutline> {
        self.outlines.get(id.0)
    }

    pub fn len(&self) -> usize {
        self.outlines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outlines.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (OutlineId, &PixelOutline)> {
        self.outlines.iter().enumerate().map(|(i, o)| (OutlineId(i), o))
    }

    /// Outlines whose parent is `id`.
    pub fn children(&self, id: OutlineId) -> impl Iterator<Item = OutlineId> + '_ {
        self.iter()
            .filter(move |(_, o)| o.parent == Some(id))
            .map(|(i, _)| i)
    }

    pub fn hole_count(&self) -> usize {
        self.outlines.iter().filter(|o| o.is_hole()).count()
    }
}

/// Foreground lookup with out-of-bounds = background.
struct Grid<'a> {
    mask: &'a GrayImage,
    width: i32,
    height: i32,
}

impl Grid<'_> {
    fn get(&self, x: i32, y: i32) -> bool {
        x >= 0
            && y >= 0
            && x < self.width
            && y < self.height
            && self.mask.get_pixel(x as u32, y as u32).0[0] > 0
    }
}

/// Trace every boundary of a binary mask (foreground = non-zero).
///
/// Foreground is 4-connected and background 8-connected: pixels that
/// touch only diagonally belong to separate outlines.
pub fn extract_outlines(mask: &GrayImage) -> OutlineArena {
    let (w, h) = mask.dimensions();
    let grid = Grid {
        mask,
        width: w as i32,
        height: h as i32,
    };
    let mut visited = vec![false; w as usize * h as usize];
    let mut outlines = Vec::new();

    for y in 0..grid.height {
        for x in 0..grid.width {
            if grid.get(x, y) && !grid.get(x, y - 1) && !visited[(y * grid.width + x) as usize] {
                outlines.push(walk(&grid, &mut visited, x, y));
            }
        }
    }

    let mut arena = OutlineArena { outlines };
    link_parents(&mut arena, mask);
    log::debug!(
        "extracted {} outlines ({} holes)",
        arena.len(),
        arena.hole_count()
    );
    arena
}

/// Follow one boundary from the top edge of pixel (x0, y0).
fn walk(grid: &Grid<'_>, visited: &mut [bool], x0: i32, y0: i32) -> PixelOutline {
    let mut points = Vec::new();
    let (mut x, mut y) = (x0, y0);
    let (mut dx, mut dy) = (1i32, 0i32);

    loop {
        points.push((x, y));
        if dx == 1 {
            visited[(y * grid.width + x) as usize] = true;
        }
        x += dx;
        y += dy;

        // The two pixels ahead of corner (x, y), left and right of the
        // current heading:
        //
        //   heading  │ left        right
        //   ─────────┼──────────────────────────
        //   right    │ (x,   y-1)  (x,   y)
        //   down     │ (x,   y)    (x-1, y)
        //   left     │ (x-1, y)    (x-1, y-1)
        //   up       │ (x-1, y-1)  (x,   y-1)
        let (left, right) = match (dx, dy) {
            (1, 0) => (grid.get(x, y - 1), grid.get(x, y)),
            (0, 1) => (grid.get(x, y), grid.get(x - 1, y)),
            (-1, 0) => (grid.get(x - 1, y), grid.get(x - 1, y - 1)),
            _ => (grid.get(x - 1, y - 1), grid.get(x, y - 1)),
        };

        //   left right │ action
        //   ───────────┼──────────────────────────────────────
        //    0    1    │ straight (foreground stays on the right)
        //    1    1    │ turn left
        //    0    0    │ turn right
        //    1    0    │ diagonal contact: turn right, so the
        //              │ two pixels stay separate
        if right && left {
            (dx, dy) = (dy, -dx);
        } else if !right || left {
            (dx, dy) = (-dy, dx);
        }

        if x == x0 && y == y0 && dx == 1 && dy == 0 {
            break;
        }
    }

    let mut outline = PixelOutline {
        points,
        turn: Turn::Clockwise,
        parent: None,
    };
    if outline.area2() < 0 {
        outline.turn = Turn::CounterClockwise;
    }
    outline
}

/// Link holes to their outer boundary and outer boundaries to the hole
/// around them, in time linear in the mask size.
///
/// The mask is padded by one background pixel so the outside of the image
/// is a single background component. Pixel (x, y) of the mask is (x+1, y+1)
/// in the padded labels.
fn link_parents(arena: &mut OutlineArena, mask: &GrayImage) {
    if arena.is_empty() {
        return;
    }
    let (w, h) = mask.dimensions();
    let foreground = GrayImage::from_fn(w + 2, h + 2, |x, y| {
        let inside = x > 0 && y > 0 && x <= w && y <= h;
        Luma([if inside && mask.get_pixel(x - 1, y - 1).0[0] > 0 { 255 } else { 0 }])
    });
    let background = GrayImage::from_fn(w + 2, h + 2, |x, y| {
        Luma([255 - foreground.get_pixel(x, y).0[0]])
    });
    let fg_labels = connected_components(&foreground, Connectivity::Four, Luma([0u8]));
    let bg_labels = connected_components(&background, Connectivity::Eight, Luma([0u8]));

    let fg_at = |(x, y): (i32, i32)| fg_labels.get_pixel(x as u32 + 1, y as u32 + 1).0[0] as usize;
    let bg_above = |(x, y): (i32, i32)| bg_labels.get_pixel(x as u32 + 1, y as u32).0[0] as usize;

    let fg_count = fg_labels.pixels().map(|p| p.0[0] as usize).max().unwrap_or(0) + 1;
    let bg_count = bg_labels.pixels().map(|p| p.0[0] as usize).max().unwrap_or(0) + 1;
    let mut outer_of: Vec<Option<OutlineId>> = vec![None; fg_count];
    let mut hole_of: Vec<Option<OutlineId>> = vec![None; bg_count];

    for (id, outline) in arena.iter() {
        let start = outline.start_pixel();
        match outline.turn {
            Turn::Clockwise => outer_of[fg_at(start)] = Some(id),
            Turn::CounterClockwise => hole_of[bg_above(start)] = Some(id),
        }
    }

    for outline in arena.outlines.iter_mut() {
        let start = outline.start_pixel();
        outline.parent = match outline.turn {
            Turn::Clockwise => hole_of[bg_above(start)],
            Turn::CounterClockwise => outer_of[fg_at(start)],
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cleanup::mask_from_bits;
    use geo::{Contains, Coord, LineString, Point as GeoPoint, Polygon};
    use proptest::prelude::*;

    fn polygon(outline: &PixelOutline) -> Polygon<f64> {
        let ring: Vec<Coord<f64>> = outline
            .points
            .iter()
            .map(|&(x, y)| Coord { x: x as f64, y: y as f64 })
            .collect();
        Polygon::new(LineString::new(ring), vec![])
    }

    /// Smallest other outline containing the pixel centre just inside the
    /// first edge (in the fill for outers, in the enclosed background for
    /// holes).
    fn containing_parents(arena: &OutlineArena) -> Vec<Option<OutlineId>> {
        let polygons: Vec<Polygon<f64>> = arena.iter().map(|(_, o)| polygon(o)).collect();
        arena
            .iter()
            .map(|(OutlineId(i), outline)| {
                let (x, y) = outline.points[0];
                let sample = match outline.turn {
                    Turn::Clockwise => GeoPoint::new(x as f64 + 0.5, y as f64 + 0.5),
                    Turn::CounterClockwise => GeoPoint::new(x as f64 + 0.5, y as f64 - 0.5),
                };
                let area = outline.area2().abs();
                arena
                    .iter()
                    .filter(|&(OutlineId(j), o)| j != i && o.area2().abs() > area)
                    .filter(|&(OutlineId(j), _)| polygons[j].contains(&sample))
                    .min_by_key(|(_, o)| o.area2().abs())
                    .map(|(id, _)| id)
            })
            .collect()
    }

    fn mask(rows: &[&str]) -> GrayImage {
        let w = rows[0].len() as u32;
        let bits: Vec<bool> = rows.iter().flat_map(|r| r.chars().map(|c| c == '#')).collect();
        mask_from_bits(w, rows.len() as u32, &bits)
    }

    #[test]
    fn single_pixel_is_one_clockwise_square() {
        let arena = extract_outlines(&mask(&["...", ".#.", "..."]));
        assert_eq!(arena.len(), 1);
        let outline = arena.get(OutlineId(0)).unwrap();
        assert_eq!(outline.points, vec![(1, 1), (2, 1), (2, 2), (1, 2)]);
        assert_eq!(outline.turn, Turn::Clockwise);
        assert_eq!(outline.area2(), 2);
    }

    #[test]
    fn square_outline_has_sixteen_edges() {
        let arena = extract_outlines(&mask(&["......", ".####.", ".####.", ".####.", ".####.", "......"]));
        assert_eq!(arena.len(), 1);
        assert_eq!(arena.get(OutlineId(0)).unwrap().len(), 16);
    }

    #[test]
    fn ring_has_hole_linked_to_outer() {
        let arena = extract_outlines(&mask(&["#####", "#...#", "#...#", "#####"]));
        assert_eq!(arena.len(), 2);
        let outer = arena.get(OutlineId(0)).unwrap();
        let hole = arena.get(OutlineId(1)).unwrap();
        assert_eq!(outer.turn, Turn::Clockwise);
        assert_eq!(hole.turn, Turn::CounterClockwise);
        assert_eq!(outer.parent, None);
        assert_eq!(hole.parent, Some(OutlineId(0)));
        assert_eq!(arena.children(OutlineId(0)).collect::<Vec<_>>(), vec![OutlineId(1)]);
    }

    #[test]
    fn island_inside_hole_nests_under_the_hole() {
        let arena = extract_outlines(&mask(&[
            "#######",
            "#.....#",
            "#..#..#",
            "#.....#",
            "#######",
        ]));
        assert_eq!(arena.len(), 3);
        let (island, _) = arena
            .iter()
            .find(|(_, o)| o.len() == 4)
            .unwrap();
        let (hole, _) = arena.iter().find(|(_, o)| o.is_hole()).unwrap();
        assert_eq!(arena.get(island).unwrap().parent, Some(hole));
        assert_eq!(arena.get(hole).unwrap().parent, Some(OutlineId(0)));
    }

    #[test]
    fn diagonal_pixels_are_separate_outlines() {
        let arena = extract_outlines(&mask(&["#.", ".#"]));
        assert_eq!(arena.len(), 2);
        assert_eq!(arena.hole_count(), 0);
    }

    #[test]
    fn diagonal_gap_does_not_close_a_hole() {
        // Background leaks through the corner contact at the bottom right.
        let arena = extract_outlines(&mask(&["###.", "#.#.", "##.#"]));
        assert_eq!(arena.hole_count(), 0);
    }

    #[test]
    fn empty_mask_has_no_outlines() {
        assert!(extract_outlines(&GrayImage::new(4, 4)).is_empty());
    }

    #[test]
    fn nested_rings_alternate_outer_and_hole() {
        let arena = extract_outlines(&mask(&[
            "###########",
            "#.........#",
            "#.#######.#",
            "#.#.....#.#",
            "#.#.###.#.#",
            "#.#.#.#.#.#",
            "#.#.###.#.#",
            "#.#.....#.#",
            "#.#######.#",
            "#.........#",
            "###########",
        ]));
        assert_eq!(arena.len(), 6);
        let depth = |mut id: OutlineId| {
            let mut d = 0;
            while let Some(p) = arena.get(id).unwrap().parent {
                id = p;
                d += 1;
            }
            d
        };
        let mut depths: Vec<usize> = arena.iter().map(|(id, _)| depth(id)).collect();
        depths.sort();
        assert_eq!(depths, vec![0, 1, 2, 3, 4, 5]);
        assert_eq!(arena.iter().map(|(_, o)| o.parent).collect::<Vec<_>>(), containing_parents(&arena));
    }

    #[test]
    fn side_by_side_holes_share_one_parent() {
        let arena = extract_outlines(&mask(&["#######", "#.#.#.#", "#######"]));
        assert_eq!(arena.hole_count(), 3);
        assert_eq!(arena.children(OutlineId(0)).count(), 3);
    }

    proptest! {
        #[test]
        fn parents_match_smallest_containing_outline(
            w in 1u32..10,
            h in 1u32..10,
            bits in proptest::collection::vec(any::<bool>(), 100),
        ) {
            let m = mask_from_bits(w, h, &bits[..(w * h) as usize]);
            let arena = extract_outlines(&m);
            let linked: Vec<Option<OutlineId>> = arena.iter().map(|(_, o)| o.parent).collect();
            prop_assert_eq!(linked, containing_parents(&arena));
        }
    }
}
