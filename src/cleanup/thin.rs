//! Zhang-Suen thinning to one-pixel skeletons.
//!
//! Neighbours are numbered clockwise from north:
//!
//! ```text
//!   P9 P2 P3
//!   P8 P1 P4
//!   P7 P6 P5
//! ```
//!
//! Each sub-iteration marks candidates against a snapshot, then deletes
//! them one at a time in raster order, re-checking the simple-point test
//! on the live image. The re-check keeps two-pixel-thick strokes from
//! vanishing and preserves the 8-connected component count.

use image::{GrayImage, Luma};

/// Thin a binary mask (foreground = non-zero) in place. Returns the number
/// of deleted pixels.
pub fn thin(mask: &mut GrayImage) -> usize {
    let (w, h) = mask.dimensions();
    let mut removed = 0usize;
    let mut iterations = 0usize;
    loop {
        let mut changed = false;
        for pass in 0..2 {
            let candidates: Vec<(u32, u32)> = (0..h)
                .flat_map(|y| (0..w).map(move |x| (x, y)))
                .filter(|&(x, y)| is_fg(mask, x as i64, y as i64) && deletable(mask, x, y, pass))
                .collect();
            for (x, y) in candidates {
                let n = neighbours(mask, x, y);
                let b = n.iter().filter(|&&v| v).count();
                if b >= 2 && transitions(&n) == 1 {
                    mask.put_pixel(x, y, Luma([0]));
                    removed += 1;
                    changed = true;
                }
            }
        }
        iterations += 1;
        if !changed {
            break;
        }
    }
    log::debug!("thinning: {} pixels removed in {} iterations", removed, iterations);
    removed
}

fn is_fg(mask: &GrayImage, x: i64, y: i64) -> bool {
    let (w, h) = mask.dimensions();
    x >= 0 && y >= 0 && x < w as i64 && y < h as i64 && mask.get_pixel(x as u32, y as u32).0[0] > 0
}

/// P2..P9 in clockwise order. Outside the image counts as background.
fn neighbours(mask: &GrayImage, x: u32, y: u32) -> [bool; 8] {
    let (x, y) = (x as i64, y as i64);
    [
        is_fg(mask, x, y - 1),
        is_fg(mask, x + 1, y - 1),
        is_fg(mask, x + 1, y),
        is_fg(mask, x + 1, y + 1),
        is_fg(mask, x, y + 1),
        is_fg(mask, x - 1, y + 1),
        is_fg(mask, x - 1, y),
        is_fg(mask, x - 1, y - 1),
    ]
}

/// Number of background→foreground transitions around P2..P9..P2.
fn transitions(n: &[bool; 8]) -> usize {
    (0..8).filter(|&i| !n[i] && n[(i + 1) % 8]).count()
}

fn deletable(mask: &GrayImage, x: u32, y: u32, pass: usize) -> bool {
    let n = neighbours(mask, x, y);
    let b = n.iter().filter(|&&v| v).count();
    if !(2..=6).contains(&b) || transitions(&n) != 1 {
        return false;
    }
    let [p2, _, p4, _, p6, _, p8, _] = n;
    if pass == 0 {
        !(p2 && p4 && p6) && !(p4 && p6 && p8)
    } else {
        !(p2 && p4 && p8) && !(p2 && p6 && p8)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cleanup::{foreground_count, mask_from_bits};
    use imageproc::region_labelling::{connected_components, Connectivity};
    use proptest::prelude::*;

    fn components(mask: &GrayImage) -> u32 {
        connected_components(mask, Connectivity::Eight, Luma([0u8]))
            .pixels()
            .map(|p| p.0[0])
            .max()
            .unwrap_or(0)
    }

    #[test]
    fn thick_bar_becomes_thin_line() {
        let mut mask = GrayImage::new(12, 7);
        for y in 2..5 {
            for x in 1..11 {
                mask.put_pixel(x, y, Luma([255]));
            }
        }
        thin(&mut mask);
        // At most one pixel per column in the bar's interior.
        for x in 2..10 {
            let column = (0..7).filter(|&y| mask.get_pixel(x, y).0[0] > 0).count();
            assert!(column <= 1, "column {} has {} pixels", x, column);
        }
        assert!(foreground_count(&mask) > 0);
        assert_eq!(components(&mask), 1);
    }

    #[test]
    fn two_by_two_block_survives() {
        let mut mask = mask_from_bits(4, 4, &[
            false, false, false, false,
            false, true, true, false,
            false, true, true, false,
            false, false, false, false,
        ]);
        thin(&mut mask);
        assert!(foreground_count(&mask) >= 1);
        assert_eq!(components(&mask), 1);
    }

    #[test]
    fn single_pixel_line_is_untouched() {
        let bits: Vec<bool> = (0..15).map(|i| (5..10).contains(&i)).collect();
        let mut mask = mask_from_bits(5, 3, &bits);
        let before = mask.clone();
        assert_eq!(thin(&mut mask), 0);
        assert_eq!(mask, before);
    }

    proptest! {
        #[test]
        fn thinning_preserves_components(bits in prop::collection::vec(any::<bool>(), 100)) {
            let mut mask = mask_from_bits(10, 10, &bits);
            let before_count = foreground_count(&mask);
            let before_components = components(&mask);
            thin(&mut mask);
            prop_assert!(foreground_count(&mask) <= before_count);
            prop_assert_eq!(components(&mask), before_components);
        }
    }
}
