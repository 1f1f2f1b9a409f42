//! Removal of small connected regions ("speckles").
//!
//! Level L removes every 4-connected region of at most 2^(L-1) pixels, so
//! level 1 clears isolated pixels and each further level doubles the size.
//! Binary masks paint speckles to background. Indexed (quantized) images
//! merge each speckle into the neighbouring colour it touches most,
//! discounted by colour distance, and repeat until nothing small is left.

use image::{GrayImage, Luma};
use imageproc::region_labelling::{connected_components, Connectivity};

use crate::color::Color;
use crate::config::MAX_DESPECKLE_LEVEL;

/// Index value marking transparent pixels in an indexed plane image.
pub const TRANSPARENT_INDEX: u8 = 255;

/// Largest region size (pixels) removed at `level`. 0 for level 0.
pub fn speckle_size(level: u32) -> usize {
    match level.min(MAX_DESPECKLE_LEVEL) {
        0 => 0,
        l => 1usize << (l - 1),
    }
}

/// Remove foreground regions of at most `speckle_size(level)` pixels.
///
/// Idempotent: surviving regions are untouched, so a second pass at the
/// same level finds nothing to remove.
pub fn despeckle_mask(mask: &GrayImage, level: u32) -> GrayImage {
    let max_size = speckle_size(level);
    if max_size == 0 {
        return mask.clone();
    }

    let labels = connected_components(mask, Connectivity::Four, Luma([0u8]));
    let region_count = labels.pixels().map(|p| p.0[0]).max().unwrap_or(0) as usize;
    let mut sizes = vec![0usize; region_count + 1];
    for p in labels.pixels() {
        sizes[p.0[0] as usize] += 1;
    }

    let mut out = mask.clone();
    let mut removed = 0usize;
    for (x, y, label) in labels.enumerate_pixels() {
        let label = label.0[0] as usize;
        if label != 0 && sizes[label] <= max_size {
            out.put_pixel(x, y, Luma([0]));
            removed += 1;
        }
    }
    log::debug!(
        "despeckle level {}: {} regions, {} pixels removed",
        level,
        region_count,
        removed
    );
    out
}

/// Merge small regions of an indexed image into their neighbours.
///
/// `indices` holds palette indices, with [`TRANSPARENT_INDEX`] for pixels
/// outside every plane. A speckle may also dissolve into transparency.
pub fn despeckle_indexed(indices: &mut GrayImage, palette: &[Color], level: u32, tightness: f64) {
    for step in 1..=level.min(MAX_DESPECKLE_LEVEL) {
        let max_size = speckle_size(step);
        let mut passes = 0;
        while merge_pass(indices, palette, max_size, tightness) {
            passes += 1;
        }
        log::debug!("despeckle step {} (<= {} px): {} merge passes", step, max_size, passes);
    }
}

/// One labelling + merge sweep. Returns true if any region was recoloured.
///
/// Every recolour joins a region to an adjacent one (or to transparency),
/// so the region count strictly drops and repeated sweeps terminate.
fn merge_pass(indices: &mut GrayImage, palette: &[Color], max_size: usize, tightness: f64) -> bool {
    let (w, h) = indices.dimensions();
    let labels = connected_components(&*indices, Connectivity::Four, Luma([TRANSPARENT_INDEX]));
    let region_count = labels.pixels().map(|p| p.0[0]).max().unwrap_or(0) as usize;
    let mut regions: Vec<Vec<(u32, u32)>> = vec![Vec::new(); region_count + 1];
    for (x, y, label) in labels.enumerate_pixels() {
        let label = label.0[0] as usize;
        if label != 0 {
            regions[label].push((x, y));
        }
    }

    let mut changed = false;
    for pixels in regions.iter().skip(1) {
        if pixels.is_empty() || pixels.len() > max_size {
            continue;
        }
        let (x0, y0) = pixels[0];
        let own = indices.get_pixel(x0, y0).0[0];

        let mut contacts = [0u32; 256];
        for &(x, y) in pixels {
            let neighbours = [
                (x.wrapping_sub(1), y),
                (x + 1, y),
                (x, y.wrapping_sub(1)),
                (x, y + 1),
            ];
            for (nx, ny) in neighbours {
                if nx < w && ny < h {
                    let v = indices.get_pixel(nx, ny).0[0];
                    if v != own {
                        contacts[v as usize] += 1;
                    }
                }
            }
        }

        if let Some(target) = best_neighbour(own, &contacts, palette, tightness) {
            for &(x, y) in pixels {
                indices.put_pixel(x, y, Luma([target]));
            }
            changed = true;
        }
    }
    changed
}

/// Neighbour colour with the highest `contacts / (1 + tightness * distance)`.
/// Ties go to the lowest index.
fn best_neighbour(own: u8, contacts: &[u32; 256], palette: &[Color], tightness: f64) -> Option<u8> {
    let own_color = palette.get(own as usize).copied();
    let mut best: Option<(u8, f64)> = None;
    for (v, &count) in contacts.iter().enumerate() {
        if count == 0 {
            continue;
        }
        let distance = match (own_color, palette.get(v)) {
            (Some(a), Some(b)) if v != TRANSPARENT_INDEX as usize => a.distance_normalized(*b),
            _ => 1.0,
        };
        let score = count as f64 / (1.0 + tightness * distance);
        if best.map_or(true, |(_, s)| score > s) {
            best = Some((v as u8, score));
        }
    }
    best.map(|(v, _)| v)
}
