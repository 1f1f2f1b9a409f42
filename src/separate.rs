//! Colour separation: turn a bitmap into one binary mask per traced colour.
//!
//! Monochrome mode builds a single black plane from dark (or non-background)
//! pixels. Colour mode quantizes with median cut, despeckles the indexed
//! image, then splits it into one plane per palette entry. Planes come back
//! in palette order, which is also the stacking order of the output.

use std::collections::BTreeMap;

use image::{GrayImage, Luma};

use crate::bitmap::Bitmap;
use crate::cleanup::despeckle::{despeckle_indexed, despeckle_mask, TRANSPARENT_INDEX};
use crate::cleanup::{BACKGROUND, FOREGROUND};
use crate::color::Color;
use crate::config::{FittingOptions, MAX_COLOR_COUNT};

/// Luma below this is foreground in monochrome mode.
const LUMA_THRESHOLD: u8 = 128;

/// One colour's binary mask (foreground = 255).
#[derive(Debug, Clone, PartialEq)]
pub struct ColorPlane {
    pub color: Color,
    pub mask: GrayImage,
}

/// Build the despeckled planes to trace for `bitmap`.
pub fn separate(bitmap: &Bitmap, options: &FittingOptions) -> Vec<ColorPlane> {
    let level = options.effective_despeckle_level();
    if options.is_monochrome() {
        let mask = monochrome_mask(bitmap, options.background_color);
        let mask = despeckle_mask(&mask, level);
        return vec![ColorPlane {
            color: Color::BLACK,
            mask,
        }];
    }

    let (palette, mut indices) =
        quantize(bitmap, options.effective_color_count(), options.background_color);
    despeckle_indexed(
        &mut indices,
        &palette,
        level,
        options.effective_despeckle_tightness(),
    );
    log::info!("quantized to {} colours", palette.len());
    planes(&palette, &indices)
}

fn is_background(c: Color, background: Option<Color>) -> bool {
    !c.is_opaque() || background.map_or(false, |bg| c.same_rgb(bg))
}

/// Foreground mask for monochrome tracing.
///
/// With a background colour, every opaque pixel of a different colour is
/// foreground. Without one, opaque pixels darker than mid-grey are.
pub fn monochrome_mask(bitmap: &Bitmap, background: Option<Color>) -> GrayImage {
    GrayImage::from_fn(bitmap.width(), bitmap.height(), |x, y| {
        let c = bitmap.pixel(x, y);
        let fg = if is_background(c, background) {
            false
        } else if background.is_some() {
            true
        } else {
            c.luma() < LUMA_THRESHOLD
        };
        if fg {
            FOREGROUND
        } else {
            BACKGROUND
        }
    })
}

/// Quantize to at most `count` colours.
///
/// Returns the palette and an index image; background and transparent
/// pixels get [`TRANSPARENT_INDEX`].
pub fn quantize(bitmap: &Bitmap, count: u32, background: Option<Color>) -> (Vec<Color>, GrayImage) {
    let mut histogram: BTreeMap<Color, u32> = BTreeMap::new();
    for c in bitmap.colors() {
        if !is_background(c, background) {
            *histogram.entry(Color::rgb(c.r, c.g, c.b)).or_insert(0) += 1;
        }
    }

    let count = count.clamp(1, MAX_COLOR_COUNT) as usize;
    let palette = median_cut(&histogram, count);

    let lookup: BTreeMap<Color, u8> = histogram
        .keys()
        .map(|&c| (c, nearest(&palette, c)))
        .collect();
    let indices = GrayImage::from_fn(bitmap.width(), bitmap.height(), |x, y| {
        let c = bitmap.pixel(x, y);
        if is_background(c, background) {
            Luma([TRANSPARENT_INDEX])
        } else {
            Luma([lookup
                .get(&Color::rgb(c.r, c.g, c.b))
                .copied()
                .unwrap_or(TRANSPARENT_INDEX)])
        }
    });
    (palette, indices)
}

/// Index of the closest palette entry; ties go to the lowest index.
fn nearest(palette: &[Color], c: Color) -> u8 {
    let mut best = (0usize, u32::MAX);
    for (i, p) in palette.iter().enumerate() {
        let d = p.distance_squared(c);
        if d < best.1 {
            best = (i, d);
        }
    }
    best.0 as u8
}

// ── Median cut ──────────────────────────────────────────

/// A set of histogram entries split as one unit.
struct ColorBox {
    entries: Vec<(Color, u32)>,
    population: u64,
}

impl ColorBox {
    fn new(entries: Vec<(Color, u32)>) -> Self {
        let population = entries.iter().map(|&(_, n)| n as u64).sum();
        Self { entries, population }
    }

    fn channel(c: Color, ch: usize) -> u8 {
        match ch {
            0 => c.r,
            1 => c.g,
            _ => c.b,
        }
    }

    /// Channel with the largest value range (r, then g, then b on ties).
    fn widest_channel(&self) -> usize {
        let mut best = (0, 0u8);
        for ch in 0..3 {
            let (lo, hi) = self.entries.iter().fold((u8::MAX, 0u8), |(lo, hi), &(c, _)| {
                let v = Self::channel(c, ch);
                (lo.min(v), hi.max(v))
            });
            let range = hi.saturating_sub(lo);
            if range > best.1 {
                best = (ch, range);
            }
        }
        best.0
    }

    /// Split at the population median along the widest channel.
    fn split(mut self) -> (ColorBox, ColorBox) {
        let ch = self.widest_channel();
        self.entries
            .sort_by_key(|&(c, _)| (Self::channel(c, ch), c));
        let half = self.population.div_ceil(2);
        let mut running = 0u64;
        let mut cut = 0;
        for (i, &(_, n)) in self.entries.iter().enumerate() {
            running += n as u64;
            if running >= half {
                cut = i;
                break;
            }
        }
        let cut = cut.min(self.entries.len() - 2);
        let right = self.entries.split_off(cut + 1);
        (ColorBox::new(self.entries), ColorBox::new(right))
    }

    /// Population-weighted mean colour.
    fn mean(&self) -> Color {
        let total = self.population.max(1);
        let mut sum = [0u64; 3];
        for &(c, n) in &self.entries {
            sum[0] += c.r as u64 * n as u64;
            sum[1] += c.g as u64 * n as u64;
            sum[2] += c.b as u64 * n as u64;
        }
        let avg = |s: u64| ((s + total / 2) / total) as u8;
        Color::rgb(avg(sum[0]), avg(sum[1]), avg(sum[2]))
    }
}

/// Reduce a histogram to at most `count` representative colours, ordered by
/// descending population (ties by colour).
pub fn median_cut(histogram: &BTreeMap<Color, u32>, count: usize) -> Vec<Color> {
    let mut weighted: Vec<(Color, u64)> = if histogram.len() <= count {
        histogram.iter().map(|(&c, &n)| (c, n as u64)).collect()
    } else {
        let mut boxes = vec![ColorBox::new(histogram.iter().map(|(&c, &n)| (c, n)).collect())];
        while boxes.len() < count {
            let pick = boxes
                .iter()
                .enumerate()
                .filter(|(_, b)| b.entries.len() > 1)
                .max_by(|(ia, a), (ib, b)| a.population.cmp(&b.population).then(ib.cmp(ia)))
                .map(|(i, _)| i);
            let Some(i) = pick else { break };
            let (a, b) = boxes.swap_remove(i).split();
            boxes.push(a);
            boxes.push(b);
        }
        boxes.iter().map(|b| (b.mean(), b.population)).collect()
    };
    weighted.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
    weighted.into_iter().map(|(c, _)| c).collect()
}

/// Split an index image into one mask per palette entry. Planes with no
/// pixels left (e.g. merged away by despeckling) are dropped.
pub fn planes(palette: &[Color], indices: &GrayImage) -> Vec<ColorPlane> {
    palette
        .iter()
        .enumerate()
        .filter_map(|(i, &color)| {
            let mask = GrayImage::from_fn(indices.width(), indices.height(), |x, y| {
                if indices.get_pixel(x, y).0[0] as usize == i {
                    FOREGROUND
                } else {
                    BACKGROUND
                }
            });
            mask.pixels()
                .any(|p| p.0[0] > 0)
                .then_some(ColorPlane { color, mask })
        })
        .collect()
}
