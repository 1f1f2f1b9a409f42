use serde::{Deserialize, Serialize};

use crate::color::Color;

/// Highest supported despeckle level.
pub const MAX_DESPECKLE_LEVEL: u32 = 20;

/// Highest supported palette size. Index 255 is reserved for transparency.
pub const MAX_COLOR_COUNT: u32 = 255;

/// All tracing parameters in one struct.
/// Serializable (for saving presets) and immutable for the duration of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FittingOptions {
    // -- Corner detection --
    /// Minimum turn away from straight (degrees) at a polygon vertex for it
    /// to become a corner. `f64::INFINITY` disables corners, `0.0` makes
    /// every polygon vertex a corner.
    pub corner_threshold: f64,
    /// Outline pixels on each side of a vertex used to measure its turn.
    /// Also the suppression radius for `remove_adjacent_corners`.
    pub corner_surround: usize,
    /// With `remove_adjacent_corners`, turns at least this sharp (degrees)
    /// survive even next to a sharper corner.
    pub corner_always_threshold: f64,
    /// Keep only the sharpest corner within `corner_surround` pixels.
    pub remove_adjacent_corners: bool,

    // -- Curve fitting --
    /// Maximum distance (pixels) from the chord for a run of points to be
    /// emitted as a straight line.
    pub line_threshold: f64,
    /// A fitted cubic whose handles stay within this fraction of its chord
    /// length from the chord becomes a line.
    pub line_reversion_threshold: f64,
    /// Maximum pointwise error (pixels) accepted for a cubic before the
    /// points are split and refit.
    pub error_threshold: f64,
    /// Laplacian smoothing passes over outline points before fitting.
    pub filter_iterations: usize,
    /// Points on each side used to estimate the tangent at a smooth join.
    pub tangent_surround: usize,

    // -- Bitmap cleanup --
    /// Level L removes connected regions of at most 2^(L-1) pixels. 0 = off.
    pub despeckle_level: u32,
    /// Colour-similarity weight when merging a speckle into a neighbour.
    pub despeckle_tightness: f64,

    // -- Colour / mode --
    /// Number of colours to quantize to. 0 = monochrome.
    pub color_count: u32,
    /// Trace skeleton centre-lines instead of filled outlines.
    pub centerline: bool,
    /// Exact colour treated as transparent.
    pub background_color: Option<Color>,
    /// In centerline mode, record the source stroke width on each spline.
    pub preserve_width: bool,
}

impl Default for FittingOptions {
    fn default() -> Self {
        Self {
            corner_threshold: 80.0,
            corner_surround: 4,
            corner_always_threshold: 120.0,
            remove_adjacent_corners: false,
            line_threshold: 1.0,
            line_reversion_threshold: 0.01,
            error_threshold: 2.0,
            filter_iterations: 4,
            tangent_surround: 3,
            despeckle_level: 0,
            despeckle_tightness: 2.0,
            color_count: 0,
            centerline: false,
            background_color: None,
            preserve_width: false,
        }
    }
}

impl FittingOptions {
    /// Despeckle level clamped to the supported range.
    pub fn effective_despeckle_level(&self) -> u32 {
        self.despeckle_level.min(MAX_DESPECKLE_LEVEL)
    }

    /// Tightness clamped to 0..=8.
    pub fn effective_despeckle_tightness(&self) -> f64 {
        if self.despeckle_tightness.is_nan() {
            0.0
        } else {
            self.despeckle_tightness.clamp(0.0, 8.0)
        }
    }

    /// Palette size clamped to the supported range; 0 stays monochrome.
    pub fn effective_color_count(&self) -> u32 {
        self.color_count.min(MAX_COLOR_COUNT)
    }

    pub fn is_monochrome(&self) -> bool {
        self.color_count == 0
    }
}
