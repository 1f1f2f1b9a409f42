//! Bitmap cleanup before tracing.
//!
//! Despeckling removes small connected regions; thinning reduces filled
//! regions to one-pixel skeletons for centre-line tracing. Both work on
//! binary masks (`GrayImage`, foreground = non-zero) so they compose with
//! the `imageproc` region tools.

pub mod despeckle;
pub mod thin;

pub use despeckle::{despeckle_indexed, despeckle_mask, speckle_size};
pub use thin::thin;

use image::{GrayImage, Luma};

/// Mask value for foreground pixels.
pub const FOREGROUND: Luma<u8> = Luma([255]);
/// Mask value for background pixels.
pub const BACKGROUND: Luma<u8> = Luma([0]);

/// Number of foreground pixels in a mask.
pub fn foreground_count(mask: &GrayImage) -> usize {
    mask.pixels().filter(|p| p.0[0] > 0).count()
}

/// Build a mask from a row-major list of booleans.
pub fn mask_from_bits(width: u32, height: u32, bits: &[bool]) -> GrayImage {
    GrayImage::from_fn(width, height, |x, y| {
        if bits[(y * width + x) as usize] {
            FOREGROUND
        } else {
            BACKGROUND
        }
    })
}
