//! In-memory raster input.
//!
//! A [`Bitmap`] owns its pixel buffer; the tracer only ever borrows it.
//! Decoding from files is left to the caller (see [`Bitmap::from_dynamic_image`]
//! for the `image` crate bridge).

use image::{DynamicImage, RgbaImage};

use crate::color::Color;
use crate::error::TraceError;

/// Channel layout of a bitmap's pixel buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    /// 1 bit of information stored in one byte: 0 = white, non-zero = black.
    Bilevel,
    /// 8-bit grayscale.
    Gray8,
    /// 24-bit RGB.
    Rgb8,
    /// 32-bit RGBA.
    Rgba8,
}

impl PixelFormat {
    pub fn bytes_per_pixel(self) -> usize {
        match self {
            PixelFormat::Bilevel | PixelFormat::Gray8 => 1,
            PixelFormat::Rgb8 => 3,
            PixelFormat::Rgba8 => 4,
        }
    }

    /// Nominal channel depth in bits.
    pub fn depth(self) -> u32 {
        match self {
            PixelFormat::Bilevel => 1,
            PixelFormat::Gray8 => 8,
            PixelFormat::Rgb8 => 24,
            PixelFormat::Rgba8 => 32,
        }
    }
}

/// A validated, row-major raster with an optional palette.
///
/// When a palette is present every byte of the buffer is an index into it.
#[derive(Debug, Clone, PartialEq)]
pub struct Bitmap {
    width: u32,
    height: u32,
    format: PixelFormat,
    data: Vec<u8>,
    palette: Option<Vec<Color>>,
}

impl Bitmap {
    /// Wrap a pixel buffer, checking its length against the dimensions.
    pub fn new(
        width: u32,
        height: u32,
        format: PixelFormat,
        data: Vec<u8>,
    ) -> Result<Self, TraceError> {
        Self::build(width, height, format, data, None)
    }

    /// Wrap an indexed buffer (one byte per pixel) and its palette.
    pub fn with_palette(
        width: u32,
        height: u32,
        format: PixelFormat,
        data: Vec<u8>,
        palette: Vec<Color>,
    ) -> Result<Self, TraceError> {
        Self::build(width, height, format, data, Some(palette))
    }

    fn build(
        width: u32,
        height: u32,
        format: PixelFormat,
        data: Vec<u8>,
        palette: Option<Vec<Color>>,
    ) -> Result<Self, TraceError> {
        if width == 0 || height == 0 {
            return Err(TraceError::InvalidBitmap(format!(
                "zero-area image ({}x{})",
                width, height
            )));
        }
        let expected = (width as usize)
            .checked_mul(height as usize)
            .and_then(|n| n.checked_mul(format.bytes_per_pixel()))
            .ok_or_else(|| TraceError::InvalidBitmap("dimensions overflow".into()))?;
        if data.len() != expected {
            return Err(TraceError::InvalidBitmap(format!(
                "buffer has {} bytes, {}x{} {:?} needs {}",
                data.len(),
                width,
                height,
                format,
                expected
            )));
        }
        if let Some(palette) = &palette {
            if format.bytes_per_pixel() != 1 {
                return Err(TraceError::UnsupportedPixelFormat(format!(
                    "palette requires a one-byte-per-pixel format, got {:?}",
                    format
                )));
            }
            if palette.is_empty() {
                return Err(TraceError::InvalidBitmap("empty palette".into()));
            }
            if let Some(bad) = data.iter().find(|&&i| i as usize >= palette.len()) {
                return Err(TraceError::InvalidBitmap(format!(
                    "palette index {} out of range (palette has {} entries)",
                    bad,
                    palette.len()
                )));
            }
        }
        Ok(Self {
            width,
            height,
            format,
            data,
            palette,
        })
    }

    /// Convert a decoded `image` crate image, keeping gray and RGB(A) buffers as-is.
    pub fn from_dynamic_image(img: &DynamicImage) -> Result<Self, TraceError> {
        let (width, height) = (img.width(), img.height());
        match img {
            DynamicImage::ImageLuma8(gray) => {
                Self::new(width, height, PixelFormat::Gray8, gray.as_raw().clone())
            }
            DynamicImage::ImageRgb8(rgb) => {
                Self::new(width, height, PixelFormat::Rgb8, rgb.as_raw().clone())
            }
            other => Self::from_rgba_image(&other.to_rgba8()),
        }
    }

    pub fn from_rgba_image(img: &RgbaImage) -> Result<Self, TraceError> {
        Self::new(img.width(), img.height(), PixelFormat::Rgba8, img.as_raw().clone())
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn format(&self) -> PixelFormat {
        self.format
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn palette(&self) -> Option<&[Color]> {
        self.palette.as_deref()
    }

    /// Resolved colour of the pixel at (x, y). Panics if out of bounds.
    pub fn pixel(&self, x: u32, y: u32) -> Color {
        let bpp = self.format.bytes_per_pixel();
        let i = (y as usize * self.width as usize + x as usize) * bpp;
        let px = &self.data[i..i + bpp];
        if let Some(palette) = &self.palette {
            return palette[px[0] as usize];
        }
        match self.format {
            PixelFormat::Bilevel => {
                if px[0] == 0 {
                    Color::WHITE
                } else {
                    Color::BLACK
                }
            }
            PixelFormat::Gray8 => Color::gray(px[0]),
            PixelFormat::Rgb8 => Color::rgb(px[0], px[1], px[2]),
            PixelFormat::Rgba8 => Color::rgba(px[0], px[1], px[2], px[3]),
        }
    }

    /// Iterate resolved colours in row-major order.
    pub fn colors(&self) -> impl Iterator<Item = Color> + '_ {
        (0..self.height).flat_map(move |y| (0..self.width).map(move |x| self.pixel(x, y)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_buffer_length_mismatch() {
        let err = Bitmap::new(4, 4, PixelFormat::Rgb8, vec![0; 47]).unwrap_err();
        assert!(matches!(err, TraceError::InvalidBitmap(_)));
    }

    #[test]
    fn rejects_zero_area() {
        let err = Bitmap::new(0, 10, PixelFormat::Gray8, vec![]).unwrap_err();
        assert!(matches!(err, TraceError::InvalidBitmap(_)));
    }

    #[test]
    fn rejects_palette_on_rgb() {
        let err = Bitmap::with_palette(1, 1, PixelFormat::Rgb8, vec![0; 3], vec![Color::BLACK])
            .unwrap_err();
        assert!(matches!(err, TraceError::UnsupportedPixelFormat(_)));
    }

    #[test]
    fn rejects_out_of_range_palette_index() {
        let err = Bitmap::with_palette(2, 1, PixelFormat::Gray8, vec![0, 2], vec![Color::BLACK; 2])
            .unwrap_err();
        assert!(matches!(err, TraceError::InvalidBitmap(_)));
    }

    #[test]
    fn resolves_pixels_through_palette() {
        let red = Color::rgb(255, 0, 0);
        let bm = Bitmap::with_palette(2, 1, PixelFormat::Gray8, vec![1, 0], vec![Color::WHITE, red])
            .unwrap();
        assert_eq!(bm.pixel(0, 0), red);
        assert_eq!(bm.pixel(1, 0), Color::WHITE);
    }

    #[test]
    fn bilevel_nonzero_is_black() {
        let bm = Bitmap::new(2, 1, PixelFormat::Bilevel, vec![0, 1]).unwrap();
        assert_eq!(bm.colors().collect::<Vec<_>>(), vec![Color::WHITE, Color::BLACK]);
    }
}
