//! RGBA colour values shared by bitmaps, palettes and output groups.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// An 8-bit-per-channel RGBA colour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

/// Alpha values below this are treated as transparent.
const OPAQUE_ALPHA: u8 = 128;

impl Color {
    pub const BLACK: Color = Color::rgb(0, 0, 0);
    pub const WHITE: Color = Color::rgb(255, 255, 255);

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    pub const fn rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    pub const fn gray(v: u8) -> Self {
        Self::rgb(v, v, v)
    }

    pub fn is_opaque(self) -> bool {
        self.a >= OPAQUE_ALPHA
    }

    /// True if the RGB channels match, ignoring alpha.
    pub fn same_rgb(self, other: Color) -> bool {
        self.r == other.r && self.g == other.g && self.b == other.b
    }

    /// ITU-R BT.601 luma, 0-255.
    pub fn luma(self) -> u8 {
        ((299 * self.r as u32 + 587 * self.g as u32 + 114 * self.b as u32) / 1000) as u8
    }

    /// Squared euclidean distance in RGB space.
    pub fn distance_squared(self, other: Color) -> u32 {
        let dr = self.r as i32 - other.r as i32;
        let dg = self.g as i32 - other.g as i32;
        let db = self.b as i32 - other.b as i32;
        (dr * dr + dg * dg + db * db) as u32
    }

    /// RGB distance scaled to [0, 1].
    pub fn distance_normalized(self, other: Color) -> f64 {
        const MAX: f64 = 441.672_955_930_063_7; // 255 * sqrt(3)
        (self.distance_squared(other) as f64).sqrt() / MAX
    }

    /// Channels as floats in [0, 1], for PostScript/PDF colour operators.
    pub fn unit_rgb(self) -> (f64, f64, f64) {
        (
            self.r as f64 / 255.0,
            self.g as f64 / 255.0,
            self.b as f64 / 255.0,
        )
    }

    /// `#rrggbb`, dropping alpha.
    pub fn to_hex(self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.a == 255 {
            write!(f, "{}", self.to_hex())
        } else {
            write!(f, "{}{:02x}", self.to_hex(), self.a)
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid colour '{0}': expected rrggbb or rrggbbaa hex")]
pub struct ParseColorError(String);

impl FromStr for Color {
    type Err = ParseColorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let hex = s.trim().trim_start_matches('#');
        let channel = |i: usize| {
            hex.get(i..i + 2)
                .and_then(|h| u8::from_str_radix(h, 16).ok())
                .ok_or_else(|| ParseColorError(s.to_string()))
        };
        match hex.len() {
            6 => Ok(Color::rgb(channel(0)?, channel(2)?, channel(4)?)),
            8 => Ok(Color::rgba(channel(0)?, channel(2)?, channel(4)?, channel(6)?)),
            _ => Err(ParseColorError(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_hex_with_and_without_hash() {
        assert_eq!("#ff8000".parse::<Color>(), Ok(Color::rgb(255, 128, 0)));
        assert_eq!("00000080".parse::<Color>(), Ok(Color::rgba(0, 0, 0, 128)));
        assert!("fff".parse::<Color>().is_err());
        assert!("zz0000".parse::<Color>().is_err());
    }

    #[test]
    fn luma_orders_black_below_white() {
        assert_eq!(Color::BLACK.luma(), 0);
        assert_eq!(Color::WHITE.luma(), 255);
        assert!(Color::rgb(255, 0, 0).luma() < 128);
    }
}
