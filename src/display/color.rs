/*
 *  display/color.rs
 *
 *  AGM1264K - dual KS0108 framebuffer pipeline
 *  (c) 2020-26 Stuart Hunter
 *
 *  16-bit colour to gamma corrected 8-bit luma
 *
 *  This program is free software: you can redistribute it and/or modify
 *  it under the terms of the GNU General Public License as published by
 *  the Free Software Foundation, either version 3 of the License, or
 *  (at your option) any later version.
 *
 *  This program is distributed in the hope that it will be useful,
 *  but WITHOUT ANY WARRANTY; without even the implied warranty of
 *  MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 *  GNU General Public License for more details.
 *
 *  See <http://www.gnu.org/licenses/> to get a copy of the GNU General
 *  Public License.
 *
 */

use embedded_graphics::pixelcolor::raw::RawU16;
use embedded_graphics::pixelcolor::{Rgb555, Rgb565, RgbColor};
use serde::{Deserialize, Serialize};

/// Luma weights in 1/256ths (0.299, 0.587, 0.114), summing to exactly 256
const WEIGHT_R: u32 = 77;
const WEIGHT_G: u32 = 150;
const WEIGHT_B: u32 = 29;

/// gamma 2.2, round(255 * (v/255)^2.2)
pub const GAMMA_TABLE: [u8; 256] = [
      0,   0,   0,   0,   0,   0,   0,   0,   0,   0,   0,   0,   0,   0,   0,   1,
      1,   1,   1,   1,   1,   1,   1,   1,   1,   2,   2,   2,   2,   2,   2,   2,
      3,   3,   3,   3,   3,   4,   4,   4,   4,   5,   5,   5,   5,   6,   6,   6,
      6,   7,   7,   7,   8,   8,   8,   9,   9,   9,  10,  10,  11,  11,  11,  12,
     12,  13,  13,  13,  14,  14,  15,  15,  16,  16,  17,  17,  18,  18,  19,  19,
     20,  20,  21,  22,  22,  23,  23,  24,  25,  25,  26,  26,  27,  28,  28,  29,
     30,  30,  31,  32,  33,  33,  34,  35,  35,  36,  37,  38,  39,  39,  40,  41,
     42,  43,  43,  44,  45,  46,  47,  48,  49,  49,  50,  51,  52,  53,  54,  55,
     56,  57,  58,  59,  60,  61,  62,  63,  64,  65,  66,  67,  68,  69,  70,  71,
     73,  74,  75,  76,  77,  78,  79,  81,  82,  83,  84,  85,  87,  88,  89,  90,
     91,  93,  94,  95,  97,  98,  99, 100, 102, 103, 105, 106, 107, 109, 110, 111,
    113, 114, 116, 117, 119, 120, 121, 123, 124, 126, 127, 129, 130, 132, 133, 135,
    137, 138, 140, 141, 143, 145, 146, 148, 149, 151, 153, 154, 156, 158, 159, 161,
    163, 165, 166, 168, 170, 172, 173, 175, 177, 179, 181, 182, 184, 186, 188, 190,
    192, 194, 196, 197, 199, 201, 203, 205, 207, 209, 211, 213, 215, 217, 219, 221,
    223, 225, 227, 229, 231, 234, 236, 238, 240, 242, 244, 246, 248, 251, 253, 255,
];

/// Bit layout of the source framebuffer pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum PixelFormat {
    /// 5-6-5, red in the high bits
    #[default]
    Rgb565,
    /// 5-5-5, top bit ignored
    Rgb555,
}

impl PixelFormat {
    /// Gamma corrected luma of one raw pixel
    #[inline]
    pub fn luma(self, raw: u16) -> u8 {
        match self {
            PixelFormat::Rgb565 => luma_rgb565(raw),
            PixelFormat::Rgb555 => luma_rgb555(raw),
        }
    }

    /// Convert a whole plane of raw pixels, writing one intensity per pixel.
    /// The format match is hoisted out of the per-pixel loop.
    pub fn luma_plane(self, src: &[u16], dst: &mut [i16]) {
        let convert: fn(u16) -> u8 = match self {
            PixelFormat::Rgb565 => luma_rgb565,
            PixelFormat::Rgb555 => luma_rgb555,
        };
        for (out, &px) in dst.iter_mut().zip(src.iter()) {
            *out = convert(px) as i16;
        }
    }
}

#[inline]
fn expand5(c: u8) -> u32 {
    let c = c as u32;
    (c << 3) | (c >> 2)
}

#[inline]
fn expand6(c: u8) -> u32 {
    let c = c as u32;
    (c << 2) | (c >> 4)
}

/// Weighted luma of 8-bit channels followed by the gamma lookup
#[inline]
pub fn luma_rgb888(r: u8, g: u8, b: u8) -> u8 {
    let y = (WEIGHT_R * r as u32 + WEIGHT_G * g as u32 + WEIGHT_B * b as u32) >> 8;
    GAMMA_TABLE[y.min(255) as usize]
}

#[inline]
pub fn luma_rgb565(raw: u16) -> u8 {
    let c = Rgb565::from(RawU16::new(raw));
    luma_rgb888(expand5(c.r()) as u8, expand6(c.g()) as u8, expand5(c.b()) as u8)
}

#[inline]
pub fn luma_rgb555(raw: u16) -> u8 {
    let c = Rgb555::from(RawU16::new(raw & 0x7FFF));
    luma_rgb888(expand5(c.r()) as u8, expand5(c.g()) as u8, expand5(c.b()) as u8)
}

#[cfg(test)]
mod tests {
    use super::*;
    use embedded_graphics::pixelcolor::IntoStorage;

    #[test]
    fn test_grey_maps_straight_through_gamma() {
        for v in 0..=255u8 {
            assert_eq!(luma_rgb888(v, v, v), GAMMA_TABLE[v as usize], "v={}", v);
        }
    }

    #[test]
    fn test_rgb565_extremes() {
        assert_eq!(luma_rgb565(0x0000), 0);
        assert_eq!(luma_rgb565(0xFFFF), 255);
        assert_eq!(PixelFormat::Rgb565.luma(Rgb565::WHITE.into_storage()), 255);
    }

    #[test]
    fn test_rgb555_ignores_top_bit() {
        assert_eq!(luma_rgb555(0x7FFF), 255);
        assert_eq!(luma_rgb555(0x8000), 0);
    }

    #[test]
    fn test_green_outweighs_blue() {
        let green = Rgb565::GREEN.into_storage();
        let blue = Rgb565::BLUE.into_storage();
        assert!(luma_rgb565(green) > luma_rgb565(blue));
        // 150/256 of full scale before gamma
        assert_eq!(luma_rgb565(green), GAMMA_TABLE[149]);
    }

    #[test]
    fn test_gamma_table_is_monotonic() {
        assert!(GAMMA_TABLE.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn test_luma_plane() {
        let src = [0x0000u16, 0xFFFF, Rgb565::new(16, 32, 16).into_storage()];
        let mut dst = [0i16; 3];
        PixelFormat::Rgb565.luma_plane(&src, &mut dst);
        assert_eq!(dst[0], 0);
        assert_eq!(dst[1], 255);
        assert_eq!(dst[2], luma_rgb565(src[2]) as i16);
    }
}
