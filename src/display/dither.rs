/*
 *  display/dither.rs
 *
 *  AGM1264K - dual KS0108 framebuffer pipeline
 *  (c) 2020-26 Stuart Hunter
 *
 *  Intensity plane and error-diffusion dithering down to 1bpp
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

use serde::{Deserialize, Serialize};

use crate::display::color::PixelFormat;
use crate::display::error::DisplayError;

pub const BLACK: i16 = 0;
pub const WHITE: i16 = 255;

/// Intensity at or above which threshold mode picks white
pub const THRESHOLD: i16 = 128;

/// How the intensity plane is reduced to black and white
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ConversionMode {
    /// error diffusion over the whole plane
    #[default]
    Dither,
    /// fixed cut at [`THRESHOLD`]
    Threshold,
}

/// Error diffusion weights indexed `[dy][dx]` from the current pixel.
///
/// A cell holding [`DiffusionKernel::SENTINEL`] receives the quantised value
/// itself; every other cell receives `error / normalizer * weight`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiffusionKernel<const W: usize, const H: usize> {
    weights: [[i8; W]; H],
}

/// The 2x2 kernel `{-1,3;3,2}`: self, right 3, below 3, below-right 2
pub const KERNEL_2X2: DiffusionKernel<2, 2> = DiffusionKernel::new([[-1, 3], [3, 2]]);

impl<const W: usize, const H: usize> DiffusionKernel<W, H> {
    pub const SENTINEL: i8 = -1;

    pub const fn new(weights: [[i8; W]; H]) -> Self {
        Self { weights }
    }

    /// Sum of all weights except the sentinel
    pub const fn normalizer(&self) -> i32 {
        let mut sum = 0i32;
        let mut dy = 0;
        while dy < H {
            let mut dx = 0;
            while dx < W {
                let w = self.weights[dy][dx];
                if w != Self::SENTINEL {
                    sum += w as i32;
                }
                dx += 1;
            }
            dy += 1;
        }
        sum
    }
}

/// Signed per-pixel luma scratch plane, mutated in place by the ditherer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntensityPlane {
    width: usize,
    height: usize,
    data: Vec<i16>,
}

impl IntensityPlane {
    pub fn new(width: usize, height: usize) -> Self {
        Self { width, height, data: vec![BLACK; width * height] }
    }

    /// Build directly from intensities, row-major
    pub fn from_values(width: usize, height: usize, data: Vec<i16>) -> Result<Self, DisplayError> {
        if data.len() != width * height {
            return Err(DisplayError::BufferSizeMismatch {
                expected: width * height,
                actual: data.len(),
            });
        }
        Ok(Self { width, height, data })
    }

    pub fn width(&self) -> usize { self.width }
    pub fn height(&self) -> usize { self.height }
    pub fn as_slice(&self) -> &[i16] { &self.data }

    #[inline]
    pub fn get(&self, x: usize, y: usize) -> i16 {
        self.data[y * self.width + x]
    }

    #[inline]
    pub fn is_white(&self, x: usize, y: usize) -> bool {
        self.get(x, y) >= WHITE
    }

    /// Refill from a source framebuffer, reusing the allocation
    pub fn load(&mut self, src: &[u16], format: PixelFormat) -> Result<(), DisplayError> {
        if src.len() != self.data.len() {
            return Err(DisplayError::BufferSizeMismatch {
                expected: self.data.len(),
                actual: src.len(),
            });
        }
        format.luma_plane(src, &mut self.data);
        Ok(())
    }

    /// Reduce to black/white with the selected mode
    pub fn quantize(&mut self, mode: ConversionMode) {
        match mode {
            ConversionMode::Dither => self.dither(&KERNEL_2X2),
            ConversionMode::Threshold => self.threshold(),
        }
    }

    pub fn threshold(&mut self) {
        for v in self.data.iter_mut() {
            *v = if *v >= THRESHOLD { WHITE } else { BLACK };
        }
    }

    /// Error diffusion in raster order over the whole plane.
    ///
    /// Every cell ends up BLACK or WHITE. Error pushed past the right or
    /// bottom edge is dropped.
    pub fn dither<const W: usize, const H: usize>(&mut self, kernel: &DiffusionKernel<W, H>) {
        let norm = kernel.normalizer().max(1);
        let (w, h) = (self.width, self.height);

        for y in 0..h {
            for x in 0..w {
                let value = self.data[y * w + x] as i32;
                let (quantized, error) = quantize_pixel(value);
                let error = error / norm;

                for (dy, row) in kernel.weights.iter().enumerate() {
                    let ty = y + dy;
                    if ty >= h {
                        continue;
                    }
                    for (dx, &coeff) in row.iter().enumerate() {
                        let tx = x + dx;
                        if tx >= w {
                            continue;
                        }
                        let cell = &mut self.data[ty * w + tx];
                        if coeff == DiffusionKernel::<W, H>::SENTINEL {
                            *cell = quantized;
                        } else {
                            let acc = *cell as i32 + error * coeff as i32;
                            *cell = acc.clamp(BLACK as i32, WHITE as i32) as i16;
                        }
                    }
                }
            }
        }
    }
}

/// Nearest endpoint and the signed error to it; ties go to white
#[inline]
fn quantize_pixel(value: i32) -> (i16, i32) {
    let to_black = (value - BLACK as i32).abs();
    let to_white = (value - WHITE as i32).abs();
    if to_black >= to_white {
        (WHITE, value - WHITE as i32)
    } else {
        (BLACK, value - BLACK as i32)
    }
}
