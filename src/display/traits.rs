/*
 *  display/traits.rs
 *
 *  AGM1264K - dual KS0108 framebuffer pipeline
 *  (c) 2020-26 Stuart Hunter
 *
 *  Core trait definitions for display driver abstraction
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

use crate::display::dither::ConversionMode;
use crate::display::error::DisplayError;

/// Display capabilities and metadata
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayCapabilities {
    /// Display width in pixels, both panels
    pub width: u32,

    /// Display height in pixels
    pub height: u32,

    /// Independently selected controllers
    pub panel_count: u32,

    /// Maximum recommended frame rate
    pub max_fps: u32,

    /// Whether the display supports inversion
    pub supports_invert: bool,
}

/// Minimal hardware abstraction for framebuffer-backed monochrome panels
///
/// The host framebuffer layer calls `set_window` with the dirty rectangle and
/// then `flush` with the whole 16bpp source. The two calls must not overlap.
pub trait DisplayDriver: Send {
    /// Returns the capabilities of this display
    fn capabilities(&self) -> &DisplayCapabilities;

    /// Returns the display dimensions as (width, height)
    fn dimensions(&self) -> (u32, u32) {
        let caps = self.capabilities();
        (caps.width, caps.height)
    }

    /// Reset and bring up the controllers
    fn init(&mut self) -> Result<(), DisplayError>;

    /// Record the rectangle the next flush sends, in pixel coordinates, inclusive
    fn set_window(&mut self, xs: usize, ys: usize, xe: usize, ye: usize) -> Result<(), DisplayError>;

    /// Convert, dither and send the pending window from `source`
    ///
    /// `offset`/`len` is the dirty byte range reported by the host.
    fn flush(&mut self, source: &[u16], offset: usize, len: usize) -> Result<(), DisplayError>;

    /// Clear the display to blank/off state
    fn clear(&mut self) -> Result<(), DisplayError>;

    /// Flip the bit sense of packed pixels (negative image)
    fn set_invert(&mut self, inverted: bool) -> Result<(), DisplayError> {
        let _ = inverted;
        Err(DisplayError::UnsupportedOperation)
    }

    /// Switch between error diffusion and a fixed threshold
    fn set_conversion_mode(&mut self, mode: ConversionMode);
}
