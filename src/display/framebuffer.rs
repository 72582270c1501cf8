/*
 *  display/framebuffer.rs
 *
 *  AGM1264K - dual KS0108 framebuffer pipeline
 *  (c) 2020-26 Stuart Hunter
 *
 *  16bpp source framebuffer the host renders into
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

use core::convert::Infallible;
use embedded_graphics::geometry::{OriginDimensions, Size};
use embedded_graphics::pixelcolor::{IntoStorage, Rgb555, Rgb565};
use embedded_graphics::prelude::*;
use embedded_graphics::primitives::Rectangle;

use crate::display::color::PixelFormat;
use crate::display::window::Geometry;

/// Row-major 16bpp pixels, read-only to the pipeline.
///
/// Drawing is in RGB565; pixels are stored in `format`, the layout the
/// driver is configured to read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFrame {
    buf: Vec<u16>,
    w: usize,
    h: usize,
    format: PixelFormat,
}

impl SourceFrame {
    pub fn new(geometry: &Geometry, format: PixelFormat) -> Self {
        let (w, h) = (geometry.total_width(), geometry.height());
        Self { buf: vec![0; w * h], w, h, format }
    }

    pub fn width(&self) -> usize { self.w }
    pub fn height(&self) -> usize { self.h }
    pub fn format(&self) -> PixelFormat { self.format }

    pub fn as_slice(&self) -> &[u16] { &self.buf }

    /// Size in bytes as the host framebuffer sees it
    pub fn byte_len(&self) -> usize { self.buf.len() * 2 }

    /// Fill every pixel with one raw value
    pub fn fill_raw(&mut self, raw: u16) {
        self.buf.fill(raw);
    }

    /// Raw storage value of a drawing color
    #[inline]
    fn raw(&self, color: Rgb565) -> u16 {
        match self.format {
            PixelFormat::Rgb565 => color.into_storage(),
            PixelFormat::Rgb555 => Rgb555::from(color).into_storage(),
        }
    }

    /// Map (x,y) to linear index; returns None if out of bounds
    #[inline]
    fn idx(&self, p: Point) -> Option<usize> {
        if p.x >= 0 && p.y >= 0 {
            let (x, y) = (p.x as usize, p.y as usize);
            if x < self.w && y < self.h {
                return Some(y * self.w + x);
            }
        }
        None
    }
}

impl OriginDimensions for SourceFrame {
    fn size(&self) -> Size {
        Size::new(self.w as u32, self.h as u32)
    }
}

impl DrawTarget for SourceFrame {
    type Color = Rgb565;
    type Error = Infallible;

    fn draw_iter<I>(&mut self, pixels: I) -> Result<(), Self::Error>
    where
        I: IntoIterator<Item = Pixel<Self::Color>>,
    {
        for Pixel(p, c) in pixels {
            if let Some(i) = self.idx(p) {
                self.buf[i] = self.raw(c);
            }
        }
        Ok(())
    }

    fn clear(&mut self, color: Self::Color) -> Result<(), Self::Error> {
        self.fill_raw(self.raw(color));
        Ok(())
    }

    fn fill_solid(&mut self, area: &Rectangle, color: Self::Color) -> Result<(), Self::Error> {
        let area = area.intersection(&self.bounding_box());
        let raw = self.raw(color);
        if let Some(bottom_right) = area.bottom_right() {
            for y in area.top_left.y..=bottom_right.y {
                let row = y as usize * self.w;
                let (x0, x1) = (area.top_left.x as usize, bottom_right.x as usize);
                self.buf[row + x0..=row + x1].fill(raw);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embedded_graphics::primitives::{Line, PrimitiveStyle};

    #[test]
    fn test_new_frame_is_black() {
        let frame = SourceFrame::new(&Geometry::default(), PixelFormat::Rgb565);
        assert_eq!(frame.size(), Size::new(128, 64));
        assert_eq!(frame.byte_len(), 128 * 64 * 2);
        assert!(frame.as_slice().iter().all(|&p| p == 0));
    }

    #[test]
    fn test_draw_line() {
        let mut frame = SourceFrame::new(&Geometry::default(), PixelFormat::Rgb565);
        Line::new(Point::new(0, 0), Point::new(10, 0))
            .into_styled(PrimitiveStyle::with_stroke(Rgb565::WHITE, 1))
            .draw(&mut frame)
            .unwrap();
        assert_eq!(frame.as_slice()[10], 0xFFFF);
        assert_eq!(frame.as_slice()[11], 0);
    }

    #[test]
    fn test_fill_solid_clips() {
        let mut frame = SourceFrame::new(&Geometry::default(), PixelFormat::Rgb565);
        frame
            .fill_solid(&Rectangle::new(Point::new(120, 60), Size::new(20, 20)), Rgb565::RED)
            .unwrap();
        let red = Rgb565::RED.into_storage();
        assert_eq!(frame.as_slice()[63 * 128 + 127], red);
        assert_eq!(frame.as_slice()[59 * 128 + 127], 0);
        assert_eq!(frame.as_slice().iter().filter(|&&p| p == red).count(), 8 * 4);
    }

    #[test]
    fn test_rgb555_storage() {
        let mut frame = SourceFrame::new(&Geometry::default(), PixelFormat::Rgb555);
        frame.clear(Rgb565::WHITE).unwrap();
        assert!(frame.as_slice().iter().all(|&p| p == 0x7FFF));

        // mid grey keeps roughly the same brightness in either layout
        frame.clear(Rgb565::new(16, 32, 16)).unwrap();
        let raw = frame.as_slice()[0];
        assert_eq!(raw & 0x8000, 0);
        let grey = PixelFormat::Rgb555.luma(raw) as i32;
        let reference = PixelFormat::Rgb565.luma(0x8410) as i32;
        assert!((grey - reference).abs() <= 4, "{} vs {}", grey, reference);
    }
}
