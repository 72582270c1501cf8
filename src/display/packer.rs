/*
 *  display/packer.rs
 *
 *  AGM1264K - dual KS0108 framebuffer pipeline
 *  (c) 2020-26 Stuart Hunter
 *
 *  Repack the binary plane into per-panel column pages
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

use crate::display::dither::IntensityPlane;
use crate::display::window::{AddressWindow, ColumnSpan, Geometry, PanelId, PAGE_HEIGHT};

/// One run of column bytes for one controller page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageTransfer {
    pub panel: PanelId,
    pub page: u8,
    /// controller-local column of `bytes[0]`
    pub column: u8,
    pub bytes: Vec<u8>,
}

/// Column byte for `x` within `page`: bit i is row `page*8 + i`.
///
/// A set bit means WHITE, or BLACK when `invert` is on.
#[inline]
pub fn pack_column(plane: &IntensityPlane, x: usize, page: usize, invert: bool) -> u8 {
    let top = page * PAGE_HEIGHT;
    let mut byte = 0u8;
    for i in 0..PAGE_HEIGHT {
        if plane.is_white(x, top + i) != invert {
            byte |= 1 << i;
        }
    }
    byte
}

fn pack_span(plane: &IntensityPlane, span: &ColumnSpan, page: usize, invert: bool) -> PageTransfer {
    PageTransfer {
        panel: span.panel,
        page: page as u8,
        column: span.local_start,
        bytes: (span.first..=span.last)
            .map(|x| pack_column(plane, x, page, invert))
            .collect(),
    }
}

/// Extract the window as transfers, ascending pages, left panel before right
pub fn pack_window(
    plane: &IntensityPlane,
    window: &AddressWindow,
    geometry: &Geometry,
    invert: bool,
) -> Vec<PageTransfer> {
    let spans: Vec<ColumnSpan> = window
        .panels(geometry)
        .filter_map(|panel| window.span(panel, geometry))
        .collect();

    window
        .pages()
        .flat_map(|page| spans.iter().map(move |span| pack_span(plane, span, page, invert)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::display::dither::{BLACK, WHITE};

    fn checkerboard(w: usize, h: usize) -> IntensityPlane {
        let data = (0..w * h)
            .map(|i| if (i % w + i / w) % 2 == 0 { WHITE } else { BLACK })
            .collect();
        IntensityPlane::from_values(w, h, data).unwrap()
    }

    #[test]
    fn test_checkerboard_columns() {
        let plane = checkerboard(8, 8);
        let bytes: Vec<u8> = (0..8).map(|x| pack_column(&plane, x, 0, false)).collect();
        assert_eq!(bytes, vec![0x55, 0xAA, 0x55, 0xAA, 0x55, 0xAA, 0x55, 0xAA]);
    }

    #[test]
    fn test_checkerboard_inverted() {
        let plane = checkerboard(8, 8);
        assert_eq!(pack_column(&plane, 0, 0, true), 0xAA);
        assert_eq!(pack_column(&plane, 1, 0, true), 0x55);
    }

    #[test]
    fn test_bit_zero_is_top_row() {
        let mut data = vec![BLACK; 2 * 16];
        data[8 * 2] = WHITE; // x=0, y=8 → page 1 bit 0
        data[15 * 2 + 1] = WHITE; // x=1, y=15 → page 1 bit 7
        let plane = IntensityPlane::from_values(2, 16, data).unwrap();
        assert_eq!(pack_column(&plane, 0, 0, false), 0x00);
        assert_eq!(pack_column(&plane, 0, 1, false), 0x01);
        assert_eq!(pack_column(&plane, 1, 1, false), 0x80);
    }

    #[test]
    fn test_window_split_columns() {
        let g = Geometry::default();
        let plane = IntensityPlane::new(g.total_width(), g.height());
        let window = AddressWindow::new(30, 0, 70, 15, &g).unwrap();
        let transfers = pack_window(&plane, &window, &g, false);

        let order: Vec<(u8, PanelId, u8, usize)> = transfers
            .iter()
            .map(|t| (t.page, t.panel, t.column, t.bytes.len()))
            .collect();
        assert_eq!(order, vec![
            (0, PanelId::Left, 30, 34),
            (0, PanelId::Right, 0, 7),
            (1, PanelId::Left, 30, 34),
            (1, PanelId::Right, 0, 7),
        ]);
    }

    #[test]
    fn test_right_panel_local_pixels() {
        let g = Geometry::default();
        let mut data = vec![BLACK; g.pixel_count()];
        // full white column at x=66
        for y in 0..8 {
            data[y * g.total_width() + 66] = WHITE;
        }
        let plane = IntensityPlane::from_values(g.total_width(), g.height(), data).unwrap();
        let window = AddressWindow::new(64, 0, 70, 7, &g).unwrap();
        let transfers = pack_window(&plane, &window, &g, false);
        assert_eq!(transfers.len(), 1);
        assert_eq!(transfers[0].bytes, vec![0, 0, 0xFF, 0, 0, 0, 0]);
    }
}
