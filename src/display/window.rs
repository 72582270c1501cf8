/*
 *  display/window.rs
 *
 *  AGM1264K - dual KS0108 framebuffer pipeline
 *  (c) 2020-26 Stuart Hunter
 *
 *  Panel geometry and the pending update window
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

use std::fmt;
use std::ops::RangeInclusive;

use crate::display::error::DisplayError;

/// Rows per controller page
pub const PAGE_HEIGHT: usize = 8;

/// KS0108 limits: 64 columns by 8 pages per controller
pub const MAX_PANEL_WIDTH: usize = 64;
pub const MAX_PANEL_HEIGHT: usize = 64;

/// One of the two controllers behind the display
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PanelId {
    Left,
    Right,
}

impl PanelId {
    pub const ALL: [PanelId; 2] = [PanelId::Left, PanelId::Right];

    pub fn index(self) -> usize {
        match self {
            PanelId::Left => 0,
            PanelId::Right => 1,
        }
    }

    pub fn other(self) -> PanelId {
        match self {
            PanelId::Left => PanelId::Right,
            PanelId::Right => PanelId::Left,
        }
    }
}

impl fmt::Display for PanelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PanelId::Left => write!(f, "left"),
            PanelId::Right => write!(f, "right"),
        }
    }
}

/// Pixel geometry of the combined two-panel display.
///
/// Only built through [`Geometry::new`] or `Default`, so the KS0108 limits
/// always hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Geometry {
    /// columns per controller
    panel_width: usize,
    /// rows, shared by both controllers
    height: usize,
}

impl Default for Geometry {
    fn default() -> Self {
        Self { panel_width: MAX_PANEL_WIDTH, height: MAX_PANEL_HEIGHT }
    }
}

impl Geometry {
    /// Geometry from the total (two panel) width
    pub fn new(total_width: usize, height: usize) -> Result<Self, DisplayError> {
        if total_width == 0 || total_width % 2 != 0 || total_width / 2 > MAX_PANEL_WIDTH {
            return Err(DisplayError::Configuration(format!(
                "width {} must be even and at most {}", total_width, 2 * MAX_PANEL_WIDTH
            )));
        }
        if height == 0 || height % PAGE_HEIGHT != 0 || height > MAX_PANEL_HEIGHT {
            return Err(DisplayError::Configuration(format!(
                "height {} must be a multiple of {} up to {}", height, PAGE_HEIGHT, MAX_PANEL_HEIGHT
            )));
        }
        Ok(Self { panel_width: total_width / 2, height })
    }

    pub fn panel_width(&self) -> usize { self.panel_width }
    pub fn height(&self) -> usize { self.height }
    pub fn total_width(&self) -> usize { self.panel_width * 2 }

    /// First column of the right panel
    pub fn boundary(&self) -> usize { self.panel_width }

    pub fn pages(&self) -> usize { self.height / PAGE_HEIGHT }

    pub fn pixel_count(&self) -> usize { self.total_width() * self.height }
}

/// Columns of one panel covered by a window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnSpan {
    pub panel: PanelId,
    /// first framebuffer column
    pub first: usize,
    /// last framebuffer column, inclusive
    pub last: usize,
    /// controller-local column address of `first`
    pub local_start: u8,
}

impl ColumnSpan {
    pub fn len(&self) -> usize { self.last - self.first + 1 }

    /// Controller-local columns, inclusive
    pub fn local_columns(&self) -> RangeInclusive<usize> {
        let start = self.local_start as usize;
        start..=start + self.len() - 1
    }
}

/// Pending update rectangle: pixel columns, page rows, all inclusive.
///
/// Only constructible through validation, so `xs <= xe < total_width`
/// and `ys_page <= ye_page < pages` always hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddressWindow {
    xs: usize,
    ys_page: usize,
    xe: usize,
    ye_page: usize,
}

impl AddressWindow {
    /// `ys`/`ye` are pixel rows, folded down to their pages
    pub fn new(xs: usize, ys: usize, xe: usize, ye: usize, geometry: &Geometry) -> Result<Self, DisplayError> {
        if xs > xe || ys > ye || xe >= geometry.total_width() || ye >= geometry.height {
            return Err(DisplayError::InvalidWindow { xs, ys, xe, ye });
        }
        Ok(Self {
            xs,
            ys_page: ys / PAGE_HEIGHT,
            xe,
            ye_page: ye / PAGE_HEIGHT,
        })
    }

    /// Whole display
    pub fn full(geometry: &Geometry) -> Self {
        Self {
            xs: 0,
            ys_page: 0,
            xe: geometry.total_width() - 1,
            ye_page: geometry.pages() - 1,
        }
    }

    pub fn xs(&self) -> usize { self.xs }
    pub fn xe(&self) -> usize { self.xe }
    pub fn ys_page(&self) -> usize { self.ys_page }
    pub fn ye_page(&self) -> usize { self.ye_page }

    pub fn pages(&self) -> RangeInclusive<usize> {
        self.ys_page..=self.ye_page
    }

    /// Panels touched, left first
    pub fn panels(&self, geometry: &Geometry) -> impl Iterator<Item = PanelId> + use<> {
        let boundary = geometry.boundary();
        let left = (self.xs < boundary).then_some(PanelId::Left);
        let right = (self.xe >= boundary).then_some(PanelId::Right);
        left.into_iter().chain(right)
    }

    /// The part of the window on one panel, if any
    pub fn span(&self, panel: PanelId, geometry: &Geometry) -> Option<ColumnSpan> {
        let boundary = geometry.boundary();
        match panel {
            PanelId::Left if self.xs < boundary => Some(ColumnSpan {
                panel,
                first: self.xs,
                last: self.xe.min(boundary - 1),
                local_start: self.xs as u8,
            }),
            PanelId::Right if self.xe >= boundary => {
                let first = self.xs.max(boundary);
                Some(ColumnSpan {
                    panel,
                    first,
                    last: self.xe,
                    local_start: (first - boundary) as u8,
                })
            }
            _ => None,
        }
    }
}
