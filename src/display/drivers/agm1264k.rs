/*
 *  display/drivers/agm1264k.rs
 *
 *  AGM1264K - dual KS0108 framebuffer pipeline
 *  (c) 2020-26 Stuart Hunter
 *
 *  AGM1264K-FL display driver: two KS0108 controllers side by side
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

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::OutputPin;
use log::{debug, error, info, warn};

use crate::display::bus::{Command, Instruction, ParallelBus};
use crate::display::color::PixelFormat;
use crate::display::dither::{ConversionMode, IntensityPlane};
use crate::display::error::DisplayError;
use crate::display::packer::{pack_window, PageTransfer};
use crate::display::traits::{DisplayCapabilities, DisplayDriver};
use crate::display::window::{AddressWindow, Geometry, PanelId};

pub const FPS: u32 = 20;

/// Runtime options, usually filled from the config file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DriverOptions {
    pub geometry: Geometry,
    pub pixel_format: PixelFormat,
    pub mode: ConversionMode,
    /// negative image: set bits mean black
    pub invert: bool,
}

/// Per-display context: bus, pending window, scratch plane and flags
pub struct Agm1264kDriver<P, D> {
    bus: ParallelBus<P, D>,
    options: DriverOptions,
    capabilities: DisplayCapabilities,
    pending: Option<AddressWindow>,
    plane: IntensityPlane,
}

impl<P, D> Agm1264kDriver<P, D>
where
    P: OutputPin,
    D: DelayNs,
{
    pub fn new(bus: ParallelBus<P, D>, options: DriverOptions) -> Self {
        let geometry = options.geometry;
        let capabilities = DisplayCapabilities {
            width: geometry.total_width() as u32,
            height: geometry.height() as u32,
            panel_count: 2,
            max_fps: FPS,
            supports_invert: true,
        };
        Self {
            bus,
            options,
            capabilities,
            pending: None,
            plane: IntensityPlane::new(geometry.total_width(), geometry.height()),
        }
    }

    pub fn pending_window(&self) -> Option<&AddressWindow> { self.pending.as_ref() }

    /// The binary plane from the last flush
    pub fn plane(&self) -> &IntensityPlane { &self.plane }

    pub fn bus(&self) -> &ParallelBus<P, D> { &self.bus }

    /// Run the pipeline for one explicit window
    pub fn flush_window(&mut self, source: &[u16], window: &AddressWindow) -> Result<(), DisplayError> {
        self.plane.load(source, self.options.pixel_format)?;
        // always the whole plane so error reaches the window from above and left
        self.plane.quantize(self.options.mode);

        let transfers = pack_window(&self.plane, window, &self.options.geometry, self.options.invert);
        debug!("flushing {} transfers for {:?}", transfers.len(), window);
        self.send_all(&transfers)
    }

    /// Send every transfer, keep going past failures, report the first one
    fn send_all(&mut self, transfers: &[PageTransfer]) -> Result<(), DisplayError> {
        let mut first_err = None;
        for transfer in transfers {
            if let Err(e) = self.send(transfer) {
                first_err.get_or_insert(e);
            }
        }

        if let Err(e) = self.bus.deselect_all() {
            error!("failed to deselect controllers: {}", e);
            first_err.get_or_insert(e);
        }

        match first_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Address the page, then stream its columns. Failures are logged here
    /// with the phase they hit.
    fn send(&mut self, transfer: &PageTransfer) -> Result<(), DisplayError> {
        let (panel, page) = (transfer.panel, transfer.page);
        let addressed = Command::address(panel, transfer.column, page)
            .and_then(|command| self.bus.write_command(&command));
        if let Err(e) = addressed {
            error!(
                "{} panel page {}: addressing column {} failed, page skipped: {}",
                panel, page, transfer.column, e
            );
            return Err(e);
        }

        self.bus.write_data(panel, &transfer.bytes).inspect_err(|e| match e {
            DisplayError::BusWrite { written, len, .. } => error!(
                "{} panel page {}: data write failed at byte {} of {} (column {}): {}",
                panel, page, written, len,
                transfer.column as usize + written, e
            ),
            _ => error!("{} panel page {}: data transfer aborted: {}", panel, page, e),
        })
    }
}

impl<P, D> DisplayDriver for Agm1264kDriver<P, D>
where
    P: OutputPin + Send,
    D: DelayNs + Send,
{
    fn capabilities(&self) -> &DisplayCapabilities {
        &self.capabilities
    }

    fn init(&mut self) -> Result<(), DisplayError> {
        self.bus.reset()?;
        for panel in PanelId::ALL {
            let command = Command::new(panel, &[
                Instruction::DisplayOn(true),
                Instruction::SetColumn(0),
                Instruction::SetPage(0),
                Instruction::SetStartLine(0),
            ])?;
            self.bus.write_command(&command)?;
        }
        self.bus.deselect_all()?;
        info!(
            "AGM1264K initialized ({}x{}, {:?}, invert={})",
            self.capabilities.width, self.capabilities.height,
            self.options.mode, self.options.invert
        );
        Ok(())
    }

    fn set_window(&mut self, xs: usize, ys: usize, xe: usize, ye: usize) -> Result<(), DisplayError> {
        let window = AddressWindow::new(xs, ys, xe, ye, &self.options.geometry)?;
        debug!(
            "set_window(xs={}, ys_page={}, xe={}, ye_page={})",
            window.xs(), window.ys_page(), window.xe(), window.ye_page()
        );
        self.pending = Some(window);
        Ok(())
    }

    fn flush(&mut self, source: &[u16], offset: usize, len: usize) -> Result<(), DisplayError> {
        let expected = self.options.geometry.pixel_count();
        if source.len() != expected {
            return Err(DisplayError::BufferSizeMismatch { expected, actual: source.len() });
        }
        let source_bytes = source.len() * 2;
        if offset.checked_add(len).is_none_or(|end| end > source_bytes) {
            return Err(DisplayError::BufferSizeMismatch {
                expected: source_bytes,
                actual: offset.saturating_add(len),
            });
        }
        if len == 0 {
            warn!("flush with an empty dirty range, sending the window anyway");
        } else {
            debug!("flush(offset={}, len={})", offset, len);
        }

        let window = self
            .pending
            .take()
            .unwrap_or_else(|| AddressWindow::full(&self.options.geometry));
        self.flush_window(source, &window)
    }

    fn clear(&mut self) -> Result<(), DisplayError> {
        let geometry = self.options.geometry;
        let blank = vec![0u8; geometry.panel_width()];
        let transfers: Vec<PageTransfer> = (0..geometry.pages())
            .flat_map(|page| {
                let blank = &blank;
                PanelId::ALL.into_iter().map(move |panel| PageTransfer {
                    panel,
                    page: page as u8,
                    column: 0,
                    bytes: blank.clone(),
                })
            })
            .collect();
        self.send_all(&transfers)
    }

    fn set_invert(&mut self, inverted: bool) -> Result<(), DisplayError> {
        self.options.invert = inverted;
        Ok(())
    }

    fn set_conversion_mode(&mut self, mode: ConversionMode) {
        debug!("conversion mode -> {:?}", mode);
        self.options.mode = mode;
    }
}
