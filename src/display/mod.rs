/*
 *  display/mod.rs
 *
 *  AGM1264K - dual KS0108 framebuffer pipeline
 *  (c) 2020-26 Stuart Hunter
 *
 *  Display subsystem: colour to 1bpp pipeline and the dual controller bus
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

// Core trait definitions
pub mod traits;
pub mod error;

// Pipeline stages, leaves first
pub mod color;
pub mod dither;
pub mod window;
pub mod packer;
pub mod bus;

pub mod framebuffer;
pub mod drivers;

// Re-exports for convenience
pub use traits::{DisplayDriver, DisplayCapabilities};
pub use error::DisplayError;
pub use color::{PixelFormat, GAMMA_TABLE};
pub use dither::{ConversionMode, DiffusionKernel, IntensityPlane, KERNEL_2X2};
pub use window::{AddressWindow, Geometry, PanelId};
pub use packer::{pack_window, PageTransfer};
pub use bus::{BusLines, BusPins, BusState, Command, Instruction, ParallelBus};
pub use framebuffer::SourceFrame;
pub use drivers::agm1264k::{Agm1264kDriver, DriverOptions};
