/*
 *  lib.rs
 *
 *  AGM1264K - dual KS0108 framebuffer pipeline
 *  (c) 2020-26 Stuart Hunter
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

//! Renders a 16bpp framebuffer onto the AGM1264K-FL, a 128x64 monochrome
//! LCD built from two KS0108 controllers on one bit-banged parallel bus.
//!
//! Pipeline: luma + gamma → error diffusion over the whole frame → split the
//! dirty window at the panel boundary into column pages → write each page
//! to its controller with chip-select, command and data cycles.

pub mod config;
pub mod display;
