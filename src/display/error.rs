/*
 *  display/error.rs
 *
 *  AGM1264K - dual KS0108 framebuffer pipeline
 *  (c) 2020-26 Stuart Hunter
 *
 *  Unified error types for display subsystem
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
use std::error::Error;

use crate::display::window::PanelId;

/// Unified error type for all display operations
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisplayError {
    /// A required bus line is unassigned or the geometry is unusable.
    /// Fatal at setup.
    Configuration(String),

    /// GPIO line error outside of a byte transfer (chip-select, mode, reset)
    Gpio(String),

    /// A byte transfer failed at the line level
    BusWrite {
        panel: PanelId,
        /// bytes latched before the failure
        written: usize,
        /// bytes the transfer was meant to carry
        len: usize,
        reason: String,
    },

    /// Caller supplied an out-of-range update rectangle
    InvalidWindow { xs: usize, ys: usize, xe: usize, ye: usize },

    /// Controller command rejected at construction
    InvalidCommand(String),

    /// Source framebuffer size mismatch
    BufferSizeMismatch { expected: usize, actual: usize },

    /// Unsupported operation for this display
    UnsupportedOperation,
}

impl fmt::Display for DisplayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DisplayError::Configuration(msg) =>
                write!(f, "Invalid configuration: {}", msg),
            DisplayError::Gpio(msg) =>
                write!(f, "GPIO error: {}", msg),
            DisplayError::BusWrite { panel, written, len, reason } =>
                write!(f, "Bus write to {} panel failed after {}/{} bytes: {}",
                    panel, written, len, reason),
            DisplayError::InvalidWindow { xs, ys, xe, ye } =>
                write!(f, "Invalid window: xs={} ys={} xe={} ye={}", xs, ys, xe, ye),
            DisplayError::InvalidCommand(msg) =>
                write!(f, "Invalid controller command: {}", msg),
            DisplayError::BufferSizeMismatch { expected, actual } =>
                write!(f, "Buffer size mismatch: expected {} pixels, got {}", expected, actual),
            DisplayError::UnsupportedOperation =>
                write!(f, "Operation not supported by this display"),
        }
    }
}

impl Error for DisplayError {}

impl DisplayError {
    /// Wrap a line-level error from any embedded-hal pin
    pub fn gpio<E: fmt::Debug>(what: &str, err: E) -> Self {
        DisplayError::Gpio(format!("{}: {:?}", what, err))
    }
}
