/*
 *  display/bus.rs
 *
 *  AGM1264K - dual KS0108 framebuffer pipeline
 *  (c) 2020-26 Stuart Hunter
 *
 *  Bit-banged 8080-style parallel bus shared by the two KS0108 controllers
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
use embedded_hal::digital::{OutputPin, PinState};
use log::{debug, trace};

use crate::display::error::DisplayError;
use crate::display::window::{PanelId, MAX_PANEL_HEIGHT, MAX_PANEL_WIDTH, PAGE_HEIGHT};

/// Enable held high for at least this long per byte
pub const LATCH_HOLD_US: u32 = 5;
/// Enable held low for at least this long before the next byte
pub const LATCH_RECOVERY_US: u32 = 1;

pub const RESET_PULSE_US: u32 = 20;
pub const RESET_SETTLE_MS: u32 = 120;

/// KS0108 instruction set (write side)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Instruction {
    DisplayOn(bool),
    /// Y address in the datasheet, the column within the controller
    SetColumn(u8),
    /// X address in the datasheet
    SetPage(u8),
    SetStartLine(u8),
}

impl Instruction {
    pub fn encode(self) -> u8 {
        match self {
            Instruction::DisplayOn(on) => 0x3E | on as u8,
            Instruction::SetColumn(col) => 0x40 | (col & 0x3F),
            Instruction::SetPage(page) => 0xB8 | (page & 0x07),
            Instruction::SetStartLine(line) => 0xC0 | (line & 0x3F),
        }
    }

    pub fn decode(byte: u8) -> Option<Self> {
        match byte {
            0x3E | 0x3F => Some(Instruction::DisplayOn(byte & 1 == 1)),
            0x40..=0x7F => Some(Instruction::SetColumn(byte & 0x3F)),
            0xB8..=0xBF => Some(Instruction::SetPage(byte & 0x07)),
            0xC0..=0xFF => Some(Instruction::SetStartLine(byte & 0x3F)),
            _ => None,
        }
    }

    fn validate(self) -> Result<Self, DisplayError> {
        let ok = match self {
            Instruction::DisplayOn(_) => true,
            Instruction::SetColumn(col) => (col as usize) < MAX_PANEL_WIDTH,
            Instruction::SetPage(page) => (page as usize) < MAX_PANEL_HEIGHT / PAGE_HEIGHT,
            Instruction::SetStartLine(line) => (line as usize) < MAX_PANEL_HEIGHT,
        };
        if ok {
            Ok(self)
        } else {
            Err(DisplayError::InvalidCommand(format!("{:?} out of range", self)))
        }
    }
}

/// Command bytes addressed to exactly one controller
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    panel: PanelId,
    opcodes: Vec<u8>,
}

impl Command {
    pub fn new(panel: PanelId, instructions: &[Instruction]) -> Result<Self, DisplayError> {
        if instructions.is_empty() {
            return Err(DisplayError::InvalidCommand("no instructions".to_string()));
        }
        let opcodes = instructions
            .iter()
            .map(|i| i.validate().map(Instruction::encode))
            .collect::<Result<Vec<u8>, _>>()?;
        Ok(Self { panel, opcodes })
    }

    /// Position the controller's write cursor
    pub fn address(panel: PanelId, column: u8, page: u8) -> Result<Self, DisplayError> {
        Self::new(panel, &[
            Instruction::DisplayOn(true),
            Instruction::SetColumn(column),
            Instruction::SetPage(page),
        ])
    }

    pub fn panel(&self) -> PanelId { self.panel }
    pub fn opcodes(&self) -> &[u8] { &self.opcodes }
}

/// Register select level
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Command,
    Data,
}

/// Last driven control state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BusState {
    pub selected: Option<PanelId>,
    pub mode: Option<Mode>,
}

/// The physical lines, all resolved
pub struct BusPins<P> {
    /// db0..db7
    pub data: [P; 8],
    /// E, latches on the falling edge
    pub enable: P,
    /// D/I: low command, high data
    pub rs: P,
    /// R/W: low write
    pub rw: P,
    /// active-low chip selects, [left, right]
    pub cs: [P; 2],
    pub reset: Option<P>,
}

/// Line assignment as it comes out of configuration; any hole is fatal
pub struct BusLines<P> {
    pub data: [Option<P>; 8],
    pub enable: Option<P>,
    pub rs: Option<P>,
    pub rw: Option<P>,
    pub cs0: Option<P>,
    pub cs1: Option<P>,
    pub reset: Option<P>,
}

impl<P> Default for BusLines<P> {
    fn default() -> Self {
        Self {
            data: [None, None, None, None, None, None, None, None],
            enable: None,
            rs: None,
            rw: None,
            cs0: None,
            cs1: None,
            reset: None,
        }
    }
}

fn require<P>(line: Option<P>, name: &str) -> Result<P, DisplayError> {
    line.ok_or_else(|| DisplayError::Configuration(format!("missing '{}' line", name)))
}

impl<P> BusLines<P> {
    /// Check every required line is present
    pub fn verify(self) -> Result<BusPins<P>, DisplayError> {
        let enable = require(self.enable, "enable")?;
        let mut data = Vec::with_capacity(8);
        for (i, line) in self.data.into_iter().enumerate() {
            data.push(require(line, &format!("db{}", i))?);
        }
        let data: [P; 8] = data
            .try_into()
            .map_err(|_| DisplayError::Configuration("data bus needs 8 lines".to_string()))?;
        let cs0 = require(self.cs0, "cs0")?;
        let cs1 = require(self.cs1, "cs1")?;
        let rw = require(self.rw, "rw")?;
        let rs = require(self.rs, "rs")?;

        Ok(BusPins { data, enable, rs, rw, cs: [cs0, cs1], reset: self.reset })
    }
}

/// Synchronous byte writer for the two controllers.
///
/// At most one chip-select is ever asserted: switching panels deasserts the
/// old one before asserting the new one.
pub struct ParallelBus<P, D> {
    pins: BusPins<P>,
    delay: D,
    state: BusState,
}

impl<P, D> ParallelBus<P, D>
where
    P: OutputPin,
    D: DelayNs,
{
    /// Drive the idle levels: nothing selected, enable low, write direction
    pub fn new(pins: BusPins<P>, delay: D) -> Result<Self, DisplayError> {
        let mut bus = Self { pins, delay, state: BusState::default() };
        bus.deselect_all()?;
        bus.pins.enable.set_low().map_err(|e| DisplayError::gpio("enable", e))?;
        bus.pins.rw.set_low().map_err(|e| DisplayError::gpio("rw", e))?;
        Ok(bus)
    }

    pub fn state(&self) -> BusState { self.state }

    /// Pulse the reset line if one is wired
    pub fn reset(&mut self) -> Result<(), DisplayError> {
        let Some(reset) = self.pins.reset.as_mut() else {
            return Ok(());
        };
        debug!("pulsing reset");
        reset.set_low().map_err(|e| DisplayError::gpio("reset", e))?;
        self.delay.delay_us(RESET_PULSE_US);
        reset.set_high().map_err(|e| DisplayError::gpio("reset", e))?;
        self.delay.delay_ms(RESET_SETTLE_MS);
        Ok(())
    }

    /// Assert exactly one chip-select
    pub fn select(&mut self, panel: PanelId) -> Result<(), DisplayError> {
        let other = panel.other();
        self.pins.cs[other.index()]
            .set_high()
            .map_err(|e| DisplayError::gpio("chip select", e))?;
        self.pins.cs[panel.index()]
            .set_low()
            .map_err(|e| DisplayError::gpio("chip select", e))?;
        self.state.selected = Some(panel);
        Ok(())
    }

    /// Safe idle: no controller listening
    pub fn deselect_all(&mut self) -> Result<(), DisplayError> {
        for cs in self.pins.cs.iter_mut() {
            cs.set_high().map_err(|e| DisplayError::gpio("chip select", e))?;
        }
        self.state.selected = None;
        Ok(())
    }

    fn set_mode(&mut self, mode: Mode) -> Result<(), DisplayError> {
        let level = match mode {
            Mode::Command => PinState::Low,
            Mode::Data => PinState::High,
        };
        self.pins.rs.set_state(level).map_err(|e| DisplayError::gpio("rs", e))?;
        self.state.mode = Some(mode);
        Ok(())
    }

    pub fn write_command(&mut self, command: &Command) -> Result<(), DisplayError> {
        self.select(command.panel())?;
        self.set_mode(Mode::Command)?;
        self.write_bytes(command.panel(), command.opcodes())
    }

    pub fn write_command_byte(&mut self, panel: PanelId, instruction: Instruction) -> Result<(), DisplayError> {
        self.write_command(&Command::new(panel, &[instruction])?)
    }

    pub fn write_data(&mut self, panel: PanelId, bytes: &[u8]) -> Result<(), DisplayError> {
        self.select(panel)?;
        self.set_mode(Mode::Data)?;
        self.write_bytes(panel, bytes)
    }

    /// Put each byte on db0..db7 and pulse enable.
    /// chip-select and rs must already be set.
    fn write_bytes(&mut self, panel: PanelId, bytes: &[u8]) -> Result<(), DisplayError> {
        trace!("{} panel <- {:02X?}", panel, bytes);
        let fail = |written: usize, reason: String| DisplayError::BusWrite {
            panel,
            written,
            len: bytes.len(),
            reason,
        };

        self.pins.rw.set_low().map_err(|e| fail(0, format!("rw: {:?}", e)))?;

        for (written, &byte) in bytes.iter().enumerate() {
            for (bit, line) in self.pins.data.iter_mut().enumerate() {
                line.set_state(PinState::from(byte & (1 << bit) != 0))
                    .map_err(|e| fail(written, format!("db{}: {:?}", bit, e)))?;
            }
            self.pins.enable.set_high().map_err(|e| fail(written, format!("enable: {:?}", e)))?;
            self.delay.delay_us(LATCH_HOLD_US);
            self.pins.enable.set_low().map_err(|e| fail(written, format!("enable: {:?}", e)))?;
            self.delay.delay_us(LATCH_RECOVERY_US);
        }
        Ok(())
    }
}
