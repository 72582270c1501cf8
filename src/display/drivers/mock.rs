/*
 *  display/drivers/mock.rs
 *
 *  AGM1264K - dual KS0108 framebuffer pipeline
 *  (c) 2020-26 Stuart Hunter
 *
 *  Mock bus lines and controller model for testing without hardware
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

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{self, ErrorKind, ErrorType, OutputPin};

use crate::display::bus::{BusLines, BusPins, Instruction};
use crate::display::window::{Geometry, PanelId, MAX_PANEL_WIDTH, PAGE_HEIGHT};

/// Which physical line a mock stands in for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Line {
    Data(u8),
    Enable,
    Rs,
    Rw,
    /// 0 = left, 1 = right
    Cs(u8),
    Reset,
}

/// Everything the bus did, in order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BusEvent {
    Set { line: Line, high: bool },
    Delay { ns: u64 },
}

/// One enable pulse with the time spent high and the low time after it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LatchPulse {
    pub high_ns: u64,
    pub low_ns: u64,
}

/// Shared recorder behind every mock line and the mock delay.
///
/// Besides the event list it keeps the current level of each line and
/// notes whether both chip-selects were ever low at the same time.
#[derive(Debug, Default)]
pub struct LineLog {
    events: Vec<BusEvent>,
    levels: HashMap<Line, bool>,
    /// (line, sets left before the failing one)
    fail: Option<(Line, usize)>,
    both_selected_seen: bool,
}

pub type SharedLog = Arc<Mutex<LineLog>>;

/// Lock the log, taking it over if a holder panicked; the recorded
/// events stay valid either way
pub fn lock_log(log: &SharedLog) -> MutexGuard<'_, LineLog> {
    log.lock().unwrap_or_else(PoisonError::into_inner)
}

impl LineLog {
    fn record_set(&mut self, line: Line, high: bool) -> Result<(), MockLineError> {
        if let Some((target, left)) = self.fail {
            if target == line {
                if left <= 1 {
                    self.fail = None;
                    return Err(MockLineError(line));
                }
                self.fail = Some((target, left - 1));
            }
        }
        self.levels.insert(line, high);
        self.events.push(BusEvent::Set { line, high });
        if self.level(Line::Cs(0)) == Some(false) && self.level(Line::Cs(1)) == Some(false) {
            self.both_selected_seen = true;
        }
        Ok(())
    }

    /// Make the `nth` set of `line` from now fail, once
    pub fn fail_once(&mut self, line: Line, nth: usize) {
        self.fail = Some((line, nth.max(1)));
    }

    pub fn level(&self, line: Line) -> Option<bool> {
        self.levels.get(&line).copied()
    }

    pub fn events(&self) -> &[BusEvent] {
        &self.events
    }

    /// Forget the history, keep the line levels
    pub fn clear_events(&mut self) {
        self.events.clear();
    }

    pub fn both_selected_seen(&self) -> bool {
        self.both_selected_seen
    }

    pub fn total_delay_ns(&self) -> u64 {
        self.events
            .iter()
            .map(|e| match e {
                BusEvent::Delay { ns } => *ns,
                _ => 0,
            })
            .sum()
    }

    pub fn latch_pulses(&self) -> Vec<LatchPulse> {
        let mut pulses: Vec<LatchPulse> = Vec::new();
        let mut enable = false;
        let mut acc = 0u64;
        for event in &self.events {
            match *event {
                BusEvent::Delay { ns } => acc += ns,
                BusEvent::Set { line: Line::Enable, high } if high != enable => {
                    if high {
                        if let Some(last) = pulses.last_mut() {
                            last.low_ns = acc;
                        }
                    } else {
                        pulses.push(LatchPulse { high_ns: acc, low_ns: 0 });
                    }
                    enable = high;
                    acc = 0;
                }
                _ => {}
            }
        }
        if let Some(last) = pulses.last_mut() {
            last.low_ns = acc;
        }
        pulses
    }

    /// Data bus value at every falling edge of enable
    pub fn latched_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::new();
        replay(&self.events, |levels, _| bytes.push(levels.data));
        bytes
    }
}

/// Line levels seen at a latch edge
#[derive(Debug, Clone, Copy, Default)]
struct Latch {
    data: u8,
    rs: bool,
    rw: bool,
    cs: [bool; 2],
}

/// Walk the events calling `on_latch` at each falling edge of enable
fn replay(events: &[BusEvent], mut on_latch: impl FnMut(Latch, usize)) {
    let mut latch = Latch { cs: [true, true], ..Latch::default() };
    let mut enable = false;
    for (i, event) in events.iter().enumerate() {
        let BusEvent::Set { line, high } = *event else { continue };
        match line {
            Line::Data(bit) => {
                if high {
                    latch.data |= 1 << bit;
                } else {
                    latch.data &= !(1 << bit);
                }
            }
            Line::Rs => latch.rs = high,
            Line::Rw => latch.rw = high,
            Line::Cs(n) => latch.cs[n as usize & 1] = high,
            Line::Enable => {
                if enable && !high {
                    on_latch(latch, i);
                }
                enable = high;
            }
            Line::Reset => {}
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MockLineError(pub Line);

impl digital::Error for MockLineError {
    fn kind(&self) -> ErrorKind {
        ErrorKind::Other
    }
}

/// Output line that records into the shared log
#[derive(Debug, Clone)]
pub struct MockLine {
    line: Line,
    log: SharedLog,
}

impl MockLine {
    pub fn new(line: Line, log: SharedLog) -> Self {
        Self { line, log }
    }
}

impl ErrorType for MockLine {
    type Error = MockLineError;
}

impl OutputPin for MockLine {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        lock_log(&self.log).record_set(self.line, false)
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        lock_log(&self.log).record_set(self.line, true)
    }
}

/// Delay that returns immediately and records how long it should have been
#[derive(Debug, Clone)]
pub struct MockDelay {
    log: SharedLog,
}

impl DelayNs for MockDelay {
    fn delay_ns(&mut self, ns: u32) {
        lock_log(&self.log).events.push(BusEvent::Delay { ns: ns as u64 });
    }
}

/// Unverified line set with every line present
pub fn mock_lines(with_reset: bool) -> (BusLines<MockLine>, MockDelay, SharedLog) {
    let log: SharedLog = Arc::new(Mutex::new(LineLog::default()));
    let line = |l: Line| Some(MockLine::new(l, Arc::clone(&log)));
    let lines = BusLines {
        data: std::array::from_fn(|bit| line(Line::Data(bit as u8))),
        enable: line(Line::Enable),
        rs: line(Line::Rs),
        rw: line(Line::Rw),
        cs0: line(Line::Cs(0)),
        cs1: line(Line::Cs(1)),
        reset: if with_reset { line(Line::Reset) } else { None },
    };
    let delay = MockDelay { log: Arc::clone(&log) };
    (lines, delay, log)
}

/// Fully wired mock pins
pub fn mock_bus(with_reset: bool) -> (BusPins<MockLine>, MockDelay, SharedLog) {
    let (lines, delay, log) = mock_lines(with_reset);
    match lines.verify() {
        Ok(pins) => (pins, delay, log),
        Err(e) => unreachable!("mock lines are complete: {}", e),
    }
}

/// Controller state for one KS0108
#[derive(Debug, Clone)]
pub struct MockController {
    pub ram: [[u8; MAX_PANEL_WIDTH]; 8],
    pub column: usize,
    pub page: usize,
    pub display_on: bool,
    pub start_line: u8,
    pub bytes_received: usize,
}

impl Default for MockController {
    fn default() -> Self {
        Self {
            ram: [[0; MAX_PANEL_WIDTH]; 8],
            column: 0,
            page: 0,
            display_on: false,
            start_line: 0,
            bytes_received: 0,
        }
    }
}

impl MockController {
    fn latch(&mut self, latch: &Latch) {
        if latch.rs {
            self.ram[self.page][self.column] = latch.data;
            self.column = (self.column + 1) % MAX_PANEL_WIDTH;
            self.bytes_received += 1;
            return;
        }
        match Instruction::decode(latch.data) {
            Some(Instruction::DisplayOn(on)) => self.display_on = on,
            Some(Instruction::SetColumn(col)) => self.column = col as usize,
            Some(Instruction::SetPage(page)) => self.page = page as usize,
            Some(Instruction::SetStartLine(line)) => self.start_line = line,
            None => {}
        }
    }
}

/// Software model of both controllers, rebuilt from recorded bus traffic
#[derive(Debug, Clone, Default)]
pub struct MockPanel {
    pub controllers: [MockController; 2],
    /// latches seen with both chip-selects asserted
    pub contention: usize,
}

impl MockPanel {
    pub fn from_log(log: &LineLog) -> Self {
        let mut panel = MockPanel::default();
        panel.apply(log.events());
        panel
    }

    /// Feed more traffic into the model
    pub fn apply(&mut self, events: &[BusEvent]) {
        replay(events, |latch, _| {
            // reads are ignored, the model is write-only
            if latch.rw {
                return;
            }
            if !latch.cs[0] && !latch.cs[1] {
                self.contention += 1;
            }
            for (n, controller) in self.controllers.iter_mut().enumerate() {
                if !latch.cs[n] {
                    controller.latch(&latch);
                }
            }
        });
    }

    pub fn controller(&self, panel: PanelId) -> &MockController {
        &self.controllers[panel.index()]
    }

    /// Bit state at a combined-display coordinate
    pub fn pixel(&self, geometry: &Geometry, x: usize, y: usize) -> bool {
        let boundary = geometry.boundary();
        let (panel, col) = if x < boundary { (0, x) } else { (1, x - boundary) };
        self.controllers[panel].ram[y / PAGE_HEIGHT][col] & (1 << (y % PAGE_HEIGHT)) != 0
    }

    /// Rows of '#' (bit set) and '.' for eyeballing in logs
    pub fn to_ascii(&self, geometry: &Geometry) -> String {
        let (width, height) = (geometry.total_width(), geometry.height());
        let mut out = String::with_capacity((width + 1) * height);
        for y in 0..height {
            for x in 0..width {
                out.push(if self.pixel(geometry, x, y) { '#' } else { '.' });
            }
            out.push('\n');
        }
        out
    }

    /// Save to PBM file (for visual debugging)
    pub fn save_to_pbm(&self, path: &str, geometry: &Geometry) -> std::io::Result<()> {
        use std::fs::File;
        use std::io::Write;

        let mut file = File::create(path)?;
        writeln!(file, "P1")?;
        writeln!(file, "{} {}", geometry.total_width(), geometry.height())?;
        for y in 0..geometry.height() {
            let row: Vec<&str> = (0..geometry.total_width())
                .map(|x| if self.pixel(geometry, x, y) { "1" } else { "0" })
                .collect();
            writeln!(file, "{}", row.join(" "))?;
        }
        Ok(())
    }
}
