/*
 *  main.rs
 *
 *  AGM1264K - dual KS0108 framebuffer pipeline
 *  (c) 2020-26 Stuart Hunter
 *
 *  Demo front end: render a test pattern and push it through the pipeline
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
use std::path::Path;

use anyhow::Context;
use clap::Parser;
use env_logger::Env;
use log::{error, info};

use embedded_graphics::mono_font::ascii::FONT_6X10;
use embedded_graphics::mono_font::MonoTextStyle;
use embedded_graphics::pixelcolor::Rgb565;
use embedded_graphics::prelude::*;
use embedded_graphics::primitives::Rectangle;
use embedded_text::alignment::{HorizontalAlignment, VerticalAlignment};
use embedded_text::{style::TextBoxStyleBuilder, TextBox};
use linux_embedded_hal::gpio_cdev::{Chip, LineRequestFlags};
use linux_embedded_hal::{CdevPin, Delay};

use agm1264k::config::{self, BusConfig, Cli, Pattern, DEFAULT_GPIO_CHIP};
use agm1264k::display::drivers::mock::{lock_log, mock_bus, MockPanel};
use agm1264k::display::{
    Agm1264kDriver, BusLines, DisplayDriver, DisplayError, DriverOptions, ParallelBus, SourceFrame,
};

include!(concat!(env!("OUT_DIR"), "/build_info.rs"));

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let cfg = config::load(&cli)?;

    env_logger::Builder::from_env(Env::default().default_filter_or(cfg.log_level())).init();
    info!("agm1264k v{} built {}", env!("CARGO_PKG_VERSION"), BUILD_DATE);

    let options = cfg.driver_options()?;
    let mut frame = SourceFrame::new(&options.geometry, options.pixel_format);
    render_pattern(&mut frame, cli.pattern).unwrap_or_else(|never| match never {});
    info!("pattern {:?} on {}x{}", cli.pattern, frame.width(), frame.height());

    if cli.dry_run {
        return dry_run(options, &frame, cli.pbm.as_deref());
    }

    let bus_config = cfg.bus.clone().unwrap_or_default();
    let pins = open_lines(&bus_config)?
        .verify()
        .context("verifying bus lines")?;
    let bus = ParallelBus::new(pins, Delay).context("idling bus")?;
    let mut driver = Agm1264kDriver::new(bus, options);

    if let Err(e) = show(&mut driver, &frame) {
        error!("display update failed: {}", e);
        return Err(e.into());
    }
    info!("done");
    Ok(())
}

/// Bring up the controllers and push one full frame
fn show<D: DisplayDriver>(driver: &mut D, frame: &SourceFrame) -> Result<(), DisplayError> {
    driver.init()?;
    let (w, h) = driver.dimensions();
    driver.set_window(0, 0, w as usize - 1, h as usize - 1)?;
    driver.flush(frame.as_slice(), 0, frame.byte_len())
}

/// Same flow over recorded lines, then print what the controllers would show
fn dry_run(options: DriverOptions, frame: &SourceFrame, pbm: Option<&Path>) -> anyhow::Result<()> {
    let (pins, delay, log) = mock_bus(true);
    let bus = ParallelBus::new(pins, delay)?;
    let mut driver = Agm1264kDriver::new(bus, options);
    show(&mut driver, frame)?;

    let log = lock_log(&log);
    let panel = MockPanel::from_log(&log);
    info!(
        "dry run: {} latches, {} us of bus delay",
        log.latch_pulses().len(),
        log.total_delay_ns() / 1_000
    );
    print!("{}", panel.to_ascii(&options.geometry));

    if let Some(path) = pbm {
        let name = path.to_str().context("PBM path is not valid UTF-8")?;
        panel
            .save_to_pbm(name, &options.geometry)
            .with_context(|| format!("writing {}", name))?;
        info!("panel image saved to {}", name);
    }
    Ok(())
}

/// Claim every configured line as an output at its idle level
fn open_lines(bus: &BusConfig) -> anyhow::Result<BusLines<CdevPin>> {
    let path = bus.chip.as_deref().unwrap_or(DEFAULT_GPIO_CHIP);
    let mut chip = Chip::new(path).with_context(|| format!("opening GPIO chip {}", path))?;

    let mut request = |offset: Option<u32>, name: &str, idle: u8| -> anyhow::Result<Option<CdevPin>> {
        let Some(offset) = offset else {
            return Ok(None);
        };
        let handle = chip
            .get_line(offset)
            .with_context(|| format!("getting {} line {}", name, offset))?
            .request(LineRequestFlags::OUTPUT, idle, &format!("agm1264k-{}", name))
            .with_context(|| format!("requesting {} line {}", name, offset))?;
        let pin = CdevPin::new(handle).with_context(|| format!("creating {} pin", name))?;
        Ok(Some(pin))
    };

    let mut lines = BusLines::default();
    let data = bus.data.clone().unwrap_or_default();
    for (bit, slot) in lines.data.iter_mut().enumerate() {
        *slot = request(data.get(bit).copied(), &format!("db{}", bit), 0)?;
    }
    lines.enable = request(bus.enable, "enable", 0)?;
    lines.rs = request(bus.rs, "rs", 0)?;
    lines.rw = request(bus.rw, "rw", 0)?;
    // chip selects idle high
    lines.cs0 = request(bus.cs0, "cs0", 1)?;
    lines.cs1 = request(bus.cs1, "cs1", 1)?;
    lines.reset = request(bus.reset, "reset", 1)?;
    Ok(lines)
}

fn render_pattern(frame: &mut SourceFrame, pattern: Pattern) -> Result<(), Infallible> {
    let (w, h) = (frame.width() as u32, frame.height() as u32);
    match pattern {
        Pattern::Gradient => {
            for x in 0..w {
                let level = x * 255 / (w - 1).max(1);
                let color = Rgb565::new((level >> 3) as u8, (level >> 2) as u8, (level >> 3) as u8);
                frame.fill_solid(&Rectangle::new(Point::new(x as i32, 0), Size::new(1, h)), color)?;
            }
        }
        Pattern::Checker => {
            frame.clear(Rgb565::BLACK)?;
            for y in (0..h).step_by(8) {
                for x in (0..w).step_by(8) {
                    if (x / 8 + y / 8) % 2 == 0 {
                        frame.fill_solid(
                            &Rectangle::new(Point::new(x as i32, y as i32), Size::new(8, 8)),
                            Rgb565::WHITE,
                        )?;
                    }
                }
            }
        }
        Pattern::Gray => {
            frame.clear(Rgb565::new(16, 32, 16))?;
        }
        Pattern::Text => {
            frame.clear(Rgb565::BLACK)?;
            let character_style = MonoTextStyle::new(&FONT_6X10, Rgb565::WHITE);
            let textbox_style = TextBoxStyleBuilder::new()
                .alignment(HorizontalAlignment::Center)
                .vertical_alignment(VerticalAlignment::Middle)
                .build();
            TextBox::with_textbox_style(
                "AGM1264K-FL\ntwo KS0108 panels\nsplit at the middle",
                Rectangle::new(Point::zero(), Size::new(w, h)),
                character_style,
                textbox_style,
            )
            .draw(frame)?;
        }
    }
    Ok(())
}
