/*
 *  tests/display_integration.rs
 *
 *  Integration tests for the display pipeline over recorded bus lines
 *
 *  AGM1264K - dual KS0108 framebuffer pipeline
 *  (c) 2020-26 Stuart Hunter
 */

use agm1264k::display::drivers::mock::{mock_bus, mock_lines, Line, LineLog, MockDelay, MockLine, MockPanel, SharedLog};
use agm1264k::display::{
    Agm1264kDriver, ConversionMode, DisplayDriver, DisplayError, DriverOptions, Geometry, PanelId,
    ParallelBus, PixelFormat, SourceFrame,
};
use proptest::prelude::*;

const WHITE_565: u16 = 0xFFFF;
const MID_GREY_565: u16 = 0x8410;

/// Mid grey (intensity 58 after gamma) dithered over the whole 128x64 panel,
/// '#' for a set bit, one row per line
const MID_GREY_REFERENCE: &str = include_str!("fixtures/mid_grey_128x64.txt");

fn driver_with(options: DriverOptions) -> (Agm1264kDriver<MockLine, MockDelay>, SharedLog) {
    let (pins, delay, log) = mock_bus(true);
    let bus = ParallelBus::new(pins, delay).unwrap();
    (Agm1264kDriver::new(bus, options), log)
}

fn panel_of(log: &SharedLog) -> MockPanel {
    MockPanel::from_log(&log.lock().unwrap())
}

fn frame_of(raw: u16) -> SourceFrame {
    let mut frame = SourceFrame::new(&Geometry::default(), PixelFormat::Rgb565);
    frame.fill_raw(raw);
    frame
}

fn idle(log: &LineLog) -> bool {
    log.level(Line::Cs(0)) == Some(true)
        && log.level(Line::Cs(1)) == Some(true)
        && log.level(Line::Enable) == Some(false)
}

#[test]
fn test_init_leaves_bus_idle() {
    let (mut driver, log) = driver_with(DriverOptions::default());
    driver.init().unwrap();

    let log = log.lock().unwrap();
    assert!(idle(&log));
    assert_eq!(log.level(Line::Reset), Some(true));
    assert!(!log.both_selected_seen());
    for pulse in log.latch_pulses() {
        assert!(pulse.high_ns >= 5_000, "{:?}", pulse);
        assert!(pulse.low_ns >= 1_000, "{:?}", pulse);
    }
}

#[test]
fn test_mid_grey_full_frame_matches_reference() {
    let (mut driver, log) = driver_with(DriverOptions::default());
    let frame = frame_of(MID_GREY_565);
    driver.flush(frame.as_slice(), 0, frame.byte_len()).unwrap();

    let panel = panel_of(&log);
    let image = panel.to_ascii(&Geometry::default());
    for (y, (got, want)) in image.lines().zip(MID_GREY_REFERENCE.lines()).enumerate() {
        assert_eq!(got, want, "row {}", y);
    }
    assert_eq!(image, MID_GREY_REFERENCE);

    let left = panel.controller(PanelId::Left);
    let right = panel.controller(PanelId::Right);
    assert_eq!(
        left.ram[0][..16],
        [0x00, 0x54, 0x02, 0x20, 0x92, 0x08, 0x42, 0x10, 0x8A, 0x40, 0x12, 0x88, 0x42, 0x10, 0x8A, 0x40]
    );
    assert_eq!(
        right.ram[7][..16],
        [0x04, 0xA2, 0x10, 0x04, 0xA2, 0x10, 0x04, 0xA2, 0x10, 0x04, 0xA2, 0x10, 0x04, 0xA2, 0x10, 0x04]
    );

    let lit: u32 = panel
        .controllers
        .iter()
        .flat_map(|c| c.ram.iter().flatten())
        .map(|b| b.count_ones())
        .sum();
    assert_eq!(lit, 1805);
    assert_eq!(driver.plane().as_slice().iter().filter(|&&v| v == 255).count(), 1805);

    // 8 pages x 2 panels, 3 command bytes + 64 data bytes each
    assert_eq!(log.lock().unwrap().latch_pulses().len(), 16 * 67);
}

#[test]
fn test_window_split_across_boundary() {
    let (mut driver, log) = driver_with(DriverOptions::default());
    let frame = frame_of(WHITE_565);
    driver.set_window(30, 16, 70, 31).unwrap();
    driver.flush(frame.as_slice(), 0, frame.byte_len()).unwrap();

    let panel = panel_of(&log);
    let left = panel.controller(PanelId::Left);
    let right = panel.controller(PanelId::Right);
    for page in 2..=3 {
        assert_eq!(left.ram[page][29], 0x00);
        assert!(left.ram[page][30..].iter().all(|&b| b == 0xFF));
        assert!(right.ram[page][..=6].iter().all(|&b| b == 0xFF));
        assert_eq!(right.ram[page][7], 0x00);
    }
    assert!(left.ram[1].iter().all(|&b| b == 0));
    assert!(right.ram[4].iter().all(|&b| b == 0));
    assert_eq!(left.bytes_received, 34 * 2);
    assert_eq!(right.bytes_received, 7 * 2);
    assert_eq!(panel.contention, 0);
}

#[test]
fn test_window_bytes_match_full_frame() {
    let frame = frame_of(MID_GREY_565);

    let (mut full, full_log) = driver_with(DriverOptions::default());
    full.flush(frame.as_slice(), 0, frame.byte_len()).unwrap();

    let (mut windowed, win_log) = driver_with(DriverOptions::default());
    windowed.set_window(30, 16, 70, 31).unwrap();
    windowed.flush(frame.as_slice(), 0, frame.byte_len()).unwrap();

    let full_panel = panel_of(&full_log);
    let win_panel = panel_of(&win_log);
    for panel in PanelId::ALL {
        for page in 2..=3 {
            let span = match panel {
                PanelId::Left => 30..64,
                PanelId::Right => 0..7,
            };
            assert_eq!(
                win_panel.controller(panel).ram[page][span.clone()],
                full_panel.controller(panel).ram[page][span]
            );
        }
    }
    assert_eq!(win_panel.controller(PanelId::Left).ram[2][30..34], [0x04, 0x41, 0x28, 0x04]);
    assert_eq!(win_panel.controller(PanelId::Right).ram[3][..4], [0x10, 0x8A, 0x41, 0x10]);
}

#[test]
fn test_failed_transfer_does_not_stop_the_rest() {
    let (mut driver, log) = driver_with(DriverOptions::default());
    let frame = frame_of(WHITE_565);

    // transfer 0 (left page 0) uses enable sets 1..=134; set 161 raises
    // enable for data byte 10 of transfer 1 (right page 0)
    log.lock().unwrap().fail_once(Line::Enable, 161);
    let err = driver.flush(frame.as_slice(), 0, frame.byte_len()).unwrap_err();
    match err {
        DisplayError::BusWrite { panel, written, len, .. } => {
            assert_eq!(panel, PanelId::Right);
            assert_eq!(written, 10);
            assert_eq!(len, 64);
        }
        other => panic!("unexpected error {:?}", other),
    }

    {
        let log = log.lock().unwrap();
        assert!(idle(&log));
        let panel = MockPanel::from_log(&log);
        let right = panel.controller(PanelId::Right);
        assert!(right.ram[0][..10].iter().all(|&b| b == 0xFF));
        assert!(right.ram[0][10..].iter().all(|&b| b == 0x00));
        assert!(right.ram[1..].iter().flatten().all(|&b| b == 0xFF));
        assert!(panel.controller(PanelId::Left).ram.iter().flatten().all(|&b| b == 0xFF));
    }

    // the next full flush repairs it
    driver.flush(frame.as_slice(), 0, frame.byte_len()).unwrap();
    let panel = panel_of(&log);
    for id in PanelId::ALL {
        assert!(panel.controller(id).ram.iter().flatten().all(|&b| b == 0xFF));
    }
}

#[test]
fn test_threshold_and_invert_from_options() {
    let options = DriverOptions { mode: ConversionMode::Threshold, invert: true, ..Default::default() };
    let (mut driver, log) = driver_with(options);
    let frame = frame_of(MID_GREY_565);
    driver.flush(frame.as_slice(), 0, frame.byte_len()).unwrap();

    // grey thresholds to black, inverted to set bits
    let panel = panel_of(&log);
    for id in PanelId::ALL {
        assert!(panel.controller(id).ram.iter().flatten().all(|&b| b == 0xFF));
    }
}

#[test]
fn test_missing_line_is_a_configuration_error() {
    let (mut lines, _delay, _log) = mock_lines(false);
    lines.cs1 = None;
    match lines.verify() {
        Err(DisplayError::Configuration(msg)) => assert!(msg.contains("cs1")),
        Err(other) => panic!("unexpected error {:?}", other),
        Ok(_) => panic!("verify accepted a missing chip-select"),
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_chip_selects_never_both_asserted(
        writes in prop::collection::vec((any::<bool>(), any::<bool>(), prop::collection::vec(any::<u8>(), 0..8)), 1..24)
    ) {
        let (pins, delay, log) = mock_bus(false);
        let mut bus = ParallelBus::new(pins, delay).unwrap();
        for (right, data, bytes) in &writes {
            let panel = if *right { PanelId::Right } else { PanelId::Left };
            if *data {
                bus.write_data(panel, bytes).unwrap();
            } else {
                bus.write_command_byte(panel, agm1264k::display::Instruction::SetColumn(bytes.len() as u8)).unwrap();
            }
            prop_assert_eq!(bus.state().selected, Some(panel));
        }
        bus.deselect_all().unwrap();

        let log = log.lock().unwrap();
        prop_assert!(!log.both_selected_seen());
        prop_assert!(idle(&log));
        prop_assert_eq!(MockPanel::from_log(&log).contention, 0);
    }

    #[test]
    fn prop_any_window_flushes_cleanly(
        xs in 0usize..128, w in 0usize..128, ys in 0usize..64, h in 0usize..64, raw in any::<u16>()
    ) {
        let xe = (xs + w).min(127);
        let ye = (ys + h).min(63);
        let (mut driver, log) = driver_with(DriverOptions::default());
        let frame = frame_of(raw);
        driver.set_window(xs, ys, xe, ye).unwrap();
        driver.flush(frame.as_slice(), 0, frame.byte_len()).unwrap();

        let log = log.lock().unwrap();
        prop_assert!(idle(&log));
        prop_assert!(!log.both_selected_seen());
        let panel = MockPanel::from_log(&log);
        let cols = xe - xs + 1;
        let pages = ye / 8 - ys / 8 + 1;
        let received: usize = panel.controllers.iter().map(|c| c.bytes_received).sum();
        prop_assert_eq!(received, cols * pages);
    }
}
