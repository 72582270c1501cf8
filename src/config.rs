use clap::{ArgAction, Parser, ValueHint};
use dirs_next::home_dir;
use std::{fs, path::{Path, PathBuf}};
use thiserror::Error;

use crate::display::color::PixelFormat;
use crate::display::dither::ConversionMode;
use crate::display::drivers::agm1264k::DriverOptions;
use crate::display::window::{Geometry, MAX_PANEL_HEIGHT, MAX_PANEL_WIDTH, PAGE_HEIGHT};

/// Error type for config loading/validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Validation error: {0}")]
    Validation(String),
}

/// Top-level app configuration.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, Default)]
pub struct Config {
    pub log_level: Option<String>,     // e.g., "info" | "debug"
    /// display geometry & pixel handling
    pub display: Option<DisplayConfig>,
    /// GPIO wiring
    pub bus: Option<BusConfig>,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, Default)]
pub struct DisplayConfig {
    pub width: Option<u32>,         // both panels
    pub height: Option<u32>,
    pub invert: Option<bool>,       // negative image
    pub mode: Option<ConversionMode>,
    pub pixel_format: Option<PixelFormat>,
}

/// Line offsets on a GPIO character device
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, Default)]
pub struct BusConfig {
    pub chip: Option<String>,       // e.g. "/dev/gpiochip0"
    pub data: Option<Vec<u32>>,     // db0..db7
    pub enable: Option<u32>,
    pub rs: Option<u32>,
    pub rw: Option<u32>,
    pub cs0: Option<u32>,
    pub cs1: Option<u32>,
    pub reset: Option<u32>,
}

pub const DEFAULT_GPIO_CHIP: &str = "/dev/gpiochip0";

/// Demo image drawn by the binary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum Pattern {
    #[default]
    Gradient,
    Checker,
    Gray,
    Text,
}

/// CLI overrides. All fields are Options so we can layer them over YAML.
#[derive(Debug, Parser, Clone, Default)]
#[command(name = "agm1264k", about = "AGM1264K-FL dual KS0108 framebuffer", disable_help_flag = false)]
pub struct Cli {
    /// Path to a YAML config file (overrides search)
    #[arg(long, value_hint = ValueHint::FilePath)]
    pub config: Option<PathBuf>,
    #[arg(long)]
    pub log_level: Option<String>,
    #[arg(long)]
    pub display_width: Option<u32>,
    #[arg(long)]
    pub display_height: Option<u32>,
    #[arg(long, action = ArgAction::Set)]
    pub display_invert: Option<bool>,
    #[arg(long, value_enum)]
    pub mode: Option<ConversionMode>,
    #[arg(long, value_enum)]
    pub pixel_format: Option<PixelFormat>,
    #[arg(long, value_hint = ValueHint::FilePath)]
    pub gpio_chip: Option<String>,
    /// image to render
    #[arg(long, value_enum, default_value_t = Pattern::Gradient)]
    pub pattern: Pattern,
    /// run against mock lines and print the panel contents
    #[arg(long, action = ArgAction::SetTrue)]
    pub dry_run: bool,
    /// with --dry-run, also save the panel image as PBM
    #[arg(long, value_hint = ValueHint::FilePath)]
    pub pbm: Option<PathBuf>,
    /// dump fully merged config (after overrides) and exit
    #[arg(long, action = ArgAction::SetTrue)]
    pub dump_config: bool,
}

/// Public entry point: read YAML, merge the parsed command line, validate.
pub fn load(cli: &Cli) -> Result<Config, ConfigError> {
    // 1) defaults (from `Default` impl)
    let mut cfg = Config::default();

    // 2) YAML file (explicit path or search)
    if let Some(p) = cli.config.as_ref() {
        if p.exists() {
            let y = read_yaml(p)?;
            merge(&mut cfg, y);
        } else {
            return Err(ConfigError::Validation(format!(
                "Config file not found: {}",
                p.display()
            )));
        }
    } else if let Some(p) = find_config_file() {
        let y = read_yaml(&p)?;
        merge(&mut cfg, y);
    }

    // 3) CLI overrides (highest precedence)
    apply_cli_overrides(&mut cfg, cli);

    // 4) Validate
    validate(&cfg)?;

    if cli.dump_config {
        // Pretty YAML of effective config (nice for debugging)
        let s = serde_yaml::to_string(&cfg)?;
        println!("{s}");
        std::process::exit(0);
    }

    Ok(cfg)
}

/// Try common locations in order (first hit wins).
fn find_config_file() -> Option<PathBuf> {
    // XDG-style: ~/.config/agm1264k/config.yaml
    if let Some(home) = home_dir() {
        let p = home.join(".config/agm1264k/config.yaml");
        if p.exists() { return Some(p) }
        let p = home.join(".config/agm1264k.yaml");
        if p.exists() { return Some(p) }
    }
    // project local
    for candidate in &["agm1264k.yaml", "config.yaml", "config/agm1264k.yaml"] {
        let p = PathBuf::from(candidate);
        if p.exists() { return Some(p) }
    }
    None
}

fn read_yaml(path: &Path) -> Result<Config, ConfigError> {
    let s = fs::read_to_string(path)?;
    parse_yaml(&s)
}

pub fn parse_yaml(s: &str) -> Result<Config, ConfigError> {
    let cfg: Config = serde_yaml::from_str(s)?;
    Ok(cfg)
}

/// Shallow merge `src` into `dst`, Option-by-Option.
pub fn merge(dst: &mut Config, src: Config) {
    // top-level
    if src.log_level.is_some()      { dst.log_level = src.log_level; }
    // display
    match (&mut dst.display, src.display) {
        (None, Some(c)) => dst.display = Some(c),
        (Some(d), Some(s)) => merge_display(d, s),
        _ => {}
    }
    // bus
    match (&mut dst.bus, src.bus) {
        (None, Some(c)) => dst.bus = Some(c),
        (Some(d), Some(s)) => merge_bus(d, s),
        _ => {}
    }
}

fn merge_display(dst: &mut DisplayConfig, src: DisplayConfig) {
    if src.width.is_some()        { dst.width = src.width; }
    if src.height.is_some()       { dst.height = src.height; }
    if src.invert.is_some()       { dst.invert = src.invert; }
    if src.mode.is_some()         { dst.mode = src.mode; }
    if src.pixel_format.is_some() { dst.pixel_format = src.pixel_format; }
}

fn merge_bus(dst: &mut BusConfig, src: BusConfig) {
    if src.chip.is_some()   { dst.chip = src.chip; }
    if src.data.is_some()   { dst.data = src.data; }
    if src.enable.is_some() { dst.enable = src.enable; }
    if src.rs.is_some()     { dst.rs = src.rs; }
    if src.rw.is_some()     { dst.rw = src.rw; }
    if src.cs0.is_some()    { dst.cs0 = src.cs0; }
    if src.cs1.is_some()    { dst.cs1 = src.cs1; }
    if src.reset.is_some()  { dst.reset = src.reset; }
}

pub fn apply_cli_overrides(cfg: &mut Config, cli: &Cli) {
    if cli.log_level.is_some()       { cfg.log_level = cli.log_level.clone(); }
    let any_display = cli.display_width.is_some()
        || cli.display_height.is_some()
        || cli.display_invert.is_some()
        || cli.mode.is_some()
        || cli.pixel_format.is_some();

    if any_display && cfg.display.is_none() {
        cfg.display = Some(DisplayConfig::default());
    }
    if let Some(display) = cfg.display.as_mut() {
        if cli.display_width.is_some()   { display.width = cli.display_width; }
        if cli.display_height.is_some()  { display.height = cli.display_height; }
        if cli.display_invert.is_some()  { display.invert = cli.display_invert; }
        if cli.mode.is_some()            { display.mode = cli.mode; }
        if cli.pixel_format.is_some()    { display.pixel_format = cli.pixel_format; }
    }

    if let Some(chip) = cli.gpio_chip.as_ref() {
        cfg.bus.get_or_insert_with(BusConfig::default).chip = Some(chip.clone());
    }
}

/// Put any invariants here (required fields, ranges, etc.)
pub fn validate(cfg: &Config) -> Result<(), ConfigError> {
    if let Some(display) = cfg.display.as_ref() {
        if let Some(w) = display.width {
            if w == 0 || w % 2 != 0 || w as usize > 2 * MAX_PANEL_WIDTH {
                return Err(ConfigError::Validation(format!(
                    "display width must be even and at most {}", 2 * MAX_PANEL_WIDTH
                )));
            }
        }
        if let Some(h) = display.height {
            if h == 0 || h as usize % PAGE_HEIGHT != 0 || h as usize > MAX_PANEL_HEIGHT {
                return Err(ConfigError::Validation(format!(
                    "display height must be a multiple of {} up to {}", PAGE_HEIGHT, MAX_PANEL_HEIGHT
                )));
            }
        }
    }
    if let Some(bus) = cfg.bus.as_ref() {
        if let Some(data) = bus.data.as_ref() {
            if data.len() != 8 {
                return Err(ConfigError::Validation(format!(
                    "bus data needs 8 lines (db0..db7), got {}", data.len()
                )));
            }
        }
    }
    Ok(())
}

impl Config {
    /// Effective driver options with defaults filled in
    pub fn driver_options(&self) -> Result<DriverOptions, ConfigError> {
        let display = self.display.clone().unwrap_or_default();
        let geometry = Geometry::new(
            display.width.unwrap_or(2 * MAX_PANEL_WIDTH as u32) as usize,
            display.height.unwrap_or(MAX_PANEL_HEIGHT as u32) as usize,
        )
        .map_err(|e| ConfigError::Validation(e.to_string()))?;

        Ok(DriverOptions {
            geometry,
            pixel_format: display.pixel_format.unwrap_or_default(),
            mode: display.mode.unwrap_or_default(),
            invert: display.invert.unwrap_or(false),
        })
    }

    pub fn log_level(&self) -> &str {
        self.log_level.as_deref().unwrap_or("info")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
log_level: debug
display:
  width: 128
  height: 64
  invert: true
  mode: threshold
  pixel_format: rgb555
bus:
  chip: /dev/gpiochip1
  data: [2, 3, 4, 17, 27, 22, 10, 9]
  enable: 11
  rs: 5
  rw: 6
  cs0: 13
  cs1: 19
"#;

    #[test]
    fn test_parse_sample() {
        let cfg = parse_yaml(SAMPLE).unwrap();
        validate(&cfg).unwrap();
        let opts = cfg.driver_options().unwrap();
        assert!(opts.invert);
        assert_eq!(opts.mode, ConversionMode::Threshold);
        assert_eq!(opts.pixel_format, PixelFormat::Rgb555);
        assert_eq!(opts.geometry, Geometry::default());
        let bus = cfg.bus.unwrap();
        assert_eq!(bus.data.unwrap().len(), 8);
        assert_eq!(bus.reset, None);
        assert_eq!(cfg.log_level.as_deref(), Some("debug"));
    }

    #[test]
    fn test_defaults() {
        let cfg = Config::default();
        let opts = cfg.driver_options().unwrap();
        assert_eq!(opts, DriverOptions::default());
        assert_eq!(cfg.log_level(), "info");
    }

    #[test]
    fn test_merge_and_cli_precedence() {
        let mut cfg = Config::default();
        merge(&mut cfg, parse_yaml(SAMPLE).unwrap());
        merge(&mut cfg, parse_yaml("display:\n  invert: false\nbus:\n  reset: 26\n").unwrap());

        let display = cfg.display.as_ref().unwrap();
        assert_eq!(display.invert, Some(false));
        assert_eq!(display.mode, Some(ConversionMode::Threshold));
        assert_eq!(cfg.bus.as_ref().unwrap().reset, Some(26));
        assert_eq!(cfg.bus.as_ref().unwrap().enable, Some(11));

        let cli = Cli {
            mode: Some(ConversionMode::Dither),
            gpio_chip: Some("/dev/gpiochip4".to_string()),
            ..Cli::default()
        };
        apply_cli_overrides(&mut cfg, &cli);
        assert_eq!(cfg.display.as_ref().unwrap().mode, Some(ConversionMode::Dither));
        assert_eq!(cfg.bus.as_ref().unwrap().chip.as_deref(), Some("/dev/gpiochip4"));
    }

    #[test]
    fn test_validation() {
        let bad_height = parse_yaml("display:\n  height: 60\n").unwrap();
        assert!(validate(&bad_height).is_err());

        let bad_width = parse_yaml("display:\n  width: 256\n").unwrap();
        assert!(validate(&bad_width).is_err());

        let short_bus = parse_yaml("bus:\n  data: [1, 2, 3]\n").unwrap();
        assert!(matches!(validate(&short_bus), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn test_load_from_file_with_overrides() {
        let path = std::env::temp_dir().join(format!("agm1264k-config-{}.yaml", std::process::id()));
        fs::write(&path, SAMPLE).unwrap();
        let cli = Cli {
            config: Some(path.clone()),
            pixel_format: Some(PixelFormat::Rgb565),
            ..Cli::default()
        };
        let cfg = load(&cli);
        fs::remove_file(&path).unwrap();

        let opts = cfg.unwrap().driver_options().unwrap();
        assert_eq!(opts.pixel_format, PixelFormat::Rgb565);
        assert_eq!(opts.mode, ConversionMode::Threshold);

        let missing = Cli { config: Some(path), ..Cli::default() };
        assert!(matches!(load(&missing), Err(ConfigError::Validation(_))));
    }
}
