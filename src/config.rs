//! Run configuration and the command line that produces it.

use std::path::PathBuf;

use structopt::StructOpt;
use thiserror::Error;

use crate::emulator::output::{ColorScheme, Palette, Rgb};
use crate::emulator::scheduler::MIN_IPS;
use crate::emulator::tone::DEFAULT_VOLUME;

pub const DEFAULT_IPS: u32 = 600;
pub const DEFAULT_PIXEL_SCALE: u32 = 16;
pub const MAX_PIXEL_SCALE: u32 = 1000;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("instructions per second must be at least {min}, got {ips}")]
    Ips { ips: u32, min: u32 },

    #[error("pixel scale must be between 1 and {max}, got {scale}")]
    PixelScale { scale: u32, max: u32 },

    #[error("volume must be between 0 and 1, got {0}")]
    Volume(f32),
}

/// Everything the runners need to know besides the program itself.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub ips: u32,
    pub pixel_scale: u32,
    pub volume: f32,
    pub palette: Palette,
    pub debug: bool,
    pub audio_device: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            ips: DEFAULT_IPS,
            pixel_scale: DEFAULT_PIXEL_SCALE,
            volume: DEFAULT_VOLUME,
            palette: Palette::default(),
            debug: false,
            audio_device: None,
        }
    }
}

impl Config {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.ips < MIN_IPS {
            return Err(ConfigError::Ips {
                ips: self.ips,
                min: MIN_IPS,
            });
        }
        if self.pixel_scale < 1 || self.pixel_scale > MAX_PIXEL_SCALE {
            return Err(ConfigError::PixelScale {
                scale: self.pixel_scale,
                max: MAX_PIXEL_SCALE,
            });
        }
        if !(0.0..=1.0).contains(&self.volume) {
            return Err(ConfigError::Volume(self.volume));
        }
        Ok(())
    }
}

/// The program options.
#[derive(Debug, StructOpt)]
pub struct Opt {
    /// The program to execute
    #[structopt(parse(from_os_str))]
    pub input: PathBuf,

    /// Instructions executed per second, at least 60
    #[structopt(long, default_value = "600")]
    pub ips: u32,

    /// Size of one CHIP-8 pixel in rendered pixels
    #[structopt(long, default_value = "16")]
    pub pixel_scale: u32,

    /// Output volume between 0 and 1
    #[structopt(long, default_value = "0.1")]
    pub volume: f32,

    /// Named colour scheme: classic, inverted, amber or green
    #[structopt(long)]
    pub scheme: Option<ColorScheme>,

    /// Background colour as RRGGBB, overrides the scheme
    #[structopt(long)]
    pub background: Option<Rgb>,

    /// Foreground colour as RRGGBB, overrides the scheme
    #[structopt(long)]
    pub foreground: Option<Rgb>,

    /// Start in the step debugger
    #[structopt(short, long)]
    pub debug: bool,

    /// Preferred audio output device
    #[structopt(long)]
    pub audio_device: Option<String>,
}

impl Opt {
    /// Build a validated `Config` from the parsed options.
    pub fn config(&self) -> Result<Config, ConfigError> {
        let mut palette = self.scheme.map(ColorScheme::palette).unwrap_or_default();
        if let Some(background) = self.background {
            palette.background = background;
        }
        if let Some(foreground) = self.foreground {
            palette.foreground = foreground;
        }

        let config = Config {
            ips: self.ips,
            pixel_scale: self.pixel_scale,
            volume: self.volume,
            palette,
            debug: self.debug,
            audio_device: self.audio_device.clone(),
        };
        config.validate()?;
        Ok(config)
    }
}
