use std::fmt;
use std::str::FromStr;

use crate::emulator::display::{Display, SCREEN_HEIGHT, SCREEN_WIDTH};

/// Represents a screen that frames can be presented on.
/// Only called when the display has changed since the last frame.
pub trait EmulatorOutput {
    fn present(&mut self, display: &Display);
}

/// A simple output device that keeps track of presented frames.
pub struct DummyOutput {
    frames: usize,
    last: Option<Display>,
}

impl DummyOutput {
    pub fn new() -> DummyOutput {
        DummyOutput {
            frames: 0,
            last: None,
        }
    }

    /// Number of frames presented so far.
    pub fn frames(&self) -> usize {
        self.frames
    }

    pub fn last_frame(&self) -> Option<&Display> {
        self.last.as_ref()
    }
}

impl Default for DummyOutput {
    fn default() -> Self {
        Self::new()
    }
}

impl EmulatorOutput for DummyOutput {
    fn present(&mut self, display: &Display) {
        self.frames += 1;
        self.last = Some(display.clone());
    }
}

/// A 24-bit colour, stored as `0x00RRGGBB`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgb(pub u32);

impl Rgb {
    pub fn components(self) -> (u8, u8, u8) {
        ((self.0 >> 16) as u8, (self.0 >> 8) as u8, self.0 as u8)
    }
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:06X}", self.0)
    }
}

impl FromStr for Rgb {
    type Err = String;

    /// Parse `RRGGBB`, optionally prefixed by `#` or `0x`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let hex = s.trim_start_matches('#').trim_start_matches("0x");
        if hex.len() != 6 {
            return Err(format!("expected six hex digits, got {:?}", s));
        }
        u32::from_str_radix(hex, 16)
            .map(Rgb)
            .map_err(|e| format!("{:?}: {}", s, e))
    }
}

/// Background and foreground colours used when a frame is turned into pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Palette {
    pub background: Rgb,
    pub foreground: Rgb,
}

impl Palette {
    /// Produce a row-major pixel buffer of `(64 * scale) x (32 * scale)` colours.
    pub fn render(&self, display: &Display, scale: usize) -> Vec<u32> {
        let scale = scale.max(1);
        let width = SCREEN_WIDTH * scale;
        let mut pixels = Vec::with_capacity(width * SCREEN_HEIGHT * scale);
        for row in display.rows() {
            let start = pixels.len();
            for on in row.iter() {
                let color = if *on { self.foreground } else { self.background };
                pixels.extend(std::iter::repeat(color.0).take(scale));
            }
            let line = pixels[start..start + width].to_vec();
            for _ in 1..scale {
                pixels.extend_from_slice(&line);
            }
        }
        pixels
    }
}

impl Default for Palette {
    fn default() -> Self {
        ColorScheme::Classic.palette()
    }
}

/// Named colour schemes selectable instead of explicit colours.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorScheme {
    Classic,
    Inverted,
    Amber,
    Green,
}

impl ColorScheme {
    pub fn palette(self) -> Palette {
        let (background, foreground) = match self {
            ColorScheme::Classic => (0x000000, 0xFFFFFF),
            ColorScheme::Inverted => (0xFFFFFF, 0x000000),
            ColorScheme::Amber => (0x1A1000, 0xFFB000),
            ColorScheme::Green => (0x0A1A0A, 0x33FF66),
        };
        Palette {
            background: Rgb(background),
            foreground: Rgb(foreground),
        }
    }
}

impl FromStr for ColorScheme {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "classic" => Ok(ColorScheme::Classic),
            "inverted" => Ok(ColorScheme::Inverted),
            "amber" => Ok(ColorScheme::Amber),
            "green" => Ok(ColorScheme::Green),
            _ => Err(format!("unknown colour scheme {:?}", s)),
        }
    }
}

#[cfg(test)]
mod tests {

    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn parses_colors() {
        assert_eq!("#FFB000".parse::<Rgb>(), Ok(Rgb(0xFFB000)));
        assert_eq!("0x102030".parse::<Rgb>(), Ok(Rgb(0x102030)));
        assert_eq!("102030".parse::<Rgb>().map(Rgb::components), Ok((0x10, 0x20, 0x30)));
        assert!("fff".parse::<Rgb>().is_err());
        assert!("gggggg".parse::<Rgb>().is_err());
        assert_eq!(Rgb(0xABCDEF).to_string(), "#ABCDEF");
    }

    #[test]
    fn parses_schemes() {
        assert_eq!("Amber".parse::<ColorScheme>(), Ok(ColorScheme::Amber));
        assert!("plaid".parse::<ColorScheme>().is_err());
        assert_eq!(Palette::default(), ColorScheme::Classic.palette());
    }

    #[test]
    fn render_scales_pixels() {
        let mut display = Display::new();
        display.draw_sprite(0, 0, &[0x80]);
        let palette = ColorScheme::Amber.palette();
        let pixels = palette.render(&display, 2);
        let width = SCREEN_WIDTH * 2;
        assert_eq!(pixels.len(), width * SCREEN_HEIGHT * 2);
        for &(x, y) in &[(0, 0), (1, 0), (0, 1), (1, 1)] {
            assert_eq!(pixels[y * width + x], palette.foreground.0);
        }
        assert_eq!(pixels[2], palette.background.0);
        assert_eq!(pixels[2 * width], palette.background.0);
    }

    #[test]
    fn dummy_output_records_frames() {
        let mut output = DummyOutput::new();
        let display = Display::new();
        output.present(&display);
        output.present(&display);
        assert_eq!(output.frames(), 2);
        assert!(output.last_frame().is_some());
    }
}
