//! The 64x32 monochrome framebuffer that sprites are XOR-composited onto.

use std::fmt;

pub const SCREEN_WIDTH: usize = 64;
pub const SCREEN_HEIGHT: usize = 32;
type Screen = [[bool; SCREEN_WIDTH]; SCREEN_HEIGHT];
const EMPTY_SCREEN: Screen = [[false; SCREEN_WIDTH]; SCREEN_HEIGHT];

/// Row-major bitmap plus the changed-flag owed to the renderer.
#[derive(Clone)]
pub struct Display {
    screen: Screen,
    changed: bool,
}

impl Display {
    pub fn new() -> Display {
        Display {
            screen: EMPTY_SCREEN,
            changed: false,
        }
    }

    /// Unset every pixel.
    pub fn clear(&mut self) {
        self.screen = EMPTY_SCREEN;
        self.changed = true;
    }

    pub fn get(&self, x: usize, y: usize) -> bool {
        self.screen[y % SCREEN_HEIGHT][x % SCREEN_WIDTH]
    }

    pub fn rows(&self) -> impl Iterator<Item = &[bool; SCREEN_WIDTH]> {
        self.screen.iter()
    }

    /// XOR an 8-pixel wide sprite onto the screen with its top left corner at `(x, y)`.
    /// Placement is toroidal, so rows and columns past the edge wrap around.
    ///
    /// Returns true if any set pixel was unset.
    pub fn draw_sprite(&mut self, x: u8, y: u8, sprite: &[u8]) -> bool {
        let mut any_collisions = false;
        for (dy, row) in sprite.iter().enumerate() {
            let py = (y as usize + dy) % SCREEN_HEIGHT;
            for dx in 0..8 {
                let new_pixel = (row >> (7 - dx)) & 1 == 1;
                if !new_pixel {
                    continue;
                }
                let px = (x as usize + dx) % SCREEN_WIDTH;
                let old_pixel = &mut self.screen[py][px];
                if *old_pixel {
                    any_collisions = true;
                }
                *old_pixel = !*old_pixel;
                self.changed = true;
            }
        }
        any_collisions
    }

    pub fn is_changed(&self) -> bool {
        self.changed
    }

    /// Check and clear the changed-flag.
    pub fn take_changed(&mut self) -> bool {
        std::mem::replace(&mut self.changed, false)
    }
}

impl Default for Display {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for Display {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for row in &self.screen {
            for c in row.iter() {
                write!(f, "{}", if *c { "#" } else { "." })?;
            }
            writeln!(f)?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {

    use super::*;
    use pretty_assertions::assert_eq;

    fn lit(display: &Display) -> Vec<(usize, usize)> {
        let mut pixels = Vec::new();
        for (y, row) in display.rows().enumerate() {
            for (x, on) in row.iter().enumerate() {
                if *on {
                    pixels.push((x, y));
                }
            }
        }
        pixels
    }

    #[test]
    fn clear_screen_clears_screen() {
        let mut display = Display::new();
        display.draw_sprite(10, 10, &[0xFF, 0xFF]);
        display.take_changed();
        display.clear();
        assert!(lit(&display).is_empty());
        assert!(display.is_changed());
    }

    #[test]
    fn sprite_is_xored_and_collides() {
        let mut display = Display::new();
        assert_eq!(display.draw_sprite(0, 0, &[0xFF]), false);
        assert_eq!(lit(&display), (0..8).map(|x| (x, 0)).collect::<Vec<_>>());

        assert_eq!(display.draw_sprite(0, 0, &[0xFF]), true);
        assert!(lit(&display).is_empty());
    }

    #[test]
    fn sprite_wraps_horizontally() {
        let mut display = Display::new();
        display.draw_sprite(60, 0, &[0xFF]);
        assert_eq!(
            lit(&display),
            vec![(0, 0), (1, 0), (2, 0), (3, 0), (60, 0), (61, 0), (62, 0), (63, 0)]
        );
    }

    #[test]
    fn sprite_wraps_vertically() {
        let mut display = Display::new();
        display.draw_sprite(0, 31, &[0x80, 0x80]);
        assert_eq!(lit(&display), vec![(0, 0), (0, 31)]);
    }

    #[test]
    fn collision_is_reported_even_if_later_rows_are_clean() {
        let mut display = Display::new();
        display.draw_sprite(0, 0, &[0x80]);
        assert!(display.draw_sprite(0, 0, &[0x80, 0x40, 0x20]));
        assert_eq!(lit(&display), vec![(1, 1), (2, 2)]);
    }

    #[test]
    fn blank_sprite_leaves_changed_flag_alone() {
        let mut display = Display::new();
        assert_eq!(display.draw_sprite(5, 5, &[0x00, 0x00]), false);
        assert!(!display.is_changed());
        display.draw_sprite(5, 5, &[0x01]);
        assert!(display.take_changed());
        assert!(!display.take_changed());
    }

    #[test]
    fn renders_as_text() {
        let mut display = Display::new();
        display.draw_sprite(0, 0, &[0xC0]);
        let text = display.to_string();
        let first = text.lines().next().unwrap_or_default();
        assert_eq!(&first[..4], "##..");
        assert_eq!(text.lines().count(), SCREEN_HEIGHT);
    }
}
