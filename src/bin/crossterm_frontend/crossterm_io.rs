use chip8_vm::emulator::display::{Display, SCREEN_HEIGHT, SCREEN_WIDTH};
use chip8_vm::emulator::input::{EmulatorInput, InputEvent};
use chip8_vm::emulator::keypad::keypad_value;
use chip8_vm::emulator::output::{EmulatorOutput, Palette, Rgb};

use super::key_manager::KeyManager;

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use crossterm::style::{Color, Print, ResetColor, SetBackgroundColor, SetForegroundColor};
use crossterm::terminal::{self, Clear, ClearType, EnterAlternateScreen, LeaveAlternateScreen};
use crossterm::{cursor, execute, queue};
use std::collections::VecDeque;
use std::io::{stdout, Stdout, Write};
use std::time::{Duration, Instant};

/// Terminals only report presses, so a key counts as held for this long after its last press.
const KEY_HOLD: Duration = Duration::from_millis(150);

pub struct CrosstermInput<'a> {
    key_manager: &'a KeyManager,
    held: [Option<Instant>; 16],
    pending: VecDeque<InputEvent>,
}

impl CrosstermInput<'_> {
    pub fn new(key_manager: &KeyManager) -> CrosstermInput {
        CrosstermInput {
            key_manager,
            held: [None; 16],
            pending: VecDeque::new(),
        }
    }

    fn collect_events(&mut self) {
        let now = Instant::now();
        for key in self.key_manager.keys() {
            match key_to_event(key) {
                Some(InputEvent::KeyDown(value)) => {
                    self.held[value as usize] = Some(now);
                    self.pending.push_back(InputEvent::KeyDown(value));
                }
                Some(event) => self.pending.push_back(event),
                None => {}
            }
        }

        for (value, pressed_at) in self.held.iter_mut().enumerate() {
            if let Some(at) = *pressed_at {
                if now.duration_since(at) >= KEY_HOLD {
                    *pressed_at = None;
                    self.pending.push_back(InputEvent::KeyUp(value as u8));
                }
            }
        }
    }
}

impl EmulatorInput for CrosstermInput<'_> {
    fn poll(&mut self) -> Option<InputEvent> {
        if self.pending.is_empty() {
            self.collect_events();
        }
        self.pending.pop_front()
    }
}

fn key_to_event(key: KeyEvent) -> Option<InputEvent> {
    match key.code {
        KeyCode::Esc => Some(InputEvent::Quit),
        KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => Some(InputEvent::Quit),
        KeyCode::Char(c) => keypad_value(c).map(InputEvent::KeyDown),
        _ => None,
    }
}

pub struct CrosstermOutput {
    stdout: Stdout,
    palette: Palette,
    cells: [[bool; SCREEN_WIDTH]; SCREEN_HEIGHT],
}

impl CrosstermOutput {
    pub fn new(palette: Palette) -> crossterm::Result<CrosstermOutput> {
        let mut stdout = stdout();
        execute!(stdout, EnterAlternateScreen, cursor::Hide)?;
        terminal::enable_raw_mode()?;

        let mut output = CrosstermOutput {
            stdout,
            palette,
            cells: [[false; SCREEN_WIDTH]; SCREEN_HEIGHT],
        };
        output.draw_frame()?;
        output.redraw()?;
        Ok(output)
    }

    fn draw_frame(&mut self) -> crossterm::Result<()> {
        queue!(self.stdout, ResetColor, Clear(ClearType::All))?;
        let bottom = SCREEN_HEIGHT as u16 + 1;
        let right = 2 * SCREEN_WIDTH as u16 + 1;
        for y in 0..=bottom {
            for x in 0..=right {
                let c = match (x, y) {
                    (0, 0) => '┏',
                    (x, 0) if x == right => '┓',
                    (0, y) if y == bottom => '┗',
                    (x, y) if x == right && y == bottom => '┛',
                    (_, y) if y == 0 || y == bottom => '━',
                    (x, _) if x == 0 || x == right => '┃',
                    _ => continue,
                };
                queue!(self.stdout, cursor::MoveTo(x, y), Print(c))?;
            }
        }
        self.stdout.flush()?;
        Ok(())
    }

    fn draw_cell(&mut self, x: usize, y: usize) -> crossterm::Result<()> {
        let color = if self.cells[y][x] {
            self.palette.foreground
        } else {
            self.palette.background
        };
        queue!(
            self.stdout,
            cursor::MoveTo(2 * x as u16 + 1, y as u16 + 1),
            SetBackgroundColor(to_color(color)),
            Print("  ")
        )?;
        Ok(())
    }

    fn redraw(&mut self) -> crossterm::Result<()> {
        for y in 0..SCREEN_HEIGHT {
            for x in 0..SCREEN_WIDTH {
                self.draw_cell(x, y)?;
            }
        }
        queue!(self.stdout, SetForegroundColor(Color::Reset), ResetColor)?;
        self.stdout.flush()?;
        Ok(())
    }

    /// Draw only the cells that differ from the last presented frame.
    fn update(&mut self, display: &Display) -> crossterm::Result<()> {
        for (y, row) in display.rows().enumerate() {
            for (x, on) in row.iter().enumerate() {
                if self.cells[y][x] != *on {
                    self.cells[y][x] = *on;
                    self.draw_cell(x, y)?;
                }
            }
        }
        queue!(self.stdout, ResetColor)?;
        self.stdout.flush()?;
        Ok(())
    }
}

impl Drop for CrosstermOutput {
    fn drop(&mut self) {
        if let Err(e) = terminal::disable_raw_mode() {
            log::error!("Failed to leave raw mode: {}", e);
        }
        if let Err(e) = execute!(self.stdout, ResetColor, LeaveAlternateScreen, cursor::Show) {
            log::error!("Failed to restore terminal: {}", e);
        }
    }
}

impl EmulatorOutput for CrosstermOutput {
    fn present(&mut self, display: &Display) {
        if let Err(e) = self.update(display) {
            log::error!("Failed to draw frame: {}", e);
        }
    }
}

fn to_color(rgb: Rgb) -> Color {
    let (r, g, b) = rgb.components();
    Color::Rgb { r, g, b }
}
