//! The 16-key hex keypad and the latch used by the blocking key read.

/// Physical keyboard layout mapped onto the hex keypad.
///
/// ```text
/// 1 2 3 4      1 2 3 C
/// Q W E R  ->  4 5 6 D
/// A S D F      7 8 9 E
/// Z X C V      A 0 B F
/// ```
#[rustfmt::skip]
pub const KEYMAP: [(char, u8); 16] = [
    ('1', 0x1), ('2', 0x2), ('3', 0x3), ('4', 0xC),
    ('q', 0x4), ('w', 0x5), ('e', 0x6), ('r', 0xD),
    ('a', 0x7), ('s', 0x8), ('d', 0x9), ('f', 0xE),
    ('z', 0xA), ('x', 0x0), ('c', 0xB), ('v', 0xF),
];

/// The keypad value of a physical key, if it is part of the layout.
pub fn keypad_value(c: char) -> Option<u8> {
    let c = c.to_ascii_lowercase();
    KEYMAP.iter().find(|(key, _)| *key == c).map(|(_, value)| *value)
}

/// Whether an `FX0A` is waiting for a key press, and where the key goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitState {
    Idle,
    WaitingForKey(u8),
}

#[derive(Debug, Clone)]
pub struct Keypad {
    pressed: u16,
    wait: WaitState,
}

impl Keypad {
    pub fn new() -> Keypad {
        Keypad {
            pressed: 0,
            wait: WaitState::Idle,
        }
    }

    pub fn reset(&mut self) {
        *self = Keypad::new();
    }

    /// Register a key press.
    ///
    /// Returns the destination register if this press releases a pending wait.
    pub fn press(&mut self, key: u8) -> Option<u8> {
        self.pressed |= 1 << (key & 0xF);
        match self.wait {
            WaitState::WaitingForKey(register) => {
                self.wait = WaitState::Idle;
                log::debug!("Key {:X} released wait on V{:X}", key & 0xF, register);
                Some(register)
            }
            WaitState::Idle => None,
        }
    }

    pub fn release(&mut self, key: u8) {
        self.pressed &= !(1 << (key & 0xF));
    }

    /// Values above 0xF never match a key.
    pub fn is_pressed(&self, key: u8) -> bool {
        key <= 0xF && self.pressed & (1 << key) != 0
    }

    pub fn pressed_mask(&self) -> u16 {
        self.pressed
    }

    pub fn wait_for_key(&mut self, register: u8) {
        log::debug!("Waiting for key into V{:X}", register);
        self.wait = WaitState::WaitingForKey(register & 0xF);
    }

    pub fn wait_state(&self) -> WaitState {
        self.wait
    }

    pub fn is_waiting(&self) -> bool {
        self.wait != WaitState::Idle
    }
}

impl Default for Keypad {
    fn default() -> Self {
        Self::new()
    }
}
