use std::collections::VecDeque;

/// A discrete event from an input source, with keys given as keypad values 0..=0xF.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputEvent {
    KeyDown(u8),
    KeyUp(u8),
    Quit,
}

/// Represents an input device that is capable of providing key events in the range 0..0xF.
/// The scheduler drains it by calling `poll` until it returns `None`.
pub trait EmulatorInput {
    fn poll(&mut self) -> Option<InputEvent>;
}

/// An input device that never provides any input
pub struct DummyInput;

impl EmulatorInput for DummyInput {
    fn poll(&mut self) -> Option<InputEvent> {
        None
    }
}

/// An input device that replays events queued up front or pushed while running.
#[derive(Debug, Default)]
pub struct QueuedInput {
    events: VecDeque<InputEvent>,
}

impl QueuedInput {
    pub fn new(events: impl IntoIterator<Item = InputEvent>) -> QueuedInput {
        QueuedInput {
            events: events.into_iter().collect(),
        }
    }

    pub fn push(&mut self, event: InputEvent) {
        self.events.push_back(event);
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

impl EmulatorInput for QueuedInput {
    fn poll(&mut self) -> Option<InputEvent> {
        self.events.pop_front()
    }
}
