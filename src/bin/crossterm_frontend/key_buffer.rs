use crossterm::event::KeyEvent;
use std::{
    collections::VecDeque,
    sync::{Mutex, MutexGuard},
    time::{Duration, Instant},
};

/// A thread-safe buffer for storing key events and timestamps.
/// For use with a producer thread and a consumer of keys.
/// Wrap it in an `std::sync::Arc` and you are good to go.
pub struct KeyBuffer {
    timeout: Duration,
    buffer: Mutex<VecDeque<(KeyEvent, Instant)>>,
}

impl KeyBuffer {
    /// Create a new `KeyBuffer`, but don't return keypresses that are older than `timeout`.
    pub fn new(timeout: Duration) -> KeyBuffer {
        KeyBuffer {
            timeout,
            buffer: Mutex::new(VecDeque::new()),
        }
    }

    /// Push a new keypress to the buffer.
    pub fn push(&self, key: KeyEvent) {
        self.lock().push_back((key, Instant::now()));
    }

    /// Take every keypress that is still fresh, oldest first.
    pub fn drain(&self) -> Vec<KeyEvent> {
        let mut buffer = self.lock();
        let timeout = self.timeout;
        buffer
            .drain(..)
            .filter(|(_, timestamp)| timestamp.elapsed() < timeout)
            .map(|(key, _)| key)
            .collect()
    }

    /// Lock the queue, taking it back if a holder panicked.
    fn lock(&self) -> MutexGuard<'_, VecDeque<(KeyEvent, Instant)>> {
        match self.buffer.lock() {
            Ok(buffer) => buffer,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}
