use super::key_buffer::KeyBuffer;
use crossterm::event::{self, Event, KeyEvent};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// How long the listener waits for an event before checking whether to stop.
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// A struct for managing keypresses that will automatically
/// start a thread that grabs keypresses.
pub struct KeyManager {
    stop: Arc<AtomicBool>,
    key_buffer: Arc<KeyBuffer>,
    event_listener: Option<JoinHandle<()>>,
}

impl KeyManager {
    // Start event listener thread
    pub fn new() -> KeyManager {
        let stop = Arc::new(AtomicBool::new(false));
        let key_buffer = Arc::new(KeyBuffer::new(Duration::from_millis(250)));
        let event_listener = event_listener(stop.clone(), key_buffer.clone());
        KeyManager {
            stop,
            key_buffer,
            event_listener: Some(event_listener),
        }
    }

    /// Every key pressed since the last call.
    pub fn keys(&self) -> Vec<KeyEvent> {
        self.key_buffer.drain()
    }
}

impl Drop for KeyManager {
    fn drop(&mut self) {
        // Tell the event listener to stop, and wait for it
        self.stop.store(true, Ordering::Release);
        if let Some(listener) = self.event_listener.take() {
            if listener.join().is_err() {
                log::warn!("Key listener panicked");
            }
        }
    }
}

/// Starts a thread that listens for key events and pushes them to the key buffer.
fn event_listener(stop: Arc<AtomicBool>, key_buffer: Arc<KeyBuffer>) -> JoinHandle<()> {
    thread::spawn(move || {
        while !stop.load(Ordering::Acquire) {
            match event::poll(POLL_INTERVAL) {
                Ok(false) => continue,
                Ok(true) => {}
                Err(e) => {
                    log::error!("Failed to poll terminal events: {}", e);
                    break;
                }
            }

            match event::read() {
                Ok(Event::Key(key_event)) => {
                    log::debug!("Got key {:?}", key_event);
                    key_buffer.push(key_event);
                }
                Ok(_) => {}
                Err(e) => {
                    log::error!("Failed to read terminal event: {}", e);
                    break;
                }
            }
        }
    })
}
