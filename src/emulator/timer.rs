//! The delay and sound countdown timers.
//!
//! The sound timer is read by the audio callback thread while the scheduler
//! decrements it, so its value lives in an atomic shared by both.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

/// A handle to the sound timer. Clones observe and update the same value.
#[derive(Debug, Clone, Default)]
pub struct SoundTimer(Arc<AtomicU8>);

impl SoundTimer {
    pub fn new() -> SoundTimer {
        SoundTimer::default()
    }

    pub fn get(&self) -> u8 {
        self.0.load(Ordering::Acquire)
    }

    pub(crate) fn set(&self, value: u8) {
        self.0.store(value, Ordering::Release);
    }

    fn count_down(&self, frames: u8) {
        // One read-modify-write, so a reader sees either the old or the new value.
        let _ = self
            .0
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |value| {
                Some(value.saturating_sub(frames))
            });
    }
}

#[derive(Debug, Clone, Default)]
pub struct Timers {
    delay: u8,
    sound: SoundTimer,
}

impl Timers {
    pub fn new() -> Timers {
        Timers::default()
    }

    pub fn delay(&self) -> u8 {
        self.delay
    }

    pub fn sound(&self) -> u8 {
        self.sound.get()
    }

    pub fn sound_handle(&self) -> SoundTimer {
        self.sound.clone()
    }

    pub(crate) fn set_delay(&mut self, value: u8) {
        self.delay = value;
    }

    pub(crate) fn set_sound(&mut self, value: u8) {
        self.sound.set(value);
    }

    /// Decrement both timers by the number of elapsed 60 Hz frames, stopping at zero.
    pub(crate) fn count_down(&mut self, frames: u64) {
        let frames = frames.min(u8::MAX as u64) as u8;
        self.delay = self.delay.saturating_sub(frames);
        self.sound.count_down(frames);
    }

    pub(crate) fn reset(&mut self) {
        self.delay = 0;
        self.sound.set(0);
    }
}

#[cfg(test)]
mod tests {

    use super::*;
    use proptest::prelude::*;
    use std::thread;

    #[test]
    fn count_down_stops_at_zero() {
        let mut timers = Timers::new();
        timers.set_delay(3);
        timers.set_sound(10);
        timers.count_down(5);
        assert_eq!(timers.delay(), 0);
        assert_eq!(timers.sound(), 5);
        timers.count_down(1000);
        assert_eq!(timers.sound(), 0);
    }

    #[test]
    fn handle_sees_updates_from_another_thread() {
        let mut timers = Timers::new();
        let handle = timers.sound_handle();
        timers.set_sound(0x40);
        let reader = thread::spawn(move || handle.get());
        assert_eq!(reader.join().unwrap(), 0x40);
        timers.count_down(0x40);
        assert_eq!(timers.sound_handle().get(), 0);
    }

    proptest! {
        #[test]
        fn never_increases(start in any::<u8>(), steps in prop::collection::vec(0u64..300, 1..20)) {
            let mut timers = Timers::new();
            timers.set_delay(start);
            timers.set_sound(start);
            let mut previous = start;
            for frames in steps {
                timers.count_down(frames);
                prop_assert!(timers.delay() <= previous);
                prop_assert_eq!(timers.delay(), timers.sound());
                previous = timers.delay();
            }
        }
    }
}
