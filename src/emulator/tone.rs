//! Sawtooth tone synthesis driven by the sound timer.
//!
//! An audio device pulls samples at its own cadence from its own thread. The
//! timer is snapshotted once per buffer and nothing is locked while samples are made.

use crate::emulator::timer::SoundTimer;

/// Pitch of the buzzer.
pub const TONE_FREQUENCY: f64 = 400.0;
pub const DEFAULT_SAMPLE_RATE: u32 = 44_100;
pub const DEFAULT_VOLUME: f32 = 0.1;

pub struct ToneGenerator {
    timer: SoundTimer,
    level: f64,
    step: f64,
    amplitude: f64,
}

impl ToneGenerator {
    pub fn new(timer: SoundTimer, sample_rate: u32, volume: f32) -> ToneGenerator {
        let mut generator = ToneGenerator {
            timer,
            level: 0.0,
            step: 2.0 * TONE_FREQUENCY / sample_rate.max(1) as f64,
            amplitude: 0.0,
        };
        generator.set_volume(volume);
        generator
    }

    /// Volume from 0 to 1. Values outside the range are clamped.
    pub fn set_volume(&mut self, volume: f32) {
        let volume = if volume.is_nan() { 0.0 } else { volume.max(0.0).min(1.0) };
        self.amplitude = volume as f64 * i16::MAX as f64;
    }

    pub fn is_sounding(&self) -> bool {
        self.timer.get() > 0
    }

    /// Fill `buffer` with the next samples: silence while the sound timer is zero,
    /// otherwise a sawtooth rising from -1 to +1.
    pub fn fill(&mut self, buffer: &mut [i16]) {
        if !self.is_sounding() {
            for sample in buffer.iter_mut() {
                *sample = 0;
            }
            return;
        }

        for sample in buffer.iter_mut() {
            let next = self.level + self.step;
            self.level = if next > 1.0 { -1.0 } else { next };
            *sample = (self.amplitude * self.level) as i16;
        }
    }

    pub fn samples(&mut self, count: usize) -> Vec<i16> {
        let mut buffer = vec![0; count];
        self.fill(&mut buffer);
        buffer
    }
}
