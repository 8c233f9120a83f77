//! Loudness metering over a live capture window

use super::buffer::AudioRingBuffer;

/// Loudness of a block of samples in decibels, `20 * log10(rms)`.
///
/// Empty or silent input yields negative infinity.
pub fn rms_db(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return f32::NEG_INFINITY;
    }

    let sum_sq: f32 = samples.iter().map(|s| s * s).sum();
    let rms = (sum_sq / samples.len() as f32).sqrt();

    20.0 * rms.log10()
}

/// Instantaneous loudness reading for a microphone stream
///
/// Holds a handle to the stream's analysis window. Detaching (or never
/// attaching) makes every reading negative infinity.
#[derive(Clone, Default)]
pub struct AudioLevelMeter {
    window: Option<AudioRingBuffer>,
}

impl AudioLevelMeter {
    /// Meter attached to a capture stream's analysis window
    pub fn new(window: AudioRingBuffer) -> Self {
        Self {
            window: Some(window),
        }
    }

    /// Meter with no input attached
    pub fn detached() -> Self {
        Self { window: None }
    }

    /// Current loudness in dB
    pub fn sample(&self) -> f32 {
        match &self.window {
            Some(window) => rms_db(&window.snapshot()),
            None => f32::NEG_INFINITY,
        }
    }

    /// Drop the reference to the analysis window
    pub fn detach(&mut self) {
        self.window = None;
    }

    pub fn is_attached(&self) -> bool {
        self.window.is_some()
    }
}
