//! Barge-in detection while the reply is playing

use crate::audio::capture::{CaptureStream, Microphone};
use crate::audio::meter::AudioLevelMeter;
use crate::Result;
use tracing::{debug, info};

/// Watches a dedicated microphone stream for the user talking over playback
///
/// Fires at most once. The stream is released as soon as it fires, or when
/// `stop` is called.
pub struct PlaybackInterruptMonitor {
    stream: Option<Box<dyn CaptureStream>>,
    meter: AudioLevelMeter,
    threshold_db: f32,
    fired: bool,
}

impl PlaybackInterruptMonitor {
    /// Acquire a fresh microphone stream and arm the monitor
    pub fn start(microphone: &mut dyn Microphone, threshold_db: f32) -> Result<Self> {
        let stream = microphone.open()?;
        let meter = AudioLevelMeter::new(stream.level_window());

        info!("Interrupt monitor armed at {:.1} dB", threshold_db);

        Ok(Self {
            stream: Some(stream),
            meter,
            threshold_db,
            fired: false,
        })
    }

    /// One poll interval. Returns true exactly once, on the first reading
    /// above the threshold.
    pub fn poll(&mut self) -> bool {
        let Some(stream) = self.stream.as_mut() else {
            return false;
        };

        // Only the level matters here; captured audio is dropped
        let _ = stream.take_chunks();

        let level = self.meter.sample();
        if level > self.threshold_db {
            info!("Interruption at {:.1} dB", level);
            self.fired = true;
            self.stop();
            return true;
        }
        false
    }

    /// Disarm and release the microphone. Safe to call repeatedly.
    pub fn stop(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            stream.close();
            debug!("Interrupt monitor released microphone");
        }
        self.meter.detach();
    }

    pub fn is_open(&self) -> bool {
        self.stream.is_some()
    }

    pub fn has_fired(&self) -> bool {
        self.fired
    }

    pub fn threshold_db(&self) -> f32 {
        self.threshold_db
    }
}

impl Drop for PlaybackInterruptMonitor {
    fn drop(&mut self) {
        self.stop();
    }
}
