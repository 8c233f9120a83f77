//! Silence watchdog
//!
//! Polled once per interval with the current input level. It only reports
//! what it saw; the turn controller decides what a timeout means.

use crate::{Result, VoiceError};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};

/// Silence detection knobs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SilenceConfig {
    /// Levels above this count as voice (dB)
    pub sound_threshold_db: f32,
    /// Poll cadence in milliseconds
    pub poll_interval_ms: u64,
    /// Silence that ends the turn, in seconds
    pub timeout_secs: u64,
    /// Silence after which the countdown warning shows, in seconds
    pub warn_at_secs: u64,
}

impl Default for SilenceConfig {
    fn default() -> Self {
        Self {
            sound_threshold_db: -50.0,
            poll_interval_ms: 100,
            timeout_secs: 30,
            warn_at_secs: 25,
        }
    }
}

impl SilenceConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.poll_interval_ms == 0 {
            return Err(VoiceError::Config(
                "poll_interval_ms must be greater than zero".to_string(),
            ));
        }
        if self.timeout_secs == 0 {
            return Err(VoiceError::Config("timeout_secs must be greater than zero".to_string()));
        }
        if self.warn_at_secs > self.timeout_secs {
            return Err(VoiceError::Config(format!(
                "warn_at_secs ({}) must not exceed timeout_secs ({})",
                self.warn_at_secs, self.timeout_secs
            )));
        }
        Ok(())
    }
}

/// Outcome of one poll
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchdogEvent {
    /// Sound above the threshold; the silence clock is back at zero
    Voiced,
    /// Still quiet. `stops_in_secs` is set once the warning period started.
    Silent {
        elapsed_secs: u64,
        stops_in_secs: Option<u64>,
    },
    /// Silence reached the timeout. Reported once.
    TimedOut,
    /// The watchdog already fired and no longer polls
    Stopped,
}

pub struct SilenceWatchdog {
    config: SilenceConfig,
    elapsed_ms: u64,
    fired: bool,
}

impl SilenceWatchdog {
    pub fn new(config: SilenceConfig) -> Self {
        Self {
            config,
            elapsed_ms: 0,
            fired: false,
        }
    }

    /// Feed one level reading (dB)
    pub fn poll(&mut self, level_db: f32) -> WatchdogEvent {
        if self.fired {
            return WatchdogEvent::Stopped;
        }

        if level_db > self.config.sound_threshold_db {
            if self.elapsed_ms > 0 {
                debug!("Voice detected at {:.1} dB, silence clock reset", level_db);
            }
            self.elapsed_ms = 0;
            return WatchdogEvent::Voiced;
        }

        self.elapsed_ms = self.elapsed_ms.saturating_add(self.config.poll_interval_ms);

        if self.elapsed_ms >= self.config.timeout_secs.saturating_mul(1000) {
            self.fired = true;
            info!("No voice for {} seconds", self.config.timeout_secs);
            return WatchdogEvent::TimedOut;
        }

        let elapsed_secs = self.elapsed_secs();
        let stops_in_secs = (elapsed_secs >= self.config.warn_at_secs)
            .then(|| self.config.timeout_secs - elapsed_secs);

        WatchdogEvent::Silent {
            elapsed_secs,
            stops_in_secs,
        }
    }

    /// Silence so far, in whole seconds
    pub fn elapsed_secs(&self) -> u64 {
        self.elapsed_ms / 1000
    }

    pub fn has_fired(&self) -> bool {
        self.fired
    }

    pub fn config(&self) -> &SilenceConfig {
        &self.config
    }
}
