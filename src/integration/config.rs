//! Configuration for the voice session
//!
//! Every field has a default, so an empty or partial TOML file is valid.

use crate::turn::controller::TurnConfig;
use crate::turn::watchdog::SilenceConfig;
use crate::{Result, VoiceError};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::info;

/// Environment variable that overrides `api_url`
pub const API_URL_ENV: &str = "VOICELOOP_API_URL";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VoiceConfig {
    /// Base URL of the transcription service
    pub api_url: String,

    /// Timeout for the submission request and the reply audio download
    pub request_timeout_secs: u64,

    /// Silence detection while recording
    pub silence: SilenceConfig,

    /// Level that interrupts playback (dB)
    pub interrupt_threshold_db: f32,

    /// Samples in the level meter's analysis window
    pub analysis_window: usize,

    /// Capacity of the runtime's command and update channels
    pub channel_buffer_size: usize,
}

impl Default for VoiceConfig {
    fn default() -> Self {
        Self {
            api_url: "http://localhost:5000".to_string(),
            request_timeout_secs: 60,
            silence: SilenceConfig::default(),
            interrupt_threshold_db: -40.0,
            analysis_window: 2048,
            channel_buffer_size: 100,
        }
    }
}

impl VoiceConfig {
    /// Parse a TOML document
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| VoiceError::Config(format!("Invalid config: {}", e)))
    }

    /// Load from a TOML file
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            VoiceError::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        let config = Self::from_toml_str(&content)?;
        info!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Apply environment overrides
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(url) = std::env::var(API_URL_ENV) {
            if !url.trim().is_empty() {
                self.api_url = url;
            }
        }
        self
    }

    pub fn with_api_url(mut self, api_url: impl Into<String>) -> Self {
        self.api_url = api_url.into();
        self
    }

    pub fn with_silence(mut self, silence: SilenceConfig) -> Self {
        self.silence = silence;
        self
    }

    pub fn with_interrupt_threshold(mut self, threshold_db: f32) -> Self {
        self.interrupt_threshold_db = threshold_db;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout_secs = timeout.as_secs();
        self
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Settings the turn controller needs
    pub fn turn_config(&self) -> TurnConfig {
        TurnConfig {
            silence: self.silence.clone(),
            interrupt_threshold_db: self.interrupt_threshold_db,
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if !(self.api_url.starts_with("http://") || self.api_url.starts_with("https://")) {
            return Err(VoiceError::Config(format!(
                "api_url must be an http(s) URL, got {:?}",
                self.api_url
            )));
        }
        if self.request_timeout_secs == 0 {
            return Err(VoiceError::Config(
                "request_timeout_secs must be greater than zero".to_string(),
            ));
        }
        if self.analysis_window == 0 {
            return Err(VoiceError::Config(
                "analysis_window must be greater than zero".to_string(),
            ));
        }
        if self.channel_buffer_size == 0 {
            return Err(VoiceError::Config(
                "channel_buffer_size must be greater than zero".to_string(),
            ));
        }
        self.silence.validate()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = VoiceConfig::default();
        assert_eq!(config.api_url, "http://localhost:5000");
        assert_eq!(config.interrupt_threshold_db, -40.0);
        assert_eq!(config.silence.sound_threshold_db, -50.0);
        assert_eq!(config.analysis_window, 2048);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml() {
        let config = VoiceConfig::from_toml_str(
            r#"
            api_url = "https://voice.example.com"

            [silence]
            timeout_secs = 10
            warn_at_secs = 7
            "#,
        )
        .unwrap();

        assert_eq!(config.api_url, "https://voice.example.com");
        assert_eq!(config.silence.timeout_secs, 10);
        assert_eq!(config.silence.poll_interval_ms, 100);
        assert_eq!(config.request_timeout_secs, 60);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "interrupt_threshold_db = -35.0").unwrap();

        let config = VoiceConfig::from_toml_file(file.path()).unwrap();
        assert_eq!(config.interrupt_threshold_db, -35.0);
        assert_eq!(config.turn_config().interrupt_threshold_db, -35.0);
    }

    #[test]
    fn test_missing_file_is_config_error() {
        let result = VoiceConfig::from_toml_file("/nonexistent/voiceloop.toml");
        assert!(matches!(result, Err(VoiceError::Config(_))));
    }

    #[test]
    fn test_config_builder() {
        let config = VoiceConfig::default()
            .with_api_url("http://10.0.0.2:8080")
            .with_interrupt_threshold(-30.0)
            .with_request_timeout(Duration::from_secs(5));

        assert_eq!(config.api_url, "http://10.0.0.2:8080");
        assert_eq!(config.request_timeout(), Duration::from_secs(5));
        assert_eq!(config.turn_config().interrupt_threshold_db, -30.0);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        assert!(VoiceConfig::default().with_api_url("localhost").validate().is_err());

        let silence = SilenceConfig {
            warn_at_secs: 60,
            ..SilenceConfig::default()
        };
        assert!(VoiceConfig::default().with_silence(silence).validate().is_err());
    }
}
