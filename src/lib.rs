pub mod audio;
pub mod integration;
pub mod messages;
pub mod speech;
pub mod turn;

use thiserror::Error;

#[derive(Error, Debug, Clone)]
pub enum VoiceError {
    #[error("Microphone permission denied: {0}")]
    PermissionDenied(String),

    #[error("Audio device unavailable: {0}")]
    DeviceUnavailable(String),

    #[error("Submission failed: {0}")]
    SubmissionFailed(String),

    #[error("Playback failed: {0}")]
    PlaybackFailed(String),

    #[error("Audio processing error: {0}")]
    AudioProcessing(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Channel error: {0}")]
    Channel(String),

    #[error("IO error: {0}")]
    Io(String),
}

impl From<std::io::Error> for VoiceError {
    fn from(e: std::io::Error) -> Self {
        VoiceError::Io(e.to_string())
    }
}

impl VoiceError {
    /// Check if this error is recoverable
    pub fn is_recoverable(&self) -> bool {
        match self {
            // The user has to grant access or plug something in
            VoiceError::PermissionDenied(_) => false,
            VoiceError::DeviceUnavailable(_) => false,
            // A new turn can simply be attempted again
            VoiceError::SubmissionFailed(_) => true,
            VoiceError::PlaybackFailed(_) => true,
            VoiceError::AudioProcessing(_) => true,
            VoiceError::Config(_) => false,
            VoiceError::Channel(_) => false,
            VoiceError::Io(_) => false,
        }
    }

    /// Get a user-friendly description
    pub fn user_message(&self) -> String {
        match self {
            VoiceError::PermissionDenied(_) => {
                "Microphone access was denied. Please allow microphone access.".to_string()
            }
            VoiceError::DeviceUnavailable(_) => {
                "No microphone found. Please check your audio devices.".to_string()
            }
            VoiceError::SubmissionFailed(_) => "Processing failed".to_string(),
            VoiceError::PlaybackFailed(_) => "Failed to play response".to_string(),
            VoiceError::AudioProcessing(_) => {
                "Audio processing failed. Please try again.".to_string()
            }
            VoiceError::Config(_) => "Configuration error. Please check settings.".to_string(),
            VoiceError::Channel(_) => {
                "Internal communication error. Please restart the application.".to_string()
            }
            VoiceError::Io(_) => "File system error occurred.".to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, VoiceError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_errors_are_not_recoverable() {
        assert!(!VoiceError::PermissionDenied("denied".into()).is_recoverable());
        assert!(!VoiceError::DeviceUnavailable("none".into()).is_recoverable());
    }

    #[test]
    fn test_turn_errors_are_recoverable() {
        assert!(VoiceError::SubmissionFailed("500".into()).is_recoverable());
        assert!(VoiceError::PlaybackFailed("decode".into()).is_recoverable());
    }

    #[test]
    fn test_user_messages_match_status_copy() {
        assert_eq!(
            VoiceError::SubmissionFailed("x".into()).user_message(),
            "Processing failed"
        );
        assert_eq!(
            VoiceError::PlaybackFailed("x".into()).user_message(),
            "Failed to play response"
        );
    }

    #[test]
    fn test_io_error_conversion() {
        let err: VoiceError = std::io::Error::new(std::io::ErrorKind::NotFound, "gone").into();
        assert!(matches!(err, VoiceError::Io(_)));
    }
}
