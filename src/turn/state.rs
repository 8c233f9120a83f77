//! Turn state, the events that drive it, and the shared snapshot readers see
//!
//! The controller is the only writer. UI and tests read through
//! `SharedSession`:
//! - **TurnState**: where in the turn cycle the session is
//! - **TurnEvent**: a happening the controller reacts to
//! - **SessionSnapshot**: the observable attributes, copied out without a lock

use crate::speech::client::BotReply;
use crate::Result;
use parking_lot::RwLock;
use std::sync::Arc;

pub const STATUS_PROCESSING: &str = "Processing...";
pub const STATUS_INTERRUPTED: &str = "Interruption detected - Listening...";

pub const ERROR_START_FAILED: &str = "Failed to start recording";
pub const ERROR_PROCESSING_FAILED: &str = "Processing failed";
pub const ERROR_PLAYBACK_FAILED: &str = "Failed to play response";

pub const TITLE_SPEAKING: &str = "Assistant Speaking";
pub const TITLE_RECORDING: &str = "Recording...";
pub const TITLE_IDLE: &str = "Voice Message";

/// Status shown after the silence cutoff ended a recording
pub fn timeout_status(timeout_secs: u64) -> String {
    format!(
        "No voice detected for {} seconds. Click 'Start Recording' to try again.",
        timeout_secs
    )
}

/// Countdown shown during the last seconds before the silence cutoff
pub fn silence_warning(stops_in_secs: u64) -> String {
    format!(
        "Warning: Recording will stop in {} seconds if no voice is detected",
        stops_in_secs
    )
}

/// Position in the turn cycle
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TurnState {
    /// Nothing captured or playing. `timed_out` is set when the last
    /// recording was ended by the silence cutoff.
    Idle { timed_out: bool },
    /// Capturing the user's utterance
    Recording {
        silence_elapsed_secs: u64,
        stops_in_secs: Option<u64>,
    },
    /// Utterance submitted, waiting for the reply
    Processing,
    /// Reply playing, listening for interruption
    Speaking,
}

impl Default for TurnState {
    fn default() -> Self {
        TurnState::Idle { timed_out: false }
    }
}

impl TurnState {
    pub fn recording() -> Self {
        TurnState::Recording {
            silence_elapsed_secs: 0,
            stops_in_secs: None,
        }
    }

    pub fn is_idle(&self) -> bool {
        matches!(self, TurnState::Idle { .. })
    }

    pub fn is_recording(&self) -> bool {
        matches!(self, TurnState::Recording { .. })
    }

    pub fn is_processing(&self) -> bool {
        matches!(self, TurnState::Processing)
    }

    pub fn is_speaking(&self) -> bool {
        matches!(self, TurnState::Speaking)
    }

    pub fn silence_timeout_reached(&self) -> bool {
        matches!(self, TurnState::Idle { timed_out: true })
    }

    pub fn silence_elapsed_secs(&self) -> u64 {
        match self {
            TurnState::Recording {
                silence_elapsed_secs,
                ..
            } => *silence_elapsed_secs,
            _ => 0,
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            TurnState::Speaking => TITLE_SPEAKING,
            TurnState::Recording { .. } => TITLE_RECORDING,
            _ => TITLE_IDLE,
        }
    }
}

impl std::fmt::Display for TurnState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TurnState::Idle { timed_out: false } => write!(f, "Idle"),
            TurnState::Idle { timed_out: true } => write!(f, "Idle (silence timeout)"),
            TurnState::Recording {
                silence_elapsed_secs,
                ..
            } => write!(f, "Recording ({}s silent)", silence_elapsed_secs),
            TurnState::Processing => write!(f, "Processing"),
            TurnState::Speaking => write!(f, "Speaking"),
        }
    }
}

/// Inputs to the turn transition function
#[derive(Debug)]
pub enum TurnEvent {
    /// User asked to record
    StartRequested,
    /// User asked to finish the recording and submit it
    StopRequested,
    /// Session is being closed
    CloseRequested,
    /// Silence watchdog hit its timeout
    SilenceTimedOut,
    /// Submission worker finished
    SubmissionCompleted(Result<BotReply>),
    /// The reply audio download finished
    ReplyAudioReady(Result<Vec<u8>>),
    /// Reply audio played to the end
    PlaybackEnded,
    /// User spoke over the reply
    InterruptDetected,
}

impl TurnEvent {
    pub fn name(&self) -> &'static str {
        match self {
            TurnEvent::StartRequested => "StartRequested",
            TurnEvent::StopRequested => "StopRequested",
            TurnEvent::CloseRequested => "CloseRequested",
            TurnEvent::SilenceTimedOut => "SilenceTimedOut",
            TurnEvent::SubmissionCompleted(_) => "SubmissionCompleted",
            TurnEvent::ReplyAudioReady(_) => "ReplyAudioReady",
            TurnEvent::PlaybackEnded => "PlaybackEnded",
            TurnEvent::InterruptDetected => "InterruptDetected",
        }
    }
}

/// Observable session attributes at one point in time
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SessionSnapshot {
    pub state: TurnState,
    pub is_recording: bool,
    pub is_bot_speaking: bool,
    pub is_processing: bool,
    pub silence_elapsed_secs: u64,
    pub silence_timeout_reached: bool,
    /// Countdown text during the warning period
    pub silence_warning: Option<String>,
    pub status_message: Option<String>,
    pub error_message: Option<String>,
    pub title: &'static str,
    pub conversation_len: usize,
}

impl SessionSnapshot {
    pub fn new(
        state: TurnState,
        status_message: Option<String>,
        error_message: Option<String>,
        conversation_len: usize,
    ) -> Self {
        let silence_warning = match state {
            TurnState::Recording {
                stops_in_secs: Some(secs),
                ..
            } => Some(silence_warning(secs)),
            _ => None,
        };

        Self {
            state,
            is_recording: state.is_recording(),
            is_bot_speaking: state.is_speaking(),
            is_processing: state.is_processing(),
            silence_elapsed_secs: state.silence_elapsed_secs(),
            silence_timeout_reached: state.silence_timeout_reached(),
            silence_warning,
            status_message,
            error_message,
            title: state.title(),
            conversation_len,
        }
    }
}

/// Thread-safe handle on the latest snapshot
#[derive(Clone, Default)]
pub struct SharedSession {
    inner: Arc<RwLock<SessionSnapshot>>,
}

impl SharedSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of the current snapshot (no lock held after return)
    pub fn snapshot(&self) -> SessionSnapshot {
        self.inner.read().clone()
    }

    /// Replace the snapshot. Returns true if anything changed.
    pub fn publish(&self, snapshot: SessionSnapshot) -> bool {
        let mut current = self.inner.write();
        if *current == snapshot {
            return false;
        }
        *current = snapshot;
        true
    }

    pub fn state(&self) -> TurnState {
        self.inner.read().state
    }

    pub fn is_recording(&self) -> bool {
        self.inner.read().is_recording
    }

    pub fn is_bot_speaking(&self) -> bool {
        self.inner.read().is_bot_speaking
    }

    pub fn is_processing(&self) -> bool {
        self.inner.read().is_processing
    }

    pub fn error_message(&self) -> Option<String> {
        self.inner.read().error_message.clone()
    }

    pub fn status_message(&self) -> Option<String> {
        self.inner.read().status_message.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_idle() {
        let state = TurnState::default();
        assert!(state.is_idle());
        assert!(!state.silence_timeout_reached());
        assert_eq!(state.title(), "Voice Message");
    }

    #[test]
    fn test_titles() {
        assert_eq!(TurnState::Speaking.title(), "Assistant Speaking");
        assert_eq!(TurnState::recording().title(), "Recording...");
        assert_eq!(TurnState::Processing.title(), "Voice Message");
    }

    #[test]
    fn test_timeout_status_text() {
        assert_eq!(
            timeout_status(30),
            "No voice detected for 30 seconds. Click 'Start Recording' to try again."
        );
    }

    #[test]
    fn test_snapshot_flags() {
        let snapshot = SessionSnapshot::new(
            TurnState::Recording {
                silence_elapsed_secs: 27,
                stops_in_secs: Some(3),
            },
            None,
            None,
            0,
        );
        assert!(snapshot.is_recording);
        assert!(!snapshot.is_bot_speaking);
        assert_eq!(snapshot.silence_elapsed_secs, 27);
        assert_eq!(
            snapshot.silence_warning.as_deref(),
            Some("Warning: Recording will stop in 3 seconds if no voice is detected")
        );

        let snapshot = SessionSnapshot::new(TurnState::Idle { timed_out: true }, None, None, 0);
        assert!(snapshot.silence_timeout_reached);
        assert!(!snapshot.is_recording);
        assert!(snapshot.silence_warning.is_none());
    }

    #[test]
    fn test_publish_reports_changes() {
        let shared = SharedSession::new();
        let idle = SessionSnapshot::new(TurnState::default(), None, None, 0);
        assert!(shared.publish(idle.clone()));
        assert!(!shared.publish(idle));

        let speaking = SessionSnapshot::new(TurnState::Speaking, None, None, 2);
        assert!(shared.publish(speaking));
        assert!(shared.is_bot_speaking());
        assert_eq!(shared.state(), TurnState::Speaking);
    }
}
