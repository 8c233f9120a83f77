//! Turn controller
//!
//! Owns every media resource of one voice session and moves it through
//! Idle → Recording → Processing → Speaking → Recording. All transitions go
//! through `handle`; `tick` turns one poll interval of hardware activity into
//! events.
//!
//! Network work (the upload and the reply audio download) runs on worker
//! threads so a close is never stuck behind a slow request. Processing covers
//! both; the interrupt monitor opens only once the reply audio is in hand.

use super::interrupt::PlaybackInterruptMonitor;
use super::session::{RecordingSession, Utterance};
use super::state::{
    timeout_status, SessionSnapshot, SharedSession, TurnEvent, TurnState, ERROR_PLAYBACK_FAILED,
    ERROR_PROCESSING_FAILED, ERROR_START_FAILED, STATUS_INTERRUPTED, STATUS_PROCESSING,
};
use super::watchdog::{SilenceConfig, SilenceWatchdog, WatchdogEvent};
use crate::audio::capture::Microphone;
use crate::audio::output::ReplyPlayer;
use crate::messages::Conversation;
use crate::speech::client::{BotReply, TranscriptionService};
use crate::{Result, VoiceError};
use crossbeam_channel::{bounded, Receiver, TryRecvError};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::thread;
use tracing::{debug, error, info, warn};

/// Thresholds and timing for the turn cycle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TurnConfig {
    pub silence: SilenceConfig,
    /// Level that counts as the user talking over playback (dB)
    pub interrupt_threshold_db: f32,
}

impl Default for TurnConfig {
    fn default() -> Self {
        Self {
            silence: SilenceConfig::default(),
            interrupt_threshold_db: -40.0,
        }
    }
}

/// Result of the background work the session is waiting on
enum Pending {
    Reply(Receiver<Result<BotReply>>),
    Audio(Receiver<Result<Vec<u8>>>),
}

pub struct TurnController {
    config: TurnConfig,
    microphone: Box<dyn Microphone>,
    player: Box<dyn ReplyPlayer>,
    service: Arc<dyn TranscriptionService>,
    conversation: Conversation,
    shared: SharedSession,

    state: TurnState,
    status: Option<String>,
    error: Option<String>,

    recording: Option<RecordingSession>,
    watchdog: Option<SilenceWatchdog>,
    monitor: Option<PlaybackInterruptMonitor>,
    /// In-flight worker result. Dropping it discards the result.
    pending: Option<Pending>,
    submissions: u64,
}

impl TurnController {
    pub fn new(
        config: TurnConfig,
        microphone: Box<dyn Microphone>,
        player: Box<dyn ReplyPlayer>,
        service: Arc<dyn TranscriptionService>,
    ) -> Self {
        let controller = Self {
            config,
            microphone,
            player,
            service,
            conversation: Conversation::new(),
            shared: SharedSession::new(),
            state: TurnState::default(),
            status: None,
            error: None,
            recording: None,
            watchdog: None,
            monitor: None,
            pending: None,
            submissions: 0,
        };
        controller.publish();
        controller
    }

    pub fn start(&mut self) {
        self.handle(TurnEvent::StartRequested);
    }

    pub fn stop(&mut self) {
        self.handle(TurnEvent::StopRequested);
    }

    pub fn close(&mut self) {
        self.handle(TurnEvent::CloseRequested);
    }

    /// Apply one event to the session
    pub fn handle(&mut self, event: TurnEvent) {
        debug!("{} in state {}", event.name(), self.state);

        match event {
            TurnEvent::StartRequested => self.begin_recording(None),
            TurnEvent::StopRequested => self.finish_recording(),
            TurnEvent::CloseRequested => self.shutdown(),
            TurnEvent::SilenceTimedOut => self.on_silence_timeout(),
            TurnEvent::SubmissionCompleted(result) => self.on_submission_completed(result),
            TurnEvent::ReplyAudioReady(result) => self.on_reply_audio_ready(result),
            TurnEvent::PlaybackEnded => self.on_playback_ended(),
            TurnEvent::InterruptDetected => self.on_interrupt(),
        }

        self.publish();
    }

    /// Advance by one poll interval
    pub fn tick(&mut self) {
        match self.state {
            TurnState::Recording { .. } => self.tick_recording(),
            TurnState::Processing => self.tick_processing(),
            TurnState::Speaking => self.tick_speaking(),
            TurnState::Idle { .. } => {}
        }
        self.publish();
    }

    fn tick_recording(&mut self) {
        let (Some(session), Some(watchdog)) = (self.recording.as_mut(), self.watchdog.as_mut())
        else {
            return;
        };

        session.pump();
        let level = session.meter().sample();

        match watchdog.poll(level) {
            WatchdogEvent::Voiced => {
                self.state = TurnState::recording();
            }
            WatchdogEvent::Silent {
                elapsed_secs,
                stops_in_secs,
            } => {
                self.state = TurnState::Recording {
                    silence_elapsed_secs: elapsed_secs,
                    stops_in_secs,
                };
            }
            WatchdogEvent::TimedOut => self.handle(TurnEvent::SilenceTimedOut),
            WatchdogEvent::Stopped => {}
        }
    }

    fn tick_processing(&mut self) {
        let event = match &self.pending {
            Some(Pending::Reply(rx)) => poll_worker(rx, || {
                VoiceError::SubmissionFailed("Submission worker exited without a result".into())
            })
            .map(TurnEvent::SubmissionCompleted),
            Some(Pending::Audio(rx)) => poll_worker(rx, || {
                VoiceError::PlaybackFailed("Fetch worker exited without a result".into())
            })
            .map(TurnEvent::ReplyAudioReady),
            None => None,
        };

        if let Some(event) = event {
            self.handle(event);
        }
    }

    fn tick_speaking(&mut self) {
        if let Some(monitor) = self.monitor.as_mut() {
            if monitor.poll() {
                self.handle(TurnEvent::InterruptDetected);
                return;
            }
        }

        if self.player.is_finished() {
            self.handle(TurnEvent::PlaybackEnded);
        }
    }

    // === Transitions ===

    fn begin_recording(&mut self, status: Option<String>) {
        self.cleanup();
        self.error = None;
        self.status = status;

        match RecordingSession::start(self.microphone.as_mut()) {
            Ok(session) => {
                self.recording = Some(session);
                self.watchdog = Some(SilenceWatchdog::new(self.config.silence.clone()));
                self.state = TurnState::recording();
                info!("Recording started");
            }
            Err(e) => {
                error!("Failed to start recording: {}", e);
                self.cleanup();
                self.status = None;
                self.error = Some(format!("{}: {}", ERROR_START_FAILED, e.user_message()));
                self.state = TurnState::default();
            }
        }
    }

    fn finish_recording(&mut self) {
        if !self.state.is_recording() {
            debug!("Stop ignored, not recording");
            return;
        }

        self.watchdog = None;
        let outcome = match self.recording.take() {
            Some(mut session) => session.stop(),
            None => Ok(None),
        };

        match outcome {
            Ok(Some(utterance)) => self.submit(utterance),
            Ok(None) => {
                info!("Nothing captured, skipping submission");
                self.status = None;
                self.state = TurnState::default();
            }
            Err(e) => {
                error!("Failed to finalize recording: {}", e);
                self.status = None;
                self.error = Some(ERROR_PROCESSING_FAILED.to_string());
                self.state = TurnState::default();
            }
        }
    }

    fn on_silence_timeout(&mut self) {
        if !self.state.is_recording() {
            return;
        }

        if let Some(mut session) = self.recording.take() {
            session.mark_timed_out();
            if let Err(e) = session.stop() {
                warn!("Error while releasing timed out recording: {}", e);
            }
        }
        self.cleanup();

        let timeout_secs = self.config.silence.timeout_secs;
        info!("Recording ended after {}s of silence", timeout_secs);
        self.status = Some(timeout_status(timeout_secs));
        self.state = TurnState::Idle { timed_out: true };
    }

    fn submit(&mut self, utterance: Utterance) {
        let service = Arc::clone(&self.service);

        info!(
            "Submitting utterance ({} bytes, {:.1}s)",
            utterance.data.len(),
            utterance.duration_secs()
        );

        match spawn_worker("voiceloop-submit", move || service.submit_utterance(&utterance)) {
            Ok(rx) => {
                self.submissions += 1;
                self.pending = Some(Pending::Reply(rx));
                self.status = Some(STATUS_PROCESSING.to_string());
                self.state = TurnState::Processing;
            }
            Err(e) => {
                error!("Failed to spawn submission worker: {}", e);
                self.status = None;
                self.error = Some(ERROR_PROCESSING_FAILED.to_string());
                self.state = TurnState::default();
            }
        }
    }

    fn on_submission_completed(&mut self, result: Result<BotReply>) {
        if !self.state.is_processing() || !matches!(self.pending, Some(Pending::Reply(_))) {
            debug!("Dropping submission result that arrived in state {}", self.state);
            return;
        }
        self.pending = None;

        match result.and_then(BotReply::validate) {
            Ok(reply) => {
                info!("Transcription: {}", reply.transcription);
                self.conversation.record_turn(&reply);
                self.fetch_reply_audio(reply.audio_url);
            }
            Err(e) => {
                error!("Processing error: {}", e);
                self.status = None;
                self.error = Some(ERROR_PROCESSING_FAILED.to_string());
                self.state = TurnState::default();
            }
        }
    }

    fn fetch_reply_audio(&mut self, audio_url: String) {
        let service = Arc::clone(&self.service);
        debug!("Fetching reply audio from {}", audio_url);

        match spawn_worker("voiceloop-fetch", move || service.fetch_reply_audio(&audio_url)) {
            Ok(rx) => self.pending = Some(Pending::Audio(rx)),
            Err(e) => self.fail_playback(VoiceError::PlaybackFailed(format!(
                "Failed to spawn fetch worker: {}",
                e
            ))),
        }
    }

    fn on_reply_audio_ready(&mut self, result: Result<Vec<u8>>) {
        if !self.state.is_processing() || !matches!(self.pending, Some(Pending::Audio(_))) {
            debug!("Dropping reply audio that arrived in state {}", self.state);
            return;
        }
        self.pending = None;

        match result {
            Ok(audio) => self.start_playback(audio),
            Err(e) => self.fail_playback(e),
        }
    }

    fn start_playback(&mut self, audio: Vec<u8>) {
        let threshold = self.config.interrupt_threshold_db;
        let started = PlaybackInterruptMonitor::start(self.microphone.as_mut(), threshold)
            .and_then(|monitor| {
                self.monitor = Some(monitor);
                self.player.play(audio)
            });

        match started {
            Ok(()) => {
                self.status = None;
                self.state = TurnState::Speaking;
                info!("Assistant speaking");
            }
            Err(e) => self.fail_playback(e),
        }
    }

    fn fail_playback(&mut self, e: VoiceError) {
        error!("Playback error: {}", e);
        self.cleanup();
        self.status = None;
        self.error = Some(ERROR_PLAYBACK_FAILED.to_string());
        self.state = TurnState::default();
    }

    fn on_playback_ended(&mut self) {
        if !self.state.is_speaking() {
            return;
        }
        info!("Reply finished, listening again");
        self.begin_recording(None);
    }

    fn on_interrupt(&mut self) {
        if !self.state.is_speaking() {
            return;
        }
        self.player.pause();
        self.begin_recording(Some(STATUS_INTERRUPTED.to_string()));
    }

    fn shutdown(&mut self) {
        self.cleanup();
        self.status = None;
        self.state = TurnState::default();
        info!("Voice session closed");
    }

    /// Release every acquired resource. Safe to call at any time.
    fn cleanup(&mut self) {
        if let Some(mut session) = self.recording.take() {
            session.abort();
        }
        self.watchdog = None;
        if let Some(mut monitor) = self.monitor.take() {
            monitor.stop();
        }
        self.player.release();
        if self.pending.take().is_some() {
            debug!("Abandoned in-flight worker");
        }
    }

    fn publish(&self) {
        let snapshot = self.snapshot();
        if self.shared.publish(snapshot) {
            debug!("Session state: {}", self.state);
        }
    }

    // === Accessors ===

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot::new(
            self.state,
            self.status.clone(),
            self.error.clone(),
            self.conversation.len(),
        )
    }

    pub fn state(&self) -> TurnState {
        self.state
    }

    pub fn shared(&self) -> SharedSession {
        self.shared.clone()
    }

    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    pub fn config(&self) -> &TurnConfig {
        &self.config
    }

    /// Number of utterances handed to the transcription service
    pub fn submission_count(&self) -> u64 {
        self.submissions
    }

    /// True while any microphone stream is held, for recording or monitoring
    pub fn holds_microphone(&self) -> bool {
        self.recording.as_ref().is_some_and(RecordingSession::is_active)
            || self.monitor.as_ref().is_some_and(PlaybackInterruptMonitor::is_open)
    }

    /// True while a poll consumer (watchdog or interrupt monitor) is armed
    pub fn has_active_poller(&self) -> bool {
        self.watchdog.is_some() || self.monitor.as_ref().is_some_and(PlaybackInterruptMonitor::is_open)
    }

    /// True while an upload or a reply audio download is outstanding
    pub fn is_submission_pending(&self) -> bool {
        self.pending.is_some()
    }
}

/// Run `job` on a named thread, handing its result back over a channel
fn spawn_worker<T, F>(name: &str, job: F) -> std::io::Result<Receiver<Result<T>>>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T> + Send + 'static,
{
    let (tx, rx) = bounded(1);
    thread::Builder::new().name(name.into()).spawn(move || {
        // Receiver is gone if the session moved on
        let _ = tx.send(job());
    })?;
    Ok(rx)
}

fn poll_worker<T>(
    rx: &Receiver<Result<T>>,
    lost: impl FnOnce() -> VoiceError,
) -> Option<Result<T>> {
    match rx.try_recv() {
        Ok(result) => Some(result),
        Err(TryRecvError::Empty) => None,
        Err(TryRecvError::Disconnected) => Some(Err(lost())),
    }
}

impl Drop for TurnController {
    fn drop(&mut self) {
        self.cleanup();
    }
}
