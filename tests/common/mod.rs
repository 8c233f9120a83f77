//! Scripted stand-ins for the microphone, the reply player and the
//! transcription service

#![allow(dead_code)]

use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use voiceloop::audio::{AudioChunk, AudioRingBuffer, CaptureStream, Microphone, ReplyPlayer};
use voiceloop::speech::{BotReply, TranscriptionService};
use voiceloop::turn::{TurnConfig, TurnController, Utterance};
use voiceloop::{Result, VoiceError};

const WINDOW: usize = 64;

/// Amplitude of a constant signal at `db`
pub fn amplitude_for_db(db: f32) -> f32 {
    10f32.powf(db / 20.0)
}

#[derive(Default)]
struct MicState {
    open_streams: usize,
    max_open_streams: usize,
    opens: usize,
    attempts: usize,
    fail_attempt: Option<usize>,
    denied: bool,
    pending: Vec<AudioChunk>,
}

/// Microphone whose input level and captured chunks are set by the test
#[derive(Clone)]
pub struct ScriptedMicrophone {
    window: AudioRingBuffer,
    state: Arc<Mutex<MicState>>,
}

impl ScriptedMicrophone {
    pub fn new() -> Self {
        Self {
            window: AudioRingBuffer::new(WINDOW),
            state: Arc::new(Mutex::new(MicState::default())),
        }
    }

    /// Fill the analysis window with a constant signal at `db`
    pub fn set_level_db(&self, db: f32) {
        self.window.write(&[amplitude_for_db(db); WINDOW]);
    }

    pub fn set_silent(&self) {
        self.window.write(&[0.0; WINDOW]);
    }

    /// Deliver a captured chunk to whichever stream is open
    pub fn push_chunk(&self, samples: Vec<f32>) {
        self.state.lock().pending.push(AudioChunk::new(samples));
    }

    pub fn deny(&self) {
        self.state.lock().denied = true;
    }

    /// Make the `n`th open call (1-based, counting from now) report the
    /// device as unavailable
    pub fn fail_open_attempt(&self, n: usize) {
        let mut state = self.state.lock();
        state.fail_attempt = Some(state.attempts + n);
    }

    pub fn open_streams(&self) -> usize {
        self.state.lock().open_streams
    }

    pub fn max_open_streams(&self) -> usize {
        self.state.lock().max_open_streams
    }

    pub fn opens(&self) -> usize {
        self.state.lock().opens
    }
}

impl Microphone for ScriptedMicrophone {
    fn open(&mut self) -> Result<Box<dyn CaptureStream>> {
        let mut state = self.state.lock();
        state.attempts += 1;
        if state.denied {
            return Err(VoiceError::PermissionDenied("Permission denied by user".into()));
        }
        if state.fail_attempt == Some(state.attempts) {
            return Err(VoiceError::DeviceUnavailable("Device is busy".into()));
        }
        state.opens += 1;
        state.open_streams += 1;
        state.max_open_streams = state.max_open_streams.max(state.open_streams);

        Ok(Box::new(ScriptedStream {
            window: self.window.clone(),
            state: Arc::clone(&self.state),
            open: true,
        }))
    }
}

struct ScriptedStream {
    window: AudioRingBuffer,
    state: Arc<Mutex<MicState>>,
    open: bool,
}

impl CaptureStream for ScriptedStream {
    fn sample_rate(&self) -> u32 {
        16000
    }

    fn level_window(&self) -> AudioRingBuffer {
        self.window.clone()
    }

    fn take_chunks(&mut self) -> Vec<AudioChunk> {
        if !self.open {
            return Vec::new();
        }
        std::mem::take(&mut self.state.lock().pending)
    }

    fn close(&mut self) {
        if self.open {
            self.open = false;
            self.state.lock().open_streams -= 1;
        }
    }

    fn is_open(&self) -> bool {
        self.open
    }
}

impl Drop for ScriptedStream {
    fn drop(&mut self) {
        self.close();
    }
}

#[derive(Default)]
struct PlayerState {
    played: Vec<String>,
    playing: bool,
    paused: bool,
    finished: bool,
    fail: bool,
    releases: usize,
}

/// Player that never makes a sound; the test decides when playback ends
#[derive(Clone, Default)]
pub struct FakePlayer {
    state: Arc<Mutex<PlayerState>>,
}

impl FakePlayer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn finish(&self) {
        self.state.lock().finished = true;
    }

    pub fn fail_next(&self) {
        self.state.lock().fail = true;
    }

    pub fn played(&self) -> Vec<String> {
        self.state.lock().played.clone()
    }

    pub fn is_playing(&self) -> bool {
        self.state.lock().playing
    }

    pub fn is_paused(&self) -> bool {
        self.state.lock().paused
    }

    pub fn releases(&self) -> usize {
        self.state.lock().releases
    }
}

impl ReplyPlayer for FakePlayer {
    /// Records the audio as text; `FakeService` serves the URL as the bytes
    fn play(&mut self, audio: Vec<u8>) -> Result<()> {
        let mut state = self.state.lock();
        if state.fail {
            state.fail = false;
            return Err(VoiceError::PlaybackFailed("unsupported format".into()));
        }
        state.played.push(String::from_utf8_lossy(&audio).into_owned());
        state.playing = true;
        state.paused = false;
        state.finished = false;
        Ok(())
    }

    fn pause(&mut self) {
        let mut state = self.state.lock();
        if state.playing {
            state.paused = true;
        }
    }

    fn is_finished(&self) -> bool {
        let state = self.state.lock();
        state.playing && !state.paused && state.finished
    }

    fn release(&mut self) {
        let mut state = self.state.lock();
        state.playing = false;
        state.finished = false;
        state.releases += 1;
    }

    fn is_active(&self) -> bool {
        self.state.lock().playing
    }
}

#[derive(Default)]
struct ServiceState {
    reply: Option<Result<BotReply>>,
    submissions: Vec<usize>,
    fetches: Vec<String>,
    delay: Duration,
    fetch_delay: Duration,
    fetch_error: Option<String>,
}

/// Transcription service with a canned answer
#[derive(Clone, Default)]
pub struct FakeService {
    state: Arc<Mutex<ServiceState>>,
}

impl FakeService {
    pub fn replying(reply: BotReply) -> Self {
        let service = Self::default();
        service.state.lock().reply = Some(Ok(reply));
        service
    }

    pub fn failing(message: &str) -> Self {
        let service = Self::default();
        service.state.lock().reply = Some(Err(VoiceError::SubmissionFailed(message.into())));
        service
    }

    pub fn with_delay(self, delay: Duration) -> Self {
        self.state.lock().delay = delay;
        self
    }

    /// Hold every reply audio download for `delay`
    pub fn with_fetch_delay(self, delay: Duration) -> Self {
        self.state.lock().fetch_delay = delay;
        self
    }

    pub fn failing_fetch(self, message: &str) -> Self {
        self.state.lock().fetch_error = Some(message.into());
        self
    }

    /// Every reply audio URL requested, in order
    pub fn fetches(&self) -> Vec<String> {
        self.state.lock().fetches.clone()
    }

    /// Byte size of every utterance received, in order
    pub fn submissions(&self) -> Vec<usize> {
        self.state.lock().submissions.clone()
    }
}

impl TranscriptionService for FakeService {
    fn submit_utterance(&self, utterance: &Utterance) -> Result<BotReply> {
        let (reply, delay) = {
            let mut state = self.state.lock();
            state.submissions.push(utterance.data.len());
            (state.reply.clone(), state.delay)
        };

        if !delay.is_zero() {
            std::thread::sleep(delay);
        }

        reply.unwrap_or_else(|| Err(VoiceError::SubmissionFailed("no reply configured".into())))
    }

    fn fetch_reply_audio(&self, audio_url: &str) -> Result<Vec<u8>> {
        let (delay, failure) = {
            let mut state = self.state.lock();
            state.fetches.push(audio_url.to_string());
            (state.fetch_delay, state.fetch_error.clone())
        };

        if !delay.is_zero() {
            std::thread::sleep(delay);
        }

        match failure {
            Some(message) => Err(VoiceError::PlaybackFailed(message)),
            None => Ok(audio_url.as_bytes().to_vec()),
        }
    }
}

pub fn sample_reply() -> BotReply {
    BotReply {
        transcription: "what is the weather".into(),
        response_text: "It is sunny today.".into(),
        audio_url: "https://cdn.example.com/reply.mp3".into(),
    }
}

pub struct Harness {
    pub controller: TurnController,
    pub mic: ScriptedMicrophone,
    pub player: FakePlayer,
    pub service: FakeService,
}

impl Harness {
    pub fn new(service: FakeService) -> Self {
        Self::with_config(TurnConfig::default(), service)
    }

    pub fn with_config(config: TurnConfig, service: FakeService) -> Self {
        let mic = ScriptedMicrophone::new();
        let player = FakePlayer::new();
        let controller = TurnController::new(
            config,
            Box::new(mic.clone()),
            Box::new(player.clone()),
            Arc::new(service.clone()),
        );
        Self {
            controller,
            mic,
            player,
            service,
        }
    }

    /// Tick `n` poll intervals
    pub fn ticks(&mut self, n: usize) {
        for _ in 0..n {
            self.controller.tick();
        }
    }

    /// Tick until the pending submission has been handled
    pub fn settle(&mut self) {
        for _ in 0..500 {
            self.controller.tick();
            if !self.controller.state().is_processing() {
                return;
            }
            std::thread::sleep(Duration::from_millis(2));
        }
        panic!("submission did not complete");
    }

    /// Record three chunks, stop, and wait for the reply. Leaves the input silent.
    pub fn complete_turn(&mut self) {
        self.controller.start();
        self.mic.set_level_db(-20.0);
        for _ in 0..3 {
            self.mic.push_chunk(vec![0.1; 1600]);
            self.controller.tick();
        }
        self.mic.set_silent();
        self.controller.stop();
        self.settle();
    }
}
