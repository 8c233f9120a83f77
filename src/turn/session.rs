//! One microphone acquisition and the audio it captures

use crate::audio::capture::{AudioChunk, CaptureStream, Microphone};
use crate::audio::meter::AudioLevelMeter;
use crate::audio::wav::encode_wav;
use crate::Result;
use tracing::{debug, info};

pub const WAV_MIME_TYPE: &str = "audio/wav";

/// A finalized recording, ready to be submitted once
#[derive(Debug, Clone, PartialEq)]
pub struct Utterance {
    pub data: Vec<u8>,
    pub mime_type: String,
    pub sample_rate: u32,
    pub sample_count: usize,
}

impl Utterance {
    pub fn from_wav(data: Vec<u8>, sample_rate: u32, sample_count: usize) -> Self {
        Self {
            data,
            mime_type: WAV_MIME_TYPE.to_string(),
            sample_rate,
            sample_count,
        }
    }

    /// Concatenate chunks in capture order and encode them as one WAV blob
    pub fn from_chunks(chunks: &[AudioChunk], sample_rate: u32) -> Result<Self> {
        let total: usize = chunks.iter().map(AudioChunk::len).sum();
        let mut samples = Vec::with_capacity(total);
        for chunk in chunks {
            samples.extend_from_slice(&chunk.samples);
        }

        let data = encode_wav(&samples, sample_rate)?;
        Ok(Self::from_wav(data, sample_rate, total))
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty() || self.sample_count == 0
    }

    pub fn duration_secs(&self) -> f32 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.sample_count as f32 / self.sample_rate as f32
    }
}

/// Owns one live recording: the microphone stream plus the chunk buffer
///
/// Once `mark_timed_out` has been called nothing captured afterwards is kept,
/// and `stop` yields no utterance.
pub struct RecordingSession {
    stream: Option<Box<dyn CaptureStream>>,
    meter: AudioLevelMeter,
    chunks: Vec<AudioChunk>,
    sample_rate: u32,
    timed_out: bool,
}

impl RecordingSession {
    /// Acquire the microphone and start buffering
    pub fn start(microphone: &mut dyn Microphone) -> Result<Self> {
        let stream = microphone.open()?;
        let meter = AudioLevelMeter::new(stream.level_window());
        let sample_rate = stream.sample_rate();

        info!("Recording session started ({} Hz)", sample_rate);

        Ok(Self {
            stream: Some(stream),
            meter,
            chunks: Vec::new(),
            sample_rate,
            timed_out: false,
        })
    }

    /// Meter over this session's live input
    pub fn meter(&self) -> &AudioLevelMeter {
        &self.meter
    }

    /// Buffer one captured chunk
    pub fn on_chunk(&mut self, chunk: AudioChunk) {
        if self.timed_out {
            debug!("Discarding {} samples captured after silence timeout", chunk.len());
            return;
        }
        if chunk.is_empty() {
            return;
        }
        self.chunks.push(chunk);
    }

    /// Move everything the stream delivered since the last call into the buffer
    pub fn pump(&mut self) -> usize {
        let delivered = match self.stream.as_mut() {
            Some(stream) => stream.take_chunks(),
            None => return 0,
        };

        let count = delivered.len();
        for chunk in delivered {
            self.on_chunk(chunk);
        }
        count
    }

    /// Flag the silence cutoff and throw away what was buffered
    pub fn mark_timed_out(&mut self) {
        self.timed_out = true;
        self.chunks.clear();
    }

    pub fn is_timed_out(&self) -> bool {
        self.timed_out
    }

    /// Halt capture and release the microphone
    ///
    /// Returns the utterance unless the session timed out or captured
    /// nothing. Calling it again after the session ended is a no-op.
    pub fn stop(&mut self) -> Result<Option<Utterance>> {
        if self.stream.is_none() {
            return Ok(None);
        }

        // Final data the stream delivered before it stopped
        self.pump();
        self.release();

        let chunks = std::mem::take(&mut self.chunks);
        if self.timed_out || chunks.is_empty() {
            debug!("Recording ended without submission ({} chunks)", chunks.len());
            return Ok(None);
        }

        let utterance = Utterance::from_chunks(&chunks, self.sample_rate)?;
        if utterance.is_empty() {
            return Ok(None);
        }

        info!(
            "Recording finalized: {} chunks, {:.1}s",
            chunks.len(),
            utterance.duration_secs()
        );
        Ok(Some(utterance))
    }

    /// Release the microphone and drop any buffered audio
    pub fn abort(&mut self) {
        self.chunks.clear();
        self.release();
    }

    fn release(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            stream.close();
        }
        self.meter.detach();
    }

    pub fn is_active(&self) -> bool {
        self.stream.is_some()
    }

    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    pub fn buffered_samples(&self) -> usize {
        self.chunks.iter().map(AudioChunk::len).sum()
    }
}

impl Drop for RecordingSession {
    fn drop(&mut self) {
        self.release();
    }
}
