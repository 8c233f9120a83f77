//! Microphone seams used by the turn controller
//!
//! The controller only talks to these traits. The cpal implementation lives
//! in `audio::input`; tests plug in scripted streams.

use super::buffer::AudioRingBuffer;
use crate::Result;

/// One fragment of captured mono audio, in capture order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AudioChunk {
    pub samples: Vec<f32>,
}

impl AudioChunk {
    pub fn new(samples: Vec<f32>) -> Self {
        Self { samples }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// A live microphone acquisition
///
/// Dropping the stream must release the device as well; `close` does it
/// eagerly and is safe to call more than once.
pub trait CaptureStream {
    /// Sample rate of the mono samples this stream delivers
    fn sample_rate(&self) -> u32;

    /// Analysis window the capture callback keeps filled
    fn level_window(&self) -> AudioRingBuffer;

    /// Drain every chunk delivered since the previous call
    fn take_chunks(&mut self) -> Vec<AudioChunk>;

    /// Stop capture and release the device
    fn close(&mut self);

    fn is_open(&self) -> bool;
}

/// Source of fresh microphone acquisitions
pub trait Microphone {
    /// Acquire the input device and start capturing
    ///
    /// Fails with `PermissionDenied` when access is refused and
    /// `DeviceUnavailable` when there is nothing to capture from.
    fn open(&mut self) -> Result<Box<dyn CaptureStream>>;
}
