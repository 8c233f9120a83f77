use ringbuf::{traits::*, HeapRb};
use std::sync::Arc;
use parking_lot::Mutex;

/// Thread-safe sliding window over the most recent audio samples
///
/// The capture callback writes into it, the level meter reads a snapshot.
/// Once full, every write pushes out the oldest samples.
pub struct AudioRingBuffer {
    buffer: Arc<Mutex<HeapRb<f32>>>,
}

impl AudioRingBuffer {
    /// Create a new ring buffer with the specified capacity
    pub fn new(capacity: usize) -> Self {
        Self {
            buffer: Arc::new(Mutex::new(HeapRb::new(capacity.max(1)))),
        }
    }

    /// Write samples to the buffer, dropping the oldest ones when full
    pub fn write(&self, samples: &[f32]) {
        let mut buffer = self.buffer.lock();

        for &sample in samples {
            if buffer.try_push(sample).is_err() {
                let _ = buffer.try_pop();
                let _ = buffer.try_push(sample);
            }
        }
    }

    /// Copy out the current window without consuming it
    pub fn snapshot(&self) -> Vec<f32> {
        let buffer = self.buffer.lock();
        buffer.iter().copied().collect()
    }

    /// Get the number of samples currently held
    pub fn len(&self) -> usize {
        self.buffer.lock().occupied_len()
    }

    /// Check if the buffer is empty
    pub fn is_empty(&self) -> bool {
        self.buffer.lock().is_empty()
    }

    /// Clear the buffer
    pub fn clear(&self) {
        self.buffer.lock().clear();
    }

    /// Get the capacity of the buffer
    pub fn capacity(&self) -> usize {
        self.buffer.lock().capacity().get()
    }
}

impl Clone for AudioRingBuffer {
    fn clone(&self) -> Self {
        Self {
            buffer: Arc::clone(&self.buffer),
        }
    }
}
