use super::buffer::AudioRingBuffer;
use super::capture::{AudioChunk, CaptureStream, Microphone};
use crate::{Result, VoiceError};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{FromSample, Sample, SampleFormat, SizedSample, Stream, StreamConfig};
use crossbeam_channel::{bounded, Receiver, Sender};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, error, info};

/// Microphone backed by the default cpal input device
pub struct CpalMicrophone {
    window_size: usize,
    channel_capacity: usize,
}

impl CpalMicrophone {
    /// `window_size` is the number of samples the level meter looks at
    pub fn new(window_size: usize) -> Self {
        Self {
            window_size,
            channel_capacity: 1000,
        }
    }
}

impl Microphone for CpalMicrophone {
    fn open(&mut self) -> Result<Box<dyn CaptureStream>> {
        let stream = CpalCaptureStream::open(self.window_size, self.channel_capacity)?;
        Ok(Box::new(stream))
    }
}

/// One live cpal input stream
pub struct CpalCaptureStream {
    stream: Option<Stream>,
    sample_rate: u32,
    window: AudioRingBuffer,
    chunk_rx: Receiver<Vec<f32>>,
    is_capturing: Arc<AtomicBool>,
}

impl CpalCaptureStream {
    fn open(window_size: usize, channel_capacity: usize) -> Result<Self> {
        let host = cpal::default_host();

        let device = host
            .default_input_device()
            .ok_or_else(|| VoiceError::DeviceUnavailable("No input device available".into()))?;

        info!("Using input device: {}", device.name().unwrap_or_else(|_| "Unknown".to_string()));

        let supported = device.default_input_config().map_err(|e| match e {
            cpal::DefaultStreamConfigError::DeviceNotAvailable => {
                VoiceError::DeviceUnavailable("Input device disappeared".into())
            }
            other => classify_backend_message(format!("Failed to get input config: {}", other)),
        })?;

        let sample_format = supported.sample_format();
        let config: StreamConfig = supported.into();
        let sample_rate = config.sample_rate.0;

        let window = AudioRingBuffer::new(window_size);
        let (chunk_tx, chunk_rx) = bounded(channel_capacity);
        let is_capturing = Arc::new(AtomicBool::new(true));

        let stream = match sample_format {
            SampleFormat::F32 => build_stream::<f32>(&device, &config, &window, chunk_tx, &is_capturing),
            SampleFormat::I16 => build_stream::<i16>(&device, &config, &window, chunk_tx, &is_capturing),
            SampleFormat::U16 => build_stream::<u16>(&device, &config, &window, chunk_tx, &is_capturing),
            other => Err(VoiceError::DeviceUnavailable(format!(
                "Unsupported input sample format: {:?}",
                other
            ))),
        }?;

        stream.play().map_err(|e| match e {
            cpal::PlayStreamError::DeviceNotAvailable => {
                VoiceError::DeviceUnavailable("Input device disappeared".into())
            }
            other => classify_backend_message(format!("Failed to start input stream: {}", other)),
        })?;

        info!("Microphone capture started at {} Hz", sample_rate);

        Ok(Self {
            stream: Some(stream),
            sample_rate,
            window,
            chunk_rx,
            is_capturing,
        })
    }
}

fn build_stream<T>(
    device: &cpal::Device,
    config: &StreamConfig,
    window: &AudioRingBuffer,
    chunk_tx: Sender<Vec<f32>>,
    is_capturing: &Arc<AtomicBool>,
) -> Result<Stream>
where
    T: SizedSample,
    f32: FromSample<T>,
{
    let channels = config.channels as usize;
    let window = window.clone();
    let is_capturing = Arc::clone(is_capturing);

    let err_fn = |err| {
        error!("Audio input stream error: {}", err);
    };

    device
        .build_input_stream(
            config,
            move |data: &[T], _: &cpal::InputCallbackInfo| {
                if !is_capturing.load(Ordering::SeqCst) {
                    return;
                }

                // Average all channels to create mono
                let samples: Vec<f32> = data
                    .chunks(channels)
                    .map(|frame| {
                        frame.iter().map(|&s| s.to_sample::<f32>()).sum::<f32>() / channels as f32
                    })
                    .collect();

                window.write(&samples);

                if let Err(e) = chunk_tx.try_send(samples) {
                    debug!("Dropped captured audio: {}", e);
                }
            },
            err_fn,
            None,
        )
        .map_err(|e| match e {
            cpal::BuildStreamError::DeviceNotAvailable => {
                VoiceError::DeviceUnavailable("Input device disappeared".into())
            }
            other => classify_backend_message(format!("Failed to build input stream: {}", other)),
        })
}

/// Backends report refused access as free-form text
fn classify_backend_message(message: String) -> VoiceError {
    let lower = message.to_lowercase();
    if lower.contains("permission") || lower.contains("denied") || lower.contains("not authorized") {
        VoiceError::PermissionDenied(message)
    } else {
        VoiceError::DeviceUnavailable(message)
    }
}

impl CaptureStream for CpalCaptureStream {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn level_window(&self) -> AudioRingBuffer {
        self.window.clone()
    }

    fn take_chunks(&mut self) -> Vec<AudioChunk> {
        self.chunk_rx.try_iter().map(AudioChunk::new).collect()
    }

    fn close(&mut self) {
        self.is_capturing.store(false, Ordering::SeqCst);

        if let Some(stream) = self.stream.take() {
            drop(stream);
            self.window.clear();
            info!("Microphone capture released");
        }
    }

    fn is_open(&self) -> bool {
        self.stream.is_some()
    }
}

impl Drop for CpalCaptureStream {
    fn drop(&mut self) {
        self.close();
    }
}
