use crate::{Result, VoiceError};
use hound::{SampleFormat, WavReader, WavSpec, WavWriter};
use std::io::Cursor;
use tracing::debug;

/// Encode mono f32 samples as an in-memory 16-bit PCM WAV file
///
/// # Arguments
/// * `samples` - Audio samples (f32, range -1.0 to 1.0)
/// * `sample_rate` - Sample rate in Hz
pub fn encode_wav(samples: &[f32], sample_rate: u32) -> Result<Vec<u8>> {
    let spec = WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };

    let mut bytes = Vec::with_capacity(44 + samples.len() * 2);
    {
        let mut writer = WavWriter::new(Cursor::new(&mut bytes), spec)
            .map_err(|e| VoiceError::AudioProcessing(format!("Failed to create WAV writer: {}", e)))?;

        // Convert f32 samples to i16
        for &sample in samples {
            let sample_i16 = (sample.clamp(-1.0, 1.0) * i16::MAX as f32) as i16;
            writer
                .write_sample(sample_i16)
                .map_err(|e| VoiceError::AudioProcessing(format!("Failed to write sample: {}", e)))?;
        }

        writer
            .finalize()
            .map_err(|e| VoiceError::AudioProcessing(format!("Failed to finalize WAV data: {}", e)))?;
    }

    debug!("Encoded {} samples into {} WAV bytes", samples.len(), bytes.len());
    Ok(bytes)
}

/// Decode a 16-bit PCM WAV file held in memory
///
/// # Returns
/// * Tuple of (samples, sample_rate, channels)
pub fn decode_wav(bytes: &[u8]) -> Result<(Vec<f32>, u32, u16)> {
    let mut reader = WavReader::new(Cursor::new(bytes))
        .map_err(|e| VoiceError::AudioProcessing(format!("Failed to read WAV data: {}", e)))?;

    let spec = reader.spec();
    if spec.sample_format != SampleFormat::Int || spec.bits_per_sample != 16 {
        return Err(VoiceError::AudioProcessing(format!(
            "Unsupported WAV format: {:?} {} bits",
            spec.sample_format, spec.bits_per_sample
        )));
    }

    let samples = reader
        .samples::<i16>()
        .map(|s| {
            s.map(|sample| sample as f32 / i16::MAX as f32)
                .map_err(|e| VoiceError::AudioProcessing(format!("Failed to read sample: {}", e)))
        })
        .collect::<Result<Vec<f32>>>()?;

    Ok((samples, spec.sample_rate, spec.channels))
}
