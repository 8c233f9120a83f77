//! Reply playback
//!
//! `ReplyPlayer` is the playback resource the turn controller owns for the
//! lifetime of a session. `RodioPlayer` plays reply audio on the default
//! output device.

use crate::Result;

/// Plays the assistant's reply audio
pub trait ReplyPlayer {
    /// Decode already-fetched reply audio and start playing it
    fn play(&mut self, audio: Vec<u8>) -> Result<()>;

    /// Pause playback, keeping the loaded audio
    fn pause(&mut self);

    /// True once the loaded audio has played to the end
    fn is_finished(&self) -> bool;

    /// Stop playback and drop every output resource. Safe to call repeatedly.
    fn release(&mut self);

    fn is_active(&self) -> bool;
}

#[cfg(feature = "audio-io")]
pub use self::rodio_player::RodioPlayer;

#[cfg(feature = "audio-io")]
mod rodio_player {
    use super::ReplyPlayer;
    use crate::{Result, VoiceError};
    use rodio::{Decoder, OutputStream, OutputStreamHandle, Sink};
    use std::io::Cursor;
    use tracing::{debug, info};

    /// Reply player on the default rodio output device
    #[derive(Default)]
    pub struct RodioPlayer {
        output: Option<(OutputStream, OutputStreamHandle)>,
        sink: Option<Sink>,
        paused: bool,
    }

    impl RodioPlayer {
        pub fn new() -> Self {
            Self::default()
        }
    }

    impl ReplyPlayer for RodioPlayer {
        fn play(&mut self, audio: Vec<u8>) -> Result<()> {
            self.release();

            let source = Decoder::new(Cursor::new(audio))
                .map_err(|e| VoiceError::PlaybackFailed(format!("Decode failed: {}", e)))?;
            let (stream, handle) = OutputStream::try_default()
                .map_err(|e| VoiceError::PlaybackFailed(format!("No output device: {}", e)))?;
            let sink = Sink::try_new(&handle)
                .map_err(|e| VoiceError::PlaybackFailed(format!("Failed to create sink: {}", e)))?;

            sink.append(source);
            sink.play();

            self.output = Some((stream, handle));
            self.sink = Some(sink);
            self.paused = false;

            info!("Started reply playback");
            Ok(())
        }

        fn pause(&mut self) {
            if let Some(sink) = &self.sink {
                sink.pause();
                self.paused = true;
                info!("Paused reply playback");
            }
        }

        fn is_finished(&self) -> bool {
            match &self.sink {
                Some(sink) => !self.paused && sink.empty(),
                None => false,
            }
        }

        fn release(&mut self) {
            if let Some(sink) = self.sink.take() {
                sink.stop();
                debug!("Reply sink stopped");
            }
            if self.output.take().is_some() {
                debug!("Output stream released");
            }
            self.paused = false;
        }

        fn is_active(&self) -> bool {
            self.sink.is_some()
        }
    }

    impl Drop for RodioPlayer {
        fn drop(&mut self) {
            self.release();
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn test_undecodable_audio_is_playback_failure() {
            let mut player = RodioPlayer::new();
            let result = player.play(b"not audio at all".to_vec());
            assert!(matches!(result, Err(VoiceError::PlaybackFailed(_))));
            assert!(!player.is_active());
        }

        #[test]
        fn test_release_is_idempotent() {
            let mut player = RodioPlayer::new();
            player.release();
            player.release();
            assert!(!player.is_finished());
            assert!(!player.is_active());
        }
    }
}
