pub mod buffer;
pub mod capture;
#[cfg(feature = "audio-io")]
pub mod input;
pub mod meter;
pub mod output;
pub mod wav;

pub use buffer::AudioRingBuffer;
pub use capture::{AudioChunk, CaptureStream, Microphone};
#[cfg(feature = "audio-io")]
pub use input::CpalMicrophone;
pub use meter::{rms_db, AudioLevelMeter};
#[cfg(feature = "audio-io")]
pub use output::RodioPlayer;
pub use output::ReplyPlayer;
pub use wav::{decode_wav, encode_wav};
