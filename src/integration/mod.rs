pub mod config;
pub mod runtime;

pub use config::VoiceConfig;
pub use runtime::{RuntimeCommand, RuntimeHandle, VoiceRuntime};
