//! Remote speech services
//!
//! This module provides:
//! - The transcription + response client the turn controller submits to

pub mod client;

pub use client::{parse_reply, BotReply, HttpTranscriptionService, TranscriptionService};
