//! Client for the remote transcription + response service
//!
//! The service takes one recorded utterance and answers with the
//! transcription, the assistant's reply text, and a URL to the spoken reply.

use crate::turn::session::Utterance;
use crate::{Result, VoiceError};
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info};

/// What the service returns for one utterance
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BotReply {
    pub transcription: String,
    pub response_text: String,
    pub audio_url: String,
}

impl BotReply {
    /// A reply is usable only if every field is present
    pub fn validate(self) -> Result<Self> {
        if self.transcription.trim().is_empty() {
            return Err(VoiceError::SubmissionFailed("Reply has no transcription".into()));
        }
        if self.response_text.trim().is_empty() {
            return Err(VoiceError::SubmissionFailed("Reply has no response text".into()));
        }
        if self.audio_url.trim().is_empty() {
            return Err(VoiceError::SubmissionFailed("Reply has no audio URL".into()));
        }
        Ok(self)
    }
}

/// Backend that turns an utterance into a reply
///
/// Both calls block and run off the controller's thread.
pub trait TranscriptionService: Send + Sync {
    /// Submit one utterance. Any non-success outcome is `SubmissionFailed`.
    fn submit_utterance(&self, utterance: &Utterance) -> Result<BotReply>;

    /// Download the audio behind a reply's `audio_url`. Failures are
    /// `PlaybackFailed`.
    fn fetch_reply_audio(&self, audio_url: &str) -> Result<Vec<u8>>;
}

/// Wire shape of `POST /api/transcribe`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TranscribeResponse {
    #[serde(default)]
    transcription: String,
    #[serde(default)]
    rag_response: String,
    #[serde(default)]
    audio_url: String,
}

impl From<TranscribeResponse> for BotReply {
    fn from(r: TranscribeResponse) -> Self {
        Self {
            transcription: r.transcription,
            response_text: r.rag_response,
            audio_url: r.audio_url,
        }
    }
}

/// Parse a `/api/transcribe` JSON body into a validated reply
pub fn parse_reply(body: &[u8]) -> Result<BotReply> {
    let response: TranscribeResponse = serde_json::from_slice(body)
        .map_err(|e| VoiceError::SubmissionFailed(format!("Malformed reply: {}", e)))?;
    BotReply::from(response).validate()
}

/// HTTP transcription service
///
/// Uploads the utterance as multipart field `audio` named `recording.wav`.
#[derive(Debug, Clone)]
pub struct HttpTranscriptionService {
    /// Base URL without trailing slash (e.g. http://localhost:5000)
    pub base_url: String,
    client: reqwest::blocking::Client,
}

impl HttpTranscriptionService {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| VoiceError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            base_url: base_url.into(),
            client,
        })
    }

    pub fn endpoint(&self) -> String {
        format!("{}/api/transcribe", self.base_url.trim_end_matches('/'))
    }
}

impl TranscriptionService for HttpTranscriptionService {
    fn submit_utterance(&self, utterance: &Utterance) -> Result<BotReply> {
        if utterance.is_empty() {
            return Err(VoiceError::SubmissionFailed("Utterance is empty".into()));
        }

        let part = reqwest::blocking::multipart::Part::bytes(utterance.data.clone())
            .file_name("recording.wav")
            .mime_str(&utterance.mime_type)
            .map_err(|e| VoiceError::SubmissionFailed(format!("Invalid mime type: {}", e)))?;
        let form = reqwest::blocking::multipart::Form::new().part("audio", part);

        let url = self.endpoint();
        debug!("Submitting {} bytes to {}", utterance.data.len(), url);

        let response = self
            .client
            .post(&url)
            .multipart(form)
            .send()
            .map_err(|e| VoiceError::SubmissionFailed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(VoiceError::SubmissionFailed(format!(
                "Service error {}: {}",
                status, body
            )));
        }

        let body = response
            .bytes()
            .map_err(|e| VoiceError::SubmissionFailed(e.to_string()))?;
        let reply = parse_reply(&body)?;

        info!("Received reply ({} chars)", reply.response_text.len());
        Ok(reply)
    }

    /// Remote URLs are downloaded, anything else is read as a local path
    fn fetch_reply_audio(&self, audio_url: &str) -> Result<Vec<u8>> {
        if !(audio_url.starts_with("http://") || audio_url.starts_with("https://")) {
            let path = audio_url.strip_prefix("file://").unwrap_or(audio_url);
            return std::fs::read(path)
                .map_err(|e| VoiceError::PlaybackFailed(format!("Failed to read {}: {}", path, e)));
        }

        let response = self
            .client
            .get(audio_url)
            .send()
            .map_err(|e| VoiceError::PlaybackFailed(format!("Failed to fetch reply audio: {}", e)))?;

        if !response.status().is_success() {
            return Err(VoiceError::PlaybackFailed(format!(
                "Reply audio request returned {}",
                response.status()
            )));
        }

        let bytes = response
            .bytes()
            .map_err(|e| VoiceError::PlaybackFailed(format!("Failed to read reply audio: {}", e)))?;
        debug!("Fetched {} bytes of reply audio", bytes.len());
        Ok(bytes.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_reply() {
        let body = br#"{"transcription":"hello","ragResponse":"hi there","audioUrl":"https://cdn/x.mp3"}"#;
        let reply = parse_reply(body).unwrap();
        assert_eq!(reply.transcription, "hello");
        assert_eq!(reply.response_text, "hi there");
        assert_eq!(reply.audio_url, "https://cdn/x.mp3");
    }

    #[test]
    fn test_missing_fields_are_rejected() {
        let body = br#"{"transcription":"hello"}"#;
        assert!(matches!(parse_reply(body), Err(VoiceError::SubmissionFailed(_))));
    }

    #[test]
    fn test_error_body_is_rejected() {
        let body = br#"{"error":"Failed to transcribe audio"}"#;
        assert!(parse_reply(body).is_err());
        assert!(parse_reply(b"<html>").is_err());
    }

    #[test]
    fn test_endpoint_trims_slash() {
        let service =
            HttpTranscriptionService::new("http://localhost:5000/", Duration::from_secs(5)).unwrap();
        assert_eq!(service.endpoint(), "http://localhost:5000/api/transcribe");
    }

    #[test]
    fn test_fetch_local_reply_audio() {
        let service =
            HttpTranscriptionService::new("http://127.0.0.1:9", Duration::from_secs(1)).unwrap();
        let mut file = tempfile::NamedTempFile::new().unwrap();
        std::io::Write::write_all(&mut file, b"ID3 fake mp3").unwrap();

        let path = file.path().to_string_lossy().to_string();
        assert_eq!(service.fetch_reply_audio(&path).unwrap(), b"ID3 fake mp3");
        assert_eq!(
            service.fetch_reply_audio(&format!("file://{}", path)).unwrap(),
            b"ID3 fake mp3"
        );
    }

    #[test]
    fn test_missing_reply_audio_is_playback_failure() {
        let service =
            HttpTranscriptionService::new("http://127.0.0.1:9", Duration::from_secs(1)).unwrap();
        assert!(matches!(
            service.fetch_reply_audio("/nonexistent/reply.mp3"),
            Err(VoiceError::PlaybackFailed(_))
        ));
    }

    #[test]
    fn test_empty_utterance_is_not_sent() {
        let service =
            HttpTranscriptionService::new("http://127.0.0.1:9", Duration::from_secs(1)).unwrap();
        let empty = Utterance::from_wav(Vec::new(), 16000, 0);
        assert!(matches!(
            service.submit_utterance(&empty),
            Err(VoiceError::SubmissionFailed(_))
        ));
    }
}
