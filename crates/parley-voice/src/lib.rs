//! Parley voice crate - speech-to-text and text-to-speech collaborators.
//!
//! Provides trait-based abstractions for transcription and synthesis, an
//! OpenAI-compatible HTTP implementation of both, a bounded in-memory store
//! for synthesized clips, and mock implementations for tests.

pub mod openai;
pub mod store;

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

pub use openai::OpenAiSpeech;
pub use store::AudioStore;

// =============================================================================
// Errors
// =============================================================================

/// Errors from the speech collaborators.
#[derive(Debug, thiserror::Error)]
pub enum VoiceError {
    #[error("Missing API key: {0}")]
    MissingApiKey(String),
    #[error("Speech service error {status}: {body}")]
    Http { status: u16, body: String },
    #[error("Speech request failed: {0}")]
    Transport(String),
    #[error("Unexpected speech response: {0}")]
    Decode(String),
    #[error("Cannot process empty audio")]
    EmptyAudio,
}

impl From<reqwest::Error> for VoiceError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            VoiceError::Decode(err.to_string())
        } else {
            VoiceError::Transport(err.to_string())
        }
    }
}

pub type Result<T> = std::result::Result<T, VoiceError>;

// =============================================================================
// Types
// =============================================================================

/// Encoded audio produced by a synthesizer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SynthesizedAudio {
    pub bytes: Vec<u8>,
    /// MIME type of `bytes`, e.g. `audio/mpeg`.
    pub content_type: String,
}

// =============================================================================
// Traits
// =============================================================================

/// Turns a push-to-talk recording into text.
#[async_trait]
pub trait Transcriber: Send + Sync {
    /// Transcribe one encoded recording (webm/opus from the browser).
    ///
    /// Returns the trimmed transcript; an empty string means nothing was
    /// understood and is not an error.
    async fn transcribe(&self, audio: &[u8]) -> Result<String>;
}

/// Turns assistant text into playable audio.
#[async_trait]
pub trait Synthesizer: Send + Sync {
    async fn synthesize(&self, text: &str) -> Result<SynthesizedAudio>;
}

// =============================================================================
// Mock implementations
// =============================================================================

/// Mock transcriber that replays scripted transcripts in order.
///
/// Once the script is exhausted every call returns an empty transcript.
#[derive(Debug, Default)]
pub struct MockTranscriber {
    script: Mutex<VecDeque<String>>,
}

impl MockTranscriber {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_script<I, S>(script: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            script: Mutex::new(script.into_iter().map(Into::into).collect()),
        }
    }
}

#[async_trait]
impl Transcriber for MockTranscriber {
    async fn transcribe(&self, audio: &[u8]) -> Result<String> {
        if audio.is_empty() {
            return Err(VoiceError::EmptyAudio);
        }
        let next = self
            .script
            .lock()
            .map(|mut script| script.pop_front())
            .unwrap_or(None);
        tracing::debug!(bytes = audio.len(), "Mock transcription generated");
        Ok(next.unwrap_or_default().trim().to_string())
    }
}

/// Mock synthesizer that echoes the text back as bytes.
#[derive(Debug, Default)]
pub struct MockSynthesizer {
    calls: AtomicUsize,
    fail: bool,
}

impl MockSynthesizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// A synthesizer whose every call fails.
    pub fn failing() -> Self {
        Self {
            calls: AtomicUsize::new(0),
            fail: true,
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Synthesizer for MockSynthesizer {
    async fn synthesize(&self, text: &str) -> Result<SynthesizedAudio> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(VoiceError::Http {
                status: 503,
                body: "speech unavailable".to_string(),
            });
        }
        Ok(SynthesizedAudio {
            bytes: text.as_bytes().to_vec(),
            content_type: "audio/mpeg".to_string(),
        })
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_transcriber_replays_script() {
        let stt = MockTranscriber::with_script(["  read my latest email ", "thanks"]);
        assert_eq!(stt.transcribe(b"a").await.unwrap(), "read my latest email");
        assert_eq!(stt.transcribe(b"b").await.unwrap(), "thanks");
        assert_eq!(stt.transcribe(b"c").await.unwrap(), "");
    }

    #[tokio::test]
    async fn test_mock_transcriber_empty_audio() {
        let stt = MockTranscriber::new();
        assert!(matches!(
            stt.transcribe(&[]).await,
            Err(VoiceError::EmptyAudio)
        ));
    }

    #[tokio::test]
    async fn test_mock_synthesizer_counts_calls() {
        let tts = MockSynthesizer::new();
        let audio = tts.synthesize("Hello").await.unwrap();
        assert_eq!(audio.bytes, b"Hello");
        assert_eq!(audio.content_type, "audio/mpeg");
        assert_eq!(tts.calls(), 1);
    }

    #[tokio::test]
    async fn test_failing_synthesizer() {
        let tts = MockSynthesizer::failing();
        let err = tts.synthesize("Hello").await.unwrap_err();
        assert_eq!(err.to_string(), "Speech service error 503: speech unavailable");
        assert_eq!(tts.calls(), 1);
    }

    #[test]
    fn test_voice_error_display() {
        let err = VoiceError::MissingApiKey("OPENAI_API_KEY".to_string());
        assert_eq!(err.to_string(), "Missing API key: OPENAI_API_KEY");
        assert_eq!(VoiceError::EmptyAudio.to_string(), "Cannot process empty audio");
    }
}
