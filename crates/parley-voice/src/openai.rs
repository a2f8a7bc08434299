//! OpenAI-compatible speech endpoints.

use async_trait::async_trait;
use parley_core::config::{ModelConfig, VoiceConfig};
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Response};
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use crate::{Result, SynthesizedAudio, Synthesizer, Transcriber, VoiceError};

/// Whisper transcription and TTS over `/v1/audio/*`.
#[derive(Clone)]
pub struct OpenAiSpeech {
    client: Client,
    base_url: String,
    api_key: String,
    stt_model: String,
    tts_model: String,
    voice: String,
}

#[derive(Deserialize)]
struct TranscriptionResponse {
    #[serde(default)]
    text: String,
}

impl OpenAiSpeech {
    pub fn new(api_key: impl Into<String>, model: &ModelConfig, voice: &VoiceConfig) -> Self {
        Self {
            client: Client::new(),
            base_url: model.base_url.trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            stt_model: voice.stt_model.clone(),
            tts_model: voice.tts_model.clone(),
            voice: voice.voice.clone(),
        }
    }

    /// Build from config, reading the key from `model.api_key_env`.
    pub fn from_env(model: &ModelConfig, voice: &VoiceConfig) -> Result<Self> {
        let key = std::env::var(&model.api_key_env)
            .ok()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| VoiceError::MissingApiKey(model.api_key_env.clone()))?;
        Ok(Self::new(key, model, voice))
    }

    fn url(&self, path: &str) -> String {
        format!("{}/v1/audio/{}", self.base_url, path)
    }
}

async fn check(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "Failed to read speech error body".to_string());
    Err(VoiceError::Http {
        status: status.as_u16(),
        body,
    })
}

#[async_trait]
impl Transcriber for OpenAiSpeech {
    async fn transcribe(&self, audio: &[u8]) -> Result<String> {
        if audio.is_empty() {
            return Err(VoiceError::EmptyAudio);
        }
        let file = Part::bytes(audio.to_vec())
            .file_name("speech.webm")
            .mime_str("audio/webm")?;
        let form = Form::new()
            .text("model", self.stt_model.clone())
            .part("file", file);
        let response = self
            .client
            .post(self.url("transcriptions"))
            .bearer_auth(&self.api_key)
            .multipart(form)
            .send()
            .await?;
        let parsed: TranscriptionResponse = check(response).await?.json().await?;
        debug!(chars = parsed.text.len(), "transcription received");
        Ok(parsed.text.trim().to_string())
    }
}

#[async_trait]
impl Synthesizer for OpenAiSpeech {
    async fn synthesize(&self, text: &str) -> Result<SynthesizedAudio> {
        let payload = json!({
            "model": self.tts_model,
            "voice": self.voice,
            "input": text,
            "response_format": "mp3",
        });
        let response = self
            .client
            .post(self.url("speech"))
            .bearer_auth(&self.api_key)
            .json(&payload)
            .send()
            .await?;
        let bytes = check(response).await?.bytes().await?;
        Ok(SynthesizedAudio {
            bytes: bytes.to_vec(),
            content_type: "audio/mpeg".to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_urls_use_base() {
        let mut model = ModelConfig::default();
        model.base_url = "http://localhost:9000/".to_string();
        let speech = OpenAiSpeech::new("k", &model, &VoiceConfig::default());
        assert_eq!(
            speech.url("speech"),
            "http://localhost:9000/v1/audio/speech"
        );
    }

    #[test]
    fn test_from_env_missing_key() {
        let mut model = ModelConfig::default();
        model.api_key_env = "PARLEY_TEST_KEY_THAT_IS_NEVER_SET".to_string();
        let result = OpenAiSpeech::from_env(&model, &VoiceConfig::default());
        assert!(matches!(result, Err(VoiceError::MissingApiKey(_))));
    }

    #[tokio::test]
    async fn test_transcribe_rejects_empty_audio() {
        let speech = OpenAiSpeech::new("k", &ModelConfig::default(), &VoiceConfig::default());
        assert!(matches!(
            speech.transcribe(&[]).await,
            Err(VoiceError::EmptyAudio)
        ));
    }
}
