use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{ParleyError, Result};

/// Top-level configuration for the Parley application.
///
/// Loaded from `~/.parley/config.toml` by default. Each section corresponds
/// to one collaborator or to the session engine itself.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ParleyConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub model: ModelConfig,
    #[serde(default)]
    pub voice: VoiceConfig,
    #[serde(default)]
    pub google: GoogleConfig,
    #[serde(default)]
    pub microsoft: MicrosoftConfig,
    #[serde(default)]
    pub session: SessionConfig,
}

impl ParleyConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: ParleyConfig = toml::from_str(&content)?;
        info!("Configuration loaded from {}", path.display());
        Ok(config)
    }

    /// Load configuration from a TOML file, falling back to defaults if the
    /// file does not exist or cannot be parsed.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                warn!(
                    "Failed to load config from {}: {}. Using defaults.",
                    path.display(),
                    e
                );
                Self::default()
            }
        }
    }

    /// Save the current configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| ParleyError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        info!("Configuration saved to {}", path.display());
        Ok(())
    }
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log level: trace, debug, info, warn, error.
    pub log_level: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

/// HTTP / WebSocket server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8000,
        }
    }
}

/// Chat-completion model settings (OpenAI-compatible endpoint).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Base URL without the `/v1/...` suffix.
    pub base_url: String,
    /// Model name sent with every completion request.
    pub model: String,
    /// Environment variable holding the API key.
    pub api_key_env: String,
    /// Sampling temperature for conversational turns.
    pub temperature: f32,
    /// Sampling temperature for email summaries.
    pub summary_temperature: f32,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com".to_string(),
            model: "gpt-4o-mini".to_string(),
            api_key_env: "OPENAI_API_KEY".to_string(),
            temperature: 0.7,
            summary_temperature: 0.4,
        }
    }
}

/// Speech synthesis and transcription settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VoiceConfig {
    /// Text-to-speech model name.
    pub tts_model: String,
    /// Voice preset for synthesis.
    pub voice: String,
    /// Speech-to-text model name.
    pub stt_model: String,
    /// Maximum number of synthesized clips kept in memory for playback.
    pub audio_cache_size: usize,
}

impl Default for VoiceConfig {
    fn default() -> Self {
        Self {
            tts_model: "tts-1".to_string(),
            voice: "alloy".to_string(),
            stt_model: "whisper-1".to_string(),
            audio_cache_size: 64,
        }
    }
}

/// Google (Gmail + Google Calendar) REST settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GoogleConfig {
    pub gmail_base_url: String,
    pub calendar_base_url: String,
    /// Environment variable holding a valid OAuth access token.
    pub access_token_env: String,
}

impl Default for GoogleConfig {
    fn default() -> Self {
        Self {
            gmail_base_url: "https://gmail.googleapis.com/gmail/v1".to_string(),
            calendar_base_url: "https://www.googleapis.com/calendar/v3".to_string(),
            access_token_env: "GOOGLE_ACCESS_TOKEN".to_string(),
        }
    }
}

/// Microsoft Graph (Outlook mail + calendar) REST settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MicrosoftConfig {
    pub graph_base_url: String,
    /// Environment variable holding a valid OAuth access token.
    pub access_token_env: String,
}

impl Default for MicrosoftConfig {
    fn default() -> Self {
        Self {
            graph_base_url: "https://graph.microsoft.com/v1.0".to_string(),
            access_token_env: "MS_ACCESS_TOKEN".to_string(),
        }
    }
}

/// Conversation session engine settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Maximum model round-trips that may request tools within one turn.
    pub max_tool_rounds: usize,
    /// Maximum number of entries in the recent-people list.
    pub contact_capacity: usize,
    /// Grace period before the first unread poll, in seconds.
    pub poll_initial_delay_secs: u64,
    /// Interval between unread polls, in seconds.
    pub poll_interval_secs: u64,
    /// Number of unread messages fetched per poll.
    pub poll_batch_size: usize,
    /// Default result count for mail searches.
    pub search_default_limit: usize,
    /// Maximum characters of body kept in the focus context.
    pub body_preview_chars: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_tool_rounds: 4,
            contact_capacity: 15,
            poll_initial_delay_secs: 15,
            poll_interval_secs: 45,
            poll_batch_size: 5,
            search_default_limit: 5,
            body_preview_chars: 1000,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_temp_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_default_config() {
        let config = ParleyConfig::default();
        assert_eq!(config.general.log_level, "info");
        assert_eq!(config.server.port, 8000);
        assert_eq!(config.model.model, "gpt-4o-mini");
        assert_eq!(config.session.contact_capacity, 15);
        assert_eq!(config.session.poll_initial_delay_secs, 15);
        assert_eq!(config.session.poll_interval_secs, 45);
        assert_eq!(config.session.max_tool_rounds, 4);
    }

    #[test]
    fn test_load_valid_config() {
        let content = r#"
[general]
log_level = "debug"

[server]
host = "0.0.0.0"
port = 9100

[session]
contact_capacity = 5
poll_interval_secs = 10
"#;
        let file = create_temp_config(content);
        let config = ParleyConfig::load(file.path()).unwrap();
        assert_eq!(config.general.log_level, "debug");
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 9100);
        assert_eq!(config.session.contact_capacity, 5);
        assert_eq!(config.session.poll_interval_secs, 10);
        // Unspecified fields within a section keep their defaults.
        assert_eq!(config.session.poll_initial_delay_secs, 15);
        assert_eq!(config.model.base_url, "https://api.openai.com");
    }

    #[test]
    fn test_load_invalid_toml() {
        let file = create_temp_config("[server\nport = ");
        let result = ParleyConfig::load(file.path());
        assert!(matches!(result, Err(ParleyError::Config(_))));
    }

    #[test]
    fn test_load_or_default_missing_file() {
        let config = ParleyConfig::load_or_default(Path::new("/nonexistent/parley.toml"));
        assert_eq!(config.server.port, 8000);
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = ParleyConfig::default();
        config.voice.voice = "verse".to_string();
        config.session.max_tool_rounds = 2;
        config.save(&path).unwrap();

        let reloaded = ParleyConfig::load(&path).unwrap();
        assert_eq!(reloaded.voice.voice, "verse");
        assert_eq!(reloaded.session.max_tool_rounds, 2);
    }

    #[test]
    fn test_empty_file_uses_defaults() {
        let file = create_temp_config("");
        let config = ParleyConfig::load(file.path()).unwrap();
        assert_eq!(config.google.access_token_env, "GOOGLE_ACCESS_TOKEN");
        assert_eq!(config.microsoft.access_token_env, "MS_ACCESS_TOKEN");
    }
}
