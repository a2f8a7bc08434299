//! Application state shared across all route handlers.
//!
//! AppState holds the configuration, the synthesized-audio store, and the
//! factory that assembles a fresh set of session collaborators for every
//! WebSocket connection. It is passed to handlers via axum's State extractor.

use std::sync::Arc;
use std::time::Instant;

use tokio::sync::mpsc::UnboundedSender;

use parley_chat::{
    ChatError, LanguageModel, OpenAiChatModel, Outbound, ScriptedModel, SessionDeps,
    SessionEvent, SessionSettings,
};
use parley_core::config::ParleyConfig;
use parley_core::ProviderKind;
use parley_provider::{CredentialSource, EnvToken, GoogleProvider, GraphProvider, MailboxProvider};
use parley_voice::{
    AudioStore, MockSynthesizer, MockTranscriber, OpenAiSpeech, Synthesizer, Transcriber,
};

/// Builds the collaborators for one connection.
pub trait SessionFactory: Send + Sync {
    /// Which backend a new session would be bound to, if any.
    fn connected_service(&self) -> Option<ProviderKind>;

    /// Assemble session collaborators that publish to `events`.
    fn connect(
        &self,
        events: UnboundedSender<SessionEvent>,
        audio: Arc<AudioStore>,
    ) -> Result<SessionDeps, ChatError>;
}

/// Shared application state.
///
/// All fields use `Arc` for cheap cloning across handler tasks.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ParleyConfig>,
    /// Synthesized clips, served under `/audio/{id}`.
    pub audio: Arc<AudioStore>,
    pub sessions: Arc<dyn SessionFactory>,
    /// Server start time for uptime calculation.
    pub start_time: Instant,
}

impl AppState {
    pub fn new(config: ParleyConfig, sessions: Arc<dyn SessionFactory>) -> Self {
        let audio = Arc::new(AudioStore::new(config.voice.audio_cache_size));
        Self {
            config: Arc::new(config),
            audio,
            sessions,
            start_time: Instant::now(),
        }
    }
}

// =============================================================================
// Live factory
// =============================================================================

/// Connects sessions to Google or Microsoft using access tokens from the
/// environment, with OpenAI-compatible model and speech endpoints.
///
/// Google wins when both tokens are present.
pub struct LiveSessionFactory {
    config: ParleyConfig,
    google: EnvToken,
    microsoft: EnvToken,
}

impl LiveSessionFactory {
    pub fn new(config: ParleyConfig) -> Self {
        let google = EnvToken::new(config.google.access_token_env.clone());
        let microsoft = EnvToken::new(config.microsoft.access_token_env.clone());
        Self {
            config,
            google,
            microsoft,
        }
    }
}

impl SessionFactory for LiveSessionFactory {
    fn connected_service(&self) -> Option<ProviderKind> {
        if self.google.is_available() {
            Some(ProviderKind::Google)
        } else if self.microsoft.is_available() {
            Some(ProviderKind::Microsoft)
        } else {
            None
        }
    }

    fn connect(
        &self,
        events: UnboundedSender<SessionEvent>,
        audio: Arc<AudioStore>,
    ) -> Result<SessionDeps, ChatError> {
        let provider: Arc<dyn MailboxProvider> = match self.connected_service() {
            Some(ProviderKind::Google) => Arc::new(GoogleProvider::new(
                &self.config.google,
                Arc::new(self.google.clone()),
            )),
            Some(ProviderKind::Microsoft) => Arc::new(GraphProvider::new(
                &self.config.microsoft,
                Arc::new(self.microsoft.clone()),
            )),
            None => {
                return Err(ChatError::NoCredentials(format!(
                    "neither {} nor {} is set",
                    self.google.var(),
                    self.microsoft.var()
                )))
            }
        };
        let model = Arc::new(OpenAiChatModel::from_env(&self.config.model)?);
        let speech = Arc::new(OpenAiSpeech::from_env(
            &self.config.model,
            &self.config.voice,
        )?);
        Ok(SessionDeps {
            provider,
            model,
            transcriber: speech.clone(),
            outbound: Outbound::new(events, speech, audio),
            settings: SessionSettings::from_config(&self.config),
        })
    }
}

// =============================================================================
// Fixed factory
// =============================================================================

/// Hands every connection the same collaborators. Used by tests and demos.
pub struct FixedSessionFactory {
    provider: Option<Arc<dyn MailboxProvider>>,
    model: Arc<dyn LanguageModel>,
    transcriber: Arc<dyn Transcriber>,
    synthesizer: Arc<dyn Synthesizer>,
    settings: SessionSettings,
}

impl FixedSessionFactory {
    pub fn new(provider: Arc<dyn MailboxProvider>, model: Arc<dyn LanguageModel>) -> Self {
        Self {
            provider: Some(provider),
            model,
            transcriber: Arc::new(MockTranscriber::new()),
            synthesizer: Arc::new(MockSynthesizer::new()),
            settings: SessionSettings::default(),
        }
    }

    /// A factory with no account connected.
    pub fn disconnected() -> Self {
        Self {
            provider: None,
            model: Arc::new(ScriptedModel::new()),
            transcriber: Arc::new(MockTranscriber::new()),
            synthesizer: Arc::new(MockSynthesizer::new()),
            settings: SessionSettings::default(),
        }
    }

    pub fn with_speech(
        mut self,
        transcriber: Arc<dyn Transcriber>,
        synthesizer: Arc<dyn Synthesizer>,
    ) -> Self {
        self.transcriber = transcriber;
        self.synthesizer = synthesizer;
        self
    }
}

impl SessionFactory for FixedSessionFactory {
    fn connected_service(&self) -> Option<ProviderKind> {
        self.provider.as_ref().map(|p| p.kind())
    }

    fn connect(
        &self,
        events: UnboundedSender<SessionEvent>,
        audio: Arc<AudioStore>,
    ) -> Result<SessionDeps, ChatError> {
        let provider = self
            .provider
            .clone()
            .ok_or_else(|| ChatError::NoCredentials("no account connected".to_string()))?;
        Ok(SessionDeps {
            provider,
            model: self.model.clone(),
            transcriber: self.transcriber.clone(),
            outbound: Outbound::new(events, self.synthesizer.clone(), audio),
            settings: self.settings.clone(),
        })
    }
}
