//! One live conversation.
//!
//! A [`Session`] owns the session state behind a single async mutex, runs
//! foreground turns for audio, typed text and client actions, and
//! supervises the background unread notifier.

use std::sync::Arc;
use std::time::Duration;

use chrono::Local;
use parley_core::config::ParleyConfig;
use parley_core::Lifecycle;
use parley_provider::{MailboxProvider, ProviderError};
use parley_voice::Transcriber;
use tokio::sync::{Mutex, Notify};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::contacts::Contact;
use crate::error::{ChatError, Result};
use crate::events::{ClientAction, SessionEvent};
use crate::executor::ToolExecutor;
use crate::llm::{CompletionRequest, LanguageModel};
use crate::notifier::UnreadNotifier;
use crate::orchestrator::TurnRunner;
use crate::outbound::Outbound;
use crate::prompts::{greeting_instruction, system_prompt};
use crate::state::SessionState;
use crate::summary;
use crate::types::Turn;

const CHECKING_STATUS: &str = "Checking for updates...";
const GREETING_STATUS: &str = "Ready for your command...";
const FALLBACK_GREETING: &str = "Hello! I'm ready. How can I help you?";
const NOT_HEARD: &str = "Sorry, I didn't catch that.";
const NOT_HEARD_STATUS: &str = "Didn't hear you...";
const SEND_UTTERANCE: &str = "Yes, send the draft.";
const CANCEL_UTTERANCE: &str = "Cancel the draft.";

/// Tunables for the session engine, resolved from configuration.
#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub max_tool_rounds: usize,
    pub contact_capacity: usize,
    pub poll_initial_delay: Duration,
    pub poll_interval: Duration,
    pub poll_batch_size: usize,
    pub search_default_limit: usize,
    pub body_preview_chars: usize,
    pub temperature: f32,
    pub summary_temperature: f32,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self::from_config(&ParleyConfig::default())
    }
}

impl SessionSettings {
    pub fn from_config(config: &ParleyConfig) -> Self {
        let session = &config.session;
        Self {
            max_tool_rounds: session.max_tool_rounds,
            contact_capacity: session.contact_capacity,
            poll_initial_delay: Duration::from_secs(session.poll_initial_delay_secs),
            poll_interval: Duration::from_secs(session.poll_interval_secs.max(1)),
            poll_batch_size: session.poll_batch_size.max(1),
            search_default_limit: session.search_default_limit.max(1),
            body_preview_chars: session.body_preview_chars,
            temperature: config.model.temperature,
            summary_temperature: config.model.summary_temperature,
        }
    }
}

/// Collaborators a session is built from.
#[derive(Clone)]
pub struct SessionDeps {
    pub provider: Arc<dyn MailboxProvider>,
    pub model: Arc<dyn LanguageModel>,
    pub transcriber: Arc<dyn Transcriber>,
    pub outbound: Outbound,
    pub settings: SessionSettings,
}

/// A live conversation bound to one connected account.
pub struct Session {
    state: Arc<Mutex<SessionState>>,
    deps: SessionDeps,
    runner: TurnRunner,
    shutdown: Arc<Notify>,
    notifier: Option<JoinHandle<()>>,
}

impl Session {
    pub fn new(deps: SessionDeps) -> Self {
        let kind = deps.provider.kind();
        let state = SessionState::new(
            kind,
            system_prompt(kind, Local::now()),
            deps.settings.contact_capacity,
        );
        let executor = ToolExecutor::new(
            deps.provider.clone(),
            deps.model.clone(),
            deps.outbound.clone(),
            deps.settings.clone(),
        );
        let runner = TurnRunner::for_session(
            deps.model.clone(),
            executor,
            deps.outbound.clone(),
            deps.settings.clone(),
            kind,
            deps.provider.supports_quick_add(),
        );
        Self {
            state: Arc::new(Mutex::new(state)),
            deps,
            runner,
            shutdown: Arc::new(Notify::new()),
            notifier: None,
        }
    }

    /// Shared handle to the session state.
    pub fn state(&self) -> Arc<Mutex<SessionState>> {
        self.state.clone()
    }

    /// Greet the user with a status summary and start the notifier.
    ///
    /// Fails only when the account has no usable credentials.
    pub async fn start(&mut self) -> Result<()> {
        let outbound = &self.deps.outbound;
        let provider = &self.deps.provider;
        let mut state = self.state.lock().await;
        info!(provider = %state.kind, "Session starting");
        outbound.status(CHECKING_STATUS);

        match state.ensure_owner(provider.as_ref()).await {
            Ok(()) => {}
            Err(ProviderError::Credentials(reason)) => {
                return Err(ChatError::NoCredentials(reason));
            }
            Err(e) => return Err(e.into()),
        }

        let snapshot = summary::gather(provider.as_ref()).await;
        let kind = state.kind;
        state.contacts.reset();
        // Newest first from the provider; merge oldest first so the newest
        // ends up at the front.
        for message in snapshot.unread.iter().rev() {
            state.contacts.merge(Contact::from_summary(message, kind));
        }
        state
            .ledger
            .seed_announced(snapshot.unread.iter().map(|m| m.id.clone()));
        outbound.people(state.contacts.entries());

        state
            .history
            .push(Turn::system(greeting_instruction(&snapshot.status_text())));
        let greeting = match self
            .deps
            .model
            .complete(CompletionRequest {
                history: &state.history,
                tools: None,
                temperature: self.deps.settings.temperature,
            })
            .await
        {
            Ok(reply) => reply
                .content
                .filter(|c| !c.trim().is_empty())
                .unwrap_or_else(|| FALLBACK_GREETING.to_string()),
            Err(e) => {
                warn!("Greeting generation failed: {}", e);
                FALLBACK_GREETING.to_string()
            }
        };
        state.history.push(Turn::assistant(greeting.clone()));
        outbound.speak(&greeting, GREETING_STATUS).await;
        drop(state);

        let notifier = UnreadNotifier::new(
            self.state.clone(),
            self.deps.provider.clone(),
            self.deps.outbound.clone(),
            self.deps.settings.clone(),
            self.shutdown.clone(),
        );
        self.notifier = Some(tokio::spawn(notifier.run()));
        info!("Session started");
        Ok(())
    }

    /// Push-to-talk audio: transcribe, then run a turn.
    pub async fn handle_audio(&self, audio: &[u8]) {
        match self.transcribe(audio).await {
            Ok(transcript) => self.handle_text(&transcript).await,
            Err(e) => {
                if matches!(e, ChatError::Voice(_)) {
                    warn!("Transcription failed: {}", e);
                }
                let state = self.state.lock().await;
                if state.is_active() {
                    self.deps.outbound.speak(NOT_HEARD, NOT_HEARD_STATUS).await;
                }
            }
        }
    }

    async fn transcribe(&self, audio: &[u8]) -> Result<String> {
        let transcript = self.deps.transcriber.transcribe(audio).await?;
        if transcript.trim().is_empty() {
            return Err(ChatError::TranscriptionEmpty);
        }
        Ok(transcript)
    }

    /// Typed or transcribed text. Empty input is ignored.
    pub async fn handle_text(&self, text: &str) {
        let text = text.trim();
        if text.is_empty() {
            return;
        }
        let mut state = self.state.lock().await;
        if !state.is_active() {
            return;
        }
        self.runner.run_turn(&mut state, text).await;
    }

    pub async fn handle_action(&self, action: ClientAction) {
        match action {
            ClientAction::SendDraft => self.handle_text(SEND_UTTERANCE).await,
            ClientAction::CancelDraft => {
                {
                    let mut state = self.state.lock().await;
                    if let Err(e) = self.runner.executor().cancel_draft(&mut state) {
                        info!("Cancel requested without a draft: {}", e);
                        self.deps.outbound.emit(SessionEvent::DraftClear);
                    }
                }
                self.handle_text(CANCEL_UTTERANCE).await;
            }
            ClientAction::ManualMessage { text } => self.handle_text(&text).await,
        }
    }

    /// Stop the notifier and wait for it to finish. In-flight foreground
    /// work completes first because it holds the state lock.
    pub async fn stop(&mut self) {
        {
            let mut state = self.state.lock().await;
            if state.lifecycle == Lifecycle::Stopping {
                return;
            }
            state.lifecycle = Lifecycle::Stopping;
        }
        self.shutdown.notify_one();
        if let Some(handle) = self.notifier.take() {
            if let Err(e) = handle.await {
                warn!("Unread notifier ended abnormally: {}", e);
            }
        }
        info!("Session stopped");
    }
}
