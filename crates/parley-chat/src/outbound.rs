//! Everything the session sends to the client goes through [`Outbound`].

use std::sync::Arc;

use parley_voice::{AudioStore, Synthesizer};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::contacts::Contact;
use crate::events::SessionEvent;
use crate::suggestions::extract_suggestions;
use crate::types::Role;

/// Shown when a reply has no speakable text left.
const EMPTY_REPLY: &str = "Done.";

/// Event sink plus speech synthesis for one session.
#[derive(Clone)]
pub struct Outbound {
    sink: mpsc::UnboundedSender<SessionEvent>,
    synthesizer: Arc<dyn Synthesizer>,
    audio: Arc<AudioStore>,
}

impl Outbound {
    pub fn new(
        sink: mpsc::UnboundedSender<SessionEvent>,
        synthesizer: Arc<dyn Synthesizer>,
        audio: Arc<AudioStore>,
    ) -> Self {
        Self {
            sink,
            synthesizer,
            audio,
        }
    }

    pub fn emit(&self, event: SessionEvent) {
        if self.sink.send(event).is_err() {
            debug!("Client channel closed, dropping event");
        }
    }

    pub fn status(&self, text: impl Into<String>) {
        self.emit(SessionEvent::status(text));
    }

    pub fn chat(&self, role: Role, text: impl Into<String>) {
        self.emit(SessionEvent::ChatAppend {
            role,
            text: text.into(),
        });
    }

    pub fn people(&self, people: &[Contact]) {
        self.emit(SessionEvent::PeopleList {
            people: people.to_vec(),
        });
    }

    /// Deliver an assistant message: display text, its suggestions, then
    /// speech. Returns the displayed text.
    ///
    /// A synthesis failure still leaves the text in the transcript; only the
    /// audio is skipped.
    pub async fn speak(&self, message: &str, status_text: &str) -> String {
        let (display, items) = extract_suggestions(message);
        let display = if display.is_empty() {
            EMPTY_REPLY.to_string()
        } else {
            display
        };

        self.chat(Role::Assistant, display.clone());
        self.emit(SessionEvent::Suggestions { items });

        match self.synthesizer.synthesize(&display).await {
            Ok(audio) => {
                let id = self.audio.insert(audio);
                self.emit(SessionEvent::PlayAudio {
                    url: AudioStore::url_for(&id),
                    status_text: status_text.to_string(),
                });
            }
            Err(e) => {
                warn!("Speech synthesis failed: {}", e);
                self.status(status_text);
            }
        }
        display
    }
}
