//! Messages exchanged with the browser client.
//!
//! Outbound events are JSON objects tagged by `type`; inbound actions are
//! tagged by `action`. Raw audio travels separately as binary frames.

use parley_provider::FocusContext;
use serde::{Deserialize, Serialize};

use crate::contacts::Contact;
use crate::types::{Role, Suggestion};

/// Event pushed to the client.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionEvent {
    /// Synthesized speech is ready at `url`.
    PlayAudio { url: String, status_text: String },
    UpdateStatus { text: String },
    ChatAppend { role: Role, text: String },
    ContextUpdate { context: Option<FocusView> },
    DraftPreview { to: String, subject: String, body: String },
    DraftClear,
    Suggestions { items: Vec<Suggestion> },
    PeopleList { people: Vec<Contact> },
}

impl SessionEvent {
    pub fn status(text: impl Into<String>) -> Self {
        SessionEvent::UpdateStatus { text: text.into() }
    }

    pub fn context(focus: Option<&FocusContext>) -> Self {
        SessionEvent::ContextUpdate {
            context: focus.map(FocusView::from),
        }
    }
}

/// Client-facing rendering of the focused item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FocusView {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from_email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub organizer: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

impl From<&FocusContext> for FocusView {
    fn from(focus: &FocusContext) -> Self {
        match focus {
            FocusContext::Email(email) => FocusView {
                id: email.id.clone(),
                kind: "Email".to_string(),
                from: Some(email.from.display.clone()),
                from_email: Some(email.from.email.clone()),
                subject: Some(email.subject.clone()),
                organizer: None,
                title: None,
            },
            FocusContext::Event(event) => FocusView {
                id: event.id.clone(),
                kind: "Calendar Event".to_string(),
                from: None,
                from_email: None,
                subject: None,
                organizer: Some(event.organizer.clone()),
                title: Some(event.title.clone()),
            },
        }
    }
}

/// Structured request from the client.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ClientAction {
    SendDraft,
    CancelDraft,
    /// Typed text handled exactly like transcribed speech.
    ManualMessage {
        #[serde(default)]
        text: String,
    },
}
