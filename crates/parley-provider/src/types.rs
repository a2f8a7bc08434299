//! Mail and calendar types shared by every provider.

use std::collections::HashSet;

use parley_core::Identity;
use serde::{Deserialize, Serialize};

/// One row of a mailbox search.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MessageSummary {
    pub id: String,
    pub from: Identity,
    pub subject: String,
    /// Received timestamp as reported by the backend.
    pub received: String,
    /// Short body preview (at most 200 characters).
    pub preview: String,
}

/// Parameters for a mailbox search.
#[derive(Debug, Clone, Default)]
pub struct SearchQuery {
    /// Free text in the backend's own query language. Empty means "latest unread".
    pub text: String,
    pub limit: usize,
    /// Ids the caller has already acted on; these never appear in results.
    pub exclude: HashSet<String>,
}

impl SearchQuery {
    pub fn new(text: impl Into<String>, limit: usize) -> Self {
        Self {
            text: text.into(),
            limit,
            exclude: HashSet::new(),
        }
    }

    pub fn excluding(mut self, ids: impl IntoIterator<Item = String>) -> Self {
        self.exclude.extend(ids);
        self
    }

    pub fn is_excluded(&self, id: &str) -> bool {
        self.exclude.contains(id)
    }
}

/// RFC 5322 threading headers of a received message.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThreadingHeaders {
    /// The `Message-ID` header (or Graph `internetMessageId`).
    pub message_id: String,
    /// The `References` header, space separated.
    pub references: String,
}

impl ThreadingHeaders {
    /// `References` value for a reply: existing references followed by the
    /// replied-to message id.
    pub fn reply_references(&self) -> String {
        let refs = self.references.trim();
        if refs.is_empty() {
            self.message_id.clone()
        } else {
            format!("{} {}", refs, self.message_id)
        }
    }
}

/// A fully read email held as the current item.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EmailContext {
    pub id: String,
    pub thread_id: Option<String>,
    pub subject: String,
    pub from: Identity,
    /// Reply-To identities, empty when the header is absent.
    pub reply_to: Vec<Identity>,
    pub to: Vec<Identity>,
    pub cc: Vec<Identity>,
    pub received: String,
    pub body_preview: String,
    pub threading: ThreadingHeaders,
}

impl EmailContext {
    /// Addresses a reply goes to: Reply-To when present, else the sender.
    pub fn reply_targets(&self) -> Vec<Identity> {
        if !self.reply_to.is_empty() {
            return self.reply_to.clone();
        }
        if self.from.email.is_empty() && self.from.name.is_empty() {
            return Vec::new();
        }
        vec![self.from.clone()]
    }

    /// Subject line for a reply, prefixed with `Re: ` unless already present.
    pub fn reply_subject(&self) -> String {
        if self.subject.to_lowercase().starts_with("re:") {
            self.subject.clone()
        } else {
            format!("Re: {}", self.subject)
        }
    }

    pub fn summary(&self) -> MessageSummary {
        MessageSummary {
            id: self.id.clone(),
            from: self.from.clone(),
            subject: self.subject.clone(),
            received: self.received.clone(),
            preview: truncate_chars(&self.body_preview, 200),
        }
    }
}

/// A calendar event held as the current item.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventContext {
    pub id: String,
    pub organizer: String,
    pub title: String,
}

/// The single item the conversation is currently about.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FocusContext {
    Email(EmailContext),
    Event(EventContext),
}

impl FocusContext {
    pub fn id(&self) -> &str {
        match self {
            FocusContext::Email(email) => &email.id,
            FocusContext::Event(event) => &event.id,
        }
    }

    pub fn as_email(&self) -> Option<&EmailContext> {
        match self {
            FocusContext::Email(email) => Some(email),
            FocusContext::Event(_) => None,
        }
    }

    pub fn as_event(&self) -> Option<&EventContext> {
        match self {
            FocusContext::Event(event) => Some(event),
            FocusContext::Email(_) => None,
        }
    }
}

/// One calendar entry as returned by a listing or mutation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventSummary {
    pub id: String,
    pub title: String,
    pub start: Option<String>,
    pub end: Option<String>,
    pub location: String,
    pub organizer: String,
}

impl EventSummary {
    pub fn context(&self) -> EventContext {
        EventContext {
            id: self.id.clone(),
            organizer: self.organizer.clone(),
            title: self.title.clone(),
        }
    }
}

/// Window and filter for a calendar listing. Times are RFC 3339.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventQuery {
    pub time_min: String,
    pub time_max: String,
    pub max_results: usize,
    pub text: Option<String>,
}

/// A detailed event to create.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewEvent {
    pub title: String,
    pub start: String,
    pub end: String,
    pub timezone: Option<String>,
    pub location: Option<String>,
    pub attendees: Vec<String>,
}

/// New start/end for an existing event.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventReschedule {
    pub start: String,
    pub end: String,
    pub timezone: Option<String>,
}

/// A message being composed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OutgoingMessage {
    pub to: Vec<String>,
    pub subject: String,
    pub body: String,
    /// The email this replies to, if any.
    pub in_reply_to: Option<EmailContext>,
}

/// What the backend made of a draft.
///
/// Backends that keep drafts server-side return the remote id and may
/// rewrite the recipients and subject (Graph `createReply`).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DraftHandle {
    pub remote_id: Option<String>,
    pub to: Vec<String>,
    pub subject: String,
}

/// Truncate to at most `max` characters on a char boundary.
pub fn truncate_chars(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}
