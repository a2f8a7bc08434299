//! In-memory mailbox and calendar.
//!
//! A scriptable provider used by tests throughout the workspace. Messages
//! are kept in arrival order; the newest is the last one added.

use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parley_core::{AccountIdentity, ProviderKind};

use crate::error::{ProviderError, Result};
use crate::provider::MailboxProvider;
use crate::types::{
    truncate_chars, DraftHandle, EmailContext, EventQuery, EventReschedule, EventSummary,
    MessageSummary, NewEvent, OutgoingMessage, SearchQuery,
};

#[derive(Debug, Clone)]
struct StoredMessage {
    context: EmailContext,
    body: String,
    unread: bool,
    in_inbox: bool,
}

#[derive(Debug, Default)]
struct Mailbox {
    messages: Vec<StoredMessage>,
    events: Vec<EventSummary>,
    sent: Vec<OutgoingMessage>,
    calls: Vec<String>,
    next_id: u64,
    fail_searches: bool,
    fail_drafts: bool,
    identity_failures: usize,
}

impl Mailbox {
    fn find(&self, id: &str) -> Result<&StoredMessage> {
        self.messages
            .iter()
            .find(|m| m.context.id == id)
            .ok_or_else(|| ProviderError::NotFound(format!("message {}", id)))
    }

    fn find_mut(&mut self, id: &str) -> Result<&mut StoredMessage> {
        self.messages
            .iter_mut()
            .find(|m| m.context.id == id)
            .ok_or_else(|| ProviderError::NotFound(format!("message {}", id)))
    }

    fn next(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{}-{}", prefix, self.next_id)
    }
}

/// Scriptable provider backed by in-process state.
#[derive(Debug)]
pub struct InMemoryProvider {
    kind: ProviderKind,
    owner: AccountIdentity,
    state: Mutex<Mailbox>,
}

impl InMemoryProvider {
    pub fn new(kind: ProviderKind, owner: AccountIdentity) -> Self {
        Self {
            kind,
            owner,
            state: Mutex::new(Mailbox::default()),
        }
    }

    /// Deliver a message into the inbox. It becomes the newest message.
    pub fn deliver(&self, context: EmailContext, body: &str, unread: bool) {
        let mut state = self.lock();
        state.messages.push(StoredMessage {
            context,
            body: body.to_string(),
            unread,
            in_inbox: true,
        });
    }

    pub fn add_event(&self, event: EventSummary) {
        self.lock().events.push(event);
    }

    /// Make every subsequent search fail with a transport error.
    pub fn fail_searches(&self, fail: bool) {
        self.lock().fail_searches = fail;
    }

    /// Make every subsequent draft creation fail with a transport error.
    pub fn fail_drafts(&self, fail: bool) {
        self.lock().fail_drafts = fail;
    }

    /// Make the next `count` identity lookups fail with a transport error.
    pub fn fail_identity(&self, count: usize) {
        self.lock().identity_failures = count;
    }

    pub fn is_unread(&self, id: &str) -> Option<bool> {
        self.lock().find(id).ok().map(|m| m.unread)
    }

    pub fn is_in_inbox(&self, id: &str) -> Option<bool> {
        self.lock().find(id).ok().map(|m| m.in_inbox)
    }

    pub fn contains_message(&self, id: &str) -> bool {
        self.lock().find(id).is_ok()
    }

    pub fn sent(&self) -> Vec<OutgoingMessage> {
        self.lock().sent.clone()
    }

    pub fn events(&self) -> Vec<EventSummary> {
        self.lock().events.clone()
    }

    /// Log of mutating calls, e.g. `set_read m-1 true`.
    pub fn calls(&self) -> Vec<String> {
        self.lock().calls.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Mailbox> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn matches_text(message: &StoredMessage, text: &str) -> bool {
    let haystack = format!(
        "{} {} {}",
        message.context.subject, message.context.from.display, message.body
    )
    .to_lowercase();
    text.split_whitespace()
        // backend qualifiers such as `in:inbox` or `is:unread` are not free text
        .filter(|word| !word.contains(':'))
        .all(|word| haystack.contains(&word.to_lowercase()))
}

fn summarize(message: &StoredMessage) -> MessageSummary {
    MessageSummary {
        id: message.context.id.clone(),
        from: message.context.from.clone(),
        subject: message.context.subject.clone(),
        received: message.context.received.clone(),
        preview: truncate_chars(&message.body, 200),
    }
}

#[async_trait]
impl MailboxProvider for InMemoryProvider {
    fn kind(&self) -> ProviderKind {
        self.kind
    }

    async fn account_identity(&self) -> Result<AccountIdentity> {
        let mut state = self.lock();
        if state.identity_failures > 0 {
            state.identity_failures -= 1;
            return Err(ProviderError::Transport("profile lookup timed out".to_string()));
        }
        Ok(self.owner.clone())
    }

    async fn search(&self, query: &SearchQuery) -> Result<Vec<MessageSummary>> {
        let state = self.lock();
        if state.fail_searches {
            return Err(ProviderError::Transport("connection reset".to_string()));
        }
        Ok(state
            .messages
            .iter()
            .rev()
            .filter(|m| m.unread && m.in_inbox)
            .filter(|m| !query.is_excluded(&m.context.id))
            .filter(|m| matches_text(m, &query.text))
            .take(query.limit)
            .map(summarize)
            .collect())
    }

    async fn unread_since(
        &self,
        since: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<MessageSummary>> {
        let state = self.lock();
        Ok(state
            .messages
            .iter()
            .rev()
            .filter(|m| m.unread && m.in_inbox)
            .filter(|m| match DateTime::parse_from_rfc3339(&m.context.received) {
                Ok(received) => received.with_timezone(&Utc) >= since,
                Err(_) => true,
            })
            .take(limit)
            .map(summarize)
            .collect())
    }

    async fn fetch_message(
        &self,
        id: &str,
        preview_chars: usize,
    ) -> Result<(EmailContext, String)> {
        let state = self.lock();
        let message = state.find(id)?;
        let mut context = message.context.clone();
        context.body_preview = truncate_chars(&message.body, preview_chars);
        Ok((context, message.body.clone()))
    }

    async fn create_draft(&self, message: &OutgoingMessage) -> Result<DraftHandle> {
        let mut state = self.lock();
        if state.fail_drafts {
            return Err(ProviderError::Transport("connection reset".to_string()));
        }
        let remote_id = match self.kind {
            ProviderKind::Google => None,
            ProviderKind::Microsoft => Some(state.next("draft")),
        };
        state.calls.push(format!("create_draft {}", message.subject));
        Ok(DraftHandle {
            remote_id,
            to: message.to.clone(),
            subject: message.subject.clone(),
        })
    }

    async fn send_draft(&self, message: &OutgoingMessage, _handle: &DraftHandle) -> Result<()> {
        let mut state = self.lock();
        state.calls.push(format!("send_draft {}", message.subject));
        state.sent.push(message.clone());
        Ok(())
    }

    async fn delete_message(&self, id: &str) -> Result<()> {
        let mut state = self.lock();
        state.find(id)?;
        state.messages.retain(|m| m.context.id != id);
        state.calls.push(format!("delete {}", id));
        Ok(())
    }

    async fn archive_message(&self, id: &str) -> Result<()> {
        let mut state = self.lock();
        state.find_mut(id)?.in_inbox = false;
        state.calls.push(format!("archive {}", id));
        Ok(())
    }

    async fn set_read(&self, id: &str, read: bool) -> Result<()> {
        let mut state = self.lock();
        state.find_mut(id)?.unread = !read;
        state.calls.push(format!("set_read {} {}", id, read));
        Ok(())
    }

    async fn list_events(&self, query: &EventQuery) -> Result<Vec<EventSummary>> {
        let state = self.lock();
        let needle = query.text.as_deref().unwrap_or("").to_lowercase();
        Ok(state
            .events
            .iter()
            .filter(|e| needle.is_empty() || e.title.to_lowercase().contains(&needle))
            .take(query.max_results)
            .cloned()
            .collect())
    }

    async fn create_event(&self, event: &NewEvent) -> Result<EventSummary> {
        let mut state = self.lock();
        let created = EventSummary {
            id: state.next("evt"),
            title: event.title.clone(),
            start: Some(event.start.clone()),
            end: Some(event.end.clone()),
            location: event.location.clone().unwrap_or_default(),
            organizer: self.owner.email.clone(),
        };
        state.events.push(created.clone());
        Ok(created)
    }

    async fn update_event_time(
        &self,
        id: &str,
        change: &EventReschedule,
    ) -> Result<EventSummary> {
        let mut state = self.lock();
        let event = state
            .events
            .iter_mut()
            .find(|e| e.id == id)
            .ok_or_else(|| ProviderError::NotFound(format!("event {}", id)))?;
        event.start = Some(change.start.clone());
        event.end = Some(change.end.clone());
        Ok(event.clone())
    }

    async fn delete_event(&self, id: &str) -> Result<()> {
        let mut state = self.lock();
        let before = state.events.len();
        state.events.retain(|e| e.id != id);
        if state.events.len() == before {
            return Err(ProviderError::NotFound(format!("event {}", id)));
        }
        Ok(())
    }

    async fn quick_add_event(&self, text: &str) -> Result<EventSummary> {
        if self.kind != ProviderKind::Google {
            return Err(ProviderError::Unsupported(
                "Quick add is only available for Google Calendar.".to_string(),
            ));
        }
        let mut state = self.lock();
        let created = EventSummary {
            id: state.next("evt"),
            title: text.to_string(),
            organizer: self.owner.email.clone(),
            ..Default::default()
        };
        state.events.push(created.clone());
        Ok(created)
    }

    fn supports_quick_add(&self) -> bool {
        self.kind == ProviderKind::Google
    }
}
