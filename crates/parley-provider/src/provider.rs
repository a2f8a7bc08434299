//! The provider capability trait.
//!
//! One implementation per backend, chosen when a session starts. Backend
//! query dialects (Gmail search operators, Graph OData) are normalized inside
//! each implementation so the session engine only ever speaks in terms of
//! [`SearchQuery`] and [`EventQuery`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parley_core::{AccountIdentity, ProviderKind};

use crate::error::{ProviderError, Result};
use crate::types::{
    DraftHandle, EmailContext, EventQuery, EventReschedule, EventSummary, MessageSummary,
    NewEvent, OutgoingMessage, SearchQuery,
};

/// Mail and calendar operations for one connected account.
#[async_trait]
pub trait MailboxProvider: Send + Sync {
    /// Which backend this is.
    fn kind(&self) -> ProviderKind;

    /// The account owner's address and display name.
    async fn account_identity(&self) -> Result<AccountIdentity>;

    /// Search the inbox. Results never include `query.exclude` ids and hold
    /// at most `query.limit` rows, newest first.
    async fn search(&self, query: &SearchQuery) -> Result<Vec<MessageSummary>>;

    /// Unread inbox messages received at or after `since`.
    async fn unread_since(
        &self,
        since: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<MessageSummary>>;

    /// Fetch one message with its full plain-text body.
    async fn fetch_message(&self, id: &str, preview_chars: usize)
        -> Result<(EmailContext, String)>;

    /// Prepare a draft. Backends without server-side drafts return a handle
    /// with no remote id and send the composed message directly later.
    async fn create_draft(&self, message: &OutgoingMessage) -> Result<DraftHandle>;

    /// Send a previously prepared draft.
    async fn send_draft(&self, message: &OutgoingMessage, handle: &DraftHandle) -> Result<()>;

    /// Move a message to trash.
    async fn delete_message(&self, id: &str) -> Result<()>;

    /// Remove a message from the inbox without deleting it.
    async fn archive_message(&self, id: &str) -> Result<()>;

    /// Set or clear the read flag.
    async fn set_read(&self, id: &str, read: bool) -> Result<()>;

    async fn list_events(&self, query: &EventQuery) -> Result<Vec<EventSummary>>;

    async fn create_event(&self, event: &NewEvent) -> Result<EventSummary>;

    async fn update_event_time(
        &self,
        id: &str,
        change: &EventReschedule,
    ) -> Result<EventSummary>;

    async fn delete_event(&self, id: &str) -> Result<()>;

    /// Create an event from a natural-language sentence.
    async fn quick_add_event(&self, _text: &str) -> Result<EventSummary> {
        Err(ProviderError::Unsupported(
            "Quick add is only available for Google Calendar.".to_string(),
        ))
    }

    /// Whether [`quick_add_event`](Self::quick_add_event) is implemented.
    fn supports_quick_add(&self) -> bool {
        false
    }
}
