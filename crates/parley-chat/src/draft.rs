//! Draft lifecycle with validated transitions.
//!
//! At most one draft exists per session:
//! Empty -> Pending -> Sent/Cancelled
//! Pending -> Pending (a new draft replaces the old one)
//! Sent/Cancelled -> Pending

use parley_provider::{DraftHandle, EmailContext, OutgoingMessage};
use serde::{Deserialize, Serialize};

use crate::error::{ChatError, Result};

/// Where the session's draft currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DraftStatus {
    Empty,
    Pending,
    Sent,
    Cancelled,
}

/// Validate that a draft status transition is allowed.
pub fn validate_transition(from: DraftStatus, to: DraftStatus) -> Result<()> {
    let valid = matches!(
        (from, to),
        (_, DraftStatus::Pending)
            | (DraftStatus::Pending, DraftStatus::Sent)
            | (DraftStatus::Pending, DraftStatus::Cancelled)
    );

    if valid {
        Ok(())
    } else {
        Err(ChatError::NoDraft)
    }
}

/// A composed message awaiting confirmation.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingDraft {
    pub to: Vec<String>,
    pub subject: String,
    pub body: String,
    /// The email being replied to, captured when the draft was made.
    pub reply_to: Option<EmailContext>,
    pub handle: DraftHandle,
}

impl PendingDraft {
    /// The message as handed to the provider on send.
    pub fn outgoing(&self) -> OutgoingMessage {
        OutgoingMessage {
            to: self.to.clone(),
            subject: self.subject.clone(),
            body: self.body.clone(),
            in_reply_to: self.reply_to.clone(),
        }
    }

    /// Recipients joined for display.
    pub fn recipients_display(&self) -> String {
        self.to.join(", ")
    }

    pub fn is_reply(&self) -> bool {
        self.reply_to.is_some()
    }
}

/// Holds the single pending draft.
#[derive(Debug)]
pub struct DraftManager {
    status: DraftStatus,
    pending: Option<PendingDraft>,
}

impl Default for DraftManager {
    fn default() -> Self {
        Self::new()
    }
}

impl DraftManager {
    pub fn new() -> Self {
        Self {
            status: DraftStatus::Empty,
            pending: None,
        }
    }

    pub fn status(&self) -> DraftStatus {
        self.status
    }

    pub fn pending(&self) -> Option<&PendingDraft> {
        self.pending.as_ref()
    }

    /// Store a new draft, replacing any pending one.
    pub fn stage(&mut self, draft: PendingDraft) -> Result<()> {
        self.transition(DraftStatus::Pending)?;
        self.pending = Some(draft);
        Ok(())
    }

    /// The pending draft, or `NoDraft`.
    pub fn require(&self) -> Result<&PendingDraft> {
        self.pending.as_ref().ok_or(ChatError::NoDraft)
    }

    /// Record a successful send and drop the draft.
    pub fn mark_sent(&mut self) -> Result<PendingDraft> {
        self.finish(DraftStatus::Sent)
    }

    /// Discard the pending draft.
    pub fn cancel(&mut self) -> Result<PendingDraft> {
        self.finish(DraftStatus::Cancelled)
    }

    fn finish(&mut self, to: DraftStatus) -> Result<PendingDraft> {
        self.transition(to)?;
        self.pending.take().ok_or(ChatError::NoDraft)
    }

    fn transition(&mut self, to: DraftStatus) -> Result<()> {
        validate_transition(self.status, to)?;
        self.status = to;
        Ok(())
    }
}

/// De-duplicate recipients case-insensitively, keeping the first spelling.
pub fn dedupe_recipients(recipients: impl IntoIterator<Item = String>) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    recipients
        .into_iter()
        .map(|r| r.trim().to_string())
        .filter(|r| !r.is_empty())
        .filter(|r| seen.insert(r.to_lowercase()))
        .collect()
}
