//! Recently seen correspondents.
//!
//! A bounded, most-recent-first list of people the user has heard from in
//! this session. It backs the people panel and lets the assistant resolve
//! "that email" when nothing is focused.

use parley_core::{AccountIdentity, ProviderKind};
use parley_provider::{truncate_chars, EmailContext, MessageSummary};
use serde::Serialize;

use crate::ledger::MailLedger;

const UNKNOWN_SENDER: &str = "Unknown Sender";
const PREVIEW_CHARS: usize = 200;

/// One entry of the people list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Contact {
    /// Id of the latest message seen from this person.
    #[serde(rename = "id")]
    pub message_id: String,
    pub name: String,
    pub email: String,
    pub display: String,
    pub subject: String,
    pub preview: String,
    pub received: String,
    #[serde(rename = "service")]
    pub provider: ProviderKind,
}

impl Contact {
    pub fn from_summary(summary: &MessageSummary, provider: ProviderKind) -> Self {
        Self {
            message_id: summary.id.clone(),
            name: summary.from.name.clone(),
            email: summary.from.email.clone(),
            display: summary.from.display.clone(),
            subject: summary.subject.clone(),
            preview: summary.preview.clone(),
            received: summary.received.clone(),
            provider,
        }
    }

    pub fn from_email(email: &EmailContext, provider: ProviderKind) -> Self {
        Self::from_summary(&email.summary(), provider)
    }

    /// Fill in missing name and display and clamp the preview.
    fn normalized(mut self) -> Self {
        self.name = self.name.trim().to_string();
        self.email = self.email.trim().to_string();
        if self.name.is_empty() && !self.email.is_empty() {
            self.name = self
                .email
                .split('@')
                .next()
                .unwrap_or_default()
                .to_string();
        }
        if self.display.trim().is_empty() {
            self.display = match (self.name.is_empty(), self.email.is_empty()) {
                (false, false) => format!("{} <{}>", self.name, self.email),
                (false, true) => self.name.clone(),
                (true, false) => self.email.clone(),
                (true, true) => UNKNOWN_SENDER.to_string(),
            };
        }
        if self.name.is_empty() {
            self.name = self.display.clone();
        }
        self.preview = truncate_chars(&self.preview, PREVIEW_CHARS);
        self
    }

    fn key(&self) -> (String, String) {
        (self.email.to_lowercase(), self.name.to_lowercase())
    }

    /// Copy every non-empty field of `newer` over this entry.
    fn absorb(&mut self, newer: Contact) {
        fn take(slot: &mut String, value: String) {
            if !value.is_empty() {
                *slot = value;
            }
        }
        take(&mut self.message_id, newer.message_id);
        take(&mut self.name, newer.name);
        take(&mut self.email, newer.email);
        take(&mut self.display, newer.display);
        take(&mut self.subject, newer.subject);
        take(&mut self.preview, newer.preview);
        take(&mut self.received, newer.received);
        self.provider = newer.provider;
    }
}

/// Bounded most-recent-first contact list.
#[derive(Debug)]
pub struct ContactBook {
    capacity: usize,
    owner: Option<AccountIdentity>,
    entries: Vec<Contact>,
}

impl ContactBook {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            owner: None,
            entries: Vec::new(),
        }
    }

    /// Set the account owner, who is never listed. Entries merged before
    /// the owner was known are dropped when they match.
    pub fn set_owner(&mut self, owner: Option<AccountIdentity>) {
        self.owner = owner;
        let entries = std::mem::take(&mut self.entries);
        self.entries = entries
            .into_iter()
            .filter(|entry| {
                let (email, name) = entry.key();
                !self.is_owner(&email, &name)
            })
            .collect();
    }

    pub fn reset(&mut self) {
        self.entries.clear();
    }

    pub fn entries(&self) -> &[Contact] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Merge an observation. The entry moves to the front; returns false when
    /// the observation was the account owner.
    pub fn merge(&mut self, observation: Contact) -> bool {
        let (key_email, key_name) = observation.clone().normalized().key();
        if self.is_owner(&key_email, &key_name) {
            return false;
        }

        let existing = self.entries.iter().position(|entry| {
            let (email, name) = entry.key();
            if key_email.is_empty() {
                email.is_empty() && name == key_name
            } else {
                email == key_email
            }
        });
        let merged = match existing {
            Some(index) => {
                let mut entry = self.entries.remove(index);
                entry.absorb(observation);
                entry.normalized()
            }
            None => observation.normalized(),
        };
        self.entries.insert(0, merged);
        self.entries.truncate(self.capacity);
        true
    }

    /// A message to fall back on when nothing is focused: the most recent
    /// unhandled one, else the most recent at all.
    pub fn fallback_message_id(&self, ledger: &MailLedger) -> Option<String> {
        let with_id = || self.entries.iter().filter(|c| !c.message_id.is_empty());
        with_id()
            .find(|c| !ledger.is_handled(&c.message_id))
            .or_else(|| with_id().next())
            .map(|c| c.message_id.clone())
    }

    fn is_owner(&self, key_email: &str, key_name: &str) -> bool {
        let Some(owner) = &self.owner else {
            return false;
        };
        if !key_email.is_empty() {
            return key_email == owner.email;
        }
        !owner.display_name.is_empty() && key_name == owner.display_name.to_lowercase()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parley_core::Identity;

    fn seen(id: &str, name: &str, email: &str) -> Contact {
        Contact::from_summary(
            &MessageSummary {
                id: id.to_string(),
                from: Identity::from_parts(name, email),
                subject: format!("subject {}", id),
                received: "2026-10-18T09:00:00Z".to_string(),
                preview: "hello".to_string(),
            },
            ProviderKind::Google,
        )
    }

    fn book() -> ContactBook {
        let mut book = ContactBook::new(15);
        book.set_owner(Some(AccountIdentity::new("Me@Example.com", "Me Myself")));
        book
    }

    #[test]
    fn test_merge_moves_to_front() {
        let mut book = book();
        book.merge(seen("m-1", "Dana", "dana@example.com"));
        book.merge(seen("m-2", "Lee", "lee@example.com"));
        book.merge(seen("m-3", "", "DANA@example.com"));
        assert_eq!(book.len(), 2);
        let first = &book.entries()[0];
        assert_eq!(first.message_id, "m-3");
        // the earlier name survives an observation without one
        assert_eq!(first.email, "DANA@example.com");
        assert_eq!(first.name, "Dana");
        assert_eq!(book.entries()[1].message_id, "m-2");
    }

    #[test]
    fn test_owner_is_never_listed() {
        let mut book = book();
        assert!(!book.merge(seen("m-1", "Me", "me@example.com")));
        assert!(!book.merge(seen("m-2", "me myself", "")));
        assert!(book.is_empty());
    }

    #[test]
    fn test_late_owner_drops_existing_entry() {
        let mut book = ContactBook::new(15);
        book.merge(seen("m-1", "Me", "me@example.com"));
        book.merge(seen("m-2", "Dana", "dana@example.com"));
        assert_eq!(book.len(), 2);
        book.set_owner(Some(AccountIdentity::new("me@example.com", "Me")));
        assert_eq!(book.len(), 1);
        assert_eq!(book.entries()[0].email, "dana@example.com");
    }

    #[test]
    fn test_capacity_is_enforced() {
        let mut book = ContactBook::new(3);
        for i in 0..5 {
            book.merge(seen(&format!("m-{}", i), "", &format!("p{}@example.com", i)));
        }
        assert_eq!(book.len(), 3);
        assert_eq!(book.entries()[0].email, "p4@example.com");
        assert_eq!(book.entries()[2].email, "p2@example.com");
    }

    #[test]
    fn test_name_falls_back_to_local_part() {
        let mut book = book();
        book.merge(seen("m-1", "", "sam.k@example.com"));
        let entry = &book.entries()[0];
        assert_eq!(entry.name, "sam.k");
        assert_eq!(entry.display, "sam.k@example.com");
    }

    #[test]
    fn test_blank_sender_is_unknown() {
        let mut book = book();
        assert!(book.merge(seen("m-1", "", "")));
        assert_eq!(book.entries()[0].name, "Unknown Sender");
    }

    #[test]
    fn test_fallback_prefers_unhandled() {
        let mut book = book();
        let mut ledger = MailLedger::new();
        book.merge(seen("m-1", "Dana", "dana@example.com"));
        book.merge(seen("m-2", "Lee", "lee@example.com"));
        ledger.mark_handled("m-2");
        assert_eq!(book.fallback_message_id(&ledger).as_deref(), Some("m-1"));
        ledger.mark_handled("m-1");
        assert_eq!(book.fallback_message_id(&ledger).as_deref(), Some("m-2"));
        assert!(ContactBook::new(5).fallback_message_id(&ledger).is_none());
    }

    #[test]
    fn test_serializes_wire_names() {
        let json = serde_json::to_value(seen("m-1", "Dana", "dana@example.com")).unwrap();
        assert_eq!(json["id"], "m-1");
        assert_eq!(json["service"], "google");
        assert_eq!(json["display"], "Dana <dana@example.com>");
    }
}
