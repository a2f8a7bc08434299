//! Background watcher that announces newly arrived unread mail.

use std::sync::Arc;

use parley_provider::{MailboxProvider, MessageSummary, SearchQuery};
use tokio::sync::{Mutex, Notify};
use tracing::{debug, info, warn};

use crate::contacts::Contact;
use crate::error::Result;
use crate::outbound::Outbound;
use crate::session::SessionSettings;
use crate::state::SessionState;
use crate::suggestions::render_block;
use crate::types::{Suggestion, Turn};

pub const NEW_EMAIL_STATUS: &str = "New email arrived.";

/// Polls for unread mail and speaks one proactive message per batch.
pub struct UnreadNotifier {
    state: Arc<Mutex<SessionState>>,
    provider: Arc<dyn MailboxProvider>,
    outbound: Outbound,
    settings: SessionSettings,
    shutdown: Arc<Notify>,
}

impl UnreadNotifier {
    pub fn new(
        state: Arc<Mutex<SessionState>>,
        provider: Arc<dyn MailboxProvider>,
        outbound: Outbound,
        settings: SessionSettings,
        shutdown: Arc<Notify>,
    ) -> Self {
        Self {
            state,
            provider,
            outbound,
            settings,
            shutdown,
        }
    }

    /// Run until the shutdown signal fires.
    pub async fn run(self) {
        info!(
            interval_secs = self.settings.poll_interval.as_secs(),
            "Unread notifier started"
        );
        tokio::select! {
            _ = tokio::time::sleep(self.settings.poll_initial_delay) => {}
            _ = self.shutdown.notified() => {
                info!("Unread notifier stopped before first poll");
                return;
            }
        }

        loop {
            tokio::select! {
                result = self.poll_once() => match result {
                    Ok(0) => {}
                    Ok(count) => debug!(count, "Announced new mail"),
                    Err(e) => warn!("Unread poll failed: {}", e),
                },
                _ = self.shutdown.notified() => break,
            }
            tokio::select! {
                _ = tokio::time::sleep(self.settings.poll_interval) => {}
                _ = self.shutdown.notified() => break,
            }
        }
        info!("Unread notifier stopped");
    }

    /// One poll. Returns how many messages were newly announced.
    ///
    /// The mailbox is queried without holding the session lock; the lock is
    /// taken only to filter, record and announce.
    pub async fn poll_once(&self) -> Result<usize> {
        let seen: Vec<String> = {
            let state = self.state.lock().await;
            if !state.is_active() {
                return Ok(0);
            }
            state.ledger.seen_ids().collect()
        };
        let query = SearchQuery::new("", self.settings.poll_batch_size).excluding(seen);
        let found = self.provider.search(&query).await?;

        let mut state = self.state.lock().await;
        if !state.is_active() {
            return Ok(0);
        }
        let fresh: Vec<MessageSummary> = found
            .into_iter()
            .filter(|m| !m.id.is_empty())
            .filter(|m| !state.ledger.is_handled(&m.id) && !state.ledger.is_announced(&m.id))
            .collect();
        if fresh.is_empty() {
            return Ok(0);
        }

        state.ensure_owner(self.provider.as_ref()).await?;
        let kind = state.kind;
        // Results are newest first; merge oldest first so the newest leads.
        for message in fresh.iter().rev() {
            state.ledger.announce(&message.id);
            state.contacts.merge(Contact::from_summary(message, kind));
        }
        self.outbound.people(state.contacts.entries());

        let spoken = announcement(&fresh);
        state.history.push(Turn::assistant(spoken.clone()));
        let message = format!("{} {}", spoken, render_block(&quick_replies()));
        self.outbound.speak(&message, NEW_EMAIL_STATUS).await;
        Ok(fresh.len())
    }
}

fn announcement(fresh: &[MessageSummary]) -> String {
    let Some(latest) = fresh.first() else {
        return String::new();
    };
    let sender = match latest.from.spoken_name() {
        "" => "someone",
        name => name,
    };
    let subject = match latest.subject.trim() {
        "" => "(No Subject)",
        subject => subject,
    };
    if fresh.len() > 1 {
        format!(
            "You just received {} new emails. The most recent is from {} about \"{}\". Want me to open it?",
            fresh.len(),
            sender,
            subject
        )
    } else {
        format!(
            "You just received a new email from {} about \"{}\". Want me to open it?",
            sender, subject
        )
    }
}

fn quick_replies() -> Vec<Suggestion> {
    vec![
        Suggestion::new("Read it", "Please read my latest email."),
        Suggestion::new("Summarize it", "Summarize the newest email for me."),
        Suggestion::new("Reply", "Draft a quick reply to the latest email."),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::SessionEvent;
    use crate::types::Role;
    use parley_core::{AccountIdentity, Identity, Lifecycle, ProviderKind};
    use parley_provider::{EmailContext, InMemoryProvider};
    use parley_voice::{AudioStore, MockSynthesizer};
    use std::time::Duration;
    use tokio::sync::mpsc;

    struct Harness {
        provider: Arc<InMemoryProvider>,
        state: Arc<Mutex<SessionState>>,
        shutdown: Arc<Notify>,
        notifier: UnreadNotifier,
        events: mpsc::UnboundedReceiver<SessionEvent>,
    }

    fn harness() -> Harness {
        let kind = ProviderKind::Google;
        let owner = AccountIdentity::new("me@example.com", "Me");
        let provider = Arc::new(InMemoryProvider::new(kind, owner.clone()));
        let (tx, events) = mpsc::unbounded_channel();
        let outbound = Outbound::new(
            tx,
            Arc::new(MockSynthesizer::new()),
            Arc::new(AudioStore::new(8)),
        );
        let mut state = SessionState::new(kind, "system".to_string(), 15);
        state.set_owner(owner);
        let state = Arc::new(Mutex::new(state));
        let shutdown = Arc::new(Notify::new());
        let notifier = UnreadNotifier::new(
            state.clone(),
            provider.clone(),
            outbound,
            SessionSettings::default(),
            shutdown.clone(),
        );
        Harness {
            provider,
            state,
            shutdown,
            notifier,
            events,
        }
    }

    fn deliver(provider: &InMemoryProvider, id: &str, name: &str, subject: &str) {
        provider.deliver(
            EmailContext {
                id: id.to_string(),
                subject: subject.to_string(),
                from: Identity::from_parts(name, &format!("{}@example.com", name.to_lowercase())),
                ..Default::default()
            },
            "body",
            true,
        );
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<SessionEvent>) -> Vec<SessionEvent> {
        let mut out = Vec::new();
        while let Ok(event) = rx.try_recv() {
            out.push(event);
        }
        out
    }

    fn spoken(events: &[SessionEvent]) -> Vec<String> {
        events
            .iter()
            .filter_map(|e| match e {
                SessionEvent::ChatAppend {
                    role: Role::Assistant,
                    text,
                } => Some(text.clone()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_announcement_wording() {
        let one = MessageSummary {
            id: "m-1".to_string(),
            from: Identity::from_parts("Dana", "dana@example.com"),
            subject: "Budget".to_string(),
            ..Default::default()
        };
        assert_eq!(
            announcement(std::slice::from_ref(&one)),
            "You just received a new email from Dana about \"Budget\". Want me to open it?"
        );
        let blank = MessageSummary {
            id: "m-2".to_string(),
            ..Default::default()
        };
        assert_eq!(
            announcement(&[blank, one]),
            "You just received 2 new emails. The most recent is from someone about \"(No Subject)\". Want me to open it?"
        );
    }

    #[tokio::test]
    async fn test_two_new_messages_one_announcement() {
        let mut h = harness();
        deliver(&h.provider, "m-1", "Lee", "Old news");
        deliver(&h.provider, "m-2", "Dana", "Budget");

        assert_eq!(h.notifier.poll_once().await.unwrap(), 2);
        let events = drain(&mut h.events);
        let said = spoken(&events);
        assert_eq!(
            said,
            vec!["You just received 2 new emails. The most recent is from Dana about \"Budget\". Want me to open it?".to_string()]
        );
        assert!(events.iter().any(|e| matches!(
            e,
            SessionEvent::Suggestions { items } if items.len() == 3 && items[0].label == "Read it"
        )));
        assert!(events.iter().any(|e| matches!(
            e,
            SessionEvent::PlayAudio { status_text, .. } if status_text == "New email arrived."
        )));

        let state = h.state.lock().await;
        assert!(state.ledger.is_announced("m-1"));
        assert!(state.ledger.is_announced("m-2"));
        assert_eq!(state.contacts.entries()[0].name, "Dana");
        assert_eq!(state.contacts.entries()[1].name, "Lee");
        assert_eq!(state.history.last().unwrap().role, Role::Assistant);
    }

    #[tokio::test]
    async fn test_poll_resolves_missing_owner() {
        let h = harness();
        *h.state.lock().await = SessionState::new(ProviderKind::Google, "system".to_string(), 15);
        deliver(&h.provider, "m-1", "Me", "Note to self");
        deliver(&h.provider, "m-2", "Dana", "Budget");

        h.notifier.poll_once().await.unwrap();
        let state = h.state.lock().await;
        assert_eq!(state.owner.as_ref().unwrap().email, "me@example.com");
        assert_eq!(state.contacts.len(), 1);
        assert_eq!(state.contacts.entries()[0].name, "Dana");
    }

    #[tokio::test]
    async fn test_nothing_is_announced_twice() {
        let mut h = harness();
        deliver(&h.provider, "m-1", "Dana", "Budget");
        assert_eq!(h.notifier.poll_once().await.unwrap(), 1);
        drain(&mut h.events);
        assert_eq!(h.notifier.poll_once().await.unwrap(), 0);
        assert!(drain(&mut h.events).is_empty());
    }

    #[tokio::test]
    async fn test_handled_messages_are_skipped() {
        let mut h = harness();
        deliver(&h.provider, "m-1", "Dana", "Budget");
        h.state.lock().await.ledger.mark_handled("m-1");
        assert_eq!(h.notifier.poll_once().await.unwrap(), 0);
        assert!(drain(&mut h.events).is_empty());
    }

    #[tokio::test]
    async fn test_poll_failure_is_an_error() {
        let h = harness();
        h.provider.fail_searches(true);
        assert!(h.notifier.poll_once().await.is_err());
    }

    #[tokio::test]
    async fn test_stopping_session_is_silent() {
        let mut h = harness();
        deliver(&h.provider, "m-1", "Dana", "Budget");
        h.state.lock().await.lifecycle = Lifecycle::Stopping;
        assert_eq!(h.notifier.poll_once().await.unwrap(), 0);
        assert!(drain(&mut h.events).is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_waits_grace_period_then_polls() {
        let Harness {
            provider,
            shutdown,
            notifier,
            mut events,
            ..
        } = harness();
        deliver(&provider, "m-1", "Dana", "Budget");
        let handle = tokio::spawn(notifier.run());

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert!(drain(&mut events).is_empty());

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(spoken(&drain(&mut events)).len(), 1);

        deliver(&provider, "m-2", "Lee", "Lunch");
        tokio::time::sleep(Duration::from_secs(45)).await;
        assert_eq!(spoken(&drain(&mut events)).len(), 1);

        shutdown.notify_one();
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_during_grace_period() {
        let h = harness();
        let handle = tokio::spawn(h.notifier.run());
        h.shutdown.notify_one();
        handle.await.unwrap();
    }
}
