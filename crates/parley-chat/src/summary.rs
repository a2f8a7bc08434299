//! Start-of-session status summary.

use chrono::Utc;
use parley_provider::time::{start_of_yesterday_utc, today_bounds_local};
use parley_provider::{EventQuery, EventSummary, MailboxProvider, MessageSummary};
use tracing::warn;

const UNREAD_LIMIT: usize = 5;
const TODAY_EVENT_LIMIT: usize = 5;
const NAMED_SENDERS: usize = 3;
const NAMED_EVENTS: usize = 3;

/// What the session learned about the mailbox at start-up.
#[derive(Debug, Clone, Default)]
pub struct StartupSnapshot {
    /// Unread messages since the start of yesterday, newest first.
    pub unread: Vec<MessageSummary>,
    pub mail_line: String,
    pub calendar_line: String,
}

impl StartupSnapshot {
    pub fn status_text(&self) -> String {
        format!("{} {}", self.mail_line, self.calendar_line)
    }
}

/// Fetch recent unread mail and today's events concurrently.
pub async fn gather(provider: &dyn MailboxProvider) -> StartupSnapshot {
    let since = start_of_yesterday_utc(Utc::now());
    let (time_min, time_max) = today_bounds_local();
    let today = EventQuery {
        time_min,
        time_max,
        max_results: TODAY_EVENT_LIMIT,
        text: None,
    };

    let (mail, events) = tokio::join!(
        provider.unread_since(since, UNREAD_LIMIT),
        provider.list_events(&today)
    );

    let (unread, mail_line) = match mail {
        Ok(unread) => {
            let line = describe_unread(&unread);
            (unread, line)
        }
        Err(e) => {
            warn!("Start-up unread check failed: {}", e);
            (Vec::new(), "Could not check for new emails.".to_string())
        }
    };
    let calendar_line = match events {
        Ok(events) => describe_events(&events),
        Err(e) => {
            warn!("Start-up calendar check failed: {}", e);
            "Could not check your calendar.".to_string()
        }
    };

    StartupSnapshot {
        unread,
        mail_line,
        calendar_line,
    }
}

fn describe_unread(unread: &[MessageSummary]) -> String {
    if unread.is_empty() {
        return "You have no new emails since yesterday.".to_string();
    }
    let mut senders: Vec<&str> = Vec::new();
    for message in unread {
        let name = message.from.spoken_name();
        if !name.is_empty() && !senders.contains(&name) {
            senders.push(name);
        }
        if senders.len() == NAMED_SENDERS {
            break;
        }
    }
    let count = unread.len();
    let noun = if count == 1 { "email" } else { "emails" };
    if senders.is_empty() {
        format!("You have {} new {} since yesterday.", count, noun)
    } else {
        format!(
            "You have {} new {} since yesterday, including messages from {}.",
            count,
            noun,
            senders.join(", ")
        )
    }
}

fn describe_events(events: &[EventSummary]) -> String {
    if events.is_empty() {
        return "You have no events scheduled for today.".to_string();
    }
    let titles: Vec<&str> = events
        .iter()
        .take(NAMED_EVENTS)
        .map(|e| e.title.as_str())
        .filter(|t| !t.is_empty())
        .collect();
    let count = events.len();
    let noun = if count == 1 { "event" } else { "events" };
    if titles.is_empty() {
        format!("You have {} {} on your calendar for today.", count, noun)
    } else {
        format!(
            "You have {} {} on your calendar for today, starting with {}.",
            count,
            noun,
            titles.join(", ")
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parley_core::{AccountIdentity, Identity, ProviderKind};
    use parley_provider::{EmailContext, InMemoryProvider};

    fn unread(id: &str, name: &str) -> MessageSummary {
        MessageSummary {
            id: id.to_string(),
            from: Identity::from_parts(name, &format!("{}@example.com", name.to_lowercase())),
            ..Default::default()
        }
    }

    #[test]
    fn test_describe_unread() {
        assert_eq!(
            describe_unread(&[]),
            "You have no new emails since yesterday."
        );
        assert_eq!(
            describe_unread(&[unread("1", "Dana")]),
            "You have 1 new email since yesterday, including messages from Dana."
        );
        let many = [
            unread("1", "Dana"),
            unread("2", "Dana"),
            unread("3", "Lee"),
            unread("4", "Sam"),
            unread("5", "Kim"),
        ];
        assert_eq!(
            describe_unread(&many),
            "You have 5 new emails since yesterday, including messages from Dana, Lee, Sam."
        );
    }

    #[test]
    fn test_describe_events() {
        assert_eq!(
            describe_events(&[]),
            "You have no events scheduled for today."
        );
        let events: Vec<EventSummary> = ["Standup", "Lunch", "Review", "Gym"]
            .iter()
            .map(|t| EventSummary {
                title: t.to_string(),
                ..Default::default()
            })
            .collect();
        assert_eq!(
            describe_events(&events),
            "You have 4 events on your calendar for today, starting with Standup, Lunch, Review."
        );
    }

    #[tokio::test]
    async fn test_gather_from_provider() {
        let provider = InMemoryProvider::new(
            ProviderKind::Google,
            AccountIdentity::new("me@example.com", "Me"),
        );
        provider.deliver(
            EmailContext {
                id: "m-1".to_string(),
                from: Identity::from_parts("Dana", "dana@example.com"),
                received: Utc::now().to_rfc3339(),
                ..Default::default()
            },
            "hi",
            true,
        );
        let snapshot = gather(&provider).await;
        assert_eq!(snapshot.unread.len(), 1);
        assert_eq!(
            snapshot.status_text(),
            "You have 1 new email since yesterday, including messages from Dana. You have no events scheduled for today."
        );
    }
}
