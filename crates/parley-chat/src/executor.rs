//! Runs decoded tool calls against the mailbox and the session state.

use std::sync::Arc;

use chrono::Utc;
use parley_core::identity::{join_displays, split_recipients};
use parley_provider::time::{default_window, ensure_zoned, normalize_rfc3339};
use parley_provider::{
    EmailContext, EventQuery, EventReschedule, EventSummary, MailboxProvider, MessageSummary,
    NewEvent, OutgoingMessage, SearchQuery,
};
use serde_json::json;
use tracing::{debug, warn};

use crate::contacts::Contact;
use crate::draft::{dedupe_recipients, PendingDraft};
use crate::error::{ChatError, Result};
use crate::events::SessionEvent;
use crate::llm::{CompletionRequest, LanguageModel};
use crate::outbound::Outbound;
use crate::prompts::summary_prompt;
use crate::session::SessionSettings;
use crate::state::SessionState;
use crate::tools::ToolCall;
use crate::types::{ToolCallRequest, Turn};

const DEFAULT_EVENT_RESULTS: usize = 10;
const MAX_SEARCH_RESULTS: usize = 25;
const MAX_EVENT_RESULTS: usize = 50;

/// Executes tool calls for one session.
#[derive(Clone)]
pub struct ToolExecutor {
    provider: Arc<dyn MailboxProvider>,
    model: Arc<dyn LanguageModel>,
    outbound: Outbound,
    settings: SessionSettings,
}

impl ToolExecutor {
    pub fn new(
        provider: Arc<dyn MailboxProvider>,
        model: Arc<dyn LanguageModel>,
        outbound: Outbound,
        settings: SessionSettings,
    ) -> Self {
        Self {
            provider,
            model,
            outbound,
            settings,
        }
    }

    /// Decode and run one model-requested call. Always yields the text that
    /// goes back to the model; failures are rendered, never propagated.
    pub async fn run(&self, state: &mut SessionState, request: &ToolCallRequest) -> String {
        let call = match ToolCall::parse(state.kind, &request.name, &request.arguments) {
            Ok(call) => call,
            Err(e) => {
                warn!(tool = %request.name, "Rejected tool call: {}", e);
                return e.user_message();
            }
        };
        self.outbound.status(call.status_message(state.kind));
        debug!(tool = %request.name, "Executing tool");
        match self.execute(state, call).await {
            Ok(result) => result,
            Err(e) => {
                warn!(tool = %request.name, "Tool failed: {}", e);
                e.user_message()
            }
        }
    }

    pub async fn execute(&self, state: &mut SessionState, call: ToolCall) -> Result<String> {
        match call {
            ToolCall::SearchEmails { query, max_results } => {
                self.search(state, &query, max_results).await
            }
            ToolCall::ReadEmail { message_id } => {
                let id = state.focus.email_target(message_id.as_deref())?;
                let (email, _) = self.open_email(state, &id, true).await?;
                Ok(read_result(&email))
            }
            ToolCall::SummarizeEmail { message_id } => {
                self.summarize(state, message_id.as_deref()).await
            }
            ToolCall::DraftNewEmail { to, subject, body } => {
                self.draft_new(state, &to, subject, body).await
            }
            ToolCall::DraftReply { body } => self.draft_reply(state, body).await,
            ToolCall::SendDraft {} => self.send_draft(state).await,
            ToolCall::DeleteEmail { message_id } => {
                let id = state.focus.email_target(message_id.as_deref())?;
                self.provider.delete_message(&id).await?;
                self.retire_email(state, &id);
                Ok("Email deleted.".to_string())
            }
            ToolCall::ArchiveEmail { message_id } => {
                let id = state.focus.email_target(message_id.as_deref())?;
                self.provider.archive_message(&id).await?;
                self.retire_email(state, &id);
                Ok("Email archived.".to_string())
            }
            ToolCall::MarkAsRead { message_id } => {
                let id = state.focus.email_target(message_id.as_deref())?;
                if !state.ledger.is_handled(&id) {
                    self.provider.set_read(&id, true).await?;
                    state.ledger.mark_handled(&id);
                }
                Ok("Email marked as read.".to_string())
            }
            ToolCall::MarkAsUnread { message_id } => {
                let id = state.focus.email_target(message_id.as_deref())?;
                self.provider.set_read(&id, false).await?;
                state.ledger.mark_unhandled(&id);
                Ok("Email marked as unread.".to_string())
            }
            ToolCall::ListEvents {
                time_min,
                time_max,
                max_results,
                query,
            } => {
                self.list_events(state, time_min, time_max, max_results, query)
                    .await
            }
            ToolCall::QuickAdd { text } => {
                let event = self.provider.quick_add_event(&text).await?;
                self.focus_event(state, &event);
                Ok(format!("Event created: {}.", event.title))
            }
            ToolCall::CreateEvent {
                summary,
                start_time,
                end_time,
                timezone,
                location,
                attendees,
            } => {
                let event = NewEvent {
                    title: summary,
                    start: normalize_rfc3339(&start_time),
                    end: normalize_rfc3339(&end_time),
                    timezone: timezone.filter(|tz| !tz.trim().is_empty()),
                    location: location.filter(|l| !l.trim().is_empty()),
                    attendees: dedupe_recipients(attendees),
                };
                let created = self.provider.create_event(&event).await?;
                self.focus_event(state, &created);
                Ok(format!("Event created: {}.", created.title))
            }
            ToolCall::UpdateEventTime {
                event_id,
                start_time,
                end_time,
                timezone,
            } => {
                let id = state.focus.event_target(event_id.as_deref())?;
                let change = EventReschedule {
                    start: normalize_rfc3339(&start_time),
                    end: normalize_rfc3339(&end_time),
                    timezone: timezone.filter(|tz| !tz.trim().is_empty()),
                };
                let updated = self.provider.update_event_time(&id, &change).await?;
                self.focus_event(state, &updated);
                Ok(format!("Event time updated for '{}'.", updated.title))
            }
            ToolCall::DeleteEvent { event_id } => {
                let id = state.focus.event_target(event_id.as_deref())?;
                self.provider.delete_event(&id).await?;
                if state.focus.clear_if(&id) {
                    self.publish_focus(state);
                }
                Ok("Event deleted.".to_string())
            }
        }
    }

    /// Discard the pending draft on the client's request.
    pub fn cancel_draft(&self, state: &mut SessionState) -> Result<()> {
        state.drafts.cancel()?;
        self.outbound.emit(SessionEvent::DraftClear);
        Ok(())
    }

    // =========================================================================
    // Mail
    // =========================================================================

    async fn search(
        &self,
        state: &mut SessionState,
        text: &str,
        max_results: Option<usize>,
    ) -> Result<String> {
        let limit = max_results
            .unwrap_or(self.settings.search_default_limit)
            .clamp(1, MAX_SEARCH_RESULTS);
        let query = SearchQuery::new(text.trim(), limit).excluding(state.ledger.handled_ids());
        let results = self.provider.search(&query).await?;
        debug!(results = results.len(), "Search complete");
        if results.is_empty() {
            return Ok(if query.text.is_empty() {
                "No emails found.".to_string()
            } else {
                format!("No emails found for '{}'", query.text)
            });
        }

        state.ensure_owner(self.provider.as_ref()).await?;
        for summary in results.iter().rev() {
            state.contacts.merge(Contact::from_summary(summary, state.kind));
        }
        self.publish_people(state);
        let rows: Vec<_> = results.iter().map(search_row).collect();
        Ok(serde_json::Value::Array(rows).to_string())
    }

    /// Fetch a message, make it the focus, and optionally mark it read.
    async fn open_email(
        &self,
        state: &mut SessionState,
        id: &str,
        mark_read: bool,
    ) -> Result<(EmailContext, String)> {
        let (email, body) = self
            .provider
            .fetch_message(id, self.settings.body_preview_chars)
            .await?;
        state.ensure_owner(self.provider.as_ref()).await?;
        state.focus.focus_email(email.clone());
        state.contacts.merge(Contact::from_email(&email, state.kind));
        self.publish_people(state);
        self.publish_focus(state);
        if mark_read {
            self.auto_mark_read(state, &email.id).await;
        }
        Ok((email, body))
    }

    /// The focused email, or failing that the latest contact's message.
    fn implicit_email_id(&self, state: &SessionState, explicit: Option<&str>) -> Result<String> {
        state.focus.email_target(explicit).or_else(|err| {
            state
                .contacts
                .fallback_message_id(&state.ledger)
                .ok_or(err)
        })
    }

    async fn summarize(&self, state: &mut SessionState, explicit: Option<&str>) -> Result<String> {
        let id = self.implicit_email_id(state, explicit)?;
        let (email, body) = self.open_email(state, &id, false).await?;
        let prompt = [Turn::user(summary_prompt(&email, &body))];
        let reply = self
            .model
            .complete(CompletionRequest {
                history: &prompt,
                tools: None,
                temperature: self.settings.summary_temperature,
            })
            .await?;
        self.auto_mark_read(state, &email.id).await;
        Ok(reply
            .content
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .unwrap_or_else(|| "I couldn't put together a summary of that message.".to_string()))
    }

    async fn draft_new(
        &self,
        state: &mut SessionState,
        to: &str,
        subject: String,
        body: String,
    ) -> Result<String> {
        let recipients = dedupe_recipients(split_recipients(to));
        if recipients.is_empty() {
            return Err(ChatError::InvalidArguments {
                tool: "draft_new_email".to_string(),
                reason: "no recipients".to_string(),
            });
        }
        let outgoing = OutgoingMessage {
            to: recipients,
            subject,
            body,
            in_reply_to: None,
        };
        let handle = self.provider.create_draft(&outgoing).await?;
        self.stage(state, outgoing, handle)?;
        state.focus.clear_email();
        self.publish_focus(state);
        Ok("Draft created. Ask user to confirm.".to_string())
    }

    async fn draft_reply(&self, state: &mut SessionState, body: String) -> Result<String> {
        let id = self.implicit_email_id(state, None)?;
        let email = match state.focus.email() {
            Some(focused) if focused.id == id => focused.clone(),
            _ => self.open_email(state, &id, false).await?.0,
        };

        let targets = dedupe_recipients(email.reply_targets().iter().map(|t| t.mailbox()));
        if targets.is_empty() {
            return Err(ChatError::NoContext("sender"));
        }
        let id = email.id.clone();
        let outgoing = OutgoingMessage {
            to: targets,
            subject: email.reply_subject(),
            body,
            in_reply_to: Some(email),
        };
        let handle = self.provider.create_draft(&outgoing).await?;
        self.stage(state, outgoing, handle)?;
        // marked read only once the draft is staged
        self.auto_mark_read(state, &id).await;
        Ok("Reply draft created. Ask user to confirm.".to_string())
    }

    fn stage(
        &self,
        state: &mut SessionState,
        outgoing: OutgoingMessage,
        handle: parley_provider::DraftHandle,
    ) -> Result<()> {
        let draft = PendingDraft {
            to: if handle.to.is_empty() {
                outgoing.to
            } else {
                handle.to.clone()
            },
            subject: if handle.subject.is_empty() {
                outgoing.subject
            } else {
                handle.subject.clone()
            },
            body: outgoing.body,
            reply_to: outgoing.in_reply_to,
            handle,
        };
        self.outbound.emit(SessionEvent::DraftPreview {
            to: draft.recipients_display(),
            subject: draft.subject.clone(),
            body: draft.body.clone(),
        });
        state.drafts.stage(draft)
    }

    async fn send_draft(&self, state: &mut SessionState) -> Result<String> {
        let draft = state.drafts.require()?.clone();
        self.provider
            .send_draft(&draft.outgoing(), &draft.handle)
            .await?;
        state.drafts.mark_sent()?;
        if let Some(replied) = &draft.reply_to {
            self.auto_mark_read(state, &replied.id).await;
        }
        state.focus.clear();
        self.outbound.emit(SessionEvent::DraftClear);
        self.publish_focus(state);
        Ok("Email sent.".to_string())
    }

    /// After delete or archive: never show the message again and drop focus.
    fn retire_email(&self, state: &mut SessionState, id: &str) {
        state.ledger.mark_handled(id);
        if state.focus.clear_if(id) {
            self.publish_focus(state);
        }
    }

    /// Mark read unless already handled. Failures are logged, not surfaced.
    async fn auto_mark_read(&self, state: &mut SessionState, id: &str) {
        if state.ledger.is_handled(id) {
            return;
        }
        match self.provider.set_read(id, true).await {
            Ok(()) => {
                state.ledger.mark_handled(id);
            }
            Err(e) => warn!(message_id = %id, "Auto mark-as-read failed: {}", e),
        }
    }

    // =========================================================================
    // Calendar
    // =========================================================================

    async fn list_events(
        &self,
        state: &mut SessionState,
        time_min: Option<String>,
        time_max: Option<String>,
        max_results: Option<usize>,
        text: Option<String>,
    ) -> Result<String> {
        let (default_min, default_max) = default_window(Utc::now());
        let zoned = |value: Option<String>, fallback: String| {
            value
                .filter(|v| !v.trim().is_empty())
                .map(|v| ensure_zoned(&v))
                .unwrap_or(fallback)
        };
        let query = EventQuery {
            time_min: zoned(time_min, default_min),
            time_max: zoned(time_max, default_max),
            max_results: max_results
                .unwrap_or(DEFAULT_EVENT_RESULTS)
                .clamp(1, MAX_EVENT_RESULTS),
            text: text.filter(|t| !t.trim().is_empty()),
        };
        let events = self.provider.list_events(&query).await?;
        if events.is_empty() {
            return Ok("No upcoming events found.".to_string());
        }
        if let [only] = events.as_slice() {
            self.focus_event(state, only);
        }
        let rows: Vec<_> = events.iter().map(event_row).collect();
        Ok(serde_json::Value::Array(rows).to_string())
    }

    fn focus_event(&self, state: &mut SessionState, event: &EventSummary) {
        state.focus.focus_event(event.context());
        self.publish_focus(state);
    }

    // =========================================================================
    // Client updates
    // =========================================================================

    pub fn publish_focus(&self, state: &SessionState) {
        self.outbound.emit(SessionEvent::context(state.focus.current()));
    }

    pub fn publish_people(&self, state: &SessionState) {
        self.outbound.people(state.contacts.entries());
    }
}

fn search_row(summary: &MessageSummary) -> serde_json::Value {
    json!({
        "id": summary.id,
        "from": summary.from.display,
        "from_name": summary.from.name,
        "from_email": summary.from.email,
        "subject": summary.subject,
        "received": summary.received,
        "body_preview": summary.preview,
    })
}

fn read_result(email: &EmailContext) -> String {
    json!({
        "id": email.id,
        "from": email.from.display,
        "from_name": email.from.name,
        "from_email": email.from.email,
        "reply_to": join_displays(&email.reply_to),
        "subject": email.subject,
        "to": join_displays(&email.to),
        "cc": join_displays(&email.cc),
        "received": email.received,
        "body_preview": email.body_preview,
    })
    .to_string()
}

fn event_row(event: &EventSummary) -> serde_json::Value {
    json!({
        "id": event.id,
        "summary": event.title,
        "start": event.start,
        "end": event.end,
        "location": event.location,
        "organizer": event.organizer,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::draft::DraftStatus;
    use crate::llm::ScriptedModel;
    use crate::types::ModelReply;
    use parley_core::{AccountIdentity, Identity, ProviderKind};
    use parley_provider::InMemoryProvider;
    use parley_voice::{AudioStore, MockSynthesizer};
    use tokio::sync::mpsc;

    struct Harness {
        provider: Arc<InMemoryProvider>,
        model: Arc<ScriptedModel>,
        executor: ToolExecutor,
        state: SessionState,
        events: mpsc::UnboundedReceiver<SessionEvent>,
    }

    impl Harness {
        fn new(kind: ProviderKind) -> Self {
            let owner = AccountIdentity::new("me@example.com", "Me");
            let provider = Arc::new(InMemoryProvider::new(kind, owner.clone()));
            let model = Arc::new(ScriptedModel::new());
            let (tx, events) = mpsc::unbounded_channel();
            let outbound = Outbound::new(
                tx,
                Arc::new(MockSynthesizer::new()),
                Arc::new(AudioStore::new(8)),
            );
            let executor = ToolExecutor::new(
                provider.clone(),
                model.clone(),
                outbound,
                SessionSettings::default(),
            );
            let mut state = SessionState::new(kind, "system".to_string(), 15);
            state.set_owner(owner);
            Self {
                provider,
                model,
                executor,
                state,
                events,
            }
        }

        fn deliver(&self, id: &str, name: &str, email: &str, subject: &str, body: &str) {
            self.provider.deliver(
                EmailContext {
                    id: id.to_string(),
                    subject: subject.to_string(),
                    from: Identity::from_parts(name, email),
                    received: "2026-10-18T08:00:00Z".to_string(),
                    ..Default::default()
                },
                body,
                true,
            );
        }

        async fn call(&mut self, name: &str, args: serde_json::Value) -> String {
            let request = ToolCallRequest {
                id: "call_1".to_string(),
                name: name.to_string(),
                arguments: args.to_string(),
            };
            self.executor.run(&mut self.state, &request).await
        }

        fn drain(&mut self) -> Vec<SessionEvent> {
            let mut out = Vec::new();
            while let Ok(event) = self.events.try_recv() {
                out.push(event);
            }
            out
        }
    }

    // =========================================================================
    // Mail
    // =========================================================================

    #[tokio::test]
    async fn test_search_returns_rows_and_publishes_people() {
        let mut h = Harness::new(ProviderKind::Google);
        h.deliver("m-1", "Dana", "dana@example.com", "Budget", "Numbers");
        let result = h.call("gmail_search_emails", json!({"query": "budget"})).await;
        let rows: serde_json::Value = serde_json::from_str(&result).unwrap();
        assert_eq!(rows[0]["id"], "m-1");
        assert_eq!(rows[0]["from_name"], "Dana");

        let events = h.drain();
        assert_eq!(
            events[0],
            SessionEvent::status("Searching your Gmail inbox for budget...")
        );
        assert!(events
            .iter()
            .any(|e| matches!(e, SessionEvent::PeopleList { people } if people.len() == 1)));
    }

    #[tokio::test]
    async fn test_search_with_no_results() {
        let mut h = Harness::new(ProviderKind::Microsoft);
        let result = h.call("outlook_search_emails", json!({"query": "nothing"})).await;
        assert_eq!(result, "No emails found for 'nothing'");
        let result = h.call("outlook_search_emails", json!({})).await;
        assert_eq!(result, "No emails found.");
    }

    #[tokio::test]
    async fn test_handled_ids_never_reappear_in_search() {
        let mut h = Harness::new(ProviderKind::Google);
        h.deliver("m-1", "Dana", "dana@example.com", "Budget", "a");
        h.deliver("m-2", "Lee", "lee@example.com", "Budget too", "b");
        h.state.ledger.mark_handled("m-2");
        let result = h.call("gmail_search_emails", json!({"query": "budget"})).await;
        assert!(result.contains("m-1"));
        assert!(!result.contains("m-2"));
    }

    #[tokio::test]
    async fn test_read_sets_focus_and_marks_read() {
        let mut h = Harness::new(ProviderKind::Google);
        h.deliver("m-1", "Dana", "dana@example.com", "Budget", "Numbers attached");
        h.state.focus.focus_event(parley_provider::EventContext::default());

        let result = h.call("gmail_read_email", json!({"message_id": "m-1"})).await;
        let parsed: serde_json::Value = serde_json::from_str(&result).unwrap();
        assert_eq!(parsed["subject"], "Budget");
        assert_eq!(parsed["body_preview"], "Numbers attached");

        assert_eq!(h.state.focus.email().unwrap().id, "m-1");
        assert!(h.state.focus.event().is_none());
        assert!(h.state.ledger.is_handled("m-1"));
        assert_eq!(h.provider.is_unread("m-1"), Some(false));
        assert!(h.drain().iter().any(|e| matches!(
            e,
            SessionEvent::ContextUpdate { context: Some(view) } if view.id == "m-1"
        )));
    }

    #[tokio::test]
    async fn test_read_without_target_is_no_context() {
        let mut h = Harness::new(ProviderKind::Google);
        let result = h.call("gmail_read_email", json!({})).await;
        assert_eq!(
            result,
            "Error: No email in context. Ask the user which email they mean."
        );
    }

    #[tokio::test]
    async fn test_mark_read_twice_is_once() {
        let mut h = Harness::new(ProviderKind::Google);
        h.deliver("m-1", "Dana", "dana@example.com", "Budget", "x");
        let first = h.call("gmail_mark_as_read", json!({"message_id": "m-1"})).await;
        let second = h.call("gmail_mark_as_read", json!({"message_id": "m-1"})).await;
        assert_eq!(first, "Email marked as read.");
        assert_eq!(second, first);
        assert!(h.state.ledger.is_handled("m-1"));
        let set_read_calls = h
            .provider
            .calls()
            .iter()
            .filter(|c| c.starts_with("set_read m-1"))
            .count();
        assert_eq!(set_read_calls, 1);
    }

    #[tokio::test]
    async fn test_mark_unread_forgets_handled() {
        let mut h = Harness::new(ProviderKind::Microsoft);
        h.deliver("m-1", "Dana", "dana@example.com", "Budget", "x");
        h.call("outlook_read_email", json!({"message_id": "m-1"})).await;
        let result = h.call("outlook_mark_as_unread", json!({})).await;
        assert_eq!(result, "Email marked as unread.");
        assert!(!h.state.ledger.is_handled("m-1"));
        assert_eq!(h.provider.is_unread("m-1"), Some(true));
    }

    #[tokio::test]
    async fn test_archive_clears_matching_focus() {
        let mut h = Harness::new(ProviderKind::Microsoft);
        h.deliver("m-1", "Dana", "dana@example.com", "Budget", "x");
        h.call("outlook_read_email", json!({"message_id": "m-1"})).await;
        let result = h.call("outlook_archive_email", json!({})).await;
        assert_eq!(result, "Email archived.");
        assert!(h.state.focus.current().is_none());
        assert_eq!(h.provider.is_in_inbox("m-1"), Some(false));
    }

    #[tokio::test]
    async fn test_delete_other_message_keeps_focus() {
        let mut h = Harness::new(ProviderKind::Google);
        h.deliver("m-1", "Dana", "dana@example.com", "Budget", "x");
        h.deliver("m-2", "Lee", "lee@example.com", "Spam", "y");
        h.call("gmail_read_email", json!({"message_id": "m-1"})).await;
        let result = h.call("gmail_delete_email", json!({"message_id": "m-2"})).await;
        assert_eq!(result, "Email deleted.");
        assert_eq!(h.state.focus.email().unwrap().id, "m-1");
        assert!(!h.provider.contains_message("m-2"));
    }

    #[tokio::test]
    async fn test_provider_failure_becomes_text() {
        let mut h = Harness::new(ProviderKind::Google);
        let result = h.call("gmail_delete_email", json!({"message_id": "ghost"})).await;
        assert_eq!(result, "Error: Could not find message ghost.");
    }

    #[tokio::test]
    async fn test_summarize_uses_model_and_marks_read() {
        let mut h = Harness::new(ProviderKind::Google);
        h.deliver("m-1", "Dana", "dana@example.com", "Budget", "Numbers attached");
        h.model.push_reply(ModelReply::text("Dana sent the budget numbers."));
        h.call("gmail_read_email", json!({"message_id": "m-1"})).await;
        h.provider.set_read("m-1", false).await.unwrap();
        h.state.ledger.mark_unhandled("m-1");

        let result = h.call("gmail_summarize_email", json!({})).await;
        assert_eq!(result, "Dana sent the budget numbers.");
        let request = &h.model.requests()[0];
        assert!(request.tool_names.is_none());
        assert!((request.temperature - 0.4).abs() < f32::EPSILON);
        assert!(request.history[0].text().contains("Numbers attached"));
        assert!(h.state.ledger.is_handled("m-1"));
    }

    #[tokio::test]
    async fn test_summarize_falls_back_to_latest_contact() {
        let mut h = Harness::new(ProviderKind::Google);
        h.deliver("m-1", "Dana", "dana@example.com", "Budget", "Numbers");
        h.call("gmail_search_emails", json!({"query": "budget"})).await;
        assert!(h.state.focus.current().is_none());
        h.model.push_reply(ModelReply::text("Summary."));
        let result = h.call("gmail_summarize_email", json!({})).await;
        assert_eq!(result, "Summary.");
        assert_eq!(h.state.focus.email().unwrap().id, "m-1");
    }

    #[tokio::test]
    async fn test_summarize_after_search_picks_newest() {
        let mut h = Harness::new(ProviderKind::Google);
        h.deliver("m-1", "Lee", "lee@example.com", "Old", "first");
        h.deliver("m-2", "Dana", "dana@example.com", "Newest", "second");
        h.call("gmail_search_emails", json!({})).await;
        assert_eq!(h.state.contacts.entries()[0].email, "dana@example.com");

        h.model.push_reply(ModelReply::text("Summary."));
        h.call("gmail_summarize_email", json!({})).await;
        assert_eq!(h.state.focus.email().unwrap().subject, "Newest");
    }

    #[tokio::test]
    async fn test_search_resolves_missing_owner() {
        let mut h = Harness::new(ProviderKind::Google);
        h.state = SessionState::new(ProviderKind::Google, "system".to_string(), 15);
        h.deliver("m-1", "Me", "me@example.com", "Note to self", "milk");
        h.deliver("m-2", "Dana", "dana@example.com", "Budget", "Numbers");
        h.call("gmail_search_emails", json!({})).await;
        assert_eq!(h.state.owner.as_ref().unwrap().email, "me@example.com");
        let people = h.state.contacts.entries();
        assert_eq!(people.len(), 1);
        assert_eq!(people[0].email, "dana@example.com");
    }

    // =========================================================================
    // Drafts
    // =========================================================================

    #[tokio::test]
    async fn test_draft_reply_without_context_creates_nothing() {
        let mut h = Harness::new(ProviderKind::Google);
        let result = h.call("gmail_draft_reply", json!({"body": "Thanks!"})).await;
        assert!(result.starts_with("Error: No email in context."));
        assert_eq!(h.state.drafts.status(), DraftStatus::Empty);
        assert!(h.provider.calls().is_empty());
    }

    #[tokio::test]
    async fn test_reply_preview_then_send() {
        let mut h = Harness::new(ProviderKind::Google);
        h.deliver("m-1", "Dana", "dana@example.com", "Budget", "Numbers");
        h.call("gmail_read_email", json!({"message_id": "m-1"})).await;
        h.drain();

        let result = h.call("gmail_draft_reply", json!({"body": "Looks good."})).await;
        assert_eq!(result, "Reply draft created. Ask user to confirm.");
        let preview = h
            .drain()
            .into_iter()
            .find(|e| matches!(e, SessionEvent::DraftPreview { .. }))
            .unwrap();
        assert_eq!(
            preview,
            SessionEvent::DraftPreview {
                to: "Dana <dana@example.com>".to_string(),
                subject: "Re: Budget".to_string(),
                body: "Looks good.".to_string(),
            }
        );

        let result = h.call("gmail_send_draft", json!({})).await;
        assert_eq!(result, "Email sent.");
        assert_eq!(h.state.drafts.status(), DraftStatus::Sent);
        assert!(h.state.focus.current().is_none());
        assert!(h.state.ledger.is_handled("m-1"));
        let sent = h.provider.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].in_reply_to.as_ref().unwrap().id, "m-1");
        assert!(h.drain().contains(&SessionEvent::DraftClear));
    }

    #[tokio::test]
    async fn test_failed_draft_leaves_message_unread() {
        let mut h = Harness::new(ProviderKind::Google);
        h.deliver("m-1", "Dana", "dana@example.com", "Budget", "Numbers");
        h.call("gmail_search_emails", json!({})).await;
        h.provider.fail_drafts(true);

        let result = h.call("gmail_draft_reply", json!({"body": "Thanks!"})).await;
        assert!(result.starts_with("Error executing tool:"));
        assert_eq!(h.state.drafts.status(), DraftStatus::Empty);
        assert_eq!(h.provider.is_unread("m-1"), Some(true));
        assert!(!h.state.ledger.is_handled("m-1"));
    }

    #[tokio::test]
    async fn test_reply_quotes_sender_name_with_comma() {
        let mut h = Harness::new(ProviderKind::Google);
        h.deliver("m-1", "Smith, Dana", "dana@example.com", "Budget", "Numbers");
        h.call("gmail_read_email", json!({"message_id": "m-1"})).await;
        h.call("gmail_draft_reply", json!({"body": "Looks good."})).await;
        h.call("gmail_send_draft", json!({})).await;

        let sent = h.provider.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to, vec!["\"Smith, Dana\" <dana@example.com>".to_string()]);
    }

    #[tokio::test]
    async fn test_draft_keeps_reply_context_after_new_read() {
        let mut h = Harness::new(ProviderKind::Microsoft);
        h.deliver("m-1", "Dana", "dana@example.com", "Budget", "a");
        h.deliver("m-2", "Lee", "lee@example.com", "Lunch", "b");
        h.call("outlook_read_email", json!({"message_id": "m-1"})).await;
        h.call("outlook_draft_reply", json!({"body": "Thanks"})).await;
        h.call("outlook_read_email", json!({"message_id": "m-2"})).await;

        assert_eq!(h.state.drafts.status(), DraftStatus::Pending);
        h.call("outlook_send_draft", json!({})).await;
        assert_eq!(h.provider.sent()[0].subject, "Re: Budget");
    }

    #[tokio::test]
    async fn test_only_latest_draft_is_kept() {
        let mut h = Harness::new(ProviderKind::Google);
        h.call(
            "gmail_draft_new_email",
            json!({"to": "a@example.com", "subject": "One", "body": "1"}),
        )
        .await;
        let result = h
            .call(
                "gmail_draft_new_email",
                json!({"to": "b@example.com, B@example.com", "subject": "Two", "body": "2"}),
            )
            .await;
        assert_eq!(result, "Draft created. Ask user to confirm.");
        let draft = h.state.drafts.require().unwrap();
        assert_eq!(draft.subject, "Two");
        assert_eq!(draft.to, vec!["b@example.com".to_string()]);
    }

    #[tokio::test]
    async fn test_send_without_draft() {
        let mut h = Harness::new(ProviderKind::Google);
        let result = h.call("gmail_send_draft", json!({})).await;
        assert_eq!(result, "Error: There is no pending draft.");
        assert!(h.provider.sent().is_empty());
    }

    #[tokio::test]
    async fn test_cancel_draft() {
        let mut h = Harness::new(ProviderKind::Google);
        assert!(matches!(
            h.executor.cancel_draft(&mut h.state),
            Err(ChatError::NoDraft)
        ));
        h.call(
            "gmail_draft_new_email",
            json!({"to": "a@example.com", "subject": "One", "body": "1"}),
        )
        .await;
        h.executor.cancel_draft(&mut h.state).unwrap();
        assert_eq!(h.state.drafts.status(), DraftStatus::Cancelled);
        assert!(h.drain().contains(&SessionEvent::DraftClear));
    }

    // =========================================================================
    // Calendar
    // =========================================================================

    #[tokio::test]
    async fn test_create_update_delete_event() {
        let mut h = Harness::new(ProviderKind::Microsoft);
        let result = h
            .call(
                "calendar_create_event",
                json!({
                    "summary": "Sync",
                    "start_time": "2026-10-19 10:00",
                    "end_time": "2026-10-19 10:30"
                }),
            )
            .await;
        assert_eq!(result, "Event created: Sync.");
        let focused = h.state.focus.event().unwrap().clone();
        assert_eq!(h.provider.events()[0].start.as_deref(), Some("2026-10-19T10:00:00"));

        let result = h
            .call(
                "calendar_update_event_time",
                json!({"start_time": "2026-10-19T11:00:00", "end_time": "2026-10-19T11:30:00"}),
            )
            .await;
        assert_eq!(result, "Event time updated for 'Sync'.");
        assert_eq!(h.state.focus.event().unwrap().id, focused.id);

        let result = h.call("calendar_delete_event", json!({})).await;
        assert_eq!(result, "Event deleted.");
        assert!(h.state.focus.current().is_none());
        assert!(h.provider.events().is_empty());
    }

    #[tokio::test]
    async fn test_list_events_single_result_takes_focus() {
        let mut h = Harness::new(ProviderKind::Google);
        assert_eq!(
            h.call("calendar_list_events", json!({})).await,
            "No upcoming events found."
        );
        h.provider.add_event(EventSummary {
            id: "evt-9".to_string(),
            title: "Dentist".to_string(),
            ..Default::default()
        });
        let result = h.call("calendar_list_events", json!({"query": "dentist"})).await;
        assert!(result.contains("Dentist"));
        assert_eq!(h.state.focus.event().unwrap().id, "evt-9");
    }

    #[tokio::test]
    async fn test_quick_add_is_google_only() {
        let mut google = Harness::new(ProviderKind::Google);
        let result = google
            .call("calendar_quick_add", json!({"text": "Lunch with Sam tomorrow"}))
            .await;
        assert_eq!(result, "Event created: Lunch with Sam tomorrow.");

        let mut outlook = Harness::new(ProviderKind::Microsoft);
        let result = outlook
            .call("calendar_quick_add", json!({"text": "Lunch"}))
            .await;
        assert_eq!(result, "Quick add is only available for Google Calendar.");
    }

    #[tokio::test]
    async fn test_update_event_without_context() {
        let mut h = Harness::new(ProviderKind::Google);
        let result = h
            .call(
                "calendar_update_event_time",
                json!({"start_time": "2026-10-19T11:00:00", "end_time": "2026-10-19T11:30:00"}),
            )
            .await;
        assert_eq!(
            result,
            "Error: No event in context. Ask the user which event they mean."
        );
    }

    #[tokio::test]
    async fn test_unknown_tool_text() {
        let mut h = Harness::new(ProviderKind::Google);
        let result = h.call("outlook_send_draft", json!({})).await;
        assert_eq!(result, "Tool 'outlook_send_draft' is not implemented.");
        assert!(h.drain().is_empty());
    }
}
