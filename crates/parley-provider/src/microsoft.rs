//! Outlook mail and calendar over Microsoft Graph.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parley_core::config::MicrosoftConfig;
use parley_core::{AccountIdentity, Identity, ProviderKind};
use reqwest::{Client, Method, RequestBuilder};
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::credentials::CredentialSource;
use crate::error::{ProviderError, Result};
use crate::http::{send_json, str_field};
use crate::provider::MailboxProvider;
use crate::time::{normalize_rfc3339, utc_rfc3339};
use crate::types::{
    truncate_chars, DraftHandle, EmailContext, EventQuery, EventReschedule, EventSummary,
    MessageSummary, NewEvent, OutgoingMessage, SearchQuery, ThreadingHeaders,
};

const SERVICE: &str = "Graph";
const INBOX: &str = "me/mailFolders/inbox/messages";
const SUMMARY_FIELDS: &str = "id,subject,from,receivedDateTime,bodyPreview,isRead";
const DETAIL_FIELDS: &str = "id,conversationId,subject,from,bodyPreview,body,toRecipients,\
ccRecipients,replyTo,sentDateTime,receivedDateTime,internetMessageId";

/// Microsoft Graph provider.
pub struct GraphProvider {
    client: Client,
    base: String,
    credentials: Arc<dyn CredentialSource>,
}

impl GraphProvider {
    pub fn new(config: &MicrosoftConfig, credentials: Arc<dyn CredentialSource>) -> Self {
        Self {
            client: Client::new(),
            base: config.graph_base_url.trim_end_matches('/').to_string(),
            credentials,
        }
    }

    async fn request(&self, method: Method, path: &str) -> Result<RequestBuilder> {
        let token = self.credentials.access_token().await?;
        Ok(self
            .client
            .request(method, format!("{}/{}", self.base, path))
            .bearer_auth(token)
            .header("ConsistencyLevel", "eventual"))
    }

    async fn list_messages(&self, params: &[(&str, String)]) -> Result<Vec<Value>> {
        let request = self.request(Method::GET, INBOX).await?.query(params);
        let listing = send_json(SERVICE, request).await?;
        Ok(values(&listing))
    }

    async fn create_reply_draft(&self, reply: &EmailContext, body: &str) -> Result<DraftHandle> {
        let request = self
            .request(Method::POST, &format!("me/messages/{}/createReply", reply.id))
            .await?
            .json(&json!({ "comment": body }));
        let mut draft = send_json(SERVICE, request).await?;
        if str_field(&draft, "id").is_empty() {
            // Some tenants answer createReply with an empty body; find the
            // freshest reply draft instead.
            draft = self.latest_reply_draft().await.unwrap_or(Value::Null);
        }
        let id = str_field(&draft, "id");
        if id.is_empty() {
            return Err(ProviderError::Decode(
                "Could not create a reply draft.".to_string(),
            ));
        }
        Ok(DraftHandle {
            remote_id: Some(id.to_string()),
            to: identities(draft.get("toRecipients"))
                .into_iter()
                .map(|i| i.email)
                .filter(|e| !e.is_empty())
                .collect(),
            subject: str_field(&draft, "subject").to_string(),
        })
    }

    async fn latest_reply_draft(&self) -> Result<Value> {
        let request = self.request(Method::GET, "me/messages").await?.query(&[
            ("$filter", "isDraft eq true"),
            ("$orderby", "receivedDateTime desc"),
            ("$top", "10"),
            ("$select", "id,subject,toRecipients"),
        ]);
        let listing = send_json(SERVICE, request).await.map_err(|e| {
            warn!("Reply-draft lookup failed: {}", e);
            e
        })?;
        Ok(values(&listing)
            .into_iter()
            .find(|m| {
                let subject = str_field(m, "subject").to_lowercase();
                subject.starts_with("re:") || subject.starts_with("fw:")
            })
            .unwrap_or(Value::Null))
    }
}

fn values(listing: &Value) -> Vec<Value> {
    listing
        .get("value")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default()
}

/// Identity from a Graph `emailAddress` object.
pub(crate) fn identity(email_address: Option<&Value>) -> Identity {
    match email_address {
        Some(addr) => Identity::from_parts(str_field(addr, "name"), str_field(addr, "address")),
        None => Identity::default(),
    }
}

/// A Graph recipient from a header-style mailbox such as `"Smith, Dana" <d@x>`.
fn graph_recipient(mailbox: &str) -> Value {
    let who = Identity::parse(mailbox);
    if who.email.is_empty() {
        return json!({ "emailAddress": { "address": mailbox.trim() } });
    }
    json!({ "emailAddress": { "name": who.name, "address": who.email } })
}

/// Identities from a Graph recipient list.
pub(crate) fn identities(entries: Option<&Value>) -> Vec<Identity> {
    entries
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .map(|entry| identity(entry.get("emailAddress")))
                .filter(|i| !i.is_empty())
                .collect()
        })
        .unwrap_or_default()
}

fn message_summary(message: &Value) -> MessageSummary {
    let subject = str_field(message, "subject");
    MessageSummary {
        id: str_field(message, "id").to_string(),
        from: identity(message.pointer("/from/emailAddress")),
        subject: if subject.is_empty() {
            "(No Subject)".to_string()
        } else {
            subject.to_string()
        },
        received: str_field(message, "receivedDateTime").to_string(),
        preview: truncate_chars(str_field(message, "bodyPreview"), 200),
    }
}

pub(crate) fn message_context(message: &Value, preview_chars: usize) -> (EmailContext, String) {
    let received = match str_field(message, "receivedDateTime") {
        "" => str_field(message, "sentDateTime"),
        value => value,
    };
    let body = match message.pointer("/body/content").and_then(Value::as_str) {
        Some(content) if !content.is_empty() => content.to_string(),
        _ => str_field(message, "bodyPreview").to_string(),
    };
    let conversation = str_field(message, "conversationId");
    let context = EmailContext {
        id: str_field(message, "id").to_string(),
        thread_id: (!conversation.is_empty()).then(|| conversation.to_string()),
        subject: str_field(message, "subject").to_string(),
        from: identity(message.pointer("/from/emailAddress")),
        reply_to: identities(message.get("replyTo")),
        to: identities(message.get("toRecipients")),
        cc: identities(message.get("ccRecipients")),
        received: received.to_string(),
        body_preview: truncate_chars(&body, preview_chars),
        threading: ThreadingHeaders {
            message_id: str_field(message, "internetMessageId").to_string(),
            references: String::new(),
        },
    };
    (context, body)
}

fn event_summary(event: &Value) -> EventSummary {
    let title = str_field(event, "subject");
    let organizer = identity(event.pointer("/organizer/emailAddress"));
    EventSummary {
        id: str_field(event, "id").to_string(),
        title: if title.is_empty() {
            "(No title)".to_string()
        } else {
            title.to_string()
        },
        start: event
            .pointer("/start/dateTime")
            .and_then(Value::as_str)
            .map(str::to_string),
        end: event
            .pointer("/end/dateTime")
            .and_then(Value::as_str)
            .map(str::to_string),
        location: event
            .pointer("/location/displayName")
            .and_then(Value::as_str)
            .unwrap_or("")
            .to_string(),
        organizer: organizer.spoken_name().to_string(),
    }
}

fn event_time(at: &str, timezone: Option<&str>) -> Value {
    json!({
        "dateTime": normalize_rfc3339(at),
        "timeZone": timezone.unwrap_or("UTC"),
    })
}

/// OData string literal with embedded quotes doubled.
fn odata_literal(text: &str) -> String {
    text.replace('\'', "''")
}

#[async_trait]
impl MailboxProvider for GraphProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Microsoft
    }

    async fn account_identity(&self) -> Result<AccountIdentity> {
        let request = self
            .request(Method::GET, "me")
            .await?
            .query(&[("$select", "displayName,mail,userPrincipalName")]);
        let me = send_json(SERVICE, request).await?;
        let email = match str_field(&me, "mail") {
            "" => str_field(&me, "userPrincipalName"),
            mail => mail,
        };
        Ok(AccountIdentity::new(email, str_field(&me, "displayName")))
    }

    async fn search(&self, query: &SearchQuery) -> Result<Vec<MessageSummary>> {
        let text = query.text.trim();
        let messages = if text.is_empty() {
            self.list_messages(&[
                ("$orderby", "receivedDateTime desc".to_string()),
                ("$top", (query.limit + query.exclude.len()).to_string()),
                ("$select", SUMMARY_FIELDS.to_string()),
                ("$filter", "isRead eq false".to_string()),
            ])
            .await?
        } else {
            // $search cannot be combined with $filter, so over-fetch and drop
            // read messages locally.
            debug!(query = %text, "graph search");
            self.list_messages(&[
                ("$search", format!("\"{}\"", text.replace('"', ""))),
                ("$top", (query.limit * 3).to_string()),
                ("$select", SUMMARY_FIELDS.to_string()),
            ])
            .await?
        };
        Ok(messages
            .iter()
            .filter(|m| !m.get("isRead").and_then(Value::as_bool).unwrap_or(false))
            .filter(|m| !query.is_excluded(str_field(m, "id")))
            .take(query.limit)
            .map(message_summary)
            .collect())
    }

    async fn unread_since(
        &self,
        since: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<MessageSummary>> {
        let messages = self
            .list_messages(&[
                (
                    "$filter",
                    format!(
                        "isRead eq false and receivedDateTime ge {}",
                        utc_rfc3339(since)
                    ),
                ),
                ("$top", limit.to_string()),
                ("$select", SUMMARY_FIELDS.to_string()),
            ])
            .await?;
        Ok(messages.iter().map(message_summary).collect())
    }

    async fn fetch_message(
        &self,
        id: &str,
        preview_chars: usize,
    ) -> Result<(EmailContext, String)> {
        let request = self
            .request(Method::GET, &format!("me/messages/{}", id))
            .await?
            .query(&[("$select", DETAIL_FIELDS)])
            .header("Prefer", "outlook.body-content-type=\"text\"");
        let message = send_json(SERVICE, request).await?;
        Ok(message_context(&message, preview_chars))
    }

    async fn create_draft(&self, message: &OutgoingMessage) -> Result<DraftHandle> {
        if let Some(reply) = &message.in_reply_to {
            return self.create_reply_draft(reply, &message.body).await;
        }
        let payload = json!({
            "subject": message.subject,
            "body": { "contentType": "Text", "content": message.body },
            "toRecipients": message
                .to
                .iter()
                .map(|addr| graph_recipient(addr))
                .collect::<Vec<_>>(),
        });
        let request = self
            .request(Method::POST, "me/messages")
            .await?
            .json(&payload);
        let draft = send_json(SERVICE, request).await?;
        Ok(DraftHandle {
            remote_id: Some(str_field(&draft, "id").to_string()).filter(|id| !id.is_empty()),
            to: message.to.clone(),
            subject: message.subject.clone(),
        })
    }

    async fn send_draft(&self, message: &OutgoingMessage, handle: &DraftHandle) -> Result<()> {
        let remote_id = match &handle.remote_id {
            Some(id) => id.clone(),
            None => self
                .create_draft(message)
                .await?
                .remote_id
                .ok_or_else(|| ProviderError::Decode("draft has no id".to_string()))?,
        };
        let request = self
            .request(Method::POST, &format!("me/messages/{}/send", remote_id))
            .await?;
        send_json(SERVICE, request).await?;
        Ok(())
    }

    async fn delete_message(&self, id: &str) -> Result<()> {
        let request = self
            .request(Method::DELETE, &format!("me/messages/{}", id))
            .await?;
        send_json(SERVICE, request).await?;
        Ok(())
    }

    async fn archive_message(&self, id: &str) -> Result<()> {
        let request = self
            .request(Method::POST, &format!("me/messages/{}/move", id))
            .await?
            .json(&json!({ "destinationId": "archive" }));
        send_json(SERVICE, request).await?;
        Ok(())
    }

    async fn set_read(&self, id: &str, read: bool) -> Result<()> {
        let request = self
            .request(Method::PATCH, &format!("me/messages/{}", id))
            .await?
            .json(&json!({ "isRead": read }));
        send_json(SERVICE, request).await?;
        Ok(())
    }

    async fn list_events(&self, query: &EventQuery) -> Result<Vec<EventSummary>> {
        let mut params = vec![
            ("startDateTime", normalize_rfc3339(&query.time_min)),
            ("endDateTime", normalize_rfc3339(&query.time_max)),
            ("$top", query.max_results.to_string()),
            ("$orderby", "start/dateTime".to_string()),
        ];
        if let Some(text) = query.text.as_deref().filter(|t| !t.is_empty()) {
            params.push(("$filter", format!("contains(subject,'{}')", odata_literal(text))));
        }
        let request = self
            .request(Method::GET, "me/calendarView")
            .await?
            .query(&params);
        let listing = send_json(SERVICE, request).await?;
        Ok(values(&listing).iter().map(event_summary).collect())
    }

    async fn create_event(&self, event: &NewEvent) -> Result<EventSummary> {
        let tz = event.timezone.as_deref();
        let mut body = json!({
            "subject": event.title,
            "start": event_time(&event.start, tz),
            "end": event_time(&event.end, tz),
        });
        if let Some(location) = &event.location {
            body["location"] = json!({ "displayName": location });
        }
        if !event.attendees.is_empty() {
            body["attendees"] = Value::Array(
                event
                    .attendees
                    .iter()
                    .map(|email| json!({ "emailAddress": { "address": email }, "type": "required" }))
                    .collect(),
            );
        }
        let request = self.request(Method::POST, "me/events").await?.json(&body);
        Ok(event_summary(&send_json(SERVICE, request).await?))
    }

    async fn update_event_time(
        &self,
        id: &str,
        change: &EventReschedule,
    ) -> Result<EventSummary> {
        let tz = change.timezone.as_deref();
        let body = json!({
            "start": event_time(&change.start, tz),
            "end": event_time(&change.end, tz),
        });
        let request = self
            .request(Method::PATCH, &format!("me/events/{}", id))
            .await?
            .json(&body);
        Ok(event_summary(&send_json(SERVICE, request).await?))
    }

    async fn delete_event(&self, id: &str) -> Result<()> {
        let request = self
            .request(Method::DELETE, &format!("me/events/{}", id))
            .await?;
        send_json(SERVICE, request).await?;
        Ok(())
    }
}
