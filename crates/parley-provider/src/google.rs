//! Gmail and Google Calendar over their REST APIs.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use base64::engine::general_purpose::{STANDARD, URL_SAFE, URL_SAFE_NO_PAD};
use base64::Engine;
use chrono::{DateTime, Utc};
use parley_core::config::GoogleConfig;
use parley_core::{AccountIdentity, Identity, ProviderKind};
use reqwest::{Client, Method, RequestBuilder};
use serde_json::{json, Value};
use tracing::debug;

use crate::credentials::CredentialSource;
use crate::error::{ProviderError, Result};
use crate::http::{send_json, str_field};
use crate::provider::MailboxProvider;
use crate::time::{ensure_zoned, normalize_rfc3339};
use crate::types::{
    truncate_chars, DraftHandle, EmailContext, EventQuery, EventReschedule, EventSummary,
    MessageSummary, NewEvent, OutgoingMessage, SearchQuery, ThreadingHeaders,
};

const SERVICE: &str = "Google";

/// Gmail + Google Calendar provider.
pub struct GoogleProvider {
    client: Client,
    gmail_base: String,
    calendar_base: String,
    credentials: Arc<dyn CredentialSource>,
}

impl GoogleProvider {
    pub fn new(config: &GoogleConfig, credentials: Arc<dyn CredentialSource>) -> Self {
        Self {
            client: Client::new(),
            gmail_base: config.gmail_base_url.trim_end_matches('/').to_string(),
            calendar_base: config.calendar_base_url.trim_end_matches('/').to_string(),
            credentials,
        }
    }

    async fn request(&self, method: Method, url: String) -> Result<RequestBuilder> {
        let token = self.credentials.access_token().await?;
        Ok(self.client.request(method, url).bearer_auth(token))
    }

    fn gmail(&self, path: &str) -> String {
        format!("{}/users/me/{}", self.gmail_base, path)
    }

    fn calendar(&self, path: &str) -> String {
        format!("{}/calendars/primary/{}", self.calendar_base, path)
    }

    async fn get_message(&self, id: &str) -> Result<Value> {
        let request = self
            .request(Method::GET, self.gmail(&format!("messages/{}", id)))
            .await?
            .query(&[("format", "full")]);
        send_json(SERVICE, request).await
    }

    async fn modify_labels(&self, id: &str, add: &[&str], remove: &[&str]) -> Result<()> {
        let request = self
            .request(Method::POST, self.gmail(&format!("messages/{}/modify", id)))
            .await?
            .json(&json!({ "addLabelIds": add, "removeLabelIds": remove }));
        send_json(SERVICE, request).await?;
        Ok(())
    }

    async fn list_ids(&self, q: &str, max_results: usize) -> Result<Vec<String>> {
        let request = self
            .request(Method::GET, self.gmail("messages"))
            .await?
            .query(&[
                ("q", q.to_string()),
                ("maxResults", max_results.to_string()),
                ("includeSpamTrash", "false".to_string()),
            ]);
        let listing = send_json(SERVICE, request).await?;
        Ok(listing
            .get("messages")
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .map(|m| str_field(m, "id").to_string())
                    .filter(|id| !id.is_empty())
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn summaries(
        &self,
        ids: Vec<String>,
        exclude: impl Fn(&str) -> bool,
        limit: usize,
    ) -> Result<Vec<MessageSummary>> {
        let mut out = Vec::new();
        for id in ids {
            if exclude(&id) {
                continue;
            }
            let message = self.get_message(&id).await?;
            out.push(message_summary(&message));
            if out.len() >= limit {
                break;
            }
        }
        Ok(out)
    }
}

/// Inject Gmail operators so a bare query searches unread inbox mail.
///
/// `in:inbox` is prepended unless the query names a folder (`in:`), and
/// `is:unread` is appended unless it already carries a read-state or label
/// qualifier (`is:` / `label:`).
pub fn normalize_gmail_query(query: &str) -> String {
    let mut normalized = query.trim().to_string();
    let lower = normalized.to_lowercase();
    if !lower.contains("in:") {
        normalized = format!("in:inbox {}", normalized).trim().to_string();
    }
    if !lower.contains("is:") && !lower.contains("label:") {
        normalized = format!("{} is:unread", normalized).trim().to_string();
    }
    normalized
}

fn headers_of(message: &Value) -> HashMap<String, String> {
    message
        .pointer("/payload/headers")
        .and_then(Value::as_array)
        .map(|headers| {
            headers
                .iter()
                .map(|h| {
                    (
                        str_field(h, "name").to_lowercase(),
                        str_field(h, "value").to_string(),
                    )
                })
                .collect()
        })
        .unwrap_or_default()
}

fn decode_body_data(data: &str) -> Option<String> {
    let cleaned = data.trim().trim_end_matches('=');
    URL_SAFE_NO_PAD
        .decode(cleaned)
        .ok()
        .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
}

/// First `text/plain` part, searching nested multiparts, else the top-level body.
pub(crate) fn extract_plain_body(message: &Value) -> String {
    fn walk(part: &Value) -> Option<String> {
        if str_field(part, "mimeType") == "text/plain" {
            if let Some(data) = part.pointer("/body/data").and_then(Value::as_str) {
                return decode_body_data(data);
            }
        }
        part.get("parts")
            .and_then(Value::as_array)
            .and_then(|parts| parts.iter().find_map(walk))
    }
    let Some(payload) = message.get("payload") else {
        return String::new();
    };
    if let Some(text) = payload
        .get("parts")
        .and_then(Value::as_array)
        .and_then(|parts| parts.iter().find_map(walk))
    {
        return text;
    }
    payload
        .pointer("/body/data")
        .and_then(Value::as_str)
        .and_then(decode_body_data)
        .unwrap_or_default()
}

fn message_summary(message: &Value) -> MessageSummary {
    let headers = headers_of(message);
    let header = |name: &str| headers.get(name).cloned().unwrap_or_default();
    let body = extract_plain_body(message);
    let preview = if body.is_empty() {
        str_field(message, "snippet").to_string()
    } else {
        body
    };
    let subject = header("subject");
    MessageSummary {
        id: str_field(message, "id").to_string(),
        from: Identity::parse(&header("from")),
        subject: if subject.is_empty() {
            "(No Subject)".to_string()
        } else {
            subject
        },
        received: header("date"),
        preview: truncate_chars(&preview, 200),
    }
}

pub(crate) fn message_context(message: &Value, preview_chars: usize) -> (EmailContext, String) {
    let headers = headers_of(message);
    let header = |name: &str| headers.get(name).cloned().unwrap_or_default();
    let body = extract_plain_body(message);
    let thread_id = str_field(message, "threadId");
    let context = EmailContext {
        id: str_field(message, "id").to_string(),
        thread_id: (!thread_id.is_empty()).then(|| thread_id.to_string()),
        subject: header("subject"),
        from: Identity::parse(&header("from")),
        reply_to: Identity::parse_list(&header("reply-to")),
        to: Identity::parse_list(&header("to")),
        cc: Identity::parse_list(&header("cc")),
        received: header("date"),
        body_preview: truncate_chars(&body, preview_chars),
        threading: ThreadingHeaders {
            message_id: header("message-id"),
            references: header("references"),
        },
    };
    (context, body)
}

fn encode_header_word(value: &str) -> String {
    if value.is_ascii() {
        value.to_string()
    } else {
        format!("=?UTF-8?B?{}?=", STANDARD.encode(value.as_bytes()))
    }
}

/// Render a plain-text RFC 5322 message.
pub(crate) fn compose_mime(from: &str, message: &OutgoingMessage) -> String {
    let mut lines = vec![
        format!("To: {}", message.to.join(", ")),
        format!("From: {}", from),
        format!("Subject: {}", encode_header_word(&message.subject)),
    ];
    if let Some(reply) = &message.in_reply_to {
        if !reply.threading.message_id.is_empty() {
            lines.push(format!("In-Reply-To: {}", reply.threading.message_id));
            lines.push(format!("References: {}", reply.threading.reply_references()));
        }
    }
    lines.push("MIME-Version: 1.0".to_string());
    lines.push("Content-Type: text/plain; charset=\"UTF-8\"".to_string());
    lines.push("Content-Transfer-Encoding: 8bit".to_string());
    format!("{}\r\n\r\n{}", lines.join("\r\n"), message.body)
}

fn event_summary(event: &Value) -> EventSummary {
    let time = |key: &str| {
        event
            .pointer(&format!("/{}/dateTime", key))
            .or_else(|| event.pointer(&format!("/{}/date", key)))
            .and_then(Value::as_str)
            .map(str::to_string)
    };
    let title = str_field(event, "summary");
    let organizer = event
        .get("organizer")
        .map(|o| {
            let name = str_field(o, "displayName");
            if name.is_empty() {
                str_field(o, "email").to_string()
            } else {
                name.to_string()
            }
        })
        .unwrap_or_default();
    EventSummary {
        id: str_field(event, "id").to_string(),
        title: if title.is_empty() {
            "(No title)".to_string()
        } else {
            title.to_string()
        },
        start: time("start"),
        end: time("end"),
        location: str_field(event, "location").to_string(),
        organizer,
    }
}

fn event_time(at: &str, timezone: Option<&str>) -> Value {
    let mut value = json!({ "dateTime": normalize_rfc3339(at) });
    if let Some(tz) = timezone {
        value["timeZone"] = json!(tz);
    }
    value
}

#[async_trait]
impl MailboxProvider for GoogleProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Google
    }

    async fn account_identity(&self) -> Result<AccountIdentity> {
        let request = self.request(Method::GET, self.gmail("profile")).await?;
        let profile = send_json(SERVICE, request).await?;
        let email = str_field(&profile, "emailAddress");
        Ok(AccountIdentity::new(email, email))
    }

    async fn search(&self, query: &SearchQuery) -> Result<Vec<MessageSummary>> {
        let q = normalize_gmail_query(&query.text);
        debug!(query = %q, "gmail search");
        let fetch = (query.limit + query.exclude.len()).clamp(1, 100);
        let ids = self.list_ids(&q, fetch).await?;
        self.summaries(ids, |id| query.is_excluded(id), query.limit)
            .await
    }

    async fn unread_since(
        &self,
        since: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<MessageSummary>> {
        let q = format!("in:inbox is:unread after:{}", since.format("%Y/%m/%d"));
        let ids = self.list_ids(&q, limit.max(1)).await?;
        self.summaries(ids, |_| false, limit).await
    }

    async fn fetch_message(
        &self,
        id: &str,
        preview_chars: usize,
    ) -> Result<(EmailContext, String)> {
        let message = self.get_message(id).await?;
        Ok(message_context(&message, preview_chars))
    }

    async fn create_draft(&self, message: &OutgoingMessage) -> Result<DraftHandle> {
        // Gmail drafts are composed locally and sent in one call.
        Ok(DraftHandle {
            remote_id: None,
            to: message.to.clone(),
            subject: message.subject.clone(),
        })
    }

    async fn send_draft(&self, message: &OutgoingMessage, _handle: &DraftHandle) -> Result<()> {
        let owner = self.account_identity().await?;
        let raw = URL_SAFE.encode(compose_mime(&owner.email, message).as_bytes());
        let mut body = json!({ "raw": raw });
        let threaded = message
            .in_reply_to
            .as_ref()
            .filter(|reply| !reply.threading.message_id.is_empty());
        if let Some(thread) = threaded.and_then(|reply| reply.thread_id.as_ref()) {
            body["threadId"] = json!(thread);
        }
        let request = self
            .request(Method::POST, self.gmail("messages/send"))
            .await?
            .json(&body);
        send_json(SERVICE, request).await?;
        Ok(())
    }

    async fn delete_message(&self, id: &str) -> Result<()> {
        let request = self
            .request(Method::POST, self.gmail(&format!("messages/{}/trash", id)))
            .await?;
        send_json(SERVICE, request).await?;
        Ok(())
    }

    async fn archive_message(&self, id: &str) -> Result<()> {
        self.modify_labels(id, &[], &["INBOX"]).await
    }

    async fn set_read(&self, id: &str, read: bool) -> Result<()> {
        if read {
            self.modify_labels(id, &[], &["UNREAD"]).await
        } else {
            self.modify_labels(id, &["UNREAD"], &[]).await
        }
    }

    async fn list_events(&self, query: &EventQuery) -> Result<Vec<EventSummary>> {
        let mut params = vec![
            ("timeMin", ensure_zoned(&query.time_min)),
            ("timeMax", ensure_zoned(&query.time_max)),
            ("maxResults", query.max_results.to_string()),
            ("singleEvents", "true".to_string()),
            ("orderBy", "startTime".to_string()),
        ];
        if let Some(text) = query.text.as_deref().filter(|t| !t.is_empty()) {
            params.push(("q", text.to_string()));
        }
        let request = self
            .request(Method::GET, self.calendar("events"))
            .await?
            .query(&params);
        let listing = send_json(SERVICE, request).await?;
        Ok(listing
            .get("items")
            .and_then(Value::as_array)
            .map(|items| items.iter().map(event_summary).collect())
            .unwrap_or_default())
    }

    async fn create_event(&self, event: &NewEvent) -> Result<EventSummary> {
        let tz = event.timezone.as_deref();
        let mut body = json!({
            "summary": event.title,
            "start": event_time(&event.start, tz),
            "end": event_time(&event.end, tz),
        });
        if let Some(location) = &event.location {
            body["location"] = json!(location);
        }
        if !event.attendees.is_empty() {
            body["attendees"] = Value::Array(
                event
                    .attendees
                    .iter()
                    .map(|email| json!({ "email": email }))
                    .collect(),
            );
        }
        let request = self
            .request(Method::POST, self.calendar("events"))
            .await?
            .query(&[("sendUpdates", "all")])
            .json(&body);
        Ok(event_summary(&send_json(SERVICE, request).await?))
    }

    async fn update_event_time(
        &self,
        id: &str,
        change: &EventReschedule,
    ) -> Result<EventSummary> {
        let url = self.calendar(&format!("events/{}", id));
        let mut event = send_json(SERVICE, self.request(Method::GET, url.clone()).await?).await?;
        if event.is_null() {
            return Err(ProviderError::NotFound(format!("event {}", id)));
        }
        let tz = change.timezone.as_deref();
        event["start"] = event_time(&change.start, tz);
        event["end"] = event_time(&change.end, tz);
        let request = self
            .request(Method::PUT, url)
            .await?
            .query(&[("sendUpdates", "all")])
            .json(&event);
        Ok(event_summary(&send_json(SERVICE, request).await?))
    }

    async fn delete_event(&self, id: &str) -> Result<()> {
        let request = self
            .request(Method::DELETE, self.calendar(&format!("events/{}", id)))
            .await?
            .query(&[("sendUpdates", "all")]);
        send_json(SERVICE, request).await?;
        Ok(())
    }

    async fn quick_add_event(&self, text: &str) -> Result<EventSummary> {
        let request = self
            .request(Method::POST, self.calendar("events/quickAdd"))
            .await?
            .query(&[("text", text)]);
        Ok(event_summary(&send_json(SERVICE, request).await?))
    }

    fn supports_quick_add(&self) -> bool {
        true
    }
}
