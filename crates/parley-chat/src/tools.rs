//! The tool catalogue offered to the model.
//!
//! Mail tools carry the provider prefix (`gmail_` or `outlook_`); calendar
//! tools are prefixed `calendar_`. A requested tool name is resolved against
//! the session's provider and its JSON arguments are decoded into a
//! [`ToolCall`] before anything touches the mailbox.

use parley_core::ProviderKind;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::{ChatError, Result};
use crate::types::ToolSpec;

const CALENDAR_PREFIX: &str = "calendar";

const MAIL_OPS: &[&str] = &[
    "search_emails",
    "read_email",
    "summarize_email",
    "draft_new_email",
    "draft_reply",
    "send_draft",
    "delete_email",
    "archive_email",
    "mark_as_read",
    "mark_as_unread",
];

const CALENDAR_OPS: &[&str] = &[
    "list_events",
    "quick_add",
    "create_event",
    "update_event_time",
    "delete_event",
];

/// A decoded tool invocation.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "op", content = "args", rename_all = "snake_case")]
pub enum ToolCall {
    SearchEmails {
        #[serde(default)]
        query: String,
        #[serde(default)]
        max_results: Option<usize>,
    },
    ReadEmail {
        #[serde(default)]
        message_id: Option<String>,
    },
    SummarizeEmail {
        #[serde(default)]
        message_id: Option<String>,
    },
    DraftNewEmail {
        to: String,
        #[serde(default)]
        subject: String,
        body: String,
    },
    DraftReply {
        body: String,
    },
    SendDraft {},
    DeleteEmail {
        #[serde(default)]
        message_id: Option<String>,
    },
    ArchiveEmail {
        #[serde(default)]
        message_id: Option<String>,
    },
    MarkAsRead {
        #[serde(default)]
        message_id: Option<String>,
    },
    MarkAsUnread {
        #[serde(default)]
        message_id: Option<String>,
    },
    ListEvents {
        #[serde(default)]
        time_min: Option<String>,
        #[serde(default)]
        time_max: Option<String>,
        #[serde(default)]
        max_results: Option<usize>,
        #[serde(default)]
        query: Option<String>,
    },
    QuickAdd {
        text: String,
    },
    CreateEvent {
        summary: String,
        start_time: String,
        end_time: String,
        #[serde(default)]
        timezone: Option<String>,
        #[serde(default)]
        location: Option<String>,
        #[serde(default)]
        attendees: Vec<String>,
    },
    UpdateEventTime {
        #[serde(default)]
        event_id: Option<String>,
        start_time: String,
        end_time: String,
        #[serde(default)]
        timezone: Option<String>,
    },
    DeleteEvent {
        #[serde(default)]
        event_id: Option<String>,
    },
}

impl ToolCall {
    /// Resolve a tool name and raw JSON arguments for a session on `kind`.
    pub fn parse(kind: ProviderKind, name: &str, arguments: &str) -> Result<Self> {
        let op = resolve_op(kind, name).ok_or_else(|| ChatError::UnknownTool(name.to_string()))?;
        let args: Value = match arguments.trim() {
            "" | "null" => json!({}),
            raw => serde_json::from_str(raw).map_err(|e| ChatError::InvalidArguments {
                tool: name.to_string(),
                reason: e.to_string(),
            })?,
        };
        if !args.is_object() {
            return Err(ChatError::InvalidArguments {
                tool: name.to_string(),
                reason: "arguments must be a JSON object".to_string(),
            });
        }
        serde_json::from_value(json!({ "op": op, "args": args })).map_err(|e| {
            ChatError::InvalidArguments {
                tool: name.to_string(),
                reason: e.to_string(),
            }
        })
    }

    /// Progress line shown while the tool runs.
    pub fn status_message(&self, kind: ProviderKind) -> String {
        match self {
            ToolCall::SearchEmails { query, .. } => {
                let query = query.trim();
                if query.is_empty() {
                    format!("Searching your {} inbox...", kind.mailbox_label())
                } else {
                    format!(
                        "Searching your {} inbox for {}...",
                        kind.mailbox_label(),
                        query
                    )
                }
            }
            ToolCall::ReadEmail { .. } => "Opening that message...".to_string(),
            ToolCall::SummarizeEmail { .. } => "Summarizing that message for you...".to_string(),
            ToolCall::DraftNewEmail { .. } => "Drafting that email...".to_string(),
            ToolCall::DraftReply { .. } => "Writing your reply...".to_string(),
            ToolCall::SendDraft {} => "Sending that email...".to_string(),
            ToolCall::DeleteEmail { .. } => "Deleting that email...".to_string(),
            ToolCall::ArchiveEmail { .. } => "Archiving that email...".to_string(),
            ToolCall::MarkAsRead { .. } => "Marking that email as read...".to_string(),
            ToolCall::MarkAsUnread { .. } => "Marking that email as unread...".to_string(),
            ToolCall::ListEvents { .. } => format!(
                "Reviewing your upcoming {} schedule...",
                kind.calendar_label()
            ),
            ToolCall::QuickAdd { .. } => "Scheduling that event...".to_string(),
            ToolCall::CreateEvent { .. } => {
                format!("Putting that event on your {}...", kind.calendar_label())
            }
            ToolCall::UpdateEventTime { .. } => "Updating that event's timing...".to_string(),
            ToolCall::DeleteEvent { .. } => {
                format!("Removing that event from your {}...", kind.calendar_label())
            }
        }
    }
}

fn resolve_op(kind: ProviderKind, name: &str) -> Option<&'static str> {
    let (prefix, op) = name.split_once('_')?;
    let table = if prefix == kind.tool_prefix() {
        MAIL_OPS
    } else if prefix == CALENDAR_PREFIX {
        CALENDAR_OPS
    } else {
        return None;
    };
    table.iter().copied().find(|known| *known == op)
}

// =============================================================================
// Tool menu
// =============================================================================

fn tool(name: String, description: String, parameters: Value) -> ToolSpec {
    ToolSpec {
        name,
        description,
        parameters,
    }
}

fn no_args() -> Value {
    json!({ "type": "object", "properties": {} })
}

fn optional_id(field: &str, description: &str) -> Value {
    json!({
        "type": "object",
        "properties": {
            field: { "type": "string", "description": description }
        }
    })
}

/// The tools offered to the model for a session on `kind`.
pub fn tool_menu(kind: ProviderKind, supports_quick_add: bool) -> Vec<ToolSpec> {
    let mail = kind.tool_prefix();
    let mailbox = kind.mailbox_label();
    let calendar = kind.calendar_label();
    let message_id = "Id of the message. Defaults to the email currently being discussed.";
    let event_id = "Id of the event. Defaults to the event currently being discussed.";

    let search_required: Vec<&str> = match kind {
        ProviderKind::Google => vec!["query"],
        ProviderKind::Microsoft => Vec::new(),
    };

    let mut tools = vec![
        tool(
            format!("{mail}_search_emails"),
            format!("Searches for emails in the user's {mailbox} inbox."),
            json!({
                "type": "object",
                "properties": {
                    "query": {
                        "type": "string",
                        "description": "Search terms, e.g. a sender name or a subject keyword."
                    },
                    "max_results": { "type": "integer", "description": "Maximum results (default 5)." }
                },
                "required": search_required
            }),
        ),
        tool(
            format!("{mail}_read_email"),
            format!("Reads the full content of one email from the user's {mailbox} inbox."),
            optional_id("message_id", message_id),
        ),
        tool(
            format!("{mail}_summarize_email"),
            "Produces a short spoken summary of the email currently being discussed.".to_string(),
            optional_id("message_id", message_id),
        ),
        tool(
            format!("{mail}_draft_new_email"),
            "Drafts a brand new email. The user must confirm before it is sent.".to_string(),
            json!({
                "type": "object",
                "properties": {
                    "to": { "type": "string", "description": "Comma-separated recipient addresses." },
                    "subject": { "type": "string" },
                    "body": { "type": "string" }
                },
                "required": ["to", "subject", "body"]
            }),
        ),
        tool(
            format!("{mail}_draft_reply"),
            "Drafts a reply to the email currently being discussed.".to_string(),
            json!({
                "type": "object",
                "properties": { "body": { "type": "string" } },
                "required": ["body"]
            }),
        ),
        tool(
            format!("{mail}_send_draft"),
            "Sends the pending draft. Only call this after the user confirms.".to_string(),
            no_args(),
        ),
        tool(
            format!("{mail}_delete_email"),
            format!("Moves an email to the {mailbox} trash."),
            optional_id("message_id", message_id),
        ),
        tool(
            format!("{mail}_archive_email"),
            "Archives an email so it leaves the inbox.".to_string(),
            optional_id("message_id", message_id),
        ),
        tool(
            format!("{mail}_mark_as_read"),
            "Marks an email as read.".to_string(),
            optional_id("message_id", message_id),
        ),
        tool(
            format!("{mail}_mark_as_unread"),
            "Marks an email as unread.".to_string(),
            optional_id("message_id", message_id),
        ),
        tool(
            "calendar_list_events".to_string(),
            format!("Lists upcoming events on the user's {calendar}."),
            json!({
                "type": "object",
                "properties": {
                    "time_min": { "type": "string", "description": "RFC 3339 start of the window. Defaults to now." },
                    "time_max": { "type": "string", "description": "RFC 3339 end of the window. Defaults to a week from now." },
                    "max_results": { "type": "integer", "description": "Maximum events (default 10)." },
                    "query": { "type": "string", "description": "Text to match in event titles." }
                }
            }),
        ),
    ];

    if supports_quick_add {
        tools.push(tool(
            "calendar_quick_add".to_string(),
            format!("Creates an event on the user's {calendar} from a natural-language sentence."),
            json!({
                "type": "object",
                "properties": { "text": { "type": "string", "description": "e.g. 'Lunch with Sam tomorrow at noon'." } },
                "required": ["text"]
            }),
        ));
    }

    tools.extend([
        tool(
            "calendar_create_event".to_string(),
            format!("Creates a detailed event on the user's {calendar}."),
            json!({
                "type": "object",
                "properties": {
                    "summary": { "type": "string", "description": "Event title." },
                    "start_time": { "type": "string", "description": "RFC 3339 start time." },
                    "end_time": { "type": "string", "description": "RFC 3339 end time." },
                    "timezone": { "type": "string", "description": "IANA time zone name." },
                    "location": { "type": "string" },
                    "attendees": { "type": "array", "items": { "type": "string" } }
                },
                "required": ["summary", "start_time", "end_time"]
            }),
        ),
        tool(
            "calendar_update_event_time".to_string(),
            "Moves an existing event to a new start and end time.".to_string(),
            json!({
                "type": "object",
                "properties": {
                    "event_id": { "type": "string", "description": event_id },
                    "start_time": { "type": "string", "description": "RFC 3339 start time." },
                    "end_time": { "type": "string", "description": "RFC 3339 end time." },
                    "timezone": { "type": "string", "description": "IANA time zone name." }
                },
                "required": ["start_time", "end_time"]
            }),
        ),
        tool(
            "calendar_delete_event".to_string(),
            format!("Removes an event from the user's {calendar}."),
            optional_id("event_id", event_id),
        ),
    ]);

    tools
}
