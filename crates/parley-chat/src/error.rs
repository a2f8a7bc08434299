//! Error types for the session engine.

use parley_provider::ProviderError;
use parley_voice::VoiceError;

/// Errors from session operations and tool execution.
///
/// Tool-level errors never reach the user directly: the turn loop renders
/// them with [`ChatError::user_message`] and hands the text to the model as
/// the tool result.
#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("no {0} in context")]
    NoContext(&'static str),
    #[error("no pending draft")]
    NoDraft,
    #[error("provider error: {0}")]
    Provider(#[from] ProviderError),
    #[error("transcription was empty")]
    TranscriptionEmpty,
    #[error("voice error: {0}")]
    Voice(#[from] VoiceError),
    #[error("language model unavailable: {0}")]
    ModelUnavailable(String),
    #[error("unknown tool: {0}")]
    UnknownTool(String),
    #[error("invalid arguments for {tool}: {reason}")]
    InvalidArguments { tool: String, reason: String },
    #[error("no credentials: {0}")]
    NoCredentials(String),
}

impl ChatError {
    /// Natural-language rendering used as a tool result.
    pub fn user_message(&self) -> String {
        match self {
            ChatError::NoContext(kind) => format!(
                "Error: No {kind} in context. Ask the user which {kind} they mean."
            ),
            ChatError::NoDraft => "Error: There is no pending draft.".to_string(),
            ChatError::Provider(ProviderError::Unsupported(message)) => message.clone(),
            ChatError::Provider(ProviderError::NotFound(what)) => {
                format!("Error: Could not find {what}.")
            }
            ChatError::Provider(err) => format!("Error executing tool: {err}"),
            ChatError::TranscriptionEmpty => "Sorry, I didn't catch that.".to_string(),
            ChatError::Voice(err) => format!("Error: {err}"),
            ChatError::ModelUnavailable(_) => {
                "Error: The language model is unavailable right now.".to_string()
            }
            ChatError::UnknownTool(name) => format!("Tool '{name}' is not implemented."),
            ChatError::InvalidArguments { tool, reason } => {
                format!("Error: Invalid arguments for {tool}: {reason}")
            }
            ChatError::NoCredentials(_) => {
                "Error: The account is no longer connected.".to_string()
            }
        }
    }
}

pub type Result<T> = std::result::Result<T, ChatError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chat_error_display() {
        assert_eq!(ChatError::NoContext("email").to_string(), "no email in context");
        assert_eq!(ChatError::NoDraft.to_string(), "no pending draft");
        assert_eq!(
            ChatError::UnknownTool("fax_send".to_string()).to_string(),
            "unknown tool: fax_send"
        );
        let err = ChatError::InvalidArguments {
            tool: "gmail_draft_reply".to_string(),
            reason: "missing field `body`".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "invalid arguments for gmail_draft_reply: missing field `body`"
        );
    }

    #[test]
    fn test_user_messages() {
        assert_eq!(
            ChatError::NoContext("email").user_message(),
            "Error: No email in context. Ask the user which email they mean."
        );
        assert_eq!(
            ChatError::UnknownTool("fax_send".to_string()).user_message(),
            "Tool 'fax_send' is not implemented."
        );
        let unsupported = ChatError::Provider(ProviderError::Unsupported(
            "Quick add is only available for Google Calendar.".to_string(),
        ));
        assert_eq!(
            unsupported.user_message(),
            "Quick add is only available for Google Calendar."
        );
        let http = ChatError::Provider(ProviderError::Http {
            service: "Graph",
            status: 500,
            body: "boom".to_string(),
        });
        assert_eq!(
            http.user_message(),
            "Error executing tool: Graph error 500: boom"
        );
    }

    #[test]
    fn test_provider_error_conversion() {
        let err: ChatError = ProviderError::Transport("reset".to_string()).into();
        assert!(matches!(err, ChatError::Provider(_)));
    }
}
