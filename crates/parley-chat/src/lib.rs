//! Conversation session engine for Parley.
//!
//! Drives one voice conversation against one connected mailbox: the
//! tool-calling turn loop, focus tracking, the draft lifecycle, the recent
//! people list, and the background unread notifier.

pub mod contacts;
pub mod context;
pub mod draft;
pub mod error;
pub mod events;
pub mod executor;
pub mod ledger;
pub mod llm;
pub mod notifier;
pub mod orchestrator;
pub mod outbound;
pub mod prompts;
pub mod session;
pub mod state;
pub mod suggestions;
pub mod summary;
pub mod tools;
pub mod types;

pub use contacts::{Contact, ContactBook};
pub use context::FocusTracker;
pub use draft::{DraftManager, DraftStatus, PendingDraft};
pub use error::ChatError;
pub use events::{ClientAction, FocusView, SessionEvent};
pub use ledger::MailLedger;
pub use llm::{CompletionRequest, LanguageModel, OpenAiChatModel, ScriptedModel};
pub use notifier::UnreadNotifier;
pub use outbound::Outbound;
pub use session::{Session, SessionDeps, SessionSettings};
pub use state::SessionState;
pub use suggestions::extract_suggestions;
pub use tools::ToolCall;
pub use types::{ModelReply, Role, Suggestion, ToolCallRequest, ToolSpec, Turn};
