//! Mailbox and calendar providers.
//!
//! Defines the [`MailboxProvider`] capability trait that the session engine
//! drives, the shared mail/calendar data types, and one implementation per
//! backend: Gmail + Google Calendar, Microsoft Graph, and an in-memory
//! mailbox used by tests.

pub mod credentials;
pub mod error;
pub mod google;
mod http;
pub mod memory;
pub mod microsoft;
pub mod provider;
pub mod time;
pub mod types;

pub use credentials::{CredentialSource, EnvToken, StaticToken};
pub use error::{ProviderError, Result};
pub use google::GoogleProvider;
pub use memory::InMemoryProvider;
pub use microsoft::GraphProvider;
pub use provider::MailboxProvider;
pub use types::*;
