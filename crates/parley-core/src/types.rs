use std::fmt;

use serde::{Deserialize, Serialize};

pub use crate::identity::AccountIdentity;

/// Which backend the session is connected to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Google,
    Microsoft,
}

impl ProviderKind {
    /// Product name of the mailbox, as spoken to the user.
    pub fn mailbox_label(&self) -> &'static str {
        match self {
            ProviderKind::Google => "Gmail",
            ProviderKind::Microsoft => "Outlook",
        }
    }

    /// Product name of the calendar, as spoken to the user.
    pub fn calendar_label(&self) -> &'static str {
        match self {
            ProviderKind::Google => "Google Calendar",
            ProviderKind::Microsoft => "Microsoft Calendar",
        }
    }

    /// Prefix used for mail tool names in the model's tool menu.
    pub fn tool_prefix(&self) -> &'static str {
        match self {
            ProviderKind::Google => "gmail",
            ProviderKind::Microsoft => "outlook",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderKind::Google => write!(f, "google"),
            ProviderKind::Microsoft => write!(f, "microsoft"),
        }
    }
}

/// Session lifecycle flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Lifecycle {
    Active,
    Stopping,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_kind_display_and_serde() {
        assert_eq!(ProviderKind::Google.to_string(), "google");
        assert_eq!(ProviderKind::Microsoft.to_string(), "microsoft");
        let json = serde_json::to_string(&ProviderKind::Microsoft).unwrap();
        assert_eq!(json, "\"microsoft\"");
        let back: ProviderKind = serde_json::from_str("\"google\"").unwrap();
        assert_eq!(back, ProviderKind::Google);
    }

    #[test]
    fn test_provider_labels() {
        assert_eq!(ProviderKind::Google.mailbox_label(), "Gmail");
        assert_eq!(ProviderKind::Microsoft.mailbox_label(), "Outlook");
        assert_eq!(ProviderKind::Google.calendar_label(), "Google Calendar");
        assert_eq!(ProviderKind::Microsoft.tool_prefix(), "outlook");
    }
}
