//! Mail address identities.
//!
//! Parses RFC 5322-style address headers (`Name <user@host>`) into
//! name/email/display triples and provides the recipient sanitizer used
//! when composing drafts.

use serde::{Deserialize, Serialize};

/// A person as seen in a mail header or provider payload.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub name: String,
    pub email: String,
    /// Human-readable form, `Name <email>` when both parts are known.
    pub display: String,
}

impl Identity {
    /// Build an identity from separate name and email parts.
    pub fn from_parts(name: &str, email: &str) -> Self {
        let name = name.trim().to_string();
        let email = email.trim().to_string();
        let display = compose_display(&name, &email);
        Self {
            name,
            email,
            display,
        }
    }

    /// Parse a single address header value.
    ///
    /// Unparseable input is kept verbatim as the display string.
    pub fn parse(value: &str) -> Self {
        let raw = value.trim();
        let (name, email) = split_address(raw);
        let mut identity = Self::from_parts(&name, &email);
        if identity.display.is_empty() {
            identity.display = raw.to_string();
        }
        identity
    }

    /// Parse a comma-separated address list, skipping empty entries.
    pub fn parse_list(value: &str) -> Vec<Self> {
        split_list(value)
            .into_iter()
            .map(|part| {
                let (name, email) = split_address(&part);
                Self::from_parts(&name, &email)
            })
            .filter(|identity| !identity.is_empty())
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.name.is_empty() && self.email.is_empty() && self.display.is_empty()
    }

    /// Header-safe form for a recipient field. Names holding RFC 5322
    /// specials are quoted so a comma cannot split the address.
    pub fn mailbox(&self) -> String {
        match (self.name.is_empty(), self.email.is_empty()) {
            (false, false) => format!("{} <{}>", quote_name(&self.name), self.email),
            (true, false) => self.email.clone(),
            (false, true) => self.name.clone(),
            (true, true) => self.display.clone(),
        }
    }

    /// Best short label for speech: name, else email, else display.
    pub fn spoken_name(&self) -> &str {
        if !self.name.is_empty() {
            &self.name
        } else if !self.email.is_empty() {
            &self.email
        } else {
            &self.display
        }
    }
}

/// The owner of the connected account.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountIdentity {
    /// Lowercased primary address.
    pub email: String,
    pub display_name: String,
}

impl AccountIdentity {
    pub fn new(email: &str, display_name: &str) -> Self {
        let email = email.trim().to_lowercase();
        let display_name = if display_name.trim().is_empty() {
            email.clone()
        } else {
            display_name.trim().to_string()
        };
        Self {
            email,
            display_name,
        }
    }
}

/// Join identities into a header-style list (`A <a@x>, b@y`).
pub fn join_displays(identities: &[Identity]) -> String {
    identities
        .iter()
        .map(Identity::mailbox)
        .filter(|mailbox| !mailbox.is_empty())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Split a comma-separated recipient string.
///
/// Commas inside quoted names do not split. Trims each entry, drops empties
/// and case-insensitive duplicates, and keeps first-seen order.
pub fn split_recipients(to: &str) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    split_list(to)
        .into_iter()
        .filter(|addr| seen.insert(addr.to_lowercase()))
        .collect()
}

const SPECIALS: &[char] = &['(', ')', '<', '>', '[', ']', ':', ';', '@', '\\', ',', '.', '"'];

fn quote_name(name: &str) -> String {
    if !name.contains(SPECIALS) {
        return name.to_string();
    }
    let escaped = name.replace('\\', "\\\\").replace('"', "\\\"");
    format!("\"{}\"", escaped)
}

fn compose_display(name: &str, email: &str) -> String {
    match (name.is_empty(), email.is_empty()) {
        (false, false) => format!("{} <{}>", name, email),
        (true, false) => email.to_string(),
        _ => name.to_string(),
    }
}

/// Split `Name <email>` into its parts. A bare token containing `@` is an
/// email; anything else is a name.
fn split_address(raw: &str) -> (String, String) {
    let raw = raw.trim();
    if let Some(start) = raw.rfind('<') {
        if let Some(len) = raw[start..].find('>') {
            let email = raw[start + 1..start + len].trim();
            let name = unquote(raw[..start].trim());
            return (name, email.to_string());
        }
    }
    if raw.contains('@') && !raw.contains(char::is_whitespace) {
        (String::new(), raw.to_string())
    } else {
        (unquote(raw), String::new())
    }
}

fn unquote(value: &str) -> String {
    let value = value.trim();
    if let Some(inner) = value
        .strip_prefix('"')
        .and_then(|rest| rest.strip_suffix('"'))
    {
        return unescape(inner).trim().to_string();
    }
    value.trim_matches('"').trim_matches('\'').trim().to_string()
}

fn unescape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => out.extend(chars.next()),
            _ => out.push(c),
        }
    }
    out
}

/// Split an address list on commas that are outside quotes and angle brackets.
fn split_list(value: &str) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut in_angle = false;
    let mut chars = value.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' if in_quotes => {
                current.push(c);
                current.extend(chars.next());
            }
            '"' => {
                in_quotes = !in_quotes;
                current.push(c);
            }
            '<' if !in_quotes => {
                in_angle = true;
                current.push(c);
            }
            '>' if !in_quotes => {
                in_angle = false;
                current.push(c);
            }
            ',' if !in_quotes && !in_angle => {
                parts.push(std::mem::take(&mut current));
            }
            _ => current.push(c),
        }
    }
    parts.push(current);
    parts
        .into_iter()
        .map(|p| p.trim().to_string())
        .filter(|p| !p.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_name_and_email() {
        let id = Identity::parse("Dana Smith <dana@example.com>");
        assert_eq!(id.name, "Dana Smith");
        assert_eq!(id.email, "dana@example.com");
        assert_eq!(id.display, "Dana Smith <dana@example.com>");
    }

    #[test]
    fn test_parse_quoted_name() {
        let id = Identity::parse("\"Smith, Dana\" <dana@example.com>");
        assert_eq!(id.name, "Smith, Dana");
        assert_eq!(id.email, "dana@example.com");
    }

    #[test]
    fn test_parse_bare_email() {
        let id = Identity::parse("ops@example.com");
        assert!(id.name.is_empty());
        assert_eq!(id.email, "ops@example.com");
        assert_eq!(id.display, "ops@example.com");
    }

    #[test]
    fn test_parse_name_only() {
        let id = Identity::parse("Calendar Bot");
        assert_eq!(id.name, "Calendar Bot");
        assert!(id.email.is_empty());
        assert_eq!(id.spoken_name(), "Calendar Bot");
    }

    #[test]
    fn test_parse_empty() {
        assert!(Identity::parse("").is_empty());
    }

    #[test]
    fn test_parse_list_respects_quotes() {
        let list = Identity::parse_list("\"Smith, Dana\" <dana@example.com>, lee@example.com,  ");
        assert_eq!(list.len(), 2);
        assert_eq!(list[0].name, "Smith, Dana");
        assert_eq!(list[1].email, "lee@example.com");
    }

    #[test]
    fn test_join_displays() {
        let ids = vec![
            Identity::from_parts("Dana", "dana@example.com"),
            Identity::from_parts("", "lee@example.com"),
        ];
        assert_eq!(join_displays(&ids), "Dana <dana@example.com>, lee@example.com");
    }

    #[test]
    fn test_mailbox_quotes_specials() {
        let dana = Identity::from_parts("Smith, Dana", "dana@example.com");
        assert_eq!(dana.mailbox(), "\"Smith, Dana\" <dana@example.com>");

        let lee = Identity::from_parts("Lee \"Ops\" Park", "lee@example.com");
        assert_eq!(lee.mailbox(), "\"Lee \\\"Ops\\\" Park\" <lee@example.com>");

        let list = Identity::parse_list(&join_displays(&[dana, lee]));
        assert_eq!(list.len(), 2);
        assert_eq!(list[0].name, "Smith, Dana");
        assert_eq!(list[0].email, "dana@example.com");
        assert_eq!(list[1].name, "Lee \"Ops\" Park");

        assert_eq!(
            Identity::from_parts("Dana", "dana@example.com").mailbox(),
            "Dana <dana@example.com>"
        );
        assert_eq!(Identity::from_parts("", "ops@example.com").mailbox(), "ops@example.com");
    }

    #[test]
    fn test_split_recipients_keeps_quoted_commas() {
        let r = split_recipients("\"Smith, Dana\" <dana@example.com>, lee@example.com");
        assert_eq!(r, vec!["\"Smith, Dana\" <dana@example.com>", "lee@example.com"]);
    }

    #[test]
    fn test_split_recipients_dedup_preserves_order() {
        let r = split_recipients(" b@x.com, A@x.com ,, a@x.com, b@X.com ,c@x.com");
        assert_eq!(r, vec!["b@x.com", "A@x.com", "c@x.com"]);
    }

    #[test]
    fn test_account_identity_lowercases_email() {
        let owner = AccountIdentity::new("Me@Example.com", "");
        assert_eq!(owner.email, "me@example.com");
        assert_eq!(owner.display_name, "me@example.com");
    }
}
