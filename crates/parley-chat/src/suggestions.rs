//! Inline quick-reply blocks.
//!
//! The model may append
//! `<suggestions>{"items":[{"label":"..","prompt":".."}]}</suggestions>` to a
//! reply. Blocks are stripped from the displayed text; well-formed items are
//! surfaced as suggestions and malformed blocks are dropped silently.

use std::sync::OnceLock;

use regex::Regex;
use serde::Deserialize;

use crate::types::Suggestion;

/// Maximum number of suggestions surfaced per message.
pub const MAX_SUGGESTIONS: usize = 3;

fn block_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?s)<suggestions>(.*?)</suggestions>").expect("suggestion pattern is valid")
    })
}

#[derive(Deserialize)]
struct Block {
    #[serde(default)]
    items: Vec<Item>,
}

#[derive(Deserialize)]
struct Item {
    #[serde(default, alias = "title")]
    label: Option<String>,
    #[serde(default, alias = "text")]
    prompt: Option<String>,
}

/// Split a reply into display text and suggestions.
pub fn extract_suggestions(message: &str) -> (String, Vec<Suggestion>) {
    let mut suggestions = Vec::new();
    for caps in block_regex().captures_iter(message) {
        let Ok(block) = serde_json::from_str::<Block>(&caps[1]) else {
            continue;
        };
        for item in block.items {
            let label = item.label.unwrap_or_default().trim().to_string();
            let prompt = match item.prompt.map(|p| p.trim().to_string()) {
                Some(p) if !p.is_empty() => p,
                _ => label.clone(),
            };
            if !label.is_empty() && !prompt.is_empty() {
                suggestions.push(Suggestion { label, prompt });
            }
        }
    }
    suggestions.truncate(MAX_SUGGESTIONS);
    let cleaned = block_regex().replace_all(message, "").trim().to_string();
    (cleaned, suggestions)
}

/// Render suggestions as an inline block.
pub fn render_block(items: &[Suggestion]) -> String {
    let body = serde_json::json!({ "items": items });
    format!("<suggestions>{}</suggestions>", body)
}
