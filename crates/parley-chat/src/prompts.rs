//! Prompt text sent to the model.

use chrono::{DateTime, Local};
use parley_core::ProviderKind;
use parley_provider::EmailContext;

const BASE_INSTRUCTIONS: &str = "
- You are a world-class proactive voice assistant. Your goal is to help the user manage their email and calendar through natural conversation.
- Keep your tone warm, confident, and collaborative. Sound like a thoughtful teammate instead of a scripted bot.
- Briefly acknowledge what you are doing before or after running tools so the user always knows what is happening.
- After calling a tool, summarize the results in your own words with the key takeaways and a recommended next step. Never read raw JSON or metadata aloud.
- When reading long emails, offer to summarize them or capture action items.
- Ask for clarification instead of assuming details, especially before sending, deleting, or cancelling anything.
- Confirm with the user before finalizing destructive actions and explain what will happen next.
- Keep responses focused on the user's goals and end with an invitation to continue when appropriate.
- Provide up to three follow-up suggestions encoded as JSON wrapped in <suggestions>{\"items\":[{\"label\":\"<short label>\",\"prompt\":\"<assistant-ready prompt>\"}]}</suggestions>. Suggestions must be short and relevant and must not be mentioned in the spoken reply.";

/// System prompt for a session on `kind`, anchored to `now`.
pub fn system_prompt(kind: ProviderKind, now: DateTime<Local>) -> String {
    let persona = match kind {
        ProviderKind::Google => {
            "You are a warm, conversational Google assistant who manages Gmail and Google Calendar like a proactive chief of staff."
        }
        ProviderKind::Microsoft => {
            "You are a warm, conversational Microsoft Outlook assistant who manages Mail and Microsoft Calendar like a proactive chief of staff."
        }
    };
    format!(
        "{}\n- CRITICAL CONTEXT: The current date and time is {}. Use this to resolve relative time references like 'today' and 'tomorrow'.{}",
        persona,
        now.format("%A, %B %d, %Y, %I:%M %p"),
        BASE_INSTRUCTIONS
    )
}

/// Instruction turn that asks the model for the opening greeting.
pub fn greeting_instruction(status: &str) -> String {
    format!(
        "Here is the user's current status: {}. Formulate a friendly and proactive welcome message based on this information, then ask them what they'd like to do. Be conversational.",
        status.trim().trim_end_matches('.')
    )
}

/// Single-shot prompt for a spoken email summary.
pub fn summary_prompt(email: &EmailContext, body: &str) -> String {
    let to_line = if email.to.is_empty() {
        "(you)".to_string()
    } else {
        parley_core::identity::join_displays(&email.to)
    };
    let cc_line = parley_core::identity::join_displays(&email.cc);
    format!(
        "You are preparing a spoken summary of an email for the account owner.\n\
         Deliver a warm, professional synopsis that:\n\
         - Opens with the sender's name and subject.\n\
         - Highlights the main points and any explicit requests or deadlines.\n\
         - Calls out the sender's email address if a reply may be needed.\n\
         - Ends with a suggested next step or reply idea when appropriate.\n\
         Keep it under 170 words.\n\n\
         Metadata:\nSubject: {}\nFrom: {} <{}>\nTo: {}\nCc: {}\nReceived: {}\n\n\
         Email Body:\n```\n{}\n```",
        email.subject,
        email.from.name,
        email.from.email,
        to_line,
        cc_line,
        email.received,
        body
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use parley_core::Identity;

    #[test]
    fn test_system_prompt_per_provider() {
        let now = Local.with_ymd_and_hms(2026, 10, 18, 9, 30, 0).unwrap();
        let google = system_prompt(ProviderKind::Google, now);
        assert!(google.starts_with("You are a warm, conversational Google assistant"));
        assert!(google.contains("Sunday, October 18, 2026, 09:30 AM"));
        assert!(google.contains("<suggestions>"));

        let outlook = system_prompt(ProviderKind::Microsoft, now);
        assert!(outlook.contains("Microsoft Outlook assistant"));
    }

    #[test]
    fn test_greeting_instruction() {
        let text = greeting_instruction("You have no new emails since yesterday.");
        assert!(text.starts_with(
            "Here is the user's current status: You have no new emails since yesterday. Formulate"
        ));
    }

    #[test]
    fn test_summary_prompt_metadata() {
        let email = EmailContext {
            id: "m-1".to_string(),
            subject: "Budget".to_string(),
            from: Identity::from_parts("Dana", "dana@example.com"),
            cc: vec![Identity::from_parts("Lee", "lee@example.com")],
            received: "Fri, 16 Oct 2026".to_string(),
            ..Default::default()
        };
        let prompt = summary_prompt(&email, "Numbers attached.");
        assert!(prompt.contains("Keep it under 170 words."));
        assert!(prompt.contains("From: Dana <dana@example.com>"));
        assert!(prompt.contains("To: (you)"));
        assert!(prompt.contains("Cc: Lee <lee@example.com>"));
        assert!(prompt.ends_with("```\nNumbers attached.\n```"));
    }
}
