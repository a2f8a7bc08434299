//! The single item the conversation is about.

use parley_provider::{EmailContext, EventContext, FocusContext};

use crate::error::{ChatError, Result};

/// Tracks the current email or event. Setting one kind replaces the other.
#[derive(Debug, Default)]
pub struct FocusTracker {
    current: Option<FocusContext>,
}

impl FocusTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> Option<&FocusContext> {
        self.current.as_ref()
    }

    pub fn email(&self) -> Option<&EmailContext> {
        self.current.as_ref().and_then(FocusContext::as_email)
    }

    pub fn event(&self) -> Option<&EventContext> {
        self.current.as_ref().and_then(FocusContext::as_event)
    }

    pub fn focus_email(&mut self, email: EmailContext) {
        self.current = Some(FocusContext::Email(email));
    }

    pub fn focus_event(&mut self, event: EventContext) {
        self.current = Some(FocusContext::Event(event));
    }

    pub fn clear(&mut self) {
        self.current = None;
    }

    /// Clear only if the current item is an email.
    pub fn clear_email(&mut self) {
        if self.email().is_some() {
            self.current = None;
        }
    }

    /// Clear when the current item has `id`. Returns whether it did.
    pub fn clear_if(&mut self, id: &str) -> bool {
        match &self.current {
            Some(current) if current.id() == id => {
                self.current = None;
                true
            }
            _ => false,
        }
    }

    /// Explicit email id, else the focused email's id.
    pub fn email_target(&self, explicit: Option<&str>) -> Result<String> {
        explicit
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(str::to_string)
            .or_else(|| self.email().map(|e| e.id.clone()))
            .ok_or(ChatError::NoContext("email"))
    }

    /// Explicit event id, else the focused event's id.
    pub fn event_target(&self, explicit: Option<&str>) -> Result<String> {
        explicit
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(str::to_string)
            .or_else(|| self.event().map(|e| e.id.clone()))
            .ok_or(ChatError::NoContext("event"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn email(id: &str) -> EmailContext {
        EmailContext {
            id: id.to_string(),
            subject: "Lunch".to_string(),
            ..Default::default()
        }
    }

    fn event(id: &str) -> EventContext {
        EventContext {
            id: id.to_string(),
            organizer: "lee@example.com".to_string(),
            title: "Standup".to_string(),
        }
    }

    #[test]
    fn test_setting_one_kind_clears_the_other() {
        let mut focus = FocusTracker::new();
        focus.focus_email(email("m-1"));
        assert!(focus.email().is_some());
        focus.focus_event(event("evt-1"));
        assert!(focus.email().is_none());
        assert_eq!(focus.event().unwrap().id, "evt-1");
    }

    #[test]
    fn test_clear_if_matches_only_same_id() {
        let mut focus = FocusTracker::new();
        focus.focus_email(email("m-1"));
        assert!(!focus.clear_if("m-2"));
        assert!(focus.current().is_some());
        assert!(focus.clear_if("m-1"));
        assert!(focus.current().is_none());
    }

    #[test]
    fn test_clear_email_keeps_event() {
        let mut focus = FocusTracker::new();
        focus.focus_event(event("evt-1"));
        focus.clear_email();
        assert!(focus.event().is_some());
    }

    #[test]
    fn test_targets_prefer_explicit_id() {
        let mut focus = FocusTracker::new();
        focus.focus_email(email("m-1"));
        assert_eq!(focus.email_target(Some("m-9")).unwrap(), "m-9");
        assert_eq!(focus.email_target(Some("  ")).unwrap(), "m-1");
        assert_eq!(focus.email_target(None).unwrap(), "m-1");
        assert!(matches!(
            focus.event_target(None),
            Err(ChatError::NoContext("event"))
        ));
    }

    #[test]
    fn test_no_focus_is_no_context() {
        let focus = FocusTracker::new();
        assert!(matches!(
            focus.email_target(None),
            Err(ChatError::NoContext("email"))
        ));
    }
}
