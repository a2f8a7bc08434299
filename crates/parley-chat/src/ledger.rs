//! Per-session bookkeeping of acted-on and announced message ids.

use std::collections::HashSet;

/// Handled ids are excluded from every search; announced ids are never
/// proactively announced twice.
#[derive(Debug, Default)]
pub struct MailLedger {
    handled: HashSet<String>,
    announced: HashSet<String>,
}

impl MailLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that the user has acted on a message. Returns false if it was
    /// already handled.
    pub fn mark_handled(&mut self, id: &str) -> bool {
        self.announced.remove(id);
        self.handled.insert(id.to_string())
    }

    /// Forget a message so it can show up (and be announced) again.
    pub fn mark_unhandled(&mut self, id: &str) {
        self.handled.remove(id);
        self.announced.remove(id);
    }

    pub fn is_handled(&self, id: &str) -> bool {
        self.handled.contains(id)
    }

    pub fn announce(&mut self, id: &str) {
        self.announced.insert(id.to_string());
    }

    pub fn is_announced(&self, id: &str) -> bool {
        self.announced.contains(id)
    }

    /// Replace the announced set, e.g. with the unread ids seen at start-up.
    pub fn seed_announced(&mut self, ids: impl IntoIterator<Item = String>) {
        self.announced = ids.into_iter().collect();
    }

    pub fn handled_ids(&self) -> impl Iterator<Item = String> + '_ {
        self.handled.iter().cloned()
    }

    /// Handled and announced ids together, for notifier polls.
    pub fn seen_ids(&self) -> impl Iterator<Item = String> + '_ {
        self.handled.union(&self.announced).cloned()
    }
}
