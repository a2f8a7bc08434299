//! Mutable per-session state.
//!
//! Everything here is guarded by the session's lock; the foreground turn
//! and the unread notifier never touch it concurrently.

use parley_core::{AccountIdentity, Lifecycle, ProviderKind};
use parley_provider::{MailboxProvider, ProviderError};
use tracing::{debug, warn};

use crate::contacts::ContactBook;
use crate::context::FocusTracker;
use crate::draft::DraftManager;
use crate::ledger::MailLedger;
use crate::types::Turn;

#[derive(Debug)]
pub struct SessionState {
    pub kind: ProviderKind,
    /// Append-only conversation history.
    pub history: Vec<Turn>,
    pub owner: Option<AccountIdentity>,
    pub focus: FocusTracker,
    pub drafts: DraftManager,
    pub contacts: ContactBook,
    pub ledger: MailLedger,
    pub lifecycle: Lifecycle,
}

impl SessionState {
    pub fn new(kind: ProviderKind, system_prompt: String, contact_capacity: usize) -> Self {
        Self {
            kind,
            history: vec![Turn::system(system_prompt)],
            owner: None,
            focus: FocusTracker::new(),
            drafts: DraftManager::new(),
            contacts: ContactBook::new(contact_capacity),
            ledger: MailLedger::new(),
            lifecycle: Lifecycle::Active,
        }
    }

    pub fn is_active(&self) -> bool {
        self.lifecycle == Lifecycle::Active
    }

    pub fn set_owner(&mut self, owner: AccountIdentity) {
        self.contacts.set_owner(Some(owner.clone()));
        self.owner = Some(owner);
    }

    /// Resolve the account owner if an earlier lookup failed. Credential
    /// errors are returned so startup can refuse the session; anything else
    /// is logged and retried on the next call.
    pub async fn ensure_owner(
        &mut self,
        provider: &dyn MailboxProvider,
    ) -> Result<(), ProviderError> {
        if self.owner.is_some() {
            return Ok(());
        }
        match provider.account_identity().await {
            Ok(owner) => {
                debug!("Resolved account owner {}", owner.email);
                self.set_owner(owner);
                Ok(())
            }
            Err(e @ ProviderError::Credentials(_)) => Err(e),
            Err(e) => {
                warn!("Could not resolve account owner: {}", e);
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Role;
    use parley_provider::InMemoryProvider;

    #[test]
    fn test_new_state_starts_with_system_turn() {
        let state = SessionState::new(ProviderKind::Google, "be kind".to_string(), 15);
        assert_eq!(state.history.len(), 1);
        assert_eq!(state.history[0].role, Role::System);
        assert!(state.is_active());
        assert!(state.owner.is_none());
    }

    #[test]
    fn test_set_owner_excludes_owner_from_contacts() {
        let mut state = SessionState::new(ProviderKind::Microsoft, String::new(), 15);
        state.set_owner(AccountIdentity::new("me@example.com", "Me"));
        assert_eq!(state.owner.as_ref().unwrap().email, "me@example.com");
    }

    #[tokio::test]
    async fn test_ensure_owner_retries_after_failure() {
        let provider =
            InMemoryProvider::new(ProviderKind::Google, AccountIdentity::new("me@example.com", "Me"));
        provider.fail_identity(1);
        let mut state = SessionState::new(ProviderKind::Google, String::new(), 15);

        state.ensure_owner(&provider).await.unwrap();
        assert!(state.owner.is_none());

        state.ensure_owner(&provider).await.unwrap();
        assert_eq!(state.owner.as_ref().unwrap().email, "me@example.com");
    }
}
