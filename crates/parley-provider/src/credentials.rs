//! Access-token sources.
//!
//! OAuth acquisition and refresh happen outside Parley; providers only ask
//! for a currently valid bearer token before each request.

use async_trait::async_trait;

use crate::error::{ProviderError, Result};

/// Yields a valid bearer token on demand.
#[async_trait]
pub trait CredentialSource: Send + Sync {
    async fn access_token(&self) -> Result<String>;

    /// Whether a token is available right now without side effects.
    fn is_available(&self) -> bool;
}

/// A fixed token, mostly for tests and short-lived sessions.
#[derive(Debug, Clone)]
pub struct StaticToken(String);

impl StaticToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }
}

#[async_trait]
impl CredentialSource for StaticToken {
    async fn access_token(&self) -> Result<String> {
        if self.0.is_empty() {
            return Err(ProviderError::Credentials("empty token".to_string()));
        }
        Ok(self.0.clone())
    }

    fn is_available(&self) -> bool {
        !self.0.is_empty()
    }
}

/// Reads the token from an environment variable on every call, so an
/// external refresher can rotate it underneath a running session.
#[derive(Debug, Clone)]
pub struct EnvToken {
    var: String,
}

impl EnvToken {
    pub fn new(var: impl Into<String>) -> Self {
        Self { var: var.into() }
    }

    pub fn var(&self) -> &str {
        &self.var
    }

    fn read(&self) -> Option<String> {
        std::env::var(&self.var)
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }
}

#[async_trait]
impl CredentialSource for EnvToken {
    async fn access_token(&self) -> Result<String> {
        self.read()
            .ok_or_else(|| ProviderError::Credentials(format!("{} is not set", self.var)))
    }

    fn is_available(&self) -> bool {
        self.read().is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_static_token() {
        let token = StaticToken::new("abc");
        assert!(token.is_available());
        assert_eq!(token.access_token().await.unwrap(), "abc");

        let empty = StaticToken::new("");
        assert!(!empty.is_available());
        assert!(matches!(
            empty.access_token().await,
            Err(ProviderError::Credentials(_))
        ));
    }

    #[tokio::test]
    async fn test_env_token_missing() {
        let token = EnvToken::new("PARLEY_TEST_TOKEN_THAT_IS_NEVER_SET");
        assert!(!token.is_available());
        let err = token.access_token().await.unwrap_err();
        assert!(err
            .to_string()
            .contains("PARLEY_TEST_TOKEN_THAT_IS_NEVER_SET is not set"));
    }
}
