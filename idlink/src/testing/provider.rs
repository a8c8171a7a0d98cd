//! Scripted identity provider

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;

use crate::oauth2::types::{ExternalIdentity, OAuthError, TokenLifetimes, TokenSet};
use crate::oauth2::IdentityProvider;

/// Provider answering from fixed data, without network calls
///
/// Each exchange issues `"<name>-access-<n>"` (and `"<name>-refresh-<n>"`
/// unless disabled), `n` counting from 1. Failures can be switched on per
/// call kind.
#[derive(Debug)]
pub struct StubProvider {
    name: &'static str,
    identity: Mutex<ExternalIdentity>,
    issue_refresh_token: AtomicBool,
    fail_exchange: AtomicBool,
    fail_identity: AtomicBool,
    exchanges: AtomicUsize,
    identity_fetches: AtomicUsize,
}

impl StubProvider {
    /// Provider registered as `name` that reports `identity`
    #[must_use]
    pub fn new(name: &'static str, identity: ExternalIdentity) -> Self {
        Self {
            name,
            identity: Mutex::new(identity),
            issue_refresh_token: AtomicBool::new(true),
            fail_exchange: AtomicBool::new(false),
            fail_identity: AtomicBool::new(false),
            exchanges: AtomicUsize::new(0),
            identity_fetches: AtomicUsize::new(0),
        }
    }

    /// Identity with a verified email, for tests that only need one
    #[must_use]
    pub fn identity(subject: &str, email: &str) -> ExternalIdentity {
        ExternalIdentity {
            subject: subject.to_string(),
            display_name: email.split('@').next().unwrap_or(email).to_string(),
            email: email.to_string(),
            email_verified: true,
            avatar_url: None,
            locale: None,
        }
    }

    /// Report a different identity from now on
    pub fn set_identity(&self, identity: ExternalIdentity) {
        *self.identity.lock() = identity;
    }

    /// Whether exchanges include a refresh token
    pub fn set_issue_refresh_token(&self, issue: bool) {
        self.issue_refresh_token.store(issue, Ordering::SeqCst);
    }

    /// Make every token exchange fail
    pub fn set_fail_exchange(&self, fail: bool) {
        self.fail_exchange.store(fail, Ordering::SeqCst);
    }

    /// Make every identity fetch fail
    pub fn set_fail_identity(&self, fail: bool) {
        self.fail_identity.store(fail, Ordering::SeqCst);
    }

    /// Token exchanges attempted so far
    #[must_use]
    pub fn exchange_count(&self) -> usize {
        self.exchanges.load(Ordering::SeqCst)
    }

    /// Identity fetches attempted so far
    #[must_use]
    pub fn identity_fetch_count(&self) -> usize {
        self.identity_fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl IdentityProvider for StubProvider {
    fn identify(&self) -> &'static str {
        self.name
    }

    async fn exchange_token(
        &self,
        authorization_code: &str,
        _code_verifier: &str,
        _redirect_uri: &str,
    ) -> Result<TokenSet, OAuthError> {
        let n = self.exchanges.fetch_add(1, Ordering::SeqCst) + 1;
        if self.fail_exchange.load(Ordering::SeqCst) {
            return Err(OAuthError::TokenExchangeFailed(format!(
                "HTTP 400: code {authorization_code} rejected"
            )));
        }

        let refresh_token = self
            .issue_refresh_token
            .load(Ordering::SeqCst)
            .then(|| format!("{}-refresh-{n}", self.name));

        Ok(TokenSet::anchored(
            Utc::now(),
            format!("{}-access-{n}", self.name),
            refresh_token,
            None,
            None,
            TokenLifetimes::default(),
        ))
    }

    async fn fetch_identity(&self, _access_token: &str) -> Result<ExternalIdentity, OAuthError> {
        self.identity_fetches.fetch_add(1, Ordering::SeqCst);
        if self.fail_identity.load(Ordering::SeqCst) {
            return Err(OAuthError::UserInfoFailed("HTTP 503".to_string()));
        }
        Ok(self.identity.lock().clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_tokens_are_numbered() {
        let stub = StubProvider::new("google", StubProvider::identity("g-1", "ada@example.com"));

        let first = stub.exchange_token("c", "v", "https://cb").await.unwrap();
        stub.set_issue_refresh_token(false);
        let second = stub.exchange_token("c", "v", "https://cb").await.unwrap();

        assert_eq!(first.access_token, "google-access-1");
        assert_eq!(first.refresh_token.as_deref(), Some("google-refresh-1"));
        assert_eq!(second.access_token, "google-access-2");
        assert_eq!(second.refresh_token, None);
        assert_eq!(stub.exchange_count(), 2);
    }

    #[tokio::test]
    async fn test_scripted_failures() {
        let stub = StubProvider::new("github", StubProvider::identity("1", "ada@example.com"));
        stub.set_fail_exchange(true);
        stub.set_fail_identity(true);

        assert!(matches!(
            stub.exchange_token("c", "v", "https://cb").await,
            Err(OAuthError::TokenExchangeFailed(_))
        ));
        assert!(matches!(
            stub.fetch_identity("t").await,
            Err(OAuthError::UserInfoFailed(_))
        ));
        assert_eq!(stub.identity_fetch_count(), 1);
    }
}
