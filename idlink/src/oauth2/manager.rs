//! Provider registry
//!
//! Maps provider names to adapters and forwards calls to the right one.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, info};

use crate::oauth2::provider::IdentityProvider;
use crate::oauth2::providers::{GitHubProvider, GoogleProvider};
use crate::oauth2::types::{ExternalIdentity, OAuthError, ProvidersConfig, TokenLifetimes, TokenSet};

/// Registry of identity providers keyed by [`IdentityProvider::identify`]
///
/// Registration needs `&mut self`, so the registry is filled before it is
/// wrapped in an `Arc` and shared between requests.
#[derive(Default, Clone)]
pub struct ProviderManager {
    providers: HashMap<&'static str, Arc<dyn IdentityProvider>>,
}

impl ProviderManager {
    /// Create an empty registry
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build adapters for every provider present in `config`
    ///
    /// # Errors
    ///
    /// Returns [`OAuthError::Configuration`] if an adapter cannot be built
    pub fn from_config(
        config: &ProvidersConfig,
        http_client: &reqwest::Client,
        lifetimes: TokenLifetimes,
    ) -> Result<Self, OAuthError> {
        let mut manager = Self::new();

        if let Some(google) = &config.google {
            manager.register_provider(Arc::new(GoogleProvider::new(
                google,
                http_client.clone(),
                lifetimes,
            )?));
        }

        if let Some(github) = &config.github {
            manager.register_provider(Arc::new(GitHubProvider::new(
                github,
                http_client.clone(),
                lifetimes,
            )?));
        }

        info!(providers = ?manager.providers(), "identity providers registered");
        Ok(manager)
    }

    /// Register an adapter under its own name
    ///
    /// A second registration with the same name replaces the first.
    pub fn register_provider(&mut self, provider: Arc<dyn IdentityProvider>) -> &mut Self {
        let name = provider.identify();
        if self.providers.insert(name, provider).is_some() {
            debug!(provider = name, "provider registration replaced");
        }
        self
    }

    /// Registered provider names, sorted
    #[must_use]
    pub fn providers(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.providers.keys().copied().collect();
        names.sort_unstable();
        names
    }

    /// Look up an adapter by name
    ///
    /// # Errors
    ///
    /// Returns [`OAuthError::InvalidProvider`] if nothing is registered under `provider`
    pub fn provider(&self, provider: &str) -> Result<&Arc<dyn IdentityProvider>, OAuthError> {
        self.providers
            .get(provider)
            .ok_or_else(|| OAuthError::InvalidProvider(provider.to_string()))
    }

    /// Exchange an authorization code with the named provider
    ///
    /// # Errors
    ///
    /// Returns [`OAuthError::InvalidProvider`] for unknown names, otherwise
    /// whatever the adapter returns
    pub async fn exchange_token(
        &self,
        provider: &str,
        authorization_code: &str,
        code_verifier: &str,
        redirect_uri: &str,
    ) -> Result<TokenSet, OAuthError> {
        self.provider(provider)?
            .exchange_token(authorization_code, code_verifier, redirect_uri)
            .await
    }

    /// Fetch the identity behind an access token from the named provider
    ///
    /// # Errors
    ///
    /// Returns [`OAuthError::InvalidProvider`] for unknown names, otherwise
    /// whatever the adapter returns
    pub async fn fetch_identity(
        &self,
        provider: &str,
        access_token: &str,
    ) -> Result<ExternalIdentity, OAuthError> {
        self.provider(provider)?.fetch_identity(access_token).await
    }

    /// Exchange the code, then fetch the identity with the new access token
    ///
    /// # Errors
    ///
    /// Returns the first error of the two calls; the identity is never
    /// fetched if the exchange fails
    pub async fn verify_user(
        &self,
        provider: &str,
        authorization_code: &str,
        code_verifier: &str,
        redirect_uri: &str,
    ) -> Result<(TokenSet, ExternalIdentity), OAuthError> {
        let adapter = self.provider(provider)?;
        let tokens = adapter
            .exchange_token(authorization_code, code_verifier, redirect_uri)
            .await?;
        let identity = adapter.fetch_identity(&tokens.access_token).await?;
        Ok((tokens, identity))
    }
}

impl std::fmt::Debug for ProviderManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderManager")
            .field("providers", &self.providers())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oauth2::provider::MockIdentityProvider;
    use crate::oauth2::types::ProviderConfig;
    use chrono::Utc;
    use mockall::predicate::eq;

    fn tokens() -> TokenSet {
        TokenSet::anchored(
            Utc::now(),
            "access-123".to_string(),
            Some("refresh-456".to_string()),
            None,
            None,
            TokenLifetimes::default(),
        )
    }

    fn identity() -> ExternalIdentity {
        ExternalIdentity {
            subject: "sub-1".to_string(),
            display_name: "Ada".to_string(),
            email: "ada@example.com".to_string(),
            email_verified: true,
            avatar_url: None,
            locale: None,
        }
    }

    fn named(name: &'static str) -> MockIdentityProvider {
        let mut mock = MockIdentityProvider::new();
        mock.expect_identify().return_const(name);
        mock
    }

    #[tokio::test]
    async fn test_exchange_delegates_to_registered_provider() {
        let mut mock = named("google");
        mock.expect_exchange_token()
            .with(eq("code"), eq("verifier"), eq("https://app.example.com/cb"))
            .times(1)
            .returning(|_, _, _| Ok(tokens()));

        let mut manager = ProviderManager::new();
        manager.register_provider(Arc::new(mock));

        let result = manager
            .exchange_token("google", "code", "verifier", "https://app.example.com/cb")
            .await
            .unwrap();
        assert_eq!(result.access_token, "access-123");
    }

    #[tokio::test]
    async fn test_unknown_provider_is_rejected() {
        let mut manager = ProviderManager::new();
        manager.register_provider(Arc::new(named("google")));

        let result = manager.fetch_identity("gitlab", "token").await;
        assert!(matches!(result, Err(OAuthError::InvalidProvider(name)) if name == "gitlab"));
    }

    #[tokio::test]
    async fn test_later_registration_replaces_earlier() {
        let mut first = named("google");
        first.expect_fetch_identity().never();

        let mut second = named("google");
        second
            .expect_fetch_identity()
            .times(1)
            .returning(|_| Ok(identity()));

        let mut manager = ProviderManager::new();
        manager
            .register_provider(Arc::new(first))
            .register_provider(Arc::new(second));

        assert_eq!(manager.providers(), vec!["google"]);
        assert!(manager.fetch_identity("google", "token").await.is_ok());
    }

    #[tokio::test]
    async fn test_verify_user_uses_exchanged_access_token() {
        let mut mock = named("github");
        mock.expect_exchange_token()
            .times(1)
            .returning(|_, _, _| Ok(tokens()));
        mock.expect_fetch_identity()
            .with(eq("access-123"))
            .times(1)
            .returning(|_| Ok(identity()));

        let mut manager = ProviderManager::new();
        manager.register_provider(Arc::new(mock));

        let (tokens, identity) = manager
            .verify_user("github", "code", "verifier", "https://app.example.com/cb")
            .await
            .unwrap();
        assert_eq!(tokens.refresh_token.as_deref(), Some("refresh-456"));
        assert_eq!(identity.email, "ada@example.com");
    }

    #[tokio::test]
    async fn test_verify_user_stops_after_failed_exchange() {
        let mut mock = named("google");
        mock.expect_exchange_token()
            .returning(|_, _, _| Err(OAuthError::TokenExchangeFailed("invalid_grant".to_string())));
        mock.expect_fetch_identity().never();

        let mut manager = ProviderManager::new();
        manager.register_provider(Arc::new(mock));

        let result = manager
            .verify_user("google", "code", "verifier", "https://app.example.com/cb")
            .await;
        assert!(matches!(result, Err(OAuthError::TokenExchangeFailed(_))));
    }

    #[test]
    fn test_from_config_registers_configured_providers() {
        let config = ProvidersConfig {
            google: Some(ProviderConfig::new("g-id", "g-secret")),
            github: Some(ProviderConfig::new("gh-id", "gh-secret")),
        };

        let manager =
            ProviderManager::from_config(&config, &reqwest::Client::new(), TokenLifetimes::default())
                .unwrap();
        assert_eq!(manager.providers(), vec!["github", "google"]);

        let empty = ProviderManager::from_config(
            &ProvidersConfig::default(),
            &reqwest::Client::new(),
            TokenLifetimes::default(),
        )
        .unwrap();
        assert!(empty.providers().is_empty());
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn unregistered_names_are_invalid(name in "[a-z0-9_-]{1,24}") {
                prop_assume!(name != "google" && name != "github");

                let config = ProvidersConfig {
                    google: Some(ProviderConfig::new("g-id", "g-secret")),
                    github: Some(ProviderConfig::new("gh-id", "gh-secret")),
                };
                let manager = ProviderManager::from_config(
                    &config,
                    &reqwest::Client::new(),
                    TokenLifetimes::default(),
                )
                .unwrap();

                let result = manager.provider(&name);
                prop_assert!(matches!(result, Err(OAuthError::InvalidProvider(n)) if n == name));
            }
        }
    }
}
