//! Identity provider adapter contract

use async_trait::async_trait;

use crate::oauth2::types::{ExternalIdentity, OAuthError, TokenSet};

/// One external identity provider
///
/// Adapters perform exactly two outbound calls, never retry, and normalize
/// the provider's answers into [`TokenSet`] and [`ExternalIdentity`].
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Registry key, also stored as the link issuer (e.g. `"google"`)
    fn identify(&self) -> &'static str;

    /// Exchange an authorization code and PKCE verifier for tokens
    ///
    /// # Errors
    ///
    /// Returns [`OAuthError::TokenExchangeFailed`] on transport failure,
    /// non-2xx status or an undecodable body
    async fn exchange_token(
        &self,
        authorization_code: &str,
        code_verifier: &str,
        redirect_uri: &str,
    ) -> Result<TokenSet, OAuthError>;

    /// Fetch the identity behind an access token
    ///
    /// # Errors
    ///
    /// Returns [`OAuthError::UserInfoFailed`] on transport failure, non-2xx
    /// status or an undecodable body
    async fn fetch_identity(&self, access_token: &str) -> Result<ExternalIdentity, OAuthError>;
}
