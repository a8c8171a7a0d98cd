//! Google OAuth2 provider implementation
//!
//! Authorization codes are exchanged at Google's token endpoint and the
//! identity comes from the OpenID Connect userinfo endpoint.

use async_trait::async_trait;
use serde::Deserialize;

use crate::oauth2::provider::IdentityProvider;
use crate::oauth2::providers::base::BaseOAuthProvider;
use crate::oauth2::types::{ExternalIdentity, OAuthError, ProviderConfig, TokenLifetimes, TokenSet};

/// Registry key and link issuer for Google
pub const GOOGLE: &str = "google";

const TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const USERINFO_URL: &str = "https://openidconnect.googleapis.com/v1/userinfo";

/// Google OAuth2 provider
pub struct GoogleProvider {
    base: BaseOAuthProvider,
}

impl GoogleProvider {
    /// Create a new Google OAuth2 provider
    ///
    /// # Errors
    ///
    /// Returns error if the configured token endpoint is not a valid URL
    pub fn new(
        config: &ProviderConfig,
        http_client: reqwest::Client,
        lifetimes: TokenLifetimes,
    ) -> Result<Self, OAuthError> {
        let base = BaseOAuthProvider::new(GOOGLE, TOKEN_URL, USERINFO_URL, config, http_client, lifetimes)?;
        Ok(Self { base })
    }
}

#[async_trait]
impl IdentityProvider for GoogleProvider {
    fn identify(&self) -> &'static str {
        GOOGLE
    }

    async fn exchange_token(
        &self,
        authorization_code: &str,
        code_verifier: &str,
        redirect_uri: &str,
    ) -> Result<TokenSet, OAuthError> {
        self.base
            .exchange_code(authorization_code, code_verifier, redirect_uri)
            .await
    }

    async fn fetch_identity(&self, access_token: &str) -> Result<ExternalIdentity, OAuthError> {
        let user: GoogleUserInfo = self.base.fetch_user_info(access_token).await?;
        Ok(user.into())
    }
}

/// Google userinfo response
///
/// Accepts both the OIDC field names and the legacy `oauth2/v2` ones.
#[derive(Debug, Deserialize)]
struct GoogleUserInfo {
    #[serde(alias = "id")]
    sub: String,
    email: String,
    #[serde(default, alias = "verified_email")]
    email_verified: bool,
    name: Option<String>,
    picture: Option<String>,
    locale: Option<String>,
}

impl From<GoogleUserInfo> for ExternalIdentity {
    fn from(user: GoogleUserInfo) -> Self {
        let display_name = user
            .name
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| user.email.clone());

        Self {
            subject: user.sub,
            display_name,
            email: user.email,
            email_verified: user.email_verified,
            avatar_url: user.picture,
            locale: user.locale,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_oidc_userinfo_mapping() {
        let user: GoogleUserInfo = serde_json::from_str(
            r#"{
                "sub": "110169484474386276334",
                "name": "Ada Lovelace",
                "email": "ada@example.com",
                "email_verified": true,
                "picture": "https://lh3.googleusercontent.com/a/ada",
                "locale": "en-GB"
            }"#,
        )
        .unwrap();

        let identity = ExternalIdentity::from(user);
        assert_eq!(identity.subject, "110169484474386276334");
        assert_eq!(identity.display_name, "Ada Lovelace");
        assert!(identity.email_verified);
        assert_eq!(identity.locale.as_deref(), Some("en-GB"));
    }

    #[test]
    fn test_legacy_userinfo_field_names() {
        let user: GoogleUserInfo = serde_json::from_str(
            r#"{"id": "42", "email": "grace@example.com", "verified_email": true}"#,
        )
        .unwrap();

        let identity = ExternalIdentity::from(user);
        assert_eq!(identity.subject, "42");
        assert!(identity.email_verified);
        assert_eq!(identity.display_name, "grace@example.com");
        assert_eq!(identity.avatar_url, None);
    }

    #[test]
    fn test_identify() {
        let provider = GoogleProvider::new(
            &ProviderConfig::new("client", "secret"),
            reqwest::Client::new(),
            TokenLifetimes::default(),
        )
        .unwrap();

        assert_eq!(provider.identify(), "google");
    }
}
