//! GitHub OAuth2 provider implementation
//!
//! GitHub has no OIDC userinfo endpoint: the profile comes from `/user` and
//! the e-mail address from `/user/emails`.

use async_trait::async_trait;
use serde::Deserialize;

use crate::oauth2::provider::IdentityProvider;
use crate::oauth2::providers::base::BaseOAuthProvider;
use crate::oauth2::types::{ExternalIdentity, OAuthError, ProviderConfig, TokenLifetimes, TokenSet};

/// Registry key and link issuer for GitHub
pub const GITHUB: &str = "github";

const TOKEN_URL: &str = "https://github.com/login/oauth/access_token";
const USER_URL: &str = "https://api.github.com/user";

const API_HEADERS: &[(&str, &str)] = &[
    ("User-Agent", "idlink"),
    ("Accept", "application/vnd.github+json"),
];

/// GitHub OAuth2 provider
pub struct GitHubProvider {
    base: BaseOAuthProvider,
}

impl GitHubProvider {
    /// Create a new GitHub OAuth2 provider
    ///
    /// # Errors
    ///
    /// Returns error if the configured token endpoint is not a valid URL
    pub fn new(
        config: &ProviderConfig,
        http_client: reqwest::Client,
        lifetimes: TokenLifetimes,
    ) -> Result<Self, OAuthError> {
        let base = BaseOAuthProvider::new(GITHUB, TOKEN_URL, USER_URL, config, http_client, lifetimes)?;
        Ok(Self { base })
    }

    fn emails_url(&self) -> String {
        format!("{}/emails", self.base.userinfo_url().trim_end_matches('/'))
    }
}

#[async_trait]
impl IdentityProvider for GitHubProvider {
    fn identify(&self) -> &'static str {
        GITHUB
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
        let user: GitHubUser = self
            .base
            .fetch_json_with_headers(self.base.userinfo_url(), access_token, API_HEADERS)
            .await?;

        let emails: Vec<GitHubEmail> = self
            .base
            .fetch_json_with_headers(&self.emails_url(), access_token, API_HEADERS)
            .await?;

        identity_from(user, &emails)
    }
}

/// Combine the profile with the best e-mail address GitHub reports
///
/// Preference: primary and verified, any verified, then the public profile
/// e-mail (unverified).
fn identity_from(user: GitHubUser, emails: &[GitHubEmail]) -> Result<ExternalIdentity, OAuthError> {
    let chosen = emails
        .iter()
        .find(|e| e.primary && e.verified)
        .or_else(|| emails.iter().find(|e| e.verified));

    let (email, email_verified) = match (chosen, user.email) {
        (Some(e), _) => (e.email.clone(), true),
        (None, Some(public)) if !public.is_empty() => (public, false),
        _ => {
            return Err(OAuthError::UserInfoFailed(
                "GitHub account has no usable e-mail address".to_string(),
            ))
        }
    };

    Ok(ExternalIdentity {
        subject: user.id.to_string(),
        display_name: user.name.filter(|name| !name.is_empty()).unwrap_or(user.login),
        email,
        email_verified,
        avatar_url: user.avatar_url,
        locale: None,
    })
}

/// GitHub user response
#[derive(Debug, Deserialize)]
struct GitHubUser {
    id: i64,
    login: String,
    name: Option<String>,
    email: Option<String>,
    avatar_url: Option<String>,
}

/// GitHub email response
#[derive(Debug, Deserialize)]
struct GitHubEmail {
    email: String,
    verified: bool,
    primary: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn octocat(email: Option<&str>) -> GitHubUser {
        GitHubUser {
            id: 583_231,
            login: "octocat".to_string(),
            name: None,
            email: email.map(str::to_string),
            avatar_url: Some("https://avatars.githubusercontent.com/u/583231".to_string()),
        }
    }

    fn email(address: &str, primary: bool, verified: bool) -> GitHubEmail {
        GitHubEmail {
            email: address.to_string(),
            verified,
            primary,
        }
    }

    #[test]
    fn test_primary_verified_email_wins() {
        let emails = vec![
            email("work@example.com", false, true),
            email("octo@example.com", true, true),
        ];

        let identity = identity_from(octocat(Some("public@example.com")), &emails).unwrap();
        assert_eq!(identity.subject, "583231");
        assert_eq!(identity.email, "octo@example.com");
        assert!(identity.email_verified);
        assert_eq!(identity.display_name, "octocat");
    }

    #[test]
    fn test_unverified_primary_falls_back_to_verified() {
        let emails = vec![
            email("primary@example.com", true, false),
            email("verified@example.com", false, true),
        ];

        let identity = identity_from(octocat(None), &emails).unwrap();
        assert_eq!(identity.email, "verified@example.com");
    }

    #[test]
    fn test_public_email_is_unverified() {
        let identity = identity_from(octocat(Some("public@example.com")), &[]).unwrap();
        assert_eq!(identity.email, "public@example.com");
        assert!(!identity.email_verified);
    }

    #[test]
    fn test_no_email_fails() {
        let result = identity_from(octocat(None), &[email("x@example.com", true, false)]);
        assert!(matches!(result, Err(OAuthError::UserInfoFailed(_))));
    }

    #[test]
    fn test_emails_url_follows_userinfo_override() {
        let config = ProviderConfig::new("client", "secret")
            .with_endpoints("http://127.0.0.1:4000/token", "http://127.0.0.1:4000/user/");
        let provider =
            GitHubProvider::new(&config, reqwest::Client::new(), TokenLifetimes::default()).unwrap();

        assert_eq!(provider.emails_url(), "http://127.0.0.1:4000/user/emails");
        assert_eq!(provider.identify(), "github");
    }
}
