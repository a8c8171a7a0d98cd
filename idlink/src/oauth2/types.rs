//! Core OAuth2 types and configuration
//!
//! Token sets, normalized identities and the provider configuration used to
//! build adapters.

use chrono::{DateTime, Duration, Utc};
use oauth2::basic::{
    BasicErrorResponse, BasicRevocationErrorResponse, BasicTokenIntrospectionResponse,
    BasicTokenType,
};
use oauth2::{
    Client, EndpointNotSet, EndpointSet, ExtraTokenFields, StandardRevocableToken,
    StandardTokenResponse,
};
use serde::{Deserialize, Serialize};

/// Token endpoint fields beyond RFC 6749 that some providers report
///
/// Google and GitHub both send `refresh_token_expires_in` for refresh tokens
/// with a bounded lifetime.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshExpiryFields {
    /// Refresh token lifetime in seconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token_expires_in: Option<u64>,
}

impl ExtraTokenFields for RefreshExpiryFields {}

/// Token endpoint response understood by every adapter
pub type ProviderTokenResponse = StandardTokenResponse<RefreshExpiryFields, BasicTokenType>;

/// OAuth2 client with only the token endpoint configured
///
/// The authorization redirect happens in the browser, so the server side only
/// ever talks to the token endpoint:
/// - `EndpointNotSet` for `HasAuthUrl`
/// - `EndpointNotSet` for `HasDeviceAuthUrl`
/// - `EndpointNotSet` for `HasIntrospectionUrl`
/// - `EndpointNotSet` for `HasRevocationUrl`
/// - `EndpointSet` for `HasTokenUrl`
pub type ConfiguredClient = Client<
    BasicErrorResponse,
    ProviderTokenResponse,
    BasicTokenIntrospectionResponse,
    StandardRevocableToken,
    BasicRevocationErrorResponse,
    EndpointNotSet, // HasAuthUrl
    EndpointNotSet, // HasDeviceAuthUrl
    EndpointNotSet, // HasIntrospectionUrl
    EndpointNotSet, // HasRevocationUrl
    EndpointSet,    // HasTokenUrl
>;

/// Client credentials and endpoint overrides for one provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// OAuth2 client ID
    pub client_id: String,
    /// OAuth2 client secret
    pub client_secret: String,
    /// Token endpoint override
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_url: Option<String>,
    /// Userinfo endpoint override
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub userinfo_url: Option<String>,
}

impl ProviderConfig {
    /// Credentials with the provider's stock endpoints
    #[must_use]
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            token_url: None,
            userinfo_url: None,
        }
    }

    /// Point the adapter at different token and userinfo endpoints
    #[must_use]
    pub fn with_endpoints(mut self, token_url: impl Into<String>, userinfo_url: impl Into<String>) -> Self {
        self.token_url = Some(token_url.into());
        self.userinfo_url = Some(userinfo_url.into());
        self
    }
}

/// Configuration for every supported provider
///
/// A provider without a section is simply not registered.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvidersConfig {
    /// Google OAuth2 configuration
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub google: Option<ProviderConfig>,
    /// GitHub OAuth2 configuration
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub github: Option<ProviderConfig>,
}

/// Lifetimes assumed when a provider omits `expires_in`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenLifetimes {
    /// Access token lifetime
    pub access: Duration,
    /// Refresh token lifetime
    pub refresh: Duration,
}

impl Default for TokenLifetimes {
    fn default() -> Self {
        Self {
            access: Duration::hours(1),
            refresh: Duration::days(30),
        }
    }
}

/// Tokens issued by a provider, with absolute expiries
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenSet {
    /// Access token
    pub access_token: String,
    /// Refresh token, when the provider issued one
    pub refresh_token: Option<String>,
    /// When the access token stops being valid
    pub access_token_expires_at: DateTime<Utc>,
    /// When the refresh token stops being valid
    pub refresh_token_expires_at: DateTime<Utc>,
}

impl TokenSet {
    /// Build a token set from relative lifetimes anchored at `issued_at`
    ///
    /// Missing lifetimes, and lifetimes that overflow the calendar, fall back
    /// to `defaults`. Without a refresh token the refresh expiry is `issued_at`.
    #[must_use]
    pub fn anchored(
        issued_at: DateTime<Utc>,
        access_token: String,
        refresh_token: Option<String>,
        expires_in: Option<std::time::Duration>,
        refresh_expires_in: Option<u64>,
        defaults: TokenLifetimes,
    ) -> Self {
        let access_ttl = expires_in
            .and_then(|ttl| Duration::from_std(ttl).ok())
            .unwrap_or(defaults.access);

        let refresh_token_expires_at = if refresh_token.is_some() {
            let refresh_ttl = refresh_expires_in
                .and_then(|secs| i64::try_from(secs).ok())
                .and_then(Duration::try_seconds)
                .unwrap_or(defaults.refresh);
            expiry(issued_at, refresh_ttl, defaults.refresh)
        } else {
            issued_at
        };

        Self {
            access_token,
            refresh_token,
            access_token_expires_at: expiry(issued_at, access_ttl, defaults.access),
            refresh_token_expires_at,
        }
    }
}

fn expiry(issued_at: DateTime<Utc>, ttl: Duration, default: Duration) -> DateTime<Utc> {
    issued_at
        .checked_add_signed(ttl)
        .or_else(|| issued_at.checked_add_signed(default))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

/// Identity reported by a provider's userinfo endpoint, normalized
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalIdentity {
    /// Provider-specific subject identifier
    pub subject: String,
    /// Display name
    pub display_name: String,
    /// Email address
    pub email: String,
    /// Whether the provider verified the email
    pub email_verified: bool,
    /// Avatar/profile picture URL
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
    /// Locale reported by the provider
    #[serde(skip_serializing_if = "Option::is_none")]
    pub locale: Option<String>,
}

/// OAuth2 errors
#[derive(Debug, thiserror::Error)]
pub enum OAuthError {
    /// No adapter registered under this name
    #[error("Invalid OAuth2 provider: {0}")]
    InvalidProvider(String),

    /// Authorization code exchange failed
    #[error("Failed to exchange authorization code for token: {0}")]
    TokenExchangeFailed(String),

    /// Failed to fetch user info
    #[error("Failed to fetch user information: {0}")]
    UserInfoFailed(String),

    /// Adapter could not be built from configuration
    #[error("Invalid OAuth2 provider configuration: {0}")]
    Configuration(String),
}
