//! Base OAuth2 provider implementation with shared logic
//!
//! `BaseOAuthProvider` owns the configured token client, the shared HTTP
//! client and the userinfo endpoint; Google and GitHub only differ in how
//! they read the identity payload.

use std::borrow::Cow;

use chrono::Utc;
use oauth2::{
    AuthType, AuthorizationCode, Client, ClientId, ClientSecret, PkceCodeVerifier, RedirectUrl,
    RequestTokenError, TokenResponse, TokenUrl,
};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::oauth2::http::{execute_request, HttpClientError};
use crate::oauth2::types::{
    ConfiguredClient, OAuthError, ProviderConfig, ProviderTokenResponse, TokenLifetimes, TokenSet,
};

/// Base OAuth2 provider containing shared logic for all providers
pub struct BaseOAuthProvider {
    /// Registry key, used in log fields
    name: &'static str,
    /// Configured OAuth2 client
    client: ConfiguredClient,
    /// Shared HTTP client for token and userinfo requests
    http_client: reqwest::Client,
    /// Userinfo endpoint URL
    userinfo_url: String,
    /// Fallback lifetimes for providers that omit `expires_in`
    lifetimes: TokenLifetimes,
}

impl BaseOAuthProvider {
    /// Create a new base OAuth2 provider
    ///
    /// # Arguments
    ///
    /// * `name` - Registry key of the provider
    /// * `token_url` - Token endpoint, unless `config.token_url` overrides it
    /// * `userinfo_url` - Userinfo endpoint, unless `config.userinfo_url` overrides it
    /// * `config` - Client credentials and overrides
    /// * `http_client` - Shared outbound client
    /// * `lifetimes` - Fallback token lifetimes
    ///
    /// # Errors
    ///
    /// Returns [`OAuthError::Configuration`] if the token URL is invalid
    pub fn new(
        name: &'static str,
        token_url: &str,
        userinfo_url: &str,
        config: &ProviderConfig,
        http_client: reqwest::Client,
        lifetimes: TokenLifetimes,
    ) -> Result<Self, OAuthError> {
        let token_url = config.token_url.as_deref().unwrap_or(token_url);
        let userinfo_url = config
            .userinfo_url
            .clone()
            .unwrap_or_else(|| userinfo_url.to_string());

        // Credentials travel in the form body, not in a Basic auth header
        let client: ConfiguredClient = Client::new(ClientId::new(config.client_id.clone()))
            .set_client_secret(ClientSecret::new(config.client_secret.clone()))
            .set_auth_type(AuthType::RequestBody)
            .set_token_uri(TokenUrl::new(token_url.to_string()).map_err(|e| {
                OAuthError::Configuration(format!("Invalid token URL for {name}: {e}"))
            })?);

        Ok(Self {
            name,
            client,
            http_client,
            userinfo_url,
            lifetimes,
        })
    }

    /// Exchange an authorization code and PKCE verifier for a token set
    ///
    /// Expiries are anchored to the moment the response is decoded.
    ///
    /// # Errors
    ///
    /// Returns [`OAuthError::TokenExchangeFailed`] if the redirect URI is not
    /// a URL, the request fails, or the provider rejects the code
    pub async fn exchange_code(
        &self,
        code: &str,
        pkce_verifier: &str,
        redirect_uri: &str,
    ) -> Result<TokenSet, OAuthError> {
        let redirect_url = RedirectUrl::new(redirect_uri.to_string())
            .map_err(|e| OAuthError::TokenExchangeFailed(format!("Invalid redirect URI: {e}")))?;

        let http_client = self.http_client.clone();
        let send = move |request: oauth2::HttpRequest| execute_request(http_client.clone(), request);

        let token_response: ProviderTokenResponse = self
            .client
            .exchange_code(AuthorizationCode::new(code.to_string()))
            .set_pkce_verifier(PkceCodeVerifier::new(pkce_verifier.to_string()))
            .set_redirect_uri(Cow::Owned(redirect_url))
            .request_async(&send)
            .await
            .map_err(|e| self.token_error(e))?;

        debug!(provider = self.name, "authorization code exchanged");

        Ok(TokenSet::anchored(
            Utc::now(),
            token_response.access_token().secret().clone(),
            token_response
                .refresh_token()
                .map(|t| t.secret().clone())
                .filter(|t| !t.is_empty()),
            token_response.expires_in(),
            token_response.extra_fields().refresh_token_expires_in,
            self.lifetimes,
        ))
    }

    /// Fetch and decode the configured userinfo endpoint
    ///
    /// # Errors
    ///
    /// Returns [`OAuthError::UserInfoFailed`] if the request fails, returns a
    /// non-success status, or the body does not decode as `T`
    pub async fn fetch_user_info<T: DeserializeOwned>(&self, access_token: &str) -> Result<T, OAuthError> {
        self.fetch_json_with_headers(&self.userinfo_url, access_token, &[])
            .await
    }

    /// Fetch JSON from an arbitrary endpoint with extra headers
    ///
    /// GitHub needs a `User-Agent` and a second call for e-mail addresses.
    ///
    /// # Errors
    ///
    /// Returns [`OAuthError::UserInfoFailed`] if the request fails, returns a
    /// non-success status, or the body does not decode as `T`
    pub async fn fetch_json_with_headers<T: DeserializeOwned>(
        &self,
        url: &str,
        access_token: &str,
        headers: &[(&str, &str)],
    ) -> Result<T, OAuthError> {
        let mut request = self.http_client.get(url).bearer_auth(access_token);

        for (key, value) in headers {
            request = request.header(*key, *value);
        }

        let response = request.send().await.map_err(|e| {
            warn!(provider = self.name, url, error = %e, "userinfo request failed");
            OAuthError::UserInfoFailed(e.to_string())
        })?;

        self.check_http_response(url, response).await
    }

    /// Check HTTP response status and parse JSON
    async fn check_http_response<T: DeserializeOwned>(
        &self,
        url: &str,
        response: reqwest::Response,
    ) -> Result<T, OAuthError> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(provider = self.name, url, %status, body = %body, "userinfo endpoint returned an error");
            return Err(OAuthError::UserInfoFailed(format!("HTTP {status}")));
        }

        response.json().await.map_err(|e| {
            warn!(provider = self.name, url, error = %e, "userinfo response is not valid JSON");
            OAuthError::UserInfoFailed(format!("Failed to parse JSON: {e}"))
        })
    }

    fn token_error(
        &self,
        error: RequestTokenError<HttpClientError, oauth2::basic::BasicErrorResponse>,
    ) -> OAuthError {
        match &error {
            RequestTokenError::ServerResponse(response) => {
                warn!(provider = self.name, error = %response, "token endpoint rejected the exchange");
            }
            RequestTokenError::Parse(parse_error, body) => {
                warn!(
                    provider = self.name,
                    error = %parse_error,
                    body = %String::from_utf8_lossy(body),
                    "token endpoint returned an undecodable body"
                );
            }
            RequestTokenError::Request(request_error) => {
                warn!(provider = self.name, error = %request_error, "token request failed");
            }
            RequestTokenError::Other(message) => {
                warn!(provider = self.name, error = %message, "token exchange failed");
            }
        }
        OAuthError::TokenExchangeFailed(error.to_string())
    }

    /// Registry key of the provider
    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }

    /// Get reference to the userinfo URL
    #[must_use]
    pub fn userinfo_url(&self) -> &str {
        &self.userinfo_url
    }
}
