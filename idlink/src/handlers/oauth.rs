//! Token exchange handler
//!
//! The browser runs the authorization redirect itself and posts the code and
//! PKCE verifier here. A successful exchange onboards the identity and starts
//! a new session.

use axum::{
    extract::State,
    http::header::SET_COOKIE,
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::info;
use validator::Validate;

use crate::error::ApiError;
use crate::extractors::ValidatedJson;
use crate::models::{Link, User};
use crate::state::AppState;

/// Body of `POST /oauth/token`
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct TokenRequest {
    /// Registered provider name
    #[serde(default)]
    #[validate(length(min = 1, message = "provider is required"))]
    pub provider: String,

    /// Authorization code returned by the provider
    #[serde(default)]
    #[validate(length(min = 1, message = "authorizationCode is required"))]
    pub authorization_code: String,

    /// PKCE verifier the code was requested with
    #[serde(default)]
    #[validate(length(
        min = 43,
        max = 128,
        message = "codeVerifier must be 43 to 128 characters"
    ))]
    pub code_verifier: String,

    /// Redirect URI the code was issued for
    #[serde(default)]
    #[validate(url(message = "redirectUri must be an absolute URL"))]
    pub redirect_uri: String,
}

/// Body of a successful login
#[derive(Debug, Serialize)]
pub struct LoginResponse {
    /// Local user
    pub user: User,
    /// Link for the provider used
    pub link: Link,
}

/// Exchange an authorization code, onboard the identity and open a session
///
/// Nothing is written and no cookie is set unless both provider calls
/// succeed.
///
/// # Errors
///
/// - 400 for an invalid body or an unregistered provider
/// - 500 if the provider rejects the code, the identity cannot be fetched,
///   or persistence fails
pub async fn exchange_token(
    State(state): State<AppState>,
    ValidatedJson(request): ValidatedJson<TokenRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let (tokens, identity) = state
        .providers()
        .verify_user(
            &request.provider,
            &request.authorization_code,
            &request.code_verifier,
            &request.redirect_uri,
        )
        .await?;

    let onboarded = state
        .onboarding()
        .onboard(&request.provider, &tokens, &identity)
        .await?;

    let mut session = state.sessions().create();
    session.authenticate(onboarded.user.id, &request.provider, &tokens.access_token);
    let cookie = state.sessions().save(&session).await?;

    info!(
        user_id = %onboarded.user.id,
        provider = %request.provider,
        session_id = %session.id(),
        "login completed"
    );

    Ok((
        [(SET_COOKIE, cookie)],
        Json(LoginResponse {
            user: onboarded.user,
            link: onboarded.link,
        }),
    ))
}
