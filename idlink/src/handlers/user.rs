//! Session-protected user endpoints

use axum::{
    extract::State,
    http::{header::SET_COOKIE, StatusCode},
    response::IntoResponse,
    Json,
};
use serde::Serialize;
use tracing::{info, warn};

use crate::error::ApiError;
use crate::extractors::{Authenticated, AuthenticatedSession};
use crate::models::User;
use crate::onboarding::OnboardingError;
use crate::state::AppState;

/// Body of `GET /userinfo`
#[derive(Debug, Serialize)]
pub struct UserInfoResponse {
    /// The session's user
    pub user: User,
}

/// Return the user behind the session
///
/// # Errors
///
/// - 401 without a valid session
/// - 404 if the user no longer exists
pub async fn userinfo(
    State(state): State<AppState>,
    Authenticated(auth): Authenticated,
) -> Result<Json<UserInfoResponse>, ApiError> {
    let user = state.onboarding().get_user(auth.user_id).await?;
    Ok(Json(UserInfoResponse { user }))
}

/// Revoke the session's provider link and end the session
///
/// The link row is kept with its tokens cleared. A link that disappeared in
/// the meantime does not prevent the session from being ended.
///
/// # Errors
///
/// - 401 without a valid session
/// - 500 if storage fails
pub async fn logout(
    State(state): State<AppState>,
    Authenticated(auth): Authenticated,
) -> Result<impl IntoResponse, ApiError> {
    let AuthenticatedSession {
        mut session,
        user_id,
        issuer,
    } = auth;

    match state.onboarding().revoke_link(user_id, &issuer).await {
        Ok(_) => {}
        Err(OnboardingError::LinkNotFound) => {
            warn!(user_id = %user_id, issuer = %issuer, "no link to revoke on logout");
        }
        Err(e) => return Err(e.into()),
    }

    state.sessions().invalidate(&mut session);
    let cookie = state.sessions().save(&session).await?;

    info!(user_id = %user_id, issuer = %issuer, "logged out");
    Ok((StatusCode::NO_CONTENT, [(SET_COOKIE, cookie)]))
}
