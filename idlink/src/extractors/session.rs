//! Session extractors
//!
//! ```rust,no_run
//! use idlink::extractors::Authenticated;
//!
//! async fn whoami(Authenticated(auth): Authenticated) -> String {
//!     format!("{} via {}", auth.user_id, auth.issuer)
//! }
//! ```

use axum::{
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};
use uuid::Uuid;

use crate::error::ApiError;
use crate::session::Session;
use crate::state::AppState;

/// The request's session, freshly created if the cookie is missing or stale
#[derive(Debug, Clone)]
pub struct CurrentSession(pub Session);

impl<S> FromRequestParts<S> for CurrentSession
where
    S: Send + Sync,
    AppState: FromRef<S>,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let state = AppState::from_ref(state);
        let session = state.sessions().load(&parts.headers).await?;
        Ok(Self(session))
    }
}

/// A session known to belong to a user
#[derive(Debug, Clone)]
pub struct AuthenticatedSession {
    /// The underlying session
    pub session: Session,
    /// Authenticated user
    pub user_id: Uuid,
    /// Provider that authenticated the session
    pub issuer: String,
}

/// Authenticated session extractor for protected routes
///
/// Rejects with [`ApiError::Unauthenticated`] (401) when the request carries
/// no session, an expired one, or one without a user.
#[derive(Debug, Clone)]
pub struct Authenticated(pub AuthenticatedSession);

impl<S> FromRequestParts<S> for Authenticated
where
    S: Send + Sync,
    AppState: FromRef<S>,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let CurrentSession(session) = CurrentSession::from_request_parts(parts, state).await?;

        let (user_id, issuer) = session
            .principal()
            .map(|(user_id, issuer)| (user_id, issuer.to_string()))
            .ok_or(ApiError::Unauthenticated)?;

        Ok(Self(AuthenticatedSession {
            session,
            user_id,
            issuer,
        }))
    }
}
