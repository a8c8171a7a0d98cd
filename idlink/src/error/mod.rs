//! Error types and error handling
//!
//! Every module has its own `thiserror` enum; [`ApiError`] composes them for
//! handlers and decides the HTTP status and JSON body. Server-side failures
//! are logged with their full cause but answered with a generic message.

use std::collections::BTreeMap;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;
use tracing::{error, warn};

use crate::oauth2::OAuthError;
use crate::onboarding::OnboardingError;
use crate::session::SessionError;

/// Handler error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Malformed request body
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Request body failed validation
    #[error("Validation failed: {0}")]
    Validation(#[from] validator::ValidationErrors),

    /// No valid session
    #[error("Not authenticated")]
    Unauthenticated,

    /// OAuth2 error
    #[error(transparent)]
    OAuth(#[from] OAuthError),

    /// Onboarding or persistence error
    #[error(transparent)]
    Onboarding(#[from] OnboardingError),

    /// Session error
    #[error(transparent)]
    Session(#[from] SessionError),
}

/// JSON error body
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    /// Machine-readable error code
    pub error: &'static str,
    /// Human-readable message
    pub message: String,
    /// Field-level validation messages
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<BTreeMap<String, Vec<String>>>,
}

impl ApiError {
    /// HTTP status for this error
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_)
            | Self::Validation(_)
            | Self::OAuth(OAuthError::InvalidProvider(_)) => StatusCode::BAD_REQUEST,
            Self::Unauthenticated => StatusCode::UNAUTHORIZED,
            Self::Onboarding(OnboardingError::UserNotFound | OnboardingError::LinkNotFound) => {
                StatusCode::NOT_FOUND
            }
            Self::OAuth(_) | Self::Onboarding(OnboardingError::Repository(_)) | Self::Session(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Machine-readable error code
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::BadRequest(_) => "bad_request",
            Self::Validation(_) => "validation_failed",
            Self::Unauthenticated => "unauthenticated",
            Self::OAuth(OAuthError::InvalidProvider(_)) => "invalid_provider",
            Self::OAuth(OAuthError::TokenExchangeFailed(_)) => "token_exchange_failed",
            Self::OAuth(OAuthError::UserInfoFailed(_)) => "identity_fetch_failed",
            Self::OAuth(OAuthError::Configuration(_)) => "provider_misconfigured",
            Self::Onboarding(OnboardingError::UserNotFound) => "user_not_found",
            Self::Onboarding(OnboardingError::LinkNotFound) => "link_not_found",
            Self::Onboarding(OnboardingError::Repository(_)) => "persistence_failed",
            Self::Session(_) => "session_unavailable",
        }
    }

    fn public_message(&self) -> String {
        match self {
            Self::BadRequest(message) => message.clone(),
            Self::Validation(_) => "request validation failed".to_string(),
            Self::Unauthenticated => "a valid session is required".to_string(),
            Self::OAuth(OAuthError::InvalidProvider(name)) => format!("unknown provider '{name}'"),
            Self::OAuth(OAuthError::TokenExchangeFailed(_)) => {
                "the identity provider rejected the authorization code".to_string()
            }
            Self::OAuth(OAuthError::UserInfoFailed(_)) => {
                "the identity provider did not return a usable identity".to_string()
            }
            Self::OAuth(OAuthError::Configuration(_)) => "identity provider misconfigured".to_string(),
            Self::Onboarding(OnboardingError::UserNotFound) => "user not found".to_string(),
            Self::Onboarding(OnboardingError::LinkNotFound) => "link not found".to_string(),
            Self::Onboarding(OnboardingError::Repository(_)) => "failed to persist account".to_string(),
            Self::Session(_) => "session storage unavailable".to_string(),
        }
    }

    fn details(&self) -> Option<BTreeMap<String, Vec<String>>> {
        let Self::Validation(errors) = self else {
            return None;
        };

        let details = errors
            .field_errors()
            .into_iter()
            .map(|(field, errors)| {
                let messages = errors
                    .iter()
                    .map(|e| {
                        e.message
                            .as_ref()
                            .map_or_else(|| e.code.to_string(), ToString::to_string)
                    })
                    .collect();
                (field.to_string(), messages)
            })
            .collect();

        Some(details)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(error = %self, code = self.code(), "request failed");
        } else {
            warn!(error = %self, code = self.code(), "request rejected");
        }

        let body = ErrorBody {
            error: self.code(),
            message: self.public_message(),
            details: self.details(),
        };

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::RepositoryError;
    use validator::Validate;

    #[derive(Validate)]
    struct Probe {
        #[validate(length(min = 1, message = "provider is required"))]
        provider: String,
    }

    async fn body_of(error: ApiError) -> (StatusCode, serde_json::Value) {
        let response = error.into_response();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            ApiError::from(OAuthError::InvalidProvider("x".into())).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(ApiError::Unauthenticated.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            ApiError::from(OnboardingError::UserNotFound).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError::from(OnboardingError::LinkNotFound).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError::from(OAuthError::TokenExchangeFailed("x".into())).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            ApiError::from(OnboardingError::Repository(RepositoryError::Conflict("x".into()))).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            ApiError::from(SessionError::Store("down".into())).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[tokio::test]
    async fn test_provider_details_are_not_echoed() {
        let (status, body) = body_of(ApiError::from(OAuthError::TokenExchangeFailed(
            r#"{"error":"invalid_grant","secret":"s3cr3t"}"#.into(),
        )))
        .await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "token_exchange_failed");
        assert!(!body.to_string().contains("s3cr3t"));
        assert!(body.get("details").is_none());
    }

    #[tokio::test]
    async fn test_validation_details_by_field() {
        let errors = Probe {
            provider: String::new(),
        }
        .validate()
        .unwrap_err();

        let (status, body) = body_of(ApiError::from(errors)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "validation_failed");
        assert_eq!(body["details"]["provider"][0], "provider is required");
    }
}
