//! Validated JSON extractor
//!
//! # Example
//!
//! ```rust,no_run
//! use idlink::extractors::ValidatedJson;
//! use serde::Deserialize;
//! use validator::Validate;
//!
//! #[derive(Debug, Deserialize, Validate)]
//! struct Rename {
//!     #[validate(length(min = 1, max = 100))]
//!     display_name: String,
//! }
//!
//! async fn rename(ValidatedJson(body): ValidatedJson<Rename>) -> String {
//!     // body is guaranteed to be valid here
//!     body.display_name
//! }
//! ```

use axum::{
    extract::{FromRequest, Request},
    Json,
};
use serde::de::DeserializeOwned;
use validator::Validate;

use crate::error::ApiError;

/// JSON body extractor that runs `Validate` after deserializing
///
/// Malformed JSON or a wrong content type is rejected with
/// [`ApiError::BadRequest`]; failed validation with
/// [`ApiError::Validation`], which lists the messages per field.
#[derive(Debug, Clone, Copy, Default)]
pub struct ValidatedJson<T>(pub T);

impl<T, S> FromRequest<S> for ValidatedJson<T>
where
    T: DeserializeOwned + Validate + 'static,
    S: Send + Sync + 'static,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(data) = Json::<T>::from_request(req, state)
            .await
            .map_err(|rejection| ApiError::BadRequest(rejection.body_text()))?;

        data.validate()?;

        Ok(Self(data))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::header::CONTENT_TYPE;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, Validate)]
    struct Signup {
        #[serde(default)]
        #[validate(length(min = 1, message = "name is required"))]
        name: String,
        #[serde(default)]
        #[validate(url(message = "callback must be an absolute URL"))]
        callback: String,
    }

    fn json_request(body: &str) -> Request {
        Request::builder()
            .method("POST")
            .uri("/")
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_valid_body() {
        let ValidatedJson(signup) = ValidatedJson::<Signup>::from_request(
            json_request(r#"{"name":"ada","callback":"https://app.example.com/cb"}"#),
            &(),
        )
        .await
        .unwrap();

        assert_eq!(signup.name, "ada");
    }

    #[tokio::test]
    async fn test_missing_fields_fail_validation() {
        let rejection = ValidatedJson::<Signup>::from_request(json_request("{}"), &())
            .await
            .unwrap_err();

        let ApiError::Validation(errors) = rejection else {
            panic!("expected validation error, got {rejection:?}");
        };
        let fields = errors.field_errors();
        assert!(fields.keys().any(|field| *field == "name"));
        assert!(fields.keys().any(|field| *field == "callback"));
    }

    #[tokio::test]
    async fn test_malformed_json_is_bad_request() {
        let rejection = ValidatedJson::<Signup>::from_request(json_request("{not json"), &())
            .await
            .unwrap_err();

        assert!(matches!(rejection, ApiError::BadRequest(_)));
    }
}
