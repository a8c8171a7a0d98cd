//! Shared HTTP client for OAuth2 providers
//!
//! Every adapter drives its token exchange through [`execute_request`] with
//! the same pooled `reqwest::Client`, built once by [`build_client`].

use std::time::Duration;

/// Errors raised while relaying an `oauth2` request through `reqwest`
#[derive(Debug, thiserror::Error)]
pub enum HttpClientError {
    /// Request could not be sent or the body could not be read
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Response could not be rebuilt for the `oauth2` crate
    #[error("Invalid HTTP response: {0}")]
    Response(#[from] http::Error),
}

/// Build the outbound client shared by all providers
///
/// Redirects are disabled (`Policy::none`) as OAuth2 token endpoints must
/// answer directly.
///
/// # Errors
///
/// Returns `reqwest::Error` if the TLS backend cannot be initialized
pub fn build_client(timeout: Duration) -> Result<reqwest::Client, reqwest::Error> {
    reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .timeout(timeout)
        .build()
}

/// Send an `oauth2::HttpRequest` with `client` and buffer the response
///
/// Request headers are forwarded as-is; the response body is fully read
/// before returning.
///
/// # Errors
///
/// Returns [`HttpClientError`] if sending fails, the body cannot be read, or
/// the response cannot be reassembled
pub async fn execute_request(
    client: reqwest::Client,
    request: oauth2::HttpRequest,
) -> Result<oauth2::HttpResponse, HttpClientError> {
    let (parts, body) = request.into_parts();

    let response = client
        .request(parts.method, parts.uri.to_string())
        .headers(parts.headers)
        .body(body)
        .send()
        .await?;

    let status_code = response.status();
    let headers = response.headers().to_owned();
    let body = response.bytes().await?.to_vec();

    let mut builder = http::Response::builder().status(status_code);
    for (name, value) in &headers {
        builder = builder.header(name, value);
    }

    Ok(builder.body(body)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_client_with_timeout() {
        assert!(build_client(Duration::from_secs(10)).is_ok());
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_transport_error() {
        let client = build_client(Duration::from_millis(500)).unwrap();
        let request = http::Request::builder()
            .method(http::Method::POST)
            .uri("http://127.0.0.1:9/token")
            .body(Vec::new())
            .unwrap();

        let result = execute_request(client, request).await;
        assert!(matches!(result, Err(HttpClientError::Transport(_))));
    }
}
