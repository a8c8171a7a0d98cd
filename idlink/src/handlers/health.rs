//! Liveness probe

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};

use crate::state::AppState;

/// Body of `GET /healthcheck`
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Always `"ok"`
    pub status: String,
    /// Host name of the instance answering
    pub host: String,
}

/// Report that the process is serving requests
///
/// The host is read from `HOSTNAME`, falling back to the bind address.
pub async fn healthcheck(State(state): State<AppState>) -> Json<HealthResponse> {
    let host = std::env::var("HOSTNAME").unwrap_or_else(|_| state.config().server.host.clone());

    Json(HealthResponse {
        status: "ok".to_string(),
        host,
    })
}
