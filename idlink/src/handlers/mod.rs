//! HTTP handlers and router
//!
//! | method | path           | handler                  |
//! |--------|----------------|--------------------------|
//! | POST   | `/oauth/token` | [`oauth::exchange_token`] |
//! | GET    | `/userinfo`    | [`user::userinfo`]        |
//! | POST   | `/logout`      | [`user::logout`]          |
//! | GET    | `/healthcheck` | [`health::healthcheck`]   |

pub mod health;
pub mod oauth;
pub mod user;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use crate::state::AppState;

pub use health::{healthcheck, HealthResponse};
pub use oauth::{exchange_token, LoginResponse, TokenRequest};
pub use user::{logout, userinfo, UserInfoResponse};

/// Build the application router
///
/// Every request is traced and bounded by the configured request timeout.
pub fn router(state: AppState) -> Router {
    let timeout = state.config().server.request_timeout();

    Router::new()
        .route("/oauth/token", post(exchange_token))
        .route("/userinfo", get(userinfo))
        .route("/logout", post(logout))
        .route("/healthcheck", get(healthcheck))
        .layer(TimeoutLayer::new(timeout))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
