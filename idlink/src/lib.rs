//! idlink: OAuth2 + PKCE login with user onboarding and Redis-backed sessions
//!
//! A browser-side client completes the provider's authorization redirect and
//! posts the resulting code and PKCE verifier to `POST /oauth/token`. idlink
//! then:
//! 1. exchanges the code at the provider and fetches the identity
//!    ([`oauth2`])
//! 2. creates or refreshes the local user and its provider link
//!    ([`onboarding`], persisted through [`repository`])
//! 3. opens a session keyed by an `HttpOnly` cookie ([`session`])
//!
//! `GET /userinfo` and `POST /logout` require that session.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use idlink::{config::IdlinkConfig, handlers, observability, state::AppState};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = IdlinkConfig::load_for_service("idlink")?;
//!     observability::init(config.server.log_format)?;
//!
//!     let listener = tokio::net::TcpListener::bind(config.server.bind_address()).await?;
//!     let app = handlers::router(AppState::connect(config).await?);
//!     axum::serve(listener, app).await?;
//!
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod extractors;
pub mod handlers;
pub mod models;
pub mod oauth2;
pub mod observability;
pub mod onboarding;
pub mod repository;
pub mod session;
pub mod state;
pub mod testing;

pub mod prelude {
    //! Convenience re-exports for common types and traits
    //!
    //! ```rust
    //! use idlink::prelude::*;
    //! ```

    pub use crate::config::IdlinkConfig;
    pub use crate::error::ApiError;
    pub use crate::extractors::{Authenticated, AuthenticatedSession, CurrentSession, ValidatedJson};
    pub use crate::models::{Link, User};
    pub use crate::oauth2::{
        ExternalIdentity, IdentityProvider, OAuthError, ProviderManager, TokenSet,
    };
    pub use crate::onboarding::{OnboardingError, OnboardingService};
    pub use crate::session::{Session, SessionManager, SessionStore};
    pub use crate::state::AppState;
}
