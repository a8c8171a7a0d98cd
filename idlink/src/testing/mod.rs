//! Testing utilities for idlink
//!
//! - [`MemoryStore`]: in-memory users/links with the real unique constraints
//! - [`StubProvider`]: scripted identity provider
//! - [`TestApp`]: application state over in-memory backends
//! - [`TestDatabase`]: migrated PostgreSQL database for repository tests
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use idlink::oauth2::ProviderManager;
//! use idlink::testing::{StubProvider, TestApp};
//!
//! let google = Arc::new(StubProvider::new(
//!     "google",
//!     StubProvider::identity("g-1", "ada@example.com"),
//! ));
//!
//! let mut providers = ProviderManager::new();
//! providers.register_provider(google.clone());
//!
//! let app = TestApp::new(providers);
//! let router = app.router();
//! assert_eq!(app.store.user_count(), 0);
//! ```

pub mod database;
pub mod memory;
pub mod provider;

use std::sync::Arc;

use axum::Router;

use crate::config::IdlinkConfig;
use crate::handlers;
use crate::oauth2::ProviderManager;
use crate::onboarding::OnboardingService;
use crate::session::{MemorySessionStore, SessionManager};
use crate::state::AppState;

pub use database::TestDatabase;
pub use memory::MemoryStore;
pub use provider::StubProvider;

/// Application wired to in-memory storage
///
/// The stores are exposed so tests can inspect what a request wrote.
#[derive(Debug, Clone)]
pub struct TestApp {
    /// State handed to the router
    pub state: AppState,
    /// Users and links
    pub store: MemoryStore,
    /// Session entries
    pub sessions: MemorySessionStore,
}

impl TestApp {
    /// Default configuration with the given providers
    #[must_use]
    pub fn new(providers: ProviderManager) -> Self {
        Self::with_config(IdlinkConfig::default(), providers)
    }

    /// Custom configuration with the given providers
    #[must_use]
    pub fn with_config(config: IdlinkConfig, providers: ProviderManager) -> Self {
        let store = MemoryStore::new();
        let sessions = MemorySessionStore::new();

        let shared = Arc::new(store.clone());
        let onboarding = OnboardingService::new(shared.clone(), shared.clone(), shared);
        let session_manager = SessionManager::new(Arc::new(sessions.clone()), config.session.clone());

        Self {
            state: AppState::new(config, providers, onboarding, session_manager),
            store,
            sessions,
        }
    }

    /// The full router over this state
    #[must_use]
    pub fn router(&self) -> Router {
        handlers::router(self.state.clone())
    }
}

/// State over in-memory backends when the stores need no inspection
#[must_use]
pub fn memory_state(providers: ProviderManager) -> AppState {
    TestApp::new(providers).state
}
