//! Application state management
//!
//! One [`AppState`] is built at startup and cloned into every handler. It
//! owns the provider registry, the onboarding service and the session
//! manager; each is behind an `Arc`, so cloning is cheap.

use std::sync::Arc;

use anyhow::Context;
use sqlx::postgres::PgPoolOptions;
use tracing::info;

use crate::config::IdlinkConfig;
use crate::oauth2::http::build_client;
use crate::oauth2::ProviderManager;
use crate::onboarding::OnboardingService;
use crate::repository::{PgLinkRepository, PgTransactionManager, PgUserRepository};
use crate::session::{RedisSessionStore, SessionManager};

/// Application state shared by all handlers
///
/// # Example
///
/// ```rust,no_run
/// use idlink::{config::IdlinkConfig, handlers, state::AppState};
///
/// # async fn example() -> anyhow::Result<()> {
/// let config = IdlinkConfig::load_for_service("idlink")?;
/// let state = AppState::connect(config).await?;
/// let app = handlers::router(state);
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct AppState {
    config: Arc<IdlinkConfig>,
    providers: Arc<ProviderManager>,
    onboarding: Arc<OnboardingService>,
    sessions: Arc<SessionManager>,
}

impl AppState {
    /// Assemble state from already-built components
    #[must_use]
    pub fn new(
        config: IdlinkConfig,
        providers: ProviderManager,
        onboarding: OnboardingService,
        sessions: SessionManager,
    ) -> Self {
        Self {
            config: Arc::new(config),
            providers: Arc::new(providers),
            onboarding: Arc::new(onboarding),
            sessions: Arc::new(sessions),
        }
    }

    /// Connect to PostgreSQL and Redis and build the production components
    ///
    /// # Errors
    ///
    /// Returns error if a pool cannot be created, migrations fail, or a
    /// provider adapter is misconfigured
    pub async fn connect(config: IdlinkConfig) -> anyhow::Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.database.max_connections)
            .min_connections(config.database.min_connections)
            .connect(&config.database.url)
            .await
            .context("connecting to PostgreSQL")?;

        if config.database.run_migrations {
            sqlx::migrate!("./migrations")
                .run(&pool)
                .await
                .context("running database migrations")?;
            info!("database migrations applied");
        }

        let redis = deadpool_redis::Config::from_url(config.redis.url.as_str())
            .create_pool(Some(deadpool_redis::Runtime::Tokio1))
            .context("creating Redis pool")?;

        let http_client = build_client(config.http_client.timeout())?;
        let providers =
            ProviderManager::from_config(&config.providers, &http_client, config.tokens.lifetimes())?;

        let onboarding = OnboardingService::new(
            Arc::new(PgUserRepository::new(pool.clone())),
            Arc::new(PgLinkRepository::new(pool.clone())),
            Arc::new(PgTransactionManager::new(pool)),
        );

        let sessions = SessionManager::new(
            Arc::new(RedisSessionStore::new(redis)),
            config.session.clone(),
        );

        Ok(Self::new(config, providers, onboarding, sessions))
    }

    /// Get configuration reference
    #[must_use]
    pub fn config(&self) -> &IdlinkConfig {
        &self.config
    }

    /// Provider registry
    #[must_use]
    pub fn providers(&self) -> &ProviderManager {
        &self.providers
    }

    /// Onboarding service
    #[must_use]
    pub fn onboarding(&self) -> &OnboardingService {
        &self.onboarding
    }

    /// Session manager
    #[must_use]
    pub fn sessions(&self) -> &SessionManager {
        &self.sessions
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("providers", &self.providers)
            .field("sessions", &self.sessions)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::memory_state;

    #[test]
    fn test_clone_state() {
        let state = memory_state(ProviderManager::new());
        let cloned = state.clone();

        assert!(Arc::ptr_eq(&state.config, &cloned.config));
        assert!(Arc::ptr_eq(&state.sessions, &cloned.sessions));
    }

    #[test]
    fn test_config_is_kept() {
        let state = memory_state(ProviderManager::new());
        assert_eq!(state.config().session.cookie_name, "idlink_session");
        assert!(state.providers().providers().is_empty());
    }
}
