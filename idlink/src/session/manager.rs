//! Session lifecycle against a [`SessionStore`]
//!
//! The manager owns the cookie contract: it reads the session id from the
//! `Cookie` header, and every [`SessionManager::save`] returns the matching
//! `Set-Cookie` value.

use std::sync::Arc;
use std::time::Duration;

use axum::http::header::COOKIE;
use axum::http::{HeaderMap, HeaderValue};
use tracing::{debug, warn};

use super::{Session, SessionConfig, SessionError, SessionId, SessionStore, SessionValues};

/// Creates, loads, persists and invalidates sessions
#[derive(Clone)]
pub struct SessionManager {
    store: Arc<dyn SessionStore>,
    config: SessionConfig,
}

impl std::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl SessionManager {
    /// Create a manager over `store`
    #[must_use]
    pub fn new(store: Arc<dyn SessionStore>, config: SessionConfig) -> Self {
        Self { store, config }
    }

    /// Cookie and storage options
    #[must_use]
    pub const fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// A fresh, unsaved session
    #[must_use]
    pub fn create(&self) -> Session {
        Session::new(self.config.max_age_secs)
    }

    /// Session referenced by the request cookie, or a fresh one
    ///
    /// A missing cookie, a value that is not a session id, an unknown or
    /// expired key and an undecodable stored blob all yield a new session.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Store`] if the store cannot be reached
    pub async fn load(&self, headers: &HeaderMap) -> Result<Session, SessionError> {
        let Some(id) = self.session_id(headers) else {
            return Ok(self.create());
        };

        Ok(self.get(id).await?.unwrap_or_else(|| self.create()))
    }

    /// Session stored under `id`, if any
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Store`] if the store cannot be reached
    pub async fn get(&self, id: SessionId) -> Result<Option<Session>, SessionError> {
        let Some(blob) = self.store.load(&self.key(id)).await? else {
            return Ok(None);
        };

        match SessionValues::decode(&blob) {
            Ok(values) => Ok(Some(Session::restored(id, values, self.config.max_age_secs))),
            Err(e) => {
                warn!(session_id = %id, error = %e, "discarding undecodable session values");
                Ok(None)
            }
        }
    }

    /// Persist `session` and build its `Set-Cookie` header
    ///
    /// An invalidated session is deleted from the store and answered with a
    /// clearing cookie (`Max-Age=0`).
    ///
    /// # Errors
    ///
    /// Returns error if encoding or the store command fails
    pub async fn save(&self, session: &Session) -> Result<HeaderValue, SessionError> {
        let key = self.key(session.id());

        if session.is_invalidated() {
            self.store.delete(&key).await?;
            debug!(session_id = %session.id(), "session deleted");
        } else {
            let ttl = u64::try_from(session.max_age_secs())
                .ok()
                .filter(|secs| *secs > 0)
                .map(Duration::from_secs);
            self.store
                .store(&key, &session.values().encode()?, ttl)
                .await?;
            debug!(session_id = %session.id(), new = session.is_new(), "session saved");
        }

        self.cookie(session)
    }

    /// Mark `session` for deletion on the next [`save`](Self::save)
    pub fn invalidate(&self, session: &mut Session) {
        session.invalidate();
    }

    fn key(&self, id: SessionId) -> String {
        format!("{}{id}", self.config.key_prefix)
    }

    /// Extract session ID from request cookies
    fn session_id(&self, headers: &HeaderMap) -> Option<SessionId> {
        headers
            .get_all(COOKIE)
            .iter()
            .filter_map(|header| header.to_str().ok())
            .flat_map(|cookies| cookies.split(';'))
            .filter_map(|cookie| cookie.trim().split_once('='))
            .find(|(name, _)| name.trim() == self.config.cookie_name)
            .and_then(|(_, value)| SessionId::parse(value.trim()))
    }

    fn cookie(&self, session: &Session) -> Result<HeaderValue, SessionError> {
        let config = &self.config;

        let mut cookie = if session.is_invalidated() {
            format!("{}=; Path={}; Max-Age=0", config.cookie_name, config.cookie_path)
        } else {
            let mut cookie = format!("{}={}; Path={}", config.cookie_name, session.id(), config.cookie_path);
            if session.max_age_secs() > 0 {
                cookie.push_str(&format!("; Max-Age={}", session.max_age_secs()));
            }
            cookie
        };

        if let Some(domain) = &config.domain {
            cookie.push_str(&format!("; Domain={domain}"));
        }

        cookie.push_str(&format!("; SameSite={}", config.same_site.as_str()));

        if config.http_only {
            cookie.push_str("; HttpOnly");
        }

        if config.secure {
            cookie.push_str("; Secure");
        }

        HeaderValue::from_str(&cookie).map_err(|e| SessionError::Cookie(e.to_string()))
    }
}
