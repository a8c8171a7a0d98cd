//! Server-side sessions
//!
//! A session is an opaque UUID carried in a cookie plus a small, versioned
//! value bag kept in a [`SessionStore`] under `key_prefix + id`. The
//! [`SessionManager`] is the only component that reads or writes either.

pub mod manager;
pub mod store;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub use manager::SessionManager;
pub use store::{MemorySessionStore, RedisSessionStore, SessionStore};

/// Session cookie name
pub const SESSION_COOKIE_NAME: &str = "idlink_session";

/// Session errors
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The backing store could not be reached or rejected the command
    #[error("Session store error: {0}")]
    Store(String),

    /// The value bag could not be serialized
    #[error("Failed to encode session values: {0}")]
    Encode(#[from] serde_json::Error),

    /// The `Set-Cookie` value contains characters headers cannot carry
    #[error("Invalid session cookie: {0}")]
    Cookie(String),
}

impl From<redis::RedisError> for SessionError {
    fn from(err: redis::RedisError) -> Self {
        Self::Store(err.to_string())
    }
}

impl From<deadpool_redis::PoolError> for SessionError {
    fn from(err: deadpool_redis::PoolError) -> Self {
        Self::Store(err.to_string())
    }
}

/// Unique session identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(Uuid);

impl SessionId {
    /// Generate a new random session ID
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    /// Parse a cookie value, rejecting anything that is not a UUID
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        Uuid::parse_str(value).ok().map(Self)
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Values kept for a session
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionValues {
    /// Authenticated user
    #[serde(default)]
    pub user_id: Option<Uuid>,
    /// Provider that authenticated the session
    #[serde(default)]
    pub issuer: Option<String>,
    /// Last access token issued to the user
    #[serde(default)]
    pub access_token: Option<String>,
}

/// Stored representation, tagged with a schema version
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "v")]
enum StoredValues {
    #[serde(rename = "1")]
    V1(SessionValues),
}

impl SessionValues {
    /// Serialize as the current schema version
    ///
    /// # Errors
    ///
    /// Returns error if serialization fails
    pub fn encode(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(&StoredValues::V1(self.clone()))
    }

    /// Deserialize any known schema version
    ///
    /// # Errors
    ///
    /// Returns error for corrupt blobs and unknown versions
    pub fn decode(blob: &str) -> Result<Self, serde_json::Error> {
        let StoredValues::V1(values) = serde_json::from_str::<StoredValues>(blob)?;
        Ok(values)
    }
}

/// A loaded or freshly created session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    id: SessionId,
    values: SessionValues,
    is_new: bool,
    max_age_secs: i64,
}

impl Session {
    pub(crate) fn new(max_age_secs: i64) -> Self {
        Self {
            id: SessionId::generate(),
            values: SessionValues::default(),
            is_new: true,
            max_age_secs,
        }
    }

    pub(crate) const fn restored(id: SessionId, values: SessionValues, max_age_secs: i64) -> Self {
        Self {
            id,
            values,
            is_new: false,
            max_age_secs,
        }
    }

    /// Session identifier
    #[must_use]
    pub const fn id(&self) -> SessionId {
        self.id
    }

    /// Stored values
    #[must_use]
    pub const fn values(&self) -> &SessionValues {
        &self.values
    }

    /// Whether the session was created by this request
    #[must_use]
    pub const fn is_new(&self) -> bool {
        self.is_new
    }

    /// Lifetime in seconds; negative once invalidated
    #[must_use]
    pub const fn max_age_secs(&self) -> i64 {
        self.max_age_secs
    }

    /// Whether the session has been invalidated
    #[must_use]
    pub const fn is_invalidated(&self) -> bool {
        self.max_age_secs < 0
    }

    /// Record a successful login
    pub fn authenticate(&mut self, user_id: Uuid, issuer: &str, access_token: &str) {
        self.values = SessionValues {
            user_id: Some(user_id),
            issuer: Some(issuer.to_string()),
            access_token: Some(access_token.to_string()),
        };
    }

    /// User and issuer, if the session is authenticated
    #[must_use]
    pub fn principal(&self) -> Option<(Uuid, &str)> {
        match (&self.values.user_id, &self.values.issuer) {
            (Some(user_id), Some(issuer)) if !self.is_invalidated() => Some((*user_id, issuer.as_str())),
            _ => None,
        }
    }

    pub(crate) fn invalidate(&mut self) {
        self.max_age_secs = -1;
        self.values = SessionValues::default();
    }
}

/// Cookie `SameSite` policy
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SameSite {
    /// Strict same-site policy
    Strict,
    /// Lax same-site policy
    #[default]
    Lax,
    /// No same-site restriction (requires Secure)
    None,
}

impl SameSite {
    /// Convert to cookie attribute string
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Strict => "Strict",
            Self::Lax => "Lax",
            Self::None => "None",
        }
    }
}

/// Cookie and storage options for sessions
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Cookie name for the session ID
    pub cookie_name: String,
    /// Prefix of store keys
    pub key_prefix: String,
    /// Cookie path
    pub cookie_path: String,
    /// Cookie domain
    #[serde(skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
    /// Session TTL in seconds; 0 keeps the entry until deleted
    pub max_age_secs: i64,
    /// HTTP-only cookie
    pub http_only: bool,
    /// Secure cookie (HTTPS only)
    pub secure: bool,
    /// `SameSite` policy
    pub same_site: SameSite,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            cookie_name: SESSION_COOKIE_NAME.to_string(),
            key_prefix: "session:".to_string(),
            cookie_path: "/".to_string(),
            domain: None,
            max_age_secs: 86400, // 24 hours
            http_only: true,
            secure: !cfg!(debug_assertions),
            same_site: SameSite::Lax,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_values_are_versioned() {
        let values = SessionValues {
            user_id: Some(Uuid::nil()),
            issuer: Some("google".to_string()),
            access_token: None,
        };

        let blob = values.encode().unwrap();
        let json: serde_json::Value = serde_json::from_str(&blob).unwrap();
        assert_eq!(json["v"], "1");
        assert_eq!(json["issuer"], "google");
    }

    #[test]
    fn test_unknown_version_is_rejected() {
        assert!(SessionValues::decode(r#"{"v":"2","user_id":null}"#).is_err());
        assert!(SessionValues::decode("not json").is_err());
        assert!(SessionValues::decode(r#"{"user_id":null}"#).is_err());
    }

    #[test]
    fn test_session_id_parse() {
        let id = SessionId::generate();
        assert_eq!(SessionId::parse(&id.to_string()), Some(id));
        assert_eq!(SessionId::parse("../../etc/passwd"), None);
    }

    #[test]
    fn test_invalidated_session_has_no_principal() {
        let mut session = Session::new(3600);
        assert_eq!(session.principal(), None);

        let user_id = Uuid::new_v4();
        session.authenticate(user_id, "github", "token");
        assert_eq!(session.principal(), Some((user_id, "github")));

        session.invalidate();
        assert!(session.is_invalidated());
        assert_eq!(session.principal(), None);
    }

    #[test]
    fn test_session_config_default() {
        let config = SessionConfig::default();
        assert_eq!(config.cookie_name, SESSION_COOKIE_NAME);
        assert_eq!(config.key_prefix, "session:");
        assert!(config.http_only);
        assert_eq!(config.max_age_secs, 86400);
    }

    #[test]
    fn test_same_site_as_str() {
        assert_eq!(SameSite::Strict.as_str(), "Strict");
        assert_eq!(SameSite::Lax.as_str(), "Lax");
        assert_eq!(SameSite::None.as_str(), "None");
    }
}
