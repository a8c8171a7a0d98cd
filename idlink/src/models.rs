//! Local account records
//!
//! [`User`] is the local account; [`Link`] binds one external provider
//! identity to it. Both map 1:1 onto the `users` and `links` tables.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::oauth2::types::{ExternalIdentity, TokenSet};

/// Local user account
///
/// `email` is unique across users and `id` never changes once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct User {
    /// Opaque identifier (UUID v4)
    pub id: Uuid,
    /// Display name
    pub display_name: String,
    /// Email address
    pub email: String,
    /// Whether the email was verified by the provider that created the account
    pub email_verified: bool,
    /// Avatar URL
    pub avatar_url: Option<String>,
    /// Preferred language (BCP 47 tag)
    pub preferred_language: Option<String>,
    /// Whether the account is active
    pub active: bool,
    /// When the account was created
    pub created_at: DateTime<Utc>,
    /// When the account was last updated
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// New active account populated from a provider identity
    #[must_use]
    pub fn from_identity(identity: &ExternalIdentity, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            display_name: identity.display_name.clone(),
            email: identity.email.clone(),
            email_verified: identity.email_verified,
            avatar_url: identity.avatar_url.clone(),
            preferred_language: identity.locale.clone(),
            active: true,
            created_at: now,
            updated_at: now,
        }
    }
}

/// External identity bound to a user
///
/// `(issuer, external_id)` and `(user_id, issuer)` are both unique. Tokens
/// and their expiries never leave the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Link {
    /// Owning user
    pub user_id: Uuid,
    /// Provider name (`"google"`, `"github"`)
    pub issuer: String,
    /// Provider subject identifier
    pub external_id: String,
    /// Current access token, empty once revoked
    #[serde(skip)]
    pub access_token: String,
    /// Current refresh token, empty once revoked or never issued
    #[serde(skip)]
    pub refresh_token: String,
    /// Access token expiry
    #[serde(skip)]
    pub access_token_expires_at: DateTime<Utc>,
    /// Refresh token expiry
    #[serde(skip)]
    pub refresh_token_expires_at: DateTime<Utc>,
    /// When the link was created
    pub created_at: DateTime<Utc>,
    /// When the link was last updated
    pub updated_at: DateTime<Utc>,
}

impl Link {
    /// New link for `user_id` holding freshly issued tokens
    #[must_use]
    pub fn new(
        user_id: Uuid,
        issuer: &str,
        external_id: &str,
        tokens: &TokenSet,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            user_id,
            issuer: issuer.to_string(),
            external_id: external_id.to_string(),
            access_token: tokens.access_token.clone(),
            refresh_token: tokens.refresh_token.clone().unwrap_or_default(),
            access_token_expires_at: tokens.access_token_expires_at,
            refresh_token_expires_at: tokens.refresh_token_expires_at,
            created_at: now,
            updated_at: now,
        }
    }

    /// Soft-revoked token state for `(user_id, issuer)`
    ///
    /// Only the key and token fields are meaningful; it is meant to be passed
    /// to an update that copies tokens onto the stored row.
    #[must_use]
    pub fn revoked(user_id: Uuid, issuer: &str, now: DateTime<Utc>) -> Self {
        Self {
            user_id,
            issuer: issuer.to_string(),
            external_id: String::new(),
            access_token: String::new(),
            refresh_token: String::new(),
            access_token_expires_at: now,
            refresh_token_expires_at: now,
            created_at: now,
            updated_at: now,
        }
    }

    /// Store tokens from a new login
    ///
    /// A provider that issues no refresh token on re-consent leaves the
    /// previous refresh token and its expiry in place.
    pub fn refresh(&mut self, tokens: &TokenSet, now: DateTime<Utc>) {
        self.access_token.clone_from(&tokens.access_token);
        self.access_token_expires_at = tokens.access_token_expires_at;
        if let Some(refresh_token) = &tokens.refresh_token {
            self.refresh_token.clone_from(refresh_token);
            self.refresh_token_expires_at = tokens.refresh_token_expires_at;
        }
        self.updated_at = now;
    }

    /// Copy token fields from `other`, keeping identity and creation time
    pub fn overwrite_tokens(&mut self, other: &Self, now: DateTime<Utc>) {
        self.access_token.clone_from(&other.access_token);
        self.refresh_token.clone_from(&other.refresh_token);
        self.access_token_expires_at = other.access_token_expires_at;
        self.refresh_token_expires_at = other.refresh_token_expires_at;
        self.updated_at = now;
    }

    /// Whether the link currently holds no tokens
    #[must_use]
    pub fn is_revoked(&self) -> bool {
        self.access_token.is_empty() && self.refresh_token.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oauth2::types::TokenLifetimes;
    use chrono::Duration;

    fn identity() -> ExternalIdentity {
        ExternalIdentity {
            subject: "sub-1".to_string(),
            display_name: "Ada Lovelace".to_string(),
            email: "ada@example.com".to_string(),
            email_verified: true,
            avatar_url: Some("https://example.com/ada.png".to_string()),
            locale: Some("en".to_string()),
        }
    }

    fn tokens(access: &str, refresh: Option<&str>, now: DateTime<Utc>) -> TokenSet {
        TokenSet::anchored(
            now,
            access.to_string(),
            refresh.map(str::to_string),
            None,
            None,
            TokenLifetimes::default(),
        )
    }

    #[test]
    fn test_user_from_identity() {
        let now = Utc::now();
        let user = User::from_identity(&identity(), now);

        assert_eq!(user.id.get_version_num(), 4);
        assert_eq!(user.email, "ada@example.com");
        assert_eq!(user.preferred_language.as_deref(), Some("en"));
        assert!(user.active);
        assert_eq!(user.created_at, now);
    }

    #[test]
    fn test_link_serialization_hides_tokens() {
        let now = Utc::now();
        let link = Link::new(Uuid::new_v4(), "google", "sub-1", &tokens("secret-access", Some("secret-refresh"), now), now);

        let json = serde_json::to_value(&link).unwrap();
        assert_eq!(json["issuer"], "google");
        assert_eq!(json["externalId"], "sub-1");
        assert!(json.get("accessToken").is_none());
        assert!(json.get("refreshToken").is_none());
        assert!(json.get("accessTokenExpiresAt").is_none());
        assert!(!json.to_string().contains("secret"));
    }

    #[test]
    fn test_refresh_keeps_refresh_token_when_none_issued() {
        let issued = Utc::now() - Duration::days(1);
        let mut link = Link::new(Uuid::new_v4(), "google", "sub-1", &tokens("a1", Some("r1"), issued), issued);
        let original_refresh_expiry = link.refresh_token_expires_at;

        let now = Utc::now();
        link.refresh(&tokens("a2", None, now), now);

        assert_eq!(link.access_token, "a2");
        assert_eq!(link.refresh_token, "r1");
        assert_eq!(link.refresh_token_expires_at, original_refresh_expiry);
        assert_eq!(link.updated_at, now);
        assert_eq!(link.created_at, issued);
    }

    #[test]
    fn test_revoked_link() {
        let now = Utc::now();
        let mut link = Link::new(Uuid::new_v4(), "github", "77", &tokens("a", Some("r"), now), now);
        let revoked = Link::revoked(link.user_id, "github", now);

        link.overwrite_tokens(&revoked, now);
        assert!(link.is_revoked());
        assert_eq!(link.external_id, "77");
        assert_eq!(link.access_token_expires_at, now);
        assert_eq!(link.refresh_token_expires_at, now);
    }
}
