//! Identity resolution and onboarding
//!
//! Maps a verified external identity onto a local [`User`] and its [`Link`]
//! for the provider:
//!
//! | email known? | link for provider? | action                              |
//! |--------------|--------------------|-------------------------------------|
//! | no           | -                  | insert user + link in one unit      |
//! | yes          | no                 | insert link in one unit             |
//! | yes          | yes                | overwrite tokens on the stored link |
//!
//! Two first logins racing on the same email both miss the lookup; the
//! storage uniqueness constraints reject the loser, which re-reads once and
//! continues down the "email known" path.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::models::{Link, User};
use crate::oauth2::types::{ExternalIdentity, TokenSet};
use crate::repository::{
    with_transaction, LinkRepository, RepositoryError, TransactionManager, UserRepository,
};

/// Onboarding errors
#[derive(Debug, thiserror::Error)]
pub enum OnboardingError {
    /// No user with the requested id or email
    #[error("User not found")]
    UserNotFound,

    /// No link for the requested user and issuer
    #[error("Link not found")]
    LinkNotFound,

    /// Storage failure
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// Which branch an onboarding call took
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// New user and first link created
    CreatedUser,
    /// Existing user linked to a new provider
    LinkedProvider,
    /// Existing link received new tokens
    RefreshedLink,
}

/// Result of a successful onboarding
#[derive(Debug, Clone)]
pub struct Onboarded {
    /// Local user
    pub user: User,
    /// Link for the provider used to log in
    pub link: Link,
    /// Branch taken
    pub outcome: Outcome,
}

/// Sole writer of users and links
#[derive(Clone)]
pub struct OnboardingService {
    users: Arc<dyn UserRepository>,
    links: Arc<dyn LinkRepository>,
    transactions: Arc<dyn TransactionManager>,
}

impl OnboardingService {
    /// Create a service over the given repositories
    #[must_use]
    pub fn new(
        users: Arc<dyn UserRepository>,
        links: Arc<dyn LinkRepository>,
        transactions: Arc<dyn TransactionManager>,
    ) -> Self {
        Self {
            users,
            links,
            transactions,
        }
    }

    /// Fetch a user by id
    ///
    /// # Errors
    ///
    /// Returns [`OnboardingError::UserNotFound`] if the id does not resolve
    pub async fn get_user(&self, id: Uuid) -> Result<User, OnboardingError> {
        self.users.get(id).await.map_err(|e| match e {
            RepositoryError::NotFound => OnboardingError::UserNotFound,
            other => other.into(),
        })
    }

    /// Fetch a user by email
    ///
    /// # Errors
    ///
    /// Returns [`OnboardingError::UserNotFound`] if no user has this email
    pub async fn get_user_by_email(&self, email: &str) -> Result<User, OnboardingError> {
        self.users.get_by_email(email).await.map_err(|e| match e {
            RepositoryError::NotFound => OnboardingError::UserNotFound,
            other => other.into(),
        })
    }

    /// Resolve the identity to a user and link, creating or refreshing rows
    ///
    /// # Errors
    ///
    /// Returns [`OnboardingError::Repository`] if storage fails, including a
    /// second uniqueness conflict after the re-read
    pub async fn onboard(
        &self,
        provider: &str,
        tokens: &TokenSet,
        identity: &ExternalIdentity,
    ) -> Result<Onboarded, OnboardingError> {
        let onboarded = match self.resolve(provider, tokens, identity).await {
            Err(OnboardingError::Repository(RepositoryError::Conflict(constraint))) => {
                warn!(
                    provider,
                    constraint = %constraint,
                    "onboarding raced with another login, re-reading"
                );
                self.resolve(provider, tokens, identity).await?
            }
            other => other?,
        };

        info!(
            provider,
            user_id = %onboarded.user.id,
            outcome = ?onboarded.outcome,
            "identity onboarded"
        );
        Ok(onboarded)
    }

    async fn resolve(
        &self,
        provider: &str,
        tokens: &TokenSet,
        identity: &ExternalIdentity,
    ) -> Result<Onboarded, OnboardingError> {
        let now = Utc::now();

        let user = match self.get_user_by_email(&identity.email).await {
            Ok(user) => user,
            Err(OnboardingError::UserNotFound) => {
                let user = User::from_identity(identity, now);
                let link = Link::new(user.id, provider, &identity.subject, tokens, now);
                let (new_user, new_link) = (user.clone(), link.clone());

                with_transaction(self.transactions.as_ref(), move |unit| {
                    Box::pin(async move {
                        unit.insert_user(&new_user).await?;
                        unit.insert_link(&new_link).await
                    })
                })
                .await?;

                return Ok(Onboarded {
                    user,
                    link,
                    outcome: Outcome::CreatedUser,
                });
            }
            Err(e) => return Err(e),
        };

        match self.links.get(user.id, provider).await {
            Ok(mut link) => {
                if link.external_id != identity.subject {
                    warn!(
                        provider,
                        user_id = %user.id,
                        linked_subject = %link.external_id,
                        reported_subject = %identity.subject,
                        "provider subject differs from the linked one, keeping the link"
                    );
                }
                link.refresh(tokens, now);
                self.links.update(&link).await?;
                Ok(Onboarded {
                    user,
                    link,
                    outcome: Outcome::RefreshedLink,
                })
            }
            Err(RepositoryError::NotFound) => {
                let link = Link::new(user.id, provider, &identity.subject, tokens, now);
                let new_link = link.clone();

                with_transaction(self.transactions.as_ref(), move |unit| {
                    Box::pin(async move { unit.insert_link(&new_link).await })
                })
                .await?;

                Ok(Onboarded {
                    user,
                    link,
                    outcome: Outcome::LinkedProvider,
                })
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Overwrite the stored tokens of `(link.user_id, link.issuer)`
    ///
    /// Token fields and expiries are copied from `link`; `updated_at` is
    /// set to now.
    ///
    /// # Errors
    ///
    /// Returns [`OnboardingError::LinkNotFound`] if no such link exists
    pub async fn update_link(&self, link: &Link) -> Result<Link, OnboardingError> {
        let not_found = |e| match e {
            RepositoryError::NotFound => OnboardingError::LinkNotFound,
            other => OnboardingError::Repository(other),
        };

        let mut stored = self
            .links
            .get(link.user_id, &link.issuer)
            .await
            .map_err(not_found)?;

        stored.overwrite_tokens(link, Utc::now());
        self.links.update(&stored).await.map_err(not_found)?;

        debug!(user_id = %stored.user_id, issuer = %stored.issuer, "link tokens updated");
        Ok(stored)
    }

    /// Clear the tokens of `(user_id, issuer)` and expire them now
    ///
    /// # Errors
    ///
    /// Returns [`OnboardingError::LinkNotFound`] if no such link exists
    pub async fn revoke_link(&self, user_id: Uuid, issuer: &str) -> Result<Link, OnboardingError> {
        let revoked = self
            .update_link(&Link::revoked(user_id, issuer, Utc::now()))
            .await?;
        info!(user_id = %user_id, issuer, "link revoked");
        Ok(revoked)
    }
}

impl std::fmt::Debug for OnboardingService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OnboardingService").finish_non_exhaustive()
    }
}
