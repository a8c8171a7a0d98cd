//! Persistence seams for users and links
//!
//! Reads go through [`UserRepository`] and [`LinkRepository`]; writes that
//! must land together go through a [`UnitOfWork`] obtained from a
//! [`TransactionManager`]. A unit of work that is dropped without
//! [`UnitOfWork::commit`] rolls back.
//!
//! [`postgres`] holds the `sqlx` implementations; in-memory ones for tests
//! live in [`crate::testing`].

pub mod postgres;

use async_trait::async_trait;
use futures_util::future::BoxFuture;
use uuid::Uuid;

use crate::models::{Link, User};

pub use postgres::{PgLinkRepository, PgTransactionManager, PgUserRepository};

/// Repository errors
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    /// No matching row
    #[error("Record not found")]
    NotFound,

    /// A unique constraint rejected the write
    #[error("Unique constraint violated: {0}")]
    Conflict(String),

    /// A row references a parent that does not exist
    #[error("Foreign key violated: {0}")]
    ForeignKey(String),

    /// Commit or write attempted on a finished unit of work
    #[error("Transaction already finished")]
    TransactionClosed,

    /// Any other database failure
    #[error("Database error: {0}")]
    Database(sqlx::Error),
}

impl From<sqlx::Error> for RepositoryError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => Self::NotFound,
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                Self::Conflict(db.constraint().unwrap_or("unique").to_string())
            }
            sqlx::Error::Database(db) if db.is_foreign_key_violation() => {
                Self::ForeignKey(db.constraint().unwrap_or("foreign_key").to_string())
            }
            other => Self::Database(other),
        }
    }
}

/// Result alias for repository calls
pub type RepositoryResult<T> = Result<T, RepositoryError>;

/// Read access to users
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Fetch a user by id
    async fn get(&self, id: Uuid) -> RepositoryResult<User>;

    /// Fetch a user by email (exact match)
    async fn get_by_email(&self, email: &str) -> RepositoryResult<User>;
}

/// Read and update access to links
#[async_trait]
pub trait LinkRepository: Send + Sync {
    /// Fetch the link of `user_id` for `issuer`
    async fn get(&self, user_id: Uuid, issuer: &str) -> RepositoryResult<Link>;

    /// Persist token fields and `updated_at` of an existing link
    async fn update(&self, link: &Link) -> RepositoryResult<()>;
}

/// Starts units of work
#[async_trait]
pub trait TransactionManager: Send + Sync {
    /// Open a new transaction
    async fn begin(&self) -> RepositoryResult<Box<dyn UnitOfWork>>;
}

/// Writes that commit or roll back together
#[async_trait]
pub trait UnitOfWork: Send {
    /// Insert a user
    async fn insert_user(&mut self, user: &User) -> RepositoryResult<()>;

    /// Insert a link
    async fn insert_link(&mut self, link: &Link) -> RepositoryResult<()>;

    /// Make every write visible
    async fn commit(&mut self) -> RepositoryResult<()>;
}

/// Run `work` inside a unit of work, committing only if it succeeds
///
/// On error the unit of work is dropped, which rolls it back.
///
/// # Errors
///
/// Returns the error of `begin`, `work` or `commit`
pub async fn with_transaction<T, F>(manager: &dyn TransactionManager, work: F) -> RepositoryResult<T>
where
    T: Send,
    F: for<'t> FnOnce(&'t mut dyn UnitOfWork) -> BoxFuture<'t, RepositoryResult<T>> + Send,
{
    let mut unit = manager.begin().await?;
    let value = work(unit.as_mut()).await?;
    unit.commit().await?;
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MemoryStore;
    use chrono::Utc;

    fn user(email: &str) -> User {
        let now = Utc::now();
        User {
            id: Uuid::new_v4(),
            display_name: "Test".to_string(),
            email: email.to_string(),
            email_verified: false,
            avatar_url: None,
            preferred_language: None,
            active: true,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn test_commit_makes_writes_visible() {
        let store = MemoryStore::new();
        let u = user("ada@example.com");
        let inserted = u.clone();

        with_transaction(&store, move |unit| {
            Box::pin(async move { unit.insert_user(&inserted).await })
        })
        .await
        .unwrap();

        assert_eq!(store.get_by_email("ada@example.com").await.unwrap(), u);
    }

    #[tokio::test]
    async fn test_failed_work_rolls_back() {
        let store = MemoryStore::new();
        let u = user("ada@example.com");

        let result: RepositoryResult<()> = with_transaction(&store, move |unit| {
            Box::pin(async move {
                unit.insert_user(&u).await?;
                Err(RepositoryError::Conflict("links_issuer_external_id_key".to_string()))
            })
        })
        .await;

        assert!(matches!(result, Err(RepositoryError::Conflict(_))));
        assert!(matches!(
            store.get_by_email("ada@example.com").await,
            Err(RepositoryError::NotFound)
        ));
    }

    #[test]
    fn test_row_not_found_maps_to_not_found() {
        assert!(matches!(
            RepositoryError::from(sqlx::Error::RowNotFound),
            RepositoryError::NotFound
        ));
    }
}
