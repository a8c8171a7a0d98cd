//! PostgreSQL repositories backed by `sqlx`

use async_trait::async_trait;
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use super::{
    LinkRepository, RepositoryError, RepositoryResult, TransactionManager, UnitOfWork,
    UserRepository,
};
use crate::models::{Link, User};

/// Users table access
#[derive(Debug, Clone)]
pub struct PgUserRepository {
    pool: PgPool,
}

impl PgUserRepository {
    /// Wrap a connection pool
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserRepository for PgUserRepository {
    async fn get(&self, id: Uuid) -> RepositoryResult<User> {
        let user = sqlx::query_as::<_, User>(
            r"
            SELECT id, display_name, email, email_verified, avatar_url, preferred_language,
                   active, created_at, updated_at
            FROM users
            WHERE id = $1
            ",
        )
        .bind(id)
        .fetch_one(&self.pool)
        .await?;

        Ok(user)
    }

    async fn get_by_email(&self, email: &str) -> RepositoryResult<User> {
        let user = sqlx::query_as::<_, User>(
            r"
            SELECT id, display_name, email, email_verified, avatar_url, preferred_language,
                   active, created_at, updated_at
            FROM users
            WHERE email = $1
            ",
        )
        .bind(email)
        .fetch_one(&self.pool)
        .await?;

        Ok(user)
    }
}

/// Links table access
#[derive(Debug, Clone)]
pub struct PgLinkRepository {
    pool: PgPool,
}

impl PgLinkRepository {
    /// Wrap a connection pool
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl LinkRepository for PgLinkRepository {
    async fn get(&self, user_id: Uuid, issuer: &str) -> RepositoryResult<Link> {
        let link = sqlx::query_as::<_, Link>(
            r"
            SELECT user_id, issuer, external_id, access_token, refresh_token,
                   access_token_expires_at, refresh_token_expires_at, created_at, updated_at
            FROM links
            WHERE user_id = $1 AND issuer = $2
            ",
        )
        .bind(user_id)
        .bind(issuer)
        .fetch_one(&self.pool)
        .await?;

        Ok(link)
    }

    async fn update(&self, link: &Link) -> RepositoryResult<()> {
        let result = sqlx::query(
            r"
            UPDATE links
            SET access_token = $3,
                refresh_token = $4,
                access_token_expires_at = $5,
                refresh_token_expires_at = $6,
                updated_at = $7
            WHERE user_id = $1 AND issuer = $2
            ",
        )
        .bind(link.user_id)
        .bind(&link.issuer)
        .bind(&link.access_token)
        .bind(&link.refresh_token)
        .bind(link.access_token_expires_at)
        .bind(link.refresh_token_expires_at)
        .bind(link.updated_at)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }
}

/// Opens `sqlx` transactions on the pool
#[derive(Debug, Clone)]
pub struct PgTransactionManager {
    pool: PgPool,
}

impl PgTransactionManager {
    /// Wrap a connection pool
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TransactionManager for PgTransactionManager {
    async fn begin(&self) -> RepositoryResult<Box<dyn UnitOfWork>> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgUnitOfWork { tx: Some(tx) }))
    }
}

/// Open Postgres transaction
///
/// `sqlx` rolls the transaction back when it is dropped uncommitted.
struct PgUnitOfWork {
    tx: Option<Transaction<'static, Postgres>>,
}

impl PgUnitOfWork {
    fn tx(&mut self) -> RepositoryResult<&mut Transaction<'static, Postgres>> {
        self.tx.as_mut().ok_or(RepositoryError::TransactionClosed)
    }
}

#[async_trait]
impl UnitOfWork for PgUnitOfWork {
    async fn insert_user(&mut self, user: &User) -> RepositoryResult<()> {
        let tx = self.tx()?;
        sqlx::query(
            r"
            INSERT INTO users (id, display_name, email, email_verified, avatar_url,
                               preferred_language, active, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ",
        )
        .bind(user.id)
        .bind(&user.display_name)
        .bind(&user.email)
        .bind(user.email_verified)
        .bind(&user.avatar_url)
        .bind(&user.preferred_language)
        .bind(user.active)
        .bind(user.created_at)
        .bind(user.updated_at)
        .execute(&mut **tx)
        .await?;

        Ok(())
    }

    async fn insert_link(&mut self, link: &Link) -> RepositoryResult<()> {
        let tx = self.tx()?;
        sqlx::query(
            r"
            INSERT INTO links (user_id, issuer, external_id, access_token, refresh_token,
                               access_token_expires_at, refresh_token_expires_at,
                               created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ",
        )
        .bind(link.user_id)
        .bind(&link.issuer)
        .bind(&link.external_id)
        .bind(&link.access_token)
        .bind(&link.refresh_token)
        .bind(link.access_token_expires_at)
        .bind(link.refresh_token_expires_at)
        .bind(link.created_at)
        .bind(link.updated_at)
        .execute(&mut **tx)
        .await?;

        Ok(())
    }

    async fn commit(&mut self) -> RepositoryResult<()> {
        let tx = self.tx.take().ok_or(RepositoryError::TransactionClosed)?;
        tx.commit().await?;
        Ok(())
    }
}
