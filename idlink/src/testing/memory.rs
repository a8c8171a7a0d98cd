//! In-memory repositories
//!
//! [`MemoryStore`] implements every repository trait over shared tables and
//! enforces the same unique constraints as the migration, reporting them as
//! [`RepositoryError::Conflict`] with the constraint name. A link whose user
//! is missing is a [`RepositoryError::ForeignKey`]. Writes made
//! through a unit of work are buffered and applied atomically on commit.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use uuid::Uuid;

use crate::models::{Link, User};
use crate::repository::{
    LinkRepository, RepositoryError, RepositoryResult, TransactionManager, UnitOfWork,
    UserRepository,
};

#[derive(Debug, Default)]
struct Tables {
    users: HashMap<Uuid, User>,
    links: Vec<Link>,
}

impl Tables {
    fn check_user(&self, user: &User) -> RepositoryResult<()> {
        if self.users.contains_key(&user.id) {
            return Err(RepositoryError::Conflict("users_pkey".to_string()));
        }
        if self.users.values().any(|u| u.email == user.email) {
            return Err(RepositoryError::Conflict("users_email_key".to_string()));
        }
        Ok(())
    }

    fn check_link(&self, link: &Link) -> RepositoryResult<()> {
        if self
            .links
            .iter()
            .any(|l| l.user_id == link.user_id && l.issuer == link.issuer)
        {
            return Err(RepositoryError::Conflict("links_user_id_issuer_key".to_string()));
        }
        if self
            .links
            .iter()
            .any(|l| l.issuer == link.issuer && l.external_id == link.external_id)
        {
            return Err(RepositoryError::Conflict("links_issuer_external_id_key".to_string()));
        }
        Ok(())
    }
}

/// Shared in-memory users and links tables
///
/// Clones share the same tables.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    tables: Arc<Mutex<Tables>>,
}

impl MemoryStore {
    /// Create empty tables
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored users
    #[must_use]
    pub fn user_count(&self) -> usize {
        self.tables.lock().users.len()
    }

    /// Number of stored links
    #[must_use]
    pub fn link_count(&self) -> usize {
        self.tables.lock().links.len()
    }

    /// Stored link of `user_id` for `issuer`
    #[must_use]
    pub fn link(&self, user_id: Uuid, issuer: &str) -> Option<Link> {
        self.tables
            .lock()
            .links
            .iter()
            .find(|l| l.user_id == user_id && l.issuer == issuer)
            .cloned()
    }

    /// Every stored user
    #[must_use]
    pub fn users(&self) -> Vec<User> {
        self.tables.lock().users.values().cloned().collect()
    }

    /// Delete a user and its links, as an operator would
    pub fn remove_user(&self, id: Uuid) {
        let mut tables = self.tables.lock();
        tables.users.remove(&id);
        tables.links.retain(|l| l.user_id != id);
    }
}

#[async_trait]
impl UserRepository for MemoryStore {
    async fn get(&self, id: Uuid) -> RepositoryResult<User> {
        self.tables
            .lock()
            .users
            .get(&id)
            .cloned()
            .ok_or(RepositoryError::NotFound)
    }

    async fn get_by_email(&self, email: &str) -> RepositoryResult<User> {
        let found = self
            .tables
            .lock()
            .users
            .values()
            .find(|u| u.email == email)
            .cloned();

        // Let concurrent logins interleave between the read and the write
        tokio::task::yield_now().await;

        found.ok_or(RepositoryError::NotFound)
    }
}

#[async_trait]
impl LinkRepository for MemoryStore {
    async fn get(&self, user_id: Uuid, issuer: &str) -> RepositoryResult<Link> {
        self.link(user_id, issuer).ok_or(RepositoryError::NotFound)
    }

    async fn update(&self, link: &Link) -> RepositoryResult<()> {
        let mut tables = self.tables.lock();
        let stored = tables
            .links
            .iter_mut()
            .find(|l| l.user_id == link.user_id && l.issuer == link.issuer)
            .ok_or(RepositoryError::NotFound)?;

        stored.access_token.clone_from(&link.access_token);
        stored.refresh_token.clone_from(&link.refresh_token);
        stored.access_token_expires_at = link.access_token_expires_at;
        stored.refresh_token_expires_at = link.refresh_token_expires_at;
        stored.updated_at = link.updated_at;
        Ok(())
    }
}

#[async_trait]
impl TransactionManager for MemoryStore {
    async fn begin(&self) -> RepositoryResult<Box<dyn UnitOfWork>> {
        Ok(Box::new(MemoryUnitOfWork {
            tables: Arc::clone(&self.tables),
            users: Vec::new(),
            links: Vec::new(),
            finished: false,
        }))
    }
}

struct MemoryUnitOfWork {
    tables: Arc<Mutex<Tables>>,
    users: Vec<User>,
    links: Vec<Link>,
    finished: bool,
}

impl MemoryUnitOfWork {
    const fn ensure_open(&self) -> RepositoryResult<()> {
        if self.finished {
            return Err(RepositoryError::TransactionClosed);
        }
        Ok(())
    }
}

#[async_trait]
impl UnitOfWork for MemoryUnitOfWork {
    async fn insert_user(&mut self, user: &User) -> RepositoryResult<()> {
        self.ensure_open()?;
        self.users.push(user.clone());
        Ok(())
    }

    async fn insert_link(&mut self, link: &Link) -> RepositoryResult<()> {
        self.ensure_open()?;
        self.links.push(link.clone());
        Ok(())
    }

    async fn commit(&mut self) -> RepositoryResult<()> {
        self.ensure_open()?;
        self.finished = true;

        let mut tables = self.tables.lock();

        // Apply to a scratch copy so a conflict leaves the tables untouched
        let mut staged = Tables {
            users: tables.users.clone(),
            links: tables.links.clone(),
        };

        for user in self.users.drain(..) {
            staged.check_user(&user)?;
            staged.users.insert(user.id, user);
        }

        for link in self.links.drain(..) {
            if !staged.users.contains_key(&link.user_id) {
                return Err(RepositoryError::ForeignKey("fk_links_user".to_string()));
            }
            staged.check_link(&link)?;
            staged.links.push(link);
        }

        *tables = staged;
        Ok(())
    }
}
