//! Session storage backends

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use deadpool_redis::Pool as RedisPool;
use parking_lot::Mutex;

use super::SessionError;

/// Key/value store holding encoded session values
///
/// Writes to the same key are last-writer-wins.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Read the value under `key`, `None` if missing or expired
    async fn load(&self, key: &str) -> Result<Option<String>, SessionError>;

    /// Write `value` under `key`, expiring after `ttl` when given
    async fn store(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), SessionError>;

    /// Remove `key`; removing a missing key succeeds
    async fn delete(&self, key: &str) -> Result<(), SessionError>;
}

/// Redis-backed store using `GET`, `SET EX` and `DEL`
#[derive(Clone)]
pub struct RedisSessionStore {
    pool: RedisPool,
}

impl RedisSessionStore {
    /// Wrap a connection pool
    #[must_use]
    pub const fn new(pool: RedisPool) -> Self {
        Self { pool }
    }
}

impl std::fmt::Debug for RedisSessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisSessionStore")
            .field("pool", &"RedisPool")
            .finish()
    }
}

#[async_trait]
impl SessionStore for RedisSessionStore {
    async fn load(&self, key: &str) -> Result<Option<String>, SessionError> {
        let mut conn = self.pool.get().await?;
        let value: Option<String> = redis::cmd("GET").arg(key).query_async(&mut *conn).await?;
        Ok(value)
    }

    async fn store(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), SessionError> {
        let mut conn = self.pool.get().await?;
        let mut cmd = redis::cmd("SET");
        cmd.arg(key).arg(value);
        if let Some(ttl) = ttl {
            cmd.arg("EX").arg(ttl.as_secs().max(1));
        }
        let _: () = cmd.query_async(&mut *conn).await?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), SessionError> {
        let mut conn = self.pool.get().await?;
        let _: i64 = redis::cmd("DEL").arg(key).query_async(&mut *conn).await?;
        Ok(())
    }
}

/// In-process store with per-entry expiry, for development and tests
#[derive(Debug, Clone, Default)]
pub struct MemorySessionStore {
    entries: Arc<Mutex<HashMap<String, (String, Option<Instant>)>>>,
}

impl MemorySessionStore {
    /// Create an empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live entries
    #[must_use]
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.entries
            .lock()
            .values()
            .filter(|(_, expires)| expires.is_none_or(|at| at > now))
            .count()
    }

    /// Whether no live entry exists
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn load(&self, key: &str) -> Result<Option<String>, SessionError> {
        let mut entries = self.entries.lock();
        let expired = matches!(entries.get(key), Some((_, Some(expires))) if *expires <= Instant::now());
        if expired {
            entries.remove(key);
            return Ok(None);
        }
        Ok(entries.get(key).map(|(value, _)| value.clone()))
    }

    async fn store(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), SessionError> {
        let now = Instant::now();
        let expires = ttl.map(|ttl| now + ttl);
        let mut entries = self.entries.lock();
        entries.retain(|_, (_, at)| at.is_none_or(|at| at > now));
        entries.insert(key.to_string(), (value.to_string(), expires));
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), SessionError> {
        self.entries.lock().remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_store_roundtrip_and_delete() {
        let store = MemorySessionStore::new();
        store.store("session:a", "value", None).await.unwrap();

        assert_eq!(store.load("session:a").await.unwrap().as_deref(), Some("value"));
        assert_eq!(store.len(), 1);

        store.delete("session:a").await.unwrap();
        store.delete("session:a").await.unwrap();
        assert_eq!(store.load("session:a").await.unwrap(), None);
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_memory_store_expires_entries() {
        let store = MemorySessionStore::new();
        store
            .store("session:b", "value", Some(Duration::from_millis(20)))
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(40)).await;
        assert_eq!(store.load("session:b").await.unwrap(), None);
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_store_sweeps_abandoned_entries() {
        let store = MemorySessionStore::new();
        store
            .store("session:abandoned", "value", Some(Duration::from_millis(20)))
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(40)).await;
        store.store("session:fresh", "value", None).await.unwrap();

        let entries = store.entries.lock();
        assert_eq!(entries.len(), 1);
        assert!(entries.contains_key("session:fresh"));
    }

    #[tokio::test]
    async fn test_last_writer_wins() {
        let store = MemorySessionStore::new();
        store.store("session:c", "first", None).await.unwrap();
        store.store("session:c", "second", None).await.unwrap();

        assert_eq!(store.load("session:c").await.unwrap().as_deref(), Some("second"));
    }
}
