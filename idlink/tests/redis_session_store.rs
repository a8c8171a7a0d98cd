//! Session storage against Redis
//!
//! Run with a server available:
//! `IDLINK_TEST_REDIS_URL=redis://127.0.0.1:6379 cargo test -- --ignored`

use std::time::Duration;

use idlink::session::{RedisSessionStore, SessionStore};

fn store() -> RedisSessionStore {
    let url = std::env::var("IDLINK_TEST_REDIS_URL")
        .unwrap_or_else(|_| "redis://127.0.0.1:6379".to_string());
    let pool = deadpool_redis::Config::from_url(url)
        .create_pool(Some(deadpool_redis::Runtime::Tokio1))
        .unwrap();
    RedisSessionStore::new(pool)
}

fn key() -> String {
    format!("idlink_test:{}", uuid::Uuid::new_v4())
}

#[tokio::test]
#[ignore = "Requires Redis"]
async fn set_get_and_delete() {
    let store = store();
    let key = key();

    assert_eq!(store.load(&key).await.unwrap(), None);

    store.store(&key, "first", None).await.unwrap();
    store.store(&key, "second", None).await.unwrap();
    assert_eq!(store.load(&key).await.unwrap().as_deref(), Some("second"));

    store.delete(&key).await.unwrap();
    store.delete(&key).await.unwrap();
    assert_eq!(store.load(&key).await.unwrap(), None);
}

#[tokio::test]
#[ignore = "Requires Redis"]
async fn ttl_expires_the_entry() {
    let store = store();
    let key = key();

    store
        .store(&key, "value", Some(Duration::from_secs(1)))
        .await
        .unwrap();
    assert_eq!(store.load(&key).await.unwrap().as_deref(), Some("value"));

    tokio::time::sleep(Duration::from_millis(2_100)).await;
    assert_eq!(store.load(&key).await.unwrap(), None);
}

#[tokio::test]
#[ignore = "Requires Redis"]
async fn unreachable_server_is_a_store_error() {
    let pool = deadpool_redis::Config::from_url("redis://127.0.0.1:1")
        .create_pool(Some(deadpool_redis::Runtime::Tokio1))
        .unwrap();
    let store = RedisSessionStore::new(pool);

    assert!(store.load(&key()).await.is_err());
}
