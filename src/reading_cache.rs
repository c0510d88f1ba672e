use std::{collections::HashMap, sync::Arc};

use anyhow::{Context, Result};
use async_trait::async_trait;
use redis::{aio::ConnectionManager, AsyncCommands};
use tokio::sync::RwLock;
use tracing::info;

use crate::error::CacheError;

/// Key under which the latest reading of `device_id` is cached.
pub fn latest_key(device_id: &str) -> String {
    format!("latest:{device_id}")
}

/// Key-value capability backing the "latest reading per device" lookup.
///
/// Values are opaque serialized readings; `set` overwrites atomically per key.
#[async_trait]
pub trait LatestCache: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;

    async fn set(&self, key: &str, value: String) -> Result<(), CacheError>;
}

/// Opens the cache named by `url`.
///
/// `memory://` selects the in-process `ReadingCache`, which is only coherent
/// for a single service instance. Any other URL is handed to Redis.
pub async fn connect(url: &str) -> Result<Arc<dyn LatestCache>> {
    if url.starts_with("memory:") {
        info!("Using in-process latest-value cache");
        return Ok(Arc::new(ReadingCache::new()));
    }

    let cache = RedisCache::connect(url)
        .await
        .context("failed to connect to the latest-value cache")?;
    info!("Connected to Redis latest-value cache");
    Ok(Arc::new(cache))
}

/// Redis-backed `LatestCache` shared by every service instance.
///
/// `ConnectionManager` multiplexes one connection and reconnects on failure;
/// clones share it.
#[derive(Clone)]
pub struct RedisCache {
    conn: ConnectionManager,
}

impl RedisCache {
    pub async fn connect(url: &str) -> Result<Self, CacheError> {
        let client = redis::Client::open(url)?;
        let conn = ConnectionManager::new(client).await?;
        Ok(Self { conn })
    }
}

#[async_trait]
impl LatestCache for RedisCache {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let mut conn = self.conn.clone();
        let value: Option<String> = conn.get(key).await?;
        Ok(value)
    }

    async fn set(&self, key: &str, value: String) -> Result<(), CacheError> {
        let mut conn = self.conn.clone();
        conn.set::<_, _, ()>(key, value).await?;
        Ok(())
    }
}

/// In-memory `LatestCache` shared by every request in the process.
///
/// Wrapped in `Arc` so it can be cheaply cloned and shared across tasks.
/// Uses `tokio::sync::RwLock` so concurrent readers never block each other.
#[derive(Clone, Default)]
pub struct ReadingCache {
    inner: Arc<RwLock<HashMap<String, String>>>,
}

impl ReadingCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of cached entries.
    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }
}

#[async_trait]
impl LatestCache for ReadingCache {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        Ok(self.inner.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: String) -> Result<(), CacheError> {
        self.inner.write().await.insert(key.to_owned(), value);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn latest_key_is_prefixed() {
        assert_eq!(latest_key("dev-001"), "latest:dev-001");
    }

    #[tokio::test]
    async fn empty_cache_returns_nothing() {
        let cache = ReadingCache::new();
        assert_eq!(cache.len().await, 0);
        assert!(cache.get("latest:dev1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn set_and_get_single_entry() {
        let cache = ReadingCache::new();
        cache.set("latest:dev1", "{\"a\":1}".to_owned()).await.unwrap();

        let got = cache.get("latest:dev1").await.unwrap().unwrap();
        assert_eq!(got, "{\"a\":1}");
    }

    #[tokio::test]
    async fn set_overwrites_previous_value() {
        let cache = ReadingCache::new();
        cache.set("latest:dev1", "old".to_owned()).await.unwrap();
        cache.set("latest:dev1", "new".to_owned()).await.unwrap();

        assert_eq!(cache.get("latest:dev1").await.unwrap().as_deref(), Some("new"));
        assert_eq!(cache.len().await, 1);
    }

    #[tokio::test]
    async fn different_devices_are_separate_entries() {
        let cache = ReadingCache::new();
        cache.set(&latest_key("dev1"), "one".to_owned()).await.unwrap();
        cache.set(&latest_key("dev2"), "two".to_owned()).await.unwrap();

        assert_eq!(cache.len().await, 2);
        assert_eq!(cache.get("latest:dev1").await.unwrap().as_deref(), Some("one"));
        assert_eq!(cache.get("latest:dev2").await.unwrap().as_deref(), Some("two"));
    }

    #[tokio::test]
    async fn memory_url_selects_in_process_cache() {
        let cache = connect("memory://").await.unwrap();
        cache.set("latest:dev1", "x".to_owned()).await.unwrap();
        assert_eq!(cache.get("latest:dev1").await.unwrap().as_deref(), Some("x"));
    }

    #[tokio::test]
    async fn unsupported_url_is_rejected() {
        assert!(connect("ftp://cache.local").await.is_err());
        assert!(matches!(
            RedisCache::connect("not a url").await,
            Err(CacheError::Redis(_))
        ));
    }

    #[tokio::test]
    #[ignore = "requires a Redis server at REDIS_TEST_URL"]
    async fn redis_set_overwrites_and_is_shared_between_clients() {
        let url = std::env::var("REDIS_TEST_URL").unwrap_or_else(|_| "redis://127.0.0.1/".into());
        let a = RedisCache::connect(&url).await.unwrap();
        let b = RedisCache::connect(&url).await.unwrap();
        let key = latest_key(&format!("test-{}", uuid::Uuid::new_v4()));

        assert!(b.get(&key).await.unwrap().is_none());
        a.set(&key, "old".to_owned()).await.unwrap();
        a.set(&key, "new".to_owned()).await.unwrap();

        assert_eq!(b.get(&key).await.unwrap().as_deref(), Some("new"));
    }

    #[tokio::test]
    async fn clone_shares_state() {
        let cache = ReadingCache::new();
        let clone = cache.clone();

        cache.set("latest:dev1", "shared".to_owned()).await.unwrap();

        // Clone sees the same data
        assert_eq!(clone.get("latest:dev1").await.unwrap().as_deref(), Some("shared"));
    }
}
