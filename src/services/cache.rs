//! Key/value cache with TTL, used for dashboard aggregates and book details

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};

use crate::error::AppResult;

/// Storage backend for cached values
#[async_trait]
pub trait Cache: Send + Sync {
    async fn get(&self, key: &str) -> AppResult<Option<String>>;
    async fn set(&self, key: &str, value: &str, ttl_seconds: u64) -> AppResult<()>;
    async fn delete(&self, keys: &[String]) -> AppResult<()>;
}

/// Process-local cache
#[derive(Default)]
pub struct MemoryCache {
    entries: Mutex<HashMap<String, (String, Instant)>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Cache for MemoryCache {
    async fn get(&self, key: &str) -> AppResult<Option<String>> {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        match entries.get(key) {
            Some((value, expires_at)) if *expires_at > Instant::now() => Ok(Some(value.clone())),
            Some(_) => {
                entries.remove(key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: &str, ttl_seconds: u64) -> AppResult<()> {
        let expires_at = Instant::now() + Duration::from_secs(ttl_seconds);
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(key.to_string(), (value.to_string(), expires_at));
        Ok(())
    }

    async fn delete(&self, keys: &[String]) -> AppResult<()> {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        for key in keys {
            entries.remove(key);
        }
        Ok(())
    }
}

/// Cache keys
pub mod keys {
    pub const DASHBOARD: &str = "stats:dashboard";
    pub const LOAN_STATISTICS: &str = "stats:loans";
    pub const USER_STATISTICS: &str = "stats:users";

    pub fn book(id: i32) -> String {
        format!("book:{}", id)
    }

    pub fn statistics() -> Vec<String> {
        vec![
            DASHBOARD.to_string(),
            LOAN_STATISTICS.to_string(),
            USER_STATISTICS.to_string(),
        ]
    }

    /// Everything a write touching `book_id` makes stale
    pub fn for_book(book_id: i32) -> Vec<String> {
        let mut keys = statistics();
        keys.push(book(book_id));
        keys
    }
}

/// JSON cache over a backend. Backend failures are logged and treated as misses.
#[derive(Clone)]
pub struct CacheService {
    backend: Arc<dyn Cache>,
    ttl_seconds: u64,
}

impl CacheService {
    pub fn new(backend: Arc<dyn Cache>, ttl_seconds: u64) -> Self {
        Self { backend, ttl_seconds }
    }

    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        match self.backend.get(key).await {
            Ok(Some(raw)) => match serde_json::from_str(&raw) {
                Ok(value) => Some(value),
                Err(e) => {
                    tracing::warn!("Discarding unreadable cache entry {}: {}", key, e);
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                tracing::warn!("Cache read failed for {}: {}", key, e);
                None
            }
        }
    }

    pub async fn put<T: Serialize>(&self, key: &str, value: &T) {
        let raw = match serde_json::to_string(value) {
            Ok(raw) => raw,
            Err(e) => {
                tracing::warn!("Failed to serialize cache entry {}: {}", key, e);
                return;
            }
        };
        if let Err(e) = self.backend.set(key, &raw, self.ttl_seconds).await {
            tracing::warn!("Cache write failed for {}: {}", key, e);
        }
    }

    pub async fn invalidate(&self, keys: &[String]) {
        if let Err(e) = self.backend.delete(keys).await {
            tracing::warn!("Cache invalidation failed for {:?}: {}", keys, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;

    struct BrokenCache;

    #[async_trait]
    impl Cache for BrokenCache {
        async fn get(&self, _key: &str) -> AppResult<Option<String>> {
            Err(AppError::Internal("connection refused".into()))
        }
        async fn set(&self, _key: &str, _value: &str, _ttl: u64) -> AppResult<()> {
            Err(AppError::Internal("connection refused".into()))
        }
        async fn delete(&self, _keys: &[String]) -> AppResult<()> {
            Err(AppError::Internal("connection refused".into()))
        }
    }

    #[tokio::test]
    async fn test_put_get_invalidate() {
        let cache = CacheService::new(Arc::new(MemoryCache::new()), 60);
        cache.put("answer", &42_i64).await;
        assert_eq!(cache.get::<i64>("answer").await, Some(42));

        cache.invalidate(&["answer".to_string()]).await;
        assert_eq!(cache.get::<i64>("answer").await, None);
    }

    #[tokio::test]
    async fn test_expired_entry_is_a_miss() {
        let cache = CacheService::new(Arc::new(MemoryCache::new()), 0);
        cache.put("short", &"lived").await;
        assert_eq!(cache.get::<String>("short").await, None);
    }

    #[tokio::test]
    async fn test_backend_failures_degrade_to_miss() {
        let cache = CacheService::new(Arc::new(BrokenCache), 60);
        cache.put("k", &1_i32).await;
        assert_eq!(cache.get::<i32>("k").await, None);
        cache.invalidate(&keys::statistics()).await;
    }

    #[test]
    fn test_book_keys_include_statistics() {
        let keys = keys::for_book(9);
        assert!(keys.contains(&"book:9".to_string()));
        assert!(keys.contains(&keys::DASHBOARD.to_string()));
    }
}
