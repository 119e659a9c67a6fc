//! Time-bounded caches for market data lookups

use cached::{Cached, TimedCache};
use std::fmt::Debug;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

/// Cache key: which source was asked, about what
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    /// Upstream source ("yahoo-snapshot", "earnings-calendar")
    pub source: &'static str,
    /// Ticker or page the value was fetched for
    pub subject: String,
}

impl CacheKey {
    pub fn new(source: &'static str, subject: impl Into<String>) -> Self {
        Self {
            source,
            subject: subject.into(),
        }
    }
}

/// Thread-safe cache whose entries expire after a fixed lifespan
pub struct TtlCache<V> {
    cache: Arc<RwLock<TimedCache<CacheKey, V>>>,
}

impl<V: Clone> TtlCache<V> {
    pub fn new(ttl: Duration) -> Self {
        Self {
            cache: Arc::new(RwLock::new(TimedCache::with_lifespan(ttl))),
        }
    }

    pub async fn get(&self, key: &CacheKey) -> Option<V> {
        // TimedCache evicts expired entries on read, so a read needs the write lock
        let mut cache = self.cache.write().await;
        cache.cache_get(key).cloned()
    }

    pub async fn insert(&self, key: CacheKey, value: V) {
        let mut cache = self.cache.write().await;
        let _ = cache.cache_set(key, value);
    }

    /// Return the cached value or run `fetcher` and remember its success
    ///
    /// Errors are passed through and never cached.
    pub async fn get_or_fetch<F, Fut, E>(&self, key: CacheKey, fetcher: F) -> Result<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        if let Some(value) = self.get(&key).await {
            tracing::debug!(source = key.source, subject = %key.subject, "cache hit");
            return Ok(value);
        }

        tracing::debug!(source = key.source, subject = %key.subject, "cache miss");
        let value = fetcher().await?;
        self.insert(key, value.clone()).await;

        Ok(value)
    }

    pub async fn invalidate(&self, key: &CacheKey) {
        let mut cache = self.cache.write().await;
        let _ = cache.cache_remove(key);
    }

    pub async fn clear(&self) {
        let mut cache = self.cache.write().await;
        cache.cache_clear();
    }

    pub async fn len(&self) -> usize {
        let cache = self.cache.read().await;
        cache.cache_size()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

impl<V> Clone for TtlCache<V> {
    fn clone(&self) -> Self {
        Self {
            cache: Arc::clone(&self.cache),
        }
    }
}

impl<V> Debug for TtlCache<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TtlCache").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_cache_insert_and_get() {
        let cache = TtlCache::new(Duration::from_secs(60));
        let key = CacheKey::new("yahoo-quote", "TSM");

        cache.insert(key.clone(), 182.4_f64).await;

        assert_eq!(cache.get(&key).await, Some(182.4));
        assert_eq!(cache.get(&CacheKey::new("yahoo-quote", "AAPL")).await, None);
    }

    #[tokio::test]
    async fn test_cache_get_or_fetch() {
        let cache = TtlCache::new(Duration::from_secs(60));
        let key = CacheKey::new("earnings-calendar", "page");

        let mut calls = 0;
        let first = cache
            .get_or_fetch(key.clone(), || {
                calls += 1;
                async { Ok::<_, String>(vec!["TSMC".to_string()]) }
            })
            .await
            .unwrap();
        assert_eq!(first, vec!["TSMC"]);

        let second = cache
            .get_or_fetch(key, || {
                calls += 1;
                async { Ok::<_, String>(Vec::new()) }
            })
            .await
            .unwrap();
        assert_eq!(second, vec!["TSMC"]);
        assert_eq!(calls, 1);
    }

    #[tokio::test]
    async fn test_fetch_errors_are_not_cached() {
        let cache: TtlCache<u32> = TtlCache::new(Duration::from_secs(60));
        let key = CacheKey::new("yahoo-quote", "005930.KS");

        let failed = cache
            .get_or_fetch(key.clone(), || async { Err::<u32, _>("upstream down") })
            .await;
        assert!(failed.is_err());
        assert!(cache.is_empty().await);

        let ok = cache
            .get_or_fetch(key, || async { Ok::<_, &str>(7) })
            .await;
        assert_eq!(ok, Ok(7));
    }

    #[tokio::test]
    async fn test_cache_invalidate_and_clear() {
        let cache = TtlCache::new(Duration::from_secs(60));
        for symbol in ["TSM", "AAPL", "GOOGL"] {
            cache.insert(CacheKey::new("yahoo-quote", symbol), 1_u8).await;
        }
        assert_eq!(cache.len().await, 3);

        cache.invalidate(&CacheKey::new("yahoo-quote", "TSM")).await;
        assert_eq!(cache.len().await, 2);

        cache.clear().await;
        assert!(cache.is_empty().await);
    }

    #[tokio::test]
    async fn test_entries_expire() {
        let cache = TtlCache::new(Duration::from_millis(20));
        let key = CacheKey::new("yahoo-quote", "TSM");
        cache.insert(key.clone(), 1_u8).await;

        tokio::time::sleep(Duration::from_millis(40)).await;
        assert_eq!(cache.get(&key).await, None);
    }
}
