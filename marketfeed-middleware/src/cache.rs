//! Two-tier cache layer (spec.md §2 / §4.9), generalized from
//! `borsa_middleware::cache`'s per-capability `moka::future::Cache` wrapper
//! down to a single keyed blob cache: coarse strings (stock history
//! summaries, fundamentals reports) are cached in-process with a TTL, while
//! structured quotes and basics always read through to the Document Store
//! Gateway and are never copied here.

use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
#[cfg(feature = "tracing")]
use tracing::debug;

use marketfeed_types::PlatformError;

/// Default TTL for cached report blobs when no override is configured
/// (spec.md §8's `US_DATA_CACHE_HOURS` env var feeds this).
pub const DEFAULT_TTL: Duration = Duration::from_secs(6 * 3600);

/// Keyed in-process cache for coarse report blobs. Quotes and basics never
/// pass through here; callers read those from the Document Store Gateway
/// directly (spec.md §4.9's pass-through tier).
pub struct CacheLayer {
    blobs: Cache<String, Arc<str>>,
}

impl CacheLayer {
    /// Build a cache holding up to `max_capacity` entries, each expiring
    /// `ttl` after insertion.
    #[must_use]
    pub fn new(max_capacity: u64, ttl: Duration) -> Self {
        Self {
            blobs: Cache::builder().max_capacity(max_capacity).time_to_live(ttl).build(),
        }
    }

    /// A cache sized for a single process's worth of fundamentals/history
    /// report blobs, using [`DEFAULT_TTL`].
    #[must_use]
    pub fn with_defaults() -> Self {
        Self::new(10_000, DEFAULT_TTL)
    }

    /// Return the cached blob for `key`, or call `fetch` to produce and
    /// cache it. `fetch` only runs on a cache miss.
    pub async fn get_or_fetch<F, Fut>(&self, key: impl Into<String>, fetch: F) -> Result<Arc<str>, PlatformError>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = Result<String, PlatformError>>,
    {
        let key = key.into();
        if let Some(hit) = self.blobs.get(&key).await {
            #[cfg(feature = "tracing")]
            debug!(%key, "cache hit");
            return Ok(hit);
        }
        let value: Arc<str> = Arc::from(fetch().await?);
        self.blobs.insert(key, Arc::clone(&value)).await;
        Ok(value)
    }

    /// Drop a single cached entry, e.g. after a sync rewrites the
    /// underlying document.
    pub async fn invalidate(&self, key: &str) {
        self.blobs.invalidate(key).await;
    }

    /// Number of entries currently resident (approximate: moka evicts and
    /// syncs this count lazily).
    #[must_use]
    pub fn entry_count(&self) -> u64 {
        self.blobs.entry_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn miss_then_hit_calls_fetch_once() {
        let cache = CacheLayer::new(100, Duration::from_secs(60));
        let calls = AtomicUsize::new(0);

        let first = cache
            .get_or_fetch("600519.SH:history", || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok("report-v1".to_string())
            })
            .await
            .unwrap();
        assert_eq!(&*first, "report-v1");

        let second = cache
            .get_or_fetch("600519.SH:history", || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok("report-v2".to_string())
            })
            .await
            .unwrap();
        assert_eq!(&*second, "report-v1");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn fetch_failure_is_not_cached() {
        let cache = CacheLayer::new(100, Duration::from_secs(60));
        let result = cache
            .get_or_fetch("AAPL:history", || async {
                Err(PlatformError::empty("history"))
            })
            .await;
        assert!(result.is_err());

        let ok = cache
            .get_or_fetch("AAPL:history", || async { Ok("recovered".to_string()) })
            .await
            .unwrap();
        assert_eq!(&*ok, "recovered");
    }

    #[tokio::test]
    async fn invalidate_forces_a_refetch() {
        let cache = CacheLayer::new(100, Duration::from_secs(60));
        cache.get_or_fetch("k", || async { Ok("v1".to_string()) }).await.unwrap();
        cache.invalidate("k").await;
        let v = cache.get_or_fetch("k", || async { Ok("v2".to_string()) }).await.unwrap();
        assert_eq!(&*v, "v2");
    }
}
