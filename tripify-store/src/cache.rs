//! Cache-aside helper: in-process TTL map in front of an optional shared
//! Redis tier. No negative caching, no stampede protection; concurrent
//! misses for one key may each invoke the compute closure, which is fine
//! because the computed fetches are idempotent reads.

use std::collections::HashMap;
use std::future::Future;
use std::time::{Duration, Instant};

use anyhow::Result;
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::debug;

struct Entry {
    value: Value,
    expires_at: Instant,
}

/// In-process TTL cache. Entries expire lazily on read; an entry older than
/// its time-to-live is treated as absent.
#[derive(Default)]
pub struct LocalCache {
    inner: RwLock<HashMap<String, Entry>>,
}

impl LocalCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, key: &str) -> Option<Value> {
        // Write lock so expired entries can be evicted in place.
        let mut guard = self.inner.write().await;
        match guard.get(key) {
            Some(entry) if Instant::now() < entry.expires_at => Some(entry.value.clone()),
            Some(_) => {
                guard.remove(key);
                None
            }
            None => None,
        }
    }

    pub async fn set(&self, key: &str, value: Value, ttl: Duration) {
        let entry = Entry {
            value,
            expires_at: Instant::now() + ttl,
        };
        self.inner.write().await.insert(key.to_string(), entry);
    }

    pub async fn remove(&self, key: &str) {
        self.inner.write().await.remove(key);
    }
}

/// Local tier plus optional shared Redis tier. Redis errors propagate to the
/// caller; a missing Redis configuration simply skips that tier.
pub struct TieredCache {
    local: LocalCache,
    redis: Option<crate::RedisClient>,
}

impl TieredCache {
    pub fn new(redis: Option<crate::RedisClient>) -> Self {
        Self {
            local: LocalCache::new(),
            redis,
        }
    }

    /// `getOrCompute(key, ttl, computeFn)`: local tier, then shared tier,
    /// then compute and populate both. Compute failure propagates uncached.
    pub async fn get_or_compute<F, Fut>(&self, key: &str, ttl: Duration, compute: F) -> Result<Value>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Value>>,
    {
        if let Some(value) = self.local.get(key).await {
            debug!(key, tier = "local", "cache hit");
            return Ok(value);
        }

        if let Some(redis) = &self.redis {
            if let Some(raw) = redis.get_value(key).await? {
                let value: Value = serde_json::from_str(&raw)?;
                debug!(key, tier = "shared", "cache hit");
                self.local.set(key, value.clone(), ttl).await;
                return Ok(value);
            }
        }

        debug!(key, "cache miss");
        let value = compute().await?;

        self.local.set(key, value.clone(), ttl).await;
        if let Some(redis) = &self.redis {
            redis
                .set_value(key, &value.to_string(), ttl.as_secs().max(1))
                .await?;
        }

        Ok(value)
    }

    /// Write-through to both tiers, for callers that already hold the value.
    pub async fn put(&self, key: &str, value: Value, ttl: Duration) -> Result<()> {
        self.local.set(key, value.clone(), ttl).await;
        if let Some(redis) = &self.redis {
            redis
                .set_value(key, &value.to_string(), ttl.as_secs().max(1))
                .await?;
        }
        Ok(())
    }

    /// Drop a key from both tiers, e.g. after a mutation.
    pub async fn invalidate(&self, key: &str) -> Result<()> {
        self.local.remove(key).await;
        if let Some(redis) = &self.redis {
            redis.del_value(key).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn compute_runs_once_within_ttl() {
        let cache = TieredCache::new(None);
        let calls = AtomicUsize::new(0);

        for _ in 0..3 {
            let value = cache
                .get_or_compute("weather:paris", Duration::from_secs(60), || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(json!({"temperature": 22}))
                })
                .await
                .unwrap();
            assert_eq!(value["temperature"], 22);
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn expiry_triggers_exactly_one_refetch() {
        let cache = TieredCache::new(None);
        let calls = AtomicUsize::new(0);
        let compute = || {
            calls.fetch_add(1, Ordering::SeqCst);
            json!({"n": calls.load(Ordering::SeqCst)})
        };

        let ttl = Duration::from_millis(20);
        cache
            .get_or_compute("k", ttl, || async { Ok(compute()) })
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(40)).await;

        let value = cache
            .get_or_compute("k", ttl, || async { Ok(compute()) })
            .await
            .unwrap();
        assert_eq!(value["n"], 2);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn compute_failure_is_not_cached() {
        let cache = TieredCache::new(None);
        let calls = AtomicUsize::new(0);

        let result = cache
            .get_or_compute("k", Duration::from_secs(60), || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(anyhow::anyhow!("upstream down"))
            })
            .await;
        assert!(result.is_err());

        // The failure was not stored; the next call computes again.
        let value = cache
            .get_or_compute("k", Duration::from_secs(60), || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(json!("ok"))
            })
            .await
            .unwrap();
        assert_eq!(value, json!("ok"));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn invalidate_clears_the_local_tier() {
        let cache = TieredCache::new(None);
        let calls = AtomicUsize::new(0);

        for _ in 0..2 {
            cache
                .get_or_compute("trip:1", Duration::from_secs(60), || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(json!({}))
                })
                .await
                .unwrap();
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        cache.invalidate("trip:1").await.unwrap();
        cache
            .get_or_compute("trip:1", Duration::from_secs(60), || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(json!({}))
            })
            .await
            .unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
