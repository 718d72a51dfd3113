//! Single-server / test cache backend: no network hop, no separate process.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;

use crate::error::CacheError;
use crate::gateway::{cache_key, CacheGateway};

/// Lazily expires entries on read rather than running a background sweep.
#[derive(Default)]
pub struct InProcessCacheGateway {
    entries: DashMap<String, (Vec<u8>, Instant)>,
}

impl InProcessCacheGateway {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }
}

#[async_trait]
impl CacheGateway for InProcessCacheGateway {
    async fn put(
        &self,
        call_id: &str,
        tree_path: &str,
        payload: Vec<u8>,
        ttl: Duration,
    ) -> Result<(), CacheError> {
        let key = cache_key(call_id, tree_path);
        self.entries.insert(key, (payload, Instant::now() + ttl));
        Ok(())
    }

    async fn get(&self, call_id: &str, tree_path: &str) -> Result<Option<Vec<u8>>, CacheError> {
        let key = cache_key(call_id, tree_path);
        let Some(entry) = self.entries.get(&key) else {
            return Ok(None);
        };
        let (payload, expires_at) = entry.value().clone();
        if expires_at <= Instant::now() {
            drop(entry);
            self.entries.remove(&key);
            tracing::debug!(%key, "cache entry expired, evicting on read");
            return Ok(None);
        }
        Ok(Some(payload))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn put_then_get_round_trips_byte_for_byte() {
        let cache = InProcessCacheGateway::new();
        let payload = vec![1u8, 2, 3, 4, 5];
        cache
            .put("abc123", "0.2.1", payload.clone(), Duration::from_secs(30))
            .await
            .unwrap();
        let got = cache.get("abc123", "0.2.1").await.unwrap();
        assert_eq!(got, Some(payload));
    }

    #[tokio::test]
    async fn expired_entry_reads_as_absent() {
        let cache = InProcessCacheGateway::new();
        cache
            .put("abc123", "0.2.1", vec![9], Duration::from_millis(1))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        let got = cache.get("abc123", "0.2.1").await.unwrap();
        assert_eq!(got, None);
    }

    #[tokio::test]
    async fn concurrent_puts_to_distinct_keys_both_survive() {
        let cache = InProcessCacheGateway::new();
        let (r1, r2) = tokio::join!(
            cache.put("call1", "0", vec![1], Duration::from_secs(10)),
            cache.put("call2", "0", vec![2], Duration::from_secs(10)),
        );
        r1.unwrap();
        r2.unwrap();
        assert_eq!(cache.get("call1", "0").await.unwrap(), Some(vec![1]));
        assert_eq!(cache.get("call2", "0").await.unwrap(), Some(vec![2]));
    }

    #[tokio::test]
    async fn miss_on_unknown_key() {
        let cache = InProcessCacheGateway::new();
        assert_eq!(cache.get("nope", "0").await.unwrap(), None);
    }
}
