//! The `CacheGateway` trait: put/get of serialized intermediate routing
//! results keyed by (call-id, tree-path). Two interchangeable backends sit
//! behind it: a shared network cache (multi-server) and an in-process map
//! (single-server / test).

use std::time::Duration;

use async_trait::async_trait;

use crate::error::CacheError;

#[async_trait]
pub trait CacheGateway: Send + Sync {
    /// Must accept concurrent puts for distinct keys.
    async fn put(
        &self,
        call_id: &str,
        tree_path: &str,
        payload: Vec<u8>,
        ttl: Duration,
    ) -> Result<(), CacheError>;

    /// `get` after `put` of the same key within TTL must return the stored
    /// bytes byte-for-byte.
    async fn get(&self, call_id: &str, tree_path: &str) -> Result<Option<Vec<u8>>, CacheError>;
}

/// Key format fixed by the wire contract.
pub fn cache_key(call_id: &str, tree_path: &str) -> String {
    format!("stage1:{call_id}:{tree_path}")
}
