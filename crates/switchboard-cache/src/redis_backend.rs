//! Shared, network-backed cache for multi-server PBX installations.

use std::time::Duration;

use async_trait::async_trait;
use redis::{aio::ConnectionManager, AsyncCommands, Client};

use crate::error::CacheError;
use crate::gateway::{cache_key, CacheGateway};

#[derive(Clone)]
pub struct RedisCacheGateway {
    conn: ConnectionManager,
}

impl RedisCacheGateway {
    pub async fn connect(redis_url: &str) -> Result<Self, CacheError> {
        let client = Client::open(redis_url).map_err(CacheError::Redis)?;
        let conn = client
            .get_connection_manager()
            .await
            .map_err(CacheError::Redis)?;
        tracing::info!("redis cache backend connected");
        Ok(Self { conn })
    }
}

#[async_trait]
impl CacheGateway for RedisCacheGateway {
    #[tracing::instrument(skip(self, payload))]
    async fn put(
        &self,
        call_id: &str,
        tree_path: &str,
        payload: Vec<u8>,
        ttl: Duration,
    ) -> Result<(), CacheError> {
        let key = cache_key(call_id, tree_path);
        let mut conn = self.conn.clone();
        let ttl_secs = ttl.as_secs().max(1);
        let () = conn.set_ex(key, payload, ttl_secs).await?;
        Ok(())
    }

    #[tracing::instrument(skip(self))]
    async fn get(&self, call_id: &str, tree_path: &str) -> Result<Option<Vec<u8>>, CacheError> {
        let key = cache_key(call_id, tree_path);
        let mut conn = self.conn.clone();
        let value: Option<Vec<u8>> = conn.get(key).await?;
        Ok(value)
    }
}
