//! Cache gateway for serialized intermediate routing results.

pub mod error;
pub mod gateway;
pub mod in_process;
pub mod redis_backend;

pub use error::CacheError;
pub use gateway::{cache_key, CacheGateway};
pub use in_process::InProcessCacheGateway;
pub use redis_backend::RedisCacheGateway;
