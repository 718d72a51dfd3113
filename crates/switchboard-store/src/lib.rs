//! Read-only store gateway: point queries for extensions and fork ranks.
//! No write operations.

pub mod error;
pub mod gateway;
pub mod postgres;

#[cfg(feature = "testing")]
pub mod fake;

pub use error::StoreError;
pub use gateway::StoreGateway;
pub use postgres::PostgresStoreGateway;

#[cfg(feature = "testing")]
pub use fake::FakeStoreGateway;
