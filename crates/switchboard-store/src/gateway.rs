//! The `StoreGateway` trait: read-only point queries the tree builder fans
//! out in parallel within a BFS layer. No write operations.

use async_trait::async_trait;
use switchboard_types::{Extension, ForkRank};

use crate::error::StoreError;

#[async_trait]
pub trait StoreGateway: Send + Sync {
    async fn load_extension_by_number(&self, number: &str) -> Result<Option<Extension>, StoreError>;

    async fn load_extension_by_id(&self, id: i64) -> Result<Option<Extension>, StoreError>;

    /// Ordered by `index`, each rank pre-joined with its members in their
    /// stored order.
    async fn load_fork_ranks_for(&self, extension_id: i64) -> Result<Vec<ForkRank>, StoreError>;
}
