//! An in-memory `StoreGateway` for exercising the tree builder without a
//! database, in the same spirit as `entity-gateway`'s `SearchIndex` trait
//! letting Tantivy be swapped for a test double.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use switchboard_types::{Extension, ForkRank};

use crate::error::StoreError;
use crate::gateway::StoreGateway;

#[derive(Default)]
pub struct FakeStoreGateway {
    extensions: Mutex<HashMap<i64, Extension>>,
    by_number: Mutex<HashMap<String, i64>>,
    fork_ranks: Mutex<HashMap<i64, Vec<ForkRank>>>,
}

impl FakeStoreGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_extension(self, ext: Extension) -> Self {
        self.by_number
            .lock()
            .unwrap()
            .insert(ext.number.clone(), ext.id);
        self.extensions.lock().unwrap().insert(ext.id, ext);
        self
    }

    pub fn with_fork_ranks(self, extension_id: i64, ranks: Vec<ForkRank>) -> Self {
        self.fork_ranks.lock().unwrap().insert(extension_id, ranks);
        self
    }
}

#[async_trait]
impl StoreGateway for FakeStoreGateway {
    async fn load_extension_by_number(
        &self,
        number: &str,
    ) -> Result<Option<Extension>, StoreError> {
        let id = self.by_number.lock().unwrap().get(number).copied();
        Ok(id.and_then(|id| self.extensions.lock().unwrap().get(&id).cloned()))
    }

    async fn load_extension_by_id(&self, id: i64) -> Result<Option<Extension>, StoreError> {
        Ok(self.extensions.lock().unwrap().get(&id).cloned())
    }

    async fn load_fork_ranks_for(&self, extension_id: i64) -> Result<Vec<ForkRank>, StoreError> {
        Ok(self
            .fork_ranks
            .lock()
            .unwrap()
            .get(&extension_id)
            .cloned()
            .unwrap_or_default())
    }
}
