//! In-memory storage backend

use async_trait::async_trait;
use dashmap::DashMap;
use scrawl_core::store::{RoomStore, StoreError};
use scrawl_core::RoomId;

/// In-memory storage backend
///
/// Fast, volatile storage suitable for development, tests and cache-only
/// deployments. Records are lost when the process exits.
pub struct MemoryStore {
    records: DashMap<String, Vec<u8>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            records: DashMap::new(),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RoomStore for MemoryStore {
    async fn load(&self, id: &RoomId) -> Result<Option<Vec<u8>>, StoreError> {
        Ok(self.records.get(id.as_str()).map(|r| r.value().clone()))
    }

    async fn save(&self, id: &RoomId, record: &[u8]) -> Result<(), StoreError> {
        self.records.insert(id.as_str().to_string(), record.to_vec());
        Ok(())
    }
}
