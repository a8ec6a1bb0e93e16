//! Persistence adapter trait and the durable room record

use crate::edit::{Edit, RoomId};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Storage backend trait
///
/// A backend keeps one opaque record per room, keyed by room id. A resident
/// room is the only writer of its own record, so plain last-writer-wins
/// overwrite semantics are sufficient; no read-atomicity is promised.
#[async_trait]
pub trait RoomStore: Send + Sync {
    /// Load a room's record. `Ok(None)` means no record exists yet and the
    /// room starts empty; it is not an error.
    async fn load(&self, id: &RoomId) -> Result<Option<Vec<u8>>, StoreError>;

    /// Overwrite the room's record.
    async fn save(&self, id: &RoomId, record: &[u8]) -> Result<(), StoreError>;
}

/// Storage error types
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("IO error: {0}")]
    Io(String),

    #[error("Database error: {0}")]
    Database(String),
}

/// Durable state of one room: the snapshot image plus every edit applied
/// after it. Edits already folded into the image are never written twice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoomRecord {
    pub image: Option<Vec<u8>>,
    pub logical_time: u64,
    pub edits: Vec<Edit>,
}

impl RoomRecord {
    /// Encode to the MessagePack blob handed to a [`RoomStore`].
    pub fn encode(&self) -> Result<Vec<u8>, StoreError> {
        rmp_serde::to_vec(self).map_err(|e| StoreError::Serialization(e.to_string()))
    }

    /// Decode a blob produced by [`RoomRecord::encode`]. Rejects records
    /// whose clock is behind their own edit log, which would put the
    /// snapshot horizon below zero.
    pub fn decode(bytes: &[u8]) -> Result<Self, StoreError> {
        let record: Self =
            rmp_serde::from_slice(bytes).map_err(|e| StoreError::Serialization(e.to_string()))?;
        if record.logical_time < record.edits.len() as u64 {
            return Err(StoreError::Serialization(
                "record clock is behind its edit log".into(),
            ));
        }
        Ok(record)
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use dashmap::DashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// In-memory store for unit tests, counting operations so tests can
    /// assert on load/save traffic.
    #[derive(Default)]
    pub(crate) struct TestStore {
        pub(crate) records: DashMap<String, Vec<u8>>,
        pub(crate) loads: AtomicUsize,
        pub(crate) saves: AtomicUsize,
    }

    #[async_trait]
    impl RoomStore for TestStore {
        async fn load(&self, id: &RoomId) -> Result<Option<Vec<u8>>, StoreError> {
            self.loads.fetch_add(1, Ordering::SeqCst);
            Ok(self.records.get(id.as_str()).map(|r| r.value().clone()))
        }

        async fn save(&self, id: &RoomId, record: &[u8]) -> Result<(), StoreError> {
            self.saves.fetch_add(1, Ordering::SeqCst);
            self.records.insert(id.as_str().to_string(), record.to_vec());
            Ok(())
        }
    }
}
