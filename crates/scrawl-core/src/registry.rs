//! Room registry - process-wide map of resident rooms

use std::sync::Arc;

use dashmap::DashMap;
use tracing::warn;

use crate::edit::RoomId;
use crate::maintenance::{self, MaintenanceConfig};
use crate::room::Room;
use crate::store::RoomStore;

/// Owns the id → room map. At most one resident room per id; rooms are
/// created lazily on first reference and removed only by idle eviction.
///
/// The registry is an explicit, injectable object rather than a process
/// global, so tests can run against independent instances.
pub struct RoomRegistry {
    inner: Arc<RegistryInner>,
}

pub(crate) struct RegistryInner {
    pub(crate) rooms: DashMap<String, Arc<Room>>,
    pub(crate) store: Arc<dyn RoomStore>,
    pub(crate) config: MaintenanceConfig,
}

impl RoomRegistry {
    pub fn new(store: Arc<dyn RoomStore>, config: MaintenanceConfig) -> Self {
        Self {
            inner: Arc::new(RegistryInner {
                rooms: DashMap::new(),
                store,
                config,
            }),
        }
    }

    /// Get the resident room for `id`, creating and loading it if absent.
    ///
    /// The load starts before any caller can observe the room: the creating
    /// caller and every caller arriving during the load await the same
    /// single attempt. Registering a room also spawns its maintenance task.
    pub async fn get(&self, id: &RoomId) -> Arc<Room> {
        let room = self
            .inner
            .rooms
            .entry(id.as_str().to_string())
            .or_insert_with(|| {
                let room = Arc::new(Room::new(id.clone(), self.inner.store.clone()));
                maintenance::spawn(&self.inner, &room);
                room
            })
            .clone();
        room.ensure_loaded().await;
        room
    }

    /// Ids of all currently resident rooms.
    pub fn resident(&self) -> Vec<RoomId> {
        self.inner
            .rooms
            .iter()
            .map(|entry| entry.value().id().clone())
            .collect()
    }

    /// Persist every dirty resident room. Used for orderly shutdown; the
    /// maintenance tasks retry failures on their own schedule either way.
    pub async fn save_all(&self) {
        let rooms: Vec<Arc<Room>> = self
            .inner
            .rooms
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        for room in rooms {
            if room.is_dirty() {
                if let Err(e) = room.persist().await {
                    warn!(room = %room.id(), error = %e, "Failed to persist room on shutdown");
                }
            }
        }
    }

    /// Get statistics
    pub fn stats(&self) -> RegistryStats {
        RegistryStats {
            resident_rooms: self.inner.rooms.len(),
        }
    }
}

/// Registry statistics
#[derive(Debug, Clone)]
pub struct RegistryStats {
    pub resident_rooms: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::testing::TestStore;
    use crate::store::RoomRecord;
    use crate::Edit;
    use std::sync::atomic::Ordering;

    fn registry_with(store: Arc<TestStore>) -> RoomRegistry {
        RoomRegistry::new(store, MaintenanceConfig::default())
    }

    #[tokio::test]
    async fn test_get_returns_same_room_while_resident() {
        let registry = registry_with(Arc::new(TestStore::default()));
        let id = RoomId::new("board:1").unwrap();

        let a = registry.get(&id).await;
        let b = registry.get(&id).await;

        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(registry.stats().resident_rooms, 1);
    }

    #[tokio::test]
    async fn test_concurrent_gets_share_one_load() {
        let store = Arc::new(TestStore::default());
        let registry = Arc::new(registry_with(store.clone()));
        let id = RoomId::new("board:2").unwrap();

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let registry = registry.clone();
                let id = id.clone();
                tokio::spawn(async move { registry.get(&id).await.logical_time() })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(store.loads.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_get_loads_persisted_record() {
        let store = Arc::new(TestStore::default());
        let id = RoomId::new("board:3").unwrap();
        let record = RoomRecord {
            image: Some(b"img".to_vec()),
            logical_time: 5,
            edits: vec![Edit::new(serde_json::json!({ "seq": 5 }))],
        };
        store
            .records
            .insert(id.as_str().to_string(), record.encode().unwrap());

        let registry = registry_with(store);
        let room = registry.get(&id).await;

        assert_eq!(room.logical_time(), 5);
        assert_eq!(room.snapshot_time(), 4);
        assert_eq!(room.read_snapshot().unwrap(), (4, b"img".to_vec()));
    }

    #[tokio::test]
    async fn test_save_all_persists_dirty_rooms() {
        let store = Arc::new(TestStore::default());
        let registry = registry_with(store.clone());
        let id = RoomId::new("board:4").unwrap();

        let room = registry.get(&id).await;
        room.apply(vec![Edit::new(serde_json::json!({ "seq": 1 }))]).unwrap();
        registry.save_all().await;

        assert_eq!(store.saves.load(Ordering::SeqCst), 1);
        // A clean registry saves nothing.
        registry.save_all().await;
        assert_eq!(store.saves.load(Ordering::SeqCst), 1);
    }
}
