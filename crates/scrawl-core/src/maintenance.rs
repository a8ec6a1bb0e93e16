//! Per-room maintenance: periodic save, waiter dismissal, idle eviction

use std::sync::{Arc, Weak};
use std::time::Duration;

use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, warn};

use crate::registry::RegistryInner;
use crate::room::Room;

/// Timing knobs for the per-room maintenance task.
#[derive(Debug, Clone, Copy)]
pub struct MaintenanceConfig {
    /// How often each resident room is saved and its waiters dismissed.
    pub period: Duration,
    /// How long a room may go unaccessed before it is evicted from memory.
    pub idle_timeout: Duration,
}

impl Default for MaintenanceConfig {
    fn default() -> Self {
        Self {
            period: Duration::from_secs(30),
            idle_timeout: Duration::from_secs(300),
        }
    }
}

/// Spawn the maintenance task for a freshly registered room.
///
/// The task holds only weak references: it never keeps the room or the
/// registry alive. Eviction ends the task, which is how the per-room timer
/// is cancelled.
pub(crate) fn spawn(registry: &Arc<RegistryInner>, room: &Arc<Room>) {
    let config = registry.config;
    let registry = Arc::downgrade(registry);
    let room = Arc::downgrade(room);
    tokio::spawn(run(registry, room, config));
}

async fn run(registry: Weak<RegistryInner>, room: Weak<Room>, config: MaintenanceConfig) {
    let mut ticker = time::interval(config.period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // An interval's first tick completes immediately; the first real cycle
    // runs one full period after registration.
    ticker.tick().await;
    loop {
        ticker.tick().await;
        let Some(room) = room.upgrade() else { return };
        if !run_once(&registry, &room, config).await {
            return;
        }
    }
}

/// One maintenance cycle. Returns `false` once the room has been evicted.
async fn run_once(
    registry: &Weak<RegistryInner>,
    room: &Arc<Room>,
    config: MaintenanceConfig,
) -> bool {
    // Force-wake long-pollers every period, even on active rooms. They see
    // an empty batch and re-issue; a wait set that could grow unboundedly
    // would also pin last_access observations the idle check relies on.
    room.dismiss_waiters();

    let idle_mark = room.last_access();

    if room.is_dirty() {
        if let Err(e) = room.persist().await {
            warn!(room = %room.id(), error = %e, "Maintenance save failed, will retry next period");
        }
    }

    let Some(registry) = registry.upgrade() else {
        return false;
    };

    // Evict only when the room stayed quiet across the whole cycle: an
    // access racing the save above moves last_access and spares the room.
    if idle_mark.elapsed() >= config.idle_timeout && room.last_access() == idle_mark {
        registry
            .rooms
            .remove_if(room.id().as_str(), |_, resident| Arc::ptr_eq(resident, room));
        debug!(room = %room.id(), "Evicted idle room");
        return false;
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::testing::TestStore;
    use crate::store::{RoomStore, StoreError};
    use crate::{Edit, RoomId, RoomRegistry};
    use serde_json::json;
    use std::sync::atomic::Ordering;

    fn short_config() -> MaintenanceConfig {
        MaintenanceConfig {
            period: Duration::from_secs(1),
            idle_timeout: Duration::from_secs(3),
        }
    }

    fn edit(seq: u64) -> Edit {
        Edit::new(json!({ "seq": seq }))
    }

    #[tokio::test(start_paused = true)]
    async fn test_dirty_room_saved_on_next_period() {
        let store = Arc::new(TestStore::default());
        let registry = RoomRegistry::new(store.clone(), short_config());
        let id = RoomId::new("board:save").unwrap();

        let room = registry.get(&id).await;
        room.apply(vec![edit(1)]).unwrap();
        assert_eq!(store.saves.load(Ordering::SeqCst), 0);

        time::sleep(Duration::from_millis(1500)).await;
        assert_eq!(store.saves.load(Ordering::SeqCst), 1);

        // Nothing new to write on the following period.
        time::sleep(Duration::from_secs(1)).await;
        assert_eq!(store.saves.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_room_evicted_and_reloadable() {
        let store = Arc::new(TestStore::default());
        let registry = RoomRegistry::new(store.clone(), short_config());
        let id = RoomId::new("board:evict").unwrap();

        let room = registry.get(&id).await;
        room.apply(vec![edit(1), edit(2)]).unwrap();
        drop(room);

        time::sleep(Duration::from_secs(5)).await;
        assert_eq!(registry.stats().resident_rooms, 0);

        // The next reference builds a fresh room from the saved record.
        let reloaded = registry.get(&id).await;
        assert_eq!(reloaded.logical_time(), 2);
        assert_eq!(reloaded.updates(1).await.unwrap(), vec![edit(2)]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_active_room_is_not_evicted() {
        let store = Arc::new(TestStore::default());
        let registry = RoomRegistry::new(store.clone(), short_config());
        let id = RoomId::new("board:active").unwrap();

        let room = registry.get(&id).await;
        for seq in 0..6 {
            time::sleep(Duration::from_secs(1)).await;
            room.apply(vec![edit(seq)]).unwrap();
        }

        assert_eq!(registry.stats().resident_rooms, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_periodic_dismissal_wakes_long_pollers() {
        let registry = RoomRegistry::new(Arc::new(TestStore::default()), short_config());
        let id = RoomId::new("board:poll").unwrap();

        let room = registry.get(&id).await;
        let waiter = {
            let room = room.clone();
            tokio::spawn(async move { room.updates(0).await })
        };

        // No edits arrive; the next maintenance cycle force-wakes the poll.
        let got = waiter.await.unwrap().unwrap();
        assert!(got.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_save_failure_is_retried_next_period() {
        #[derive(Default)]
        struct FlakyStore {
            inner: TestStore,
            fail_first: std::sync::atomic::AtomicBool,
        }

        #[async_trait::async_trait]
        impl RoomStore for FlakyStore {
            async fn load(&self, id: &RoomId) -> Result<Option<Vec<u8>>, StoreError> {
                self.inner.load(id).await
            }

            async fn save(&self, id: &RoomId, record: &[u8]) -> Result<(), StoreError> {
                if self.fail_first.swap(false, Ordering::SeqCst) {
                    return Err(StoreError::Io("disk full".into()));
                }
                self.inner.save(id, record).await
            }
        }

        let store = Arc::new(FlakyStore::default());
        store.fail_first.store(true, Ordering::SeqCst);
        let registry = RoomRegistry::new(store.clone(), short_config());
        let id = RoomId::new("board:flaky").unwrap();

        let room = registry.get(&id).await;
        room.apply(vec![edit(1)]).unwrap();

        // First cycle fails, room stays resident and dirty; second succeeds.
        time::sleep(Duration::from_millis(1500)).await;
        assert!(store.inner.records.is_empty());
        time::sleep(Duration::from_secs(1)).await;
        assert_eq!(store.inner.saves.load(Ordering::SeqCst), 1);
        assert_eq!(registry.stats().resident_rooms, 1);
    }
}
