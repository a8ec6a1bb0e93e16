//! Room state machine: logical clock, edit log, snapshot, long-poll waiters

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::{oneshot, OnceCell};
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::edit::{Edit, RoomId};
use crate::error::{Error, Result};
use crate::store::{RoomRecord, RoomStore, StoreError};

/// Mutable state of a room. Every transition happens under the lock without
/// awaiting, so each mutation is atomic with respect to all other operations
/// on the same room.
struct RoomState {
    /// Count of edits ever applied. Never decreases, never resets.
    logical_time: u64,
    /// Edits applied after the snapshot, oldest first.
    edits: Vec<Edit>,
    /// Rendered compaction of all edits up to `snapshot_time()`.
    image: Option<Vec<u8>>,
    /// Logical time at which the record was last durably persisted.
    last_save: u64,
    /// Time of the last externally observable operation.
    last_access: Instant,
    /// Pending long-poll wake-ups, drained on every mutation or dismissal.
    waiters: Vec<oneshot::Sender<()>>,
}

impl RoomState {
    /// Invariant: `snapshot_time() == logical_time - edits.len()`, >= 0.
    fn snapshot_time(&self) -> u64 {
        self.logical_time - self.edits.len() as u64
    }

    /// Edits applied strictly after `from`. Callers must have checked
    /// `from >= snapshot_time()`; a `from` past the clock yields nothing.
    fn edits_since(&self, from: u64) -> Vec<Edit> {
        let newer = self.logical_time.saturating_sub(from) as usize;
        self.edits[self.edits.len() - newer..].to_vec()
    }

    /// Drain the wait set. Sending on the channel schedules each waiting
    /// task rather than running it inline, so waiters cannot re-enter the
    /// room mid-mutation.
    fn wake_waiters(&mut self) {
        for waiter in self.waiters.drain(..) {
            let _ = waiter.send(());
        }
    }
}

/// A single collaborative drawing session.
///
/// Rooms are created by [`crate::RoomRegistry::get`] and stay resident until
/// the maintenance task evicts them for inactivity. A later reference to the
/// same id builds a fresh room that reloads the persisted record; a stale
/// `Arc<Room>` held across an eviction still works, it is just no longer the
/// resident instance.
pub struct Room {
    id: RoomId,
    state: Mutex<RoomState>,
    /// One load attempt per instance; concurrent callers await the same one.
    loaded: OnceCell<()>,
    store: Arc<dyn RoomStore>,
}

impl Room {
    pub(crate) fn new(id: RoomId, store: Arc<dyn RoomStore>) -> Self {
        Self {
            id,
            state: Mutex::new(RoomState {
                logical_time: 0,
                edits: Vec::new(),
                image: None,
                last_save: 0,
                last_access: Instant::now(),
                waiters: Vec::new(),
            }),
            loaded: OnceCell::new(),
            store,
        }
    }

    pub fn id(&self) -> &RoomId {
        &self.id
    }

    /// Count of edits ever applied to this room.
    pub fn logical_time(&self) -> u64 {
        self.state.lock().logical_time
    }

    /// Logical time represented by the current snapshot image. Edits after
    /// it are kept individually in the log. Pure; no access tracking.
    pub fn snapshot_time(&self) -> u64 {
        self.state.lock().snapshot_time()
    }

    /// Populate the room from its persisted record, exactly once. A missing
    /// record, a corrupt record, and a failed read all start the room empty.
    pub(crate) async fn ensure_loaded(&self) {
        self.loaded
            .get_or_init(|| async {
                match self.store.load(&self.id).await {
                    Ok(Some(blob)) => match RoomRecord::decode(&blob) {
                        Ok(record) => self.install(record),
                        Err(e) => {
                            warn!(room = %self.id, error = %e, "Corrupt room record, starting empty");
                        }
                    },
                    Ok(None) => {
                        debug!(room = %self.id, "No persisted record, starting empty");
                    }
                    Err(e) => {
                        warn!(room = %self.id, error = %e, "Failed to load room, starting empty");
                    }
                }
            })
            .await;
    }

    fn install(&self, record: RoomRecord) {
        let mut state = self.state.lock();
        state.logical_time = record.logical_time;
        state.edits = record.edits;
        state.image = record.image;
        state.last_save = record.logical_time;
    }

    /// Append a batch of edits, advancing the logical clock by the batch
    /// length. Returns the new logical time, which callers use as their
    /// delivery receipt. Wakes every pending long-poll waiter.
    pub fn apply(&self, edits: Vec<Edit>) -> Result<u64> {
        if edits.is_empty() {
            return Err(Error::EmptyBatch);
        }
        let mut state = self.state.lock();
        state.last_access = Instant::now();
        state.logical_time += edits.len() as u64;
        state.edits.extend(edits);
        state.wake_waiters();
        Ok(state.logical_time)
    }

    /// Edits applied strictly after `from`, in application order, always a
    /// contiguous gap-free suffix of the log.
    ///
    /// A caller that is already caught up suspends until the next mutation
    /// or a forced dismissal, then re-evaluates once: a dismissal with
    /// nothing new yields an empty batch, not an error. A `from` behind the
    /// snapshot horizon fails with [`Error::BehindSnapshot`]; the caller
    /// must restart from the current snapshot instead of retrying.
    pub async fn updates(&self, from: u64) -> Result<Vec<Edit>> {
        let pending = {
            let mut state = self.state.lock();
            state.last_access = Instant::now();
            let horizon = state.snapshot_time();
            if from < horizon {
                return Err(Error::BehindSnapshot { from, horizon });
            }
            if from < state.logical_time {
                return Ok(state.edits_since(from));
            }
            let (tx, rx) = oneshot::channel();
            state.waiters.push(tx);
            rx
        };

        // Registered under the lock above, so an apply landing from here on
        // is guaranteed to signal us. A dropped sender counts as dismissal.
        let _ = pending.await;

        let state = self.state.lock();
        let horizon = state.snapshot_time();
        if from < horizon {
            return Err(Error::BehindSnapshot { from, horizon });
        }
        Ok(state.edits_since(from))
    }

    /// Install a snapshot image covering every edit up to `logical_time`,
    /// pruning the covered prefix from the log. A stale or duplicate
    /// compaction leaves the state untouched; the horizon never moves
    /// backward. Either way the record is persisted afterward, since
    /// callers treat the ack as a durability point.
    pub async fn write_snapshot(&self, logical_time: u64, image: Vec<u8>) {
        {
            let mut state = self.state.lock();
            state.last_access = Instant::now();
            let horizon = state.snapshot_time();
            if logical_time > horizon {
                // Clamped: a compaction cannot claim edits past the clock.
                let pruned = ((logical_time - horizon) as usize).min(state.edits.len());
                state.edits.drain(..pruned);
                state.image = Some(image);
            }
        }
        if let Err(e) = self.persist().await {
            warn!(room = %self.id, error = %e, "Failed to persist snapshot");
        }
    }

    /// The current snapshot image and the logical time it represents.
    pub fn read_snapshot(&self) -> Result<(u64, Vec<u8>)> {
        let mut state = self.state.lock();
        state.last_access = Instant::now();
        match &state.image {
            Some(image) => Ok((state.snapshot_time(), image.clone())),
            None => Err(Error::NoSnapshot),
        }
    }

    /// Whether edits have been applied since the last successful save.
    pub(crate) fn is_dirty(&self) -> bool {
        let state = self.state.lock();
        state.logical_time != state.last_save
    }

    pub(crate) fn last_access(&self) -> Instant {
        self.state.lock().last_access
    }

    /// Wake every pending long-poll waiter with no new data. Waiters observe
    /// an empty batch and re-issue; this bounds wait-set growth on quiet
    /// rooms and keeps idle detection honest.
    pub(crate) fn dismiss_waiters(&self) {
        self.state.lock().wake_waiters();
    }

    /// Write the current record to the store. The logical time captured at
    /// encode becomes `last_save` only once the write lands, so an apply
    /// racing the write leaves the room dirty for the next cycle.
    pub(crate) async fn persist(&self) -> std::result::Result<(), StoreError> {
        let (blob, at) = {
            let state = self.state.lock();
            let record = RoomRecord {
                image: state.image.clone(),
                logical_time: state.logical_time,
                edits: state.edits.clone(),
            };
            (record.encode()?, state.logical_time)
        };
        self.store.save(&self.id, &blob).await?;
        let mut state = self.state.lock();
        state.last_save = state.last_save.max(at);
        Ok(())
    }
}

impl std::fmt::Debug for Room {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("Room")
            .field("id", &self.id)
            .field("logical_time", &state.logical_time)
            .field("pending_edits", &state.edits.len())
            .finish()
    }
}
