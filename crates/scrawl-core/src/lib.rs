//! Scrawl Core - Room State and Synchronization
//!
//! This crate provides the core of the Scrawl engine:
//! - Per-room append-only edit logs with a logical clock
//! - Snapshot compaction and long-polling catch-up reads
//! - Lazy load-from-disk, debounced persistence, and idle eviction

pub mod edit;
pub mod error;
pub mod maintenance;
pub mod registry;
pub mod room;
pub mod store;

pub use edit::{Edit, RoomId};
pub use error::{Error, Result};
pub use maintenance::MaintenanceConfig;
pub use registry::{RegistryStats, RoomRegistry};
pub use room::Room;
pub use store::{RoomRecord, RoomStore, StoreError};
