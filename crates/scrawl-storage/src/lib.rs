//! Scrawl Storage Backends
//!
//! Pluggable persistence for room records:
//! - Memory (default): fast, volatile storage
//! - SQLite: embedded single-file persistence

pub mod memory;
#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use scrawl_core::store::{RoomStore, StoreError};

pub use memory::MemoryStore;
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteStore;
