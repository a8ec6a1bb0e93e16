//! Error types for Scrawl Core

use thiserror::Error;

/// Core error types
#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid room ID: {0}")]
    InvalidRoomId(String),

    #[error("Edit batch is empty")]
    EmptyBatch,

    #[error("Cursor {from} predates the snapshot horizon {horizon}")]
    BehindSnapshot { from: u64, horizon: u64 },

    #[error("No snapshot has been taken yet")]
    NoSnapshot,
}

/// Result type alias for Scrawl Core operations
pub type Result<T> = std::result::Result<T, Error>;
