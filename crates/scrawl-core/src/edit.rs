//! Room identifiers and edit payloads

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// Room identifier - UTF-8 string, max 512 bytes
///
/// Doubles as the persistence key for the room's durable record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RoomId(String);

impl RoomId {
    /// Create a new room ID, validating the format
    pub fn new(id: impl Into<String>) -> Result<Self> {
        let id = id.into();

        if id.is_empty() {
            return Err(Error::InvalidRoomId("Room ID cannot be empty".into()));
        }

        if id.len() > 512 {
            return Err(Error::InvalidRoomId("Room ID exceeds 512 bytes".into()));
        }

        // Validate pattern: [a-zA-Z0-9:_-]+
        if !id.chars().all(|c| c.is_ascii_alphanumeric() || c == ':' || c == '_' || c == '-') {
            return Err(Error::InvalidRoomId(
                "Room ID must match pattern [a-zA-Z0-9:_-]+".into(),
            ));
        }

        Ok(Self(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for RoomId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One atomic drawing operation (endpoints, color, stroke width, ...).
///
/// The engine never inspects the payload: it is appended to the log, replayed
/// to catch-up readers, and persisted as-is. Interpreting the shape is the
/// rendering client's concern.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Edit(serde_json::Value);

impl Edit {
    pub fn new(payload: serde_json::Value) -> Self {
        Self(payload)
    }

    pub fn payload(&self) -> &serde_json::Value {
        &self.0
    }
}

impl From<serde_json::Value> for Edit {
    fn from(payload: serde_json::Value) -> Self {
        Self(payload)
    }
}
