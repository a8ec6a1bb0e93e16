//! SWP command types

use scrawl_core::Edit;

/// A parsed SWP command
#[derive(Debug, Clone)]
pub struct Command {
    pub kind: CommandKind,
    pub room_id: Option<String>,
}

/// All supported SWP commands
#[derive(Debug, Clone)]
pub enum CommandKind {
    /// APPEND <room> <json array of edits>
    Append { edits: Vec<Edit> },

    /// UPDATES <room> <from>
    ///
    /// Long-polls when the caller is already caught up.
    Updates { from: u64 },

    /// SNAPSHOT <room>
    Snapshot,

    /// COMPACT <room> <logical_time> <base64 image>
    Compact { logical_time: u64, image: Vec<u8> },

    /// ROOMS
    Rooms,

    /// INFO
    Info,

    /// PING
    Ping,

    /// QUIT
    Quit,
}

impl Command {
    pub fn append(room_id: String, edits: Vec<Edit>) -> Self {
        Command {
            kind: CommandKind::Append { edits },
            room_id: Some(room_id),
        }
    }

    pub fn updates(room_id: String, from: u64) -> Self {
        Command {
            kind: CommandKind::Updates { from },
            room_id: Some(room_id),
        }
    }

    pub fn snapshot(room_id: String) -> Self {
        Command {
            kind: CommandKind::Snapshot,
            room_id: Some(room_id),
        }
    }

    pub fn compact(room_id: String, logical_time: u64, image: Vec<u8>) -> Self {
        Command {
            kind: CommandKind::Compact {
                logical_time,
                image,
            },
            room_id: Some(room_id),
        }
    }

    pub fn rooms() -> Self {
        Command {
            kind: CommandKind::Rooms,
            room_id: None,
        }
    }

    pub fn info() -> Self {
        Command {
            kind: CommandKind::Info,
            room_id: None,
        }
    }

    pub fn ping() -> Self {
        Command {
            kind: CommandKind::Ping,
            room_id: None,
        }
    }

    pub fn quit() -> Self {
        Command {
            kind: CommandKind::Quit,
            room_id: None,
        }
    }
}
