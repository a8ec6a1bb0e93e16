//! SWP - Scrawl Wire Protocol
//!
//! A text-based protocol inspired by Redis RESP for drawing room
//! synchronization.
//!
//! ## Command Format
//! ```text
//! COMMAND <room_id> [ARGS] [PAYLOAD]
//! ```
//!
//! ## Response Format
//! ```text
//! +OK                      # Success
//! -ERR <code> <message>    # Error
//! :<integer>               # Logical-time receipt
//! $<length>\r\n<data>      # Bulk data
//! *<count>\r\n<items>      # Array
//! #<time> <image>          # Snapshot (base64 image)
//! ```

pub mod command;
pub mod error;
pub mod parser;
pub mod response;

pub use command::{Command, CommandKind};
pub use error::{ProtocolError, ProtocolResult};
pub use parser::Parser;
pub use response::Response;
