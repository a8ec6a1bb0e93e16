//! Connection handler - maps SWP commands onto room operations

use std::sync::Arc;

use scrawl_core::{Edit, Error, RoomId, RoomRegistry};
use scrawl_protocol::{Command, CommandKind, Response};
use tracing::debug;

/// Handles the commands of a single client connection.
pub struct ConnectionHandler {
    /// Unique client ID
    pub client_id: String,
    /// Room registry reference
    registry: Arc<RoomRegistry>,
}

impl ConnectionHandler {
    pub fn new(client_id: String, registry: Arc<RoomRegistry>) -> Self {
        Self {
            client_id,
            registry,
        }
    }

    /// Handle a single command.
    ///
    /// `UPDATES` long-polls: the returned future resolves once new edits
    /// exist or the room dismisses its waiters, so the connection carries at
    /// most one outstanding request at a time.
    pub async fn handle(&self, cmd: Command) -> Response {
        debug!(client = %self.client_id, cmd = ?cmd.kind, "Processing command");

        match cmd.kind {
            CommandKind::Ping => Response::pong(),
            CommandKind::Quit => Response::ok_with_message("Goodbye"),
            CommandKind::Info => self.handle_info(),
            CommandKind::Rooms => self.handle_rooms(),
            CommandKind::Append { edits } => self.handle_append(cmd.room_id, edits).await,
            CommandKind::Updates { from } => self.handle_updates(cmd.room_id, from).await,
            CommandKind::Snapshot => self.handle_snapshot(cmd.room_id).await,
            CommandKind::Compact {
                logical_time,
                image,
            } => self.handle_compact(cmd.room_id, logical_time, image).await,
        }
    }

    async fn handle_append(&self, room_id: Option<String>, edits: Vec<Edit>) -> Response {
        let id = match parse_room_id(room_id) {
            Ok(id) => id,
            Err(resp) => return resp,
        };

        let room = self.registry.get(&id).await;
        match room.apply(edits) {
            Ok(logical_time) => Response::integer(logical_time as i64),
            Err(e) => error_response(e),
        }
    }

    async fn handle_updates(&self, room_id: Option<String>, from: u64) -> Response {
        let id = match parse_room_id(room_id) {
            Ok(id) => id,
            Err(resp) => return resp,
        };

        let room = self.registry.get(&id).await;
        match room.updates(from).await {
            Ok(edits) => Response::array(
                edits
                    .iter()
                    .map(|edit| Response::bulk(serde_json::to_vec(edit).unwrap_or_default()))
                    .collect(),
            ),
            Err(e) => error_response(e),
        }
    }

    async fn handle_snapshot(&self, room_id: Option<String>) -> Response {
        let id = match parse_room_id(room_id) {
            Ok(id) => id,
            Err(resp) => return resp,
        };

        let room = self.registry.get(&id).await;
        match room.read_snapshot() {
            Ok((logical_time, image)) => Response::snapshot(logical_time, image),
            Err(e) => error_response(e),
        }
    }

    async fn handle_compact(
        &self,
        room_id: Option<String>,
        logical_time: u64,
        image: Vec<u8>,
    ) -> Response {
        let id = match parse_room_id(room_id) {
            Ok(id) => id,
            Err(resp) => return resp,
        };

        // Stale submissions are silently ignored; the ack only promises
        // that a persistence attempt was made.
        let room = self.registry.get(&id).await;
        room.write_snapshot(logical_time, image).await;
        Response::ok()
    }

    fn handle_info(&self) -> Response {
        let stats = self.registry.stats();
        let info = serde_json::json!({
            "version": env!("CARGO_PKG_VERSION"),
            "resident_rooms": stats.resident_rooms,
            "client_id": self.client_id,
        });
        Response::bulk(serde_json::to_vec(&info).unwrap_or_default())
    }

    fn handle_rooms(&self) -> Response {
        let rooms: Vec<Response> = self
            .registry
            .resident()
            .into_iter()
            .map(|id| Response::bulk(id.as_str().as_bytes().to_vec()))
            .collect();
        Response::array(rooms)
    }
}

fn parse_room_id(room_id: Option<String>) -> Result<RoomId, Response> {
    let raw = match room_id {
        Some(raw) => raw,
        None => return Err(Response::error("MISSING_ARG", "Room ID required")),
    };
    RoomId::new(&raw).map_err(|e| Response::error("INVALID_ID", e.to_string()))
}

fn error_response(e: Error) -> Response {
    let code = match &e {
        Error::EmptyBatch => "EMPTY_BATCH",
        Error::BehindSnapshot { .. } => "STALE_CURSOR",
        Error::NoSnapshot => "NO_SNAPSHOT",
        Error::InvalidRoomId(_) => "INVALID_ID",
    };
    Response::error(code, e.to_string())
}
