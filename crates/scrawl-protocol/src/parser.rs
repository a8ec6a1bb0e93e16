//! SWP command parser

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use bytes::BytesMut;
use scrawl_core::Edit;

use crate::command::Command;
use crate::error::{ProtocolError, ProtocolResult};

/// Maximum message size (8MB; compaction submissions carry whole images)
const MAX_MESSAGE_SIZE: usize = 8 * 1024 * 1024;

/// SWP protocol parser
pub struct Parser {
    buffer: BytesMut,
}

impl Parser {
    pub fn new() -> Self {
        Self {
            buffer: BytesMut::with_capacity(4096),
        }
    }

    /// Add data to the parser buffer
    pub fn feed(&mut self, data: &[u8]) -> ProtocolResult<()> {
        if self.buffer.len() + data.len() > MAX_MESSAGE_SIZE {
            return Err(ProtocolError::MessageTooLarge {
                size: self.buffer.len() + data.len(),
                max: MAX_MESSAGE_SIZE,
            });
        }
        self.buffer.extend_from_slice(data);
        Ok(())
    }

    /// Try to parse a complete command from the buffer
    pub fn parse(&mut self) -> ProtocolResult<Option<Command>> {
        // Find line ending
        let line_end = match self.buffer.iter().position(|&b| b == b'\n') {
            Some(pos) => pos,
            None => return Ok(None), // Incomplete
        };

        // Extract line (excluding \r\n or \n)
        let line_len = if line_end > 0 && self.buffer[line_end - 1] == b'\r' {
            line_end - 1
        } else {
            line_end
        };

        let line = String::from_utf8_lossy(&self.buffer[..line_len]).to_string();

        // Remove the parsed line from buffer
        let _ = self.buffer.split_to(line_end + 1);

        // Parse the command
        Self::parse_line(&line).map(Some)
    }

    /// Parse a single command line
    fn parse_line(line: &str) -> ProtocolResult<Command> {
        let line = line.trim();
        if line.is_empty() {
            return Err(ProtocolError::InvalidCommand("Empty command".into()));
        }

        let mut tokens = Tokenizer::new(line);
        let cmd = tokens
            .next()
            .ok_or_else(|| ProtocolError::InvalidCommand("Empty command".into()))?
            .to_uppercase();

        match cmd.as_str() {
            "APPEND" => Self::parse_append(&mut tokens),
            "UPDATES" => Self::parse_updates(&mut tokens),
            "SNAPSHOT" => Self::parse_snapshot(&mut tokens),
            "COMPACT" => Self::parse_compact(&mut tokens),
            "ROOMS" => Ok(Command::rooms()),
            "INFO" => Ok(Command::info()),
            "PING" => Ok(Command::ping()),
            "QUIT" => Ok(Command::quit()),
            _ => Err(ProtocolError::InvalidCommand(format!(
                "Unknown command: {}",
                cmd
            ))),
        }
    }

    fn parse_append(tokens: &mut Tokenizer) -> ProtocolResult<Command> {
        let id = tokens
            .next()
            .ok_or_else(|| ProtocolError::MissingArgument("room_id".into()))?;
        let payload = tokens
            .rest()
            .ok_or_else(|| ProtocolError::MissingArgument("edits".into()))?;

        let edits: Vec<Edit> = serde_json::from_str(&payload)
            .map_err(|e| ProtocolError::InvalidJson(e.to_string()))?;

        Ok(Command::append(id.to_string(), edits))
    }

    fn parse_updates(tokens: &mut Tokenizer) -> ProtocolResult<Command> {
        let id = tokens
            .next()
            .ok_or_else(|| ProtocolError::MissingArgument("room_id".into()))?;
        let from_str = tokens
            .next()
            .ok_or_else(|| ProtocolError::MissingArgument("from".into()))?;
        let from: u64 = from_str
            .parse()
            .map_err(|_| ProtocolError::InvalidArgument(format!("Invalid cursor: {}", from_str)))?;

        Ok(Command::updates(id.to_string(), from))
    }

    fn parse_snapshot(tokens: &mut Tokenizer) -> ProtocolResult<Command> {
        let id = tokens
            .next()
            .ok_or_else(|| ProtocolError::MissingArgument("room_id".into()))?;

        Ok(Command::snapshot(id.to_string()))
    }

    fn parse_compact(tokens: &mut Tokenizer) -> ProtocolResult<Command> {
        let id = tokens
            .next()
            .ok_or_else(|| ProtocolError::MissingArgument("room_id".into()))?;
        let time_str = tokens
            .next()
            .ok_or_else(|| ProtocolError::MissingArgument("logical_time".into()))?;
        let logical_time: u64 = time_str.parse().map_err(|_| {
            ProtocolError::InvalidArgument(format!("Invalid logical time: {}", time_str))
        })?;
        let image_b64 = tokens
            .next()
            .ok_or_else(|| ProtocolError::MissingArgument("image".into()))?;
        let image = BASE64
            .decode(image_b64)
            .map_err(|e| ProtocolError::InvalidBase64(e.to_string()))?;

        Ok(Command::compact(id.to_string(), logical_time, image))
    }
}

impl Default for Parser {
    fn default() -> Self {
        Self::new()
    }
}

/// Simple tokenizer that handles quoted strings
struct Tokenizer<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Tokenizer<'a> {
    fn new(input: &'a str) -> Self {
        Self { input, pos: 0 }
    }

    fn next(&mut self) -> Option<&'a str> {
        // Skip whitespace
        while self.pos < self.input.len() && self.input[self.pos..].starts_with(' ') {
            self.pos += 1;
        }

        if self.pos >= self.input.len() {
            return None;
        }

        let remaining = &self.input[self.pos..];

        // Handle quoted string
        if remaining.starts_with('"') {
            if let Some(end) = remaining[1..].find('"') {
                let token = &remaining[1..end + 1];
                self.pos += end + 2;
                return Some(token);
            }
        }

        // Handle regular token
        let end = remaining.find(' ').unwrap_or(remaining.len());
        let token = &remaining[..end];
        self.pos += end;

        Some(token)
    }

    fn rest(&mut self) -> Option<String> {
        // Skip whitespace
        while self.pos < self.input.len() && self.input[self.pos..].starts_with(' ') {
            self.pos += 1;
        }

        if self.pos >= self.input.len() {
            return None;
        }

        let remaining = self.input[self.pos..].to_string();
        self.pos = self.input.len();
        Some(remaining)
    }
}
