//! SWP response types

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use bytes::{BufMut, BytesMut};

/// A SWP response
#[derive(Debug, Clone)]
pub enum Response {
    /// +OK [message]
    Ok(Option<String>),

    /// -ERR <code> <message>
    Error { code: String, message: String },

    /// $<length>\r\n<data>
    Bulk(Vec<u8>),

    /// *<count>\r\n<items>
    Array(Vec<Response>),

    /// #<time> <base64 image>
    Snapshot { logical_time: u64, image: Vec<u8> },

    /// :<integer>
    Integer(i64),

    /// Null response
    Null,

    /// PONG
    Pong,
}

impl Response {
    pub fn ok() -> Self {
        Response::Ok(None)
    }

    pub fn ok_with_message(msg: impl Into<String>) -> Self {
        Response::Ok(Some(msg.into()))
    }

    pub fn error(code: impl Into<String>, message: impl Into<String>) -> Self {
        Response::Error {
            code: code.into(),
            message: message.into(),
        }
    }

    pub fn bulk(data: impl Into<Vec<u8>>) -> Self {
        Response::Bulk(data.into())
    }

    pub fn integer(n: i64) -> Self {
        Response::Integer(n)
    }

    pub fn snapshot(logical_time: u64, image: Vec<u8>) -> Self {
        Response::Snapshot {
            logical_time,
            image,
        }
    }

    pub fn array(items: Vec<Response>) -> Self {
        Response::Array(items)
    }

    pub fn null() -> Self {
        Response::Null
    }

    pub fn pong() -> Self {
        Response::Pong
    }

    /// Encode the response to bytes
    pub fn encode(&self) -> BytesMut {
        let mut buf = BytesMut::new();
        self.encode_into(&mut buf);
        buf
    }

    /// Encode the response into an existing buffer
    pub fn encode_into(&self, buf: &mut BytesMut) {
        match self {
            Response::Ok(None) => {
                buf.put_slice(b"+OK\r\n");
            }
            Response::Ok(Some(msg)) => {
                buf.put_slice(b"+OK ");
                buf.put_slice(msg.as_bytes());
                buf.put_slice(b"\r\n");
            }
            Response::Error { code, message } => {
                buf.put_slice(b"-ERR ");
                buf.put_slice(code.as_bytes());
                buf.put_slice(b" ");
                buf.put_slice(message.as_bytes());
                buf.put_slice(b"\r\n");
            }
            Response::Bulk(data) => {
                buf.put_slice(b"$");
                buf.put_slice(data.len().to_string().as_bytes());
                buf.put_slice(b"\r\n");
                buf.put_slice(data);
                buf.put_slice(b"\r\n");
            }
            Response::Array(items) => {
                buf.put_slice(b"*");
                buf.put_slice(items.len().to_string().as_bytes());
                buf.put_slice(b"\r\n");
                for item in items {
                    item.encode_into(buf);
                }
            }
            Response::Snapshot {
                logical_time,
                image,
            } => {
                buf.put_slice(b"#");
                buf.put_slice(logical_time.to_string().as_bytes());
                buf.put_slice(b" ");
                // Images travel base64-encoded on the text protocol.
                buf.put_slice(BASE64.encode(image).as_bytes());
                buf.put_slice(b"\r\n");
            }
            Response::Integer(n) => {
                buf.put_slice(b":");
                buf.put_slice(n.to_string().as_bytes());
                buf.put_slice(b"\r\n");
            }
            Response::Null => {
                buf.put_slice(b"$-1\r\n");
            }
            Response::Pong => {
                buf.put_slice(b"+PONG\r\n");
            }
        }
    }
}
