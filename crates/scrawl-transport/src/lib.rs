//! Scrawl Transport Layer
//!
//! Serves the SWP protocol over plain TCP. Long-polling `UPDATES` calls are
//! answered on the requesting connection, so no out-of-band push channel is
//! needed.

pub mod handler;
pub mod tcp;

pub use handler::ConnectionHandler;
pub use tcp::TcpServer;
