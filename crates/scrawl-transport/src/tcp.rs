//! TCP transport for Scrawl

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use scrawl_core::RoomRegistry;
use scrawl_protocol::{CommandKind, Parser, Response};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tracing::{error, info};

use crate::handler::ConnectionHandler;

/// TCP server for Scrawl
pub struct TcpServer {
    registry: Arc<RoomRegistry>,
    addr: SocketAddr,
    client_counter: AtomicU64,
}

impl TcpServer {
    pub fn new(registry: Arc<RoomRegistry>, addr: SocketAddr) -> Self {
        Self {
            registry,
            addr,
            client_counter: AtomicU64::new(0),
        }
    }

    /// Start the TCP server
    pub async fn run(&self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let listener = TcpListener::bind(self.addr).await?;
        info!(addr = %self.addr, "Scrawl TCP server listening");

        loop {
            match listener.accept().await {
                Ok((stream, peer_addr)) => {
                    let client_id = format!(
                        "tcp:{}:{}",
                        peer_addr,
                        self.client_counter.fetch_add(1, Ordering::Relaxed)
                    );
                    let registry = self.registry.clone();

                    tokio::spawn(async move {
                        if let Err(e) =
                            Self::handle_connection(stream, client_id.clone(), registry).await
                        {
                            error!(client = %client_id, error = %e, "Connection error");
                        }
                    });
                }
                Err(e) => {
                    error!(error = %e, "Failed to accept connection");
                }
            }
        }
    }

    async fn handle_connection(
        mut stream: TcpStream,
        client_id: String,
        registry: Arc<RoomRegistry>,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        info!(client = %client_id, "Client connected");

        let handler = ConnectionHandler::new(client_id.clone(), registry);
        let mut parser = Parser::new();
        let mut buf = vec![0u8; 4096];

        loop {
            let n = match stream.read(&mut buf).await {
                Ok(0) => {
                    info!(client = %client_id, "Client disconnected");
                    return Ok(());
                }
                Ok(n) => n,
                Err(e) => {
                    error!(client = %client_id, error = %e, "Read error");
                    return Ok(());
                }
            };

            if let Err(e) = parser.feed(&buf[..n]) {
                // An overfull buffer cannot recover; report and hang up.
                let data = Response::error("PARSE_ERROR", e.to_string()).encode();
                stream.write_all(&data).await?;
                return Ok(());
            }

            loop {
                match parser.parse() {
                    Ok(Some(cmd)) => {
                        let quit = matches!(cmd.kind, CommandKind::Quit);
                        let response = handler.handle(cmd).await;
                        stream.write_all(&response.encode()).await?;
                        if quit {
                            info!(client = %client_id, "Client disconnected");
                            return Ok(());
                        }
                    }
                    Ok(None) => break, // Need more data
                    Err(e) => {
                        let data = Response::error("PARSE_ERROR", e.to_string()).encode();
                        stream.write_all(&data).await?;
                        break;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::engine::general_purpose::STANDARD as BASE64;
    use base64::Engine as _;
    use scrawl_core::MaintenanceConfig;
    use scrawl_storage::MemoryStore;
    use std::time::Duration;
    use tokio::io::{AsyncBufReadExt, BufReader};

    async fn spawn_server() -> (SocketAddr, Arc<RoomRegistry>) {
        let registry = Arc::new(RoomRegistry::new(
            Arc::new(MemoryStore::new()),
            MaintenanceConfig::default(),
        ));
        let listener = TcpListener::bind("127.0.0.1:0".parse::<SocketAddr>().unwrap())
            .await
            .unwrap();
        let addr = listener.local_addr().unwrap();

        let accept_registry = registry.clone();
        tokio::spawn(async move {
            let mut next = 0u64;
            loop {
                let (stream, _) = listener.accept().await.unwrap();
                let client_id = format!("test:{}", next);
                next += 1;
                let registry = accept_registry.clone();
                tokio::spawn(async move {
                    let _ = TcpServer::handle_connection(stream, client_id, registry).await;
                });
            }
        });

        (addr, registry)
    }

    async fn read_line(reader: &mut BufReader<TcpStream>) -> String {
        let mut line = String::new();
        reader.read_line(&mut line).await.unwrap();
        line.trim_end().to_string()
    }

    #[tokio::test]
    async fn test_tcp_ping_pong() {
        let (addr, _registry) = spawn_server().await;

        let mut client = BufReader::new(TcpStream::connect(addr).await.unwrap());
        client
            .get_mut()
            .write_all(b"PING\r\n")
            .await
            .unwrap();
        assert_eq!(read_line(&mut client).await, "+PONG");

        client.get_mut().write_all(b"QUIT\r\n").await.unwrap();
        assert_eq!(read_line(&mut client).await, "+OK Goodbye");
    }

    #[tokio::test]
    async fn test_append_then_long_poll_wakes_other_client() {
        let (addr, _registry) = spawn_server().await;

        let mut poller = BufReader::new(TcpStream::connect(addr).await.unwrap());
        poller
            .get_mut()
            .write_all(b"UPDATES board:1 0\r\n")
            .await
            .unwrap();
        // Give the poller time to park in the wait set.
        tokio::time::sleep(Duration::from_millis(50)).await;

        let mut writer = BufReader::new(TcpStream::connect(addr).await.unwrap());
        writer
            .get_mut()
            .write_all(b"APPEND board:1 [{\"stroke\":1}]\r\n")
            .await
            .unwrap();
        assert_eq!(read_line(&mut writer).await, ":1");

        assert_eq!(read_line(&mut poller).await, "*1");
        assert_eq!(read_line(&mut poller).await, "$12");
        assert_eq!(read_line(&mut poller).await, "{\"stroke\":1}");
    }

    #[tokio::test]
    async fn test_compact_and_snapshot_round_trip() {
        let (addr, _registry) = spawn_server().await;

        let mut client = BufReader::new(TcpStream::connect(addr).await.unwrap());
        client
            .get_mut()
            .write_all(b"APPEND board:2 [{\"stroke\":1},{\"stroke\":2}]\r\n")
            .await
            .unwrap();
        assert_eq!(read_line(&mut client).await, ":2");

        let image = BASE64.encode(b"png-bytes");
        let compact = format!("COMPACT board:2 2 {}\r\n", image);
        client.get_mut().write_all(compact.as_bytes()).await.unwrap();
        assert_eq!(read_line(&mut client).await, "+OK");

        client
            .get_mut()
            .write_all(b"SNAPSHOT board:2\r\n")
            .await
            .unwrap();
        assert_eq!(read_line(&mut client).await, format!("#2 {}", image));

        // The compacted prefix is gone from the catch-up path.
        client
            .get_mut()
            .write_all(b"UPDATES board:2 0\r\n")
            .await
            .unwrap();
        let err = read_line(&mut client).await;
        assert!(err.starts_with("-ERR STALE_CURSOR"), "got {:?}", err);
    }

    #[tokio::test]
    async fn test_error_codes_on_bad_requests() {
        let (addr, _registry) = spawn_server().await;

        let mut client = BufReader::new(TcpStream::connect(addr).await.unwrap());

        client
            .get_mut()
            .write_all(b"APPEND board:3 []\r\n")
            .await
            .unwrap();
        assert!(read_line(&mut client).await.starts_with("-ERR EMPTY_BATCH"));

        client
            .get_mut()
            .write_all(b"SNAPSHOT board:3\r\n")
            .await
            .unwrap();
        assert!(read_line(&mut client).await.starts_with("-ERR NO_SNAPSHOT"));

        client
            .get_mut()
            .write_all(b"APPEND bad/id [{\"stroke\":1}]\r\n")
            .await
            .unwrap();
        assert!(read_line(&mut client).await.starts_with("-ERR INVALID_ID"));

        client.get_mut().write_all(b"NOPE\r\n").await.unwrap();
        assert!(read_line(&mut client).await.starts_with("-ERR PARSE_ERROR"));
    }
}
