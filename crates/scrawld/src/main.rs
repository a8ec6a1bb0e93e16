//! Scrawl Daemon (scrawld)
//!
//! The server process for Scrawl - shared drawing room synchronization.
//!
//! # Usage
//!
//! ```bash
//! # Start with defaults (TCP on 7620, in-memory storage)
//! scrawld
//!
//! # With persistence
//! scrawld --db /var/lib/scrawl/rooms.db
//!
//! # Custom maintenance timing
//! scrawld --save-interval-secs 15 --idle-timeout-secs 600
//!
//! # With a configuration file
//! scrawld --config /etc/scrawl/scrawl.toml
//! ```

mod config;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use scrawl_core::store::RoomStore;
use scrawl_core::{MaintenanceConfig, RoomRegistry};
use scrawl_storage::{MemoryStore, SqliteStore};
use scrawl_transport::TcpServer;

use crate::config::FileConfig;

/// Scrawl Daemon - shared drawing room synchronization
#[derive(Parser, Debug)]
#[command(name = "scrawld")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// TCP port to listen on (default: 7620)
    #[arg(long, env = "SCRAWL_PORT")]
    port: Option<u16>,

    /// Bind address (default: 0.0.0.0)
    #[arg(long, env = "SCRAWL_BIND")]
    bind: Option<String>,

    /// Configuration file path
    #[arg(short, long, env = "SCRAWL_CONFIG")]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "SCRAWL_LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// SQLite database path for persistence (default: in-memory only)
    #[arg(long, env = "SCRAWL_DB")]
    db: Option<PathBuf>,

    /// Seconds between per-room maintenance cycles (default: 30)
    #[arg(long, env = "SCRAWL_SAVE_INTERVAL")]
    save_interval_secs: Option<u64>,

    /// Seconds a room may stay unaccessed before eviction (default: 300)
    #[arg(long, env = "SCRAWL_IDLE_TIMEOUT")]
    idle_timeout_secs: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();

    // Print banner
    print_banner();

    let file = match &args.config {
        Some(path) => {
            info!(path = %path.display(), "Loading configuration file");
            FileConfig::load(path)?
        }
        None => FileConfig::default(),
    };

    let bind = args.bind.or(file.bind).unwrap_or_else(|| "0.0.0.0".into());
    let port = args.port.or(file.port).unwrap_or(7620);
    let db = args.db.or(file.db);
    let maintenance = MaintenanceConfig {
        period: Duration::from_secs(args.save_interval_secs.or(file.save_interval_secs).unwrap_or(30)),
        idle_timeout: Duration::from_secs(args.idle_timeout_secs.or(file.idle_timeout_secs).unwrap_or(300)),
    };

    // Pick the storage backend
    let store: Arc<dyn RoomStore> = match &db {
        Some(db_path) => {
            info!(path = %db_path.display(), "Initializing SQLite persistence");
            match SqliteStore::new(db_path) {
                Ok(store) => {
                    info!("SQLite persistence enabled");
                    Arc::new(store)
                }
                Err(e) => {
                    warn!(error = %e, "Failed to initialize SQLite, running in-memory only");
                    Arc::new(MemoryStore::new())
                }
            }
        }
        None => {
            info!("Running in-memory only (no --db specified)");
            Arc::new(MemoryStore::new())
        }
    };

    let registry = Arc::new(RoomRegistry::new(store, maintenance));

    info!(
        port = port,
        bind = %bind,
        save_interval_secs = maintenance.period.as_secs(),
        idle_timeout_secs = maintenance.idle_timeout.as_secs(),
        "Starting scrawld"
    );

    let addr: SocketAddr = format!("{}:{}", bind, port).parse()?;
    let server = TcpServer::new(registry.clone(), addr);
    let server_task = tokio::spawn(async move {
        if let Err(e) = server.run().await {
            tracing::error!(error = %e, "TCP server error");
        }
    });

    // Wait for shutdown signal
    tokio::signal::ctrl_c().await?;
    info!("Shutting down...");

    // Flush dirty rooms; maintenance would catch them eventually, but not
    // after the process exits.
    registry.save_all().await;
    server_task.abort();

    Ok(())
}

fn print_banner() {
    println!(
        r#"
  ╔═╗╔═╗╦═╗╔═╗╦ ╦╦
  ╚═╗║  ╠╦╝╠═╣║║║║
  ╚═╝╚═╝╩╚═╩ ╩╚╩╝╩═╝
  Shared Drawing Room Synchronization
  Version {}
"#,
        env!("CARGO_PKG_VERSION")
    );
}
