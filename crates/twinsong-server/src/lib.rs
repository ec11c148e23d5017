//! Twinsong notebook server.
//!
//! # Architecture
//!
//! - **Manager**: a single actor owning all notebook, run and kernel state
//! - **Kernel**: subprocess handles with dedicated reader/writer tasks
//! - **Protocol**: client/server WebSocket message types
//! - **Routes**: the `/ws` endpoint and session plumbing
//! - **Watcher**: periodic working-directory scan behind `DirList` pushes

pub mod error;
pub mod kernel;
pub mod manager;
pub mod protocol;
pub mod routes;
pub mod watcher;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, mpsc};

pub use error::{ServerError, ServerResult};
pub use manager::{Command, RunManager};
pub use protocol::{ClientMessage, ServerMessage};
pub use routes::{AppState, create_router};

/// Capacity for the broadcast channel. If a session falls this far
/// behind, older events are dropped for it.
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Interval between working-directory scans.
const DIR_SCAN_INTERVAL: Duration = Duration::from_millis(500);

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Host address to bind to.
    pub host: String,
    /// Port to listen on.
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 4511,
        }
    }
}

/// Start the Twinsong server in the current working directory.
pub async fn serve(config: ServerConfig) -> ServerResult<()> {
    let base = std::env::current_dir()?;

    let (broadcast_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
    let (command_tx, command_rx) = mpsc::unbounded_channel();
    let (kernel_tx, kernel_rx) = mpsc::unbounded_channel();

    let manager = RunManager::new(base, broadcast_tx.clone(), kernel_tx);
    let manager_task = tokio::spawn(manager.run(command_rx, kernel_rx));

    // Periodic directory scan ticks.
    let scan_tx = command_tx.clone();
    let scan_task = tokio::spawn(async move {
        let mut interval = tokio::time::interval(DIR_SCAN_INTERVAL);
        loop {
            interval.tick().await;
            if scan_tx.send(Command::ScanDir).is_err() {
                break;
            }
        }
    });

    let state = Arc::new(AppState {
        manager: command_tx.clone(),
        broadcast: broadcast_tx,
    });
    let app = create_router(state);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .map_err(|_| ServerError::WebSocket(format!(
            "invalid address: {}:{}",
            config.host, config.port
        )))?;

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("twinsong server listening on http://{}", addr);

    // Handle Ctrl+C for graceful shutdown.
    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("received shutdown signal");
            let _ = shutdown_tx.send(());
        }
    });

    let server = axum::serve(listener, app).with_graceful_shutdown(async move {
        let _ = shutdown_rx.await;
    });
    server.await?;

    // Stop the actor; it closes every live kernel on the way out.
    let _ = command_tx.send(Command::Shutdown);
    let _ = manager_task.await;
    scan_task.abort();

    tracing::info!("server shutdown complete");
    Ok(())
}
