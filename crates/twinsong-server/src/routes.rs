//! HTTP and WebSocket routes.
//!
//! A single `/ws` endpoint carries all client traffic. Each session must
//! open with a `login` frame; afterwards its requests flow into the run
//! manager's mailbox and it receives both direct replies and broadcast
//! events.

use std::sync::Arc;

use axum::{
    Router,
    extract::{
        State, WebSocketUpgrade,
        ws::{Message, WebSocket},
    },
    response::{IntoResponse, Json},
    routing::get,
};
use futures::{SinkExt, StreamExt, stream::SplitSink};
use tokio::sync::{broadcast, mpsc};
use tower_http::cors::CorsLayer;

use crate::manager::Command;
use crate::protocol::{ClientMessage, ServerMessage};

/// Application state shared across handlers.
pub struct AppState {
    /// Mailbox of the run-manager actor.
    pub manager: mpsc::UnboundedSender<Command>,
    /// Events fanned out to every logged-in session.
    pub broadcast: broadcast::Sender<ServerMessage>,
}

/// Create the router with all routes.
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/ws", get(ws_handler))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Health check handler.
async fn health_handler() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// WebSocket upgrade handler.
async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_websocket(socket, state))
}

type WsSender = Arc<tokio::sync::Mutex<SplitSink<WebSocket, Message>>>;

async fn forward(sender: &WsSender, message: &ServerMessage) -> bool {
    let Ok(json) = serde_json::to_string(message) else {
        return true;
    };
    sender
        .lock()
        .await
        .send(Message::Text(json.into()))
        .await
        .is_ok()
}

/// Handle one WebSocket session.
async fn handle_websocket(socket: WebSocket, state: Arc<AppState>) {
    let (sender, mut receiver) = socket.split();
    let sender: WsSender = Arc::new(tokio::sync::Mutex::new(sender));

    // Direct replies from the run manager to this session.
    let (reply_tx, mut reply_rx) = mpsc::unbounded_channel::<ServerMessage>();
    let reply_task = {
        let sender = sender.clone();
        tokio::spawn(async move {
            while let Some(message) = reply_rx.recv().await {
                if !forward(&sender, &message).await {
                    break;
                }
            }
        })
    };

    let mut broadcast_task: Option<tokio::task::JoinHandle<()>> = None;
    let mut logged_in = false;

    while let Some(frame) = receiver.next().await {
        match frame {
            Ok(Message::Text(text)) => {
                let message = match serde_json::from_str::<ClientMessage>(&text) {
                    Ok(message) => message,
                    Err(e) => {
                        // Malformed frames are dropped; the session stays open.
                        tracing::warn!("unparsable client frame: {} (input: {})", e, text);
                        continue;
                    }
                };

                if !logged_in {
                    if !matches!(message, ClientMessage::Login) {
                        tracing::warn!("frame before login dropped");
                        continue;
                    }
                    logged_in = true;
                    broadcast_task = Some(spawn_broadcast_forwarder(
                        state.broadcast.subscribe(),
                        sender.clone(),
                    ));
                    // Seed the fresh session with the current listing.
                    let _ = state.manager.send(Command::Client {
                        message: ClientMessage::QueryDir,
                        reply: reply_tx.clone(),
                    });
                    continue;
                }
                if matches!(message, ClientMessage::Login) {
                    continue;
                }

                if state
                    .manager
                    .send(Command::Client {
                        message,
                        reply: reply_tx.clone(),
                    })
                    .is_err()
                {
                    tracing::warn!("run manager is gone, closing session");
                    break;
                }
            }
            Ok(Message::Close(_)) => break,
            Err(e) => {
                tracing::warn!("WebSocket error: {}", e);
                break;
            }
            _ => {}
        }
    }

    reply_task.abort();
    if let Some(task) = broadcast_task {
        task.abort();
    }
}

fn spawn_broadcast_forwarder(
    mut rx: broadcast::Receiver<ServerMessage>,
    sender: WsSender,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(message) => {
                    if !forward(&sender, &message).await {
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!("session lagged, {} events dropped", skipped);
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    })
}

#[cfg(test)]
mod tests {
    #[test]
    fn test_health_json() {
        let health = serde_json::json!({
            "status": "ok",
            "version": env!("CARGO_PKG_VERSION")
        });
        assert_eq!(health["status"], "ok");
    }
}
