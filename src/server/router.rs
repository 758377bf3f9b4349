//! HTTP surface (§6): a single bidirectional WebSocket channel for
//! inbound `task`/`stop`/`confirmation` messages and outbound `log`/
//! `screenshot`/`status`/`error` events, plus static file serving for
//! screenshot artifacts under `/artifacts/<sessionId>/step-<NNNN>.png`.
use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use futures_util::stream::StreamExt;
use futures_util::SinkExt;
use tokio::sync::Mutex as AsyncMutex;
use tower_http::services::ServeDir;

use crate::channel::{ClientChannel, InboundMessage};

use super::rate_limit::RateLimitKind;
use super::state::ServeState;

pub fn build_router(state: ServeState) -> Router {
    let artifacts_dir = state.config.artifacts_dir.clone();
    Router::new()
        .route("/ws", get(ws_handler))
        .nest_service("/artifacts", ServeDir::new(artifacts_dir))
        .with_state(state)
}

async fn ws_handler(ws: WebSocketUpgrade, State(state): State<ServeState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: ServeState) {
    let (sender, mut receiver) = socket.split();
    let sender = Arc::new(AsyncMutex::new(sender));

    while let Some(Ok(msg)) = receiver.next().await {
        let Message::Text(text) = msg else { continue };
        let Ok(inbound) = serde_json::from_str::<InboundMessage>(&text) else {
            let _ = send_error(&sender, "malformed inbound message").await;
            continue;
        };

        match inbound {
            InboundMessage::Task { task, session_id } => {
                let client_ip = "ws-client";
                if !state.rate_limiter.allow(client_ip, RateLimitKind::Task) {
                    let _ = send_error(&sender, "rate limit exceeded").await;
                    continue;
                }

                let id = session_id.unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
                let channel = ClientChannel::new(id.clone());
                spawn_forwarder(channel.clone(), sender.clone());

                let orchestrator = state.orchestrator.clone();
                tokio::spawn(async move {
                    if let Err(err) = orchestrator.handle_task(task, Some(id), Some(channel)).await {
                        tracing::error!(error = %err, "session task failed");
                    }
                });
            }
            InboundMessage::Stop { session_id } => {
                let orchestrator = state.orchestrator.clone();
                if let Err(err) = orchestrator.handle_stop(&session_id).await {
                    let _ = send_error(&sender, &err.to_string()).await;
                }
            }
            InboundMessage::Confirmation { session_id, approved, action_id } => {
                let orchestrator = state.orchestrator.clone();
                if let Err(err) = orchestrator
                    .handle_confirmation(&session_id, approved, action_id)
                    .await
                {
                    let _ = send_error(&sender, &err.to_string()).await;
                }
            }
        }
    }
}

type WsSender = Arc<AsyncMutex<futures_util::stream::SplitSink<WebSocket, Message>>>;

/// Subscribes to a session's client channel and forwards every published
/// event to the socket as a JSON text frame, until the subscriber lags
/// or the socket closes. Best-effort per §5: a disconnected client is
/// simply a broadcast channel with no active receiver.
fn spawn_forwarder(channel: ClientChannel, sender: WsSender) {
    tokio::spawn(async move {
        let mut rx = channel.subscribe();
        loop {
            match rx.recv().await {
                Ok(event) => {
                    let Ok(text) = serde_json::to_string(&event) else { continue };
                    let mut guard = sender.lock().await;
                    if guard.send(Message::Text(text)).await.is_err() {
                        return;
                    }
                }
                Err(tokio::sync::broadcast::error::RecvError::Closed) => return,
                Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => continue,
            }
        }
    });
}

async fn send_error(sender: &WsSender, message: &str) -> Result<(), axum::Error> {
    let event = serde_json::json!({ "type": "error", "data": { "message": message } });
    let mut guard = sender.lock().await;
    guard.send(Message::Text(event.to_string())).await
}
