//! # routes::monitor
//!
//! | Method    | Path           | Description                                 |
//! |-----------|----------------|---------------------------------------------|
//! | GET       | `/api/health`  | Liveness plus a few counters (no auth)      |
//! | GET (WS)  | `/ws/monitor`  | Live stream of [`MonitorEvent`] JSON frames |
//!
//! [`MonitorEvent`]: crate::events::MonitorEvent

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
    Json,
};
use futures_util::{SinkExt, StreamExt};
use serde_json::json;
use tracing::{debug, info};

use crate::error::AppError;
use crate::state::SharedState;

/// GET /api/health
pub async fn health_check(State(state): State<SharedState>) -> impl IntoResponse {
    Json(json!({
        "ok":            true,
        "service":       env!("CARGO_PKG_NAME"),
        "version":       env!("CARGO_PKG_VERSION"),
        "can_notify":    state.notifier.can_post_notification(),
        "monitor_clients": state.broadcast_tx.receiver_count(),
        "notification_ids": state.ids.len(),
    }))
}

// ─── WebSocket ────────────────────────────────────────────────────────────────

/// GET /ws/monitor
pub async fn ws_monitor(
    ws: WebSocketUpgrade,
    State(state): State<SharedState>,
) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: SharedState) {
    let mut rx = state.broadcast_tx.subscribe();
    let (mut sender, mut receiver) = socket.split();

    info!("🔌 monitor client connected");

    let snapshot = match snapshot(&state).await {
        Ok(snapshot) => snapshot,
        Err(e) => json!({ "event": "SNAPSHOT", "error": e.to_string() }).to_string(),
    };
    if sender.send(Message::Text(snapshot)).await.is_err() {
        return;
    }

    loop {
        tokio::select! {
            result = rx.recv() => {
                match result {
                    Ok(frame) => {
                        if sender.send(Message::Text(frame)).await.is_err() {
                            break;
                        }
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                        debug!("monitor client lagged, skipped {n} events");
                    }
                    Err(_) => break,
                }
            }

            result = receiver.next() => {
                match result {
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(Message::Ping(data))) => {
                        let _ = sender.send(Message::Pong(data)).await;
                    }
                    _ => {}
                }
            }
        }
    }

    info!("🔌 monitor client disconnected");
}

/// What a freshly connected client needs before the live stream starts.
async fn snapshot(state: &SharedState) -> Result<String, AppError> {
    let active_alerts = state.repos.price_alerts.query_active().await?;
    let movers = state.repos.big_movers.query().await?;
    let tracked = state.repos.tracked_symbols().await?;

    Ok(json!({
        "event":         "SNAPSHOT",
        "tracked":       tracked,
        "active_alerts": active_alerts,
        "movers":        movers,
    })
    .to_string())
}
