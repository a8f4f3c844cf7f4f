use std::time::{Duration, Instant};

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use futures::{SinkExt, StreamExt};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::{lock, SharedRelay};
use crate::protocol::ServerMessage;

/// HTTP surface: websocket upgrade on `/` and `/ws`, liveness on `/healthz`.
pub fn router(relay: SharedRelay) -> Router {
    Router::new()
        .route("/", get(ws_handler))
        .route("/ws", get(ws_handler))
        .route("/healthz", get(health))
        .with_state(relay)
}

async fn health() -> &'static str {
    "ok"
}

async fn ws_handler(State(relay): State<SharedRelay>, ws: WebSocketUpgrade) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(relay, socket))
}

async fn handle_socket(relay: SharedRelay, socket: WebSocket) {
    let (mut ws_tx, mut ws_rx) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<ServerMessage>();
    let conn = lock(&relay).connect(tx);

    let writer = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            let text = match serde_json::to_string(&msg) {
                Ok(text) => text,
                Err(e) => {
                    warn!(conn, error = %e, "failed to encode relay message");
                    continue;
                }
            };
            if ws_tx.send(Message::Text(text)).await.is_err() {
                break;
            }
        }
    });

    while let Some(frame) = ws_rx.next().await {
        match frame {
            Ok(Message::Text(text)) => lock(&relay).handle_text(conn, &text),
            Ok(Message::Close(_)) => break,
            Ok(_) => {}
            Err(e) => {
                debug!(conn, error = %e, "websocket error");
                break;
            }
        }
    }

    lock(&relay).disconnect(conn);
    writer.abort();
}

/// Periodically delete rooms past their time-to-live.
pub fn spawn_sweeper(relay: SharedRelay, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        // The first tick completes immediately.
        interval.tick().await;
        loop {
            interval.tick().await;
            let removed = lock(&relay).sweep(Instant::now());
            if !removed.is_empty() {
                info!(count = removed.len(), "swept expired rooms");
            }
        }
    })
}

/// Serve the relay on `listener` until the server fails.
pub async fn serve(listener: TcpListener, relay: SharedRelay) -> anyhow::Result<()> {
    let every = lock(&relay).config().sweep_interval;
    let sweeper = spawn_sweeper(relay.clone(), every);
    info!("relay listening on {}", listener.local_addr()?);
    let result = axum::serve(listener, router(relay)).await;
    sweeper.abort();
    result.map_err(Into::into)
}
