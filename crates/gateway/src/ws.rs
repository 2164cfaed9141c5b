//! Push channel for chat panels: every inbox notification is forwarded as a
//! JSON text frame. Clients only listen; anything they send is ignored.

use std::sync::Arc;

use {
    axum::{
        extract::{
            State, WebSocketUpgrade,
            ws::{Message, WebSocket},
        },
        response::IntoResponse,
    },
    futures::{SinkExt, stream::StreamExt},
    tokio::sync::broadcast::error::RecvError,
    tracing::{debug, info, warn},
};

use crate::{broadcast::Broadcaster, server::AppState};

/// `GET /ws`
pub async fn ws_upgrade_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
) -> impl IntoResponse {
    let broadcaster = Arc::clone(&state.gateway.broadcaster);
    ws.on_upgrade(move |socket| handle_connection(socket, broadcaster))
}

async fn handle_connection(socket: WebSocket, broadcaster: Arc<Broadcaster>) {
    let mut events = broadcaster.subscribe();
    let (mut ws_tx, mut ws_rx) = socket.split();
    info!(clients = broadcaster.client_count(), "ws: panel connected");

    let hello = serde_json::json!({"type": "hello", "version": env!("CARGO_PKG_VERSION")});
    if ws_tx
        .send(Message::Text(hello.to_string().into()))
        .await
        .is_err()
    {
        return;
    }

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Ok(frame) => {
                    if ws_tx.send(Message::Text(frame.into())).await.is_err() {
                        debug!("ws: write failed, closing");
                        break;
                    }
                },
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "ws: client fell behind, events dropped");
                },
                Err(RecvError::Closed) => break,
            },
            incoming = ws_rx.next() => match incoming {
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {},
                Some(Err(e)) => {
                    debug!(error = %e, "ws: read error");
                    break;
                },
            },
        }
    }

    info!("ws: panel disconnected");
}
