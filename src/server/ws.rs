//! WebSocket transport for broadcast events
//!
//! Each connection registers one subscriber through the tracker (so it
//! starts with the current collector position) and forwards every event as
//! a JSON text frame until either side goes away.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use futures::{SinkExt, StreamExt};

use crate::broadcast::Subscription;

use super::AppState;

/// Upgrade `GET /ws` to a subscriber connection
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let subscription = match state.tracker.subscribe().await {
        Ok(subscription) => subscription,
        Err(e) => {
            tracing::warn!(error = %e, "Could not register WebSocket subscriber");
            return;
        }
    };
    let id = subscription.id();
    tracing::info!(subscriber = id, "WebSocket client connected");

    forward_events(socket, subscription).await;

    state.broadcaster.unsubscribe(id);
    tracing::info!(subscriber = id, "WebSocket client disconnected");
}

async fn forward_events(socket: WebSocket, mut subscription: Subscription) {
    let (mut sender, mut receiver) = socket.split();

    loop {
        tokio::select! {
            event = subscription.recv() => {
                let Some(event) = event else { break };
                let text = match event.to_json() {
                    Ok(text) => text,
                    Err(e) => {
                        tracing::warn!(event = event.name(), error = %e, "Skipping unencodable event");
                        continue;
                    }
                };
                if sender.send(Message::Text(text.into())).await.is_err() {
                    break;
                }
            }
            incoming = receiver.next() => {
                match incoming {
                    Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                    // Inbound frames carry no meaning
                    Some(Ok(_)) => {}
                }
            }
        }
    }

    let _ = sender.close().await;
}
