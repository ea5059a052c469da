//! WebSocket feed of live analytics snapshots.

use std::sync::Arc;

use axum::{
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::Response,
};
use futures_util::{SinkExt, StreamExt};
use tracing::{debug, warn};

use crate::routes::AppState;

pub(crate) async fn analytics_ws(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> Response {
    ws.on_upgrade(move |socket| serve_socket(socket, state))
}

/// Register the socket as a subscriber and forward snapshots until either
/// side goes away.
async fn serve_socket(mut socket: WebSocket, state: Arc<AppState>) {
    let (id, mut rx) = match state.analytics.subscribe().await {
        Ok(subscription) => subscription,
        Err(e) => {
            warn!(error = %e, "analytics subscription failed");
            let _ = socket.send(Message::Close(None)).await;
            return;
        }
    };
    debug!(subscriber = id, "websocket subscribed");

    let (mut sink, mut stream) = socket.split();

    loop {
        tokio::select! {
            envelope = rx.recv() => {
                // None means the registry dropped this subscriber.
                let Some(envelope) = envelope else {
                    debug!(subscriber = id, "subscription ended by registry");
                    let _ = sink.send(Message::Close(None)).await;
                    break;
                };
                let text = match serde_json::to_string(envelope.as_ref()) {
                    Ok(text) => text,
                    Err(e) => {
                        warn!(subscriber = id, error = %e, "failed to encode snapshot");
                        continue;
                    }
                };
                if let Err(e) = sink.send(Message::Text(text.into())).await {
                    debug!(subscriber = id, error = %e, "websocket send failed");
                    break;
                }
            }

            incoming = stream.next() => {
                match incoming {
                    Some(Ok(Message::Close(_))) | None => {
                        debug!(subscriber = id, "websocket closed by client");
                        break;
                    }
                    Some(Ok(_)) => {
                        // Client messages carry no meaning; pings are answered by axum.
                    }
                    Some(Err(e)) => {
                        debug!(subscriber = id, error = %e, "websocket read error");
                        break;
                    }
                }
            }
        }
    }

    state.analytics.unsubscribe(id).await;
}
