//! WebSocket transport adapter
//!
//! Each accepted connection becomes one engine subscriber. The socket is
//! split: engine updates flow out as JSON text frames, and the inbound half
//! is only watched for closure. The engine never learns what the transport
//! is; it just sees the subscriber channel.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
};
use futures::{SinkExt, StreamExt};
use tracing::{info, warn};

use crate::server::AppState;

pub async fn websocket_handler(
    State(state): State<AppState>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let (connection_id, mut updates) = state.engine.subscribe();
    info!(connection_id = %connection_id, "Viewer connected");

    let (mut sink, mut stream) = socket.split();

    loop {
        tokio::select! {
            update = updates.recv() => match update {
                Some(update) => {
                    let frame = match serde_json::to_string(&update) {
                        Ok(json) => json,
                        Err(e) => {
                            warn!(error = %e, "Failed to serialize update");
                            continue;
                        }
                    };
                    if sink.send(Message::Text(frame.into())).await.is_err() {
                        break;
                    }
                }
                // Engine shut down: close our side and let the viewer go
                None => {
                    let _ = sink.send(Message::Close(None)).await;
                    break;
                }
            },
            incoming = stream.next() => match incoming {
                // Viewers have nothing to say; ignore anything but closure
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                Some(Ok(_)) => {}
            },
        }
    }

    state.engine.unsubscribe(&connection_id);
    info!(connection_id = %connection_id, "Viewer disconnected");
}
