use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use futures_util::{SinkExt, StreamExt};
use roomsync_sync::{ClientEvent, ServerEvent, SyncError};
use std::sync::Arc;

use crate::error::GatewayResult;
use crate::state::GatewayState;

pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<GatewayState>>,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: Arc<GatewayState>) {
    let (mut ws_sender, mut receiver) = socket.split();
    let (mut connection, mut out_rx) = state.engine.open().await;
    let connection_id = connection.id();

    tracing::info!(%connection_id, "websocket connected");

    let sender_task = tokio::spawn(async move {
        while let Some(event) = out_rx.recv().await {
            let json = match encode_event(&event) {
                Ok(json) => json,
                Err(e) => {
                    tracing::error!(%connection_id, event = event.name(), error = %e, "failed to encode server event");
                    continue;
                }
            };
            if let Err(e) = ws_sender.send(Message::Text(json)).await {
                tracing::debug!(%connection_id, error = %e, "failed to send websocket message");
                break;
            }
        }
        tracing::debug!(%connection_id, "websocket sender task ended");
    });

    while let Some(msg) = receiver.next().await {
        match msg {
            Ok(Message::Text(text)) => {
                let event = match decode_event(&text) {
                    Ok(event) => event,
                    Err(e) => {
                        tracing::warn!(%connection_id, error = %e, "dropping malformed frame");
                        continue;
                    }
                };
                match connection.handle(event).await {
                    Ok(()) => {}
                    Err(SyncError::Closed) => break,
                    Err(e) => {
                        tracing::error!(%connection_id, error = %e, "failed to handle client event");
                        break;
                    }
                }
            }
            Ok(Message::Close(_)) => {
                tracing::debug!(%connection_id, "client initiated close");
                break;
            }
            Err(e) => {
                tracing::debug!(%connection_id, error = %e, "websocket error");
                break;
            }
            _ => {
                // Ping, pong and binary frames carry no protocol events
            }
        }
    }

    connection.close().await;
    sender_task.abort();
    tracing::info!(%connection_id, "websocket disconnected");
}

fn decode_event(text: &str) -> GatewayResult<ClientEvent> {
    Ok(serde_json::from_str(text)?)
}

fn encode_event(event: &ServerEvent) -> GatewayResult<String> {
    Ok(serde_json::to_string(event)?)
}
