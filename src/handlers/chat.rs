use axum::{
    extract::ws::{Message, WebSocket, WebSocketUpgrade},
    extract::State,
    response::IntoResponse,
};
use futures::{SinkExt, StreamExt};
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::models::ChatFrame;
use crate::observability::Metrics;
use crate::services::ChatHub;

/// State for the chat channel
#[derive(Clone)]
pub struct ChatState {
    pub hub: Arc<ChatHub>,
    pub metrics: Arc<Metrics>,
}

/// GET /ws — upgrade into the chat hub
pub async fn chat_ws(State(state): State<ChatState>, ws: WebSocketUpgrade) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_chat_connection(socket, state))
}

async fn handle_chat_connection(socket: WebSocket, state: ChatState) {
    let connection_id = Uuid::new_v4();
    info!(connection_id = %connection_id, "Chat client connected");

    // Subscribe before announcing so this connection sees its own join count
    let mut rx = state.hub.subscribe();
    let count = state.hub.client_joined();
    state.metrics.set_chat_clients(count);

    let (mut ws_sink, mut ws_stream) = socket.split();

    loop {
        tokio::select! {
            // Incoming frame from this client
            msg = ws_stream.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        handle_client_frame(&text, connection_id, &state);
                    }
                    Some(Ok(Message::Ping(data))) => {
                        let _ = ws_sink.send(Message::Pong(data)).await;
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        info!(connection_id = %connection_id, "Chat client closed connection");
                        break;
                    }
                    Some(Err(e)) => {
                        warn!(connection_id = %connection_id, "WebSocket error: {}", e);
                        break;
                    }
                    _ => {} // Binary, Pong — ignore
                }
            }

            // Frame published on the hub
            envelope = rx.recv() => {
                match envelope {
                    Ok(envelope) => {
                        // Chat and feedback frames go to everyone except
                        // their sender; system frames carry no origin
                        if envelope.origin == Some(connection_id) {
                            continue;
                        }
                        match serde_json::to_string(&envelope.frame) {
                            Ok(json) => {
                                if ws_sink.send(Message::Text(json)).await.is_err() {
                                    break;
                                }
                            }
                            Err(e) => warn!("Failed to encode chat frame: {}", e),
                        }
                    }
                    Err(RecvError::Lagged(missed)) => {
                        // At-most-once delivery: missed frames are dropped
                        debug!(connection_id = %connection_id, missed, "Chat subscriber lagged");
                        continue;
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        }
    }

    let _ = ws_sink.close().await;

    let count = state.hub.client_left();
    state.metrics.set_chat_clients(count);
    info!(connection_id = %connection_id, "Chat client disconnected");
}

fn handle_client_frame(text: &str, connection_id: Uuid, state: &ChatState) {
    let frame: ChatFrame = match serde_json::from_str(text) {
        Ok(frame) => frame,
        Err(e) => {
            warn!(connection_id = %connection_id, "Invalid chat frame: {}", e);
            return;
        }
    };

    match frame {
        ChatFrame::ChatMessage { .. } => {
            state.metrics.record_chat_frame("chat-message");
            state.hub.relay_from(connection_id, frame);
        }
        ChatFrame::Feedback { .. } => {
            state.metrics.record_chat_frame("feedback");
            state.hub.relay_from(connection_id, frame);
        }
        _ => {
            debug!(connection_id = %connection_id, "Ignoring unexpected frame from chat client");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_state() -> ChatState {
        ChatState {
            hub: Arc::new(ChatHub::new(8)),
            metrics: Arc::new(Metrics::new().unwrap()),
        }
    }

    #[tokio::test]
    async fn test_client_frame_is_relayed_to_others() {
        let state = test_state();
        let mut rx = state.hub.subscribe();
        let sender = Uuid::new_v4();

        handle_client_frame(
            r#"{"type":"chat-message","data":{"message":"hola"}}"#,
            sender,
            &state,
        );

        let envelope = rx.recv().await.unwrap();
        assert_eq!(envelope.origin, Some(sender));
        assert!(matches!(envelope.frame, ChatFrame::ChatMessage { .. }));
    }

    #[tokio::test]
    async fn test_feedback_frame_is_relayed() {
        let state = test_state();
        let mut rx = state.hub.subscribe();

        handle_client_frame(
            r#"{"type":"feedback","data":{"feedback":"Ana is typing"}}"#,
            Uuid::new_v4(),
            &state,
        );

        let envelope = rx.recv().await.unwrap();
        assert!(matches!(envelope.frame, ChatFrame::Feedback { .. }));
    }

    #[tokio::test]
    async fn test_invalid_frame_is_dropped() {
        let state = test_state();
        let mut rx = state.hub.subscribe();

        handle_client_frame("not json", Uuid::new_v4(), &state);

        // Nothing published
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_system_frame_from_client_is_ignored() {
        let state = test_state();
        let mut rx = state.hub.subscribe();

        handle_client_frame(r#"{"type":"clients-total","count":99}"#, Uuid::new_v4(), &state);

        assert!(rx.try_recv().is_err());
    }
}
