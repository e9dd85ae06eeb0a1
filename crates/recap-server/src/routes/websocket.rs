use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use futures::{SinkExt, StreamExt};
use recap_events::{send_event, subscribe_to_all_events};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error};

use crate::server::AppState;

/// Messages a live-recording client may send.
#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ClientMessage {
    StartRecording,
    AudioData {
        session_id: String,
        audio_blob: String,
    },
    StopRecording {
        session_id: String,
    },
}

pub(crate) async fn ws_live_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// One connection drives at most one live recording session and also
/// receives every terminal pipeline event broadcast on the bus.
async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let (mut sender, mut receiver) = socket.split();
    let mut events = Box::pin(subscribe_to_all_events());

    loop {
        tokio::select! {
            message = receiver.next() => {
                match message {
                    Some(Ok(Message::Text(text))) => {
                        let reply = handle_client_message(&state, &text).await;
                        if sender
                            .send(Message::Text(serde_json::to_string(&reply).unwrap_or_default()))
                            .await
                            .is_err()
                        {
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        debug!("websocket receive error: {}", e);
                        break;
                    }
                }
            }
            event = events.next() => {
                if let Some(event) = event {
                    if event.name == "processing_complete" || event.name == "processing_error" {
                        let payload = json!({"event": event.name, "data": event.data});
                        if sender
                            .send(Message::Text(payload.to_string()))
                            .await
                            .is_err()
                        {
                            break;
                        }
                    }
                }
            }
            _ = tokio::time::sleep(Duration::from_secs(30)) => {
                if sender.send(Message::Ping(vec![])).await.is_err() {
                    break;
                }
            }
        }
    }

    debug!("websocket connection closed");
}

async fn handle_client_message(state: &Arc<AppState>, text: &str) -> Value {
    let message: ClientMessage = match serde_json::from_str(text) {
        Ok(message) => message,
        Err(e) => {
            return json!({
                "event": "audio_error",
                "data": {"error": format!("invalid message: {}", e)},
            })
        }
    };

    match message {
        ClientMessage::StartRecording => match state.ingestor.begin_live_session().await {
            Ok(session_id) => {
                let _ = send_event("recording_started", json!({"session_id": &session_id}));
                json!({
                    "event": "recording_started",
                    "data": {"session_id": session_id},
                })
            }
            Err(e) => {
                error!("could not start live session: {}", e);
                json!({"event": "audio_error", "data": {"error": e.to_string()}})
            }
        },
        ClientMessage::AudioData {
            session_id,
            audio_blob,
        } => {
            // Browsers send data-url payloads; the base64 part follows the comma.
            let encoded = audio_blob
                .rsplit_once(',')
                .map(|(_, rest)| rest)
                .unwrap_or(&audio_blob);
            let payload = match BASE64.decode(encoded) {
                Ok(payload) => payload,
                Err(e) => {
                    return json!({
                        "event": "audio_error",
                        "data": {"session_id": session_id, "error": format!("invalid audio payload: {}", e)},
                    })
                }
            };
            match state.ingestor.append_live_audio(&session_id, &payload).await {
                Ok(size) => {
                    let _ = send_event(
                        "audio_saved",
                        json!({"session_id": &session_id, "size": size}),
                    );
                    json!({
                        "event": "audio_saved",
                        "data": {"session_id": session_id, "size": size},
                    })
                }
                Err(e) => {
                    let _ = send_event(
                        "audio_error",
                        json!({"session_id": &session_id, "error": e.to_string()}),
                    );
                    json!({
                        "event": "audio_error",
                        "data": {"session_id": session_id, "error": e.to_string()},
                    })
                }
            }
        }
        ClientMessage::StopRecording { session_id } => {
            match state.ingestor.finalize_live_session(&session_id).await {
                Ok(()) => {
                    let _ = send_event("recording_stopped", json!({"session_id": &session_id}));
                    json!({
                        "event": "recording_stopped",
                        "data": {"session_id": session_id, "message": "Processing started"},
                    })
                }
                Err(e) => {
                    error!("could not stop live session {}: {}", session_id, e);
                    json!({
                        "event": "audio_error",
                        "data": {"session_id": session_id, "error": e.to_string()},
                    })
                }
            }
        }
    }
}
