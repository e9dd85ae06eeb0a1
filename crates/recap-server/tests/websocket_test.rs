use futures::{SinkExt, StreamExt};

// Needs a running server: `cargo run --bin recapd` first.
#[tokio::test]
#[ignore] // only run locally atm
async fn live_recording_smoke() {
    let url = "ws://127.0.0.1:5001/ws";
    let (ws_stream, _) = tokio_tungstenite::connect_async(url)
        .await
        .expect("Failed to connect to websocket");

    let (mut write, mut read) = ws_stream.split();

    write
        .send(tokio_tungstenite::tungstenite::Message::Text(
            serde_json::json!({"type": "start_recording"}).to_string(),
        ))
        .await
        .expect("Failed to send message");

    let reply = read
        .next()
        .await
        .expect("connection closed")
        .expect("websocket error");
    let reply: serde_json::Value =
        serde_json::from_str(reply.to_text().expect("not a text frame")).unwrap();
    assert_eq!(reply["event"], "recording_started");
    let session_id = reply["data"]["session_id"]
        .as_str()
        .expect("missing session_id")
        .to_string();

    println!("recording session {}", session_id);

    write
        .send(tokio_tungstenite::tungstenite::Message::Text(
            serde_json::json!({
                "type": "stop_recording",
                "session_id": session_id,
            })
            .to_string(),
        ))
        .await
        .expect("Failed to send message");

    // No audio_data was sent, so stopping reports the missing artifact.
    let reply = read.next().await.expect("connection closed").unwrap();
    println!("received: {:?}", reply);
}
