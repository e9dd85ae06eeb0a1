use futures::StreamExt;
use recap_events::{send_event, subscribe_to_all_events};
use serde_json::json;
use std::time::Duration;

// The bus is a process-wide singleton, so other tests in this binary may
// interleave their events; filter by name instead of asserting on the
// first event received.
async fn next_named(
    stream: &mut (impl futures::Stream<Item = recap_events::Event> + Unpin),
    name: &str,
) -> recap_events::Event {
    tokio::time::timeout(Duration::from_secs(2), async {
        loop {
            let event = stream.next().await.expect("bus closed");
            if event.name == name {
                return event;
            }
        }
    })
    .await
    .expect("timed out waiting for event")
}

#[tokio::test]
async fn test_send_without_subscribers_is_ok() {
    send_event("processing_error", json!({"task_id": "t0", "error": "boom"}))
        .expect("send with no subscribers should succeed");
}

#[tokio::test]
async fn test_subscriber_receives_event() {
    let mut stream = Box::pin(subscribe_to_all_events());

    send_event(
        "processing_complete",
        json!({"task_id": "20240101_120000_000", "summary": {"overview": "hi"}}),
    )
    .unwrap();

    let event = next_named(&mut stream, "processing_complete").await;
    assert_eq!(event.data["task_id"], "20240101_120000_000");
    assert_eq!(event.data["summary"]["overview"], "hi");
}

#[tokio::test]
async fn test_multiple_subscribers_all_receive() {
    let mut a = Box::pin(subscribe_to_all_events());
    let mut b = Box::pin(subscribe_to_all_events());

    send_event("recording_started", json!({"session_id": "s1"})).unwrap();

    let ea = next_named(&mut a, "recording_started").await;
    let eb = next_named(&mut b, "recording_started").await;
    assert_eq!(ea.data["session_id"], "s1");
    assert_eq!(eb.data["session_id"], "s1");
}
