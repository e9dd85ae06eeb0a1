use anyhow::Result;
use futures::Stream;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt;

static EVENT_MANAGER: Lazy<EventManager> = Lazy::new(EventManager::new);

/// A named event with an arbitrary JSON payload.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Event {
    pub name: String,
    pub data: Value,
}

pub struct EventManager {
    sender: broadcast::Sender<Event>,
}

impl EventManager {
    fn new() -> Self {
        let (sender, _) = broadcast::channel(1024);
        Self { sender }
    }

    pub fn instance() -> &'static EventManager {
        &EVENT_MANAGER
    }

    /// Broadcasts an event to all current subscribers. Having no subscribers
    /// is not an error; the event is simply dropped.
    pub fn send<T: Serialize>(&self, event: impl Into<String>, data: T) -> Result<()> {
        let event = Event {
            name: event.into(),
            data: serde_json::to_value(data)?,
        };
        let _ = self.sender.send(event);
        Ok(())
    }

    /// Subscribes to every event sent from this point on. Slow consumers
    /// that fall behind the channel capacity skip the missed events.
    pub fn subscribe(&self) -> impl Stream<Item = Event> {
        BroadcastStream::new(self.sender.subscribe()).filter_map(|result| result.ok())
    }
}

pub fn send_event<T: Serialize>(event: impl Into<String>, data: T) -> Result<()> {
    EventManager::instance().send(event, data)
}

pub fn subscribe_to_all_events() -> impl Stream<Item = Event> {
    EventManager::instance().subscribe()
}
