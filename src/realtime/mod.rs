//! Publish/subscribe channels to the realtime service.
//!
//! A [`Transport`] hands out one [`Channel`] per topic. Sends are
//! fire-and-forget and inbound frames are drained with [`Channel::poll`]
//! from the single UI thread, so nothing here blocks or retries.

pub mod local;

use serde_json::Value;
use tokio::sync::mpsc::UnboundedReceiver;

use crate::error::Result;
use crate::websocket::message::{ClientFrame, PresenceState, ServerFrame};

pub use local::LocalTransport;

/// Topic carrying `draw` and `sticky` events for a room
pub fn draw_topic(room_id: &str) -> String {
    format!("room:{}", room_id)
}

/// Topic carrying chat `message` events for a room
pub fn chat_topic(room_id: &str) -> String {
    format!("chat:{}", room_id)
}

/// Presence topic for a room
pub fn presence_topic(room_id: &str) -> String {
    format!("room-{}", room_id)
}

/// Something that can open channels on the realtime service
pub trait Transport {
    fn subscribe(&self, topic: &str, presence_key: Option<&str>) -> Result<Channel>;
}

/// Outgoing half of a channel
pub trait FrameSink: Send {
    fn send(&self, frame: ClientFrame);
}

/// A subscription to one topic
pub struct Channel {
    topic: String,
    sink: Box<dyn FrameSink>,
    inbound: UnboundedReceiver<ServerFrame>,
    presence: PresenceState,
}

impl Channel {
    pub fn new(
        topic: impl Into<String>,
        sink: Box<dyn FrameSink>,
        inbound: UnboundedReceiver<ServerFrame>,
    ) -> Self {
        Self {
            topic: topic.into(),
            sink,
            inbound,
            presence: PresenceState::new(),
        }
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Broadcast `payload` to the other subscribers of this topic
    pub fn publish(&self, event: &str, payload: Value) {
        self.sink.send(ClientFrame::Publish {
            topic: self.topic.clone(),
            event: event.to_string(),
            payload,
        });
    }

    /// Track this subscriber's presence with `meta`
    pub fn track(&self, meta: Value) {
        self.sink.send(ClientFrame::Track {
            topic: self.topic.clone(),
            meta,
        });
    }

    /// Next inbound frame, if any arrived
    pub fn poll(&mut self) -> Option<ServerFrame> {
        let frame = self.inbound.try_recv().ok()?;
        if let ServerFrame::PresenceSync { topic, state } = &frame {
            if *topic == self.topic {
                self.presence = state.clone();
            }
        }
        Some(frame)
    }

    /// Presence as of the last sync received
    pub fn presence_state(&self) -> &PresenceState {
        &self.presence
    }
}

impl Drop for Channel {
    fn drop(&mut self) {
        self.sink.send(ClientFrame::Leave {
            topic: self.topic.clone(),
        });
    }
}

impl std::fmt::Debug for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Channel").field("topic", &self.topic).finish()
    }
}
