use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::realtime::{chat_topic, Channel, Transport};
use crate::websocket::message::ServerFrame;

/// Event name for chat messages
pub const MESSAGE_EVENT: &str = "message";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub user: String,
    pub text: String,
    /// Milliseconds since the Unix epoch
    pub timestamp: i64,
}

impl ChatMessage {
    pub fn new(user: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            text: text.into(),
            timestamp: chrono::Utc::now().timestamp_millis(),
        }
    }
}

/// Room chat: an append-only list of messages for this session
pub struct ChatPanel {
    channel: Channel,
    author: String,
    messages: Vec<ChatMessage>,
    open: bool,
}

impl ChatPanel {
    pub fn new(channel: Channel, author: impl Into<String>) -> Self {
        Self {
            channel,
            author: author.into(),
            messages: Vec::new(),
            open: false,
        }
    }

    pub fn join(transport: &dyn Transport, room_id: &str, author: &str) -> Result<Self> {
        let channel = transport.subscribe(&chat_topic(room_id), None)?;
        Ok(Self::new(channel, author))
    }

    /// Post a message. Blank input is ignored.
    pub fn send(&mut self, text: &str) -> bool {
        if text.trim().is_empty() {
            return false;
        }

        let message = ChatMessage::new(self.author.clone(), text);
        match serde_json::to_value(&message) {
            Ok(payload) => self.channel.publish(MESSAGE_EVENT, payload),
            Err(e) => {
                tracing::warn!("Could not encode chat message: {}", e);
                return false;
            }
        }
        self.messages.push(message);
        true
    }

    pub fn handle_frame(&mut self, frame: ServerFrame) {
        match frame {
            ServerFrame::Broadcast { event, payload, .. } if event == MESSAGE_EVENT => {
                match serde_json::from_value::<ChatMessage>(payload) {
                    Ok(message) => {
                        tracing::debug!("{}: {}", message.user, message.text);
                        self.messages.push(message);
                    }
                    Err(e) => tracing::warn!("Invalid chat message: {}", e),
                }
            }
            ServerFrame::Error { message, .. } => {
                tracing::warn!("Realtime error on {}: {}", self.channel.topic(), message);
            }
            _ => {}
        }
    }

    /// Drain inbound frames. Returns how many were handled.
    pub fn poll(&mut self) -> usize {
        let mut handled = 0;
        while let Some(frame) = self.channel.poll() {
            self.handle_frame(frame);
            handled += 1;
        }
        handled
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    /// Whether `message` was written by the local user
    pub fn is_own(&self, message: &ChatMessage) -> bool {
        message.user == self.author
    }

    pub fn toggle(&mut self) {
        self.open = !self.open;
    }

    pub fn is_open(&self) -> bool {
        self.open
    }
}
