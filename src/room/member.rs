use serde_json::Value;
use tokio::sync::mpsc::UnboundedSender;

use crate::websocket::message::ServerFrame;

/// One subscriber of a topic
#[derive(Debug)]
pub struct Member {
    pub sender: UnboundedSender<ServerFrame>,
    pub presence_key: Option<String>,
    pub meta: Option<Value>,
}

impl Member {
    pub fn new(sender: UnboundedSender<ServerFrame>, presence_key: Option<String>) -> Self {
        Self {
            sender,
            presence_key,
            meta: None,
        }
    }

    /// Send a frame to this member
    pub fn send(&self, frame: ServerFrame) -> bool {
        self.sender.send(frame).is_ok()
    }

    /// Key and meta if this member tracks presence
    pub fn presence(&self) -> Option<(&str, &Value)> {
        match (&self.presence_key, &self.meta) {
            (Some(key), Some(meta)) => Some((key, meta)),
            _ => None,
        }
    }
}
