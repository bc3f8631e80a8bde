use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Presence metas currently tracked on a topic, grouped by presence key
pub type PresenceState = BTreeMap<String, Vec<Value>>;

/// Frames sent from a client to the relay
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientFrame {
    Join {
        topic: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        presence_key: Option<String>,
    },
    Leave {
        topic: String,
    },
    Publish {
        topic: String,
        event: String,
        payload: Value,
    },
    Track {
        topic: String,
        meta: Value,
    },
}

impl ClientFrame {
    pub fn topic(&self) -> &str {
        match self {
            ClientFrame::Join { topic, .. }
            | ClientFrame::Leave { topic }
            | ClientFrame::Publish { topic, .. }
            | ClientFrame::Track { topic, .. } => topic,
        }
    }
}

/// Frames sent from the relay to a client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerFrame {
    Broadcast {
        topic: String,
        event: String,
        payload: Value,
    },
    PresenceSync {
        topic: String,
        state: PresenceState,
    },
    PresenceJoin {
        topic: String,
        key: String,
        meta: Value,
    },
    PresenceLeave {
        topic: String,
        key: String,
        meta: Value,
    },
    Error {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        topic: Option<String>,
        message: String,
    },
}

impl ServerFrame {
    pub fn topic(&self) -> Option<&str> {
        match self {
            ServerFrame::Broadcast { topic, .. }
            | ServerFrame::PresenceSync { topic, .. }
            | ServerFrame::PresenceJoin { topic, .. }
            | ServerFrame::PresenceLeave { topic, .. } => Some(topic),
            ServerFrame::Error { topic, .. } => topic.as_deref(),
        }
    }

    pub fn error(topic: Option<&str>, message: impl Into<String>) -> Self {
        ServerFrame::Error {
            topic: topic.map(str::to_string),
            message: message.into(),
        }
    }
}

/// Client-chosen id of one subscription on a connection
pub type SubscriptionId = u64;

/// A client frame addressed to one of the connection's subscriptions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientEnvelope {
    pub sub: SubscriptionId,
    #[serde(flatten)]
    pub frame: ClientFrame,
}

/// A server frame tagged with the subscription it is meant for.
/// Errors about the connection itself carry no subscription.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerEnvelope {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub: Option<SubscriptionId>,
    #[serde(flatten)]
    pub frame: ServerFrame,
}
