use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::realtime::{presence_topic, Channel, Transport};
use crate::websocket::message::{PresenceState, ServerFrame};

/// What each user tracks on the presence topic
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresentUser {
    pub name: String,
    /// Milliseconds since the Unix epoch
    pub joined_at: i64,
}

/// Who is in the room, rebuilt from every presence sync
pub struct PresencePanel {
    channel: Channel,
    users: Vec<PresentUser>,
}

impl PresencePanel {
    pub fn new(channel: Channel) -> Self {
        Self {
            channel,
            users: Vec::new(),
        }
    }

    /// Subscribe to the room's presence topic and track the local user
    pub fn join(transport: &dyn Transport, room_id: &str, name: &str) -> Result<Self> {
        let channel = transport.subscribe(&presence_topic(room_id), Some(name))?;
        let me = PresentUser {
            name: name.to_string(),
            joined_at: chrono::Utc::now().timestamp_millis(),
        };
        channel.track(serde_json::to_value(&me)?);
        Ok(Self::new(channel))
    }

    pub fn handle_frame(&mut self, frame: ServerFrame) {
        match frame {
            ServerFrame::PresenceSync { state, .. } => {
                self.users = users_from_state(&state);
            }
            ServerFrame::PresenceJoin { key, .. } => {
                tracing::info!("User joined: {}", key);
            }
            ServerFrame::PresenceLeave { key, .. } => {
                tracing::info!("User left: {}", key);
            }
            ServerFrame::Error { message, .. } => {
                tracing::error!("Error setting up presence: {}", message);
            }
            ServerFrame::Broadcast { .. } => {}
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

    pub fn users(&self) -> &[PresentUser] {
        &self.users
    }

    pub fn count(&self) -> usize {
        self.users.len()
    }
}

fn users_from_state(state: &PresenceState) -> Vec<PresentUser> {
    state
        .values()
        .flatten()
        .filter_map(|meta| match serde_json::from_value(meta.clone()) {
            Ok(user) => Some(user),
            Err(e) => {
                tracing::warn!("Ignoring presence meta {}: {}", meta, e);
                None
            }
        })
        .collect()
}
