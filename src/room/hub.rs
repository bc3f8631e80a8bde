use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio::sync::mpsc::UnboundedSender;
use uuid::Uuid;

use crate::error::{Result, WhiteboardError};
use crate::room::Member;
use crate::websocket::message::{ClientFrame, PresenceState, ServerFrame};

/// Maximum number of members allowed on one topic
pub const MAX_MEMBERS_PER_TOPIC: usize = 100;

#[derive(Default)]
struct Topic {
    members: HashMap<Uuid, Member>,
}

impl Topic {
    fn presence_state(&self) -> PresenceState {
        let mut state = PresenceState::new();
        for member in self.members.values() {
            if let Some((key, meta)) = member.presence() {
                state.entry(key.to_string()).or_default().push(meta.clone());
            }
        }
        state
    }

    /// Send `frame` to every member except `except`. Returns members whose channel is gone.
    fn fan_out(&self, frame: &ServerFrame, except: Option<Uuid>) -> Vec<Uuid> {
        let mut failed_ids = Vec::new();
        for (id, member) in &self.members {
            if Some(*id) == except {
                continue;
            }
            if !member.send(frame.clone()) {
                failed_ids.push(*id);
            }
        }
        failed_ids
    }

    fn sync_presence(&self, name: &str) -> Vec<Uuid> {
        let frame = ServerFrame::PresenceSync {
            topic: name.to_string(),
            state: self.presence_state(),
        };
        self.fan_out(&frame, None)
    }

    /// Remove members and tell the rest about any presence that left with them
    fn remove_members(&mut self, name: &str, mut ids: Vec<Uuid>) {
        while !ids.is_empty() {
            let mut left = Vec::new();
            for id in ids.drain(..) {
                if let Some(member) = self.members.remove(&id) {
                    if let Some((key, meta)) = member.presence() {
                        left.push((key.to_string(), meta.clone()));
                    }
                }
            }
            if left.is_empty() {
                break;
            }

            let mut failed_ids = Vec::new();
            for (key, meta) in left {
                let frame = ServerFrame::PresenceLeave {
                    topic: name.to_string(),
                    key,
                    meta,
                };
                failed_ids.extend(self.fan_out(&frame, None));
            }
            failed_ids.extend(self.sync_presence(name));
            failed_ids.sort();
            failed_ids.dedup();
            ids = failed_ids;
        }
    }
}

/// Topic registry doing broadcast fan-out and presence bookkeeping.
///
/// The hub is the in-process stand-in for a hosted realtime service: the
/// relay server wraps one, and `LocalTransport` talks to one directly.
#[derive(Default)]
pub struct Hub {
    topics: Mutex<HashMap<String, Topic>>,
}

impl Hub {
    pub fn new() -> Self {
        Self::default()
    }

    fn topics(&self) -> MutexGuard<'_, HashMap<String, Topic>> {
        self.topics.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Subscribe `conn` to `topic`. The new member immediately receives the current presence state.
    pub fn join(
        &self,
        conn: Uuid,
        topic: &str,
        presence_key: Option<String>,
        sender: UnboundedSender<ServerFrame>,
    ) -> Result<()> {
        let mut topics = self.topics();
        let entry = topics.entry(topic.to_string()).or_default();

        if !entry.members.contains_key(&conn) && entry.members.len() >= MAX_MEMBERS_PER_TOPIC {
            return Err(WhiteboardError::TopicFull(topic.to_string()));
        }

        let member = Member::new(sender, presence_key);
        member.send(ServerFrame::PresenceSync {
            topic: topic.to_string(),
            state: entry.presence_state(),
        });
        entry.members.insert(conn, member);

        tracing::debug!(
            "{} joined {}. Members: {}",
            conn,
            topic,
            entry.members.len()
        );
        Ok(())
    }

    /// Unsubscribe `conn` from `topic`. Returns false if it was not a member.
    pub fn leave(&self, conn: Uuid, topic: &str) -> bool {
        let mut topics = self.topics();
        let Some(entry) = topics.get_mut(topic) else {
            return false;
        };

        let present = entry.members.contains_key(&conn);
        if present {
            entry.remove_members(topic, vec![conn]);
            tracing::debug!("{} left {}. Members: {}", conn, topic, entry.members.len());
        }
        if entry.members.is_empty() {
            topics.remove(topic);
        }
        present
    }

    /// Remove `conn` from every topic it joined
    pub fn leave_all(&self, conn: Uuid) -> usize {
        let joined: Vec<String> = self
            .topics()
            .iter()
            .filter(|(_, t)| t.members.contains_key(&conn))
            .map(|(name, _)| name.clone())
            .collect();

        joined.iter().filter(|name| self.leave(conn, name)).count()
    }

    /// Broadcast to every other member of `topic`. Returns the number of recipients.
    pub fn publish(&self, conn: Uuid, topic: &str, event: &str, payload: Value) -> Result<usize> {
        let mut topics = self.topics();
        let entry = topics
            .get_mut(topic)
            .filter(|t| t.members.contains_key(&conn))
            .ok_or_else(|| WhiteboardError::NotJoined(topic.to_string()))?;

        let frame = ServerFrame::Broadcast {
            topic: topic.to_string(),
            event: event.to_string(),
            payload,
        };
        let failed_ids = entry.fan_out(&frame, Some(conn));
        let delivered = entry.members.len() - 1 - failed_ids.len();
        entry.remove_members(topic, failed_ids);

        Ok(delivered)
    }

    /// Attach presence meta to `conn` and resync everyone on the topic
    pub fn track(&self, conn: Uuid, topic: &str, meta: Value) -> Result<()> {
        let mut topics = self.topics();
        let entry = topics
            .get_mut(topic)
            .ok_or_else(|| WhiteboardError::NotJoined(topic.to_string()))?;
        let member = entry
            .members
            .get_mut(&conn)
            .ok_or_else(|| WhiteboardError::NotJoined(topic.to_string()))?;
        let key = member
            .presence_key
            .clone()
            .ok_or_else(|| WhiteboardError::PresenceKeyMissing(topic.to_string()))?;

        member.meta = Some(meta.clone());

        let join = ServerFrame::PresenceJoin {
            topic: topic.to_string(),
            key,
            meta,
        };
        let mut failed_ids = entry.fan_out(&join, None);
        failed_ids.extend(entry.sync_presence(topic));
        failed_ids.sort();
        failed_ids.dedup();
        entry.remove_members(topic, failed_ids);

        Ok(())
    }

    /// Dispatch a frame received from `conn`
    pub fn apply(
        &self,
        conn: Uuid,
        frame: ClientFrame,
        sender: &UnboundedSender<ServerFrame>,
    ) -> Result<()> {
        match frame {
            ClientFrame::Join {
                topic,
                presence_key,
            } => self.join(conn, &topic, presence_key, sender.clone()),
            ClientFrame::Leave { topic } => {
                self.leave(conn, &topic);
                Ok(())
            }
            ClientFrame::Publish {
                topic,
                event,
                payload,
            } => self.publish(conn, &topic, &event, payload).map(|_| ()),
            ClientFrame::Track { topic, meta } => self.track(conn, &topic, meta),
        }
    }

    pub fn presence_state(&self, topic: &str) -> PresenceState {
        self.topics()
            .get(topic)
            .map(Topic::presence_state)
            .unwrap_or_default()
    }

    pub fn member_count(&self, topic: &str) -> usize {
        self.topics().get(topic).map_or(0, |t| t.members.len())
    }

    pub fn topic_count(&self) -> usize {
        self.topics().len()
    }
}
