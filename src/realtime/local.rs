use std::sync::Arc;
use tokio::sync::mpsc::{self, UnboundedSender};
use uuid::Uuid;

use crate::error::Result;
use crate::realtime::{Channel, FrameSink, Transport};
use crate::room::Hub;
use crate::websocket::message::{ClientFrame, ServerFrame};

/// Transport that talks to a hub in the same process
#[derive(Clone, Default)]
pub struct LocalTransport {
    hub: Arc<Hub>,
}

impl LocalTransport {
    pub fn new(hub: Arc<Hub>) -> Self {
        Self { hub }
    }

    pub fn hub(&self) -> &Arc<Hub> {
        &self.hub
    }
}

impl Transport for LocalTransport {
    fn subscribe(&self, topic: &str, presence_key: Option<&str>) -> Result<Channel> {
        let (tx, rx) = mpsc::unbounded_channel();
        let conn = Uuid::new_v4();

        self.hub
            .join(conn, topic, presence_key.map(str::to_string), tx.clone())?;

        let sink = LocalSink {
            hub: Arc::clone(&self.hub),
            conn,
            sender: tx,
        };
        Ok(Channel::new(topic, Box::new(sink), rx))
    }
}

struct LocalSink {
    hub: Arc<Hub>,
    conn: Uuid,
    sender: UnboundedSender<ServerFrame>,
}

impl FrameSink for LocalSink {
    fn send(&self, frame: ClientFrame) {
        let topic = frame.topic().to_string();
        if let Err(e) = self.hub.apply(self.conn, frame, &self.sender) {
            tracing::warn!("Dropped frame on {}: {}", topic, e);
            let _ = self.sender.send(ServerFrame::error(Some(&topic), e.to_string()));
        }
    }
}
