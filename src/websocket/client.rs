//! WebSocket client for the relay.
//!
//! One connection is multiplexed across every channel the app opens. Each
//! channel gets its own subscription id, so two channels on the same topic
//! are separate members on the relay. A writer task drains outgoing frames
//! onto the socket and a reader task routes incoming frames by subscription.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc::{self, UnboundedSender};
use tokio::task::JoinHandle;
use tokio_tungstenite::{connect_async, tungstenite::Message};

use crate::error::Result;
use crate::realtime::{Channel, FrameSink, Transport};
use crate::websocket::message::{
    ClientEnvelope, ClientFrame, ServerEnvelope, ServerFrame, SubscriptionId,
};

type Routes = Arc<Mutex<HashMap<SubscriptionId, UnboundedSender<ServerFrame>>>>;

fn lock(routes: &Routes) -> MutexGuard<'_, HashMap<SubscriptionId, UnboundedSender<ServerFrame>>> {
    routes.lock().unwrap_or_else(PoisonError::into_inner)
}

pub struct RelayClient {
    outgoing: UnboundedSender<ClientEnvelope>,
    routes: Routes,
    next_sub: AtomicU64,
    writer: JoinHandle<()>,
    reader: JoinHandle<()>,
}

impl RelayClient {
    /// Connect to a relay at `url`, e.g. `ws://127.0.0.1:8080/ws`
    pub async fn connect(url: &str) -> Result<Self> {
        let (ws_stream, _) = connect_async(url).await?;
        tracing::info!("Connected to relay at {}", url);

        let (mut ws_sender, mut ws_receiver) = ws_stream.split();
        let (outgoing, mut rx) = mpsc::unbounded_channel::<ClientEnvelope>();
        let routes: Routes = Arc::default();

        let writer = tokio::spawn(async move {
            while let Some(envelope) = rx.recv().await {
                let text = match serde_json::to_string(&envelope) {
                    Ok(text) => text,
                    Err(e) => {
                        tracing::warn!("Could not encode frame: {}", e);
                        continue;
                    }
                };
                if ws_sender.send(Message::Text(text)).await.is_err() {
                    break;
                }
            }
            let _ = ws_sender.send(Message::Close(None)).await;
        });

        let reader_routes = Arc::clone(&routes);
        let reader = tokio::spawn(async move {
            while let Some(result) = ws_receiver.next().await {
                match result {
                    Ok(Message::Text(text)) => route_frame(&reader_routes, &text),
                    Ok(Message::Close(_)) => {
                        tracing::info!("Relay closed the connection");
                        break;
                    }
                    Ok(_) => {}
                    Err(e) => {
                        tracing::error!("Relay connection error: {}", e);
                        break;
                    }
                }
            }
            lock(&reader_routes).clear();
        });

        Ok(Self {
            outgoing,
            routes,
            next_sub: AtomicU64::new(1),
            writer,
            reader,
        })
    }
}

fn route_frame(routes: &Routes, text: &str) {
    let envelope = match serde_json::from_str::<ServerEnvelope>(text) {
        Ok(envelope) => envelope,
        Err(e) => {
            tracing::warn!("Unknown frame from relay: {}", e);
            return;
        }
    };

    let Some(sub) = envelope.sub else {
        if let ServerFrame::Error { message, .. } = &envelope.frame {
            tracing::error!("Relay error: {}", message);
        }
        return;
    };

    let mut routes = lock(routes);
    if let Some(route) = routes.get(&sub) {
        if route.send(envelope.frame).is_err() {
            routes.remove(&sub);
        }
    }
}

impl Transport for RelayClient {
    fn subscribe(&self, topic: &str, presence_key: Option<&str>) -> Result<Channel> {
        let sub = self.next_sub.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::unbounded_channel();
        lock(&self.routes).insert(sub, tx);

        let sink = RemoteSink {
            sub,
            outgoing: self.outgoing.clone(),
            routes: Arc::clone(&self.routes),
        };
        sink.send(ClientFrame::Join {
            topic: topic.to_string(),
            presence_key: presence_key.map(str::to_string),
        });

        Ok(Channel::new(topic, Box::new(sink), rx))
    }
}

impl Drop for RelayClient {
    fn drop(&mut self) {
        self.writer.abort();
        self.reader.abort();
    }
}

struct RemoteSink {
    sub: SubscriptionId,
    outgoing: UnboundedSender<ClientEnvelope>,
    routes: Routes,
}

impl FrameSink for RemoteSink {
    fn send(&self, frame: ClientFrame) {
        if matches!(frame, ClientFrame::Leave { .. }) {
            lock(&self.routes).remove(&self.sub);
        }
        let envelope = ClientEnvelope {
            sub: self.sub,
            frame,
        };
        if self.outgoing.send(envelope).is_err() {
            tracing::warn!("Relay connection is gone, frame dropped");
        }
    }
}
