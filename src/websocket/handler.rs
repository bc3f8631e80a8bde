use std::collections::HashMap;

use axum::{
    extract::{
        ws::{Message, WebSocket},
        Path, State, WebSocketUpgrade,
    },
    response::IntoResponse,
    Json,
};
use futures_util::{SinkExt, StreamExt};
use serde_json::json;
use tokio::sync::mpsc::{self, UnboundedSender};
use uuid::Uuid;

use crate::error::WhiteboardError;
use crate::websocket::message::{
    ClientEnvelope, ClientFrame, ServerEnvelope, ServerFrame, SubscriptionId,
};
use crate::AppState;

/// WebSocket upgrade handler
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Current presence of a topic, for inspection
pub async fn presence_handler(
    Path(topic): Path<String>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    Json(state.hub.presence_state(&topic))
}

pub async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "topics": state.hub.topic_count(),
    }))
}

/// One subscription on a connection. The hub sees it as its own member.
struct Subscription {
    member_id: Uuid,
    sender: UnboundedSender<ServerFrame>,
}

impl Subscription {
    /// Start forwarding hub frames for `sub` onto the connection's outgoing queue
    fn open(sub: SubscriptionId, outgoing: &UnboundedSender<ServerEnvelope>) -> Self {
        let (sender, mut rx) = mpsc::unbounded_channel::<ServerFrame>();
        let outgoing = outgoing.clone();
        tokio::spawn(async move {
            while let Some(frame) = rx.recv().await {
                let envelope = ServerEnvelope {
                    sub: Some(sub),
                    frame,
                };
                if outgoing.send(envelope).is_err() {
                    break;
                }
            }
        });

        Self {
            member_id: Uuid::new_v4(),
            sender,
        }
    }
}

/// Handle a WebSocket connection
async fn handle_socket(socket: WebSocket, state: AppState) {
    let (mut sender, mut receiver) = socket.split();

    // Outgoing frames for every subscription on this connection
    let (tx, mut rx) = mpsc::unbounded_channel::<ServerEnvelope>();

    let conn_id = Uuid::new_v4();
    let mut subscriptions: HashMap<SubscriptionId, Subscription> = HashMap::new();
    tracing::info!("Connection {} opened", conn_id);

    let send_task = tokio::spawn(async move {
        while let Some(envelope) = rx.recv().await {
            let text = match serde_json::to_string(&envelope) {
                Ok(text) => text,
                Err(e) => {
                    tracing::warn!("Could not encode frame: {}", e);
                    continue;
                }
            };
            if sender.send(Message::Text(text)).await.is_err() {
                break;
            }
        }
    });

    while let Some(result) = receiver.next().await {
        match result {
            Ok(Message::Text(text)) => {
                handle_text_message(&state, conn_id, &text, &mut subscriptions, &tx);
            }
            Ok(Message::Close(_)) => {
                tracing::info!("Connection {} closed", conn_id);
                break;
            }
            Ok(_) => {
                // Binary, ping and pong carry nothing for the hub
            }
            Err(e) => {
                tracing::warn!("WebSocket error for {}: {}", conn_id, e);
                break;
            }
        }
    }

    let left: usize = subscriptions
        .values()
        .map(|s| state.hub.leave_all(s.member_id))
        .sum();
    tracing::info!("Connection {} removed from {} topics", conn_id, left);

    send_task.abort();
}

fn handle_text_message(
    state: &AppState,
    conn_id: Uuid,
    text: &str,
    subscriptions: &mut HashMap<SubscriptionId, Subscription>,
    tx: &UnboundedSender<ServerEnvelope>,
) {
    let ClientEnvelope { sub, frame } = match serde_json::from_str::<ClientEnvelope>(text) {
        Ok(envelope) => envelope,
        Err(e) => {
            tracing::warn!("Unknown frame from {}: {}", conn_id, e);
            let _ = tx.send(ServerEnvelope {
                sub: None,
                frame: ServerFrame::error(None, format!("Malformed frame: {}", e)),
            });
            return;
        }
    };

    let topic = frame.topic().to_string();
    let is_join = matches!(frame, ClientFrame::Join { .. });
    let is_leave = matches!(frame, ClientFrame::Leave { .. });

    let created = is_join && !subscriptions.contains_key(&sub);
    if created {
        subscriptions.insert(sub, Subscription::open(sub, tx));
    }

    let result = match subscriptions.get(&sub) {
        Some(subscription) => state
            .hub
            .apply(subscription.member_id, frame, &subscription.sender),
        None => Err(WhiteboardError::NotJoined(topic.clone())),
    };

    let failed = result.is_err();
    if let Err(e) = result {
        tracing::warn!("Rejected frame from {} on {}: {}", conn_id, topic, e);
        let _ = tx.send(ServerEnvelope {
            sub: Some(sub),
            frame: ServerFrame::error(Some(&topic), e.to_string()),
        });
    }

    if is_leave || (created && failed) {
        subscriptions.remove(&sub);
    }
}
