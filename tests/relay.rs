//! Integration tests for the relay
//!
//! These start a real relay on a loopback port and talk to it over
//! WebSocket, both with raw frames and through full client sessions.

use std::net::SocketAddr;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::json;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};

use whiteboard_rs::config::SurfaceConfig;
use whiteboard_rs::drawing::{Point, ScriptedPrompt, Tool};
use whiteboard_rs::websocket::{
    ClientEnvelope, ClientFrame, RelayClient, ServerEnvelope, ServerFrame, SubscriptionId,
};
use whiteboard_rs::{relay_router, AppState, Session};

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

async fn start_relay() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, relay_router(AppState::new()))
            .await
            .unwrap();
    });
    addr
}

async fn connect(addr: SocketAddr) -> Socket {
    let (socket, _) = connect_async(format!("ws://{}/ws", addr)).await.unwrap();
    socket
}

async fn send(socket: &mut Socket, sub: SubscriptionId, frame: ClientFrame) {
    let text = serde_json::to_string(&ClientEnvelope { sub, frame }).unwrap();
    socket.send(Message::Text(text)).await.unwrap();
}

async fn recv(socket: &mut Socket) -> ServerEnvelope {
    loop {
        let message = tokio::time::timeout(Duration::from_secs(5), socket.next())
            .await
            .expect("timed out waiting for a frame")
            .expect("socket closed")
            .unwrap();
        if let Message::Text(text) = message {
            return serde_json::from_str(&text).unwrap();
        }
    }
}

async fn join(socket: &mut Socket, sub: SubscriptionId, topic: &str, presence_key: Option<&str>) {
    send(
        socket,
        sub,
        ClientFrame::Join {
            topic: topic.to_string(),
            presence_key: presence_key.map(str::to_string),
        },
    )
    .await;
    let reply = recv(socket).await;
    assert_eq!(reply.sub, Some(sub));
    assert!(matches!(reply.frame, ServerFrame::PresenceSync { .. }));
}

/// Pump `session` until `done` holds or five seconds pass
async fn pump_until(session: &mut Session, done: impl Fn(&Session) -> bool) {
    for _ in 0..500 {
        session.pump();
        if done(session) {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not reached");
}

async fn http_get(addr: SocketAddr, path: &str) -> String {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    let request = format!(
        "GET {} HTTP/1.1\r\nHost: {}\r\nConnection: close\r\n\r\n",
        path, addr
    );
    stream.write_all(request.as_bytes()).await.unwrap();

    let mut response = String::new();
    stream.read_to_string(&mut response).await.unwrap();
    let (_, body) = response.split_once("\r\n\r\n").unwrap();
    body.to_string()
}

fn small_config() -> SurfaceConfig {
    SurfaceConfig {
        width: 64,
        height: 64,
        ..Default::default()
    }
}

#[tokio::test]
async fn test_broadcast_skips_sender() {
    let addr = start_relay().await;
    let mut ana = connect(addr).await;
    let mut bo = connect(addr).await;
    join(&mut ana, 1, "room:r1", None).await;
    join(&mut bo, 1, "room:r1", None).await;

    send(
        &mut ana,
        1,
        ClientFrame::Publish {
            topic: "room:r1".into(),
            event: "draw".into(),
            payload: json!({"tool": "clear"}),
        },
    )
    .await;

    match recv(&mut bo).await.frame {
        ServerFrame::Broadcast { topic, event, payload } => {
            assert_eq!(topic, "room:r1");
            assert_eq!(event, "draw");
            assert_eq!(payload["tool"], "clear");
        }
        other => panic!("Expected broadcast, got {:?}", other),
    }

    // Publishing to a topic that was never joined is rejected
    send(
        &mut ana,
        2,
        ClientFrame::Publish {
            topic: "room:r2".into(),
            event: "draw".into(),
            payload: json!({}),
        },
    )
    .await;
    let reply = recv(&mut ana).await;
    assert_eq!(reply.sub, Some(2));
    match reply.frame {
        ServerFrame::Error { topic, .. } => assert_eq!(topic.as_deref(), Some("room:r2")),
        other => panic!("Expected error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_malformed_frame_gets_error() {
    let addr = start_relay().await;
    let mut ana = connect(addr).await;

    ana.send(Message::Text("{\"type\":\"shout\"}".into()))
        .await
        .unwrap();

    let reply = recv(&mut ana).await;
    assert_eq!(reply.sub, None);
    match reply.frame {
        ServerFrame::Error { topic, message } => {
            assert_eq!(topic, None);
            assert!(message.starts_with("Malformed frame"));
        }
        other => panic!("Expected error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_presence_follows_disconnect() {
    let addr = start_relay().await;
    let mut ana = connect(addr).await;
    let mut bo = connect(addr).await;
    join(&mut ana, 1, "room-r1", Some("ana")).await;
    join(&mut bo, 1, "room-r1", Some("bo")).await;

    send(
        &mut bo,
        1,
        ClientFrame::Track {
            topic: "room-r1".into(),
            meta: json!({"name": "bo", "joinedAt": 1}),
        },
    )
    .await;
    assert!(matches!(recv(&mut ana).await.frame, ServerFrame::PresenceJoin { .. }));
    match recv(&mut ana).await.frame {
        ServerFrame::PresenceSync { state, .. } => assert!(state.contains_key("bo")),
        other => panic!("Expected sync, got {:?}", other),
    }

    let body = http_get(addr, "/topics/room-r1/presence").await;
    let state: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(state["bo"][0]["name"], "bo");

    bo.close(None).await.unwrap();
    match recv(&mut ana).await.frame {
        ServerFrame::PresenceLeave { key, .. } => assert_eq!(key, "bo"),
        other => panic!("Expected leave, got {:?}", other),
    }
}

#[tokio::test]
async fn test_subscriptions_on_one_connection_are_separate_members() {
    let addr = start_relay().await;
    let mut ana = connect(addr).await;
    join(&mut ana, 1, "room:r1", None).await;
    join(&mut ana, 2, "room:r1", None).await;

    send(
        &mut ana,
        1,
        ClientFrame::Publish {
            topic: "room:r1".into(),
            event: "draw".into(),
            payload: json!({"tool": "clear"}),
        },
    )
    .await;
    let reply = recv(&mut ana).await;
    assert_eq!(reply.sub, Some(2));
    assert!(matches!(reply.frame, ServerFrame::Broadcast { .. }));

    // Leaving with one subscription keeps the other joined
    send(&mut ana, 1, ClientFrame::Leave { topic: "room:r1".into() }).await;
    send(
        &mut ana,
        2,
        ClientFrame::Publish {
            topic: "room:r1".into(),
            event: "draw".into(),
            payload: json!({"tool": "clear"}),
        },
    )
    .await;
    let body = http_get(addr, "/health").await;
    let health: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(health["topics"], 1);
}

#[tokio::test]
async fn test_health() {
    let addr = start_relay().await;
    let body = http_get(addr, "/health").await;
    let health: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(health["status"], "ok");
}

#[tokio::test]
async fn test_sessions_over_relay() {
    let addr = start_relay().await;
    let url = format!("ws://{}/ws", addr);
    let ana_client = RelayClient::connect(&url).await.unwrap();
    let bo_client = RelayClient::connect(&url).await.unwrap();

    let mut ana = Session::open(&ana_client, "r1", "ana", &small_config()).unwrap();
    let mut bo = Session::open(&bo_client, "r1", "bo", &small_config()).unwrap();

    pump_until(&mut ana, |s| s.presence().count() == 2).await;
    pump_until(&mut bo, |s| s.presence().count() == 2).await;

    ana.settings_mut().set_tool(Tool::Rectangle);
    let mut prompt = ScriptedPrompt::new();
    ana.pointer_down(Point::new(8.0, 8.0), &mut prompt);
    ana.pointer_move(Point::new(40.0, 40.0));
    ana.pointer_up();
    ana.chat_mut().send("done");

    pump_until(&mut bo, |s| {
        s.surface().history().len() == 1 && s.chat().messages().len() == 1
    })
    .await;
    assert_eq!(bo.surface().canvas().data(), ana.surface().canvas().data());
    assert_eq!(bo.chat().messages()[0].user, "ana");

    drop(bo);
    drop(bo_client);
    pump_until(&mut ana, |s| s.presence().count() == 1).await;
}

#[tokio::test]
async fn test_reentering_room_on_one_client() {
    let addr = start_relay().await;
    let url = format!("ws://{}/ws", addr);
    let ana_client = RelayClient::connect(&url).await.unwrap();
    let bo_client = RelayClient::connect(&url).await.unwrap();

    let old = Session::open(&ana_client, "r9", "ana", &small_config()).unwrap();
    let mut bo = Session::open(&bo_client, "r9", "bo", &small_config()).unwrap();
    let mut fresh = Session::open(&ana_client, "r9", "ana", &small_config()).unwrap();

    pump_until(&mut bo, |s| s.presence().count() == 3).await;
    drop(old);
    pump_until(&mut bo, |s| s.presence().count() == 2).await;

    bo.chat_mut().send("still there?");
    pump_until(&mut fresh, |s| {
        s.chat().messages().iter().any(|m| m.text == "still there?")
    })
    .await;
    pump_until(&mut fresh, |s| s.presence().count() == 2).await;

    let mut names: Vec<&str> = bo.presence().users().iter().map(|u| u.name.as_str()).collect();
    names.sort();
    assert_eq!(names, vec!["ana", "bo"]);
}
