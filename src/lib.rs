pub mod app;
pub mod chat;
pub mod config;
pub mod drawing;
pub mod error;
pub mod history;
pub mod presence;
pub mod realtime;
pub mod room;
pub mod state;
pub mod storage;
pub mod toolbar;
pub mod websocket;

use std::sync::Arc;

use axum::{routing::get, Router};

use room::Hub;

pub use app::{App, Screen, Session};
pub use error::{Result, WhiteboardError};

/// Application state shared across all relay connections
#[derive(Clone, Default)]
pub struct AppState {
    pub hub: Arc<Hub>,
}

impl AppState {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Routes served by the relay
pub fn relay_router(state: AppState) -> Router {
    Router::new()
        .route("/ws", get(websocket::handler::ws_handler))
        .route(
            "/topics/:topic/presence",
            get(websocket::handler::presence_handler),
        )
        .route("/health", get(websocket::handler::health_handler))
        .with_state(state)
}
