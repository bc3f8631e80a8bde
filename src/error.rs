use thiserror::Error;

#[derive(Error, Debug)]
pub enum WhiteboardError {
    #[error("Invalid color: {0}")]
    InvalidColor(String),

    #[error("Invalid draw event: {0}")]
    InvalidEvent(String),

    #[error("Invalid image payload: {0}")]
    InvalidImage(String),

    #[error("Topic {0} is full (max 100 members)")]
    TopicFull(String),

    #[error("Not joined to topic {0}")]
    NotJoined(String),

    #[error("Topic {0} was joined without a presence key")]
    PresenceKeyMissing(String),

    #[error("Name must not be empty")]
    EmptyName,

    #[error("Room code must not be empty")]
    EmptyRoomCode,

    #[error("Canvas size {0}x{1} is not drawable")]
    CanvasSize(u32, u32),

    #[error("Font error: {0}")]
    Font(String),

    #[error("WebSocket error: {0}")]
    WebSocketError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Image error: {0}")]
    ImageError(#[from] image::ImageError),
}

pub type Result<T> = std::result::Result<T, WhiteboardError>;

impl From<tokio_tungstenite::tungstenite::Error> for WhiteboardError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        WhiteboardError::WebSocketError(err.to_string())
    }
}
