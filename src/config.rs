use std::net::SocketAddr;
use std::path::PathBuf;

// Default canvas dimensions
pub const CANVAS_WIDTH: u32 = 1920;
pub const CANVAS_HEIGHT: u32 = 1080;

/// Default relay listen address
pub const DEFAULT_RELAY_ADDR: &str = "0.0.0.0:8080";

/// Settings for a drawing surface
#[derive(Debug, Clone, PartialEq)]
pub struct SurfaceConfig {
    pub width: u32,
    pub height: u32,
    /// TrueType font used by the text tool; text is skipped without one
    pub font_path: Option<PathBuf>,
    /// Maximum number of snapshots kept for undo, unlimited when `None`
    pub history_limit: Option<usize>,
}

impl Default for SurfaceConfig {
    fn default() -> Self {
        Self {
            width: CANVAS_WIDTH,
            height: CANVAS_HEIGHT,
            font_path: None,
            history_limit: None,
        }
    }
}

/// Settings for the relay server
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayConfig {
    pub addr: SocketAddr,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
        }
    }
}

/// Where the local identity store lives when no path is given
pub fn default_storage_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("whiteboard-rs")
        .join("storage.json")
}
