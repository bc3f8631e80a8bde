//! Lobby flow and the per-room session.

use rand::Rng;

use crate::chat::ChatPanel;
use crate::config::SurfaceConfig;
use crate::drawing::{DrawingSurface, Point, Prompt};
use crate::error::{Result, WhiteboardError};
use crate::presence::PresencePanel;
use crate::realtime::{draw_topic, Transport};
use crate::state::{DrawingSettings, UserState};
use crate::storage::{LocalStorage, USER_NAME_KEY};
use crate::toolbar;

const ROOM_ID_LEN: usize = 6;
const ROOM_ID_CHARSET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
    NameEntry,
    RoomSelect,
    Board,
}

pub struct App {
    storage: LocalStorage,
    user: UserState,
    config: SurfaceConfig,
}

impl App {
    /// Start the app, picking up a name saved by an earlier run
    pub fn new(storage: LocalStorage, config: SurfaceConfig) -> Self {
        let mut user = UserState::default();
        if let Some(name) = storage.get(USER_NAME_KEY) {
            user.set_name(name);
        }

        Self {
            storage,
            user,
            config,
        }
    }

    pub fn screen(&self) -> Screen {
        if !self.user.has_name() {
            Screen::NameEntry
        } else if self.user.room_id.is_none() {
            Screen::RoomSelect
        } else {
            Screen::Board
        }
    }

    pub fn user(&self) -> &UserState {
        &self.user
    }

    pub fn set_name(&mut self, name: &str) -> Result<()> {
        if name.trim().is_empty() {
            return Err(WhiteboardError::EmptyName);
        }
        self.user.set_name(name);
        self.storage.set(USER_NAME_KEY, name)
    }

    pub fn join_room(&mut self, code: &str) -> Result<()> {
        let code = code.trim();
        if code.is_empty() {
            return Err(WhiteboardError::EmptyRoomCode);
        }
        self.user.set_room_id(Some(code.to_string()));
        Ok(())
    }

    /// Switch to a freshly generated room and return its id
    pub fn create_room(&mut self) -> String {
        let room_id = generate_room_id();
        self.user.set_room_id(Some(room_id.clone()));
        room_id
    }

    pub fn leave_room(&mut self) {
        self.user.set_room_id(None);
    }

    /// Open the board for the current room
    pub fn enter(&self, transport: &dyn Transport) -> Result<Session> {
        if !self.user.has_name() {
            return Err(WhiteboardError::EmptyName);
        }
        let room_id = self
            .user
            .room_id
            .as_deref()
            .ok_or(WhiteboardError::EmptyRoomCode)?;

        Session::open(transport, room_id, &self.user.name, &self.config)
    }
}

pub fn generate_room_id() -> String {
    let mut rng = rand::thread_rng();
    (0..ROOM_ID_LEN)
        .map(|_| char::from(ROOM_ID_CHARSET[rng.gen_range(0..ROOM_ID_CHARSET.len())]))
        .collect()
}

/// Everything on screen while inside a room
pub struct Session {
    room_id: String,
    settings: DrawingSettings,
    surface: DrawingSurface,
    chat: ChatPanel,
    presence: PresencePanel,
}

impl Session {
    pub fn open(
        transport: &dyn Transport,
        room_id: &str,
        name: &str,
        config: &SurfaceConfig,
    ) -> Result<Self> {
        let channel = transport.subscribe(&draw_topic(room_id), None)?;
        let surface = DrawingSurface::from_config(config, channel)?;
        let chat = ChatPanel::join(transport, room_id, name)?;
        let presence = PresencePanel::join(transport, room_id, name)?;

        tracing::info!("{} entered room {}", name, room_id);

        Ok(Self {
            room_id: room_id.to_string(),
            settings: DrawingSettings::default(),
            surface,
            chat,
            presence,
        })
    }

    /// Dispatch everything that arrived on the room's channels
    pub fn pump(&mut self) -> usize {
        self.surface.poll() + self.chat.poll() + self.presence.poll()
    }

    pub fn pointer_down(&mut self, at: Point, prompt: &mut dyn Prompt) {
        self.surface.pointer_down(at, &self.settings, prompt);
    }

    pub fn pointer_move(&mut self, at: Point) {
        self.surface.pointer_move(at);
    }

    pub fn pointer_up(&mut self) {
        self.surface.pointer_up();
    }

    pub fn clear_canvas(&mut self, prompt: &mut dyn Prompt) -> bool {
        toolbar::clear_canvas(&mut self.surface, prompt)
    }

    pub fn room_id(&self) -> &str {
        &self.room_id
    }

    pub fn settings(&self) -> &DrawingSettings {
        &self.settings
    }

    pub fn settings_mut(&mut self) -> &mut DrawingSettings {
        &mut self.settings
    }

    pub fn surface(&self) -> &DrawingSurface {
        &self.surface
    }

    pub fn surface_mut(&mut self) -> &mut DrawingSurface {
        &mut self.surface
    }

    pub fn chat(&self) -> &ChatPanel {
        &self.chat
    }

    pub fn chat_mut(&mut self) -> &mut ChatPanel {
        &mut self.chat
    }

    pub fn presence(&self) -> &PresencePanel {
        &self.presence
    }
}
