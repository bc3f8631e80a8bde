use crate::drawing::{Color, Tool};

/// Default stroke width ("Medium")
pub const DEFAULT_LINE_WIDTH: f32 = 2.0;

/// Who the local user is and which room they are in
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserState {
    pub name: String,
    pub room_id: Option<String>,
}

impl UserState {
    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    pub fn set_room_id(&mut self, room_id: Option<String>) {
        self.room_id = room_id;
    }

    pub fn has_name(&self) -> bool {
        !self.name.is_empty()
    }
}

/// The local user's current tool settings. Never shared with peers.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DrawingSettings {
    pub color: Color,
    pub tool: Tool,
    pub line_width: f32,
}

impl Default for DrawingSettings {
    fn default() -> Self {
        Self {
            color: Color::BLACK,
            tool: Tool::Pen,
            line_width: DEFAULT_LINE_WIDTH,
        }
    }
}

impl DrawingSettings {
    pub fn set_color(&mut self, color: Color) {
        self.color = color;
    }

    pub fn set_tool(&mut self, tool: Tool) {
        self.tool = tool;
    }

    pub fn set_line_width(&mut self, line_width: f32) {
        self.line_width = line_width;
    }
}
