use std::fmt;

use crate::drawing::{Color, DrawingSurface, Prompt, Tool};
use crate::state::DrawingSettings;

/// Colors offered by the toolbar
pub const PALETTE: [Color; 7] = [
    Color::rgb(0x00, 0x00, 0x00),
    Color::rgb(0xff, 0x00, 0x00),
    Color::rgb(0x00, 0xff, 0x00),
    Color::rgb(0x00, 0x00, 0xff),
    Color::rgb(0xff, 0xff, 0x00),
    Color::rgb(0xff, 0x00, 0xff),
    Color::rgb(0x00, 0xff, 0xff),
];

pub const CLEAR_CONFIRMATION: &str = "Are you sure you want to clear the canvas?";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LineWidth {
    Thin,
    #[default]
    Medium,
    Thick,
}

impl LineWidth {
    pub const ALL: [LineWidth; 3] = [LineWidth::Thin, LineWidth::Medium, LineWidth::Thick];

    pub fn px(&self) -> f32 {
        match self {
            LineWidth::Thin => 1.0,
            LineWidth::Medium => 2.0,
            LineWidth::Thick => 4.0,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            LineWidth::Thin => "Thin",
            LineWidth::Medium => "Medium",
            LineWidth::Thick => "Thick",
        }
    }
}

impl fmt::Display for LineWidth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Pick a palette color by index. Returns false for an index outside the palette.
pub fn select_color(settings: &mut DrawingSettings, index: usize) -> bool {
    match PALETTE.get(index) {
        Some(color) => {
            settings.set_color(*color);
            true
        }
        None => false,
    }
}

pub fn select_tool(settings: &mut DrawingSettings, tool: Tool) {
    settings.set_tool(tool);
}

pub fn select_line_width(settings: &mut DrawingSettings, width: LineWidth) {
    settings.set_line_width(width.px());
}

/// Clear the canvas for everyone once the user confirms
pub fn clear_canvas(surface: &mut DrawingSurface, prompt: &mut dyn Prompt) -> bool {
    if !prompt.confirm(CLEAR_CONFIRMATION) {
        return false;
    }

    surface.clear();
    tracing::info!("Canvas cleared");
    true
}
