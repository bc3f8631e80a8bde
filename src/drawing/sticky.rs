use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::drawing::{Color, Point};

/// Length of generated sticky note ids
const NOTE_ID_LEN: usize = 6;

/// A note pinned on top of the canvas. Notes are never rasterised.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StickyNote {
    pub id: String,
    pub x: f32,
    pub y: f32,
    pub text: String,
    pub color: Color,
}

impl StickyNote {
    pub fn new(id: impl Into<String>, at: Point, text: impl Into<String>, color: Color) -> Self {
        Self {
            id: id.into(),
            x: at.x,
            y: at.y,
            text: text.into(),
            color,
        }
    }

    /// Create a note with a fresh random id
    pub fn create(at: Point, text: impl Into<String>, color: Color) -> Self {
        Self::new(generate_note_id(), at, text, color)
    }

    pub fn position(&self) -> Point {
        Point::new(self.x, self.y)
    }
}

fn generate_note_id() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(NOTE_ID_LEN)
        .map(|b| char::from(b).to_ascii_lowercase())
        .collect()
}
