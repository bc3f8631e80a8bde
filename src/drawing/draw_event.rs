use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::drawing::StickyNote;
use crate::error::WhiteboardError;

/// Largest stroke width accepted from the wire
pub const MAX_LINE_WIDTH: f32 = 100.0;

/// Coordinates further than this from the origin are rejected
pub const MAX_COORDINATE: f32 = 1_000_000.0;

/// Event name used for raster draw events on the room topic
pub const DRAW_EVENT: &str = "draw";
/// Event name used for sticky notes on the room topic
pub const STICKY_EVENT: &str = "sticky";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tool {
    #[default]
    Pen,
    Eraser,
    Rectangle,
    Circle,
    Text,
    Image,
    Sticky,
}

impl Tool {
    pub const ALL: [Tool; 7] = [
        Tool::Pen,
        Tool::Eraser,
        Tool::Rectangle,
        Tool::Circle,
        Tool::Text,
        Tool::Image,
        Tool::Sticky,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Tool::Pen => "pen",
            Tool::Eraser => "eraser",
            Tool::Rectangle => "rectangle",
            Tool::Circle => "circle",
            Tool::Text => "text",
            Tool::Image => "image",
            Tool::Sticky => "sticky",
        }
    }

    /// Tools driven by a press-drag-release gesture
    pub fn is_gesture(&self) -> bool {
        matches!(
            self,
            Tool::Pen | Tool::Eraser | Tool::Rectangle | Tool::Circle
        )
    }
}

impl fmt::Display for Tool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Tool {
    type Err = WhiteboardError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Tool::ALL
            .into_iter()
            .find(|tool| tool.as_str() == s)
            .ok_or_else(|| WhiteboardError::InvalidEvent(format!("unknown tool: {}", s)))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn distance(&self, other: &Point) -> f32 {
        ((other.x - self.x).powi(2) + (other.y - self.y).powi(2)).sqrt()
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

/// RGBA color, written on the wire as `#rrggbb` (or `#rrggbbaa` when translucent)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub const BLACK: Color = Color::rgb(0, 0, 0);
    pub const WHITE: Color = Color::rgb(255, 255, 255);

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    pub fn to_skia(&self) -> tiny_skia::Color {
        tiny_skia::Color::from_rgba8(self.r, self.g, self.b, self.a)
    }
}

impl Default for Color {
    fn default() -> Self {
        Color::BLACK
    }
}

impl FromStr for Color {
    type Err = WhiteboardError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || WhiteboardError::InvalidColor(s.to_string());
        let hex = s.strip_prefix('#').ok_or_else(invalid)?;
        if !hex.is_ascii() || (hex.len() != 6 && hex.len() != 8) {
            return Err(invalid());
        }

        let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).map_err(|_| invalid());
        let a = if hex.len() == 8 { channel(6)? } else { 255 };

        Ok(Self {
            r: channel(0)?,
            g: channel(2)?,
            b: channel(4)?,
            a,
        })
    }
}

impl TryFrom<String> for Color {
    type Error = WhiteboardError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Color> for String {
    fn from(color: Color) -> Self {
        color.to_string()
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}", self.r, self.g, self.b)?;
        if self.a != 255 {
            write!(f, "{:02x}", self.a)?;
        }
        Ok(())
    }
}

/// Two-point gesture shared by strokes and shapes
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Segment {
    pub points: [Point; 2],
    pub color: Color,
    pub line_width: f32,
}

impl Segment {
    pub fn new(start: Point, end: Point, color: Color, line_width: f32) -> Self {
        Self {
            points: [start, end],
            color,
            line_width,
        }
    }

    pub fn start(&self) -> Point {
        self.points[0]
    }

    pub fn end(&self) -> Point {
        self.points[1]
    }
}

/// A single drawing operation, broadcast to peers and replayed on their canvas
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "tool", rename_all = "lowercase")]
pub enum DrawEvent {
    Pen(Segment),
    Eraser(Segment),
    /// Two opposite corners
    Rectangle(Segment),
    /// Centre and a point on the rim
    Circle(Segment),
    #[serde(rename_all = "camelCase")]
    Text {
        at: Point,
        color: Color,
        line_width: f32,
        text: String,
    },
    #[serde(rename_all = "camelCase")]
    Image { at: Point, image_data: String },
    Sticky(StickyNote),
    Clear,
}

impl DrawEvent {
    pub fn tool(&self) -> Option<Tool> {
        match self {
            DrawEvent::Pen(_) => Some(Tool::Pen),
            DrawEvent::Eraser(_) => Some(Tool::Eraser),
            DrawEvent::Rectangle(_) => Some(Tool::Rectangle),
            DrawEvent::Circle(_) => Some(Tool::Circle),
            DrawEvent::Text { .. } => Some(Tool::Text),
            DrawEvent::Image { .. } => Some(Tool::Image),
            DrawEvent::Sticky(_) => Some(Tool::Sticky),
            DrawEvent::Clear => None,
        }
    }

    /// Realtime event name this draw event travels under
    pub fn event_name(&self) -> &'static str {
        match self {
            DrawEvent::Sticky(_) => STICKY_EVENT,
            _ => DRAW_EVENT,
        }
    }

    /// Reject events that cannot be painted
    pub fn validate(&self) -> Result<(), WhiteboardError> {
        match self {
            DrawEvent::Pen(seg)
            | DrawEvent::Eraser(seg)
            | DrawEvent::Rectangle(seg)
            | DrawEvent::Circle(seg) => {
                seg.points.iter().try_for_each(validate_point)?;
                validate_line_width(seg.line_width)
            }
            DrawEvent::Text { at, line_width, .. } => {
                validate_point(at)?;
                validate_line_width(*line_width)
            }
            DrawEvent::Image { at, .. } => validate_point(at),
            DrawEvent::Sticky(note) => validate_point(&note.position()),
            DrawEvent::Clear => Ok(()),
        }
    }

    /// Decode and validate a payload received on the room topic
    pub fn from_payload(payload: serde_json::Value) -> Result<Self, WhiteboardError> {
        let event: DrawEvent = serde_json::from_value(payload)?;
        event.validate()?;
        Ok(event)
    }

    pub fn to_payload(&self) -> Result<serde_json::Value, WhiteboardError> {
        Ok(serde_json::to_value(self)?)
    }
}

fn validate_point(point: &Point) -> Result<(), WhiteboardError> {
    if !point.is_finite() {
        return Err(WhiteboardError::InvalidEvent("non-finite coordinate".into()));
    }
    if point.x.abs() > MAX_COORDINATE || point.y.abs() > MAX_COORDINATE {
        return Err(WhiteboardError::InvalidEvent(format!(
            "coordinate out of range: ({}, {})",
            point.x, point.y
        )));
    }
    Ok(())
}

fn validate_line_width(width: f32) -> Result<(), WhiteboardError> {
    if width.is_nan() || width <= 0.0 || width > MAX_LINE_WIDTH {
        return Err(WhiteboardError::InvalidEvent(format!(
            "line width out of range: {}",
            width
        )));
    }
    Ok(())
}
