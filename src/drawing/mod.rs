pub mod canvas;
pub mod draw_event;
pub mod image_data;
pub mod prompt;
pub mod sticky;
pub mod surface;

pub use canvas::{Canvas, Snapshot};
pub use draw_event::{Color, DrawEvent, Point, Segment, Tool};
pub use prompt::{Prompt, ScriptedPrompt};
pub use sticky::StickyNote;
pub use surface::DrawingSurface;
