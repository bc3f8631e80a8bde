use crate::config::SurfaceConfig;
use crate::drawing::canvas::{load_font, Snapshot};
use crate::drawing::draw_event::{DRAW_EVENT, STICKY_EVENT};
use crate::drawing::{
    image_data, Canvas, Color, DrawEvent, Point, Prompt, Segment, StickyNote, Tool,
};
use crate::error::Result;
use crate::history::HistoryBuffer;
use crate::realtime::Channel;
use crate::state::DrawingSettings;
use crate::websocket::message::ServerFrame;

/// A press-drag-release in progress. Settings are captured at pointer-down.
#[derive(Debug, Clone, Copy)]
struct Gesture {
    tool: Tool,
    color: Color,
    line_width: f32,
    start: Point,
    current: Point,
}

impl Gesture {
    fn shape(&self) -> Option<DrawEvent> {
        let seg = Segment::new(self.start, self.current, self.color, self.line_width);
        match self.tool {
            Tool::Rectangle => Some(DrawEvent::Rectangle(seg)),
            Tool::Circle => Some(DrawEvent::Circle(seg)),
            _ => None,
        }
    }
}

/// Turns pointer input into draw events, paints them, mirrors them to the
/// room channel and replays events that arrive from peers.
pub struct DrawingSurface {
    canvas: Canvas,
    history: HistoryBuffer<Snapshot>,
    notes: Vec<StickyNote>,
    gesture: Option<Gesture>,
    channel: Channel,
}

impl DrawingSurface {
    pub fn new(canvas: Canvas, history: HistoryBuffer<Snapshot>, channel: Channel) -> Self {
        Self {
            canvas,
            history,
            notes: Vec::new(),
            gesture: None,
            channel,
        }
    }

    pub fn from_config(config: &SurfaceConfig, channel: Channel) -> Result<Self> {
        let mut canvas = Canvas::new(config.width, config.height)?;
        if let Some(path) = &config.font_path {
            match load_font(path) {
                Ok(font) => canvas = canvas.with_font(font),
                Err(e) => tracing::warn!("Text rendering disabled: {}", e),
            }
        }

        let history = match config.history_limit {
            Some(limit) => HistoryBuffer::with_limit(limit),
            None => HistoryBuffer::new(),
        };

        Ok(Self::new(canvas, history, channel))
    }

    pub fn pointer_down(&mut self, at: Point, settings: &DrawingSettings, prompt: &mut dyn Prompt) {
        match settings.tool {
            Tool::Text => {
                let Some(text) = prompt.text("Enter text:").filter(|t| !t.is_empty()) else {
                    return;
                };
                self.commit(DrawEvent::Text {
                    at,
                    color: settings.color,
                    line_width: settings.line_width,
                    text,
                });
            }
            Tool::Image => self.place_image(at, prompt),
            Tool::Sticky => {
                let Some(text) = prompt
                    .text("Enter sticky note text:")
                    .filter(|t| !t.is_empty())
                else {
                    return;
                };
                let event = DrawEvent::Sticky(StickyNote::create(at, text, settings.color));
                if !accepted(&event) {
                    return;
                }
                self.publish(&event);
                if let DrawEvent::Sticky(note) = event {
                    self.notes.push(note);
                }
            }
            Tool::Pen | Tool::Eraser | Tool::Rectangle | Tool::Circle => {
                let color = if settings.tool == Tool::Eraser {
                    Color::WHITE
                } else {
                    settings.color
                };
                self.gesture = Some(Gesture {
                    tool: settings.tool,
                    color,
                    line_width: settings.line_width,
                    start: at,
                    current: at,
                });
            }
        }
    }

    pub fn pointer_move(&mut self, at: Point) {
        let Some(gesture) = self.gesture.as_mut() else {
            return;
        };

        match gesture.tool {
            Tool::Pen | Tool::Eraser => {
                let seg = Segment::new(gesture.start, at, gesture.color, gesture.line_width);
                let event = if gesture.tool == Tool::Eraser {
                    DrawEvent::Eraser(seg)
                } else {
                    DrawEvent::Pen(seg)
                };
                gesture.start = at;
                gesture.current = at;
                self.commit(event);
            }
            Tool::Rectangle | Tool::Circle => {
                gesture.current = at;
                if let Some(shape) = gesture.shape() {
                    self.canvas.preview(&shape);
                }
            }
            _ => {}
        }
    }

    /// End the gesture. Shapes are committed here; strokes already were.
    pub fn pointer_up(&mut self) {
        let Some(gesture) = self.gesture.take() else {
            return;
        };

        // Raster must equal what peers get from replaying the event
        self.canvas.clear_overlay();
        if let Some(shape) = gesture.shape() {
            self.commit(shape);
        }
    }

    /// Losing the pointer ends the gesture exactly like releasing it
    pub fn pointer_leave(&mut self) {
        self.pointer_up();
    }

    /// Wipe the canvas and history here and on every peer
    pub fn clear(&mut self) {
        self.gesture = None;
        self.canvas.clear();
        self.history.clear();
        self.publish(&DrawEvent::Clear);
    }

    pub fn undo(&mut self) -> bool {
        let moved = self.history.undo();
        if moved {
            self.repaint();
        }
        moved
    }

    pub fn redo(&mut self) -> bool {
        let moved = self.history.redo();
        if moved {
            self.repaint();
        }
        moved
    }

    /// Apply an event received from a peer. Nothing is re-broadcast.
    pub fn apply_remote(&mut self, event: DrawEvent) {
        match event {
            DrawEvent::Sticky(note) => self.notes.push(note),
            DrawEvent::Clear => {
                self.canvas.clear();
                self.history.clear();
            }
            other => match self.canvas.paint(&other) {
                Ok(true) => self.record(),
                Ok(false) => {}
                Err(e) => tracing::warn!("Could not replay {:?} event: {}", other.tool(), e),
            },
        }
    }

    /// Handle one frame from the room channel
    pub fn handle_frame(&mut self, frame: ServerFrame) {
        match frame {
            ServerFrame::Broadcast { event, payload, .. }
                if event == DRAW_EVENT || event == STICKY_EVENT =>
            {
                match DrawEvent::from_payload(payload) {
                    Ok(draw_event) => self.apply_remote(draw_event),
                    Err(e) => tracing::warn!("Invalid {} event: {}", event, e),
                }
            }
            ServerFrame::Broadcast { event, .. } => {
                tracing::debug!("Ignoring {} event on {}", event, self.channel.topic());
            }
            ServerFrame::Error { message, .. } => {
                tracing::warn!("Realtime error on {}: {}", self.channel.topic(), message);
            }
            _ => {}
        }
    }

    /// Drain inbound frames. Returns how many were handled.
    pub fn poll(&mut self) -> usize {
        let mut handled = 0;
        while let Some(frame) = self.channel.poll() {
            self.handle_frame(frame);
            handled += 1;
        }
        handled
    }

    pub fn canvas(&self) -> &Canvas {
        &self.canvas
    }

    pub fn history(&self) -> &HistoryBuffer<Snapshot> {
        &self.history
    }

    pub fn sticky_notes(&self) -> &[StickyNote] {
        &self.notes
    }

    pub fn is_drawing(&self) -> bool {
        self.gesture.is_some()
    }

    /// Where the pointer marker sits while a gesture is active
    pub fn cursor_marker(&self) -> Option<Point> {
        self.gesture.map(|g| g.start)
    }

    pub fn export_png(&self) -> Result<Vec<u8>> {
        self.canvas.to_png()
    }

    fn place_image(&mut self, at: Point, prompt: &mut dyn Prompt) {
        let Some(path) = prompt.pick_image() else {
            return;
        };

        let bytes = match std::fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!("Could not read {}: {}", path.display(), e);
                return;
            }
        };

        match image_data::encode_data_url(&bytes) {
            Ok(image_data) => self.commit(DrawEvent::Image { at, image_data }),
            Err(e) => tracing::warn!("Could not load image {}: {}", path.display(), e),
        }
    }

    /// Paint a local event, broadcast it and snapshot the result
    fn commit(&mut self, event: DrawEvent) {
        if !accepted(&event) {
            return;
        }
        match self.canvas.paint(&event) {
            Ok(true) => {
                self.publish(&event);
                self.record();
            }
            Ok(false) => {}
            Err(e) => tracing::warn!("Could not paint {:?} event: {}", event.tool(), e),
        }
    }

    fn publish(&self, event: &DrawEvent) {
        match event.to_payload() {
            Ok(payload) => self.channel.publish(event.event_name(), payload),
            Err(e) => tracing::warn!("Could not encode draw event: {}", e),
        }
    }

    fn record(&mut self) {
        self.history.record(self.canvas.snapshot());
    }

    fn repaint(&mut self) {
        match self.history.current() {
            Some(snapshot) => self.canvas.restore(snapshot),
            None => self.canvas.clear(),
        }
    }
}

/// Local events pass the same checks peers apply on receipt
fn accepted(event: &DrawEvent) -> bool {
    match event.validate() {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!("Refusing to draw {:?} event: {}", event.tool(), e);
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drawing::image_data::png_bytes;
    use crate::drawing::ScriptedPrompt;
    use crate::realtime::{draw_topic, LocalTransport, Transport};
    use serde_json::json;

    const RED: Color = Color::rgb(255, 0, 0);

    fn small_config() -> SurfaceConfig {
        SurfaceConfig {
            width: 120,
            height: 120,
            ..Default::default()
        }
    }

    fn surface(transport: &LocalTransport) -> DrawingSurface {
        let channel = transport.subscribe(&draw_topic("t"), None).unwrap();
        let mut surface = DrawingSurface::from_config(&small_config(), channel).unwrap();
        // Drop the initial presence sync
        surface.poll();
        surface
    }

    fn settings(tool: Tool) -> DrawingSettings {
        DrawingSettings {
            color: RED,
            tool,
            line_width: 4.0,
        }
    }

    fn peer_events(channel: &mut Channel) -> Vec<(String, serde_json::Value)> {
        let mut events = Vec::new();
        while let Some(frame) = channel.poll() {
            if let ServerFrame::Broadcast { event, payload, .. } = frame {
                events.push((event, payload));
            }
        }
        events
    }

    fn drag(surface: &mut DrawingSurface, tool: Tool, from: (f32, f32), to: (f32, f32)) {
        let mut prompt = ScriptedPrompt::new();
        surface.pointer_down(Point::new(from.0, from.1), &settings(tool), &mut prompt);
        surface.pointer_move(Point::new((from.0 + to.0) / 2.0, (from.1 + to.1) / 2.0));
        surface.pointer_move(Point::new(to.0, to.1));
        surface.pointer_up();
    }

    #[test]
    fn test_pen_broadcasts_every_segment() {
        let transport = LocalTransport::default();
        let mut surface = surface(&transport);
        let mut peer = transport.subscribe(&draw_topic("t"), None).unwrap();

        drag(&mut surface, Tool::Pen, (10.0, 10.0), (100.0, 10.0));

        let events = peer_events(&mut peer);
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].0, "draw");
        assert_eq!(events[0].1["tool"], "pen");
        assert_eq!(events[1].1["points"][0]["x"], 55.0);
        assert_eq!(surface.history().len(), 2);
        assert!(!surface.is_drawing());
    }

    #[test]
    fn test_eraser_sends_background_color() {
        let transport = LocalTransport::default();
        let mut surface = surface(&transport);
        let mut peer = transport.subscribe(&draw_topic("t"), None).unwrap();

        drag(&mut surface, Tool::Eraser, (10.0, 10.0), (50.0, 10.0));

        let events = peer_events(&mut peer);
        assert_eq!(events[0].1["tool"], "eraser");
        assert_eq!(events[0].1["color"], "#ffffff");
    }

    #[test]
    fn test_three_rectangles_three_history_entries() {
        let transport = LocalTransport::default();
        let mut surface = surface(&transport);
        let mut peer = transport.subscribe(&draw_topic("t"), None).unwrap();

        drag(&mut surface, Tool::Rectangle, (10.0, 10.0), (40.0, 40.0));
        drag(&mut surface, Tool::Rectangle, (50.0, 50.0), (80.0, 80.0));
        drag(&mut surface, Tool::Rectangle, (20.0, 60.0), (60.0, 100.0));

        assert_eq!(surface.history().len(), 3);
        assert_eq!(surface.history().cursor(), Some(2));

        let events = peer_events(&mut peer);
        assert_eq!(events.len(), 3);
        assert_eq!(
            events[0].1["points"],
            json!([{"x": 10.0, "y": 10.0}, {"x": 40.0, "y": 40.0}])
        );
    }

    #[test]
    fn test_shape_preview_not_committed_before_release() {
        let transport = LocalTransport::default();
        let mut surface = surface(&transport);
        let mut prompt = ScriptedPrompt::new();

        surface.pointer_down(Point::new(60.0, 60.0), &settings(Tool::Circle), &mut prompt);
        surface.pointer_move(Point::new(90.0, 60.0));
        assert_eq!(surface.history().len(), 0);
        assert_eq!(surface.canvas().pixel(90, 60), Some(Color::WHITE));
        assert_eq!(surface.cursor_marker(), Some(Point::new(60.0, 60.0)));

        surface.pointer_leave();
        assert_eq!(surface.history().len(), 1);
        assert_ne!(surface.canvas().pixel(90, 60), Some(Color::WHITE));
        assert_eq!(surface.canvas().overlay_pixel(90, 60).map(|c| c.a), Some(0));
        assert_eq!(surface.cursor_marker(), None);
    }

    #[test]
    fn test_click_without_drag_commits_nothing() {
        let transport = LocalTransport::default();
        let mut surface = surface(&transport);
        let mut peer = transport.subscribe(&draw_topic("t"), None).unwrap();
        let mut prompt = ScriptedPrompt::new();

        surface.pointer_down(Point::new(60.0, 60.0), &settings(Tool::Rectangle), &mut prompt);
        surface.pointer_up();

        assert!(surface.history().is_empty());
        assert!(peer_events(&mut peer).is_empty());
    }

    #[test]
    fn test_move_without_gesture_is_ignored() {
        let transport = LocalTransport::default();
        let mut surface = surface(&transport);
        surface.pointer_move(Point::new(10.0, 10.0));
        surface.pointer_up();
        assert!(surface.history().is_empty());
    }

    #[test]
    fn test_text_prompt() {
        let transport = LocalTransport::default();
        let mut surface = surface(&transport);
        let mut peer = transport.subscribe(&draw_topic("t"), None).unwrap();

        let mut cancelled = ScriptedPrompt::new().answer_text("");
        surface.pointer_down(Point::new(10.0, 50.0), &settings(Tool::Text), &mut cancelled);
        assert!(surface.history().is_empty());

        let mut prompt = ScriptedPrompt::new().answer_text("hello");
        surface.pointer_down(Point::new(10.0, 50.0), &settings(Tool::Text), &mut prompt);
        assert_eq!(surface.history().len(), 1);
        assert!(!surface.is_drawing());

        let events = peer_events(&mut peer);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].1["text"], "hello");
        assert_eq!(events[0].1["lineWidth"], 4.0);
    }

    #[test]
    fn test_image_placement() {
        let transport = LocalTransport::default();
        let mut surface = surface(&transport);
        let mut peer = transport.subscribe(&draw_topic("t"), None).unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dot.png");
        std::fs::write(&path, png_bytes(5, 5, [0, 0, 255, 255])).unwrap();

        let mut prompt = ScriptedPrompt::new().answer_image(&path);
        surface.pointer_down(Point::new(30.0, 30.0), &settings(Tool::Image), &mut prompt);

        assert_eq!(surface.canvas().pixel(32, 32), Some(Color::rgb(0, 0, 255)));
        assert_eq!(surface.history().len(), 1);

        let events = peer_events(&mut peer);
        assert_eq!(events[0].1["tool"], "image");
        assert!(events[0].1["imageData"]
            .as_str()
            .unwrap()
            .starts_with("data:image/png;base64,"));
    }

    #[test]
    fn test_unreadable_image_is_ignored() {
        let transport = LocalTransport::default();
        let mut surface = surface(&transport);
        let mut prompt = ScriptedPrompt::new().answer_image("/definitely/not/here.png");
        surface.pointer_down(Point::new(30.0, 30.0), &settings(Tool::Image), &mut prompt);
        assert!(surface.history().is_empty());
    }

    #[test]
    fn test_sticky_note_is_overlay_only() {
        let transport = LocalTransport::default();
        let mut surface = surface(&transport);
        let mut peer = transport.subscribe(&draw_topic("t"), None).unwrap();

        let mut prompt = ScriptedPrompt::new().answer_text("remember");
        surface.pointer_down(Point::new(40.0, 40.0), &settings(Tool::Sticky), &mut prompt);

        assert_eq!(surface.sticky_notes().len(), 1);
        assert_eq!(surface.sticky_notes()[0].text, "remember");
        assert_eq!(surface.sticky_notes()[0].color, RED);
        assert!(surface.history().is_empty());

        let events = peer_events(&mut peer);
        assert_eq!(events[0].0, "sticky");
        assert_eq!(events[0].1["text"], "remember");
    }

    #[test]
    fn test_undo_redo_repaints() {
        let transport = LocalTransport::default();
        let mut surface = surface(&transport);

        drag(&mut surface, Tool::Rectangle, (10.0, 10.0), (50.0, 50.0));
        let after_first = surface.canvas().data().to_vec();
        drag(&mut surface, Tool::Rectangle, (60.0, 60.0), (100.0, 100.0));

        assert!(surface.undo());
        assert_eq!(surface.canvas().data(), &after_first[..]);

        assert!(surface.undo());
        assert_eq!(surface.canvas().pixel(10, 30), Some(Color::WHITE));
        assert!(!surface.undo());

        assert!(surface.redo());
        assert_eq!(surface.canvas().data(), &after_first[..]);
    }

    #[test]
    fn test_local_clear() {
        let transport = LocalTransport::default();
        let mut surface = surface(&transport);
        let mut peer = transport.subscribe(&draw_topic("t"), None).unwrap();

        drag(&mut surface, Tool::Pen, (10.0, 10.0), (100.0, 100.0));
        peer_events(&mut peer);

        surface.clear();
        assert!(surface.history().is_empty());
        assert_eq!(surface.history().cursor(), None);
        assert_eq!(surface.canvas().pixel(55, 55), Some(Color::WHITE));

        let events = peer_events(&mut peer);
        assert_eq!(events, vec![("draw".to_string(), json!({"tool": "clear"}))]);
    }

    #[test]
    fn test_remote_clear_matches_local_clear() {
        let transport = LocalTransport::default();
        let mut local = surface(&transport);
        let mut remote = surface(&transport);

        drag(&mut local, Tool::Rectangle, (10.0, 10.0), (50.0, 50.0));
        drag(&mut remote, Tool::Rectangle, (60.0, 60.0), (100.0, 100.0));
        local.poll();
        remote.poll();
        assert_eq!(remote.history().len(), 2);

        local.clear();
        remote.poll();

        assert!(remote.history().is_empty());
        assert_eq!(remote.history().cursor(), None);
        assert_eq!(remote.canvas().data(), local.canvas().data());
    }

    #[test]
    fn test_remote_events_replay_without_rebroadcast() {
        let transport = LocalTransport::default();
        let mut origin = surface(&transport);
        let mut replica = surface(&transport);

        drag(&mut origin, Tool::Rectangle, (10.0, 10.0), (50.0, 50.0));
        drag(&mut origin, Tool::Circle, (80.0, 80.0), (100.0, 80.0));
        let mut prompt = ScriptedPrompt::new().answer_text("note");
        origin.pointer_down(Point::new(5.0, 5.0), &settings(Tool::Sticky), &mut prompt);

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("patch.png");
        std::fs::write(&path, png_bytes(6, 4, [0, 128, 0, 255])).unwrap();
        let mut prompt = ScriptedPrompt::new().answer_image(&path);
        origin.pointer_down(Point::new(70.0, 20.0), &settings(Tool::Image), &mut prompt);

        assert_eq!(replica.poll(), 4);
        assert_eq!(replica.canvas().data(), origin.canvas().data());
        assert_eq!(replica.canvas().pixel(72, 22), Some(Color::rgb(0, 128, 0)));
        assert_eq!(replica.history().len(), 3);
        assert_eq!(replica.sticky_notes(), origin.sticky_notes());

        // Replaying must not echo anything back to the origin
        assert_eq!(origin.poll(), 0);
    }

    #[test]
    fn test_invalid_remote_event_dropped() {
        let transport = LocalTransport::default();
        let mut replica = surface(&transport);
        let peer = transport.subscribe(&draw_topic("t"), None).unwrap();

        peer.publish(
            "draw",
            json!({
                "tool": "pen",
                "points": [{"x": 0.0, "y": 0.0}, {"x": 10.0, "y": 10.0}],
                "color": "red",
                "lineWidth": 2.0,
            }),
        );
        peer.publish("cursor", json!({"x": 1}));

        assert_eq!(replica.poll(), 2);
        assert!(replica.history().is_empty());
    }

    #[test]
    fn test_out_of_range_remote_image_dropped() {
        let transport = LocalTransport::default();
        let mut replica = surface(&transport);
        let peer = transport.subscribe(&draw_topic("t"), None).unwrap();

        let image_data = image_data::encode_data_url(&png_bytes(4, 4, [0, 0, 255, 255])).unwrap();
        peer.publish(
            "draw",
            json!({"tool": "image", "at": {"x": 3.0e9, "y": 5.0}, "imageData": image_data}),
        );

        assert_eq!(replica.poll(), 1);
        assert!(replica.history().is_empty());
        assert_eq!(replica.canvas().pixel(0, 5), Some(Color::WHITE));
    }

    #[test]
    fn test_local_events_validated_like_remote_ones() {
        let transport = LocalTransport::default();
        let mut surface = surface(&transport);
        let mut peer = transport.subscribe(&draw_topic("t"), None).unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dot.png");
        std::fs::write(&path, png_bytes(4, 4, [0, 0, 255, 255])).unwrap();
        let mut prompt = ScriptedPrompt::new().answer_image(&path);
        surface.pointer_down(Point::new(3.0e9, 5.0), &settings(Tool::Image), &mut prompt);

        drag(&mut surface, Tool::Pen, (f32::NAN, 10.0), (40.0, 10.0));

        let mut prompt = ScriptedPrompt::new().answer_text("lost");
        surface.pointer_down(Point::new(5.0, -4.0e6), &settings(Tool::Sticky), &mut prompt);

        assert!(surface.history().is_empty());
        assert!(surface.sticky_notes().is_empty());
        assert!(peer_events(&mut peer).is_empty());
    }

    #[test]
    fn test_history_limit_from_config() {
        let transport = LocalTransport::default();
        let config = SurfaceConfig {
            history_limit: Some(2),
            ..small_config()
        };
        let mut surface =
            DrawingSurface::from_config(&config, transport.subscribe("room:t", None).unwrap()).unwrap();

        for i in 0..4 {
            let offset = i as f32 * 10.0;
            drag(&mut surface, Tool::Rectangle, (offset, offset), (offset + 20.0, offset + 20.0));
        }
        assert_eq!(surface.history().len(), 2);
    }

    #[test]
    fn test_missing_font_still_builds_surface() {
        let transport = LocalTransport::default();
        let config = SurfaceConfig {
            font_path: Some("/no/such/font.ttf".into()),
            ..small_config()
        };
        assert!(DrawingSurface::from_config(&config, transport.subscribe("room:t", None).unwrap()).is_ok());
    }

    #[test]
    fn test_export_png() {
        let transport = LocalTransport::default();
        let surface = surface(&transport);
        let png = surface.export_png().unwrap();
        assert_eq!(&png[1..4], b"PNG");
    }
}
