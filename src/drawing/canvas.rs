use ab_glyph::{point, Font, FontArc, ScaleFont};
use image::{ImageBuffer, ImageFormat, Rgba};
use std::io::Cursor;
use std::path::Path;
use tiny_skia::{
    Color as SkiaColor, LineCap, LineJoin, Paint, PathBuilder, Pixmap, PixmapPaint, Rect, Stroke,
    Transform,
};

use crate::drawing::{image_data, Color, DrawEvent, Point, Segment};
use crate::error::{Result, WhiteboardError};

/// Text glyphs are `line_width * TEXT_SCALE` pixels tall
pub const TEXT_SCALE: f32 = 10.0;

/// Integer origin for an image edge at `pos`, if the far edge also fits in `i32`
fn pixel_origin(pos: f32, len: u32) -> Option<i32> {
    if !pos.is_finite() {
        return None;
    }
    let start = i32::try_from(pos.round() as i64).ok()?;
    start.checked_add(i32::try_from(len).ok()?)?;
    Some(start)
}

/// A full copy of the raster at one point in time
#[derive(Clone)]
pub struct Snapshot(Pixmap);

impl Snapshot {
    pub fn data(&self) -> &[u8] {
        self.0.data()
    }
}

impl std::fmt::Debug for Snapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Snapshot({}x{})", self.0.width(), self.0.height())
    }
}

/// The shared raster plus a transparent overlay used for shape previews
pub struct Canvas {
    pixmap: Pixmap,
    overlay: Pixmap,
    font: Option<FontArc>,
    width: u32,
    height: u32,
}

impl Canvas {
    pub fn new(width: u32, height: u32) -> Result<Self> {
        let mut pixmap = Pixmap::new(width, height).ok_or(WhiteboardError::CanvasSize(width, height))?;
        let overlay = Pixmap::new(width, height).ok_or(WhiteboardError::CanvasSize(width, height))?;

        // Fill with white background
        pixmap.fill(SkiaColor::WHITE);

        Ok(Self {
            pixmap,
            overlay,
            font: None,
            width,
            height,
        })
    }

    pub fn with_font(mut self, font: FontArc) -> Self {
        self.font = Some(font);
        self
    }

    /// Apply an event to the raster. Returns false when nothing was painted.
    pub fn paint(&mut self, event: &DrawEvent) -> Result<bool> {
        match event {
            DrawEvent::Pen(seg) => {
                stroke_line(&mut self.pixmap, seg, seg.color);
                Ok(true)
            }
            DrawEvent::Eraser(seg) => {
                stroke_line(&mut self.pixmap, seg, Color::WHITE);
                Ok(true)
            }
            DrawEvent::Rectangle(seg) => Ok(stroke_rectangle(&mut self.pixmap, seg)),
            DrawEvent::Circle(seg) => Ok(stroke_circle(&mut self.pixmap, seg)),
            DrawEvent::Text {
                at,
                color,
                line_width,
                text,
            } => {
                self.draw_text(*at, *color, *line_width, text);
                Ok(true)
            }
            DrawEvent::Image { at, image_data } => {
                let image = image_data::decode_data_url(image_data)?;
                Ok(self.draw_image(*at, &image))
            }
            DrawEvent::Sticky(_) => Ok(false),
            DrawEvent::Clear => {
                self.clear();
                Ok(true)
            }
        }
    }

    /// Replace the overlay contents with a preview of a shape gesture
    pub fn preview(&mut self, event: &DrawEvent) {
        self.clear_overlay();
        match event {
            DrawEvent::Rectangle(seg) => {
                stroke_rectangle(&mut self.overlay, seg);
            }
            DrawEvent::Circle(seg) => {
                stroke_circle(&mut self.overlay, seg);
            }
            _ => {}
        }
    }

    pub fn clear_overlay(&mut self) {
        self.overlay.fill(SkiaColor::TRANSPARENT);
    }

    /// Draw text with its baseline starting at `at`
    pub fn draw_text(&mut self, at: Point, color: Color, line_width: f32, text: &str) {
        let Some(font) = self.font.as_ref() else {
            tracing::warn!("No font loaded, skipping text {:?}", text);
            return;
        };
        if text.is_empty() {
            return;
        }

        let pixmap = &mut self.pixmap;
        let scaled = font.as_scaled(line_width * TEXT_SCALE);
        let mut caret = point(at.x, at.y);

        for ch in text.chars() {
            let mut glyph = scaled.scaled_glyph(ch);
            glyph.position = caret;
            caret.x += scaled.h_advance(glyph.id);

            if let Some(outlined) = scaled.outline_glyph(glyph) {
                let bounds = outlined.px_bounds();
                outlined.draw(|x, y, coverage| {
                    let px = x as f32 + bounds.min.x;
                    let py = y as f32 + bounds.min.y;
                    let alpha = (color.a as f32 * coverage).round().clamp(0.0, 255.0) as u8;
                    if alpha == 0 {
                        return;
                    }

                    let mut paint = Paint::default();
                    paint.set_color_rgba8(color.r, color.g, color.b, alpha);
                    if let Some(rect) = Rect::from_xywh(px, py, 1.0, 1.0) {
                        pixmap.fill_rect(rect, &paint, Transform::identity(), None);
                    }
                });
            }
        }
    }

    /// Draw an image with its top-left corner at `at`. Returns false when the
    /// image cannot be placed in pixel space.
    pub fn draw_image(&mut self, at: Point, image: &Pixmap) -> bool {
        let (Some(x), Some(y)) = (
            pixel_origin(at.x, image.width()),
            pixel_origin(at.y, image.height()),
        ) else {
            tracing::warn!("Image at ({}, {}) is out of range, skipping", at.x, at.y);
            return false;
        };

        self.pixmap.draw_pixmap(
            x,
            y,
            image.as_ref(),
            &PixmapPaint::default(),
            Transform::identity(),
            None,
        );
        true
    }

    /// Wipe the raster back to the blank white background
    pub fn clear(&mut self) {
        self.pixmap.fill(SkiaColor::WHITE);
        self.clear_overlay();
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot(self.pixmap.clone())
    }

    pub fn restore(&mut self, snapshot: &Snapshot) {
        if snapshot.0.width() == self.width && snapshot.0.height() == self.height {
            self.pixmap = snapshot.0.clone();
        } else {
            tracing::warn!(
                "Ignoring snapshot of size {}x{} on {}x{} canvas",
                snapshot.0.width(),
                snapshot.0.height(),
                self.width,
                self.height
            );
        }
    }

    /// Straight-alpha color of one raster pixel
    pub fn pixel(&self, x: u32, y: u32) -> Option<Color> {
        let px = self.pixmap.pixel(x, y)?.demultiply();
        Some(Color {
            r: px.red(),
            g: px.green(),
            b: px.blue(),
            a: px.alpha(),
        })
    }

    /// Straight-alpha color of one overlay pixel
    pub fn overlay_pixel(&self, x: u32, y: u32) -> Option<Color> {
        let px = self.overlay.pixel(x, y)?.demultiply();
        Some(Color {
            r: px.red(),
            g: px.green(),
            b: px.blue(),
            a: px.alpha(),
        })
    }

    pub fn data(&self) -> &[u8] {
        self.pixmap.data()
    }

    /// Export canvas to PNG bytes
    pub fn to_png(&self) -> Result<Vec<u8>> {
        // Convert tiny-skia Pixmap to image crate format
        let data = self.pixmap.data();

        let mut img: ImageBuffer<Rgba<u8>, Vec<u8>> = ImageBuffer::new(self.width, self.height);

        for (i, pixel) in img.pixels_mut().enumerate() {
            let offset = i * 4;
            // tiny-skia uses RGBA premultiplied, need to unpremultiply
            let a = data[offset + 3] as f32 / 255.0;
            if a > 0.0 {
                *pixel = Rgba([
                    (data[offset] as f32 / a).min(255.0) as u8,
                    (data[offset + 1] as f32 / a).min(255.0) as u8,
                    (data[offset + 2] as f32 / a).min(255.0) as u8,
                    data[offset + 3],
                ]);
            } else {
                *pixel = Rgba([255, 255, 255, 255]); // White for transparent
            }
        }

        let mut buffer = Cursor::new(Vec::new());
        img.write_to(&mut buffer, ImageFormat::Png)?;
        Ok(buffer.into_inner())
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }
}

/// Load a TrueType/OpenType font for text rendering
pub fn load_font(path: &Path) -> Result<FontArc> {
    let bytes = std::fs::read(path)?;
    FontArc::try_from_vec(bytes).map_err(|e| WhiteboardError::Font(format!("{}: {}", path.display(), e)))
}

fn paint_for(color: Color) -> Paint<'static> {
    let mut paint = Paint::default();
    paint.set_color(color.to_skia());
    paint.anti_alias = true;
    paint
}

fn stroke_for(width: f32) -> Stroke {
    Stroke {
        width,
        line_cap: LineCap::Round,
        line_join: LineJoin::Miter,
        ..Default::default()
    }
}

fn stroke_line(pixmap: &mut Pixmap, seg: &Segment, color: Color) {
    let (start, end) = (seg.start(), seg.end());
    let mut pb = PathBuilder::new();

    if start == end {
        // Draw a point (small circle)
        pb.push_circle(start.x, start.y, 0.5);
    } else {
        pb.move_to(start.x, start.y);
        pb.line_to(end.x, end.y);
    }

    if let Some(path) = pb.finish() {
        pixmap.stroke_path(
            &path,
            &paint_for(color),
            &stroke_for(seg.line_width),
            Transform::identity(),
            None,
        );
    }
}

fn stroke_rectangle(pixmap: &mut Pixmap, seg: &Segment) -> bool {
    let (start, end) = (seg.start(), seg.end());
    let (x1, x2) = if start.x > end.x {
        (end.x, start.x)
    } else {
        (start.x, end.x)
    };
    let (y1, y2) = if start.y > end.y {
        (end.y, start.y)
    } else {
        (start.y, end.y)
    };

    let width = x2 - x1;
    let height = y2 - y1;
    if width <= 0.0 || height <= 0.0 {
        return false;
    }

    let Some(rect) = Rect::from_xywh(x1, y1, width, height) else {
        return false;
    };

    let path = PathBuilder::from_rect(rect);
    pixmap.stroke_path(
        &path,
        &paint_for(seg.color),
        &stroke_for(seg.line_width),
        Transform::identity(),
        None,
    );
    true
}

fn stroke_circle(pixmap: &mut Pixmap, seg: &Segment) -> bool {
    let centre = seg.start();
    let radius = centre.distance(&seg.end());
    if radius <= 0.0 {
        return false;
    }

    let Some(path) = PathBuilder::from_circle(centre.x, centre.y, radius) else {
        return false;
    };

    pixmap.stroke_path(
        &path,
        &paint_for(seg.color),
        &stroke_for(seg.line_width),
        Transform::identity(),
        None,
    );
    true
}
