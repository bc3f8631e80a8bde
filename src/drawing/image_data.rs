use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use image::{ImageFormat, RgbaImage};
use tiny_skia::{ColorU8, Pixmap};

use crate::error::{Result, WhiteboardError};

/// Wrap raw image file bytes into a `data:` URL for broadcasting
pub fn encode_data_url(bytes: &[u8]) -> Result<String> {
    let format = image::guess_format(bytes)?;
    Ok(format!(
        "data:{};base64,{}",
        mime_type(format),
        STANDARD.encode(bytes)
    ))
}

/// Decode a `data:<mime>;base64,<payload>` URL into a drawable pixmap
pub fn decode_data_url(url: &str) -> Result<Pixmap> {
    let (header, payload) = url
        .split_once(',')
        .ok_or_else(|| WhiteboardError::InvalidImage("missing data URL separator".into()))?;

    if !header.starts_with("data:") || !header.ends_with(";base64") {
        return Err(WhiteboardError::InvalidImage(format!(
            "unsupported data URL header: {}",
            header
        )));
    }

    let bytes = STANDARD
        .decode(payload.trim())
        .map_err(|e| WhiteboardError::InvalidImage(e.to_string()))?;

    let image = image::load_from_memory(&bytes)?.to_rgba8();
    pixmap_from_rgba(&image)
}

/// Convert straight-alpha RGBA into tiny-skia's premultiplied pixmap
pub fn pixmap_from_rgba(image: &RgbaImage) -> Result<Pixmap> {
    let (width, height) = image.dimensions();
    let mut pixmap =
        Pixmap::new(width, height).ok_or(WhiteboardError::CanvasSize(width, height))?;

    for (dst, src) in pixmap.pixels_mut().iter_mut().zip(image.pixels()) {
        let [r, g, b, a] = src.0;
        *dst = ColorU8::from_rgba(r, g, b, a).premultiply();
    }

    Ok(pixmap)
}

fn mime_type(format: ImageFormat) -> &'static str {
    match format {
        ImageFormat::Png => "image/png",
        ImageFormat::Jpeg => "image/jpeg",
        ImageFormat::Gif => "image/gif",
        ImageFormat::WebP => "image/webp",
        ImageFormat::Bmp => "image/bmp",
        ImageFormat::Ico => "image/x-icon",
        ImageFormat::Tiff => "image/tiff",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
pub(crate) fn png_bytes(width: u32, height: u32, rgba: [u8; 4]) -> Vec<u8> {
    use std::io::Cursor;

    let img = RgbaImage::from_pixel(width, height, image::Rgba(rgba));
    let mut buffer = Cursor::new(Vec::new());
    img.write_to(&mut buffer, ImageFormat::Png).unwrap();
    buffer.into_inner()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_png_data_url() {
        let url = encode_data_url(&png_bytes(2, 2, [255, 0, 0, 255])).unwrap();
        assert!(url.starts_with("data:image/png;base64,"));
    }

    #[test]
    fn test_decode_data_url() {
        let url = encode_data_url(&png_bytes(3, 2, [0, 0, 255, 255])).unwrap();
        let pixmap = decode_data_url(&url).unwrap();
        assert_eq!(pixmap.width(), 3);
        assert_eq!(pixmap.height(), 2);

        let px = pixmap.pixel(1, 1).unwrap().demultiply();
        assert_eq!((px.red(), px.green(), px.blue(), px.alpha()), (0, 0, 255, 255));
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(decode_data_url("not a data url").is_err());
        assert!(decode_data_url("data:image/png,plain").is_err());
        assert!(decode_data_url("data:image/png;base64,@@@").is_err());
    }

    #[test]
    fn test_encode_rejects_unknown_bytes() {
        assert!(encode_data_url(b"definitely not an image").is_err());
    }
}
