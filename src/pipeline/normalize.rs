//! Image normalisation: bring every image to canonical RGB before it is
//! encoded or placed on a PDF page.
//!
//! Output pages are opaque, so alpha is never preserved. Any image with an
//! alpha channel (RGBA, grey+alpha, transparent palette PNG decoded to RGBA)
//! is composited onto opaque white first; dropping alpha without compositing
//! would turn transparent regions black.

use crate::error::ConvertError;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::{self, FilterType};
use image::{DynamicImage, Rgb, RgbImage};
use tracing::debug;

/// Background for flattening and letterboxing.
pub const WHITE: Rgb<u8> = Rgb([255, 255, 255]);

/// Decode one uploaded image into canonical RGB.
///
/// A decode failure fails the whole request: the error names the file so the
/// client knows which upload to fix.
pub fn normalize_image(filename: &str, bytes: &[u8]) -> Result<RgbImage, ConvertError> {
    let decoded =
        image::load_from_memory(bytes).map_err(|e| ConvertError::UnreadableImage {
            filename: filename.to_string(),
            detail: e.to_string(),
        })?;
    debug!(
        "Decoded '{}' → {}x{} {:?}",
        filename,
        decoded.width(),
        decoded.height(),
        decoded.color()
    );
    Ok(flatten_onto_white(&decoded))
}

/// Composite `img` onto opaque white and return it as RGB8.
pub fn flatten_onto_white(img: &DynamicImage) -> RgbImage {
    if !img.color().has_alpha() {
        return img.to_rgb8();
    }

    let rgba = img.to_rgba8();
    let mut out = RgbImage::new(rgba.width(), rgba.height());
    for (dst, src) in out.pixels_mut().zip(rgba.pixels()) {
        let [r, g, b, a] = src.0;
        let alpha = a as u32;
        let blend = |c: u8| ((c as u32 * alpha + 255 * (255 - alpha) + 127) / 255) as u8;
        *dst = Rgb([blend(r), blend(g), blend(b)]);
    }
    out
}

/// Encode an RGB image as baseline JPEG.
pub fn encode_jpeg(img: &RgbImage, quality: u8) -> Result<Vec<u8>, ConvertError> {
    let mut buf = Vec::new();
    let mut encoder = JpegEncoder::new_with_quality(&mut buf, quality.clamp(1, 100));
    encoder.encode_image(img)?;
    debug!(
        "Encoded {}x{} JPEG → {} bytes",
        img.width(),
        img.height(),
        buf.len()
    );
    Ok(buf)
}

/// Fit `img` inside a `width`×`height` canvas, preserving aspect ratio and
/// centring it on white.
pub fn letterbox(img: &RgbImage, width: u32, height: u32) -> RgbImage {
    let (w, h) = fit_within(img.width(), img.height(), width, height);
    let mut canvas = RgbImage::from_pixel(width, height, WHITE);

    let resized;
    let placed = if (w, h) == img.dimensions() {
        img
    } else {
        resized = imageops::resize(img, w, h, FilterType::Lanczos3);
        &resized
    };

    let x = (width - w) / 2;
    let y = (height - h) / 2;
    imageops::overlay(&mut canvas, placed, x as i64, y as i64);
    canvas
}

/// Resize `img` to exactly `width`×`height`, ignoring aspect ratio.
pub fn resize_exact(img: RgbImage, width: u32, height: u32) -> RgbImage {
    if img.dimensions() == (width, height) {
        return img;
    }
    imageops::resize(&img, width, height, FilterType::Lanczos3)
}

/// Largest size with the source aspect ratio that fits the box. Never zero.
fn fit_within(src_w: u32, src_h: u32, box_w: u32, box_h: u32) -> (u32, u32) {
    let scale = f64::min(
        box_w as f64 / src_w.max(1) as f64,
        box_h as f64 / src_h.max(1) as f64,
    );
    let w = ((src_w as f64 * scale).round() as u32).clamp(1, box_w);
    let h = ((src_h as f64 * scale).round() as u32).clamp(1, box_h);
    (w, h)
}
