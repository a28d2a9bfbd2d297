use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use ab_glyph::{FontRef, PxScale};
use anyhow::{Context, Result};
use base64::Engine;
use image::{DynamicImage, Rgba, RgbaImage};
use imageproc::drawing::{draw_filled_circle_mut, draw_text_mut};

use crate::types::EmbeddedArtwork;

/// Edge length of the artwork handed to the widget
const ARTWORK_SIZE: u32 = 600;

/// Stable fingerprint for raw artwork bytes
pub fn fingerprint(bytes: &[u8]) -> u64 {
    let mut hasher = DefaultHasher::new();
    bytes.hash(&mut hasher);
    hasher.finish()
}

/// Decode raw artwork bytes into a square image plus a PNG data URL
pub fn decode_artwork(bytes: &[u8]) -> Result<EmbeddedArtwork> {
    anyhow::ensure!(!bytes.is_empty(), "Artwork payload is empty");

    let img = image::load_from_memory(bytes).context("Failed to load image from memory")?;
    anyhow::ensure!(img.width() > 0 && img.height() > 0, "Artwork has no pixels");

    let square = crop_square(&img).resize_exact(
        ARTWORK_SIZE,
        ARTWORK_SIZE,
        image::imageops::FilterType::Lanczos3,
    );
    let rgba = square.to_rgba8();
    let png = encode_png(&rgba)?;
    let data_url = format!(
        "data:image/png;base64,{}",
        base64::engine::general_purpose::STANDARD.encode(png)
    );

    Ok(EmbeddedArtwork {
        fingerprint: fingerprint(bytes),
        image: Arc::new(rgba),
        data_url: Arc::from(data_url),
    })
}

fn crop_square(img: &DynamicImage) -> DynamicImage {
    let (width, height) = (img.width(), img.height());
    if width == height {
        return img.clone();
    }
    let side = width.min(height);
    img.crop_imm((width - side) / 2, (height - side) / 2, side, side)
}

/// Encode image as PNG bytes
fn encode_png(image: &RgbaImage) -> Result<Vec<u8>> {
    use image::codecs::png::PngEncoder;
    use image::ImageEncoder;

    let mut buffer = Vec::new();
    let encoder = PngEncoder::new(&mut buffer);

    encoder
        .write_image(
            image.as_raw(),
            image.width(),
            image.height(),
            image::ExtendedColorType::Rgba8,
        )
        .context("Failed to encode PNG")?;

    Ok(buffer)
}

/// Text colour that reads on the current menu bar appearance
fn text_color() -> Rgba<u8> {
    if matches!(dark_light::detect(), dark_light::Mode::Dark) {
        Rgba([255, 255, 255, 255])
    } else {
        Rgba([0, 0, 0, 255])
    }
}

/// Draws the menu bar icon: a small record with the artwork, then "Title - Artist"
pub struct Compositor {
    font: Vec<u8>,
}

impl Compositor {
    pub fn new() -> Result<Self> {
        // SF Pro ships with every macOS since 10.11
        let font_path = "/System/Library/Fonts/SFNS.ttf";

        let font_data = std::fs::read(font_path)
            .context("Failed to load SF Pro system font. Ensure running on macOS.")?;

        Ok(Self { font: font_data })
    }

    /// Returns PNG bytes
    pub fn create_menu_bar_icon(
        &self,
        artwork: Option<&RgbaImage>,
        title: &str,
        artist: &str,
    ) -> Result<Vec<u8>> {
        // Rendered at 3x for Retina
        const SCALE_FACTOR: u32 = 3;
        const MAX_CANVAS_WIDTH: u32 = 320 * SCALE_FACTOR;
        const CANVAS_HEIGHT: u32 = 22 * SCALE_FACTOR;
        const DISC_SIZE: u32 = 22 * SCALE_FACTOR;
        const TEXT_X_OFFSET: i32 = 28 * SCALE_FACTOR as i32;
        const TEXT_SCALE: f32 = 63.0;

        let font = FontRef::try_from_slice(&self.font).context("Failed to parse font data")?;
        let scale = PxScale::from(TEXT_SCALE);

        let text = label(title, artist);
        let canvas_width = match &text {
            Some(text) => {
                let text_width = measure_text_width(&font, text, scale);
                (TEXT_X_OFFSET as u32 + text_width.ceil() as u32).min(MAX_CANVAS_WIDTH)
            }
            None => DISC_SIZE,
        };

        let mut canvas = RgbaImage::from_pixel(canvas_width, CANVAS_HEIGHT, Rgba([0, 0, 0, 0]));
        self.draw_disc(&mut canvas, artwork, DISC_SIZE);

        if let Some(text) = text {
            let available_width = canvas_width as f32 - TEXT_X_OFFSET as f32;
            let display_text = truncate_text(&font, &text, scale, available_width);
            draw_text_mut(
                &mut canvas,
                text_color(),
                TEXT_X_OFFSET,
                3,
                scale,
                &font,
                &display_text,
            );
        }

        encode_png(&canvas)
    }

    /// Artwork clipped to a circle with a spindle hole, or a plain record
    fn draw_disc(&self, canvas: &mut RgbaImage, artwork: Option<&RgbaImage>, size: u32) {
        let radius = size as f32 / 2.0;
        let hole = (size as f32 * 0.08).max(2.0);
        let centre = (radius as i32, radius as i32);

        match artwork {
            Some(art) => {
                let thumb = image::imageops::resize(
                    art,
                    size,
                    size,
                    image::imageops::FilterType::Lanczos3,
                );
                for (x, y, pixel) in thumb.enumerate_pixels() {
                    let dx = x as f32 + 0.5 - radius;
                    let dy = y as f32 + 0.5 - radius;
                    let r = (dx * dx + dy * dy).sqrt();
                    if r < radius && r > hole {
                        canvas.put_pixel(x, y, *pixel);
                    }
                }
            }
            None => {
                draw_filled_circle_mut(canvas, centre, radius as i32 - 1, Rgba([24, 24, 28, 255]));
                draw_filled_circle_mut(canvas, centre, (radius * 0.4) as i32, Rgba([147, 51, 234, 255]));
                draw_filled_circle_mut(canvas, centre, hole as i32, Rgba([0, 0, 0, 0]));
            }
        }
    }
}

fn label(title: &str, artist: &str) -> Option<String> {
    match (title.trim(), artist.trim()) {
        ("", "") => None,
        (title, "") => Some(title.to_string()),
        ("", artist) => Some(artist.to_string()),
        (title, artist) => Some(format!("{} - {}", title, artist)),
    }
}

fn measure_text_width(font: &FontRef<'_>, text: &str, scale: PxScale) -> f32 {
    use ab_glyph::{Font, ScaleFont};

    let scaled_font = font.as_scaled(scale);
    text.chars()
        .map(|ch| scaled_font.h_advance(font.glyph_id(ch)))
        .sum()
}

/// Truncate text with an ellipsis to fit within `max_width`
fn truncate_text(font: &FontRef<'_>, text: &str, scale: PxScale, max_width: f32) -> String {
    if measure_text_width(font, text, scale) <= max_width {
        return text.to_string();
    }

    let ellipsis = "...";
    let available = max_width - measure_text_width(font, ellipsis, scale);

    let mut truncated = String::new();
    for ch in text.chars() {
        truncated.push(ch);
        if measure_text_width(font, &truncated, scale) > available {
            truncated.pop();
            break;
        }
    }

    format!("{}{}", truncated, ellipsis)
}
