// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Text watermark — white overlay rendered with the font8x8 bitmap font,
// alpha-blended at a fixed anchor.

use bildmappe_core::config::WatermarkAnchor;
use bildmappe_core::error::{BildmappeError, Result};
use bildmappe_document::NormalizedImage;
use font8x8::{BASIC_FONTS, UnicodeFonts};
use image::Rgba;
use tracing::debug;

use crate::builtin::restore_mode;
use crate::{ImageTransform, TransformOptions};

/// Distance from the image edge to the text block, in pixels.
const EDGE_MARGIN: i64 = 20;

/// Text overlay at a fixed anchor with configurable opacity.
///
/// Glyphs come from the 8x8 bitmap font, scaled up with nearest-neighbour
/// so the step needs no font files at runtime.
pub struct Watermark {
    text: String,
    anchor: WatermarkAnchor,
    opacity: f32,
    /// Nearest-neighbour glyph scale; 4 yields 32 px tall text.
    scale: u32,
}

impl Watermark {
    pub fn new(text: impl Into<String>, anchor: WatermarkAnchor, opacity: f32) -> Self {
        Self {
            text: text.into(),
            anchor,
            opacity,
            scale: 4,
        }
    }

    /// A watermark that reads its text and opacity entirely from the
    /// per-batch options map — the form registered in the plugin registry.
    pub fn from_options_only() -> Self {
        Self {
            text: String::new(),
            anchor: WatermarkAnchor::default(),
            opacity: 0.7,
            scale: 4,
        }
    }
}

impl ImageTransform for Watermark {
    fn name(&self) -> &str {
        "watermark"
    }

    fn apply(&self, image: NormalizedImage, options: &TransformOptions) -> Result<NormalizedImage> {
        let text = if self.text.is_empty() {
            options
                .get("watermark_text")
                .and_then(|value| value.as_str())
                .unwrap_or("")
                .to_string()
        } else {
            self.text.clone()
        };
        if text.trim().is_empty() {
            return Err(BildmappeError::Plugin {
                step: "watermark".into(),
                cause: "no watermark text configured".into(),
            });
        }

        let opacity = options
            .get("watermark_opacity")
            .and_then(|value| value.as_f64())
            .map(|value| value as f32)
            .unwrap_or(self.opacity)
            .clamp(0.0, 1.0);
        let alpha = (opacity * 255.0).round() as u8;
        if alpha == 0 {
            return Ok(image);
        }

        let color = image.color();
        let mut canvas = image.into_dynamic().to_rgba8();
        let (img_w, img_h) = canvas.dimensions();

        let (bitmap, text_w, text_h) = render_text(&text, self.scale);
        let (base_x, base_y) = anchor_origin(self.anchor, img_w, img_h, text_w, text_h);

        debug!(text_w, text_h, base_x, base_y, alpha, "stamping watermark");

        for &(px, py) in &bitmap {
            let x = base_x + px;
            let y = base_y + py;
            if x < 0 || y < 0 || x >= img_w as i64 || y >= img_h as i64 {
                continue;
            }
            let dst = canvas.get_pixel_mut(x as u32, y as u32);
            // "Over" blend of white at the configured alpha.
            let inv = 255u16 - alpha as u16;
            let blend = |channel: u8| -> u8 {
                ((channel as u16 * inv + 255 * alpha as u16) / 255) as u8
            };
            *dst = Rgba([blend(dst[0]), blend(dst[1]), blend(dst[2]), dst[3]]);
        }

        Ok(restore_mode(color, canvas))
    }
}

/// Rasterise `text` into lit-pixel offsets plus the block dimensions.
///
/// Each glyph is 8x8 bits scaled by `scale`; a one-scale gap separates
/// glyphs. Characters outside the basic set fall back to '?'.
fn render_text(text: &str, scale: u32) -> (Vec<(i64, i64)>, i64, i64) {
    let scale = scale.max(1) as i64;
    let gap = scale;
    let glyph_size = 8 * scale;

    let mut pixels = Vec::new();
    let mut cursor_x: i64 = 0;
    let total = text.chars().count();

    for (idx, ch) in text.chars().enumerate() {
        let glyph = BASIC_FONTS
            .get(ch)
            .or_else(|| BASIC_FONTS.get('?'))
            .unwrap_or([0u8; 8]);

        for (row, bits) in glyph.iter().enumerate() {
            for col in 0..8i64 {
                if (bits >> col) & 1 == 0 {
                    continue;
                }
                let base_x = cursor_x + col * scale;
                let base_y = row as i64 * scale;
                for dx in 0..scale {
                    for dy in 0..scale {
                        pixels.push((base_x + dx, base_y + dy));
                    }
                }
            }
        }

        cursor_x += glyph_size + gap;
        if idx + 1 == total {
            cursor_x -= gap;
        }
    }

    (pixels, cursor_x.max(1), glyph_size)
}

/// Top-left origin of the text block for an anchor, clamped into the image.
fn anchor_origin(
    anchor: WatermarkAnchor,
    img_w: u32,
    img_h: u32,
    text_w: i64,
    text_h: i64,
) -> (i64, i64) {
    let img_w = img_w as i64;
    let img_h = img_h as i64;

    let left = EDGE_MARGIN;
    let right = img_w - text_w - EDGE_MARGIN;
    let top = EDGE_MARGIN;
    let bottom = img_h - text_h - EDGE_MARGIN;
    let center_x = (img_w - text_w) / 2;
    let center_y = (img_h - text_h) / 2;

    let (x, y) = match anchor {
        WatermarkAnchor::TopLeft => (left, top),
        WatermarkAnchor::TopRight => (right, top),
        WatermarkAnchor::BottomLeft => (left, bottom),
        WatermarkAnchor::BottomRight => (right, bottom),
        WatermarkAnchor::Center => (center_x, center_y),
    };
    (x.max(0), y.max(0))
}
