// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Image effects — sepia, grayscale, blur, and sharpen filters selected via
// the per-batch options map.

use bildmappe_core::error::{BildmappeError, Result};
use bildmappe_document::NormalizedImage;
use image::{Rgba, RgbaImage};
use imageproc::filter::gaussian_blur_f32;
use tracing::debug;

use crate::builtin::restore_mode;
use crate::{ImageTransform, TransformOptions};

/// Sepia tone transformation matrix (rows produce output R, G, B).
const SEPIA: [[f32; 3]; 3] = [
    [0.393, 0.769, 0.189],
    [0.349, 0.686, 0.168],
    [0.272, 0.534, 0.131],
];

/// Effect filter driven entirely by options: `effect` picks the filter
/// (`none`, `sepia`, `grayscale`, `blur`, `sharpen`) and `intensity`
/// controls its strength (default 1.0).
pub struct ImageEffects;

impl ImageTransform for ImageEffects {
    fn name(&self) -> &str {
        "image-effects"
    }

    fn apply(&self, image: NormalizedImage, options: &TransformOptions) -> Result<NormalizedImage> {
        let effect = options
            .get("effect")
            .and_then(|value| value.as_str())
            .unwrap_or("none");
        let intensity = options
            .get("intensity")
            .and_then(|value| value.as_f64())
            .unwrap_or(1.0) as f32;

        if effect == "none" {
            return Ok(image);
        }

        debug!(effect, intensity, "applying effect");
        let color = image.color();
        let rgba = image.into_dynamic().to_rgba8();

        let processed = match effect {
            "sepia" => sepia(rgba, intensity.clamp(0.0, 1.0)),
            "grayscale" => grayscale(rgba),
            "blur" => gaussian_blur_f32(&rgba, (intensity * 2.0).clamp(0.1, 10.0)),
            "sharpen" => sharpen(rgba, intensity.clamp(0.0, 3.0)),
            unknown => {
                return Err(BildmappeError::Plugin {
                    step: "image-effects".into(),
                    cause: format!("unknown effect '{unknown}'"),
                });
            }
        };

        Ok(restore_mode(color, processed))
    }
}

/// Apply the sepia matrix, blending with the original by `intensity`.
fn sepia(mut rgba: RgbaImage, intensity: f32) -> RgbaImage {
    for pixel in rgba.pixels_mut() {
        let [r, g, b, a] = pixel.0;
        let input = [r as f32, g as f32, b as f32];
        let mut output = [0f32; 3];
        for (channel, row) in output.iter_mut().zip(SEPIA.iter()) {
            let toned: f32 = row
                .iter()
                .zip(input.iter())
                .map(|(weight, value)| weight * value)
                .sum();
            *channel = toned.min(255.0);
        }
        let blend = |idx: usize| -> u8 {
            (input[idx] * (1.0 - intensity) + output[idx] * intensity).clamp(0.0, 255.0) as u8
        };
        *pixel = Rgba([blend(0), blend(1), blend(2), a]);
    }
    rgba
}

/// Collapse channels onto Rec.601 luma, keeping alpha.
fn grayscale(mut rgba: RgbaImage) -> RgbaImage {
    for pixel in rgba.pixels_mut() {
        let [r, g, b, a] = pixel.0;
        let luma = ((77 * r as u32 + 150 * g as u32 + 29 * b as u32) >> 8) as u8;
        *pixel = Rgba([luma, luma, luma, a]);
    }
    rgba
}

/// Unsharp mask: original plus `amount` times the difference from a
/// Gaussian-blurred copy.
fn sharpen(rgba: RgbaImage, amount: f32) -> RgbaImage {
    let blurred = gaussian_blur_f32(&rgba, 1.0);
    let mut output = rgba.clone();
    for ((out, orig), soft) in output
        .pixels_mut()
        .zip(rgba.pixels())
        .zip(blurred.pixels())
    {
        for idx in 0..3 {
            let detail = orig.0[idx] as f32 - soft.0[idx] as f32;
            let sharpened = orig.0[idx] as f32 + detail * amount;
            out.0[idx] = sharpened.clamp(0.0, 255.0) as u8;
        }
    }
    output
}
