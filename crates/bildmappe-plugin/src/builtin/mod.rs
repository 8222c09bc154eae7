// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Built-in transform steps — enhancement, watermark, effects.
//
// These are ordinary `ImageTransform` implementations registered through
// the same registry path as third-party plugins.

pub mod effects;
pub mod enhance;
pub mod watermark;

pub use effects::ImageEffects;
pub use enhance::AutoEnhance;
pub use watermark::Watermark;

use bildmappe_document::{ColorMode, NormalizedImage};
use image::{DynamicImage, RgbaImage};

/// Rebuild a normalized image from a processed RGBA buffer, restoring the
/// color mode the input had (steps work in RGBA but must not silently
/// promote RGB sources to RGBA).
pub(crate) fn restore_mode(color: ColorMode, rgba: RgbaImage) -> NormalizedImage {
    match color {
        ColorMode::Rgb => NormalizedImage::from_dynamic(DynamicImage::ImageRgb8(
            DynamicImage::ImageRgba8(rgba).to_rgb8(),
        )),
        ColorMode::Rgba => NormalizedImage::from_dynamic(DynamicImage::ImageRgba8(rgba)),
    }
}
