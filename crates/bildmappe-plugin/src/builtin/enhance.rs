// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Auto-levels enhancement — histogram-based contrast stretch with a mild
// saturation boost.

use bildmappe_core::error::Result;
use bildmappe_document::NormalizedImage;
use tracing::debug;

use crate::builtin::restore_mode;
use crate::{ImageTransform, TransformOptions};

/// Contrast stretch driven by the luminance histogram.
///
/// The darkest and brightest `clip_fraction` of pixels are treated as
/// outliers; the remaining range is stretched linearly to the full 0..255
/// interval. Saturation is then scaled around per-pixel luminance.
pub struct AutoEnhance {
    /// Fraction of pixels clipped at each histogram tail.
    clip_fraction: f32,
    /// Saturation factor, 1.0 = unchanged.
    saturation: f32,
}

impl AutoEnhance {
    pub fn new(clip_fraction: f32, saturation: f32) -> Self {
        Self {
            clip_fraction,
            saturation,
        }
    }
}

impl Default for AutoEnhance {
    fn default() -> Self {
        Self {
            clip_fraction: 0.005,
            saturation: 1.05,
        }
    }
}

impl ImageTransform for AutoEnhance {
    fn name(&self) -> &str {
        "auto-enhance"
    }

    fn apply(&self, image: NormalizedImage, options: &TransformOptions) -> Result<NormalizedImage> {
        let clip_fraction = options
            .get("enhance_clip")
            .and_then(|value| value.as_f64())
            .map(|value| value as f32)
            .unwrap_or(self.clip_fraction)
            .clamp(0.0, 0.2);
        let saturation = options
            .get("enhance_saturation")
            .and_then(|value| value.as_f64())
            .map(|value| value as f32)
            .unwrap_or(self.saturation)
            .clamp(0.0, 4.0);

        let color = image.color();
        let mut rgba = image.into_dynamic().to_rgba8();

        if let Some((low, high)) = stretch_bounds(&rgba, clip_fraction) {
            debug!(low, high, "stretching levels");
            let scale = 255.0 / (high - low) as f32;
            for pixel in rgba.pixels_mut() {
                for channel in &mut pixel.0[..3] {
                    let stretched = (*channel as f32 - low as f32) * scale;
                    *channel = stretched.clamp(0.0, 255.0) as u8;
                }
            }
        }

        if (saturation - 1.0).abs() > f32::EPSILON {
            for pixel in rgba.pixels_mut() {
                let [r, g, b, _] = pixel.0;
                let luma = 0.299 * r as f32 + 0.587 * g as f32 + 0.114 * b as f32;
                for channel in &mut pixel.0[..3] {
                    let adjusted = luma + (*channel as f32 - luma) * saturation;
                    *channel = adjusted.clamp(0.0, 255.0) as u8;
                }
            }
        }

        Ok(restore_mode(color, rgba))
    }
}

/// Find the luminance interval to stretch, clipping `clip_fraction` of
/// pixels at each tail. Returns `None` when the interval is degenerate
/// (uniform image or already full-range).
fn stretch_bounds(rgba: &image::RgbaImage, clip_fraction: f32) -> Option<(u8, u8)> {
    let mut histogram = [0u64; 256];
    for pixel in rgba.pixels() {
        let [r, g, b, _] = pixel.0;
        // Integer Rec.601 luma approximation.
        let luma = (77 * r as u32 + 150 * g as u32 + 29 * b as u32) >> 8;
        histogram[luma as usize] += 1;
    }

    let total: u64 = histogram.iter().sum();
    if total == 0 {
        return None;
    }
    let clip = (total as f64 * clip_fraction as f64) as u64;

    let mut low = 0usize;
    let mut accumulated = 0u64;
    for (intensity, &count) in histogram.iter().enumerate() {
        accumulated += count;
        if accumulated > clip {
            low = intensity;
            break;
        }
    }

    let mut high = 255usize;
    accumulated = 0;
    for (intensity, &count) in histogram.iter().enumerate().rev() {
        accumulated += count;
        if accumulated > clip {
            high = intensity;
            break;
        }
    }

    if high <= low || (low == 0 && high == 255) {
        return None;
    }
    Some((low as u8, high as u8))
}

#[cfg(test)]
mod tests {
    use super::*;
    use bildmappe_document::ColorMode;
    use image::{DynamicImage, Rgb, RgbImage, Rgba, RgbaImage};

    fn normalized(img: RgbImage) -> NormalizedImage {
        NormalizedImage::from_dynamic(DynamicImage::ImageRgb8(img))
    }

    #[test]
    fn low_contrast_image_is_stretched_to_full_range() {
        // Gray ramp confined to 100..=150.
        let img = RgbImage::from_fn(51, 1, |x, _| {
            let v = 100 + x as u8;
            Rgb([v, v, v])
        });
        let out = AutoEnhance::new(0.0, 1.0)
            .apply(normalized(img), &TransformOptions::new())
            .expect("apply");

        let rgb = out.as_dynamic().to_rgb8();
        let values: Vec<u8> = rgb.pixels().map(|p| p.0[0]).collect();
        let min = *values.iter().min().expect("min");
        let max = *values.iter().max().expect("max");
        assert!(min < 5, "min {min} should be stretched toward 0");
        assert!(max > 250, "max {max} should be stretched toward 255");
    }

    #[test]
    fn uniform_image_is_left_alone() {
        let img = RgbImage::from_pixel(10, 10, Rgb([128, 128, 128]));
        let out = AutoEnhance::default()
            .apply(normalized(img), &TransformOptions::new())
            .expect("apply");
        let rgb = out.as_dynamic().to_rgb8();
        assert!(rgb.pixels().all(|p| p.0 == [128, 128, 128]));
    }

    #[test]
    fn full_range_image_is_not_restretched() {
        let mut img = RgbImage::from_pixel(4, 1, Rgb([70, 70, 70]));
        img.put_pixel(0, 0, Rgb([0, 0, 0]));
        img.put_pixel(3, 0, Rgb([255, 255, 255]));
        let out = AutoEnhance::new(0.0, 1.0)
            .apply(normalized(img), &TransformOptions::new())
            .expect("apply");
        let rgb = out.as_dynamic().to_rgb8();
        assert_eq!(rgb.get_pixel(1, 0).0, [70, 70, 70]);
    }

    #[test]
    fn color_mode_is_preserved() {
        let rgb_in = normalized(RgbImage::from_pixel(4, 4, Rgb([100, 120, 140])));
        let out = AutoEnhance::default()
            .apply(rgb_in, &TransformOptions::new())
            .expect("apply");
        assert_eq!(out.color(), ColorMode::Rgb);

        let rgba_in = NormalizedImage::from_dynamic(DynamicImage::ImageRgba8(
            RgbaImage::from_pixel(4, 4, Rgba([100, 120, 140, 77])),
        ));
        let out = AutoEnhance::default()
            .apply(rgba_in, &TransformOptions::new())
            .expect("apply");
        assert_eq!(out.color(), ColorMode::Rgba);
        assert_eq!(out.as_dynamic().to_rgba8().get_pixel(0, 0).0[3], 77);
    }

    #[test]
    fn options_override_the_saturation_factor() {
        let img = RgbImage::from_pixel(2, 2, Rgb([200, 50, 50]));
        let mut options = TransformOptions::new();
        options.insert("enhance_saturation".into(), serde_json::json!(0.0));

        let out = AutoEnhance::new(0.0, 1.0)
            .apply(normalized(img), &TransformOptions::new())
            .expect("apply unsaturated config");
        let unchanged = out.as_dynamic().to_rgb8().get_pixel(0, 0).0;
        assert_eq!(unchanged, [200, 50, 50]);

        let img = RgbImage::from_pixel(2, 2, Rgb([200, 50, 50]));
        let out = AutoEnhance::new(0.0, 1.0)
            .apply(normalized(img), &options)
            .expect("apply zero saturation");
        let gray = out.as_dynamic().to_rgb8().get_pixel(0, 0).0;
        // Zero saturation collapses channels onto the luma value.
        assert_eq!(gray[0], gray[1]);
        assert_eq!(gray[1], gray[2]);
    }
}
