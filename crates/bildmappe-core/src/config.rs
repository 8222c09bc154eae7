// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Conversion configuration.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{BildmappeError, Result};
use crate::types::PageSize;

/// Anchor position for the text watermark overlay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WatermarkAnchor {
    TopLeft,
    TopRight,
    BottomLeft,
    BottomRight,
    Center,
}

impl Default for WatermarkAnchor {
    fn default() -> Self {
        Self::BottomRight
    }
}

/// Immutable settings for one conversion batch.
///
/// Passed explicitly into every stage; there is no ambient configuration
/// state. `quality` is only consulted when `compress` is set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversionConfig {
    /// Destination of the assembled PDF.
    pub output_path: PathBuf,
    /// Page-size policy applied to every page.
    pub page_size: PageSize,
    /// Re-encode each image lossily before embedding.
    pub compress: bool,
    /// Lossy re-encoding quality, 1 (smallest) to 100 (best fidelity).
    pub quality: u8,
    /// Run the built-in auto-levels enhancement step.
    pub enhance: bool,
    /// Apply EXIF orientation so stored pixels are upright.
    pub auto_rotate: bool,
    /// Text overlay stamped on every image; `None` disables the step.
    pub watermark_text: Option<String>,
    pub watermark_anchor: WatermarkAnchor,
    /// Watermark opacity in [0, 1].
    pub watermark_opacity: f32,
    /// Images whose longest side exceeds this are downscaled before
    /// embedding to bound output size. 0 disables the guard.
    pub max_pixel_dimension: u32,
    /// Free-form options handed to every pipeline step (third-party
    /// plugins read their parameters from here).
    pub plugin_options: BTreeMap<String, serde_json::Value>,
}

impl ConversionConfig {
    /// Create a configuration with defaults for everything but the output
    /// destination.
    pub fn new(output_path: impl Into<PathBuf>) -> Self {
        Self {
            output_path: output_path.into(),
            page_size: PageSize::default(),
            compress: false,
            quality: 85,
            enhance: false,
            auto_rotate: false,
            watermark_text: None,
            watermark_anchor: WatermarkAnchor::default(),
            watermark_opacity: 0.7,
            max_pixel_dimension: 4000,
            plugin_options: BTreeMap::new(),
        }
    }

    /// Reject invalid settings before any processing starts.
    pub fn validate(&self) -> Result<()> {
        if self.quality < 1 || self.quality > 100 {
            return Err(BildmappeError::Config(format!(
                "quality must be in 1..=100, got {}",
                self.quality
            )));
        }
        if !(0.0..=1.0).contains(&self.watermark_opacity) {
            return Err(BildmappeError::Config(format!(
                "watermark opacity must be in 0.0..=1.0, got {}",
                self.watermark_opacity
            )));
        }
        if let Some(text) = &self.watermark_text {
            if text.trim().is_empty() {
                return Err(BildmappeError::Config(
                    "watermark text must not be empty".into(),
                ));
            }
        }
        if self.output_path.as_os_str().is_empty() {
            return Err(BildmappeError::Config("output path must not be empty".into()));
        }
        Ok(())
    }
}
