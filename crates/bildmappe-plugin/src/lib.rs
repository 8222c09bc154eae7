// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// bildmappe-plugin — The image-processor capability and its implementations.
//
// A transform step takes one normalized image plus a slice of free-form
// options and returns one image. Built-in steps (enhancement, watermark,
// effects) and third-party plugins satisfy the same trait and flow through
// the same registry; nothing in the dispatch distinguishes them.

pub mod builtin;
pub mod manifest;
pub mod pipeline;
pub mod registry;

use std::collections::BTreeMap;

use bildmappe_core::error::Result;
use bildmappe_document::NormalizedImage;

pub use builtin::effects::ImageEffects;
pub use builtin::enhance::AutoEnhance;
pub use builtin::watermark::Watermark;
pub use manifest::{ManifestReport, ManifestStatus, PluginManifest};
pub use pipeline::PluginPipeline;
pub use registry::{CapabilityKind, PluginDescriptor, PluginRegistry};

/// Free-form keyword options handed to every transform step.
///
/// A `BTreeMap` keeps iteration deterministic for logging and reports.
pub type TransformOptions = BTreeMap<String, serde_json::Value>;

/// The image-processor capability: transform one image, return one image.
///
/// Implementations must be `Send + Sync` so batch items can run transforms
/// concurrently; each invocation owns its image exclusively. A step may
/// change the image dimensions but must return a raster image.
pub trait ImageTransform: Send + Sync {
    /// Identifier used in error reports and registry lookups.
    fn name(&self) -> &str;

    /// Apply the transform. A returned error fails this image, not the
    /// batch; the pipeline stops running further steps for it.
    fn apply(&self, image: NormalizedImage, options: &TransformOptions) -> Result<NormalizedImage>;
}
