// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Typed plugin registry — maps a plugin identifier to a concrete transform.
//
// Registration is explicit and validated up front; a manifest scan (see
// `manifest`) only ever activates transforms that were registered here.

use std::collections::BTreeMap;
use std::sync::Arc;

use bildmappe_core::error::{BildmappeError, Result};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::builtin::effects::ImageEffects;
use crate::builtin::enhance::AutoEnhance;
use crate::builtin::watermark::Watermark;
use crate::ImageTransform;

/// Declared capability of a plugin. Only image processors exist today;
/// the field keeps manifests honest about what they provide.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CapabilityKind {
    ImageProcessor,
}

/// Identity and capability of a registered plugin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginDescriptor {
    pub name: String,
    /// Semantic version, `major.minor.patch`.
    pub version: String,
    pub description: String,
    pub author: String,
    pub kind: CapabilityKind,
}

impl PluginDescriptor {
    pub fn new(
        name: impl Into<String>,
        version: impl Into<String>,
        description: impl Into<String>,
        author: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            description: description.into(),
            author: author.into(),
            kind: CapabilityKind::ImageProcessor,
        }
    }
}

/// Registry of available transforms, keyed by plugin name.
#[derive(Default)]
pub struct PluginRegistry {
    plugins: BTreeMap<String, (PluginDescriptor, Arc<dyn ImageTransform>)>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self {
            plugins: BTreeMap::new(),
        }
    }

    /// Registry pre-populated with the built-in steps, registered through
    /// the same path as third-party transforms.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        let builtins: [(PluginDescriptor, Arc<dyn ImageTransform>); 3] = [
            (
                PluginDescriptor::new(
                    "auto-enhance",
                    "1.0.0",
                    "Auto-levels contrast stretch with mild saturation boost",
                    "Bildmappe",
                ),
                Arc::new(AutoEnhance::default()),
            ),
            (
                PluginDescriptor::new(
                    "watermark",
                    "1.0.0",
                    "Text overlay at a fixed anchor with configurable opacity",
                    "Bildmappe",
                ),
                Arc::new(Watermark::from_options_only()),
            ),
            (
                PluginDescriptor::new(
                    "image-effects",
                    "1.0.0",
                    "Sepia, grayscale, blur, and sharpen filters",
                    "Bildmappe",
                ),
                Arc::new(ImageEffects),
            ),
        ];
        for (descriptor, transform) in builtins {
            // Built-in descriptors are well-formed by construction.
            let name = descriptor.name.clone();
            if let Err(err) = registry.register(descriptor, transform) {
                tracing::error!(plugin = %name, %err, "builtin registration failed");
            }
        }
        registry
    }

    /// Register a transform under its descriptor.
    ///
    /// Validation happens here, at registration time, not at call time: an
    /// empty name, malformed version, or duplicate name is rejected.
    pub fn register(
        &mut self,
        descriptor: PluginDescriptor,
        transform: Arc<dyn ImageTransform>,
    ) -> Result<()> {
        if descriptor.name.trim().is_empty() {
            return Err(BildmappeError::Plugin {
                step: "<unnamed>".into(),
                cause: "plugin name must not be empty".into(),
            });
        }
        if !is_semantic_version(&descriptor.version) {
            return Err(BildmappeError::Plugin {
                step: descriptor.name.clone(),
                cause: format!(
                    "version '{}' is not a semantic version (major.minor.patch)",
                    descriptor.version
                ),
            });
        }
        if self.plugins.contains_key(&descriptor.name) {
            return Err(BildmappeError::Plugin {
                step: descriptor.name.clone(),
                cause: "a plugin with this name is already registered".into(),
            });
        }

        info!(
            plugin = %descriptor.name,
            version = %descriptor.version,
            "plugin registered"
        );
        self.plugins
            .insert(descriptor.name.clone(), (descriptor, transform));
        Ok(())
    }

    /// Look up a registered transform by name.
    pub fn get(&self, name: &str) -> Option<Arc<dyn ImageTransform>> {
        self.plugins
            .get(name)
            .map(|(_, transform)| Arc::clone(transform))
    }

    pub fn descriptor(&self, name: &str) -> Option<&PluginDescriptor> {
        self.plugins.get(name).map(|(descriptor, _)| descriptor)
    }

    /// Descriptors of everything registered, in name order.
    pub fn descriptors(&self) -> Vec<&PluginDescriptor> {
        self.plugins.values().map(|(descriptor, _)| descriptor).collect()
    }

    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }
}

/// Accept `major.minor.patch` with numeric components.
fn is_semantic_version(version: &str) -> bool {
    let mut parts = 0;
    for part in version.split('.') {
        if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
            return false;
        }
        parts += 1;
    }
    parts == 3
}
