// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Plugin manifests — `manifest.json` discovery and activation.
//
// A manifest identifies a plugin (name, version, description, author) and
// names the registered transform it activates via `entry`. A manifest that
// cannot be parsed, is disabled, or names an unknown entry disables that
// plugin and is reported; it never fails the host.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::pipeline::PluginPipeline;
use crate::registry::PluginRegistry;

/// Contents of a plugin's `manifest.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PluginManifest {
    pub name: String,
    pub version: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub author: String,
    /// Identifier of the registered transform this manifest activates.
    pub entry: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

/// What happened to one discovered manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ManifestStatus {
    /// The transform was appended to the pipeline.
    Activated { name: String },
    /// The plugin was skipped; the reason is user-facing.
    Disabled { reason: String },
}

/// Per-manifest activation report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestReport {
    pub path: PathBuf,
    pub status: ManifestStatus,
}

/// Scan `dir` for plugin subdirectories carrying a `manifest.json` and
/// append each activated transform to `pipeline`, in directory name order.
///
/// Returns one report per manifest found. Activation failures disable the
/// plugin and are reported, never propagated.
pub fn activate_from_dir(
    dir: &Path,
    registry: &PluginRegistry,
    pipeline: &mut PluginPipeline,
) -> Vec<ManifestReport> {
    let mut reports = Vec::new();

    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(err) => {
            warn!(dir = %dir.display(), %err, "plugin directory not readable");
            return reports;
        }
    };

    // Sort for a deterministic activation order.
    let mut plugin_dirs: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_dir())
        .collect();
    plugin_dirs.sort();

    for plugin_dir in plugin_dirs {
        let manifest_path = plugin_dir.join("manifest.json");
        if !manifest_path.exists() {
            continue;
        }
        let status = activate_one(&manifest_path, registry, pipeline);
        reports.push(ManifestReport {
            path: manifest_path,
            status,
        });
    }

    reports
}

fn activate_one(
    manifest_path: &Path,
    registry: &PluginRegistry,
    pipeline: &mut PluginPipeline,
) -> ManifestStatus {
    let contents = match std::fs::read_to_string(manifest_path) {
        Ok(contents) => contents,
        Err(err) => {
            warn!(path = %manifest_path.display(), %err, "manifest not readable");
            return ManifestStatus::Disabled {
                reason: format!("manifest not readable: {err}"),
            };
        }
    };

    let manifest: PluginManifest = match serde_json::from_str(&contents) {
        Ok(manifest) => manifest,
        Err(err) => {
            warn!(path = %manifest_path.display(), %err, "manifest malformed");
            return ManifestStatus::Disabled {
                reason: format!("manifest malformed: {err}"),
            };
        }
    };

    if !manifest.enabled {
        return ManifestStatus::Disabled {
            reason: "disabled in manifest".into(),
        };
    }

    match registry.get(&manifest.entry) {
        Some(transform) => {
            info!(
                plugin = %manifest.name,
                version = %manifest.version,
                entry = %manifest.entry,
                "plugin activated"
            );
            pipeline.push(transform);
            ManifestStatus::Activated {
                name: manifest.name,
            }
        }
        None => {
            warn!(
                plugin = %manifest.name,
                entry = %manifest.entry,
                "manifest names an unregistered entry"
            );
            ManifestStatus::Disabled {
                reason: format!("no registered transform named '{}'", manifest.entry),
            }
        }
    }
}
