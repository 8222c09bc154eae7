// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Unified error types for Bildmappe.

use std::path::PathBuf;

use thiserror::Error;

/// Top-level error type for all Bildmappe operations.
///
/// Per-item errors (validation, decode, plugin, layout) skip a single batch
/// item; configuration and assembly errors abort the whole batch.
#[derive(Debug, Error)]
pub enum BildmappeError {
    // -- Batch-fatal errors --
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("PDF assembly failed: {0}")]
    Assembly(String),

    #[error("batch cancelled")]
    Cancelled,

    // -- Per-item errors --
    #[error("validation failed for {path}: {reason}")]
    Validation { path: PathBuf, reason: String },

    #[error("decode failed for {path}: {reason}")]
    Decode { path: PathBuf, reason: String },

    #[error("plugin step '{step}' failed: {cause}")]
    Plugin { step: String, cause: String },

    #[error("page layout failed: {0}")]
    Layout(String),

    // -- Plumbing --
    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl BildmappeError {
    /// Whether this error skips a single batch item rather than aborting the
    /// whole batch.
    pub fn is_item_scoped(&self) -> bool {
        matches!(
            self,
            Self::Validation { .. } | Self::Decode { .. } | Self::Plugin { .. } | Self::Layout(_)
        )
    }
}

/// Alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, BildmappeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn item_scoped_classification() {
        let decode = BildmappeError::Decode {
            path: "a.jpg".into(),
            reason: "truncated".into(),
        };
        assert!(decode.is_item_scoped());

        let assembly = BildmappeError::Assembly("disk full".into());
        assert!(!assembly.is_item_scoped());

        let config = BildmappeError::Config("quality out of range".into());
        assert!(!config.is_item_scoped());
    }

    #[test]
    fn display_includes_step_name() {
        let err = BildmappeError::Plugin {
            step: "watermark".into(),
            cause: "empty text".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("watermark"));
        assert!(msg.contains("empty text"));
    }
}
