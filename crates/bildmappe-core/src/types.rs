// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Core domain types for the Bildmappe conversion engine.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a conversion batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BatchId(pub Uuid);

impl BatchId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for BatchId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for BatchId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Page-size policy for the output document.
///
/// Named sizes carry fixed physical dimensions; `Fit` sizes each page to its
/// image's own pixel dimensions (no scaling, no margin).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PageSize {
    A4,
    Letter,
    Legal,
    Tabloid,
    Fit,
}

impl PageSize {
    /// Page dimensions in PDF points (72 per inch), `None` for `Fit`.
    pub fn dimensions_pt(&self) -> Option<(f32, f32)> {
        match self {
            Self::A4 => Some((595.0, 842.0)),
            Self::Letter => Some((612.0, 792.0)),
            Self::Legal => Some((612.0, 1008.0)),
            Self::Tabloid => Some((792.0, 1224.0)),
            Self::Fit => None,
        }
    }
}

impl Default for PageSize {
    fn default() -> Self {
        Self::A4
    }
}

impl std::fmt::Display for PageSize {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::A4 => "A4",
            Self::Letter => "LETTER",
            Self::Legal => "LEGAL",
            Self::Tabloid => "TABLOID",
            Self::Fit => "FIT",
        };
        write!(f, "{name}")
    }
}

/// Resolved page dimensions and image placement, all in PDF points.
///
/// The placement rectangle always lies inside the page bounds; aspect ratio
/// is preserved and the image is centred, with margins filling the remainder.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PageGeometry {
    pub page_width: f32,
    pub page_height: f32,
    /// Placement origin, measured from the bottom-left page corner.
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl PageGeometry {
    /// Whether the placement rectangle lies entirely within the page bounds.
    ///
    /// A small tolerance absorbs floating-point rounding at the edges.
    pub fn placement_in_bounds(&self) -> bool {
        const EPS: f32 = 0.01;
        self.x >= -EPS
            && self.y >= -EPS
            && self.x + self.width <= self.page_width + EPS
            && self.y + self.height <= self.page_height + EPS
    }
}

/// Validation state of a candidate input file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SourceState {
    Unvalidated,
    Valid,
    Invalid(String),
}

/// A candidate input image: a filesystem path plus its validation state.
///
/// Only `Valid` sources proceed past the validator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageSource {
    pub path: PathBuf,
    pub state: SourceState,
}

impl ImageSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            state: SourceState::Unvalidated,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.state == SourceState::Valid
    }
}

/// Lifecycle states of a conversion batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BatchState {
    /// Initial: holds the raw input list and config.
    Pending,
    /// Running the validator over every input.
    Validating,
    /// Normalising and transforming valid items.
    Processing,
    /// Laying out and writing the output document.
    Assembling,
    /// Every item made it into the output.
    Completed,
    /// Some items were skipped, output produced from the rest.
    PartiallyCompleted,
    /// No usable items, or assembly itself failed — no output produced.
    Failed,
}

impl BatchState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Completed | Self::PartiallyCompleted | Self::Failed
        )
    }
}

/// Classification of why a batch item was skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SkipClass {
    /// Input file missing, unreadable, or not a supported raster format.
    Validation,
    /// File corrupt or unsupported after full decode.
    Decode,
    /// A pipeline transform step failed for this image.
    Plugin,
    /// Degenerate geometry (zero width or height).
    Layout,
    /// The batch was cancelled before this item was processed.
    Cancelled,
}

/// Terminal outcome of one batch item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ItemOutcome {
    /// The item became page `page` (0-indexed) of the output document.
    Success { page: usize },
    Skipped { reason: String, class: SkipClass },
}

impl ItemOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }
}

/// Per-item result entry, in input order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemReport {
    pub path: PathBuf,
    pub outcome: ItemOutcome,
}

/// Final result of a conversion batch.
///
/// `items` preserves input order; page order in the output equals the order
/// of `Success` entries here (skipped items leave no gap).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchReport {
    pub id: BatchId,
    pub state: BatchState,
    pub items: Vec<ItemReport>,
    /// Set when at least one item succeeded and the document was written.
    pub output: Option<PathBuf>,
    /// Batch-fatal error description, set only when `state` is `Failed`
    /// because of assembly or cancellation.
    pub failure: Option<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl BatchReport {
    pub fn succeeded_count(&self) -> usize {
        self.items
            .iter()
            .filter(|item| item.outcome.is_success())
            .count()
    }

    pub fn skipped_count(&self) -> usize {
        self.items.len() - self.succeeded_count()
    }

    /// Process exit status for CLI callers: 0 for full success, 2 for
    /// partial success (distinguishable from failure), 1 for failure.
    pub fn exit_code(&self) -> i32 {
        match self.state {
            BatchState::Completed => 0,
            BatchState::PartiallyCompleted => 2,
            _ => 1,
        }
    }
}
