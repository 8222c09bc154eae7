// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Progress observer — per-item events for GUI and CLI progress bars.
//
// A synchronous callback interface keeps the engine independent of any
// toolkit's event loop: callers forward events to a channel, a progress
// bar, or a log as they see fit. Methods default to no-ops so observers
// only override what they care about.

use std::sync::Arc;

use bildmappe_core::types::BatchReport;

/// Called by the batch converter as items move through the pipeline.
///
/// Implementations must be `Send + Sync`: item events may arrive from
/// different worker threads while a batch processes items concurrently,
/// and at irregular intervals.
pub trait ProgressObserver: Send + Sync {
    /// Called once before any item is touched.
    fn on_batch_start(&self, total: usize) {
        let _ = total;
    }

    /// Called when an item finishes a stage (`"validate"`, `"process"`,
    /// `"assemble"`). `index` is the item's position in the input list.
    fn on_item_done(&self, index: usize, total: usize, stage: &str) {
        let _ = (index, total, stage);
    }

    /// Called when an item is dropped from the batch at `stage`.
    fn on_item_skipped(&self, index: usize, total: usize, stage: &str, reason: &str) {
        let _ = (index, total, stage, reason);
    }

    /// Called once with the final report, after the terminal state is
    /// reached.
    fn on_batch_complete(&self, report: &BatchReport) {
        let _ = report;
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgress;

impl ProgressObserver for NoopProgress {}

/// Convenience alias matching the type stored in the batch converter.
pub type SharedObserver = Arc<dyn ProgressObserver>;

#[cfg(test)]
mod tests {
    use super::*;
    use bildmappe_core::types::{BatchId, BatchState};
    use chrono::Utc;

    #[test]
    fn noop_observer_does_not_panic() {
        let observer = NoopProgress;
        observer.on_batch_start(3);
        observer.on_item_done(0, 3, "validate");
        observer.on_item_skipped(1, 3, "process", "corrupt");
        observer.on_batch_complete(&BatchReport {
            id: BatchId::new(),
            state: BatchState::PartiallyCompleted,
            items: Vec::new(),
            output: None,
            failure: None,
            started_at: Utc::now(),
            finished_at: Utc::now(),
        });
    }
}
