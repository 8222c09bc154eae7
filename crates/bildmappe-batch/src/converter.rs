// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Batch converter — the orchestrating entry point of the engine.
//
// State machine: Pending → Validating → Processing → Assembling →
// {Completed, PartiallyCompleted, Failed}. Per-item failures are isolated
// and recorded; only configuration errors (rejected up front) and assembly
// errors abort the whole batch. Items may be normalized and transformed
// concurrently under a bounded worker pool, but output page order always
// equals input order: ordering is restored at the assembly stage.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use bildmappe_core::error::BildmappeError;
use bildmappe_core::types::{
    BatchId, BatchReport, BatchState, ImageSource, ItemOutcome, ItemReport, SkipClass,
    SourceState,
};
use bildmappe_core::ConversionConfig;
use bildmappe_document::{
    ImageNormalizer, ImageValidator, NormalizedImage, PageLayoutEngine, PdfAssembler,
    ValidationOutcome,
};
use bildmappe_plugin::{ImageTransform, PluginPipeline};
use chrono::Utc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{info, instrument, warn};

use crate::output_lock::OutputLock;
use crate::progress::{NoopProgress, ProgressObserver};

/// Cooperative cancellation flag, checked before each item starts a stage.
///
/// Cancelling never corrupts an in-progress output file: a batch observed
/// as cancelled before assembly produces no output at all.
#[derive(Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// Converts an ordered list of image paths into one PDF document.
pub struct BatchConverter {
    config: ConversionConfig,
    pipeline: PluginPipeline,
    observer: Arc<dyn ProgressObserver>,
    cancel: CancelToken,
    max_in_flight: usize,
}

impl BatchConverter {
    /// Create a converter, rejecting invalid configuration immediately —
    /// before any file is touched.
    ///
    /// The built-in enhancement and watermark steps implied by the config
    /// are installed automatically, in that order.
    pub fn new(config: ConversionConfig) -> bildmappe_core::error::Result<Self> {
        config.validate()?;
        let pipeline = PluginPipeline::from_config(&config);
        Ok(Self {
            config,
            pipeline,
            observer: Arc::new(NoopProgress),
            cancel: CancelToken::new(),
            max_in_flight: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4),
        })
    }

    /// Receive per-item progress events.
    pub fn with_observer(mut self, observer: Arc<dyn ProgressObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Share a cancellation flag with the caller.
    pub fn with_cancel_token(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Append a transform step after the config-implied ones.
    pub fn with_step(mut self, step: Arc<dyn ImageTransform>) -> Self {
        self.pipeline.push(step);
        self
    }

    /// Bound the number of items normalized/transformed concurrently.
    pub fn with_max_in_flight(mut self, max_in_flight: usize) -> Self {
        self.max_in_flight = max_in_flight.max(1);
        self
    }

    /// Run the batch to completion and return the final report.
    ///
    /// Errors are data: every outcome, including a fully failed batch, is
    /// described by the returned report rather than an `Err`.
    #[instrument(skip_all, fields(inputs = inputs.len(), output = %self.config.output_path.display()))]
    pub async fn run(&self, inputs: Vec<PathBuf>) -> BatchReport {
        let id = BatchId::new();
        let started_at = Utc::now();
        let total = inputs.len();
        let mut outcomes: Vec<Option<ItemOutcome>> = vec![None; total];

        info!(%id, total, "batch starting");
        self.observer.on_batch_start(total);

        // -- Validating -------------------------------------------------------
        info!(state = ?BatchState::Validating, "stage transition");
        let sources = self.validate_stage(&inputs, &mut outcomes);

        // -- Processing -------------------------------------------------------
        info!(state = ?BatchState::Processing, "stage transition");
        let processed = self.process_stage(&sources, &mut outcomes).await;

        // -- Assembling -------------------------------------------------------
        info!(state = ?BatchState::Assembling, "stage transition");
        let (output, failure) = self.assemble_stage(processed, &mut outcomes).await;

        let items: Vec<ItemReport> = inputs
            .into_iter()
            .zip(outcomes)
            .map(|(path, outcome)| ItemReport {
                path,
                outcome: outcome.unwrap_or_else(|| ItemOutcome::Skipped {
                    reason: "item was not processed".into(),
                    class: SkipClass::Cancelled,
                }),
            })
            .collect();

        let skipped = items
            .iter()
            .filter(|item| !item.outcome.is_success())
            .count();
        let state = match (&output, skipped) {
            (Some(_), 0) => BatchState::Completed,
            (Some(_), _) => BatchState::PartiallyCompleted,
            (None, _) => BatchState::Failed,
        };

        let report = BatchReport {
            id,
            state,
            items,
            output,
            failure,
            started_at,
            finished_at: Utc::now(),
        };

        info!(%id, state = ?report.state, skipped, "batch finished");
        self.observer.on_batch_complete(&report);
        report
    }

    /// Run the validator over every input; invalid entries are recorded
    /// and excluded from further stages. No item blocks another.
    fn validate_stage(
        &self,
        inputs: &[PathBuf],
        outcomes: &mut [Option<ItemOutcome>],
    ) -> Vec<ImageSource> {
        let total = inputs.len();
        let mut sources: Vec<ImageSource> = inputs.iter().map(ImageSource::new).collect();

        for (idx, source) in sources.iter_mut().enumerate() {
            if self.cancel.is_cancelled() {
                outcomes[idx] = Some(cancelled_outcome());
                continue;
            }
            match ImageValidator::validate(&source.path) {
                ValidationOutcome::Valid => {
                    source.state = SourceState::Valid;
                    self.observer.on_item_done(idx, total, "validate");
                }
                ValidationOutcome::Invalid { reason } => {
                    warn!(path = %source.path.display(), %reason, "input rejected");
                    source.state = SourceState::Invalid(reason.clone());
                    self.observer.on_item_skipped(idx, total, "validate", &reason);
                    outcomes[idx] = Some(ItemOutcome::Skipped {
                        reason,
                        class: SkipClass::Validation,
                    });
                }
            }
        }

        sources
    }

    /// Normalize and transform every valid item under a bounded worker
    /// pool. Completion order is arbitrary; results land in input-indexed
    /// slots so ordering can be restored later.
    async fn process_stage(
        &self,
        sources: &[ImageSource],
        outcomes: &mut [Option<ItemOutcome>],
    ) -> Vec<Option<NormalizedImage>> {
        let total = sources.len();
        let mut processed: Vec<Option<NormalizedImage>> = vec![None; total];

        let semaphore = Arc::new(Semaphore::new(self.max_in_flight));
        let mut tasks: JoinSet<(usize, bildmappe_core::error::Result<NormalizedImage>)> =
            JoinSet::new();

        for (idx, source) in sources.iter().enumerate() {
            if !source.is_valid() {
                continue;
            }
            let semaphore = Arc::clone(&semaphore);
            let cancel = self.cancel.clone();
            let pipeline = self.pipeline.clone();
            let options = self.config.plugin_options.clone();
            let auto_rotate = self.config.auto_rotate;
            let path = source.path.clone();

            tasks.spawn(async move {
                let _permit = match semaphore.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => return (idx, Err(BildmappeError::Cancelled)),
                };
                if cancel.is_cancelled() {
                    return (idx, Err(BildmappeError::Cancelled));
                }

                let result = tokio::task::spawn_blocking(move || {
                    let normalized = ImageNormalizer::normalize(&path, auto_rotate)?;
                    pipeline.apply(normalized, &options)
                })
                .await;

                let flattened = match result {
                    Ok(inner) => inner,
                    Err(join_err) => Err(BildmappeError::Plugin {
                        step: "pipeline".into(),
                        cause: format!("worker panicked: {join_err}"),
                    }),
                };
                (idx, flattened)
            });
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((idx, Ok(image))) => {
                    processed[idx] = Some(image);
                    self.observer.on_item_done(idx, total, "process");
                }
                Ok((idx, Err(err))) => {
                    warn!(item = idx, %err, "item dropped during processing");
                    let outcome = outcome_from_error(&err);
                    if let ItemOutcome::Skipped { reason, .. } = &outcome {
                        self.observer.on_item_skipped(idx, total, "process", reason);
                    }
                    outcomes[idx] = Some(outcome);
                }
                Err(join_err) => {
                    // The task itself vanished; its slot stays empty and is
                    // reported as unprocessed.
                    warn!(%join_err, "processing task aborted");
                }
            }
        }

        processed
    }

    /// Lay out the survivors in input order and write the document.
    ///
    /// Returns the output path on success, or a batch-fatal failure
    /// description. Zero survivors or observed cancellation produce no
    /// output.
    async fn assemble_stage(
        &self,
        processed: Vec<Option<NormalizedImage>>,
        outcomes: &mut [Option<ItemOutcome>],
    ) -> (Option<PathBuf>, Option<String>) {
        let total = processed.len();

        if self.cancel.is_cancelled() {
            for outcome in outcomes.iter_mut() {
                if outcome.is_none() {
                    *outcome = Some(cancelled_outcome());
                }
            }
            return (None, Some("batch cancelled".into()));
        }

        let mut pages = Vec::new();
        let mut page_index = 0usize;
        for (idx, slot) in processed.into_iter().enumerate() {
            let Some(image) = slot else { continue };
            match PageLayoutEngine::compute_geometry(
                image.width(),
                image.height(),
                self.config.page_size,
            ) {
                Ok(geometry) => {
                    outcomes[idx] = Some(ItemOutcome::Success { page: page_index });
                    pages.push((image, geometry));
                    page_index += 1;
                }
                Err(err) => {
                    warn!(item = idx, %err, "item dropped during layout");
                    let outcome = outcome_from_error(&err);
                    if let ItemOutcome::Skipped { reason, .. } = &outcome {
                        self.observer
                            .on_item_skipped(idx, total, "assemble", reason);
                    }
                    outcomes[idx] = Some(outcome);
                }
            }
        }

        if pages.is_empty() {
            return (None, None);
        }

        let lock = match OutputLock::acquire(&self.config.output_path) {
            Ok(lock) => lock,
            Err(err) => return (None, Some(err.to_string())),
        };

        let config = self.config.clone();
        let assembled = tokio::task::spawn_blocking(move || {
            PdfAssembler::new().assemble(pages, &config)
        })
        .await;
        drop(lock);

        match assembled {
            Ok(Ok(path)) => {
                for (idx, outcome) in outcomes.iter_mut().enumerate() {
                    if matches!(outcome, Some(ItemOutcome::Success { .. })) {
                        self.observer.on_item_done(idx, total, "assemble");
                    }
                }
                (Some(path), None)
            }
            Ok(Err(err)) => {
                warn!(%err, "assembly failed, no output produced");
                (None, Some(err.to_string()))
            }
            Err(join_err) => (None, Some(format!("assembly task panicked: {join_err}"))),
        }
    }
}

fn cancelled_outcome() -> ItemOutcome {
    ItemOutcome::Skipped {
        reason: "batch cancelled".into(),
        class: SkipClass::Cancelled,
    }
}

/// Map a per-item error onto its reported outcome.
fn outcome_from_error(err: &BildmappeError) -> ItemOutcome {
    let class = match err {
        BildmappeError::Validation { .. } => SkipClass::Validation,
        BildmappeError::Decode { .. } => SkipClass::Decode,
        BildmappeError::Layout(_) => SkipClass::Layout,
        BildmappeError::Cancelled => SkipClass::Cancelled,
        _ => SkipClass::Plugin,
    };
    ItemOutcome::Skipped {
        reason: err.to_string(),
        class,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bildmappe_core::types::PageSize;
    use bildmappe_plugin::TransformOptions;
    use image::{Rgb, RgbImage};
    use std::path::Path;
    use std::sync::atomic::AtomicUsize;

    fn write_png(dir: &Path, name: &str, width: u32, height: u32) -> PathBuf {
        let path = dir.join(name);
        RgbImage::from_pixel(width, height, Rgb([80, 90, 100]))
            .save(&path)
            .expect("save png");
        path
    }

    fn page_dimensions(path: &Path) -> Vec<(f32, f32)> {
        let doc = lopdf::Document::load(path).expect("parse pdf");
        doc.get_pages()
            .values()
            .map(|&page_id| {
                let dict = doc.get_dictionary(page_id).expect("page dict");
                let media_box = dict
                    .get(b"MediaBox")
                    .expect("MediaBox")
                    .as_array()
                    .expect("array");
                let value = |idx: usize| -> f32 {
                    match media_box[idx] {
                        lopdf::Object::Integer(v) => v as f32,
                        lopdf::Object::Real(v) => v,
                        _ => 0.0,
                    }
                };
                (value(2) - value(0), value(3) - value(1))
            })
            .collect()
    }

    #[derive(Default)]
    struct CountingObserver {
        started: AtomicUsize,
        done: AtomicUsize,
        skipped: AtomicUsize,
        completed: AtomicUsize,
    }

    impl ProgressObserver for CountingObserver {
        fn on_batch_start(&self, _total: usize) {
            self.started.fetch_add(1, Ordering::SeqCst);
        }

        fn on_item_done(&self, _index: usize, _total: usize, _stage: &str) {
            self.done.fetch_add(1, Ordering::SeqCst);
        }

        fn on_item_skipped(&self, _index: usize, _total: usize, _stage: &str, _reason: &str) {
            self.skipped.fetch_add(1, Ordering::SeqCst);
        }

        fn on_batch_complete(&self, _report: &BatchReport) {
            self.completed.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn three_valid_images_complete_with_three_pages() {
        let dir = tempfile::tempdir().expect("temp dir");
        let inputs = vec![
            write_png(dir.path(), "one.png", 40, 30),
            write_png(dir.path(), "two.png", 30, 40),
            write_png(dir.path(), "three.png", 20, 20),
        ];
        let config = ConversionConfig::new(dir.path().join("out.pdf"));

        let converter = BatchConverter::new(config).expect("converter");
        let report = converter.run(inputs).await;

        assert_eq!(report.state, BatchState::Completed);
        assert_eq!(report.succeeded_count(), 3);
        let output = report.output.as_ref().expect("output path");
        assert_eq!(page_dimensions(output).len(), 3);

        // Page indices follow input order.
        for (idx, item) in report.items.iter().enumerate() {
            assert_eq!(item.outcome, ItemOutcome::Success { page: idx });
        }
    }

    #[tokio::test]
    async fn corrupt_middle_item_yields_partial_completion() {
        let dir = tempfile::tempdir().expect("temp dir");
        let good_one = write_png(dir.path(), "one.png", 32, 32);
        // JPEG magic so validation passes, then the decode fails.
        let corrupt = dir.path().join("two.jpg");
        std::fs::write(&corrupt, [0xFF, 0xD8, 0xFF, 0xE0, 0, 0]).expect("write corrupt");
        let good_two = write_png(dir.path(), "three.png", 48, 48);

        let config = ConversionConfig::new(dir.path().join("out.pdf"));
        let converter = BatchConverter::new(config).expect("converter");
        let report = converter
            .run(vec![good_one, corrupt, good_two])
            .await;

        assert_eq!(report.state, BatchState::PartiallyCompleted);
        assert_eq!(report.succeeded_count(), 2);
        assert!(matches!(
            report.items[1].outcome,
            ItemOutcome::Skipped {
                class: SkipClass::Decode,
                ..
            }
        ));
        // Pages close over the gap: items 1 and 3 become pages 0 and 1.
        assert_eq!(report.items[0].outcome, ItemOutcome::Success { page: 0 });
        assert_eq!(report.items[2].outcome, ItemOutcome::Success { page: 1 });

        let output = report.output.as_ref().expect("output path");
        assert_eq!(page_dimensions(output).len(), 2);
    }

    #[tokio::test]
    async fn page_order_matches_input_order_under_concurrency() {
        let dir = tempfile::tempdir().expect("temp dir");
        // Distinct pixel sizes make page order observable via Fit pages.
        let sizes = [(96u32, 32u32), (32, 96), (64, 64), (128, 32), (32, 128)];
        let inputs: Vec<PathBuf> = sizes
            .iter()
            .enumerate()
            .map(|(idx, &(w, h))| write_png(dir.path(), &format!("img{idx}.png"), w, h))
            .collect();

        let mut config = ConversionConfig::new(dir.path().join("fit.pdf"));
        config.page_size = PageSize::Fit;

        let converter = BatchConverter::new(config)
            .expect("converter")
            .with_max_in_flight(4);
        let report = converter.run(inputs).await;

        assert_eq!(report.state, BatchState::Completed);
        let dims = page_dimensions(report.output.as_ref().expect("output"));
        assert_eq!(dims.len(), sizes.len());
        for (&(w, h), &(page_w, page_h)) in sizes.iter().zip(dims.iter()) {
            assert!((page_w - w as f32 * 0.75).abs() < 0.6);
            assert!((page_h - h as f32 * 0.75).abs() < 0.6);
        }
    }

    #[tokio::test]
    async fn batch_of_only_invalid_items_fails_without_output() {
        let dir = tempfile::tempdir().expect("temp dir");
        let text = dir.path().join("notes.txt");
        std::fs::write(&text, "not an image").expect("write text");

        let config = ConversionConfig::new(dir.path().join("out.pdf"));
        let output_path = config.output_path.clone();
        let converter = BatchConverter::new(config).expect("converter");
        let report = converter
            .run(vec![text, dir.path().join("missing.png")])
            .await;

        assert_eq!(report.state, BatchState::Failed);
        assert!(report.output.is_none());
        assert!(!output_path.exists());
        assert_eq!(report.skipped_count(), 2);
    }

    #[tokio::test]
    async fn empty_input_list_fails() {
        let dir = tempfile::tempdir().expect("temp dir");
        let config = ConversionConfig::new(dir.path().join("out.pdf"));
        let converter = BatchConverter::new(config).expect("converter");
        let report = converter.run(Vec::new()).await;
        assert_eq!(report.state, BatchState::Failed);
        assert!(report.output.is_none());
    }

    #[tokio::test]
    async fn pre_cancelled_batch_produces_no_output() {
        let dir = tempfile::tempdir().expect("temp dir");
        let input = write_png(dir.path(), "one.png", 16, 16);
        let config = ConversionConfig::new(dir.path().join("out.pdf"));
        let output_path = config.output_path.clone();

        let cancel = CancelToken::new();
        cancel.cancel();
        let converter = BatchConverter::new(config)
            .expect("converter")
            .with_cancel_token(cancel);
        let report = converter.run(vec![input]).await;

        assert_eq!(report.state, BatchState::Failed);
        assert_eq!(report.failure.as_deref(), Some("batch cancelled"));
        assert!(!output_path.exists());
        assert!(matches!(
            report.items[0].outcome,
            ItemOutcome::Skipped {
                class: SkipClass::Cancelled,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn observer_receives_item_and_batch_events() {
        let dir = tempfile::tempdir().expect("temp dir");
        let good = write_png(dir.path(), "good.png", 24, 24);
        let missing = dir.path().join("missing.png");

        let observer = Arc::new(CountingObserver::default());
        let config = ConversionConfig::new(dir.path().join("out.pdf"));
        let converter = BatchConverter::new(config)
            .expect("converter")
            .with_observer(observer.clone());
        let report = converter.run(vec![good, missing]).await;

        assert_eq!(report.state, BatchState::PartiallyCompleted);
        assert_eq!(observer.started.load(Ordering::SeqCst), 1);
        assert_eq!(observer.completed.load(Ordering::SeqCst), 1);
        assert_eq!(observer.skipped.load(Ordering::SeqCst), 1);
        // validate + process + assemble for the good item.
        assert_eq!(observer.done.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn failing_plugin_step_skips_the_item_not_the_batch() {
        struct RejectLargeImages;

        impl ImageTransform for RejectLargeImages {
            fn name(&self) -> &str {
                "reject-large"
            }

            fn apply(
                &self,
                image: NormalizedImage,
                _options: &TransformOptions,
            ) -> bildmappe_core::error::Result<NormalizedImage> {
                if image.width() > 50 {
                    Err(BildmappeError::Plugin {
                        step: "reject-large".into(),
                        cause: "image too wide".into(),
                    })
                } else {
                    Ok(image)
                }
            }
        }

        let dir = tempfile::tempdir().expect("temp dir");
        let small = write_png(dir.path(), "small.png", 20, 20);
        let wide = write_png(dir.path(), "wide.png", 100, 20);

        let config = ConversionConfig::new(dir.path().join("out.pdf"));
        let converter = BatchConverter::new(config)
            .expect("converter")
            .with_step(Arc::new(RejectLargeImages));
        let report = converter.run(vec![small, wide]).await;

        assert_eq!(report.state, BatchState::PartiallyCompleted);
        assert_eq!(report.items[0].outcome, ItemOutcome::Success { page: 0 });
        assert!(matches!(
            report.items[1].outcome,
            ItemOutcome::Skipped {
                class: SkipClass::Plugin,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn enhance_and_watermark_flags_still_complete() {
        let dir = tempfile::tempdir().expect("temp dir");
        let input = write_png(dir.path(), "photo.png", 120, 90);

        let mut config = ConversionConfig::new(dir.path().join("out.pdf"));
        config.enhance = true;
        config.watermark_text = Some("PREVIEW".into());
        config.compress = true;
        config.quality = 40;

        let converter = BatchConverter::new(config).expect("converter");
        let report = converter.run(vec![input]).await;
        assert_eq!(report.state, BatchState::Completed);
        assert_eq!(page_dimensions(report.output.as_ref().expect("output")).len(), 1);
    }

    #[test]
    fn invalid_config_is_rejected_before_any_processing() {
        let mut config = ConversionConfig::new("out.pdf");
        config.quality = 0;
        let err = BatchConverter::new(config).expect_err("must fail");
        assert!(matches!(err, BildmappeError::Config(_)));
    }

    #[test]
    fn cancel_token_is_shared_between_clones() {
        let token = CancelToken::new();
        let clone = token.clone();
        assert!(!clone.is_cancelled());
        token.cancel();
        assert!(clone.is_cancelled());
    }
}
