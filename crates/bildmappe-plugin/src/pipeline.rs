// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Transform pipeline — an ordered chain of image-processor steps.
//
// Steps run strictly in registration order; each step's output is the next
// step's input. A failing step aborts the chain for that image (fails
// closed) and surfaces as a per-item plugin error.

use std::sync::Arc;

use bildmappe_core::error::{BildmappeError, Result};
use bildmappe_core::ConversionConfig;
use bildmappe_document::NormalizedImage;
use tracing::debug;

use crate::builtin::enhance::AutoEnhance;
use crate::builtin::watermark::Watermark;
use crate::{ImageTransform, TransformOptions};

/// Ordered chain of transform steps applied before layout.
#[derive(Clone, Default)]
pub struct PluginPipeline {
    steps: Vec<Arc<dyn ImageTransform>>,
}

impl PluginPipeline {
    pub fn new() -> Self {
        Self { steps: Vec::new() }
    }

    /// Build the chain implied by a conversion config: enhancement first,
    /// watermark last so it stays visible on top of other adjustments.
    pub fn from_config(config: &ConversionConfig) -> Self {
        let mut pipeline = Self::new();
        if config.enhance {
            pipeline.push(Arc::new(AutoEnhance::default()));
        }
        if let Some(text) = &config.watermark_text {
            pipeline.push(Arc::new(Watermark::new(
                text.clone(),
                config.watermark_anchor,
                config.watermark_opacity,
            )));
        }
        pipeline
    }

    /// Append a step; it will run after every step already present.
    pub fn push(&mut self, step: Arc<dyn ImageTransform>) {
        self.steps.push(step);
    }

    /// Builder-style variant of [`PluginPipeline::push`].
    pub fn with_step(mut self, step: Arc<dyn ImageTransform>) -> Self {
        self.push(step);
        self
    }

    /// The installed steps, in execution order.
    pub fn steps(&self) -> &[Arc<dyn ImageTransform>] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Run every step in order over the image.
    ///
    /// The first failing step aborts the remainder of the chain; its error
    /// is reported as a plugin error carrying the step name.
    pub fn apply(
        &self,
        image: NormalizedImage,
        options: &TransformOptions,
    ) -> Result<NormalizedImage> {
        let mut current = image;
        for step in &self.steps {
            debug!(step = step.name(), "running transform step");
            current = step.apply(current, options).map_err(|err| match err {
                scoped @ BildmappeError::Plugin { .. } => scoped,
                other => BildmappeError::Plugin {
                    step: step.name().to_string(),
                    cause: other.to_string(),
                },
            })?;
        }
        Ok(current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bildmappe_core::config::WatermarkAnchor;
    use image::{DynamicImage, Rgb, RgbImage};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn sample_image() -> NormalizedImage {
        NormalizedImage::from_dynamic(DynamicImage::ImageRgb8(RgbImage::from_pixel(
            8,
            8,
            Rgb([100, 100, 100]),
        )))
    }

    /// Records the global order in which it ran.
    struct OrderProbe {
        label: &'static str,
        sequence: Arc<std::sync::Mutex<Vec<&'static str>>>,
    }

    impl ImageTransform for OrderProbe {
        fn name(&self) -> &str {
            self.label
        }

        fn apply(
            &self,
            image: NormalizedImage,
            _options: &TransformOptions,
        ) -> Result<NormalizedImage> {
            self.sequence
                .lock()
                .expect("sequence lock")
                .push(self.label);
            Ok(image)
        }
    }

    struct FailingStep;

    impl ImageTransform for FailingStep {
        fn name(&self) -> &str {
            "failing-step"
        }

        fn apply(
            &self,
            _image: NormalizedImage,
            _options: &TransformOptions,
        ) -> Result<NormalizedImage> {
            Err(BildmappeError::Plugin {
                step: "failing-step".into(),
                cause: "synthetic failure".into(),
            })
        }
    }

    struct CountingStep {
        calls: Arc<AtomicUsize>,
    }

    impl ImageTransform for CountingStep {
        fn name(&self) -> &str {
            "counting-step"
        }

        fn apply(
            &self,
            image: NormalizedImage,
            _options: &TransformOptions,
        ) -> Result<NormalizedImage> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(image)
        }
    }

    #[test]
    fn steps_run_in_registration_order() {
        let sequence = Arc::new(std::sync::Mutex::new(Vec::new()));
        let mut pipeline = PluginPipeline::new();
        for label in ["first", "second", "third"] {
            pipeline.push(Arc::new(OrderProbe {
                label,
                sequence: sequence.clone(),
            }));
        }

        pipeline
            .apply(sample_image(), &TransformOptions::new())
            .expect("apply");
        assert_eq!(
            *sequence.lock().expect("sequence lock"),
            vec!["first", "second", "third"]
        );
    }

    #[test]
    fn failing_step_aborts_the_rest_of_the_chain() {
        let calls = Arc::new(AtomicUsize::new(0));
        let pipeline = PluginPipeline::new()
            .with_step(Arc::new(FailingStep))
            .with_step(Arc::new(CountingStep {
                calls: calls.clone(),
            }));

        let err = pipeline
            .apply(sample_image(), &TransformOptions::new())
            .expect_err("must fail");
        assert!(matches!(err, BildmappeError::Plugin { ref step, .. } if step == "failing-step"));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn empty_pipeline_passes_the_image_through() {
        let pipeline = PluginPipeline::new();
        let out = pipeline
            .apply(sample_image(), &TransformOptions::new())
            .expect("apply");
        assert_eq!((out.width(), out.height()), (8, 8));
    }

    #[test]
    fn config_with_no_options_builds_an_empty_chain() {
        let config = ConversionConfig::new("out.pdf");
        assert!(PluginPipeline::from_config(&config).is_empty());
    }

    #[test]
    fn config_flags_build_enhance_then_watermark() {
        let mut config = ConversionConfig::new("out.pdf");
        config.enhance = true;
        config.watermark_text = Some("DRAFT".into());
        config.watermark_anchor = WatermarkAnchor::Center;

        let pipeline = PluginPipeline::from_config(&config);
        assert_eq!(pipeline.len(), 2);
        assert_eq!(pipeline.steps[0].name(), "auto-enhance");
        assert_eq!(pipeline.steps[1].name(), "watermark");
    }
}
