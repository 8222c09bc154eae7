// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Bildmappe CLI — convert an ordered list of images into a single PDF.
//
// Exit status: 0 on full success, 2 when the output was produced but some
// inputs were skipped, 1 on failure.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, ValueEnum};

use bildmappe_batch::{BatchConverter, ProgressObserver};
use bildmappe_core::human_errors::humanize_error;
use bildmappe_core::types::{BatchReport, ItemOutcome, PageSize};
use bildmappe_core::ConversionConfig;
use bildmappe_plugin::{manifest, ImageEffects, PluginPipeline, PluginRegistry};

/// Convert an ordered list of raster images into one paginated PDF.
#[derive(Parser, Debug)]
#[command(name = "bildmappe")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Images to convert, one page each, in the given order.
    #[arg(required = true)]
    images: Vec<PathBuf>,

    /// Destination PDF path.
    #[arg(short, long)]
    output: PathBuf,

    /// Page size policy; `fit` sizes each page to its image.
    #[arg(long, value_enum, default_value = "a4")]
    page_size: PageSizeArg,

    /// Re-encode images lossily before embedding.
    #[arg(long)]
    compress: bool,

    /// Compression quality, 1 (smallest) to 100 (best), with --compress.
    #[arg(long, default_value_t = 85)]
    quality: u8,

    /// Apply the auto-levels enhancement step.
    #[arg(long)]
    enhance: bool,

    /// Apply EXIF orientation so pages come out upright.
    #[arg(long)]
    auto_rotate: bool,

    /// Stamp this text on every image.
    #[arg(long)]
    watermark: Option<String>,

    /// Built-in effect filter: sepia, grayscale, blur, or sharpen.
    #[arg(long)]
    effect: Option<String>,

    /// Effect strength.
    #[arg(long, default_value_t = 1.0)]
    intensity: f64,

    /// Directory scanned for plugin manifests.
    #[arg(long)]
    plugins: Option<PathBuf>,

    /// Write the per-item result list as JSON to this path.
    #[arg(long)]
    report: Option<PathBuf>,

    /// Enable verbose (debug) logging.
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum PageSizeArg {
    A4,
    Letter,
    Legal,
    Tabloid,
    Fit,
}

impl From<PageSizeArg> for PageSize {
    fn from(value: PageSizeArg) -> Self {
        match value {
            PageSizeArg::A4 => PageSize::A4,
            PageSizeArg::Letter => PageSize::Letter,
            PageSizeArg::Legal => PageSize::Legal,
            PageSizeArg::Tabloid => PageSize::Tabloid,
            PageSizeArg::Fit => PageSize::Fit,
        }
    }
}

/// Prints one line per item event to stderr, keeping stdout for reports.
struct ConsoleProgress;

impl ProgressObserver for ConsoleProgress {
    fn on_item_done(&self, index: usize, total: usize, stage: &str) {
        eprintln!("[{}/{total}] {stage} done", index + 1);
    }

    fn on_item_skipped(&self, index: usize, total: usize, stage: &str, reason: &str) {
        eprintln!("[{}/{total}] skipped during {stage}: {reason}", index + 1);
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter)),
        )
        .with_writer(std::io::stderr)
        .init();

    tracing::info!("Bildmappe starting");

    let mut config = ConversionConfig::new(cli.output.clone());
    config.page_size = cli.page_size.into();
    config.compress = cli.compress;
    config.quality = cli.quality;
    config.enhance = cli.enhance;
    config.auto_rotate = cli.auto_rotate;
    config.watermark_text = cli.watermark.clone();
    if let Some(effect) = &cli.effect {
        config
            .plugin_options
            .insert("effect".into(), serde_json::json!(effect));
        config
            .plugin_options
            .insert("intensity".into(), serde_json::json!(cli.intensity));
    }

    let converter = match BatchConverter::new(config) {
        Ok(converter) => converter,
        Err(err) => {
            let human = humanize_error(&err);
            eprintln!("error: {}", human.message);
            eprintln!("  {}", human.suggestion);
            std::process::exit(1);
        }
    };
    let mut converter = converter.with_observer(Arc::new(ConsoleProgress));

    if cli.effect.is_some() {
        converter = converter.with_step(Arc::new(ImageEffects));
    }

    if let Some(plugin_dir) = &cli.plugins {
        let registry = PluginRegistry::with_builtins();
        let mut activated = PluginPipeline::new();
        for report in manifest::activate_from_dir(plugin_dir, &registry, &mut activated) {
            match &report.status {
                manifest::ManifestStatus::Activated { name } => {
                    eprintln!("plugin activated: {name}");
                }
                manifest::ManifestStatus::Disabled { reason } => {
                    eprintln!("plugin disabled ({}): {reason}", report.path.display());
                }
            }
        }
        for step in activated.steps() {
            converter = converter.with_step(Arc::clone(step));
        }
    }

    let report = converter.run(cli.images).await;

    print_summary(&report);

    if let Some(report_path) = &cli.report {
        match serde_json::to_string_pretty(&report) {
            Ok(json) => {
                if let Err(err) = std::fs::write(report_path, json) {
                    eprintln!("error: cannot write report to {}: {err}", report_path.display());
                }
            }
            Err(err) => eprintln!("error: cannot serialise report: {err}"),
        }
    }

    std::process::exit(report.exit_code());
}

fn print_summary(report: &BatchReport) {
    match &report.output {
        Some(path) => eprintln!(
            "wrote {} ({} page{}, {} skipped)",
            path.display(),
            report.succeeded_count(),
            if report.succeeded_count() == 1 { "" } else { "s" },
            report.skipped_count(),
        ),
        None => {
            eprintln!("no output produced");
            if let Some(failure) = &report.failure {
                eprintln!("  {failure}");
            }
        }
    }

    for item in &report.items {
        if let ItemOutcome::Skipped { reason, .. } = &item.outcome {
            eprintln!("  skipped {}: {reason}", item.path.display());
        }
    }
}
