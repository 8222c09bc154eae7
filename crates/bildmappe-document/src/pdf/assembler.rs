// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// PDF assembly — one page per laid-out image, using `printpdf` 0.8.
//
// printpdf 0.8 uses a data-oriented API: documents are built by constructing
// `PdfPage` structs containing `Vec<Op>` operation lists, then serialised via
// `PdfDocument::save()`. The finished document is written atomically: bytes
// are staged in a temporary file next to the destination and renamed into
// place, so a mid-assembly failure never leaves a truncated output file.

use std::io::Write;
use std::path::{Path, PathBuf};

use bildmappe_core::error::{BildmappeError, Result};
use bildmappe_core::types::PageGeometry;
use bildmappe_core::ConversionConfig;
use image::{DynamicImage, RgbImage};
use printpdf::{
    Mm, Op, PdfDocument, PdfPage, PdfSaveOptions, PdfWarnMsg, Pt, RawImage, RawImageData,
    RawImageFormat, XObjectTransform,
};
use tracing::{debug, info, instrument};

use crate::image::normalize::{ColorMode, NormalizedImage};
use crate::layout::FIT_REFERENCE_DPI;

const MM_PER_PT: f32 = 25.4 / 72.0;

/// Assembles a sequence of laid-out images into a single PDF document.
pub struct PdfAssembler {
    /// Title metadata embedded in the PDF /Info dictionary.
    title: Option<String>,
}

impl PdfAssembler {
    pub fn new() -> Self {
        Self { title: None }
    }

    /// Set a title for the PDF metadata.
    pub fn set_title(&mut self, title: impl Into<String>) {
        self.title = Some(title.into());
    }

    /// Build the document and write it to `config.output_path`.
    ///
    /// Appends exactly one page per entry, in the given order. When
    /// `config.compress` is set each image is re-encoded as JPEG at
    /// `config.quality` before embedding; otherwise the normalized pixels
    /// are embedded without lossy re-encoding. On any failure no partial
    /// file is left at the destination.
    #[instrument(skip_all, fields(pages = items.len(), output = %config.output_path.display()))]
    pub fn assemble(
        &self,
        items: Vec<(NormalizedImage, PageGeometry)>,
        config: &ConversionConfig,
    ) -> Result<PathBuf> {
        if items.is_empty() {
            return Err(BildmappeError::Assembly(
                "no pages to assemble".into(),
            ));
        }

        let title = self.title.as_deref().unwrap_or("Bildmappe Document");
        let mut doc = PdfDocument::new(title);
        let mut pages: Vec<PdfPage> = Vec::new();

        for (image, geometry) in items {
            let rgb = prepare_pixels(image, config)?;
            let (embed_w, embed_h) = rgb.dimensions();

            let raw = RawImage {
                pixels: RawImageData::U8(rgb.into_raw()),
                width: embed_w as usize,
                height: embed_h as usize,
                data_format: RawImageFormat::RGB8,
                tag: Vec::new(),
            };
            let xobject_id = doc.add_image(&raw);

            // Native size of the XObject at the reference resolution; the
            // scale factor maps it onto the placement rectangle.
            let native_w_pt = embed_w as f32 / FIT_REFERENCE_DPI * 72.0;
            let native_h_pt = embed_h as f32 / FIT_REFERENCE_DPI * 72.0;
            let scale_x = geometry.width / native_w_pt;
            let scale_y = geometry.height / native_h_pt;

            let ops = vec![Op::UseXobject {
                id: xobject_id,
                transform: XObjectTransform {
                    translate_x: Some(Pt(geometry.x)),
                    translate_y: Some(Pt(geometry.y)),
                    scale_x: Some(scale_x),
                    scale_y: Some(scale_y),
                    dpi: Some(FIT_REFERENCE_DPI),
                    rotate: None,
                },
            }];

            pages.push(PdfPage::new(
                Mm(geometry.page_width * MM_PER_PT),
                Mm(geometry.page_height * MM_PER_PT),
                ops,
            ));
        }

        let page_count = pages.len();
        doc.with_pages(pages);

        let mut warnings: Vec<PdfWarnMsg> = Vec::new();
        let bytes = doc.save(&PdfSaveOptions::default(), &mut warnings);

        write_atomic(&config.output_path, &bytes)?;

        info!(
            pages = page_count,
            bytes = bytes.len(),
            "PDF assembled"
        );
        Ok(config.output_path.clone())
    }
}

impl Default for PdfAssembler {
    fn default() -> Self {
        Self::new()
    }
}

/// Turn a normalized image into the RGB8 buffer that gets embedded.
///
/// Alpha is flattened onto a white background (PDF image XObjects carry no
/// alpha channel), oversized images are downscaled to the configured bound,
/// and the lossy re-encode round-trip is applied when compression is on.
fn prepare_pixels(image: NormalizedImage, config: &ConversionConfig) -> Result<RgbImage> {
    let rgb = flatten_to_rgb(image);
    let rgb = downscale_if_oversized(rgb, config.max_pixel_dimension);

    if config.compress {
        let encoded = encode_jpeg(&rgb, config.quality)?;
        let decoded = image::load_from_memory(&encoded).map_err(|err| {
            BildmappeError::Assembly(format!("re-decode of compressed image failed: {err}"))
        })?;
        Ok(decoded.to_rgb8())
    } else {
        Ok(rgb)
    }
}

/// Composite RGBA pixels over a white background; RGB passes through.
fn flatten_to_rgb(image: NormalizedImage) -> RgbImage {
    match image.color() {
        ColorMode::Rgb => image.into_dynamic().to_rgb8(),
        ColorMode::Rgba => {
            let rgba = image.into_dynamic().to_rgba8();
            RgbImage::from_fn(rgba.width(), rgba.height(), |x, y| {
                let image::Rgba([r, g, b, a]) = *rgba.get_pixel(x, y);
                let alpha = a as u16;
                let over = |channel: u8| -> u8 {
                    ((channel as u16 * alpha + 255 * (255 - alpha)) / 255) as u8
                };
                image::Rgb([over(r), over(g), over(b)])
            })
        }
    }
}

/// Downscale with Lanczos3 when the longest side exceeds `max_dimension`.
/// A bound of 0 disables the guard.
fn downscale_if_oversized(rgb: RgbImage, max_dimension: u32) -> RgbImage {
    let (w, h) = rgb.dimensions();
    if max_dimension == 0 || (w <= max_dimension && h <= max_dimension) {
        return rgb;
    }
    debug!(w, h, max_dimension, "downscaling oversized image");
    DynamicImage::ImageRgb8(rgb)
        .resize(
            max_dimension,
            max_dimension,
            image::imageops::FilterType::Lanczos3,
        )
        .to_rgb8()
}

/// Encode an RGB buffer as JPEG at the given quality (1-100).
fn encode_jpeg(rgb: &RgbImage, quality: u8) -> Result<Vec<u8>> {
    let mut buffer = Vec::new();
    let encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(&mut buffer, quality);
    rgb.write_with_encoder(encoder)
        .map_err(|err| BildmappeError::Assembly(format!("JPEG encoding failed: {err}")))?;
    Ok(buffer)
}

/// Stage the document bytes in a sibling temp file, then rename into place.
fn write_atomic(output: &Path, bytes: &[u8]) -> Result<()> {
    let parent = match output.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };

    let mut staged = tempfile::NamedTempFile::new_in(parent).map_err(|err| {
        BildmappeError::Assembly(format!(
            "cannot stage output in {}: {err}",
            parent.display()
        ))
    })?;
    staged
        .write_all(bytes)
        .map_err(|err| BildmappeError::Assembly(format!("write failed: {err}")))?;
    staged.persist(output).map_err(|err| {
        BildmappeError::Assembly(format!(
            "cannot move output into place at {}: {}",
            output.display(),
            err.error
        ))
    })?;
    Ok(())
}
