// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// bildmappe-document — Image and PDF processing for the Bildmappe engine.
//
// Provides input validation (header sniffing), image normalization (decode,
// EXIF orientation, canonical color mode), page layout computation, and PDF
// assembly (one page per image, optional lossy compression, atomic output).

pub mod image;
pub mod layout;
pub mod pdf;

// Re-export the primary structs so callers can use `bildmappe_document::ImageValidator` etc.
pub use image::normalize::{ColorMode, ImageNormalizer, NormalizedImage};
pub use image::validate::{ImageValidator, ValidationOutcome};
pub use layout::PageLayoutEngine;
pub use pdf::assembler::PdfAssembler;
