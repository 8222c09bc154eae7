// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Input validation — cheap read-only probe of candidate image files.
//
// Only the file header is read; the full decode happens later in the
// normalizer. Expected failure modes are reported as values, never raised.

use std::io::Read;
use std::path::Path;

use tracing::debug;

/// Result of probing one candidate input file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationOutcome {
    Valid,
    Invalid { reason: String },
}

impl ValidationOutcome {
    pub fn is_valid(&self) -> bool {
        matches!(self, Self::Valid)
    }

    fn invalid(reason: impl Into<String>) -> Self {
        Self::Invalid {
            reason: reason.into(),
        }
    }
}

/// Checks that a candidate input is a readable, supported raster image.
///
/// Supported formats: JPEG, PNG, BMP, TIFF, GIF — recognised by their
/// header magic bytes, not the file extension.
pub struct ImageValidator;

impl ImageValidator {
    /// Probe a file without decoding it.
    ///
    /// Returns `Invalid` for a missing file, unreadable permissions, a
    /// zero-byte file, or an unrecognised header.
    pub fn validate(path: &Path) -> ValidationOutcome {
        let metadata = match std::fs::metadata(path) {
            Ok(m) => m,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return ValidationOutcome::invalid("file not found");
            }
            Err(err) => {
                return ValidationOutcome::invalid(format!("cannot stat file: {err}"));
            }
        };

        if !metadata.is_file() {
            return ValidationOutcome::invalid("not a regular file");
        }
        if metadata.len() == 0 {
            return ValidationOutcome::invalid("zero-byte file");
        }

        let mut file = match std::fs::File::open(path) {
            Ok(f) => f,
            Err(err) => {
                return ValidationOutcome::invalid(format!("cannot open file: {err}"));
            }
        };

        let mut header = [0u8; 12];
        let bytes_read = match file.read(&mut header) {
            Ok(n) => n,
            Err(err) => {
                return ValidationOutcome::invalid(format!("cannot read header: {err}"));
            }
        };

        if bytes_read < 4 {
            return ValidationOutcome::invalid("file too small to be a valid image");
        }

        if !is_supported_image_header(&header) {
            return ValidationOutcome::invalid(
                "unrecognised image format (expected JPEG, PNG, BMP, TIFF, or GIF)",
            );
        }

        debug!(path = %path.display(), "input validated");
        ValidationOutcome::Valid
    }
}

/// Match the header against the supported raster format signatures.
fn is_supported_image_header(header: &[u8; 12]) -> bool {
    // JPEG: FF D8 FF
    if header[0] == 0xFF && header[1] == 0xD8 && header[2] == 0xFF {
        return true;
    }

    // PNG: 89 50 4E 47
    if header[0] == 0x89 && header[1] == b'P' && header[2] == b'N' && header[3] == b'G' {
        return true;
    }

    // GIF: GIF8
    if header[0] == b'G' && header[1] == b'I' && header[2] == b'F' && header[3] == b'8' {
        return true;
    }

    // BMP: BM
    if header[0] == b'B' && header[1] == b'M' {
        return true;
    }

    // TIFF: II (little-endian) or MM (big-endian) followed by version 42
    let is_tiff_le =
        header[0] == b'I' && header[1] == b'I' && header[2] == 0x2A && header[3] == 0x00;
    let is_tiff_be =
        header[0] == b'M' && header[1] == b'M' && header[2] == 0x00 && header[3] == 0x2A;

    is_tiff_le || is_tiff_be
}
