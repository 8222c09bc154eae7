// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Image normalization — full decode, EXIF orientation correction, and
// conversion to a canonical RGB(+alpha) pixel buffer.

use std::io::Cursor;
use std::path::Path;

use bildmappe_core::error::{BildmappeError, Result};
use image::DynamicImage;
use tracing::{debug, instrument, warn};

/// Canonical color representation of a normalized image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorMode {
    Rgb,
    Rgba,
}

/// A decoded, upright image in canonical color mode.
///
/// Owned exclusively by the stage processing it; batch items never share
/// pixel buffers.
#[derive(Debug, Clone)]
pub struct NormalizedImage {
    image: DynamicImage,
    color: ColorMode,
}

impl NormalizedImage {
    /// Wrap an already-decoded image, converting it to canonical form.
    pub fn from_dynamic(image: DynamicImage) -> Self {
        let (image, color) = canonicalize(image);
        Self { image, color }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn color(&self) -> ColorMode {
        self.color
    }

    /// Borrow the underlying pixel buffer.
    pub fn as_dynamic(&self) -> &DynamicImage {
        &self.image
    }

    /// Consume the image and return the underlying buffer.
    pub fn into_dynamic(self) -> DynamicImage {
        self.image
    }
}

/// Decodes images and applies EXIF orientation so stored pixels are upright.
pub struct ImageNormalizer;

impl ImageNormalizer {
    /// Decode `path` into a canonical in-memory image.
    ///
    /// When `auto_rotate` is set, the EXIF orientation tag is read and the
    /// matching rotation/flip is applied. A decode failure is fatal for
    /// this single item only, never for the batch.
    #[instrument(skip_all, fields(path = %path.display(), auto_rotate))]
    pub fn normalize(path: &Path, auto_rotate: bool) -> Result<NormalizedImage> {
        let bytes = std::fs::read(path).map_err(|err| BildmappeError::Decode {
            path: path.to_path_buf(),
            reason: format!("cannot read file: {err}"),
        })?;

        let reader = image::ImageReader::new(Cursor::new(&bytes))
            .with_guessed_format()
            .map_err(|err| BildmappeError::Decode {
                path: path.to_path_buf(),
                reason: format!("cannot detect image format: {err}"),
            })?;

        let decoded = reader.decode().map_err(|err| BildmappeError::Decode {
            path: path.to_path_buf(),
            reason: err.to_string(),
        })?;

        let upright = if auto_rotate {
            match read_orientation(&bytes) {
                Some(orientation) if orientation != 1 => {
                    debug!(orientation, "applying EXIF orientation");
                    apply_orientation(decoded, orientation)
                }
                _ => decoded,
            }
        } else {
            decoded
        };

        let normalized = NormalizedImage::from_dynamic(upright);
        debug!(
            width = normalized.width(),
            height = normalized.height(),
            color = ?normalized.color(),
            "image normalized"
        );
        Ok(normalized)
    }
}

/// Convert any decoded variant to the canonical RGB8 / RGBA8 representation.
///
/// Palette, grayscale, and 16-bit inputs all land on one of the two
/// canonical modes so downstream handling stays uniform.
fn canonicalize(image: DynamicImage) -> (DynamicImage, ColorMode) {
    if image.color().has_alpha() {
        (DynamicImage::ImageRgba8(image.to_rgba8()), ColorMode::Rgba)
    } else {
        (DynamicImage::ImageRgb8(image.to_rgb8()), ColorMode::Rgb)
    }
}

/// Read the EXIF orientation tag (1..=8) from raw file bytes.
///
/// Returns `None` when the file carries no EXIF data — common for PNG, BMP,
/// and GIF — or when the tag is absent or malformed.
fn read_orientation(bytes: &[u8]) -> Option<u32> {
    let exif = exif::Reader::new()
        .read_from_container(&mut Cursor::new(bytes))
        .ok()?;
    let field = exif.get_field(exif::Tag::Orientation, exif::In::PRIMARY)?;
    match field.value {
        exif::Value::Short(ref values) => {
            let value = u32::from(*values.first()?);
            if (1..=8).contains(&value) {
                Some(value)
            } else {
                warn!(value, "out-of-range EXIF orientation ignored");
                None
            }
        }
        _ => None,
    }
}

/// Apply the rotation/flip matching an EXIF orientation value.
///
/// Orientation 1 is upright; 2/4 are mirrored, 3/6/8 rotated, 5/7 both.
fn apply_orientation(image: DynamicImage, orientation: u32) -> DynamicImage {
    match orientation {
        2 => image.fliph(),
        3 => image.rotate180(),
        4 => image.flipv(),
        5 => image.rotate90().fliph(),
        6 => image.rotate90(),
        7 => image.rotate90().flipv(),
        8 => image.rotate270(),
        _ => image,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GenericImageView, Rgb, RgbImage, Rgba, RgbaImage};

    const RED: Rgb<u8> = Rgb([255, 0, 0]);
    const BLUE: Rgb<u8> = Rgb([0, 0, 255]);

    /// 2x1 image: red on the left, blue on the right.
    fn two_pixel_image() -> DynamicImage {
        let mut img = RgbImage::new(2, 1);
        img.put_pixel(0, 0, RED);
        img.put_pixel(1, 0, BLUE);
        DynamicImage::ImageRgb8(img)
    }

    #[test]
    fn normalize_reads_dimensions_from_file() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let path = dir.path().join("sample.png");
        let img = RgbImage::from_pixel(13, 7, Rgb([90, 120, 150]));
        img.save(&path).expect("save png");

        let normalized = ImageNormalizer::normalize(&path, false).expect("normalize");
        assert_eq!(normalized.width(), 13);
        assert_eq!(normalized.height(), 7);
        assert_eq!(normalized.color(), ColorMode::Rgb);
    }

    #[test]
    fn alpha_sources_keep_the_alpha_channel() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let path = dir.path().join("sample_alpha.png");
        let img = RgbaImage::from_pixel(4, 4, Rgba([10, 20, 30, 128]));
        img.save(&path).expect("save png");

        let normalized = ImageNormalizer::normalize(&path, false).expect("normalize");
        assert_eq!(normalized.color(), ColorMode::Rgba);
    }

    #[test]
    fn grayscale_is_canonicalized_to_rgb() {
        let gray = DynamicImage::ImageLuma8(image::GrayImage::from_pixel(3, 3, image::Luma([99])));
        let normalized = NormalizedImage::from_dynamic(gray);
        assert_eq!(normalized.color(), ColorMode::Rgb);
        let pixel = normalized.as_dynamic().to_rgb8().get_pixel(0, 0).0;
        assert_eq!(pixel, [99, 99, 99]);
    }

    #[test]
    fn corrupt_file_yields_decode_error() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let path = dir.path().join("corrupt.jpg");
        // Valid JPEG magic so the validator would pass it, but no image data.
        std::fs::write(&path, [0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x00]).expect("write file");

        let err = ImageNormalizer::normalize(&path, true).expect_err("must fail");
        assert!(matches!(err, BildmappeError::Decode { .. }));
    }

    #[test]
    fn orientation_six_rotates_quarter_turn_clockwise() {
        let rotated = apply_orientation(two_pixel_image(), 6);
        assert_eq!(rotated.dimensions(), (1, 2));
        // Red ends up on top after a clockwise quarter turn.
        let rgb = rotated.to_rgb8();
        assert_eq!(*rgb.get_pixel(0, 0), RED);
        assert_eq!(*rgb.get_pixel(0, 1), BLUE);
    }

    #[test]
    fn orientation_eight_rotates_quarter_turn_counterclockwise() {
        let rotated = apply_orientation(two_pixel_image(), 8);
        assert_eq!(rotated.dimensions(), (1, 2));
        let rgb = rotated.to_rgb8();
        assert_eq!(*rgb.get_pixel(0, 0), BLUE);
        assert_eq!(*rgb.get_pixel(0, 1), RED);
    }

    #[test]
    fn orientation_three_rotates_half_turn() {
        let rotated = apply_orientation(two_pixel_image(), 3);
        assert_eq!(rotated.dimensions(), (2, 1));
        let rgb = rotated.to_rgb8();
        assert_eq!(*rgb.get_pixel(0, 0), BLUE);
        assert_eq!(*rgb.get_pixel(1, 0), RED);
    }

    #[test]
    fn orientation_two_mirrors_horizontally() {
        let mirrored = apply_orientation(two_pixel_image(), 2);
        let rgb = mirrored.to_rgb8();
        assert_eq!(*rgb.get_pixel(0, 0), BLUE);
        assert_eq!(*rgb.get_pixel(1, 0), RED);
    }

    #[test]
    fn orientation_one_is_identity() {
        let unchanged = apply_orientation(two_pixel_image(), 1);
        let rgb = unchanged.to_rgb8();
        assert_eq!(*rgb.get_pixel(0, 0), RED);
        assert_eq!(*rgb.get_pixel(1, 0), BLUE);
    }

    #[test]
    fn orientation_absent_for_plain_png() {
        let mut bytes = Vec::new();
        let img = RgbImage::from_pixel(2, 2, Rgb([1, 2, 3]));
        img.write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Png)
            .expect("encode png");
        assert_eq!(read_orientation(&bytes), None);
    }
}
