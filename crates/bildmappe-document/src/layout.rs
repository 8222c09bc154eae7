// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Page layout — maps image pixel dimensions and a page-size policy to page
// dimensions and a centred placement rectangle, all in PDF points.

use bildmappe_core::error::{BildmappeError, Result};
use bildmappe_core::types::{PageGeometry, PageSize};
use tracing::debug;

/// Margin around the image on named page sizes, in points.
pub const MARGIN_PT: f32 = 24.0;

/// Reference resolution for `Fit` pages: pixels are mapped to points at
/// 96 px/inch, so a 960 px wide image yields a 720 pt wide page.
pub const FIT_REFERENCE_DPI: f32 = 96.0;

const POINTS_PER_INCH: f32 = 72.0;

/// Computes page geometry for one image under a page-size policy.
pub struct PageLayoutEngine;

impl PageLayoutEngine {
    /// Resolve page dimensions and the image placement rectangle.
    ///
    /// Named sizes scale the image uniformly to fit inside the page minus
    /// the fixed margin, then centre it; when the width- and
    /// height-constrained scale factors differ, the smaller one wins so the
    /// image never overflows either dimension. `Fit` sizes the page to the
    /// image itself with no margin and no scaling.
    pub fn compute_geometry(
        pixel_width: u32,
        pixel_height: u32,
        page_size: PageSize,
    ) -> Result<PageGeometry> {
        if pixel_width == 0 || pixel_height == 0 {
            return Err(BildmappeError::Layout(format!(
                "degenerate image dimensions {pixel_width}x{pixel_height}"
            )));
        }

        let geometry = match page_size.dimensions_pt() {
            Some((page_width, page_height)) => {
                let usable_width = page_width - 2.0 * MARGIN_PT;
                let usable_height = page_height - 2.0 * MARGIN_PT;

                let scale_x = usable_width / pixel_width as f32;
                let scale_y = usable_height / pixel_height as f32;
                let scale = scale_x.min(scale_y);

                let width = pixel_width as f32 * scale;
                let height = pixel_height as f32 * scale;

                PageGeometry {
                    page_width,
                    page_height,
                    x: MARGIN_PT + (usable_width - width) / 2.0,
                    y: MARGIN_PT + (usable_height - height) / 2.0,
                    width,
                    height,
                }
            }
            None => {
                // Fit: one point per pixel at the reference resolution.
                let width = pixel_width as f32 * POINTS_PER_INCH / FIT_REFERENCE_DPI;
                let height = pixel_height as f32 * POINTS_PER_INCH / FIT_REFERENCE_DPI;
                PageGeometry {
                    page_width: width,
                    page_height: height,
                    x: 0.0,
                    y: 0.0,
                    width,
                    height,
                }
            }
        };

        debug!(
            pixel_width,
            pixel_height,
            page = %page_size,
            placed_w = geometry.width,
            placed_h = geometry.height,
            "geometry computed"
        );
        Ok(geometry)
    }
}
