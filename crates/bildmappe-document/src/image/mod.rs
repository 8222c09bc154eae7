// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Image module — input validation and normalization.

pub mod normalize;
pub mod validate;

pub use normalize::{ImageNormalizer, NormalizedImage};
pub use validate::{ImageValidator, ValidationOutcome};
