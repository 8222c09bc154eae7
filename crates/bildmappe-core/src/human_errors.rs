// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Human-readable error messages for the GUI and CLI surfaces.
//
// Every technical error is mapped to plain English with a clear suggestion.

use crate::error::BildmappeError;

/// Severity of an error from the user's perspective.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// One input was skipped — the rest of the batch continues.
    ItemSkipped,
    /// User must fix something (free disk space, pick another folder).
    ActionRequired,
    /// Cannot be fixed by retrying — wrong format, bad settings.
    Permanent,
}

/// A human-readable error with a plain English message and suggestion.
#[derive(Debug, Clone)]
pub struct HumanError {
    /// Plain English summary (shown as a heading).
    pub message: String,
    /// What the user should try (shown as body text).
    pub suggestion: String,
    /// Severity level (drives icon/colour in UI).
    pub severity: Severity,
}

/// Convert a `BildmappeError` into a `HumanError` suitable for display.
pub fn humanize_error(err: &BildmappeError) -> HumanError {
    match err {
        BildmappeError::Config(detail) => HumanError {
            message: "These conversion settings aren't valid.".into(),
            suggestion: format!("Please check the settings and try again. ({detail})"),
            severity: Severity::Permanent,
        },

        BildmappeError::Validation { path, .. } => HumanError {
            message: format!(
                "\"{}\" doesn't look like a supported image.",
                file_name(path)
            ),
            suggestion:
                "Supported formats are JPEG, PNG, BMP, TIFF and GIF. This file was skipped; \
                 the rest of the batch continues."
                    .into(),
            severity: Severity::ItemSkipped,
        },

        BildmappeError::Decode { path, .. } => HumanError {
            message: format!("\"{}\" could not be opened.", file_name(path)),
            suggestion:
                "The image may be damaged. Try opening it in an image viewer to check it works. \
                 This file was skipped; the rest of the batch continues."
                    .into(),
            severity: Severity::ItemSkipped,
        },

        BildmappeError::Plugin { step, .. } => HumanError {
            message: format!("The \"{step}\" image step didn't work for one image."),
            suggestion: "That image was skipped. You can disable the step and convert again."
                .into(),
            severity: Severity::ItemSkipped,
        },

        BildmappeError::Layout(_) => HumanError {
            message: "One image has impossible dimensions.".into(),
            suggestion: "The image reports a width or height of zero and was skipped.".into(),
            severity: Severity::ItemSkipped,
        },

        BildmappeError::Assembly(detail) => HumanError {
            message: "The PDF could not be written.".into(),
            suggestion: format!(
                "No output file was created. Check free disk space and that the destination \
                 folder is writable, then try again. ({detail})"
            ),
            severity: Severity::ActionRequired,
        },

        BildmappeError::Cancelled => HumanError {
            message: "The conversion was stopped.".into(),
            suggestion: "No output file was created. Start the conversion again when ready."
                .into(),
            severity: Severity::ActionRequired,
        },

        BildmappeError::Io(detail) => HumanError {
            message: "A file could not be read or written.".into(),
            suggestion: format!("Check file permissions and try again. ({detail})"),
            severity: Severity::ActionRequired,
        },

        BildmappeError::Serialization(detail) => HumanError {
            message: "A report could not be saved.".into(),
            suggestion: format!("The conversion itself may have succeeded. ({detail})"),
            severity: Severity::ActionRequired,
        },
    }
}

fn file_name(path: &std::path::Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn item_errors_map_to_item_skipped() {
        let err = BildmappeError::Decode {
            path: "photos/broken.jpg".into(),
            reason: "truncated".into(),
        };
        let human = humanize_error(&err);
        assert_eq!(human.severity, Severity::ItemSkipped);
        assert!(human.message.contains("broken.jpg"));
    }

    #[test]
    fn assembly_error_asks_for_user_action() {
        let err = BildmappeError::Assembly("no space left on device".into());
        let human = humanize_error(&err);
        assert_eq!(human.severity, Severity::ActionRequired);
        assert!(human.suggestion.contains("no space left on device"));
    }

    #[test]
    fn config_error_is_permanent() {
        let err = BildmappeError::Config("quality must be in 1..=100".into());
        assert_eq!(humanize_error(&err).severity, Severity::Permanent);
    }
}
