//! Finalize result: the primary outcome plus non-fatal warnings

use serde::Serialize;
use std::fmt;

/// A follow-up step that failed after (or without blocking) the upload
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FinalizeWarning {
    /// Normalization failed; the original bytes were uploaded instead
    NormalizationFallback { file: String, reason: String },
    /// Queued file no longer exists and was left out of the upload
    MissingFile { file: String },
    /// Images are attached but the item is still unpublished
    PublishFailed { reason: String },
    /// Original could not be deleted or archived
    CleanupFailed { file: String, reason: String },
    /// Photos queued while the upload ran; they stay queued for the same item
    LateArrivals { count: usize },
}

impl fmt::Display for FinalizeWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FinalizeWarning::NormalizationFallback { file, reason } => {
                write!(f, "{}: uploaded original ({})", file, reason)
            }
            FinalizeWarning::MissingFile { file } => write!(f, "{}: file missing, skipped", file),
            FinalizeWarning::PublishFailed { reason } => write!(f, "publish failed: {}", reason),
            FinalizeWarning::CleanupFailed { file, reason } => {
                write!(f, "{}: cleanup failed ({})", file, reason)
            }
            FinalizeWarning::LateArrivals { count } => {
                write!(f, "{} photo(s) arrived during upload and remain queued", count)
            }
        }
    }
}

/// Successful finalize
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FinalizeOutcome {
    pub item_id: String,
    /// Number of images attached to the item
    pub uploaded: usize,
    /// Whether the item was marked published
    pub published: bool,
    pub warnings: Vec<FinalizeWarning>,
}

impl FinalizeOutcome {
    pub fn is_clean(&self) -> bool {
        self.warnings.is_empty()
    }
}
