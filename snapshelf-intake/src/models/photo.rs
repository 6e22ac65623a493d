//! Queue entries as presented to the front door

use serde::Serialize;

/// One queued photo, ready for a preview grid
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueuedPhoto {
    /// File name shown under the thumbnail
    pub display_name: String,
    /// Path relative to the watched folder, `/` separated
    ///
    /// Falls back to the bare file name when the path cannot be made relative.
    pub relative_path: String,
    /// URL serving the raw file; absent when `relative_path` is a fallback
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preview_url: Option<String>,
}
