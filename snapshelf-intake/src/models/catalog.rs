//! Types exchanged with the remote catalog

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Catalog item that has no photos yet
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogItem {
    pub id: String,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sku: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// One image to attach to an item, in gallery order
#[derive(Clone, PartialEq, Eq)]
pub struct ImageUpload {
    pub filename: String,
    pub bytes: Vec<u8>,
}

// Manual impl keeps multi-megabyte payloads out of logs
impl std::fmt::Debug for ImageUpload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageUpload")
            .field("filename", &self.filename)
            .field("bytes", &self.bytes.len())
            .finish()
    }
}
