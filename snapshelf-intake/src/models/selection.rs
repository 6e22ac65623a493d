//! The catalog item currently receiving photos

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Currently targeted catalog item
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Selection {
    /// Catalog item id (opaque, never empty)
    pub item_id: String,
    /// Display title, may be empty
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sku: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

/// Snapshot returned by `SessionManager::current`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CurrentSession {
    pub selection: Option<Selection>,
    pub queue_length: usize,
}
