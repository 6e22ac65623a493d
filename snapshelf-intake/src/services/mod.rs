//! Collaborators of the intake session
//!
//! Each service sits behind a narrow seam so the session can be driven by
//! fakes in tests.

pub mod archiver;
pub mod catalog_client;
pub mod normalizer;
pub mod watcher;

pub use archiver::{dispose_original, sanitize_folder_name, CleanupMode};
pub use catalog_client::{CatalogClient, CatalogError, HttpCatalogClient};
pub use normalizer::{ImageNormalizer, NormalizeError, SquareCropNormalizer};
pub use watcher::{run_intake_loop, FolderWatcher, WatchError};
