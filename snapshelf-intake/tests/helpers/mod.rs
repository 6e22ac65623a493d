//! Test Helper Utilities
//!
//! In-memory catalog and normalizer fakes plus a temp-folder session setup.

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use snapshelf_common::events::EventBus;
use snapshelf_intake::models::{CatalogItem, ImageUpload};
use snapshelf_intake::services::{
    CatalogClient, CatalogError, CleanupMode, ImageNormalizer, NormalizeError,
};
use snapshelf_intake::session::{WatchedRoot, DEFAULT_UPLOAD_TIMEOUT};
use snapshelf_intake::SessionManager;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::{oneshot, Notify};

/// Prefix the fake normalizer puts in front of its output
pub const NORMALIZED_PREFIX: &[u8] = b"normalized:";
/// Files whose bytes start with this fail to normalize
pub const CORRUPT_MARKER: &[u8] = b"corrupt";

/// One recorded `upload_images` call
#[derive(Debug, Clone)]
pub struct RecordedUpload {
    pub item_id: String,
    pub images: Vec<ImageUpload>,
}

impl RecordedUpload {
    pub fn filenames(&self) -> Vec<String> {
        self.images.iter().map(|i| i.filename.clone()).collect()
    }
}

/// Catalog that records calls and fails on demand
#[derive(Default)]
pub struct FakeCatalog {
    pub items: Mutex<Vec<CatalogItem>>,
    pub uploads: Mutex<Vec<RecordedUpload>>,
    pub published: Mutex<Vec<String>>,
    pub fail_uploads: AtomicBool,
    pub fail_publish: AtomicBool,
    /// Signalled when an upload call begins
    pub upload_started: Notify,
    upload_gate: Mutex<Option<oneshot::Receiver<()>>>,
}

impl FakeCatalog {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn with_items(items: Vec<CatalogItem>) -> Arc<Self> {
        let catalog = Self::default();
        *catalog.items.lock().unwrap() = items;
        Arc::new(catalog)
    }

    /// Make the next upload wait until the returned sender fires (or drops)
    pub fn hold_next_upload(&self) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        *self.upload_gate.lock().unwrap() = Some(rx);
        tx
    }

    pub fn set_fail_uploads(&self, fail: bool) {
        self.fail_uploads.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_publish(&self, fail: bool) {
        self.fail_publish.store(fail, Ordering::SeqCst);
    }

    pub fn uploads(&self) -> Vec<RecordedUpload> {
        self.uploads.lock().unwrap().clone()
    }

    pub fn published(&self) -> Vec<String> {
        self.published.lock().unwrap().clone()
    }
}

#[async_trait]
impl CatalogClient for FakeCatalog {
    async fn list_recent_items_missing_photos(
        &self,
        limit: usize,
        filter: Option<&str>,
    ) -> Result<Vec<CatalogItem>, CatalogError> {
        let needle = filter.map(str::to_lowercase);
        let items = self.items.lock().unwrap().clone();
        Ok(items
            .into_iter()
            .filter(|item| match &needle {
                Some(n) => item.title.to_lowercase().contains(n),
                None => true,
            })
            .take(limit)
            .collect())
    }

    async fn upload_images(
        &self,
        item_id: &str,
        images: &[ImageUpload],
    ) -> Result<(), CatalogError> {
        self.upload_started.notify_one();

        let gate = self.upload_gate.lock().unwrap().take();
        if let Some(gate) = gate {
            let _ = gate.await;
        }

        if self.fail_uploads.load(Ordering::SeqCst) {
            return Err(CatalogError::Network("connection refused".to_string()));
        }

        self.uploads.lock().unwrap().push(RecordedUpload {
            item_id: item_id.to_string(),
            images: images.to_vec(),
        });
        Ok(())
    }

    async fn publish(&self, item_id: &str) -> Result<(), CatalogError> {
        if self.fail_publish.load(Ordering::SeqCst) {
            return Err(CatalogError::Api(422, "cannot publish".to_string()));
        }
        self.published.lock().unwrap().push(item_id.to_string());
        Ok(())
    }
}

/// Prefixes its input, or fails for inputs starting with [`CORRUPT_MARKER`]
pub struct FakeNormalizer;

impl ImageNormalizer for FakeNormalizer {
    fn normalize(&self, bytes: &[u8]) -> Result<Vec<u8>, NormalizeError> {
        if bytes.starts_with(CORRUPT_MARKER) {
            return Err(NormalizeError::Decode("unrecognized image data".to_string()));
        }
        let mut out = NORMALIZED_PREFIX.to_vec();
        out.extend_from_slice(bytes);
        Ok(out)
    }
}

/// A session over a temp watched folder
pub struct TestSession {
    pub watch_dir: TempDir,
    pub archive_dir: Option<TempDir>,
    pub catalog: Arc<FakeCatalog>,
    pub event_bus: EventBus,
    pub session: Arc<SessionManager>,
}

impl TestSession {
    /// Delete mode
    pub fn new() -> Self {
        Self::build(false, DEFAULT_UPLOAD_TIMEOUT)
    }

    /// Archive mode, archive root in its own temp dir
    pub fn with_archive() -> Self {
        Self::build(true, DEFAULT_UPLOAD_TIMEOUT)
    }

    /// Delete mode with a short bound on catalog calls
    pub fn with_upload_timeout(timeout: Duration) -> Self {
        Self::build(false, timeout)
    }

    fn build(archive: bool, upload_timeout: Duration) -> Self {
        let watch_dir = tempfile::tempdir().unwrap();
        let archive_dir = archive.then(|| tempfile::tempdir().unwrap());
        let catalog = FakeCatalog::new();
        let event_bus = EventBus::new(100);

        let root = WatchedRoot::new(watch_dir.path()).unwrap();
        let cleanup = CleanupMode::from_archive_folder(
            archive_dir.as_ref().map(|d| d.path().to_path_buf()),
        );
        let session = SessionManager::new(
            root,
            catalog.clone(),
            Arc::new(FakeNormalizer),
            event_bus.clone(),
        )
        .with_cleanup_mode(cleanup)
        .with_upload_timeout(upload_timeout);

        Self {
            watch_dir,
            archive_dir,
            catalog,
            event_bus,
            session: Arc::new(session),
        }
    }

    /// Canonical watched root
    pub fn root(&self) -> &Path {
        self.session.watched_root().path()
    }

    /// Write a file under the watched root (creating subfolders)
    pub fn write_photo(&self, relative: &str, bytes: &[u8]) -> PathBuf {
        let path = self.root().join(relative);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(&path, bytes).unwrap();
        path
    }

    /// Write a file and report it as a watcher event
    pub async fn drop_photo(&self, relative: &str, bytes: &[u8]) -> bool {
        let path = self.write_photo(relative, bytes);
        self.session.on_file_appeared(&path).await
    }

    pub async fn select(&self, item_id: &str, title: &str) {
        self.session
            .select(item_id, Some(title.to_string()), None, None)
            .await
            .unwrap();
    }

    /// Relative paths currently queued, in order
    pub async fn queued(&self) -> Vec<String> {
        self.session
            .list_queued_for_preview()
            .await
            .into_iter()
            .map(|p| p.relative_path)
            .collect()
    }
}

pub fn catalog_item(id: &str, title: &str, day: u32) -> CatalogItem {
    CatalogItem {
        id: id.to_string(),
        title: title.to_string(),
        sku: None,
        created_at: Utc.with_ymd_and_hms(2024, 5, day, 12, 0, 0).unwrap(),
    }
}
