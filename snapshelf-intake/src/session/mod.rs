//! Photo-to-item session manager
//!
//! Owns the single active [`Selection`] and its [`PhotoQueue`]. Both live
//! behind one mutex so every mutation (select, append, remove, reorder and
//! the finalize clear step) is serialized against the others. Finalize only
//! takes the lock to snapshot and to clear; normalization and upload run
//! unlocked.
//!
//! One `SessionManager` exists per watched folder and is shared as `Arc`.

pub mod finalize;
pub mod paths;
pub mod queue;

pub use paths::{is_recognized_image, WatchedRoot};
pub use queue::PhotoQueue;

use chrono::{DateTime, Utc};
use snapshelf_common::events::{EventBus, IntakeEvent};
use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicU64;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::error::{SessionError, SessionResult};
use crate::models::{CurrentSession, QueuedPhoto, Selection};
use crate::services::{CatalogClient, CleanupMode, ImageNormalizer};

/// Upper bound on one finalize upload (or publish) call
pub const DEFAULT_UPLOAD_TIMEOUT: Duration = Duration::from_secs(300);
pub const DEFAULT_NORMALIZE_CONCURRENCY: usize = 4;

/// Route prefix serving queued files for preview
pub const PREVIEW_ROUTE: &str = "/preview";

/// Selection + queue, guarded as one unit
#[derive(Debug, Default)]
struct SessionState {
    selection: Option<Selection>,
    queue: PhotoQueue,
    /// Bumped whenever the selection is replaced or cleared
    generation: u64,
}

impl SessionState {
    fn replace_selection(&mut self, selection: Option<Selection>) {
        self.selection = selection;
        self.queue.clear();
        self.generation += 1;
    }

    fn item_id(&self) -> String {
        self.selection
            .as_ref()
            .map(|s| s.item_id.clone())
            .unwrap_or_default()
    }
}

/// Session manager for one watched folder
pub struct SessionManager {
    root: WatchedRoot,
    state: Mutex<SessionState>,
    /// Generation a finalize is running for; 0 when idle
    finalizing: AtomicU64,
    catalog: Arc<dyn CatalogClient>,
    normalizer: Arc<dyn ImageNormalizer>,
    cleanup: CleanupMode,
    upload_timeout: Duration,
    normalize_concurrency: usize,
    event_bus: EventBus,
}

impl SessionManager {
    pub fn new(
        root: WatchedRoot,
        catalog: Arc<dyn CatalogClient>,
        normalizer: Arc<dyn ImageNormalizer>,
        event_bus: EventBus,
    ) -> Self {
        Self {
            root,
            state: Mutex::new(SessionState::default()),
            finalizing: AtomicU64::new(0),
            catalog,
            normalizer,
            cleanup: CleanupMode::Delete,
            upload_timeout: DEFAULT_UPLOAD_TIMEOUT,
            normalize_concurrency: DEFAULT_NORMALIZE_CONCURRENCY,
            event_bus,
        }
    }

    pub fn with_cleanup_mode(mut self, cleanup: CleanupMode) -> Self {
        self.cleanup = cleanup;
        self
    }

    pub fn with_upload_timeout(mut self, timeout: Duration) -> Self {
        self.upload_timeout = timeout;
        self
    }

    pub fn with_normalize_concurrency(mut self, concurrency: usize) -> Self {
        self.normalize_concurrency = concurrency.max(1);
        self
    }

    pub fn watched_root(&self) -> &WatchedRoot {
        &self.root
    }

    /// Make `item_id` the target for incoming photos
    ///
    /// Always empties the queue. Photos queued for a previous selection stay
    /// on disk untouched. A finalize already running keeps working on its
    /// own snapshot.
    pub async fn select(
        &self,
        item_id: &str,
        title: Option<String>,
        sku: Option<String>,
        created_at: Option<DateTime<Utc>>,
    ) -> SessionResult<Selection> {
        let item_id = item_id.trim();
        if item_id.is_empty() {
            return Err(SessionError::InvalidRequest("item id is required".to_string()));
        }

        let selection = Selection {
            item_id: item_id.to_string(),
            title: title.map(|t| t.trim().to_string()).unwrap_or_default(),
            sku: sku.map(|s| s.trim().to_string()).filter(|s| !s.is_empty()),
            created_at,
        };

        let orphaned = {
            let mut state = self.state.lock().await;
            let orphaned = state.queue.len();
            state.replace_selection(Some(selection.clone()));
            orphaned
        };

        if orphaned > 0 {
            info!(orphaned, "Previous queue abandoned, files left on disk");
        }
        info!(item_id = %selection.item_id, title = %selection.title, "Item selected");

        self.event_bus.emit_lossy(IntakeEvent::SelectionChanged {
            item_id: Some(selection.item_id.clone()),
            title: selection.title.clone(),
            timestamp: Utc::now(),
        });

        Ok(selection)
    }

    /// Drop the selection and its queue (files stay on disk)
    pub async fn clear_selection(&self) {
        let previous = {
            let mut state = self.state.lock().await;
            let previous = state.selection.take();
            state.replace_selection(None);
            previous
        };

        if let Some(previous) = previous {
            info!(item_id = %previous.item_id, "Selection cleared");
            self.event_bus.emit_lossy(IntakeEvent::SelectionChanged {
                item_id: None,
                title: String::new(),
                timestamp: Utc::now(),
            });
        }
    }

    pub async fn current(&self) -> CurrentSession {
        let state = self.state.lock().await;
        CurrentSession {
            selection: state.selection.clone(),
            queue_length: state.queue.len(),
        }
    }

    /// Watcher callback: queue `path` for the current selection
    ///
    /// Ignored (returns false) for unrecognized extensions, paths outside the
    /// watched folder, files that are already gone, duplicates, and when
    /// nothing is selected. Photos taken before a selection are never queued
    /// retroactively.
    pub async fn on_file_appeared(&self, path: &Path) -> bool {
        if !is_recognized_image(path) {
            debug!(path = %path.display(), "Ignoring non-photo file");
            return false;
        }

        let normalized = self.root.normalize(path);
        if !self.root.contains(&normalized) {
            warn!(path = %path.display(), "Ignoring file outside the watched folder");
            return false;
        }

        let is_file = tokio::fs::metadata(&normalized)
            .await
            .map(|m| m.is_file())
            .unwrap_or(false);
        if !is_file {
            debug!(path = %normalized.display(), "Ignoring event for a file that is gone");
            return false;
        }

        let (item_id, queue_length) = {
            let mut state = self.state.lock().await;
            let Some(item_id) = state.selection.as_ref().map(|s| s.item_id.clone()) else {
                debug!(path = %normalized.display(), "No item selected, photo left untracked");
                return false;
            };
            if !state.queue.push_unique(normalized.clone()) {
                debug!(path = %normalized.display(), "Duplicate watcher event");
                return false;
            }
            (item_id, state.queue.len())
        };

        let relative_path = self.display_label(&normalized);
        info!(item_id = %item_id, path = %relative_path, queue_length, "Photo queued");

        self.event_bus.emit_lossy(IntakeEvent::PhotoQueued {
            item_id,
            relative_path,
            queue_length,
            timestamp: Utc::now(),
        });
        true
    }

    /// Queue in order, as preview entries
    ///
    /// Entries whose file vanished are skipped; the rest keep their order.
    pub async fn list_queued_for_preview(&self) -> Vec<QueuedPhoto> {
        let entries = {
            let state = self.state.lock().await;
            state.queue.entries().to_vec()
        };

        let mut photos = Vec::with_capacity(entries.len());
        for path in entries {
            if !tokio::fs::try_exists(&path).await.unwrap_or(false) {
                warn!(path = %path.display(), "Queued photo is missing on disk, hidden from preview");
                continue;
            }
            photos.push(self.preview_entry(&path));
        }
        photos
    }

    /// Absolute path of a queued photo, for serving previews
    ///
    /// Files in the watched folder that are not queued are not exposed.
    pub async fn queued_file(&self, relative_path: &str) -> SessionResult<PathBuf> {
        let path = self.root.resolve_relative(relative_path)?;
        let state = self.state.lock().await;
        if state.queue.contains(&path) {
            Ok(path)
        } else {
            Err(SessionError::NotFound(format!(
                "{} is not queued",
                relative_path
            )))
        }
    }

    /// Remove a queued photo and delete its file
    ///
    /// `NotFound` when the path is not queued; the file is then left alone.
    /// Deletion failures after the entry is gone are only logged.
    pub async fn remove_photo(&self, relative_path: &str) -> SessionResult<()> {
        let path = self.root.resolve_relative(relative_path)?;

        let (item_id, queue_length) = {
            let mut state = self.state.lock().await;
            if !state.queue.remove(&path) {
                return Err(SessionError::NotFound(format!(
                    "{} is not queued",
                    relative_path
                )));
            }
            (state.item_id(), state.queue.len())
        };

        match tokio::fs::remove_file(&path).await {
            Ok(()) => debug!(path = %path.display(), "Removed photo deleted from disk"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(path = %path.display(), error = %e, "Failed to delete removed photo"),
        }

        let relative_path = self.display_label(&path);
        info!(item_id = %item_id, path = %relative_path, queue_length, "Photo removed");
        self.event_bus.emit_lossy(IntakeEvent::PhotoRemoved {
            item_id,
            relative_path,
            queue_length,
            timestamp: Utc::now(),
        });
        Ok(())
    }

    /// Apply a full or partial ordering of relative paths
    ///
    /// Returns how many of the supplied paths matched queued photos.
    /// `InvalidRequest` when none do; the queue is then unchanged.
    pub async fn reorder(&self, ordered_relative_paths: &[String]) -> SessionResult<usize> {
        if ordered_relative_paths.is_empty() {
            return Err(SessionError::InvalidRequest("ordering is empty".to_string()));
        }

        let resolved: Vec<PathBuf> = ordered_relative_paths
            .iter()
            .filter_map(|relative| match self.root.resolve_relative(relative) {
                Ok(path) => Some(path),
                Err(e) => {
                    debug!(path = %relative, error = %e, "Skipping unresolvable path in ordering");
                    None
                }
            })
            .collect();

        let (item_id, matched, queue_length) = {
            let mut state = self.state.lock().await;
            let matched = state.queue.reorder(&resolved);
            if matched == 0 {
                return Err(SessionError::InvalidRequest(
                    "none of the supplied paths are queued".to_string(),
                ));
            }
            (state.item_id(), matched, state.queue.len())
        };

        if matched < ordered_relative_paths.len() {
            debug!(
                supplied = ordered_relative_paths.len(),
                matched, "Ordering mentioned paths that are not queued"
            );
        }
        info!(item_id = %item_id, matched, queue_length, "Queue reordered");

        self.event_bus.emit_lossy(IntakeEvent::QueueReordered {
            item_id,
            queue_length,
            timestamp: Utc::now(),
        });
        Ok(matched)
    }

    /// Relative path if possible, else the file name, else the full path
    fn display_label(&self, path: &Path) -> String {
        self.root
            .relative_display(path)
            .or_else(|| path.file_name().map(|n| n.to_string_lossy().into_owned()))
            .unwrap_or_else(|| path.display().to_string())
    }

    fn preview_entry(&self, path: &Path) -> QueuedPhoto {
        let display_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());

        match self.root.relative_display(path) {
            Some(relative_path) => {
                let encoded: Vec<_> = relative_path.split('/').map(urlencoding::encode).collect();
                QueuedPhoto {
                    display_name,
                    preview_url: Some(format!("{}/{}", PREVIEW_ROUTE, encoded.join("/"))),
                    relative_path,
                }
            }
            None => {
                warn!(path = %path.display(), "Queued photo is not under the watched folder");
                QueuedPhoto {
                    relative_path: display_name.clone(),
                    display_name,
                    preview_url: None,
                }
            }
        }
    }
}
