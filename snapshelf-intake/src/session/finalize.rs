//! Finalize pipeline: normalize → upload → publish → dispose → clear
//!
//! Only the upload decides success. Publish and disposal failures become
//! [`FinalizeWarning`]s. Any failure up to and including the upload leaves
//! the selection and queue exactly as they were so the user can retry.

use chrono::Utc;
use futures::stream::{self, StreamExt};
use snapshelf_common::events::IntakeEvent;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use super::SessionManager;
use crate::error::{SessionError, SessionResult};
use crate::models::{FinalizeOutcome, FinalizeWarning, ImageUpload, Selection};
use crate::services::{dispose_original, CatalogError, ImageNormalizer};

/// Selection and queue as they were when finalize started
#[derive(Debug, Clone)]
struct FinalizeSnapshot {
    selection: Selection,
    files: Vec<PathBuf>,
    generation: u64,
}

/// Holds the in-progress marker for one generation
///
/// Released on drop, including when the finalize future is cancelled.
struct FinalizeGuard<'a> {
    marker: &'a AtomicU64,
    generation: u64,
}

impl Drop for FinalizeGuard<'_> {
    fn drop(&mut self) {
        // A newer selection may already own the marker
        let _ = self.marker.compare_exchange(
            self.generation,
            IDLE,
            Ordering::AcqRel,
            Ordering::Acquire,
        );
    }
}

/// Marker value when no finalize runs; generations start at 1 once selected
const IDLE: u64 = 0;

/// One queued file after step 2
enum Prepared {
    Ready {
        path: PathBuf,
        upload: ImageUpload,
        warning: Option<FinalizeWarning>,
    },
    Missing {
        label: String,
    },
}

fn file_name_of(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// `IMG_1.png` normalized to JPEG uploads as `IMG_1.jpg`
fn normalized_file_name(original: &str, extension: &str) -> String {
    Path::new(original)
        .with_extension(extension)
        .to_string_lossy()
        .into_owned()
}

/// Read, normalize (off the async runtime) and fall back to raw bytes
async fn prepare_one(
    normalizer: Arc<dyn ImageNormalizer>,
    path: PathBuf,
    label: String,
) -> SessionResult<Prepared> {
    let raw = match tokio::fs::read(&path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Ok(Prepared::Missing { label });
        }
        Err(e) => return Err(SessionError::Io(e)),
    };

    let original_name = file_name_of(&path);
    let extension = normalizer.output_extension();
    let job = tokio::task::spawn_blocking(move || {
        let result = normalizer.normalize(&raw);
        (raw, result)
    })
    .await;

    let prepared = match job {
        Ok((_, Ok(normalized))) => Prepared::Ready {
            upload: ImageUpload {
                filename: normalized_file_name(&original_name, extension),
                bytes: normalized,
            },
            warning: None,
            path,
        },
        Ok((raw, Err(e))) => {
            warn!(path = %label, error = %e, "Normalization failed, uploading original");
            Prepared::Ready {
                upload: ImageUpload {
                    filename: original_name,
                    bytes: raw,
                },
                warning: Some(FinalizeWarning::NormalizationFallback {
                    file: label,
                    reason: e.to_string(),
                }),
                path,
            }
        }
        Err(join_err) => {
            // The raw bytes went down with the task; read them again
            warn!(path = %label, error = %join_err, "Normalizer task failed, uploading original");
            let raw = tokio::fs::read(&path).await?;
            Prepared::Ready {
                upload: ImageUpload {
                    filename: original_name,
                    bytes: raw,
                },
                warning: Some(FinalizeWarning::NormalizationFallback {
                    file: label,
                    reason: join_err.to_string(),
                }),
                path,
            }
        }
    };
    Ok(prepared)
}

impl SessionManager {
    /// Normalize, upload, publish and dispose of the queued photos
    ///
    /// Succeeds once the upload succeeds. On success the selection is
    /// cleared, unless photos for the same item arrived during the upload,
    /// in which case they stay queued and a `LateArrivals` warning is added.
    pub async fn finalize(&self) -> SessionResult<FinalizeOutcome> {
        let (snapshot, guard) = self.begin_finalize().await?;
        let item_id = snapshot.selection.item_id.clone();

        info!(item_id = %item_id, files = snapshot.files.len(), "Finalize started");
        self.event_bus.emit_lossy(IntakeEvent::FinalizeStarted {
            item_id: item_id.clone(),
            file_count: snapshot.files.len(),
            timestamp: Utc::now(),
        });

        let mut warnings = Vec::new();
        let uploaded = match self.prepare_and_upload(&snapshot, &mut warnings).await {
            Ok(uploaded) => uploaded,
            Err(e) => {
                error!(item_id = %item_id, error = %e, "Finalize failed, queue kept for retry");
                self.event_bus.emit_lossy(IntakeEvent::FinalizeFailed {
                    item_id,
                    error: e.to_string(),
                    timestamp: Utc::now(),
                });
                return Err(e);
            }
        };

        let published = match self.with_timeout(self.catalog.publish(&item_id)).await {
            Ok(()) => true,
            Err(e) => {
                warn!(item_id = %item_id, error = %e, "Images attached but publish failed");
                warnings.push(FinalizeWarning::PublishFailed {
                    reason: e.to_string(),
                });
                false
            }
        };

        for path in &uploaded {
            match dispose_original(&self.cleanup, path, &snapshot.selection.title).await {
                Ok(Some(archived)) => {
                    debug!(from = %path.display(), to = %archived.display(), "Original archived")
                }
                Ok(None) => debug!(path = %path.display(), "Original deleted"),
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Failed to dispose of original");
                    warnings.push(FinalizeWarning::CleanupFailed {
                        file: self.display_label(path),
                        reason: e.to_string(),
                    });
                }
            }
        }

        self.complete_finalize(&snapshot, &mut warnings).await;
        drop(guard);

        let outcome = FinalizeOutcome {
            item_id: item_id.clone(),
            uploaded: uploaded.len(),
            published,
            warnings,
        };

        info!(
            item_id = %item_id,
            uploaded = outcome.uploaded,
            published,
            warnings = outcome.warnings.len(),
            "Finalize completed"
        );
        self.event_bus.emit_lossy(IntakeEvent::FinalizeCompleted {
            item_id,
            uploaded: outcome.uploaded,
            warnings: outcome.warnings.iter().map(ToString::to_string).collect(),
            timestamp: Utc::now(),
        });

        Ok(outcome)
    }

    /// Step 1: validate and snapshot under the lock
    async fn begin_finalize(&self) -> SessionResult<(FinalizeSnapshot, FinalizeGuard<'_>)> {
        let state = self.state.lock().await;

        let selection = state
            .selection
            .clone()
            .ok_or_else(|| SessionError::InvalidState("no selection".to_string()))?;
        if state.queue.is_empty() {
            return Err(SessionError::InvalidState("no files".to_string()));
        }
        // Checked and set while the state lock is held
        if self.finalizing.load(Ordering::Acquire) == state.generation {
            return Err(SessionError::InvalidState(
                "finalize already in progress".to_string(),
            ));
        }
        self.finalizing.store(state.generation, Ordering::Release);

        let guard = FinalizeGuard {
            marker: &self.finalizing,
            generation: state.generation,
        };
        let snapshot = FinalizeSnapshot {
            selection,
            files: state.queue.entries().to_vec(),
            generation: state.generation,
        };
        Ok((snapshot, guard))
    }

    /// Steps 2 and 3; returns the originals that were uploaded
    async fn prepare_and_upload(
        &self,
        snapshot: &FinalizeSnapshot,
        warnings: &mut Vec<FinalizeWarning>,
    ) -> SessionResult<Vec<PathBuf>> {
        // `buffered` keeps queue order while bounding parallelism
        let prepared: Vec<SessionResult<Prepared>> = stream::iter(snapshot.files.iter().cloned())
            .map(|path| {
                let label = self.display_label(&path);
                prepare_one(self.normalizer.clone(), path, label)
            })
            .buffered(self.normalize_concurrency)
            .collect()
            .await;

        let mut uploads = Vec::with_capacity(prepared.len());
        let mut originals = Vec::with_capacity(prepared.len());
        for result in prepared {
            match result? {
                Prepared::Ready {
                    path,
                    upload,
                    warning,
                } => {
                    warnings.extend(warning);
                    uploads.push(upload);
                    originals.push(path);
                }
                Prepared::Missing { label } => {
                    warn!(path = %label, "Queued photo vanished before upload, skipping");
                    warnings.push(FinalizeWarning::MissingFile { file: label });
                }
            }
        }

        if uploads.is_empty() {
            return Err(SessionError::InvalidState(
                "no files: every queued photo is missing on disk".to_string(),
            ));
        }

        let item_id = &snapshot.selection.item_id;
        self.with_timeout(self.catalog.upload_images(item_id, &uploads))
            .await?;

        info!(item_id = %item_id, count = uploads.len(), "Upload succeeded");
        Ok(originals)
    }

    /// Bound a catalog call by the configured timeout
    async fn with_timeout<F>(&self, call: F) -> Result<(), CatalogError>
    where
        F: Future<Output = Result<(), CatalogError>>,
    {
        tokio::time::timeout(self.upload_timeout, call)
            .await
            .map_err(|_| CatalogError::Timeout(self.upload_timeout))?
    }

    /// Step 6: clear under the lock, unless the selection moved on
    async fn complete_finalize(
        &self,
        snapshot: &FinalizeSnapshot,
        warnings: &mut Vec<FinalizeWarning>,
    ) {
        let cleared = {
            let mut state = self.state.lock().await;
            if state.generation != snapshot.generation {
                debug!(
                    item_id = %snapshot.selection.item_id,
                    "Selection changed during finalize, leaving the new session alone"
                );
                return;
            }

            state.queue.remove_all(&snapshot.files);
            if state.queue.is_empty() {
                state.replace_selection(None);
                true
            } else {
                let count = state.queue.len();
                info!(
                    item_id = %snapshot.selection.item_id,
                    count,
                    "Photos arrived during upload, keeping them queued"
                );
                warnings.push(FinalizeWarning::LateArrivals { count });
                false
            }
        };

        if cleared {
            self.event_bus.emit_lossy(IntakeEvent::SelectionChanged {
                item_id: None,
                title: String::new(),
                timestamp: Utc::now(),
            });
        }
    }
}
