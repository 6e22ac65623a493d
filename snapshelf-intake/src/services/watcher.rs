//! Watched-folder monitoring
//!
//! The notify callback only forwards paths onto a channel; the intake loop
//! drains that channel and hands each path to the session, which decides
//! whether it gets queued.

use notify::event::{CreateKind, ModifyKind, RenameMode};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::session::SessionManager;

#[derive(Debug, Error)]
pub enum WatchError {
    #[error("Not a directory: {0}")]
    NotADirectory(PathBuf),

    #[error("Watcher error: {0}")]
    Notify(#[from] notify::Error),
}

/// Event kinds that mean "a file showed up here"
///
/// Phones and sync tools often write to a temp name and rename into place,
/// so rename targets count as arrivals.
pub fn is_arrival(kind: &EventKind) -> bool {
    matches!(
        kind,
        EventKind::Create(CreateKind::File)
            | EventKind::Create(CreateKind::Any)
            | EventKind::Modify(ModifyKind::Name(RenameMode::To))
            | EventKind::Modify(ModifyKind::Name(RenameMode::Any))
    )
}

/// Recursive watch on one folder
///
/// Watching stops when this value is dropped.
pub struct FolderWatcher {
    _watcher: RecommendedWatcher,
}

impl FolderWatcher {
    /// Start watching `root`, sending every arrived path to `tx`
    pub fn start(root: &Path, tx: mpsc::UnboundedSender<PathBuf>) -> Result<Self, WatchError> {
        if !root.is_dir() {
            return Err(WatchError::NotADirectory(root.to_path_buf()));
        }

        let mut watcher = RecommendedWatcher::new(
            move |res: Result<Event, notify::Error>| match res {
                Ok(event) => {
                    if !is_arrival(&event.kind) {
                        return;
                    }
                    for path in event.paths {
                        // Receiver gone means shutdown is in progress
                        let _ = tx.send(path);
                    }
                }
                Err(err) => {
                    warn!(error = %err, "Folder watcher event error");
                }
            },
            notify::Config::default(),
        )?;

        watcher.watch(root, RecursiveMode::Recursive)?;
        info!(root = %root.display(), "Watching folder for new photos");

        Ok(Self { _watcher: watcher })
    }
}

/// Drain watcher paths into the session until cancelled or the channel closes
pub async fn run_intake_loop(
    session: Arc<SessionManager>,
    mut rx: mpsc::UnboundedReceiver<PathBuf>,
    cancel: CancellationToken,
) {
    info!("Photo intake loop started");

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                info!("Photo intake loop cancelled");
                break;
            }
            received = rx.recv() => {
                match received {
                    Some(path) => {
                        let queued = session.on_file_appeared(&path).await;
                        debug!(path = %path.display(), queued, "Watcher event handled");
                    }
                    None => {
                        info!("Watcher channel closed, intake loop exiting");
                        break;
                    }
                }
            }
        }
    }
}
