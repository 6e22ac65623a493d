//! Disposal of uploaded originals
//!
//! After a successful upload each original is either deleted or moved to
//! `<archive_root>/<sanitized item title>/<original filename>`.

use std::io;
use std::path::{Path, PathBuf};

/// Longest archive folder name derived from an item title
pub const MAX_FOLDER_NAME_LEN: usize = 60;
/// Folder name used when the title sanitizes to nothing
pub const FALLBACK_FOLDER_NAME: &str = "untitled";

/// What happens to originals after upload
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CleanupMode {
    Delete,
    Archive { root: PathBuf },
}

impl CleanupMode {
    pub fn from_archive_folder(folder: Option<PathBuf>) -> Self {
        match folder {
            Some(root) => CleanupMode::Archive { root },
            None => CleanupMode::Delete,
        }
    }
}

/// Make an item title usable as a single path segment
///
/// Drops `< > : " / \ | ? *` and control characters, collapses whitespace,
/// trims, and caps the length.
pub fn sanitize_folder_name(title: &str) -> String {
    let cleaned: String = title
        .chars()
        .filter(|c| !matches!(c, '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*'))
        .filter(|c| !c.is_control() || c.is_whitespace())
        .collect();

    let collapsed = cleaned.split_whitespace().collect::<Vec<_>>().join(" ");
    let capped: String = collapsed.chars().take(MAX_FOLDER_NAME_LEN).collect();
    // Windows rejects trailing dots and spaces
    let trimmed = capped.trim().trim_end_matches('.').trim_end();

    if trimmed.is_empty() {
        FALLBACK_FOLDER_NAME.to_string()
    } else {
        trimmed.to_string()
    }
}

/// First free path for `file_name` in `dir`: `a.jpg`, `a (1).jpg`, `a (2).jpg`, ...
async fn unique_destination(dir: &Path, file_name: &str) -> io::Result<PathBuf> {
    let candidate = dir.join(file_name);
    if !tokio::fs::try_exists(&candidate).await? {
        return Ok(candidate);
    }

    let as_path = Path::new(file_name);
    let stem = as_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| file_name.to_string());
    let ext = as_path
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();

    let mut n: u32 = 1;
    loop {
        let candidate = dir.join(format!("{} ({}){}", stem, n, ext));
        if !tokio::fs::try_exists(&candidate).await? {
            return Ok(candidate);
        }
        n += 1;
    }
}

/// Move a file, copying across filesystems when rename is refused
async fn move_file(from: &Path, to: &Path) -> io::Result<()> {
    match tokio::fs::rename(from, to).await {
        Ok(()) => Ok(()),
        Err(rename_err) => {
            tracing::debug!(error = %rename_err, "Rename failed, falling back to copy");
            tokio::fs::copy(from, to).await?;
            tokio::fs::remove_file(from).await
        }
    }
}

/// Delete or archive one original
///
/// Returns the archive destination when the file was archived.
pub async fn dispose_original(
    mode: &CleanupMode,
    original: &Path,
    item_title: &str,
) -> io::Result<Option<PathBuf>> {
    match mode {
        CleanupMode::Delete => {
            tokio::fs::remove_file(original).await?;
            Ok(None)
        }
        CleanupMode::Archive { root } => {
            let folder = root.join(sanitize_folder_name(item_title));
            tokio::fs::create_dir_all(&folder).await?;

            let file_name = original
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .ok_or_else(|| {
                    io::Error::new(io::ErrorKind::InvalidInput, "original has no file name")
                })?;
            let destination = unique_destination(&folder, &file_name).await?;
            move_file(original, &destination).await?;
            Ok(Some(destination))
        }
    }
}
