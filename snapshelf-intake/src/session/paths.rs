//! Path safety helpers for the watched folder
//!
//! Queue entries are compared by their normalized form: absolute (relative
//! paths are taken against the watched root), `.`/`..` folded lexically,
//! then canonicalized when the file exists so symlinks and case-insensitive
//! filesystems don't produce duplicates.

use std::io;
use std::path::{Component, Path, PathBuf};

use crate::error::{SessionError, SessionResult};

/// Extensions accepted from the watcher (compared case-insensitively)
pub const RECOGNIZED_EXTENSIONS: [&str; 4] = ["jpg", "jpeg", "png", "heic"];

/// Whether the path has a recognized photo extension
pub fn is_recognized_image(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            RECOGNIZED_EXTENSIONS
                .iter()
                .any(|known| ext.eq_ignore_ascii_case(known))
        })
        .unwrap_or(false)
}

/// Fold `.` and `..` without touching the filesystem
///
/// `..` never climbs above the root or prefix component.
pub fn normalize_lexically(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Prefix(_) | Component::RootDir => out.push(component.as_os_str()),
            Component::CurDir => {}
            Component::ParentDir => {
                let can_pop = matches!(out.components().next_back(), Some(Component::Normal(_)));
                if can_pop {
                    out.pop();
                } else if !out.has_root() {
                    out.push("..");
                }
            }
            Component::Normal(part) => out.push(part),
        }
    }
    out
}

/// The folder tree all queue entries must live under
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchedRoot {
    root: PathBuf,
}

impl WatchedRoot {
    /// Canonicalize an existing directory
    pub fn new(path: &Path) -> io::Result<Self> {
        let root = path.canonicalize()?;
        if !root.is_dir() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("{} is not a directory", root.display()),
            ));
        }
        Ok(Self { root })
    }

    pub fn path(&self) -> &Path {
        &self.root
    }

    /// Normalized absolute form of `path`
    pub fn normalize(&self, path: &Path) -> PathBuf {
        let absolute = if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        };
        let lexical = normalize_lexically(&absolute);
        lexical.canonicalize().unwrap_or(lexical)
    }

    /// Strictly inside the root (the root itself does not count)
    pub fn contains(&self, normalized: &Path) -> bool {
        normalized != self.root && normalized.starts_with(&self.root)
    }

    /// Resolve a front-door relative path, rejecting anything outside the root
    pub fn resolve_relative(&self, relative: &str) -> SessionResult<PathBuf> {
        let trimmed = relative.trim();
        if trimmed.is_empty() {
            return Err(SessionError::InvalidPath("empty path".to_string()));
        }
        if trimmed.contains('\0') {
            return Err(SessionError::InvalidPath("path contains NUL".to_string()));
        }

        let candidate = Path::new(trimmed);
        if candidate.is_absolute() || candidate.has_root() {
            return Err(SessionError::InvalidPath(format!(
                "{} is not a relative path",
                trimmed
            )));
        }

        let lexical = normalize_lexically(&self.root.join(candidate));
        if !self.contains(&lexical) {
            return Err(SessionError::InvalidPath(format!(
                "{} escapes the watched folder",
                trimmed
            )));
        }

        // A symlink inside the root may still point outside it
        match lexical.canonicalize() {
            Ok(real) if !self.contains(&real) => Err(SessionError::InvalidPath(format!(
                "{} resolves outside the watched folder",
                trimmed
            ))),
            Ok(real) => Ok(real),
            Err(_) => Ok(lexical),
        }
    }

    /// `/`-separated path relative to the root, if the path is under it
    pub fn relative_display(&self, path: &Path) -> Option<String> {
        let relative = path.strip_prefix(&self.root).ok()?;
        let parts: Vec<String> = relative
            .components()
            .map(|c| match c {
                Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
                _ => None,
            })
            .collect::<Option<Vec<_>>>()?;
        if parts.is_empty() {
            None
        } else {
            Some(parts.join("/"))
        }
    }
}
