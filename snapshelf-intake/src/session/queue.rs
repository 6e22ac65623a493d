//! Ordered, duplicate-free photo queue

use std::path::{Path, PathBuf};

/// Photo queue for the current selection
///
/// Entries are normalized absolute paths; insertion order is gallery order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PhotoQueue {
    entries: Vec<PathBuf>,
}

impl PhotoQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.entries.iter().any(|p| p == path)
    }

    pub fn entries(&self) -> &[PathBuf] {
        &self.entries
    }

    /// Append unless already present; returns whether it was added
    pub fn push_unique(&mut self, path: PathBuf) -> bool {
        if self.contains(&path) {
            return false;
        }
        self.entries.push(path);
        true
    }

    /// Remove one entry; returns whether it was present
    pub fn remove(&mut self, path: &Path) -> bool {
        let before = self.entries.len();
        self.entries.retain(|p| p != path);
        self.entries.len() != before
    }

    /// Drop every entry in `done`, keeping the order of the rest
    pub fn remove_all(&mut self, done: &[PathBuf]) {
        self.entries.retain(|p| !done.contains(p));
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Put the mentioned entries first, in the given order
    ///
    /// Entries not mentioned follow in their previous relative order.
    /// Paths that are not queued are ignored and repeats count once. Returns
    /// the number of matched paths; when that is zero the queue is untouched.
    pub fn reorder(&mut self, ordered: &[PathBuf]) -> usize {
        let mut reordered: Vec<PathBuf> = Vec::with_capacity(self.entries.len());
        for path in ordered {
            if self.contains(path) && !reordered.contains(path) {
                reordered.push(path.clone());
            }
        }

        let matched = reordered.len();
        if matched == 0 {
            return 0;
        }

        for path in &self.entries {
            if !reordered.contains(path) {
                reordered.push(path.clone());
            }
        }
        self.entries = reordered;
        matched
    }
}
