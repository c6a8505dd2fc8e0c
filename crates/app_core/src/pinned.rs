//! Pinned folders
//!
//! A path-keyed list of folders the user wants at hand. Pins are plain paths,
//! so they survive restarts and point inside archives just as well as at disk
//! folders; they are re-resolved every time they are shown.

use app_fs::{Entity, FileSystem, VfsError, VfsPath};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PinnedFolders {
    paths: Vec<VfsPath>,
}

impl PinnedFolders {
    /// Build from persisted strings, dropping malformed and duplicate entries
    pub fn from_config(paths: &[String]) -> Self {
        let mut pins = Self::default();
        for raw in paths {
            match VfsPath::new(raw) {
                Ok(path) => {
                    pins.pin(path);
                }
                Err(e) => tracing::warn!("Ignoring pinned folder {:?}: {}", raw, e),
            }
        }
        pins
    }

    pub fn to_config(&self) -> Vec<String> {
        self.paths.iter().map(|p| p.to_string()).collect()
    }

    pub fn paths(&self) -> &[VfsPath] {
        &self.paths
    }

    pub fn is_pinned(&self, path: &VfsPath) -> bool {
        self.paths.contains(path)
    }

    /// Returns false if already pinned
    pub fn pin(&mut self, path: VfsPath) -> bool {
        if self.is_pinned(&path) {
            return false;
        }
        self.paths.push(path);
        true
    }

    pub fn unpin(&mut self, path: &VfsPath) -> bool {
        let before = self.paths.len();
        self.paths.retain(|p| p != path);
        self.paths.len() != before
    }

    /// Follow a rename or move of `from` (or of one of its ancestors) to `to`.
    /// Returns how many pins changed.
    pub fn relocate(&mut self, from: &VfsPath, to: &VfsPath) -> usize {
        let mut changed = 0;
        for pin in &mut self.paths {
            if let Some(moved) = pin.rebase(from, to) {
                *pin = moved;
                changed += 1;
            }
        }
        if changed > 0 {
            let mut seen = Vec::with_capacity(self.paths.len());
            self.paths.retain(|p| {
                if seen.contains(p) {
                    false
                } else {
                    seen.push(p.clone());
                    true
                }
            });
        }
        changed
    }

    /// Drop pins at or below a deleted path. Returns how many were dropped.
    pub fn forget(&mut self, removed: &VfsPath) -> usize {
        let before = self.paths.len();
        self.paths.retain(|p| !p.starts_with(removed));
        before - self.paths.len()
    }

    /// Pinned folders that still exist, in pin order.
    /// Falls back to the root folder when none do.
    pub fn resolve(&self, fs: &FileSystem) -> Vec<Entity> {
        let mut folders = Vec::new();
        for path in &self.paths {
            match fs.resolve(path) {
                Ok(entity) if entity.is_folder() => folders.push(entity),
                Ok(_) => tracing::debug!("Pinned path is no longer a folder: {}", path),
                Err(VfsError::PathNotFound(_)) => tracing::debug!("Pinned folder is gone: {}", path),
                Err(e) => tracing::warn!("Cannot resolve pinned folder {}: {}", path, e),
            }
        }
        if folders.is_empty() {
            folders.push(fs.root());
        }
        folders
    }
}
