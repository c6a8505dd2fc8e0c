//! Application state management

use crate::{AppConfig, AppError, PinnedFolders};
use app_fs::{list_directory, Entity, FileOperations, FileSystem, VfsPath};
use parking_lot::RwLock;

/// Outcome of one item of a batch operation
#[derive(Debug)]
pub struct OperationResult {
    pub source: VfsPath,
    /// New location for copies and moves, `None` for deletes
    pub outcome: Result<Option<VfsPath>, AppError>,
}

impl OperationResult {
    pub fn is_ok(&self) -> bool {
        self.outcome.is_ok()
    }
}

/// Main application state
pub struct AppState {
    /// Application configuration
    pub config: RwLock<AppConfig>,

    /// Disk and archive file system
    pub fs: FileSystem,

    pinned: RwLock<PinnedFolders>,
}

impl AppState {
    /// Create a new application state
    pub fn new(config: AppConfig) -> Result<Self, AppError> {
        let fs = FileSystem::new(&config.vfs).map_err(|e| AppError::Init(e.to_string()))?;
        let pinned = PinnedFolders::from_config(&config.pinned_folders);

        Ok(Self {
            config: RwLock::new(config),
            fs,
            pinned: RwLock::new(pinned),
        })
    }

    /// Save the current configuration
    pub fn save_config(&self) -> anyhow::Result<()> {
        self.config.read().save()
    }

    /// Children of `folder`, filtered and sorted by the filer preferences
    pub fn list(&self, folder: &Entity) -> Result<Vec<Entity>, AppError> {
        let options = self.config.read().filer.list_options();
        Ok(list_directory(&self.fs, folder, &options)?)
    }

    pub fn pinned_paths(&self) -> Vec<VfsPath> {
        self.pinned.read().paths().to_vec()
    }

    /// Pinned folders that still exist, or the root folder
    pub fn pinned_folders(&self) -> Vec<Entity> {
        self.pinned.read().resolve(&self.fs)
    }

    pub fn pin(&self, folder: &Entity) -> Result<bool, AppError> {
        if !folder.is_folder() {
            return Err(AppError::Vfs(app_fs::VfsError::TypeMismatch(format!(
                "{} is not a folder",
                folder.path()
            ))));
        }
        let added = self.pinned.write().pin(folder.path().clone());
        self.sync_pins();
        Ok(added)
    }

    pub fn unpin(&self, path: &VfsPath) -> bool {
        let removed = self.pinned.write().unpin(path);
        self.sync_pins();
        removed
    }

    fn sync_pins(&self) {
        let paths = self.pinned.read().to_config();
        self.config.write().pinned_folders = paths;
    }

    fn relocate_pins(&self, from: &VfsPath, to: &VfsPath) {
        if self.pinned.write().relocate(from, to) > 0 {
            self.sync_pins();
        }
    }

    fn forget_pins(&self, removed: &VfsPath) {
        if self.pinned.write().forget(removed) > 0 {
            self.sync_pins();
        }
    }

    /// Rename one entity; pins below it follow
    pub fn rename(&self, target: &Entity, new_name: &str) -> Result<VfsPath, AppError> {
        let renamed = self.fs.rename(target, new_name)?;
        self.relocate_pins(target.path(), &renamed);
        Ok(renamed)
    }

    /// Copy every selected entity into `destination`. Failures do not stop the batch.
    pub fn copy_selection(&self, selection: &[Entity], destination: &Entity) -> Vec<OperationResult> {
        self.run_batch("copy", selection, |source| {
            Ok(Some(self.fs.copy(source, destination, None)?))
        })
    }

    /// Move every selected entity into `destination`; completed moves are not undone
    pub fn move_selection(&self, selection: &[Entity], destination: &Entity) -> Vec<OperationResult> {
        self.run_batch("move", selection, |source| {
            let moved = self.fs.move_to(source, destination)?;
            self.relocate_pins(source.path(), &moved);
            Ok(Some(moved))
        })
    }

    pub fn delete_selection(&self, selection: &[Entity]) -> Vec<OperationResult> {
        self.run_batch("delete", selection, |target| {
            self.fs.delete(target)?;
            self.forget_pins(target.path());
            Ok(None)
        })
    }

    fn run_batch<F>(&self, operation: &str, selection: &[Entity], mut apply: F) -> Vec<OperationResult>
    where
        F: FnMut(&Entity) -> Result<Option<VfsPath>, AppError>,
    {
        let results: Vec<OperationResult> = selection
            .iter()
            .map(|entity| {
                let outcome = apply(entity);
                if let Err(e) = &outcome {
                    tracing::warn!("Failed to {} {}: {}", operation, entity.path(), e);
                }
                OperationResult { source: entity.path().clone(), outcome }
            })
            .collect();

        let failed = results.iter().filter(|r| !r.is_ok()).count();
        tracing::info!(
            "Batch {}: {} succeeded, {} failed",
            operation,
            results.len() - failed,
            failed
        );
        results
    }
}
