//! File operations module
//! Provides copy, move, rename, delete and create across disk and archives

use crate::engine::{is_cross_device, ArchiveEngine};
use crate::entity::{Archive, Drive, Entity, RootFolder, Statistics};
use crate::format::PendingEntry;
use crate::temp::TempStore;
use crate::{Result, VfsError, VfsPath};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// A mount point shown under the root folder
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DriveConfig {
    pub path: PathBuf,
    pub label: String,
}

/// Virtual file system settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VfsConfig {
    /// Where archive entries are extracted and rewrites are staged
    pub temp_dir: Option<PathBuf>,

    /// Drives listed by the root folder
    pub drives: Vec<DriveConfig>,
}

impl Default for VfsConfig {
    fn default() -> Self {
        let home = dirs_next::home_dir().unwrap_or_else(|| PathBuf::from("/"));
        Self {
            temp_dir: None,
            drives: vec![DriveConfig {
                path: home,
                label: "Internal storage".to_string(),
            }],
        }
    }
}

/// File operations trait
pub trait FileOperations: Send + Sync {
    /// Copy `source` into the folder `destination`, optionally under a new name
    fn copy(&self, source: &Entity, destination: &Entity, new_name: Option<&str>) -> Result<VfsPath>;

    /// Move `source` into the folder `destination`
    fn move_to(&self, source: &Entity, destination: &Entity) -> Result<VfsPath>;

    /// Rename in place
    fn rename(&self, target: &Entity, new_name: &str) -> Result<VfsPath>;

    /// Delete a file or directory (directories recursively)
    fn delete(&self, target: &Entity) -> Result<()>;

    /// Create an empty directory in `parent`
    fn create_directory(&self, parent: &Entity, name: &str) -> Result<VfsPath>;

    /// Create an empty file in `parent`
    fn create_file(&self, parent: &Entity, name: &str) -> Result<VfsPath>;
}

/// Where an existing entity is stored
enum Location {
    Disk(PathBuf),
    Archive { archive: Archive, relative: String },
}

/// Where new children of a folder are written
enum Target {
    Disk(PathBuf),
    Archive { archive: Archive, base: String },
}

fn join_relative(base: &str, name: &str) -> String {
    if base.is_empty() {
        name.to_string()
    } else {
        format!("{}/{}", base, name)
    }
}

/// Reject names that are not a single path segment
fn check_name(name: &str) -> Result<()> {
    if name.is_empty() || name == "." || name == ".." || name.contains('/') || name.contains('\0') {
        return Err(VfsError::InvalidName(name.to_string()));
    }
    Ok(())
}

/// Virtual file system: path resolution plus operations across archive boundaries
#[derive(Debug, Clone)]
pub struct FileSystem {
    engine: ArchiveEngine,
    drives: Vec<Drive>,
}

impl FileSystem {
    pub fn new(config: &VfsConfig) -> Result<Self> {
        let temp = config
            .temp_dir
            .as_ref()
            .map(TempStore::new)
            .unwrap_or_default();

        let drives = config
            .drives
            .iter()
            .map(|d| Ok(Drive::new(VfsPath::from_os(&d.path)?, d.label.clone())))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            engine: ArchiveEngine::new(temp),
            drives,
        })
    }

    pub fn engine(&self) -> &ArchiveEngine {
        &self.engine
    }

    pub fn root(&self) -> Entity {
        Entity::Root(RootFolder::new())
    }

    /// Entity at `path`: the root folder, a drive, a disk entity or an archive entry
    pub fn resolve(&self, path: &VfsPath) -> Result<Entity> {
        if path.is_root() {
            return Ok(self.root());
        }
        if let Some(drive) = self.drives.iter().find(|d| d.path() == path) {
            return Ok(Entity::Drive(drive.clone()));
        }
        self.engine.resolve(path)
    }

    pub fn exists(&self, path: &VfsPath) -> Result<bool> {
        match self.resolve(path) {
            Ok(_) => Ok(true),
            Err(VfsError::PathNotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Folder containing `entity`. Drives sit under the root folder, which has no parent.
    pub fn parent_folder(&self, entity: &Entity) -> Result<Option<Entity>> {
        match entity {
            Entity::Root(_) => Ok(None),
            Entity::Drive(_) => Ok(Some(self.root())),
            _ => match entity.path().parent() {
                Some(parent) => self.resolve(&parent).map(Some),
                None => Ok(Some(self.root())),
            },
        }
    }

    pub fn parent_archive_of(&self, path: &VfsPath) -> Result<Option<Archive>> {
        self.engine.parent_archive_of(path)
    }

    /// Children of a folder; a fresh listing on every call
    pub fn files(&self, folder: &Entity) -> Result<Vec<Entity>> {
        match folder {
            Entity::Root(_) => Ok(self.drives.iter().cloned().map(Entity::Drive).collect()),
            other => self.engine.children(other),
        }
    }

    /// Recursive size and counts; nested archives count as files
    pub fn contents_statistics(&self, folder: &Entity) -> Result<Statistics> {
        let mut stats = Statistics::default();
        for child in self.files(folder)? {
            match &child {
                Entity::File(_) | Entity::Archive(_) => {
                    stats.files += 1;
                    stats.total_size += child.size().unwrap_or(0);
                }
                Entity::Directory(_) | Entity::Drive(_) | Entity::Root(_) => {
                    stats.directories += 1;
                    let nested = self.contents_statistics(&child)?;
                    stats.files += nested.files;
                    stats.directories += nested.directories;
                    stats.total_size += nested.total_size;
                }
            }
        }
        Ok(stats)
    }

    /// Write a file's bytes to a disk path
    pub fn extract_to(&self, file: &Entity, destination: &Path) -> Result<u64> {
        let file = file
            .as_file()
            .ok_or_else(|| VfsError::TypeMismatch(format!("{} is not a file", file.path())))?;
        let written = fs::copy(file.content(), destination)?;
        tracing::info!("Extracted: {} -> {}", file.path(), destination.display());
        Ok(written)
    }

    fn location_of(&self, entity: &Entity) -> Result<Location> {
        match entity {
            Entity::Drive(_) | Entity::Root(_) => Err(VfsError::UnsupportedOperation(format!(
                "{} cannot be modified",
                entity.display_name()
            ))),
            _ if entity.is_resident() => {
                let archive = self
                    .engine
                    .parent_archive_of(entity.path())?
                    .ok_or_else(|| VfsError::NotAnArchive(entity.path().to_string()))?;
                let relative = entity.path().relative_to(archive.path())?;
                Ok(Location::Archive { archive, relative })
            }
            _ => Ok(Location::Disk(entity.path().to_path_buf())),
        }
    }

    fn target_of(&self, folder: &Entity) -> Result<Target> {
        match folder {
            Entity::Archive(archive) => Ok(Target::Archive {
                archive: archive.clone(),
                base: String::new(),
            }),
            Entity::Directory(dir) if dir.is_resident() => match self.location_of(folder)? {
                Location::Archive { archive, relative } => Ok(Target::Archive { archive, base: relative }),
                Location::Disk(path) => Ok(Target::Disk(path)),
            },
            Entity::Directory(_) | Entity::Drive(_) => Ok(Target::Disk(folder.path().to_path_buf())),
            Entity::File(file) => Err(VfsError::TypeMismatch(format!("{} is not a folder", file.path()))),
            Entity::Root(_) => Err(VfsError::UnsupportedOperation(
                "cannot create entries in the root folder".to_string(),
            )),
        }
    }

    /// A file may replace a file and a directory may merge into a directory
    fn check_overwrite(&self, source: &Entity, destination: &VfsPath) -> Result<()> {
        match self.resolve(destination) {
            Ok(existing) => {
                let source_is_dir = matches!(source, Entity::Directory(_));
                let existing_is_dir = matches!(existing, Entity::Directory(_) | Entity::Drive(_) | Entity::Root(_));
                if source_is_dir != existing_is_dir {
                    return Err(VfsError::TypeMismatch(destination.to_string()));
                }
                Ok(())
            }
            Err(VfsError::PathNotFound(_)) => Ok(()),
            Err(e) => Err(e),
        }
    }

    /// Entities are snapshots; the path may be gone by the time one is used
    fn ensure_exists(&self, entity: &Entity) -> Result<()> {
        if self.exists(entity.path())? {
            Ok(())
        } else {
            Err(VfsError::PathNotFound(entity.path().to_string()))
        }
    }

    fn check_not_into_itself(&self, source: &Entity, destination: &VfsPath) -> Result<()> {
        if source.is_folder() && destination.starts_with(source.path()) {
            return Err(VfsError::UnsupportedOperation(format!(
                "cannot put {} inside itself",
                source.path()
            )));
        }
        Ok(())
    }

    /// Flatten `source` into archive entries rooted at `relative`
    fn collect_entries(&self, source: &Entity, relative: &str, out: &mut Vec<PendingEntry>) -> Result<()> {
        match source {
            Entity::File(_) | Entity::Archive(_) => {
                if let Some(file) = source.as_file() {
                    out.push(PendingEntry::file(file.content(), relative));
                }
            }
            Entity::Directory(_) => {
                let children = self.engine.children(source)?;
                if children.is_empty() {
                    out.push(PendingEntry::directory(relative));
                }
                for child in &children {
                    self.collect_entries(child, &join_relative(relative, child.name()), out)?;
                }
            }
            Entity::Drive(_) | Entity::Root(_) => {
                return Err(VfsError::UnsupportedOperation(format!(
                    "cannot copy {}",
                    source.display_name()
                )));
            }
        }
        Ok(())
    }

    /// Copy `source` to a disk path, extracting archive-resident bytes
    fn copy_to_disk(&self, source: &Entity, destination: &Path) -> Result<()> {
        match source {
            Entity::File(_) | Entity::Archive(_) => {
                if let Some(file) = source.as_file() {
                    fs::copy(file.content(), destination)?;
                }
            }
            Entity::Directory(_) => {
                fs::create_dir_all(destination)?;
                for child in self.engine.children(source)? {
                    self.copy_to_disk(&child, &destination.join(child.name()))?;
                }
            }
            Entity::Drive(_) | Entity::Root(_) => {
                return Err(VfsError::UnsupportedOperation(format!(
                    "cannot copy {}",
                    source.display_name()
                )));
            }
        }
        Ok(())
    }

    fn remove_from_disk(source: &Entity, path: &Path) -> Result<()> {
        if matches!(source, Entity::Directory(_)) {
            fs::remove_dir_all(path)?;
        } else {
            fs::remove_file(path)?;
        }
        Ok(())
    }
}

impl FileOperations for FileSystem {
    fn copy(&self, source: &Entity, destination: &Entity, new_name: Option<&str>) -> Result<VfsPath> {
        let name = new_name.unwrap_or_else(|| source.name());
        check_name(name)?;

        let dest_path = destination.path().join(name);
        if matches!(source, Entity::Drive(_) | Entity::Root(_)) {
            return Err(VfsError::UnsupportedOperation(format!("cannot copy {}", source.display_name())));
        }
        self.check_not_into_itself(source, &dest_path)?;
        self.check_overwrite(source, &dest_path)?;

        match self.target_of(destination)? {
            Target::Disk(dir) => self.copy_to_disk(source, &dir.join(name))?,
            Target::Archive { archive, base } => {
                let mut entries = Vec::new();
                self.collect_entries(source, &join_relative(&base, name), &mut entries)?;
                archive.add_files(&self.engine, entries)?;
            }
        }

        tracing::info!("Copied: {} -> {}", source.path(), dest_path);
        Ok(dest_path)
    }

    fn move_to(&self, source: &Entity, destination: &Entity) -> Result<VfsPath> {
        let dest_path = destination.path().join(source.name());
        if &dest_path == source.path() {
            return Ok(dest_path);
        }
        self.check_not_into_itself(source, &dest_path)?;

        let location = self.location_of(source)?;
        self.ensure_exists(source)?;
        self.check_overwrite(source, &dest_path)?;

        match (location, self.target_of(destination)?) {
            (Location::Disk(from), Target::Disk(dir)) => {
                let to = dir.join(source.name());

                // A directory landing on an existing one merges into it, as in archives
                if matches!(source, Entity::Directory(_)) && to.is_dir() {
                    tracing::info!("Merging directory: {} -> {}", from.display(), to.display());
                    self.copy_to_disk(source, &to)?;
                    Self::remove_from_disk(source, &from)?;
                } else {
                    // Try rename first (fast, same filesystem)
                    match fs::rename(&from, &to) {
                        Ok(()) => {}
                        Err(e) if is_cross_device(&e) => {
                            tracing::info!("Cross-filesystem move, using copy+delete: {} -> {}", from.display(), to.display());
                            self.copy_to_disk(source, &to)?;
                            Self::remove_from_disk(source, &from)?;
                        }
                        Err(e) => return Err(e.into()),
                    }
                }
            }
            (Location::Archive { archive, relative }, Target::Archive { archive: target, base })
                if archive.path() == target.path() =>
            {
                let to = join_relative(&base, source.name());
                self.engine.rename_entry(&archive, &relative, &to)?;
            }
            _ => {
                self.copy(source, destination, None)?;
                self.delete(source)?;
            }
        }

        tracing::info!("Moved: {} -> {}", source.path(), dest_path);
        Ok(dest_path)
    }

    fn rename(&self, target: &Entity, new_name: &str) -> Result<VfsPath> {
        let location = self.location_of(target)?;
        check_name(new_name)?;
        self.ensure_exists(target)?;

        let new_path = target
            .path()
            .with_name(new_name)
            .ok_or_else(|| VfsError::UnsupportedOperation("cannot rename the root".to_string()))?;
        if &new_path == target.path() {
            return Ok(new_path);
        }
        if self.exists(&new_path)? {
            return Err(VfsError::AlreadyExists(new_path.to_string()));
        }

        match location {
            Location::Disk(from) => fs::rename(from, new_path.to_path_buf())?,
            Location::Archive { archive, relative } => {
                let to = match relative.rsplit_once('/') {
                    Some((parent, _)) => join_relative(parent, new_name),
                    None => new_name.to_string(),
                };
                self.engine.rename_entry(&archive, &relative, &to)?;
            }
        }

        tracing::info!("Renamed: {} -> {}", target.path(), new_path);
        Ok(new_path)
    }

    fn delete(&self, target: &Entity) -> Result<()> {
        let location = self.location_of(target)?;
        self.ensure_exists(target)?;

        match location {
            Location::Disk(path) => Self::remove_from_disk(target, &path)?,
            Location::Archive { archive, relative } => self.engine.delete_entry(&archive, &relative)?,
        }

        tracing::info!("Deleted: {}", target.path());
        Ok(())
    }

    fn create_directory(&self, parent: &Entity, name: &str) -> Result<VfsPath> {
        check_name(name)?;
        let path = parent.path().join(name);
        if self.exists(&path)? {
            return Err(VfsError::AlreadyExists(path.to_string()));
        }

        match self.target_of(parent)? {
            Target::Disk(dir) => fs::create_dir(dir.join(name))?,
            Target::Archive { archive, base } => {
                archive.create_empty_directory(&self.engine, &join_relative(&base, name))?
            }
        }

        tracing::info!("Created directory: {}", path);
        Ok(path)
    }

    fn create_file(&self, parent: &Entity, name: &str) -> Result<VfsPath> {
        check_name(name)?;
        let path = parent.path().join(name);
        if self.exists(&path)? {
            return Err(VfsError::AlreadyExists(path.to_string()));
        }

        match self.target_of(parent)? {
            Target::Disk(dir) => {
                fs::OpenOptions::new()
                    .write(true)
                    .create_new(true)
                    .open(dir.join(name))?;
            }
            Target::Archive { archive, base } => {
                archive.create_empty_file(&self.engine, &join_relative(&base, name))?
            }
        }

        tracing::info!("Created file: {}", path);
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn setup() -> (TempDir, FileSystem, VfsPath) {
        let tmp = TempDir::new().unwrap();
        let disk = tmp.path().join("disk");
        fs::create_dir_all(&disk).unwrap();
        let config = VfsConfig {
            temp_dir: Some(tmp.path().join("scratch")),
            drives: vec![DriveConfig {
                path: disk.clone(),
                label: "Test drive".into(),
            }],
        };
        let vfs = FileSystem::new(&config).unwrap();
        let root = VfsPath::from_os(&disk).unwrap();
        (tmp, vfs, root)
    }

    #[test]
    fn test_resolve_root_and_drive() {
        let (_tmp, vfs, root) = setup();
        assert_eq!(vfs.resolve(&VfsPath::root()).unwrap().kind(), crate::EntityKind::Root);
        let drive = vfs.resolve(&root).unwrap();
        assert_eq!(drive.display_name(), "Test drive");
        assert_eq!(vfs.parent_folder(&drive).unwrap().unwrap().kind(), crate::EntityKind::Root);
        assert_eq!(vfs.files(&vfs.root()).unwrap(), vec![drive]);
    }

    #[test]
    fn test_create_and_rename_on_disk() {
        let (_tmp, vfs, root) = setup();
        let drive = vfs.resolve(&root).unwrap();

        let dir = vfs.create_directory(&drive, "docs").unwrap();
        let dir = vfs.resolve(&dir).unwrap();
        let file = vfs.create_file(&dir, "a.txt").unwrap();
        assert!(matches!(vfs.create_file(&dir, "a.txt"), Err(VfsError::AlreadyExists(_))));

        let file = vfs.resolve(&file).unwrap();
        let renamed = vfs.rename(&file, "b.txt").unwrap();
        assert_eq!(renamed, root.join("docs/b.txt"));
        assert!(!vfs.exists(&root.join("docs/a.txt")).unwrap());
    }

    #[test]
    fn test_invalid_names() {
        let (_tmp, vfs, root) = setup();
        let drive = vfs.resolve(&root).unwrap();
        assert!(matches!(vfs.create_directory(&drive, "a/b"), Err(VfsError::InvalidName(_))));
        assert!(matches!(vfs.create_file(&drive, ".."), Err(VfsError::InvalidName(_))));
    }

    #[test]
    fn test_drive_and_root_are_immutable() {
        let (_tmp, vfs, root) = setup();
        let drive = vfs.resolve(&root).unwrap();
        assert!(matches!(vfs.rename(&drive, "x"), Err(VfsError::UnsupportedOperation(_))));
        assert!(matches!(vfs.delete(&vfs.root()), Err(VfsError::UnsupportedOperation(_))));
    }

    #[test]
    fn test_move_type_mismatch_checked_first() {
        let (_tmp, vfs, root) = setup();
        let drive = vfs.resolve(&root).unwrap();
        let a = vfs.resolve(&vfs.create_directory(&drive, "a").unwrap()).unwrap();
        let b = vfs.resolve(&vfs.create_directory(&drive, "b").unwrap()).unwrap();
        vfs.create_directory(&b, "item").unwrap();
        let item = vfs.resolve(&vfs.create_file(&a, "item").unwrap()).unwrap();

        assert!(matches!(vfs.move_to(&item, &b), Err(VfsError::TypeMismatch(_))));
        assert!(vfs.exists(item.path()).unwrap());
    }

    #[test]
    fn test_move_into_itself_rejected() {
        let (_tmp, vfs, root) = setup();
        let drive = vfs.resolve(&root).unwrap();
        let a = vfs.resolve(&vfs.create_directory(&drive, "a").unwrap()).unwrap();
        let inner = vfs.resolve(&vfs.create_directory(&a, "inner").unwrap()).unwrap();
        assert!(matches!(vfs.move_to(&a, &inner), Err(VfsError::UnsupportedOperation(_))));
    }

    #[test]
    fn test_copy_directory_on_disk_and_statistics() {
        let (_tmp, vfs, root) = setup();
        let drive = vfs.resolve(&root).unwrap();
        let src = vfs.resolve(&vfs.create_directory(&drive, "src").unwrap()).unwrap();
        fs::write(root.join("src/one.txt").to_path_buf(), b"12345").unwrap();
        vfs.create_directory(&src, "empty").unwrap();

        let copied = vfs.copy(&src, &drive, Some("dst")).unwrap();
        let copied = vfs.resolve(&copied).unwrap();
        let stats = vfs.contents_statistics(&copied).unwrap();
        assert_eq!(stats, Statistics { files: 1, directories: 1, total_size: 5 });
    }

    #[test]
    fn test_move_directory_merges_into_existing_one() {
        let (_tmp, vfs, root) = setup();
        let drive = vfs.resolve(&root).unwrap();
        let a = vfs.resolve(&vfs.create_directory(&drive, "a").unwrap()).unwrap();
        let b = vfs.resolve(&vfs.create_directory(&drive, "b").unwrap()).unwrap();
        let item = vfs.resolve(&vfs.create_directory(&a, "item").unwrap()).unwrap();
        fs::write(root.join("a/item/one.txt").to_path_buf(), b"new").unwrap();
        fs::write(root.join("a/item/shared.txt").to_path_buf(), b"new").unwrap();
        let existing = vfs.resolve(&vfs.create_directory(&b, "item").unwrap()).unwrap();
        fs::write(root.join("b/item/two.txt").to_path_buf(), b"old").unwrap();
        fs::write(root.join("b/item/shared.txt").to_path_buf(), b"old").unwrap();

        let moved = vfs.move_to(&item, &b).unwrap();
        assert_eq!(&moved, existing.path());
        assert!(!vfs.exists(item.path()).unwrap());

        let mut names: Vec<String> = vfs.files(&existing).unwrap().iter().map(|e| e.name().to_string()).collect();
        names.sort();
        assert_eq!(names, vec!["one.txt", "shared.txt", "two.txt"]);
        assert_eq!(fs::read(root.join("b/item/shared.txt").to_path_buf()).unwrap(), b"new");
    }
}
