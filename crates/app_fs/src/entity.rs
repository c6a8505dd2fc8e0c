//! Filesystem entities
//!
//! Everything the user can see in a folder listing. Entities are snapshots:
//! they are built by the engine or the file system, never mutated in place,
//! and compared by path only.

use crate::engine::ArchiveEngine;
use crate::format::{ArchiveFormat, PendingEntry};
use crate::{Result, VfsPath};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::File;
use std::hash::{Hash, Hasher};
use std::io::Read;
use std::path::{Path, PathBuf};

/// A plain file, on disk or inside an archive
#[derive(Debug, Clone)]
pub struct RegularFile {
    path: VfsPath,
    size: u64,
    /// Disk location holding the bytes: the file itself, or an extracted temp copy
    content: PathBuf,
    resident: bool,
    compressed_size: Option<u64>,
    modified: Option<i64>,
}

impl RegularFile {
    pub(crate) fn on_disk(path: VfsPath, size: u64, modified: Option<i64>) -> Self {
        Self {
            content: path.to_path_buf(),
            path,
            size,
            resident: false,
            compressed_size: None,
            modified,
        }
    }

    pub(crate) fn in_archive(
        path: VfsPath,
        size: u64,
        content: PathBuf,
        compressed_size: Option<u64>,
        modified: Option<i64>,
    ) -> Self {
        Self {
            path,
            size,
            content,
            resident: true,
            compressed_size,
            modified,
        }
    }

    pub fn path(&self) -> &VfsPath {
        &self.path
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn content(&self) -> &Path {
        &self.content
    }

    pub fn is_resident(&self) -> bool {
        self.resident
    }

    /// Stored size inside the owning archive, when the format reports one
    pub fn compressed_size(&self) -> Option<u64> {
        self.compressed_size
    }

    pub fn modified(&self) -> Option<i64> {
        self.modified
    }

    /// Open the file's bytes for reading
    pub fn open(&self) -> Result<File> {
        Ok(File::open(&self.content)?)
    }

    pub fn read_to_vec(&self) -> Result<Vec<u8>> {
        let mut buf = Vec::with_capacity(self.size as usize);
        self.open()?.read_to_end(&mut buf)?;
        Ok(buf)
    }
}

/// A folder, on disk or synthesized from archive entries.
///
/// Holds no children: every listing reads the disk or the owning archive again.
#[derive(Debug, Clone)]
pub struct Directory {
    path: VfsPath,
    resident: bool,
    modified: Option<i64>,
}

impl Directory {
    pub(crate) fn on_disk(path: VfsPath, modified: Option<i64>) -> Self {
        Self {
            path,
            resident: false,
            modified,
        }
    }

    pub(crate) fn in_archive(path: VfsPath, modified: Option<i64>) -> Self {
        Self {
            path,
            resident: true,
            modified,
        }
    }

    pub fn path(&self) -> &VfsPath {
        &self.path
    }

    pub fn is_resident(&self) -> bool {
        self.resident
    }

    pub fn modified(&self) -> Option<i64> {
        self.modified
    }

    /// Children as they are now
    pub fn files(&self, engine: &ArchiveEngine) -> Result<Vec<Entity>> {
        if self.resident {
            engine.archive_directory_children(&self.path)
        } else {
            engine.list_disk(&self.path)
        }
    }
}

/// A file that is also a folder: its children come from its entry list
#[derive(Debug, Clone)]
pub struct Archive {
    file: RegularFile,
    format: ArchiveFormat,
}

impl Archive {
    pub(crate) fn new(file: RegularFile, format: ArchiveFormat) -> Self {
        Self { file, format }
    }

    pub fn path(&self) -> &VfsPath {
        self.file.path()
    }

    pub fn file(&self) -> &RegularFile {
        &self.file
    }

    pub fn format(&self) -> ArchiveFormat {
        self.format
    }

    /// True when this archive is itself stored inside another archive
    pub fn is_resident(&self) -> bool {
        self.file.is_resident()
    }

    pub fn content(&self) -> &Path {
        self.file.content()
    }

    /// Synthesized tree of the archive's entries
    pub fn files(&self, engine: &ArchiveEngine) -> Result<Vec<Entity>> {
        engine.build_tree(self)
    }

    pub fn add_files(&self, engine: &ArchiveEngine, entries: Vec<PendingEntry>) -> Result<()> {
        engine.add_files(self, entries)
    }

    pub fn create_empty_file(&self, engine: &ArchiveEngine, relative: &str) -> Result<()> {
        engine.create_empty_file(self, relative)
    }

    pub fn create_empty_directory(&self, engine: &ArchiveEngine, relative: &str) -> Result<()> {
        engine.create_empty_directory(self, relative)
    }
}

/// A storage root shown at the top level
#[derive(Debug, Clone)]
pub struct Drive {
    path: VfsPath,
    label: String,
}

impl Drive {
    pub fn new(path: VfsPath, label: impl Into<String>) -> Self {
        Self {
            path,
            label: label.into(),
        }
    }

    pub fn path(&self) -> &VfsPath {
        &self.path
    }

    pub fn label(&self) -> &str {
        &self.label
    }
}

/// The virtual folder listing every drive
#[derive(Debug, Clone)]
pub struct RootFolder {
    path: VfsPath,
}

impl RootFolder {
    pub const DISPLAY_NAME: &'static str = "This device";

    pub fn new() -> Self {
        Self { path: VfsPath::root() }
    }
}

impl Default for RootFolder {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityKind {
    File,
    Directory,
    Archive,
    Drive,
    Root,
}

#[derive(Debug, Clone)]
pub enum Entity {
    File(RegularFile),
    Directory(Directory),
    Archive(Archive),
    Drive(Drive),
    Root(RootFolder),
}

impl Entity {
    pub fn path(&self) -> &VfsPath {
        match self {
            Entity::File(f) => f.path(),
            Entity::Directory(d) => d.path(),
            Entity::Archive(a) => a.path(),
            Entity::Drive(d) => d.path(),
            Entity::Root(r) => &r.path,
        }
    }

    pub fn kind(&self) -> EntityKind {
        match self {
            Entity::File(_) => EntityKind::File,
            Entity::Directory(_) => EntityKind::Directory,
            Entity::Archive(_) => EntityKind::Archive,
            Entity::Drive(_) => EntityKind::Drive,
            Entity::Root(_) => EntityKind::Root,
        }
    }

    /// Last path segment
    pub fn name(&self) -> &str {
        self.path().name()
    }

    /// Name shown to the user: drive label, "This device" for the root
    pub fn display_name(&self) -> &str {
        match self {
            Entity::Drive(d) => d.label(),
            Entity::Root(_) => RootFolder::DISPLAY_NAME,
            _ => self.name(),
        }
    }

    /// Name without extension for files, full name for folders
    pub fn base_name(&self) -> &str {
        match self {
            Entity::File(_) | Entity::Archive(_) => self.path().stem(),
            _ => self.display_name(),
        }
    }

    pub fn extension(&self) -> Option<&str> {
        match self {
            Entity::File(_) | Entity::Archive(_) => self.path().extension(),
            _ => None,
        }
    }

    /// Has file content (archives count)
    pub fn is_file(&self) -> bool {
        matches!(self, Entity::File(_) | Entity::Archive(_))
    }

    /// Can be listed (archives count)
    pub fn is_folder(&self) -> bool {
        !matches!(self, Entity::File(_))
    }

    pub fn is_resident(&self) -> bool {
        match self {
            Entity::File(f) => f.is_resident(),
            Entity::Directory(d) => d.is_resident(),
            Entity::Archive(a) => a.is_resident(),
            Entity::Drive(_) | Entity::Root(_) => false,
        }
    }

    /// Dotfile convention, which does not apply inside archives
    pub fn is_hidden(&self) -> bool {
        matches!(self, Entity::File(_) | Entity::Directory(_) | Entity::Archive(_))
            && !self.is_resident()
            && self.name().starts_with('.')
    }

    /// Content size for files and archives
    pub fn size(&self) -> Option<u64> {
        self.as_file().map(RegularFile::size)
    }

    pub fn compressed_size(&self) -> Option<u64> {
        self.as_file().and_then(RegularFile::compressed_size)
    }

    pub fn modified(&self) -> Option<i64> {
        match self {
            Entity::File(f) => f.modified(),
            Entity::Archive(a) => a.file().modified(),
            Entity::Directory(d) => d.modified(),
            Entity::Drive(_) | Entity::Root(_) => None,
        }
    }

    /// File view of files and archives
    pub fn as_file(&self) -> Option<&RegularFile> {
        match self {
            Entity::File(f) => Some(f),
            Entity::Archive(a) => Some(a.file()),
            _ => None,
        }
    }

    pub fn as_archive(&self) -> Option<&Archive> {
        match self {
            Entity::Archive(a) => Some(a),
            _ => None,
        }
    }
}

impl PartialEq for Entity {
    fn eq(&self, other: &Self) -> bool {
        self.path() == other.path()
    }
}

impl Eq for Entity {}

impl Hash for Entity {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.path().hash(state);
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.path())
    }
}

/// Recursive content counts of a folder
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Statistics {
    pub files: u64,
    pub directories: u64,
    pub total_size: u64,
}
