//! Files - virtual file system layer
//!
//! Presents one tree of files and folders spanning the real disk and the
//! contents of (possibly nested) ZIP, TAR and 7z archives:
//! - VfsPath: `/`-separated absolute path algebra
//! - format: per-format archive readers and writers behind `FormatAdapter`
//! - ArchiveEngine: owning-archive lookup, tree synthesis, archive rewrites
//! - Entity: files, directories, archives, drives and the root folder
//! - FileSystem: copy / move / rename / delete across archive boundaries

mod path;
mod encoding;
mod temp;
mod tree;
mod engine;
mod entity;
mod browser;
mod file_operations;
pub mod format;

pub use path::{join, relative_to, segments, VfsPath};
pub use encoding::{decode_bytes, detect_encoding, system_encoding_hint, EncodingHint};
pub use temp::TempStore;
pub use tree::{normalize_entry_path, EntryTree, TreeNode};
pub use engine::{ArchiveEngine, Transform};
pub use entity::{Archive, Directory, Drive, Entity, EntityKind, RegularFile, RootFolder, Statistics};
pub use browser::{display_label, list_directory, natural_sort_key, ListOptions, NaturalSortPart, SortBy, SortOrder};
pub use file_operations::{DriveConfig, FileOperations, FileSystem, VfsConfig};
pub use format::{ArchiveFormat, ArchiveHandle, Entry, EntryHandle, FormatAdapter, FormatError, PendingEntry};

use thiserror::Error;

/// Virtual file system errors
#[derive(Error, Debug)]
pub enum VfsError {
    #[error("Path not found: {0}")]
    PathNotFound(String),

    #[error("Not an archive: {0}")]
    NotAnArchive(String),

    #[error("Archive entry is both a file and a directory: {0}")]
    AmbiguousEntry(String),

    #[error("Cannot replace a file with a directory or a directory with a file: {0}")]
    TypeMismatch(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Unsupported operation: {0}")]
    UnsupportedOperation(String),

    #[error("{ancestor} is not an ancestor of {path}")]
    NotAnAncestor { path: String, ancestor: String },

    #[error("Invalid path: {0}")]
    InvalidPath(String),

    #[error("Invalid file name: {0}")]
    InvalidName(String),

    #[error("File already exists: {0}")]
    AlreadyExists(String),

    #[error("Archive error: {0}")]
    Archive(String),
}

impl From<zip::result::ZipError> for VfsError {
    fn from(e: zip::result::ZipError) -> Self {
        match e {
            zip::result::ZipError::Io(io) => VfsError::Io(io),
            other => VfsError::Archive(other.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, VfsError>;
