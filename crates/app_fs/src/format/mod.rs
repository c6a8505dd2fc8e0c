//! Archive format adapters
//!
//! Every supported container format implements [`FormatAdapter`]. Adapters
//! know nothing about the virtual tree: they list raw entries, stream entry
//! bytes out and write a complete archive from a list of [`PendingEntry`]s.

mod seven_zip;
mod tar_archive;
mod zip_archive;

pub use seven_zip::SevenZipAdapter;
pub use tar_archive::TarAdapter;
pub use zip_archive::ZipAdapter;

use crate::tree::normalize_entry_path;
use crate::{Result, VfsError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ArchiveFormat {
    Zip,
    Tar,
    SevenZip,
}

impl ArchiveFormat {
    /// Order in which formats are tried against an unknown file
    pub const DETECTION_ORDER: [ArchiveFormat; 3] =
        [ArchiveFormat::Zip, ArchiveFormat::Tar, ArchiveFormat::SevenZip];

    pub fn adapter(self) -> &'static dyn FormatAdapter {
        match self {
            ArchiveFormat::Zip => &ZipAdapter,
            ArchiveFormat::Tar => &TarAdapter,
            ArchiveFormat::SevenZip => &SevenZipAdapter,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            ArchiveFormat::Zip => "zip",
            ArchiveFormat::Tar => "tar",
            ArchiveFormat::SevenZip => "7z",
        }
    }
}

impl fmt::Display for ArchiveFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A file was not readable as the given format
#[derive(Debug, thiserror::Error)]
#[error("not a {format} archive: {} ({reason})", .path.display())]
pub struct FormatError {
    pub format: ArchiveFormat,
    pub path: PathBuf,
    pub reason: String,
}

impl FormatError {
    pub fn new<R: fmt::Display>(format: ArchiveFormat, path: &Path, reason: R) -> Self {
        Self {
            format,
            path: path.to_path_buf(),
            reason: reason.to_string(),
        }
    }
}

/// Opaque reference to one entry of one opened archive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntryHandle(pub(crate) usize);

impl EntryHandle {
    pub fn index(self) -> usize {
        self.0
    }
}

/// Raw entry as stored in the archive
#[derive(Debug, Clone)]
pub struct Entry {
    pub handle: EntryHandle,

    /// Path exactly as recorded, possibly with a trailing `/` or `./` prefix
    pub path: String,

    /// Uncompressed size, `None` for directory entries
    pub size: Option<u64>,

    /// Stored size, when the format exposes it per entry
    pub compressed_size: Option<u64>,

    /// Last modified timestamp (Unix epoch seconds)
    pub modified: Option<i64>,
}

impl Entry {
    pub fn is_directory(&self) -> bool {
        self.size.is_none()
    }
}

/// An opened archive: its format, the file it was read from and its entries
#[derive(Debug, Clone)]
pub struct ArchiveHandle {
    format: ArchiveFormat,
    source: PathBuf,
    entries: Vec<Entry>,
}

impl ArchiveHandle {
    pub(crate) fn new(format: ArchiveFormat, source: &Path, entries: Vec<Entry>) -> Self {
        Self {
            format,
            source: source.to_path_buf(),
            entries,
        }
    }

    pub fn format(&self) -> ArchiveFormat {
        self.format
    }

    pub fn source(&self) -> &Path {
        &self.source
    }

    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    /// Entry whose normalized path equals `path`. Later entries shadow earlier ones.
    pub fn find(&self, path: &str) -> Option<&Entry> {
        let wanted = normalize_entry_path(path);
        self.entries
            .iter()
            .rev()
            .find(|e| normalize_entry_path(&e.path) == wanted)
    }

    /// Stored size of a file entry. Always `None` for 7z.
    pub fn entry_compressed_size(&self, path: &str) -> Option<u64> {
        self.find(path).and_then(|e| e.compressed_size)
    }

    pub fn entry_last_modified(&self, path: &str) -> Option<i64> {
        self.find(path).and_then(|e| e.modified)
    }

    /// Stream one entry's bytes into `sink`
    pub fn read_entry(&self, entry: &Entry, sink: &mut dyn Write) -> Result<u64> {
        self.format.adapter().read_entry(self, entry, sink)
    }

    /// Visit every file entry in storage order, in a single pass
    pub fn for_each_file(&self, visit: &mut EntryVisitor<'_>) -> Result<()> {
        self.format.adapter().for_each_file(self, visit)
    }
}

/// One entry of an archive about to be written.
///
/// `source` holds the entry's bytes; `None` marks a directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingEntry {
    pub source: Option<PathBuf>,
    pub path: String,
}

impl PendingEntry {
    pub fn file<P: Into<PathBuf>>(source: P, path: impl Into<String>) -> Self {
        Self {
            source: Some(source.into()),
            path: path.into(),
        }
    }

    pub fn directory(path: impl Into<String>) -> Self {
        Self {
            source: None,
            path: path.into(),
        }
    }

    pub fn is_directory(&self) -> bool {
        self.source.is_none()
    }
}

pub type EntryVisitor<'a> = dyn FnMut(&Entry, &mut dyn Read) -> Result<()> + 'a;

/// A container format the engine can read and write
pub trait FormatAdapter: Send + Sync {
    fn format(&self) -> ArchiveFormat;

    /// Parse `source` and list its entries. Fails if the file is not this format.
    fn open(&self, source: &Path) -> std::result::Result<ArchiveHandle, FormatError>;

    /// Visit each file entry (directories skipped) with a reader over its bytes
    fn for_each_file(&self, handle: &ArchiveHandle, visit: &mut EntryVisitor<'_>) -> Result<()>;

    /// Stream one entry's bytes into `sink`
    fn read_entry(&self, handle: &ArchiveHandle, entry: &Entry, sink: &mut dyn Write) -> Result<u64> {
        let mut written = None;
        self.for_each_file(handle, &mut |candidate, reader| {
            if candidate.handle == entry.handle {
                written = Some(io::copy(reader, &mut *sink)?);
            }
            Ok(())
        })?;
        written.ok_or_else(|| VfsError::PathNotFound(entry.path.clone()))
    }

    /// Write a complete archive holding `entries`, in order, to `destination`
    fn write(&self, destination: &Path, entries: &[PendingEntry]) -> Result<()>;
}

/// Try every format in detection order; the first that opens wins
pub fn detect(source: &Path) -> Option<ArchiveHandle> {
    for format in ArchiveFormat::DETECTION_ORDER {
        match format.adapter().open(source) {
            Ok(handle) => {
                tracing::debug!(
                    "Opened {} as {} ({} entries)",
                    source.display(),
                    format,
                    handle.entries().len()
                );
                return Some(handle);
            }
            Err(e) => tracing::trace!("{}", e),
        }
    }
    None
}

/// Open `source` with a known format, mapping rejection to `NotAnArchive`
pub fn open_as(format: ArchiveFormat, source: &Path) -> Result<ArchiveHandle> {
    format.adapter().open(source).map_err(|e| {
        tracing::debug!("{}", e);
        VfsError::NotAnArchive(source.display().to_string())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn sample_entries(dir: &Path) -> Vec<PendingEntry> {
        let a = dir.join("a.txt");
        let b = dir.join("b.bin");
        fs::write(&a, b"hello").unwrap();
        fs::write(&b, vec![7u8; 4096]).unwrap();
        vec![
            PendingEntry::directory("docs"),
            PendingEntry::file(&a, "docs/a.txt"),
            PendingEntry::file(&b, "b.bin"),
            PendingEntry::directory("empty"),
        ]
    }

    fn read_all(handle: &ArchiveHandle, path: &str) -> Vec<u8> {
        let entry = handle.find(path).unwrap().clone();
        let mut out = Vec::new();
        handle.read_entry(&entry, &mut out).unwrap();
        out
    }

    fn check_format(format: ArchiveFormat, file_name: &str) {
        let tmp = TempDir::new().unwrap();
        let entries = sample_entries(tmp.path());
        let archive = tmp.path().join(file_name);
        format.adapter().write(&archive, &entries).unwrap();

        let handle = detect(&archive).unwrap();
        assert_eq!(handle.format(), format);
        assert_eq!(read_all(&handle, "docs/a.txt"), b"hello");
        assert_eq!(read_all(&handle, "b.bin"), vec![7u8; 4096]);
        assert!(handle.find("empty").unwrap().is_directory());
        assert_eq!(handle.find("docs/a.txt").unwrap().size, Some(5));
    }

    #[test]
    fn test_zip_write_and_read() {
        check_format(ArchiveFormat::Zip, "sample.zip");
    }

    #[test]
    fn test_tar_write_and_read() {
        check_format(ArchiveFormat::Tar, "sample.tar");
    }

    #[test]
    fn test_tar_gz_write_and_read() {
        check_format(ArchiveFormat::Tar, "sample.tgz");
    }

    #[test]
    fn test_seven_zip_write_and_read() {
        check_format(ArchiveFormat::SevenZip, "sample.7z");
    }

    #[test]
    fn test_detect_rejects_plain_files() {
        let tmp = TempDir::new().unwrap();
        let text = tmp.path().join("notes.txt");
        fs::write(&text, b"just some text").unwrap();
        assert!(detect(&text).is_none());

        let empty = tmp.path().join("empty.tar");
        fs::write(&empty, b"").unwrap();
        assert!(detect(&empty).is_none());
    }

    #[test]
    fn test_compressed_size_by_format() {
        let tmp = TempDir::new().unwrap();
        let entries = sample_entries(tmp.path());

        let zip = tmp.path().join("x.zip");
        ArchiveFormat::Zip.adapter().write(&zip, &entries).unwrap();
        let handle = open_as(ArchiveFormat::Zip, &zip).unwrap();
        let stored = handle.entry_compressed_size("b.bin").unwrap();
        assert!(stored < 4096);

        let seven = tmp.path().join("x.7z");
        ArchiveFormat::SevenZip.adapter().write(&seven, &entries).unwrap();
        let handle = open_as(ArchiveFormat::SevenZip, &seven).unwrap();
        assert_eq!(handle.entry_compressed_size("b.bin"), None);
    }

    #[test]
    fn test_find_last_duplicate_wins() {
        let handle = ArchiveHandle::new(
            ArchiveFormat::Zip,
            Path::new("/x.zip"),
            vec![
                Entry { handle: EntryHandle(0), path: "a.txt".into(), size: Some(1), compressed_size: None, modified: None },
                Entry { handle: EntryHandle(1), path: "./a.txt".into(), size: Some(2), compressed_size: None, modified: None },
            ],
        );
        assert_eq!(handle.find("a.txt").unwrap().handle, EntryHandle(1));
    }
}
