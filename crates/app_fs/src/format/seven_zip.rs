//! 7z adapter
//!
//! The 7z reader only supports sequential extraction: entries come out
//! folder by folder and entries without a data stream come last. Entries are
//! matched back to the listing by name, in listing order.

use super::{ArchiveFormat, ArchiveHandle, Entry, EntryHandle, EntryVisitor, FormatAdapter, FormatError, PendingEntry};
use crate::{Result, VfsError};
use sevenz_rust::{Password, SevenZArchiveEntry, SevenZReader, SevenZWriter};
use std::collections::{HashMap, VecDeque};
use std::fs::File;
use std::io::{self, BufReader};
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

pub struct SevenZipAdapter;

impl FormatAdapter for SevenZipAdapter {
    fn format(&self) -> ArchiveFormat {
        ArchiveFormat::SevenZip
    }

    fn open(&self, source: &Path) -> std::result::Result<ArchiveHandle, FormatError> {
        let reader = SevenZReader::open(source, Password::empty())
            .map_err(|e| FormatError::new(ArchiveFormat::SevenZip, source, e))?;

        let entries = reader
            .archive()
            .files
            .iter()
            .enumerate()
            .map(|(i, file)| {
                let modified = if file.has_last_modified_date {
                    let time: SystemTime = file.last_modified_date().into();
                    time.duration_since(UNIX_EPOCH).ok().map(|d| d.as_secs() as i64)
                } else {
                    None
                };

                Entry {
                    handle: EntryHandle(i),
                    path: file.name().to_string(),
                    size: (!file.is_directory()).then(|| file.size()),
                    compressed_size: None,
                    modified,
                }
            })
            .collect();

        Ok(ArchiveHandle::new(ArchiveFormat::SevenZip, source, entries))
    }

    fn for_each_file(&self, handle: &ArchiveHandle, visit: &mut EntryVisitor<'_>) -> Result<()> {
        let mut pending: HashMap<&str, VecDeque<&Entry>> = HashMap::new();
        for entry in handle.entries().iter().filter(|e| !e.is_directory()) {
            pending.entry(entry.path.as_str()).or_default().push_back(entry);
        }

        let mut reader = SevenZReader::open(handle.source(), Password::empty())
            .map_err(|e| VfsError::Archive(e.to_string()))?;

        let mut failure: Option<VfsError> = None;
        reader
            .for_each_entries(|archived, stream| {
                if archived.is_directory() {
                    return Ok(true);
                }

                let matched = pending.get_mut(archived.name()).and_then(|q| q.pop_front());
                if let Some(entry) = matched {
                    if let Err(e) = visit(entry, &mut *stream) {
                        failure = Some(e);
                        return Ok(false);
                    }
                }

                // The decoder must be advanced past this entry either way
                io::copy(stream, &mut io::sink())
                    .map_err(|e| sevenz_rust::Error::other(e.to_string()))?;
                Ok(true)
            })
            .map_err(|e| VfsError::Archive(e.to_string()))?;

        match failure {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    fn write(&self, destination: &Path, entries: &[PendingEntry]) -> Result<()> {
        let file = File::create(destination)?;
        let mut writer = SevenZWriter::new(file).map_err(|e| VfsError::Archive(e.to_string()))?;

        for entry in entries {
            match &entry.source {
                None => {
                    let mut marker = SevenZArchiveEntry::default();
                    marker.name = entry.path.clone();
                    marker.is_directory = true;
                    marker.has_stream = false;
                    writer
                        .push_archive_entry(marker, None::<File>)
                        .map_err(|e| VfsError::Archive(e.to_string()))?;
                }
                Some(source) => {
                    let input = File::open(source)?;
                    writer
                        .push_archive_entry(
                            SevenZArchiveEntry::from_path(source, entry.path.clone()),
                            Some(BufReader::new(input)),
                        )
                        .map_err(|e| VfsError::Archive(e.to_string()))?;
                }
            }
        }

        writer.finish().map_err(|e| VfsError::Archive(e.to_string()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_duplicate_names_matched_in_order() {
        let tmp = TempDir::new().unwrap();
        let first = tmp.path().join("first");
        let second = tmp.path().join("second");
        std::fs::write(&first, b"one").unwrap();
        std::fs::write(&second, b"two").unwrap();

        let archive = tmp.path().join("dup.7z");
        SevenZipAdapter
            .write(
                &archive,
                &[PendingEntry::file(&first, "same.txt"), PendingEntry::file(&second, "same.txt")],
            )
            .unwrap();

        let handle = SevenZipAdapter.open(&archive).unwrap();
        let mut seen = Vec::new();
        handle
            .for_each_file(&mut |entry, reader| {
                let mut buf = String::new();
                reader.read_to_string(&mut buf)?;
                seen.push((entry.handle.index(), buf));
                Ok(())
            })
            .unwrap();
        seen.sort();
        assert_eq!(seen, vec![(0, "one".to_string()), (1, "two".to_string())]);
    }

    #[test]
    fn test_empty_file_entry() {
        let tmp = TempDir::new().unwrap();
        let empty = tmp.path().join("empty");
        std::fs::write(&empty, b"").unwrap();
        let archive = tmp.path().join("e.7z");
        SevenZipAdapter.write(&archive, &[PendingEntry::file(&empty, "e.txt")]).unwrap();

        let handle = SevenZipAdapter.open(&archive).unwrap();
        let entry = handle.find("e.txt").unwrap().clone();
        assert_eq!(entry.size, Some(0));
        let mut out = Vec::new();
        assert_eq!(handle.read_entry(&entry, &mut out).unwrap(), 0);
    }
}
