//! TAR adapter (plain and gzip-compressed)

use super::{ArchiveFormat, ArchiveHandle, Entry, EntryHandle, EntryVisitor, FormatAdapter, FormatError, PendingEntry};
use crate::Result;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use std::collections::HashMap;
use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::Path;
use tar::EntryType;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TarCompression {
    Plain,
    Gzip,
}

/// Tar parsing is lenient enough to accept arbitrary text as an empty
/// archive, so only files named like a tarball are considered.
fn compression_for(path: &Path) -> Option<TarCompression> {
    let name = path.file_name()?.to_str()?.to_lowercase();
    if name.ends_with(".tar") {
        Some(TarCompression::Plain)
    } else if name.ends_with(".tgz") || name.ends_with(".gz") {
        Some(TarCompression::Gzip)
    } else {
        None
    }
}

fn open_stream(source: &Path, compression: TarCompression) -> io::Result<Box<dyn Read>> {
    let file = BufReader::new(File::open(source)?);
    Ok(match compression {
        TarCompression::Plain => Box::new(file),
        TarCompression::Gzip => Box::new(GzDecoder::new(file)),
    })
}

pub struct TarAdapter;

impl FormatAdapter for TarAdapter {
    fn format(&self) -> ArchiveFormat {
        ArchiveFormat::Tar
    }

    fn open(&self, source: &Path) -> std::result::Result<ArchiveHandle, FormatError> {
        let reject = |reason: String| FormatError::new(ArchiveFormat::Tar, source, reason);

        let compression =
            compression_for(source).ok_or_else(|| reject("not named .tar, .tgz or .gz".into()))?;
        let len = std::fs::metadata(source).map_err(|e| reject(e.to_string()))?.len();
        if len == 0 {
            return Err(reject("empty file".into()));
        }

        let stream = open_stream(source, compression).map_err(|e| reject(e.to_string()))?;
        let mut archive = tar::Archive::new(stream);
        let mut entries = Vec::new();

        for (index, entry) in archive.entries().map_err(|e| reject(e.to_string()))?.enumerate() {
            let entry = entry.map_err(|e| reject(e.to_string()))?;
            let header = entry.header();
            let kind = header.entry_type();

            let size = if kind.is_dir() {
                None
            } else if kind.is_file() || kind == EntryType::GNUSparse {
                Some(entry.size())
            } else {
                tracing::trace!("Skipping tar entry of type {:?}", kind);
                continue;
            };

            let path = entry
                .path()
                .map_err(|e| reject(e.to_string()))?
                .to_string_lossy()
                .into_owned();

            entries.push(Entry {
                handle: EntryHandle(index),
                path,
                size,
                compressed_size: match compression {
                    TarCompression::Plain => size,
                    TarCompression::Gzip => None,
                },
                modified: header.mtime().ok().map(|t| t as i64),
            });
        }

        Ok(ArchiveHandle::new(ArchiveFormat::Tar, source, entries))
    }

    fn for_each_file(&self, handle: &ArchiveHandle, visit: &mut EntryVisitor<'_>) -> Result<()> {
        let wanted: HashMap<usize, &Entry> = handle
            .entries()
            .iter()
            .filter(|e| !e.is_directory())
            .map(|e| (e.handle.index(), e))
            .collect();

        let compression = compression_for(handle.source()).unwrap_or(TarCompression::Plain);
        let mut archive = tar::Archive::new(open_stream(handle.source(), compression)?);

        for (index, entry) in archive.entries()?.enumerate() {
            let mut entry = entry?;
            if let Some(wanted) = wanted.get(&index) {
                visit(wanted, &mut entry)?;
            }
        }
        Ok(())
    }

    fn write(&self, destination: &Path, entries: &[PendingEntry]) -> Result<()> {
        let out = BufWriter::new(File::create(destination)?);

        match compression_for(destination).unwrap_or(TarCompression::Plain) {
            TarCompression::Plain => {
                let builder = append_all(tar::Builder::new(out), entries)?;
                builder.into_inner()?.flush()?;
            }
            TarCompression::Gzip => {
                let encoder = GzEncoder::new(out, Compression::default());
                let builder = append_all(tar::Builder::new(encoder), entries)?;
                builder.into_inner()?.finish()?.flush()?;
            }
        }
        Ok(())
    }
}

fn append_all<W: Write>(mut builder: tar::Builder<W>, entries: &[PendingEntry]) -> Result<tar::Builder<W>> {
    let now = chrono::Utc::now().timestamp().max(0) as u64;

    for entry in entries {
        let mut header = tar::Header::new_gnu();
        header.set_mtime(now);

        match &entry.source {
            None => {
                header.set_entry_type(EntryType::Directory);
                header.set_mode(0o755);
                header.set_size(0);
                builder.append_data(&mut header, &entry.path, io::empty())?;
            }
            Some(source) => {
                let input = File::open(source)?;
                header.set_entry_type(EntryType::Regular);
                header.set_mode(0o644);
                header.set_size(input.metadata()?.len());
                builder.append_data(&mut header, &entry.path, BufReader::new(input))?;
            }
        }
    }

    Ok(builder)
}
