//! ZIP adapter

use super::{ArchiveFormat, ArchiveHandle, Entry, EntryHandle, EntryVisitor, FormatAdapter, FormatError, PendingEntry};
use crate::encoding;
use crate::Result;
use std::fs::File;
use std::io::{self, BufReader, BufWriter, Write};
use std::path::Path;
use zip::write::SimpleFileOptions;
use zip::CompressionMethod;

pub struct ZipAdapter;

/// DOS timestamp to Unix seconds (ZIP stores local time without a zone; read as UTC)
fn dos_time_to_unix(dt: zip::DateTime) -> Option<i64> {
    let date = chrono::NaiveDate::from_ymd_opt(dt.year() as i32, dt.month() as u32, dt.day() as u32)?;
    let time = date.and_hms_opt(dt.hour() as u32, dt.minute() as u32, dt.second() as u32)?;
    Some(time.and_utc().timestamp())
}

fn open_archive(source: &Path) -> Result<zip::ZipArchive<BufReader<File>>> {
    let file = File::open(source)?;
    Ok(zip::ZipArchive::new(BufReader::new(file))?)
}

impl FormatAdapter for ZipAdapter {
    fn format(&self) -> ArchiveFormat {
        ArchiveFormat::Zip
    }

    fn open(&self, source: &Path) -> std::result::Result<ArchiveHandle, FormatError> {
        let reject = |reason: String| FormatError::new(ArchiveFormat::Zip, source, reason);

        let file = File::open(source).map_err(|e| reject(e.to_string()))?;
        let mut archive =
            zip::ZipArchive::new(BufReader::new(file)).map_err(|e| reject(e.to_string()))?;

        // A stored zip inside a tar would otherwise be found behind the tar header
        if archive.offset() != 0 {
            return Err(reject(format!("zip data starts at offset {}", archive.offset())));
        }

        let hint = encoding::system_encoding_hint();
        let mut entries = Vec::with_capacity(archive.len());

        for i in 0..archive.len() {
            let file = archive.by_index_raw(i).map_err(|e| reject(e.to_string()))?;

            // Names without the UTF-8 flag are in the creator's code page
            let (path, _) = encoding::decode_bytes(file.name_raw(), hint);
            let is_dir = file.is_dir();

            entries.push(Entry {
                handle: EntryHandle(i),
                path,
                size: (!is_dir).then(|| file.size()),
                compressed_size: (!is_dir).then(|| file.compressed_size()),
                modified: file.last_modified().and_then(dos_time_to_unix),
            });
        }

        Ok(ArchiveHandle::new(ArchiveFormat::Zip, source, entries))
    }

    fn for_each_file(&self, handle: &ArchiveHandle, visit: &mut EntryVisitor<'_>) -> Result<()> {
        let mut archive = open_archive(handle.source())?;

        for entry in handle.entries().iter().filter(|e| !e.is_directory()) {
            let mut file = archive.by_index(entry.handle.index())?;
            visit(entry, &mut file)?;
        }
        Ok(())
    }

    fn read_entry(&self, handle: &ArchiveHandle, entry: &Entry, sink: &mut dyn Write) -> Result<u64> {
        let mut archive = open_archive(handle.source())?;
        let mut file = archive.by_index(entry.handle.index())?;
        Ok(io::copy(&mut file, sink)?)
    }

    fn write(&self, destination: &Path, entries: &[PendingEntry]) -> Result<()> {
        let out = BufWriter::new(File::create(destination)?);
        let mut writer = zip::ZipWriter::new(out);
        let options = SimpleFileOptions::default()
            .compression_method(CompressionMethod::Deflated)
            .unix_permissions(0o644);

        for entry in entries {
            match &entry.source {
                None => {
                    writer.add_directory(format!("{}/", entry.path), options.unix_permissions(0o755))?;
                }
                Some(source) => {
                    let mut input = File::open(source)?;
                    let large = input.metadata()?.len() >= u32::MAX as u64;
                    writer.start_file(entry.path.clone(), options.large_file(large))?;
                    io::copy(&mut input, &mut writer)?;
                }
            }
        }

        writer.finish()?.flush()?;
        Ok(())
    }
}
