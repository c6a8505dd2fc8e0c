//! Archive engine
//!
//! Turns archives into folder trees and folder edits back into archives.
//!
//! Paths carry no marker for archive membership. To find out whether
//! `/sdcard/a.7z/b.tar/c.zip/d.txt` lives in an archive, the engine walks
//! up to the deepest ancestor that exists on disk, opens it as an archive
//! and then walks back down through synthesized trees, entering nested
//! archives as it meets them.
//!
//! Every edit is a full rewrite: the archive's entries are flattened to temp
//! files, transformed, validated, written to a new temp archive and swapped
//! in. A nested archive is swapped in by adding it to its parent, which
//! rewrites the parent in turn, all the way up to the disk.

use crate::entity::{Archive, Directory, Entity, RegularFile};
use crate::format::{self, ArchiveHandle, EntryHandle, PendingEntry};
use crate::temp::TempStore;
use crate::tree::{normalize_entry_path, EntryTree, TreeNode};
use crate::{Result, VfsError, VfsPath};
use std::collections::{HashMap, HashSet};
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

/// Edit applied to an archive's flattened entry list
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transform {
    /// Rewrite unchanged
    Identity,
    /// Append entries (later duplicates replace earlier ones)
    Add(Vec<PendingEntry>),
    /// Move `from` and everything under it to `to`
    Rename { from: String, to: String },
    /// Drop `path` and everything under it
    Delete(String),
}

impl Transform {
    fn apply(&self, mut entries: Vec<PendingEntry>) -> Vec<PendingEntry> {
        match self {
            Transform::Identity => entries,
            Transform::Add(extra) => {
                entries.extend(extra.iter().map(|e| PendingEntry {
                    source: e.source.clone(),
                    path: normalize_entry_path(&e.path),
                }));
                entries
            }
            Transform::Rename { from, to } => {
                let from = normalize_entry_path(from);
                let to = normalize_entry_path(to);
                let relocated: Vec<Option<String>> = entries
                    .iter()
                    .map(|e| {
                        strip_entry_prefix(&e.path, &from).map(|rest| {
                            if rest.is_empty() {
                                to.clone()
                            } else {
                                format!("{}/{}", to, rest)
                            }
                        })
                    })
                    .collect();

                // Moved entries replace whatever already sits at their new path
                let taken: HashSet<&str> = relocated.iter().flatten().map(String::as_str).collect();
                entries
                    .into_iter()
                    .zip(relocated.iter())
                    .filter_map(|(mut entry, moved)| match moved {
                        Some(path) => {
                            entry.path = path.clone();
                            Some(entry)
                        }
                        None if taken.contains(entry.path.as_str()) => None,
                        None => Some(entry),
                    })
                    .collect()
            }
            Transform::Delete(path) => {
                let path = normalize_entry_path(path);
                entries.retain(|e| strip_entry_prefix(&e.path, &path).is_none());
                entries
            }
        }
    }
}

/// Remainder of `path` below `prefix` on a segment boundary
fn strip_entry_prefix<'a>(path: &'a str, prefix: &str) -> Option<&'a str> {
    if path == prefix {
        return Some("");
    }
    path.strip_prefix(prefix)?.strip_prefix('/')
}

/// Reject entry sets where a file path is also used as a directory
fn validate(entries: &[PendingEntry]) -> Result<()> {
    let files: HashSet<&str> = entries
        .iter()
        .filter(|e| !e.is_directory())
        .map(|e| e.path.as_str())
        .collect();

    for entry in entries {
        if entry.is_directory() && files.contains(entry.path.as_str()) {
            return Err(VfsError::AmbiguousEntry(entry.path.clone()));
        }

        let mut end = 0;
        while let Some(pos) = entry.path[end..].find('/') {
            let prefix = &entry.path[..end + pos];
            if files.contains(prefix) {
                return Err(VfsError::AmbiguousEntry(prefix.to_string()));
            }
            end += pos + 1;
        }
    }
    Ok(())
}

/// Keep the last entry for each path, in the order those survivors appeared
fn dedupe_last_wins(entries: Vec<PendingEntry>) -> Vec<PendingEntry> {
    let mut seen = HashSet::new();
    let mut kept: Vec<PendingEntry> = entries
        .into_iter()
        .rev()
        .filter(|e| seen.insert(e.path.clone()))
        .collect();
    kept.reverse();
    kept
}

fn unix_mtime(meta: &fs::Metadata) -> Option<i64> {
    meta.modified()
        .ok()
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map(|d| d.as_secs() as i64)
}

/// Not found, or a path component is a regular file (ENOTDIR)
fn is_missing(e: &io::Error) -> bool {
    e.kind() == io::ErrorKind::NotFound || (cfg!(unix) && e.raw_os_error() == Some(20))
}

pub(crate) fn is_cross_device(e: &io::Error) -> bool {
    match e.raw_os_error() {
        Some(18) => cfg!(unix),
        Some(17) => cfg!(windows),
        _ => false,
    }
}

/// An archive opened with all of its winning file entries extracted
struct LoadedArchive {
    handle: ArchiveHandle,
    tree: EntryTree,
    /// Entry position -> extracted temp file
    extracted: HashMap<usize, PathBuf>,
}

/// Outcome of walking a path through disk and archives
enum Lookup {
    Found { entity: Entity, owner: Option<Archive> },
    Missing { owner: Option<Archive> },
}

#[derive(Debug, Clone, Default)]
pub struct ArchiveEngine {
    temp: TempStore,
}

impl ArchiveEngine {
    pub fn new(temp: TempStore) -> Self {
        Self { temp }
    }

    /// Entity for a path that exists on disk. Files are checked for archives.
    pub fn disk_entity(&self, path: &VfsPath) -> Result<Entity> {
        let meta = fs::metadata(path.to_path_buf()).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => VfsError::PathNotFound(path.to_string()),
            _ => VfsError::Io(e),
        })?;

        if meta.is_dir() {
            Ok(Entity::Directory(Directory::on_disk(path.clone(), unix_mtime(&meta))))
        } else {
            Ok(self.classify(RegularFile::on_disk(path.clone(), meta.len(), unix_mtime(&meta))))
        }
    }

    /// Archive if any format accepts the file's bytes, plain file otherwise
    pub fn classify(&self, file: RegularFile) -> Entity {
        match format::detect(file.content()) {
            Some(handle) => Entity::Archive(Archive::new(file, handle.format())),
            None => Entity::File(file),
        }
    }

    /// Children of a disk directory, sorted by name
    pub fn list_disk(&self, dir: &VfsPath) -> Result<Vec<Entity>> {
        let mut children = Vec::new();
        for entry in fs::read_dir(dir.to_path_buf())? {
            let entry = entry?;
            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                tracing::warn!("Skipping non UTF-8 name in {}", dir);
                continue;
            };
            match self.disk_entity(&dir.join(name)) {
                Ok(child) => children.push(child),
                // Dangling symlinks and entries removed while listing
                Err(VfsError::PathNotFound(p)) => tracing::debug!("Vanished while listing: {}", p),
                Err(e) => return Err(e),
            }
        }
        children.sort_by(|a, b| a.name().cmp(b.name()));
        Ok(children)
    }

    fn load(&self, archive: &Archive) -> Result<LoadedArchive> {
        let handle = format::open_as(archive.format(), archive.content())?;
        let tree = EntryTree::from_entries(handle.entries())?;

        let winners: HashMap<EntryHandle, usize> = tree
            .files()
            .map(|(_, position)| (handle.entries()[position].handle, position))
            .collect();

        let mut extracted = HashMap::with_capacity(winners.len());
        handle.for_each_file(&mut |entry, reader| {
            let Some(&position) = winners.get(&entry.handle) else {
                return Ok(());
            };
            let name = normalize_entry_path(&entry.path);
            let extension = name.rsplit('/').next().and_then(|n| {
                n.rsplit_once('.').filter(|(stem, _)| !stem.is_empty()).map(|(_, ext)| ext)
            });

            let target = self.temp.allocate("entry", extension)?;
            let mut out = BufWriter::new(File::create(&target)?);
            io::copy(reader, &mut out)?;
            out.flush()?;

            extracted.insert(position, target);
            Ok(())
        })?;

        tracing::debug!(
            "Loaded {} ({} entries, {} extracted)",
            archive.path(),
            handle.entries().len(),
            extracted.len()
        );

        Ok(LoadedArchive { handle, tree, extracted })
    }

    /// The archive as it is now. A nested archive entity points at the copy
    /// extracted when it was resolved, so it is looked up again.
    fn current(&self, archive: &Archive) -> Result<Archive> {
        if !archive.is_resident() {
            return Ok(archive.clone());
        }
        match self.resolve(archive.path())? {
            Entity::Archive(current) => Ok(current),
            _ => Err(VfsError::NotAnArchive(archive.path().to_string())),
        }
    }

    /// Synthesize the top level of an archive's folder tree.
    ///
    /// Directories are merged from explicit markers and implied parents.
    /// Every file is extracted to a temp file and checked, so nested archives
    /// come back as `Entity::Archive`.
    pub fn build_tree(&self, archive: &Archive) -> Result<Vec<Entity>> {
        let archive = self.current(archive)?;
        let loaded = self.load(&archive)?;
        self.entities_in(archive.path(), &loaded, "")
    }

    /// Children of a directory inside an archive, read from the archive again
    pub fn archive_directory_children(&self, dir: &VfsPath) -> Result<Vec<Entity>> {
        let owner = self
            .parent_archive_of(dir)?
            .ok_or_else(|| VfsError::NotAnArchive(dir.to_string()))?;
        let relative = dir.relative_to(owner.path())?;
        let loaded = self.load(&owner)?;
        if !loaded.tree.is_directory(&relative) {
            return Err(VfsError::PathNotFound(dir.to_string()));
        }
        self.entities_in(owner.path(), &loaded, &relative)
    }

    /// Entity for the file entry at `rel`, checked for a nested archive
    fn file_entity(&self, root: &VfsPath, loaded: &LoadedArchive, rel: &str, entry: usize) -> Result<Entity> {
        let raw = &loaded.handle.entries()[entry];
        let content = loaded
            .extracted
            .get(&entry)
            .cloned()
            .ok_or_else(|| VfsError::Archive(format!("entry {} was not extracted", rel)))?;
        let file = RegularFile::in_archive(root.join(rel), raw.size.unwrap_or(0), content, raw.compressed_size, raw.modified);
        Ok(self.classify(file))
    }

    fn directory_entity(&self, root: &VfsPath, loaded: &LoadedArchive, rel: &str) -> Entity {
        let modified = loaded.handle.entry_last_modified(rel);
        Entity::Directory(Directory::in_archive(root.join(rel), modified))
    }

    fn entities_in(&self, root: &VfsPath, loaded: &LoadedArchive, dir: &str) -> Result<Vec<Entity>> {
        loaded
            .tree
            .children(dir)
            .into_iter()
            .map(|(rel, node)| match node {
                TreeNode::File { entry } => self.file_entity(root, loaded, rel, entry),
                TreeNode::Directory { .. } => Ok(self.directory_entity(root, loaded, rel)),
            })
            .collect()
    }

    /// The archive's content as a flat, normalized entry list backed by temp files.
    ///
    /// Explicit directory markers are kept; implied directories are not.
    pub fn flatten(&self, archive: &Archive) -> Result<Vec<PendingEntry>> {
        let archive = self.current(archive)?;
        let loaded = self.load(&archive)?;
        let mut flat = Vec::new();

        for (position, entry) in loaded.handle.entries().iter().enumerate() {
            let path = normalize_entry_path(&entry.path);
            if path.is_empty() {
                continue;
            }
            match loaded.tree.get(&path) {
                Some(TreeNode::File { entry: winner }) if *winner == position => {
                    if let Some(source) = loaded.extracted.get(&position) {
                        flat.push(PendingEntry::file(source.clone(), path));
                    }
                }
                Some(TreeNode::Directory { explicit: true }) if entry.is_directory() => {
                    flat.push(PendingEntry::directory(path));
                }
                _ => {}
            }
        }

        Ok(flat)
    }

    /// Apply `transform` to `archive` and replace it with the result.
    ///
    /// Nothing is written when validation fails. A nested archive is
    /// replaced by adding the rewritten copy to its parent archive, so the
    /// change cascades up to the archive on disk.
    pub fn rewrite(&self, archive: &Archive, transform: Transform) -> Result<()> {
        let flat = self.flatten(archive)?;
        let entries = transform.apply(flat);
        validate(&entries)?;
        let entries = dedupe_last_wins(entries);

        let staged = self.temp.allocate("rewrite", archive.path().extension())?;
        archive.format().adapter().write(&staged, &entries)?;
        tracing::debug!(
            "Rewrote {} with {} entries into {}",
            archive.path(),
            entries.len(),
            staged.display()
        );

        if archive.is_resident() {
            let parent = self
                .parent_archive_of(archive.path())?
                .ok_or_else(|| VfsError::NotAnArchive(archive.path().to_string()))?;
            let relative = archive.path().relative_to(parent.path())?;
            tracing::debug!("Cascading {} into {}", archive.path(), parent.path());
            self.rewrite(&parent, Transform::Add(vec![PendingEntry::file(staged, relative)]))
        } else {
            replace_on_disk(&staged, &archive.path().to_path_buf())?;
            tracing::info!("Updated archive {}", archive.path());
            Ok(())
        }
    }

    fn lookup(&self, path: &VfsPath) -> Result<Lookup> {
        let mut anchor = path.clone();
        let mut rest: Vec<String> = Vec::new();

        loop {
            match fs::metadata(anchor.to_path_buf()) {
                Ok(_) => break,
                Err(e) if is_missing(&e) => {
                    rest.push(anchor.name().to_string());
                    anchor = match anchor.parent() {
                        Some(parent) => parent,
                        None => return Ok(Lookup::Missing { owner: None }),
                    };
                }
                Err(e) => return Err(e.into()),
            }
        }
        rest.reverse();

        let anchor_entity = self.disk_entity(&anchor)?;
        if rest.is_empty() {
            return Ok(Lookup::Found { entity: anchor_entity, owner: None });
        }

        let mut owner = match anchor_entity {
            Entity::Archive(archive) => archive,
            _ => return Ok(Lookup::Missing { owner: None }),
        };
        let mut loaded = self.load(&owner)?;
        let mut dir = String::new();

        for (depth, name) in rest.iter().enumerate() {
            let rel = if dir.is_empty() { name.clone() } else { format!("{}/{}", dir, name) };
            let last = depth + 1 == rest.len();

            match loaded.tree.get(&rel).copied() {
                None => return Ok(Lookup::Missing { owner: Some(owner) }),
                Some(TreeNode::Directory { .. }) => {
                    if last {
                        let entity = self.directory_entity(owner.path(), &loaded, &rel);
                        return Ok(Lookup::Found { entity, owner: Some(owner) });
                    }
                    dir = rel;
                }
                Some(TreeNode::File { entry }) => {
                    let entity = self.file_entity(owner.path(), &loaded, &rel, entry)?;
                    if last {
                        return Ok(Lookup::Found { entity, owner: Some(owner) });
                    }
                    match entity {
                        Entity::Archive(nested) => {
                            loaded = self.load(&nested)?;
                            owner = nested;
                            dir = String::new();
                        }
                        _ => return Ok(Lookup::Missing { owner: Some(owner) }),
                    }
                }
            }
        }

        Ok(Lookup::Missing { owner: Some(owner) })
    }

    /// Closest archive strictly enclosing `path`, or `None` for disk paths.
    ///
    /// Also answers for paths that do not exist yet: a new name inside an
    /// archive folder belongs to that archive.
    pub fn parent_archive_of(&self, path: &VfsPath) -> Result<Option<Archive>> {
        Ok(match self.lookup(path)? {
            Lookup::Found { owner, .. } | Lookup::Missing { owner } => owner,
        })
    }

    /// Entity at `path`, on disk or inside any number of archives
    pub fn resolve(&self, path: &VfsPath) -> Result<Entity> {
        match self.lookup(path)? {
            Lookup::Found { entity, .. } => Ok(entity),
            Lookup::Missing { .. } => Err(VfsError::PathNotFound(path.to_string())),
        }
    }

    /// Children of any folder-like entity except the root folder
    pub fn children(&self, entity: &Entity) -> Result<Vec<Entity>> {
        match entity {
            Entity::Archive(archive) => archive.files(self),
            Entity::Directory(dir) => dir.files(self),
            Entity::Drive(drive) => self.list_disk(drive.path()),
            Entity::File(file) => Err(VfsError::TypeMismatch(format!("{} is not a folder", file.path()))),
            Entity::Root(_) => Err(VfsError::UnsupportedOperation(
                "the root folder lists drives, not disk contents".to_string(),
            )),
        }
    }

    /// Add (or replace) entries in an archive
    pub fn add_files(&self, archive: &Archive, entries: Vec<PendingEntry>) -> Result<()> {
        self.rewrite(archive, Transform::Add(entries))
    }

    pub fn create_empty_file(&self, archive: &Archive, relative: &str) -> Result<()> {
        let empty = self.temp.allocate("empty", None)?;
        self.add_files(archive, vec![PendingEntry::file(empty, relative)])
    }

    pub fn create_empty_directory(&self, archive: &Archive, relative: &str) -> Result<()> {
        self.add_files(archive, vec![PendingEntry::directory(relative)])
    }

    pub fn rename_entry(&self, archive: &Archive, from: &str, to: &str) -> Result<()> {
        self.rewrite(
            archive,
            Transform::Rename {
                from: from.to_string(),
                to: to.to_string(),
            },
        )
    }

    pub fn delete_entry(&self, archive: &Archive, relative: &str) -> Result<()> {
        self.rewrite(archive, Transform::Delete(relative.to_string()))
    }
}

/// Move a staged file over `target`, copying when they are on different devices
fn replace_on_disk(staged: &Path, target: &Path) -> Result<()> {
    match fs::rename(staged, target) {
        Ok(()) => Ok(()),
        Err(e) if is_cross_device(&e) => {
            tracing::debug!("Cross-device replace of {}, copying", target.display());
            fs::copy(staged, target)?;
            fs::remove_file(staged)?;
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}
