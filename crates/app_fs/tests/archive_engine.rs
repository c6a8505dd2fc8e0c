use app_fs::{
    ArchiveFormat, Entity, FileOperations, FileSystem, PendingEntry, Transform, VfsConfig,
    VfsError, VfsPath,
};
use std::fs;
use std::io::Write;
use std::path::Path;
use tempfile::TempDir;
use zip::write::SimpleFileOptions;

struct Fixture {
    _tmp: TempDir,
    vfs: FileSystem,
    disk: VfsPath,
    scratch: std::path::PathBuf,
}

fn fixture() -> Fixture {
    let tmp = TempDir::new().unwrap();
    let disk = tmp.path().join("disk");
    let scratch = tmp.path().join("inputs");
    fs::create_dir_all(&disk).unwrap();
    fs::create_dir_all(&scratch).unwrap();

    let config = VfsConfig {
        temp_dir: Some(tmp.path().join("temp")),
        drives: vec![],
    };
    Fixture {
        vfs: FileSystem::new(&config).unwrap(),
        disk: VfsPath::from_os(&disk).unwrap(),
        scratch,
        _tmp: tmp,
    }
}

/// photos.zip: ["vacation/", "vacation/beach.jpg", "readme.txt"]
fn write_photos_zip(path: &Path) {
    let mut zip = zip::ZipWriter::new(fs::File::create(path).unwrap());
    let options = SimpleFileOptions::default();
    zip.add_directory("vacation/", options).unwrap();
    zip.start_file("vacation/beach.jpg", options).unwrap();
    zip.write_all(b"sand and sea").unwrap();
    zip.start_file("readme.txt", options).unwrap();
    zip.write_all(b"holiday pictures").unwrap();
    zip.finish().unwrap();
}

fn zip_names(path: &Path) -> Vec<String> {
    let mut archive = zip::ZipArchive::new(fs::File::open(path).unwrap()).unwrap();
    (0..archive.len())
        .map(|i| archive.by_index(i).unwrap().name().to_string())
        .collect()
}

fn names(entities: &[Entity]) -> Vec<String> {
    let mut names: Vec<String> = entities.iter().map(|e| e.name().to_string()).collect();
    names.sort();
    names
}

fn archive_at(vfs: &FileSystem, path: &VfsPath) -> app_fs::Archive {
    match vfs.resolve(path).unwrap() {
        Entity::Archive(archive) => archive,
        other => panic!("{} is not an archive: {:?}", path, other.kind()),
    }
}

fn child(entities: Vec<Entity>, name: &str) -> Entity {
    entities.into_iter().find(|e| e.name() == name).unwrap()
}

#[test]
fn photos_tree_is_synthesized() {
    let fx = fixture();
    let zip_path = fx.disk.join("photos.zip");
    write_photos_zip(&zip_path.to_path_buf());

    let archive = archive_at(&fx.vfs, &zip_path);
    assert_eq!(archive.format(), ArchiveFormat::Zip);

    let root = fx.vfs.engine().build_tree(&archive).unwrap();
    assert_eq!(names(&root), vec!["readme.txt", "vacation"]);

    let vacation = child(root, "vacation");
    assert!(matches!(vacation, Entity::Directory(_)));
    assert!(vacation.is_resident());
    let inside = fx.vfs.files(&vacation).unwrap();
    assert_eq!(names(&inside), vec!["beach.jpg"]);

    let beach = child(inside, "beach.jpg");
    assert_eq!(beach.path(), &zip_path.join("vacation/beach.jpg"));
    assert_eq!(beach.as_file().unwrap().read_to_vec().unwrap(), b"sand and sea");
    assert!(beach.compressed_size().is_some());
}

#[test]
fn photos_rename_directory_relocates_marker_and_children() {
    let fx = fixture();
    let zip_path = fx.disk.join("photos.zip");
    write_photos_zip(&zip_path.to_path_buf());

    let vacation = fx.vfs.resolve(&zip_path.join("vacation")).unwrap();
    let renamed = fx.vfs.rename(&vacation, "trip").unwrap();
    assert_eq!(renamed, zip_path.join("trip"));

    assert_eq!(
        zip_names(&zip_path.to_path_buf()),
        vec!["trip/", "trip/beach.jpg", "readme.txt"]
    );
}

#[test]
fn photos_add_file_into_existing_directory() {
    let fx = fixture();
    let zip_path = fx.disk.join("photos.zip");
    write_photos_zip(&zip_path.to_path_buf());

    let new_file = fx.scratch.join("new.txt");
    fs::write(&new_file, b"fresh").unwrap();

    let archive = archive_at(&fx.vfs, &zip_path);
    archive
        .add_files(fx.vfs.engine(), vec![PendingEntry::file(&new_file, "vacation/new.txt")])
        .unwrap();

    let archive = archive_at(&fx.vfs, &zip_path);
    let vacation = child(archive.files(fx.vfs.engine()).unwrap(), "vacation");
    assert_eq!(names(&fx.vfs.files(&vacation).unwrap()), vec!["beach.jpg", "new.txt"]);
}

#[test]
fn photos_file_used_as_directory_is_rejected_untouched() {
    let fx = fixture();
    let zip_path = fx.disk.join("photos.zip");
    write_photos_zip(&zip_path.to_path_buf());
    let before = fs::read(zip_path.to_path_buf()).unwrap();

    let extra = fx.scratch.join("extra");
    fs::write(&extra, b"x").unwrap();

    let archive = archive_at(&fx.vfs, &zip_path);
    let err = fx
        .vfs
        .engine()
        .add_files(&archive, vec![PendingEntry::file(&extra, "readme.txt/extra")])
        .unwrap_err();
    assert!(matches!(err, VfsError::AmbiguousEntry(ref p) if p == "readme.txt"));

    assert_eq!(fs::read(zip_path.to_path_buf()).unwrap(), before);
}

#[test]
fn identity_rewrite_keeps_entry_set() {
    let fx = fixture();
    let zip_path = fx.disk.join("photos.zip");
    write_photos_zip(&zip_path.to_path_buf());

    let archive = archive_at(&fx.vfs, &zip_path);
    fx.vfs.engine().rewrite(&archive, Transform::Identity).unwrap();

    let mut after = zip_names(&zip_path.to_path_buf());
    after.sort();
    assert_eq!(after, vec!["readme.txt", "vacation/", "vacation/beach.jpg"]);
}

#[test]
fn delete_removes_entry_and_descendants() {
    let fx = fixture();
    let zip_path = fx.disk.join("photos.zip");
    write_photos_zip(&zip_path.to_path_buf());

    let vacation = fx.vfs.resolve(&zip_path.join("vacation")).unwrap();
    fx.vfs.delete(&vacation).unwrap();

    assert_eq!(zip_names(&zip_path.to_path_buf()), vec!["readme.txt"]);
    assert!(matches!(
        fx.vfs.resolve(&zip_path.join("vacation/beach.jpg")),
        Err(VfsError::PathNotFound(_))
    ));
}

/// outer.7z > middle.tar > inner.zip > deep/target.txt
fn write_nested(fx: &Fixture) -> VfsPath {
    let target = fx.scratch.join("target.txt");
    let keep = fx.scratch.join("keep.txt");
    fs::write(&target, b"three levels down").unwrap();
    fs::write(&keep, b"stays").unwrap();

    let inner = fx.scratch.join("inner.zip");
    ArchiveFormat::Zip
        .adapter()
        .write(
            &inner,
            &[PendingEntry::file(&target, "deep/target.txt"), PendingEntry::file(&keep, "keep.txt")],
        )
        .unwrap();

    let middle = fx.scratch.join("middle.tar");
    ArchiveFormat::Tar
        .adapter()
        .write(&middle, &[PendingEntry::file(&inner, "inner.zip")])
        .unwrap();

    let outer = fx.disk.join("outer.7z");
    ArchiveFormat::SevenZip
        .adapter()
        .write(&outer.to_path_buf(), &[PendingEntry::file(&middle, "middle.tar")])
        .unwrap();

    outer
}

#[test]
fn parent_archive_of_nested_layers() {
    let fx = fixture();
    let outer = write_nested(&fx);
    let middle = outer.join("middle.tar");
    let inner = middle.join("inner.zip");
    let target = inner.join("deep/target.txt");

    let owner = fx.vfs.parent_archive_of(&target).unwrap().unwrap();
    assert_eq!(owner.path(), &inner);
    assert_eq!(owner.format(), ArchiveFormat::Zip);

    let owner = fx.vfs.parent_archive_of(&inner).unwrap().unwrap();
    assert_eq!(owner.path(), &middle);
    assert_eq!(owner.format(), ArchiveFormat::Tar);

    let owner = fx.vfs.parent_archive_of(&middle).unwrap().unwrap();
    assert_eq!(owner.path(), &outer);
    assert_eq!(owner.format(), ArchiveFormat::SevenZip);

    assert!(fx.vfs.parent_archive_of(&outer).unwrap().is_none());
    assert!(fx.vfs.parent_archive_of(&fx.disk.join("nothing/here.txt")).unwrap().is_none());
}

#[test]
fn delete_cascades_through_every_layer() {
    let fx = fixture();
    let outer = write_nested(&fx);
    let inner = outer.join("middle.tar/inner.zip");
    let target = fx.vfs.resolve(&inner.join("deep/target.txt")).unwrap();

    fx.vfs.delete(&target).unwrap();

    // Every layer is still readable as its own format after the rewrite
    let outer_archive = archive_at(&fx.vfs, &outer);
    assert_eq!(outer_archive.format(), ArchiveFormat::SevenZip);
    let middle = child(outer_archive.files(fx.vfs.engine()).unwrap(), "middle.tar");
    assert_eq!(middle.as_archive().unwrap().format(), ArchiveFormat::Tar);
    let inner_archive = archive_at(&fx.vfs, &inner);
    assert_eq!(inner_archive.format(), ArchiveFormat::Zip);

    let remaining = inner_archive.files(fx.vfs.engine()).unwrap();
    assert_eq!(names(&remaining), vec!["keep.txt"]);
    assert!(!fx.vfs.exists(&inner.join("deep/target.txt")).unwrap());
}

#[test]
fn copy_disk_folder_into_nested_archive() {
    let fx = fixture();
    let outer = write_nested(&fx);
    let inner = outer.join("middle.tar/inner.zip");

    let src = fx.disk.join("album");
    fs::create_dir_all(src.join("empty").to_path_buf()).unwrap();
    fs::write(src.join("one.txt").to_path_buf(), b"1").unwrap();
    fs::write(src.join("two.txt").to_path_buf(), b"22").unwrap();

    let source = fx.vfs.resolve(&src).unwrap();
    let destination = fx.vfs.resolve(&inner.join("deep")).unwrap();
    let copied = fx.vfs.copy(&source, &destination, None).unwrap();
    assert_eq!(copied, inner.join("deep/album"));

    let album = fx.vfs.resolve(&copied).unwrap();
    assert_eq!(names(&fx.vfs.files(&album).unwrap()), vec!["empty", "one.txt", "two.txt"]);
    assert!(fx.vfs.exists(&inner.join("deep/target.txt")).unwrap());

    let stats = fx.vfs.contents_statistics(&album).unwrap();
    assert_eq!((stats.files, stats.directories, stats.total_size), (2, 1, 3));
}

#[test]
fn move_out_of_archive_to_disk() {
    let fx = fixture();
    let zip_path = fx.disk.join("photos.zip");
    write_photos_zip(&zip_path.to_path_buf());

    let readme = fx.vfs.resolve(&zip_path.join("readme.txt")).unwrap();
    let drive_dir = fx.vfs.resolve(&fx.disk).unwrap();
    let moved = fx.vfs.move_to(&readme, &drive_dir).unwrap();

    assert_eq!(moved, fx.disk.join("readme.txt"));
    assert_eq!(fs::read(moved.to_path_buf()).unwrap(), b"holiday pictures");
    assert_eq!(zip_names(&zip_path.to_path_buf()), vec!["vacation/", "vacation/beach.jpg"]);
}

#[test]
fn move_within_one_archive_is_a_rename() {
    let fx = fixture();
    let zip_path = fx.disk.join("photos.zip");
    write_photos_zip(&zip_path.to_path_buf());

    let readme = fx.vfs.resolve(&zip_path.join("readme.txt")).unwrap();
    let vacation = fx.vfs.resolve(&zip_path.join("vacation")).unwrap();
    fx.vfs.move_to(&readme, &vacation).unwrap();

    assert_eq!(
        zip_names(&zip_path.to_path_buf()),
        vec!["vacation/", "vacation/beach.jpg", "vacation/readme.txt"]
    );
}

#[test]
fn create_inside_archive_and_reject_duplicates() {
    let fx = fixture();
    let zip_path = fx.disk.join("photos.zip");
    write_photos_zip(&zip_path.to_path_buf());

    let archive = fx.vfs.resolve(&zip_path).unwrap();
    fx.vfs.create_directory(&archive, "albums").unwrap();
    fx.vfs.create_file(&archive, "todo.txt").unwrap();
    assert!(matches!(
        fx.vfs.create_file(&archive, "readme.txt"),
        Err(VfsError::AlreadyExists(_))
    ));

    let root = fx.vfs.files(&archive).unwrap();
    assert_eq!(names(&root), vec!["albums", "readme.txt", "todo.txt", "vacation"]);
    assert_eq!(child(root, "todo.txt").size(), Some(0));
}

#[test]
fn move_onto_existing_name_in_same_archive_keeps_moved_file() {
    let fx = fixture();
    let old = fx.scratch.join("old.txt");
    let new = fx.scratch.join("new.txt");
    fs::write(&old, b"OLD").unwrap();
    fs::write(&new, b"NEW").unwrap();

    let zip_path = fx.disk.join("notes.zip");
    ArchiveFormat::Zip
        .adapter()
        .write(
            &zip_path.to_path_buf(),
            &[PendingEntry::file(&old, "readme.txt"), PendingEntry::file(&new, "drafts/readme.txt")],
        )
        .unwrap();

    let draft = fx.vfs.resolve(&zip_path.join("drafts/readme.txt")).unwrap();
    let archive = fx.vfs.resolve(&zip_path).unwrap();
    fx.vfs.move_to(&draft, &archive).unwrap();

    let moved = fx.vfs.resolve(&zip_path.join("readme.txt")).unwrap();
    assert_eq!(moved.as_file().unwrap().read_to_vec().unwrap(), b"NEW");
    assert!(!fx.vfs.exists(&zip_path.join("drafts/readme.txt")).unwrap());
    assert_eq!(zip_names(&zip_path.to_path_buf()), vec!["readme.txt"]);
}

#[test]
fn move_between_two_archives() {
    let fx = fixture();
    let photos = fx.disk.join("photos.zip");
    write_photos_zip(&photos.to_path_buf());
    let backup = fx.disk.join("backup.tar");
    ArchiveFormat::Tar.adapter().write(&backup.to_path_buf(), &[]).unwrap();

    let vacation = fx.vfs.resolve(&photos.join("vacation")).unwrap();
    let destination = fx.vfs.resolve(&backup).unwrap();
    let moved = fx.vfs.move_to(&vacation, &destination).unwrap();
    assert_eq!(moved, backup.join("vacation"));

    let beach = fx.vfs.resolve(&backup.join("vacation/beach.jpg")).unwrap();
    assert_eq!(beach.as_file().unwrap().read_to_vec().unwrap(), b"sand and sea");
    assert_eq!(zip_names(&photos.to_path_buf()), vec!["readme.txt"]);
}

#[test]
fn rename_inside_nested_archive_cascades_upward() {
    let fx = fixture();
    let outer = write_nested(&fx);
    let inner = outer.join("middle.tar/inner.zip");

    let target = fx.vfs.resolve(&inner.join("deep/target.txt")).unwrap();
    let renamed = fx.vfs.rename(&target, "found.txt").unwrap();
    assert_eq!(renamed, inner.join("deep/found.txt"));

    assert!(!fx.vfs.exists(&inner.join("deep/target.txt")).unwrap());
    let found = fx.vfs.resolve(&renamed).unwrap();
    assert_eq!(found.as_file().unwrap().read_to_vec().unwrap(), b"three levels down");
    assert!(fx.vfs.exists(&inner.join("keep.txt")).unwrap());
    assert_eq!(archive_at(&fx.vfs, &outer).format(), ArchiveFormat::SevenZip);
}

#[test]
fn repeated_copies_through_one_nested_archive_entity() {
    let fx = fixture();
    let outer = write_nested(&fx);
    let inner = outer.join("middle.tar/inner.zip");

    fs::write(fx.disk.join("one.txt").to_path_buf(), b"1").unwrap();
    fs::write(fx.disk.join("two.txt").to_path_buf(), b"2").unwrap();
    let one = fx.vfs.resolve(&fx.disk.join("one.txt")).unwrap();
    let two = fx.vfs.resolve(&fx.disk.join("two.txt")).unwrap();

    // The destination is resolved once and reused for both copies
    let destination = fx.vfs.resolve(&inner).unwrap();
    fx.vfs.copy(&one, &destination, None).unwrap();
    fx.vfs.copy(&two, &destination, None).unwrap();

    assert_eq!(
        names(&fx.vfs.files(&destination).unwrap()),
        vec!["deep", "keep.txt", "one.txt", "two.txt"]
    );
}

#[test]
fn directory_listing_follows_later_changes() {
    let fx = fixture();
    let outer = write_nested(&fx);
    let deep = fx.vfs.resolve(&outer.join("middle.tar/inner.zip/deep")).unwrap();
    assert_eq!(names(&fx.vfs.files(&deep).unwrap()), vec!["target.txt"]);

    fx.vfs.create_file(&deep, "later.txt").unwrap();
    assert_eq!(names(&fx.vfs.files(&deep).unwrap()), vec!["later.txt", "target.txt"]);
}

#[test]
fn gzipped_tar_nested_in_zip() {
    let fx = fixture();
    let notes = fx.scratch.join("notes.txt");
    fs::write(&notes, b"compressed twice").unwrap();
    let bundle = fx.scratch.join("bundle.tgz");
    ArchiveFormat::Tar
        .adapter()
        .write(&bundle, &[PendingEntry::file(&notes, "notes.txt")])
        .unwrap();

    let pack = fx.disk.join("pack.zip");
    ArchiveFormat::Zip
        .adapter()
        .write(&pack.to_path_buf(), &[PendingEntry::file(&bundle, "bundle.tgz")])
        .unwrap();

    let nested = pack.join("bundle.tgz");
    assert_eq!(archive_at(&fx.vfs, &nested).format(), ArchiveFormat::Tar);
    let inside = fx.vfs.resolve(&nested.join("notes.txt")).unwrap();
    assert_eq!(inside.as_file().unwrap().read_to_vec().unwrap(), b"compressed twice");

    let archive = fx.vfs.resolve(&nested).unwrap();
    fx.vfs.create_file(&archive, "added.txt").unwrap();

    let archive = archive_at(&fx.vfs, &nested);
    assert_eq!(names(&archive.files(fx.vfs.engine()).unwrap()), vec!["added.txt", "notes.txt"]);
    assert_eq!(zip_names(&pack.to_path_buf()), vec!["bundle.tgz"]);
}
