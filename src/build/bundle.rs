// ABOUTME: Deterministic tar bundles of a directory tree.
// ABOUTME: Sorted entries and normalised metadata make identical trees hash identically.

use std::fs;
use std::io;
use std::path::Path;
use tar::{EntryType, Header};
use walkdir::WalkDir;

/// Pack `root` into a tar archive whose bytes depend only on file names,
/// contents, the executable bit, and symlink targets.
pub fn pack_dir(root: &Path) -> io::Result<Vec<u8>> {
    let mut builder = tar::Builder::new(Vec::new());
    builder.follow_symlinks(false);

    for entry in WalkDir::new(root)
        .min_depth(1)
        .follow_links(false)
        .sort_by_file_name()
    {
        let entry = entry?;
        let rel = entry
            .path()
            .strip_prefix(root)
            .map_err(|e| io::Error::other(e.to_string()))?;
        let file_type = entry.file_type();

        let mut header = Header::new_gnu();
        header.set_mtime(0);
        header.set_uid(0);
        header.set_gid(0);

        if file_type.is_dir() {
            header.set_entry_type(EntryType::Directory);
            header.set_mode(0o755);
            header.set_size(0);
            builder.append_data(&mut header, rel, io::empty())?;
        } else if file_type.is_symlink() {
            let target = fs::read_link(entry.path())?;
            header.set_entry_type(EntryType::Symlink);
            header.set_mode(0o777);
            header.set_size(0);
            builder.append_link(&mut header, rel, target)?;
        } else if file_type.is_file() {
            let data = fs::read(entry.path())?;
            let mode = if is_executable(&entry.metadata().map_err(io::Error::from)?) {
                0o755
            } else {
                0o644
            };
            header.set_entry_type(EntryType::Regular);
            header.set_mode(mode);
            header.set_size(data.len() as u64);
            builder.append_data(&mut header, rel, data.as_slice())?;
        }
    }

    builder.into_inner()
}

/// Unpack a bundle produced by [`pack_dir`] into `dest`.
pub fn unpack(bytes: &[u8], dest: &Path) -> io::Result<()> {
    fs::create_dir_all(dest)?;
    tar::Archive::new(bytes).unpack(dest)
}

#[cfg(unix)]
fn is_executable(metadata: &fs::Metadata) -> bool {
    use std::os::unix::fs::PermissionsExt;
    metadata.permissions().mode() & 0o111 != 0
}

#[cfg(not(unix))]
fn is_executable(_metadata: &fs::Metadata) -> bool {
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_tree(root: &Path) {
        fs::create_dir_all(root.join("static/css")).unwrap();
        fs::write(root.join("index.html"), "<h1>hello</h1>").unwrap();
        fs::write(root.join("static/css/site.css"), "body {}").unwrap();
    }

    #[test]
    fn identical_trees_pack_identically() {
        let a = tempfile::tempdir().unwrap();
        let b = tempfile::tempdir().unwrap();
        write_tree(a.path());
        write_tree(b.path());

        assert_eq!(pack_dir(a.path()).unwrap(), pack_dir(b.path()).unwrap());
    }

    #[test]
    fn content_change_changes_bundle() {
        let a = tempfile::tempdir().unwrap();
        let b = tempfile::tempdir().unwrap();
        write_tree(a.path());
        write_tree(b.path());
        fs::write(b.path().join("index.html"), "<h1>bye</h1>").unwrap();

        assert_ne!(pack_dir(a.path()).unwrap(), pack_dir(b.path()).unwrap());
    }

    #[test]
    fn unpack_restores_files() {
        let src = tempfile::tempdir().unwrap();
        write_tree(src.path());
        let bundle = pack_dir(src.path()).unwrap();

        let dest = tempfile::tempdir().unwrap();
        unpack(&bundle, dest.path()).unwrap();

        assert_eq!(
            fs::read_to_string(dest.path().join("static/css/site.css")).unwrap(),
            "body {}"
        );
    }

    #[test]
    fn empty_dir_packs_to_empty_archive() {
        let empty = tempfile::tempdir().unwrap();
        let bundle = pack_dir(empty.path()).unwrap();
        let mut archive = tar::Archive::new(bundle.as_slice());
        assert_eq!(archive.entries().unwrap().count(), 0);
    }
}
