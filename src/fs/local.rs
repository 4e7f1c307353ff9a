use std::fs::{self, FileType, Metadata};
use std::io;
use std::path::{Component, Path, PathBuf};

use tracing::{debug, warn};

use crate::fs::backend::Filesystem;
use crate::fs::copy;
use crate::fs::types::{DirEntry, EntryKind};

/// The host filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalFs;

impl LocalFs {
    /// Lexically normalize a path: drop `.` and resolve `..` without touching
    /// the filesystem.
    pub fn normalize_path(path: &Path) -> PathBuf {
        let mut normalized = PathBuf::new();

        for component in path.components() {
            match component {
                Component::ParentDir => {
                    normalized.pop();
                }
                Component::CurDir => {}
                _ => normalized.push(component),
            }
        }

        if normalized.as_os_str().is_empty() {
            normalized.push("/");
        }

        normalized
    }

    /// Whether a directory link points back at one of its own ancestors.
    fn links_to_ancestor(link: &Path) -> bool {
        let Ok(target) = fs::canonicalize(link) else {
            return false;
        };
        link.ancestors()
            .skip(1)
            .any(|ancestor| fs::canonicalize(ancestor).is_ok_and(|a| a == target))
    }

    /// Resolve the metadata used to classify `path`, or `None` to leave the
    /// entry out of the listing.
    fn resolve(path: &Path, file_type: FileType, follow_symlinks: bool) -> io::Result<Option<Metadata>> {
        let result = if file_type.is_symlink() && follow_symlinks {
            fs::metadata(path)
        } else {
            fs::symlink_metadata(path)
        };

        match result {
            Ok(metadata) => {
                if file_type.is_symlink() && follow_symlinks && metadata.is_dir() && Self::links_to_ancestor(path) {
                    warn!(path = %path.display(), "Skipping symlink that loops back to an ancestor directory");
                    return Ok(None);
                }
                Ok(Some(metadata))
            }
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                if file_type.is_symlink() {
                    warn!(path = %path.display(), "Skipping dangling symlink");
                } else {
                    debug!(path = %path.display(), "Entry vanished while listing");
                }
                Ok(None)
            }
            Err(err) => Err(err),
        }
    }

    fn kind_of(metadata: &Metadata) -> EntryKind {
        let file_type = metadata.file_type();
        if file_type.is_dir() {
            EntryKind::Directory
        } else if file_type.is_file() {
            EntryKind::File
        } else if file_type.is_symlink() {
            EntryKind::Symlink
        } else {
            EntryKind::Special
        }
    }
}

impl Filesystem for LocalFs {
    fn list_dir(&self, dir: &Path, follow_symlinks: bool) -> io::Result<Vec<DirEntry>> {
        let mut entries = Vec::new();

        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            let path = entry.path();
            let file_type = match entry.file_type() {
                Ok(file_type) => file_type,
                Err(err) if err.kind() == io::ErrorKind::NotFound => continue,
                Err(err) => return Err(err),
            };

            let Some(metadata) = Self::resolve(&path, file_type, follow_symlinks)? else {
                continue;
            };
            let kind = Self::kind_of(&metadata);

            // Sockets, FIFOs and devices cannot be mirrored by copying bytes
            if follow_symlinks && kind == EntryKind::Special {
                warn!(path = %path.display(), "Skipping special file");
                continue;
            }

            let size = if kind == EntryKind::File { metadata.len() } else { 0 };
            entries.push(DirEntry::new(entry.file_name(), kind, size));
        }

        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }

    fn entry_kind(&self, path: &Path) -> io::Result<Option<EntryKind>> {
        match fs::metadata(path) {
            Ok(metadata) => Ok(Some(Self::kind_of(&metadata))),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err),
        }
    }

    fn same_contents(&self, a: &Path, b: &Path) -> io::Result<bool> {
        copy::same_contents(a, b)
    }

    fn copy_file(&self, from: &Path, to: &Path) -> io::Result<u64> {
        copy::copy_file_atomic(from, to)
    }

    fn remove_file(&self, path: &Path) -> io::Result<()> {
        fs::remove_file(path)
    }

    fn remove_dir_all(&self, path: &Path) -> io::Result<()> {
        fs::remove_dir_all(path)
    }

    fn create_dir_all(&self, path: &Path) -> io::Result<()> {
        fs::create_dir_all(path)
    }
}
