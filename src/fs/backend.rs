use std::io;
use std::path::Path;

use crate::fs::types::{CopyStats, DirEntry, EntryKind};

/// Filesystem primitives the sync engine is built on.
///
/// Every method acts on absolute paths and holds OS resources only for the
/// duration of the call. `LocalFs` is the real implementation; tests wrap it
/// to inject failures.
pub trait Filesystem: Send + Sync {
    /// List the immediate children of `dir`.
    ///
    /// With `follow_symlinks`, links report the kind of their target and
    /// dangling or self-referencing links are left out. Without it, links are
    /// reported as `EntryKind::Symlink`.
    fn list_dir(&self, dir: &Path, follow_symlinks: bool) -> io::Result<Vec<DirEntry>>;

    /// Kind of the entry at `path` (links followed), or `None` if absent.
    fn entry_kind(&self, path: &Path) -> io::Result<Option<EntryKind>>;

    /// Exact byte equality of two regular files.
    fn same_contents(&self, a: &Path, b: &Path) -> io::Result<bool>;

    /// Copy one file's bytes, permissions and timestamps, replacing `to`.
    /// Returns the number of bytes written.
    fn copy_file(&self, from: &Path, to: &Path) -> io::Result<u64>;

    fn remove_file(&self, path: &Path) -> io::Result<()>;

    /// Remove a directory and everything below it. Links are not followed.
    fn remove_dir_all(&self, path: &Path) -> io::Result<()>;

    fn create_dir_all(&self, path: &Path) -> io::Result<()>;

    /// Copy a directory tree, creating `to` and any missing parents.
    ///
    /// Stops at the first failure; whatever was copied so far stays in place
    /// and is picked up by the next comparison.
    fn copy_dir(&self, from: &Path, to: &Path) -> io::Result<CopyStats> {
        self.create_dir_all(to)?;
        let mut stats = CopyStats {
            dirs: 1,
            ..CopyStats::default()
        };

        for entry in self.list_dir(from, true)? {
            let src = from.join(&entry.name);
            let dst = to.join(&entry.name);

            if entry.kind.is_dir() {
                stats += self.copy_dir(&src, &dst)?;
            } else {
                stats.bytes += self.copy_file(&src, &dst)?;
                stats.files += 1;
            }
        }

        Ok(stats)
    }

    /// Remove whatever sits at `path`, recursively for directories.
    fn remove(&self, path: &Path, kind: EntryKind) -> io::Result<()> {
        if kind.is_dir() {
            self.remove_dir_all(path)
        } else {
            self.remove_file(path)
        }
    }
}

impl<F: Filesystem + ?Sized> Filesystem for &F {
    fn list_dir(&self, dir: &Path, follow_symlinks: bool) -> io::Result<Vec<DirEntry>> {
        (**self).list_dir(dir, follow_symlinks)
    }

    fn entry_kind(&self, path: &Path) -> io::Result<Option<EntryKind>> {
        (**self).entry_kind(path)
    }

    fn same_contents(&self, a: &Path, b: &Path) -> io::Result<bool> {
        (**self).same_contents(a, b)
    }

    fn copy_file(&self, from: &Path, to: &Path) -> io::Result<u64> {
        (**self).copy_file(from, to)
    }

    fn remove_file(&self, path: &Path) -> io::Result<()> {
        (**self).remove_file(path)
    }

    fn remove_dir_all(&self, path: &Path) -> io::Result<()> {
        (**self).remove_dir_all(path)
    }

    fn create_dir_all(&self, path: &Path) -> io::Result<()> {
        (**self).create_dir_all(path)
    }

    fn copy_dir(&self, from: &Path, to: &Path) -> io::Result<CopyStats> {
        (**self).copy_dir(from, to)
    }
}
