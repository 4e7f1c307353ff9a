// Tree comparison module
// Walks a source and a replica tree side by side and classifies every path

use std::collections::BTreeMap;
use std::ffi::OsString;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use tracing::warn;

use crate::error::SyncError;
use crate::fs::{EntryKind, Filesystem};

/// Whether a path present in both trees needs work.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryStatus {
    Unchanged,
    Changed,
}

/// A path present under both roots.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommonEntry {
    pub source_kind: EntryKind,
    pub replica_kind: EntryKind,
    pub status: EntryStatus,
}

impl CommonEntry {
    /// A file on one side and a directory (or link) on the other.
    pub fn kind_changed(&self) -> bool {
        self.source_kind != self.replica_kind
    }

    pub fn is_changed(&self) -> bool {
        self.status == EntryStatus::Changed
    }
}

/// Three-way split of every relative path seen under either root.
///
/// Keys are paths relative to the roots. `BTreeMap` ordering puts a
/// directory before everything beneath it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Classification {
    pub source_only: BTreeMap<PathBuf, EntryKind>,
    pub replica_only: BTreeMap<PathBuf, EntryKind>,
    pub common: BTreeMap<PathBuf, CommonEntry>,
}

impl Classification {
    /// Nothing to add, remove or update.
    pub fn is_in_sync(&self) -> bool {
        self.source_only.is_empty()
            && self.replica_only.is_empty()
            && self.common.values().all(|entry| !entry.is_changed())
    }

    /// Total number of distinct paths classified.
    pub fn len(&self) -> usize {
        self.source_only.len() + self.replica_only.len() + self.common.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Topmost source-only entries; each is copied as a whole subtree.
    pub fn additions(&self) -> impl Iterator<Item = (&Path, EntryKind)> + '_ {
        self.source_only
            .iter()
            .filter(|(path, _)| self.is_subtree_root(path, &self.source_only))
            .map(|(path, kind)| (path.as_path(), *kind))
    }

    /// Topmost replica-only entries; each is removed as a whole subtree.
    pub fn removals(&self) -> impl Iterator<Item = (&Path, EntryKind)> + '_ {
        self.replica_only
            .iter()
            .filter(|(path, _)| self.is_subtree_root(path, &self.replica_only))
            .map(|(path, kind)| (path.as_path(), *kind))
    }

    /// Common entries that differ between the trees.
    pub fn updates(&self) -> impl Iterator<Item = (&Path, &CommonEntry)> + '_ {
        self.common
            .iter()
            .filter(|(_, entry)| entry.is_changed())
            .map(|(path, entry)| (path.as_path(), entry))
    }

    pub fn changed_count(&self) -> usize {
        self.common.values().filter(|entry| entry.is_changed()).count()
    }

    /// A path is handled on its own unless an ancestor already covers it:
    /// either the parent is in the same one-sided set, or the parent changed
    /// kind and will be replaced wholesale.
    fn is_subtree_root(&self, path: &Path, set: &BTreeMap<PathBuf, EntryKind>) -> bool {
        match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => {
                !set.contains_key(parent)
                    && !self.common.get(parent).is_some_and(CommonEntry::kind_changed)
            }
            _ => true,
        }
    }

    /// Format the classification as plain text for debug logs.
    pub fn to_plain_text(&self) -> String {
        let mut output = String::new();

        let _ = writeln!(output, "Summary:");
        let _ = writeln!(output, "  Source only:  {}", self.source_only.len());
        let _ = writeln!(output, "  Replica only: {}", self.replica_only.len());
        let _ = writeln!(output, "  Common:       {}", self.common.len());
        let _ = writeln!(output, "  Changed:      {}", self.changed_count());

        if !self.source_only.is_empty() {
            let _ = writeln!(output, "Only in source:");
            for (path, kind) in &self.source_only {
                let _ = writeln!(output, "  {} ({})", path.display(), kind);
            }
        }

        if !self.replica_only.is_empty() {
            let _ = writeln!(output, "Only in replica:");
            for (path, kind) in &self.replica_only {
                let _ = writeln!(output, "  {} ({})", path.display(), kind);
            }
        }

        let changed: Vec<_> = self.updates().collect();
        if !changed.is_empty() {
            let _ = writeln!(output, "Changed:");
            for (path, entry) in changed {
                if entry.kind_changed() {
                    let _ = writeln!(
                        output,
                        "  {} ({} -> {})",
                        path.display(),
                        entry.replica_kind,
                        entry.source_kind
                    );
                } else {
                    let _ = writeln!(output, "  {}", path.display());
                }
            }
        }

        output
    }
}

/// Read-only comparison of a source tree against a replica tree.
pub struct TreeComparator<'a, F: Filesystem> {
    fs: &'a F,
}

impl<'a, F: Filesystem> TreeComparator<'a, F> {
    pub fn new(fs: &'a F) -> Self {
        Self { fs }
    }

    /// Classify every path under `source_root` and `replica_root`.
    ///
    /// # Errors
    /// Returns `SyncError::FilesystemAccess` if any directory on either side
    /// cannot be listed.
    pub fn compare(&self, source_root: &Path, replica_root: &Path) -> Result<Classification, SyncError> {
        let mut classification = Classification::default();
        self.compare_dir(source_root, replica_root, Path::new(""), &mut classification)?;
        Ok(classification)
    }

    /// Compare one directory level and recurse. Returns whether anything at
    /// or below `rel` differs.
    fn compare_dir(
        &self,
        source_root: &Path,
        replica_root: &Path,
        rel: &Path,
        out: &mut Classification,
    ) -> Result<bool, SyncError> {
        let source_entries = self.list(&source_root.join(rel), true)?;
        let mut replica_entries = self.list(&replica_root.join(rel), false)?;
        let mut dirty = false;

        for (name, source_kind) in source_entries {
            let path = rel.join(&name);

            let Some(replica_kind) = replica_entries.remove(&name) else {
                dirty = true;
                self.collect_one_sided(source_root, &path, source_kind, true, &mut out.source_only)?;
                continue;
            };

            let status = if source_kind != replica_kind {
                // Descendants on either side still get classified, but the
                // whole entry is replaced in one go
                if source_kind.is_dir() {
                    self.collect_children(source_root, &path, true, &mut out.source_only)?;
                }
                if replica_kind.is_dir() {
                    self.collect_children(replica_root, &path, false, &mut out.replica_only)?;
                }
                EntryStatus::Changed
            } else if source_kind.is_dir() {
                if self.compare_dir(source_root, replica_root, &path, out)? {
                    EntryStatus::Changed
                } else {
                    EntryStatus::Unchanged
                }
            } else {
                self.compare_files(&source_root.join(&path), &replica_root.join(&path))
            };

            dirty |= status == EntryStatus::Changed;
            out.common.insert(
                path,
                CommonEntry {
                    source_kind,
                    replica_kind,
                    status,
                },
            );
        }

        for (name, replica_kind) in replica_entries {
            dirty = true;
            self.collect_one_sided(replica_root, &rel.join(name), replica_kind, false, &mut out.replica_only)?;
        }

        Ok(dirty)
    }

    fn compare_files(&self, source: &Path, replica: &Path) -> EntryStatus {
        match self.fs.same_contents(source, replica) {
            Ok(true) => EntryStatus::Unchanged,
            Ok(false) => EntryStatus::Changed,
            Err(err) => {
                warn!(
                    source = %source.display(),
                    replica = %replica.display(),
                    "Cannot compare files, treating as changed: {err}"
                );
                EntryStatus::Changed
            }
        }
    }

    /// Record a path that exists on one side only, plus everything below it.
    fn collect_one_sided(
        &self,
        root: &Path,
        path: &Path,
        kind: EntryKind,
        follow_symlinks: bool,
        set: &mut BTreeMap<PathBuf, EntryKind>,
    ) -> Result<(), SyncError> {
        if kind.is_dir() {
            self.collect_children(root, path, follow_symlinks, set)?;
        }
        set.insert(path.to_path_buf(), kind);
        Ok(())
    }

    fn collect_children(
        &self,
        root: &Path,
        dir: &Path,
        follow_symlinks: bool,
        set: &mut BTreeMap<PathBuf, EntryKind>,
    ) -> Result<(), SyncError> {
        let mut pending = vec![dir.to_path_buf()];

        while let Some(current) = pending.pop() {
            for (name, kind) in self.list(&root.join(&current), follow_symlinks)? {
                let path = current.join(name);
                if kind.is_dir() {
                    pending.push(path.clone());
                }
                set.insert(path, kind);
            }
        }

        Ok(())
    }

    fn list(&self, dir: &Path, follow_symlinks: bool) -> Result<BTreeMap<OsString, EntryKind>, SyncError> {
        let entries = self
            .fs
            .list_dir(dir, follow_symlinks)
            .map_err(|err| SyncError::access(dir, err))?;
        Ok(entries.into_iter().map(|entry| (entry.name, entry.kind)).collect())
    }
}
