//! Applies a classification to the replica tree.
//!
//! Additions, then removals, then updates. Every entry is handled on its own:
//! a failed copy or delete is logged, recorded and skipped.

use chrono::{DateTime, Local};
use std::path::Path;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::error::{EntryOperation, EntryOperationError};
use crate::fs::{EntryKind, Filesystem};
use crate::sync::compare::{Classification, CommonEntry};

/// Outcome of one reconciliation pass.
#[derive(Debug)]
pub struct SyncResult {
    /// Entries (files or whole directory trees) newly copied into the replica.
    pub copied: usize,
    /// Entries removed from the replica.
    pub removed: usize,
    /// Entries overwritten or replaced.
    pub updated: usize,
    /// Bytes written to the replica.
    pub bytes_copied: u64,
    /// Entry-level failures, in the order they happened.
    pub failures: Vec<EntryOperationError>,
    /// Set when cancellation cut the pass short.
    pub interrupted: bool,
    /// When the pass started.
    pub started_at: DateTime<Local>,
    /// Wall time spent.
    pub duration: Duration,
}

impl SyncResult {
    pub fn new() -> Self {
        Self {
            copied: 0,
            removed: 0,
            updated: 0,
            bytes_copied: 0,
            failures: Vec::new(),
            interrupted: false,
            started_at: Local::now(),
            duration: Duration::ZERO,
        }
    }

    /// Number of entries that failed.
    pub fn errors(&self) -> usize {
        self.failures.len()
    }

    /// Total mutations applied.
    pub fn mutations(&self) -> usize {
        self.copied + self.removed + self.updated
    }

    /// Nothing was changed and nothing failed.
    pub fn is_noop(&self) -> bool {
        self.mutations() == 0 && self.failures.is_empty()
    }

    fn record_failure(&mut self, failure: EntryOperationError) {
        if failure.is_permission_denied() {
            error!(path = %failure.path.display(), "Permission denied: {failure}");
        } else {
            error!(path = %failure.path.display(), "{failure}");
        }
        self.failures.push(failure);
    }
}

impl Default for SyncResult {
    fn default() -> Self {
        Self::new()
    }
}

/// Applies mutations to the replica so it matches the source.
pub struct Reconciler<'a, F: Filesystem> {
    fs: &'a F,
    cancel: Option<&'a CancellationToken>,
}

impl<'a, F: Filesystem> Reconciler<'a, F> {
    pub fn new(fs: &'a F) -> Self {
        Self { fs, cancel: None }
    }

    /// Stop between entries once `cancel` fires.
    pub fn with_cancellation(mut self, cancel: &'a CancellationToken) -> Self {
        self.cancel = Some(cancel);
        self
    }

    /// Apply `classification` to `replica_root`. The source is only read.
    pub fn apply(&self, classification: &Classification, source_root: &Path, replica_root: &Path) -> SyncResult {
        let started = Instant::now();
        let mut result = SyncResult::new();

        let additions: Vec<_> = classification.additions().collect();
        let removals: Vec<_> = classification.removals().collect();
        let updates: Vec<_> = classification.updates().collect();
        let total = additions.len() + removals.len() + updates.len();
        let mut done = 0;

        for (path, kind) in additions {
            if self.stop_requested(&mut result, total - done) {
                break;
            }
            self.add(path, kind, source_root, replica_root, &mut result);
            done += 1;
        }

        for (path, kind) in removals {
            if self.stop_requested(&mut result, total - done) {
                break;
            }
            self.remove(path, kind, replica_root, &mut result);
            done += 1;
        }

        for (path, entry) in updates {
            if self.stop_requested(&mut result, total - done) {
                break;
            }
            self.update(path, entry, source_root, replica_root, &mut result);
            done += 1;
        }

        result.duration = started.elapsed();
        result
    }

    fn stop_requested(&self, result: &mut SyncResult, remaining: usize) -> bool {
        if result.interrupted {
            return true;
        }
        if self.cancel.is_some_and(CancellationToken::is_cancelled) {
            warn!(remaining, "Cancellation requested, leaving remaining entries for the next run");
            result.interrupted = true;
            return true;
        }
        false
    }

    fn add(&self, path: &Path, kind: EntryKind, source_root: &Path, replica_root: &Path, result: &mut SyncResult) {
        let (from, to) = (source_root.join(path), replica_root.join(path));

        if kind.is_dir() {
            info!(path = %path.display(), "Copying directory");
            match self.fs.copy_dir(&from, &to) {
                Ok(stats) => {
                    info!(path = %path.display(), files = stats.files, bytes = stats.bytes, "Directory copied");
                    result.copied += 1;
                    result.bytes_copied += stats.bytes;
                }
                Err(err) => result.record_failure(EntryOperationError::new(EntryOperation::CopyDirectory, path, err)),
            }
        } else {
            info!(path = %path.display(), "Copying file");
            match self.fs.copy_file(&from, &to) {
                Ok(bytes) => {
                    info!(path = %path.display(), bytes, "File copied");
                    result.copied += 1;
                    result.bytes_copied += bytes;
                }
                Err(err) => result.record_failure(EntryOperationError::new(EntryOperation::CopyFile, path, err)),
            }
        }
    }

    fn remove(&self, path: &Path, kind: EntryKind, replica_root: &Path, result: &mut SyncResult) {
        let target = replica_root.join(path);
        let operation = if kind.is_dir() {
            EntryOperation::RemoveDirectory
        } else {
            EntryOperation::RemoveFile
        };

        info!(path = %path.display(), %kind, "Removing");
        match self.fs.remove(&target, kind) {
            Ok(()) => {
                info!(path = %path.display(), %kind, "Removed");
                result.removed += 1;
            }
            Err(err) => result.record_failure(EntryOperationError::new(operation, path, err)),
        }
    }

    fn update(&self, path: &Path, entry: &CommonEntry, source_root: &Path, replica_root: &Path, result: &mut SyncResult) {
        let (from, to) = (source_root.join(path), replica_root.join(path));

        if entry.kind_changed() {
            info!(
                path = %path.display(),
                from = %entry.replica_kind,
                to = %entry.source_kind,
                "Replacing entry that changed kind"
            );
            let operation = if entry.replica_kind.is_dir() {
                EntryOperation::RemoveDirectory
            } else {
                EntryOperation::RemoveFile
            };
            if let Err(err) = self.fs.remove(&to, entry.replica_kind) {
                result.record_failure(EntryOperationError::new(operation, path, err));
                return;
            }

            let copied = if entry.source_kind.is_dir() {
                self.fs
                    .copy_dir(&from, &to)
                    .map(|stats| stats.bytes)
                    .map_err(|err| EntryOperationError::new(EntryOperation::CopyDirectory, path, err))
            } else {
                self.fs
                    .copy_file(&from, &to)
                    .map_err(|err| EntryOperationError::new(EntryOperation::CopyFile, path, err))
            };
            match copied {
                Ok(bytes) => {
                    info!(path = %path.display(), bytes, "Entry replaced");
                    result.updated += 1;
                    result.bytes_copied += bytes;
                }
                Err(failure) => result.record_failure(failure),
            }
        } else if entry.source_kind.is_dir() {
            // Children carry their own classification entries
            debug!(path = %path.display(), "Directory merged");
        } else {
            info!(path = %path.display(), "Updating file");
            match self.fs.copy_file(&from, &to) {
                Ok(bytes) => {
                    info!(path = %path.display(), bytes, "File updated");
                    result.updated += 1;
                    result.bytes_copied += bytes;
                }
                Err(err) => result.record_failure(EntryOperationError::new(EntryOperation::OverwriteFile, path, err)),
            }
        }
    }
}
