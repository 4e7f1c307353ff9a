// Centralized error handling module
// Cycle-level, startup and per-entry error types with the paths involved

use std::fmt;
use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Errors that end a sync cycle.
///
/// Configuration errors are fatal for the process: retrying without an
/// operator fixing the paths cannot succeed. Everything else only fails the
/// current cycle; the scheduler tries again on the next tick.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("source directory not found: {}", path.display())]
    SourceMissing { path: PathBuf },

    #[error("source path is not a directory: {}", path.display())]
    SourceNotDirectory { path: PathBuf },

    #[error("replica path exists but is not a directory: {}", path.display())]
    ReplicaNotDirectory { path: PathBuf },

    #[error("cannot access {}: {source}", path.display())]
    FilesystemAccess {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("sync cycle aborted: {reason}")]
    CycleAborted { reason: String },
}

impl SyncError {
    /// Build a `FilesystemAccess` error for `path`.
    pub fn access(path: impl Into<PathBuf>, source: io::Error) -> Self {
        SyncError::FilesystemAccess {
            path: path.into(),
            source,
        }
    }

    /// Whether this error should stop the scheduler instead of being retried.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            SyncError::SourceMissing { .. }
                | SyncError::SourceNotDirectory { .. }
                | SyncError::ReplicaNotDirectory { .. }
        )
    }
}

/// Errors found while validating the command line, before any cycle runs.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("source and replica are the same directory: {}", path.display())]
    SameDirectory { path: PathBuf },

    #[error("{} and {} are nested inside each other", outer.display(), inner.display())]
    NestedTrees { outer: PathBuf, inner: PathBuf },

    #[error("log file {} must not live inside the replica {}", log_file.display(), replica.display())]
    LogInsideReplica { log_file: PathBuf, replica: PathBuf },

    #[error("cannot resolve the current directory: {0}")]
    CurrentDir(#[source] io::Error),
}

/// The mutation that was being attempted when an entry failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryOperation {
    CopyFile,
    CopyDirectory,
    RemoveFile,
    RemoveDirectory,
    OverwriteFile,
}

impl fmt::Display for EntryOperation {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            EntryOperation::CopyFile => "copy file",
            EntryOperation::CopyDirectory => "copy directory",
            EntryOperation::RemoveFile => "remove file",
            EntryOperation::RemoveDirectory => "remove directory",
            EntryOperation::OverwriteFile => "overwrite file",
        };
        f.write_str(name)
    }
}

/// A single copy or delete that failed. Recorded and skipped, never fatal.
#[derive(Debug, Error)]
#[error("{operation} failed for {}: {source}", path.display())]
pub struct EntryOperationError {
    pub operation: EntryOperation,
    /// Path relative to the tree roots.
    pub path: PathBuf,
    #[source]
    pub source: io::Error,
}

impl EntryOperationError {
    pub fn new(operation: EntryOperation, path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self {
            operation,
            path: path.into(),
            source,
        }
    }

    /// Permission problems are the usual cause; worth calling out in logs.
    pub fn is_permission_denied(&self) -> bool {
        self.source.kind() == io::ErrorKind::PermissionDenied
    }
}
