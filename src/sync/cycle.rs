//! One compare-and-reconcile pass.

use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::error::SyncError;
use crate::fs::{EntryKind, Filesystem, LocalFs};
use crate::logging::LogHandle;
use crate::sync::compare::TreeComparator;
use crate::sync::reconcile::{Reconciler, SyncResult};

/// A source/replica pair and everything needed to mirror one onto the other.
pub struct SyncCycle<F: Filesystem = LocalFs> {
    fs: F,
    source: PathBuf,
    replica: PathBuf,
    log: LogHandle,
    cancel: CancellationToken,
}

impl<F: Filesystem> SyncCycle<F> {
    pub fn new(fs: F, source: impl Into<PathBuf>, replica: impl Into<PathBuf>, log: LogHandle) -> Self {
        Self {
            fs,
            source: source.into(),
            replica: replica.into(),
            log,
            cancel: CancellationToken::new(),
        }
    }

    /// Share a cancellation token so a pass can stop between entries.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn source(&self) -> &Path {
        &self.source
    }

    pub fn replica(&self) -> &Path {
        &self.replica
    }

    pub fn log(&self) -> &LogHandle {
        &self.log
    }

    /// Run one full pass: check preconditions, compare, reconcile.
    ///
    /// Entry-level failures are reported inside the returned `SyncResult`.
    ///
    /// # Errors
    /// Configuration problems (see `SyncError::is_fatal`) and directories that
    /// cannot be read or created.
    pub fn run_once(&self) -> Result<SyncResult, SyncError> {
        self.log.in_scope(|| {
            let outcome = self.run_logged();
            if let Err(err) = &outcome {
                if err.is_fatal() {
                    error!("Configuration error, cannot synchronize: {err}");
                } else {
                    error!("Synchronization cycle failed: {err}");
                }
            }
            outcome
        })
    }

    fn run_logged(&self) -> Result<SyncResult, SyncError> {
        info!(
            source = %self.source.display(),
            replica = %self.replica.display(),
            "Starting synchronization"
        );

        self.check_source()?;
        self.prepare_replica()?;

        let classification = TreeComparator::new(&self.fs).compare(&self.source, &self.replica)?;
        info!(
            source_only = classification.source_only.len(),
            replica_only = classification.replica_only.len(),
            changed = classification.changed_count(),
            "Comparison finished"
        );
        if classification.is_in_sync() {
            info!("Replica is already up to date");
            debug!("Comparison report:\n{}", classification.to_plain_text());
        } else {
            info!("Comparison report:\n{}", classification.to_plain_text());
        }

        let result = Reconciler::new(&self.fs)
            .with_cancellation(&self.cancel)
            .apply(&classification, &self.source, &self.replica);

        info!(
            copied = result.copied,
            removed = result.removed,
            updated = result.updated,
            errors = result.errors(),
            bytes = result.bytes_copied,
            duration_ms = result.duration.as_millis() as u64,
            interrupted = result.interrupted,
            "Synchronization finished"
        );
        Ok(result)
    }

    fn check_source(&self) -> Result<(), SyncError> {
        match self.fs.entry_kind(&self.source) {
            Ok(Some(EntryKind::Directory)) => Ok(()),
            Ok(Some(_)) => Err(SyncError::SourceNotDirectory {
                path: self.source.clone(),
            }),
            Ok(None) => Err(SyncError::SourceMissing {
                path: self.source.clone(),
            }),
            Err(err) => Err(SyncError::access(&self.source, err)),
        }
    }

    fn prepare_replica(&self) -> Result<(), SyncError> {
        match self.fs.entry_kind(&self.replica) {
            Ok(Some(EntryKind::Directory)) => Ok(()),
            Ok(Some(_)) => Err(SyncError::ReplicaNotDirectory {
                path: self.replica.clone(),
            }),
            Ok(None) => {
                self.fs
                    .create_dir_all(&self.replica)
                    .map_err(|err| SyncError::access(&self.replica, err))?;
                info!(replica = %self.replica.display(), "Replica directory created");
                Ok(())
            }
            Err(err) => Err(SyncError::access(&self.replica, err)),
        }
    }
}
