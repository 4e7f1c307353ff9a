//! Runs sync cycles on a fixed interval until cancelled.
//!
//! `Idle -> Syncing -> Sleeping -> Syncing -> ... -> Stopped`. Cycles never
//! overlap: the sleep starts only after the previous cycle has returned, and
//! only the sleep is raced against cancellation.

use chrono::Local;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::instrument::WithSubscriber;
use tracing::{error, info, warn};

use crate::error::SyncError;
use crate::fs::{Filesystem, LocalFs};
use crate::sync::cycle::SyncCycle;
use crate::sync::reconcile::SyncResult;

/// Where the scheduler is in its loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SchedulerState {
    /// Created, not started.
    #[default]
    Idle,
    /// A cycle is running.
    Syncing,
    /// Waiting for the next tick.
    Sleeping,
    /// Cancelled, or stopped by a fatal error.
    Stopped,
}

/// Periodic driver for a `SyncCycle`.
pub struct Scheduler<F: Filesystem + 'static = LocalFs> {
    cycle: Arc<SyncCycle<F>>,
    interval: Duration,
    cancel: CancellationToken,
    state: SchedulerState,
    cycles_run: u64,
}

impl<F: Filesystem + 'static> Scheduler<F> {
    pub fn new(cycle: SyncCycle<F>, interval: Duration, cancel: CancellationToken) -> Self {
        Self {
            cycle: Arc::new(cycle),
            interval,
            cancel,
            state: SchedulerState::Idle,
            cycles_run: 0,
        }
    }

    pub fn state(&self) -> SchedulerState {
        self.state
    }

    /// Cycles started so far.
    pub fn cycles_run(&self) -> u64 {
        self.cycles_run
    }

    /// Loop until cancelled. Returns the number of cycles run.
    ///
    /// # Errors
    /// Only fatal configuration errors end the loop with an error; anything
    /// else is logged and retried on the next tick.
    pub async fn run(&mut self) -> Result<u64, SyncError> {
        let dispatch = self.cycle.log().dispatch().clone();
        self.run_loop().with_subscriber(dispatch).await
    }

    async fn run_loop(&mut self) -> Result<u64, SyncError> {
        info!(
            source = %self.cycle.source().display(),
            replica = %self.cycle.replica().display(),
            interval_secs = self.interval.as_secs(),
            "Mirroring started"
        );

        while !self.cancel.is_cancelled() {
            self.state = SchedulerState::Syncing;
            self.cycles_run += 1;

            match self.run_cycle().await {
                Ok(result) if result.errors() > 0 => {
                    warn!(errors = result.errors(), "Cycle finished with errors, failed entries will be retried");
                }
                Ok(_) => {}
                Err(err) if err.is_fatal() => {
                    self.state = SchedulerState::Stopped;
                    error!(cycles = self.cycles_run, "Stopping: {err}");
                    return Err(err);
                }
                Err(_) => {
                    warn!("Cycle failed, retrying after the interval");
                }
            }

            if self.cancel.is_cancelled() {
                break;
            }

            self.state = SchedulerState::Sleeping;
            // Intervals past chrono's calendar range get no timestamp
            if let Some(next) = chrono::Duration::from_std(self.interval)
                .ok()
                .and_then(|delay| Local::now().checked_add_signed(delay))
            {
                info!("Next synchronization at {}", next.format("%Y-%m-%d %H:%M:%S"));
            }

            tokio::select! {
                () = self.cancel.cancelled() => break,
                () = tokio::time::sleep(self.interval) => {}
            }
        }

        self.state = SchedulerState::Stopped;
        info!(cycles = self.cycles_run, "Shutdown requested, mirroring stopped");
        Ok(self.cycles_run)
    }

    /// Run one cycle on the blocking pool and wait for it.
    async fn run_cycle(&self) -> Result<SyncResult, SyncError> {
        let cycle = Arc::clone(&self.cycle);

        match tokio::task::spawn_blocking(move || cycle.run_once()).await {
            Ok(outcome) => outcome,
            Err(join_err) => {
                let reason = if join_err.is_panic() {
                    "cycle panicked".to_string()
                } else {
                    "cycle task was cancelled".to_string()
                };
                error!("Synchronization cycle aborted: {reason}");
                Err(SyncError::CycleAborted { reason })
            }
        }
    }
}
