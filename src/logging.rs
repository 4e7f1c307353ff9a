//! Log sinks for the process.
//!
//! Nothing here installs a global subscriber. `init` builds a single
//! `Dispatch` writing to the console and to the log file, and hands it out as
//! a `LogHandle` that components enter explicitly.

use anyhow::{Context, Result};
use std::io;
use std::path::Path;
use tracing::Dispatch;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::fmt::time::ChronoLocal;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Timestamp format used by both sinks.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Cheap-to-clone handle on the configured log sinks.
#[derive(Debug, Clone)]
pub struct LogHandle {
    dispatch: Dispatch,
}

impl LogHandle {
    pub fn new(dispatch: Dispatch) -> Self {
        Self { dispatch }
    }

    /// A handle that drops every event.
    pub fn disabled() -> Self {
        Self::new(Dispatch::none())
    }

    pub fn dispatch(&self) -> &Dispatch {
        &self.dispatch
    }

    /// Run `f` with this handle as the current subscriber on this thread.
    pub fn in_scope<T>(&self, f: impl FnOnce() -> T) -> T {
        tracing::dispatcher::with_default(&self.dispatch, f)
    }
}

/// Flushes the file sink when dropped. Keep it alive until exit.
#[must_use = "dropping the guard stops file logging"]
pub struct LogGuard {
    _file: WorkerGuard,
}

/// Set up console and file logging.
///
/// The log file is appended to; its directory is created if needed. Verbosity
/// follows `RUST_LOG`, defaulting to `info`.
pub fn init(log_file: &Path) -> Result<(LogHandle, LogGuard)> {
    let file_name = log_file
        .file_name()
        .with_context(|| format!("Log path has no file name: {}", log_file.display()))?;
    let dir = log_file
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));

    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create log directory: {}", dir.display()))?;

    let appender = RollingFileAppender::builder()
        .rotation(Rotation::NEVER)
        .filename_prefix(file_name.to_string_lossy())
        .build(dir)
        .with_context(|| format!("Failed to open log file: {}", log_file.display()))?;
    let (file_writer, guard) = tracing_appender::non_blocking(appender);

    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new("info"))?;

    let subscriber = tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_timer(ChronoLocal::new(TIMESTAMP_FORMAT.to_owned()))
                .with_target(false)
                .with_writer(io::stdout),
        )
        .with(
            fmt::layer()
                .with_timer(ChronoLocal::new(TIMESTAMP_FORMAT.to_owned()))
                .with_target(false)
                .with_ansi(false) // No ANSI colors in log files
                .with_writer(file_writer),
        );

    Ok((LogHandle::new(Dispatch::new(subscriber)), LogGuard { _file: guard }))
}
