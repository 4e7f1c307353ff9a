use clap::Parser;
use std::process::ExitCode;
use tokio_util::sync::CancellationToken;

use foldersync::config::{Cli, MirrorConfig};
use foldersync::fs::LocalFs;
use foldersync::logging;
use foldersync::shutdown;
use foldersync::sync::{Scheduler, SyncCycle};

/// Exit code for invalid arguments, matching clap's usage errors.
const USAGE_ERROR: u8 = 2;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let config = match MirrorConfig::from_cli(cli) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("error: {err}");
            return ExitCode::from(USAGE_ERROR);
        }
    };

    let (log, _guard) = match logging::init(&config.log_file) {
        Ok(logging) => logging,
        Err(err) => {
            eprintln!("error: {err:#}");
            return ExitCode::FAILURE;
        }
    };

    let cancel = CancellationToken::new();
    let signal_log = log.clone();
    let token = cancel.clone();
    tokio::spawn(async move {
        let listener = signal_log.clone();
        shutdown::escalate(move || shutdown::next_signal(listener.clone()), token, signal_log).await;
        std::process::exit(shutdown::FORCED_EXIT_CODE);
    });

    let cycle = SyncCycle::new(LocalFs, config.source, config.replica, log).with_cancellation(cancel.clone());
    let mut scheduler = Scheduler::new(cycle, config.interval, cancel);

    // Errors were logged by the scheduler before it stopped
    match scheduler.run().await {
        Ok(_) => ExitCode::SUCCESS,
        Err(_) => ExitCode::FAILURE,
    }
}
