// remind-daemon: Background poller that fires due alerts
//
// Responsibilities:
// - Poll the alert file on a fixed interval (default 60s)
// - Notify each due alert, then drop delivered one-shot alerts from the file
// - Keep a PID file so the CLI can report status and a second daemon refuses to start
// - Exit cleanly on SIGINT/SIGTERM

use anyhow::{Context, Result};
use clap::Parser;
use remind_lib::alerts::{
    config::{Config, NotifierKind},
    daemon::{shutdown_signal, Daemon},
    notify,
    store::AlertStore,
};
use std::path::PathBuf;
use std::time::Duration;

/// Poll the alert file and fire notifications when alerts come due.
#[derive(Parser)]
#[command(name = "remind-daemon", version, about)]
struct Args {
    /// Alert file to watch instead of ~/.remind/alerts
    #[arg(short, long, env = "REMIND_FILE")]
    file: Option<PathBuf>,

    /// Seconds between polls
    #[arg(short, long, env = "REMIND_POLL_INTERVAL_SECS")]
    interval: Option<u64>,

    /// Notification backend: desktop, terminal or log
    #[arg(short, long, env = "REMIND_NOTIFIER")]
    notifier: Option<NotifierKind>,
}

fn main() -> Result<()> {
    remind_lib::logging::init(remind_lib::logging::DAEMON_FILTER);
    let args = Args::parse();

    let mut config = Config::from_env();
    if let Some(file) = args.file {
        config.alerts_file = file;
    }
    if let Some(secs) = args.interval.filter(|s| *s > 0) {
        config.poll_interval = Duration::from_secs(secs);
    }
    if let Some(kind) = args.notifier {
        config.notifier = kind;
    }

    config
        .ensure_dirs()
        .context("Failed to create state directory")?;

    if config.is_daemon_running() {
        tracing::error!(pid = ?config.read_pid(), "daemon already running");
        std::process::exit(1);
    }

    config.write_pid().context("Failed to write PID file")?;

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .enable_io()
        .build()
        .context("Failed to start async runtime")?;

    let store = AlertStore::new(&config.alerts_file);
    let mut daemon = Daemon::new(store, notify::from_kind(config.notifier), config.poll_interval);
    tracing::info!(notifier = %config.notifier, pid = std::process::id(), "starting remind-daemon");

    runtime.block_on(daemon.run(shutdown_signal()));

    if let Err(e) = config.remove_pid() {
        tracing::warn!(error = %e, "failed to remove PID file");
    }

    Ok(())
}
