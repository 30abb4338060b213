//! The polling loop.
//!
//! One cycle loads the store, asks the reconciler what fires in the current
//! window, notifies each firing alert in stored order and then removes the
//! one-shot alerts that fired. Nothing inside a cycle is fatal: an
//! unreadable store counts as empty and notifier or rewrite failures are
//! logged. Only the shutdown future ends the loop.

use std::future::Future;
use std::time::Duration;

use chrono::{Local, NaiveDateTime};
use tokio::time::MissedTickBehavior;

use crate::alerts::notify::Notifier;
use crate::alerts::reconciler::{decide_window, PollWindow};
use crate::alerts::record::AlertId;
use crate::alerts::store::AlertStore;

/// Lifecycle of the daemon loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DaemonState {
    /// Built but not yet started
    Idle,
    Running,
    /// Terminal; a stopped daemon never runs again
    Stopped,
}

/// What a single poll cycle did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub fired: Vec<AlertId>,
    pub failed: Vec<AlertId>,
    pub removed: usize,
    pub invalid: usize,
}

/// Totals over the daemon's lifetime
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DaemonStats {
    pub cycles: u64,
    pub fired: u64,
    pub failed: u64,
    pub removed: u64,
}

impl DaemonStats {
    fn record(&mut self, report: &CycleReport) {
        self.cycles += 1;
        self.fired += report.fired.len() as u64;
        self.failed += report.failed.len() as u64;
        self.removed += report.removed as u64;
    }
}

/// Source of "now" for the loop, local time
pub type Clock = Box<dyn Fn() -> NaiveDateTime + Send + Sync>;

fn local_now() -> NaiveDateTime {
    Local::now().naive_local()
}

/// Run one poll cycle over `window`
///
/// Every fired one-shot alert is removed, including those whose notification
/// failed. A broken notifier is logged once per alert instead of on every poll.
pub fn run_cycle(store: &AlertStore, notifier: &dyn Notifier, window: PollWindow) -> CycleReport {
    let records = match store.load() {
        Ok(records) => records,
        Err(e) => {
            tracing::warn!(error = %e, "alert store unreadable, treating as empty");
            Vec::new()
        }
    };

    let decision = decide_window(window, &records);
    let mut report = CycleReport {
        invalid: decision.invalid.len(),
        ..Default::default()
    };

    for (id, err) in &decision.invalid {
        tracing::warn!(id, error = %err, "skipping alert with invalid timespec");
    }

    for record in &decision.to_fire {
        match notifier.notify(&record.render()) {
            Ok(()) => {
                tracing::info!(id = record.id, mode = %record.mode, "alert fired");
                report.fired.push(record.id);
            }
            Err(e) => {
                tracing::warn!(id = record.id, error = %e, "notification failed");
                report.failed.push(record.id);
            }
        }
    }

    let to_delete = decision.to_delete;
    if !to_delete.is_empty() {
        match store.remove_many(&to_delete) {
            Ok(removed) => report.removed = removed,
            Err(e) => tracing::error!(error = %e, ids = ?to_delete, "failed to remove fired alerts"),
        }
    }

    report
}

/// Fixed-interval polling daemon
pub struct Daemon {
    store: AlertStore,
    notifier: Box<dyn Notifier>,
    interval: Duration,
    clock: Clock,
    state: DaemonState,
}

impl Daemon {
    pub fn new(store: AlertStore, notifier: Box<dyn Notifier>, interval: Duration) -> Self {
        Self {
            store,
            notifier,
            interval: interval.max(Duration::from_millis(1)),
            clock: Box::new(local_now),
            state: DaemonState::Idle,
        }
    }

    /// Replace the wall clock (used by tests)
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    pub fn state(&self) -> DaemonState {
        self.state
    }

    /// Poll until `shutdown` resolves; the first cycle runs immediately
    pub async fn run<F>(&mut self, shutdown: F) -> DaemonStats
    where
        F: Future<Output = ()>,
    {
        let mut stats = DaemonStats::default();
        if self.state != DaemonState::Idle {
            tracing::warn!(state = ?self.state, "daemon already started, not running again");
            return stats;
        }

        let interval = chrono::Duration::from_std(self.interval)
            .unwrap_or_else(|_| chrono::Duration::minutes(1));
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tokio::pin!(shutdown);

        let mut previous: Option<PollWindow> = None;
        self.state = DaemonState::Running;
        tracing::info!(
            store = %self.store.path().display(),
            interval_secs = self.interval.as_secs_f64(),
            "daemon running"
        );

        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                _ = ticker.tick() => {
                    let now = (self.clock)();
                    let window = match &previous {
                        Some(prev) => PollWindow::following(prev, now, interval),
                        None => PollWindow::ending_at(now, interval),
                    };
                    let report = run_cycle(&self.store, self.notifier.as_ref(), window);
                    tracing::debug!(
                        fired = report.fired.len(),
                        failed = report.failed.len(),
                        removed = report.removed,
                        "poll cycle finished"
                    );
                    stats.record(&report);
                    previous = Some(window);
                }
            }
        }

        self.state = DaemonState::Stopped;
        tracing::info!(cycles = stats.cycles, fired = stats.fired, "daemon stopped");
        stats
    }
}

/// Resolves on SIGINT or SIGTERM
pub async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut terminate) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {}
                    _ = terminate.recv() => {}
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "cannot listen for SIGTERM, only Ctrl-C stops the daemon");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }

    tracing::info!("shutdown signal received");
}
