//! Decides which alerts fire on a poll.
//!
//! Pure logic: no clock reads and no I/O. The daemon passes in the poll
//! window and the records it loaded and applies the resulting [`Decision`].

use chrono::{Duration, NaiveDateTime};

use crate::alerts::error::TimespecError;
use crate::alerts::record::{AlertId, AlertMode, AlertRecord};
use crate::alerts::timespec::{parse_timestamp, truncate_to_minute, Recurrence};

/// The span of time one poll is responsible for: `(start, end]`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollWindow {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

impl PollWindow {
    /// Window covering one poll interval that ends at `now`
    pub fn ending_at(now: NaiveDateTime, interval: Duration) -> Self {
        let end = truncate_to_minute(now);
        Self {
            start: end - interval.max(Duration::minutes(1)),
            end,
        }
    }

    /// Window following `previous`, clamped to one interval after a long gap
    ///
    /// A gap longer than two intervals means the host was suspended or the
    /// daemon stalled; missed recurring occurrences are not replayed then.
    pub fn following(previous: &PollWindow, now: NaiveDateTime, interval: Duration) -> Self {
        let end = truncate_to_minute(now);
        if end - previous.end > interval * 2 || end < previous.end {
            return Self::ending_at(now, interval);
        }
        Self {
            start: previous.end,
            end,
        }
    }
}

/// What a poll must do
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Decision {
    /// Alerts to notify, in stored order
    pub to_fire: Vec<AlertRecord>,
    /// One-shot alerts to remove once every notification is dispatched
    pub to_delete: Vec<AlertId>,
    /// Alerts whose timespec could not be resolved; left untouched
    pub invalid: Vec<(AlertId, TimespecError)>,
}

impl Decision {
    pub fn is_empty(&self) -> bool {
        self.to_fire.is_empty() && self.to_delete.is_empty() && self.invalid.is_empty()
    }
}

/// Decide using the window `(now - interval, now]`
pub fn decide(now: NaiveDateTime, interval: Duration, records: &[AlertRecord]) -> Decision {
    decide_window(PollWindow::ending_at(now, interval), records)
}

/// Decide which records fire within `window`
pub fn decide_window(window: PollWindow, records: &[AlertRecord]) -> Decision {
    let mut decision = Decision::default();

    for record in records {
        match fires(record, &window) {
            Ok(true) => {
                if record.mode == AlertMode::OneShot {
                    decision.to_delete.push(record.id);
                }
                decision.to_fire.push(record.clone());
            }
            Ok(false) => {}
            Err(err) => decision.invalid.push((record.id, err)),
        }
    }

    decision
}

fn fires(record: &AlertRecord, window: &PollWindow) -> Result<bool, TimespecError> {
    match record.mode {
        // At least once: overdue alerts fire on the next poll
        AlertMode::OneShot => Ok(parse_timestamp(&record.when)? <= window.end),
        // Exact match only, never "at or after"
        AlertMode::Recurring => {
            let recurrence: Recurrence = record.when.parse()?;
            Ok(recurrence.occurs_within(window.start, window.end))
        }
    }
}
