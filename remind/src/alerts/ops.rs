//! Operations the CLI performs against the alert store.
//!
//! Input is validated here before anything touches the disk: both the
//! timespec and the message are required, neither may contain the field
//! delimiter, and the timespec must parse. One-shot input is normalised to
//! the canonical timestamp; recurrence expressions are stored as typed.

use chrono::NaiveDateTime;

use crate::alerts::error::{AlertError, StoreError, ValidationError};
use crate::alerts::record::{illegal_char, AlertId, AlertMode, AlertRecord};
use crate::alerts::store::AlertStore;
use crate::alerts::timespec::{format_timestamp, resolve_one_shot, Recurrence};

/// Parameters for creating an alert
#[derive(Debug, Clone, Default)]
pub struct NewAlert {
    pub timespec: String,
    pub message: String,
    pub repeat: bool,
    /// Use this id instead of allocating the next free one
    pub id: Option<AlertId>,
}

/// Check the user-supplied fields and return the `when` value to store
pub fn validate(
    timespec: &str,
    message: &str,
    repeat: bool,
    now: NaiveDateTime,
) -> Result<String, ValidationError> {
    let timespec = timespec.trim();
    let message = message.trim();

    let mut missing = Vec::new();
    if timespec.is_empty() {
        missing.push("timespec");
    }
    if message.is_empty() {
        missing.push("message");
    }
    if !missing.is_empty() {
        return Err(ValidationError::Missing(missing));
    }

    if illegal_char(timespec).is_some() {
        return Err(ValidationError::IllegalCharacter { field: "timespec" });
    }
    if illegal_char(message).is_some() {
        return Err(ValidationError::IllegalCharacter { field: "message" });
    }

    if repeat {
        timespec.parse::<Recurrence>()?;
        Ok(timespec.to_string())
    } else {
        Ok(format_timestamp(resolve_one_shot(timespec, now)?))
    }
}

/// Create an alert and return its id
pub fn new_alert(store: &AlertStore, alert: NewAlert, now: NaiveDateTime) -> Result<AlertId, AlertError> {
    if alert.id == Some(0) {
        return Err(ValidationError::ZeroId.into());
    }
    let when = validate(&alert.timespec, &alert.message, alert.repeat, now)?;
    let mode = if alert.repeat {
        AlertMode::Recurring
    } else {
        AlertMode::OneShot
    };

    let record = store
        .insert(mode, &when, alert.message.trim(), alert.id)
        .map_err(|e| match e {
            StoreError::DuplicateId(id) => {
                AlertError::Validation(ValidationError::DuplicateId(id))
            }
            other => AlertError::Store(other),
        })?;

    tracing::info!(id = record.id, mode = %record.mode, when = %record.when, "alert created");
    Ok(record.id)
}

/// Delete then recreate an alert under the same id
///
/// A missing id is not an error: the delete is a no-op and a new alert is
/// created with that id. If the new values are invalid, the old alert is
/// already gone.
pub fn change_alert(
    store: &AlertStore,
    id: AlertId,
    timespec: &str,
    message: &str,
    repeat: bool,
    now: NaiveDateTime,
) -> Result<AlertId, AlertError> {
    let existed = store.remove_by_id(id)?;
    if !existed {
        tracing::debug!(id, "change on unknown id creates a new alert");
    }

    new_alert(
        store,
        NewAlert {
            timespec: timespec.to_string(),
            message: message.to_string(),
            repeat,
            id: Some(id),
        },
        now,
    )
}

/// Delete an alert; returns false if no alert had that id
pub fn delete_alert(store: &AlertStore, id: AlertId) -> Result<bool, AlertError> {
    let removed = store.remove_by_id(id)?;
    if removed {
        tracing::info!(id, "alert deleted");
    }
    Ok(removed)
}

/// All alerts, in stored order
pub fn list_alerts(store: &AlertStore) -> Result<Vec<AlertRecord>, AlertError> {
    Ok(store.list()?)
}

/// A single alert by id
pub fn get_alert(store: &AlertStore, id: AlertId) -> Result<Option<AlertRecord>, AlertError> {
    Ok(store.get(id)?)
}
