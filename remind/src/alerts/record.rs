// Alert records and their one-line store encoding
//
// Line format: id|mode|when|message
// mode is 'n' (one-shot) or 'r' (recurring). There is no escaping, so the
// delimiter and line breaks are illegal inside every field.

use serde::{Deserialize, Serialize};

use crate::alerts::error::CodecError;

/// Field separator in the store file
pub const DELIMITER: char = '|';

/// Unique alert identifier (always >= 1)
pub type AlertId = u64;

/// Whether an alert fires once or on every matching occurrence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertMode {
    /// Fires once at or after its timestamp, then is removed
    OneShot,
    /// Fires on every occurrence of its recurrence expression, never removed
    Recurring,
}

impl AlertMode {
    /// The single character used in the store file
    pub fn as_char(self) -> char {
        match self {
            AlertMode::OneShot => 'n',
            AlertMode::Recurring => 'r',
        }
    }

    /// Anything other than 'n' is treated as recurring, matching older stores
    pub fn from_field(field: &str) -> Self {
        if field == "n" {
            AlertMode::OneShot
        } else {
            AlertMode::Recurring
        }
    }
}

impl std::fmt::Display for AlertMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AlertMode::OneShot => write!(f, "once"),
            AlertMode::Recurring => write!(f, "repeat"),
        }
    }
}

/// One persisted alert
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertRecord {
    pub id: AlertId,
    pub mode: AlertMode,
    /// Canonical timestamp for one-shot alerts, recurrence expression otherwise
    pub when: String,
    pub message: String,
}

impl AlertRecord {
    pub fn new(id: AlertId, mode: AlertMode, when: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            id,
            mode,
            when: when.into(),
            message: message.into(),
        }
    }

    pub fn is_one_shot(&self) -> bool {
        self.mode == AlertMode::OneShot
    }

    /// Text handed to the notifier when this alert fires
    pub fn render(&self) -> String {
        format!("Alert #{}: {}", self.id, self.message)
    }
}

/// Returns the first character that cannot be stored inside a field
pub fn illegal_char(field: &str) -> Option<char> {
    field
        .chars()
        .find(|c| *c == DELIMITER || *c == '\n' || *c == '\r')
}

/// Render a record as a single store line (without the trailing newline)
pub fn encode(record: &AlertRecord) -> Result<String, CodecError> {
    for (field, value) in [("when", &record.when), ("message", &record.message)] {
        if let Some(illegal) = illegal_char(value) {
            return Err(CodecError::Encode {
                id: record.id,
                field,
                illegal,
            });
        }
    }

    Ok(format!(
        "{}{d}{}{d}{}{d}{}",
        record.id,
        record.mode.as_char(),
        record.when,
        record.message,
        d = DELIMITER
    ))
}

/// Parse one store line back into a record
pub fn decode(line: &str) -> Result<AlertRecord, CodecError> {
    let trimmed = line.trim_end_matches(['\n', '\r']);
    let fields: Vec<&str> = trimmed.split(DELIMITER).collect();

    let malformed = |reason: String| CodecError::Decode {
        line: trimmed.to_string(),
        reason,
    };

    if fields.len() != 4 {
        return Err(malformed(format!("expected 4 fields, found {}", fields.len())));
    }

    let id: AlertId = fields[0]
        .trim()
        .parse()
        .map_err(|_| malformed(format!("id {:?} is not a positive integer", fields[0])))?;
    if id == 0 {
        return Err(malformed("id must be positive".to_string()));
    }

    Ok(AlertRecord {
        id,
        mode: AlertMode::from_field(fields[1]),
        when: fields[2].to_string(),
        message: fields[3].to_string(),
    })
}
