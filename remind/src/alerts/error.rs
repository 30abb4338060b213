// Error types for the alert core
// Library code returns these; the binaries wrap them in anyhow with context.

use std::path::PathBuf;

use crate::alerts::record::AlertId;

/// A record could not be rendered to or parsed from a store line
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CodecError {
    #[error("cannot encode alert {id}: {field} contains an illegal character ({illegal:?})")]
    Encode {
        id: AlertId,
        field: &'static str,
        illegal: char,
    },
    #[error("malformed alert line {line:?}: {reason}")]
    Decode { line: String, reason: String },
}

/// A date or recurrence expression that cannot be resolved
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid timespec {spec:?}: {reason}")]
pub struct TimespecError {
    pub spec: String,
    pub reason: String,
}

impl TimespecError {
    pub fn new(spec: &str, reason: impl Into<String>) -> Self {
        Self {
            spec: spec.to_string(),
            reason: reason.into(),
        }
    }
}

/// User input rejected before anything is written
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("missing required field(s): {}", .0.join(", "))]
    Missing(Vec<&'static str>),
    #[error("{field} must not contain '|' or line breaks")]
    IllegalCharacter { field: &'static str },
    #[error("alert id must be a positive integer")]
    ZeroId,
    #[error("alert {0} already exists")]
    DuplicateId(AlertId),
    #[error(transparent)]
    Timespec(#[from] TimespecError),
}

/// Failures of the persisted alert store
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("{action} {}: {source}", .path.display())]
    Io {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Codec(#[from] CodecError),
    #[error("alert {0} already exists")]
    DuplicateId(AlertId),
}

impl StoreError {
    pub(crate) fn io(action: &'static str, path: &std::path::Path, source: std::io::Error) -> Self {
        StoreError::Io {
            action,
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Errors surfaced by the core operations used by the CLI
#[derive(Debug, thiserror::Error)]
pub enum AlertError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<TimespecError> for AlertError {
    fn from(err: TimespecError) -> Self {
        AlertError::Validation(ValidationError::Timespec(err))
    }
}

/// A notification could not be delivered
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("failed to launch {program}: {source}")]
    Spawn {
        program: &'static str,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to write notification: {0}")]
    Write(#[from] std::io::Error),
    #[error("no notification backend available on this platform")]
    Unsupported,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_are_listed() {
        let err = ValidationError::Missing(vec!["timespec", "message"]);
        assert_eq!(
            err.to_string(),
            "missing required field(s): timespec, message"
        );
    }

    #[test]
    fn timespec_error_converts_to_validation() {
        let err: AlertError = TimespecError::new("someday", "unrecognized").into();
        assert!(matches!(
            err,
            AlertError::Validation(ValidationError::Timespec(_))
        ));
        assert!(err.to_string().contains("someday"));
    }
}
