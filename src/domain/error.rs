//! Error taxonomy shared by the dispatcher, the transports and the facade.
//!
//! Every failure that crosses the HTTP boundary is classified as exactly one
//! [`ErrorKind`]. The kind travels with the response body so that a client on
//! the far side of the wire can rebuild the same [`DataAccessError`] variant.

use serde::{Deserialize, Serialize};
use std::fmt;
use utoipa::ToSchema;

/// Wire-level classification of a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Malformed envelope or data not matching its declared shape.
    Validation,
    /// No usable bearer token.
    Unauthenticated,
    /// Unknown view, action, table or record.
    NotFound,
    /// Recognised operation with no backend mapping yet.
    NotImplemented,
    /// The call never completed (network failure, connection refused).
    Transport,
    /// The backend did not reply within the configured timeout.
    BackendTimeout,
    /// The backend executor explicitly reported a failure.
    Backend,
    /// The backend replied, but not in the expected shape.
    Protocol,
    /// Anything else. Should not normally be observed.
    Internal,
}

impl ErrorKind {
    /// HTTP status used when this kind is surfaced by the dispatcher.
    pub fn status(&self) -> u16 {
        match self {
            ErrorKind::Validation => 400,
            ErrorKind::Unauthenticated => 401,
            ErrorKind::NotFound => 404,
            ErrorKind::NotImplemented => 501,
            ErrorKind::Transport | ErrorKind::BackendTimeout | ErrorKind::Backend => 503,
            ErrorKind::Protocol => 504,
            ErrorKind::Internal => 500,
        }
    }

    /// Best-effort reverse mapping for responses that carry a status but no kind.
    pub fn from_status(status: u16) -> Self {
        match status {
            400 | 422 => ErrorKind::Validation,
            401 | 403 => ErrorKind::Unauthenticated,
            404 => ErrorKind::NotFound,
            501 => ErrorKind::NotImplemented,
            503 => ErrorKind::Backend,
            504 => ErrorKind::Protocol,
            _ => ErrorKind::Internal,
        }
    }
}

/// A single failed check: where it failed and why.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ValidationIssue {
    /// Dotted path into the checked document (`message.record.id`). Empty for the root.
    pub path: String,
    pub message: String,
}

/// Structural or shape validation failure. Always lists every issue found.
#[derive(Debug, Clone, Default, PartialEq, Eq, thiserror::Error)]
pub struct ValidationError {
    pub issues: Vec<ValidationIssue>,
}

impl ValidationError {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn single(path: impl Into<String>, message: impl Into<String>) -> Self {
        let mut err = Self::new();
        err.push(path, message);
        err
    }

    pub fn push(&mut self, path: impl Into<String>, message: impl Into<String>) {
        self.issues.push(ValidationIssue {
            path: path.into(),
            message: message.into(),
        });
    }

    pub fn extend(&mut self, other: ValidationError) {
        self.issues.extend(other.issues);
    }

    pub fn is_empty(&self) -> bool {
        self.issues.is_empty()
    }

    /// `Ok(())` when nothing was recorded, otherwise `Err(self)`.
    pub fn into_result(self) -> Result<(), ValidationError> {
        if self.issues.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }

    /// True if any issue was recorded at exactly `path`.
    pub fn has_path(&self, path: &str) -> bool {
        self.issues.iter().any(|i| i.path == path)
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .issues
            .iter()
            .map(|i| {
                if i.path.is_empty() {
                    i.message.clone()
                } else {
                    format!("{}: {}", i.path, i.message)
                }
            })
            .collect();
        write!(f, "{}", parts.join("; "))
    }
}

/// The single error type surfaced by the facade and produced by the dispatcher.
#[derive(Debug, Clone, thiserror::Error)]
pub enum DataAccessError {
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),
    #[error("unauthenticated: {0}")]
    Unauthenticated(String),
    #[error("{0}")]
    NotFound(String),
    #[error("not implemented: {0}")]
    NotImplemented(String),
    #[error("transport error: {0}")]
    Transport(String),
    #[error("backend timed out: {0}")]
    BackendTimeout(String),
    #[error("backend error: {0}")]
    Backend(String),
    #[error("protocol error: {0}")]
    Protocol(String),
    #[error("internal error: {0}")]
    Internal(String),
}

impl DataAccessError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            DataAccessError::Validation(_) => ErrorKind::Validation,
            DataAccessError::Unauthenticated(_) => ErrorKind::Unauthenticated,
            DataAccessError::NotFound(_) => ErrorKind::NotFound,
            DataAccessError::NotImplemented(_) => ErrorKind::NotImplemented,
            DataAccessError::Transport(_) => ErrorKind::Transport,
            DataAccessError::BackendTimeout(_) => ErrorKind::BackendTimeout,
            DataAccessError::Backend(_) => ErrorKind::Backend,
            DataAccessError::Protocol(_) => ErrorKind::Protocol,
            DataAccessError::Internal(_) => ErrorKind::Internal,
        }
    }

    pub fn status(&self) -> u16 {
        self.kind().status()
    }

    /// Message without the kind prefix, as it is put on the wire.
    pub fn detail(&self) -> String {
        match self {
            DataAccessError::Validation(v) => v.to_string(),
            DataAccessError::Unauthenticated(m)
            | DataAccessError::NotFound(m)
            | DataAccessError::NotImplemented(m)
            | DataAccessError::Transport(m)
            | DataAccessError::BackendTimeout(m)
            | DataAccessError::Backend(m)
            | DataAccessError::Protocol(m)
            | DataAccessError::Internal(m) => m.clone(),
        }
    }

    /// Rebuilds an error received over the wire.
    pub fn from_wire(kind: ErrorKind, message: String, issues: Option<Vec<ValidationIssue>>) -> Self {
        match kind {
            ErrorKind::Validation => {
                let issues = match issues {
                    Some(list) if !list.is_empty() => list,
                    _ => vec![ValidationIssue {
                        path: String::new(),
                        message,
                    }],
                };
                DataAccessError::Validation(ValidationError { issues })
            }
            ErrorKind::Unauthenticated => DataAccessError::Unauthenticated(message),
            ErrorKind::NotFound => DataAccessError::NotFound(message),
            ErrorKind::NotImplemented => DataAccessError::NotImplemented(message),
            ErrorKind::Transport => DataAccessError::Transport(message),
            ErrorKind::BackendTimeout => DataAccessError::BackendTimeout(message),
            ErrorKind::Backend => DataAccessError::Backend(message),
            ErrorKind::Protocol => DataAccessError::Protocol(message),
            ErrorKind::Internal => DataAccessError::Internal(message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_follow_taxonomy() {
        assert_eq!(ErrorKind::Validation.status(), 400);
        assert_eq!(ErrorKind::NotFound.status(), 404);
        assert_eq!(ErrorKind::Backend.status(), 503);
        assert_eq!(ErrorKind::BackendTimeout.status(), 503);
        assert_eq!(ErrorKind::Protocol.status(), 504);
        assert_eq!(ErrorKind::Internal.status(), 500);
    }

    #[test]
    fn validation_error_lists_every_issue() {
        let mut err = ValidationError::new();
        err.push("subject", "expected string");
        err.push("message.name", "is required");
        assert_eq!(err.to_string(), "subject: expected string; message.name: is required");
        assert!(err.has_path("message.name"));
    }

    #[test]
    fn wire_round_trip_keeps_kind_and_issues() {
        let sent = DataAccessError::Validation(ValidationError::single("record.id", "expected integer"));
        let rebuilt = DataAccessError::from_wire(
            sent.kind(),
            sent.detail(),
            match &sent {
                DataAccessError::Validation(v) => Some(v.issues.clone()),
                _ => None,
            },
        );
        match rebuilt {
            DataAccessError::Validation(v) => assert!(v.has_path("record.id")),
            other => panic!("unexpected {other:?}"),
        }

        let timeout = DataAccessError::from_wire(ErrorKind::BackendTimeout, "600s".into(), None);
        assert_eq!(timeout.kind(), ErrorKind::BackendTimeout);
    }
}
