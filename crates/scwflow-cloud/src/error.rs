//! Harness error types

use std::time::Duration;
use thiserror::Error;

/// Errors surfaced by the harness and by cloud API bindings.
#[derive(Error, Debug)]
pub enum CloudError {
    #[error("malformed id {id:?}: {reason}")]
    MalformedId { id: String, reason: String },

    /// The remote resource does not exist (404 / 410).
    #[error("resource not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("{attribute} cannot be shrunk from {from} to {to}")]
    CannotShrink {
        attribute: String,
        from: i64,
        to: i64,
    },

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("timeout after {timeout:?} waiting for {resource} (last status: {last_status})")]
    DeadlineExceeded {
        resource: String,
        last_status: String,
        timeout: Duration,
    },

    /// The resource entered an error-terminal state.
    #[error("{resource} entered status {status}")]
    Failed { resource: String, status: String },

    #[error("cancelled: {0}")]
    Cancelled(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("invalid value for {attribute}: {message}")]
    Validation { attribute: String, message: String },

    #[error("unknown resource type: {0}")]
    UnknownType(String),

    #[error("config error: {0}")]
    Config(#[from] scwflow_config::ConfigError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Coarse classification of a [`CloudError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    MalformedId,
    Absent,
    Conflict,
    CannotShrink,
    Unauthorized,
    DeadlineExceeded,
    Failed,
    Cancelled,
    Transport,
    Validation,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ErrorKind::MalformedId => "malformed-id",
            ErrorKind::Absent => "absent",
            ErrorKind::Conflict => "conflict",
            ErrorKind::CannotShrink => "cannot-shrink",
            ErrorKind::Unauthorized => "unauthorized",
            ErrorKind::DeadlineExceeded => "deadline-exceeded",
            ErrorKind::Failed => "failed",
            ErrorKind::Cancelled => "cancelled",
            ErrorKind::Transport => "transport",
            ErrorKind::Validation => "validation",
        };
        f.write_str(s)
    }
}

impl CloudError {
    pub fn malformed_id(id: impl Into<String>, reason: impl Into<String>) -> Self {
        CloudError::MalformedId {
            id: id.into(),
            reason: reason.into(),
        }
    }

    pub fn validation(attribute: impl Into<String>, message: impl Into<String>) -> Self {
        CloudError::Validation {
            attribute: attribute.into(),
            message: message.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            CloudError::MalformedId { .. } => ErrorKind::MalformedId,
            CloudError::NotFound(_) => ErrorKind::Absent,
            CloudError::Conflict(_) => ErrorKind::Conflict,
            CloudError::CannotShrink { .. } => ErrorKind::CannotShrink,
            CloudError::Unauthorized(_) => ErrorKind::Unauthorized,
            CloudError::DeadlineExceeded { .. } => ErrorKind::DeadlineExceeded,
            CloudError::Failed { .. } => ErrorKind::Failed,
            CloudError::Cancelled(_) => ErrorKind::Cancelled,
            CloudError::Transport(_) => ErrorKind::Transport,
            CloudError::Validation { .. }
            | CloudError::UnknownType(_)
            | CloudError::Config(_)
            | CloudError::Json(_) => ErrorKind::Validation,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.kind() == ErrorKind::Absent
    }

    pub fn is_conflict(&self) -> bool {
        self.kind() == ErrorKind::Conflict
    }

    /// Attribute the error is about, when it is attribute-scoped.
    pub fn attribute(&self) -> Option<&str> {
        match self {
            CloudError::CannotShrink { attribute, .. } | CloudError::Validation { attribute, .. } => {
                Some(attribute)
            }
            _ => None,
        }
    }
}

/// Turns a not-found error into `Ok(None)`.
pub trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>>;
}

impl<T> OptionalExt<T> for Result<T> {
    fn optional(self) -> Result<Option<T>> {
        match self {
            Ok(v) => Ok(Some(v)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }
}

pub type Result<T> = std::result::Result<T, CloudError>;
