//! Error types for reconciliation.
//!
//! Remote errors are categorized so the executor can decide between retrying,
//! ignoring and failing an operation. Per-item errors are collected rather than
//! returned eagerly; only a reference cycle (or a failed refresh) aborts a whole
//! reconciliation, and both happen before any remote mutation.

use crate::types::OperationKind;
use std::fmt;
use thiserror::Error;

/// Categories of remote errors for retry logic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Connection failures, timeouts, throttling, server errors (retryable)
    Transient,
    /// The remote rejected the payload
    Validation,
    /// The object is in use or collides with another object
    Conflict,
    /// The object does not exist remotely
    NotFound,
    /// The target API version lacks the feature
    UnsupportedVersion,
    /// Other/unknown errors
    Other,
}

impl ErrorCategory {
    /// Whether this error category is typically transient and worth retrying.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient)
    }

    /// Whether a delete failing with this category means the object is already gone.
    pub fn is_ignorable(&self) -> bool {
        matches!(self, Self::NotFound)
    }

    /// Get a user-friendly description of this error category.
    pub fn description(&self) -> &'static str {
        match self {
            Self::Transient => "Transient remote failure",
            Self::Validation => "Rejected by remote validation",
            Self::Conflict => "Remote conflict",
            Self::NotFound => "Object not found",
            Self::UnsupportedVersion => "Unsupported by the remote API version",
            Self::Other => "Unexpected error",
        }
    }
}

/// Errors returned by a [`RemoteClient`](crate::client::RemoteClient).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RemoteError {
    /// Connection, timeout, throttling or server-side failure
    #[error("transient remote error: {message}")]
    Transient {
        /// Detailed error message from the failed call
        message: String,
    },

    /// Payload rejected by the remote
    #[error("validation failed: {message}")]
    Validation { message: String },

    /// Object in use, duplicate name, etc.
    #[error("conflict: {message}")]
    Conflict { message: String },

    /// Object does not exist
    #[error("not found: {message}")]
    NotFound { message: String },

    /// The remote API version does not support this object type or field
    #[error("UnsupportedVersion: {message}")]
    UnsupportedVersion { message: String },

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl RemoteError {
    pub fn transient(message: impl Into<String>) -> Self {
        Self::Transient {
            message: message.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict {
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound {
            message: message.into(),
        }
    }

    pub fn unsupported_version(message: impl Into<String>) -> Self {
        Self::UnsupportedVersion {
            message: message.into(),
        }
    }

    /// Get the error category for retry logic.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Transient { .. } => ErrorCategory::Transient,
            Self::Validation { .. } => ErrorCategory::Validation,
            Self::Conflict { .. } => ErrorCategory::Conflict,
            Self::NotFound { .. } => ErrorCategory::NotFound,
            Self::UnsupportedVersion { .. } => ErrorCategory::UnsupportedVersion,
            Self::Other(_) => ErrorCategory::Other,
        }
    }

    /// Whether this error is typically transient and worth retrying.
    pub fn is_retryable(&self) -> bool {
        self.category().is_retryable()
    }

    /// Whether this error can be safely ignored on delete.
    pub fn is_ignorable(&self) -> bool {
        self.category().is_ignorable()
    }
}

/// Failure or skip recorded against a single item.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ItemError {
    /// The item references names that are not declared in the desired map
    #[error(
        "Failed to {operation} {name}: reference to undeclared item(s) {} in {field}",
        .targets.join(", ")
    )]
    DanglingReference {
        name: String,
        operation: OperationKind,
        field: String,
        targets: Vec<String>,
    },

    /// The remote call failed (after retries, for transient errors)
    #[error("Failed to {operation} {name} after {attempts} attempt(s): {source}")]
    Remote {
        name: String,
        operation: OperationKind,
        attempts: u32,
        #[source]
        source: RemoteError,
    },

    /// Not attempted because an operation it depends on did not succeed
    #[error("Skipped {operation} of {name}: depends on {dependency}, which did not apply")]
    DependencyFailed {
        name: String,
        operation: OperationKind,
        dependency: String,
    },

    /// Not attempted because the reconciliation was cancelled
    #[error("Skipped {operation} of {name}: reconciliation cancelled")]
    Cancelled {
        name: String,
        operation: OperationKind,
    },
}

impl ItemError {
    /// Name of the item this error is recorded against
    pub fn name(&self) -> &str {
        match self {
            Self::DanglingReference { name, .. }
            | Self::Remote { name, .. }
            | Self::DependencyFailed { name, .. }
            | Self::Cancelled { name, .. } => name,
        }
    }

    /// Category of the underlying remote error, if any
    pub fn category(&self) -> Option<ErrorCategory> {
        match self {
            Self::Remote { source, .. } => Some(source.category()),
            _ => None,
        }
    }

    /// Whether the operation was skipped rather than attempted
    pub fn is_skip(&self) -> bool {
        matches!(self, Self::DependencyFailed { .. } | Self::Cancelled { .. })
    }
}

/// Errors that abort a whole reconciliation before any mutation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReconcileError {
    /// The reference graph is not acyclic
    #[error("Cycle in {kind}: {}", .path.join(" -> "))]
    Cycle { kind: &'static str, path: Vec<String> },

    /// Listing remote objects for refresh failed
    #[error("Failed to list {kind}: {source}")]
    Refresh {
        kind: &'static str,
        #[source]
        source: RemoteError,
    },

    /// The worker pool could not be created
    #[error("Failed to create worker pool: {0}")]
    WorkerPool(String),
}

/// Combined error naming every item that failed or was skipped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplyError {
    pub kind: &'static str,
    pub failures: Vec<ItemError>,
}

impl ApplyError {
    /// Names of every failed or skipped item
    pub fn names(&self) -> Vec<&str> {
        self.failures.iter().map(ItemError::name).collect()
    }

    /// Whether any failure was a real failure (not just a skip)
    pub fn has_failures(&self) -> bool {
        self.failures.iter().any(|f| !f.is_skip())
    }
}

impl fmt::Display for ApplyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} item(s) did not apply",
            self.kind,
            self.failures.len()
        )?;
        for failure in &self.failures {
            write!(f, "\n  - {failure}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ApplyError {}
