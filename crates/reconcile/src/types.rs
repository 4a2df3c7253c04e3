//! Core types for bulk reconciliation

use crate::error::ItemError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

/// Declared attributes of an item, keyed by attribute name
pub type Attributes = BTreeMap<String, serde_json::Value>;

/// Desired map for one plural resource: item name -> declared item
pub type DesiredState = BTreeMap<String, Item>;

/// Last-known remote state for one plural resource: item name -> entry
pub type RemoteState = BTreeMap<String, RemoteEntry>;

/// One named child object inside a plural resource
///
/// The item name is the key of the enclosing map, so it is not repeated here.
/// Reference fields are ordinary attributes holding a list of sibling names;
/// which attributes count as references is decided by the
/// [`ResourceKind`](crate::kind::ResourceKind).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    #[serde(flatten)]
    pub attributes: Attributes,
}

impl Item {
    /// Create an item from its attributes
    pub fn new(attributes: Attributes) -> Self {
        Self { attributes }
    }

    /// Builder-style helper used mostly by tests and document loaders
    pub fn with(mut self, key: &str, value: serde_json::Value) -> Self {
        self.attributes.insert(key.to_string(), value);
        self
    }

    /// Look up a single attribute
    pub fn get(&self, key: &str) -> Option<&serde_json::Value> {
        self.attributes.get(key)
    }
}

impl From<Attributes> for Item {
    fn from(attributes: Attributes) -> Self {
        Self::new(attributes)
    }
}

/// Persisted record of a successfully applied item
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteEntry {
    /// Identifier assigned by the remote system
    pub remote_id: String,
    /// Attributes as last applied (the full desired set, references included)
    #[serde(default)]
    pub attributes: Attributes,
}

impl RemoteEntry {
    pub fn new(remote_id: impl Into<String>, attributes: Attributes) -> Self {
        Self {
            remote_id: remote_id.into(),
            attributes,
        }
    }
}

/// Kind of remote mutation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    Create,
    Update,
    Delete,
}

impl OperationKind {
    /// Verb used in user-facing messages ("Failed to create ...")
    pub fn verb(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.verb())
    }
}

/// Execution phase of a plan
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Creates and updates, referents before referrers
    Apply,
    /// Deletes, referrers before referents
    Delete,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Apply => f.write_str("apply"),
            Self::Delete => f.write_str("delete"),
        }
    }
}

/// Result of executing one operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApplyResult {
    /// Item was created remotely
    Created { remote_id: String },
    /// Item was updated in place
    Updated,
    /// Item was removed (or was already gone)
    Deleted,
    /// The remote call, or a pre-flight check, failed
    Failed { error: ItemError },
    /// The operation was never attempted
    Skipped { error: ItemError },
}

impl ApplyResult {
    /// Check if the result represents success (no failure, not skipped)
    pub fn is_success(&self) -> bool {
        matches!(
            self,
            Self::Created { .. } | Self::Updated | Self::Deleted
        )
    }

    /// The error attached to a failed or skipped result
    pub fn error(&self) -> Option<&ItemError> {
        match self {
            Self::Failed { error } | Self::Skipped { error } => Some(error),
            _ => None,
        }
    }
}

/// Outcome of one operation, as reported by the executor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationOutcome {
    pub name: String,
    pub kind: OperationKind,
    pub result: ApplyResult,
}

/// Summary of execution results
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecuteSummary {
    pub created: usize,
    pub updated: usize,
    pub deleted: usize,
    pub unchanged: usize,
    pub failed: usize,
    pub skipped: usize,
}

impl ExecuteSummary {
    /// Total number of actual changes made
    pub fn total_changes(&self) -> usize {
        self.created + self.updated + self.deleted
    }

    /// Check if execution was fully successful (nothing failed or skipped)
    pub fn is_success(&self) -> bool {
        self.failed == 0 && self.skipped == 0
    }

    /// Total number of items processed
    pub fn total(&self) -> usize {
        self.total_changes() + self.unchanged + self.failed + self.skipped
    }

    /// Add a result to the summary
    pub fn add_result(&mut self, result: &ApplyResult) {
        match result {
            ApplyResult::Created { .. } => self.created += 1,
            ApplyResult::Updated => self.updated += 1,
            ApplyResult::Deleted => self.deleted += 1,
            ApplyResult::Failed { .. } => self.failed += 1,
            ApplyResult::Skipped { .. } => self.skipped += 1,
        }
    }
}

/// Options for execution
#[derive(Debug, Clone)]
pub struct ExecuteOptions {
    /// Number of parallel workers for independent operations
    pub jobs: usize,
    /// Refresh remote state via `List()` before diffing
    pub refresh: bool,
}

impl Default for ExecuteOptions {
    fn default() -> Self {
        Self {
            jobs: 4,
            refresh: true,
        }
    }
}

/// Retry policy for transient remote errors
#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
    /// Maximum number of attempts, the first one included
    pub max_attempts: u32,
    /// Delay before the first retry
    pub base_delay: Duration,
    /// Multiplier for exponential backoff
    pub backoff_factor: f64,
    /// Maximum delay between retries
    pub max_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
            backoff_factor: 2.0,
            max_delay: Duration::from_secs(10),
        }
    }
}

impl RetryConfig {
    /// Create a new retry config with custom settings.
    pub fn new(max_attempts: u32, base_delay: Duration, backoff_factor: f64) -> Self {
        Self {
            max_attempts,
            base_delay,
            backoff_factor,
            ..Default::default()
        }
    }

    /// Calculate the delay after a failed attempt (0-indexed).
    ///
    /// Never exceeds `max_delay`; a factor that yields a negative or NaN
    /// delay means no delay.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        let delay = self.base_delay.as_secs_f64() * self.backoff_factor.powi(exponent);
        if delay.is_nan() || delay <= 0.0 {
            return Duration::ZERO;
        }
        Duration::try_from_secs_f64(delay.min(self.max_delay.as_secs_f64()))
            .unwrap_or(self.max_delay)
    }

    /// Create a config that never retries.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            ..Default::default()
        }
    }
}
