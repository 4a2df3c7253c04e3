//! # Reconcile
//!
//! Bulk reconciliation of named collections against a remote object store.
//!
//! A plural resource declares a map of items keyed by name. Each apply diffs
//! that map against what was applied last time, orders the resulting creates,
//! updates and deletes so that items referenced by name exist before their
//! referrers, runs independent operations in parallel, and keeps going when
//! individual items fail.
//!
//! ## Core Concepts
//!
//! - **ResourceKind**: A plural resource type and its reference fields
//! - **DependencyGraph**: Item-to-item references, cycle detection, topological order
//! - **Diff**: Per-item classification into create, update, delete or unchanged
//! - **Plan**: Ordered operations with their dependencies
//! - **Executor**: Wave-based execution with retries, skips and cancellation
//! - **Reconciliation**: Outcomes, the new remote state and the combined error
//!
//! ## Example
//!
//! ```ignore
//! use reconcile::{
//!     Item, MemoryClient, NoProgress, ReconcileContext, RemoteState, kind, reconcile,
//! };
//! use serde_json::json;
//!
//! let client = MemoryClient::new(kind::NETWORK_GROUPS);
//! let desired = [
//!     ("g1".to_string(), Item::default().with("network_groups", json!(["g2"]))),
//!     ("g2".to_string(), Item::default()),
//! ]
//! .into();
//!
//! let ctx = ReconcileContext::new(&client);
//! let state = RemoteState::new();
//! let result = reconcile(&ctx, &kind::NETWORK_GROUPS, &desired, state, &mut NoProgress)?;
//! if let Some(err) = result.error() {
//!     eprintln!("{err}");
//! }
//! // persist result.state for the next apply
//! ```
//!
//! ## Provider Traits
//!
//! - [`RemoteClient`]: CRUD access to one kind on the remote system
//! - [`ProgressCallback`]: Receives phase and per-operation progress
//! - [`RetryCallback`]: Observes retries of transient errors
//!
//! The crate has no opinion on transport, persistence or terminal output.

pub mod aggregate;
pub mod client;
pub mod context;
pub mod diff;
pub mod engine;
pub mod error;
pub mod executor;
pub mod graph;
pub mod kind;
pub mod planner;
pub mod retry;
pub mod types;

// Re-export main types at crate root
pub use aggregate::{Aggregator, Reconciliation};
pub use client::memory::{CallKind, MemoryClient};
pub use client::{Payload, RemoteClient, RemoteObject, ResolvedReference};
pub use context::{Cancellation, NoProgress, ProgressCallback, ReconcileContext};
pub use diff::{Change, Diff, DiffSummary, compute_diff, refresh_state};
pub use engine::{preview, reconcile, refresh};
pub use error::{ApplyError, ErrorCategory, ItemError, ReconcileError, RemoteError};
pub use executor::execute;
pub use graph::DependencyGraph;
pub use kind::{ReferenceField, ResourceKind};
pub use planner::{Operation, Plan, build_plan};
pub use retry::{LogCallback, NoCallback, RetryCallback, with_retry};
pub use types::{
    ApplyResult, Attributes, DesiredState, ExecuteOptions, ExecuteSummary, Item, OperationKind,
    OperationOutcome, Phase, RemoteEntry, RemoteState, RetryConfig,
};
