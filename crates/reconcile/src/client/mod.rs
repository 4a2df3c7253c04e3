//! Remote client abstraction.
//!
//! The [`RemoteClient`] trait is the only way the engine talks to the remote
//! system. One client instance serves one resource kind, enabling:
//! - The FMC REST implementation in the CLI
//! - The in-memory [`memory::MemoryClient`] for tests and simulations

pub mod memory;

use crate::error::RemoteError;
use crate::types::Attributes;
use std::collections::BTreeMap;

/// An object as listed by the remote
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteObject {
    pub remote_id: String,
    pub name: String,
    pub attributes: Attributes,
}

/// A sibling reference with its remote identifier filled in
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedReference {
    pub name: String,
    pub remote_id: String,
}

/// What gets sent to the remote on create and update
///
/// `attributes` excludes reference fields; those are carried, resolved to
/// remote ids, in `references` keyed by the reference attribute name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Payload {
    pub name: String,
    pub attributes: Attributes,
    pub references: BTreeMap<String, Vec<ResolvedReference>>,
}

impl Payload {
    /// Remote ids referenced through any reference field
    pub fn referenced_ids(&self) -> impl Iterator<Item = &str> {
        self.references
            .values()
            .flatten()
            .map(|r| r.remote_id.as_str())
    }
}

/// CRUD interface for one resource kind on the remote system
///
/// Implementations must be safe for concurrent use: independent operations
/// are issued from a worker pool.
pub trait RemoteClient: Send + Sync {
    /// List every object of this kind
    fn list(&self) -> Result<Vec<RemoteObject>, RemoteError>;

    /// Create an object, returning its remote identifier
    fn create(&self, payload: &Payload) -> Result<String, RemoteError>;

    /// Replace an existing object
    fn update(&self, remote_id: &str, payload: &Payload) -> Result<(), RemoteError>;

    /// Delete an object
    fn delete(&self, remote_id: &str) -> Result<(), RemoteError>;
}
