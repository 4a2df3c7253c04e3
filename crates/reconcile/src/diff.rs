//! Diff computation between desired and remote state

use crate::client::RemoteObject;
use crate::types::{Attributes, DesiredState, RemoteState};
use std::collections::{BTreeMap, BTreeSet};

/// Classification of one item name
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Change {
    Create,
    Update,
    Delete,
    Unchanged,
}

/// Classification of every name in desired and remote state
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Diff {
    pub creates: BTreeSet<String>,
    pub updates: BTreeSet<String>,
    pub deletes: BTreeSet<String>,
    pub unchanged: BTreeSet<String>,
}

impl Diff {
    /// Look up how a name was classified
    pub fn change(&self, name: &str) -> Option<Change> {
        if self.creates.contains(name) {
            Some(Change::Create)
        } else if self.updates.contains(name) {
            Some(Change::Update)
        } else if self.deletes.contains(name) {
            Some(Change::Delete)
        } else if self.unchanged.contains(name) {
            Some(Change::Unchanged)
        } else {
            None
        }
    }

    /// Whether the name needs a create or update
    pub fn is_upsert(&self, name: &str) -> bool {
        self.creates.contains(name) || self.updates.contains(name)
    }

    /// Check if there are any changes
    pub fn has_changes(&self) -> bool {
        !(self.creates.is_empty() && self.updates.is_empty() && self.deletes.is_empty())
    }

    pub fn summary(&self) -> DiffSummary {
        DiffSummary {
            additions: self.creates.len(),
            modifications: self.updates.len(),
            removals: self.deletes.len(),
            unchanged: self.unchanged.len(),
        }
    }
}

/// Classify every name as create, update, delete or unchanged
///
/// Equality is structural over the declared attributes. Pure: no I/O, inputs
/// are not modified.
pub fn compute_diff(desired: &DesiredState, remote: &RemoteState) -> Diff {
    let mut diff = Diff::default();

    for (name, item) in desired {
        match remote.get(name) {
            None => {
                diff.creates.insert(name.clone());
            }
            Some(entry) if entry.attributes != item.attributes => {
                diff.updates.insert(name.clone());
            }
            Some(_) => {
                diff.unchanged.insert(name.clone());
            }
        }
    }

    for name in remote.keys() {
        if !desired.contains_key(name) {
            diff.deletes.insert(name.clone());
        }
    }

    diff
}

/// Diff summary statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiffSummary {
    /// Number of items to create
    pub additions: usize,
    /// Number of items to delete
    pub removals: usize,
    /// Number of items to update
    pub modifications: usize,
    /// Number of items already in sync
    pub unchanged: usize,
}

impl DiffSummary {
    /// Total number of changes
    pub fn total(&self) -> usize {
        self.additions + self.removals + self.modifications
    }

    /// Check if there are any changes
    pub fn has_changes(&self) -> bool {
        self.total() > 0
    }
}

/// Reconcile persisted state with what the remote currently lists
///
/// Entries whose id is no longer listed are dropped so the next diff
/// re-creates them. For entries still present, any attribute the remote
/// reports with a different value replaces the last-applied value, so drift
/// shows up as an update. Arrays holding the same elements in another order
/// are not drift. Attributes the remote does not report are left alone.
pub fn refresh_state(state: &RemoteState, listed: &[RemoteObject]) -> RemoteState {
    let by_id: BTreeMap<&str, &RemoteObject> =
        listed.iter().map(|o| (o.remote_id.as_str(), o)).collect();

    let mut refreshed = RemoteState::new();
    for (name, entry) in state {
        let Some(object) = by_id.get(entry.remote_id.as_str()) else {
            log::info!("{name} ({}) no longer exists remotely", entry.remote_id);
            continue;
        };

        let mut entry = entry.clone();
        let drifted = apply_drift(&mut entry.attributes, &object.attributes);
        if !drifted.is_empty() {
            log::info!("{name} drifted on: {}", drifted.join(", "));
        }
        refreshed.insert(name.clone(), entry);
    }
    refreshed
}

fn apply_drift(applied: &mut Attributes, observed: &Attributes) -> Vec<String> {
    let mut drifted = Vec::new();
    for (key, value) in applied.iter_mut() {
        if let Some(current) = observed.get(key)
            && !same_contents(current, value)
        {
            value.clone_from(current);
            drifted.push(key.clone());
        }
    }
    drifted
}

/// Structural equality that ignores the order of array elements
fn same_contents(a: &serde_json::Value, b: &serde_json::Value) -> bool {
    use serde_json::Value;

    match (a, b) {
        (Value::Array(xs), Value::Array(ys)) => {
            let sorted = |values: &[Value]| {
                let mut text: Vec<String> = values.iter().map(Value::to_string).collect();
                text.sort_unstable();
                text
            };
            xs.len() == ys.len() && sorted(xs) == sorted(ys)
        }
        _ => a == b,
    }
}
